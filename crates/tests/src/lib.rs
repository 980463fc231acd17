//! HTTP integration tests live in `tests/`.
