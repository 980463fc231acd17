pub mod address_fields;
pub mod error;
pub mod filter;
pub mod models;
pub mod normalize;
pub mod rules;

pub use address_fields::{
    mark_refresh_fields, AddressField, AddressFields, CHECKOUT_REFRESH_SCRIPT, REFRESH_CLASS,
};
pub use error::RulesError;
pub use filter::{
    CityTraceHook, DecisionReason, NoRegionLabels, PickupDecision, PickupFilter, RegionLookup,
    SilentCityHook, TracingCityHook,
};
pub use models::*;
pub use normalize::normalize_place;
pub use rules::{PickupRules, RulesConfig, DESIGNATED_COUNTRY, PICKUP_METHOD_PREFIX};
