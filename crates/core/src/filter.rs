use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use crate::models::{Address, PackageRates};
use crate::normalize::normalize_place;
use crate::rules::PickupRules;

/// Resolves a region code to the label the store shows for it.
pub trait RegionLookup: Send + Sync {
    fn region_label(&self, country: &str, code: &str) -> Option<String>;
}

/// Lookup that knows no labels; only raw region codes can then match.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRegionLabels;

impl RegionLookup for NoRegionLabels {
    fn region_label(&self, _country: &str, _code: &str) -> Option<String> {
        None
    }
}

impl<F> RegionLookup for F
where
    F: Fn(&str, &str) -> Option<String> + Send + Sync,
{
    fn region_label(&self, country: &str, code: &str) -> Option<String> {
        self(country, code)
    }
}

/// Observes the raw and normalized destination city. Diagnostics only.
pub trait CityTraceHook: Send + Sync {
    fn trace_city(&self, raw: &str, normalized: &str);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TracingCityHook;

impl CityTraceHook for TracingCityHook {
    fn trace_city(&self, raw: &str, normalized: &str) {
        debug!(raw, normalized, "destination city normalized");
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SilentCityHook;

impl CityTraceHook for SilentCityHook {
    fn trace_city(&self, _raw: &str, _normalized: &str) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionReason {
    OutsideCountry,
    CityMatch,
    RegionLabelMatch,
    RegionCodeMatch,
    NoMatch,
}

/// Outcome for one destination. `allowed` means pickup stays visible.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PickupDecision {
    pub allowed: bool,
    pub reason: DecisionReason,
    pub city_key: String,
    pub region_key: String,
}

impl PickupDecision {
    fn outside_country() -> Self {
        Self {
            allowed: true,
            reason: DecisionReason::OutsideCountry,
            city_key: String::new(),
            region_key: String::new(),
        }
    }
}

#[derive(Clone)]
pub struct PickupFilter {
    rules: Arc<PickupRules>,
    regions: Arc<dyn RegionLookup>,
    hook: Arc<dyn CityTraceHook>,
}

impl PickupFilter {
    pub fn new(rules: Arc<PickupRules>, regions: Arc<dyn RegionLookup>) -> Self {
        Self {
            rules,
            regions,
            hook: Arc::new(TracingCityHook),
        }
    }

    pub fn with_hook(mut self, hook: Arc<dyn CityTraceHook>) -> Self {
        self.hook = hook;
        self
    }

    pub fn rules(&self) -> &PickupRules {
        &self.rules
    }

    pub fn evaluate(&self, destination: &Address) -> PickupDecision {
        if !self.rules.applies_to(&destination.country_code()) {
            return PickupDecision::outside_country();
        }

        let city_key = normalize_place(&destination.city);
        self.hook.trace_city(&destination.city, &city_key);

        let region_code = destination.region_code();
        let region_key = region_code
            .and_then(|code| self.regions.region_label(self.rules.country(), code))
            .map(|label| normalize_place(&label))
            .unwrap_or_default();

        let reason = if self.rules.is_allowed_place(&city_key) {
            DecisionReason::CityMatch
        } else if self.rules.is_allowed_place(&region_key) {
            DecisionReason::RegionLabelMatch
        } else if region_code.is_some_and(|code| self.rules.is_allowed_region_code(code)) {
            DecisionReason::RegionCodeMatch
        } else {
            DecisionReason::NoMatch
        };

        PickupDecision {
            allowed: reason != DecisionReason::NoMatch,
            reason,
            city_key,
            region_key,
        }
    }

    /// Evaluates `destination` and hides every pickup rate unless it is an
    /// allowed place. Other rates keep their order.
    pub fn apply(
        &self,
        rates: PackageRates,
        destination: &Address,
    ) -> (PackageRates, PickupDecision) {
        let decision = self.evaluate(destination);
        if decision.allowed {
            return (rates, decision);
        }

        let mut rates = rates;
        let removed = rates.remove_where(|rate| self.rules.is_pickup_method(&rate.method_id));
        debug!(
            removed,
            remaining = rates.len(),
            city_key = %decision.city_key,
            "pickup rates hidden"
        );

        (rates, decision)
    }

    pub fn filter(&self, rates: PackageRates, destination: &Address) -> PackageRates {
        self.apply(rates, destination).0
    }
}
