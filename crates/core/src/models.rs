use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Shipping destination as handed over by the checkout pipeline.
///
/// Deserialization never rejects a destination: absent, `null` or
/// structured values collapse to empty strings, numbers and booleans are
/// read as text, and a `state` key wins over `region` when both are sent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "AddressInput")]
pub struct Address {
    pub country: String,
    pub city: String,
    pub region: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AddressInput {
    #[serde(default, deserialize_with = "lenient_text")]
    country: String,
    #[serde(default, deserialize_with = "lenient_text")]
    city: String,
    #[serde(default, deserialize_with = "lenient_optional_text")]
    region: Option<String>,
    #[serde(default, deserialize_with = "lenient_optional_text")]
    state: Option<String>,
}

impl From<AddressInput> for Address {
    fn from(input: AddressInput) -> Self {
        let region = input
            .state
            .filter(|code| !code.is_empty())
            .or(input.region);

        Self {
            country: input.country,
            city: input.city,
            region,
        }
    }
}

impl Address {
    pub fn new(country: impl Into<String>, city: impl Into<String>) -> Self {
        Self {
            country: country.into(),
            city: city.into(),
            region: None,
        }
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn country_code(&self) -> String {
        self.country.to_uppercase()
    }

    pub fn region_code(&self) -> Option<&str> {
        self.region.as_deref().filter(|code| !code.is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShippingRate {
    #[serde(default, deserialize_with = "lenient_text")]
    pub method_id: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub label: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub cost: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ShippingRate {
    pub fn new(method_id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            method_id: method_id.into(),
            label: label.into(),
            ..Self::default()
        }
    }
}

/// Candidate rates keyed by rate id, in the order the pipeline offered them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PackageRates(IndexMap<String, ShippingRate>);

impl PackageRates {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Drops every rate `hidden` selects, keeping the relative order of the
    /// rest. Returns how many were dropped.
    pub fn remove_where<F>(&mut self, mut hidden: F) -> usize
    where
        F: FnMut(&ShippingRate) -> bool,
    {
        let before = self.0.len();
        self.0.retain(|_, rate| !hidden(rate));
        before - self.0.len()
    }
}

impl FromIterator<(String, ShippingRate)> for PackageRates {
    fn from_iter<I: IntoIterator<Item = (String, ShippingRate)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for PackageRates {
    type Item = (String, ShippingRate);
    type IntoIter = indexmap::map::IntoIter<String, ShippingRate>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// One shipping calculation: where it goes and what it could cost.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShippingPackage {
    #[serde(default)]
    pub destination: Address,
    #[serde(default)]
    pub rates: PackageRates,
}

// Reads scalars as text the way the storefront casts them; anything else
// is treated as absent.
fn scalar_text(value: Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(true) => Some("1".to_string()),
        Value::Bool(false) => Some(String::new()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

fn lenient_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(scalar_text(Value::deserialize(deserializer)?).unwrap_or_default())
}

fn lenient_optional_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(scalar_text(Value::deserialize(deserializer)?))
}
