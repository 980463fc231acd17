use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// CSS class that makes the storefront recalculate shipping on edit.
pub const REFRESH_CLASS: &str = "update_totals_on_change";

/// Address fields whose edits can flip pickup visibility.
pub const REFRESH_FIELDS: &[&str] = &["city", "state"];

/// Page script that recalculates shipping while the shopper edits the
/// destination: city inputs are debounced, country/state selects refresh
/// immediately.
pub const CHECKOUT_REFRESH_SCRIPT: &str = r#"jQuery(function($){
    var refresh = function(){
        if ($('form.checkout').length) {
            $(document.body).trigger('update_checkout');
        } else if ($('form.woocommerce-cart-form').length) {
            var $btn = $('button[name="calc_shipping"]');
            if ($btn.length) { $btn.prop('disabled', false).trigger('click'); }
        }
    };
    var debounce = function(fn, wait){ var t; return function(){ clearTimeout(t); var args = arguments, ctx = this; t = setTimeout(function(){ fn.apply(ctx, args); }, wait); }; };

    $(document).on('input change', 'input[name="shipping_city"], input[name="billing_city"], #calc_shipping_city', debounce(refresh, 400));
    $(document).on('change', 'select[name="shipping_country"], select[name="billing_country"], select[name="shipping_state"], select[name="billing_state"]', refresh);
});
"#;

/// One rendered address field; attributes are kept exactly as the host sent them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AddressField(Map<String, Value>);

impl AddressField {
    pub fn has_class(&self, class: &str) -> bool {
        self.0
            .get("class")
            .and_then(Value::as_array)
            .is_some_and(|classes| classes.iter().any(|existing| existing == class))
    }

    // A `class` that is not a list starts over as an empty one.
    fn add_class(&mut self, class: &str) {
        if self.has_class(class) {
            return;
        }

        let entry = self
            .0
            .entry("class")
            .or_insert_with(|| Value::Array(Vec::new()));
        if !entry.is_array() {
            *entry = Value::Array(Vec::new());
        }
        if let Value::Array(classes) = entry {
            classes.push(Value::String(class.to_string()));
        }
    }
}

pub type AddressFields = IndexMap<String, AddressField>;

/// Tags the city and state fields with [`REFRESH_CLASS`] once. Every other
/// field and attribute passes through unchanged.
pub fn mark_refresh_fields(mut fields: AddressFields) -> AddressFields {
    for key in REFRESH_FIELDS {
        if let Some(field) = fields.get_mut(*key) {
            field.add_class(REFRESH_CLASS);
        }
    }
    fields
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(value: Value) -> AddressFields {
        serde_json::from_value(value).unwrap()
    }

    fn to_json(fields: &AddressFields) -> Value {
        serde_json::to_value(fields).unwrap()
    }

    #[test]
    fn marks_city_and_state_only() {
        let marked = to_json(&mark_refresh_fields(fields(json!({
            "first_name": { "label": "First name", "class": ["form-row-first"] },
            "city": { "label": "Town / City", "required": true, "class": ["form-row-wide"] },
            "state": { "label": "Region" }
        }))));

        assert_eq!(marked["city"]["class"], json!(["form-row-wide", REFRESH_CLASS]));
        assert_eq!(marked["city"]["required"], json!(true));
        assert_eq!(marked["state"]["class"], json!([REFRESH_CLASS]));
        assert_eq!(marked["first_name"]["class"], json!(["form-row-first"]));
    }

    #[test]
    fn other_fields_pass_through_unchanged() {
        let input = json!({
            "first_name": { "label": "First", "class": "form-row-first" },
            "postcode": { "label": "Postcode" },
            "city": { "label": "Town / City" }
        });

        let marked = to_json(&mark_refresh_fields(fields(input.clone())));
        assert_eq!(marked["first_name"], input["first_name"]);
        assert_eq!(marked["postcode"], input["postcode"]);
        assert!(marked["postcode"].get("class").is_none());
    }

    #[test]
    fn marking_twice_adds_the_class_once() {
        let input = fields(json!({ "city": { "class": [] } }));
        let twice = to_json(&mark_refresh_fields(mark_refresh_fields(input)));
        assert_eq!(twice["city"]["class"], json!([REFRESH_CLASS]));
    }

    #[test]
    fn non_list_class_on_city_is_replaced() {
        let marked = mark_refresh_fields(fields(json!({ "city": { "class": "form-row-wide" } })));
        assert_eq!(to_json(&marked)["city"]["class"], json!([REFRESH_CLASS]));
        assert!(marked["city"].has_class(REFRESH_CLASS));
    }

    #[test]
    fn field_order_is_preserved() {
        let marked = mark_refresh_fields(fields(json!({
            "country": {}, "city": {}, "postcode": {}, "state": {}
        })));
        assert_eq!(
            marked.keys().map(String::as_str).collect::<Vec<_>>(),
            vec!["country", "city", "postcode", "state"]
        );
    }
}
