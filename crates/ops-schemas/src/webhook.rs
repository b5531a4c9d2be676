//! Inbound pricing webhook envelope.
//!
//! The ERP posts its full item representation; the engine reads only the
//! identity pair, the protected flag, and the four pricing fields. Price
//! values arrive in whatever shape the ERP script emitted (number, numeric
//! string, empty string, absent) — they stay `serde_json::Value` here and
//! are coerced at the applier boundary.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// PricingWebhook
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PricingWebhook {
    /// ERP external item code; matched against the OPMS item code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub itemid: Option<String>,
    /// ERP internal id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub internalid: Option<String>,
    /// Guard flag: truthy forbids writing pricing back to OPMS.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custitem_opms_protected: Option<serde_json::Value>,

    /// Customer cut price.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub baseprice: Option<serde_json::Value>,
    /// Customer roll price.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custitem_customer_roll_price: Option<serde_json::Value>,
    /// Vendor cut cost.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost: Option<serde_json::Value>,
    /// Vendor roll cost.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custitem_vendor_roll_cost: Option<serde_json::Value>,
}

impl PricingWebhook {
    /// ERP booleans arrive as true/false, "T"/"F", or "true"/"false".
    pub fn is_protected(&self) -> bool {
        match &self.custitem_opms_protected {
            Some(serde_json::Value::Bool(b)) => *b,
            Some(serde_json::Value::String(s)) => {
                s == "T" || s.eq_ignore_ascii_case("true")
            }
            _ => false,
        }
    }
}

// ---------------------------------------------------------------------------
// PriceSnapshot / WebhookOutcome
// ---------------------------------------------------------------------------

/// Pricing state of one item, in integer cents. `None` = no row / no value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceSnapshot {
    pub customer_cut_cents: Option<i64>,
    pub customer_roll_cents: Option<i64>,
    pub vendor_cut_cents: Option<i64>,
    pub vendor_roll_cents: Option<i64>,
}

/// Result of one webhook application, including audit snapshots.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookOutcome {
    pub success: bool,
    pub skipped: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<String>,
    pub item_id: Option<i64>,
    pub before: PriceSnapshot,
    pub after: PriceSnapshot,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl WebhookOutcome {
    pub fn skipped_with(reason: impl Into<String>) -> Self {
        Self {
            success: true,
            skipped: true,
            skip_reason: Some(reason.into()),
            item_id: None,
            before: PriceSnapshot::default(),
            after: PriceSnapshot::default(),
            warnings: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn protected_accepts_erp_boolean_spellings() {
        for truthy in [json!(true), json!("T"), json!("true"), json!("TRUE")] {
            let w = PricingWebhook {
                custitem_opms_protected: Some(truthy.clone()),
                ..Default::default()
            };
            assert!(w.is_protected(), "expected protected for {truthy}");
        }
        for falsy in [json!(false), json!("F"), json!(""), json!(0)] {
            let w = PricingWebhook {
                custitem_opms_protected: Some(falsy.clone()),
                ..Default::default()
            };
            assert!(!w.is_protected(), "expected unprotected for {falsy}");
        }
    }

    #[test]
    fn unknown_erp_fields_are_ignored() {
        let w: PricingWebhook = serde_json::from_value(json!({
            "itemid": "1354-6543",
            "internalid": "991",
            "displayname": "Tranquil: Ash",
            "custitem_something_else": 42,
            "baseprice": "129.99"
        }))
        .unwrap();
        assert_eq!(w.itemid.as_deref(), Some("1354-6543"));
        assert_eq!(w.baseprice, Some(json!("129.99")));
    }
}
