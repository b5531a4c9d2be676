//! Structural + numeric validation of an inbound pricing webhook.
//!
//! Pure: no database access. The guard flag is checked by the applier
//! because a protected skip is an outcome, not a validation failure.

use ops_schemas::PricingWebhook;

use crate::money::{cents_in_range, coerce_cents};
use crate::WebhookError;

/// Webhook pricing after coercion, in cents, plus any warnings gathered
/// along the way.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedPricing {
    pub erp_item_code: String,
    pub erp_internal_id: String,
    pub customer_cut_cents: i64,
    pub customer_roll_cents: i64,
    pub vendor_cut_cents: i64,
    pub vendor_roll_cents: i64,
    pub warnings: Vec<String>,
}

/// Validate structure and coerce the four pricing fields.
///
/// Rules:
/// - `itemid` and `internalid` must both be present and non-empty.
/// - Each price coerces under sync-zero; negatives coerce to 0 with a
///   warning.
/// - Positive values must land in 0.01..=999999.99 or the whole webhook is
///   rejected.
/// - Customer price ≤ vendor cost is a warning only, never a rejection.
pub fn validate_webhook(w: &PricingWebhook) -> Result<ValidatedPricing, WebhookError> {
    let erp_item_code = w
        .itemid
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| WebhookError::Invalid("missing itemid".to_string()))?
        .to_string();
    let erp_internal_id = w
        .internalid
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| WebhookError::Invalid("missing internalid".to_string()))?
        .to_string();

    let mut warnings = Vec::new();

    let mut take = |name: &str, v: Option<&serde_json::Value>| -> Result<i64, WebhookError> {
        let (cents, negative) = coerce_cents(v);
        if negative {
            warnings.push(format!("{name}: negative value coerced to 0"));
        }
        if !cents_in_range(cents) {
            return Err(WebhookError::Invalid(format!(
                "{name}: value out of range 0.01..999999.99"
            )));
        }
        Ok(cents)
    };

    let customer_cut_cents = take("customer cut price", w.baseprice.as_ref())?;
    let customer_roll_cents = take(
        "customer roll price",
        w.custitem_customer_roll_price.as_ref(),
    )?;
    let vendor_cut_cents = take("vendor cut cost", w.cost.as_ref())?;
    let vendor_roll_cents = take("vendor roll cost", w.custitem_vendor_roll_cost.as_ref())?;

    if customer_cut_cents > 0 && vendor_cut_cents > 0 && customer_cut_cents <= vendor_cut_cents {
        warnings.push("customer cut price does not exceed vendor cut cost".to_string());
    }
    if customer_roll_cents > 0 && vendor_roll_cents > 0 && customer_roll_cents <= vendor_roll_cents
    {
        warnings.push("customer roll price does not exceed vendor roll cost".to_string());
    }

    Ok(ValidatedPricing {
        erp_item_code,
        erp_internal_id,
        customer_cut_cents,
        customer_roll_cents,
        vendor_cut_cents,
        vendor_roll_cents,
        warnings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn webhook() -> PricingWebhook {
        serde_json::from_value(json!({
            "itemid": "1354-6543",
            "internalid": "991",
            "baseprice": "129.99",
            "custitem_customer_roll_price": 119.99,
            "cost": "54.25",
            "custitem_vendor_roll_cost": 49.00
        }))
        .unwrap()
    }

    #[test]
    fn valid_webhook_coerces_to_cents() {
        let v = validate_webhook(&webhook()).unwrap();
        assert_eq!(v.customer_cut_cents, 12_999);
        assert_eq!(v.customer_roll_cents, 11_999);
        assert_eq!(v.vendor_cut_cents, 5_425);
        assert_eq!(v.vendor_roll_cents, 4_900);
        assert!(v.warnings.is_empty());
    }

    #[test]
    fn missing_identity_is_rejected() {
        let mut w = webhook();
        w.itemid = None;
        assert!(matches!(
            validate_webhook(&w),
            Err(WebhookError::Invalid(msg)) if msg.contains("itemid")
        ));

        let mut w = webhook();
        w.internalid = Some("  ".to_string());
        assert!(matches!(
            validate_webhook(&w),
            Err(WebhookError::Invalid(msg)) if msg.contains("internalid")
        ));
    }

    #[test]
    fn unparseable_prices_sync_zero() {
        let mut w = webhook();
        w.baseprice = Some(json!("not a number"));
        w.cost = None;
        let v = validate_webhook(&w).unwrap();
        assert_eq!(v.customer_cut_cents, 0);
        assert_eq!(v.vendor_cut_cents, 0);
    }

    #[test]
    fn out_of_range_rejects_the_webhook() {
        let mut w = webhook();
        w.baseprice = Some(json!(1_000_000.00));
        assert!(matches!(
            validate_webhook(&w),
            Err(WebhookError::Invalid(msg)) if msg.contains("range")
        ));
    }

    #[test]
    fn price_not_above_cost_is_warning_only() {
        let mut w = webhook();
        w.baseprice = Some(json!(10.00));
        w.cost = Some(json!(54.25));
        let v = validate_webhook(&w).unwrap();
        assert_eq!(v.warnings.len(), 1);
        assert!(v.warnings[0].contains("customer cut"));
    }
}
