//! ops-payload
//!
//! Deterministic mapping from a validated extraction to the ERP upsert
//! payload. Pure logic, no IO, no timestamps, no randomness: the same
//! input always serializes to the same bytes, which is what makes
//! re-dispatch of an unchanged item idempotent on the wire.

use ops_extract::ValidatedItem;
use ops_schemas::{ErpUpsertPayload, SENTINEL};

// Fixed ERP constants carried on every payload, with their exact types.
pub const USE_BINS: bool = true;
pub const MATCH_BILL_TO_RECEIPT: bool = true;
pub const AUTO_NUMBERED: bool = true;
pub const UNITS_TYPE: i64 = 2;
pub const NUMBER_FORMAT: i64 = 1;
pub const INITIAL_SEQUENCE: i64 = 1;

/// Max lengths enforced by the endpoint.
const MAX_ITEM_ID_LEN: usize = 40;
const MAX_UPC_LEN: usize = 20;

/// Map an OPMS tri-state compliance flag to the ERP spelling.
///
/// 'Y' → "Yes", 'N' → "No"; 'D' (deferred) and null both render as the
/// sentinel so the ERP form shows a dash rather than a stale answer.
pub fn compliance_label(raw: Option<&str>) -> String {
    match raw.map(str::trim) {
        Some("Y") => "Yes".to_string(),
        Some("N") => "No".to_string(),
        _ => SENTINEL.to_string(),
    }
}

/// UPC fallback: a stable 10-digit numeric derived from the item id when
/// the source UPC is empty.
pub fn upc_or_fallback(upc: Option<&str>, item_id: i64) -> String {
    match upc.map(str::trim) {
        Some(s) if !s.is_empty() => truncate(s, MAX_UPC_LEN),
        _ => format!("{item_id:010}"),
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        s.to_string()
    } else {
        s.chars().take(max).collect()
    }
}

/// Build the upsert payload for one validated item.
///
/// The item code is the single identity field and is never prefixed in
/// sync context. The vendor key is populated only when the mapper produced
/// a trustworthy id; `None` stays absent on the wire. Pricing never
/// appears here — the ERP owns price.
pub fn build(item: &ValidatedItem, tax_schedule_id: &str) -> ErpUpsertPayload {
    let display_name = format!("{}: {}", item.product_name, item.color_names);

    ErpUpsertPayload {
        item_id: truncate(&item.code, MAX_ITEM_ID_LEN),
        upc_code: upc_or_fallback(item.upc.as_deref(), item.item_id),
        tax_schedule_id: tax_schedule_id.to_string(),
        display_name,
        description: item.sales_description.clone(),
        purchase_description: item.purchase_description.clone(),
        sales_description: item.sales_description.clone(),
        vendor: item.erp_vendor_id,
        custitem_opms_prod_id: item.product_id,
        custitem_opms_item_id: item.item_id,
        custitem_opms_parent_product_name: item.product_name.clone(),
        fabric_width: item.width.clone(),
        custitem_vertical_repeat: item.vertical_repeat.clone(),
        custitem_horizontal_repeat: item.horizontal_repeat.clone(),
        custitem_is_repeat: item.is_repeat,
        custitem_opms_item_colors: item.color_names.clone(),
        finish: item.finish.clone(),
        cleaning: item.cleaning.clone(),
        origin: item.origin.clone(),
        custitem_item_application: item.application.clone(),
        custitem_prop65_compliance: compliance_label(item.prop_65.as_deref()),
        custitem_ab2998_compliance: compliance_label(item.ab_2998.as_deref()),
        custitem_tariff_harmonized_code: item.tariff_code.clone(),
        custitem_opms_front_content: item.front_content.clone(),
        custitem_opms_back_content: item.back_content.clone(),
        custitem_opms_abrasion: item.abrasion.clone(),
        custitem_opms_firecodes: item.firecodes.clone(),
        custitem_opms_field_validation_summary: item.summary.wire_string(),
        usebins: USE_BINS,
        matchbilltoreceipt: MATCH_BILL_TO_RECEIPT,
        custitem_aln_1_auto_numbered: AUTO_NUMBERED,
        unitstype: UNITS_TYPE,
        custitem_aln_2_number_format: NUMBER_FORMAT,
        custitem_aln_3_initial_sequence: INITIAL_SEQUENCE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ops_extract::{validate, ExtractedItem};

    fn tranquil_ash() -> ExtractedItem {
        ExtractedItem {
            item_id: 43992,
            product_id: 1204,
            code: "1354-6543".to_string(),
            product_type: "R".to_string(),
            product_name: Some("Tranquil".to_string()),
            color_names: vec!["Ash".to_string()],
            width: Some(54.0),
            vertical_repeat: Some(12.5),
            horizontal_repeat: Some(8.25),
            prop_65: Some("Y".to_string()),
            ab_2998: Some("N".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn happy_path_payload() {
        let v = validate(&tranquil_ash());
        let p = build(&v, "2");
        assert_eq!(p.item_id, "1354-6543");
        assert_eq!(p.display_name, "Tranquil: Ash");
        assert_eq!(p.custitem_prop65_compliance, "Yes");
        assert_eq!(p.custitem_ab2998_compliance, "No");
        assert!(p.custitem_is_repeat);
        assert!(p.usebins);
        assert_eq!(p.unitstype, 2);
        assert_eq!(p.custitem_aln_3_initial_sequence, 1);
    }

    #[test]
    fn compliance_tri_state_table() {
        assert_eq!(compliance_label(Some("Y")), "Yes");
        assert_eq!(compliance_label(Some("N")), "No");
        assert_eq!(compliance_label(Some("D")), SENTINEL);
        assert_eq!(compliance_label(None), SENTINEL);
    }

    #[test]
    fn empty_fields_serialize_as_sentinel_never_null() {
        let mut item = tranquil_ash();
        item.finish = None;
        item.tariff_code = None;
        let p = build(&validate(&item), "2");
        let v = serde_json::to_value(&p).unwrap();
        assert_eq!(v["finish"], SENTINEL);
        assert_eq!(v["custitem_tariff_harmonized_code"], SENTINEL);
        // No nulls anywhere in the serialized body.
        for (k, val) in v.as_object().unwrap() {
            assert!(!val.is_null(), "null leaked for key {k}");
        }
    }

    #[test]
    fn upc_falls_back_to_ten_digit_numeric() {
        assert_eq!(upc_or_fallback(None, 43992), "0000043992");
        assert_eq!(upc_or_fallback(Some("  "), 7), "0000000007");
        assert_eq!(upc_or_fallback(Some("036000291452"), 1), "036000291452");
        // over-long UPCs are clipped to the endpoint max
        let long = "123456789012345678901234";
        assert_eq!(upc_or_fallback(Some(long), 1).len(), 20);
    }

    #[test]
    fn builds_are_byte_for_byte_deterministic() {
        let v = validate(&tranquil_ash());
        let a = serde_json::to_vec(&build(&v, "2")).unwrap();
        let b = serde_json::to_vec(&build(&v, "2")).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn vendor_absent_when_unmapped_present_when_mapped() {
        let mut item = tranquil_ash();
        item.erp_vendor_id = None;
        let v = serde_json::to_value(build(&validate(&item), "2")).unwrap();
        assert!(v.get("vendor").is_none());

        item.erp_vendor_id = Some(812);
        let v = serde_json::to_value(build(&validate(&item), "2")).unwrap();
        assert_eq!(v["vendor"], 812);
    }

    #[test]
    fn no_pricing_keys_on_sync_payloads() {
        let v = serde_json::to_value(build(&validate(&tranquil_ash()), "2")).unwrap();
        for k in v.as_object().unwrap().keys() {
            let lower = k.to_lowercase();
            assert!(
                !lower.contains("price") && !lower.contains("cost"),
                "pricing key {k} must not appear in sync payloads"
            );
        }
    }
}
