//! Per-field classification and projection.
//!
//! Each logical field is classified as has_data / src_empty / query_failed
//! and projected to an ERP-safe string: real values pass through, empties
//! become the sentinel. The summary of the three counts travels with the
//! payload for auditability.
//!
//! `query_failed` marks a column that never arrived from the query layer —
//! in this typed pipeline that means an upstream wiring bug, so it is only
//! reachable through [`Raw::Missing`], which the extractor emits when a
//! try_get comes back as a decode error rather than a null.

use ops_schemas::{FieldState, ValidationSummary, SENTINEL};

use crate::ExtractedItem;

/// A field as it left the query layer.
#[derive(Debug, Clone)]
pub enum Raw<T> {
    /// The column itself failed to materialize.
    Missing,
    Value(Option<T>),
}

/// Classify one text field.
pub fn classify_text(v: &Raw<String>) -> FieldState {
    match v {
        Raw::Missing => FieldState::QueryFailed,
        Raw::Value(None) => FieldState::SrcEmpty,
        Raw::Value(Some(s)) if s.trim().is_empty() => FieldState::SrcEmpty,
        Raw::Value(Some(_)) => FieldState::HasData,
    }
}

/// Classify one numeric field.
pub fn classify_number(v: &Raw<f64>) -> FieldState {
    match v {
        Raw::Missing => FieldState::QueryFailed,
        Raw::Value(None) => FieldState::SrcEmpty,
        Raw::Value(Some(_)) => FieldState::HasData,
    }
}

/// Classify one collection field (empty collection = src_empty).
pub fn classify_list(v: &Raw<Vec<String>>) -> FieldState {
    match v {
        Raw::Missing => FieldState::QueryFailed,
        Raw::Value(None) => FieldState::SrcEmpty,
        Raw::Value(Some(xs)) if xs.is_empty() => FieldState::SrcEmpty,
        Raw::Value(Some(_)) => FieldState::HasData,
    }
}

// ---------------------------------------------------------------------------
// ValidatedItem
// ---------------------------------------------------------------------------

/// Projection of an [`ExtractedItem`] to ERP-safe values.
///
/// Every string here is ready to serialize: either real data or the
/// sentinel. Raw tri-state compliance flags stay raw — their mapping to
/// "Yes"/"No"/sentinel belongs to the payload builder.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedItem {
    pub item_id: i64,
    pub product_id: i64,
    pub code: String,
    pub upc: Option<String>,

    pub product_name: String,
    pub color_names: String,
    pub width: String,
    pub vertical_repeat: String,
    pub horizontal_repeat: String,
    pub is_repeat: bool,

    pub erp_vendor_id: Option<i64>,

    pub finish: String,
    pub cleaning: String,
    pub origin: String,
    pub application: String,

    pub prop_65: Option<String>,
    pub ab_2998: Option<String>,
    pub tariff_code: String,

    pub front_content: String,
    pub back_content: String,
    pub abrasion: String,
    pub firecodes: String,

    pub purchase_description: String,
    pub sales_description: String,

    pub summary: ValidationSummary,
}

struct Check<'s> {
    summary: &'s mut ValidationSummary,
}

impl Check<'_> {
    fn text(&mut self, v: &Option<String>) -> String {
        let raw = Raw::Value(v.clone());
        let state = classify_text(&raw);
        self.summary.count(state);
        match state {
            FieldState::HasData => v.as_deref().unwrap_or_default().trim().to_string(),
            _ => SENTINEL.to_string(),
        }
    }

    fn number(&mut self, v: Option<f64>) -> String {
        let raw = Raw::Value(v);
        let state = classify_number(&raw);
        self.summary.count(state);
        match state {
            FieldState::HasData => {
                let n = v.expect("has_data implies value");
                if n.fract() == 0.0 {
                    format!("{}", n as i64)
                } else {
                    format!("{n}")
                }
            }
            _ => SENTINEL.to_string(),
        }
    }

    fn list(&mut self, v: &[String]) -> String {
        let raw = Raw::Value(Some(v.to_vec()));
        let state = classify_list(&raw);
        self.summary.count(state);
        match state {
            FieldState::HasData => v.join(", "),
            _ => SENTINEL.to_string(),
        }
    }
}

/// Classify and project every payload-facing field of an extraction.
pub fn validate(item: &ExtractedItem) -> ValidatedItem {
    let mut summary = ValidationSummary::default();
    let mut check = Check {
        summary: &mut summary,
    };

    let product_name = check.text(&item.product_name);
    let color_names = check.list(&item.color_names);
    let width = check.number(item.width);
    let vertical_repeat = check.number(item.vertical_repeat);
    let horizontal_repeat = check.number(item.horizontal_repeat);
    let finish = check.text(&item.finish);
    let cleaning = check.text(&item.cleaning);
    let origin = check.text(&item.origin);
    let application = check.text(&item.application);
    let tariff_code = check.text(&item.tariff_code);
    let front_content = check.text(&item.front_content);
    let back_content = check.text(&item.back_content);
    let abrasion = check.text(&item.abrasion);
    let firecodes = check.text(&item.firecodes);

    ValidatedItem {
        item_id: item.item_id,
        product_id: item.product_id,
        code: item.code.clone(),
        upc: item.upc.clone(),
        product_name,
        color_names,
        width,
        vertical_repeat,
        horizontal_repeat,
        is_repeat: item.vertical_repeat.is_some() || item.horizontal_repeat.is_some(),
        erp_vendor_id: item.erp_vendor_id,
        finish,
        cleaning,
        origin,
        application,
        prop_65: item.prop_65.clone(),
        ab_2998: item.ab_2998.clone(),
        tariff_code,
        front_content,
        back_content,
        abrasion,
        firecodes,
        purchase_description: item.purchase_description.clone(),
        sales_description: item.sales_description.clone(),
        summary,
    }
}
