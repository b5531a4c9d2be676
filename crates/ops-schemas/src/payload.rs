//! The ERP upsert wire schema.
//!
//! Field names here are the canonical endpoint keys; serde renames map the
//! Rust names onto them exactly. Optionality is explicit: `Option` fields
//! are dropped from the serialized body when `None` (the endpoint rejects
//! literal nulls), while fields that render in the ERP mini-form carry the
//! sentinel `" - "` instead of going missing.

use serde::{Deserialize, Serialize};

/// Projected for every empty source field so the ERP UI shows a visible dash.
pub const SENTINEL: &str = " - ";

// ---------------------------------------------------------------------------
// ErpUpsertPayload
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErpUpsertPayload {
    /// External item code, the single identity field. Max 40 chars.
    #[serde(rename = "itemId")]
    pub item_id: String,

    /// Max 20 chars; a 10-digit numeric fallback when the source is empty.
    #[serde(rename = "upcCode")]
    pub upc_code: String,

    #[serde(rename = "taxScheduleId")]
    pub tax_schedule_id: String,

    /// `"<product_name>: <color_name>"`.
    #[serde(rename = "displayName")]
    pub display_name: String,

    pub description: String,
    #[serde(rename = "purchaseDescription")]
    pub purchase_description: String,
    #[serde(rename = "salesDescription")]
    pub sales_description: String,

    /// ERP vendor internal id. Omitted entirely when the mapper has no
    /// trustworthy mapping — never serialized as null.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vendor: Option<i64>,

    pub custitem_opms_prod_id: i64,
    pub custitem_opms_item_id: i64,
    pub custitem_opms_parent_product_name: String,

    #[serde(rename = "fabricWidth")]
    pub fabric_width: String,
    pub custitem_vertical_repeat: String,
    pub custitem_horizontal_repeat: String,
    /// True when either repeat is present.
    pub custitem_is_repeat: bool,

    pub custitem_opms_item_colors: String,
    pub finish: String,
    pub cleaning: String,
    pub origin: String,
    pub custitem_item_application: String,

    /// Tri-state: "Yes" | "No" | " - ".
    pub custitem_prop65_compliance: String,
    pub custitem_ab2998_compliance: String,

    pub custitem_tariff_harmonized_code: String,

    pub custitem_opms_front_content: String,
    pub custitem_opms_back_content: String,
    pub custitem_opms_abrasion: String,
    pub custitem_opms_firecodes: String,

    /// Serialized `ValidationSummary` counts.
    pub custitem_opms_field_validation_summary: String,

    // Fixed ERP constants, present on every payload with these exact types.
    pub usebins: bool,
    pub matchbilltoreceipt: bool,
    pub custitem_aln_1_auto_numbered: bool,
    pub unitstype: i64,
    pub custitem_aln_2_number_format: i64,
    pub custitem_aln_3_initial_sequence: i64,
}

// ---------------------------------------------------------------------------
// ErpUpsertResponse
// ---------------------------------------------------------------------------

/// Structured endpoint response. A 2xx body can still carry
/// `success = false` plus an `error` payload; callers must treat that as a
/// semantic rejection, not a success.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErpUpsertResponse {
    pub success: bool,
    /// ERP-assigned internal id of the created/updated item.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "itemId", default, skip_serializing_if = "Option::is_none")]
    pub item_id: Option<String>,
    /// "create" | "update".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operation: Option<String>,
    /// Opaque error body on semantic failure; shape varies by script version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<serde_json::Value>,
}

impl ErpUpsertResponse {
    /// True when the endpoint reported success and no error field is set.
    pub fn is_success(&self) -> bool {
        self.success && self.error.is_none()
    }

    pub fn error_text(&self) -> Option<String> {
        self.error.as_ref().map(|e| match e {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        })
    }
}
