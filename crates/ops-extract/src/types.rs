//! The extraction result: everything the payload builder needs, with
//! optionality preserved exactly as it came out of the catalog.

use serde::{Deserialize, Serialize};

/// Pricing snapshot; extraction of these is off by default because the ERP
/// is the source of truth for price.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedPricing {
    pub customer_cut: Option<f64>,
    pub customer_roll: Option<f64>,
    pub vendor_cut: Option<f64>,
    pub vendor_roll: Option<f64>,
}

/// One fully-populated syncable item.
///
/// `None` means the catalog had nothing for that field (auxiliary queries
/// never fail an extraction). Multi-valued relations arrive as canonical
/// comma-separated text. `abrasion` is already cleaned of placeholder
/// tokens; `purchase_description` / `sales_description` are composed by the
/// extractor from the same parts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedItem {
    pub item_id: i64,
    pub product_id: i64,
    pub code: String,
    pub product_type: String,
    pub upc: Option<String>,

    pub product_name: Option<String>,
    pub width: Option<f64>,
    pub vertical_repeat: Option<f64>,
    pub horizontal_repeat: Option<f64>,

    pub color_names: Vec<String>,
    pub opms_vendor_id: Option<i64>,
    /// Present only when the vendor mapping passed name-equality.
    pub erp_vendor_id: Option<i64>,

    pub finish: Option<String>,
    pub cleaning: Option<String>,
    pub origin: Option<String>,
    pub application: Option<String>,

    /// Raw tri-state flags as stored: 'Y' / 'N' / 'D' / null.
    pub prop_65: Option<String>,
    pub ab_2998: Option<String>,
    pub tariff_code: Option<String>,

    pub front_content: Option<String>,
    pub back_content: Option<String>,
    pub abrasion: Option<String>,
    pub firecodes: Option<String>,

    pub pricing: Option<ExtractedPricing>,

    pub purchase_description: String,
    pub sales_description: String,
}
