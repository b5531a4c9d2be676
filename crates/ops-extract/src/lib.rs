//! ops-extract
//!
//! Extraction of one fully-populated item from the OPMS catalog: a single
//! master join plus auxiliary aggregations, a diagnostic follow-up when the
//! master join comes back empty, description composition, and the per-field
//! validator that projects empties to the ERP sentinel.

mod describe;
mod query;
mod types;
mod validator;

pub use describe::{clean_abrasion, purchase_description, sales_description, DescriptionParts};
pub use query::{diagnose_unsyncable, extract, ExtractOptions};
pub use types::{ExtractedItem, ExtractedPricing};
pub use validator::{classify_list, classify_number, classify_text, validate, Raw, ValidatedItem};

// ---------------------------------------------------------------------------
// Error kinds
// ---------------------------------------------------------------------------

/// Why an item can never sync in its current state. These end the job as a
/// skip, not a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotSyncableReason {
    MissingCode,
    ItemArchived,
    ProductArchived,
    NoColors,
    DigitalItem,
}

impl NotSyncableReason {
    /// Operator-facing message recorded in skip metadata.
    pub fn message(&self) -> &'static str {
        match self {
            NotSyncableReason::MissingCode => "Item has no external code",
            NotSyncableReason::ItemArchived => "Item is archived",
            NotSyncableReason::ProductArchived => "Parent product is archived",
            NotSyncableReason::NoColors => "No colors assigned",
            NotSyncableReason::DigitalItem => "Digital item is excluded from sync",
        }
    }
}

impl std::fmt::Display for NotSyncableReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message())
    }
}

/// Extraction failure surface. `NotSyncable` skips; the other two are
/// transient and retry under the dispatcher's backoff.
#[derive(Debug)]
pub enum ExtractError {
    NotSyncable(NotSyncableReason),
    /// Master join returned nothing and the diagnostic was inconclusive.
    NoRow { item_id: i64 },
    Db(anyhow::Error),
}

impl std::fmt::Display for ExtractError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExtractError::NotSyncable(r) => write!(f, "item not syncable: {r}"),
            ExtractError::NoRow { item_id } => {
                write!(f, "extraction returned no row for item {item_id} (no diagnostic)")
            }
            ExtractError::Db(e) => write!(f, "extraction query failed: {e}"),
        }
    }
}

impl std::error::Error for ExtractError {}

impl From<anyhow::Error> for ExtractError {
    fn from(e: anyhow::Error) -> Self {
        ExtractError::Db(e)
    }
}

impl ExtractError {
    pub fn is_transient(&self) -> bool {
        !matches!(self, ExtractError::NotSyncable(_))
    }
}
