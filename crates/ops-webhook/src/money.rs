//! Integer-cents money on the webhook apply surface.
//!
//! All pricing inside the applier is `i64` cents; `f64` appears only at the
//! two wire boundaries (parsing the ERP webhook value, binding the DB
//! column). This keeps comparisons and snapshots exact.

/// 1 price unit = 100 cents.
pub const CENTS_PER_UNIT: i64 = 100;

/// Upper bound of the accepted range: 999999.99.
pub const MAX_CENTS: i64 = 99_999_999;

/// Parse whatever the ERP script emitted into a price, if possible.
///
/// Accepts numbers and numeric strings (with optional surrounding spaces).
/// Everything else — null, empty string, booleans, objects — is
/// unparseable.
pub fn parse_price(v: &serde_json::Value) -> Option<f64> {
    match v {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => {
            let t = s.trim();
            if t.is_empty() {
                None
            } else {
                t.parse::<f64>().ok()
            }
        }
        _ => None,
    }
}

/// Sync-zero coercion: missing or non-parseable values become 0 cents, and
/// 0 is written like any other value — never treated as "unchanged".
/// Negative inputs also coerce to 0 (the range only admits non-negatives);
/// the caller records a warning.
pub fn coerce_cents(v: Option<&serde_json::Value>) -> (i64, bool) {
    let parsed = v.and_then(parse_price);
    match parsed {
        Some(p) if p.is_finite() && p > 0.0 => ((p * CENTS_PER_UNIT as f64).round() as i64, false),
        Some(p) if p.is_finite() && p < 0.0 => (0, true),
        Some(_) => (0, false), // exactly zero
        None => (0, false),
    }
}

/// Range rule: zero is always fine (sync-zero), positive values must land
/// in 0.01..=999999.99.
pub fn cents_in_range(cents: i64) -> bool {
    cents == 0 || (1..=MAX_CENTS).contains(&cents)
}

/// DB wire boundary.
pub fn cents_to_price(cents: i64) -> f64 {
    cents as f64 / CENTS_PER_UNIT as f64
}

/// DB ingest boundary (reading existing rows for the before snapshot).
pub fn price_to_cents(price: f64) -> Option<i64> {
    if !price.is_finite() {
        return None;
    }
    Some((price * CENTS_PER_UNIT as f64).round() as i64)
}
