//! Enqueue-time admission rules.
//!
//! Pure decisions: given what we know about an item and the trigger path,
//! either admit it to the queue or name the rejection. The digital block is
//! absolute; the code-format rule yields to manual triggers; the config
//! gate yields to manual triggers carrying the override flag.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueRejection {
    /// product_type 'D' or code containing "digital". Never bypassable.
    DigitalItem,
    /// Code does not match `NNNN-NNNN[A]?` (non-manual paths only).
    BadCodeFormat,
    /// Sync globally disabled and no manual override.
    SyncDisabled,
}

impl EnqueueRejection {
    pub fn message(&self) -> &'static str {
        match self {
            EnqueueRejection::DigitalItem => "Digital item is excluded from sync",
            EnqueueRejection::BadCodeFormat => "Item code does not match NNNN-NNNN format",
            EnqueueRejection::SyncDisabled => "Sync disabled by configuration",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueDecision {
    Admit,
    Reject(EnqueueRejection),
}

/// `NNNN-NNNN` with an optional trailing letter.
pub fn code_matches_format(code: &str) -> bool {
    let bytes = code.as_bytes();
    if bytes.len() != 9 && bytes.len() != 10 {
        return false;
    }
    let digits_ok = bytes[0..4].iter().all(u8::is_ascii_digit)
        && bytes[4] == b'-'
        && bytes[5..9].iter().all(u8::is_ascii_digit);
    if !digits_ok {
        return false;
    }
    if bytes.len() == 10 {
        return bytes[9].is_ascii_alphabetic();
    }
    true
}

/// The digital-item classifier: product_type or code substring.
pub fn is_digital(product_type: &str, code: &str) -> bool {
    product_type == "D" || code.to_lowercase().contains("digital")
}

/// Admission decision for one item on one trigger path.
///
/// `manual` marks a manual trigger (bypasses the format rule);
/// `config_override` only matters on manual paths; `sync_enabled` is the
/// gate's current answer.
pub fn admit(
    product_type: &str,
    code: &str,
    manual: bool,
    config_override: bool,
    sync_enabled: bool,
) -> EnqueueDecision {
    if is_digital(product_type, code) {
        return EnqueueDecision::Reject(EnqueueRejection::DigitalItem);
    }
    if !manual && !code_matches_format(code) {
        return EnqueueDecision::Reject(EnqueueRejection::BadCodeFormat);
    }
    if !sync_enabled && !(manual && config_override) {
        return EnqueueDecision::Reject(EnqueueRejection::SyncDisabled);
    }
    EnqueueDecision::Admit
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_format_accepts_plain_and_suffixed() {
        assert!(code_matches_format("1354-6543"));
        assert!(code_matches_format("0001-0002A"));
        assert!(code_matches_format("9999-9999z"));
    }

    #[test]
    fn code_format_rejects_malformed() {
        for bad in [
            "1354-654",
            "1354-65432",
            "13546543",
            "135-46543",
            "abcd-efgh",
            "1354-6543AB",
            "1354_6543",
            "",
        ] {
            assert!(!code_matches_format(bad), "{bad} should be rejected");
        }
    }

    #[test]
    fn digital_by_type_or_code_substring() {
        assert!(is_digital("D", "1354-6543"));
        assert!(is_digital("R", "DIGITAL-01"));
        assert!(is_digital("R", "my-digital-proof"));
        assert!(!is_digital("R", "1354-6543"));
    }

    #[test]
    fn digital_block_is_never_bypassed() {
        let d = admit("D", "1354-6543", true, true, true);
        assert_eq!(d, EnqueueDecision::Reject(EnqueueRejection::DigitalItem));
    }

    #[test]
    fn manual_bypasses_format_but_not_polling() {
        assert_eq!(admit("R", "WEIRD-CODE", true, false, true), EnqueueDecision::Admit);
        assert_eq!(
            admit("R", "WEIRD-CODE", false, false, true),
            EnqueueDecision::Reject(EnqueueRejection::BadCodeFormat)
        );
    }

    #[test]
    fn gate_yields_only_to_manual_override() {
        assert_eq!(
            admit("R", "1354-6543", false, false, false),
            EnqueueDecision::Reject(EnqueueRejection::SyncDisabled)
        );
        assert_eq!(
            admit("R", "1354-6543", true, false, false),
            EnqueueDecision::Reject(EnqueueRejection::SyncDisabled)
        );
        assert_eq!(admit("R", "1354-6543", true, true, false), EnqueueDecision::Admit);
    }
}
