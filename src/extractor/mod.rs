//! Message extractor: turns one raw chat message into a structured candidate
//! transaction. Pure and deterministic; every parse failure degrades to an
//! empty field or a zero amount instead of an error.

use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use std::str::FromStr;

/// Candidate transaction extracted from free text. A candidate missing the
/// txn id or the call sign is incomplete and must not reach the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionCandidate {
    pub provider_txn_id: Option<String>,
    pub callsign: Option<String>,
    pub gross_amount: Decimal,
    pub confirmed: bool,
}

impl TransactionCandidate {
    pub fn is_complete(&self) -> bool {
        self.confirmed && self.provider_txn_id.is_some() && self.callsign.is_some()
    }

    fn unconfirmed() -> Self {
        Self {
            provider_txn_id: None,
            callsign: None,
            gross_amount: Decimal::ZERO,
            confirmed: false,
        }
    }
}

static AMOUNT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"🇺🇿\s*([^\n]+)").expect("amount regex"));
static RECEIPT_ID_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"🧾\s*(\d+)").expect("receipt regex"));
static FALLBACK_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"🆔\s*([0-9a-fA-F]+)").expect("fallback id regex"));
static NON_NUMERIC_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\d,.]").expect("strip regex"));

/// Call-sign label variants in priority order: long-form labeled variants
/// before short-form. First match wins.
static CALLSIGN_RES: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)🔸\s*Id водителя:\s*([0-9A-Za-z\-]+)",
        r"(?i)🔸\s*ID водителя:\s*([0-9A-Za-z\-]+)",
        r"(?i)🔸\s*Позывной водителя:\s*([0-9A-Za-z\-]+)",
        r"(?i)🔸\s*Позывной:\s*([0-9A-Za-z\-]+)",
        r"(?i)ID водителя:\s*([0-9A-Za-z\-]+)",
        r"(?i)Позывной водителя:\s*([0-9A-Za-z\-]+)",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("callsign regex"))
    .collect()
});

/// Extract a candidate transaction from one raw message. Without the
/// confirmation marker the candidate is unconfirmed and otherwise empty.
pub fn extract(text: &str) -> TransactionCandidate {
    if !is_confirmed(text) {
        return TransactionCandidate::unconfirmed();
    }

    TransactionCandidate {
        provider_txn_id: parse_provider_txn_id(text),
        callsign: parse_callsign(text),
        gross_amount: parse_amount(text),
        confirmed: true,
    }
}

fn is_confirmed(text: &str) -> bool {
    text.contains("Успешно оплачен")
        || (text.contains("Успешно") && text.contains("оплачен"))
}

/// The numeric receipt id takes priority; the alphanumeric id is a fallback
/// used only when the receipt pattern yields nothing.
fn parse_provider_txn_id(text: &str) -> Option<String> {
    RECEIPT_ID_RE
        .captures(text)
        .or_else(|| FALLBACK_ID_RE.captures(text))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

fn parse_callsign(text: &str) -> Option<String> {
    CALLSIGN_RES
        .iter()
        .find_map(|re| re.captures(text))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
}

fn parse_amount(text: &str) -> Decimal {
    let Some(caps) = AMOUNT_RE.captures(text) else {
        return Decimal::ZERO;
    };
    let raw = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
    normalize_decimal(raw)
}

/// Strip everything but digits, commas and periods, then decide which
/// separator (if any) is the decimal mark: the last one, when at most two
/// digits follow it. Everything else is a thousands separator.
fn normalize_decimal(raw: &str) -> Decimal {
    let clean = NON_NUMERIC_RE.replace_all(raw, "");
    if clean.is_empty() {
        return Decimal::ZERO;
    }

    let last_sep = clean.rfind(|c| c == ',' || c == '.');
    let canonical = match last_sep {
        Some(pos) if clean.len() - pos - 1 <= 2 => {
            let int_part: String = clean[..pos].chars().filter(char::is_ascii_digit).collect();
            format!("{int_part}.{}", &clean[pos + 1..])
        }
        _ => clean.chars().filter(char::is_ascii_digit).collect(),
    };

    Decimal::from_str(&canonical).unwrap_or(Decimal::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const CONFIRMED: &str = "✅ Успешно оплачен";

    #[test]
    fn unconfirmed_message_yields_empty_candidate() {
        let candidate = extract("🧾 998877\n🔸 Позывной: AB-123\n🇺🇿 1,000.00");
        assert!(!candidate.confirmed);
        assert!(candidate.provider_txn_id.is_none());
        assert!(candidate.callsign.is_none());
        assert_eq!(candidate.gross_amount, Decimal::ZERO);
        assert!(!candidate.is_complete());
    }

    #[test]
    fn full_message_extracts_every_field() {
        let text = format!("{CONFIRMED}\n🧾 998877\n🔸 Позывной: AB-123\n🇺🇿 1,000.00 сум");
        let candidate = extract(&text);
        assert!(candidate.confirmed);
        assert_eq!(candidate.provider_txn_id.as_deref(), Some("998877"));
        assert_eq!(candidate.callsign.as_deref(), Some("AB-123"));
        assert_eq!(candidate.gross_amount, dec!(1000.00));
        assert!(candidate.is_complete());
    }

    #[test]
    fn receipt_id_takes_priority_over_fallback() {
        let text = format!("{CONFIRMED}\n🆔 deadbeef\n🧾 42");
        assert_eq!(extract(&text).provider_txn_id.as_deref(), Some("42"));
    }

    #[test]
    fn fallback_id_used_when_receipt_absent() {
        let text = format!("{CONFIRMED}\n🆔 deadBEEF01");
        assert_eq!(extract(&text).provider_txn_id.as_deref(), Some("deadBEEF01"));
    }

    #[test]
    fn no_id_patterns_leaves_txn_id_absent() {
        let text = format!("{CONFIRMED}\nникаких идентификаторов");
        assert!(extract(&text).provider_txn_id.is_none());
    }

    #[test]
    fn callsign_label_variants_in_priority_order() {
        let long_form = format!("{CONFIRMED}\n🔸 Id водителя: XY-9\nПозывной водителя: ZZ-1");
        assert_eq!(extract(&long_form).callsign.as_deref(), Some("XY-9"));

        let short_form = format!("{CONFIRMED}\n🔸 Позывной: AB-123");
        assert_eq!(extract(&short_form).callsign.as_deref(), Some("AB-123"));

        let bare = format!("{CONFIRMED}\nID водителя: QQ-7");
        assert_eq!(extract(&bare).callsign.as_deref(), Some("QQ-7"));
    }

    #[test]
    fn amount_normalizes_thousands_and_decimal_marks() {
        for (raw, expected) in [
            ("1,234.50", dec!(1234.50)),
            ("1234,50", dec!(1234.50)),
            ("1 000 000,25", dec!(1000000.25)),
            ("1.234.567", dec!(1234567)),
            ("1000", dec!(1000)),
            ("1000.5", dec!(1000.5)),
        ] {
            let text = format!("{CONFIRMED}\n🇺🇿 {raw} сум");
            assert_eq!(extract(&text).gross_amount, expected, "raw amount {raw:?}");
        }
    }

    #[test]
    fn unparseable_amount_degrades_to_zero() {
        for raw in ["", "сум", "...", ",,"] {
            let text = format!("{CONFIRMED}\n🇺🇿 {raw}");
            assert_eq!(extract(&text).gross_amount, Decimal::ZERO, "raw amount {raw:?}");
        }
    }

    #[test]
    fn extraction_is_deterministic() {
        let text = format!("{CONFIRMED}\n🧾 1\n🔸 Позывной: A-1\n🇺🇿 10,00");
        assert_eq!(extract(&text), extract(&text));
    }
}
