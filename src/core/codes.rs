//! Code lists referenced by the document model.
//!
//! Each list is a subset of the full code list, covering the values used
//! in European e-invoicing. All lists are sorted for binary search.

/// Check whether `code` is a known ISO 4217 currency code.
pub fn is_known_currency_code(code: &str) -> bool {
    CURRENCY_CODES.binary_search(&code).is_ok()
}

/// Check whether `code` is a known UN/CEFACT Rec 20 (or Rec 21) unit code.
pub fn is_known_unit_code(code: &str) -> bool {
    UNIT_CODES.binary_search(&code).is_ok()
}

/// Check whether `code` is a UNTDID 4451 text subject qualifier allowed for BT-21.
pub fn is_known_note_subject_code(code: &str) -> bool {
    NOTE_SUBJECT_CODES.binary_search(&code).is_ok()
}

static CURRENCY_CODES: &[&str] = &[
    "AUD", "BGN", "BRL", "CAD", "CHF", "CNY", "CZK", "DKK", "EUR", "GBP", "HKD", "HUF", "ILS",
    "INR", "ISK", "JPY", "KRW", "MXN", "NOK", "NZD", "PLN", "RON", "SEK", "SGD", "TRY", "UAH",
    "USD", "ZAR",
];

static UNIT_CODES: &[&str] = &[
    "C62", // One (piece/unit)
    "DAY", // Day
    "GRM", // Gram
    "H87", // Piece
    "HUR", // Hour
    "KGM", // Kilogram
    "KMT", // Kilometre
    "KWH", // Kilowatt-hour
    "LS",  // Lump sum
    "LTR", // Litre
    "MIN", // Minute
    "MON", // Month
    "MTK", // Square metre
    "MTQ", // Cubic metre
    "MTR", // Metre
    "P1",  // Percent
    "SET", // Set
    "TNE", // Tonne
    "WEE", // Week
    "XBX", // Box
    "XPK", // Package
    "XPP", // Piece (packaging)
];

static NOTE_SUBJECT_CODES: &[&str] = &[
    "AAB", // Terms of payments
    "AAI", // General information
    "AAK", // Price conditions
    "ABL", // Legal information
    "ACY", // Introduction
    "ADU", // Note
    "CUS", // Customs declaration information
    "PMD", // Payment detail/remittance information
    "PMT", // Payment information
    "REG", // Regulatory information
    "SUR", // Supplier remarks
    "TXD", // Tax declaration
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_codes() {
        assert!(is_known_currency_code("EUR"));
        assert!(is_known_unit_code("H87"));
        assert!(is_known_unit_code("C62"));
        assert!(is_known_note_subject_code("REG"));
    }

    #[test]
    fn unknown_codes() {
        assert!(!is_known_currency_code("EURO"));
        assert!(!is_known_currency_code(""));
        assert!(!is_known_unit_code("PIECE"));
        assert!(!is_known_note_subject_code("reg"));
    }

    #[test]
    fn lists_are_sorted() {
        for list in [CURRENCY_CODES, UNIT_CODES, NOTE_SUBJECT_CODES] {
            for window in list.windows(2) {
                assert!(window[0] < window[1], "{} >= {}", window[0], window[1]);
            }
        }
    }
}
