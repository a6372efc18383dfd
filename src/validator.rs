//! GTIN format validation.
//!
//! A scan passes when it is exactly 12, 13 or 14 ASCII decimal digits
//! (GTIN-12 / GTIN-13 / GTIN-14).  The check digit is **not** verified;
//! the station only guards against misreads and foreign labels.

use core::fmt;

/// Shortest accepted GTIN (UPC-A).
pub const GTIN_MIN_LEN: usize = 12;
/// Longest accepted GTIN (GTIN-14 / ITF-14).
pub const GTIN_MAX_LEN: usize = 14;

/// Outcome of a single verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScanResult {
    Pass,
    Fail,
}

impl ScanResult {
    /// Wire token published on the result topic.
    pub const fn as_payload(self) -> &'static str {
        match self {
            Self::Pass => "PASS",
            Self::Fail => "FAIL",
        }
    }

    pub const fn is_pass(self) -> bool {
        matches!(self, Self::Pass)
    }
}

impl fmt::Display for ScanResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_payload())
    }
}

/// Validate a scanned barcode.
///
/// The whole string must match; no trimming happens here.
pub fn validate(barcode: &str) -> ScanResult {
    let len_ok = (GTIN_MIN_LEN..=GTIN_MAX_LEN).contains(&barcode.len());
    if len_ok && barcode.bytes().all(|b| b.is_ascii_digit()) {
        ScanResult::Pass
    } else {
        ScanResult::Fail
    }
}
