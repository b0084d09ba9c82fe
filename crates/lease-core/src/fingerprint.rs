//! Contract fingerprint codec.
//!
//! A fingerprint is the canonical one-line summary of a rental contract and
//! the pre-image of its on-chain hash:
//!
//! ```text
//! Landlord: {name} | Tenant: {name} | Unit: {info} | From: {date} | To: {date} | Rent: {number}
//! ```
//!
//! Serialization is byte-exact (labels, order and separators are part of the
//! hash). Parsing is lenient and never fails: unknown segments are ignored and
//! missing or empty fields become [`NOT_AVAILABLE`]. When a label repeats, the
//! last occurrence wins, even if it is empty.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Placeholder for any field the parser could not recover.
pub const NOT_AVAILABLE: &str = "N/A";

/// Date format used by the `From` and `To` fields.
pub const DATE_FORMAT: &str = "%d/%m/%Y";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fingerprint {
    pub landlord_name: String,
    pub tenant_name: String,
    pub unit_info: String,
    pub period_from: String,
    pub period_to: String,
    pub rent: String,
}

impl Fingerprint {
    pub fn new(
        landlord_name: impl Into<String>,
        tenant_name: impl Into<String>,
        unit_info: impl Into<String>,
        period_from: impl Into<String>,
        period_to: impl Into<String>,
        rent: impl Into<String>,
    ) -> Self {
        Self {
            landlord_name: landlord_name.into(),
            tenant_name: tenant_name.into(),
            unit_info: unit_info.into(),
            period_from: period_from.into(),
            period_to: period_to.into(),
            rent: rent.into(),
        }
    }

    /// Canonical text form. Any change here breaks every committed hash.
    pub fn serialize(&self) -> String {
        format!(
            "Landlord: {} | Tenant: {} | Unit: {} | From: {} | To: {} | Rent: {}",
            self.landlord_name,
            self.tenant_name,
            self.unit_info,
            self.period_from,
            self.period_to,
            self.rent
        )
    }

    pub fn parse(text: &str) -> Self {
        let mut parsed = Self::new(
            NOT_AVAILABLE,
            NOT_AVAILABLE,
            NOT_AVAILABLE,
            NOT_AVAILABLE,
            NOT_AVAILABLE,
            NOT_AVAILABLE,
        );

        for segment in text.split('|') {
            let Some((key, value)) = segment.split_once(':') else {
                continue;
            };
            let slot = match key.trim().to_lowercase().as_str() {
                "landlord" => &mut parsed.landlord_name,
                "tenant" => &mut parsed.tenant_name,
                "unit" => &mut parsed.unit_info,
                "from" => &mut parsed.period_from,
                "to" => &mut parsed.period_to,
                "rent" => &mut parsed.rent,
                _ => continue,
            };
            let value = value.trim();
            *slot = if value.is_empty() {
                NOT_AVAILABLE.to_string()
            } else {
                value.to_string()
            };
        }

        parsed
    }

    /// Re-derive the fingerprint from authoritative landlord and unit records,
    /// keeping the tenant, period and rent as originally submitted.
    pub fn corrected(&self, landlord_name: &str, official_unit_info: &str) -> Self {
        Self {
            landlord_name: landlord_name.to_string(),
            unit_info: official_unit_info.to_string(),
            ..self.clone()
        }
    }

    /// Leading comma-separated segment of the unit text, e.g. `"279/19"` for
    /// `"279/19, Sukhumvit 72, Samut Prakan"`.
    pub fn unit_number_hint(&self) -> &str {
        leading_segment(&self.unit_info)
    }

    /// Rental period as calendar dates, when both ends parse.
    pub fn period(&self) -> Option<(NaiveDate, NaiveDate)> {
        let from = NaiveDate::parse_from_str(&self.period_from, DATE_FORMAT).ok()?;
        let to = NaiveDate::parse_from_str(&self.period_to, DATE_FORMAT).ok()?;
        Some((from, to))
    }

    pub fn has_missing_fields(&self) -> bool {
        [
            &self.landlord_name,
            &self.tenant_name,
            &self.unit_info,
            &self.period_from,
            &self.period_to,
            &self.rent,
        ]
        .iter()
        .any(|f| f.as_str() == NOT_AVAILABLE)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.serialize())
    }
}

pub(crate) fn leading_segment(text: &str) -> &str {
    text.split(',').next().unwrap_or("").trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Fingerprint {
        Fingerprint::new(
            "Somchai Jaidee",
            "Sai Khant",
            "279/19, UNIO Sukhumvit 72, Samut Prakan",
            "16/11/2024",
            "15/11/2025",
            "8000",
        )
    }

    #[test]
    fn test_serialize_exact_format() {
        assert_eq!(
            sample().serialize(),
            "Landlord: Somchai Jaidee | Tenant: Sai Khant | Unit: 279/19, UNIO Sukhumvit 72, Samut Prakan | From: 16/11/2024 | To: 15/11/2025 | Rent: 8000"
        );
    }

    #[test]
    fn test_round_trip() {
        let fp = sample();
        assert_eq!(Fingerprint::parse(&fp.serialize()), fp);

        let sparse = Fingerprint::new("A", "B", "Room 1", "01/01/2025", "31/12/2025", "12500.50");
        assert_eq!(Fingerprint::parse(&sparse.serialize()), sparse);
    }

    #[test]
    fn test_parse_is_case_insensitive_and_trims() {
        let fp = Fingerprint::parse("  LANDLORD :  Jane Doe |tenant:John| Rent:  900 ");
        assert_eq!(fp.landlord_name, "Jane Doe");
        assert_eq!(fp.tenant_name, "John");
        assert_eq!(fp.rent, "900");
        assert_eq!(fp.unit_info, NOT_AVAILABLE);
        assert!(fp.has_missing_fields());
    }

    #[test]
    fn test_parse_splits_on_first_colon_only() {
        let fp = Fingerprint::parse("Unit: Tower B: 12/F | From: 01/02/2025");
        assert_eq!(fp.unit_info, "Tower B: 12/F");
        assert_eq!(fp.period_from, "01/02/2025");
    }

    #[test]
    fn test_parse_never_fails() {
        let fp = Fingerprint::parse("");
        assert_eq!(fp.landlord_name, NOT_AVAILABLE);
        assert_eq!(fp.rent, NOT_AVAILABLE);

        let fp = Fingerprint::parse("garbage without separators | Colour: blue | Tenant:");
        assert_eq!(fp.tenant_name, NOT_AVAILABLE);
        assert_eq!(fp.landlord_name, NOT_AVAILABLE);
    }

    #[test]
    fn test_parse_later_empty_label_overrides_earlier_value() {
        let fp = Fingerprint::parse("Tenant: A | Rent: 900 | Tenant:   ");
        assert_eq!(fp.tenant_name, NOT_AVAILABLE);
        assert_eq!(fp.rent, "900");

        let fp = Fingerprint::parse("Tenant: | Tenant: B");
        assert_eq!(fp.tenant_name, "B");
    }

    #[test]
    fn test_corrected_keeps_tenant_terms() {
        let corrected = sample().corrected("Somchai Jaidee", "279/19, 285 Soi Sukhumvit 72, Samut Prakan");
        assert_eq!(corrected.tenant_name, "Sai Khant");
        assert_eq!(corrected.period_from, "16/11/2024");
        assert_eq!(corrected.rent, "8000");
        assert_eq!(corrected.unit_info, "279/19, 285 Soi Sukhumvit 72, Samut Prakan");
    }

    #[test]
    fn test_unit_number_hint_and_period() {
        let fp = sample();
        assert_eq!(fp.unit_number_hint(), "279/19");
        let (from, to) = fp.period().unwrap();
        assert!(from < to);

        let fp = Fingerprint::parse("From: 2024-11-16 | To: 15/11/2025");
        assert!(fp.period().is_none());
    }
}
