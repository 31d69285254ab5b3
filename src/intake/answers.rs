//! Answer store — flat accumulator for every collected field.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A recorded answer. Counts are numbers, everything else is text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnswerValue {
    Number(u64),
    Text(String),
}

impl AnswerValue {
    /// Text form, as it goes over the wire.
    pub fn as_wire(&self) -> String {
        match self {
            Self::Number(n) => n.to_string(),
            Self::Text(s) => s.clone(),
        }
    }
}

impl std::fmt::Display for AnswerValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => write!(f, "{s}"),
        }
    }
}

impl From<&str> for AnswerValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for AnswerValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<u64> for AnswerValue {
    fn from(n: u64) -> Self {
        Self::Number(n)
    }
}

impl From<usize> for AnswerValue {
    fn from(n: usize) -> Self {
        Self::Number(n as u64)
    }
}

/// Logical field names. Repeated entities get a zero-based index suffix via
/// [`indexed`].
pub mod fields {
    pub const ZIP: &str = "zip";
    pub const FIRST_NAME: &str = "firstName";
    pub const LAST_NAME: &str = "lastName";
    pub const DOB_MONTH: &str = "dobMonth";
    pub const DOB_DAY: &str = "dobDay";
    pub const DOB_YEAR: &str = "dobYear";
    pub const EMAIL: &str = "email";
    pub const PHONE: &str = "phone";
    pub const STREET: &str = "street";
    pub const CITY: &str = "city";
    pub const STATE: &str = "state";
    pub const HOME_STATUS: &str = "homeStatus";

    pub const VEHICLE_COUNT: &str = "vehicleCount";
    pub const VEHICLE_YEAR: &str = "vehicleYear";
    pub const VEHICLE_MAKE: &str = "vehicleMake";
    pub const VEHICLE_MODEL: &str = "vehicleModel";
    pub const VEHICLE_VIN: &str = "vehicleVin";
    pub const VEHICLE_COVERAGE: &str = "vehicleCoverage";
    pub const VEHICLE_DEDUCTIBLE: &str = "vehicleDeductible";

    pub const DRIVER_COUNT: &str = "driverCount";
    pub const DRIVER_FIRST: &str = "driverFirst";
    pub const DRIVER_LAST: &str = "driverLast";
    pub const DRIVER_DOB_MONTH: &str = "driverDobMonth";
    pub const DRIVER_DOB_DAY: &str = "driverDobDay";
    pub const DRIVER_DOB_YEAR: &str = "driverDobYear";
    pub const DRIVER_LICENSE: &str = "driverLicense";
    pub const DRIVER_GENDER: &str = "driverGender";
    pub const DRIVER_MARITAL: &str = "driverMarital";
    pub const DRIVER_VIOLATIONS: &str = "driverViolations";
    pub const DRIVER_DEFENSIVE: &str = "driverDefensive";

    pub const CURRENTLY_INSURED: &str = "currentlyInsured";
    pub const CURRENT_COMPANY: &str = "currentCompany";
    pub const CURRENT_DURATION: &str = "currentDuration";
    pub const CURRENT_PREMIUM: &str = "currentPremium";
    pub const BILLING_FREQ: &str = "billingFreq";
    pub const DESIRED_LIMITS: &str = "desiredLimits";

    /// Namespaced key for entity `index`, e.g. `indexed(VEHICLE_MAKE, 1)` →
    /// `"vehicleMake1"`.
    pub fn indexed(base: &str, index: usize) -> String {
        format!("{base}{index}")
    }
}

/// Flat key → value record of everything the user has answered.
///
/// Keys are only ever added or overwritten, never removed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnswerStore {
    values: BTreeMap<String, AnswerValue>,
}

impl AnswerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record (or overwrite) a field.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<AnswerValue>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&AnswerValue> {
        self.values.get(key)
    }

    /// Text view of a field; numbers are rendered, missing fields are empty.
    pub fn text(&self, key: &str) -> String {
        self.values.get(key).map(AnswerValue::as_wire).unwrap_or_default()
    }

    /// Numeric view of a count field. Missing or non-numeric → 0.
    pub fn count(&self, key: &str) -> usize {
        match self.values.get(key) {
            Some(AnswerValue::Number(n)) => *n as usize,
            Some(AnswerValue::Text(s)) => s.trim().parse().unwrap_or(0),
            None => 0,
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Every recorded field, ordered by key.
    pub fn get_all(&self) -> &BTreeMap<String, AnswerValue> {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::fields::*;
    use super::*;

    #[test]
    fn set_overwrites_without_removing() {
        let mut store = AnswerStore::new();
        store.set(FIRST_NAME, "Ada");
        store.set(LAST_NAME, "Lovelace");
        store.set(FIRST_NAME, "Grace");

        assert_eq!(store.len(), 2);
        assert_eq!(store.text(FIRST_NAME), "Grace");
        assert_eq!(store.text(LAST_NAME), "Lovelace");
    }

    #[test]
    fn indexed_keys_are_zero_based_suffixes() {
        assert_eq!(indexed(VEHICLE_MAKE, 0), "vehicleMake0");
        assert_eq!(indexed(DRIVER_LICENSE, 2), "driverLicense2");
    }

    #[test]
    fn count_reads_numbers_and_numeric_text() {
        let mut store = AnswerStore::new();
        assert_eq!(store.count(VEHICLE_COUNT), 0);

        store.set(VEHICLE_COUNT, 2usize);
        assert_eq!(store.count(VEHICLE_COUNT), 2);

        store.set(DRIVER_COUNT, "3");
        assert_eq!(store.count(DRIVER_COUNT), 3);

        store.set(DRIVER_COUNT, "many");
        assert_eq!(store.count(DRIVER_COUNT), 0);
    }

    #[test]
    fn missing_text_is_empty() {
        let store = AnswerStore::new();
        assert_eq!(store.text(CURRENT_COMPANY), "");
        assert!(!store.contains(CURRENT_COMPANY));
    }

    #[test]
    fn serializes_as_flat_map() {
        let mut store = AnswerStore::new();
        store.set(ZIP, "90210");
        store.set(DRIVER_COUNT, 2usize);

        let json = serde_json::to_value(&store).unwrap();
        assert_eq!(json, serde_json::json!({"zip": "90210", "driverCount": 2}));

        let parsed: AnswerStore = serde_json::from_value(json).unwrap();
        assert_eq!(parsed.get(DRIVER_COUNT), Some(&AnswerValue::Number(2)));
        assert_eq!(parsed.get(ZIP), Some(&AnswerValue::Text("90210".into())));
    }
}
