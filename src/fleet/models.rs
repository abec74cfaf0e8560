//! Wire types for the fleet platform API.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Driver-profiles search request body.
#[derive(Debug, Serialize)]
pub struct DriverSearchRequest {
    pub fields: SearchFields,
    pub query: SearchQuery,
    pub limit: u32,
}

#[derive(Debug, Serialize)]
pub struct SearchFields {
    pub driver_profile: Vec<&'static str>,
    pub car: Vec<&'static str>,
    pub accounts: Vec<&'static str>,
    pub current_status: Vec<&'static str>,
}

impl Default for SearchFields {
    fn default() -> Self {
        Self {
            driver_profile: vec!["id", "first_name", "last_name", "phones", "work_status"],
            car: vec![
                "brand", "model", "number", "color", "callsign", "category", "status", "year",
            ],
            accounts: vec!["balance", "currency", "id"],
            current_status: vec!["status"],
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SearchQuery {
    pub park: ParkRef,
    /// Free-text search; the platform matches it against callsigns among
    /// other driver attributes.
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct ParkRef {
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub struct DriverSearchResponse {
    #[serde(default)]
    pub driver_profiles: Vec<DriverEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DriverEntry {
    pub driver_profile: Option<DriverProfile>,
    pub car: Option<Car>,
    #[serde(default)]
    pub accounts: Vec<Account>,
}

impl DriverEntry {
    pub fn callsign(&self) -> Option<&str> {
        self.car.as_ref().and_then(|car| car.callsign.as_deref())
    }

    pub fn identity(&self) -> Option<DriverIdentity> {
        let profile = self.driver_profile.as_ref()?;
        let full_name = match (&profile.first_name, &profile.last_name) {
            (Some(first), Some(last)) => Some(format!("{first} {last}")),
            (Some(first), None) => Some(first.clone()),
            (None, Some(last)) => Some(last.clone()),
            (None, None) => None,
        };
        Some(DriverIdentity {
            driver_profile_id: profile.id.clone(),
            callsign: self.callsign().map(str::to_string),
            full_name,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DriverProfile {
    pub id: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    #[serde(default)]
    pub phones: Vec<String>,
    pub work_status: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Car {
    pub callsign: Option<String>,
    pub brand: Option<String>,
    pub model: Option<String>,
    pub number: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Account {
    pub id: Option<String>,
    pub balance: Option<String>,
    pub currency: Option<String>,
}

/// Resolved driver identity; only the profile id is persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverIdentity {
    pub driver_profile_id: String,
    pub callsign: Option<String>,
    pub full_name: Option<String>,
}

/// Balance-increase transaction request body.
#[derive(Debug, Serialize)]
pub struct BalanceTransactionRequest {
    pub park_id: String,
    pub driver_profile_id: String,
    pub category_id: String,
    /// Signed amount string with exactly 2 fractional digits.
    pub amount: String,
    pub currency: String,
    /// ISO-8601 UTC timestamp of the event.
    pub event_at: String,
    pub description: String,
}

/// What the orchestrator asks the fleet client to credit.
#[derive(Debug, Clone)]
pub struct TopupOrder {
    pub driver_profile_id: String,
    pub category_id: String,
    pub amount: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_requires_a_profile() {
        let entry = DriverEntry {
            driver_profile: None,
            car: Some(Car {
                callsign: Some("AB-1".into()),
                brand: None,
                model: None,
                number: None,
            }),
            accounts: vec![],
        };
        assert!(entry.identity().is_none());
    }

    #[test]
    fn identity_joins_name_parts() {
        let entry = DriverEntry {
            driver_profile: Some(DriverProfile {
                id: "drv-1".into(),
                first_name: Some("Aziz".into()),
                last_name: Some("Karimov".into()),
                phones: vec![],
                work_status: None,
            }),
            car: None,
            accounts: vec![],
        };
        let identity = entry.identity().expect("identity");
        assert_eq!(identity.driver_profile_id, "drv-1");
        assert_eq!(identity.full_name.as_deref(), Some("Aziz Karimov"));
        assert!(identity.callsign.is_none());
    }

    #[test]
    fn search_response_tolerates_missing_fields() {
        let parsed: DriverSearchResponse = serde_json::from_str(
            r#"{"driver_profiles": [{"driver_profile": {"id": "d1"}, "car": {"callsign": "XY-2"}}]}"#,
        )
        .expect("parse");
        assert_eq!(parsed.driver_profiles.len(), 1);
        assert_eq!(parsed.driver_profiles[0].callsign(), Some("XY-2"));
    }
}
