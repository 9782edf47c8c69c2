use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::string_id;
use crate::errors::DomainError;

string_id!(CustomerId);
string_id!(VehicleId);

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: CustomerId,
    pub full_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vehicle {
    pub id: VehicleId,
    pub customer_id: CustomerId,
    pub vin: String,
    pub year: i32,
    pub make: String,
    pub model: String,
    pub trim: Option<String>,
    pub mileage: i64,
    pub condition: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Customer {
    pub fn validate_contact(full_name: &str, email: &str) -> Result<(), DomainError> {
        if full_name.trim().is_empty() {
            return Err(DomainError::InvalidInput("customer name is required".to_owned()));
        }
        let email = email.trim();
        let well_formed = email
            .split_once('@')
            .map(|(local, domain)| !local.is_empty() && domain.contains('.'))
            .unwrap_or(false);
        if !well_formed {
            return Err(DomainError::InvalidInput(format!("`{email}` is not a valid email")));
        }
        Ok(())
    }
}

impl Vehicle {
    pub fn display_name(&self) -> String {
        match &self.trim {
            Some(trim) => format!("{} {} {} {}", self.year, self.make, self.model, trim),
            None => format!("{} {} {}", self.year, self.make, self.model),
        }
    }

    /// Normalizes a VIN to upper case and checks the 17-character format.
    pub fn normalize_vin(raw: &str) -> Result<String, DomainError> {
        let vin = raw.trim().to_ascii_uppercase();
        if vin.len() != 17 {
            return Err(DomainError::InvalidInput(format!(
                "VIN must be 17 characters, got {}",
                vin.len()
            )));
        }
        if let Some(bad) = vin.chars().find(|ch| !ch.is_ascii_alphanumeric() || "IOQ".contains(*ch))
        {
            return Err(DomainError::InvalidInput(format!("VIN contains invalid character `{bad}`")));
        }
        Ok(vin)
    }

    pub fn validate_year(year: i32, now: DateTime<Utc>) -> Result<(), DomainError> {
        let newest = now.year() + 1;
        if !(1980..=newest).contains(&year) {
            return Err(DomainError::InvalidInput(format!(
                "vehicle year must be between 1980 and {newest}"
            )));
        }
        Ok(())
    }
}
