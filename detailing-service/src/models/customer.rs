use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::invoice::{CustomerSnapshot, VehicleSnapshot};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vehicle {
    pub make: String,
    pub model: String,
    pub plate: String,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub year: Option<u16>,
}

impl Vehicle {
    pub fn display_name(&self) -> String {
        format!("{} {}", self.make, self.model).trim().to_string()
    }

    pub fn snapshot(&self) -> VehicleSnapshot {
        VehicleSnapshot {
            name: self.display_name(),
            plate: self.plate.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub phone: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub vehicles: Vec<Vehicle>,
    pub created_at: DateTime<Utc>,
}

impl Customer {
    pub fn vehicle(&self, index: u32) -> Option<&Vehicle> {
        self.vehicles.get(index as usize)
    }

    pub fn snapshot(&self) -> CustomerSnapshot {
        CustomerSnapshot {
            name: self.name.clone(),
            phone: self.phone.clone(),
            email: self.email.clone(),
            address: self.address.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vehicle_display_name_joins_make_and_model() {
        let vehicle = Vehicle {
            make: "Hyundai".to_string(),
            model: "Creta".to_string(),
            plate: "MH12AB1234".to_string(),
            color: None,
            year: Some(2023),
        };

        assert_eq!(vehicle.display_name(), "Hyundai Creta");
        assert_eq!(vehicle.snapshot().plate, "MH12AB1234");
    }
}
