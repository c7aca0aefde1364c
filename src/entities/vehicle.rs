//! Vehicle entity

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};

use crate::core::entity::Entity;
use crate::core::identity::{EntityId, EntityPrefix};
use crate::core::validation::{normalize_plate, Validate, ValidationErrors, Validator};
use crate::entities::{apply_optional, blank_to_none};

/// A customer's vehicle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vehicle {
    pub id: EntityId,
    pub shop_id: EntityId,
    pub customer_id: EntityId,
    /// License plate, upper-case without separators
    pub plate: String,
    pub make: String,
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vin: Option<String>,
    /// Odometer reading in km at last update
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mileage: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct NewVehicle {
    pub customer_id: Option<EntityId>,
    pub plate: String,
    pub make: String,
    pub model: String,
    pub year: Option<i32>,
    pub color: Option<String>,
    pub vin: Option<String>,
    pub mileage: Option<i64>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct VehiclePatch {
    pub customer_id: Option<EntityId>,
    pub plate: Option<String>,
    pub make: Option<String>,
    pub model: Option<String>,
    pub year: Option<i32>,
    pub color: Option<String>,
    pub vin: Option<String>,
    pub mileage: Option<i64>,
    pub notes: Option<String>,
}

impl Vehicle {
    pub fn new(shop_id: EntityId, customer_id: EntityId, input: NewVehicle) -> Self {
        let now = Utc::now();
        Self {
            id: EntityId::new(EntityPrefix::Veh),
            shop_id,
            customer_id,
            plate: normalize_plate(&input.plate),
            make: input.make.trim().to_string(),
            model: input.model.trim().to_string(),
            year: input.year,
            color: blank_to_none(input.color),
            vin: blank_to_none(input.vin).map(|v| v.to_uppercase()),
            mileage: input.mileage,
            notes: blank_to_none(input.notes),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn apply(&self, patch: VehiclePatch) -> Self {
        let mut next = self.clone();
        if let Some(customer_id) = patch.customer_id {
            next.customer_id = customer_id;
        }
        if let Some(plate) = patch.plate {
            next.plate = normalize_plate(&plate);
        }
        if let Some(make) = patch.make {
            next.make = make.trim().to_string();
        }
        if let Some(model) = patch.model {
            next.model = model.trim().to_string();
        }
        if patch.year.is_some() {
            next.year = patch.year;
        }
        if patch.mileage.is_some() {
            next.mileage = patch.mileage;
        }
        apply_optional(&mut next.color, patch.color);
        apply_optional(&mut next.vin, patch.vin.map(|v| v.to_uppercase()));
        apply_optional(&mut next.notes, patch.notes);
        next.updated_at = Utc::now();
        next
    }

    /// "Make Model (Year)" for tables
    pub fn display_name(&self) -> String {
        match self.year {
            Some(year) => format!("{} {} ({})", self.make, self.model, year),
            None => format!("{} {}", self.make, self.model),
        }
    }
}

impl Validate for Vehicle {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let max_year = Utc::now().year() + 1;
        Validator::new()
            .plate("plate", &self.plate)
            .required("make", &self.make)
            .required("model", &self.model)
            .year("year", self.year, max_year)
            .check(self.mileage.map_or(true, |m| m >= 0), "mileage", "must not be negative")
            .finish()
    }
}

impl Entity for Vehicle {
    const PREFIX: EntityPrefix = EntityPrefix::Veh;

    fn id(&self) -> &EntityId {
        &self.id
    }

    fn label(&self) -> String {
        format!("{} {}", self.plate, self.display_name())
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vehicle(plate: &str, year: Option<i32>) -> Vehicle {
        Vehicle::new(
            EntityId::new(EntityPrefix::Shop),
            EntityId::new(EntityPrefix::Cust),
            NewVehicle {
                plate: plate.into(),
                make: "Fiat".into(),
                model: "Uno".into(),
                year,
                ..Default::default()
            },
        )
    }

    #[test]
    fn test_plate_is_normalized() {
        let v = vehicle("abc-1d23", Some(2012));
        assert_eq!(v.plate, "ABC1D23");
        assert!(v.validate().is_ok());
        assert_eq!(v.display_name(), "Fiat Uno (2012)");
    }

    #[test]
    fn test_invalid_plate_and_year() {
        let v = vehicle("12-ABC", Some(1800));
        let err = v.validate().unwrap_err();
        assert!(err.has("plate"));
        assert!(err.has("year"));
    }

    #[test]
    fn test_patch_updates_mileage_only() {
        let v = vehicle("ABC1234", None);
        let next = v.apply(VehiclePatch {
            mileage: Some(85_000),
            ..Default::default()
        });
        assert_eq!(next.mileage, Some(85_000));
        assert_eq!(next.plate, "ABC1234");
    }
}
