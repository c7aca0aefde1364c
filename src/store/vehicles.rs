//! Vehicle queries and mutations

use rusqlite::{params, Row};
use serde::Serialize;

use super::Store;
use crate::core::database::get_timestamp;
use crate::core::entity::format_timestamp;
use crate::core::error::StoreError;
use crate::core::events::ChangeKind;
use crate::core::identity::{EntityId, EntityPrefix};
use crate::core::validation::{normalize_plate, Validate, ValidationErrors};
use crate::entities::{NewVehicle, ServiceOrder, Vehicle, VehiclePatch};

const COLUMNS: &str = "id, shop_id, customer_id, plate, make, model, year, color, vin, mileage, \
                       notes, created_at, updated_at";

/// Filter for listing vehicles
#[derive(Debug, Clone, Default)]
pub struct VehicleFilter {
    pub customer_id: Option<EntityId>,
    /// Substring of plate, make or model
    pub search: Option<String>,
    pub limit: Option<usize>,
}

/// A vehicle and its service orders, newest first
#[derive(Debug, Clone, Serialize)]
pub struct VehicleHistory {
    pub vehicle: Vehicle,
    pub orders: Vec<ServiceOrder>,
}

fn from_row(row: &Row<'_>) -> rusqlite::Result<Vehicle> {
    Ok(Vehicle {
        id: row.get(0)?,
        shop_id: row.get(1)?,
        customer_id: row.get(2)?,
        plate: row.get(3)?,
        make: row.get(4)?,
        model: row.get(5)?,
        year: row.get(6)?,
        color: row.get(7)?,
        vin: row.get(8)?,
        mileage: row.get(9)?,
        notes: row.get(10)?,
        created_at: get_timestamp(row, 11)?,
        updated_at: get_timestamp(row, 12)?,
    })
}

impl Store {
    /// Register a vehicle; `input.customer_id` must name a customer of this shop
    pub fn create_vehicle(&mut self, input: NewVehicle) -> Result<Vehicle, StoreError> {
        let customer_id = input
            .customer_id
            .clone()
            .ok_or_else(|| ValidationErrors::single("customer_id", "is required"))?;
        let owner = self.load_customer_in_shop(&customer_id)?;

        let vehicle = Vehicle::new(self.shop_id()?.clone(), owner, input);
        vehicle.validate()?;

        self.db.conn().execute(
            &format!(
                "INSERT INTO vehicles ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                COLUMNS
            ),
            params![
                vehicle.id,
                vehicle.shop_id,
                vehicle.customer_id,
                vehicle.plate,
                vehicle.make,
                vehicle.model,
                vehicle.year,
                vehicle.color,
                vehicle.vin,
                vehicle.mileage,
                vehicle.notes,
                format_timestamp(&vehicle.created_at),
                format_timestamp(&vehicle.updated_at),
            ],
        )?;
        tracing::info!(vehicle = %vehicle.id, plate = %vehicle.plate, "created vehicle");
        self.publish("vehicles", ChangeKind::Insert, &vehicle.id);
        Ok(vehicle)
    }

    /// Customer id, checked to belong to the selected shop
    fn load_customer_in_shop(&self, id: &EntityId) -> Result<EntityId, StoreError> {
        Ok(self.get_customer(&id.to_string())?.id)
    }

    /// Find a vehicle by plate, id or partial id
    pub fn get_vehicle(&self, key: &str) -> Result<Vehicle, StoreError> {
        let id = self.resolve(
            EntityPrefix::Veh,
            "vehicle",
            key,
            Some(("plate", normalize_plate(key))),
        )?;
        self.load_vehicle(&id)
    }

    pub(super) fn load_vehicle(&self, id: &EntityId) -> Result<Vehicle, StoreError> {
        let key = self.key("vehicles", format!("get:{}", id))?;
        let conn = self.db.conn();
        self.cache.fetch(key, || -> Result<_, StoreError> {
            Ok(conn.query_row(
                &format!("SELECT {} FROM vehicles WHERE id = ?1", COLUMNS),
                params![id],
                from_row,
            )?)
        })
    }

    pub fn list_vehicles(&self, filter: &VehicleFilter) -> Result<Vec<Vehicle>, StoreError> {
        let shop_id = self.shop_id()?;
        let key = self.key("vehicles", format!("list:{:?}", filter))?;
        let conn = self.db.conn();
        self.cache.fetch(key, || -> Result<_, StoreError> {
            let mut sql = format!("SELECT {} FROM vehicles WHERE shop_id = ?", COLUMNS);
            let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(shop_id.clone())];

            if let Some(ref customer_id) = filter.customer_id {
                sql.push_str(" AND customer_id = ?");
                params_vec.push(Box::new(customer_id.clone()));
            }

            if let Some(ref search) = filter.search {
                sql.push_str(" AND (plate LIKE ? OR make LIKE ? OR model LIKE ?)");
                let plate = format!("%{}%", normalize_plate(search));
                let pattern = format!("%{}%", search.trim());
                params_vec.push(Box::new(plate));
                params_vec.push(Box::new(pattern.clone()));
                params_vec.push(Box::new(pattern));
            }

            sql.push_str(" ORDER BY plate");

            if let Some(limit) = filter.limit {
                sql.push_str(&format!(" LIMIT {}", limit));
            }

            let mut stmt = conn.prepare(&sql)?;
            let params_refs: Vec<&dyn rusqlite::ToSql> =
                params_vec.iter().map(|p| p.as_ref()).collect();
            let vehicles = stmt
                .query_map(params_refs.as_slice(), from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(vehicles)
        })
    }

    pub fn update_vehicle(&mut self, key: &str, patch: VehiclePatch) -> Result<Vehicle, StoreError> {
        if let Some(ref owner) = patch.customer_id {
            self.load_customer_in_shop(owner)?;
        }
        let vehicle = self.get_vehicle(key)?.apply(patch);
        vehicle.validate()?;

        self.db.conn().execute(
            "UPDATE vehicles SET customer_id = ?2, plate = ?3, make = ?4, model = ?5, year = ?6,
             color = ?7, vin = ?8, mileage = ?9, notes = ?10, updated_at = ?11 WHERE id = ?1",
            params![
                vehicle.id,
                vehicle.customer_id,
                vehicle.plate,
                vehicle.make,
                vehicle.model,
                vehicle.year,
                vehicle.color,
                vehicle.vin,
                vehicle.mileage,
                vehicle.notes,
                format_timestamp(&vehicle.updated_at),
            ],
        )?;
        self.publish("vehicles", ChangeKind::Update, &vehicle.id);
        Ok(vehicle)
    }

    /// Delete a vehicle together with its service orders
    pub fn delete_vehicle(&mut self, key: &str) -> Result<Vehicle, StoreError> {
        let vehicle = self.get_vehicle(key)?;
        self.db
            .conn()
            .execute("DELETE FROM vehicles WHERE id = ?1", params![vehicle.id])?;
        tracing::info!(vehicle = %vehicle.id, "deleted vehicle");
        self.publish_cascade("vehicles", &vehicle.id);
        Ok(vehicle)
    }

    pub fn vehicle_history(&self, key: &str) -> Result<VehicleHistory, StoreError> {
        let vehicle = self.get_vehicle(key)?;
        let orders = self.list_orders(&super::OrderFilter {
            vehicle_id: Some(vehicle.id.clone()),
            ..Default::default()
        })?;
        Ok(VehicleHistory { vehicle, orders })
    }

    /// Record a newer odometer reading; older readings are ignored
    pub(super) fn bump_mileage(&mut self, vehicle_id: &EntityId, mileage: i64) -> Result<(), StoreError> {
        let updated = self.db.conn().execute(
            "UPDATE vehicles SET mileage = ?2, updated_at = ?3
             WHERE id = ?1 AND (mileage IS NULL OR mileage < ?2)",
            params![vehicle_id, mileage, format_timestamp(&chrono::Utc::now())],
        )?;
        if updated > 0 {
            self.publish("vehicles", ChangeKind::Update, vehicle_id);
        }
        Ok(())
    }
}
