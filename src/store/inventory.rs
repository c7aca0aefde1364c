//! Parts inventory and stock movements

use rusqlite::{params, Connection, Row};
use rust_decimal::Decimal;

use super::Store;
use crate::core::database::{get_decimal, get_enum, get_opt_decimal, get_timestamp};
use crate::core::entity::format_timestamp;
use crate::core::error::StoreError;
use crate::core::events::ChangeKind;
use crate::core::identity::{EntityId, EntityPrefix};
use crate::core::validation::{Validate, ValidationErrors, AMOUNT_TOO_LARGE};
use crate::entities::{
    NewMovement, NewNotification, NewPart, NotificationType, Part, PartPatch, StockMovement,
};

const PART_COLUMNS: &str = "id, shop_id, code, name, category, unit, cost_price, sale_price, \
                            quantity, min_quantity, location, active, created_at, updated_at";

const MOVEMENT_COLUMNS: &str = "id, shop_id, part_id, movement_type, quantity, previous_quantity, \
                                new_quantity, unit_cost, reason, order_id, created_by, created_at";

/// Filter for listing parts
#[derive(Debug, Clone, Default)]
pub struct PartFilter {
    /// Substring of code or name
    pub search: Option<String>,
    pub category: Option<String>,
    /// Only parts at or below their minimum quantity
    pub low_stock: bool,
    pub include_inactive: bool,
    pub limit: Option<usize>,
}

fn part_from_row(row: &Row<'_>) -> rusqlite::Result<Part> {
    Ok(Part {
        id: row.get(0)?,
        shop_id: row.get(1)?,
        code: row.get(2)?,
        name: row.get(3)?,
        category: row.get(4)?,
        unit: row.get(5)?,
        cost_price: get_decimal(row, 6)?,
        sale_price: get_decimal(row, 7)?,
        quantity: get_decimal(row, 8)?,
        min_quantity: get_decimal(row, 9)?,
        location: row.get(10)?,
        active: row.get(11)?,
        created_at: get_timestamp(row, 12)?,
        updated_at: get_timestamp(row, 13)?,
    })
}

fn movement_from_row(row: &Row<'_>) -> rusqlite::Result<StockMovement> {
    Ok(StockMovement {
        id: row.get(0)?,
        shop_id: row.get(1)?,
        part_id: row.get(2)?,
        movement_type: get_enum(row, 3)?,
        quantity: get_decimal(row, 4)?,
        previous_quantity: get_decimal(row, 5)?,
        new_quantity: get_decimal(row, 6)?,
        unit_cost: get_opt_decimal(row, 7)?,
        reason: row.get(8)?,
        order_id: row.get(9)?,
        created_by: row.get(10)?,
        created_at: get_timestamp(row, 11)?,
    })
}

/// Apply a movement to the part's stored quantity and record it
///
/// Reads the on-hand quantity inside the caller's transaction and rejects
/// any movement that would leave it negative.
pub(super) fn write_movement(
    conn: &Connection,
    part: &Part,
    input: NewMovement,
    actor: &str,
) -> Result<StockMovement, StoreError> {
    let mut current = part.clone();
    current.quantity = conn.query_row(
        "SELECT quantity FROM parts WHERE id = ?1",
        params![part.id],
        |row| get_decimal(row, 0),
    )?;

    let new_quantity = input
        .movement_type
        .apply(current.quantity, input.quantity)
        .ok_or_else(|| ValidationErrors::single("quantity", AMOUNT_TOO_LARGE))?;
    if new_quantity < Decimal::ZERO {
        return Err(StoreError::InsufficientStock {
            code: part.code.clone(),
            available: current.quantity,
            requested: input.quantity,
        });
    }

    let movement = StockMovement::new(&current, input, new_quantity, actor);
    conn.execute(
        &format!(
            "INSERT INTO stock_movements ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            MOVEMENT_COLUMNS
        ),
        params![
            movement.id,
            movement.shop_id,
            movement.part_id,
            movement.movement_type.to_string(),
            movement.quantity.to_string(),
            movement.previous_quantity.to_string(),
            movement.new_quantity.to_string(),
            movement.unit_cost.map(|c| c.to_string()),
            movement.reason,
            movement.order_id,
            movement.created_by,
            format_timestamp(&movement.created_at),
        ],
    )?;
    conn.execute(
        "UPDATE parts SET quantity = ?2, updated_at = ?3 WHERE id = ?1",
        params![
            part.id,
            new_quantity.to_string(),
            format_timestamp(&movement.created_at)
        ],
    )?;
    Ok(movement)
}

impl Store {
    pub fn create_part(&mut self, input: NewPart) -> Result<Part, StoreError> {
        let part = Part::new(self.shop_id()?.clone(), input);
        part.validate()?;

        self.db.conn().execute(
            &format!(
                "INSERT INTO parts ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
                PART_COLUMNS
            ),
            params![
                part.id,
                part.shop_id,
                part.code,
                part.name,
                part.category,
                part.unit,
                part.cost_price.to_string(),
                part.sale_price.to_string(),
                part.quantity.to_string(),
                part.min_quantity.to_string(),
                part.location,
                part.active,
                format_timestamp(&part.created_at),
                format_timestamp(&part.updated_at),
            ],
        )?;
        tracing::info!(part = %part.id, code = %part.code, "created part");
        self.publish("parts", ChangeKind::Insert, &part.id);
        Ok(part)
    }

    /// Find a part by code, id or partial id
    pub fn get_part(&self, key: &str) -> Result<Part, StoreError> {
        let id = self.resolve(
            EntityPrefix::Part,
            "part",
            key,
            Some(("code", key.trim().to_uppercase())),
        )?;
        self.load_part(&id)
    }

    pub(super) fn load_part(&self, id: &EntityId) -> Result<Part, StoreError> {
        let key = self.key("parts", format!("get:{}", id))?;
        let conn = self.db.conn();
        self.cache.fetch(key, || -> Result<_, StoreError> {
            Ok(conn.query_row(
                &format!("SELECT {} FROM parts WHERE id = ?1", PART_COLUMNS),
                params![id],
                part_from_row,
            )?)
        })
    }

    pub fn list_parts(&self, filter: &PartFilter) -> Result<Vec<Part>, StoreError> {
        let shop_id = self.shop_id()?;
        let key = self.key("parts", format!("list:{:?}", filter))?;
        let conn = self.db.conn();
        self.cache.fetch(key, || -> Result<_, StoreError> {
            let mut sql = format!("SELECT {} FROM parts WHERE shop_id = ?", PART_COLUMNS);
            let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(shop_id.clone())];

            if !filter.include_inactive {
                sql.push_str(" AND active = 1");
            }

            if let Some(ref category) = filter.category {
                sql.push_str(" AND category = ? COLLATE NOCASE");
                params_vec.push(Box::new(category.clone()));
            }

            if let Some(ref search) = filter.search {
                sql.push_str(" AND (code LIKE ? OR name LIKE ?)");
                let pattern = format!("%{}%", search.trim());
                params_vec.push(Box::new(pattern.clone()));
                params_vec.push(Box::new(pattern));
            }

            sql.push_str(" ORDER BY code");

            let mut stmt = conn.prepare(&sql)?;
            let params_refs: Vec<&dyn rusqlite::ToSql> =
                params_vec.iter().map(|p| p.as_ref()).collect();
            let mut parts = stmt
                .query_map(params_refs.as_slice(), part_from_row)?
                .collect::<Result<Vec<_>, _>>()?;

            // Quantities are decimal text, so the threshold is compared here
            if filter.low_stock {
                parts.retain(|p| p.is_low_stock());
            }
            if let Some(limit) = filter.limit {
                parts.truncate(limit);
            }
            Ok(parts)
        })
    }

    /// Change catalog fields; on-hand quantity only moves through `record_movement`
    pub fn update_part(&mut self, key: &str, patch: PartPatch) -> Result<Part, StoreError> {
        let part = self.get_part(key)?.apply(patch);
        part.validate()?;

        self.db.conn().execute(
            "UPDATE parts SET code = ?2, name = ?3, category = ?4, unit = ?5, cost_price = ?6,
             sale_price = ?7, min_quantity = ?8, location = ?9, active = ?10, updated_at = ?11
             WHERE id = ?1",
            params![
                part.id,
                part.code,
                part.name,
                part.category,
                part.unit,
                part.cost_price.to_string(),
                part.sale_price.to_string(),
                part.min_quantity.to_string(),
                part.location,
                part.active,
                format_timestamp(&part.updated_at),
            ],
        )?;
        self.publish("parts", ChangeKind::Update, &part.id);
        Ok(part)
    }

    /// Delete a part and its movement log; order items keep their text
    pub fn delete_part(&mut self, key: &str) -> Result<Part, StoreError> {
        let part = self.get_part(key)?;
        self.db
            .conn()
            .execute("DELETE FROM parts WHERE id = ?1", params![part.id])?;
        tracing::info!(part = %part.id, "deleted part");
        self.publish_cascade("parts", &part.id);
        Ok(part)
    }

    /// Record a stock movement against a part
    pub fn record_movement(
        &mut self,
        part_key: &str,
        input: NewMovement,
    ) -> Result<StockMovement, StoreError> {
        input.validate()?;
        let part = self.get_part(part_key)?;
        if let Some(ref order_id) = input.order_id {
            self.get_order(&order_id.to_string())?;
        }

        let tx = self.db.conn_mut().transaction()?;
        let movement = write_movement(&tx, &part, input, &self.actor)?;
        tx.commit()?;

        self.after_movement(&part, &movement)?;
        Ok(movement)
    }

    /// Publish a committed movement and warn when stock crosses the minimum
    pub(super) fn after_movement(
        &mut self,
        part: &Part,
        movement: &StockMovement,
    ) -> Result<(), StoreError> {
        tracing::debug!(
            part = %part.code,
            kind = %movement.movement_type,
            from = %movement.previous_quantity,
            to = %movement.new_quantity,
            "recorded stock movement"
        );
        self.publish("stock_movements", ChangeKind::Insert, &movement.id);
        self.publish("parts", ChangeKind::Update, &part.id);

        let crossed = movement.previous_quantity > part.min_quantity
            && movement.new_quantity <= part.min_quantity;
        if crossed && self.low_stock_notifications {
            self.create_notification(
                NewNotification::new(
                    NotificationType::LowStock,
                    format!("Low stock: {}", part.code),
                    format!(
                        "{} is down to {} {} (minimum {})",
                        part.name, movement.new_quantity, part.unit, part.min_quantity
                    ),
                )
                .about(&part.id),
            )?;
        }
        Ok(())
    }

    /// Movements newest first, for one part or the whole shop
    pub fn list_movements(
        &self,
        part_key: Option<&str>,
        limit: Option<usize>,
    ) -> Result<Vec<StockMovement>, StoreError> {
        let part_id = part_key.map(|k| self.get_part(k)).transpose()?.map(|p| p.id);
        let shop_id = self.shop_id()?;
        let key = self.key(
            "stock_movements",
            format!("list:{:?}:{:?}", part_id, limit),
        )?;
        let conn = self.db.conn();
        self.cache.fetch(key, || -> Result<_, StoreError> {
            let mut sql = format!(
                "SELECT {} FROM stock_movements WHERE shop_id = ?",
                MOVEMENT_COLUMNS
            );
            let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(shop_id.clone())];
            if let Some(ref part_id) = part_id {
                sql.push_str(" AND part_id = ?");
                params_vec.push(Box::new(part_id.clone()));
            }
            sql.push_str(" ORDER BY created_at DESC, rowid DESC");
            if let Some(limit) = limit {
                sql.push_str(&format!(" LIMIT {}", limit));
            }

            let mut stmt = conn.prepare(&sql)?;
            let params_refs: Vec<&dyn rusqlite::ToSql> =
                params_vec.iter().map(|p| p.as_ref()).collect();
            let movements = stmt
                .query_map(params_refs.as_slice(), movement_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(movements)
        })
    }
}
