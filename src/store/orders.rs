//! Service orders, line items and status history

use chrono::{NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use rust_decimal::Decimal;

use super::inventory::write_movement;
use super::{date_text, Store};
use crate::core::database::{
    get_decimal, get_enum, get_opt_date, get_opt_enum, get_opt_timestamp, get_timestamp,
};
use crate::core::entity::format_timestamp;
use crate::core::error::StoreError;
use crate::core::events::ChangeKind;
use crate::core::identity::{EntityId, EntityPrefix};
use crate::core::validation::{Validate, ValidationErrors};
use crate::entities::{
    ItemType, MovementType, NewMovement, NewNotification, NewServiceItem, NewServiceOrder,
    NotificationType, OrderStatus, ServiceItem, ServiceOrder, ServiceOrderPatch, StatusHistory,
};

pub(super) const ORDER_COLUMNS: &str = "id, shop_id, order_number, customer_id, vehicle_id, \
     status, description, notes, mileage, discount, total_amount, estimated_completion, \
     completed_at, created_at, updated_at";

pub(super) const ITEM_COLUMNS: &str = "id, shop_id, order_id, item_type, service_type, \
     description, quantity, unit_price, total_price, part_id, created_at";

const HISTORY_COLUMNS: &str =
    "id, shop_id, order_id, from_status, to_status, changed_by, note, changed_at";

/// Filter for listing service orders
#[derive(Debug, Clone, Default)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
    pub customer_id: Option<EntityId>,
    pub vehicle_id: Option<EntityId>,
    /// Inclusive bounds on the creation date
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    /// Substring of description or notes
    pub search: Option<String>,
    pub limit: Option<usize>,
}

pub(super) fn order_from_row(row: &Row<'_>) -> rusqlite::Result<ServiceOrder> {
    Ok(ServiceOrder {
        id: row.get(0)?,
        shop_id: row.get(1)?,
        order_number: row.get(2)?,
        customer_id: row.get(3)?,
        vehicle_id: row.get(4)?,
        status: get_enum(row, 5)?,
        description: row.get(6)?,
        notes: row.get(7)?,
        mileage: row.get(8)?,
        discount: get_decimal(row, 9)?,
        total_amount: get_decimal(row, 10)?,
        estimated_completion: get_opt_date(row, 11)?,
        completed_at: get_opt_timestamp(row, 12)?,
        created_at: get_timestamp(row, 13)?,
        updated_at: get_timestamp(row, 14)?,
    })
}

pub(super) fn item_from_row(row: &Row<'_>) -> rusqlite::Result<ServiceItem> {
    Ok(ServiceItem {
        id: row.get(0)?,
        shop_id: row.get(1)?,
        order_id: row.get(2)?,
        item_type: get_enum(row, 3)?,
        service_type: row.get(4)?,
        description: row.get(5)?,
        quantity: get_decimal(row, 6)?,
        unit_price: get_decimal(row, 7)?,
        total_price: get_decimal(row, 8)?,
        part_id: row.get(9)?,
        created_at: get_timestamp(row, 10)?,
    })
}

fn history_from_row(row: &Row<'_>) -> rusqlite::Result<StatusHistory> {
    Ok(StatusHistory {
        id: row.get(0)?,
        shop_id: row.get(1)?,
        order_id: row.get(2)?,
        from_status: get_opt_enum(row, 3)?,
        to_status: get_enum(row, 4)?,
        changed_by: row.get(5)?,
        note: row.get(6)?,
        changed_at: get_timestamp(row, 7)?,
    })
}

fn insert_order(conn: &Connection, order: &ServiceOrder) -> Result<(), StoreError> {
    conn.execute(
        &format!(
            "INSERT INTO service_orders ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
            ORDER_COLUMNS
        ),
        params![
            order.id,
            order.shop_id,
            order.order_number,
            order.customer_id,
            order.vehicle_id,
            order.status.to_string(),
            order.description,
            order.notes,
            order.mileage,
            order.discount.to_string(),
            order.total_amount.to_string(),
            date_text(order.estimated_completion),
            order.completed_at.as_ref().map(format_timestamp),
            format_timestamp(&order.created_at),
            format_timestamp(&order.updated_at),
        ],
    )?;
    Ok(())
}

fn insert_item(conn: &Connection, item: &ServiceItem) -> Result<(), StoreError> {
    conn.execute(
        &format!(
            "INSERT INTO service_items ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            ITEM_COLUMNS
        ),
        params![
            item.id,
            item.shop_id,
            item.order_id,
            item.item_type.to_string(),
            item.service_type,
            item.description,
            item.quantity.to_string(),
            item.unit_price.to_string(),
            item.total_price.to_string(),
            item.part_id,
            format_timestamp(&item.created_at),
        ],
    )?;
    Ok(())
}

fn insert_history(conn: &Connection, entry: &StatusHistory) -> Result<(), StoreError> {
    conn.execute(
        &format!(
            "INSERT INTO service_order_status_history ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            HISTORY_COLUMNS
        ),
        params![
            entry.id,
            entry.shop_id,
            entry.order_id,
            entry.from_status.map(|s| s.to_string()),
            entry.to_status.to_string(),
            entry.changed_by,
            entry.note,
            format_timestamp(&entry.changed_at),
        ],
    )?;
    Ok(())
}

pub(super) fn load_items(conn: &Connection, order_id: &EntityId) -> Result<Vec<ServiceItem>, StoreError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM service_items WHERE order_id = ?1 ORDER BY created_at, rowid",
        ITEM_COLUMNS
    ))?;
    let items = stmt
        .query_map(params![order_id], item_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(items)
}

/// Store the order total derived from its current items
fn recompute_total(
    conn: &Connection,
    order_id: &EntityId,
    discount: Decimal,
) -> Result<Decimal, StoreError> {
    let items = load_items(conn, order_id)?;
    let total = ServiceOrder::compute_total(&items, discount)?;
    conn.execute(
        "UPDATE service_orders SET total_amount = ?2, updated_at = ?3 WHERE id = ?1",
        params![order_id, total.to_string(), format_timestamp(&Utc::now())],
    )?;
    Ok(total)
}

fn ensure_open(order: &ServiceOrder) -> Result<(), StoreError> {
    if order.status.is_terminal() {
        return Err(StoreError::OrderClosed {
            number: order.order_number,
            status: order.status.to_string(),
        });
    }
    Ok(())
}

fn allowed_next(status: OrderStatus) -> String {
    let next = status.next_states();
    if next.is_empty() {
        "none, the order is closed".to_string()
    } else {
        next.iter()
            .map(|s| s.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Parse "#12" or "12" as an order number
fn parse_order_number(key: &str) -> Option<i64> {
    let key = key.trim();
    key.strip_prefix('#').unwrap_or(key).parse().ok()
}

impl Store {
    /// Open a service order; the vehicle's owner is used when no customer is given
    pub fn create_order(&mut self, input: NewServiceOrder) -> Result<ServiceOrder, StoreError> {
        let vehicle_id = input
            .vehicle_id
            .clone()
            .ok_or_else(|| ValidationErrors::single("vehicle_id", "is required"))?;
        let vehicle = self.get_vehicle(&vehicle_id.to_string())?;
        let customer_id = match input.customer_id.clone() {
            Some(id) => {
                let customer = self.get_customer(&id.to_string())?;
                if customer.id != vehicle.customer_id {
                    return Err(ValidationErrors::single(
                        "vehicle_id",
                        format!("vehicle {} does not belong to {}", vehicle.plate, customer.name),
                    )
                    .into());
                }
                customer.id
            }
            None => vehicle.customer_id.clone(),
        };

        let shop_id = self.shop_id()?.clone();
        let mut order = ServiceOrder::new(shop_id.clone(), 0, customer_id, vehicle.id.clone(), input);
        order.validate()?;

        let tx = self.db.conn_mut().transaction()?;
        order.order_number = tx.query_row(
            "SELECT COALESCE(MAX(order_number), 0) + 1 FROM service_orders WHERE shop_id = ?1",
            params![shop_id],
            |row| row.get(0),
        )?;
        insert_order(&tx, &order)?;
        let opened = StatusHistory::new(&order, None, order.status, &self.actor, None);
        insert_history(&tx, &opened)?;
        tx.commit()?;

        tracing::info!(order = %order.id, number = order.order_number, "opened service order");
        self.publish("service_orders", ChangeKind::Insert, &order.id);
        self.publish("service_order_status_history", ChangeKind::Insert, &opened.id);
        if let Some(mileage) = order.mileage {
            self.bump_mileage(&order.vehicle_id, mileage)?;
        }
        Ok(order)
    }

    /// Find an order by number ("#12" or "12"), id or partial id
    pub fn get_order(&self, key: &str) -> Result<ServiceOrder, StoreError> {
        if let Some(number) = parse_order_number(key) {
            return self.find_order_by_number(number);
        }
        let id = self.resolve(EntityPrefix::So, "service order", key, None)?;
        self.load_order(&id)
    }

    pub fn find_order_by_number(&self, number: i64) -> Result<ServiceOrder, StoreError> {
        let id: Option<EntityId> = self
            .db
            .conn()
            .query_row(
                "SELECT id FROM service_orders WHERE shop_id = ?1 AND order_number = ?2",
                params![self.shop_id()?, number],
                |row| row.get(0),
            )
            .optional()?;
        match id {
            Some(id) => self.load_order(&id),
            None => Err(StoreError::not_found("service order", format!("#{}", number))),
        }
    }

    pub(super) fn load_order(&self, id: &EntityId) -> Result<ServiceOrder, StoreError> {
        let key = self.key("service_orders", format!("get:{}", id))?;
        let conn = self.db.conn();
        self.cache.fetch(key, || -> Result<_, StoreError> {
            Ok(conn.query_row(
                &format!("SELECT {} FROM service_orders WHERE id = ?1", ORDER_COLUMNS),
                params![id],
                order_from_row,
            )?)
        })
    }

    /// Orders newest first
    pub fn list_orders(&self, filter: &OrderFilter) -> Result<Vec<ServiceOrder>, StoreError> {
        let shop_id = self.shop_id()?;
        let key = self.key("service_orders", format!("list:{:?}", filter))?;
        let conn = self.db.conn();
        self.cache.fetch(key, || -> Result<_, StoreError> {
            let mut sql = format!("SELECT {} FROM service_orders WHERE shop_id = ?", ORDER_COLUMNS);
            let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(shop_id.clone())];

            if let Some(status) = filter.status {
                sql.push_str(" AND status = ?");
                params_vec.push(Box::new(status.to_string()));
            }

            if let Some(ref customer_id) = filter.customer_id {
                sql.push_str(" AND customer_id = ?");
                params_vec.push(Box::new(customer_id.clone()));
            }

            if let Some(ref vehicle_id) = filter.vehicle_id {
                sql.push_str(" AND vehicle_id = ?");
                params_vec.push(Box::new(vehicle_id.clone()));
            }

            if let Some(from) = date_text(filter.from) {
                sql.push_str(" AND substr(created_at, 1, 10) >= ?");
                params_vec.push(Box::new(from));
            }

            if let Some(to) = date_text(filter.to) {
                sql.push_str(" AND substr(created_at, 1, 10) <= ?");
                params_vec.push(Box::new(to));
            }

            if let Some(ref search) = filter.search {
                sql.push_str(" AND (description LIKE ? OR notes LIKE ?)");
                let pattern = format!("%{}%", search.trim());
                params_vec.push(Box::new(pattern.clone()));
                params_vec.push(Box::new(pattern));
            }

            sql.push_str(" ORDER BY created_at DESC, order_number DESC");

            if let Some(limit) = filter.limit {
                sql.push_str(&format!(" LIMIT {}", limit));
            }

            let mut stmt = conn.prepare(&sql)?;
            let params_refs: Vec<&dyn rusqlite::ToSql> =
                params_vec.iter().map(|p| p.as_ref()).collect();
            let orders = stmt
                .query_map(params_refs.as_slice(), order_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(orders)
        })
    }

    /// Change descriptive fields or the discount of an open order
    pub fn update_order(
        &mut self,
        key: &str,
        patch: ServiceOrderPatch,
    ) -> Result<ServiceOrder, StoreError> {
        let current = self.get_order(key)?;
        ensure_open(&current)?;
        let mut order = current.apply(patch);
        order.validate()?;

        let tx = self.db.conn_mut().transaction()?;
        tx.execute(
            "UPDATE service_orders SET description = ?2, notes = ?3, mileage = ?4, discount = ?5,
             estimated_completion = ?6, updated_at = ?7 WHERE id = ?1",
            params![
                order.id,
                order.description,
                order.notes,
                order.mileage,
                order.discount.to_string(),
                date_text(order.estimated_completion),
                format_timestamp(&order.updated_at),
            ],
        )?;
        order.total_amount = recompute_total(&tx, &order.id, order.discount)?;
        tx.commit()?;

        self.publish("service_orders", ChangeKind::Update, &order.id);
        if let Some(mileage) = order.mileage.filter(|m| Some(*m) != current.mileage) {
            self.bump_mileage(&order.vehicle_id, mileage)?;
        }
        Ok(order)
    }

    /// Delete an order with its items and history; stock already moved stays moved
    pub fn delete_order(&mut self, key: &str) -> Result<ServiceOrder, StoreError> {
        let order = self.get_order(key)?;
        self.db
            .conn()
            .execute("DELETE FROM service_orders WHERE id = ?1", params![order.id])?;
        tracing::info!(order = %order.id, number = order.order_number, "deleted service order");
        self.publish_cascade("service_orders", &order.id);
        Ok(order)
    }

    /// Add a line item and recompute the order total
    ///
    /// A part item linked to an inventory part takes the quantity out of
    /// stock with an `exit` movement referencing the order. Blank
    /// description and zero price default to the part's name and sale price.
    pub fn add_item(
        &mut self,
        order_key: &str,
        mut input: NewServiceItem,
    ) -> Result<ServiceItem, StoreError> {
        let order = self.get_order(order_key)?;
        ensure_open(&order)?;

        let part = match input.part_id.clone() {
            Some(part_id) => {
                let part = self.get_part(&part_id.to_string())?;
                input.item_type = ItemType::Part;
                if input.description.trim().is_empty() {
                    input.description = part.name.clone();
                }
                if input.unit_price.is_zero() {
                    input.unit_price = part.sale_price;
                }
                Some(part)
            }
            None => None,
        };

        let item = ServiceItem::new(order.shop_id.clone(), order.id.clone(), input);
        item.validate()?;

        let tx = self.db.conn_mut().transaction()?;
        insert_item(&tx, &item)?;
        let movement = match &part {
            Some(part) => Some(write_movement(
                &tx,
                part,
                NewMovement::new(MovementType::Exit, item.quantity)
                    .reason(format!("Service order #{}", order.order_number))
                    .for_order(&order.id),
                &self.actor,
            )?),
            None => None,
        };
        recompute_total(&tx, &order.id, order.discount)?;
        tx.commit()?;

        self.publish("service_items", ChangeKind::Insert, &item.id);
        self.publish("service_orders", ChangeKind::Update, &order.id);
        if let (Some(part), Some(movement)) = (part, movement) {
            self.after_movement(&part, &movement)?;
        }
        Ok(item)
    }

    /// Remove a line item, returning linked parts to stock
    pub fn remove_item(&mut self, item_key: &str) -> Result<ServiceItem, StoreError> {
        let item_id = self.resolve(EntityPrefix::Item, "service item", item_key, None)?;
        let item = self.db.conn().query_row(
            &format!("SELECT {} FROM service_items WHERE id = ?1", ITEM_COLUMNS),
            params![item_id],
            item_from_row,
        )?;
        let order = self.load_order(&item.order_id)?;
        ensure_open(&order)?;
        let part = match &item.part_id {
            Some(part_id) => Some(self.load_part(part_id)?),
            None => None,
        };

        let tx = self.db.conn_mut().transaction()?;
        tx.execute("DELETE FROM service_items WHERE id = ?1", params![item.id])?;
        let movement = match &part {
            Some(part) => Some(write_movement(
                &tx,
                part,
                NewMovement::new(MovementType::Return, item.quantity)
                    .reason(format!("Removed from service order #{}", order.order_number))
                    .for_order(&order.id),
                &self.actor,
            )?),
            None => None,
        };
        recompute_total(&tx, &order.id, order.discount)?;
        tx.commit()?;

        self.publish("service_items", ChangeKind::Delete, &item.id);
        self.publish("service_orders", ChangeKind::Update, &order.id);
        if let (Some(part), Some(movement)) = (part, movement) {
            self.after_movement(&part, &movement)?;
        }
        Ok(item)
    }

    pub fn list_items(&self, order_key: &str) -> Result<Vec<ServiceItem>, StoreError> {
        let order = self.get_order(order_key)?;
        let key = self.key("service_items", format!("order:{}", order.id))?;
        let conn = self.db.conn();
        self.cache
            .fetch(key, || -> Result<_, StoreError> { load_items(conn, &order.id) })
    }

    /// Move an order through its lifecycle
    ///
    /// Records a history row, stamps `completed_at` on completion and
    /// notifies the shop staff.
    pub fn change_status(
        &mut self,
        order_key: &str,
        to: OrderStatus,
        note: Option<String>,
    ) -> Result<ServiceOrder, StoreError> {
        let order = self.get_order(order_key)?;
        let from = order.status;
        if !from.can_transition_to(to) {
            return Err(StoreError::InvalidTransition {
                from: from.to_string(),
                to: to.to_string(),
                allowed: allowed_next(from),
            });
        }

        let now = Utc::now();
        let mut next = order.clone();
        next.status = to;
        next.updated_at = now;
        if to == OrderStatus::Completed {
            next.completed_at = Some(now);
        }
        let entry = StatusHistory::new(&next, Some(from), to, &self.actor, note);

        let tx = self.db.conn_mut().transaction()?;
        tx.execute(
            "UPDATE service_orders SET status = ?2, completed_at = ?3, updated_at = ?4 WHERE id = ?1",
            params![
                next.id,
                next.status.to_string(),
                next.completed_at.as_ref().map(format_timestamp),
                format_timestamp(&next.updated_at),
            ],
        )?;
        insert_history(&tx, &entry)?;
        tx.commit()?;

        tracing::info!(order = %next.id, %from, %to, "changed service order status");
        self.publish("service_orders", ChangeKind::Update, &next.id);
        self.publish("service_order_status_history", ChangeKind::Insert, &entry.id);

        self.create_notification(
            NewNotification::new(
                NotificationType::OrderStatus,
                format!("Service order #{}: {}", next.order_number, to.label()),
                format!(
                    "{} moved from {} to {}",
                    next.description,
                    from.label(),
                    to.label()
                ),
            )
            .about(&next.id),
        )?;
        Ok(next)
    }

    /// Status changes of one order, oldest first
    pub fn status_history(&self, order_key: &str) -> Result<Vec<StatusHistory>, StoreError> {
        let order = self.get_order(order_key)?;
        let key = self.key("service_order_status_history", format!("order:{}", order.id))?;
        let conn = self.db.conn();
        self.cache.fetch(key, || -> Result<_, StoreError> {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM service_order_status_history WHERE order_id = ?1
                 ORDER BY changed_at, rowid",
                HISTORY_COLUMNS
            ))?;
            let entries = stmt
                .query_map(params![order.id], history_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(entries)
        })
    }
}
