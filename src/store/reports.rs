//! Joined order rows for the reporting layer

use std::collections::HashMap;

use chrono::NaiveDate;
use rusqlite::params;

use super::orders::{item_from_row, order_from_row, ITEM_COLUMNS, ORDER_COLUMNS};
use super::Store;
use crate::core::error::StoreError;
use crate::core::identity::EntityId;
use crate::entities::ServiceItem;
use crate::reports::ReportRecord;

/// Qualify a column list with a table alias
fn qualified(columns: &str, alias: &str) -> String {
    columns
        .split(',')
        .map(|c| format!("{}.{}", alias, c.trim()))
        .collect::<Vec<_>>()
        .join(", ")
}

fn vehicle_name(make: &str, model: &str, year: Option<i32>) -> String {
    match year {
        Some(year) => format!("{} {} ({})", make, model, year),
        None => format!("{} {}", make, model),
    }
}

impl Store {
    /// Orders created between `from` and `to` (inclusive, UTC dates), oldest
    /// first, with customer, vehicle and line items attached
    pub fn report_records(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<ReportRecord>, StoreError> {
        let shop_id = self.shop_id()?;
        let key = self
            .key("service_orders", format!("report:{}:{}", from, to))?
            .depends_on(&["customers", "vehicles", "service_items"]);
        let conn = self.db.conn();
        let (from_text, to_text) = (from.format("%Y-%m-%d").to_string(), to.format("%Y-%m-%d").to_string());

        self.cache.fetch(key, || -> Result<_, StoreError> {
            let mut items: HashMap<EntityId, Vec<ServiceItem>> = HashMap::new();
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM service_items i
                 JOIN service_orders o ON o.id = i.order_id
                 WHERE o.shop_id = ?1 AND substr(o.created_at, 1, 10) BETWEEN ?2 AND ?3
                 ORDER BY i.created_at, i.rowid",
                qualified(ITEM_COLUMNS, "i")
            ))?;
            let rows = stmt.query_map(params![shop_id, from_text, to_text], item_from_row)?;
            for item in rows {
                let item = item?;
                items.entry(item.order_id.clone()).or_default().push(item);
            }

            let mut stmt = conn.prepare(&format!(
                "SELECT {}, c.name, v.plate, v.make, v.model, v.year
                 FROM service_orders o
                 JOIN customers c ON c.id = o.customer_id
                 JOIN vehicles v ON v.id = o.vehicle_id
                 WHERE o.shop_id = ?1 AND substr(o.created_at, 1, 10) BETWEEN ?2 AND ?3
                 ORDER BY o.created_at, o.order_number",
                qualified(ORDER_COLUMNS, "o")
            ))?;
            let records = stmt
                .query_map(params![shop_id, from_text, to_text], |row| {
                    let order = order_from_row(row)?;
                    Ok(ReportRecord {
                        customer_name: row.get(15)?,
                        vehicle_plate: row.get(16)?,
                        vehicle_name: vehicle_name(
                            &row.get::<_, String>(17)?,
                            &row.get::<_, String>(18)?,
                            row.get(19)?,
                        ),
                        items: Vec::new(),
                        order,
                    })
                })?
                .map(|record| {
                    record.map(|mut r| {
                        r.items = items.remove(&r.order.id).unwrap_or_default();
                        r
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;

            tracing::debug!(%from, %to, orders = records.len(), "fetched report rows");
            Ok(records)
        })
    }
}
