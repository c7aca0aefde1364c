//! Shop-scoped data access
//!
//! [`Store`] is the single entry point used by the CLI and the report
//! layer. Every query runs inside the selected shop, reads go through the
//! [`QueryCache`], and every mutation publishes a [`ChangeEvent`] that both
//! invalidates cached reads and reaches feed subscribers.

mod customers;
mod inventory;
mod notifications;
mod orders;
mod reports;
mod shops;
mod vehicles;

#[cfg(test)]
mod tests;

use std::sync::mpsc::Receiver;

use rusqlite::{params, Connection};

use crate::core::config::Config;
use crate::core::database::Database;
use crate::core::events::{ChangeEvent, ChangeFeed, ChangeKind};
use crate::core::identity::{EntityId, EntityPrefix};
use crate::core::query_cache::{QueryCache, QueryKey};
use crate::core::workspace::Workspace;

pub use crate::core::error::StoreError;
pub use customers::{CustomerFilter, CustomerHistory};
pub use inventory::PartFilter;
pub use notifications::NotificationFilter;
pub use orders::OrderFilter;
pub use vehicles::{VehicleFilter, VehicleHistory};

/// Backend handle bound to at most one shop at a time
pub struct Store {
    db: Database,
    cache: QueryCache,
    feed: ChangeFeed,
    shop_id: Option<EntityId>,
    actor: String,
    low_stock_notifications: bool,
}

impl Store {
    /// Open the workspace database
    pub fn open(workspace: &Workspace, config: &Config) -> Result<Self, StoreError> {
        let db = Database::open(&workspace.database_path())?;
        Ok(Self::with_database(db, config))
    }

    /// Store over a private in-memory database
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Ok(Self::with_database(
            Database::open_in_memory()?,
            &Config::default(),
        ))
    }

    pub fn with_database(db: Database, config: &Config) -> Self {
        Self {
            db,
            cache: QueryCache::new(config.cache_ttl()),
            feed: ChangeFeed::new(),
            shop_id: None,
            actor: config.user(),
            low_stock_notifications: config.low_stock_notifications(),
        }
    }

    /// Identity recorded in history rows and stock movements
    pub fn set_actor(&mut self, actor: impl Into<String>) {
        self.actor = actor.into();
    }

    pub fn actor(&self) -> &str {
        &self.actor
    }

    pub fn set_low_stock_notifications(&mut self, enabled: bool) {
        self.low_stock_notifications = enabled;
    }

    /// Scope all further operations to the shop matching `key` (id or name)
    pub fn select_shop(&mut self, key: &str) -> Result<crate::entities::Shop, StoreError> {
        let shop = self.get_shop(key)?;
        tracing::debug!(shop = %shop.id, name = %shop.name, "selected shop");
        self.shop_id = Some(shop.id.clone());
        Ok(shop)
    }

    /// Currently selected shop
    pub fn shop_id(&self) -> Result<&EntityId, StoreError> {
        self.shop_id.as_ref().ok_or(StoreError::NoShopSelected)
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Receive every change event
    pub fn subscribe(&mut self) -> Receiver<ChangeEvent> {
        self.feed.subscribe()
    }

    /// Receive change events for the given tables only
    pub fn subscribe_to(&mut self, tables: &[&'static str]) -> Receiver<ChangeEvent> {
        self.feed.subscribe_to(tables)
    }

    /// Invalidate cached reads of `table` and notify subscribers
    fn publish(&mut self, table: &'static str, kind: ChangeKind, row_id: &EntityId) {
        self.cache.invalidate_table(table);
        let mut event = ChangeEvent::new(table, kind, row_id);
        if let Some(shop) = &self.shop_id {
            event = event.in_shop(shop);
        }
        tracing::debug!(table, kind = ?kind, row = %row_id, "published change");
        self.feed.publish(event);
    }

    /// Deletes cascade through foreign keys, so drop every cached read
    fn publish_cascade(&mut self, table: &'static str, row_id: &EntityId) {
        self.cache.invalidate_all();
        self.publish(table, ChangeKind::Delete, row_id);
    }

    /// Cache key scoped to the selected shop
    fn key(&self, table: &'static str, filter: impl std::fmt::Display) -> Result<QueryKey, StoreError> {
        Ok(QueryKey::new(table, format!("{}|{}", self.shop_id()?, filter)))
    }

    /// Resolve a user-supplied key to a row id in the selected shop
    ///
    /// Tries the natural key column first (when given), then the exact id,
    /// then a unique partial id match.
    fn resolve(
        &self,
        prefix: EntityPrefix,
        entity: &'static str,
        key: &str,
        natural: Option<(&'static str, String)>,
    ) -> Result<EntityId, StoreError> {
        let shop_id = self.shop_id()?;
        resolve_in(self.db.conn(), prefix.table(), entity, Some(shop_id), key, natural)
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("shop_id", &self.shop_id)
            .field("actor", &self.actor)
            .field("cache", &self.cache)
            .finish()
    }
}

fn resolve_in(
    conn: &Connection,
    table: &'static str,
    entity: &'static str,
    shop_id: Option<&EntityId>,
    key: &str,
    natural: Option<(&'static str, String)>,
) -> Result<EntityId, StoreError> {
    let key = key.trim();
    if key.is_empty() {
        return Err(StoreError::not_found(entity, key));
    }
    let scope = if shop_id.is_some() { " AND shop_id = ?2" } else { "" };
    let shop = shop_id.map(|s| s.to_string()).unwrap_or_default();

    let lookup = |sql: String, value: &str| -> Result<Vec<EntityId>, StoreError> {
        let mut stmt = conn.prepare(&sql)?;
        let rows = if shop_id.is_some() {
            stmt.query_map(params![value, shop], |row| row.get::<_, EntityId>(0))?
                .collect::<Result<Vec<_>, _>>()?
        } else {
            stmt.query_map(params![value], |row| row.get::<_, EntityId>(0))?
                .collect::<Result<Vec<_>, _>>()?
        };
        Ok(rows)
    };

    if let Some((column, value)) = natural {
        let hits = lookup(
            format!("SELECT id FROM {} WHERE {} = ?1{}", table, column, scope),
            &value,
        )?;
        if let Some(id) = hits.into_iter().next() {
            return Ok(id);
        }
    }

    let exact = lookup(
        format!("SELECT id FROM {} WHERE id = ?1{}", table, scope),
        &key.to_uppercase(),
    )?;
    if let Some(id) = exact.into_iter().next() {
        return Ok(id);
    }

    let mut partial = lookup(
        format!("SELECT id FROM {} WHERE id LIKE ?1{}", table, scope),
        &format!("%{}%", key.to_uppercase()),
    )?;
    match partial.len() {
        0 => Err(StoreError::not_found(entity, key)),
        1 => Ok(partial.remove(0)),
        count => Err(StoreError::Ambiguous {
            entity,
            key: key.to_string(),
            count,
        }),
    }
}

/// Text form of an optional date bound used in SQL comparisons
fn date_text(date: Option<chrono::NaiveDate>) -> Option<String> {
    date.map(|d| d.format("%Y-%m-%d").to_string())
}
