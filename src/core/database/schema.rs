//! Database schema initialization

use rusqlite::params;

use super::{Database, SCHEMA_VERSION};
use crate::core::error::StoreError;

impl Database {
    /// Create every table and index on a fresh database
    pub(super) fn init_schema(&mut self) -> Result<(), StoreError> {
        self.conn.execute_batch(
            r#"
            -- Schema version tracking
            CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY
            );

            -- Tenants
            CREATE TABLE IF NOT EXISTS shops (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL UNIQUE,
                document TEXT,
                phone TEXT,
                email TEXT,
                address TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            -- Staff members of a shop
            CREATE TABLE IF NOT EXISTS shop_users (
                id TEXT PRIMARY KEY,
                shop_id TEXT NOT NULL REFERENCES shops(id) ON DELETE CASCADE,
                name TEXT NOT NULL,
                email TEXT NOT NULL,
                role TEXT NOT NULL,
                active INTEGER NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                UNIQUE (shop_id, email)
            );

            CREATE TABLE IF NOT EXISTS customers (
                id TEXT PRIMARY KEY,
                shop_id TEXT NOT NULL REFERENCES shops(id) ON DELETE CASCADE,
                name TEXT NOT NULL,
                email TEXT,
                phone TEXT,
                cpf TEXT,
                address TEXT,
                notes TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                UNIQUE (shop_id, cpf)
            );
            CREATE INDEX IF NOT EXISTS idx_customers_shop ON customers(shop_id, name);

            CREATE TABLE IF NOT EXISTS vehicles (
                id TEXT PRIMARY KEY,
                shop_id TEXT NOT NULL REFERENCES shops(id) ON DELETE CASCADE,
                customer_id TEXT NOT NULL REFERENCES customers(id) ON DELETE CASCADE,
                plate TEXT NOT NULL,
                make TEXT NOT NULL,
                model TEXT NOT NULL,
                year INTEGER,
                color TEXT,
                vin TEXT,
                mileage INTEGER,
                notes TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                UNIQUE (shop_id, plate)
            );
            CREATE INDEX IF NOT EXISTS idx_vehicles_customer ON vehicles(customer_id);

            CREATE TABLE IF NOT EXISTS service_orders (
                id TEXT PRIMARY KEY,
                shop_id TEXT NOT NULL REFERENCES shops(id) ON DELETE CASCADE,
                order_number INTEGER NOT NULL,
                customer_id TEXT NOT NULL REFERENCES customers(id) ON DELETE CASCADE,
                vehicle_id TEXT NOT NULL REFERENCES vehicles(id) ON DELETE CASCADE,
                status TEXT NOT NULL,
                description TEXT NOT NULL,
                notes TEXT,
                mileage INTEGER,
                discount TEXT NOT NULL DEFAULT '0',
                total_amount TEXT NOT NULL DEFAULT '0',
                estimated_completion TEXT,
                completed_at TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                UNIQUE (shop_id, order_number)
            );
            CREATE INDEX IF NOT EXISTS idx_orders_shop_created ON service_orders(shop_id, created_at);
            CREATE INDEX IF NOT EXISTS idx_orders_customer ON service_orders(customer_id);
            CREATE INDEX IF NOT EXISTS idx_orders_vehicle ON service_orders(vehicle_id);
            CREATE INDEX IF NOT EXISTS idx_orders_status ON service_orders(status);

            CREATE TABLE IF NOT EXISTS parts (
                id TEXT PRIMARY KEY,
                shop_id TEXT NOT NULL REFERENCES shops(id) ON DELETE CASCADE,
                code TEXT NOT NULL,
                name TEXT NOT NULL,
                category TEXT,
                unit TEXT NOT NULL DEFAULT 'un',
                cost_price TEXT NOT NULL DEFAULT '0',
                sale_price TEXT NOT NULL DEFAULT '0',
                quantity TEXT NOT NULL DEFAULT '0',
                min_quantity TEXT NOT NULL DEFAULT '0',
                location TEXT,
                active INTEGER NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                UNIQUE (shop_id, code)
            );

            CREATE TABLE IF NOT EXISTS service_items (
                id TEXT PRIMARY KEY,
                shop_id TEXT NOT NULL REFERENCES shops(id) ON DELETE CASCADE,
                order_id TEXT NOT NULL REFERENCES service_orders(id) ON DELETE CASCADE,
                item_type TEXT NOT NULL,
                service_type TEXT,
                description TEXT NOT NULL,
                quantity TEXT NOT NULL,
                unit_price TEXT NOT NULL,
                total_price TEXT NOT NULL,
                part_id TEXT REFERENCES parts(id) ON DELETE SET NULL,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_items_order ON service_items(order_id);

            CREATE TABLE IF NOT EXISTS service_order_status_history (
                id TEXT PRIMARY KEY,
                shop_id TEXT NOT NULL REFERENCES shops(id) ON DELETE CASCADE,
                order_id TEXT NOT NULL REFERENCES service_orders(id) ON DELETE CASCADE,
                from_status TEXT,
                to_status TEXT NOT NULL,
                changed_by TEXT NOT NULL,
                note TEXT,
                changed_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_history_order ON service_order_status_history(order_id);

            CREATE TABLE IF NOT EXISTS stock_movements (
                id TEXT PRIMARY KEY,
                shop_id TEXT NOT NULL REFERENCES shops(id) ON DELETE CASCADE,
                part_id TEXT NOT NULL REFERENCES parts(id) ON DELETE CASCADE,
                movement_type TEXT NOT NULL,
                quantity TEXT NOT NULL,
                previous_quantity TEXT NOT NULL,
                new_quantity TEXT NOT NULL,
                unit_cost TEXT,
                reason TEXT,
                order_id TEXT REFERENCES service_orders(id) ON DELETE SET NULL,
                created_by TEXT NOT NULL,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_movements_part ON stock_movements(part_id, created_at);

            CREATE TABLE IF NOT EXISTS notifications (
                id TEXT PRIMARY KEY,
                shop_id TEXT NOT NULL REFERENCES shops(id) ON DELETE CASCADE,
                user_id TEXT REFERENCES shop_users(id) ON DELETE CASCADE,
                notification_type TEXT NOT NULL,
                title TEXT NOT NULL,
                message TEXT NOT NULL,
                entity_id TEXT,
                read_at TEXT,
                created_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_notifications_shop ON notifications(shop_id, created_at);

            CREATE TABLE IF NOT EXISTS notification_preferences (
                id TEXT PRIMARY KEY,
                shop_id TEXT NOT NULL REFERENCES shops(id) ON DELETE CASCADE,
                user_id TEXT NOT NULL REFERENCES shop_users(id) ON DELETE CASCADE,
                notification_type TEXT NOT NULL,
                enabled INTEGER NOT NULL DEFAULT 1,
                updated_at TEXT NOT NULL,
                UNIQUE (user_id, notification_type)
            );
            "#,
        )?;

        self.conn.execute(
            "INSERT OR REPLACE INTO schema_version (version) VALUES (?1)",
            params![SCHEMA_VERSION],
        )?;

        Ok(())
    }
}
