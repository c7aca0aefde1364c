//! Shops and shop staff

use rusqlite::{params, Row};

use super::{resolve_in, Store};
use crate::core::database::{get_enum, get_timestamp};
use crate::core::entity::format_timestamp;
use crate::core::error::StoreError;
use crate::core::events::ChangeKind;
use crate::core::identity::{EntityId, EntityPrefix};
use crate::core::query_cache::QueryKey;
use crate::core::validation::Validate;
use crate::entities::{NewShop, Shop, ShopPatch, ShopUser, UserRole};

const SHOP_COLUMNS: &str = "id, name, document, phone, email, address, created_at, updated_at";

const USER_COLUMNS: &str = "id, shop_id, name, email, role, active, created_at, updated_at";

fn shop_from_row(row: &Row<'_>) -> rusqlite::Result<Shop> {
    Ok(Shop {
        id: row.get(0)?,
        name: row.get(1)?,
        document: row.get(2)?,
        phone: row.get(3)?,
        email: row.get(4)?,
        address: row.get(5)?,
        created_at: get_timestamp(row, 6)?,
        updated_at: get_timestamp(row, 7)?,
    })
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<ShopUser> {
    Ok(ShopUser {
        id: row.get(0)?,
        shop_id: row.get(1)?,
        name: row.get(2)?,
        email: row.get(3)?,
        role: get_enum(row, 4)?,
        active: row.get(5)?,
        created_at: get_timestamp(row, 6)?,
        updated_at: get_timestamp(row, 7)?,
    })
}

impl Store {
    // =====================================================================
    // Shops
    // =====================================================================

    pub fn create_shop(&mut self, input: NewShop) -> Result<Shop, StoreError> {
        let shop = Shop::new(input);
        shop.validate()?;

        self.db.conn().execute(
            &format!("INSERT INTO shops ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)", SHOP_COLUMNS),
            params![
                shop.id,
                shop.name,
                shop.document,
                shop.phone,
                shop.email,
                shop.address,
                format_timestamp(&shop.created_at),
                format_timestamp(&shop.updated_at),
            ],
        )?;
        tracing::info!(shop = %shop.id, name = %shop.name, "created shop");
        self.publish("shops", ChangeKind::Insert, &shop.id);
        Ok(shop)
    }

    pub fn list_shops(&self) -> Result<Vec<Shop>, StoreError> {
        let conn = self.db.conn();
        self.cache.fetch(QueryKey::new("shops", "all"), || -> Result<_, StoreError> {
            let mut stmt =
                conn.prepare(&format!("SELECT {} FROM shops ORDER BY name", SHOP_COLUMNS))?;
            let shops = stmt
                .query_map([], shop_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(shops)
        })
    }

    /// Find a shop by id, partial id or exact name
    pub fn get_shop(&self, key: &str) -> Result<Shop, StoreError> {
        let conn = self.db.conn();
        let id = resolve_in(
            conn,
            "shops",
            "shop",
            None,
            key,
            Some(("name", key.trim().to_string())),
        )?;
        self.cache.fetch(QueryKey::new("shops", format!("get:{}", id)), || -> Result<_, StoreError> {
            Ok(conn.query_row(
                &format!("SELECT {} FROM shops WHERE id = ?1", SHOP_COLUMNS),
                params![id],
                shop_from_row,
            )?)
        })
    }

    pub fn update_shop(&mut self, key: &str, patch: ShopPatch) -> Result<Shop, StoreError> {
        let shop = self.get_shop(key)?.apply(patch);
        shop.validate()?;

        self.db.conn().execute(
            "UPDATE shops SET name = ?2, document = ?3, phone = ?4, email = ?5, address = ?6, updated_at = ?7
             WHERE id = ?1",
            params![
                shop.id,
                shop.name,
                shop.document,
                shop.phone,
                shop.email,
                shop.address,
                format_timestamp(&shop.updated_at),
            ],
        )?;
        self.publish("shops", ChangeKind::Update, &shop.id);
        Ok(shop)
    }

    /// Delete a shop and, through cascades, everything it owns
    pub fn delete_shop(&mut self, key: &str) -> Result<Shop, StoreError> {
        let shop = self.get_shop(key)?;
        self.db
            .conn()
            .execute("DELETE FROM shops WHERE id = ?1", params![shop.id])?;
        if self.shop_id.as_ref() == Some(&shop.id) {
            self.shop_id = None;
        }
        tracing::info!(shop = %shop.id, "deleted shop");
        self.publish_cascade("shops", &shop.id);
        Ok(shop)
    }

    // =====================================================================
    // Staff
    // =====================================================================

    pub fn add_user(
        &mut self,
        name: &str,
        email: &str,
        role: UserRole,
    ) -> Result<ShopUser, StoreError> {
        let user = ShopUser::new(self.shop_id()?.clone(), name.to_string(), email.to_string(), role);
        user.validate()?;

        self.db.conn().execute(
            &format!("INSERT INTO shop_users ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)", USER_COLUMNS),
            params![
                user.id,
                user.shop_id,
                user.name,
                user.email,
                user.role.to_string(),
                user.active,
                format_timestamp(&user.created_at),
                format_timestamp(&user.updated_at),
            ],
        )?;
        self.publish("shop_users", ChangeKind::Insert, &user.id);
        Ok(user)
    }

    /// Staff of the selected shop, optionally including deactivated accounts
    pub fn list_users(&self, include_inactive: bool) -> Result<Vec<ShopUser>, StoreError> {
        let shop_id = self.shop_id()?;
        let key = self.key("shop_users", format!("list:{}", include_inactive))?;
        let conn = self.db.conn();
        self.cache.fetch(key, || -> Result<_, StoreError> {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM shop_users WHERE shop_id = ?1 AND (active = 1 OR ?2) ORDER BY name",
                USER_COLUMNS
            ))?;
            let users = stmt
                .query_map(params![shop_id, include_inactive], user_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(users)
        })
    }

    /// Find a staff member by id, partial id or e-mail
    pub fn get_user(&self, key: &str) -> Result<ShopUser, StoreError> {
        let id = self.resolve(
            EntityPrefix::Usr,
            "user",
            key,
            Some(("email", key.trim().to_lowercase())),
        )?;
        self.load_user(&id)
    }

    /// Staff member matching the configured identity (id, e-mail or name)
    pub fn find_user(&self, identity: &str) -> Result<Option<ShopUser>, StoreError> {
        let identity = identity.trim();
        Ok(self.list_users(true)?.into_iter().find(|u| {
            u.id.to_string() == identity
                || u.email.eq_ignore_ascii_case(identity)
                || u.name.eq_ignore_ascii_case(identity)
        }))
    }

    fn load_user(&self, id: &EntityId) -> Result<ShopUser, StoreError> {
        let key = self.key("shop_users", format!("get:{}", id))?;
        let conn = self.db.conn();
        self.cache.fetch(key, || -> Result<_, StoreError> {
            Ok(conn.query_row(
                &format!("SELECT {} FROM shop_users WHERE id = ?1", USER_COLUMNS),
                params![id],
                user_from_row,
            )?)
        })
    }

    /// Deactivated users stop receiving notifications but keep their history
    pub fn deactivate_user(&mut self, key: &str) -> Result<ShopUser, StoreError> {
        let mut user = self.get_user(key)?;
        user.active = false;
        user.updated_at = chrono::Utc::now();
        self.db.conn().execute(
            "UPDATE shop_users SET active = 0, updated_at = ?2 WHERE id = ?1",
            params![user.id, format_timestamp(&user.updated_at)],
        )?;
        self.publish("shop_users", ChangeKind::Update, &user.id);
        Ok(user)
    }
}
