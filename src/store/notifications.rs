//! Notification center: fan-out, read state and per-user preferences

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};

use super::Store;
use crate::core::database::{get_enum, get_opt_timestamp, get_timestamp};
use crate::core::entity::format_timestamp;
use crate::core::error::StoreError;
use crate::core::events::ChangeKind;
use crate::core::identity::{EntityId, EntityPrefix};
use crate::core::validation::Validate;
use crate::entities::{NewNotification, Notification, NotificationPreference, NotificationType};

const COLUMNS: &str =
    "id, shop_id, user_id, notification_type, title, message, entity_id, read_at, created_at";

const PREFERENCE_COLUMNS: &str = "id, shop_id, user_id, notification_type, enabled, updated_at";

/// Filter for listing notifications
#[derive(Debug, Clone, Default)]
pub struct NotificationFilter {
    /// Rows addressed to this user plus shop-wide rows; `None` lists everything
    pub user_id: Option<EntityId>,
    pub unread_only: bool,
    pub notification_type: Option<NotificationType>,
    /// Only rows created strictly after this instant
    pub since: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
}

fn from_row(row: &Row<'_>) -> rusqlite::Result<Notification> {
    Ok(Notification {
        id: row.get(0)?,
        shop_id: row.get(1)?,
        user_id: row.get(2)?,
        notification_type: get_enum(row, 3)?,
        title: row.get(4)?,
        message: row.get(5)?,
        entity_id: row.get(6)?,
        read_at: get_opt_timestamp(row, 7)?,
        created_at: get_timestamp(row, 8)?,
    })
}

fn preference_from_row(row: &Row<'_>) -> rusqlite::Result<NotificationPreference> {
    Ok(NotificationPreference {
        id: row.get(0)?,
        shop_id: row.get(1)?,
        user_id: row.get(2)?,
        notification_type: get_enum(row, 3)?,
        enabled: row.get(4)?,
        updated_at: get_timestamp(row, 5)?,
    })
}

fn query_notifications(
    conn: &Connection,
    shop_id: &EntityId,
    filter: &NotificationFilter,
) -> Result<Vec<Notification>, StoreError> {
    let mut sql = format!("SELECT {} FROM notifications WHERE shop_id = ?", COLUMNS);
    let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(shop_id.clone())];

    if let Some(ref user_id) = filter.user_id {
        sql.push_str(" AND (user_id = ? OR user_id IS NULL)");
        params_vec.push(Box::new(user_id.clone()));
    }

    if filter.unread_only {
        sql.push_str(" AND read_at IS NULL");
    }

    if let Some(kind) = filter.notification_type {
        sql.push_str(" AND notification_type = ?");
        params_vec.push(Box::new(kind.to_string()));
    }

    if let Some(ref since) = filter.since {
        sql.push_str(" AND created_at > ?");
        params_vec.push(Box::new(format_timestamp(since)));
    }

    sql.push_str(" ORDER BY created_at DESC, rowid DESC");

    if let Some(limit) = filter.limit {
        sql.push_str(&format!(" LIMIT {}", limit));
    }

    let mut stmt = conn.prepare(&sql)?;
    let params_refs: Vec<&dyn rusqlite::ToSql> = params_vec.iter().map(|p| p.as_ref()).collect();
    let rows = stmt
        .query_map(params_refs.as_slice(), from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

impl Store {
    /// Deliver a notification
    ///
    /// With an explicit recipient one row is written if that user has the
    /// type enabled. Otherwise one row goes to every active user with the
    /// type enabled; a shop without staff gets a single shop-wide row.
    pub fn create_notification(
        &mut self,
        input: NewNotification,
    ) -> Result<Vec<Notification>, StoreError> {
        input.validate()?;
        let shop_id = self.shop_id()?.clone();
        let disabled = self.disabled_users(input.notification_type)?;

        let recipients: Vec<Option<EntityId>> = match input.user_id {
            Some(ref user_id) => {
                let user = self.get_user(&user_id.to_string())?;
                if disabled.contains(&user.id) {
                    Vec::new()
                } else {
                    vec![Some(user.id)]
                }
            }
            None => {
                let users = self.list_users(false)?;
                if users.is_empty() {
                    vec![None]
                } else {
                    users
                        .into_iter()
                        .filter(|u| !disabled.contains(&u.id))
                        .map(|u| Some(u.id))
                        .collect()
                }
            }
        };

        let rows: Vec<Notification> = recipients
            .into_iter()
            .map(|user_id| Notification::new(shop_id.clone(), user_id, &input))
            .collect();

        let tx = self.db.conn_mut().transaction()?;
        for n in &rows {
            tx.execute(
                &format!(
                    "INSERT INTO notifications ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                    COLUMNS
                ),
                params![
                    n.id,
                    n.shop_id,
                    n.user_id,
                    n.notification_type.to_string(),
                    n.title,
                    n.message,
                    n.entity_id,
                    n.read_at.as_ref().map(format_timestamp),
                    format_timestamp(&n.created_at),
                ],
            )?;
        }
        tx.commit()?;

        tracing::debug!(
            kind = %input.notification_type,
            recipients = rows.len(),
            "delivered notification"
        );
        for n in &rows {
            self.publish("notifications", ChangeKind::Insert, &n.id);
        }
        Ok(rows)
    }

    /// Users who switched the given type off
    fn disabled_users(&self, kind: NotificationType) -> Result<HashSet<EntityId>, StoreError> {
        let mut stmt = self.db.conn().prepare(
            "SELECT user_id FROM notification_preferences
             WHERE shop_id = ?1 AND notification_type = ?2 AND enabled = 0",
        )?;
        let users = stmt
            .query_map(params![self.shop_id()?, kind.to_string()], |row| row.get(0))?
            .collect::<Result<HashSet<EntityId>, _>>()?;
        Ok(users)
    }

    /// Notifications newest first
    pub fn list_notifications(
        &self,
        filter: &NotificationFilter,
    ) -> Result<Vec<Notification>, StoreError> {
        let shop_id = self.shop_id()?;
        let key = self.key("notifications", format!("list:{:?}", filter))?;
        let conn = self.db.conn();
        self.cache.fetch(key, || query_notifications(conn, shop_id, filter))
    }

    /// Uncached read for polling loops that must see rows written by other processes
    pub fn poll_notifications(
        &self,
        filter: &NotificationFilter,
    ) -> Result<Vec<Notification>, StoreError> {
        query_notifications(self.db.conn(), self.shop_id()?, filter)
    }

    pub fn get_notification(&self, key: &str) -> Result<Notification, StoreError> {
        let id = self.resolve(EntityPrefix::Ntf, "notification", key, None)?;
        Ok(self.db.conn().query_row(
            &format!("SELECT {} FROM notifications WHERE id = ?1", COLUMNS),
            params![id],
            from_row,
        )?)
    }

    /// Mark one notification read; already read rows keep their timestamp
    pub fn mark_read(&mut self, key: &str) -> Result<Notification, StoreError> {
        let mut notification = self.get_notification(key)?;
        if notification.read_at.is_none() {
            let now = Utc::now();
            self.db.conn().execute(
                "UPDATE notifications SET read_at = ?2 WHERE id = ?1 AND read_at IS NULL",
                params![notification.id, format_timestamp(&now)],
            )?;
            notification.read_at = Some(now);
            self.publish("notifications", ChangeKind::Update, &notification.id);
        }
        Ok(notification)
    }

    /// Mark every unread notification visible to `user_id` read; returns the count
    pub fn mark_all_read(&mut self, user_id: Option<&EntityId>) -> Result<usize, StoreError> {
        let shop_id = self.shop_id()?.clone();
        let now = format_timestamp(&Utc::now());
        let tx = self.db.conn_mut().transaction()?;
        let ids = {
            let mut stmt = tx.prepare(
                "SELECT id FROM notifications
                 WHERE shop_id = ?1 AND read_at IS NULL
                   AND (?2 IS NULL OR user_id = ?2 OR user_id IS NULL)
                 ORDER BY created_at, id",
            )?;
            let ids = stmt
                .query_map(params![shop_id, user_id], |row| row.get(0))?
                .collect::<Result<Vec<EntityId>, _>>()?;
            ids
        };
        for id in &ids {
            tx.execute(
                "UPDATE notifications SET read_at = ?2 WHERE id = ?1",
                params![id, now],
            )?;
        }
        tx.commit()?;

        for id in &ids {
            self.publish("notifications", ChangeKind::Update, id);
        }
        Ok(ids.len())
    }

    pub fn delete_notification(&mut self, key: &str) -> Result<Notification, StoreError> {
        let notification = self.get_notification(key)?;
        self.db.conn().execute(
            "DELETE FROM notifications WHERE id = ?1",
            params![notification.id],
        )?;
        self.publish("notifications", ChangeKind::Delete, &notification.id);
        Ok(notification)
    }

    pub fn unread_count(&self, user_id: Option<&EntityId>) -> Result<i64, StoreError> {
        let shop_id = self.shop_id()?;
        let key = self.key("notifications", format!("unread:{:?}", user_id))?;
        let conn = self.db.conn();
        self.cache.fetch(key, || -> Result<i64, StoreError> {
            let count = match user_id {
                Some(user_id) => conn.query_row(
                    "SELECT COUNT(*) FROM notifications
                     WHERE shop_id = ?1 AND read_at IS NULL AND (user_id = ?2 OR user_id IS NULL)",
                    params![shop_id, user_id],
                    |row| row.get(0),
                )?,
                None => conn.query_row(
                    "SELECT COUNT(*) FROM notifications WHERE shop_id = ?1 AND read_at IS NULL",
                    params![shop_id],
                    |row| row.get(0),
                )?,
            };
            Ok(count)
        })
    }

    /// Turn one notification type on or off for a user
    pub fn set_preference(
        &mut self,
        user_key: &str,
        kind: NotificationType,
        enabled: bool,
    ) -> Result<NotificationPreference, StoreError> {
        let user = self.get_user(user_key)?;
        let pref = NotificationPreference::new(user.shop_id.clone(), user.id.clone(), kind, enabled);
        self.db.conn().execute(
            &format!(
                "INSERT INTO notification_preferences ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT (user_id, notification_type)
                 DO UPDATE SET enabled = excluded.enabled, updated_at = excluded.updated_at",
                PREFERENCE_COLUMNS
            ),
            params![
                pref.id,
                pref.shop_id,
                pref.user_id,
                pref.notification_type.to_string(),
                pref.enabled,
                format_timestamp(&pref.updated_at),
            ],
        )?;
        let stored = self.db.conn().query_row(
            &format!(
                "SELECT {} FROM notification_preferences WHERE user_id = ?1 AND notification_type = ?2",
                PREFERENCE_COLUMNS
            ),
            params![user.id, kind.to_string()],
            preference_from_row,
        )?;
        self.publish("notification_preferences", ChangeKind::Update, &stored.id);
        Ok(stored)
    }

    /// Stored preference rows of a user
    pub fn list_preferences(&self, user_key: &str) -> Result<Vec<NotificationPreference>, StoreError> {
        let user = self.get_user(user_key)?;
        let key = self.key("notification_preferences", format!("user:{}", user.id))?;
        let conn = self.db.conn();
        self.cache.fetch(key, || -> Result<_, StoreError> {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM notification_preferences WHERE user_id = ?1 ORDER BY notification_type",
                PREFERENCE_COLUMNS
            ))?;
            let prefs = stmt
                .query_map(params![user.id], preference_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(prefs)
        })
    }

    /// Every notification type with the user's effective setting
    pub fn effective_preferences(
        &self,
        user_key: &str,
    ) -> Result<Vec<(NotificationType, bool)>, StoreError> {
        let stored = self.list_preferences(user_key)?;
        Ok(NotificationType::all()
            .iter()
            .map(|kind| {
                let enabled = stored
                    .iter()
                    .find(|p| p.notification_type == *kind)
                    .map_or(true, |p| p.enabled);
                (*kind, enabled)
            })
            .collect())
    }
}
