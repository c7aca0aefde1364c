//! Notification center entities

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::entity::Entity;
use crate::core::identity::{EntityId, EntityPrefix};
use crate::core::validation::{Validate, ValidationErrors, Validator};

/// Notification category; preferences are set per category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    OrderStatus,
    LowStock,
    /// Produced by an external scheduler; stored and listed like any other
    MaintenanceReminder,
    System,
}

impl NotificationType {
    pub fn all() -> &'static [NotificationType] {
        &[
            NotificationType::OrderStatus,
            NotificationType::LowStock,
            NotificationType::MaintenanceReminder,
            NotificationType::System,
        ]
    }
}

impl std::fmt::Display for NotificationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotificationType::OrderStatus => write!(f, "order_status"),
            NotificationType::LowStock => write!(f, "low_stock"),
            NotificationType::MaintenanceReminder => write!(f, "maintenance_reminder"),
            NotificationType::System => write!(f, "system"),
        }
    }
}

impl std::str::FromStr for NotificationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "order_status" => Ok(NotificationType::OrderStatus),
            "low_stock" => Ok(NotificationType::LowStock),
            "maintenance_reminder" => Ok(NotificationType::MaintenanceReminder),
            "system" => Ok(NotificationType::System),
            _ => Err(format!(
                "Invalid notification type: {}. Use order_status, low_stock, maintenance_reminder, or system",
                s
            )),
        }
    }
}

/// A message for one user, or for the whole shop when `user_id` is empty
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: EntityId,
    pub shop_id: EntityId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<EntityId>,
    pub notification_type: NotificationType,
    pub title: String,
    pub message: String,
    /// Record the notification is about (order, part, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Content of a notification before fan-out
#[derive(Debug, Clone)]
pub struct NewNotification {
    pub notification_type: NotificationType,
    pub title: String,
    pub message: String,
    pub entity_id: Option<String>,
    /// Single recipient; `None` targets every active user
    pub user_id: Option<EntityId>,
}

impl NewNotification {
    pub fn new(
        notification_type: NotificationType,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            notification_type,
            title: title.into(),
            message: message.into(),
            entity_id: None,
            user_id: None,
        }
    }

    pub fn about(mut self, entity_id: &EntityId) -> Self {
        self.entity_id = Some(entity_id.to_string());
        self
    }

    pub fn to_user(mut self, user_id: EntityId) -> Self {
        self.user_id = Some(user_id);
        self
    }
}

impl Validate for NewNotification {
    fn validate(&self) -> Result<(), ValidationErrors> {
        Validator::new()
            .required("title", &self.title)
            .required("message", &self.message)
            .finish()
    }
}

impl Notification {
    pub fn new(shop_id: EntityId, user_id: Option<EntityId>, input: &NewNotification) -> Self {
        Self {
            id: EntityId::new(EntityPrefix::Ntf),
            shop_id,
            user_id,
            notification_type: input.notification_type,
            title: input.title.trim().to_string(),
            message: input.message.trim().to_string(),
            entity_id: input.entity_id.clone(),
            read_at: None,
            created_at: Utc::now(),
        }
    }

    pub fn is_read(&self) -> bool {
        self.read_at.is_some()
    }
}

impl Entity for Notification {
    const PREFIX: EntityPrefix = EntityPrefix::Ntf;

    fn id(&self) -> &EntityId {
        &self.id
    }

    fn label(&self) -> String {
        self.title.clone()
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Per-user opt-in for one notification type; missing rows mean enabled
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationPreference {
    pub id: EntityId,
    pub shop_id: EntityId,
    pub user_id: EntityId,
    pub notification_type: NotificationType,
    pub enabled: bool,
    pub updated_at: DateTime<Utc>,
}

impl NotificationPreference {
    pub fn new(
        shop_id: EntityId,
        user_id: EntityId,
        notification_type: NotificationType,
        enabled: bool,
    ) -> Self {
        Self {
            id: EntityId::new(EntityPrefix::Npref),
            shop_id,
            user_id,
            notification_type,
            enabled,
            updated_at: Utc::now(),
        }
    }
}

impl Entity for NotificationPreference {
    const PREFIX: EntityPrefix = EntityPrefix::Npref;

    fn id(&self) -> &EntityId {
        &self.id
    }

    fn label(&self) -> String {
        format!(
            "{} {}",
            self.notification_type,
            if self.enabled { "on" } else { "off" }
        )
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_round_trips_through_text() {
        for t in NotificationType::all() {
            assert_eq!(t.to_string().parse::<NotificationType>().unwrap(), *t);
        }
        assert_eq!(
            "low-stock".parse::<NotificationType>().unwrap(),
            NotificationType::LowStock
        );
    }

    #[test]
    fn test_new_notification_requires_title_and_message() {
        let n = NewNotification::new(NotificationType::System, "", " ");
        let err = n.validate().unwrap_err();
        assert!(err.has("title"));
        assert!(err.has("message"));
    }

    #[test]
    fn test_notification_starts_unread() {
        let shop = EntityId::new(EntityPrefix::Shop);
        let order = EntityId::new(EntityPrefix::So);
        let input = NewNotification::new(NotificationType::OrderStatus, "OS #1", "approved").about(&order);
        let n = Notification::new(shop, None, &input);
        assert!(!n.is_read());
        assert_eq!(n.entity_id, Some(order.to_string()));
        assert!(n.user_id.is_none());
    }
}
