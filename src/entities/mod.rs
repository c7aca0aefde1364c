//! Entity type definitions
//!
//! Every record belongs to a [`Shop`]:
//!
//! **Shop:**
//! - [`Shop`] - The tenant
//! - [`ShopUser`] - Staff members who receive notifications
//!
//! **Front desk:**
//! - [`Customer`] - People and companies served by the shop
//! - [`Vehicle`] - Customer vehicles identified by license plate
//! - [`ServiceOrder`] - Work tickets with line items and a status lifecycle
//!
//! **Inventory:**
//! - [`Part`] - Stocked parts with reorder thresholds
//! - [`StockMovement`] - Entries, exits, adjustments and returns
//!
//! **Notification center:**
//! - [`Notification`] and [`NotificationPreference`]

pub mod customer;
pub mod notification;
pub mod part;
pub mod service_order;
pub mod shop;
pub mod vehicle;

pub use customer::{Customer, CustomerPatch, NewCustomer};
pub use notification::{NewNotification, Notification, NotificationPreference, NotificationType};
pub use part::{MovementType, NewMovement, NewPart, Part, PartPatch, StockMovement};
pub use service_order::{
    ItemType, NewServiceItem, NewServiceOrder, OrderStatus, ServiceItem, ServiceOrder,
    ServiceOrderPatch, StatusHistory,
};
pub use shop::{NewShop, Shop, ShopPatch, ShopUser, UserRole};
pub use vehicle::{NewVehicle, Vehicle, VehiclePatch};

/// Trim an optional text field; blank becomes `None`
pub(crate) fn blank_to_none(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Patch an optional field: `None` keeps it, `Some("")` clears it
pub(crate) fn apply_optional(field: &mut Option<String>, value: Option<String>) {
    if let Some(v) = value {
        *field = blank_to_none(Some(v));
    }
}
