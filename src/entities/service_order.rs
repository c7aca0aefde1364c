//! Service order entity, its status lifecycle, line items and history

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::core::entity::Entity;
use crate::core::identity::{EntityId, EntityPrefix};
use crate::core::validation::{Validate, ValidationErrors, Validator, AMOUNT_TOO_LARGE};
use crate::entities::{apply_optional, blank_to_none};

/// Service order status
///
/// `pending -> approved -> in_progress -> waiting_parts -> completed`, with
/// `waiting_parts -> in_progress` when parts arrive, `in_progress ->
/// completed` directly, and `canceled` from any non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Pending,
    Approved,
    InProgress,
    WaitingParts,
    Completed,
    Canceled,
}

impl OrderStatus {
    /// All statuses in lifecycle order
    pub fn all() -> &'static [OrderStatus] {
        &[
            OrderStatus::Pending,
            OrderStatus::Approved,
            OrderStatus::InProgress,
            OrderStatus::WaitingParts,
            OrderStatus::Completed,
            OrderStatus::Canceled,
        ]
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Canceled)
    }

    /// States reachable in one step
    pub fn next_states(&self) -> &'static [OrderStatus] {
        match self {
            OrderStatus::Pending => &[OrderStatus::Approved, OrderStatus::Canceled],
            OrderStatus::Approved => &[OrderStatus::InProgress, OrderStatus::Canceled],
            OrderStatus::InProgress => &[
                OrderStatus::WaitingParts,
                OrderStatus::Completed,
                OrderStatus::Canceled,
            ],
            OrderStatus::WaitingParts => &[
                OrderStatus::InProgress,
                OrderStatus::Completed,
                OrderStatus::Canceled,
            ],
            OrderStatus::Completed | OrderStatus::Canceled => &[],
        }
    }

    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        self.next_states().contains(&next)
    }

    /// Human label for tables and notifications
    pub fn label(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "Pending",
            OrderStatus::Approved => "Approved",
            OrderStatus::InProgress => "In progress",
            OrderStatus::WaitingParts => "Waiting parts",
            OrderStatus::Completed => "Completed",
            OrderStatus::Canceled => "Canceled",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatus::Pending => write!(f, "pending"),
            OrderStatus::Approved => write!(f, "approved"),
            OrderStatus::InProgress => write!(f, "in_progress"),
            OrderStatus::WaitingParts => write!(f, "waiting_parts"),
            OrderStatus::Completed => write!(f, "completed"),
            OrderStatus::Canceled => write!(f, "canceled"),
        }
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "pending" => Ok(OrderStatus::Pending),
            "approved" => Ok(OrderStatus::Approved),
            "in_progress" => Ok(OrderStatus::InProgress),
            "waiting_parts" => Ok(OrderStatus::WaitingParts),
            "completed" => Ok(OrderStatus::Completed),
            "canceled" | "cancelled" => Ok(OrderStatus::Canceled),
            _ => Err(format!(
                "Invalid order status: {}. Use pending, approved, in_progress, waiting_parts, completed, or canceled",
                s
            )),
        }
    }
}

/// A work ticket for one vehicle visit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceOrder {
    pub id: EntityId,
    pub shop_id: EntityId,
    /// Sequential number within the shop
    pub order_number: i64,
    pub customer_id: EntityId,
    pub vehicle_id: EntityId,
    pub status: OrderStatus,
    pub description: String,
    /// Free text; may carry a "Técnico: Name" attribution
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mileage: Option<i64>,
    pub discount: Decimal,
    pub total_amount: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_completion: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct NewServiceOrder {
    pub customer_id: Option<EntityId>,
    pub vehicle_id: Option<EntityId>,
    pub description: String,
    pub notes: Option<String>,
    pub mileage: Option<i64>,
    pub discount: Decimal,
    pub estimated_completion: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default)]
pub struct ServiceOrderPatch {
    pub description: Option<String>,
    pub notes: Option<String>,
    pub mileage: Option<i64>,
    pub discount: Option<Decimal>,
    pub estimated_completion: Option<NaiveDate>,
}

impl ServiceOrder {
    pub fn new(
        shop_id: EntityId,
        order_number: i64,
        customer_id: EntityId,
        vehicle_id: EntityId,
        input: NewServiceOrder,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: EntityId::new(EntityPrefix::So),
            shop_id,
            order_number,
            customer_id,
            vehicle_id,
            status: OrderStatus::Pending,
            description: input.description.trim().to_string(),
            notes: blank_to_none(input.notes),
            mileage: input.mileage,
            discount: input.discount,
            total_amount: Decimal::ZERO,
            estimated_completion: input.estimated_completion,
            completed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn apply(&self, patch: ServiceOrderPatch) -> Self {
        let mut next = self.clone();
        if let Some(description) = patch.description {
            next.description = description.trim().to_string();
        }
        apply_optional(&mut next.notes, patch.notes);
        if patch.mileage.is_some() {
            next.mileage = patch.mileage;
        }
        if let Some(discount) = patch.discount {
            next.discount = discount;
        }
        if patch.estimated_completion.is_some() {
            next.estimated_completion = patch.estimated_completion;
        }
        next.updated_at = Utc::now();
        next
    }

    /// Sum of item totals minus the discount, never below zero
    pub fn compute_total(
        items: &[ServiceItem],
        discount: Decimal,
    ) -> Result<Decimal, ValidationErrors> {
        let gross = items
            .iter()
            .try_fold(Decimal::ZERO, |sum, i| sum.checked_add(i.total_price))
            .ok_or_else(|| ValidationErrors::single("total_amount", AMOUNT_TOO_LARGE))?;
        Ok(gross.saturating_sub(discount).max(Decimal::ZERO))
    }

    /// "#12" style reference
    pub fn reference(&self) -> String {
        format!("#{}", self.order_number)
    }
}

impl Validate for ServiceOrder {
    fn validate(&self) -> Result<(), ValidationErrors> {
        Validator::new()
            .required("description", &self.description)
            .non_negative("discount", self.discount)
            .check(self.mileage.map_or(true, |m| m >= 0), "mileage", "must not be negative")
            .finish()
    }
}

impl Entity for ServiceOrder {
    const PREFIX: EntityPrefix = EntityPrefix::So;

    fn id(&self) -> &EntityId {
        &self.id
    }

    fn label(&self) -> String {
        format!("{} {}", self.reference(), self.description)
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Kind of line item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ItemType {
    /// Labor
    #[default]
    Service,
    /// Material, optionally linked to an inventory part
    Part,
}

impl std::fmt::Display for ItemType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ItemType::Service => write!(f, "service"),
            ItemType::Part => write!(f, "part"),
        }
    }
}

impl std::str::FromStr for ItemType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "service" | "labor" => Ok(ItemType::Service),
            "part" | "material" => Ok(ItemType::Part),
            _ => Err(format!("Invalid item type: {}. Use service or part", s)),
        }
    }
}

/// A service order line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceItem {
    pub id: EntityId,
    pub shop_id: EntityId,
    pub order_id: EntityId,
    pub item_type: ItemType,
    /// Free category such as "Revisão" or "Suspensão"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_type: Option<String>,
    pub description: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub total_price: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub part_id: Option<EntityId>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct NewServiceItem {
    pub item_type: ItemType,
    pub service_type: Option<String>,
    pub description: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub part_id: Option<EntityId>,
}

impl ServiceItem {
    pub fn new(shop_id: EntityId, order_id: EntityId, input: NewServiceItem) -> Self {
        Self {
            id: EntityId::new(EntityPrefix::Item),
            shop_id,
            order_id,
            item_type: input.item_type,
            service_type: blank_to_none(input.service_type),
            description: input.description.trim().to_string(),
            quantity: input.quantity,
            unit_price: input.unit_price,
            // Overflow is reported by validate()
            total_price: input
                .quantity
                .checked_mul(input.unit_price)
                .unwrap_or(Decimal::MAX),
            part_id: input.part_id,
            created_at: Utc::now(),
        }
    }
}

impl ServiceItem {
    /// Category used for report grouping; the item type when none was given
    pub fn category(&self) -> String {
        self.service_type
            .clone()
            .unwrap_or_else(|| self.item_type.to_string())
    }
}

impl Validate for ServiceItem {
    fn validate(&self) -> Result<(), ValidationErrors> {
        Validator::new()
            .required("description", &self.description)
            .positive("quantity", self.quantity)
            .non_negative("unit_price", self.unit_price)
            .check(
                self.quantity.checked_mul(self.unit_price).is_some(),
                "unit_price",
                AMOUNT_TOO_LARGE,
            )
            .check(
                self.part_id.is_none() || self.item_type == ItemType::Part,
                "part_id",
                "only part items can reference an inventory part",
            )
            .finish()
    }
}

impl Entity for ServiceItem {
    const PREFIX: EntityPrefix = EntityPrefix::Item;

    fn id(&self) -> &EntityId {
        &self.id
    }

    fn label(&self) -> String {
        format!("{} x {}", self.quantity, self.description)
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// One recorded status change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusHistory {
    pub id: EntityId,
    pub shop_id: EntityId,
    pub order_id: EntityId,
    /// `None` for the entry written when the order is opened
    pub from_status: Option<OrderStatus>,
    pub to_status: OrderStatus,
    pub changed_by: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    pub changed_at: DateTime<Utc>,
}

impl StatusHistory {
    pub fn new(
        order: &ServiceOrder,
        from_status: Option<OrderStatus>,
        to_status: OrderStatus,
        changed_by: &str,
        note: Option<String>,
    ) -> Self {
        Self {
            id: EntityId::new(EntityPrefix::Hist),
            shop_id: order.shop_id.clone(),
            order_id: order.id.clone(),
            from_status,
            to_status,
            changed_by: changed_by.to_string(),
            note: blank_to_none(note),
            changed_at: Utc::now(),
        }
    }
}

impl Entity for StatusHistory {
    const PREFIX: EntityPrefix = EntityPrefix::Hist;

    fn id(&self) -> &EntityId {
        &self.id
    }

    fn label(&self) -> String {
        match self.from_status {
            Some(from) => format!("{} -> {}", from, self.to_status),
            None => format!("opened as {}", self.to_status),
        }
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.changed_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn test_lifecycle_transitions() {
        use OrderStatus::*;
        assert!(Pending.can_transition_to(Approved));
        assert!(Approved.can_transition_to(InProgress));
        assert!(InProgress.can_transition_to(WaitingParts));
        assert!(WaitingParts.can_transition_to(InProgress));
        assert!(WaitingParts.can_transition_to(Completed));
        assert!(InProgress.can_transition_to(Completed));

        assert!(!Pending.can_transition_to(Completed));
        assert!(!Pending.can_transition_to(Pending));
        assert!(!Completed.can_transition_to(Canceled));
        assert!(!Canceled.can_transition_to(Pending));
    }

    #[test]
    fn test_cancel_allowed_from_every_open_state() {
        for status in OrderStatus::all() {
            assert_eq!(
                status.can_transition_to(OrderStatus::Canceled),
                !status.is_terminal(),
                "{}",
                status
            );
        }
    }

    #[test]
    fn test_status_parse_accepts_variants() {
        assert_eq!("in-progress".parse::<OrderStatus>().unwrap(), OrderStatus::InProgress);
        assert_eq!("CANCELLED".parse::<OrderStatus>().unwrap(), OrderStatus::Canceled);
        for status in OrderStatus::all() {
            assert_eq!(status.to_string().parse::<OrderStatus>().unwrap(), *status);
        }
        assert!("done".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn test_item_total_and_order_total() {
        let shop = EntityId::new(EntityPrefix::Shop);
        let order = EntityId::new(EntityPrefix::So);
        let labor = ServiceItem::new(
            shop.clone(),
            order.clone(),
            NewServiceItem {
                description: "Troca de óleo".into(),
                quantity: dec("1"),
                unit_price: dec("80.00"),
                ..Default::default()
            },
        );
        let oil = ServiceItem::new(
            shop,
            order,
            NewServiceItem {
                item_type: ItemType::Part,
                description: "Óleo 5W30".into(),
                quantity: dec("4"),
                unit_price: dec("42.50"),
                ..Default::default()
            },
        );
        assert_eq!(oil.total_price, dec("170.00"));
        let items = vec![labor, oil];
        assert_eq!(ServiceOrder::compute_total(&items, dec("50")).unwrap(), dec("200.00"));
        assert_eq!(ServiceOrder::compute_total(&items, dec("1000")).unwrap(), Decimal::ZERO);
    }

    #[test]
    fn test_oversized_amounts_are_validation_errors() {
        let shop = EntityId::new(EntityPrefix::Shop);
        let order = EntityId::new(EntityPrefix::So);
        let huge = ServiceItem::new(
            shop.clone(),
            order.clone(),
            NewServiceItem {
                description: "Frota inteira".into(),
                quantity: dec("1000000000000000"),
                unit_price: dec("1000000000000000"),
                ..Default::default()
            },
        );
        assert!(huge.validate().unwrap_err().has("unit_price"));

        let big = ServiceItem::new(
            shop,
            order,
            NewServiceItem {
                description: "Motor".into(),
                quantity: Decimal::ONE,
                unit_price: Decimal::MAX,
                ..Default::default()
            },
        );
        assert!(big.validate().is_ok());
        let err = ServiceOrder::compute_total(&[big.clone(), big], Decimal::ZERO).unwrap_err();
        assert!(err.has("total_amount"));
    }

    #[test]
    fn test_item_validation() {
        let item = ServiceItem::new(
            EntityId::new(EntityPrefix::Shop),
            EntityId::new(EntityPrefix::So),
            NewServiceItem {
                description: "Alinhamento".into(),
                quantity: Decimal::ZERO,
                unit_price: dec("-1"),
                part_id: Some(EntityId::new(EntityPrefix::Part)),
                ..Default::default()
            },
        );
        let err = item.validate().unwrap_err();
        assert!(err.has("quantity"));
        assert!(err.has("unit_price"));
        assert!(err.has("part_id"));
    }
}
