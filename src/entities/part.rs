//! Inventory part and stock movement entities

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::core::entity::Entity;
use crate::core::identity::{EntityId, EntityPrefix};
use crate::core::validation::{Validate, ValidationErrors, Validator};
use crate::entities::{apply_optional, blank_to_none};

/// A stocked part
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Part {
    pub id: EntityId,
    pub shop_id: EntityId,
    /// Shop-unique stock code, upper-case
    pub code: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Unit of measure ("un", "l", "kg")
    pub unit: String,
    pub cost_price: Decimal,
    pub sale_price: Decimal,
    /// On-hand quantity; only changed through stock movements
    pub quantity: Decimal,
    pub min_quantity: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct NewPart {
    pub code: String,
    pub name: String,
    pub category: Option<String>,
    pub unit: Option<String>,
    pub cost_price: Decimal,
    pub sale_price: Decimal,
    pub min_quantity: Decimal,
    pub location: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct PartPatch {
    pub code: Option<String>,
    pub name: Option<String>,
    pub category: Option<String>,
    pub unit: Option<String>,
    pub cost_price: Option<Decimal>,
    pub sale_price: Option<Decimal>,
    pub min_quantity: Option<Decimal>,
    pub location: Option<String>,
    pub active: Option<bool>,
}

pub const DEFAULT_UNIT: &str = "un";

impl Part {
    pub fn new(shop_id: EntityId, input: NewPart) -> Self {
        let now = Utc::now();
        Self {
            id: EntityId::new(EntityPrefix::Part),
            shop_id,
            code: input.code.trim().to_uppercase(),
            name: input.name.trim().to_string(),
            category: blank_to_none(input.category),
            unit: blank_to_none(input.unit).unwrap_or_else(|| DEFAULT_UNIT.to_string()),
            cost_price: input.cost_price,
            sale_price: input.sale_price,
            quantity: Decimal::ZERO,
            min_quantity: input.min_quantity,
            location: blank_to_none(input.location),
            active: true,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn apply(&self, patch: PartPatch) -> Self {
        let mut next = self.clone();
        if let Some(code) = patch.code {
            next.code = code.trim().to_uppercase();
        }
        if let Some(name) = patch.name {
            next.name = name.trim().to_string();
        }
        if let Some(unit) = blank_to_none(patch.unit) {
            next.unit = unit;
        }
        if let Some(cost) = patch.cost_price {
            next.cost_price = cost;
        }
        if let Some(sale) = patch.sale_price {
            next.sale_price = sale;
        }
        if let Some(min) = patch.min_quantity {
            next.min_quantity = min;
        }
        if let Some(active) = patch.active {
            next.active = active;
        }
        apply_optional(&mut next.category, patch.category);
        apply_optional(&mut next.location, patch.location);
        next.updated_at = Utc::now();
        next
    }

    /// At or below the reorder threshold
    pub fn is_low_stock(&self) -> bool {
        self.quantity <= self.min_quantity
    }
}

impl Validate for Part {
    fn validate(&self) -> Result<(), ValidationErrors> {
        Validator::new()
            .required("code", &self.code)
            .required("name", &self.name)
            .non_negative("cost_price", self.cost_price)
            .non_negative("sale_price", self.sale_price)
            .non_negative("quantity", self.quantity)
            .non_negative("min_quantity", self.min_quantity)
            .finish()
    }
}

impl Entity for Part {
    const PREFIX: EntityPrefix = EntityPrefix::Part;

    fn id(&self) -> &EntityId {
        &self.id
    }

    fn label(&self) -> String {
        format!("{} {}", self.code, self.name)
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Kind of stock change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementType {
    /// Goods received
    Entry,
    /// Goods used or sold
    Exit,
    /// Physical count; the quantity is the new on-hand amount
    Adjustment,
    /// Goods returned to stock
    Return,
}

impl MovementType {
    /// On-hand quantity after applying `quantity` to `current`, `None` on overflow
    pub fn apply(&self, current: Decimal, quantity: Decimal) -> Option<Decimal> {
        match self {
            MovementType::Entry | MovementType::Return => current.checked_add(quantity),
            MovementType::Exit => current.checked_sub(quantity),
            MovementType::Adjustment => Some(quantity),
        }
    }
}

impl std::fmt::Display for MovementType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MovementType::Entry => write!(f, "entry"),
            MovementType::Exit => write!(f, "exit"),
            MovementType::Adjustment => write!(f, "adjustment"),
            MovementType::Return => write!(f, "return"),
        }
    }
}

impl std::str::FromStr for MovementType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "entry" | "in" => Ok(MovementType::Entry),
            "exit" | "out" => Ok(MovementType::Exit),
            "adjustment" | "adjust" => Ok(MovementType::Adjustment),
            "return" => Ok(MovementType::Return),
            _ => Err(format!(
                "Invalid movement type: {}. Use entry, exit, adjustment, or return",
                s
            )),
        }
    }
}

/// A recorded change to a part's on-hand quantity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockMovement {
    pub id: EntityId,
    pub shop_id: EntityId,
    pub part_id: EntityId,
    pub movement_type: MovementType,
    pub quantity: Decimal,
    pub previous_quantity: Decimal,
    pub new_quantity: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_cost: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_id: Option<EntityId>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

/// Input for a stock movement
#[derive(Debug, Clone)]
pub struct NewMovement {
    pub movement_type: MovementType,
    pub quantity: Decimal,
    pub unit_cost: Option<Decimal>,
    pub reason: Option<String>,
    pub order_id: Option<EntityId>,
}

impl NewMovement {
    pub fn new(movement_type: MovementType, quantity: Decimal) -> Self {
        Self {
            movement_type,
            quantity,
            unit_cost: None,
            reason: None,
            order_id: None,
        }
    }

    pub fn reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn for_order(mut self, order_id: &EntityId) -> Self {
        self.order_id = Some(order_id.clone());
        self
    }
}

impl Validate for NewMovement {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let validator = match self.movement_type {
            MovementType::Adjustment => Validator::new().non_negative("quantity", self.quantity),
            _ => Validator::new().positive("quantity", self.quantity),
        };
        validator
            .non_negative("unit_cost", self.unit_cost.unwrap_or_default())
            .finish()
    }
}

impl StockMovement {
    pub fn new(part: &Part, input: NewMovement, new_quantity: Decimal, created_by: &str) -> Self {
        Self {
            id: EntityId::new(EntityPrefix::Mov),
            shop_id: part.shop_id.clone(),
            part_id: part.id.clone(),
            movement_type: input.movement_type,
            quantity: input.quantity,
            previous_quantity: part.quantity,
            new_quantity,
            unit_cost: input.unit_cost,
            reason: blank_to_none(input.reason),
            order_id: input.order_id,
            created_by: created_by.to_string(),
            created_at: Utc::now(),
        }
    }
}

impl Entity for StockMovement {
    const PREFIX: EntityPrefix = EntityPrefix::Mov;

    fn id(&self) -> &EntityId {
        &self.id
    }

    fn label(&self) -> String {
        format!(
            "{} {} ({} -> {})",
            self.movement_type, self.quantity, self.previous_quantity, self.new_quantity
        )
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}
