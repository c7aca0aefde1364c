//! Shop (tenant) and shop staff entities

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::entity::Entity;
use crate::core::identity::{EntityId, EntityPrefix};
use crate::core::validation::{Validate, ValidationErrors, Validator};
use crate::entities::{apply_optional, blank_to_none};

/// A repair shop; every other record belongs to exactly one shop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shop {
    pub id: EntityId,
    pub name: String,
    /// CNPJ or other registration number
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Input for a new shop
#[derive(Debug, Clone, Default)]
pub struct NewShop {
    pub name: String,
    pub document: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
}

/// Field changes for an existing shop; `Some("")` clears optional fields
#[derive(Debug, Clone, Default)]
pub struct ShopPatch {
    pub name: Option<String>,
    pub document: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
}

impl Shop {
    pub fn new(input: NewShop) -> Self {
        let now = Utc::now();
        Self {
            id: EntityId::new(EntityPrefix::Shop),
            name: input.name.trim().to_string(),
            document: blank_to_none(input.document),
            phone: blank_to_none(input.phone),
            email: blank_to_none(input.email),
            address: blank_to_none(input.address),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn apply(&self, patch: ShopPatch) -> Self {
        let mut next = self.clone();
        if let Some(name) = patch.name {
            next.name = name.trim().to_string();
        }
        apply_optional(&mut next.document, patch.document);
        apply_optional(&mut next.phone, patch.phone);
        apply_optional(&mut next.email, patch.email);
        apply_optional(&mut next.address, patch.address);
        next.updated_at = Utc::now();
        next
    }
}

impl Validate for Shop {
    fn validate(&self) -> Result<(), ValidationErrors> {
        Validator::new()
            .required("name", &self.name)
            .email("email", self.email.as_deref())
            .finish()
    }
}

impl Entity for Shop {
    const PREFIX: EntityPrefix = EntityPrefix::Shop;

    fn id(&self) -> &EntityId {
        &self.id
    }

    fn label(&self) -> String {
        self.name.clone()
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

/// Staff role inside a shop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Owner,
    Admin,
    #[default]
    Mechanic,
    Receptionist,
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UserRole::Owner => write!(f, "owner"),
            UserRole::Admin => write!(f, "admin"),
            UserRole::Mechanic => write!(f, "mechanic"),
            UserRole::Receptionist => write!(f, "receptionist"),
        }
    }
}

impl std::str::FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "owner" => Ok(UserRole::Owner),
            "admin" => Ok(UserRole::Admin),
            "mechanic" => Ok(UserRole::Mechanic),
            "receptionist" => Ok(UserRole::Receptionist),
            _ => Err(format!(
                "Invalid role: {}. Use owner, admin, mechanic, or receptionist",
                s
            )),
        }
    }
}

/// A staff member who can receive notifications
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShopUser {
    pub id: EntityId,
    pub shop_id: EntityId,
    pub name: String,
    pub email: String,
    pub role: UserRole,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ShopUser {
    pub fn new(shop_id: EntityId, name: String, email: String, role: UserRole) -> Self {
        let now = Utc::now();
        Self {
            id: EntityId::new(EntityPrefix::Usr),
            shop_id,
            name: name.trim().to_string(),
            email: email.trim().to_lowercase(),
            role,
            active: true,
            created_at: now,
            updated_at: now,
        }
    }
}

impl Validate for ShopUser {
    fn validate(&self) -> Result<(), ValidationErrors> {
        Validator::new()
            .required("name", &self.name)
            .required("email", &self.email)
            .email("email", Some(&self.email))
            .finish()
    }
}

impl Entity for ShopUser {
    const PREFIX: EntityPrefix = EntityPrefix::Usr;

    fn id(&self) -> &EntityId {
        &self.id
    }

    fn label(&self) -> String {
        format!("{} <{}>", self.name, self.email)
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shop_creation_trims_and_drops_blanks() {
        let shop = Shop::new(NewShop {
            name: "  Auto Center Silva ".into(),
            phone: Some("".into()),
            ..Default::default()
        });
        assert!(shop.id.to_string().starts_with("SHOP-"));
        assert_eq!(shop.name, "Auto Center Silva");
        assert_eq!(shop.phone, None);
    }

    #[test]
    fn test_shop_patch_clears_optional_field() {
        let shop = Shop::new(NewShop {
            name: "Oficina".into(),
            email: Some("contato@oficina.com".into()),
            ..Default::default()
        });
        let patched = shop.apply(ShopPatch {
            email: Some(String::new()),
            ..Default::default()
        });
        assert_eq!(patched.email, None);
        assert_eq!(patched.name, "Oficina");
    }

    #[test]
    fn test_user_email_normalized_and_validated() {
        let shop = EntityId::new(EntityPrefix::Shop);
        let user = ShopUser::new(shop.clone(), "Rita".into(), " Rita@Oficina.COM ".into(), UserRole::Admin);
        assert_eq!(user.email, "rita@oficina.com");
        assert!(user.validate().is_ok());

        let bad = ShopUser::new(shop, "Rita".into(), "rita".into(), UserRole::Admin);
        assert!(bad.validate().unwrap_err().has("email"));
    }

    #[test]
    fn test_role_from_str() {
        assert_eq!("Owner".parse::<UserRole>().unwrap(), UserRole::Owner);
        assert!("boss".parse::<UserRole>().is_err());
    }
}
