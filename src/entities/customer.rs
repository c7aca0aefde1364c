//! Customer entity

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::entity::Entity;
use crate::core::identity::{EntityId, EntityPrefix};
use crate::core::validation::{normalize_cpf, Validate, ValidationErrors, Validator};
use crate::entities::{apply_optional, blank_to_none};

/// A shop customer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    pub id: EntityId,
    pub shop_id: EntityId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    /// Brazilian taxpayer id, digits only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpf: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct NewCustomer {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub cpf: Option<String>,
    pub address: Option<String>,
    pub notes: Option<String>,
}

/// Field changes; `Some("")` clears an optional field
#[derive(Debug, Clone, Default)]
pub struct CustomerPatch {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub cpf: Option<String>,
    pub address: Option<String>,
    pub notes: Option<String>,
}

impl CustomerPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.email.is_none()
            && self.phone.is_none()
            && self.cpf.is_none()
            && self.address.is_none()
            && self.notes.is_none()
    }
}

impl Customer {
    pub fn new(shop_id: EntityId, input: NewCustomer) -> Self {
        let now = Utc::now();
        Self {
            id: EntityId::new(EntityPrefix::Cust),
            shop_id,
            name: input.name.trim().to_string(),
            email: blank_to_none(input.email).map(|e| e.to_lowercase()),
            phone: blank_to_none(input.phone),
            cpf: blank_to_none(input.cpf),
            address: blank_to_none(input.address),
            notes: blank_to_none(input.notes),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn apply(&self, patch: CustomerPatch) -> Self {
        let mut next = self.clone();
        if let Some(name) = patch.name {
            next.name = name.trim().to_string();
        }
        apply_optional(&mut next.email, patch.email.map(|e| e.to_lowercase()));
        apply_optional(&mut next.phone, patch.phone);
        apply_optional(&mut next.cpf, patch.cpf);
        apply_optional(&mut next.address, patch.address);
        apply_optional(&mut next.notes, patch.notes);
        next.updated_at = Utc::now();
        next
    }

    /// CPF reduced to digits for storage and uniqueness checks
    pub fn normalized_cpf(&self) -> Option<String> {
        self.cpf.as_deref().map(normalize_cpf)
    }
}

impl Validate for Customer {
    fn validate(&self) -> Result<(), ValidationErrors> {
        Validator::new()
            .required("name", &self.name)
            .email("email", self.email.as_deref())
            .cpf("cpf", self.cpf.as_deref())
            .finish()
    }
}

impl Entity for Customer {
    const PREFIX: EntityPrefix = EntityPrefix::Cust;

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

#[cfg(test)]
mod tests {
    use super::*;

    fn shop() -> EntityId {
        EntityId::new(EntityPrefix::Shop)
    }

    #[test]
    fn test_customer_creation() {
        let c = Customer::new(
            shop(),
            NewCustomer {
                name: "Maria Souza".into(),
                email: Some("Maria@Mail.com".into()),
                cpf: Some("529.982.247-25".into()),
                ..Default::default()
            },
        );
        assert!(c.id.to_string().starts_with("CUST-"));
        assert_eq!(c.email.as_deref(), Some("maria@mail.com"));
        assert_eq!(c.normalized_cpf().as_deref(), Some("52998224725"));
        assert!(c.validate().is_ok());
    }

    #[test]
    fn test_customer_requires_name() {
        let c = Customer::new(shop(), NewCustomer::default());
        assert!(c.validate().unwrap_err().has("name"));
    }

    #[test]
    fn test_invalid_cpf_rejected() {
        let c = Customer::new(
            shop(),
            NewCustomer {
                name: "João".into(),
                cpf: Some("123.456.789-00".into()),
                ..Default::default()
            },
        );
        assert!(c.validate().unwrap_err().has("cpf"));
    }

    #[test]
    fn test_patch_keeps_untouched_fields() {
        let c = Customer::new(
            shop(),
            NewCustomer {
                name: "Ana".into(),
                phone: Some("11 99999-0000".into()),
                ..Default::default()
            },
        );
        let patch = CustomerPatch {
            notes: Some("prefers WhatsApp".into()),
            ..Default::default()
        };
        assert!(!patch.is_empty());
        let next = c.apply(patch);
        assert_eq!(next.phone, c.phone);
        assert_eq!(next.notes.as_deref(), Some("prefers WhatsApp"));
        assert_eq!(next.id, c.id);
    }
}
