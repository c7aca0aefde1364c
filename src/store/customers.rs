//! Customer queries and mutations

use rusqlite::{params, Row};
use serde::Serialize;

use super::Store;
use crate::core::database::get_timestamp;
use crate::core::entity::format_timestamp;
use crate::core::error::StoreError;
use crate::core::events::ChangeKind;
use crate::core::identity::{EntityId, EntityPrefix};
use crate::core::validation::{normalize_cpf, Validate};
use crate::entities::{Customer, CustomerPatch, NewCustomer, ServiceOrder, Vehicle};

const COLUMNS: &str =
    "id, shop_id, name, email, phone, cpf, address, notes, created_at, updated_at";

/// Filter for listing customers
#[derive(Debug, Clone, Default)]
pub struct CustomerFilter {
    /// Substring of name, e-mail, phone or CPF
    pub search: Option<String>,
    pub limit: Option<usize>,
}

/// A customer with everything the shop has on record for them
#[derive(Debug, Clone, Serialize)]
pub struct CustomerHistory {
    pub customer: Customer,
    pub vehicles: Vec<Vehicle>,
    pub orders: Vec<ServiceOrder>,
}

fn from_row(row: &Row<'_>) -> rusqlite::Result<Customer> {
    Ok(Customer {
        id: row.get(0)?,
        shop_id: row.get(1)?,
        name: row.get(2)?,
        email: row.get(3)?,
        phone: row.get(4)?,
        cpf: row.get(5)?,
        address: row.get(6)?,
        notes: row.get(7)?,
        created_at: get_timestamp(row, 8)?,
        updated_at: get_timestamp(row, 9)?,
    })
}

impl Store {
    pub fn create_customer(&mut self, input: NewCustomer) -> Result<Customer, StoreError> {
        let mut customer = Customer::new(self.shop_id()?.clone(), input);
        customer.validate()?;
        customer.cpf = customer.normalized_cpf();

        self.db.conn().execute(
            &format!(
                "INSERT INTO customers ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                COLUMNS
            ),
            params![
                customer.id,
                customer.shop_id,
                customer.name,
                customer.email,
                customer.phone,
                customer.cpf,
                customer.address,
                customer.notes,
                format_timestamp(&customer.created_at),
                format_timestamp(&customer.updated_at),
            ],
        )?;
        tracing::info!(customer = %customer.id, "created customer");
        self.publish("customers", ChangeKind::Insert, &customer.id);
        Ok(customer)
    }

    /// Find a customer by id, partial id or CPF
    pub fn get_customer(&self, key: &str) -> Result<Customer, StoreError> {
        let cpf = normalize_cpf(key);
        let natural = (cpf.len() == 11).then(|| ("cpf", cpf));
        let id = self.resolve(EntityPrefix::Cust, "customer", key, natural)?;
        self.load_customer(&id)
    }

    pub(super) fn load_customer(&self, id: &EntityId) -> Result<Customer, StoreError> {
        let key = self.key("customers", format!("get:{}", id))?;
        let conn = self.db.conn();
        self.cache.fetch(key, || -> Result<_, StoreError> {
            Ok(conn.query_row(
                &format!("SELECT {} FROM customers WHERE id = ?1", COLUMNS),
                params![id],
                from_row,
            )?)
        })
    }

    pub fn list_customers(&self, filter: &CustomerFilter) -> Result<Vec<Customer>, StoreError> {
        let shop_id = self.shop_id()?;
        let key = self.key("customers", format!("list:{:?}", filter))?;
        let conn = self.db.conn();
        self.cache.fetch(key, || -> Result<_, StoreError> {
            let mut sql = format!("SELECT {} FROM customers WHERE shop_id = ?", COLUMNS);
            let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(shop_id.clone())];

            if let Some(ref search) = filter.search {
                sql.push_str(
                    " AND (name LIKE ? OR email LIKE ? OR phone LIKE ? OR cpf LIKE ?)",
                );
                let pattern = format!("%{}%", search.trim());
                let digits = normalize_cpf(search);
                let cpf_pattern = if digits.is_empty() {
                    pattern.clone()
                } else {
                    format!("%{}%", digits)
                };
                params_vec.push(Box::new(pattern.clone()));
                params_vec.push(Box::new(pattern.clone()));
                params_vec.push(Box::new(pattern));
                params_vec.push(Box::new(cpf_pattern));
            }

            sql.push_str(" ORDER BY name COLLATE NOCASE");

            if let Some(limit) = filter.limit {
                sql.push_str(&format!(" LIMIT {}", limit));
            }

            let mut stmt = conn.prepare(&sql)?;
            let params_refs: Vec<&dyn rusqlite::ToSql> =
                params_vec.iter().map(|p| p.as_ref()).collect();
            let customers = stmt
                .query_map(params_refs.as_slice(), from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(customers)
        })
    }

    pub fn update_customer(
        &mut self,
        key: &str,
        patch: CustomerPatch,
    ) -> Result<Customer, StoreError> {
        let mut customer = self.get_customer(key)?.apply(patch);
        customer.validate()?;
        customer.cpf = customer.normalized_cpf();

        self.db.conn().execute(
            "UPDATE customers SET name = ?2, email = ?3, phone = ?4, cpf = ?5, address = ?6,
             notes = ?7, updated_at = ?8 WHERE id = ?1",
            params![
                customer.id,
                customer.name,
                customer.email,
                customer.phone,
                customer.cpf,
                customer.address,
                customer.notes,
                format_timestamp(&customer.updated_at),
            ],
        )?;
        self.publish("customers", ChangeKind::Update, &customer.id);
        Ok(customer)
    }

    /// Delete a customer together with their vehicles and service orders
    pub fn delete_customer(&mut self, key: &str) -> Result<Customer, StoreError> {
        let customer = self.get_customer(key)?;
        self.db
            .conn()
            .execute("DELETE FROM customers WHERE id = ?1", params![customer.id])?;
        tracing::info!(customer = %customer.id, "deleted customer");
        self.publish_cascade("customers", &customer.id);
        Ok(customer)
    }

    /// Vehicles and service orders of one customer, newest orders first
    pub fn customer_history(&self, key: &str) -> Result<CustomerHistory, StoreError> {
        let customer = self.get_customer(key)?;
        let vehicles = self.list_vehicles(&super::VehicleFilter {
            customer_id: Some(customer.id.clone()),
            ..Default::default()
        })?;
        let orders = self.list_orders(&super::OrderFilter {
            customer_id: Some(customer.id.clone()),
            ..Default::default()
        })?;
        Ok(CustomerHistory {
            customer,
            vehicles,
            orders,
        })
    }
}
