//! Garage Desk
//!
//! Multi-tenant management for auto repair shops: customers, vehicles,
//! service orders, parts inventory, a notification center and revenue
//! reports, all stored in a local SQLite workspace.

pub mod cli;
pub mod core;
pub mod entities;
pub mod reports;
pub mod store;
