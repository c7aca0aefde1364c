//! CLI command implementations

pub mod completions;
pub mod config;
pub mod customer;
pub mod init;
pub mod notify;
pub mod order;
pub mod part;
pub mod report;
pub mod shop;
pub mod stock;
pub mod vehicle;
