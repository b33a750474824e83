//! Data layer module
//!
//! Handles all data persistence:
//! - SQLite user storage (authorization state)
//! - SQLite media records (capability URL resolution)

mod database;
mod models;

pub use database::Database;
pub use models::{MediaRecord, NewUser, User};

#[cfg(test)]
mod database_test;
