pub mod connection;
pub mod migrations;
pub mod models;
pub mod queries;

pub use connection::{Database, DatabaseError};
