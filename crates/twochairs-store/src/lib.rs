pub mod alerts;
pub mod database;
pub mod error;
pub mod messages;
mod rows;
pub mod schema;
pub mod sessions;
pub mod users;

pub use database::Database;
pub use error::StoreError;
