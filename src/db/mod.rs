mod article;
pub mod core;
mod profile;
mod schema;

pub use self::core::Database;
