pub mod documents;
pub mod files;
pub mod health;
pub mod query;
pub mod stores;
pub mod utils;
