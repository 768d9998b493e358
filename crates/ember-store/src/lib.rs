pub mod cache;
pub mod database;
pub mod error;
pub mod preferences;
pub mod schema;

pub use cache::{CacheRepo, CachedResponse};
pub use database::Database;
pub use error::StoreError;
pub use preferences::PreferenceRepo;
