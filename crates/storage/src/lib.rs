pub mod db;

pub use db::{create_db, load_rate_cache, save_rate_cache, DbPool};
