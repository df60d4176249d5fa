pub mod db;
pub mod models;
pub mod repositories;

pub use db::{connect, init_db};
pub use sqlx;
