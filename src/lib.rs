pub mod allocator;
pub mod config;
pub mod error;
pub mod extract;
pub mod models;
pub mod routes;
pub mod store;

pub use routes::{router, AppState};
