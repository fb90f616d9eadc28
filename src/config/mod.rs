pub mod manager;
pub mod models;
