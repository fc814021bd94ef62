// src/handlers/mod.rs
pub mod cache;
pub mod error;
pub mod price;
pub mod price_data;
