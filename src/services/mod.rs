// src/services/mod.rs
pub mod calculations;
pub mod db;
pub mod error;
pub mod google;
pub mod http;
pub mod pacer;
pub mod refresh;
pub mod resolver;
pub mod snapshots;
pub mod yahoo;
