// src/config/mod.rs
pub mod monitor;

pub use monitor::AppConfig;
