pub mod api;
pub mod clients;
pub mod config;
pub mod core;
