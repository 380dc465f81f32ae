pub mod api;
pub mod catalog;
pub mod config;
pub mod database;
pub mod error;
pub mod logging;
pub mod pricing;
pub mod processor;
pub mod services;
