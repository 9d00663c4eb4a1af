pub mod api;
pub mod cache;
pub mod config;
pub mod forecast;
pub mod importers;
pub mod services;
