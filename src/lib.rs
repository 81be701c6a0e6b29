pub mod api;
pub mod blob;
pub mod config;
pub mod error;
pub mod models;
pub mod services;
pub mod state;
pub mod store;
pub mod sync;
