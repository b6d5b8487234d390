// Public API for integration tests and potential library usage

pub mod api;
pub mod auth;
pub mod chat;
pub mod config;
pub mod error;
pub mod hub;
pub mod protocol;
pub mod routes;
pub mod state;
pub mod store;
pub mod types;
pub mod ws;
