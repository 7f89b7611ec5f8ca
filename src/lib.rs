pub mod auth;
pub mod bootstrap;
pub mod config;
pub mod directory;
pub mod models;
pub mod routes;
pub mod scheduling;
pub mod session;
pub mod startup;
pub mod telemetry;
pub mod utils;
