//! SiteStock workflow server
//!
//! Maker / verifier / authorizer workflows for a construction company's
//! borrowed tools, stock withdrawals and procurement requests, with quantity
//! reservation against the inventory and incidents raised on bad returns.

use std::sync::Arc;

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod repository;
pub mod services;
pub mod workflow;

pub use config::AppConfig;
pub use error::{AppError, AppResult};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub services: Arc<services::Services>,
}
