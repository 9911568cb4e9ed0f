//! HTTP front end for the Riskfold pipeline.

pub mod routes;
pub mod server;

pub use routes::{router, ApiError, AppState};
pub use server::{serve, ServiceSettings, ADDR_ENV_VAR, DEFAULT_ADDR};
