//! HTTP request surface

pub mod error;
pub mod files;
pub mod routes;

pub use routes::build_router;
