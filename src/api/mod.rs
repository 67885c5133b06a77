//! HTTP API - form extraction, handlers and routing

pub mod form;
pub mod handlers;
pub mod routes;

pub use routes::create_router;
