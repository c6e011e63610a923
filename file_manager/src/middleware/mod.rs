//! Middleware components for the HTTP host

pub mod logging;
