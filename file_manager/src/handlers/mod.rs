//! HTTP handlers exposing the file manager

pub mod files;
pub mod routes;
