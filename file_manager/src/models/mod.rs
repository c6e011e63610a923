//! Response envelopes shared by the handlers

pub mod request;

pub use request::ApiResponse;
