//! Standard API response types.

pub mod response;

pub use response::{ConnectionTestResponse, HealthResponse, RouteNotFound, UploadResponse};
