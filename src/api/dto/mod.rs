//! Data Transfer Objects for REST request/response serialization.

pub mod realtime_dto;

pub use realtime_dto::*;
