//! Configuration and shared types
//!
//! Service configuration, the request/result envelope, and closed enums.

pub mod types;
