//! Upstream API subsystem.
//!
//! # Data Flow
//! ```text
//! inbound path-and-query
//!     → client.rs (origin + path, GET with timeouts, non-2xx → error)
//!     → buffered body
//!     → payload.rs (validate, borrow data[0].attributes.arrival_time)
//!     → {"datetime": <value>}
//! ```
//!
//! # Design Decisions
//! - Nothing is sent downstream until the payload has been validated
//! - The extracted value is never re-encoded
//! - The client lives behind an atomic swap so config reloads apply to the
//!   next request without interrupting in-flight ones

pub mod client;
pub mod payload;

pub use client::{SharedUpstream, UpstreamClient, UpstreamError, UpstreamResponse};
pub use payload::{extract_arrival_time, ArrivalTime, PayloadError};
