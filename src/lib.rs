//! MBTA arrival-time proxy library.
//!
//! Forwards GET requests to the MBTA v3 API and answers with
//! `{"datetime": <data[0].attributes.arrival_time>}`.

pub mod config;
pub mod http;
pub mod upstream;
pub mod lifecycle;
pub mod observability;

pub use config::schema::ProxyConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
