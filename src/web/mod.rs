//! HTTP transport shell: shared state, API routers, CORS and TLS.

pub mod api_core;
pub mod api_local;
pub mod http_server;
pub mod shared;

pub use shared::SharedState;
