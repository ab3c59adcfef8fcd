//! Signlens server: HTTP and WebSocket transport over the translation
//! pipeline.

pub mod app;
pub mod handlers;
pub mod logging;
pub mod messages;
pub mod routes;

pub use app::{AppBootstrap, AppState, BootstrapOptions};
pub use routes::create_router;
