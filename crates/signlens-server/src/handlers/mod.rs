pub mod api;
pub mod websocket;

pub use api::ApiError;
pub use websocket::websocket_handler;
