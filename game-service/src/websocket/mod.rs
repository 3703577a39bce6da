mod handler;
mod hub;

pub use handler::{websocket_handler, AppState, IdentityParams};
pub use hub::ConnectionHub;
