mod bootstrap;
mod state;

pub use bootstrap::{AppBootstrap, BootstrapOptions};
pub use state::AppState;
