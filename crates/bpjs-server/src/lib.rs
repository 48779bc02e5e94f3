pub mod config;
pub mod handlers;
pub mod observability;
pub mod response;
pub mod server;
pub mod state;

pub use config::AppConfig;
pub use response::Envelope;
pub use server::{BpjsServer, ServerBuilder, build_app};
pub use state::AppState;
