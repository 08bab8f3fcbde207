//! HTTP server for the control plane

pub mod routes;
mod server;
mod state;

pub use server::HttpServer;
pub use state::AppState;
