//! WebSocket server for the browser editor surface (spec §4.6).

mod server;
mod state;
mod ws;

pub use server::start_ws_server;
pub use state::ApiState;
