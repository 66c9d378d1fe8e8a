//! Web portal: auth flow controller, chat endpoint, and server

mod pages;
pub mod router;
mod server;

pub use router::{AppState, create_router};
pub use server::Portal;
