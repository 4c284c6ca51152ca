pub mod api;
pub mod api_doc;
pub mod auth;
pub mod server;

pub use auth::AppState;
pub use server::{build_router, run_server};
