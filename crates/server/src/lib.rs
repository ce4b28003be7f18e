pub mod error;
pub mod extract;
pub mod http;
pub mod middleware;
pub mod routes;
pub mod state;

pub use state::AppState;
