//! HTTP surface: the admission middleware and the routes behind it.

mod client;
mod middleware;
mod rejection;
mod routes;
mod server;
mod state;

pub use client::ClientResolver;
pub use middleware::{admission_middleware, X_RATELIMIT_LIMIT, X_RATELIMIT_REMAINING};
pub use rejection::ErrorBody;
pub use routes::router;
pub use server::HttpServer;
pub use state::AppState;
