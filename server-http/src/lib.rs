pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod scheduler;
pub mod state;

// Re-export key types
pub use routes::build_router;
pub use state::AppState;
