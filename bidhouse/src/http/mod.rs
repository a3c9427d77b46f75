//! HTTP surface: router, handlers, shared state and error mapping.

pub mod error;
pub mod handlers;
pub mod router;
pub mod signature;
pub mod state;

pub use error::AppError;
pub use router::app_router;
pub use state::{AppState, WebhookConfig};
