mod chat;
mod health;
mod metrics;
mod status;

pub use chat::chat_handler;
pub use health::health_handler;
pub use metrics::metrics_handler;
pub use status::{quota_handler, status_handler};
