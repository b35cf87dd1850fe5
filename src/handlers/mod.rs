pub mod client;
pub mod health_handlers;
pub mod static_handlers;
pub mod upload_handlers;
