//! Intake service for payment proof submissions: a photo, an optional QR
//! image and a few payer fields, stored on disk with a JSON sidecar.

pub mod config;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
