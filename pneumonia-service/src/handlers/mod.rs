//! HTTP handlers for the pneumonia screening service.

pub mod health;
pub mod index;
pub mod model;
pub mod predict;

pub use health::health_check;
pub use index::{home, metrics, not_found};
pub use model::reload_model;
pub use predict::predict;
