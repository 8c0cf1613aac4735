/// Healthcheck response.
pub mod health;
/// Game events and the envelope they travel in.
pub mod message;
/// Registration form and its validators.
pub mod validation;
