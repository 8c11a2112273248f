//! APNs delivery for Live Activity updates.
//!
//! [`ApnsCredentials`] holds the provider signing key and mints short-lived
//! ES256 assertions; [`ApnsClient`] builds and sends the push request and
//! classifies the outcome. Nothing here retries: `update` pushes once, and
//! the decay cycle naturally retries on its next pass.

mod client;
mod credentials;

pub use client::{ApnsClient, DeliveryError, PRODUCTION_URL, SANDBOX_URL};
pub use credentials::ApnsCredentials;
