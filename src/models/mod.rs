//! Domain models for the IslandPet backend.
//!
//! # Core Concepts
//!
//! ## Permanent Entities
//!
//! - [`PetState`]: The authoritative record of a pet, with hunger/happiness
//!   bounded to `0..=100`. Created on first registration, removed only by an
//!   explicit delete.
//!
//! ## Ephemeral Entities
//!
//! - [`Session`]: A device-side Live Activity bound to a pet (at most one per
//!   pet). Holds the APNs delivery token and is deleted when the activity
//!   ends or when APNs reports the token as permanently invalid.

mod pet;
mod session;

pub use pet::*;
pub use session::*;
