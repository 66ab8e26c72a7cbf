//! # Campaign Model
//!
//! The campaign-side data crate: entities, relationships, the controlled
//! vocabulary of entity/relationship types, and the triage records that
//! carry machine-generated suggestions through human review.
//! This crate holds no AI logic and performs no I/O.

pub mod entities;
pub mod triage;
pub mod vocabulary;

pub use entities::*;
pub use triage::*;
pub use vocabulary::*;
