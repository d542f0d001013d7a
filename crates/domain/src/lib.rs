//! # keel-domain
//!
//! Pure domain model for the keel regulation-monitoring engine.
//!
//! ## Responsibilities
//! - Foundational types: typed identifiers, error conventions, timestamps
//! - Define **Readings** (timestamped biometric samples)
//! - Define **Domain snapshots** (self-reported sleep, sensory, routine,
//!   behavioral records)
//! - Define **Regulation factors** (derived per-signal assessments)
//! - Define **Warning levels and events** (ordered severity, episode records)
//! - Define **Coping strategies** (interventions with an effectiveness rating)
//! - Define **Device types** (connection state, descriptors, device events)
//! - Contain all invariant enforcement and domain logic
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or external IO crates.
//! All IO boundaries are expressed as traits in the `app` crate (ports).

pub mod error;
pub mod id;
pub mod time;

pub mod device;
pub mod factor;
pub mod reading;
pub mod snapshot;
pub mod strategy;
pub mod warning;
