#![deny(warnings)]

//! Stateful layer over the economy engine.
//!
//! A [`Session`] holds the live selection state, re-runs the full derivation
//! after every batch of edits, and surfaces one-time [`Notice`]s when the gated
//! bonus tree is sealed or restored.

pub mod notice;
pub mod session;

pub use notice::{describe_refund, Notice, Refund};
pub use session::{Recompute, Session, SessionError};
