//! Core data structures flowing between the inference runner and the
//! ensemble aggregator.
//!
//! - [`types`] – Periodic table elements.
//! - [`structure`] – Atomic configurations with optional periodic cell.
//! - [`prediction`] – Per-structure energies and forces, and the ordered
//!   per-member result sequence persisted between the two stages.
//!
//! A [`Structure`] is identified only by its position in the evaluation
//! sequence, so every collection here preserves input order.
//!
//! [`Structure`]: structure::Structure

pub mod prediction;
pub mod structure;
pub mod types;
