//! Mathfinder model monitoring.
//!
//! Registered symbolic-regression models are tested on a schedule against
//! fresh data dropped in per-model inboxes, and their owners are told when a
//! model drifts past its original error.

pub mod commands;
pub mod monitoring;
