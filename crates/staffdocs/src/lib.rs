//! Compliance document tracking for employees.
//!
//! Each employee is linked to the document types they must submit. Every
//! (employee, type) pair is materialised as a [`documents::DocumentRecord`] that
//! starts pending and is fulfilled exactly once by an accepted upload.

pub mod config;
pub mod documents;
pub mod error;
pub mod telemetry;
