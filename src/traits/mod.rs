//! Trait definitions for the swappable seams of the job system
//!
//! The job store and the mail transport have several implementations;
//! these traits let the embedding service pick one or provide its own.

pub mod job;
pub mod mailer;
