//! Core domain concepts shared across all subdomains.
//!
//! - [`model::Model`] — identifier of one model backend
//! - [`language::Language`] — language tag and roster mapping
//! - [`question::Question`] — a validated prompt
//! - [`error::DomainError`] — domain-level errors

pub mod error;
pub mod language;
pub mod model;
pub mod question;
