//! Live progress while a run streams

pub mod reporter;
