//! Core data types for Tally

pub mod message;
pub mod period;
