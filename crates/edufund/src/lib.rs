//! Application lifecycle, field verification, board interviews, and sponsorship matching
//! for student education funding.

pub mod config;
pub mod error;
pub mod telemetry;
pub mod workflows;
