//! Persistence: CSV tables and JSON run artifacts.

pub mod csv;
pub mod dump;
