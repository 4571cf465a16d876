//! Terminal UI helpers

pub mod spinner;
