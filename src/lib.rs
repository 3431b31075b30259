//! Worldstream - chunk streaming and LOD scheduling for open worlds

pub mod core;
pub mod streaming;
