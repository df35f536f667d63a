//! CLI command implementations.

pub mod adiabatic;
pub mod common;
pub mod default_config;
pub mod optimize;
