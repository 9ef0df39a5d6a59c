// Utility functions module
pub mod config;
pub mod formatters;
pub mod logging;
pub mod retry;
pub mod mentions;
