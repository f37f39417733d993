// Trainwatch - training monitor console
// Library exports

// Core modules
pub mod backend; // Backend HTTP client and push channel
pub mod cli;
pub mod config;
pub mod errors;
pub mod monitor; // State reconciliation and bounded histories
