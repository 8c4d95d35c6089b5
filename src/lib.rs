pub mod args;
pub mod config;
pub mod core;
pub mod errors;
pub mod models;
pub mod network;
pub mod readwrite;
pub mod runner;
pub mod simulation;
pub mod stats;
