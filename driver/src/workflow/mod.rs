pub mod candidates;
pub mod config;
pub mod runner;
