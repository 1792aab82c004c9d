pub mod cli;
pub mod config;
pub mod listener;
pub mod state;
