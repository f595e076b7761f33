pub mod backoff;
pub mod config;
pub mod display_state;
pub mod mirror;
pub mod network;
pub mod rest;
