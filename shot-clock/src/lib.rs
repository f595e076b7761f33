pub mod clock_engine;
pub mod config;
pub mod console;
pub mod persistence;
pub mod runner;
