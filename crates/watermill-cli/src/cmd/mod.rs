pub mod config;
pub mod enqueue;
pub mod run_once;
pub mod serve;
