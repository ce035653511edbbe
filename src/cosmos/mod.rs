pub mod chain;
pub mod client;
pub mod config;
pub mod genesis;
pub mod keys;
pub mod proposal;
pub mod tx;
pub mod types;
