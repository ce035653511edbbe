//! End-to-end harness for Gaia: two networks in containers, joined by a Hermes relayer, driven
//! through governance, vesting and interchain account scenarios.

pub mod core;
pub mod cosmos;
pub mod docker;
pub mod primitives;
pub mod testsuite;
