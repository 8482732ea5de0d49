//! Test support for the relay end-to-end tests
#![allow(dead_code)] // Test utility module - not all items used in every test

pub mod harness;
pub mod provider;

pub use harness::RelayHarness;
pub use provider::StubProvider;
