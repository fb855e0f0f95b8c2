#![allow(dead_code)]
//! Shared test utilities for integration tests.
//!
//! - `setup`: a [`web3_college::College`] wired to an in-memory chain

pub mod setup;

pub use setup::{college, college_with, TestCollege};
