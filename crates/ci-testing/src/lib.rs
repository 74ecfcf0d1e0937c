//! Testing infrastructure for the codebase intelligence daemon's
//! integration tests.
//!
//! This crate provides utilities for writing robust integration tests:
//! - `TestWorld`: fluent interface for seeding an in-memory store and
//!   running the daemon's CLI against an isolated project directory
//! - `assertions`: custom assertions for the daemon's JSON response shapes
//! - `fixtures`: deterministic session/batch/activity builders and a
//!   throwaway project directory for plan/transcript fixtures
//! - `process`: background process management for long-running commands

pub mod assertions;
pub mod fixtures;
pub mod process;
pub mod world;

pub use world::TestWorld;
