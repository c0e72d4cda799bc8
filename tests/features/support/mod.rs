//! Shared state for Cucumber scenarios

pub mod world;

pub use world::TestWorld;
