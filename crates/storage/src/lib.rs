#![warn(clippy::pedantic)]

pub mod memory;
pub mod snapshot;

pub use memory::InMemory;
