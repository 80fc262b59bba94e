//! Entity-Component-System implementation
//!
//! A deliberately small runtime: generational entities, typed sparse
//! storage, change markers for tracked component types, removal
//! notifications and filter queries that can fan out over worker threads.

pub mod world;
pub mod entity;
pub mod component;
pub mod storage;
pub mod system;
pub mod query;
pub mod parallel;
pub mod components;

#[cfg(test)]
mod tests;

pub use world::World;
pub use entity::Entity;
pub use component::{Component, Dirty};
pub use system::System;
pub use query::Query;
pub use parallel::WorkerPool;
