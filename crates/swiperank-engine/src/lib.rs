//! Async service layer for swiperank.
//!
//! [`Engine`] binds the pure algorithms in `swiperank-core` to any backend
//! implementing the store traits. It owns session lifecycle, versioned
//! writes, hierarchy driving and the single-flight rating aggregator.

mod config;
mod engine;
mod hierarchy;
mod ratings;

pub use config::EngineConfig;
pub use engine::{
  ChildSessionStarted, Engine, SessionReport, SessionStarted, SessionStep, SessionView,
  StartOptions, Store,
};
pub use hierarchy::HierarchyReport;
pub use ratings::RecomputeSummary;
pub use swiperank_core::{Error, Result};

#[cfg(test)]
mod tests;
