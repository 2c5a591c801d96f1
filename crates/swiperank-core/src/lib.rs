//! Core types, pure ranking algorithms, and store traits for swiperank.
//!
//! This crate is deliberately free of HTTP and database dependencies.
//! Everything here is synchronous and deterministic given a seed; the async
//! service layer lives in `swiperank-engine`.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod draw;
pub mod error;
pub mod family;
pub mod insertion;
pub mod item;
pub mod ledger;
pub mod rating;
pub mod session;
pub mod store;

pub use error::{Error, Result};
