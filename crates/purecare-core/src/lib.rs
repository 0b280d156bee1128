//! Core types and pure logic for the purecare consumable tracker.
//!
//! This crate is deliberately free of HTTP and database dependencies. It owns
//! the lifespan arithmetic, the consumable status state machine, the fixed
//! eight-slot consumable set, and the traits through which the outside world
//! (storage, clocks) is reached.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod catalog;
pub mod clock;
pub mod consumable;
pub mod error;
pub mod lifecycle;
pub mod lifespan;
pub mod notification;
pub mod purifier;
pub mod slot;
pub mod store;

pub use error::{Error, Result};
