//! Core types, rules and trait definitions for the mastery progression engine.
//!
//! This crate is deliberately free of HTTP and database dependencies.
//! Storage backends implement [`store::ProgressStore`]; the
//! [`engine::MasteryEngine`] drives every learner-facing operation over it.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod actor;
pub mod engine;
pub mod error;
pub mod module;
pub mod personality;
pub mod quiz;
pub mod score;
pub mod store;
pub mod xp;

pub use engine::{EngineError, MasteryEngine};
pub use error::{Error, Result};
