//! Core types and trait definitions for the sitedir engagement layer.
//!
//! This crate is deliberately free of HTTP and database dependencies. It owns
//! the domain model, the pure aggregate logic (rating statistics, comment
//! threading), the [`store::EngagementStore`] abstraction, and the managers in
//! [`service`] that sequence validation, atomic writes and notification
//! fan-out on top of any store backend.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod comment;
pub mod engagement;
pub mod error;
pub mod follow;
pub mod notification;
pub mod rating;
pub mod service;
pub mod store;
pub mod user;

pub use error::{Error, ErrorKind, Result};
