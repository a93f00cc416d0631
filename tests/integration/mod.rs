//! Integration tests for workpool
//!
//! Every test builds its own pools; nothing external is required.
//! Run with: cargo test --test integration

mod helpers;

mod handles;
mod scenarios;
mod termination;
