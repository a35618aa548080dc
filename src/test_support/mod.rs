//! Helpers shared by in-crate tests.

#![allow(clippy::unwrap_used)]

pub mod mocks;
pub mod socket_guard;
