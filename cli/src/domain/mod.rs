//! Domain layer - pure provisioning logic
//!
//! This module contains business logic with no external I/O.
//! Types and functions here can be unit tested without mocking.

pub mod credentials;
pub mod graph;
pub mod image;
pub mod plan;

