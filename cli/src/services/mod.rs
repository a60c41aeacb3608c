//! Services layer - orchestration logic
//!
//! This module coordinates between domain logic and infrastructure.
//! Services use infrastructure adapters to perform I/O operations.

pub mod credentials;
pub mod engine;
pub mod provisioner;
pub mod stack_service;

// Re-export commonly used types
pub use stack_service::StackService;
