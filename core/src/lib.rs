//! Shared types for the Luma decision service: the context/action model,
//! persisted decision records, the structured API error body, and the
//! safety gateway.

pub mod actions;
pub mod context;
pub mod decisions;
pub mod error;
pub mod gateway;
