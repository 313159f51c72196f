//! services/api/src/lib.rs
//!
//! The patient portal HTTP service: configuration, adapters for the core
//! ports, and the Axum web layer.

pub mod adapters;
pub mod config;
pub mod error;
pub mod web;
