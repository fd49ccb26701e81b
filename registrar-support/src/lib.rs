//! # Registrar Support
//!
//! Shared utilities for the registrar crates.
//!
//! This crate provides:
//! - Type-name shortening for error messages
//! - Resolution chain rendering
//! - "Did you mean?" suggestions

pub mod rendering;
