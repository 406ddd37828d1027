//! Common library for the Kurso client
//!
//! This crate provides shared functionality used across the client
//! workspace: configuration loading, error taxonomy, logging setup, and
//! local persistence.

pub mod config;
pub mod error;
pub mod logging;
pub mod storage;
