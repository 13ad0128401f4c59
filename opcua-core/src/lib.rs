//! Core types and utilities for the OPC UA stack
//!
//! This crate provides the built-in value types, status codes and the
//! error type shared by every layer of the stack.

pub mod datatypes;
pub mod error;
pub mod status_code;

pub use datatypes::*;
pub use error::{UaError, UaResult};
pub use status_code::StatusCode;
