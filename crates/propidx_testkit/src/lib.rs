//! # propidx Testkit
//!
//! Test utilities for propidx.
//!
//! This crate provides:
//! - Index fixtures over both directory kinds
//! - Property-based test generators using proptest
//! - A failure-injecting directory for close and release paths
//!
//! ## Usage
//!
//! ```rust
//! use propidx_core::{CloseMode, IndexPopulator, PropertyUpdate};
//! use propidx_testkit::prelude::*;
//!
//! with_each_kind(|index| {
//!     let mut populator = index.created_populator();
//!     populator.add(&[PropertyUpdate::add(7, 1, "foo", &[1])]).unwrap();
//!     populator.close(CloseMode::Commit).unwrap();
//!     assert_eq!(index.scan(), vec![7]);
//! });
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
}

pub use fixtures::*;
pub use generators::*;
