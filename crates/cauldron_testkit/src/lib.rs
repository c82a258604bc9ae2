//! # Cauldron Testkit
//!
//! Test utilities for the Cauldron store.
//!
//! This crate provides:
//! - Fixtures that open a Cauldron over an in-memory git backend
//! - Property-based test generators using proptest
//! - Scenario helpers that populate a Cauldron with a small fleet
//!
//! ## Usage
//!
//! ```rust,ignore
//! use cauldron_testkit::prelude::*;
//!
//! #[test]
//! fn test_with_cauldron() {
//!     with_temp_cauldron(|tc| {
//!         let v = tc.add_version("myapp:android:1.0.0");
//!         // ... test operations
//!     });
//! }
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
