//! Encodeforge-Common: shared error and geometry types.
//!
//! - **Error Handling**: the run-failure taxonomy ([`Error`]) and [`Result`]
//! - **Geometry Types**: [`Resolution`], [`Axis`], [`AspectPolicy`],
//!   [`Rotation`] and the [`SourceMedia`] view of an input file
//!
//! # Examples
//!
//! ```
//! use encodeforge_common::{Resolution, Rotation};
//!
//! let r: Resolution = "640x480".parse().unwrap();
//! assert_eq!(r.transposed().to_string(), "480x640");
//! assert!(Rotation::from_degrees(Some(90)).changes_orientation());
//! ```

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::*;
