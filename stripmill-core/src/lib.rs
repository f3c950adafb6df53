//! # stripmill-core
//!
//! Image handling for stripmill.
//!
//! This crate provides:
//! - `ImageFrame`, a decoded raster (height x width x channels)
//! - Row-wise strip splitting and merging
//! - Operation kinds and the registry that applies them

pub mod error;
pub mod operation;
pub mod raster;
pub mod registry;
pub mod strip;

pub use error::CoreError;
pub use operation::OperationKind;
pub use raster::{EncodeFormat, ImageFrame};
pub use registry::{OperationRegistry, StripTransform};
pub use strip::{merge, split, Strip};
