//! OpenCTI collaborator for disgraph.
//!
//! The core never performs I/O; this crate owns the narrow platform surface
//! it depends on: the attack-pattern catalog (local technique code to
//! canonical identifier), STIX 2.1 bundle serialization, and bundle upload.

pub mod bundle;
pub mod client;

pub use bundle::{to_bundle, Bundle};
pub use client::{catalog_from_file, OpenCtiClient};
