#![forbid(unsafe_code)]

pub mod error;
pub mod policy;

pub mod util {
    pub mod hash_forward;
    pub mod sanitize;
}

pub mod hash {
    pub mod algorithm;
}

pub mod checksum {
    pub mod pipeline;
}

pub mod container {
    pub mod manifest;
    pub mod tagfile;
}

pub mod bag;
pub mod domain;
pub mod payload;

// Re-exports: stable API surface
pub use bag::{Bag, BagState, OpenReport};
pub use checksum::pipeline::{Checksums, copy_and_hash, hash_file};
pub use container::manifest::{Manifest, ManifestKind};
pub use container::tagfile::{TagField, TagFile};
pub use domain::{CheckReport, check};
pub use error::{BagError, Result};
pub use hash::algorithm::{Algorithm, Checksum};
pub use payload::Payload;
pub use policy::{BagOptions, OpenOptions, Strictness};
