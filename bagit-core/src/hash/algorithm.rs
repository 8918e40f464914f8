use std::fmt;
use std::str::FromStr;

use md5::Md5;
use serde::{Deserialize, Serialize};
use sha1::Sha1;
use sha2::{Digest, Sha224, Sha256, Sha384, Sha512};

use crate::error::{BagError, Result};

/// Checksum algorithms a bag may record manifests for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Algorithm {
    Md5,
    Sha1,
    Sha224,
    Sha256,
    Sha384,
    Sha512,
}

// name, algorithm, digest length in hex chars
static TABLE: [(&str, Algorithm, usize); 6] = [
    ("md5", Algorithm::Md5, 32),
    ("sha1", Algorithm::Sha1, 40),
    ("sha224", Algorithm::Sha224, 56),
    ("sha256", Algorithm::Sha256, 64),
    ("sha384", Algorithm::Sha384, 96),
    ("sha512", Algorithm::Sha512, 128),
];

impl Algorithm {
    pub const ALL: [Algorithm; 6] = [
        Algorithm::Md5,
        Algorithm::Sha1,
        Algorithm::Sha224,
        Algorithm::Sha256,
        Algorithm::Sha384,
        Algorithm::Sha512,
    ];

    /// Case-insensitive lookup of a canonical algorithm name.
    pub fn lookup(name: &str) -> Result<Self> {
        let wanted = name.trim().to_ascii_lowercase();
        TABLE
            .iter()
            .find(|(n, _, _)| *n == wanted)
            .map(|(_, a, _)| *a)
            .ok_or_else(|| BagError::UnsupportedAlgorithm(name.to_string()))
    }

    fn row(self) -> &'static (&'static str, Algorithm, usize) {
        // every variant has exactly one row
        &TABLE[self as usize]
    }

    pub fn name(self) -> &'static str {
        self.row().0
    }

    /// Length of a lowercase hex digest produced by this algorithm.
    pub fn hex_len(self) -> usize {
        self.row().2
    }

    pub fn hasher(self) -> StreamingHash {
        match self {
            Algorithm::Md5 => StreamingHash::Md5(Md5::new()),
            Algorithm::Sha1 => StreamingHash::Sha1(Sha1::new()),
            Algorithm::Sha224 => StreamingHash::Sha224(Sha224::new()),
            Algorithm::Sha256 => StreamingHash::Sha256(Sha256::new()),
            Algorithm::Sha384 => StreamingHash::Sha384(Sha384::new()),
            Algorithm::Sha512 => StreamingHash::Sha512(Sha512::new()),
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Algorithm {
    type Err = BagError;

    fn from_str(s: &str) -> Result<Self> {
        Self::lookup(s)
    }
}

/// An in-progress digest for one algorithm.
#[derive(Clone)]
pub enum StreamingHash {
    Md5(Md5),
    Sha1(Sha1),
    Sha224(Sha224),
    Sha256(Sha256),
    Sha384(Sha384),
    Sha512(Sha512),
}

impl StreamingHash {
    pub fn algorithm(&self) -> Algorithm {
        match self {
            StreamingHash::Md5(_) => Algorithm::Md5,
            StreamingHash::Sha1(_) => Algorithm::Sha1,
            StreamingHash::Sha224(_) => Algorithm::Sha224,
            StreamingHash::Sha256(_) => Algorithm::Sha256,
            StreamingHash::Sha384(_) => Algorithm::Sha384,
            StreamingHash::Sha512(_) => Algorithm::Sha512,
        }
    }

    pub fn update(&mut self, buf: &[u8]) {
        match self {
            StreamingHash::Md5(h) => h.update(buf),
            StreamingHash::Sha1(h) => h.update(buf),
            StreamingHash::Sha224(h) => h.update(buf),
            StreamingHash::Sha256(h) => h.update(buf),
            StreamingHash::Sha384(h) => h.update(buf),
            StreamingHash::Sha512(h) => h.update(buf),
        }
    }

    pub fn finalize(self) -> Checksum {
        let algorithm = self.algorithm();
        let digest = match self {
            StreamingHash::Md5(h) => hex::encode(h.finalize()),
            StreamingHash::Sha1(h) => hex::encode(h.finalize()),
            StreamingHash::Sha224(h) => hex::encode(h.finalize()),
            StreamingHash::Sha256(h) => hex::encode(h.finalize()),
            StreamingHash::Sha384(h) => hex::encode(h.finalize()),
            StreamingHash::Sha512(h) => hex::encode(h.finalize()),
        };
        Checksum { algorithm, digest }
    }
}

/// Lowercase hex digest tagged with the algorithm that produced it.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Checksum {
    pub algorithm: Algorithm,
    pub digest: String,
}

impl Checksum {
    /// One-shot digest of an in-memory buffer.
    pub fn of_bytes(algorithm: Algorithm, bytes: &[u8]) -> Self {
        let mut h = algorithm.hasher();
        h.update(bytes);
        h.finalize()
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algorithm, self.digest)
    }
}
