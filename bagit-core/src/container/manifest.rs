//! Manifest files: `manifest-<algo>.txt` for payload checksums and
//! `tagmanifest-<algo>.txt` for tag file checksums.
//!
//! One line per entry, `<hex digest> <relative path>`. Entries are kept in a
//! `BTreeMap` so a serialized manifest is always ordered by path and two saves
//! of the same entries are byte-identical.
//!
//! Paths are written with `%`, CR and LF percent-encoded (`%25`, `%0D`,
//! `%0A`), plus any leading space or tab (`%20`, `%09`) so it survives the
//! separator. Parsing decodes exactly those escapes; any other `%` is taken
//! literally.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{BagError, Result};
use crate::hash::algorithm::{Algorithm, Checksum};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ManifestKind {
    Payload,
    Tag,
}

impl ManifestKind {
    pub fn prefix(self) -> &'static str {
        match self {
            ManifestKind::Payload => "manifest-",
            ManifestKind::Tag => "tagmanifest-",
        }
    }

    pub fn file_name(self, algorithm: Algorithm) -> String {
        format!("{}{}.txt", self.prefix(), algorithm)
    }

    /// Recognise a manifest by its file name. `Some(Err)` means the name looks
    /// like a manifest but names an algorithm we do not support.
    pub fn classify(file_name: &str) -> Option<Result<(ManifestKind, Algorithm)>> {
        for kind in [ManifestKind::Tag, ManifestKind::Payload] {
            if let Some(rest) = file_name.strip_prefix(kind.prefix()) {
                let algo = rest.strip_suffix(".txt")?;
                return Some(Algorithm::lookup(algo).map(|a| (kind, a)));
            }
        }
        None
    }
}

impl fmt::Display for ManifestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ManifestKind::Payload => f.write_str("payload"),
            ManifestKind::Tag => f.write_str("tag"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Manifest {
    kind: ManifestKind,
    algorithm: Algorithm,
    location: PathBuf,
    entries: BTreeMap<String, String>,
}

impl Manifest {
    /// Empty manifest whose file lives directly under `bag_root`.
    pub fn new(bag_root: &Path, kind: ManifestKind, algorithm: Algorithm) -> Self {
        Self {
            kind,
            algorithm,
            location: bag_root.join(kind.file_name(algorithm)),
            entries: BTreeMap::new(),
        }
    }

    pub fn kind(&self) -> ManifestKind {
        self.kind
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    pub fn location(&self) -> &Path {
        &self.location
    }

    pub fn file_name(&self) -> String {
        self.kind.file_name(self.algorithm)
    }

    pub fn entries(&self) -> &BTreeMap<String, String> {
        &self.entries
    }

    pub fn get(&self, path: &str) -> Option<&str> {
        self.entries.get(path).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Insert or overwrite the digest recorded for `path`.
    pub fn set(&mut self, path: impl Into<String>, digest: impl Into<String>) {
        self.entries.insert(path.into(), digest.into());
    }

    /// Record a checksum computed under this manifest's algorithm. Checksums
    /// for any other algorithm are ignored and `false` is returned.
    pub fn set_checksum(&mut self, path: impl Into<String>, checksum: &Checksum) -> bool {
        if checksum.algorithm != self.algorithm {
            return false;
        }
        self.set(path, checksum.digest.clone());
        true
    }

    pub fn remove(&mut self, path: &str) -> Option<String> {
        self.entries.remove(path)
    }

    /// Parse manifest text, collecting every bad line instead of stopping at
    /// the first. Well-formed lines are kept even when others fail.
    pub fn parse_lenient(
        bag_root: &Path,
        kind: ManifestKind,
        algorithm: Algorithm,
        text: &str,
    ) -> (Self, Vec<BagError>) {
        let mut m = Self::new(bag_root, kind, algorithm);
        let name = m.file_name();
        let mut errs = Vec::new();

        for (idx, raw) in text.lines().enumerate() {
            let line = raw.trim_end_matches('\r');
            if line.trim().is_empty() {
                continue;
            }
            let malformed = |reason: String| BagError::MalformedManifest {
                manifest: name.clone(),
                line: idx + 1,
                reason,
            };

            let Some((digest, path)) = line.split_once(|c: char| c.is_whitespace()) else {
                errs.push(malformed("expected `<digest> <path>`".to_string()));
                continue;
            };
            let path = decode_path(path.trim_start());
            if path.is_empty() {
                errs.push(malformed("missing path".to_string()));
                continue;
            }
            if digest.len() != algorithm.hex_len() || hex::decode(digest).is_err() {
                errs.push(malformed(format!("`{digest}` is not a {algorithm} hex digest")));
                continue;
            }
            if m.entries.contains_key(&path) {
                errs.push(BagError::DuplicateEntry {
                    manifest: name.clone(),
                    path,
                });
                continue;
            }
            m.entries.insert(path, digest.to_ascii_lowercase());
        }
        (m, errs)
    }

    /// Strict parse: the first bad line fails the whole manifest.
    pub fn parse(
        bag_root: &Path,
        kind: ManifestKind,
        algorithm: Algorithm,
        text: &str,
    ) -> Result<Self> {
        let (m, mut errs) = Self::parse_lenient(bag_root, kind, algorithm, text);
        if errs.is_empty() {
            Ok(m)
        } else {
            Err(errs.swap_remove(0))
        }
    }

    /// Read and leniently parse the manifest file at `bag_root/<kind>-<algo>.txt`.
    pub fn load(
        bag_root: &Path,
        kind: ManifestKind,
        algorithm: Algorithm,
    ) -> Result<(Self, Vec<BagError>)> {
        let location = bag_root.join(kind.file_name(algorithm));
        let text = fs::read_to_string(&location).map_err(BagError::io_at(&location))?;
        Ok(Self::parse_lenient(bag_root, kind, algorithm, &text))
    }

    pub fn serialize(&self) -> String {
        let mut out = String::new();
        for (path, digest) in &self.entries {
            out.push_str(digest);
            out.push(' ');
            out.push_str(&encode_path(path));
            out.push('\n');
        }
        out
    }

    /// Write the manifest to its location, replacing any previous file atomically.
    pub fn create(&self) -> Result<()> {
        let dir = self
            .location
            .parent()
            .ok_or_else(|| BagError::NotADirectory(self.location.clone()))?;
        fs::create_dir_all(dir).map_err(BagError::io_at(dir))?;

        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(BagError::io_at(dir))?;
        tmp.write_all(self.serialize().as_bytes())
            .map_err(BagError::io_at(tmp.path()))?;
        tmp.as_file()
            .sync_all()
            .map_err(BagError::io_at(tmp.path()))?;
        tmp.persist(&self.location)
            .map_err(|e| BagError::io_at(&self.location)(e.error))?;

        debug!(manifest = %self.file_name(), entries = self.entries.len(), "manifest written");
        Ok(())
    }
}

fn encode_path(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    let mut leading = true;
    for c in path.chars() {
        leading = leading && (c == ' ' || c == '\t');
        match c {
            '%' => out.push_str("%25"),
            '\r' => out.push_str("%0D"),
            '\n' => out.push_str("%0A"),
            ' ' if leading => out.push_str("%20"),
            '\t' if leading => out.push_str("%09"),
            _ => out.push(c),
        }
    }
    out
}

fn decode_path(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(i) = rest.find('%') {
        out.push_str(&rest[..i]);
        let tail = &rest[i..];
        let decoded = tail.get(1..3).and_then(|h| match h.to_ascii_uppercase().as_str() {
            "25" => Some('%'),
            "0D" => Some('\r'),
            "0A" => Some('\n'),
            "20" => Some(' '),
            "09" => Some('\t'),
            _ => None,
        });
        match decoded {
            Some(c) => {
                out.push(c);
                rest = &tail[3..];
            }
            None => {
                out.push('%');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}
