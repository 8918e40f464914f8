use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::checksum::pipeline::{Checksums, copy_and_hash};
use crate::error::{BagError, Result};
use crate::hash::algorithm::Algorithm;
use crate::util::sanitize::{rel_slash, safe_join};

/// The payload directory of a bag (`data/`).
#[derive(Clone, Debug)]
pub struct Payload {
    dir: PathBuf,
    follow_links: bool,
}

impl Payload {
    /// Wrap an existing directory.
    pub fn open(dir: &Path) -> Result<Self> {
        if !dir.is_dir() {
            return Err(BagError::NotADirectory(dir.to_path_buf()));
        }
        Ok(Self {
            dir: dir.to_path_buf(),
            follow_links: false,
        })
    }

    /// Whether `add_all` follows symlinks while walking a source tree.
    pub fn with_follow_links(mut self, follow: bool) -> Self {
        self.follow_links = follow;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Copy `src` to `data/<dst>` and return its checksums.
    pub fn add(
        &self,
        src: &Path,
        dst: &str,
        algorithms: &BTreeSet<Algorithm>,
    ) -> Result<Checksums> {
        if !src.exists() {
            return Err(BagError::SourceNotFound(src.to_path_buf()));
        }
        let target = safe_join(&self.dir, dst)?;
        copy_and_hash(src, &target, algorithms)
    }

    /// Add every regular file below `src_dir`, keyed by its `/`-separated
    /// path relative to `src_dir`. A failing file is reported and skipped.
    pub fn add_all(
        &self,
        src_dir: &Path,
        algorithms: &BTreeSet<Algorithm>,
    ) -> (BTreeMap<String, Checksums>, Vec<BagError>) {
        let mut added = BTreeMap::new();
        let mut errs = Vec::new();

        if !src_dir.is_dir() {
            errs.push(BagError::SourceNotFound(src_dir.to_path_buf()));
            return (added, errs);
        }

        for entry in WalkDir::new(src_dir)
            .follow_links(self.follow_links)
            .sort_by_file_name()
        {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    warn!(error = %e, "skipping unreadable entry");
                    errs.push(e.into());
                    continue;
                }
            };
            if entry.path_is_symlink() && !self.follow_links {
                warn!(link = %entry.path().display(), "symlink not followed; skipped");
                continue;
            }
            if !entry.file_type().is_file() {
                continue;
            }
            let Some(rel) = rel_slash(entry.path(), src_dir) else {
                continue;
            };
            match self.add(entry.path(), &rel, algorithms) {
                Ok(sums) => {
                    added.insert(rel, sums);
                }
                Err(e) => {
                    warn!(file = %rel, error = %e, "failed to add payload file");
                    errs.push(e);
                }
            }
        }
        debug!(
            src = %src_dir.display(),
            files = added.len(),
            errors = errs.len(),
            "payload directory added"
        );
        (added, errs)
    }
}
