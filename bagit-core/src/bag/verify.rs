use std::collections::{BTreeMap, BTreeSet};

use tracing::info;
use walkdir::WalkDir;

use super::{Bag, BagState};
use crate::checksum::pipeline::hash_file;
use crate::container::manifest::ManifestKind;
use crate::error::BagError;
use crate::hash::algorithm::Algorithm;
use crate::util::sanitize::{rel_slash, safe_join};

impl Bag {
    /// Re-hash every file named by any manifest and compare against the
    /// recorded digests. Each file is read once no matter how many manifests
    /// list it. Payload files missing from every payload manifest are reported
    /// too.
    pub fn verify(&mut self) -> Vec<BagError> {
        let mut errs = Vec::new();

        // path -> [(algorithm, expected digest)]
        let mut expected: BTreeMap<&str, Vec<(Algorithm, &str)>> = BTreeMap::new();
        for m in &self.manifests {
            for (path, digest) in m.entries() {
                expected
                    .entry(path.as_str())
                    .or_default()
                    .push((m.algorithm(), digest.as_str()));
            }
        }

        for (path, wants) in &expected {
            let full = match safe_join(&self.root, path) {
                Ok(p) => p,
                Err(e) => {
                    errs.push(e);
                    continue;
                }
            };
            if !full.is_file() {
                errs.push(BagError::MissingFile(path.to_string()));
                continue;
            }
            let algorithms: BTreeSet<Algorithm> = wants.iter().map(|(a, _)| *a).collect();
            let got = match hash_file(&full, &algorithms) {
                Ok(g) => g,
                Err(e) => {
                    errs.push(e);
                    continue;
                }
            };
            for (algorithm, want) in wants {
                let Some(actual) = got.get(algorithm) else {
                    continue;
                };
                if !actual.digest.eq_ignore_ascii_case(want) {
                    errs.push(BagError::ChecksumMismatch {
                        path: path.to_string(),
                        algorithm: algorithm.to_string(),
                        expected: want.to_string(),
                        actual: actual.digest.clone(),
                    });
                }
            }
        }

        let listed: BTreeSet<&str> = self
            .manifests
            .iter()
            .filter(|m| m.kind() == ManifestKind::Payload)
            .flat_map(|m| m.entries().keys().map(String::as_str))
            .collect();
        for entry in WalkDir::new(self.payload.dir()).sort_by_file_name() {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    errs.push(e.into());
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let Some(rel) = rel_slash(entry.path(), &self.root) else {
                continue;
            };
            if !listed.contains(rel.as_str()) {
                errs.push(BagError::UnlistedPayloadFile(rel));
            }
        }

        info!(
            bag = %self.root.display(),
            files = expected.len(),
            problems = errs.len(),
            "bag verified"
        );
        if self.state == BagState::Opened {
            self.state = BagState::Validated;
        }
        errs
    }
}
