// bagit_core/src/domain.rs
use std::path::Path;

use serde::Serialize;

use crate::bag::Bag;
use crate::container::manifest::{Manifest, ManifestKind};
use crate::error::Result;
use crate::hash::algorithm::Algorithm;
use crate::policy::OpenOptions;

#[derive(Clone, Debug, Serialize)]
pub struct ManifestRow {
    pub file_name: String,
    pub kind: ManifestKind,
    pub algorithm: Algorithm,
    pub entries: usize,
}

impl From<&Manifest> for ManifestRow {
    fn from(m: &Manifest) -> Self {
        Self {
            file_name: m.file_name(),
            kind: m.kind(),
            algorithm: m.algorithm(),
            entries: m.len(),
        }
    }
}

/// Everything a full check of a bag on disk turned up.
#[derive(Clone, Debug, Default, Serialize)]
pub struct CheckReport {
    pub bag: String,
    pub manifests: Vec<ManifestRow>,
    pub open_errors: Vec<String>,
    pub open_warnings: Vec<String>,
    pub missing: Vec<String>,
    pub orphans: Vec<String>,
    pub verify_failures: Vec<String>,
}

impl CheckReport {
    /// Count of findings that make the bag unclean. Warnings and orphans
    /// are not counted.
    pub fn problems(&self) -> usize {
        self.open_errors.len() + self.missing.len() + self.verify_failures.len()
    }

    pub fn is_clean(&self) -> bool {
        self.problems() == 0
    }
}

/// Open `root`, confirm tracked files, list orphans and verify every checksum.
pub fn check(root: &Path, opts: &OpenOptions) -> Result<CheckReport> {
    let (mut bag, opened) = Bag::open(root, opts)?;
    let strings = |errs: Vec<crate::error::BagError>| -> Vec<String> {
        errs.into_iter().map(|e| e.to_string()).collect()
    };

    Ok(CheckReport {
        bag: root.display().to_string(),
        manifests: bag.manifests().iter().map(ManifestRow::from).collect(),
        open_errors: strings(opened.errors),
        open_warnings: strings(opened.warnings),
        missing: strings(bag.confirm_files()),
        orphans: bag.orphans()?,
        verify_failures: strings(bag.verify()),
    })
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::policy::BagOptions;

    #[test]
    fn check_reports_orphans_without_failing() {
        let dir = tempfile::tempdir().unwrap();
        let mut bag = Bag::create(dir.path(), "b", &BagOptions::default()).unwrap();
        assert!(bag.save().is_empty());
        fs::write(dir.path().join("b/stray.txt"), "x").unwrap();

        let report = check(&dir.path().join("b"), &OpenOptions::default()).unwrap();
        assert!(report.is_clean(), "{report:?}");
        assert_eq!(report.orphans, vec!["stray.txt"]);
        assert_eq!(report.manifests.len(), 1);
        assert_eq!(report.manifests[0].file_name, "manifest-sha256.txt");
        // bag-info.txt is optional
        assert_eq!(report.open_warnings.len(), 1);
    }
}
