//! Bag-level bookkeeping: which manifests and tag files a bag owns, and the
//! write sequence that keeps them consistent with each other.
//!
//! `save` runs in three strict phases:
//!
//! 1. write every tracked tag file,
//! 2. checksum each freshly written tag file into every tag manifest,
//! 3. write every manifest.
//!
//! Phase 2 only ever reads bytes produced by phase 1, so a tag manifest never
//! describes a tag file that is still going to change. Manifests are never
//! inputs to tag manifests.

pub mod verify;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::checksum::pipeline::{Checksums, hash_file};
use crate::container::manifest::{Manifest, ManifestKind};
use crate::container::tagfile::{TagField, TagFile};
use crate::error::{BagError, Result};
use crate::hash::algorithm::Algorithm;
use crate::payload::Payload;
use crate::policy::{BagOptions, OpenOptions, Strictness};
use crate::util::sanitize::{bag_key, rel_slash, safe_join};

pub const PAYLOAD_DIR: &str = "data";
pub const BAGIT_TXT: &str = "bagit.txt";
pub const BAG_INFO_TXT: &str = "bag-info.txt";
pub const BAGIT_VERSION: &str = "0.97";
pub const TAG_FILE_ENCODING: &str = "UTF-8";

/// Lifecycle of a bag within one process run.
///
/// Write path: `Created -> Populated -> Saved`. Read path: `Opened -> Validated`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BagState {
    Created,
    Populated,
    Saved,
    Opened,
    Validated,
}

impl fmt::Display for BagState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BagState::Created => "created",
            BagState::Populated => "populated",
            BagState::Saved => "saved",
            BagState::Opened => "opened",
            BagState::Validated => "validated",
        };
        f.write_str(s)
    }
}

/// Problems found while opening a bag that did not prevent opening it.
#[derive(Debug, Default)]
pub struct OpenReport {
    pub errors: Vec<BagError>,
    pub warnings: Vec<BagError>,
}

#[derive(Debug)]
pub struct Bag {
    root: PathBuf,
    payload: Payload,
    manifests: Vec<Manifest>,
    tag_files: BTreeMap<String, TagFile>,
    state: BagState,
}

impl Bag {
    /// Create `location/name` as a new, empty bag.
    ///
    /// example:
    ///     Bag::create(Path::new("archive/bags"), "bag-34323", &BagOptions::default())
    pub fn create(location: &Path, name: &str, opts: &BagOptions) -> Result<Self> {
        let algorithms: BTreeSet<Algorithm> = opts.algorithms.iter().copied().collect();
        if algorithms.is_empty() {
            return Err(BagError::UnsupportedAlgorithm(
                "no checksum algorithm requested".to_string(),
            ));
        }

        let root = location.join(name);
        fs::create_dir(&root).map_err(|e| {
            if e.kind() == ErrorKind::AlreadyExists {
                BagError::AlreadyExists(root.clone())
            } else {
                BagError::io_at(&root)(e)
            }
        })?;

        let mut manifests = Vec::new();
        for a in &algorithms {
            manifests.push(Manifest::new(&root, ManifestKind::Payload, *a));
        }
        if opts.tag_manifests {
            for a in &algorithms {
                manifests.push(Manifest::new(&root, ManifestKind::Tag, *a));
            }
        }

        let data = root.join(PAYLOAD_DIR);
        fs::create_dir(&data).map_err(BagError::io_at(&data))?;
        let payload = Payload::open(&data)?.with_follow_links(opts.follow_links);

        let mut bag = Self {
            root,
            payload,
            manifests,
            tag_files: BTreeMap::new(),
            state: BagState::Created,
        };

        let bagit = bag.add_tag_file(BAGIT_TXT)?;
        bagit.add_field(TagField::new("BagIt-Version", BAGIT_VERSION));
        bagit.add_field(TagField::new("Tag-File-Character-Encoding", TAG_FILE_ENCODING));

        info!(
            bag = %bag.root.display(),
            algorithms = ?algorithms,
            tag_manifests = opts.tag_manifests,
            "bag created"
        );
        Ok(bag)
    }

    /// Open an existing bag for reading.
    ///
    /// Every manifest found at the bag root is parsed; bad lines are collected
    /// in the report rather than failing the open. Only the tag files named in
    /// `opts.known_tag_files` are parsed and tracked.
    pub fn open(root: &Path, opts: &OpenOptions) -> Result<(Self, OpenReport)> {
        if !root.is_dir() {
            return Err(BagError::NotADirectory(root.to_path_buf()));
        }
        let mut report = OpenReport::default();

        let mut names = Vec::new();
        for entry in fs::read_dir(root).map_err(BagError::io_at(root))? {
            let entry = entry.map_err(BagError::io_at(root))?;
            if entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
                names.push(entry.file_name().to_string_lossy().to_string());
            }
        }
        names.sort();

        let mut manifests = Vec::new();
        for name in &names {
            match ManifestKind::classify(name) {
                None => {}
                Some(Err(e)) => report.errors.push(e),
                Some(Ok((kind, algorithm))) => match Manifest::load(root, kind, algorithm) {
                    Ok((m, errs)) => {
                        debug!(
                            manifest = %name,
                            entries = m.len(),
                            errors = errs.len(),
                            "manifest parsed"
                        );
                        report.errors.extend(errs);
                        manifests.push(m);
                    }
                    Err(e) => report.errors.push(e),
                },
            }
        }
        if !manifests.iter().any(|m| m.kind() == ManifestKind::Payload) {
            return Err(BagError::NoManifestFound(root.to_path_buf()));
        }

        let payload = Payload::open(&root.join(PAYLOAD_DIR))
            .map_err(|_| BagError::MissingFile(PAYLOAD_DIR.to_string()))?;

        let mut tag_files = BTreeMap::new();
        for name in &opts.known_tag_files {
            let problem = match bag_key(name) {
                Ok(key) if root.join(&key).is_file() => match TagFile::load(root, &key) {
                    Ok(tf) => {
                        tag_files.insert(key, tf);
                        continue;
                    }
                    Err(e) => e,
                },
                Ok(key) => BagError::MissingFile(key),
                Err(e) => e,
            };
            match opts.tag_file_strictness {
                Strictness::Warn => {
                    warn!(tag_file = %name, error = %problem, "tag file not tracked");
                    report.warnings.push(problem);
                }
                Strictness::Strict => report.errors.push(problem),
            }
        }

        info!(
            bag = %root.display(),
            manifests = manifests.len(),
            tag_files = tag_files.len(),
            errors = report.errors.len(),
            warnings = report.warnings.len(),
            "bag opened"
        );
        let bag = Self {
            root: root.to_path_buf(),
            payload,
            manifests,
            tag_files,
            state: BagState::Opened,
        };
        Ok((bag, report))
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    pub fn state(&self) -> BagState {
        self.state
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    pub fn manifests(&self) -> &[Manifest] {
        &self.manifests
    }

    pub fn manifest(&self, kind: ManifestKind, algorithm: Algorithm) -> Option<&Manifest> {
        self.manifests
            .iter()
            .find(|m| m.kind() == kind && m.algorithm() == algorithm)
    }

    fn algorithms_of(&self, kind: ManifestKind) -> BTreeSet<Algorithm> {
        self.manifests
            .iter()
            .filter(|m| m.kind() == kind)
            .map(|m| m.algorithm())
            .collect()
    }

    fn require(&self, op: &'static str, allowed: &[BagState]) -> Result<()> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(BagError::InvalidState {
                op,
                state: self.state.to_string(),
            })
        }
    }

    // METHODS FOR MANAGING BAG PAYLOADS

    // `rel` must already be a canonical key from `bag_key` or `rel_slash`.
    fn record_payload(&mut self, rel: &str, sums: &Checksums) {
        let key = format!("{PAYLOAD_DIR}/{rel}");
        for m in self
            .manifests
            .iter_mut()
            .filter(|m| m.kind() == ManifestKind::Payload)
        {
            if let Some(c) = sums.get(&m.algorithm()) {
                m.set_checksum(key.clone(), c);
            }
        }
    }

    /// Copy `src` into the payload as `data/<dst>` and record it in every
    /// payload manifest.
    ///
    /// example:
    ///     bag.add_file(Path::new("/tmp/myfile.txt"), "myfile.txt")?;
    pub fn add_file(&mut self, src: &Path, dst: &str) -> Result<()> {
        self.require("add a file to", &[BagState::Created, BagState::Populated])?;
        let algorithms = self.algorithms_of(ManifestKind::Payload);
        let key = bag_key(dst)?;
        let sums = self.payload.add(src, &key, &algorithms)?;
        self.record_payload(&key, &sums);
        self.state = BagState::Populated;
        Ok(())
    }

    /// `add_file` for every file below `src`; failures are returned, the
    /// rest of the directory is still added.
    pub fn add_dir(&mut self, src: &Path) -> Vec<BagError> {
        let allowed = [BagState::Created, BagState::Populated];
        if let Err(e) = self.require("add a directory to", &allowed) {
            return vec![e];
        }
        let algorithms = self.algorithms_of(ManifestKind::Payload);
        let (added, errs) = self.payload.add_all(src, &algorithms);
        for (rel, sums) in &added {
            self.record_payload(rel, sums);
        }
        self.state = BagState::Populated;
        errs
    }

    // METHODS FOR MANAGING BAG TAG FILES

    /// Track a tag file by its bag-relative name, creating parent directories.
    /// A file already on disk under that name has its fields loaded.
    ///
    /// example:
    ///     bag.add_tag_file("bag-info.txt")?.set_field("Contact-Name", "Ed");
    pub fn add_tag_file(&mut self, name: &str) -> Result<&mut TagFile> {
        self.require(
            "add a tag file to",
            &[BagState::Created, BagState::Populated, BagState::Saved],
        )?;
        let key = bag_key(name)?;
        let path = self.root.join(&key);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(BagError::io_at(parent))?;
        }
        if !self.tag_files.contains_key(&key) {
            let tf = if path.is_file() {
                TagFile::load(&self.root, &key)?
            } else {
                TagFile::new(&key)
            };
            debug!(tag_file = %key, fields = tf.fields().len(), "tag file registered");
            self.tag_files.insert(key.clone(), tf);
        }
        self.tag_file_mut(&key)
    }

    /// Look up a tracked tag file; `./x` and `x` name the same file.
    pub fn tag_file(&self, name: &str) -> Result<&TagFile> {
        bag_key(name)
            .ok()
            .and_then(|key| self.tag_files.get(&key))
            .ok_or_else(|| BagError::NotFound(name.to_string()))
    }

    pub fn tag_file_mut(&mut self, name: &str) -> Result<&mut TagFile> {
        bag_key(name)
            .ok()
            .and_then(|key| self.tag_files.get_mut(&key))
            .ok_or_else(|| BagError::NotFound(name.to_string()))
    }

    /// The optional `bag-info.txt`; `NotFound` until it has been added.
    pub fn bag_info(&self) -> Result<&TagFile> {
        self.tag_file(BAG_INFO_TXT)
    }

    pub fn tag_files(&self) -> impl Iterator<Item = &TagFile> {
        self.tag_files.values()
    }

    // METHODS FOR MANAGING OR RETURNING INFORMATION ABOUT THE BAG ITSELF

    /// Write every tag file, then the tag manifest entries for them, then
    /// every manifest. Each failure is collected and the sequence continues;
    /// a non-empty result means the bag on disk is incomplete.
    pub fn save(&mut self) -> Vec<BagError> {
        if let Err(e) = self.require(
            "save",
            &[BagState::Created, BagState::Populated, BagState::Saved],
        ) {
            return vec![e];
        }
        let mut errs = Vec::new();

        // Phase 1: tag files reach their final bytes.
        let mut written = Vec::new();
        let mut failed = Vec::new();
        for (name, tf) in &self.tag_files {
            match tf.create(&self.root) {
                Ok(()) => written.push(name.clone()),
                Err(e) => {
                    errs.push(e);
                    failed.push(name.clone());
                }
            }
        }
        // An entry from an earlier save no longer describes what is on disk.
        for m in self
            .manifests
            .iter_mut()
            .filter(|m| m.kind() == ManifestKind::Tag)
        {
            for name in &failed {
                m.remove(name);
            }
        }

        // Phase 2: checksum what phase 1 wrote.
        let tag_algorithms = self.algorithms_of(ManifestKind::Tag);
        if !tag_algorithms.is_empty() {
            for name in &written {
                let sums = match safe_join(&self.root, name)
                    .and_then(|p| hash_file(&p, &tag_algorithms))
                {
                    Ok(s) => s,
                    Err(e) => {
                        errs.push(e);
                        continue;
                    }
                };
                for m in self
                    .manifests
                    .iter_mut()
                    .filter(|m| m.kind() == ManifestKind::Tag)
                {
                    if let Some(c) = sums.get(&m.algorithm()) {
                        m.set_checksum(name.clone(), c);
                    }
                }
            }
        }

        // Phase 3: manifests last.
        for m in &self.manifests {
            if let Err(e) = m.create() {
                errs.push(e);
            }
        }

        self.state = BagState::Saved;
        if errs.is_empty() {
            info!(bag = %self.root.display(), "bag saved");
        } else {
            warn!(bag = %self.root.display(), errors = errs.len(), "bag saved with errors");
        }
        errs
    }

    /// Bag-relative names of every registered tag file and every manifest.
    /// Payload files are not included.
    pub fn tracked_files(&self) -> BTreeSet<String> {
        let mut files: BTreeSet<String> = self.tag_files.keys().cloned().collect();
        files.extend(self.manifests.iter().map(Manifest::file_name));
        files
    }

    /// Check that every tracked file is present on disk; contents are not read.
    pub fn confirm_files(&self) -> Vec<BagError> {
        let mut errs = Vec::new();
        for f in self.tracked_files() {
            let path = match safe_join(&self.root, &f) {
                Ok(p) => p,
                Err(e) => {
                    errs.push(e);
                    continue;
                }
            };
            match fs::metadata(&path) {
                Ok(_) => {}
                Err(e) if e.kind() == ErrorKind::NotFound => errs.push(BagError::MissingFile(f)),
                Err(e) => errs.push(BagError::io_at(path)(e)),
            }
        }
        errs
    }

    /// Everything under the bag root outside `data/`: regular files and
    /// empty directories, as bag-relative paths.
    pub fn list_files(&self) -> Result<Vec<String>> {
        let data = self.payload.dir().to_path_buf();
        let mut files = Vec::new();
        let walker = WalkDir::new(&self.root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.path() != data.as_path());
        for entry in walker {
            let entry = entry?;
            let Some(rel) = rel_slash(entry.path(), &self.root) else {
                continue;
            };
            if entry.file_type().is_dir() {
                let empty = fs::read_dir(entry.path())
                    .map_err(BagError::io_at(entry.path()))?
                    .next()
                    .is_none();
                if !empty {
                    continue;
                }
            }
            files.push(rel);
        }
        Ok(files)
    }

    /// Files present in the bag that no manifest or tag file registration
    /// accounts for.
    pub fn orphans(&self) -> Result<Vec<String>> {
        let tracked = self.tracked_files();
        Ok(self
            .list_files()?
            .into_iter()
            .filter(|f| !tracked.contains(f))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts(algorithms: &[Algorithm], tag_manifests: bool) -> BagOptions {
        BagOptions {
            algorithms: algorithms.to_vec(),
            tag_manifests,
            follow_links: false,
        }
    }

    #[test]
    fn create_lays_out_the_bag() {
        let dir = tempfile::tempdir().unwrap();
        let opts = opts(&[Algorithm::Md5, Algorithm::Sha256], true);
        let bag = Bag::create(dir.path(), "bag1", &opts).unwrap();

        assert_eq!(bag.state(), BagState::Created);
        assert!(dir.path().join("bag1/data").is_dir());
        assert_eq!(bag.manifests().len(), 4);
        let bagit = bag.tag_file(BAGIT_TXT).unwrap();
        assert_eq!(bagit.get("BagIt-Version"), Some("0.97"));
        assert_eq!(bagit.get("Tag-File-Character-Encoding"), Some("UTF-8"));
    }

    #[test]
    fn create_refuses_existing_directory() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("bag1")).unwrap();
        let err = Bag::create(dir.path(), "bag1", &BagOptions::default()).unwrap_err();
        assert!(matches!(err, BagError::AlreadyExists(_)));
    }

    #[test]
    fn create_requires_an_algorithm() {
        let dir = tempfile::tempdir().unwrap();
        let err = Bag::create(dir.path(), "bag1", &opts(&[], false)).unwrap_err();
        assert!(matches!(err, BagError::UnsupportedAlgorithm(_)));
        assert!(!dir.path().join("bag1").exists());
    }

    #[test]
    fn duplicate_algorithms_collapse() {
        let dir = tempfile::tempdir().unwrap();
        let opts = opts(&[Algorithm::Md5, Algorithm::Md5], false);
        let bag = Bag::create(dir.path(), "b", &opts).unwrap();
        assert_eq!(bag.manifests().len(), 1);
    }

    #[test]
    fn tag_file_lookup() {
        let dir = tempfile::tempdir().unwrap();
        let mut bag = Bag::create(dir.path(), "b", &BagOptions::default()).unwrap();
        assert!(matches!(bag.bag_info(), Err(BagError::NotFound(_))));
        bag.add_tag_file(BAG_INFO_TXT).unwrap().set_field("Contact-Name", "Ed");
        assert_eq!(bag.bag_info().unwrap().get("Contact-Name"), Some("Ed"));

        bag.add_tag_file("meta/nested/extra.txt").unwrap();
        assert!(dir.path().join("b/meta/nested").is_dir());
        assert!(matches!(
            bag.add_tag_file("../outside.txt"),
            Err(BagError::UnsafePath(_))
        ));
    }

    #[test]
    fn tracked_files_are_tag_files_and_manifests() {
        let dir = tempfile::tempdir().unwrap();
        let bag = Bag::create(dir.path(), "b", &opts(&[Algorithm::Sha1], true)).unwrap();
        let tracked: Vec<_> = bag.tracked_files().into_iter().collect();
        assert_eq!(
            tracked,
            vec!["bagit.txt", "manifest-sha1.txt", "tagmanifest-sha1.txt"]
        );
    }

    #[test]
    fn add_file_updates_every_payload_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("a.txt");
        fs::write(&src, "hello").unwrap();
        let opts = opts(&[Algorithm::Md5, Algorithm::Sha1], true);
        let mut bag = Bag::create(dir.path(), "b", &opts).unwrap();
        bag.add_file(&src, "a.txt").unwrap();

        assert_eq!(bag.state(), BagState::Populated);
        let md5 = bag.manifest(ManifestKind::Payload, Algorithm::Md5).unwrap();
        assert_eq!(md5.get("data/a.txt"), Some("5d41402abc4b2a76b9719d911017c592"));
        let sha1 = bag.manifest(ManifestKind::Payload, Algorithm::Sha1).unwrap();
        assert_eq!(
            sha1.get("data/a.txt"),
            Some("aaf4c61ddcc5e8a2dabede0f3b482cd9aea9434d")
        );
        // tag manifests only change during save
        assert!(bag.manifest(ManifestKind::Tag, Algorithm::Md5).unwrap().is_empty());
    }

    #[test]
    fn add_file_missing_source() {
        let dir = tempfile::tempdir().unwrap();
        let mut bag = Bag::create(dir.path(), "b", &BagOptions::default()).unwrap();
        let err = bag.add_file(&dir.path().join("nope"), "nope").unwrap_err();
        assert!(matches!(err, BagError::SourceNotFound(_)));
        assert_eq!(bag.state(), BagState::Created);
    }

    #[test]
    fn list_files_skips_payload_and_non_empty_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("a.txt");
        fs::write(&src, "hello").unwrap();
        let mut bag = Bag::create(dir.path(), "b", &opts(&[Algorithm::Md5], false)).unwrap();
        bag.add_file(&src, "a.txt").unwrap();
        bag.add_tag_file("meta/info.txt").unwrap();
        fs::create_dir(dir.path().join("b/empty")).unwrap();
        assert!(bag.save().is_empty());

        let files = bag.list_files().unwrap();
        assert_eq!(
            files,
            vec!["bagit.txt", "empty", "manifest-md5.txt", "meta/info.txt"]
        );
        assert_eq!(bag.orphans().unwrap(), vec!["empty"]);
    }

    #[test]
    fn dotted_and_doubled_destinations_get_canonical_keys() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("a.txt");
        fs::write(&src, "hello").unwrap();
        let mut bag = Bag::create(dir.path(), "b", &opts(&[Algorithm::Md5], true)).unwrap();
        bag.add_file(&src, "./a.txt").unwrap();
        bag.add_file(&src, "sub//b.txt").unwrap();
        bag.add_tag_file("./notes.txt").unwrap();
        assert!(bag.tag_file("notes.txt").is_ok());
        assert!(bag.save().is_empty());

        let root = dir.path().join("b");
        assert_eq!(
            fs::read_to_string(root.join("manifest-md5.txt")).unwrap(),
            "5d41402abc4b2a76b9719d911017c592 data/a.txt\n\
             5d41402abc4b2a76b9719d911017c592 data/sub/b.txt\n"
        );
        let tags = bag.manifest(ManifestKind::Tag, Algorithm::Md5).unwrap();
        assert!(tags.get("notes.txt").is_some());
        assert!(tags.get("./notes.txt").is_none());
        assert!(bag.orphans().unwrap().is_empty());

        let mut opened = OpenOptions::default();
        opened.known_tag_files.push("./notes.txt".to_string());
        let (mut reopened, report) = Bag::open(&root, &opened).unwrap();
        assert!(report.errors.is_empty(), "{:?}", report.errors);
        assert!(reopened.verify().is_empty());
        assert!(reopened.orphans().unwrap().is_empty());
    }

    #[test]
    fn failed_tag_file_write_drops_its_stale_entry() {
        let dir = tempfile::tempdir().unwrap();
        let mut bag = Bag::create(dir.path(), "b", &opts(&[Algorithm::Md5], true)).unwrap();
        bag.add_tag_file("notes.txt").unwrap().set_field("Note", "one");
        assert!(bag.save().is_empty());
        let tags = bag.manifest(ManifestKind::Tag, Algorithm::Md5).unwrap();
        assert!(tags.get("notes.txt").is_some());

        // a directory in the way makes the rewrite fail
        let path = dir.path().join("b/notes.txt");
        fs::remove_file(&path).unwrap();
        fs::create_dir(&path).unwrap();
        let errs = bag.save();
        assert_eq!(errs.len(), 1, "{errs:?}");

        let tags = bag.manifest(ManifestKind::Tag, Algorithm::Md5).unwrap();
        assert!(tags.get("notes.txt").is_none());
        assert!(tags.get(BAGIT_TXT).is_some());
        let text = fs::read_to_string(dir.path().join("b/tagmanifest-md5.txt")).unwrap();
        assert!(!text.contains("notes.txt"));
    }
}
