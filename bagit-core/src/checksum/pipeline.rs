use std::collections::{BTreeMap, BTreeSet};
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter};
use std::path::Path;

use tracing::debug;

use crate::error::{BagError, Result};
use crate::hash::algorithm::{Algorithm, Checksum, StreamingHash};
use crate::util::hash_forward::HashingForward;

/// One checksum per requested algorithm, all over the same bytes.
pub type Checksums = BTreeMap<Algorithm, Checksum>;

const BUF_SIZE: usize = 64 * 1024;

fn hashers_for(algorithms: &BTreeSet<Algorithm>) -> Vec<StreamingHash> {
    algorithms.iter().map(|a| a.hasher()).collect()
}

fn into_map(sums: Vec<Checksum>) -> Checksums {
    sums.into_iter().map(|c| (c.algorithm, c)).collect()
}

/// Copy `src` to `dst` while hashing the stream under every algorithm in one pass.
///
/// Parent directories of `dst` are created. On failure a partially written
/// `dst` is left behind; cleanup is up to the caller.
pub fn copy_and_hash(
    src: &Path,
    dst: &Path,
    algorithms: &BTreeSet<Algorithm>,
) -> Result<Checksums> {
    let input = File::open(src).map_err(BagError::io_at(src))?;
    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent).map_err(BagError::io_at(parent))?;
    }
    let output = File::create(dst).map_err(BagError::io_at(dst))?;

    let mut reader = BufReader::with_capacity(BUF_SIZE, input);
    let mut fwd = HashingForward::new(
        BufWriter::with_capacity(BUF_SIZE, output),
        hashers_for(algorithms),
    );
    io::copy(&mut reader, &mut fwd).map_err(BagError::io_at(dst))?;
    let copied = fwd.counted;
    let (writer, sums) = fwd.finish().map_err(BagError::io_at(dst))?;
    writer
        .into_inner()
        .map_err(|e| BagError::io_at(dst)(e.into_error()))?
        .sync_all()
        .map_err(BagError::io_at(dst))?;

    debug!(src = %src.display(), dst = %dst.display(), bytes = copied, "copied and hashed");
    Ok(into_map(sums))
}

/// Hash an existing file under every algorithm in one read.
pub fn hash_file(path: &Path, algorithms: &BTreeSet<Algorithm>) -> Result<Checksums> {
    let input = File::open(path).map_err(BagError::io_at(path))?;
    let mut reader = BufReader::with_capacity(BUF_SIZE, input);
    let mut fwd = HashingForward::new(io::sink(), hashers_for(algorithms));
    io::copy(&mut reader, &mut fwd).map_err(BagError::io_at(path))?;
    let (_, sums) = fwd.finish().map_err(BagError::io_at(path))?;
    Ok(into_map(sums))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn algos(list: &[Algorithm]) -> BTreeSet<Algorithm> {
        list.iter().copied().collect()
    }

    #[test]
    fn copies_bytes_and_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src.txt");
        fs::write(&src, b"Test the checksum").unwrap();
        let dst = dir.path().join("out/nested/dst.txt");

        let sums = copy_and_hash(&src, &dst, &algos(&[Algorithm::Md5])).unwrap();
        assert_eq!(fs::read(&dst).unwrap(), b"Test the checksum");
        assert_eq!(sums[&Algorithm::Md5].digest, "92d7a9f0f4a30ca782dcae5fe83ca7eb");
    }

    #[test]
    fn multi_algorithm_matches_single_algorithm_runs() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src.bin");
        let content: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
        fs::write(&src, &content).unwrap();

        let both = copy_and_hash(
            &src,
            &dir.path().join("a"),
            &algos(&[Algorithm::Md5, Algorithm::Sha256]),
        )
        .unwrap();
        let md5 = copy_and_hash(&src, &dir.path().join("b"), &algos(&[Algorithm::Md5])).unwrap();
        let sha = hash_file(&src, &algos(&[Algorithm::Sha256])).unwrap();

        assert_eq!(both.len(), 2);
        assert_eq!(both[&Algorithm::Md5], md5[&Algorithm::Md5]);
        assert_eq!(both[&Algorithm::Sha256], sha[&Algorithm::Sha256]);
        assert_eq!(
            both[&Algorithm::Sha256],
            Checksum::of_bytes(Algorithm::Sha256, &content)
        );
    }

    #[test]
    fn repeated_runs_are_deterministic() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src.txt");
        fs::write(&src, b"same bytes").unwrap();
        let set = algos(&Algorithm::ALL);
        let first = hash_file(&src, &set).unwrap();
        let second = hash_file(&src, &set).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), Algorithm::ALL.len());
    }

    #[test]
    fn missing_source_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = copy_and_hash(
            &dir.path().join("nope"),
            &dir.path().join("dst"),
            &algos(&[Algorithm::Sha1]),
        )
        .unwrap_err();
        assert!(matches!(err, BagError::IoAt { .. }));
        assert!(!dir.path().join("dst").exists());
    }
}
