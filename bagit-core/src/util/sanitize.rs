use std::path::{Component, Path, PathBuf};

use crate::error::{BagError, Result};

/// Canonical `/`-joined form of a bag-relative path. `.` components and
/// repeated separators are dropped; anything that could escape the root, or
/// names nothing at all, is an `UnsafePath`.
pub fn bag_key(rel: &str) -> Result<String> {
    let p = Path::new(rel);
    if p.is_absolute() {
        return Err(BagError::UnsafePath(rel.to_string()));
    }
    let mut parts = Vec::new();
    for c in p.components() {
        match c {
            Component::Normal(s) => parts.push(s.to_string_lossy().to_string()),
            Component::CurDir => {}
            _ => return Err(BagError::UnsafePath(rel.to_string())),
        }
    }
    if parts.is_empty() {
        return Err(BagError::UnsafePath(rel.to_string()));
    }
    Ok(parts.join("/"))
}

/// Join a bag-relative path onto `root`, refusing anything that could escape it.
pub fn safe_join(root: &Path, rel: &str) -> Result<PathBuf> {
    Ok(root.join(bag_key(rel)?))
}

/// `path` relative to `root`, `/`-separated. None if `path` is not under `root`
/// or is `root` itself.
pub fn rel_slash(path: &Path, root: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = rel
        .components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().to_string()),
            _ => None,
        })
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn safe_join_rejects_escapes() {
        let root = Path::new("/bag/data");
        assert!(safe_join(root, "a/b.txt").is_ok());
        assert!(matches!(
            safe_join(root, "../bagit.txt"),
            Err(BagError::UnsafePath(_))
        ));
        assert!(matches!(
            safe_join(root, "/etc/passwd"),
            Err(BagError::UnsafePath(_))
        ));
        assert!(matches!(safe_join(root, ""), Err(BagError::UnsafePath(_))));
        assert!(matches!(safe_join(root, "./"), Err(BagError::UnsafePath(_))));
    }

    #[test]
    fn bag_key_collapses_dots_and_doubled_separators() {
        assert_eq!(bag_key("./a.txt").unwrap(), "a.txt");
        assert_eq!(bag_key("a//b.txt").unwrap(), "a/b.txt");
        assert_eq!(bag_key("a/./b/").unwrap(), "a/b");
        assert_eq!(
            safe_join(Path::new("/bag"), "x//./y.txt").unwrap(),
            Path::new("/bag/x/y.txt")
        );
        assert!(matches!(bag_key("a/../b"), Err(BagError::UnsafePath(_))));
    }

    #[test]
    fn rel_slash_uses_forward_slashes() {
        let root = Path::new("/bag");
        assert_eq!(
            rel_slash(&root.join("data").join("x.txt"), root).as_deref(),
            Some("data/x.txt")
        );
        assert_eq!(rel_slash(root, root), None);
        assert_eq!(rel_slash(Path::new("/other/x"), root), None);
    }
}
