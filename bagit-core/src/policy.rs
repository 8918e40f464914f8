use serde::{Deserialize, Serialize};

use crate::hash::algorithm::Algorithm;

/// How `Bag::open` treats a named tag file that fails to parse.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strictness {
    /// Report it as a warning; the bag stays usable.
    #[default]
    Warn,
    /// Report it as an error.
    Strict,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BagOptions {
    /// One payload manifest per algorithm (and one tag manifest when enabled).
    pub algorithms: Vec<Algorithm>,
    pub tag_manifests: bool,
    /// Follow symlinks when adding a payload directory.
    pub follow_links: bool,
}

impl Default for BagOptions {
    fn default() -> Self {
        Self {
            algorithms: vec![Algorithm::Sha256],
            tag_manifests: false,
            follow_links: false,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OpenOptions {
    /// Tag files to parse and track. Anything else in the bag is left opaque.
    pub known_tag_files: Vec<String>,
    pub tag_file_strictness: Strictness,
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self {
            known_tag_files: vec!["bagit.txt".to_string(), "bag-info.txt".to_string()],
            tag_file_strictness: Strictness::Warn,
        }
    }
}
