use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{BagError, Result};
use crate::util::sanitize::safe_join;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TagField {
    pub name: String,
    pub value: String,
}

impl TagField {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// A `Name: value` tag file such as `bagit.txt` or `bag-info.txt`.
///
/// Only the bag-relative name is stored; the bag root is supplied when the
/// file is read or written.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TagFile {
    name: String,
    fields: Vec<TagField>,
}

impl TagFile {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self, bag_root: &Path) -> Result<PathBuf> {
        safe_join(bag_root, &self.name)
    }

    pub fn fields(&self) -> &[TagField] {
        &self.fields
    }

    pub fn add_field(&mut self, field: TagField) {
        self.fields.push(field);
    }

    /// Replace the first field called `name`, or append it.
    pub fn set_field(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self.fields.iter_mut().find(|f| f.name == name) {
            Some(f) => f.value = value,
            None => self.fields.push(TagField::new(name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|f| f.name == name)
            .map(|f| f.value.as_str())
    }

    pub fn parse(name: impl Into<String>, text: &str) -> Result<Self> {
        let mut tf = Self::new(name);
        for (idx, raw) in text.lines().enumerate() {
            let line = raw.trim_end_matches('\r');
            if line.trim().is_empty() {
                continue;
            }
            // folded continuation of the previous value
            if line.starts_with([' ', '\t']) {
                match tf.fields.last_mut() {
                    Some(prev) => {
                        prev.value.push(' ');
                        prev.value.push_str(line.trim());
                        continue;
                    }
                    None => {
                        return Err(BagError::MalformedTagFile {
                            name: tf.name.clone(),
                            line: idx + 1,
                            reason: "continuation line before any field".to_string(),
                        });
                    }
                }
            }
            let Some((k, v)) = line.split_once(':') else {
                return Err(BagError::MalformedTagFile {
                    name: tf.name.clone(),
                    line: idx + 1,
                    reason: "expected `Name: value`".to_string(),
                });
            };
            let k = k.trim();
            if k.is_empty() {
                return Err(BagError::MalformedTagFile {
                    name: tf.name.clone(),
                    line: idx + 1,
                    reason: "empty field name".to_string(),
                });
            }
            tf.fields.push(TagField::new(k, v.trim()));
        }
        Ok(tf)
    }

    pub fn to_text(&self) -> String {
        let mut out = String::new();
        for f in &self.fields {
            out.push_str(&f.name);
            out.push_str(": ");
            out.push_str(&f.value);
            out.push('\n');
        }
        out
    }

    pub fn load(bag_root: &Path, name: &str) -> Result<Self> {
        let path = safe_join(bag_root, name)?;
        let text = fs::read_to_string(&path).map_err(BagError::io_at(&path))?;
        Self::parse(name, &text)
    }

    /// Write the current fields under `bag_root`, creating parent directories.
    pub fn create(&self, bag_root: &Path) -> Result<()> {
        let path = self.path(bag_root)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(BagError::io_at(parent))?;
        }
        fs::write(&path, self.to_text()).map_err(BagError::io_at(&path))
    }
}
