use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about = "bagitdev CLI", long_about = None)]
pub struct Cli {
    /// Default log level; RUST_LOG overrides it
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a new bag under LOCATION and fill its payload
    Create {
        location: PathBuf,
        name: String,

        /// directory whose contents are copied into data/ (repeatable)
        #[arg(long = "src")]
        sources: Vec<PathBuf>,

        /// single file copied into data/ under its own name (repeatable)
        #[arg(long = "file")]
        files: Vec<PathBuf>,

        /// checksum algorithm (md5, sha1, sha224, sha256, sha384, sha512); repeatable
        #[arg(long = "algo", default_value = "sha256")]
        algorithms: Vec<String>,

        /// also write tagmanifest-<algo>.txt files
        #[arg(long)]
        tag_manifests: bool,

        /// follow symlinks while walking --src directories
        #[arg(long)]
        follow_links: bool,

        /// bag-info.txt field as NAME=VALUE (repeatable)
        #[arg(long = "info")]
        info: Vec<String>,
    },

    /// Open a bag and report missing files, orphans and checksum failures
    Check {
        bag: PathBuf,

        /// treat malformed tag files as errors instead of warnings
        #[arg(long)]
        strict: bool,

        /// additional tag file to parse and track (repeatable)
        #[arg(long = "tag-file")]
        tag_files: Vec<String>,

        /// print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// List manifest entries
    Ls {
        bag: PathBuf,

        /// only show manifests for this algorithm
        #[arg(long = "algo")]
        algorithm: Option<String>,
    },

    /// List files in the bag that nothing tracks
    Orphans {
        bag: PathBuf,

        /// additional tag file to parse and track (repeatable)
        #[arg(long = "tag-file")]
        tag_files: Vec<String>,
    },
}
