pub mod handlers;

use crate::presentation::cli::{Cli, Commands};
use bagit_core::error::Result;

pub fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Create {
            location,
            name,
            sources,
            files,
            algorithms,
            tag_manifests,
            follow_links,
            info,
        } => handlers::handle_create(
            location,
            name,
            sources,
            files,
            algorithms,
            tag_manifests,
            follow_links,
            info,
        ),
        Commands::Check {
            bag,
            strict,
            tag_files,
            json,
        } => handlers::handle_check(bag, strict, tag_files, json),
        Commands::Ls { bag, algorithm } => handlers::handle_ls(bag, algorithm),
        Commands::Orphans { bag, tag_files } => handlers::handle_orphans(bag, tag_files),
    }
}
