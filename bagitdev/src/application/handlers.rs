use std::path::PathBuf;

use bagit_core::bag::BAG_INFO_TXT;
use bagit_core::error::{BagError, Result};
use bagit_core::{Algorithm, Bag, BagOptions, CheckReport, OpenOptions, Strictness, check};

fn parse_algorithms(names: &[String]) -> Result<Vec<Algorithm>> {
    names.iter().map(|n| Algorithm::lookup(n)).collect()
}

fn parse_info(pair: &str) -> Result<(String, String)> {
    let (k, v) = pair
        .split_once('=')
        .ok_or_else(|| BagError::InvalidArgument(format!("expected NAME=VALUE, got `{pair}`")))?;
    let k = k.trim();
    if k.is_empty() {
        return Err(BagError::InvalidArgument(format!("empty field name in `{pair}`")));
    }
    Ok((k.to_string(), v.trim().to_string()))
}

fn open_options(strict: bool, extra_tag_files: Vec<String>) -> OpenOptions {
    let mut opts = OpenOptions::default();
    for t in extra_tag_files {
        if !opts.known_tag_files.contains(&t) {
            opts.known_tag_files.push(t);
        }
    }
    if strict {
        opts.tag_file_strictness = Strictness::Strict;
    }
    opts
}

fn report_problems(what: &str, errs: &[BagError]) {
    for e in errs {
        eprintln!("{what}: {e}");
    }
}

fn fail_if(problems: usize, op: &'static str) -> Result<()> {
    if problems == 0 {
        Ok(())
    } else {
        Err(BagError::Incomplete { op, problems })
    }
}

#[allow(clippy::too_many_arguments)]
pub fn handle_create(
    location: PathBuf,
    name: String,
    sources: Vec<PathBuf>,
    files: Vec<PathBuf>,
    algorithms: Vec<String>,
    tag_manifests: bool,
    follow_links: bool,
    info: Vec<String>,
) -> Result<()> {
    let opts = BagOptions {
        algorithms: parse_algorithms(&algorithms)?,
        tag_manifests,
        follow_links,
    };
    let fields = info
        .iter()
        .map(|p| parse_info(p))
        .collect::<Result<Vec<_>>>()?;

    let mut bag = Bag::create(&location, &name, &opts)?;
    let mut problems = Vec::new();

    for f in &files {
        let dst = f
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| BagError::SourceNotFound(f.clone()))?;
        if let Err(e) = bag.add_file(f, &dst) {
            problems.push(e);
        }
    }
    for src in &sources {
        problems.extend(bag.add_dir(src));
    }

    if !fields.is_empty() {
        let bag_info = bag.add_tag_file(BAG_INFO_TXT)?;
        for (k, v) in fields {
            bag_info.set_field(&k, v);
        }
    }

    problems.extend(bag.save());
    report_problems("create", &problems);
    fail_if(problems.len(), "create")?;
    eprintln!("create: wrote {}", bag.path().display());
    Ok(())
}

fn print_report(report: &CheckReport) {
    println!("bag: {}", report.bag);
    for m in &report.manifests {
        println!("  {:<24} {:>8} entries", m.file_name, m.entries);
    }
    let sections = [
        ("error", &report.open_errors),
        ("warning", &report.open_warnings),
        ("missing", &report.missing),
        ("orphan", &report.orphans),
        ("invalid", &report.verify_failures),
    ];
    for (label, lines) in sections {
        for l in lines {
            println!("{label}: {l}");
        }
    }
}

pub fn handle_check(bag: PathBuf, strict: bool, tag_files: Vec<String>, json: bool) -> Result<()> {
    let report = check(&bag, &open_options(strict, tag_files))?;
    if json {
        let out = serde_json::to_string_pretty(&report).map_err(std::io::Error::other)?;
        println!("{out}");
    } else {
        print_report(&report);
    }
    fail_if(report.problems(), "check")?;
    eprintln!("check: OK");
    Ok(())
}

pub fn handle_ls(bag: PathBuf, algorithm: Option<String>) -> Result<()> {
    let only = algorithm.map(|a| Algorithm::lookup(&a)).transpose()?;
    let (bag, opened) = Bag::open(&bag, &OpenOptions::default())?;
    report_problems("ls", &opened.errors);

    for m in bag.manifests() {
        if only.is_some_and(|a| a != m.algorithm()) {
            continue;
        }
        for (path, digest) in m.entries() {
            println!("{}  {}  {}", m.file_name(), digest, path);
        }
    }
    Ok(())
}

pub fn handle_orphans(bag: PathBuf, tag_files: Vec<String>) -> Result<()> {
    let (bag, _) = Bag::open(&bag, &open_options(false, tag_files))?;
    for o in bag.orphans()? {
        println!("{o}");
    }
    Ok(())
}
