// cargo-llvm-cov sets the coverage_nightly attribute when instrumenting our code. In that case,
// we enable https://doc.rust-lang.org/beta/unstable-book/language-features/coverage-attribute.html
// to be able selectively opt out of coverage for functions/lines/modules.
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

mod cfg;
mod log;

use branch_inventory::analysis::{analyze, AnalysisError};
use branch_inventory::diff::BranchDiff;
use branch_inventory::upstream::{DirSource, HttpSource, InventorySource};
use cfg::{Args, Config, SourceConfig};
use clap::Parser;
use std::fs;
use std::io::{self, Write};
use std::path::Path;
use std::process;

/// Compares two branches and prints the result as JSON.
fn main() {
    let args = Args::parse();
    log::init(args.verbose, args.quiet);

    let config = Config::resolve(args).unwrap_or_else(|e| {
        tracing::error!("{e}");
        process::exit(1);
    });

    let source: Box<dyn InventorySource> = match &config.source {
        SourceConfig::Http { url, arch, timeout } => {
            tracing::debug!(%url, ?arch, ?timeout, "Using inventory service");
            Box::new(HttpSource::new(url.clone(), *timeout).with_arch(arch.clone()))
        }
        SourceConfig::Dir(dir) => {
            tracing::debug!(dir = %dir.display(), "Using saved exports");
            Box::new(DirSource::new(dir))
        }
    };

    let diff = analyze(
        source.as_ref(),
        &config.first,
        &config.second,
        config.policy,
    )
    .unwrap_or_else(|e| {
        tracing::error!("{e}");
        process::exit(exit_code(&e));
    });

    let json = render(&diff, config.pretty).unwrap_or_else(|e| {
        tracing::error!("Error serializing result as json: {e}");
        process::exit(5);
    });

    write_output(config.output.as_deref(), &json).unwrap_or_else(|e| {
        tracing::error!("Error writing result: {e}");
        process::exit(5);
    });
}

fn exit_code(error: &AnalysisError) -> i32 {
    match error {
        AnalysisError::EmptyBranchName(_) => 2,
        AnalysisError::FetchFailure { .. } => 3,
        AnalysisError::Inventory { .. } => 4,
    }
}

fn render(diff: &BranchDiff, pretty: bool) -> serde_json::Result<String> {
    if pretty {
        serde_json::to_string_pretty(diff)
    } else {
        serde_json::to_string(diff)
    }
}

fn write_output(path: Option<&Path>, json: &str) -> io::Result<()> {
    match path {
        Some(path) => fs::write(path, format!("{json}\n")),
        None => writeln!(io::stdout().lock(), "{json}"),
    }
}
