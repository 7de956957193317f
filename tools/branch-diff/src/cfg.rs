use branch_inventory::inv::DuplicatePolicy;
use branch_inventory::upstream::{DEFAULT_TIMEOUT, DEFAULT_URL};
use clap::Parser;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Compare the binary packages of two distribution branches.
///
/// Prints a JSON object listing packages found only in FIRST, packages found
/// only in SECOND, and packages whose version-release is greater in FIRST.
#[derive(Parser, Debug)]
#[command(name = "branch-diff", version, about)]
pub(crate) struct Args {
    /// Branch whose unique and newer packages are reported, e.g. `sisyphus`
    pub(crate) first: Option<String>,

    /// Branch to compare against, e.g. `p10`
    pub(crate) second: Option<String>,

    /// Base URL of the branch package export API
    #[arg(long, env = "BRANCH_DIFF_URL")]
    pub(crate) url: Option<String>,

    /// Only list packages built for this architecture
    #[arg(long, env = "BRANCH_DIFF_ARCH")]
    pub(crate) arch: Option<String>,

    /// HTTP timeout in seconds
    #[arg(long, env = "BRANCH_DIFF_TIMEOUT", value_name = "SECS")]
    pub(crate) timeout: Option<u64>,

    /// Read `<DIR>/<branch>.json` exports instead of calling the API
    #[arg(long, value_name = "DIR")]
    pub(crate) from_dir: Option<PathBuf>,

    /// How to treat a package listed twice in one branch: `last-wins` or `reject`
    #[arg(long, value_name = "POLICY")]
    pub(crate) on_duplicate: Option<DuplicatePolicy>,

    /// TOML file with `url`, `arch`, `timeout_secs` and `on_duplicate` defaults
    #[arg(long, env = "BRANCH_DIFF_CONFIG", value_name = "PATH")]
    pub(crate) config: Option<PathBuf>,

    /// Write the result to a file instead of stdout
    #[arg(short, long, value_name = "PATH")]
    pub(crate) output: Option<PathBuf>,

    /// Pretty-print the JSON result
    #[arg(long)]
    pub(crate) pretty: bool,

    /// Log more detail to stderr (repeatable)
    #[arg(short, long, action = clap::ArgAction::Count, conflicts_with = "quiet")]
    pub(crate) verbose: u8,

    /// Only log errors
    #[arg(short, long)]
    pub(crate) quiet: bool,
}

/// Defaults read from a `--config` TOML file.
#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub(crate) struct FileConfig {
    pub(crate) url: Option<String>,
    pub(crate) arch: Option<String>,
    pub(crate) timeout_secs: Option<u64>,
    pub(crate) on_duplicate: Option<DuplicatePolicy>,
}

#[derive(thiserror::Error, Debug)]
pub(crate) enum ReadConfigError {
    #[error("Couldn't read config file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Couldn't parse config file {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Read a `FileConfig` from a TOML file.
///
/// # Errors
///
/// Will return an error when the file cannot be read, isn't valid TOML, or
/// holds keys other than the known ones.
pub(crate) fn read_config_file(path: &Path) -> Result<FileConfig, ReadConfigError> {
    let contents = fs::read_to_string(path).map_err(|source| ReadConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&contents).map_err(|source| ReadConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

#[derive(Debug, PartialEq)]
pub(crate) enum SourceConfig {
    Http {
        url: String,
        arch: Option<String>,
        timeout: Duration,
    },
    Dir(PathBuf),
}

/// Fully resolved settings for one run. Command line arguments and their
/// environment variables take precedence over the config file, which takes
/// precedence over built-in defaults.
#[derive(Debug, PartialEq)]
pub(crate) struct Config {
    pub(crate) first: String,
    pub(crate) second: String,
    pub(crate) source: SourceConfig,
    pub(crate) policy: DuplicatePolicy,
    pub(crate) output: Option<PathBuf>,
    pub(crate) pretty: bool,
}

impl Config {
    /// # Errors
    ///
    /// Will return an error when a `--config` file was given but can't be read.
    pub(crate) fn resolve(args: Args) -> Result<Self, ReadConfigError> {
        let file = match &args.config {
            Some(path) => read_config_file(path)?,
            None => FileConfig::default(),
        };
        Ok(Config::merge(args, file))
    }

    fn merge(args: Args, file: FileConfig) -> Self {
        let source = match args.from_dir {
            Some(dir) => SourceConfig::Dir(dir),
            None => SourceConfig::Http {
                url: args
                    .url
                    .or(file.url)
                    .unwrap_or_else(|| DEFAULT_URL.to_string()),
                arch: args.arch.or(file.arch),
                timeout: args
                    .timeout
                    .or(file.timeout_secs)
                    .map_or(DEFAULT_TIMEOUT, Duration::from_secs),
            },
        };

        Config {
            first: args.first.unwrap_or_default(),
            second: args.second.unwrap_or_default(),
            source,
            policy: args.on_duplicate.or(file.on_duplicate).unwrap_or_default(),
            output: args.output,
            pretty: args.pretty,
        }
    }
}
