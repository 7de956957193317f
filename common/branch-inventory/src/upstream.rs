use serde::Deserialize;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_URL: &str = "https://rdb.altlinux.org/api/export/branch_binary_packages";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Somewhere branch package lists can be fetched from.
///
/// Implementations return the raw package records; validating them is left
/// to `Inventory::from_records` so that no record is dropped on the way.
pub trait InventorySource: Sync {
    /// # Errors
    ///
    /// Any failure to obtain the branch's package list. Failures are opaque
    /// to the caller and aren't retried.
    fn fetch(&self, branch: &str) -> Result<Vec<Value>, FetchError>;
}

/// The response envelope; other fields like `request_args` and `length` are
/// ignored.
#[derive(Debug, Deserialize)]
struct BranchPackagesResponse {
    packages: Vec<Value>,
}

#[derive(thiserror::Error, Debug)]
pub enum FetchError {
    #[error("Inventory service responded with HTTP {status} for {url}")]
    Status { url: String, status: u16 },
    // Boxed to prevent `large_enum_variant` errors since `ureq::Error` is massive.
    #[error("Couldn't reach inventory service: {0}")]
    Transport(Box<ureq::Error>),
    #[error("Couldn't parse inventory service response: {0}")]
    ParseJsonResponse(std::io::Error),
    #[error("Couldn't read inventory file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Couldn't parse inventory file {}: {source}", .path.display())]
    ParseJsonFile {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("Branch name can't be used in a URL or file name: {0}")]
    UnsafeBranchName(String),
}

/// Branch names become a URL path segment or a file name, so they're limited
/// to non-empty runs of ASCII letters, digits, `.`, `_`, `+` and `-` that
/// don't start with `.`.
fn check_branch_name(branch: &str) -> Result<(), FetchError> {
    let allowed = |c: char| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '+' | '-');
    if branch.is_empty() || branch.starts_with('.') || !branch.chars().all(allowed) {
        return Err(FetchError::UnsafeBranchName(branch.to_string()));
    }
    Ok(())
}

/// Fetches `GET {base_url}/{branch}` from an inventory service such as the
/// ALT Linux `rdb` export API.
#[derive(Clone)]
pub struct HttpSource {
    agent: ureq::Agent,
    base_url: String,
    arch: Option<String>,
}

impl HttpSource {
    #[must_use]
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        HttpSource {
            agent: ureq::AgentBuilder::new().timeout(timeout).build(),
            base_url: base_url.into(),
            arch: None,
        }
    }

    /// Restricts the server-side listing to a single architecture.
    #[must_use]
    pub fn with_arch(mut self, arch: Option<String>) -> Self {
        self.arch = arch;
        self
    }

    fn branch_url(&self, branch: &str) -> String {
        format!("{}/{branch}", self.base_url.trim_end_matches('/'))
    }
}

impl Default for HttpSource {
    fn default() -> Self {
        HttpSource::new(DEFAULT_URL, DEFAULT_TIMEOUT)
    }
}

impl InventorySource for HttpSource {
    fn fetch(&self, branch: &str) -> Result<Vec<Value>, FetchError> {
        check_branch_name(branch)?;
        let url = self.branch_url(branch);
        let mut request = self.agent.get(&url);
        if let Some(arch) = &self.arch {
            request = request.query("arch", arch);
        }
        tracing::debug!(%url, arch = ?self.arch, "Fetching branch packages");

        match request.call() {
            // ureq passes any 2xx or unfollowed 3xx through as success.
            Ok(response) if response.status() != 200 => Err(FetchError::Status {
                url,
                status: response.status(),
            }),
            Ok(response) => response
                .into_json::<BranchPackagesResponse>()
                .map(|body| body.packages)
                .map_err(FetchError::ParseJsonResponse),
            Err(ureq::Error::Status(status, _)) => Err(FetchError::Status { url, status }),
            Err(e) => Err(FetchError::Transport(Box::new(e))),
        }
    }
}

/// Reads `<dir>/<branch>.json` files holding the same envelope the inventory
/// service returns. Useful for offline comparisons of saved exports.
#[derive(Debug, Clone)]
pub struct DirSource {
    dir: PathBuf,
}

impl DirSource {
    #[must_use]
    pub fn new(dir: impl AsRef<Path>) -> Self {
        DirSource {
            dir: dir.as_ref().to_path_buf(),
        }
    }
}

impl InventorySource for DirSource {
    fn fetch(&self, branch: &str) -> Result<Vec<Value>, FetchError> {
        check_branch_name(branch)?;
        let path = self.dir.join(format!("{branch}.json"));
        tracing::debug!(path = %path.display(), "Reading branch packages");

        let contents = fs::read_to_string(&path).map_err(|source| FetchError::Io {
            path: path.clone(),
            source,
        })?;
        serde_json::from_str::<BranchPackagesResponse>(&contents)
            .map(|body| body.packages)
            .map_err(|source| FetchError::ParseJsonFile { path, source })
    }
}
