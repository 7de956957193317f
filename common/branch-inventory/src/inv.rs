use crate::vrs::VersionRelease;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt::{self, Display};
use std::str::FromStr;

/// Identity used to match the same package across branches: the trimmed
/// concatenation of its name and arch.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PackageKey(String);

impl PackageKey {
    #[must_use]
    pub fn new(name: &str, arch: &str) -> Self {
        PackageKey(format!("{name}{arch}").trim().to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for PackageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A binary package record from a branch inventory.
///
/// The four fields needed for matching and ordering are extracted up front;
/// the complete original record is kept and is what gets serialized.
#[derive(Debug, Clone, PartialEq)]
pub struct Package {
    name: String,
    arch: String,
    version: String,
    release: String,
    record: Map<String, Value>,
}

impl Package {
    /// Builds a `Package` from a JSON object.
    ///
    /// # Errors
    ///
    /// Returns a `PackageRecordError` when the record lacks `name`, `arch`,
    /// `version` or `release`, or when one of them is not a string.
    pub fn from_record(record: Map<String, Value>) -> Result<Self, PackageRecordError> {
        Ok(Package {
            name: required_field(&record, "name")?,
            arch: required_field(&record, "arch")?,
            version: required_field(&record, "version")?,
            release: required_field(&record, "release")?,
            record,
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn arch(&self) -> &str {
        &self.arch
    }

    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    #[must_use]
    pub fn release(&self) -> &str {
        &self.release
    }

    /// The full original record, including fields this crate doesn't interpret.
    #[must_use]
    pub fn record(&self) -> &Map<String, Value> {
        &self.record
    }

    #[must_use]
    pub fn key(&self) -> PackageKey {
        PackageKey::new(&self.name, &self.arch)
    }

    #[must_use]
    pub fn version_release(&self) -> VersionRelease {
        VersionRelease::from_parts(&self.version, &self.release)
    }
}

fn required_field(
    record: &Map<String, Value>,
    field: &'static str,
) -> Result<String, PackageRecordError> {
    match record.get(field) {
        Some(Value::String(value)) => Ok(value.clone()),
        Some(_) => Err(PackageRecordError::NotAString(field)),
        None => Err(PackageRecordError::Missing(field)),
    }
}

impl TryFrom<Value> for Package {
    type Error = PackageRecordError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(record) => Package::from_record(record),
            _ => Err(PackageRecordError::NotAnObject),
        }
    }
}

impl Serialize for Package {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.record.serialize(serializer)
    }
}

impl Display for Package {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}-{} ({})",
            self.name, self.version, self.release, self.arch
        )
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PackageRecordError {
    #[error("record is not a JSON object")]
    NotAnObject,
    #[error("missing required field `{0}`")]
    Missing(&'static str),
    #[error("field `{0}` is not a string")]
    NotAString(&'static str),
}

/// What to do when one branch lists the same identity key more than once.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DuplicatePolicy {
    /// Later records replace earlier ones.
    #[default]
    LastWins,
    /// Building the inventory fails.
    Reject,
}

impl Display for DuplicatePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DuplicatePolicy::LastWins => write!(f, "last-wins"),
            DuplicatePolicy::Reject => write!(f, "reject"),
        }
    }
}

#[derive(thiserror::Error, Debug)]
#[error("Unknown duplicate policy: {0} (expected `last-wins` or `reject`)")]
pub struct UnknownDuplicatePolicyError(String);

impl FromStr for DuplicatePolicy {
    type Err = UnknownDuplicatePolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "last-wins" => Ok(DuplicatePolicy::LastWins),
            "reject" => Ok(DuplicatePolicy::Reject),
            _ => Err(UnknownDuplicatePolicyError(s.to_string())),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum InventoryError {
    #[error("Malformed package record #{index}{}: {problem}", .name.as_ref().map(|n| format!(" ({n})")).unwrap_or_default())]
    MalformedPackage {
        index: usize,
        name: Option<String>,
        problem: PackageRecordError,
    },
    #[error("Duplicate package `{key}` at records #{first_index} and #{second_index}")]
    DuplicatePackage {
        key: PackageKey,
        first_index: usize,
        second_index: usize,
    },
}

/// The validated package list of a single branch.
#[derive(Debug, Clone)]
pub struct Inventory {
    branch: String,
    packages: Vec<Package>,
}

impl Inventory {
    /// Validates raw package records into an `Inventory`, keeping their order.
    ///
    /// # Errors
    ///
    /// Fails on the first record that isn't a valid package, and, under
    /// `DuplicatePolicy::Reject`, on the first repeated identity key.
    pub fn from_records(
        branch: impl Into<String>,
        records: Vec<Value>,
        policy: DuplicatePolicy,
    ) -> Result<Self, InventoryError> {
        let packages = records
            .into_iter()
            .enumerate()
            .map(|(index, record)| {
                let name = record
                    .get("name")
                    .and_then(Value::as_str)
                    .map(ToString::to_string);
                Package::try_from(record).map_err(|problem| InventoryError::MalformedPackage {
                    index,
                    name,
                    problem,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        if policy == DuplicatePolicy::Reject {
            let mut seen: HashMap<PackageKey, usize> = HashMap::new();
            for (index, package) in packages.iter().enumerate() {
                if let Some(first_index) = seen.insert(package.key(), index) {
                    return Err(InventoryError::DuplicatePackage {
                        key: package.key(),
                        first_index,
                        second_index: index,
                    });
                }
            }
        }

        Ok(Inventory {
            branch: branch.into(),
            packages,
        })
    }

    #[must_use]
    pub fn branch(&self) -> &str {
        &self.branch
    }

    #[must_use]
    pub fn packages(&self) -> &[Package] {
        &self.packages
    }
}
