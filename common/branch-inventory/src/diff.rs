use crate::inv::{Inventory, Package, PackageKey};
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::collections::{HashMap, HashSet};

/// The comparison of two branch inventories.
#[derive(Debug, Clone, PartialEq)]
pub struct BranchDiff {
    pub first_branch: String,
    pub second_branch: String,
    pub only_in_first: Vec<Package>,
    pub only_in_second: Vec<Package>,
    pub greater_in_first: Vec<Package>,
}

impl BranchDiff {
    #[must_use]
    pub fn compute(first: &Inventory, second: &Inventory) -> Self {
        BranchDiff {
            first_branch: first.branch().to_string(),
            second_branch: second.branch().to_string(),
            only_in_first: cloned(only_in_one(first.packages(), second.packages())),
            only_in_second: cloned(only_in_one(second.packages(), first.packages())),
            greater_in_first: cloned(greater_version_in_first(
                first.packages(),
                second.packages(),
            )),
        }
    }
}

/// Serializes as the three result lists keyed by branch name, in a fixed
/// order: `only in <first>`, `only in <second>`,
/// `version-release greater in <first>`.
impl Serialize for BranchDiff {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(3))?;
        map.serialize_entry(&format!("only in {}", self.first_branch), &self.only_in_first)?;
        map.serialize_entry(
            &format!("only in {}", self.second_branch),
            &self.only_in_second,
        )?;
        map.serialize_entry(
            &format!("version-release greater in {}", self.first_branch),
            &self.greater_in_first,
        )?;
        map.end()
    }
}

fn cloned(packages: Vec<&Package>) -> Vec<Package> {
    packages.into_iter().cloned().collect()
}

/// Keeps the last package seen for each identity key, in input order.
fn last_wins(packages: &[Package]) -> Vec<(PackageKey, &Package)> {
    let positions: HashMap<PackageKey, usize> = packages
        .iter()
        .enumerate()
        .map(|(position, package)| (package.key(), position))
        .collect();

    packages
        .iter()
        .enumerate()
        .filter_map(|(position, package)| {
            let key = package.key();
            (positions.get(&key) == Some(&position)).then_some((key, package))
        })
        .collect()
}

/// Packages from `source` whose identity key doesn't appear in `other`.
///
/// Duplicate keys in `source` resolve to the last record. The result keeps
/// `source` order.
#[must_use]
pub fn only_in_one<'a>(source: &'a [Package], other: &[Package]) -> Vec<&'a Package> {
    let other_keys: HashSet<PackageKey> = other.iter().map(Package::key).collect();

    last_wins(source)
        .into_iter()
        .filter(|(key, _)| !other_keys.contains(key))
        .map(|(_, package)| package)
        .collect()
}

/// Packages from `first` whose version-release is strictly greater than a
/// package with the same identity key in `second`. Packages without a match
/// are skipped.
///
/// Every record of `second` is checked, duplicates included; `first` is
/// looked up last-write-wins. Each first-branch package is reported at most
/// once, at the position of its first qualifying match in `second`.
#[must_use]
pub fn greater_version_in_first<'a>(first: &'a [Package], second: &[Package]) -> Vec<&'a Package> {
    let first_by_key: HashMap<PackageKey, &Package> = last_wins(first).into_iter().collect();
    let mut reported: HashSet<PackageKey> = HashSet::new();

    second
        .iter()
        .filter_map(|theirs| {
            let key = theirs.key();
            let ours = *first_by_key.get(&key)?;
            (ours.version_release() > theirs.version_release() && reported.insert(key))
                .then_some(ours)
        })
        .collect()
}
