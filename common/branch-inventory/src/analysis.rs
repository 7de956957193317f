use crate::diff::BranchDiff;
use crate::inv::{DuplicatePolicy, Inventory, InventoryError};
use crate::upstream::{FetchError, InventorySource};
use serde_json::Value;
use std::fmt;
use std::panic;
use std::thread::{self, ScopedJoinHandle};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    First,
    Second,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::First => write!(f, "first"),
            Side::Second => write!(f, "second"),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum AnalysisError {
    #[error("No branch name given for the {} branch", join_sides(.0))]
    EmptyBranchName(Vec<Side>),
    #[error("Couldn't fetch the {side} branch `{branch}`: {source}")]
    FetchFailure {
        side: Side,
        branch: String,
        source: FetchError,
    },
    #[error("Invalid package list for the {side} branch `{branch}`: {source}")]
    Inventory {
        side: Side,
        branch: String,
        source: InventoryError,
    },
}

fn join_sides(sides: &[Side]) -> String {
    sides
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" and ")
}

/// Fetches both branches from `source` and compares them.
///
/// Both fetches run concurrently and both are waited for before either
/// result is looked at. The comparison only runs when both fetches succeed
/// and both package lists are valid; there are no partial results.
///
/// # Errors
///
/// - `EmptyBranchName` when either name is empty. Nothing is fetched.
/// - `FetchFailure` for the first side whose fetch failed.
/// - `Inventory` when a package list holds a malformed record, or a
///   duplicate under `DuplicatePolicy::Reject`.
pub fn analyze<S>(
    source: &S,
    first: &str,
    second: &str,
    policy: DuplicatePolicy,
) -> Result<BranchDiff, AnalysisError>
where
    S: InventorySource + ?Sized,
{
    let (first, second) = (first.trim(), second.trim());

    let empty: Vec<Side> = [(Side::First, first), (Side::Second, second)]
        .into_iter()
        .filter(|(_, branch)| branch.is_empty())
        .map(|(side, _)| side)
        .collect();
    if !empty.is_empty() {
        return Err(AnalysisError::EmptyBranchName(empty));
    }

    let (first_result, second_result) = fetch_both(source, first, second);
    for (side, branch, result) in [
        (Side::First, first, &first_result),
        (Side::Second, second, &second_result),
    ] {
        if let Err(e) = result {
            tracing::warn!(%side, branch, error = %e, "Branch fetch failed");
        }
    }

    let first_records = first_result.map_err(|source| AnalysisError::FetchFailure {
        side: Side::First,
        branch: first.to_string(),
        source,
    })?;
    let second_records = second_result.map_err(|source| AnalysisError::FetchFailure {
        side: Side::Second,
        branch: second.to_string(),
        source,
    })?;

    let first_inventory = build_inventory(Side::First, first, first_records, policy)?;
    let second_inventory = build_inventory(Side::Second, second, second_records, policy)?;

    let diff = BranchDiff::compute(&first_inventory, &second_inventory);
    tracing::info!(
        first,
        second,
        first_packages = first_inventory.packages().len(),
        second_packages = second_inventory.packages().len(),
        only_in_first = diff.only_in_first.len(),
        only_in_second = diff.only_in_second.len(),
        greater_in_first = diff.greater_in_first.len(),
        "Compared branches"
    );
    Ok(diff)
}

type FetchResult = Result<Vec<Value>, FetchError>;

fn fetch_both<S>(source: &S, first: &str, second: &str) -> (FetchResult, FetchResult)
where
    S: InventorySource + ?Sized,
{
    thread::scope(|scope| {
        let first_handle = scope.spawn(|| source.fetch(first));
        let second_handle = scope.spawn(|| source.fetch(second));
        (join(first_handle), join(second_handle))
    })
}

fn join<T>(handle: ScopedJoinHandle<'_, T>) -> T {
    handle
        .join()
        .unwrap_or_else(|payload| panic::resume_unwind(payload))
}

fn build_inventory(
    side: Side,
    branch: &str,
    records: Vec<Value>,
    policy: DuplicatePolicy,
) -> Result<Inventory, AnalysisError> {
    tracing::debug!(%side, branch, records = records.len(), %policy, "Validating package list");
    Inventory::from_records(branch, records, policy).map_err(|source| AnalysisError::Inventory {
        side,
        branch: branch.to_string(),
        source,
    })
}
