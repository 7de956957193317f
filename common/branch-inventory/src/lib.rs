//! Compares the binary package lists of two distribution branches.
//!
//! [`analysis::analyze`] fetches both branches through an
//! [`upstream::InventorySource`] and reports packages found in only one of
//! them, plus packages whose version-release is greater in the first branch
//! according to RPM ordering ([`vrs`]).

pub mod analysis;
pub mod diff;
pub mod inv;
pub mod upstream;
pub mod vrs;
