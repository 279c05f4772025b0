//! Name list comparison
//!
//! Lists such as `SubjectAlternativeNames` are sets: neither the order nor
//! repeated entries change what the resource is.

use std::collections::BTreeSet;

/// Check whether two name lists contain the same names
pub fn same_names<S: AsRef<str>>(left: &[S], right: &[S]) -> bool {
    let left: BTreeSet<&str> = left.iter().map(AsRef::as_ref).collect();
    let right: BTreeSet<&str> = right.iter().map(AsRef::as_ref).collect();
    left == right
}
