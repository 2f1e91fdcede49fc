//! Row-count contracts.
//!
//! A [`CardinalityPolicy`] states how many rows a statement must select or
//! affect; [`ensure_cardinality`] turns a violation into a
//! [`CardinalityError`].

use std::fmt;

/// Constraint on the number of selected or affected rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardinalityPolicy {
    Exactly(u64),
    AtMost(u64),
    AtLeast(u64),
    Unbounded,
}

/// Which bound a [`CardinalityError`] broke.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardinalityKind {
    Exact,
    AtMost,
    AtLeast,
}

impl CardinalityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            CardinalityKind::Exact => "exact",
            CardinalityKind::AtMost => "at-most",
            CardinalityKind::AtLeast => "at-least",
        }
    }
}

impl fmt::Display for CardinalityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unexpected number of rows selected or affected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CardinalityError {
    pub expected: u64,
    pub actual: u64,
    pub kind: CardinalityKind,
}

impl fmt::Display for CardinalityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Unexpected row count: expected {} {}, got {}",
            self.kind, self.expected, self.actual
        )
    }
}

impl std::error::Error for CardinalityError {}

impl CardinalityPolicy {
    /// Check an observed row count against this policy.
    ///
    /// # Errors
    ///
    /// Returns `CardinalityError` when `observed` falls outside the policy.
    pub fn check(self, observed: u64) -> Result<(), CardinalityError> {
        let (ok, expected, kind) = match self {
            CardinalityPolicy::Unbounded => return Ok(()),
            CardinalityPolicy::Exactly(n) => (observed == n, n, CardinalityKind::Exact),
            CardinalityPolicy::AtMost(n) => (observed <= n, n, CardinalityKind::AtMost),
            CardinalityPolicy::AtLeast(n) => (observed >= n, n, CardinalityKind::AtLeast),
        };
        if ok {
            Ok(())
        } else {
            Err(CardinalityError {
                expected,
                actual: observed,
                kind,
            })
        }
    }
}

/// Free-function form of [`CardinalityPolicy::check`].
///
/// # Errors
///
/// Returns `CardinalityError` when `observed` falls outside `policy`.
pub fn ensure_cardinality(policy: CardinalityPolicy, observed: u64) -> Result<(), CardinalityError> {
    policy.check(observed)
}
