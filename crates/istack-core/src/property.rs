//! Property results and the checker trait.

use std::fmt;

use crate::counterexample::Counterexample;

/// Outcome of checking a single named invariant.
#[derive(Debug, Clone)]
pub struct PropertyResult {
    /// Invariant name, e.g. `CountWithinCapacity`
    pub name: &'static str,
    /// Whether the invariant held
    pub holds: bool,
    /// Explanation when the invariant was violated
    pub violation: Option<String>,
    /// Failure path, when one could be reconstructed
    pub counterexample: Option<Counterexample>,
}

impl PropertyResult {
    /// A passing result.
    #[must_use]
    pub fn pass(name: &'static str) -> Self {
        Self {
            name,
            holds: true,
            violation: None,
            counterexample: None,
        }
    }

    /// A failing result with an explanation.
    #[must_use]
    pub fn fail(
        name: &'static str,
        violation: String,
        counterexample: Option<Counterexample>,
    ) -> Self {
        debug_assert!(!violation.is_empty(), "Violation must be described");
        Self {
            name,
            holds: false,
            violation: Some(violation),
            counterexample,
        }
    }
}

impl fmt::Display for PropertyResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.holds {
            write!(f, "[PASS] {}", self.name)
        } else {
            write!(
                f,
                "[FAIL] {}: {}",
                self.name,
                self.violation.as_deref().unwrap_or("violated")
            )?;
            if let Some(ref ce) = self.counterexample {
                write!(f, "\n{}", ce.render_diagram())?;
            }
            Ok(())
        }
    }
}

/// Checks a set of invariants against some observed state.
pub trait PropertyChecker {
    /// Check every invariant and return one result per invariant.
    fn check_all(&self) -> Vec<PropertyResult>;

    /// True if every invariant holds.
    fn all_hold(&self) -> bool {
        self.check_all().iter().all(|r| r.holds)
    }

    /// Only the failing results.
    fn violations(&self) -> Vec<PropertyResult> {
        self.check_all().into_iter().filter(|r| !r.holds).collect()
    }
}
