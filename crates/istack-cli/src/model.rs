//! Exhaustive model check from the command line.

use istack_model::{ModelOp, StackModel};
use serde::Serialize;
use stateright::{Checker, Expectation, Model};
use tracing::info;

use crate::error::CliError;

/// Fewest pushed values for which both `sometimes` properties are reachable:
/// the stack starts at `values - 1` slots, so one push is rejected, and the
/// shrink to one slot has at least two elements to cut.
pub const VALUES_MIN: usize = 3;

/// Outcome of one model property.
#[derive(Debug, Clone, Serialize)]
pub struct ModelPropertyReport {
    pub name: &'static str,
    pub expectation: &'static str,
    /// `always` holds when no counterexample exists; `sometimes` when an
    /// example was found.
    pub holds: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModelReport {
    pub threads: usize,
    pub values: usize,
    pub initial_capacity: u8,
    pub unique_states: usize,
    pub properties: Vec<ModelPropertyReport>,
    pub passed: bool,
}

/// Pushes `1..=values` spread over `threads - 1` pusher threads; the last
/// thread shrinks the stack to one slot and pops. With one thread, that
/// thread pushes everything and then shrinks.
///
/// `values` below [`VALUES_MIN`] is raised to it.
pub fn build_model(threads: usize, values: usize) -> StackModel {
    let values = values.max(VALUES_MIN);
    let threads = threads.max(1);
    let pushers = threads.saturating_sub(1).max(1);
    let mut scripts: Vec<Vec<ModelOp>> = vec![Vec::new(); threads];
    for v in 0..values {
        scripts[v % pushers].push(ModelOp::Push(v as i32 + 1));
    }
    let last = threads - 1;
    scripts[last].push(ModelOp::Resize(1));
    scripts[last].push(ModelOp::Pop);

    let initial_capacity = u8::try_from(values - 1).unwrap_or(u8::MAX);
    StackModel::new(initial_capacity, scripts)
}

/// Run breadth-first model checking and report every property.
pub fn run(threads: usize, values: usize) -> Result<ModelReport, CliError> {
    if values < VALUES_MIN {
        return Err(CliError::Usage(format!(
            "model --values must be at least {}",
            VALUES_MIN
        )));
    }
    let model = build_model(threads, values);
    let initial_capacity = model.initial_capacity;
    let properties = model.properties();

    info!(threads, values, "model checking");
    let checker = model.checker().threads(1).spawn_bfs().join();

    let properties: Vec<ModelPropertyReport> = properties
        .iter()
        .map(|p| {
            let found = checker.discovery(p.name).is_some();
            let (expectation, holds) = match p.expectation {
                Expectation::Always => ("always", !found),
                Expectation::Eventually => ("eventually", !found),
                Expectation::Sometimes => ("sometimes", found),
            };
            ModelPropertyReport {
                name: p.name,
                expectation,
                holds,
            }
        })
        .collect();

    Ok(ModelReport {
        threads,
        values,
        initial_capacity,
        unique_states: checker.unique_state_count(),
        passed: properties.iter().all(|p| p.holds),
        properties,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_model_shapes() {
        let model = build_model(3, 3);
        assert_eq!(model.scripts.len(), 3);
        assert_eq!(model.scripts[0], vec![ModelOp::Push(1), ModelOp::Push(3)]);
        assert_eq!(model.scripts[1], vec![ModelOp::Push(2)]);
        assert_eq!(model.scripts[2], vec![ModelOp::Resize(1), ModelOp::Pop]);
        assert_eq!(model.initial_capacity, 2);

        let single = build_model(1, 3);
        assert_eq!(
            single.scripts[0],
            vec![
                ModelOp::Push(1),
                ModelOp::Push(2),
                ModelOp::Push(3),
                ModelOp::Resize(1),
                ModelOp::Pop
            ]
        );
    }

    #[test]
    fn test_build_model_raises_small_value_counts() {
        let model = build_model(2, 1);
        assert_eq!(model.initial_capacity, 2);
        assert_eq!(
            model.scripts[0],
            vec![ModelOp::Push(1), ModelOp::Push(2), ModelOp::Push(3)]
        );
    }

    #[test]
    fn test_model_passes() {
        let report = run(2, 3).unwrap();
        assert!(report.passed, "{:?}", report);
        assert!(report.unique_states > 1);
        assert_eq!(report.properties.len(), 7);
    }

    #[test]
    fn test_every_accepted_shape_passes() {
        for threads in 1..=3 {
            for values in VALUES_MIN..=4 {
                let report = run(threads, values).unwrap();
                assert!(report.passed, "threads={} values={}: {:?}", threads, values, report);
                assert!(report.properties.iter().all(|p| p.holds));
            }
        }
    }

    #[test]
    fn test_too_few_values_is_usage_error() {
        for values in 0..VALUES_MIN {
            let err = run(2, values).unwrap_err();
            assert!(matches!(err, CliError::Usage(_)), "{:?}", err);
            assert_eq!(err.errno(), istack::error::errno::EINVAL);
        }
    }
}
