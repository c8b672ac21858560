//! Model checking and implementation verification, end to end.

use istack::BoundedStack;
use istack_model::{verify_implementation, ModelOp, StackModel, VerifierConfig};
use stateright::{Checker, Model};

#[test]
fn test_stateright_three_threads_with_shrink() {
    let model = StackModel::new(
        2,
        vec![
            vec![ModelOp::Push(1), ModelOp::Push(2)],
            vec![ModelOp::Push(3), ModelOp::Pop],
            vec![ModelOp::Resize(1)],
        ],
    );
    let checker = model.checker().threads(2).spawn_bfs().join();
    checker.assert_properties();
}

#[test]
fn test_unguarded_model_is_refuted() {
    let checker = StackModel::mixed()
        .unguarded()
        .checker()
        .threads(1)
        .spawn_bfs()
        .join();
    assert!(checker.discovery("mutual exclusion").is_some());
}

#[test]
fn test_bounded_stack_thorough() {
    let result = verify_implementation::<BoundedStack>(&VerifierConfig::thorough());
    assert!(result.passed, "{:?}", result.error);
    assert!(result.operations_count > result.sequences_count);
}
