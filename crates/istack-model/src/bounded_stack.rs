//! Stateright model of the lock-guarded bounded stack.
//!
//! Each simulated thread runs a short script of operations. An operation
//! first acquires the guard, then runs in the critical section:
//! push and pop in one step, resize in three (allocate, copy, swap). The
//! last step releases the guard.
//!
//! `StackModel::unguarded` models the same protocol with the acquire check
//! removed, so the checker can demonstrate what the guard prevents.
//!
//! # Properties
//!
//! - `mutual exclusion`: at most one thread in a critical section
//! - `count within capacity`: `contents.len() <= capacity`
//! - `capacity positive`
//! - `no lost elements`: pushed = contents + popped + truncated (multisets)
//! - `resize atomicity`: no push/pop ran while a resize was half done
//! - `full reachable` / `truncation reachable` (sometimes)

use stateright::{Model, Property};

/// Thread index.
pub type ThreadId = usize;

/// One scripted operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelOp {
    Push(i32),
    Pop,
    Resize(u8),
}

/// Where a thread is in its current operation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Not in a critical section
    Idle,
    /// Guard acquired, operation not yet started
    Holding,
    /// New buffer allocated
    ResizeAllocated { capacity: u8 },
    /// Surviving prefix copied into the new buffer
    ResizeCopied { capacity: u8, buffer: Vec<i32> },
}

/// Per-thread state.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ThreadState {
    /// Index of the next operation in the thread's script
    pub pc: usize,
    pub phase: Phase,
}

impl ThreadState {
    fn in_critical_section(&self) -> bool {
        self.phase != Phase::Idle
    }

    fn mid_resize(&self) -> bool {
        matches!(
            self.phase,
            Phase::ResizeAllocated { .. } | Phase::ResizeCopied { .. }
        )
    }
}

/// Global state.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StackState {
    /// Live elements, bottom to top
    pub contents: Vec<i32>,
    pub capacity: u8,
    pub lock_holder: Option<ThreadId>,
    pub threads: Vec<ThreadState>,
    pub pushed: Vec<i32>,
    pub popped: Vec<i32>,
    pub truncated: Vec<i32>,
    /// Pushes rejected because the stack was full
    pub full_rejections: u8,
    /// Push or pop steps taken while another thread was mid-resize
    pub torn_observations: u8,
}

impl StackState {
    fn new(capacity: u8, threads_count: usize) -> Self {
        Self {
            contents: Vec::new(),
            capacity,
            lock_holder: None,
            threads: vec![
                ThreadState {
                    pc: 0,
                    phase: Phase::Idle,
                };
                threads_count
            ],
            pushed: Vec::new(),
            popped: Vec::new(),
            truncated: Vec::new(),
            full_rejections: 0,
            torn_observations: 0,
        }
    }

    /// Threads currently inside a critical section.
    pub fn critical_count(&self) -> usize {
        self.threads.iter().filter(|t| t.in_critical_section()).count()
    }

    /// Every pushed element is in the stack, popped, or truncated.
    pub fn no_lost_elements(&self) -> bool {
        let mut pushed = self.pushed.clone();
        let mut accounted: Vec<i32> = self
            .contents
            .iter()
            .chain(&self.popped)
            .chain(&self.truncated)
            .copied()
            .collect();
        pushed.sort_unstable();
        accounted.sort_unstable();
        pushed == accounted
    }

    fn other_thread_mid_resize(&self, thread: ThreadId) -> bool {
        self.threads
            .iter()
            .enumerate()
            .any(|(i, t)| i != thread && t.mid_resize())
    }

    fn finish(&mut self, thread: ThreadId) {
        let t = &mut self.threads[thread];
        t.pc += 1;
        t.phase = Phase::Idle;
        if self.lock_holder == Some(thread) {
            self.lock_holder = None;
        }
    }
}

/// Actions a thread can take.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StackAction {
    Acquire(ThreadId),
    Push(ThreadId, i32),
    Pop(ThreadId),
    ResizeAllocate(ThreadId, u8),
    ResizeCopy(ThreadId),
    ResizeSwap(ThreadId),
}

/// The model: scripts per thread, initial capacity, and whether the guard
/// is enforced.
#[derive(Debug, Clone)]
pub struct StackModel {
    pub scripts: Vec<Vec<ModelOp>>,
    pub initial_capacity: u8,
    pub guarded: bool,
}

impl StackModel {
    /// Guarded model. Capacities in scripts must be positive.
    pub fn new(initial_capacity: u8, scripts: Vec<Vec<ModelOp>>) -> Self {
        debug_assert!(initial_capacity > 0, "Capacity must be positive");
        debug_assert!(
            scripts
                .iter()
                .flatten()
                .all(|op| !matches!(op, ModelOp::Resize(0))),
            "Zero-capacity resize is rejected before the guard is taken"
        );
        Self {
            scripts,
            initial_capacity,
            guarded: true,
        }
    }

    /// Same protocol with the guard ignored.
    #[must_use]
    pub fn unguarded(mut self) -> Self {
        self.guarded = false;
        self
    }

    /// A pusher racing a shrinking resizer that then pops.
    ///
    /// Reaches both the full state and a truncating shrink.
    pub fn push_vs_shrink() -> Self {
        Self::new(
            2,
            vec![
                vec![ModelOp::Push(1), ModelOp::Push(2), ModelOp::Push(3)],
                vec![ModelOp::Resize(1), ModelOp::Pop],
            ],
        )
    }

    /// Two pushers, one popper and a growing resize.
    pub fn mixed() -> Self {
        Self::new(
            1,
            vec![
                vec![ModelOp::Push(1), ModelOp::Push(2)],
                vec![ModelOp::Push(3), ModelOp::Resize(3)],
                vec![ModelOp::Pop, ModelOp::Pop],
            ],
        )
    }

    fn current_op(&self, state: &StackState, thread: ThreadId) -> Option<ModelOp> {
        self.scripts[thread].get(state.threads[thread].pc).copied()
    }
}

impl Model for StackModel {
    type State = StackState;
    type Action = StackAction;

    fn init_states(&self) -> Vec<Self::State> {
        vec![StackState::new(self.initial_capacity, self.scripts.len())]
    }

    fn actions(&self, state: &Self::State, actions: &mut Vec<Self::Action>) {
        for (thread, t) in state.threads.iter().enumerate() {
            let Some(op) = self.current_op(state, thread) else {
                continue;
            };
            match (&t.phase, op) {
                (Phase::Idle, _) => {
                    if !self.guarded || state.lock_holder.is_none() {
                        actions.push(StackAction::Acquire(thread));
                    }
                }
                (Phase::Holding, ModelOp::Push(v)) => actions.push(StackAction::Push(thread, v)),
                (Phase::Holding, ModelOp::Pop) => actions.push(StackAction::Pop(thread)),
                (Phase::Holding, ModelOp::Resize(c)) => {
                    actions.push(StackAction::ResizeAllocate(thread, c))
                }
                (Phase::ResizeAllocated { .. }, _) => actions.push(StackAction::ResizeCopy(thread)),
                (Phase::ResizeCopied { .. }, _) => actions.push(StackAction::ResizeSwap(thread)),
            }
        }
    }

    fn next_state(&self, last_state: &Self::State, action: Self::Action) -> Option<Self::State> {
        let mut state = last_state.clone();
        match action {
            StackAction::Acquire(thread) => {
                state.lock_holder = Some(thread);
                state.threads[thread].phase = Phase::Holding;
            }
            StackAction::Push(thread, value) => {
                if state.other_thread_mid_resize(thread) {
                    state.torn_observations = state.torn_observations.saturating_add(1);
                }
                if state.contents.len() < usize::from(state.capacity) {
                    state.contents.push(value);
                    state.pushed.push(value);
                } else {
                    state.full_rejections = state.full_rejections.saturating_add(1);
                }
                state.finish(thread);
            }
            StackAction::Pop(thread) => {
                if state.other_thread_mid_resize(thread) {
                    state.torn_observations = state.torn_observations.saturating_add(1);
                }
                if let Some(value) = state.contents.pop() {
                    state.popped.push(value);
                }
                state.finish(thread);
            }
            StackAction::ResizeAllocate(thread, capacity) => {
                state.threads[thread].phase = Phase::ResizeAllocated { capacity };
            }
            StackAction::ResizeCopy(thread) => {
                let Phase::ResizeAllocated { capacity } = state.threads[thread].phase else {
                    return None;
                };
                let keep = state.contents.len().min(usize::from(capacity));
                state.threads[thread].phase = Phase::ResizeCopied {
                    capacity,
                    buffer: state.contents[..keep].to_vec(),
                };
            }
            StackAction::ResizeSwap(thread) => {
                let Phase::ResizeCopied { capacity, buffer } = state.threads[thread].phase.clone()
                else {
                    return None;
                };
                let keep = state.contents.len().min(usize::from(capacity));
                state.truncated.extend_from_slice(&state.contents[keep..]);
                state.contents = buffer;
                state.capacity = capacity;
                state.finish(thread);
            }
        }
        Some(state)
    }

    fn properties(&self) -> Vec<Property<Self>> {
        vec![
            Property::<Self>::always("mutual exclusion", |_, state| {
                state.critical_count() <= 1
            }),
            Property::<Self>::always("count within capacity", |_, state| {
                state.contents.len() <= usize::from(state.capacity)
            }),
            Property::<Self>::always("capacity positive", |_, state| {
                state.capacity >= 1
            }),
            Property::<Self>::always("no lost elements", |_, state| {
                state.no_lost_elements()
            }),
            Property::<Self>::always("resize atomicity", |_, state| {
                state.torn_observations == 0
            }),
            Property::<Self>::sometimes("full reachable", |_, state| {
                state.full_rejections > 0
            }),
            Property::<Self>::sometimes("truncation reachable", |_, state| {
                !state.truncated.is_empty()
            }),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stateright::Checker;

    #[test]
    fn test_initial_state() {
        let model = StackModel::push_vs_shrink();
        let init = &model.init_states()[0];
        assert!(init.contents.is_empty());
        assert_eq!(init.capacity, 2);
        assert_eq!(init.lock_holder, None);
        assert_eq!(init.critical_count(), 0);
    }

    #[test]
    fn test_guard_blocks_second_acquire() {
        let model = StackModel::push_vs_shrink();
        let init = model.init_states().remove(0);
        let held = model.next_state(&init, StackAction::Acquire(0)).unwrap();

        let mut actions = Vec::new();
        model.actions(&held, &mut actions);
        assert_eq!(actions, vec![StackAction::Push(0, 1)]);
    }

    #[test]
    fn test_resize_steps_truncate() {
        let model = StackModel::new(3, vec![vec![ModelOp::Resize(1)]]);
        let mut state = model.init_states().remove(0);
        state.contents = vec![7, 8, 9];
        state.pushed = vec![7, 8, 9];

        for action in [
            StackAction::Acquire(0),
            StackAction::ResizeAllocate(0, 1),
            StackAction::ResizeCopy(0),
            StackAction::ResizeSwap(0),
        ] {
            state = model.next_state(&state, action).unwrap();
        }

        assert_eq!(state.contents, vec![7]);
        assert_eq!(state.truncated, vec![8, 9]);
        assert_eq!(state.capacity, 1);
        assert_eq!(state.lock_holder, None);
        assert!(state.no_lost_elements());
    }

    #[test]
    fn test_stateright_push_vs_shrink() {
        let checker = StackModel::push_vs_shrink()
            .checker()
            .threads(1)
            .spawn_bfs()
            .join();
        checker.assert_properties();
        assert!(checker.unique_state_count() > 10);
    }

    #[test]
    fn test_stateright_mixed() {
        let checker = StackModel::mixed().checker().threads(1).spawn_bfs().join();
        for name in [
            "mutual exclusion",
            "count within capacity",
            "capacity positive",
            "no lost elements",
            "resize atomicity",
        ] {
            assert!(checker.discovery(name).is_none(), "{} violated", name);
        }
        assert!(checker.discovery("full reachable").is_some());
        // Only growing resizes in this script.
        assert!(checker.discovery("truncation reachable").is_none());
    }

    #[test]
    fn test_stateright_unguarded_tears_resize() {
        let checker = StackModel::push_vs_shrink()
            .unguarded()
            .checker()
            .threads(1)
            .spawn_bfs()
            .join();

        assert!(checker.discovery("mutual exclusion").is_some());
        assert!(checker.discovery("resize atomicity").is_some());
    }

    #[test]
    fn test_stateright_unguarded_loses_elements() {
        // Push lands in the old buffer after the copy; the swap drops it.
        let model = StackModel::new(
            2,
            vec![vec![ModelOp::Resize(2)], vec![ModelOp::Push(5)]],
        )
        .unguarded();
        let checker = model.checker().threads(1).spawn_bfs().join();
        assert!(checker.discovery("no lost elements").is_some());
    }
}
