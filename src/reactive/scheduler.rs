//! Pass-based effect scheduler
//!
//! Effects declare the cells they depend on. [`Runtime::flush`] commits all
//! pending writes, runs every effect whose dependencies changed since its
//! last run (in registration order), then the view lane, and repeats until
//! the store is quiet. Writes made by an effect are only committed at the
//! start of the following pass, so a cascade such as
//! `offset -> owner -> count -> image` unfolds over several passes instead of
//! one deep call stack.

use std::future::Future;

use futures::future::{BoxFuture, FutureExt};
use tracing::{debug, warn};

use super::store::{CellId, State, Store};
use crate::error::{EffectError, SchedulerError};

/// An asynchronous job spawned by an effect or handler. Its output is fed
/// back to the owner of the runtime once it resolves.
pub type Task<C> = BoxFuture<'static, C>;

type EffectFn<C> = Box<dyn FnMut(&mut Cx<'_, C>) -> Result<(), EffectError> + Send>;
type ViewFn<S> = Box<dyn FnMut(&Store, &mut S) + Send>;

/// Context handed to effects and handlers.
///
/// Reads see committed values. Writes are pending until the next commit.
pub struct Cx<'a, C> {
    store: &'a mut Store,
    tasks: &'a mut Vec<Task<C>>,
}

impl<'a, C> Cx<'a, C> {
    pub fn get<T: 'static>(&self, state: State<T>) -> &T {
        self.store.get(state)
    }

    pub fn set<T: 'static>(&mut self, state: State<T>, value: T) {
        self.store.set(state, value);
    }

    /// Queue an asynchronous job. The effect does not wait for it.
    pub fn spawn<F>(&mut self, future: F)
    where
        F: Future<Output = C> + Send + 'static,
    {
        self.tasks.push(future.boxed());
    }
}

struct Registration<F> {
    name: &'static str,
    deps: Vec<CellId>,
    /// Dependency versions observed when the callback last ran.
    seen: Option<Vec<u64>>,
    run: F,
}

impl<F> Registration<F> {
    fn snapshot(&self, store: &Store) -> Vec<u64> {
        self.deps.iter().map(|id| store.version(*id)).collect()
    }

    fn is_due(&self, store: &Store) -> bool {
        self.seen.as_ref() != Some(&self.snapshot(store))
    }
}

/// Counters describing one [`Runtime::flush`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushReport {
    pub passes: usize,
    pub effects_run: usize,
    pub views_run: usize,
    pub failures: usize,
}

/// Cells, effects and the queue of spawned jobs for one page.
///
/// `C` is the completion type produced by spawned jobs, `S` the render sink
/// the view lane writes into.
pub struct Runtime<C, S> {
    store: Store,
    effects: Vec<Registration<EffectFn<C>>>,
    views: Vec<Registration<ViewFn<S>>>,
    tasks: Vec<Task<C>>,
    max_passes: usize,
}

impl<C, S> Runtime<C, S>
where
    C: Send + 'static,
{
    pub fn new(max_passes: usize) -> Self {
        Self {
            store: Store::new(),
            effects: Vec::new(),
            views: Vec::new(),
            tasks: Vec::new(),
            max_passes: max_passes.max(1),
        }
    }

    pub fn declare<T>(&mut self, name: &'static str, initial: T) -> State<T>
    where
        T: PartialEq + Send + 'static,
    {
        self.store.declare(name, initial)
    }

    pub fn get<T: 'static>(&self, state: State<T>) -> &T {
        self.store.get(state)
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Register an effect. It runs on the next flush and afterwards whenever
    /// one of `deps` commits a new value.
    pub fn register_effect<F>(&mut self, name: &'static str, deps: &[CellId], run: F)
    where
        F: FnMut(&mut Cx<'_, C>) -> Result<(), EffectError> + Send + 'static,
    {
        self.effects.push(Registration {
            name,
            deps: deps.to_vec(),
            seen: None,
            run: Box::new(run),
        });
    }

    /// Register a projection into the render sink. Views run after the
    /// effects of the same pass and can neither write cells nor spawn jobs.
    pub fn register_view<F>(&mut self, name: &'static str, deps: &[CellId], run: F)
    where
        F: FnMut(&Store, &mut S) + Send + 'static,
    {
        self.views.push(Registration {
            name,
            deps: deps.to_vec(),
            seen: None,
            run: Box::new(run),
        });
    }

    /// Run a batch of writes (an event handler or a completion) without
    /// flushing. Call [`Runtime::flush`] afterwards.
    pub fn update<R>(&mut self, f: impl FnOnce(&mut Cx<'_, C>) -> R) -> R {
        let mut cx = Cx {
            store: &mut self.store,
            tasks: &mut self.tasks,
        };
        f(&mut cx)
    }

    /// Commit pending writes and run due effects and views until quiet.
    pub fn flush(&mut self, sink: &mut S) -> Result<FlushReport, SchedulerError> {
        let mut report = FlushReport::default();

        loop {
            let changed = self.store.commit();
            if !changed.is_empty() {
                debug!(
                    cells = ?changed.iter().map(|id| self.store.name(*id)).collect::<Vec<_>>(),
                    "committed"
                );
            }

            let due_effects: Vec<usize> = (0..self.effects.len())
                .filter(|&index| self.effects[index].is_due(&self.store))
                .collect();
            let due_views: Vec<usize> = (0..self.views.len())
                .filter(|&index| self.views[index].is_due(&self.store))
                .collect();

            if due_effects.is_empty() && due_views.is_empty() && !self.store.is_dirty() {
                return Ok(report);
            }

            if report.passes == self.max_passes {
                let pending = due_effects
                    .iter()
                    .map(|&index| self.effects[index].name)
                    .chain(due_views.iter().map(|&index| self.views[index].name))
                    .collect();
                return Err(SchedulerError::PassLimitExceeded {
                    limit: self.max_passes,
                    pending,
                });
            }
            report.passes += 1;

            for index in due_effects {
                let snapshot = self.effects[index].snapshot(&self.store);
                let effect = &mut self.effects[index];
                effect.seen = Some(snapshot);

                let mut cx = Cx {
                    store: &mut self.store,
                    tasks: &mut self.tasks,
                };
                debug!(effect = effect.name, pass = report.passes, "running effect");
                report.effects_run += 1;
                if let Err(error) = (effect.run)(&mut cx) {
                    warn!(effect = effect.name, %error, "effect failed");
                    report.failures += 1;
                }
            }

            for index in due_views {
                let snapshot = self.views[index].snapshot(&self.store);
                let view = &mut self.views[index];
                view.seen = Some(snapshot);
                (view.run)(&self.store, sink);
                report.views_run += 1;
            }
        }
    }

    /// Run every view once regardless of dependency changes.
    pub fn rerender(&mut self, sink: &mut S) {
        for view in &mut self.views {
            view.seen = Some(view.snapshot(&self.store));
            (view.run)(&self.store, sink);
        }
    }

    /// Hand over every job spawned since the last call.
    pub fn take_tasks(&mut self) -> Vec<Task<C>> {
        std::mem::take(&mut self.tasks)
    }

    pub fn has_tasks(&self) -> bool {
        !self.tasks.is_empty()
    }
}
