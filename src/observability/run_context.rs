//! Run context propagation for correlation ids.

use std::cell::RefCell;
use uuid::Uuid;

/// Per-run context with a correlation id.
#[derive(Clone, Debug)]
pub struct RunContext {
    run_id: String,
}

impl RunContext {
    /// Creates a context with a generated id.
    #[must_use]
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4().to_string(),
        }
    }

    /// Creates a context with an existing id.
    #[must_use]
    pub fn from_id(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
        }
    }

    /// Returns the run id.
    #[must_use]
    pub fn run_id(&self) -> &str {
        &self.run_id
    }
}

impl Default for RunContext {
    fn default() -> Self {
        Self::new()
    }
}

thread_local! {
    static CURRENT: RefCell<Option<RunContext>> = const { RefCell::new(None) };
}

/// Restores the previous context on drop.
pub struct RunContextGuard {
    previous: Option<RunContext>,
}

impl Drop for RunContextGuard {
    fn drop(&mut self) {
        CURRENT.with(|slot| {
            *slot.borrow_mut() = self.previous.take();
        });
    }
}

/// Makes `context` current on this thread until the guard drops.
#[must_use]
pub fn enter_run_context(context: RunContext) -> RunContextGuard {
    let previous = CURRENT.with(|slot| slot.borrow_mut().replace(context));
    RunContextGuard { previous }
}

/// Returns the current run id, if any.
#[must_use]
pub fn current_run_id() -> Option<String> {
    CURRENT.with(|slot| slot.borrow().as_ref().map(|ctx| ctx.run_id.clone()))
}
