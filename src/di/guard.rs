use crate::error::{MeshweaveError, Result};
use std::cell::RefCell;

thread_local! {
    // (container id, identifier) for every `get` currently on this thread's stack.
    static RESOLVING: RefCell<Vec<(u64, String)>> = const { RefCell::new(Vec::new()) };
}

/// Marks an identifier as in progress for the lifetime of the guard.
pub(crate) struct ResolutionGuard {
    container: u64,
}

impl ResolutionGuard {
    pub(crate) fn enter(container: u64, id: &str) -> Result<Self> {
        RESOLVING.with(|stack| {
            let mut stack = stack.borrow_mut();
            let start = stack
                .iter()
                .position(|(owner, seen)| *owner == container && seen == id);
            if let Some(start) = start {
                let mut path: Vec<&str> = stack[start..]
                    .iter()
                    .filter(|(owner, _)| *owner == container)
                    .map(|(_, seen)| seen.as_str())
                    .collect();
                path.push(id);
                return Err(MeshweaveError::CircularDependency {
                    cycle: path.join(" -> "),
                });
            }
            stack.push((container, id.to_string()));
            Ok(Self { container })
        })
    }
}

impl Drop for ResolutionGuard {
    fn drop(&mut self) {
        RESOLVING.with(|stack| {
            let mut stack = stack.borrow_mut();
            if let Some(pos) = stack.iter().rposition(|(owner, _)| *owner == self.container) {
                stack.remove(pos);
            }
        });
    }
}
