//! Build-once holder for sub-clients.
//!
//! A `LazyLoader` starts empty and runs its factory on first `get`. The
//! slot is filled through `OnceLock`, so concurrent first callers block on
//! a single construction and all observe the same instance afterwards.

use std::fmt;
use std::sync::OnceLock;

use tracing::debug;

pub struct LazyLoader<T> {
    cell: OnceLock<T>,
    init: Box<dyn Fn() -> T + Send + Sync>,
}

impl<T> LazyLoader<T> {
    pub fn new(init: impl Fn() -> T + Send + Sync + 'static) -> Self {
        Self {
            cell: OnceLock::new(),
            init: Box::new(init),
        }
    }

    /// The cached instance, constructing it on first access.
    pub fn get(&self) -> &T {
        self.cell.get_or_init(|| {
            debug!(kind = std::any::type_name::<T>(), "constructing lazily loaded client");
            (self.init)()
        })
    }

    /// The cached instance if one has been built; never constructs.
    pub fn instance(&self) -> Option<&T> {
        self.cell.get()
    }

    pub fn is_initialized(&self) -> bool {
        self.cell.get().is_some()
    }
}

impl<T> fmt::Debug for LazyLoader<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazyLoader")
            .field("kind", &std::any::type_name::<T>())
            .field("initialized", &self.is_initialized())
            .finish()
    }
}
