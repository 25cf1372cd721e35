//! Where the current unit of work lives.
//!
//! The registry never holds a unit of work itself; it asks its
//! [`ScopeProvider`] for the current one.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::unitofwork::UnitOfWork;

/// A shared handle to a unit of work.
pub type Scope = Rc<RefCell<UnitOfWork>>;

/// Supplies the unit of work for the calling context.
pub trait ScopeProvider: Send + Sync + fmt::Debug {
    /// The current unit of work, created on first use.
    fn current_scope(&self) -> Scope;

    /// Discards the current unit of work.
    fn clear(&self);
}

static NEXT_PROVIDER_ID: AtomicUsize = AtomicUsize::new(0);

thread_local! {
    static THREAD_SCOPES: RefCell<HashMap<usize, Scope>> = RefCell::new(HashMap::new());
}

/// One unit of work per thread and provider.
#[derive(Debug)]
pub struct ThreadScope {
    id: usize,
}

impl ThreadScope {
    /// A provider with its own per-thread units of work.
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: NEXT_PROVIDER_ID.fetch_add(1, Ordering::Relaxed),
        }
    }
}

impl Default for ThreadScope {
    fn default() -> Self {
        Self::new()
    }
}

impl ScopeProvider for ThreadScope {
    fn current_scope(&self) -> Scope {
        THREAD_SCOPES.with(|scopes| {
            scopes
                .borrow_mut()
                .entry(self.id)
                .or_insert_with(|| Rc::new(RefCell::new(UnitOfWork::default())))
                .clone()
        })
    }

    fn clear(&self) {
        THREAD_SCOPES.with(|scopes| {
            scopes.borrow_mut().remove(&self.id);
        });
    }
}
