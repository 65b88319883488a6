//! Single-writer handle for state shared across threads

use crate::state::ResourceState;
use parking_lot::Mutex;

/// Resource state behind an exclusive lock
///
/// Every mutation runs inside [`with_writer`](SharedState::with_writer), so
/// at most one mutation batch is in flight per state instance. Readers get
/// a copy, never a reference into the live maps.
#[derive(Debug, Default)]
pub struct SharedState {
    inner: Mutex<ResourceState>,
}

impl SharedState {
    /// Wrap existing state
    #[inline]
    #[must_use]
    pub fn new(state: ResourceState) -> Self {
        Self {
            inner: Mutex::new(state),
        }
    }

    /// Copy of the current state
    #[must_use]
    pub fn snapshot(&self) -> ResourceState {
        self.inner.lock().clone()
    }

    /// Digest of the current state
    #[must_use]
    pub fn digest(&self) -> String {
        self.inner.lock().digest()
    }

    /// Run `f` as the sole writer
    pub fn with_writer<R>(&self, f: impl FnOnce(&mut ResourceState) -> R) -> R {
        let mut guard = self.inner.lock();
        f(&mut guard)
    }

    /// Release the state
    #[must_use]
    pub fn into_inner(self) -> ResourceState {
        self.inner.into_inner()
    }
}

impl From<ResourceState> for SharedState {
    fn from(state: ResourceState) -> Self {
        Self::new(state)
    }
}
