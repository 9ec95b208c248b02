use std::sync::{Arc, PoisonError, RwLock};

/// The currently visible route key.
///
/// `ActiveState` is the writing half and is owned by the display controller;
/// it is deliberately not `Clone`. Any number of [`ActiveReader`] handles can
/// be handed to other threads. The key is swapped as a whole `Arc<str>` under
/// the lock, so a reader sees either the old or the new key, never a mix.
#[derive(Debug)]
pub struct ActiveState {
    inner: Arc<RwLock<Arc<str>>>,
}

impl ActiveState {
    pub fn new(initial: impl Into<String>) -> Self {
        let key: Arc<str> = Arc::from(initial.into());
        Self {
            inner: Arc::new(RwLock::new(key)),
        }
    }

    pub fn reader(&self) -> ActiveReader {
        ActiveReader {
            inner: Arc::clone(&self.inner),
        }
    }

    pub fn write(&mut self, key: &str) {
        let next: Arc<str> = Arc::from(key);
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        *guard = next;
    }

    pub fn read(&self) -> String {
        read_key(&self.inner)
    }
}

/// Read-only handle onto an [`ActiveState`].
#[derive(Debug, Clone)]
pub struct ActiveReader {
    inner: Arc<RwLock<Arc<str>>>,
}

impl ActiveReader {
    pub fn read(&self) -> String {
        read_key(&self.inner)
    }
}

fn read_key(cell: &RwLock<Arc<str>>) -> String {
    let key = {
        let guard = cell.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    };
    key.to_string()
}
