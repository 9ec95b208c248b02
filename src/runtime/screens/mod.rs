use std::collections::HashMap;

use thiserror::Error;

use crate::routes::RouteEntry;

pub type SurfaceResult<T> = std::result::Result<T, SurfaceError>;

/// Failures reported by a view engine. None of these are fatal: a surface
/// that failed to load stays blank but remains switchable.
#[derive(Debug, Error)]
pub enum SurfaceError {
    #[error("surface `{key}` failed to begin loading: {reason}")]
    Load { key: String, reason: String },
    #[error("surface `{key}` failed to present: {reason}")]
    Present { key: String, reason: String },
}

/// An opaque, pre-initialised renderable unit bound to one route key.
pub trait Surface {
    /// Start loading the bound resource. Called exactly once per surface.
    fn begin_load(&mut self) -> SurfaceResult<()>;
    fn set_visible(&mut self, visible: bool);
    fn is_visible(&self) -> bool;
}

/// Backend that creates and presents surfaces. Implementations are driven
/// from the display thread only.
pub trait ViewEngine {
    type Surface: Surface;

    /// Create a hidden surface for `entry`. Loading is started separately.
    fn create_surface(&mut self, entry: &RouteEntry) -> Self::Surface;

    /// Called after `surface` became the visible one.
    fn present(&mut self, _key: &str, _surface: &Self::Surface) -> SurfaceResult<()> {
        Ok(())
    }
}

/// One preloaded surface in the pool.
#[derive(Debug)]
pub struct ViewPoolEntry<S> {
    key: String,
    surface: S,
    loaded: bool,
}

impl<S> ViewPoolEntry<S> {
    pub fn key(&self) -> &str {
        &self.key
    }

    /// True once loading has begun; never reverts.
    pub fn loaded(&self) -> bool {
        self.loaded
    }

    pub(crate) fn surface(&self) -> &S {
        &self.surface
    }
}

/// Fixed set of surfaces, one per route key, with at most one visible.
#[derive(Debug)]
pub struct ViewPool<S> {
    entries: Vec<ViewPoolEntry<S>>,
    index: HashMap<String, usize>,
    visible: Option<usize>,
}

impl<S> Default for ViewPool<S> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
            visible: None,
        }
    }
}

impl<S: Surface> ViewPool<S> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a surface and begin its load. Returns the load failure, if any;
    /// the entry is kept either way. Re-inserting a key is ignored.
    pub(crate) fn insert(&mut self, key: &str, mut surface: S) -> SurfaceResult<()> {
        if self.index.contains_key(key) {
            return Ok(());
        }
        surface.set_visible(false);
        let outcome = surface.begin_load();
        self.index.insert(key.to_string(), self.entries.len());
        self.entries.push(ViewPoolEntry {
            key: key.to_string(),
            surface,
            loaded: outcome.is_ok(),
        });
        outcome
    }

    /// Make `key` the sole visible surface. Returns the index of the surface
    /// that was hidden, or `None` when nothing changed hands.
    pub(crate) fn show(&mut self, key: &str) -> Option<usize> {
        let next = *self.index.get(key)?;
        if self.visible == Some(next) {
            return None;
        }
        let previous = self.visible.take();
        if let Some(prev) = previous {
            self.entries[prev].surface.set_visible(false);
        }
        self.entries[next].surface.set_visible(true);
        self.visible = Some(next);
        previous
    }

    pub fn contains(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&ViewPoolEntry<S>> {
        self.index.get(key).map(|&idx| &self.entries[idx])
    }

    pub fn visible_key(&self) -> Option<&str> {
        self.visible.map(|idx| self.entries[idx].key.as_str())
    }

    pub(crate) fn visible_surface(&self) -> Option<&S> {
        self.visible.map(|idx| &self.entries[idx].surface)
    }

    /// Surfaces currently reporting themselves visible.
    pub fn visible_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| entry.surface.is_visible())
            .count()
    }

    pub fn entries(&self) -> &[ViewPoolEntry<S>] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
