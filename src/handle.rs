//! Database Handle
//!
//! Owns the single engine instance of one store location and manages its
//! lifecycle.
//!
//! ## State Machine
//! ```text
//!            open()                 close()
//!   Closed ──────────▶ Open ──────────────▶ Closed
//!     ▲                  │
//!     └── reset(): close → delete directory → open
//! ```
//!
//! Every transition runs under the write side of one `RwLock`. Store
//! operations hold the read side (through [`DatabaseHandle::engine`]) for
//! their whole duration, so a transition waits for in-flight operations and
//! operations never observe a half-finished transition. parking_lot's lock
//! queues new readers behind a waiting writer, so long scans cannot starve
//! lifecycle transitions.

use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::{MappedRwLockReadGuard, RwLock, RwLockReadGuard};
use tracing::{debug, error, warn};

use crate::config::{Config, Options};
use crate::engine::{Engine, EngineFactory, LsmFactory};
use crate::error::{Result, StratumError};

/// Shared-lock guard on a live engine
pub type EngineGuard<'a, E> = MappedRwLockReadGuard<'a, E>;

/// Filesystem location of a store: `{parent_dir}/{directory}/{name}`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreLocation {
    parent_dir: PathBuf,
    directory: PathBuf,
    name: String,
}

impl StoreLocation {
    pub fn new(
        parent_dir: impl Into<PathBuf>,
        directory: impl Into<PathBuf>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            parent_dir: parent_dir.into(),
            directory: directory.into(),
            name: name.into(),
        }
    }

    /// Full path of the store directory
    pub fn path(&self) -> PathBuf {
        self.parent_dir.join(&self.directory).join(&self.name)
    }

    pub fn parent_dir(&self) -> &Path {
        &self.parent_dir
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Two-state lifecycle; `Open` owns the engine
enum Lifecycle<E> {
    Closed,
    Open(E),
}

impl<E> Lifecycle<E> {
    fn engine(&self) -> Option<&E> {
        match self {
            Lifecycle::Open(engine) => Some(engine),
            Lifecycle::Closed => None,
        }
    }

    fn is_open(&self) -> bool {
        matches!(self, Lifecycle::Open(_))
    }
}

/// Lifecycle manager for one on-disk store
///
/// Create one per store location and share it (e.g. in an `Arc`) for the
/// life of the process. Dropping the handle closes the store.
pub struct DatabaseHandle<F: EngineFactory = LsmFactory> {
    location: StoreLocation,
    /// Cached `location.path()`
    path: PathBuf,
    options: Options,
    factory: F,
    state: RwLock<Lifecycle<F::Engine>>,
}

impl DatabaseHandle<LsmFactory> {
    /// Handle over the built-in engine with default options
    pub fn new(
        parent_dir: impl Into<PathBuf>,
        directory: impl Into<PathBuf>,
        name: impl Into<String>,
    ) -> Self {
        Self::with_factory(
            StoreLocation::new(parent_dir, directory, name),
            Options::default(),
            LsmFactory,
        )
    }

    /// Handle over the built-in engine, located and tuned by `config`
    pub fn from_config(config: &Config) -> Self {
        Self::with_factory(
            StoreLocation::new(&config.parent_dir, &config.directory, config.name.clone()),
            config.options.clone(),
            LsmFactory,
        )
    }
}

impl<F: EngineFactory> DatabaseHandle<F> {
    /// Handle over any engine. The store stays closed until first use.
    pub fn with_factory(location: StoreLocation, options: Options, factory: F) -> Self {
        let path = location.path();
        Self {
            location,
            path,
            options,
            factory,
            state: RwLock::new(Lifecycle::Closed),
        }
    }

    /// Open the store. No-op when already open.
    ///
    /// A corruption error from the engine triggers exactly one repair and
    /// one more open. Anything else that goes wrong is returned as
    /// [`StratumError::Initialization`]; callers should treat it as fatal.
    pub fn open(&self) -> Result<()> {
        if self.is_alive() {
            return Ok(());
        }
        let mut state = self.state.write();
        self.open_locked(&mut state)
    }

    /// Close the store. No-op when already closed.
    ///
    /// Engine close failures are logged and swallowed; the handle is Closed
    /// afterwards either way.
    pub fn close(&self) {
        let mut state = self.state.write();
        Self::close_locked(&self.path, &mut state);
    }

    /// Close, delete the store directory, open again.
    ///
    /// The three steps run under one exclusive lock, so no in-process caller
    /// can reopen the store in between. There is no rollback: if the process
    /// dies after the delete, or the delete/reopen fails, the store is gone
    /// and the handle is Closed; the next access recreates it empty.
    pub fn reset(&self) -> Result<()> {
        let mut state = self.state.write();
        Self::close_locked(&self.path, &mut state);

        if self.path.exists() {
            debug!(path = %self.path.display(), "deleting store contents");
            fs::remove_dir_all(&self.path)?;
        }

        self.open_locked(&mut state)
    }

    /// Destroy the store at an arbitrary `path` through the engine.
    ///
    /// Failures are logged, never returned. This handle's own state is left
    /// untouched.
    pub fn destroy(&self, path: &Path) {
        let _state = self.state.write();
        debug!(path = %path.display(), "destroying existing database");
        if let Err(e) = self.factory.destroy(path, &self.options) {
            error!(path = %path.display(), error = %e, "failed to destroy database");
        }
    }

    /// The live engine, opening the store first if needed.
    ///
    /// The returned guard holds the shared lock; lifecycle transitions wait
    /// until it is dropped.
    pub fn engine(&self) -> Result<EngineGuard<'_, F::Engine>> {
        loop {
            let state = self.state.read();
            if let Ok(engine) = RwLockReadGuard::try_map(state, |s| s.engine()) {
                return Ok(engine);
            }
            self.open()?;
        }
    }

    /// Whether the store is open
    pub fn is_alive(&self) -> bool {
        self.state.read().is_open()
    }

    pub fn location(&self) -> &StoreLocation {
        &self.location
    }

    /// Full path of the store directory
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn factory(&self) -> &F {
        &self.factory
    }

    // =========================================================================
    // Transitions (exclusive lock held by the caller)
    // =========================================================================

    fn open_locked(&self, state: &mut Lifecycle<F::Engine>) -> Result<()> {
        if state.is_open() {
            return Ok(());
        }

        debug!(path = %self.path.display(), "opening store");
        let engine = self.open_engine().map_err(|e| StratumError::Initialization {
            path: self.path.clone(),
            source: Box::new(e),
        })?;
        *state = Lifecycle::Open(engine);
        Ok(())
    }

    fn open_engine(&self) -> Result<F::Engine> {
        self.ensure_parent_dir()?;

        match self.factory.open(&self.path, &self.options) {
            Ok(engine) => Ok(engine),
            Err(e) if e.is_corruption() => {
                warn!(path = %self.path.display(), error = %e, "store is corrupted, repairing");
                self.factory.repair(&self.path, &self.options)?;
                self.factory.open(&self.path, &self.options)
            }
            Err(e) => Err(e),
        }
    }

    /// Create the store's parent directory unless it is a symbolic link
    fn ensure_parent_dir(&self) -> Result<()> {
        let Some(parent) = self.path.parent() else {
            return Ok(());
        };
        let is_symlink = fs::symlink_metadata(parent)
            .map(|meta| meta.file_type().is_symlink())
            .unwrap_or(false);
        if !is_symlink {
            fs::create_dir_all(parent)?;
        }
        Ok(())
    }

    fn close_locked(path: &Path, state: &mut Lifecycle<F::Engine>) {
        if let Lifecycle::Open(engine) = std::mem::replace(state, Lifecycle::Closed) {
            match engine.close() {
                Ok(()) => debug!(path = %path.display(), "store closed"),
                Err(e) => error!(path = %path.display(), error = %e, "failed to close store"),
            }
        }
    }
}

impl<F: EngineFactory> Drop for DatabaseHandle<F> {
    fn drop(&mut self) {
        Self::close_locked(&self.path, self.state.get_mut());
    }
}
