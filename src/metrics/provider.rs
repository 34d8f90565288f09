//! Exactly-once instrument registration

use super::InstrumentSet;
use crate::error::AppResult;
use prometheus::Registry;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

/// Owner of the process's [`InstrumentSet`]
///
/// The first successful [`initialize`](Self::initialize) registers the
/// instruments with the supplied registry. Every later call, concurrent or
/// not, returns that same set and ignores its registry argument, so module
/// reloads never re-register.
///
/// Hosts usually share [`MetricsProvider::global`]. Tests and embedders that
/// own their registry construct a private provider with [`MetricsProvider::new`].
pub struct MetricsProvider {
    instruments: OnceLock<Arc<InstrumentSet>>,
    init_lock: Mutex<()>,
}

impl MetricsProvider {
    pub const fn new() -> Self {
        Self {
            instruments: OnceLock::new(),
            init_lock: Mutex::new(()),
        }
    }

    /// Process-wide provider
    pub fn global() -> Arc<MetricsProvider> {
        static GLOBAL: OnceLock<Arc<MetricsProvider>> = OnceLock::new();
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(MetricsProvider::new())))
    }

    /// Register the instruments with `registry` unless already done
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Registration`](crate::error::AppError::Registration)
    /// if the registry rejects an instrument (e.g. a name collision). Nothing
    /// is stored in that case; callers treat this as a fatal startup error.
    pub fn initialize(&self, registry: &Registry) -> AppResult<Arc<InstrumentSet>> {
        if let Some(existing) = self.instruments.get() {
            tracing::debug!("Rate limit metrics already registered, ignoring registry");
            return Ok(Arc::clone(existing));
        }

        // Registration can fail, so OnceLock::get_or_init alone is not enough
        let _guard = self.init_lock.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = self.instruments.get() {
            return Ok(Arc::clone(existing));
        }

        let set = InstrumentSet::register(registry).inspect_err(|e| {
            tracing::error!(error = %e, "Failed to register rate limit metrics");
        })?;

        tracing::info!("Registered rate limit metrics");
        Ok(Arc::clone(self.instruments.get_or_init(|| Arc::new(set))))
    }

    /// Registered instruments, or `None` before initialization
    pub fn instruments(&self) -> Option<&Arc<InstrumentSet>> {
        self.instruments.get()
    }

    pub fn is_initialized(&self) -> bool {
        self.instruments.get().is_some()
    }
}

impl Default for MetricsProvider {
    fn default() -> Self {
        Self::new()
    }
}
