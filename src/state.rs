use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use sqlx::PgPool;
use tokio::sync::Mutex as AsyncMutex;

use crate::config::Settings;
use crate::services::definition_store::DefinitionSnapshot;

/// Serializes access to a single respondent's answer/dependent graph so that
/// concurrent `saveAnswer` calls against the same respondent never interleave
/// their read-modify-write of the propagation engine. Distinct respondents run
/// fully in parallel; the map only ever grows, entries are cheap `Arc`s.
#[derive(Clone, Default)]
pub struct RespondentLocks {
    inner: Arc<Mutex<HashMap<i64, Arc<AsyncMutex<()>>>>>,
}

impl RespondentLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the lock for `respondent_id`, creating it if this is the first
    /// time this process has seen that respondent.
    pub fn get(&self, respondent_id: i64) -> Arc<AsyncMutex<()>> {
        let mut guard = self.inner.lock().expect("respondent lock map poisoned");
        guard
            .entry(respondent_id)
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }
}

/// Application state shared across all request handlers.
///
/// This struct is designed to be cheaply cloneable (all inner types use Arc or are
/// Clone), making it suitable for use with Axum's state extraction.
#[derive(Clone)]
pub struct AppState {
    /// PostgreSQL connection pool
    db: PgPool,
    /// Application configuration
    config: Arc<Settings>,
    /// The loaded survey definition(s), immutable for the lifetime of the process
    definitions: Arc<DefinitionSnapshot>,
    /// Per-respondent serialization for the propagation engine
    respondent_locks: RespondentLocks,
}

impl AppState {
    /// Creates a new AppState instance.
    pub fn new(db: PgPool, config: Settings, definitions: DefinitionSnapshot) -> Self {
        Self {
            db,
            config: Arc::new(config),
            definitions: Arc::new(definitions),
            respondent_locks: RespondentLocks::new(),
        }
    }

    /// Returns a reference to the database connection pool.
    #[inline]
    pub fn db(&self) -> &PgPool {
        &self.db
    }

    /// Returns a reference to the application configuration.
    #[inline]
    pub fn config(&self) -> &Settings {
        &self.config
    }

    /// Returns the loaded survey definition snapshot.
    #[inline]
    pub fn definitions(&self) -> &DefinitionSnapshot {
        &self.definitions
    }

    /// Returns the lock guarding a given respondent's answer/dependent graph.
    #[inline]
    pub fn respondent_lock(&self, respondent_id: i64) -> Arc<AsyncMutex<()>> {
        self.respondent_locks.get(respondent_id)
    }

    /// Returns the configured server port.
    #[inline]
    pub fn port(&self) -> u16 {
        self.config.server.port
    }

    /// Returns whether the application is running in production mode.
    #[inline]
    pub fn is_production(&self) -> bool {
        self.config.is_production()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn app_state_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<AppState>();
    }

    #[test]
    fn respondent_locks_return_same_arc_for_same_id() {
        let locks = RespondentLocks::new();
        let a = locks.get(42);
        let b = locks.get(42);
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn respondent_locks_return_different_arcs_for_different_ids() {
        let locks = RespondentLocks::new();
        let a = locks.get(1);
        let b = locks.get(2);
        assert!(!Arc::ptr_eq(&a, &b));
    }
}
