//! Application state module
//!
//! Defines shared state accessible across all request handlers.

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use dashmap::DashMap;
use sentinel_core::{EngineConfig, ExtractionFailure, FieldExtractor, FlagEngine};
use tokio::sync::{Mutex, Semaphore};
use uuid::Uuid;

use crate::config::Config;
use crate::error::ApiError;

/// One analysis session: an engine plus the uploads it could not ingest.
#[derive(Debug)]
pub struct Session {
    pub engine: FlagEngine,
    pub failures: Vec<ExtractionFailure>,
    pub created_at: DateTime<Utc>,
}

/// A live session and when a request last looked it up.
#[derive(Debug)]
pub struct SessionEntry {
    pub session: Arc<Mutex<Session>>,
    pub last_used: DateTime<Utc>,
}

/// Application state containing shared resources.
#[derive(Clone)]
pub struct AppState {
    /// Live sessions, each behind its own lock so sessions never contend
    pub sessions: Arc<DashMap<Uuid, SessionEntry>>,
    /// Field extractor shared by every session
    pub extractor: Arc<dyn FieldExtractor>,
    /// Engine settings for new sessions (validated at startup)
    pub engine_config: EngineConfig,
    /// Maximum number of live sessions
    pub max_sessions: usize,
    /// Sessions unused for this long may be evicted to make room (None = never)
    pub session_idle: Option<TimeDelta>,
    /// Per-upload size limit in bytes
    pub max_file_size: usize,
    /// Bounds concurrent OCR/LLM calls across all sessions
    pub extraction_permits: Arc<Semaphore>,
}

impl AppState {
    pub fn new(config: &Config, extractor: Arc<dyn FieldExtractor>) -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
            extractor,
            engine_config: config.engine.clone(),
            max_sessions: config.max_sessions,
            session_idle: i64::try_from(config.session_idle_secs)
                .ok()
                .filter(|secs| *secs > 0)
                .and_then(TimeDelta::try_seconds),
            max_file_size: config.max_file_size(),
            extraction_permits: Arc::new(Semaphore::new(config.max_concurrent_extractions.max(1))),
        }
    }

    /// Open a new session. At the cap, idle sessions are evicted first; if
    /// none are idle the request is refused.
    pub fn create_session(&self) -> Result<(Uuid, DateTime<Utc>), ApiError> {
        if self.sessions.len() >= self.max_sessions {
            self.evict_idle();
        }
        if self.sessions.len() >= self.max_sessions {
            return Err(ApiError::service_unavailable(format!(
                "Session limit of {} reached; delete a session first",
                self.max_sessions
            )));
        }

        let engine = FlagEngine::new(self.engine_config.clone())?;
        let id = Uuid::new_v4();
        let created_at = Utc::now();
        self.sessions.insert(
            id,
            SessionEntry {
                session: Arc::new(Mutex::new(Session {
                    engine,
                    failures: Vec::new(),
                    created_at,
                })),
                last_used: created_at,
            },
        );
        Ok((id, created_at))
    }

    /// Look up a session and mark it used.
    pub fn session(&self, id: Uuid) -> Result<Arc<Mutex<Session>>, ApiError> {
        let mut entry = self
            .sessions
            .get_mut(&id)
            .ok_or_else(|| ApiError::not_found(format!("Session {id} does not exist")))?;
        entry.last_used = Utc::now();
        Ok(Arc::clone(&entry.session))
    }

    /// Drop sessions idle past `session_idle` that no request is holding.
    fn evict_idle(&self) {
        let Some(idle) = self.session_idle else {
            return;
        };
        let Some(cutoff) = Utc::now().checked_sub_signed(idle) else {
            return;
        };
        self.sessions.retain(|id, entry| {
            let keep = entry.last_used > cutoff || Arc::strong_count(&entry.session) > 1;
            if !keep {
                tracing::info!(
                    session_id = %id,
                    last_used = %entry.last_used,
                    "Evicting idle session"
                );
            }
            keep
        });
    }

    pub fn remove_session(&self, id: Uuid) -> Result<(), ApiError> {
        self.sessions
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| ApiError::not_found(format!("Session {id} does not exist")))
    }
}
