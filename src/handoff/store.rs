// Copyright (c) 2025 ImageCraft
// SPDX-License-Identifier: BUSL-1.1
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::state::ProcessingState;
use super::STATE_EXPIRY;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct StoredState {
    #[serde(flatten)]
    state: ProcessingState,
    saved_at_epoch_ms: i64,
}

/// Single-slot-per-session store for the last unsaved processing result.
///
/// Last-write-wins: a second `save` before a `take` overwrites the first.
/// Slots expire after [`STATE_EXPIRY`] and are purged on the next read.
/// Persistence to the optional state file is best-effort; losing this
/// convenience state must never block the user-visible flow.
#[derive(Clone)]
pub struct HandoffStore {
    slots: Arc<RwLock<HashMap<String, StoredState>>>,
    state_file: Option<PathBuf>,
}

impl HandoffStore {
    pub fn new() -> Self {
        Self {
            slots: Arc::new(RwLock::new(HashMap::new())),
            state_file: None,
        }
    }

    /// Store backed by a JSON file so slots survive a process restart.
    /// A corrupt or unreadable file is discarded, not an error.
    pub fn with_state_file(path: PathBuf) -> Self {
        let slots = match std::fs::read(&path) {
            Ok(bytes) => match serde_json::from_slice::<HashMap<String, StoredState>>(&bytes) {
                Ok(map) => {
                    debug!("restored {} handoff slot(s) from {:?}", map.len(), path);
                    map
                }
                Err(e) => {
                    warn!("discarding corrupt handoff state file {:?}: {}", path, e);
                    HashMap::new()
                }
            },
            Err(_) => HashMap::new(),
        };

        Self {
            slots: Arc::new(RwLock::new(slots)),
            state_file: Some(path),
        }
    }

    /// Save a processing state for a session, stamping the current time.
    /// Overwrites any unconsumed prior state. Never fails: persistence
    /// problems are logged and swallowed.
    pub async fn save(&self, session: &str, state: ProcessingState) {
        self.save_stamped(session, state, Utc::now().timestamp_millis())
            .await;
    }

    async fn save_stamped(&self, session: &str, state: ProcessingState, saved_at_epoch_ms: i64) {
        let mut slots = self.slots.write().await;
        slots.insert(
            session.to_string(),
            StoredState {
                state,
                saved_at_epoch_ms,
            },
        );
        info!("preserved processing state for session {}", session);
        self.persist(&slots);
    }

    /// Read the slot without consuming it. Expired or undecodable slots are
    /// purged and reported as absent.
    pub async fn load(&self, session: &str) -> Option<ProcessingState> {
        let expired = {
            let slots = self.slots.read().await;
            match slots.get(session) {
                None => return None,
                Some(stored) => {
                    if !Self::is_expired(stored) {
                        return Some(stored.state.clone());
                    }
                    true
                }
            }
        };

        if expired {
            debug!("handoff slot for session {} expired, purging", session);
            self.clear(session).await;
        }
        None
    }

    /// Single-consumer read: return the slot and clear it in one step.
    /// This is the restore path after the user returns from sign-in.
    pub async fn take(&self, session: &str) -> Option<ProcessingState> {
        let mut slots = self.slots.write().await;
        let stored = slots.remove(session)?;
        self.persist(&slots);

        if Self::is_expired(&stored) {
            debug!("handoff slot for session {} expired, purging", session);
            return None;
        }
        Some(stored.state)
    }

    /// Idempotent.
    pub async fn clear(&self, session: &str) {
        let mut slots = self.slots.write().await;
        if slots.remove(session).is_some() {
            self.persist(&slots);
        }
    }

    pub async fn exists(&self, session: &str) -> bool {
        self.load(session).await.is_some()
    }

    fn is_expired(stored: &StoredState) -> bool {
        let age_ms = Utc::now().timestamp_millis() - stored.saved_at_epoch_ms;
        age_ms >= STATE_EXPIRY.as_millis() as i64
    }

    fn persist(&self, slots: &HashMap<String, StoredState>) {
        let Some(path) = &self.state_file else {
            return;
        };
        match serde_json::to_vec(slots) {
            Ok(bytes) => {
                if let Err(e) = std::fs::write(path, bytes) {
                    warn!("failed to persist handoff state to {:?}: {}", path, e);
                }
            }
            Err(e) => warn!("failed to serialize handoff state: {}", e),
        }
    }
}

impl Default for HandoffStore {
    fn default() -> Self {
        Self::new()
    }
}
