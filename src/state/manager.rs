//! In-memory session registry

use super::session::{Session, SessionInfo};
use crate::bridge::BridgeEngine;
use crate::config::{BridgeConfig, Settings};
use crate::error::{BridgeCoreError, BridgeResult};
use crate::hooks::ConfirmationQueue;
use crate::metrics;
use crate::sdk::{ChainId, SdkFactory};
use crate::store::SessionStores;

use chrono::Utc;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

/// Owns every live session; nothing outlives sign-out
pub struct SessionManager {
    sessions: DashMap<Uuid, Arc<Session>>,
    factory: Arc<dyn SdkFactory>,
    config: BridgeConfig,
    chains: Vec<ChainId>,
}

impl SessionManager {
    pub fn new(settings: &Settings, factory: Arc<dyn SdkFactory>) -> Self {
        let mut chains: Vec<ChainId> = settings
            .enabled_chains()
            .into_iter()
            .map(|(_, c)| c.chain_id)
            .collect();
        chains.sort_unstable();

        Self {
            sessions: DashMap::new(),
            factory,
            config: settings.bridge.clone(),
            chains,
        }
    }

    /// Enabled chain ids, ascending
    pub fn chains(&self) -> &[ChainId] {
        &self.chains
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Create a session with fresh stores and load its balances and history
    pub async fn open_session(&self, user: impl Into<String>) -> Arc<Session> {
        let engine = BridgeEngine::new(
            self.factory.create(),
            Arc::new(SessionStores::new(&self.config)),
            Arc::new(ConfirmationQueue::new()),
            self.config.clone(),
            self.chains.clone(),
        );

        let session = Arc::new(Session {
            id: Uuid::new_v4(),
            user: user.into(),
            created_at: Utc::now(),
            engine,
        });

        self.sessions.insert(session.id, session.clone());
        metrics::set_active_sessions(self.sessions.len());
        info!("Opened session {} for {}", session.id, session.user);

        session.engine.load().await;
        session
    }

    pub fn get(&self, id: Uuid) -> BridgeResult<Arc<Session>> {
        self.sessions
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or(BridgeCoreError::SessionNotFound { session_id: id })
    }

    /// Tear a session down: stop its timers and deny pending confirmations
    pub async fn close_session(&self, id: Uuid) -> BridgeResult<()> {
        let (_, session) = self
            .sessions
            .remove(&id)
            .ok_or(BridgeCoreError::SessionNotFound { session_id: id })?;
        metrics::set_active_sessions(self.sessions.len());

        let denied = session.engine.shutdown().await;
        info!(
            "Closed session {} for {} ({} confirmations denied)",
            id, session.user, denied
        );
        Ok(())
    }

    pub fn active_sessions(&self) -> Vec<SessionInfo> {
        let mut sessions: Vec<SessionInfo> =
            self.sessions.iter().map(|entry| entry.value().info()).collect();
        sessions.sort_by_key(|s| s.created_at);
        sessions
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Close every session; used on shutdown
    pub async fn close_all(&self) {
        let ids: Vec<Uuid> = self.sessions.iter().map(|entry| *entry.key()).collect();
        for id in ids {
            if let Err(e) = self.close_session(id).await {
                debug!("Session {} already gone: {}", id, e);
            }
        }
    }
}
