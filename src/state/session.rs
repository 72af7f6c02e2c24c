use crate::bridge::BridgeEngine;
use crate::store::SessionStores;

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

/// One signed-in user and everything scoped to them
pub struct Session {
    pub id: Uuid,
    pub user: String,
    pub created_at: DateTime<Utc>,
    pub engine: Arc<BridgeEngine>,
}

impl Session {
    pub fn stores(&self) -> &Arc<SessionStores> {
        self.engine.stores()
    }

    pub fn info(&self) -> SessionInfo {
        SessionInfo {
            id: self.id,
            user: self.user.clone(),
            created_at: self.created_at,
            bridging: self.engine.is_bridging(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionInfo {
    pub id: Uuid,
    pub user: String,
    pub created_at: DateTime<Utc>,
    /// An operation is in flight
    pub bridging: bool,
}
