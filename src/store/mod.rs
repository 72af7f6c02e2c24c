//! Session-scoped state stores
//!
//! Each signed-in session owns one `SessionStores`. Stores are plain structs;
//! the locks live here so the engine and the API can share them.

mod balance;
mod form;
mod history;
mod notice;
mod progress;
mod simulation;

pub use balance::BalanceStore;
pub use form::{BridgeForm, FormStore, SubmissionState};
pub use history::{HistoryStatistics, IntentStatus, TransactionHistory};
pub use notice::{Notice, NoticeBoard, NoticeLevel};
pub use progress::{ProgressSnapshot, ProgressStore};
pub use simulation::SimulationStore;

use crate::config::BridgeConfig;

use tokio::sync::{Mutex, RwLock};

pub struct SessionStores {
    pub form: RwLock<FormStore>,
    pub progress: RwLock<ProgressStore>,
    pub balances: RwLock<BalanceStore>,
    pub simulation: RwLock<SimulationStore>,
    pub history: RwLock<TransactionHistory>,
    pub notices: Mutex<NoticeBoard>,
}

impl SessionStores {
    pub fn new(config: &BridgeConfig) -> Self {
        Self {
            form: RwLock::new(FormStore::new(config.default_chain_id)),
            progress: RwLock::new(ProgressStore::new()),
            balances: RwLock::new(BalanceStore::new()),
            simulation: RwLock::new(SimulationStore::new()),
            history: RwLock::new(TransactionHistory::new()),
            notices: Mutex::new(NoticeBoard::new(config.max_notices, config.notice_ttl())),
        }
    }
}
