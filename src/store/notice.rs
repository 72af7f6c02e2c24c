//! User-facing notifications
//!
//! A bounded queue the UI drains, and a single status line that expires on its own.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use tokio::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Success,
    Error,
    Info,
    Loading,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Explorer link offered alongside the notice
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Notice {
    pub fn new(level: NoticeLevel, title: impl Into<String>) -> Self {
        Self {
            level,
            title: title.into(),
            description: None,
            action_url: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_action_url(mut self, url: Option<String>) -> Self {
        self.action_url = url.filter(|u| !u.is_empty());
        self
    }
}

#[derive(Debug)]
pub struct NoticeBoard {
    queue: VecDeque<Notice>,
    capacity: usize,
    ttl: Duration,
    status: Option<(Notice, Instant)>,
}

impl NoticeBoard {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        Self {
            queue: VecDeque::new(),
            capacity: capacity.max(1),
            ttl,
            status: None,
        }
    }

    /// Queue a notice and make it the status line; the oldest entry goes when full
    pub fn push(&mut self, notice: Notice) {
        if self.queue.len() == self.capacity {
            self.queue.pop_front();
        }
        self.status = Some((notice.clone(), Instant::now()));
        self.queue.push_back(notice);
    }

    pub fn success(&mut self, title: impl Into<String>) {
        self.push(Notice::new(NoticeLevel::Success, title));
    }

    pub fn error(&mut self, title: impl Into<String>, description: impl Into<String>) {
        self.push(Notice::new(NoticeLevel::Error, title).with_description(description));
    }

    pub fn info(&mut self, title: impl Into<String>) {
        self.push(Notice::new(NoticeLevel::Info, title));
    }

    pub fn loading(&mut self, title: impl Into<String>) {
        self.push(Notice::new(NoticeLevel::Loading, title));
    }

    /// Take every queued notice, oldest first
    pub fn drain(&mut self) -> Vec<Notice> {
        self.queue.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Current status line. Loading lines stay until replaced.
    pub fn status(&self) -> Option<&Notice> {
        let (notice, since) = self.status.as_ref()?;
        if notice.level != NoticeLevel::Loading && since.elapsed() >= self.ttl {
            return None;
        }
        Some(notice)
    }

    pub fn clear_status(&mut self) {
        self.status = None;
    }
}
