// File: src/cache/chat_backlog.rs

use std::collections::VecDeque;

use parking_lot::Mutex;

use zeddybot_common::models::ChatEvent;

pub const DEFAULT_CHAT_BACKLOG: usize = 100;

/// The last few chat lines, oldest first, so a dashboard that has just
/// attached can show some history. Memory only; lost on restart.
pub struct ChatBacklog {
    lines: Mutex<VecDeque<ChatEvent>>,
    capacity: usize,
}

impl Default for ChatBacklog {
    fn default() -> Self {
        Self::new(DEFAULT_CHAT_BACKLOG)
    }
}

impl ChatBacklog {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            lines: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    /// Appends `event`, evicting the oldest line once full.
    pub fn push(&self, event: ChatEvent) {
        let mut lines = self.lines.lock();
        if lines.len() == self.capacity {
            lines.pop_front();
        }
        lines.push_back(event);
    }

    pub fn recent(&self) -> Vec<ChatEvent> {
        self.lines.lock().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lines.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
