//! Per-scan live log channels.
//!
//! Each scan gets a named broadcast channel of text lines. Tool plugins
//! publish raw output lines and the executor publishes lifecycle
//! announcements; any number of subscribers may attach and receive lines
//! published after attachment. Delivery is best-effort and in order while a
//! subscriber is attached; there is no history replay.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use vantage_model::ScanId;

const LOG_CHANNEL_CAPACITY: usize = 512;

/// One published log line, tagged with the emitting tool when known.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogLine {
    pub sequence: u64,
    pub scan_id: ScanId,
    pub tool: Option<String>,
    pub line: String,
    pub published_at: DateTime<Utc>,
}

#[derive(Debug)]
struct Channel {
    tx: broadcast::Sender<LogLine>,
    sequence: AtomicU64,
}

impl Channel {
    fn new() -> Self {
        let (tx, _rx) = broadcast::channel(LOG_CHANNEL_CAPACITY);
        Self {
            tx,
            sequence: AtomicU64::new(0),
        }
    }
}

/// Registry of per-scan log channels, keyed by scan identifier.
#[derive(Debug, Clone, Default)]
pub struct LogBroker {
    channels: Arc<DashMap<ScanId, Arc<Channel>>>,
}

impl LogBroker {
    pub fn new() -> Self {
        Self::default()
    }

    fn channel(&self, scan_id: ScanId) -> Arc<Channel> {
        self.channels
            .entry(scan_id)
            .or_insert_with(|| Arc::new(Channel::new()))
            .clone()
    }

    /// Publish one line on the scan's channel. Lines published while no
    /// subscriber is attached are dropped.
    pub fn publish(&self, scan_id: ScanId, tool: Option<&str>, line: impl Into<String>) {
        let channel = self.channel(scan_id);
        let sequence = channel.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        let frame = LogLine {
            sequence,
            scan_id,
            tool: tool.map(str::to_string),
            line: line.into(),
            published_at: Utc::now(),
        };
        let _ = channel.tx.send(frame);
    }

    /// Attach a subscriber. Creates the channel if the scan has not started
    /// publishing yet, so early subscribers do not miss the first lines.
    pub fn subscribe(&self, scan_id: ScanId) -> broadcast::Receiver<LogLine> {
        self.channel(scan_id).tx.subscribe()
    }

    pub fn subscriber_count(&self, scan_id: ScanId) -> usize {
        self.channels
            .get(&scan_id)
            .map(|channel| channel.tx.receiver_count())
            .unwrap_or(0)
    }

    /// Drop the scan's channel; attached subscribers observe channel close.
    pub fn close(&self, scan_id: ScanId) {
        self.channels.remove(&scan_id);
    }
}
