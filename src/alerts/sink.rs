// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::broadcast;

use super::alert::Alert;

const SUBSCRIBER_CAPACITY: usize = 256;

/// Append-only, thread-safe alert collector. Cloning yields another handle
/// to the same collection.
#[derive(Debug, Clone)]
pub struct AlertSink {
    alerts: Arc<Mutex<Vec<Alert>>>,
    publisher: broadcast::Sender<Alert>,
}

impl Default for AlertSink {
    fn default() -> Self {
        Self::new()
    }
}

impl AlertSink {
    pub fn new() -> Self {
        let (publisher, _) = broadcast::channel(SUBSCRIBER_CAPACITY);
        Self {
            alerts: Arc::new(Mutex::new(Vec::new())),
            publisher,
        }
    }

    /// Receive every alert appended after this call
    pub fn subscribe(&self) -> broadcast::Receiver<Alert> {
        self.publisher.subscribe()
    }

    pub fn append(&self, alert: Alert) {
        // No receivers is fine
        let _ = self.publisher.send(alert.clone());
        self.alerts.lock().push(alert);
    }

    pub fn len(&self) -> usize {
        self.alerts.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.alerts.lock().is_empty()
    }

    /// Copy of the alerts raised so far, in append order
    pub fn snapshot(&self) -> Vec<Alert> {
        self.alerts.lock().clone()
    }

    /// Remove and return all alerts
    pub fn drain(&self) -> Vec<Alert> {
        std::mem::take(&mut *self.alerts.lock())
    }

    pub fn alerts_for_rule(&self, rule_id: i32) -> Vec<Alert> {
        self.alerts
            .lock()
            .iter()
            .filter(|a| a.rule_id == rule_id)
            .cloned()
            .collect()
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&*self.alerts.lock())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::AlertBuilder;
    use crate::types::{Confidence, Risk};

    fn alert(rule_id: i32, evidence: &str) -> Alert {
        AlertBuilder::new(rule_id)
            .name("test")
            .description("test")
            .risk(Risk::Low)
            .confidence(Confidence::Low)
            .evidence(evidence)
            .build()
            .unwrap()
    }

    #[test]
    fn test_identical_alerts_are_kept() {
        let sink = AlertSink::new();
        sink.append(alert(1, "same"));
        sink.append(alert(1, "same"));
        assert_eq!(sink.len(), 2);
        assert_eq!(sink.alerts_for_rule(1).len(), 2);
    }

    #[test]
    fn test_drain_empties_sink() {
        let sink = AlertSink::new();
        sink.append(alert(1, "a"));
        let drained = sink.drain();
        assert_eq!(drained.len(), 1);
        assert!(sink.is_empty());
    }

    #[test]
    fn test_concurrent_append() {
        let sink = AlertSink::new();
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let sink = sink.clone();
                std::thread::spawn(move || {
                    for _ in 0..50 {
                        sink.append(alert(i, "x"));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(sink.len(), 400);
    }

    #[tokio::test]
    async fn test_subscribers_receive_alerts() {
        let sink = AlertSink::new();
        let mut receiver = sink.subscribe();
        sink.append(alert(3, "published"));
        let received = receiver.recv().await.unwrap();
        assert_eq!(received.evidence, "published");
    }
}
