//! Change feed published by the store after every mutation
//!
//! Subscribers receive events over `std::sync::mpsc` channels. A subscriber
//! whose receiver has been dropped is removed on the next publish.

use std::sync::mpsc::{self, Receiver, Sender};

use serde::Serialize;

use crate::core::identity::EntityId;

/// Kind of row change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// A single row change
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangeEvent {
    pub table: &'static str,
    pub kind: ChangeKind,
    pub row_id: String,
    pub shop_id: Option<EntityId>,
}

impl ChangeEvent {
    pub fn new(table: &'static str, kind: ChangeKind, row_id: impl ToString) -> Self {
        Self {
            table,
            kind,
            row_id: row_id.to_string(),
            shop_id: None,
        }
    }

    pub fn in_shop(mut self, shop_id: &EntityId) -> Self {
        self.shop_id = Some(shop_id.clone());
        self
    }
}

struct Subscriber {
    tables: Option<Vec<&'static str>>,
    sender: Sender<ChangeEvent>,
}

impl Subscriber {
    fn wants(&self, event: &ChangeEvent) -> bool {
        self.tables
            .as_ref()
            .map_or(true, |tables| tables.contains(&event.table))
    }
}

/// Fan-out of change events to in-process subscribers
#[derive(Default)]
pub struct ChangeFeed {
    subscribers: Vec<Subscriber>,
}

impl ChangeFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Receive every event
    pub fn subscribe(&mut self) -> Receiver<ChangeEvent> {
        let (sender, receiver) = mpsc::channel();
        self.subscribers.push(Subscriber {
            tables: None,
            sender,
        });
        receiver
    }

    /// Receive only events touching the given tables
    pub fn subscribe_to(&mut self, tables: &[&'static str]) -> Receiver<ChangeEvent> {
        let (sender, receiver) = mpsc::channel();
        self.subscribers.push(Subscriber {
            tables: Some(tables.to_vec()),
            sender,
        });
        receiver
    }

    pub fn publish(&mut self, event: ChangeEvent) {
        tracing::trace!(table = event.table, kind = ?event.kind, row = %event.row_id, "change");
        self.subscribers
            .retain(|sub| !sub.wants(&event) || sub.sender.send(event.clone()).is_ok());
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

impl std::fmt::Debug for ChangeFeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeFeed")
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filtered_subscription() {
        let mut feed = ChangeFeed::new();
        let all = feed.subscribe();
        let notes = feed.subscribe_to(&["notifications"]);

        feed.publish(ChangeEvent::new("customers", ChangeKind::Insert, "CUST-1"));
        feed.publish(ChangeEvent::new("notifications", ChangeKind::Insert, "NTF-1"));

        assert_eq!(all.try_iter().count(), 2);
        let got: Vec<_> = notes.try_iter().collect();
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].row_id, "NTF-1");
    }

    #[test]
    fn test_dropped_receivers_are_pruned() {
        let mut feed = ChangeFeed::new();
        let rx = feed.subscribe();
        drop(rx);
        let _kept = feed.subscribe_to(&["parts"]);

        feed.publish(ChangeEvent::new("parts", ChangeKind::Update, "PART-1"));
        assert_eq!(feed.subscriber_count(), 1);
    }
}
