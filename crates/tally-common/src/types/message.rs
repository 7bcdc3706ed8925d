//! Instrumentation event trees
//!
//! A [`MessageTree`] is what the transport delivers for one instrumented
//! request: a source domain plus a root [`Message`]. Transactions nest other
//! messages in document order; metrics are the leaves the analyzers aggregate.

use serde::{Deserialize, Serialize};

use crate::types::period::minute_of_hour;

/// One instrumented request tagged with the domain that produced it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageTree {
    /// Source domain (application name)
    pub domain: String,
    /// Root node
    pub message: Message,
}

impl MessageTree {
    pub fn new(domain: impl Into<String>, message: impl Into<Message>) -> Self {
        Self {
            domain: domain.into(),
            message: message.into(),
        }
    }
}

/// Polymorphic tree node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Message {
    /// Composite node carrying ordered children
    Transaction(Transaction),
    /// Leaf carrying a status-coded measurement payload
    Metric(Metric),
    /// Any other node kind (events, heartbeats, traces); never aggregated
    Other { kind: String },
}

impl Message {
    /// Child nodes in document order; empty for anything but a transaction
    pub fn children(&self) -> &[Message] {
        match self {
            Message::Transaction(t) => &t.children,
            Message::Metric(_) | Message::Other { .. } => &[],
        }
    }
}

impl From<Transaction> for Message {
    fn from(t: Transaction) -> Self {
        Message::Transaction(t)
    }
}

impl From<Metric> for Message {
    fn from(m: Metric) -> Self {
        Message::Metric(m)
    }
}

/// Composite node
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Transaction {
    /// Transaction type (e.g. "URL", "SQL")
    pub kind: String,
    /// Transaction name
    pub name: String,
    /// Children in document order
    #[serde(default)]
    pub children: Vec<Message>,
}

impl Transaction {
    pub fn new(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            name: name.into(),
            children: Vec::new(),
        }
    }

    /// Append a child node
    pub fn with_child(mut self, child: impl Into<Message>) -> Self {
        self.children.push(child.into());
        self
    }
}

/// Metric leaf
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Metric {
    /// Declared metric type; empty when the client did not set one
    #[serde(default)]
    pub kind: String,
    /// Metric name
    pub name: String,
    /// Status code selecting the payload encoding ("C", "T", "S", "S,C")
    pub status: String,
    /// Raw payload
    pub data: String,
    /// Event timestamp (Unix millis)
    pub timestamp: i64,
}

impl Metric {
    pub fn new(
        name: impl Into<String>,
        status: impl Into<String>,
        data: impl Into<String>,
        timestamp: i64,
    ) -> Self {
        Self {
            kind: String::new(),
            name: name.into(),
            status: status.into(),
            data: data.into(),
            timestamp,
        }
    }

    /// Set the declared metric type
    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = kind.into();
        self
    }

    /// Minute-of-hour bucket this metric falls into
    pub fn minute(&self) -> u8 {
        minute_of_hour(self.timestamp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_children_empty_for_leaves() {
        let metric: Message = Metric::new("latency", "T", "1.0", 0).into();
        assert!(metric.children().is_empty());

        let other = Message::Other {
            kind: "Heartbeat".into(),
        };
        assert!(other.children().is_empty());
    }

    #[test]
    fn test_transaction_children_in_order() {
        let t = Transaction::new("URL", "/checkout")
            .with_child(Metric::new("a", "C", "1", 0))
            .with_child(Metric::new("b", "C", "2", 0));
        let message: Message = t.into();

        let names: Vec<_> = message
            .children()
            .iter()
            .filter_map(|c| match c {
                Message::Metric(m) => Some(m.name.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn test_tree_json_shape() {
        let tree = MessageTree::new("orderSvc", Metric::new("latency", "T", "12.5", 60_000));
        let json = serde_json::to_string(&tree).unwrap();
        assert!(json.contains("\"type\":\"Metric\""));

        let back: MessageTree = serde_json::from_str(&json).unwrap();
        assert_eq!(back, tree);
    }
}
