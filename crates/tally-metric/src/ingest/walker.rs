//! Event tree walker
//!
//! Visits every node of a message tree once, in document order, handing
//! metric leaves to a [`MetricVisitor`]. Traversal uses an explicit stack so
//! deeply nested transactions cannot exhaust the thread stack.

use tally_common::{Message, Metric};

/// Receives metric leaves during a walk
pub trait MetricVisitor {
    fn visit_metric(&mut self, metric: &Metric);
}

impl<F> MetricVisitor for F
where
    F: FnMut(&Metric),
{
    fn visit_metric(&mut self, metric: &Metric) {
        self(metric)
    }
}

/// Node counts observed during one walk
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WalkStats {
    pub transactions: usize,
    pub metrics: usize,
    /// Nodes of unrecognized kind
    pub ignored: usize,
}

impl WalkStats {
    pub fn nodes(&self) -> usize {
        self.transactions + self.metrics + self.ignored
    }
}

/// Walk `root`, dispatching on node tag
pub fn walk<V>(root: &Message, visitor: &mut V) -> WalkStats
where
    V: MetricVisitor + ?Sized,
{
    let mut stats = WalkStats::default();
    let mut pending: Vec<&Message> = vec![root];

    while let Some(node) = pending.pop() {
        match node {
            Message::Transaction(_) => stats.transactions += 1,
            Message::Metric(metric) => {
                stats.metrics += 1;
                visitor.visit_metric(metric);
            }
            Message::Other { .. } => stats.ignored += 1,
        }
        // Reversed so the first child is popped next.
        pending.extend(node.children().iter().rev());
    }

    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_common::Transaction;

    fn metric(name: &str) -> Metric {
        Metric::new(name, "C", "1", 0)
    }

    #[test]
    fn test_single_metric_root() {
        let root: Message = metric("solo").into();
        let mut seen = Vec::new();
        let stats = walk(&root, &mut |m: &Metric| seen.push(m.name.clone()));

        assert_eq!(seen, vec!["solo"]);
        assert_eq!(stats.metrics, 1);
        assert_eq!(stats.nodes(), 1);
    }

    #[test]
    fn test_nested_document_order() {
        let root: Message = Transaction::new("URL", "/root")
            .with_child(metric("a"))
            .with_child(
                Transaction::new("SQL", "select")
                    .with_child(metric("b"))
                    .with_child(Message::Other {
                        kind: "Event".into(),
                    })
                    .with_child(metric("c")),
            )
            .with_child(metric("d"))
            .into();

        let mut seen = Vec::new();
        let stats = walk(&root, &mut |m: &Metric| seen.push(m.name.clone()));

        assert_eq!(seen, vec!["a", "b", "c", "d"]);
        assert_eq!(
            stats,
            WalkStats {
                transactions: 2,
                metrics: 4,
                ignored: 1,
            }
        );
    }

    #[test]
    fn test_other_root_visits_nothing() {
        let root = Message::Other {
            kind: "Heartbeat".into(),
        };
        let mut count = 0;
        let stats = walk(&root, &mut |_: &Metric| count += 1);
        assert_eq!(count, 0);
        assert_eq!(stats.ignored, 1);
    }

    #[test]
    fn test_deep_nesting() {
        let mut node: Message = metric("leaf").into();
        for i in 0..10_000 {
            node = Transaction::new("Deep", i.to_string()).with_child(node).into();
        }

        let mut count = 0;
        let stats = walk(&node, &mut |_: &Metric| count += 1);
        assert_eq!(count, 1);
        assert_eq!(stats.transactions, 10_000);

        // Iterative teardown; the derived Drop would recurse 10k frames deep.
        let mut pending = vec![node];
        while let Some(n) = pending.pop() {
            if let Message::Transaction(t) = n {
                pending.extend(t.children);
            }
        }
    }
}
