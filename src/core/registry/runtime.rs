//! Per-node runtime state shared between registry, scheduler, and proxy

use crate::core::models::Node;
use arc_swap::ArcSwap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Runtime view of one node
///
/// `node` is a lock-free snapshot republished by the registry on every
/// write; the counters are owned by the proxy.
#[derive(Debug)]
pub struct NodeRuntime {
    /// Latest persisted node state
    pub node: ArcSwap<Node>,
    /// Requests currently dispatched to this node
    in_flight: AtomicUsize,
    /// Most recently observed request latency in milliseconds
    recent_latency_ms: AtomicU64,
}

impl NodeRuntime {
    /// Wrap a node snapshot
    pub fn new(node: Node) -> Self {
        Self {
            node: ArcSwap::from_pointee(node),
            in_flight: AtomicUsize::new(0),
            recent_latency_ms: AtomicU64::new(0),
        }
    }

    /// Current snapshot
    pub fn snapshot(&self) -> Arc<Node> {
        self.node.load_full()
    }

    /// Requests currently in flight
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::Relaxed)
    }

    /// Last observed request latency in milliseconds (0 until first sample)
    pub fn recent_latency_ms(&self) -> u64 {
        self.recent_latency_ms.load(Ordering::Relaxed)
    }

    /// Record an observed request latency
    pub fn observe_latency(&self, latency_ms: u64) {
        self.recent_latency_ms.store(latency_ms, Ordering::Relaxed);
    }
}

/// Guard that holds one slot of a node's in-flight count
///
/// The count is incremented at dispatch and decremented when the guard
/// drops, so client aborts and panics can never leak it.
#[derive(Debug)]
pub struct InFlightGuard {
    runtime: Arc<NodeRuntime>,
}

impl InFlightGuard {
    /// Acquire a slot on the node
    pub fn acquire(runtime: Arc<NodeRuntime>) -> Self {
        runtime.in_flight.fetch_add(1, Ordering::Relaxed);
        Self { runtime }
    }

    /// The node runtime this guard counts against
    pub fn runtime(&self) -> &Arc<NodeRuntime> {
        &self.runtime
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.runtime.in_flight.fetch_sub(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::NodeStatus;
    use uuid::Uuid;

    fn node() -> Node {
        let mut n = Node::launching(
            Uuid::new_v4(),
            "fg-rt",
            Uuid::new_v4(),
            "aws",
            "us-east-1",
            "A100-80GB",
            "p4d.24xlarge",
            false,
            "llama-3-8b",
        );
        n.status = NodeStatus::Active;
        n
    }

    #[test]
    fn guard_releases_on_drop() {
        let runtime = Arc::new(NodeRuntime::new(node()));
        assert_eq!(runtime.in_flight(), 0);
        {
            let _a = InFlightGuard::acquire(runtime.clone());
            let _b = InFlightGuard::acquire(runtime.clone());
            assert_eq!(runtime.in_flight(), 2);
        }
        assert_eq!(runtime.in_flight(), 0);
    }

    #[test]
    fn guard_releases_on_panic() {
        let runtime = Arc::new(NodeRuntime::new(node()));
        let cloned = runtime.clone();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || {
            let _guard = InFlightGuard::acquire(cloned);
            panic!("request handler panicked");
        }));
        assert!(result.is_err());
        assert_eq!(runtime.in_flight(), 0);
    }
}
