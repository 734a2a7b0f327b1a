//! The single-shot demand queue
//!
//! Requests accumulate between cycles in submission order. The clearing
//! cycle drains the queue wholesale, so unsatisfied demand from period `p`
//! never reappears in period `p + 1` unless resubmitted. In a concurrent
//! host, submissions must buffer into a queue like this one and only swap in
//! at a cycle boundary, never mid-cycle.

use agora_core::DemandRequest;
use serde::{Deserialize, Serialize};

/// Pinned and floating requests awaiting the next clearing cycle
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DemandQueue {
    pinned: Vec<DemandRequest>,
    floating: Vec<DemandRequest>,
}

impl DemandQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_pinned(&mut self, request: DemandRequest) {
        self.pinned.push(request);
    }

    pub fn push_floating(&mut self, request: DemandRequest) {
        self.floating.push(request);
    }

    pub fn pinned(&self) -> &[DemandRequest] {
        &self.pinned
    }

    pub fn floating(&self) -> &[DemandRequest] {
        &self.floating
    }

    pub fn len(&self) -> usize {
        self.pinned.len() + self.floating.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pinned.is_empty() && self.floating.is_empty()
    }

    /// Remove and return all queued requests, leaving the queue empty
    pub fn drain(&mut self) -> (Vec<DemandRequest>, Vec<DemandRequest>) {
        (
            std::mem::take(&mut self.pinned),
            std::mem::take(&mut self.floating),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agora_core::{ClusterId, ShapeId, TeamId};

    fn request(id: u64, pinned: bool) -> DemandRequest {
        DemandRequest {
            id,
            team_id: TeamId::new("t1"),
            shape_id: ShapeId::new("inference"),
            quantity: 1,
            target_cluster: pinned.then(|| ClusterId::new("c1")),
        }
    }

    #[test]
    fn test_drain_preserves_submission_order() {
        let mut queue = DemandQueue::new();
        queue.push_pinned(request(1, true));
        queue.push_floating(request(2, false));
        queue.push_pinned(request(3, true));

        let (pinned, floating) = queue.drain();
        assert_eq!(pinned.iter().map(|r| r.id).collect::<Vec<_>>(), vec![1, 3]);
        assert_eq!(floating.iter().map(|r| r.id).collect::<Vec<_>>(), vec![2]);
    }

    #[test]
    fn test_drain_is_single_shot() {
        let mut queue = DemandQueue::new();
        queue.push_floating(request(1, false));

        let _ = queue.drain();
        assert!(queue.is_empty());

        let (pinned, floating) = queue.drain();
        assert!(pinned.is_empty());
        assert!(floating.is_empty());
    }
}
