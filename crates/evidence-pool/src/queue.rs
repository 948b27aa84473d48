//! Broadcast queue: the in-memory, insertion-ordered view of pending
//! evidence consumed by the gossip layer.
//!
//! The queue is a doubly-linked list keyed by monotonically increasing node
//! ids. Consumers hold an [`EvidenceRef`] cursor and advance element by
//! element; producers and the lifecycle manager push and detach nodes without
//! ever invalidating a traversal (a detached cursor simply stops advancing).
//!
//! The non-empty signal is a watch channel whose value is `true` while the
//! queue holds at least one element. A waiter observing `false` wakes on the
//! next empty-to-non-empty transition; re-arming is the next transition.

use std::collections::{HashMap, HashSet};

use parking_lot::Mutex;
use tessera_evidence_types::Evidence;
use tessera_primitives::Buf32;
use tokio::sync::watch;

/// Cursor into the broadcast queue.
///
/// Carries a clone of the evidence it points at; the queue can drop the
/// underlying node at any time without invalidating the cursor itself.
#[derive(Clone, Debug)]
pub struct EvidenceRef {
    id: u64,
    evidence: Evidence,
}

impl EvidenceRef {
    pub fn evidence(&self) -> &Evidence {
        &self.evidence
    }
}

#[derive(Debug)]
struct Node {
    prev: Option<u64>,
    next: Option<u64>,
    evidence: Evidence,
}

#[derive(Debug, Default)]
struct QueueInner {
    nodes: HashMap<u64, Node>,
    head: Option<u64>,
    tail: Option<u64>,
    next_id: u64,
}

impl QueueInner {
    fn unlink(&mut self, id: u64) -> bool {
        let Some(node) = self.nodes.remove(&id) else {
            return false;
        };
        match node.prev {
            Some(prev) => {
                if let Some(prev_node) = self.nodes.get_mut(&prev) {
                    prev_node.next = node.next;
                }
            }
            None => self.head = node.next,
        }
        match node.next {
            Some(next) => {
                if let Some(next_node) = self.nodes.get_mut(&next) {
                    next_node.prev = node.prev;
                }
            }
            None => self.tail = node.prev,
        }
        true
    }
}

/// Concurrent ordered sequence of pending evidence.
#[derive(Debug)]
pub struct EvidenceQueue {
    inner: Mutex<QueueInner>,
    nonempty_tx: watch::Sender<bool>,
}

impl Default for EvidenceQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl EvidenceQueue {
    pub fn new() -> Self {
        let (nonempty_tx, _) = watch::channel(false);
        Self {
            inner: Mutex::new(QueueInner::default()),
            nonempty_tx,
        }
    }

    /// Appends evidence at the tail. O(1).
    pub(crate) fn push_back(&self, evidence: Evidence) {
        let was_empty = {
            let mut inner = self.inner.lock();
            let was_empty = inner.head.is_none();
            let id = inner.next_id;
            inner.next_id += 1;

            let prev = inner.tail;
            inner.nodes.insert(
                id,
                Node {
                    prev,
                    next: None,
                    evidence,
                },
            );
            if let Some(prev) = prev {
                if let Some(prev_node) = inner.nodes.get_mut(&prev) {
                    prev_node.next = Some(id);
                }
            }
            inner.tail = Some(id);
            if inner.head.is_none() {
                inner.head = Some(id);
            }
            was_empty
        };

        if was_empty {
            self.nonempty_tx.send_replace(true);
        }
    }

    /// The head element, or `None` when empty.
    pub fn front(&self) -> Option<EvidenceRef> {
        let inner = self.inner.lock();
        let id = inner.head?;
        let node = &inner.nodes[&id];
        Some(EvidenceRef {
            id,
            evidence: node.evidence.clone(),
        })
    }

    /// The element after `cursor`, or `None` at the tail or if the cursor's
    /// element has been removed (consumers restart from [`Self::front`]).
    pub fn next_after(&self, cursor: &EvidenceRef) -> Option<EvidenceRef> {
        let inner = self.inner.lock();
        let next = inner.nodes.get(&cursor.id)?.next?;
        let node = &inner.nodes[&next];
        Some(EvidenceRef {
            id: next,
            evidence: node.evidence.clone(),
        })
    }

    /// Detaches the element `cursor` points at, if still present. O(1).
    pub(crate) fn remove(&self, cursor: &EvidenceRef) {
        let emptied = {
            let mut inner = self.inner.lock();
            inner.unlink(cursor.id) && inner.head.is_none()
        };
        if emptied {
            self.nonempty_tx.send_replace(false);
        }
    }

    /// Detaches every element whose evidence hash is in `hashes`, in a single
    /// traversal. Returns the number removed.
    pub(crate) fn remove_hashes(&self, hashes: &HashSet<Buf32>) -> usize {
        if hashes.is_empty() {
            return 0;
        }
        let (removed, emptied) = {
            let mut inner = self.inner.lock();
            let mut to_remove = Vec::new();
            let mut cursor = inner.head;
            while let Some(id) = cursor {
                let node = &inner.nodes[&id];
                if hashes.contains(&node.evidence.hash()) {
                    to_remove.push(id);
                }
                cursor = node.next;
            }
            for id in &to_remove {
                inner.unlink(*id);
            }
            (to_remove.len(), inner.head.is_none())
        };
        if removed > 0 && emptied {
            self.nonempty_tx.send_replace(false);
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.inner.lock().nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().head.is_none()
    }

    /// Signal that reads `true` while the queue is non-empty. Subscribing is
    /// cheap; each gossip consumer holds its own receiver.
    pub fn wait_signal(&self) -> watch::Receiver<bool> {
        self.nonempty_tx.subscribe()
    }

    /// Snapshot of the queued evidence in order, for diagnostics and tests.
    pub fn snapshot(&self) -> Vec<Evidence> {
        let inner = self.inner.lock();
        let mut out = Vec::with_capacity(inner.nodes.len());
        let mut cursor = inner.head;
        while let Some(id) = cursor {
            let node = &inner.nodes[&id];
            out.push(node.evidence.clone());
            cursor = node.next;
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use tessera_evidence_types::{DuplicateVoteEvidence, Vote};
    use tessera_primitives::{Buf20, Buf32};

    use super::*;

    fn ev(seed: u8) -> Evidence {
        let vote = |s: u8| Vote {
            validator_address: Buf20::new([s; 20]),
            height: seed as u64,
            round: 0,
            block_hash: Buf32::new([s; 32]),
            timestamp: 0,
            signature: vec![s],
        };
        Evidence::DuplicateVote(DuplicateVoteEvidence {
            vote_a: vote(seed),
            vote_b: vote(seed.wrapping_add(1)),
            total_voting_power: 1,
            validator_power: 1,
            timestamp: 0,
        })
    }

    #[test]
    fn test_push_front_traverse() {
        let queue = EvidenceQueue::new();
        assert!(queue.front().is_none());

        queue.push_back(ev(1));
        queue.push_back(ev(2));
        queue.push_back(ev(3));

        let first = queue.front().unwrap();
        assert_eq!(first.evidence(), &ev(1));
        let second = queue.next_after(&first).unwrap();
        assert_eq!(second.evidence(), &ev(2));
        let third = queue.next_after(&second).unwrap();
        assert_eq!(third.evidence(), &ev(3));
        assert!(queue.next_after(&third).is_none());
    }

    #[test]
    fn test_remove_middle_keeps_links() {
        let queue = EvidenceQueue::new();
        queue.push_back(ev(1));
        queue.push_back(ev(2));
        queue.push_back(ev(3));

        let first = queue.front().unwrap();
        let second = queue.next_after(&first).unwrap();
        queue.remove(&second);

        assert_eq!(queue.len(), 2);
        assert_eq!(queue.snapshot(), vec![ev(1), ev(3)]);
        // a cursor to a removed node no longer advances
        assert!(queue.next_after(&second).is_none());
    }

    #[test]
    fn test_remove_hashes_single_traversal_semantics() {
        let queue = EvidenceQueue::new();
        for s in 1..=4 {
            queue.push_back(ev(s));
        }

        let hashes: HashSet<_> = [ev(1).hash(), ev(3).hash()].into_iter().collect();
        assert_eq!(queue.remove_hashes(&hashes), 2);
        assert_eq!(queue.snapshot(), vec![ev(2), ev(4)]);
    }

    #[test]
    fn test_wait_signal_transitions() {
        let queue = EvidenceQueue::new();
        let rx = queue.wait_signal();
        assert!(!*rx.borrow());

        queue.push_back(ev(1));
        assert!(*rx.borrow());

        let front = queue.front().unwrap();
        queue.remove(&front);
        assert!(!*rx.borrow());

        // re-arms on the next empty-to-non-empty transition
        queue.push_back(ev(2));
        assert!(*rx.borrow());
    }

    #[tokio::test]
    async fn test_wait_signal_wakes_waiter() {
        let queue = std::sync::Arc::new(EvidenceQueue::new());
        let mut rx = queue.wait_signal();

        let pusher = {
            let queue = queue.clone();
            tokio::task::spawn_blocking(move || queue.push_back(ev(9)))
        };

        rx.wait_for(|nonempty| *nonempty).await.unwrap();
        assert_eq!(queue.front().unwrap().evidence(), &ev(9));
        pusher.await.unwrap();
    }
}
