//! The evidence pool proper: verification gate, consensus-sourced ingress,
//! lifecycle management, and the query surface.

use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tessera_db_types::KvStore;
use tessera_evidence_types::{codec, ChainState, Evidence, ValidatorInfo};
use tessera_primitives::TimestampMs;
use tokio::sync::watch;
use tracing::{debug, error, info};

use crate::errors::{PoolError, PoolResult};
use crate::keys;
use crate::queue::{EvidenceQueue, EvidenceRef};
use crate::store::EvidenceStore;
use crate::traits::{BlockStore, EvidenceVerifier, StateStore};

/// State guarded by the pool mutex.
#[derive(Debug)]
struct PoolInner {
    /// Latest committed chain state; strictly advances with every
    /// [`EvidencePool::update`].
    state: ChainState,

    /// Evidence delivered by local consensus at the current height. Invisible
    /// to the proposer until the next update flushes it into pending, so that
    /// no peer is asked to validate evidence for a height it has not reached.
    consensus_buffer: Vec<Evidence>,

    /// Threshold past which the next expiry sweep can remove something.
    pruning_height: u64,
    pruning_time: TimestampMs,
}

/// The per-node evidence pool.
///
/// Keeps three views of the pending set in sync: the pending keyspace of the
/// KV engine, the broadcast queue served to gossip, and a size counter. All
/// public methods are callable concurrently; [`Self::update`] is expected to
/// be driven single-threaded by the consensus driver.
pub struct EvidencePool {
    store: EvidenceStore,
    block_store: Arc<dyn BlockStore>,
    verifier: Arc<dyn EvidenceVerifier>,
    inner: Mutex<PoolInner>,
    evidence_size: AtomicU32,
    queue: EvidenceQueue,
}

impl fmt::Debug for EvidencePool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EvidencePool")
            .field("size", &self.size())
            .finish_non_exhaustive()
    }
}

impl EvidencePool {
    /// Creates a pool over `db`, recovering any pending evidence a previous
    /// run left behind: expired entries are swept, the survivors are counted
    /// and pushed onto the broadcast queue oldest-first.
    pub fn new(
        db: Arc<dyn KvStore>,
        state_store: &dyn StateStore,
        block_store: Arc<dyn BlockStore>,
        verifier: Arc<dyn EvidenceVerifier>,
    ) -> PoolResult<Self> {
        let state = state_store
            .load()
            .map_err(|err| PoolError::InitState(err.to_string()))?;

        let pool = Self {
            store: EvidenceStore::new(db),
            block_store,
            verifier,
            inner: Mutex::new(PoolInner {
                state,
                consensus_buffer: Vec::new(),
                pruning_height: 0,
                pruning_time: 0,
            }),
            evidence_size: AtomicU32::new(0),
            queue: EvidenceQueue::new(),
        };

        // A crash may have left entries that expired while we were down.
        pool.remove_expired_pending_evidence()?;

        let mut count: u32 = 0;
        for item in pool.store.iter_pending()? {
            let (_, ev) = item?;
            pool.queue.push_back(ev);
            count += 1;
        }
        pool.evidence_size.store(count, Ordering::SeqCst);

        Ok(pool)
    }

    /// Gossip-path ingress: the single entry point for untrusted evidence.
    ///
    /// Idempotent: evidence that is already pending or already committed is
    /// accepted as a no-op (a lagging peer may resend either).
    pub fn add_evidence(&self, evidence: Evidence) -> PoolResult<()> {
        if self.is_pending(&evidence) {
            debug!(hash = %evidence.hash(), "evidence already pending; ignoring");
            return Ok(());
        }
        if self.is_committed(&evidence) {
            debug!(hash = %evidence.hash(), "evidence already committed; ignoring");
            return Ok(());
        }

        let state = self.state();
        self.verifier
            .verify(&evidence, &state, self.block_store.as_ref())
            .map_err(|err| PoolError::invalid(&evidence, err.reason))?;

        if !self.store.put_pending(&evidence)? {
            // lost the race against an identical delivery
            debug!(hash = %evidence.hash(), "evidence already pending; ignoring");
            return Ok(());
        }
        self.evidence_size.fetch_add(1, Ordering::SeqCst);

        info!(
            hash = %evidence.hash(),
            height = evidence.height(),
            kind = evidence.kind(),
            "verified new evidence of byzantine behavior"
        );
        self.queue.push_back(evidence);
        Ok(())
    }

    /// Consensus-path ingress: trusted, so no verification.
    ///
    /// The evidence references misbehavior at the current height; it is held
    /// in the consensus buffer and only becomes proposable after the next
    /// [`Self::update`], once every honest peer has reached a height from
    /// which it can verify it.
    pub fn add_evidence_from_consensus(&self, evidence: Evidence) -> PoolResult<()> {
        if self.is_pending(&evidence) {
            return Ok(());
        }

        let mut inner = self.inner.lock();
        if inner
            .consensus_buffer
            .iter()
            .any(|ev| ev.hash() == evidence.hash())
        {
            return Ok(());
        }
        info!(
            hash = %evidence.hash(),
            height = evidence.height(),
            "buffering evidence from consensus until the next height"
        );
        inner.consensus_buffer.push(evidence);
        Ok(())
    }

    /// Block-validation path: checks a block's evidence list.
    ///
    /// Returns [`PoolError::InvalidEvidence`] if any entry fails
    /// verification, was already committed, or appears twice in the list.
    /// Valid, previously-unseen entries are persisted to pending but not
    /// pushed onto the broadcast queue (they are about to be committed, not
    /// re-gossiped).
    pub fn check_evidence(&self, evidence_list: &[Evidence]) -> PoolResult<()> {
        let state = self.state();
        let mut seen = Vec::with_capacity(evidence_list.len());

        for ev in evidence_list {
            let hash = ev.hash();

            if !self.fast_check(ev) {
                if self.is_committed(ev) {
                    return Err(PoolError::invalid(ev, "evidence was already committed"));
                }

                self.verifier
                    .verify(ev, &state, self.block_store.as_ref())
                    .map_err(|err| PoolError::invalid(ev, err.reason))?;

                // Known-valid and about to be committed: a store failure here
                // must not fail the block.
                match self.store.put_pending(ev) {
                    Ok(fresh) => {
                        if fresh {
                            self.evidence_size.fetch_add(1, Ordering::SeqCst);
                        }
                    }
                    Err(err) => {
                        error!(%err, hash = %hash, "failed to persist checked evidence")
                    }
                }
            }

            if seen.contains(&hash) {
                return Err(PoolError::invalid(ev, "duplicate evidence"));
            }
            seen.push(hash);
        }

        Ok(())
    }

    /// Block-proposal path: pending evidence oldest-first, capped so the
    /// serialized list stays within `max_bytes` (`-1` for no cap). The entry
    /// that would cross the cap is excluded, never truncated.
    ///
    /// Returns the list and its total canonical size. Scan failures are
    /// logged and produce an empty list.
    pub fn pending_evidence(&self, max_bytes: i64) -> (Vec<Evidence>, i64) {
        match self.list_pending(max_bytes) {
            Ok(result) => result,
            Err(err) => {
                error!(%err, "failed to list pending evidence");
                (Vec::new(), 0)
            }
        }
    }

    /// Advances the pool to `new_state` after a block commit.
    ///
    /// Flushes the consensus buffer into pending, marks `committed` evidence
    /// as committed (dropping the pending copies), and runs at most one
    /// expiry sweep.
    ///
    /// # Panics
    ///
    /// Panics if `new_state.last_block_height` does not strictly increase;
    /// the consensus driver delivering heights out of order is a programming
    /// error.
    pub fn update(&self, new_state: ChainState, committed: &[Evidence]) {
        {
            let mut inner = self.inner.lock();
            assert!(
                new_state.last_block_height > inner.state.last_block_height,
                "evidence pool updated with non-monotonic height: {} -> {}",
                inner.state.last_block_height,
                new_state.last_block_height,
            );

            self.flush_consensus_buffer(&mut inner);
            inner.state = new_state.clone();
        }

        debug!(
            height = new_state.last_block_height,
            committed = committed.len(),
            "updating evidence pool"
        );

        if !committed.is_empty() {
            self.mark_evidence_as_committed(committed, new_state.last_block_height);
        }

        let sweep_due = {
            let inner = self.inner.lock();
            self.size() > 0
                && new_state.last_block_height > inner.pruning_height
                && new_state.last_block_time > inner.pruning_time
        };
        if sweep_due {
            match self.remove_expired_pending_evidence() {
                Ok(removed) => self.decrement_size(removed as u32),
                Err(err) => error!(%err, "failed to remove expired evidence"),
            }
        }
    }

    /// Number of pending evidence entries.
    pub fn size(&self) -> u32 {
        self.evidence_size.load(Ordering::SeqCst)
    }

    /// Snapshot of the chain state the pool last advanced to.
    pub fn state(&self) -> ChainState {
        self.inner.lock().state.clone()
    }

    /// Head of the broadcast queue, for gossip consumers.
    pub fn evidence_front(&self) -> Option<EvidenceRef> {
        self.queue.front()
    }

    /// The broadcast-queue element after `cursor`.
    pub fn evidence_next_after(&self, cursor: &EvidenceRef) -> Option<EvidenceRef> {
        self.queue.next_after(cursor)
    }

    /// Signal that reads `true` while the broadcast queue is non-empty.
    pub fn evidence_wait_signal(&self) -> watch::Receiver<bool> {
        self.queue.wait_signal()
    }

    /// Whether `evidence` sits in the pending keyspace. Store failures are
    /// logged and read as absent.
    pub fn is_pending(&self, evidence: &Evidence) -> bool {
        self.store.is_pending(evidence).unwrap_or_else(|err| {
            error!(%err, hash = %evidence.hash(), "failed to read pending keyspace");
            false
        })
    }

    /// Whether `evidence` has a committed record. Store failures are logged
    /// and read as absent.
    pub fn is_committed(&self, evidence: &Evidence) -> bool {
        self.store.is_committed(evidence).unwrap_or_else(|err| {
            error!(%err, hash = %evidence.hash(), "failed to read committed keyspace");
            false
        })
    }

    /// Moves buffered consensus evidence into pending. Called with the pool
    /// mutex held; per-item persistence failures are logged and the item is
    /// dropped (consensus re-delivers misbehavior it still observes).
    fn flush_consensus_buffer(&self, inner: &mut PoolInner) {
        for ev in std::mem::take(&mut inner.consensus_buffer) {
            match self.store.put_pending(&ev) {
                Ok(true) => {
                    self.evidence_size.fetch_add(1, Ordering::SeqCst);
                    self.queue.push_back(ev);
                }
                Ok(false) => {
                    // gossip delivered the same evidence while it sat in the
                    // buffer
                    debug!(hash = %ev.hash(), "buffered evidence already pending; skipping");
                }
                Err(err) => {
                    error!(%err, hash = %ev.hash(), "failed to flush buffered evidence; dropping")
                }
            }
        }
    }

    /// Marks each committed evidence: writes its committed record, removes it
    /// from the broadcast queue, and deletes the pending copy in one durable
    /// batch. The counter only drops after the batch lands.
    fn mark_evidence_as_committed(&self, committed: &[Evidence], commit_height: u64) {
        let mut delete_keys = Vec::new();
        let mut hashes = HashSet::new();

        for ev in committed {
            match self.store.is_pending(ev) {
                Ok(true) => {
                    delete_keys.push(keys::pending_key(ev.height(), &ev.hash()));
                    hashes.insert(ev.hash());
                }
                Ok(false) => {}
                Err(err) => error!(%err, hash = %ev.hash(), "failed to read pending keyspace"),
            }

            // Record the commit even if we never saw the evidence pending, so
            // late gossip of it is recognized as already committed.
            if let Err(err) = self.store.put_committed(ev, commit_height) {
                error!(%err, hash = %ev.hash(), "failed to write committed evidence record");
            }
        }

        self.queue.remove_hashes(&hashes);

        if delete_keys.is_empty() {
            return;
        }
        let removed = delete_keys.len() as u32;
        match self.store.delete_pending_batch(delete_keys) {
            Ok(()) => self.decrement_size(removed),
            Err(err) => {
                error!(%err, "failed to delete committed evidence from the pending keyspace")
            }
        }
    }

    /// Sweeps expired entries from the front of the pending keyspace and
    /// re-derives the pruning cursor. Returns how many entries were removed;
    /// the caller owns the counter adjustment (startup rebuilds the counter
    /// from a scan right after).
    fn remove_expired_pending_evidence(&self) -> PoolResult<usize> {
        let state = self.state();
        let params = state.evidence_params;

        let mut delete_keys = Vec::new();
        let mut hashes = HashSet::new();
        let mut next_sweep = None;

        for item in self.store.iter_pending()? {
            let (key, ev) = item?;
            if !is_expired(&ev, &state) {
                // Entries are height-ordered and block times advance with
                // height, so nothing further along is expired. The next sweep
                // becomes worthwhile once this entry crosses both age bounds.
                next_sweep = Some((
                    ev.height() + params.max_age_num_blocks + 1,
                    ev.time() + params.max_age_duration_ms + 1_000,
                ));
                break;
            }
            debug!(hash = %ev.hash(), height = ev.height(), "removing expired evidence");
            delete_keys.push(key);
            hashes.insert(ev.hash());
        }

        let (pruning_height, pruning_time) =
            next_sweep.unwrap_or((state.last_block_height, state.last_block_time));

        let removed = delete_keys.len();
        if removed > 0 {
            self.queue.remove_hashes(&hashes);
            self.store.delete_pending_batch(delete_keys)?;
        }

        let mut inner = self.inner.lock();
        inner.pruning_height = pruning_height;
        inner.pruning_time = pruning_time;
        Ok(removed)
    }

    /// Fast path for [`Self::check_evidence`]: for light-client attacks,
    /// accept a stored pending copy whose byzantine-validator list matches
    /// (order-insensitively); re-running the bisection is expensive. Other
    /// kinds fast-check iff already pending.
    fn fast_check(&self, evidence: &Evidence) -> bool {
        let Evidence::LightClientAttack(incoming) = evidence else {
            return self.is_pending(evidence);
        };

        let stored = match self.store.get_pending(evidence) {
            Ok(Some(Evidence::LightClientAttack(stored))) => stored,
            Ok(_) => return false,
            Err(err) => {
                error!(%err, hash = %evidence.hash(), "failed to load stored evidence");
                return false;
            }
        };

        byzantine_validators_match(
            &stored.byzantine_validators,
            &incoming.byzantine_validators,
        )
    }

    fn list_pending(&self, max_bytes: i64) -> PoolResult<(Vec<Evidence>, i64)> {
        let mut list = Vec::new();
        let mut total_size: i64 = 0;

        for item in self.store.iter_pending()? {
            let (_, ev) = item?;
            let size = codec::encoded_size(&ev) as i64;
            if max_bytes != -1 && total_size + size > max_bytes {
                break;
            }
            total_size += size;
            list.push(ev);
        }
        Ok((list, total_size))
    }

    /// Lowers the size counter by `removed`, clamping at zero. The counter
    /// and the store can only disagree after an I/O failure was already
    /// logged; wrapping would turn that into a corrupt size.
    fn decrement_size(&self, removed: u32) {
        if removed == 0 {
            return;
        }
        let prev = self
            .evidence_size
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| {
                Some(current.saturating_sub(removed))
            })
            .unwrap_or_else(|prev| prev);
        if prev < removed {
            error!(prev, removed, "evidence size counter underflow; clamping to zero");
        }
    }
}

/// Both age bounds must be exceeded for evidence to expire; either alone is
/// insufficient.
fn is_expired(evidence: &Evidence, state: &ChainState) -> bool {
    let params = &state.evidence_params;
    state.last_block_height > evidence.height() + params.max_age_num_blocks
        && state.last_block_time > evidence.time() + params.max_age_duration_ms
}

/// Compares two byzantine-validator lists after sorting by voting power
/// (address as tie-break, for determinism).
fn byzantine_validators_match(stored: &[ValidatorInfo], incoming: &[ValidatorInfo]) -> bool {
    if stored.len() != incoming.len() {
        return false;
    }
    let sorted = |vals: &[ValidatorInfo]| {
        let mut vals = vals.to_vec();
        vals.sort_by(|a, b| {
            a.voting_power
                .cmp(&b.voting_power)
                .then_with(|| a.address.cmp(&b.address))
        });
        vals
    };
    sorted(stored)
        .iter()
        .zip(sorted(incoming).iter())
        .all(|(a, b)| a.address == b.address && a.voting_power == b.voting_power)
}
