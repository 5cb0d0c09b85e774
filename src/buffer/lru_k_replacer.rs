use std::collections::{HashMap, VecDeque};
use std::time::Instant;

use parking_lot::Mutex;

use crate::common::{FrameId, Timestamp};

/// Access history of a single tracked frame
#[derive(Debug)]
struct LruKNode {
    /// Up to k most recent access timestamps (most recent at back)
    history: VecDeque<Timestamp>,
    /// Whether this frame is currently evictable
    is_evictable: bool,
}

impl LruKNode {
    fn new(k: usize) -> Self {
        Self {
            history: VecDeque::with_capacity(k),
            is_evictable: false,
        }
    }

    fn record_access(&mut self, timestamp: Timestamp, k: usize) {
        if self.history.len() == k {
            self.history.pop_front();
        }
        self.history.push_back(timestamp);
    }

    /// Timestamp of the kth most recent access, or None (+inf distance) when
    /// fewer than k accesses are recorded.
    fn kth_timestamp(&self, k: usize) -> Option<Timestamp> {
        if self.history.len() < k {
            None
        } else {
            self.history.get(self.history.len() - k).copied()
        }
    }

    fn earliest_timestamp(&self) -> Timestamp {
        self.history.front().copied().unwrap_or(0)
    }
}

struct ReplacerState {
    nodes: HashMap<FrameId, LruKNode>,
    num_evictable: usize,
    last_timestamp: Timestamp,
}

/// LRU-K Replacement Policy
///
/// The LRU-K algorithm evicts a frame whose backward k-distance is the maximum
/// of all evictable frames. Backward k-distance is the time between now and the
/// kth most recent access. A frame with fewer than k recorded accesses has +inf
/// backward k-distance, so frames that have only been scanned once go before
/// frames with a full history.
///
/// Ties are broken deterministically: among +inf frames the one with the
/// earliest recorded access wins, among finite ones the earliest kth access
/// and then the lowest frame id.
pub struct LruKReplacer {
    /// K value for the LRU-K algorithm
    k: usize,
    /// Maximum number of frames the replacer can track
    max_frames: usize,
    /// Origin of the nanosecond clock
    epoch: Instant,
    state: Mutex<ReplacerState>,
}

impl LruKReplacer {
    /// Creates a new LRU-K replacer with the given k value and maximum frame count.
    /// A k of 0 is treated as 1.
    pub fn new(k: usize, max_frames: usize) -> Self {
        Self {
            k: k.max(1),
            max_frames,
            epoch: Instant::now(),
            state: Mutex::new(ReplacerState {
                nodes: HashMap::with_capacity(max_frames),
                num_evictable: 0,
                last_timestamp: 0,
            }),
        }
    }

    /// Evicts the evictable frame with the largest backward k-distance and
    /// stops tracking it. Returns None if there are no evictable frames.
    pub fn evict(&self) -> Option<FrameId> {
        let mut state = self.state.lock();
        let victim = self.pick_victim(&state)?;

        state.nodes.remove(&victim);
        state.num_evictable -= 1;
        Some(victim)
    }

    /// Returns the frame [`LruKReplacer::evict`] would choose, leaving it
    /// tracked and evictable.
    pub fn victim(&self) -> Option<FrameId> {
        let state = self.state.lock();
        self.pick_victim(&state)
    }

    fn pick_victim(&self, state: &ReplacerState) -> Option<FrameId> {
        if state.num_evictable == 0 {
            return None;
        }

        // All distances share the same "now", so the largest distance is the
        // smallest kth timestamp, with +inf frames ordered first.
        state
            .nodes
            .iter()
            .filter(|(_, node)| node.is_evictable)
            .min_by_key(|(frame_id, node)| match node.kth_timestamp(self.k) {
                None => (false, node.earliest_timestamp(), **frame_id),
                Some(ts) => (true, ts, **frame_id),
            })
            .map(|(frame_id, _)| *frame_id)
    }

    /// Records that the given frame was accessed now.
    /// This method should be called after a page is pinned in the BufferPoolManager.
    pub fn record_access(&self, frame_id: FrameId) {
        if frame_id.as_usize() >= self.max_frames {
            return;
        }

        let mut state = self.state.lock();
        let now = (self.epoch.elapsed().as_nanos() as Timestamp).max(state.last_timestamp + 1);
        state.last_timestamp = now;

        let k = self.k;
        state
            .nodes
            .entry(frame_id)
            .or_insert_with(|| LruKNode::new(k))
            .record_access(now, k);
    }

    /// Sets whether a frame is evictable. Frames that were never accessed are ignored.
    pub fn set_evictable(&self, frame_id: FrameId, is_evictable: bool) {
        let mut state = self.state.lock();
        let state = &mut *state;

        if let Some(node) = state.nodes.get_mut(&frame_id) {
            if node.is_evictable != is_evictable {
                if is_evictable {
                    state.num_evictable += 1;
                } else {
                    state.num_evictable -= 1;
                }
                node.is_evictable = is_evictable;
            }
        }
    }

    /// Forgets a frame's history entirely.
    /// This should be called when a page is deleted from the BufferPoolManager.
    pub fn remove(&self, frame_id: FrameId) {
        let mut state = self.state.lock();
        if let Some(node) = state.nodes.remove(&frame_id) {
            if node.is_evictable {
                state.num_evictable -= 1;
            }
        }
    }

    /// Returns the number of evictable frames.
    pub fn size(&self) -> usize {
        self.state.lock().num_evictable
    }

    /// Returns the k value of this replacer.
    pub fn k(&self) -> usize {
        self.k
    }
}
