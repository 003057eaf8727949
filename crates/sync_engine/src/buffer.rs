//! Per-channel frame buffer in arrival order.
//!
//! Uses index-based separation:
//! - a `VecDeque` holds lightweight metadata (sequence + slab key) in arrival order
//! - a `Slab` holds the actual frames
//!
//! Pruning and consumption only shuffle metadata, never payloads.

use std::collections::VecDeque;
use std::fmt;

use contracts::{DropPolicy, Frame};
use slab::Slab;

/// Lightweight metadata stored in the arrival queue
#[derive(Debug, Clone, Copy)]
struct FrameMeta {
    sequence: u64,
    slab_key: usize,
}

/// Result of [`ChannelBuffer::push`]
#[derive(Debug)]
pub enum PushOutcome<P> {
    /// Frame stored
    Stored,
    /// Frame stored after evicting the oldest one (buffer was full)
    StoredEvicting(Frame<P>),
    /// Buffer full and the policy keeps what it has; frame handed back
    Rejected(Frame<P>),
}

/// Per-channel buffer with an optional depth cap
pub struct ChannelBuffer<P> {
    /// Arrival order
    index: VecDeque<FrameMeta>,
    /// Frame storage
    storage: Slab<Frame<P>>,
    max_depth: Option<usize>,
    evicted_count: u64,
    out_of_order_count: u64,
    last_sequence: Option<u64>,
    /// Set once an arrival goes backwards; cleared when the buffer drains
    unsorted: bool,
    saturated: bool,
}

impl<P> fmt::Debug for ChannelBuffer<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelBuffer")
            .field("len", &self.index.len())
            .field("max_depth", &self.max_depth)
            .field("evicted", &self.evicted_count)
            .field("saturated", &self.saturated)
            .finish()
    }
}

impl<P> ChannelBuffer<P> {
    #[inline]
    pub fn new(max_depth: Option<usize>) -> Self {
        let capacity = max_depth.unwrap_or(8);
        Self {
            index: VecDeque::with_capacity(capacity),
            storage: Slab::with_capacity(capacity),
            max_depth,
            evicted_count: 0,
            out_of_order_count: 0,
            last_sequence: None,
            unsorted: false,
            saturated: false,
        }
    }

    /// Append a frame in arrival order
    ///
    /// When the buffer is at its cap, `overflow` decides whether the oldest
    /// frame or the arriving one is discarded.
    pub fn push(&mut self, frame: Frame<P>, overflow: DropPolicy) -> PushOutcome<P> {
        let mut evicted = None;

        if self.is_full() {
            self.saturated = true;
            self.evicted_count += 1;
            match overflow {
                DropPolicy::DropNewest => return PushOutcome::Rejected(frame),
                DropPolicy::DropOldest => {
                    evicted = self.pop_front();
                }
            }
        }

        let sequence = frame.sequence;
        if let Some(last) = self.last_sequence {
            if sequence < last {
                self.out_of_order_count += 1;
                if !self.index.is_empty() {
                    self.unsorted = true;
                }
            }
        }
        self.last_sequence = Some(sequence);

        let slab_key = self.storage.insert(frame);
        self.index.push_back(FrameMeta { sequence, slab_key });

        match evicted {
            Some(frame) => PushOutcome::StoredEvicting(frame),
            None => PushOutcome::Stored,
        }
    }

    /// Arrival position of the first frame carrying `sequence`
    #[inline]
    pub fn position_of(&self, sequence: u64) -> Option<usize> {
        self.index.iter().position(|m| m.sequence == sequence)
    }

    #[inline]
    pub fn contains_sequence(&self, sequence: u64) -> bool {
        self.position_of(sequence).is_some()
    }

    /// Remove and return the frame at arrival position `position`
    pub fn take_at(&mut self, position: usize) -> Option<Frame<P>> {
        let meta = self.index.remove(position)?;
        let frame = self.storage.remove(meta.slab_key);
        self.on_removal();
        Some(frame)
    }

    /// Remove the first frame carrying `sequence`
    pub fn take_sequence(&mut self, sequence: u64) -> Option<Frame<P>> {
        let position = self.position_of(sequence)?;
        self.take_at(position)
    }

    /// Drop every frame with a sequence below `sequence`, returning how many
    ///
    /// Arrival order normally equals sequence order, so this pops from the
    /// front and stops at the first frame that is not stale. A buffer that has
    /// seen a backwards arrival is swept in full instead.
    pub fn prune_below(&mut self, sequence: u64) -> usize {
        let mut pruned = 0;

        while let Some(front) = self.index.front() {
            if front.sequence >= sequence {
                break;
            }
            if let Some(meta) = self.index.pop_front() {
                self.storage.remove(meta.slab_key);
                pruned += 1;
            }
        }

        if self.unsorted {
            let storage = &mut self.storage;
            self.index.retain(|m| {
                if m.sequence < sequence {
                    storage.remove(m.slab_key);
                    pruned += 1;
                    false
                } else {
                    true
                }
            });
        }

        if pruned > 0 {
            self.on_removal();
        }
        pruned
    }

    /// Drop everything
    pub fn clear(&mut self) -> usize {
        let dropped = self.index.len();
        self.index.clear();
        self.storage.clear();
        self.on_removal();
        dropped
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.index.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.max_depth
            .map(|max| self.index.len() >= max)
            .unwrap_or(false)
    }

    /// Whether the cap was hit since the buffer last had room
    #[inline]
    pub fn is_saturated(&self) -> bool {
        self.saturated
    }

    pub fn oldest_sequence(&self) -> Option<u64> {
        self.index.iter().map(|m| m.sequence).min()
    }

    pub fn newest_sequence(&self) -> Option<u64> {
        self.index.iter().map(|m| m.sequence).max()
    }

    /// Sequences in arrival order
    pub fn sequences(&self) -> impl Iterator<Item = u64> + '_ {
        self.index.iter().map(|m| m.sequence)
    }

    /// Frames dropped by the cap
    #[inline]
    pub fn evicted_count(&self) -> u64 {
        self.evicted_count
    }

    #[inline]
    pub fn out_of_order_count(&self) -> u64 {
        self.out_of_order_count
    }

    fn pop_front(&mut self) -> Option<Frame<P>> {
        let meta = self.index.pop_front()?;
        Some(self.storage.remove(meta.slab_key))
    }

    fn on_removal(&mut self) {
        if self.index.is_empty() {
            self.unsorted = false;
        }
        if !self.is_full() {
            self.saturated = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(sequence: u64) -> Frame<u64> {
        Frame::new("depth", sequence, sequence * 10)
    }

    fn filled(sequences: &[u64], max_depth: Option<usize>) -> ChannelBuffer<u64> {
        let mut buffer = ChannelBuffer::new(max_depth);
        for &s in sequences {
            buffer.push(frame(s), DropPolicy::DropOldest);
        }
        buffer
    }

    #[test]
    fn test_buffer_keeps_arrival_order() {
        let buffer = filled(&[3, 1, 2], None);
        assert_eq!(buffer.sequences().collect::<Vec<_>>(), vec![3, 1, 2]);
        assert_eq!(buffer.out_of_order_count(), 1);
    }

    #[test]
    fn test_take_sequence_uses_first_match() {
        let mut buffer = ChannelBuffer::new(None);
        buffer.push(Frame::new("depth", 5, "first"), DropPolicy::DropOldest);
        buffer.push(Frame::new("depth", 5, "second"), DropPolicy::DropOldest);

        let taken = buffer.take_sequence(5).unwrap();
        assert_eq!(taken.payload, "first");
        assert_eq!(buffer.len(), 1);
    }

    #[test]
    fn test_prune_below_stops_at_first_current_frame() {
        let mut buffer = filled(&[1, 2, 3, 4], None);
        assert_eq!(buffer.prune_below(3), 2);
        assert_eq!(buffer.sequences().collect::<Vec<_>>(), vec![3, 4]);
    }

    #[test]
    fn test_prune_below_sweeps_unsorted_buffer() {
        let mut buffer = filled(&[1, 5, 2, 6], None);
        assert_eq!(buffer.prune_below(5), 2);
        assert_eq!(buffer.sequences().collect::<Vec<_>>(), vec![5, 6]);
    }

    #[test]
    fn test_unbounded_buffer_never_evicts() {
        let buffer = filled(&(0..1000).collect::<Vec<_>>(), None);
        assert_eq!(buffer.len(), 1000);
        assert_eq!(buffer.evicted_count(), 0);
        assert!(!buffer.is_saturated());
    }

    #[test]
    fn test_cap_drop_oldest() {
        let mut buffer = filled(&[1, 2, 3], Some(3));
        match buffer.push(frame(4), DropPolicy::DropOldest) {
            PushOutcome::StoredEvicting(evicted) => assert_eq!(evicted.sequence, 1),
            other => panic!("expected eviction, got {other:?}"),
        }
        assert_eq!(buffer.sequences().collect::<Vec<_>>(), vec![2, 3, 4]);
        assert_eq!(buffer.evicted_count(), 1);
        assert!(buffer.is_saturated());
    }

    #[test]
    fn test_cap_drop_newest() {
        let mut buffer = filled(&[1, 2], Some(2));
        match buffer.push(frame(3), DropPolicy::DropNewest) {
            PushOutcome::Rejected(rejected) => assert_eq!(rejected.sequence, 3),
            other => panic!("expected rejection, got {other:?}"),
        }
        assert_eq!(buffer.sequences().collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn test_saturation_clears_when_room_returns() {
        let mut buffer = filled(&[1, 2, 3], Some(2));
        assert!(buffer.is_saturated());
        buffer.prune_below(3);
        assert!(!buffer.is_saturated());
    }

    #[test]
    fn test_clear() {
        let mut buffer = filled(&[4, 2], None);
        assert_eq!(buffer.clear(), 2);
        assert!(buffer.is_empty());
        assert_eq!(buffer.oldest_sequence(), None);
    }
}
