use crate::error::{TransformError, TransformResult};
use crate::transform::Transform;
use crate::FrameIdString;
use cu29_clock::{CuTime, CuTimeRange};
use std::collections::VecDeque;

/// Default bound on the number of samples kept per frame.
pub const DEFAULT_MAX_CAPACITY: usize = 10_000;

/// One sample of the edge between a frame and its parent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeAndTransform {
    pub stamp: CuTime,
    pub transform: Transform,
}

/// A named reference frame and the time-ordered history of its pose in its parent.
///
/// Frames do not own their parent: the parent is an id resolved through the
/// [`crate::TransformTree`] that holds every frame, so walking the ancestors is
/// always a lookup in a closed id space.
#[derive(Debug, Clone)]
pub struct CoordinateFrame {
    id: FrameIdString,
    parent: Option<FrameIdString>,
    history: VecDeque<TimeAndTransform>,
    max_capacity: usize,
    overflowed: bool,
    evicted: usize,
}

impl CoordinateFrame {
    pub fn new(id: impl Into<FrameIdString>) -> Self {
        Self::with_capacity(id, DEFAULT_MAX_CAPACITY)
    }

    pub fn with_capacity(id: impl Into<FrameIdString>, max_capacity: usize) -> Self {
        Self {
            id: id.into(),
            parent: None,
            history: VecDeque::new(),
            max_capacity: max_capacity.max(1),
            overflowed: false,
            evicted: 0,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Name to show in the UI. The empty frame id is legal on the wire but invisible.
    pub fn display_name(&self) -> &str {
        if self.id.is_empty() {
            "<empty>"
        } else {
            &self.id
        }
    }

    pub fn parent_id(&self) -> Option<&str> {
        self.parent.as_deref()
    }

    pub(crate) fn set_parent(&mut self, parent: FrameIdString) {
        self.parent = Some(parent);
    }

    /// Insert a sample in timestamp order.
    ///
    /// A sample with the same stamp as an existing one replaces it. When the
    /// history grows past capacity the oldest samples are dropped.
    ///
    /// Returns `true` only for the insertion that first overflowed this history.
    pub fn add_transform(&mut self, stamp: CuTime, transform: Transform) -> bool {
        let sample = TimeAndTransform { stamp, transform };
        let pos = self.history.partition_point(|s| s.stamp < stamp);
        match self.history.get_mut(pos) {
            Some(existing) if existing.stamp == stamp => *existing = sample,
            _ => self.history.insert(pos, sample),
        }

        let mut dropped = 0;
        while self.history.len() > self.max_capacity {
            self.history.pop_front();
            dropped += 1;
        }
        if dropped == 0 {
            return false;
        }
        self.evicted += dropped;
        let first_overflow = !self.overflowed;
        self.overflowed = true;
        first_overflow
    }

    /// Remove the sample recorded at exactly `stamp`.
    pub fn remove_transform(&mut self, stamp: CuTime) -> bool {
        match self.history.binary_search_by(|s| s.stamp.cmp(&stamp)) {
            Ok(pos) => {
                self.history.remove(pos);
                true
            }
            Err(_) => false,
        }
    }

    /// Pose of this frame in its parent at `stamp`.
    ///
    /// Outside of the recorded range the closest edge sample is held, there is
    /// no extrapolation in either direction.
    pub fn find_closest_or_interpolate(&self, stamp: CuTime) -> TransformResult<Transform> {
        let (first, last) = match (self.history.front(), self.history.back()) {
            (Some(first), Some(last)) => (first, last),
            _ => return Err(TransformError::NoTransforms(self.id.to_string())),
        };

        if stamp <= first.stamp {
            return Ok(first.transform);
        }
        if stamp >= last.stamp {
            return Ok(last.transform);
        }

        // first.stamp < stamp < last.stamp so both neighbors exist
        let pos = self.history.partition_point(|s| s.stamp <= stamp);
        let before = &self.history[pos - 1];
        let after = &self.history[pos];
        if before.stamp == stamp {
            return Ok(before.transform);
        }

        let span = (after.stamp.0 - before.stamp.0) as f64;
        let ratio = (stamp.0 - before.stamp.0) as f64 / span;
        Ok(Transform::interpolate(
            &before.transform,
            &after.transform,
            ratio,
        ))
    }

    pub fn latest_transform(&self) -> Option<TimeAndTransform> {
        self.history.back().copied()
    }

    pub fn time_range(&self) -> Option<CuTimeRange> {
        match (self.history.front(), self.history.back()) {
            (Some(first), Some(last)) => Some(CuTimeRange {
                start: first.stamp,
                end: last.stamp,
            }),
            _ => None,
        }
    }

    /// Copies of the recorded samples, oldest first.
    pub fn history(&self) -> Vec<TimeAndTransform> {
        self.history.iter().copied().collect()
    }

    pub fn transforms_size(&self) -> usize {
        self.history.len()
    }

    pub fn max_capacity(&self) -> usize {
        self.max_capacity
    }

    /// Sticky: stays set once samples have been evicted.
    pub fn has_overflowed(&self) -> bool {
        self.overflowed
    }

    pub fn evicted_count(&self) -> usize {
        self.evicted
    }
}
