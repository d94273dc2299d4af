use crate::error::{TransformError, TransformResult};
use crate::frame::{CoordinateFrame, DEFAULT_MAX_CAPACITY};
use crate::transform::Transform;
use crate::FrameIdString;
use cu29_clock::CuTime;
use log::{debug, warn};
use std::collections::{BTreeMap, BTreeSet};

/// Outcome of [`TransformTree::add_transform`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddTransformResult {
    /// The child got linked to this parent (first link or re-parent).
    Created,
    /// The link already existed, only the history grew.
    Updated,
    /// The link would close a loop. Nothing was changed, the sample was dropped.
    CycleDetected,
}

/// Change notifications fired by the tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TreeEvent {
    FrameAdded(FrameIdString),
    Relinked {
        child: FrameIdString,
        parent: FrameIdString,
    },
    Cleared,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(usize);

type TreeListener = Box<dyn FnMut(&TreeEvent)>;

/// A row of the frame selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameListEntry {
    pub id: FrameIdString,
    /// Display name indented two spaces per level below its root.
    pub display_name: String,
    pub depth: usize,
}

/// Registry of every known coordinate frame.
///
/// The parent links always form a forest: a sample that would close a loop is
/// rejected before anything is mutated.
pub struct TransformTree {
    frames: BTreeMap<FrameIdString, CoordinateFrame>,
    max_capacity: usize,
    listeners: Vec<(ListenerId, TreeListener)>,
    next_listener: usize,
}

impl TransformTree {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MAX_CAPACITY)
    }

    /// `max_capacity` bounds the history of every frame created by this tree.
    pub fn with_capacity(max_capacity: usize) -> Self {
        Self {
            frames: BTreeMap::new(),
            max_capacity,
            listeners: Vec::new(),
            next_listener: 0,
        }
    }

    pub fn subscribe(&mut self, listener: impl FnMut(&TreeEvent) + 'static) -> ListenerId {
        let id = ListenerId(self.next_listener);
        self.next_listener += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(listener_id, _)| *listener_id != id);
        self.listeners.len() != before
    }

    fn emit(&mut self, event: TreeEvent) {
        for (_, listener) in self.listeners.iter_mut() {
            listener(&event);
        }
    }

    /// Returns true if the frame did not exist yet.
    fn ensure_frame(&mut self, id: &str) -> bool {
        if self.frames.contains_key(id) {
            return false;
        }
        let frame_id = FrameIdString::from(id);
        self.frames.insert(
            frame_id.clone(),
            CoordinateFrame::with_capacity(frame_id.clone(), self.max_capacity),
        );
        debug!("Added coordinate frame \"{id}\"");
        self.emit(TreeEvent::FrameAdded(frame_id));
        true
    }

    pub fn get_or_create_frame(&mut self, id: &str) -> &CoordinateFrame {
        self.ensure_frame(id);
        &self.frames[id]
    }

    pub fn has_frame(&self, id: &str) -> bool {
        self.frames.contains_key(id)
    }

    pub fn frame(&self, id: &str) -> Option<&CoordinateFrame> {
        self.frames.get(id)
    }

    /// Every frame, keyed and iterated by id.
    pub fn frames(&self) -> &BTreeMap<FrameIdString, CoordinateFrame> {
        &self.frames
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn max_capacity(&self) -> usize {
        self.max_capacity
    }

    /// Record the pose of `child_id` in `parent_id` at `stamp`.
    pub fn add_transform(
        &mut self,
        child_id: &str,
        parent_id: &str,
        stamp: CuTime,
        transform: Transform,
    ) -> AddTransformResult {
        if self.would_create_cycle(child_id, parent_id) {
            warn!("Dropping transform {parent_id} -> {child_id}, it would close a cycle");
            return AddTransformResult::CycleDetected;
        }

        self.ensure_frame(parent_id);
        self.ensure_frame(child_id);

        let Some(child) = self.frames.get_mut(child_id) else {
            return AddTransformResult::CycleDetected;
        };
        let relinked = child.parent_id() != Some(parent_id);
        if relinked {
            if let Some(previous) = child.parent_id() {
                debug!("Re-parenting \"{child_id}\" from \"{previous}\" to \"{parent_id}\"");
            }
            child.set_parent(FrameIdString::from(parent_id));
        }
        if child.add_transform(stamp, transform) {
            let capacity = child.max_capacity();
            warn!("History of \"{child_id}\" is full ({capacity}), dropping the oldest samples");
        }

        if relinked {
            self.emit(TreeEvent::Relinked {
                child: FrameIdString::from(child_id),
                parent: FrameIdString::from(parent_id),
            });
            AddTransformResult::Created
        } else {
            AddTransformResult::Updated
        }
    }

    /// Remove one historical sample. The frames and their link are kept.
    pub fn remove_transform(&mut self, child_id: &str, parent_id: &str, stamp: CuTime) -> bool {
        match self.frames.get_mut(child_id) {
            Some(child) if child.parent_id() == Some(parent_id) => child.remove_transform(stamp),
            _ => false,
        }
    }

    /// Drop every frame and its history.
    pub fn clear(&mut self) {
        self.frames.clear();
        self.emit(TreeEvent::Cleared);
    }

    fn would_create_cycle(&self, child_id: &str, parent_id: &str) -> bool {
        if child_id == parent_id {
            return true;
        }
        // a frame that does not exist yet cannot be part of a loop
        let Some(child) = self.frames.get(child_id) else {
            return false;
        };
        if !self.frames.contains_key(parent_id) || child.parent_id() == Some(parent_id) {
            return false;
        }
        self.is_ancestor(child_id, parent_id)
    }

    /// Walk the parents of `id`, bounded by the number of frames.
    fn walk_up(&self, id: &str) -> TransformResult<Vec<&CoordinateFrame>> {
        let mut current = self
            .frames
            .get(id)
            .ok_or_else(|| TransformError::FrameNotFound(id.to_string()))?;
        let mut chain = vec![current];
        while let Some(parent_id) = current.parent_id() {
            if chain.len() > self.frames.len() {
                return Err(TransformError::CycleDetected(id.to_string()));
            }
            current = self
                .frames
                .get(parent_id)
                .ok_or_else(|| TransformError::FrameNotFound(parent_id.to_string()))?;
            chain.push(current);
        }
        Ok(chain)
    }

    /// True if `ancestor_id` is a strict ancestor of `id`.
    ///
    /// A corrupted parent chain reports `true` so callers refuse to build on it.
    pub fn is_ancestor(&self, ancestor_id: &str, id: &str) -> bool {
        match self.walk_up(id) {
            Ok(chain) => chain.iter().skip(1).any(|f| f.id() == ancestor_id),
            Err(TransformError::CycleDetected(_)) => true,
            Err(_) => false,
        }
    }

    /// Ancestors of `id`, closest first, without `id` itself.
    pub fn ancestors(&self, id: &str) -> TransformResult<Vec<&CoordinateFrame>> {
        let mut chain = self.walk_up(id)?;
        chain.remove(0);
        Ok(chain)
    }

    pub fn root(&self, id: &str) -> TransformResult<&CoordinateFrame> {
        let chain = self.walk_up(id)?;
        chain
            .last()
            .copied()
            .ok_or_else(|| TransformError::FrameNotFound(id.to_string()))
    }

    /// Number of links between `id` and its root.
    pub fn frame_depth(&self, id: &str) -> TransformResult<usize> {
        Ok(self.walk_up(id)?.len() - 1)
    }

    /// Depth first listing for the frame selector: roots then their
    /// descendants, siblings ordered by id.
    ///
    /// The order is pre-order, so each frame comes right after its parent. It
    /// is not sorted by depth first: a deep frame of one root is listed before
    /// the next root.
    pub fn frame_list(&self) -> Vec<FrameListEntry> {
        let mut children: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        let mut roots = Vec::new();
        for frame in self.frames.values() {
            match frame.parent_id() {
                Some(parent) if self.frames.contains_key(parent) => {
                    children.entry(parent).or_default().push(frame.id())
                }
                _ => roots.push(frame.id()),
            }
        }

        let mut visited = BTreeSet::new();
        let mut list = Vec::with_capacity(self.frames.len());
        // frames on a corrupted loop have no root, they are listed last at depth 0
        let starts = roots
            .into_iter()
            .chain(self.frames.keys().map(|id| id.as_str()));
        for start in starts {
            let mut stack = vec![(start, 0)];
            while let Some((id, depth)) = stack.pop() {
                if !visited.insert(id) {
                    continue;
                }
                let display = self.frames[id].display_name();
                list.push(FrameListEntry {
                    id: FrameIdString::from(id),
                    display_name: format!("{}{display}", "  ".repeat(depth)),
                    depth,
                });
                if let Some(kids) = children.get(id) {
                    stack.extend(kids.iter().rev().map(|kid| (*kid, depth + 1)));
                }
            }
        }
        list
    }

    /// Compose the edges of `chain` (a frame followed by its ancestors, stopping
    /// before the frame the pose is expressed in).
    fn pose_along(chain: &[&CoordinateFrame], time: CuTime) -> TransformResult<Transform> {
        let mut pose = Transform::IDENTITY;
        for frame in chain {
            pose = frame.find_closest_or_interpolate(time)? * pose;
        }
        Ok(pose)
    }

    /// Transform that maps coordinates in `child_id` into `frame_id` at `time`.
    ///
    /// Only the edges below the lowest common ancestor are sampled.
    pub fn apply(
        &self,
        child_id: &str,
        frame_id: &str,
        time: CuTime,
    ) -> TransformResult<Transform> {
        if !self.has_frame(child_id) {
            return Err(TransformError::FrameNotFound(child_id.to_string()));
        }
        if !self.has_frame(frame_id) {
            return Err(TransformError::FrameNotFound(frame_id.to_string()));
        }
        if child_id == frame_id {
            return Ok(Transform::IDENTITY);
        }

        let child_chain = self.walk_up(child_id)?;
        let target_chain = self.walk_up(frame_id)?;
        let child_root = child_chain.last().map(|f| f.id());
        let target_root = target_chain.last().map(|f| f.id());
        if child_root != target_root {
            return Err(TransformError::DisconnectedFrames {
                from: child_id.to_string(),
                to: frame_id.to_string(),
            });
        }

        // both chains end on the same root so a common frame always exists
        let (child_depth, target_depth) = child_chain
            .iter()
            .enumerate()
            .find_map(|(i, frame)| {
                target_chain
                    .iter()
                    .position(|other| other.id() == frame.id())
                    .map(|j| (i, j))
            })
            .ok_or_else(|| TransformError::DisconnectedFrames {
                from: child_id.to_string(),
                to: frame_id.to_string(),
            })?;

        let ancestor_from_child = Self::pose_along(&child_chain[..child_depth], time)?;
        let ancestor_from_target = Self::pose_along(&target_chain[..target_depth], time)?;
        Ok(ancestor_from_target.inverse() * ancestor_from_child)
    }

    /// Resolve `child_id` at `src_time` into `frame_id` at `dst_time`, going
    /// through `fixed_id` which is assumed not to move between the two times.
    pub fn apply_with_time_travel(
        &self,
        child_id: &str,
        src_time: CuTime,
        frame_id: &str,
        dst_time: CuTime,
        fixed_id: &str,
    ) -> TransformResult<Transform> {
        let fixed_from_child = self.apply(child_id, fixed_id, src_time)?;
        let target_from_fixed = self.apply(fixed_id, frame_id, dst_time)?;
        Ok(target_from_fixed * fixed_from_child)
    }
}

impl Default for TransformTree {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{assert_translation, rotation_z, translation};
    use cu29_clock::CuDuration;
    use std::cell::RefCell;
    use std::f64::consts::FRAC_PI_2;
    use std::rc::Rc;

    fn chain_tree() -> TransformTree {
        let mut tree = TransformTree::new();
        tree.add_transform("odom", "map", CuDuration(0), translation(1.0, 0.0, 0.0));
        tree.add_transform(
            "base_link",
            "odom",
            CuDuration(0),
            translation(0.0, 2.0, 0.0),
        );
        tree.add_transform(
            "laser",
            "base_link",
            CuDuration(0),
            translation(0.0, 0.0, 3.0),
        );
        tree
    }

    #[test]
    fn test_add_transform_results() {
        let mut tree = TransformTree::new();
        let first = tree.add_transform("robot", "world", CuDuration(1000), Transform::IDENTITY);
        assert_eq!(first, AddTransformResult::Created);
        let second = tree.add_transform("robot", "world", CuDuration(2000), Transform::IDENTITY);
        assert_eq!(second, AddTransformResult::Updated);
        assert_eq!(tree.len(), 2);
        assert_eq!(tree.frame("robot").unwrap().parent_id(), Some("world"));
        assert_eq!(tree.frame("world").unwrap().parent_id(), None);
    }

    #[test]
    fn test_cyclic_transforms() {
        let mut tree = TransformTree::new();
        tree.add_transform("robot", "world", CuDuration(1000), Transform::IDENTITY);
        tree.add_transform("sensor", "robot", CuDuration(1000), Transform::IDENTITY);

        let result = tree.add_transform("world", "sensor", CuDuration(1000), Transform::IDENTITY);
        assert_eq!(result, AddTransformResult::CycleDetected);
        assert_eq!(tree.frame("world").unwrap().parent_id(), None);
        assert_eq!(tree.frame("world").unwrap().transforms_size(), 0);
    }

    #[test]
    fn test_self_loop_is_rejected_without_creating_frame() {
        let mut tree = TransformTree::new();
        let result = tree.add_transform("a", "a", CuDuration(0), Transform::IDENTITY);
        assert_eq!(result, AddTransformResult::CycleDetected);
        assert!(tree.is_empty());
    }

    #[test]
    fn test_reparent_keeps_history() {
        let mut tree = TransformTree::new();
        tree.add_transform(
            "base_link",
            "odom",
            CuDuration(0),
            translation(1.0, 0.0, 0.0),
        );
        let result = tree.add_transform(
            "base_link",
            "map",
            CuDuration(10),
            translation(2.0, 0.0, 0.0),
        );
        assert_eq!(result, AddTransformResult::Created);
        let frame = tree.frame("base_link").unwrap();
        assert_eq!(frame.parent_id(), Some("map"));
        assert_eq!(frame.transforms_size(), 2);
    }

    #[test]
    fn test_root_and_ancestors() {
        let tree = chain_tree();
        assert_eq!(tree.root("laser").unwrap().id(), "map");
        assert_eq!(tree.root("map").unwrap().id(), "map");
        let ancestors = tree.ancestors("laser").unwrap();
        let ids: Vec<&str> = ancestors.iter().map(|f| f.id()).collect();
        assert_eq!(ids, vec!["base_link", "odom", "map"]);
        assert_eq!(tree.frame_depth("laser").unwrap(), 3);
        assert!(tree.is_ancestor("odom", "laser"));
        assert!(!tree.is_ancestor("laser", "odom"));
        assert!(matches!(
            tree.root("nope"),
            Err(TransformError::FrameNotFound(_))
        ));
    }

    #[test]
    fn test_apply_composes_chain() {
        let tree = chain_tree();
        let tf = tree.apply("laser", "map", CuDuration(0)).unwrap();
        assert_translation(&tf, [1.0, 2.0, 3.0]);
        let inverse = tree.apply("map", "laser", CuDuration(0)).unwrap();
        assert_translation(&inverse, [-1.0, -2.0, -3.0]);
        let sibling = tree.apply("laser", "odom", CuDuration(0)).unwrap();
        assert_translation(&sibling, [0.0, 2.0, 3.0]);
    }

    #[test]
    fn test_apply_with_rotation() {
        let mut tree = TransformTree::new();
        let rotated = translation(1.0, 0.0, 0.0) * rotation_z(FRAC_PI_2);
        tree.add_transform("base", "world", CuDuration(0), rotated);
        tree.add_transform("arm", "base", CuDuration(0), translation(2.0, 0.0, 0.0));
        let tf = tree.apply("arm", "world", CuDuration(0)).unwrap();
        assert_translation(&tf, [1.0, 2.0, 0.0]);
    }

    #[test]
    fn test_apply_stops_at_common_ancestor() {
        let mut tree = chain_tree();
        tree.add_transform(
            "camera",
            "base_link",
            CuDuration(0),
            translation(0.0, 1.0, 3.0),
        );
        // the odom -> map edge loses its only sample
        assert!(tree.remove_transform("odom", "map", CuDuration(0)));

        let tf = tree.apply("camera", "laser", CuDuration(0)).unwrap();
        assert_translation(&tf, [0.0, 1.0, 0.0]);
        let tf = tree.apply("laser", "base_link", CuDuration(0)).unwrap();
        assert_translation(&tf, [0.0, 0.0, 3.0]);
        let tf = tree.apply("laser", "odom", CuDuration(0)).unwrap();
        assert_translation(&tf, [0.0, 2.0, 3.0]);

        // going through the emptied edge still reports it
        assert!(matches!(
            tree.apply("laser", "map", CuDuration(0)),
            Err(TransformError::NoTransforms(id)) if id == "odom"
        ));
    }

    #[test]
    fn test_disconnected_is_reported_before_missing_samples() {
        let mut tree = TransformTree::new();
        tree.add_transform("a", "root_a", CuDuration(0), Transform::IDENTITY);
        tree.add_transform("b", "root_b", CuDuration(0), Transform::IDENTITY);
        tree.remove_transform("a", "root_a", CuDuration(0));
        assert!(matches!(
            tree.apply("a", "b", CuDuration(0)),
            Err(TransformError::DisconnectedFrames { .. })
        ));
    }

    #[test]
    fn test_corrupted_parent_chain_terminates() {
        let mut tree = TransformTree::new();
        tree.add_transform("a", "b", CuDuration(0), Transform::IDENTITY);
        tree.get_or_create_frame("c");
        // only reachable by bypassing add_transform
        tree.frames.get_mut("b").unwrap().set_parent("a".into());

        assert!(matches!(
            tree.root("a"),
            Err(TransformError::CycleDetected(id)) if id == "a"
        ));
        assert!(matches!(
            tree.ancestors("b"),
            Err(TransformError::CycleDetected(_))
        ));
        assert!(matches!(
            tree.frame_depth("a"),
            Err(TransformError::CycleDetected(_))
        ));
        assert!(tree.is_ancestor("c", "a"));
        assert!(matches!(
            tree.apply("a", "b", CuDuration(0)),
            Err(TransformError::CycleDetected(_))
        ));

        let list = tree.frame_list();
        let ids: Vec<&str> = list.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a", "b"]);

        // nothing gets linked under a corrupted chain
        assert_eq!(
            tree.add_transform("c", "a", CuDuration(0), Transform::IDENTITY),
            AddTransformResult::CycleDetected
        );
        assert_eq!(tree.frame("c").unwrap().parent_id(), None);
    }

    #[test]
    fn test_apply_errors() {
        let mut tree = TransformTree::new();
        tree.add_transform("a", "root_a", CuDuration(0), Transform::IDENTITY);
        tree.add_transform("b", "root_b", CuDuration(0), Transform::IDENTITY);

        assert!(matches!(
            tree.apply("a", "b", CuDuration(0)),
            Err(TransformError::DisconnectedFrames { .. })
        ));
        assert!(matches!(
            tree.apply("a", "ghost", CuDuration(0)),
            Err(TransformError::FrameNotFound(id)) if id == "ghost"
        ));

        tree.get_or_create_frame("c");
        assert!(tree.remove_transform("a", "root_a", CuDuration(0)));
        assert!(matches!(
            tree.apply("a", "root_a", CuDuration(0)),
            Err(TransformError::NoTransforms(id)) if id == "a"
        ));
    }

    #[test]
    fn test_apply_with_time_travel() {
        let mut tree = TransformTree::new();
        tree.add_transform(
            "base_link",
            "odom",
            CuDuration(0),
            translation(0.0, 0.0, 0.0),
        );
        tree.add_transform(
            "base_link",
            "odom",
            CuDuration(100),
            translation(10.0, 0.0, 0.0),
        );
        tree.add_transform("sensor", "odom", CuDuration(0), translation(0.0, 1.0, 0.0));

        // where the sensor was at t=0, seen from the robot at t=100
        let tf = tree
            .apply_with_time_travel(
                "sensor",
                CuDuration(0),
                "base_link",
                CuDuration(100),
                "odom",
            )
            .unwrap();
        assert_translation(&tf, [-10.0, 1.0, 0.0]);
    }

    #[test]
    fn test_frame_list_is_indented_depth_first() {
        let mut tree = chain_tree();
        tree.add_transform("camera", "base_link", CuDuration(0), Transform::IDENTITY);
        tree.get_or_create_frame("earth");

        let list = tree.frame_list();
        let names: Vec<&str> = list.iter().map(|e| e.display_name.as_str()).collect();
        assert_eq!(
            names,
            vec!["earth", "map", "  odom", "    base_link", "      camera", "      laser"]
        );
        assert_eq!(list[4].depth, 3);
    }

    #[test]
    fn test_frame_list_finishes_a_root_before_the_next() {
        let mut tree = TransformTree::new();
        tree.add_transform("a1", "a", CuDuration(0), Transform::IDENTITY);
        tree.add_transform("a2", "a1", CuDuration(0), Transform::IDENTITY);
        tree.add_transform("b1", "b", CuDuration(0), Transform::IDENTITY);

        let list = tree.frame_list();
        let ids: Vec<&str> = list.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "a1", "a2", "b", "b1"]);
        let depths: Vec<usize> = list.iter().map(|e| e.depth).collect();
        assert_eq!(depths, vec![0, 1, 2, 0, 1]);
    }

    #[test]
    fn test_listeners() {
        let mut tree = TransformTree::new();
        let events = Rc::new(RefCell::new(Vec::new()));
        let sink = events.clone();
        let id = tree.subscribe(move |event| sink.borrow_mut().push(event.clone()));

        tree.add_transform("robot", "world", CuDuration(0), Transform::IDENTITY);
        tree.add_transform("robot", "world", CuDuration(1), Transform::IDENTITY);
        assert_eq!(
            *events.borrow(),
            vec![
                TreeEvent::FrameAdded("world".into()),
                TreeEvent::FrameAdded("robot".into()),
                TreeEvent::Relinked {
                    child: "robot".into(),
                    parent: "world".into()
                },
            ]
        );

        assert!(tree.unsubscribe(id));
        tree.clear();
        assert_eq!(events.borrow().len(), 3);
        assert!(tree.is_empty());
    }
}
