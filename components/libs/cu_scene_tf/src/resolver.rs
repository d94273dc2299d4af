use crate::settings_errors::{follow_tf_path, ErrorCode, ErrorCollector};
use crate::tree::TransformTree;
use crate::FrameIdString;
use log::debug;
use std::collections::BTreeMap;

/// Conventional frame names (REP-105), in the order they are preferred.
pub const DEFAULT_FRAME_IDS: [&str; 4] = ["base_link", "odom", "map", "earth"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionState {
    /// The tree is empty, nothing can be rendered.
    NoFrames,
    /// Rendering in the frame the user asked for.
    Following,
    /// Rendering in a frame picked from the default list or the largest tree.
    FallbackHeuristic,
    /// The render frame disappeared, it is picked again on the next update.
    FrameLost,
}

/// Picks the frame the scene is rendered in and its fixed frame.
#[derive(Debug, Clone)]
pub struct FrameResolver {
    follow_frame_id: Option<FrameIdString>,
    render_frame_id: Option<FrameIdString>,
    fixed_frame_id: Option<FrameIdString>,
    default_frame_ids: Vec<FrameIdString>,
    last_frame_count: usize,
    state: ResolutionState,
}

impl FrameResolver {
    pub fn new() -> Self {
        Self::with_default_frame_ids(DEFAULT_FRAME_IDS.iter().copied())
    }

    pub fn with_default_frame_ids<I, S>(default_frame_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<FrameIdString>,
    {
        Self {
            follow_frame_id: None,
            render_frame_id: None,
            fixed_frame_id: None,
            default_frame_ids: default_frame_ids.into_iter().map(Into::into).collect(),
            last_frame_count: 0,
            state: ResolutionState::NoFrames,
        }
    }

    pub fn follow_frame_id(&self) -> Option<&str> {
        self.follow_frame_id.as_deref()
    }

    pub fn set_follow_frame_id(&mut self, follow_frame_id: Option<&str>) {
        self.follow_frame_id = follow_frame_id.map(FrameIdString::from);
    }

    pub fn render_frame_id(&self) -> Option<&str> {
        self.render_frame_id.as_deref()
    }

    pub fn fixed_frame_id(&self) -> Option<&str> {
        self.fixed_frame_id.as_deref()
    }

    pub fn state(&self) -> ResolutionState {
        self.state
    }

    fn follow_exists(&self, tree: &TransformTree) -> bool {
        self.follow_frame_id
            .as_deref()
            .is_some_and(|id| tree.has_frame(id))
    }

    /// Best frame to render in when the user did not pick one (or picked one
    /// that is not there): the first default name present in the tree, else
    /// the root carrying the most frames. Ties go to the smallest root id.
    pub fn default_frame_id(&self, tree: &TransformTree) -> Option<FrameIdString> {
        if tree.is_empty() {
            return None;
        }
        if let Some(id) = self
            .default_frame_ids
            .iter()
            .find(|id| tree.has_frame(id.as_str()))
        {
            return Some(id.clone());
        }

        let mut roots_to_counts: BTreeMap<&str, usize> = BTreeMap::new();
        for id in tree.frames().keys() {
            if let Ok(root) = tree.root(id) {
                *roots_to_counts.entry(root.id()).or_default() += 1;
            }
        }
        let mut best: Option<(&str, usize)> = None;
        for (root, count) in roots_to_counts {
            match best {
                Some((_, best_count)) if count <= best_count => {}
                _ => best = Some((root, count)),
            }
        }
        best.map(|(root, _)| FrameIdString::from(root))
    }

    /// Called once per rendered frame. Returns the render frame, if any.
    ///
    /// The render frame is only picked again when the tree gained or lost
    /// frames or the current one disappeared. The fixed frame is refreshed on
    /// every call since a re-parent can move the root under a stable render frame.
    pub fn update(
        &mut self,
        tree: &TransformTree,
        errors: &mut dyn ErrorCollector,
    ) -> Option<&str> {
        let follow_path = follow_tf_path();
        let follow_exists = self.follow_exists(tree);

        if follow_exists && self.render_frame_id != self.follow_frame_id {
            self.render_frame_id = self.follow_frame_id.clone();
            self.last_frame_count = tree.len();
        } else if self.render_frame_id.is_none()
            || tree.len() != self.last_frame_count
            || !self
                .render_frame_id
                .as_deref()
                .is_some_and(|id| tree.has_frame(id))
        {
            let previous = self.render_frame_id.take();
            self.render_frame_id = if follow_exists {
                self.follow_frame_id.clone()
            } else {
                self.default_frame_id(tree)
            };
            self.last_frame_count = tree.len();

            if self.render_frame_id.is_none() {
                self.fixed_frame_id = None;
                self.state = if previous.is_some() {
                    ResolutionState::FrameLost
                } else {
                    ResolutionState::NoFrames
                };
                match (self.follow_frame_id.as_deref(), previous.as_deref()) {
                    (Some(missing), _) | (None, Some(missing)) => {
                        errors.remove(&follow_path, ErrorCode::NoFrameSelected);
                        errors.add(
                            &follow_path,
                            ErrorCode::FrameNotFound,
                            format!("Frame \"{missing}\" not found"),
                        );
                    }
                    (None, None) => {
                        errors.remove(&follow_path, ErrorCode::FrameNotFound);
                        errors.add(
                            &follow_path,
                            ErrorCode::NoFrameSelected,
                            "No coordinate frames found".to_string(),
                        );
                    }
                }
                return None;
            }
            errors.remove(&follow_path, ErrorCode::NoFrameSelected);
            if previous != self.render_frame_id {
                debug!(
                    "Render frame changed from {:?} to {:?}",
                    previous.as_deref(),
                    self.render_frame_id.as_deref()
                );
            }
        }

        let render = self.render_frame_id.clone()?;
        let fixed = match tree.root(&render) {
            Ok(root) => FrameIdString::from(root.id()),
            Err(_) => {
                self.render_frame_id = None;
                self.fixed_frame_id = None;
                self.state = ResolutionState::FrameLost;
                errors.add(
                    &follow_path,
                    ErrorCode::FrameNotFound,
                    format!("Frame \"{render}\" not found"),
                );
                return None;
            }
        };
        if self.fixed_frame_id.as_ref() != Some(&fixed) {
            debug!("Fixed frame is now \"{fixed}\"");
            self.fixed_frame_id = Some(fixed);
        }

        errors.clear_path(&follow_path);
        if follow_exists {
            self.state = ResolutionState::Following;
        } else {
            self.state = ResolutionState::FallbackHeuristic;
            if let Some(follow) = self.follow_frame_id.as_deref() {
                errors.add(
                    &follow_path,
                    ErrorCode::FrameNotFound,
                    format!("Frame \"{follow}\" not found"),
                );
            }
        }
        self.render_frame_id.as_deref()
    }

    /// Forget the current selection, keeping the user's follow intent.
    pub fn reset(&mut self) {
        self.render_frame_id = None;
        self.fixed_frame_id = None;
        self.last_frame_count = 0;
        self.state = ResolutionState::NoFrames;
    }
}

impl Default for FrameResolver {
    fn default() -> Self {
        Self::new()
    }
}
