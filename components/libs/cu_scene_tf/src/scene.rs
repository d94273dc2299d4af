//! Host facing entry point: feeds decoded messages into the transform tree,
//! keeps the render and fixed frames current and reports advisories.
use crate::config::SceneTfConfig;
use crate::cursor::{AllFramesCursor, Timestamped};
use crate::error::{TransformError, TransformResult};
use crate::resolver::FrameResolver;
use crate::settings_errors::{frame_settings_path, ErrorCode, ErrorCollector, SettingsErrors};
use crate::transform::Transform;
use crate::tree::{AddTransformResult, FrameListEntry, ListenerId, TransformTree, TreeEvent};
use cu29_clock::{CuDuration, CuTime};
use cu_tf_payloads::{Header, Quaternion, TransformEvent, TransformSource, Vector3};
use log::debug;

/// Settings path of a topic node, `["topics", "<topic>"]`.
pub fn topic_settings_path(topic: &str) -> Vec<String> {
    vec!["topics".to_string(), topic.to_string()]
}

/// Decoded message content, as far as frames are concerned.
#[derive(Debug, Clone, PartialEq)]
pub enum SceneMessage {
    /// One of the transform schemas.
    Transform(TransformSource),
    /// A message with a `std_msgs/Header`.
    Header(Header),
    /// A marker array, one header per marker.
    Markers(Vec<Header>),
    /// A scene update, one frame id per entity.
    Entities(Vec<String>),
    /// A message with a bare top level `frame_id`.
    FrameId(String),
    Other,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MessageEvent {
    pub topic: String,
    pub receive_time: CuTime,
    pub message: SceneMessage,
}

impl MessageEvent {
    pub fn new(topic: impl Into<String>, receive_time: CuTime, message: SceneMessage) -> Self {
        Self {
            topic: topic.into(),
            receive_time,
            message,
        }
    }
}

impl Timestamped for MessageEvent {
    fn receive_time(&self) -> CuTime {
        self.receive_time
    }
}

/// What [`SceneTransforms::clear`] resets besides the advisories.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClearOptions {
    pub clear_transforms: bool,
    pub reset_all_frames_cursor: bool,
}

pub struct SceneTransforms {
    config: SceneTfConfig,
    tree: TransformTree,
    resolver: FrameResolver,
    cursor: AllFramesCursor,
    errors: SettingsErrors,
    current_time: CuTime,
}

impl SceneTransforms {
    pub fn new(config: SceneTfConfig) -> Self {
        let mut resolver = FrameResolver::with_default_frame_ids(
            config.default_frame_ids.iter().map(String::as_str),
        );
        resolver.set_follow_frame_id(config.follow_frame_id.as_deref());
        Self {
            tree: TransformTree::with_capacity(config.max_capacity),
            resolver,
            cursor: AllFramesCursor::new(),
            errors: SettingsErrors::new(),
            current_time: CuDuration(0),
            config,
        }
    }

    pub fn config(&self) -> &SceneTfConfig {
        &self.config
    }

    /// Read only view of the frames, for pose queries.
    pub fn tree(&self) -> &TransformTree {
        &self.tree
    }

    pub fn errors(&self) -> &SettingsErrors {
        &self.errors
    }

    /// Get notified when frames appear or get re-parented.
    pub fn subscribe(&mut self, listener: impl FnMut(&TreeEvent) + 'static) -> ListenerId {
        self.tree.subscribe(listener)
    }

    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        self.tree.unsubscribe(id)
    }

    /// Match `tf::Transformer`: in ROS mode a single leading `/` is dropped.
    pub fn normalize_frame_id<'a>(&self, frame_id: &'a str) -> &'a str {
        if self.config.ros {
            frame_id.strip_prefix('/').unwrap_or(frame_id)
        } else {
            frame_id
        }
    }

    /// Register a frame seen in a message, even if nothing positions it yet.
    pub fn add_coordinate_frame(&mut self, frame_id: &str) {
        let frame_id = self.normalize_frame_id(frame_id);
        if !self.tree.has_frame(frame_id) {
            self.tree.get_or_create_frame(frame_id);
        }
    }

    /// Ingest one parent -> child sample.
    ///
    /// Cycles and overflowing histories are posted as advisories on the frame
    /// (and on `error_settings_path` for cycles) instead of being returned.
    pub fn add_transform(
        &mut self,
        parent_frame_id: &str,
        child_frame_id: &str,
        stamp: CuTime,
        translation: Vector3,
        rotation: Quaternion,
        error_settings_path: Option<&[String]>,
    ) -> AddTransformResult {
        let parent_id = self.normalize_frame_id(parent_frame_id);
        let child_id = self.normalize_frame_id(child_frame_id);
        let transform = Transform::from_arrays(translation.to_array(), rotation.to_array());
        let status = self.tree.add_transform(child_id, parent_id, stamp, transform);
        let frame_path = frame_settings_path(child_id);

        if status == AddTransformResult::CycleDetected {
            self.errors.add(
                &frame_path,
                ErrorCode::CycleDetected,
                format!(
                    "Transform tree cycle detected: Received transform with parent \"{parent_id}\" and child \"{child_id}\", but \"{child_id}\" is already an ancestor of \"{parent_id}\". Transform message dropped."
                ),
            );
            if let Some(path) = error_settings_path {
                self.errors.add(
                    path,
                    ErrorCode::CycleDetected,
                    format!(
                        "Attempted to add cyclical transform: Frame \"{parent_id}\" cannot be the parent of frame \"{child_id}\". Transform message dropped."
                    ),
                );
            }
        }

        // stays up until the scene is reloaded, the dropped samples are gone for good
        if let Some(frame) = self.tree.frame(child_id) {
            if frame.has_overflowed() {
                self.errors.add(
                    &frame_path,
                    ErrorCode::TfOverflow,
                    format!(
                        "[Warning] Transform history is at capacity ({}), old TFs will be dropped",
                        frame.max_capacity()
                    ),
                );
            }
        }
        status
    }

    pub fn add_transform_event(
        &mut self,
        event: &TransformEvent,
        error_settings_path: Option<&[String]>,
    ) -> AddTransformResult {
        self.add_transform(
            &event.parent_frame_id,
            &event.child_frame_id,
            CuDuration(event.stamp_nanos),
            event.translation,
            event.rotation,
            error_settings_path,
        )
    }

    pub fn remove_transform(
        &mut self,
        child_frame_id: &str,
        parent_frame_id: &str,
        stamp: CuTime,
    ) -> bool {
        let child_id = self.normalize_frame_id(child_frame_id);
        let parent_id = self.normalize_frame_id(parent_frame_id);
        self.tree.remove_transform(child_id, parent_id, stamp)
    }

    /// Route one decoded message: transforms go into the tree, frame ids found
    /// anywhere else are registered as frames.
    pub fn handle_message(&mut self, event: &MessageEvent) {
        match &event.message {
            SceneMessage::Transform(source) => {
                let path = topic_settings_path(&event.topic);
                for tf in source.normalize() {
                    self.add_transform_event(&tf, Some(&path));
                }
            }
            SceneMessage::Header(header) => self.add_coordinate_frame(&header.frame_id),
            SceneMessage::Markers(headers) => {
                for header in headers {
                    self.add_coordinate_frame(&header.frame_id);
                }
            }
            SceneMessage::Entities(frame_ids) => {
                for frame_id in frame_ids {
                    self.add_coordinate_frame(frame_id);
                }
            }
            SceneMessage::FrameId(frame_id) => self.add_coordinate_frame(frame_id),
            SceneMessage::Other => {}
        }
    }

    pub fn current_time(&self) -> CuTime {
        self.current_time
    }

    pub fn set_current_time(&mut self, time: CuTime) {
        self.current_time = time;
    }

    /// Call after [`Self::set_current_time`]. Moving backward drops the
    /// transforms and replays the preloaded buffer from the start.
    pub fn handle_seek(&mut self, old_time: CuTime) {
        let moved_back = self.current_time < old_time;
        if moved_back {
            debug!("Seeked backward from {old_time} to {}", self.current_time);
        }
        self.clear(ClearOptions {
            clear_transforms: moved_back,
            reset_all_frames_cursor: moved_back,
        });
    }

    /// Advisories are always cleared, they come back with the next offending message.
    pub fn clear(&mut self, options: ClearOptions) {
        if options.clear_transforms {
            self.tree.clear();
        }
        if options.reset_all_frames_cursor {
            self.cursor.reset();
        }
        self.errors.clear();
    }

    /// Consume the preloaded messages up to the current time. Returns whether
    /// anything new was read.
    pub fn handle_all_frames_messages(&mut self, all_frames: &[MessageEvent]) -> bool {
        let buffer = if self.config.enable_preloading {
            all_frames
        } else {
            &[]
        };
        let mut cursor = self.cursor;
        let advanced = cursor.advance(buffer, self.current_time, |message| {
            self.handle_message(message)
        });
        self.cursor = cursor;
        advanced
    }

    pub fn all_frames_cursor(&self) -> &AllFramesCursor {
        &self.cursor
    }

    /// Once per rendered frame: pick the render frame again if needed and
    /// refresh the fixed frame.
    pub fn update_frames(&mut self) -> Option<&str> {
        self.resolver.update(&self.tree, &mut self.errors)
    }

    pub fn set_follow_frame_id(&mut self, follow_frame_id: Option<&str>) {
        let follow = follow_frame_id.map(|id| self.normalize_frame_id(id));
        self.resolver.set_follow_frame_id(follow);
        self.config.follow_frame_id = follow.map(str::to_string);
    }

    pub fn resolver(&self) -> &FrameResolver {
        &self.resolver
    }

    pub fn render_frame_id(&self) -> Option<&str> {
        self.resolver.render_frame_id()
    }

    pub fn fixed_frame_id(&self) -> Option<&str> {
        self.resolver.fixed_frame_id()
    }

    pub fn frame_list(&self) -> Vec<FrameListEntry> {
        self.tree.frame_list()
    }

    /// Pose of `frame_id` as stamped at `src_time`, expressed in the render
    /// frame at the current time, going through the fixed frame.
    pub fn pose_in_render_frame(
        &self,
        frame_id: &str,
        src_time: CuTime,
    ) -> TransformResult<Transform> {
        let (Some(render), Some(fixed)) = (self.render_frame_id(), self.fixed_frame_id()) else {
            return Err(TransformError::NoFramesAvailable);
        };
        let frame_id = self.normalize_frame_id(frame_id);
        self.tree
            .apply_with_time_travel(frame_id, src_time, render, self.current_time, fixed)
    }
}

impl Default for SceneTransforms {
    fn default() -> Self {
        Self::new(SceneTfConfig::default())
    }
}
