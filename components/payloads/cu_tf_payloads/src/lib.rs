//! Transform payloads as they arrive from the player layer, already decoded.
//!
//! Three wire families carry coordinate frame transforms: the Foxglove
//! `FrameTransform` / `FrameTransforms` schemas, the ROS `TransformStamped`
//! message and the legacy `TFMessage` list of stamped transforms. They all
//! converge on [`TransformEvent`], the single canonical edge the transform tree
//! ingests.
use bincode::{Decode, Encode};
use serde::{Deserialize, Serialize};

const NANOS_PER_SEC: u64 = 1_000_000_000;

/// Wire timestamp split into seconds and nanoseconds (ROS 2 / Foxglove layout).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize, Encode,
    Decode,
)]
pub struct Time {
    pub sec: i32,
    pub nsec: u32,
}

impl Time {
    pub fn new(sec: i32, nsec: u32) -> Self {
        Self { sec, nsec }
    }

    pub fn from_nanos(nanos: u64) -> Self {
        Self {
            sec: (nanos / NANOS_PER_SEC).min(i32::MAX as u64) as i32,
            nsec: (nanos % NANOS_PER_SEC) as u32,
        }
    }

    /// Nanoseconds since the epoch. Stamps before the epoch saturate to zero.
    pub fn to_nanos(&self) -> u64 {
        if self.sec < 0 {
            return 0;
        }
        self.sec as u64 * NANOS_PER_SEC + self.nsec as u64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize, Encode, Decode)]
pub struct Vector3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vector3 {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn to_array(self) -> [f64; 3] {
        [self.x, self.y, self.z]
    }
}

/// Rotation as sent on the wire. Not guaranteed to be normalized.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Encode, Decode)]
pub struct Quaternion {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub w: f64,
}

impl Quaternion {
    pub fn new(x: f64, y: f64, z: f64, w: f64) -> Self {
        Self { x, y, z, w }
    }

    pub fn identity() -> Self {
        Self::new(0.0, 0.0, 0.0, 1.0)
    }

    pub fn to_array(self) -> [f64; 4] {
        [self.x, self.y, self.z, self.w]
    }
}

impl Default for Quaternion {
    fn default() -> Self {
        Self::identity()
    }
}

/// `foxglove.FrameTransform`
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, Encode, Decode)]
pub struct FrameTransform {
    pub timestamp: Time,
    pub parent_frame_id: String,
    pub child_frame_id: String,
    pub translation: Vector3,
    pub rotation: Quaternion,
}

/// `foxglove.FrameTransforms`
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, Encode, Decode)]
pub struct FrameTransforms {
    pub transforms: Vec<FrameTransform>,
}

/// `std_msgs/Header`
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, Encode, Decode)]
pub struct Header {
    pub stamp: Time,
    pub frame_id: String,
}

/// `geometry_msgs/Transform`
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize, Encode, Decode)]
pub struct GeometryTransform {
    pub translation: Vector3,
    pub rotation: Quaternion,
}

/// `geometry_msgs/TransformStamped`. The header frame is the parent.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, Encode, Decode)]
pub struct TransformStamped {
    pub header: Header,
    pub child_frame_id: String,
    pub transform: GeometryTransform,
}

/// `tf2_msgs/TFMessage` (and the ROS 1 `tf/tfMessage`).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, Encode, Decode)]
pub struct TfMessage {
    pub transforms: Vec<TransformStamped>,
}

/// The canonical parent -> child edge sample every wire schema normalizes to.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, Encode, Decode)]
pub struct TransformEvent {
    pub parent_frame_id: String,
    pub child_frame_id: String,
    pub stamp_nanos: u64,
    pub translation: Vector3,
    pub rotation: Quaternion,
}

impl From<&FrameTransform> for TransformEvent {
    fn from(tf: &FrameTransform) -> Self {
        Self {
            parent_frame_id: tf.parent_frame_id.clone(),
            child_frame_id: tf.child_frame_id.clone(),
            stamp_nanos: tf.timestamp.to_nanos(),
            translation: tf.translation,
            rotation: tf.rotation,
        }
    }
}

impl From<&TransformStamped> for TransformEvent {
    fn from(tf: &TransformStamped) -> Self {
        Self {
            parent_frame_id: tf.header.frame_id.clone(),
            child_frame_id: tf.child_frame_id.clone(),
            stamp_nanos: tf.header.stamp.to_nanos(),
            translation: tf.transform.translation,
            rotation: tf.transform.rotation,
        }
    }
}

/// Which transform schema a topic carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SchemaKind {
    FrameTransform,
    FrameTransforms,
    TransformStamped,
    TfMessage,
}

impl SchemaKind {
    /// Schema names the player layer may report for each kind.
    pub const SCHEMAS: [(&'static str, SchemaKind); 10] = [
        ("foxglove.FrameTransform", SchemaKind::FrameTransform),
        ("foxglove_msgs/FrameTransform", SchemaKind::FrameTransform),
        ("foxglove_msgs/msg/FrameTransform", SchemaKind::FrameTransform),
        ("foxglove.FrameTransforms", SchemaKind::FrameTransforms),
        ("foxglove_msgs/FrameTransforms", SchemaKind::FrameTransforms),
        ("geometry_msgs/TransformStamped", SchemaKind::TransformStamped),
        ("geometry_msgs/msg/TransformStamped", SchemaKind::TransformStamped),
        ("tf2_msgs/TFMessage", SchemaKind::TfMessage),
        ("tf2_msgs/msg/TFMessage", SchemaKind::TfMessage),
        ("tf/tfMessage", SchemaKind::TfMessage),
    ];

    pub fn from_schema_name(name: &str) -> Option<Self> {
        Self::SCHEMAS
            .iter()
            .find(|(schema, _)| *schema == name)
            .map(|(_, kind)| *kind)
    }
}

/// A decoded transform message of any supported schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Encode, Decode)]
pub enum TransformSource {
    FrameTransform(FrameTransform),
    FrameTransforms(FrameTransforms),
    TransformStamped(TransformStamped),
    TfMessage(TfMessage),
}

impl TransformSource {
    pub fn kind(&self) -> SchemaKind {
        match self {
            TransformSource::FrameTransform(_) => SchemaKind::FrameTransform,
            TransformSource::FrameTransforms(_) => SchemaKind::FrameTransforms,
            TransformSource::TransformStamped(_) => SchemaKind::TransformStamped,
            TransformSource::TfMessage(_) => SchemaKind::TfMessage,
        }
    }

    /// Flatten this message into edge samples, preserving message order.
    pub fn normalize(&self) -> Vec<TransformEvent> {
        match self {
            TransformSource::FrameTransform(tf) => vec![tf.into()],
            TransformSource::FrameTransforms(list) => {
                list.transforms.iter().map(TransformEvent::from).collect()
            }
            TransformSource::TransformStamped(tf) => vec![tf.into()],
            TransformSource::TfMessage(msg) => {
                msg.transforms.iter().map(TransformEvent::from).collect()
            }
        }
    }
}

impl From<FrameTransform> for TransformSource {
    fn from(tf: FrameTransform) -> Self {
        TransformSource::FrameTransform(tf)
    }
}

impl From<FrameTransforms> for TransformSource {
    fn from(list: FrameTransforms) -> Self {
        TransformSource::FrameTransforms(list)
    }
}

impl From<TransformStamped> for TransformSource {
    fn from(tf: TransformStamped) -> Self {
        TransformSource::TransformStamped(tf)
    }
}

impl From<TfMessage> for TransformSource {
    fn from(msg: TfMessage) -> Self {
        TransformSource::TfMessage(msg)
    }
}
