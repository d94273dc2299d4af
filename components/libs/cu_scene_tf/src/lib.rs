pub mod config;
pub mod cursor;
pub mod error;
pub mod frame;
pub mod resolver;
pub mod scene;
pub mod settings_errors;
pub mod transform;
pub mod tree;

#[cfg(test)]
mod test_utils;

use compact_str::CompactString;

/// Frame identifier strings
pub type FrameIdString = CompactString;

pub use config::{read_configuration, SceneTfConfig};
pub use cursor::{AllFramesCursor, Timestamped};
pub use error::{TransformError, TransformResult};
pub use frame::{CoordinateFrame, TimeAndTransform, DEFAULT_MAX_CAPACITY};
pub use resolver::{FrameResolver, ResolutionState, DEFAULT_FRAME_IDS};
pub use scene::{ClearOptions, MessageEvent, SceneMessage, SceneTransforms};
pub use settings_errors::{ErrorCode, ErrorCollector, SettingsErrors, FOLLOW_TF_PATH};
pub use transform::Transform;
pub use tree::{AddTransformResult, FrameListEntry, ListenerId, TransformTree, TreeEvent};

pub use cu29_clock::{CuDuration, CuTime};
pub use cu_tf_payloads;
