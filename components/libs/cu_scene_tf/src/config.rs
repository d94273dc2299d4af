use crate::error::{TransformError, TransformResult};
use crate::frame::DEFAULT_MAX_CAPACITY;
use crate::resolver::DEFAULT_FRAME_IDS;
use ron::extensions::Extensions;
use ron::Options;
use serde::{Deserialize, Serialize};
use std::fs::read_to_string;
use std::path::Path;

/// Settings of the scene transform layer, usually read from a RON file.
///
/// ```ron
/// (
///     max_capacity: 5000,
///     follow_frame_id: "base_link",
///     ros: true,
/// )
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneTfConfig {
    /// Samples kept per frame before the oldest ones are evicted.
    pub max_capacity: usize,
    /// Fallback render frames, most preferred first.
    pub default_frame_ids: Vec<String>,
    pub follow_frame_id: Option<String>,
    /// Consume the preloaded all-frames buffer.
    pub enable_preloading: bool,
    /// Strip a leading `/` from frame ids like tf2 does.
    pub ros: bool,
}

impl Default for SceneTfConfig {
    fn default() -> Self {
        Self {
            max_capacity: DEFAULT_MAX_CAPACITY,
            default_frame_ids: DEFAULT_FRAME_IDS.iter().map(|s| s.to_string()).collect(),
            follow_frame_id: None,
            enable_preloading: true,
            ros: false,
        }
    }
}

impl SceneTfConfig {
    fn get_options() -> Options {
        Options::default()
            .with_default_extension(Extensions::IMPLICIT_SOME)
            .with_default_extension(Extensions::UNWRAP_NEWTYPES)
    }

    pub fn serialize_ron(&self) -> TransformResult<String> {
        let pretty = ron::ser::PrettyConfig::default();
        Self::get_options()
            .to_string_pretty(self, pretty)
            .map_err(|e| TransformError::Config(e.to_string()))
    }

    pub fn deserialize_ron(ron: &str) -> TransformResult<Self> {
        let config: Self = Self::get_options()
            .from_str(ron)
            .map_err(|e| TransformError::Config(format!("Syntax error in config: {e}")))?;
        if config.max_capacity == 0 {
            return Err(TransformError::Config("max_capacity must be at least 1".to_string()));
        }
        Ok(config)
    }
}

/// Read a scene transform configuration from a file.
pub fn read_configuration(config_filename: impl AsRef<Path>) -> TransformResult<SceneTfConfig> {
    let config_content = read_to_string(config_filename.as_ref())?;
    SceneTfConfig::deserialize_ron(&config_content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_struct() {
        let config = SceneTfConfig::deserialize_ron("()").unwrap();
        assert_eq!(config, SceneTfConfig::default());
        assert_eq!(config.max_capacity, 10_000);
        assert_eq!(
            config.default_frame_ids,
            vec!["base_link", "odom", "map", "earth"]
        );
        assert!(config.enable_preloading);
    }

    #[test]
    fn test_implicit_some() {
        let ron = r#"(max_capacity: 20, follow_frame_id: "camera", ros: true)"#;
        let config = SceneTfConfig::deserialize_ron(ron).unwrap();
        assert_eq!(config.max_capacity, 20);
        assert_eq!(config.follow_frame_id.as_deref(), Some("camera"));
        assert!(config.ros);
    }

    #[test]
    fn test_plain_serialize() {
        let config = SceneTfConfig {
            follow_frame_id: Some("map".into()),
            enable_preloading: false,
            ..Default::default()
        };
        let serialized = config.serialize_ron().unwrap();
        let deserialized = SceneTfConfig::deserialize_ron(&serialized).unwrap();
        assert_eq!(config, deserialized);
    }

    #[test]
    fn test_rejects_bad_input() {
        assert!(matches!(
            SceneTfConfig::deserialize_ron("(max_capacity: \"lots\")"),
            Err(TransformError::Config(_))
        ));
        assert!(matches!(
            SceneTfConfig::deserialize_ron("(max_capacity: 0)"),
            Err(TransformError::Config(_))
        ));
        assert!(matches!(
            read_configuration("/nonexistent/scene_tf.ron"),
            Err(TransformError::Io(_))
        ));
    }
}
