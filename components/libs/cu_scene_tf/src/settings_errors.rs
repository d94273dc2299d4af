//! Path scoped advisories shown next to the settings node they concern.
//!
//! Structural problems (cycles, missing frames, overflowing histories) are not
//! returned to the caller of the ingestion path. They are posted here instead,
//! keyed by a settings path and a stable code, so a UI or a test can look them
//! up without parsing messages.
use std::collections::BTreeMap;
use std::fmt;

/// Path of the "follow frame" setting.
pub const FOLLOW_TF_PATH: [&str; 2] = ["general", "followTf"];

/// Settings path of the per-frame node, `["transforms", "frame:<id>"]`.
pub fn frame_settings_path(frame_id: &str) -> Vec<String> {
    vec!["transforms".to_string(), format!("frame:{frame_id}")]
}

pub fn follow_tf_path() -> Vec<String> {
    FOLLOW_TF_PATH.iter().map(|s| s.to_string()).collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorCode {
    FrameNotFound,
    NoFrameSelected,
    CycleDetected,
    TfOverflow,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::FrameNotFound => "FRAME_NOT_FOUND",
            ErrorCode::NoFrameSelected => "NO_FRAME_SELECTED",
            ErrorCode::CycleDetected => "CYCLE_DETECTED",
            ErrorCode::TfOverflow => "TF_OVERFLOW",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sink for advisories. Implemented by whatever displays settings errors.
pub trait ErrorCollector {
    /// Post an advisory. A second add with the same path and code replaces the message.
    fn add(&mut self, path: &[String], code: ErrorCode, message: String);
    fn remove(&mut self, path: &[String], code: ErrorCode);
    fn clear_path(&mut self, path: &[String]);
    fn clear(&mut self);
}

/// In-memory [`ErrorCollector`].
#[derive(Debug, Clone, Default)]
pub struct SettingsErrors {
    errors: BTreeMap<Vec<String>, BTreeMap<ErrorCode, String>>,
}

impl SettingsErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has(&self, path: &[String], code: ErrorCode) -> bool {
        self.message(path, code).is_some()
    }

    pub fn message(&self, path: &[String], code: ErrorCode) -> Option<&str> {
        self.errors
            .get(path)
            .and_then(|codes| codes.get(&code))
            .map(String::as_str)
    }

    /// Codes and messages posted at `path`, ordered by code.
    pub fn errors_at(&self, path: &[String]) -> Vec<(ErrorCode, &str)> {
        self.errors
            .get(path)
            .map(|codes| codes.iter().map(|(c, m)| (*c, m.as_str())).collect())
            .unwrap_or_default()
    }

    /// Every path that currently carries at least one advisory.
    pub fn paths(&self) -> impl Iterator<Item = &[String]> {
        self.errors.keys().map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.errors.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }
}

impl ErrorCollector for SettingsErrors {
    fn add(&mut self, path: &[String], code: ErrorCode, message: String) {
        self.errors
            .entry(path.to_vec())
            .or_default()
            .insert(code, message);
    }

    fn remove(&mut self, path: &[String], code: ErrorCode) {
        if let Some(codes) = self.errors.get_mut(path) {
            codes.remove(&code);
            if codes.is_empty() {
                self.errors.remove(path);
            }
        }
    }

    fn clear_path(&mut self, path: &[String]) {
        self.errors.remove(path);
    }

    fn clear(&mut self) {
        self.errors.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_stable_strings() {
        assert_eq!(ErrorCode::FrameNotFound.as_str(), "FRAME_NOT_FOUND");
        assert_eq!(ErrorCode::NoFrameSelected.to_string(), "NO_FRAME_SELECTED");
        assert_eq!(ErrorCode::CycleDetected.as_str(), "CYCLE_DETECTED");
        assert_eq!(ErrorCode::TfOverflow.as_str(), "TF_OVERFLOW");
    }

    #[test]
    fn test_dedup_by_code() {
        let mut errors = SettingsErrors::new();
        let path = frame_settings_path("base_link");
        errors.add(&path, ErrorCode::CycleDetected, "first".into());
        errors.add(&path, ErrorCode::CycleDetected, "second".into());
        errors.add(&path, ErrorCode::TfOverflow, "full".into());

        assert_eq!(errors.len(), 2);
        assert_eq!(
            errors.message(&path, ErrorCode::CycleDetected),
            Some("second")
        );
        let expected = vec![
            (ErrorCode::CycleDetected, "second"),
            (ErrorCode::TfOverflow, "full"),
        ];
        assert_eq!(errors.errors_at(&path), expected);
    }

    #[test]
    fn test_remove_and_clear_path() {
        let mut errors = SettingsErrors::new();
        let follow = follow_tf_path();
        errors.add(&follow, ErrorCode::NoFrameSelected, "none".into());
        errors.add(&follow, ErrorCode::FrameNotFound, "lost".into());

        errors.remove(&follow, ErrorCode::NoFrameSelected);
        assert!(!errors.has(&follow, ErrorCode::NoFrameSelected));
        assert!(errors.has(&follow, ErrorCode::FrameNotFound));

        errors.clear_path(&follow);
        assert!(errors.is_empty());
        assert_eq!(errors.paths().count(), 0);
    }

    #[test]
    fn test_paths_are_independent() {
        let mut errors = SettingsErrors::new();
        errors.add(&frame_settings_path("a"), ErrorCode::TfOverflow, "a".into());
        errors.add(&frame_settings_path("b"), ErrorCode::TfOverflow, "b".into());
        errors.remove(&frame_settings_path("a"), ErrorCode::TfOverflow);
        assert!(errors.has(&frame_settings_path("b"), ErrorCode::TfOverflow));
        errors.clear();
        assert!(errors.is_empty());
    }
}
