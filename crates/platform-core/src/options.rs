//! Caller constraints and the descriptor a finished acquisition yields.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::capability::CaptureMode;

/// Constraint key naming the kind of capture source.
pub const MEDIA_SOURCE_KEY: &str = "chromeMediaSource";
/// Constraint key carrying the picker's source id.
pub const MEDIA_SOURCE_ID_KEY: &str = "chromeMediaSourceId";

/// Caller-supplied capture constraints.
///
/// Strategies merge their own fields underneath these: a key set by the
/// caller is never overwritten.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestOptions(BTreeMap<String, Value>);

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Fill in `defaults` for every key the caller left unset.
    pub fn merged_over<K, V>(mut self, defaults: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
    {
        for (key, value) in defaults {
            self.0.entry(key.into()).or_insert_with(|| value.into());
        }
        self
    }

    pub fn into_inner(self) -> BTreeMap<String, Value> {
        self.0
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for RequestOptions {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// The capture source a user picked, plus the constraints to open it with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceDescriptor {
    mode: CaptureMode,
    source_id: Option<String>,
    constraints: RequestOptions,
}

impl SourceDescriptor {
    /// Whole-screen capture through the browser flag. There is no picker,
    /// so no source id.
    pub fn screen_flag(options: RequestOptions) -> Self {
        Self {
            mode: CaptureMode::Flag,
            source_id: None,
            constraints: options.merged_over([(MEDIA_SOURCE_KEY, "screen")]),
        }
    }

    /// Desktop capture of the source the extension picker returned.
    pub fn desktop(source_id: impl Into<String>, options: RequestOptions) -> Self {
        let source_id = source_id.into();
        Self {
            mode: CaptureMode::Extension,
            constraints: options.merged_over([
                (MEDIA_SOURCE_KEY, source_value("desktop")),
                (MEDIA_SOURCE_ID_KEY, source_value(&source_id)),
            ]),
            source_id: Some(source_id),
        }
    }

    pub fn mode(&self) -> CaptureMode {
        self.mode
    }

    pub fn source_id(&self) -> Option<&str> {
        self.source_id.as_deref()
    }

    pub fn constraints(&self) -> &RequestOptions {
        &self.constraints
    }

    pub fn into_constraints(self) -> RequestOptions {
        self.constraints
    }
}

fn source_value(s: &str) -> Value {
    Value::String(s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn caller_values_win_over_defaults() {
        let options = RequestOptions::new()
            .with("maxWidth", 1920)
            .with(MEDIA_SOURCE_KEY, "custom")
            .merged_over([(MEDIA_SOURCE_KEY, "screen"), ("maxHeight", "1080")]);

        assert_eq!(options.get(MEDIA_SOURCE_KEY), Some(&json!("custom")));
        assert_eq!(options.get("maxWidth"), Some(&json!(1920)));
        assert_eq!(options.get("maxHeight"), Some(&json!("1080")));
        assert_eq!(options.len(), 3);
    }

    #[test]
    fn flag_descriptor_marks_screen_source() {
        let descriptor = SourceDescriptor::screen_flag(RequestOptions::new().with("fps", 15));
        assert_eq!(descriptor.mode(), CaptureMode::Flag);
        assert_eq!(descriptor.source_id(), None);
        assert_eq!(
            serde_json::to_value(descriptor.constraints()).unwrap(),
            json!({ "chromeMediaSource": "screen", "fps": 15 })
        );
    }

    #[test]
    fn desktop_descriptor_carries_source_id() {
        let descriptor = SourceDescriptor::desktop("screen:0:0", RequestOptions::new());
        assert_eq!(descriptor.source_id(), Some("screen:0:0"));
        assert_eq!(
            descriptor.constraints().get(MEDIA_SOURCE_ID_KEY),
            Some(&json!("screen:0:0"))
        );
        assert_eq!(
            descriptor.constraints().get(MEDIA_SOURCE_KEY),
            Some(&json!("desktop"))
        );
    }

    #[test]
    fn options_deserialize_from_plain_object() {
        let options: RequestOptions =
            serde_json::from_value(json!({ "audio": false, "maxFrameRate": 5 })).unwrap();
        assert_eq!(options.len(), 2);
        assert!(options.contains_key("audio"));
    }
}
