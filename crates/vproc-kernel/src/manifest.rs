use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Declarative description of a program, resolved by name before start.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgramManifest {
    pub script: String,
    #[serde(default)]
    pub styles: Vec<String>,
    #[serde(default)]
    pub assets: Vec<String>,
    #[serde(default)]
    pub metadata: ManifestMetadata,
}

impl ProgramManifest {
    pub fn new(script: impl Into<String>) -> Self {
        Self {
            script: script.into(),
            ..Default::default()
        }
    }

    pub fn with_styles<I, S>(mut self, styles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.styles = styles.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_assets<I, S>(mut self, assets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.assets = assets.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_metadata(mut self, metadata: ManifestMetadata) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Configuration bag supplied by a program's manifest.
///
/// Recognized keys are typed; anything else is kept in `extra` and handed to the
/// program untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestMetadata {
    #[serde(default)]
    pub auto_start: bool,
    #[serde(default)]
    pub priority: i64,
    #[serde(default)]
    pub allow_multiple_instances: bool,
    /// Command-line program that needs a terminal host.
    #[serde(default)]
    pub cli: bool,
    #[serde(default, flatten)]
    pub extra: Map<String, Value>,
}

impl ManifestMetadata {
    pub fn auto_start(mut self, priority: i64) -> Self {
        self.auto_start = true;
        self.priority = priority;
        self
    }

    pub fn multi_instance(mut self) -> Self {
        self.allow_multiple_instances = true;
        self
    }

    pub fn cli(mut self) -> Self {
        self.cli = true;
        self
    }
}

/// Lookup key for a program's registered entry point.
///
/// Separators are dropped and each word is capitalized: `"media player"` and
/// `"media-player"` both map to `"MediaPlayer"`.
pub fn canonical_name(name: &str) -> String {
    name.split(|c: char| !c.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect()
}
