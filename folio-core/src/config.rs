//! Editor runtime configuration.
//!
//! Everything the editor used to read from global registries (font size
//! whitelist, registered embeds, page geometry, timing) lives in one value
//! that is built once and passed down explicitly.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::attributes::{self, Attributes};
use crate::delta::{Delta, Insert, Op};
use crate::error::{ConfigError, DeltaError};

pub const DEFAULT_CONFIG_NAME: &str = "folio.config.json";

/// Physical page description. The content box is the page minus margins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PageGeometry {
    pub width_in: f32,
    pub height_in: f32,
    pub margin_top_in: f32,
    pub margin_bottom_in: f32,
    pub margin_left_in: f32,
    pub margin_right_in: f32,
    pub dpi: f32,
    /// Explicit content box, overriding the computed one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_width_px: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_height_px: Option<f32>,
}

impl Default for PageGeometry {
    fn default() -> Self {
        Self {
            width_in: 8.5,
            height_in: 11.0,
            margin_top_in: 1.0,
            margin_bottom_in: 1.0,
            margin_left_in: 1.0,
            margin_right_in: 1.0,
            dpi: 96.0,
            content_width_px: None,
            content_height_px: None,
        }
    }
}

impl PageGeometry {
    /// A geometry given directly in pixels.
    pub fn content_box(width_px: f32, height_px: f32) -> Self {
        Self {
            content_width_px: Some(width_px),
            content_height_px: Some(height_px),
            ..Self::default()
        }
    }

    /// Usable vertical space per page, in px.
    pub fn target_height_px(&self) -> f32 {
        self.content_height_px
            .unwrap_or((self.height_in - self.margin_top_in - self.margin_bottom_in) * self.dpi)
    }

    pub fn content_width_px(&self) -> f32 {
        self.content_width_px
            .unwrap_or((self.width_in - self.margin_left_in - self.margin_right_in) * self.dpi)
    }
}

/// Debounce delays.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Timing {
    pub overflow_debounce_ms: u64,
    pub reflow_debounce_ms: u64,
    pub autosave_debounce_ms: u64,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            overflow_debounce_ms: 300,
            reflow_debounce_ms: 450,
            autosave_debounce_ms: 2000,
        }
    }
}

impl Timing {
    pub fn overflow_delay(&self) -> Duration {
        Duration::from_millis(self.overflow_debounce_ms)
    }

    pub fn reflow_delay(&self) -> Duration {
        Duration::from_millis(self.reflow_debounce_ms)
    }

    pub fn autosave_delay(&self) -> Duration {
        Duration::from_millis(self.autosave_debounce_ms)
    }
}

/// When a page counts as under-filled, and how much slack a pulled line
/// may use.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ReflowPolicy {
    pub low_watermark: f32,
    pub tolerance_px: f32,
}

impl Default for ReflowPolicy {
    fn default() -> Self {
        Self {
            low_watermark: 0.7,
            tolerance_px: 30.0,
        }
    }
}

/// Per-page undo history. Only user changes are recorded; changes made
/// within `delay_ms` of the first change of a step join that step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HistoryPolicy {
    pub delay_ms: u64,
    pub max_stack: usize,
}

impl Default for HistoryPolicy {
    fn default() -> Self {
        Self {
            delay_ms: 2000,
            max_stack: 500,
        }
    }
}

impl HistoryPolicy {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

/// Text measurement used by the in-memory store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TextMetrics {
    pub default_font_size_px: f32,
    /// Advance width of one character as a fraction of the font size.
    pub char_width_ratio: f32,
    pub line_height_ratio: f32,
    pub embed_height_px: f32,
}

impl Default for TextMetrics {
    fn default() -> Self {
        Self {
            default_font_size_px: 16.0,
            char_width_ratio: 0.5,
            line_height_ratio: 1.5,
            embed_height_px: 120.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EditorRuntimeConfig {
    pub page: PageGeometry,
    pub timing: Timing,
    pub reflow: ReflowPolicy,
    pub metrics: TextMetrics,
    pub history: HistoryPolicy,
    pub font_sizes: Vec<String>,
    pub font_families: Vec<String>,
    pub embed_types: Vec<String>,
}

impl Default for EditorRuntimeConfig {
    fn default() -> Self {
        Self {
            page: PageGeometry::default(),
            timing: Timing::default(),
            reflow: ReflowPolicy::default(),
            metrics: TextMetrics::default(),
            history: HistoryPolicy::default(),
            font_sizes: [
                "8px", "9px", "10px", "12px", "14px", "16px", "20px", "24px", "32px", "42px",
                "54px", "68px", "84px", "98px",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            font_families: ["sans-serif", "serif", "monospace"]
                .into_iter()
                .map(String::from)
                .collect(),
            embed_types: vec!["image".to_string(), "video".to_string()],
        }
    }
}

impl EditorRuntimeConfig {
    /// Load `folio.config.json` from `dir`, or defaults when absent.
    pub fn load(dir: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = dir.as_ref().join(DEFAULT_CONFIG_NAME);
        if path.exists() {
            Self::from_file(&path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let height = self.target_height_px();
        if height <= 0.0 {
            return Err(ConfigError::EmptyPage(height));
        }
        Ok(())
    }

    pub fn target_height_px(&self) -> f32 {
        self.page.target_height_px()
    }

    /// Below this height a page tries to pull content back.
    pub fn reflow_threshold_px(&self) -> f32 {
        self.target_height_px() * self.reflow.low_watermark
    }

    /// Largest height a page may reach when pulling content back.
    pub fn reflow_limit_px(&self) -> f32 {
        self.target_height_px() + self.reflow.tolerance_px
    }

    /// Structural validation plus the registered-embed check.
    pub fn validate_content(&self, delta: &Delta) -> Result<(), DeltaError> {
        delta.validate_document()?;
        for (index, op) in delta.ops.iter().enumerate() {
            if let Op::Insert { insert: insert @ Insert::Embed(_), .. } = op {
                let kind = insert.embed_kind().unwrap_or_default();
                if !self.embed_types.iter().any(|t| t == kind) {
                    return Err(DeltaError::UnregisteredEmbed {
                        index,
                        kind: kind.to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Drop `size`/`font` values outside the whitelists. Other attributes,
    /// including unknown ones, pass through.
    pub fn sanitize_attributes(&self, attrs: &Attributes) -> Attributes {
        let mut out = attrs.clone();
        out.retain(|key, value| match (key.as_str(), value) {
            (attributes::SIZE, Value::String(s)) => self.font_sizes.contains(s),
            (attributes::FONT, Value::String(s)) => self.font_families.contains(s),
            _ => true,
        });
        out
    }

    /// Font size in px for a run with `attrs`.
    pub fn font_size_px(&self, attrs: &Attributes) -> f32 {
        attrs
            .get(attributes::SIZE)
            .and_then(Value::as_str)
            .filter(|s| self.font_sizes.iter().any(|w| w == s))
            .and_then(|s| s.strip_suffix("px"))
            .and_then(|n| n.parse::<f32>().ok())
            .unwrap_or(self.metrics.default_font_size_px)
    }
}
