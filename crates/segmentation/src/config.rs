//! Segmenter configuration.
//!
//! One section per pipeline stage, keyed by the stage name so that the keys
//! accepted by [`SegmenterConfig::set`] are the same `stage.parameter` keys
//! reported by the assembled pipeline's parameters.

use std::fs;
use std::path::Path;

use schemars::{schema::RootSchema, JsonSchema};
use serde::{Deserialize, Serialize};

use crate::{
    algorithms::{
        BlurProcessor, LargeAreaFilter, LargeFilter, NearLineFilter, RawContourSegmenter,
        SegmentOrderer, SmallFilter,
    },
    error::{Result, SegmentationError},
};

/// Full configuration of the contour segmentation pipeline
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default, deny_unknown_fields)]
pub struct SegmenterConfig {
    pub blur: BlurConfig,
    pub raw_contour: ContourConfig,
    pub large: LargeConfig,
    pub small: SmallConfig,
    pub large_area: LargeAreaConfig,
    pub near_line: NearLineConfig,
    pub orderer: OrdererConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default, deny_unknown_fields)]
pub struct BlurConfig {
    /// Gaussian standard deviation; 0 disables the blur
    pub sigma: f32,
}

impl Default for BlurConfig {
    fn default() -> Self {
        Self { sigma: 1.0 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default, deny_unknown_fields)]
pub struct ContourConfig {
    /// Side of the thresholding neighborhood; odd and greater than 1
    pub block_size: u32,
    /// How much darker than the local mean a pixel must be to count as ink
    pub c: f64,
}

impl Default for ContourConfig {
    fn default() -> Self {
        Self {
            block_size: 11,
            c: 10.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default, deny_unknown_fields)]
pub struct LargeConfig {
    pub min_width: u32,
    pub min_height: u32,
}

impl Default for LargeConfig {
    fn default() -> Self {
        let filter = LargeFilter::default();
        Self {
            min_width: filter.min_width,
            min_height: filter.min_height,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default, deny_unknown_fields)]
pub struct SmallConfig {
    pub max_width: u32,
    pub max_height: u32,
}

impl Default for SmallConfig {
    fn default() -> Self {
        let filter = SmallFilter::default();
        Self {
            max_width: filter.max_width,
            max_height: filter.max_height,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default, deny_unknown_fields)]
pub struct LargeAreaConfig {
    pub min_area: u32,
}

impl Default for LargeAreaConfig {
    fn default() -> Self {
        Self {
            min_area: LargeAreaFilter::default().min_area,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default, deny_unknown_fields)]
pub struct NearLineConfig {
    /// Number of standard deviations above the mean line distance still kept
    pub nearline_tolerance: f64,
    /// Rows of white space bridged when grouping segments into lines
    pub line_gap: u32,
}

impl Default for NearLineConfig {
    fn default() -> Self {
        let filter = NearLineFilter::default();
        Self {
            nearline_tolerance: filter.nearline_tolerance,
            line_gap: filter.line_gap,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default, deny_unknown_fields)]
pub struct OrdererConfig {
    /// Line grouping tolerance used when the page gives no line estimate
    pub max_line_height: u32,
}

impl Default for OrdererConfig {
    fn default() -> Self {
        Self {
            max_line_height: SegmentOrderer::default().max_line_height(),
        }
    }
}

impl SegmenterConfig {
    /// Load configuration from a TOML file
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Load configuration from a JSON file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    /// Auto-detect the file format from the extension and load
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Self::from_toml_file(path),
            Some("json") => Self::from_json_file(path),
            _ => Err(SegmentationError::UnsupportedFormat(format!(
                "{} (expected .toml or .json)",
                path.display()
            ))),
        }
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn to_toml_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        fs::write(path, self.to_toml()?)?;
        Ok(())
    }

    /// Override one parameter from its `stage.parameter` key and a textual
    /// value, e.g. `set("raw_contour.block_size", "15")`.
    ///
    /// The value is parsed as the type of the current one. Unknown keys and
    /// unparsable values are configuration errors and leave `self` unchanged.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let (section, parameter) = key
            .split_once('.')
            .ok_or_else(|| SegmentationError::config(key, "expected a 'stage.parameter' key"))?;

        let mut tree = toml::Value::try_from(&*self)?;
        let slot = tree
            .get_mut(section)
            .and_then(|table| table.get_mut(parameter))
            .ok_or_else(|| SegmentationError::config(key, "unknown parameter"))?;

        let invalid = |kind: &str| SegmentationError::config(key, format!("'{value}' is not a valid {kind}"));
        let replacement = match &*slot {
            toml::Value::Integer(_) => toml::Value::Integer(value.trim().parse().map_err(|_| invalid("integer"))?),
            toml::Value::Float(_) => toml::Value::Float(value.trim().parse().map_err(|_| invalid("number"))?),
            toml::Value::Boolean(_) => toml::Value::Boolean(value.trim().parse().map_err(|_| invalid("boolean"))?),
            _ => toml::Value::String(value.to_string()),
        };
        *slot = replacement;

        *self = tree
            .try_into()
            .map_err(|err: toml::de::Error| SegmentationError::config(key, err.message().to_string()))?;
        Ok(())
    }

    /// Check every value the stages would reject at construction.
    pub fn validate(&self) -> Result<()> {
        BlurProcessor::new(self.blur.sigma)?;
        RawContourSegmenter::new(self.raw_contour.block_size, self.raw_contour.c)?;
        let tolerance = self.near_line.nearline_tolerance;
        if !tolerance.is_finite() || tolerance < 0.0 {
            return Err(SegmentationError::config(
                "near_line.nearline_tolerance",
                format!("must be a finite value >= 0, got {tolerance}"),
            ));
        }
        Ok(())
    }

    /// JSON schema of the configuration file
    pub fn schema() -> RootSchema {
        schemars::schema_for!(SegmenterConfig)
    }
}
