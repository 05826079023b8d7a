use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use clap::ValueEnum;
use segmentation::{region_from_segment, SegmentTable, SegmentationError, SegmenterConfig};
use serde::Serialize;
use strum::{Display, EnumString, IntoStaticStr};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error(transparent)]
    Segmentation(#[from] SegmentationError),
    #[error(transparent)]
    Image(#[from] image::ImageError),
    #[error(transparent)]
    SerdeError(#[from] serde_json::Error),
    #[error(transparent)]
    IoError(#[from] std::io::Error),
    #[error("Invalid override '{0}', expected stage.parameter=value")]
    InvalidOverride(String),
}

/// How the ordered segment table is printed
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default,
    ValueEnum, Display, EnumString, IntoStaticStr,
)]
#[strum(serialize_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Json,
    Csv,
    Text,
}

/// Everything reported for one segmented page
#[derive(Debug, Clone, Serialize)]
pub struct SegmentReport {
    pub input: String,
    pub width: u32,
    pub height: u32,
    pub segments: SegmentTable,
}

impl SegmentReport {
    pub fn new(input: &Path, width: u32, height: u32, segments: SegmentTable) -> Self {
        Self {
            input: input.display().to_string(),
            width,
            height,
            segments,
        }
    }

    pub fn render(&self, format: OutputFormat) -> Result<String, CliError> {
        let rendered = match format {
            OutputFormat::Json => serde_json::to_string_pretty(self)?,
            OutputFormat::Csv => {
                let mut out = String::from("index,x,y,width,height\n");
                for (index, s) in self.segments.iter().enumerate() {
                    let _ = writeln!(out, "{index},{},{},{},{}", s.x, s.y, s.width, s.height);
                }
                out
            }
            OutputFormat::Text => {
                let mut out = format!(
                    "{}: {}x{}, {} segments\n",
                    self.input,
                    self.width,
                    self.height,
                    self.segments.len()
                );
                for (index, s) in self.segments.iter().enumerate() {
                    let _ = writeln!(out, "{index:>4}  x={:<5} y={:<5} w={:<4} h={}", s.x, s.y, s.width, s.height);
                }
                out
            }
        };
        Ok(rendered)
    }
}

/// Split a `stage.parameter=value` override.
pub fn parse_override(raw: &str) -> Result<(String, String), CliError> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => Ok((key.trim().to_string(), value.trim().to_string())),
        _ => Err(CliError::InvalidOverride(raw.to_string())),
    }
}

/// Load the configuration file, if any, and apply the overrides in order.
pub fn load_config(path: Option<&Path>, overrides: &[String]) -> Result<SegmenterConfig, CliError> {
    let mut config = match path {
        Some(path) => SegmenterConfig::from_file(path)?,
        None => SegmenterConfig::default(),
    };
    for raw in overrides {
        let (key, value) = parse_override(raw)?;
        config.set(&key, &value)?;
    }
    Ok(config)
}

/// Save one PNG per segment into `dir`, named by reading order position.
pub fn save_crops(image: &image::RgbImage, segments: &SegmentTable, dir: &Path) -> Result<Vec<PathBuf>, CliError> {
    fs::create_dir_all(dir)?;
    let mut written = Vec::new();
    for (index, segment) in segments.iter().enumerate() {
        let Some(region) = region_from_segment(image, segment) else {
            continue;
        };
        let path = dir.join(format!("segment_{index:04}.png"));
        region.save(&path)?;
        written.push(path);
    }
    Ok(written)
}
