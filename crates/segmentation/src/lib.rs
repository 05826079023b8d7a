//! # Page Segmentation Library
//!
//! Turns a scanned page into an ordered table of rectangular regions, one
//! per glyph or glyph cluster, ready to be handed to a text recognizer.
//!
//! ## Core Features
//!
//! - **Processor stacks**: stages composed into a chain that is itself a stage
//! - **Broadcast hooks**: values copied between stages at assembly-defined points
//! - **Contour segmentation**: adaptive thresholding and outer contour boxes
//! - **Filter chain**: geometric filters that can only remove segments
//! - **Reading order**: line grouping, top to bottom and left to right
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use segmentation::best_segmenter;
//!
//! let page = image::open("page.png")?.to_rgb8();
//! let run = best_segmenter(&page)?.segment(&page)?;
//! for segment in run.segments.iter() {
//!     println!("{:?}", segment.as_tuple());
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Custom Configuration
//!
//! ```rust,no_run
//! use segmentation::{ContourSegmenter, SegmenterConfig};
//!
//! let mut config = SegmenterConfig::from_file("segmenter.toml")?;
//! config.set("raw_contour.block_size", "15")?;
//! let segmenter = ContourSegmenter::new(&config)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod error;
pub mod types;
pub mod traits;
pub mod algorithms;
pub mod pipeline;
pub mod config;
pub mod render;

pub use error::{Result, SegmentationError};
pub use types::{
    Column, LineBand, LineEstimate, Orientation, ParamValue, Parameters, Segment, SegmentTable,
    SEGMENTS_ORIENTATION, SEGMENT_COLUMNS,
};
pub use traits::*;
pub use algorithms::*;
pub use pipeline::{
    attributes, builder::best_segmenter, Broadcast, ContourSegmenter, HookPoint, ProcessorStack,
    RunContext, SegmentationRun, Source, StageContext, StageHandles, StageId, Value,
};
pub use config::SegmenterConfig;
pub use render::{draw_segments, region_from_segment};
