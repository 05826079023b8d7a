use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};

use crate::error::{Result, SegmentationError};

/// Number of columns of a segment table: `x, y, width, height`.
pub const SEGMENT_COLUMNS: usize = 4;

/// Orientation every producer and consumer of segment tables agrees on.
pub const SEGMENTS_ORIENTATION: Orientation = Orientation::Rows;

/// An axis-aligned rectangle in image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct Segment {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Segment {
    pub const fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// One past the right-most column
    pub fn right(&self) -> u32 {
        self.x.saturating_add(self.width)
    }

    /// One past the bottom row
    pub fn bottom(&self) -> u32 {
        self.y.saturating_add(self.height)
    }

    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    pub fn is_degenerate(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Whether `other` lies entirely within this rectangle (edges may touch).
    pub fn contains(&self, other: &Segment) -> bool {
        self.x <= other.x
            && self.y <= other.y
            && other.right() <= self.right()
            && other.bottom() <= self.bottom()
    }

    pub fn as_tuple(&self) -> (u32, u32, u32, u32) {
        (self.x, self.y, self.width, self.height)
    }

    fn values(&self) -> [u32; SEGMENT_COLUMNS] {
        [self.x, self.y, self.width, self.height]
    }
}

impl From<(u32, u32, u32, u32)> for Segment {
    fn from((x, y, width, height): (u32, u32, u32, u32)) -> Self {
        Self::new(x, y, width, height)
    }
}

/// Memory layout of a [`SegmentTable`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash,
    Serialize, Deserialize, JsonSchema,
    Display, EnumString, IntoStaticStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Orientation {
    /// Each row holds one segment: `x0 y0 w0 h0 x1 y1 ...`
    Rows,
    /// Each column holds one segment: `x0 x1 ... y0 y1 ...`
    Columns,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum Column {
    X,
    Y,
    Width,
    Height,
}

impl Column {
    pub const ALL: [Column; SEGMENT_COLUMNS] = [Column::X, Column::Y, Column::Width, Column::Height];

    pub fn index(self) -> usize {
        match self {
            Column::X => 0,
            Column::Y => 1,
            Column::Width => 2,
            Column::Height => 3,
        }
    }
}

/// Fixed-width numeric table of segments shared by every stage.
///
/// Values are stored as `u16`, so each coordinate and dimension must fit in
/// `[0, 65535]`. Conversions reject anything outside that range instead of
/// truncating it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "TableRepr", try_from = "TableRepr")]
pub struct SegmentTable {
    orientation: Orientation,
    len: usize,
    data: Vec<u16>,
}

impl SegmentTable {
    /// An empty table in the global orientation
    pub fn empty() -> Self {
        Self::empty_with_orientation(SEGMENTS_ORIENTATION)
    }

    pub fn empty_with_orientation(orientation: Orientation) -> Self {
        Self {
            orientation,
            len: 0,
            data: Vec::new(),
        }
    }

    /// Build a table from segments using [`SEGMENTS_ORIENTATION`].
    pub fn from_segments(segments: &[Segment]) -> Result<Self> {
        Self::from_segments_with_orientation(segments, SEGMENTS_ORIENTATION)
    }

    pub fn from_segments_with_orientation(
        segments: &[Segment],
        orientation: Orientation,
    ) -> Result<Self> {
        let rows = segments
            .iter()
            .map(|segment| encode_row(segment.values().map(i64::from)))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::from_rows(&rows, orientation))
    }

    /// Build a table from plain `(x, y, width, height)` tuples.
    ///
    /// Negative values and values above `u16::MAX` are reported as
    /// [`SegmentationError::OutOfRange`].
    pub fn from_tuples(tuples: &[(i64, i64, i64, i64)]) -> Result<Self> {
        Self::from_tuples_with_orientation(tuples, SEGMENTS_ORIENTATION)
    }

    pub fn from_tuples_with_orientation(
        tuples: &[(i64, i64, i64, i64)],
        orientation: Orientation,
    ) -> Result<Self> {
        let rows = tuples
            .iter()
            .map(|&(x, y, w, h)| encode_row([x, y, w, h]))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::from_rows(&rows, orientation))
    }

    fn from_rows(rows: &[[u16; SEGMENT_COLUMNS]], orientation: Orientation) -> Self {
        let len = rows.len();
        let mut data = vec![0u16; len * SEGMENT_COLUMNS];
        for (row, values) in rows.iter().enumerate() {
            for (column, &value) in values.iter().enumerate() {
                data[flat_index(orientation, len, row, column)] = value;
            }
        }
        Self {
            orientation,
            len,
            data,
        }
    }

    pub fn orientation(&self) -> Orientation {
        self.orientation
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Raw storage, laid out according to [`Self::orientation`].
    pub fn as_raw(&self) -> &[u16] {
        &self.data
    }

    pub fn value(&self, row: usize, column: Column) -> u16 {
        self.data[flat_index(self.orientation, self.len, row, column.index())]
    }

    pub fn get(&self, row: usize) -> Option<Segment> {
        if row >= self.len {
            return None;
        }
        let [x, y, width, height] = Column::ALL.map(|column| self.value(row, column) as u32);
        Some(Segment::new(x, y, width, height))
    }

    pub fn iter(&self) -> impl Iterator<Item = Segment> + '_ {
        (0..self.len).filter_map(move |row| self.get(row))
    }

    pub fn column(&self, column: Column) -> Vec<u16> {
        (0..self.len).map(|row| self.value(row, column)).collect()
    }

    /// Convert back into segments; the inverse of [`Self::from_segments`].
    pub fn to_segments(&self) -> Vec<Segment> {
        self.iter().collect()
    }

    pub fn to_tuples(&self) -> Vec<(i64, i64, i64, i64)> {
        self.iter()
            .map(|s| (s.x as i64, s.y as i64, s.width as i64, s.height as i64))
            .collect()
    }

    /// Keep the rows whose mask entry is `true`, preserving their order.
    pub fn select(&self, mask: &[bool]) -> Self {
        let indices: Vec<usize> = mask
            .iter()
            .enumerate()
            .filter_map(|(row, &keep)| keep.then_some(row))
            .collect();
        self.take(&indices)
    }

    /// New table made of the given rows in the given order.
    pub fn take(&self, indices: &[usize]) -> Self {
        let rows: Vec<[u16; SEGMENT_COLUMNS]> = indices
            .iter()
            .filter(|&&row| row < self.len)
            .map(|&row| Column::ALL.map(|column| self.value(row, column)))
            .collect();
        Self::from_rows(&rows, self.orientation)
    }

    /// Same segments laid out in another orientation.
    pub fn with_orientation(&self, orientation: Orientation) -> Self {
        if orientation == self.orientation {
            return self.clone();
        }
        let rows: Vec<[u16; SEGMENT_COLUMNS]> = (0..self.len)
            .map(|row| Column::ALL.map(|column| self.value(row, column)))
            .collect();
        Self::from_rows(&rows, orientation)
    }
}

impl Default for SegmentTable {
    fn default() -> Self {
        Self::empty()
    }
}

fn flat_index(orientation: Orientation, len: usize, row: usize, column: usize) -> usize {
    match orientation {
        Orientation::Rows => row * SEGMENT_COLUMNS + column,
        Orientation::Columns => column * len + row,
    }
}

fn encode_row(values: [i64; SEGMENT_COLUMNS]) -> Result<[u16; SEGMENT_COLUMNS]> {
    let mut row = [0u16; SEGMENT_COLUMNS];
    for (column, value) in Column::ALL.into_iter().zip(values) {
        row[column.index()] = u16::try_from(value).map_err(|_| SegmentationError::OutOfRange {
            column: column.into(),
            value,
        })?;
    }
    Ok(row)
}

/// Wire form of a segment table: `{"orientation": "rows", "segments": [[x, y, w, h], ...]}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct TableRepr {
    orientation: Orientation,
    segments: Vec<[i64; SEGMENT_COLUMNS]>,
}

impl From<SegmentTable> for TableRepr {
    fn from(table: SegmentTable) -> Self {
        Self {
            orientation: table.orientation,
            segments: table
                .iter()
                .map(|s| s.values().map(i64::from))
                .collect(),
        }
    }
}

impl TryFrom<TableRepr> for SegmentTable {
    type Error = SegmentationError;

    fn try_from(repr: TableRepr) -> Result<Self> {
        let rows = repr
            .segments
            .into_iter()
            .map(encode_row)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::from_rows(&rows, repr.orientation))
    }
}

/// One horizontal band of text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineBand {
    pub start: u32,
    pub end: u32,
    pub middle: u32,
}

/// Estimated text lines of a page, ordered top to bottom.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineEstimate {
    bands: Vec<LineBand>,
}

impl LineEstimate {
    pub fn new(bands: Vec<LineBand>) -> Self {
        Self { bands }
    }

    pub fn bands(&self) -> &[LineBand] {
        &self.bands
    }

    pub fn len(&self) -> usize {
        self.bands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bands.is_empty()
    }

    pub fn starts(&self) -> Vec<u32> {
        self.bands.iter().map(|band| band.start).collect()
    }

    /// Every boundary y-coordinate: start, end and middle of each band.
    pub fn coordinates(&self) -> Vec<u32> {
        self.bands
            .iter()
            .flat_map(|band| [band.start, band.end, band.middle])
            .collect()
    }
}

/// A scalar stage parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum ParamValue {
    Integer(i64),
    Float(f64),
    Text(String),
}

impl std::fmt::Display for ParamValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParamValue::Integer(value) => write!(f, "{value}"),
            ParamValue::Float(value) => write!(f, "{value}"),
            ParamValue::Text(value) => f.write_str(value),
        }
    }
}

impl From<u32> for ParamValue {
    fn from(value: u32) -> Self {
        ParamValue::Integer(value.into())
    }
}

impl From<f32> for ParamValue {
    fn from(value: f32) -> Self {
        ParamValue::Float(value.into())
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        ParamValue::Float(value)
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Text(value.to_string())
    }
}

/// Name to value map of a stage's configuration surface.
pub type Parameters = std::collections::BTreeMap<String, ParamValue>;
