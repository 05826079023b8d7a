//! Text line estimation from the vertical distribution of segments.

use crate::types::{LineBand, LineEstimate, SegmentTable};

/// Group segments into horizontal bands.
///
/// The vertical extents `[y, y + height)` are swept top to bottom; an extent
/// joins the current band when it starts no more than `line_gap` rows below
/// the band's end, otherwise it opens a new band. Degenerate segments carry
/// no vertical extent and are ignored.
pub fn guess_line_starts_ends_and_middles(segments: &SegmentTable, line_gap: u32) -> LineEstimate {
    let mut extents: Vec<(u32, u32)> = segments
        .iter()
        .filter(|segment| !segment.is_degenerate())
        .map(|segment| (segment.y, segment.bottom()))
        .collect();
    extents.sort_unstable();

    let mut bands = Vec::new();
    let mut current: Option<(u32, u32)> = None;
    for (top, bottom) in extents {
        current = match current {
            Some((start, end)) if top <= end.saturating_add(line_gap) => Some((start, end.max(bottom))),
            Some((start, end)) => {
                bands.push(band(start, end));
                Some((top, bottom))
            }
            None => Some((top, bottom)),
        };
    }
    if let Some((start, end)) = current {
        bands.push(band(start, end));
    }
    LineEstimate::new(bands)
}

fn band(start: u32, end: u32) -> LineBand {
    LineBand {
        start,
        end,
        middle: start + (end - start) / 2,
    }
}

/// y-coordinate where each line begins, top to bottom.
pub fn guess_line_starts(segments: &SegmentTable, line_gap: u32) -> Vec<u32> {
    guess_line_starts_ends_and_middles(segments, line_gap).starts()
}

/// Largest distance between two consecutive line starts.
///
/// `None` when there are fewer than two lines.
pub fn max_line_height(starts: &[u32]) -> Option<u32> {
    starts
        .windows(2)
        .map(|pair| pair[1].saturating_sub(pair[0]))
        .max()
}
