//! Piecewise time/pixel conversion over timeframe panels.
//!
//! A panel maps `[start, end]` onto `(end - start) / resolution` pixels.
//! Panels are laid out left to right; a compressed region becomes a narrow
//! panel of its own so long idle stretches do not eat the screen.

use crate::aggregator::TimeGap;
use crate::utils::config::COMPRESSED_PANEL_WIDTH;
use crate::utils::error::TimelineError;
use serde::{Deserialize, Serialize};

/// Panel as requested, before pixel positions are assigned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawPanel {
    pub start: u64,
    pub end: u64,
    /// Nanoseconds per pixel
    pub resolution: u64,
    #[serde(default)]
    pub compressed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeframePanel {
    pub start: u64,
    pub end: u64,
    pub resolution: u64,
    pub compressed: bool,
    pub pixel_start: u64,
    pub pixel_end: u64,
}

/// Where a time lands on screen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PixelPosition {
    pub pixel_offset: u64,
    pub panel: usize,
}

/// Converter over a sorted, non-overlapping panel list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimePixelConverter {
    panels: Vec<TimeframePanel>,
}

impl TimePixelConverter {
    /// Assign pixel ranges to `raw` panels in order
    ///
    /// # Errors
    /// * `TimelineError::ZeroResolution` - a panel has resolution 0
    pub fn new(raw: &[RawPanel]) -> Result<Self, TimelineError> {
        let mut pixel_offset = 0;
        let mut panels = Vec::with_capacity(raw.len());
        for (index, panel) in raw.iter().enumerate() {
            if panel.resolution == 0 {
                return Err(TimelineError::ZeroResolution { index });
            }
            let pixel_start = pixel_offset;
            pixel_offset += panel.end.saturating_sub(panel.start) / panel.resolution;
            panels.push(TimeframePanel {
                start: panel.start,
                end: panel.end,
                resolution: panel.resolution,
                compressed: panel.compressed,
                pixel_start,
                pixel_end: pixel_offset,
            });
        }
        Ok(Self { panels })
    }

    pub fn panels(&self) -> &[TimeframePanel] {
        &self.panels
    }

    /// Last panel's end pixel plus one, 0 without panels
    pub fn total_pixel_length(&self) -> u64 {
        self.panels.last().map_or(0, |panel| panel.pixel_end + 1)
    }

    /// Pixel column of `time`, `None` outside every panel
    pub fn pixel_offset(&self, time: u64) -> Option<PixelPosition> {
        let first = self.panels.first()?;
        if time < first.start {
            return None;
        }

        // A panel starting exactly at `time` wins over the one before it
        let at_or_after = self.panels.partition_point(|panel| panel.start < time);
        let index = if at_or_after == self.panels.len() || time < self.panels[at_or_after].start {
            at_or_after - 1
        } else {
            at_or_after
        };

        let panel = &self.panels[index];
        if panel.start <= time && time <= panel.end {
            Some(PixelPosition {
                pixel_offset: panel.pixel_start + (time - panel.start) / panel.resolution,
                panel: index,
            })
        } else {
            None
        }
    }

    /// Start time of pixel column `pixel`, `None` past the last panel
    pub fn pixel_to_time(&self, pixel: u64) -> Option<u64> {
        let index = self.panels.partition_point(|panel| panel.pixel_end <= pixel);
        let panel = self.panels.get(index).or_else(|| {
            // The final pixel belongs to the last panel
            self.panels.last().filter(|panel| panel.pixel_end == pixel)
        })?;
        let time = panel.start + (pixel - panel.pixel_start) * panel.resolution;
        Some(time.min(panel.end))
    }
}

/// Panels covering `[start, end]` at `resolution`, with each compressed
/// region collapsed into a narrow panel
///
/// Regions are expected in time order; parts outside `[start, end]` are cut.
pub fn panels_around(start: u64, end: u64, resolution: u64, regions: &[TimeGap]) -> Vec<RawPanel> {
    let resolution = resolution.max(1);
    let mut panels = Vec::new();
    let mut cursor = start;

    for region in regions {
        let region_start = region.start_time.max(cursor);
        let region_end = region.end_time.min(end);
        if region_start >= region_end {
            continue;
        }
        if region_start > cursor {
            panels.push(RawPanel {
                start: cursor,
                end: region_start,
                resolution,
                compressed: false,
            });
        }
        panels.push(RawPanel {
            start: region_start,
            end: region_end,
            resolution: ((region_end - region_start) / COMPRESSED_PANEL_WIDTH).max(1),
            compressed: true,
        });
        cursor = region_end;
    }

    if cursor < end || panels.is_empty() {
        panels.push(RawPanel {
            start: cursor,
            end,
            resolution,
            compressed: false,
        });
    }
    panels
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(start: u64, end: u64, resolution: u64) -> RawPanel {
        RawPanel {
            start,
            end,
            resolution,
            compressed: false,
        }
    }

    #[test]
    fn test_refine_assigns_pixel_ranges() {
        let converter = TimePixelConverter::new(&[raw(0, 100, 10), raw(100, 1100, 100)]).unwrap();
        let panels = converter.panels();
        assert_eq!((panels[0].pixel_start, panels[0].pixel_end), (0, 10));
        assert_eq!((panels[1].pixel_start, panels[1].pixel_end), (10, 20));
        assert_eq!(converter.total_pixel_length(), 21);
    }

    #[test]
    fn test_pixel_offset() {
        let converter = TimePixelConverter::new(&[raw(0, 100, 10), raw(100, 1100, 100)]).unwrap();
        assert_eq!(
            converter.pixel_offset(55),
            Some(PixelPosition { pixel_offset: 5, panel: 0 })
        );
        // Boundary time belongs to the panel that starts there
        assert_eq!(
            converter.pixel_offset(100),
            Some(PixelPosition { pixel_offset: 10, panel: 1 })
        );
        assert_eq!(
            converter.pixel_offset(350),
            Some(PixelPosition { pixel_offset: 12, panel: 1 })
        );
        assert_eq!(converter.pixel_offset(2000), None);
    }

    #[test]
    fn test_pixel_to_time() {
        let converter = TimePixelConverter::new(&[raw(0, 100, 10), raw(100, 1100, 100)]).unwrap();
        assert_eq!(converter.pixel_to_time(3), Some(30));
        assert_eq!(converter.pixel_to_time(10), Some(100));
        assert_eq!(converter.pixel_to_time(20), Some(1100));
        assert_eq!(converter.pixel_to_time(21), None);
    }

    #[test]
    fn test_zero_resolution_rejected() {
        assert_eq!(
            TimePixelConverter::new(&[raw(0, 10, 0)]).unwrap_err(),
            TimelineError::ZeroResolution { index: 0 }
        );
    }

    #[test]
    fn test_panels_around_compressed_regions() {
        let regions = [TimeGap { start_time: 100, end_time: 10_100 }];
        let panels = panels_around(0, 20_000, 10, &regions);
        assert_eq!(panels.len(), 3);
        assert_eq!(panels[0], raw(0, 100, 10));
        assert!(panels[1].compressed);
        assert_eq!(panels[1].resolution, 200);
        assert_eq!((panels[2].start, panels[2].end), (10_100, 20_000));

        let converter = TimePixelConverter::new(&panels).unwrap();
        assert_eq!(converter.panels()[1].pixel_end - converter.panels()[1].pixel_start, 50);
    }
}
