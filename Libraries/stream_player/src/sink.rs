use std::collections::HashMap;

use crate::error::{PlayerError, Result};
use crate::manifest::TrackKind;

// Gaps smaller than this between appended spans are treated as contiguous.
const MERGE_TOLERANCE: f64 = 1e-3;

/// Presentation interval in seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeRange {
    pub start: f64,
    pub end: f64,
}

impl TimeRange {
    pub fn new(start: f64, end: f64) -> Self {
        TimeRange { start, end }
    }

    pub fn contains(&self, time: f64) -> bool {
        self.start <= time && time <= self.end
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// Destination of the appended media, one buffer per track.
///
/// Appends for a track arrive in request order. Media appends carry the presentation span of the
/// segment they hold so the sink can report buffered ranges without decoding anything;
/// initialization appends carry none.
pub trait MediaSink: Send {
    fn append(&mut self, track: TrackKind, data: &[u8], span: Option<TimeRange>) -> Result<()>;

    /// Buffered ranges of `track`, sorted and disjoint.
    fn buffered(&self, track: TrackKind) -> Vec<TimeRange>;

    /// Drops any partially parsed data for `track`. Buffered ranges are kept.
    fn abort(&mut self, track: TrackKind);

    fn is_open(&self) -> bool;

    fn end_of_stream(&mut self);
}

/// Returns the range of `ranges` that contains `time`.
pub fn range_containing(ranges: &[TimeRange], time: f64) -> Option<TimeRange> {
    ranges.iter().copied().find(|r| r.contains(time))
}

/// Sorted, merged set of buffered intervals.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BufferedRanges {
    ranges: Vec<TimeRange>,
}

impl BufferedRanges {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, range: TimeRange) {
        if range.end < range.start {
            return;
        }
        let mut merged = range;
        let mut kept = Vec::with_capacity(self.ranges.len() + 1);
        for existing in self.ranges.drain(..) {
            if existing.end + MERGE_TOLERANCE < merged.start || merged.end + MERGE_TOLERANCE < existing.start {
                kept.push(existing);
            } else {
                merged.start = merged.start.min(existing.start);
                merged.end = merged.end.max(existing.end);
            }
        }
        kept.push(merged);
        kept.sort_by(|a, b| a.start.total_cmp(&b.start));
        self.ranges = kept;
    }

    pub fn ranges(&self) -> &[TimeRange] {
        &self.ranges
    }

    pub fn end(&self) -> Option<f64> {
        self.ranges.last().map(|r| r.end)
    }
}

#[derive(Debug, Default)]
pub struct MemoryTrack {
    pub data: Vec<u8>,
    pub appends: Vec<(usize, Option<TimeRange>)>,   // (byte length, span) per append call
    pub ranges: BufferedRanges,
    pub aborts: usize,
}

/// Sink keeping everything in memory, for hosts that consume the bytes themselves and for tests.
#[derive(Debug)]
pub struct MemorySink {
    tracks: HashMap<TrackKind, MemoryTrack>,
    open: bool,
    ended: bool,
}

impl Default for MemorySink {
    fn default() -> Self {
        MemorySink { tracks: HashMap::new(), open: true, ended: false }
    }
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn track(&self, track: TrackKind) -> Option<&MemoryTrack> {
        self.tracks.get(&track)
    }

    pub fn is_ended(&self) -> bool {
        self.ended
    }

    pub fn close(&mut self) {
        self.open = false;
    }
}

impl MediaSink for MemorySink {
    fn append(&mut self, track: TrackKind, data: &[u8], span: Option<TimeRange>) -> Result<()> {
        if !self.open {
            return Err(PlayerError::transport(format!("{} append on a closed sink", track)));
        }
        let entry = self.tracks.entry(track).or_default();
        entry.data.extend_from_slice(data);
        entry.appends.push((data.len(), span));
        if let Some(span) = span {
            entry.ranges.insert(span);
        }
        Ok(())
    }

    fn buffered(&self, track: TrackKind) -> Vec<TimeRange> {
        self.tracks
            .get(&track)
            .map(|t| t.ranges.ranges().to_vec())
            .unwrap_or_default()
    }

    fn abort(&mut self, track: TrackKind) {
        self.tracks.entry(track).or_default().aborts += 1;
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn end_of_stream(&mut self) {
        self.ended = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adjacent_spans_merge() {
        let mut ranges = BufferedRanges::new();
        ranges.insert(TimeRange::new(4.0, 6.0));
        ranges.insert(TimeRange::new(0.0, 2.0));
        ranges.insert(TimeRange::new(2.0, 4.0));
        ranges.insert(TimeRange::new(10.0, 12.0));
        assert_eq!(ranges.ranges(), &[TimeRange::new(0.0, 6.0), TimeRange::new(10.0, 12.0)]);
        assert_eq!(range_containing(ranges.ranges(), 5.0), Some(TimeRange::new(0.0, 6.0)));
        assert_eq!(range_containing(ranges.ranges(), 8.0), None);
        assert_eq!(ranges.end(), Some(12.0));
    }

    #[test]
    fn memory_sink_records_appends() {
        let mut sink = MemorySink::new();
        sink.append(TrackKind::Video, b"init", None).unwrap();
        sink.append(TrackKind::Video, b"frag", Some(TimeRange::new(0.0, 2.0))).unwrap();
        let video = sink.track(TrackKind::Video).unwrap();
        assert_eq!(video.data, b"initfrag");
        assert_eq!(video.appends.len(), 2);
        assert_eq!(sink.buffered(TrackKind::Video), vec![TimeRange::new(0.0, 2.0)]);
        assert!(sink.buffered(TrackKind::Audio).is_empty());

        sink.close();
        assert!(sink.append(TrackKind::Audio, b"x", None).is_err());
    }
}
