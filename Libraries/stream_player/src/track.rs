use std::fmt;

use mp4_box::fragment::rewrite_fragment_for_playback;
use mp4_box::writer::{AudioParams, ProtectionParams, TrackInfo, TrackParams, VideoParams, TRACK_TIMESCALE};
use tracing::{debug, info, warn};

use crate::config::TrackThresholds;
use crate::error::{PlayerError, Result};
use crate::manifest::{AdaptationSet, CodecPrivate, ProtectionInfo, Representation, Segment, StreamFormat, TrackKind};
use crate::sink::{range_containing, MediaSink, TimeRange};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekPhase {
    None,
    Started,
    EnoughData,
}

/// Externally visible state of a track.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackState {
    Uninitialized,
    Ready,
    Seeking,
    Exhausted,
}

// Media held back while a seek is buffering. Bytes are kept contiguous, the time span separately.
#[derive(Debug, Default)]
struct SeekCache {
    bytes: Vec<u8>,
    span: Option<TimeRange>,
}

impl SeekCache {
    fn clear(&mut self) {
        self.bytes.clear();
        self.span = None;
    }
}

/// Append state of one elementary track.
///
/// Owns the track's representations, so the per-representation initialization cache lives here
/// as well. The segment cursor is `None` until the next request position has been derived from
/// the playback time.
pub struct TrackBuffer {
    kind: TrackKind,
    format: StreamFormat,
    representations: Vec<Representation>,
    current: usize,
    cursor: Option<usize>,
    active: bool,
    seek_phase: SeekPhase,
    cache: SeekCache,
    thresholds: TrackThresholds,
    protection: Option<ProtectionInfo>,
    reset_reason: Option<String>,
}

impl fmt::Debug for TrackBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrackBuffer")
            .field("kind", &self.kind)
            .field("format", &self.format)
            .field("levels", &self.representations.len())
            .field("current", &self.current)
            .field("cursor", &self.cursor)
            .field("active", &self.active)
            .field("seek_phase", &self.seek_phase)
            .field("cached_bytes", &self.cache.bytes.len())
            .finish()
    }
}

impl TrackBuffer {
    pub fn new(
        set: AdaptationSet,
        format: StreamFormat,
        protection: Option<ProtectionInfo>,
        thresholds: TrackThresholds,
    ) -> Self {
        TrackBuffer {
            kind: set.kind,
            format,
            representations: set.representations,
            current: 0,
            cursor: None,
            active: true,
            seek_phase: SeekPhase::None,
            cache: SeekCache::default(),
            thresholds,
            protection,
            reset_reason: None,
        }
    }

    pub fn kind(&self) -> TrackKind {
        self.kind
    }

    pub fn format(&self) -> StreamFormat {
        self.format
    }

    pub fn level(&self) -> usize {
        self.current
    }

    pub fn ladder(&self) -> Vec<u64> {
        self.representations.iter().map(|r| r.bandwidth).collect()
    }

    pub fn representations(&self) -> &[Representation] {
        &self.representations
    }

    pub fn current_rep(&self) -> &Representation {
        &self.representations[self.current]
    }

    pub fn current_rep_mut(&mut self) -> &mut Representation {
        &mut self.representations[self.current]
    }

    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }

    pub fn cursor_segment(&self) -> Option<&Segment> {
        self.cursor.and_then(|i| self.current_rep().segments.get(i))
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn is_initialized(&self) -> bool {
        self.current_rep().initialized
    }

    pub fn is_encrypted(&self) -> bool {
        self.protection.is_some()
    }

    pub fn seek_phase(&self) -> SeekPhase {
        self.seek_phase
    }

    pub fn set_seek_phase(&mut self, phase: SeekPhase) {
        if phase != self.seek_phase {
            debug!("{} seek phase {:?} -> {:?}", self.kind, self.seek_phase, phase);
        }
        self.seek_phase = phase;
    }

    pub fn reset_reason(&self) -> Option<&str> {
        self.reset_reason.as_deref()
    }

    pub fn cached_bytes(&self) -> usize {
        self.cache.bytes.len()
    }

    pub fn state(&self) -> TrackState {
        if !self.active {
            TrackState::Exhausted
        } else if !self.is_initialized() {
            TrackState::Uninitialized
        } else if self.seek_phase == SeekPhase::Started {
            TrackState::Seeking
        } else {
            TrackState::Ready
        }
    }

    /// Forgets the append position and the current representation's initialization.
    ///
    /// The segment lists are untouched. Cached seek data is dropped.
    pub fn reset(&mut self, reason: &str, sink: &mut dyn MediaSink) {
        debug!("{} track reset: {}", self.kind, reason);
        self.cursor = None;
        self.current_rep_mut().initialized = false;
        self.reset_reason = Some(reason.to_string());
        self.cache.clear();
        if sink.is_open() {
            sink.abort(self.kind);
        }
    }

    /// Switches to `level`. Returns `false` when nothing changed.
    pub fn change_quality(&mut self, level: usize, sink: &mut dyn MediaSink) -> bool {
        if level == self.current || level >= self.representations.len() {
            return false;
        }
        let old = self.current_rep().bandwidth;
        let new = self.representations[level].bandwidth;
        let reason = if old > new { "rep_down" } else { "rep_up" };
        self.reset(reason, sink);
        self.current = level;
        true
    }

    /// Seconds buffered ahead of `now`.
    pub fn buffer_size(&self, now: f64, sink: &dyn MediaSink) -> f64 {
        let ranges = sink.buffered(self.kind);
        let mut end = range_containing(&ranges, now).map(|r| r.end).unwrap_or(0.0);
        if let Some(segment) = self.cursor_segment() {
            end = end.max(segment.time);
        }
        end - now
    }

    /// Index of the first segment whose window contains `time`.
    pub fn find_segment_for_time(&self, time: f64) -> Option<usize> {
        self.current_rep().segments.iter().position(|s| s.contains(time))
    }

    /// Positions the cursor for the next request and returns it, or `None` when the buffer ahead
    /// of `now` is already long enough or no segment matches.
    pub fn next_fragment(&mut self, now: f64, sink: &dyn MediaSink) -> Option<usize> {
        let enough = self.thresholds.enough_buffer;
        let range = range_containing(&sink.buffered(self.kind), now);
        let next_time = range.map(|r| r.end).unwrap_or(now);
        if next_time > now + enough {
            return None;
        }

        match self.cursor {
            None => {
                self.cursor = self.find_segment_for_time(next_time);
                debug!("{} cursor derived for {:.3}s: {:?}", self.kind, next_time, self.cursor);
            }
            Some(_) => {
                if range.is_none() {
                    warn!("{} playback head outside buffer in append-continue state", self.kind);
                }
                if let Some(segment) = self.cursor_segment() {
                    if segment.time > now + enough {
                        return None;
                    }
                }
            }
        }
        self.cursor.filter(|i| *i < self.current_rep().segments.len())
    }

    pub fn set_init_fragment(&mut self, init: Vec<u8>) {
        self.current_rep_mut().init_fragment = Some(init);
    }

    /// Replaces the current representation's segments with those read from its index.
    pub fn set_segments(&mut self, segments: Vec<Segment>) {
        debug!("{} level {}: {} indexed segments", self.kind, self.current, segments.len());
        self.current_rep_mut().segments = segments;
    }

    /// Appends the cached initialization fragment and marks the representation initialized.
    pub fn append_init(&mut self, sink: &mut dyn MediaSink) -> Result<()> {
        let kind = self.kind;
        let rep = self.current_rep_mut();
        let init = rep
            .init_fragment
            .as_deref()
            .ok_or_else(|| PlayerError::MalformedContainer(format!("{} has no initialization fragment", kind)))?;
        let len = init.len();
        sink.append(kind, init, None)?;
        rep.initialized = true;
        debug!("{} initialized level with {} bytes", kind, len);
        Ok(())
    }

    /// Appends the media bytes of the segment under the cursor and advances the cursor.
    ///
    /// Fragment-list media is rewritten before anything changes, so a malformed fragment leaves
    /// the track where it was. While a seek is buffering the bytes are held back until the
    /// cached span reaches the resume threshold or the last segment arrives, then flushed in a
    /// single append.
    pub fn append_media(&mut self, data: &[u8], sink: &mut dyn MediaSink) -> Result<()> {
        let Some(index) = self.cursor else {
            warn!("{} media response without a segment cursor, dropped", self.kind);
            return Ok(());
        };
        let segment = self
            .current_rep()
            .segments
            .get(index)
            .cloned()
            .ok_or_else(|| PlayerError::MalformedContainer(format!("{} has no segment {}", self.kind, index)))?;
        let span = TimeRange::new(segment.time, segment.end_time());

        let bytes = match self.format {
            StreamFormat::SmoothStreaming => {
                let decode_time = decode_time(&segment, self.current_rep().timescale)?;
                rewrite_fragment_for_playback(data, decode_time, self.is_encrypted())?
            }
            StreamFormat::Dash => data.to_vec(),
        };

        let next = index + 1;
        let last = next >= self.current_rep().segments.len();

        if self.seek_phase == SeekPhase::Started {
            let start = self.cache.span.map(|s| s.start).unwrap_or(span.start);
            let previous_len = self.cache.bytes.len();
            self.cache.bytes.extend_from_slice(&bytes);
            // the end of the stream releases whatever was cached
            if start + self.thresholds.seek_resume <= span.end || last {
                if let Err(e) = sink.append(self.kind, &self.cache.bytes, Some(TimeRange::new(start, span.end))) {
                    self.cache.bytes.truncate(previous_len);
                    return Err(e);
                }
                debug!("{} flushed {} cached bytes for [{:.3}, {:.3}]", self.kind, self.cache.bytes.len(), start, span.end);
                self.cache.clear();
                self.set_seek_phase(SeekPhase::EnoughData);
            } else {
                self.cache.span = Some(TimeRange::new(start, span.end));
            }
        } else {
            sink.append(self.kind, &bytes, Some(span))?;
        }

        self.cursor = Some(next);
        if last {
            self.active = false;
            info!("{} track exhausted after {} segments", self.kind, next);
        }
        Ok(())
    }

    /// Codec description used to synthesize the current representation's initialization segment.
    pub fn track_info(&self) -> Result<TrackInfo> {
        let rep = self.current_rep();
        let params = match &rep.codec_private {
            CodecPrivate::Avc { sps, pps } => {
                let dimension = |value: Option<u32>, name: &str| -> Result<u16> {
                    value
                        .and_then(|v| u16::try_from(v).ok())
                        .ok_or_else(|| PlayerError::unsupported(format!("video level needs a 16-bit {}", name)))
                };
                TrackParams::Video(VideoParams {
                    width: dimension(rep.width, "width")?,
                    height: dimension(rep.height, "height")?,
                    sps: sps.clone(),
                    pps: pps.clone(),
                })
            }
            CodecPrivate::Aac { config, sample_rate, .. } => TrackParams::Audio(AudioParams {
                sample_rate: sample_rate
                    .or(rep.audio_sampling_rate)
                    .ok_or_else(|| PlayerError::unsupported("audio level without a sampling rate"))?,
                audio_specific_config: config.clone(),
            }),
            CodecPrivate::None => {
                return Err(PlayerError::unsupported(format!(
                    "{} level {} has no codec private data",
                    self.kind, self.current
                )))
            }
        };
        let protection = self.protection.as_ref().map(|p| ProtectionParams {
            system_id: p.system_id,
            header: p.header.clone(),
            key_id: p.key_id,
            iv_size: p.iv_size,
        });
        Ok(TrackInfo { params, protection })
    }
}

// Manifest ticks rescaled to the synthesized track's timescale.
fn decode_time(segment: &Segment, timescale: Option<u64>) -> Result<u64> {
    let ticks = segment.time_ticks.unwrap_or_default();
    let timescale = timescale.unwrap_or(TRACK_TIMESCALE).max(1);
    u64::try_from(ticks as u128 * TRACK_TIMESCALE as u128 / timescale as u128)
        .map_err(|_| PlayerError::MalformedContainer(format!("decode time of {} ticks overflows", ticks)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::MemorySink;

    fn track(durations: &[f64]) -> TrackBuffer {
        let mut time = 0.0;
        let segments: Vec<Segment> = durations
            .iter()
            .map(|d| {
                let s = Segment::timed(time, *d);
                time += d;
                s
            })
            .collect();
        let reps = [500_000, 1_500_000]
            .iter()
            .map(|bw| Representation {
                bandwidth: *bw,
                url: "http://h/v.mp4".to_string(),
                segments: segments.clone(),
                init_fragment: Some(b"init".to_vec()),
                ..Default::default()
            })
            .collect();
        let set = AdaptationSet {
            kind: TrackKind::Video,
            mime: "video/mp4".to_string(),
            codecs: String::new(),
            representations: reps,
            content_protection: None,
        };
        TrackBuffer::new(set, StreamFormat::Dash, None, TrackThresholds::default())
    }

    #[test]
    fn same_level_switch_changes_nothing() {
        let mut sink = MemorySink::new();
        let mut t = track(&[2.0; 4]);
        t.append_init(&mut sink).unwrap();
        assert_eq!(t.next_fragment(0.0, &sink), Some(0));
        assert!(!t.change_quality(0, &mut sink));
        assert_eq!(t.cursor(), Some(0));
        assert!(t.is_initialized());
        assert!(sink.track(TrackKind::Video).unwrap().aborts == 0);
    }

    #[test]
    fn switch_resets_to_uninitialized() {
        let mut sink = MemorySink::new();
        let mut t = track(&[2.0; 4]);
        t.append_init(&mut sink).unwrap();
        assert_eq!(t.state(), TrackState::Ready);
        for _ in 0..2 {
            t.next_fragment(0.0, &sink);
            t.append_media(b"seg", &mut sink).unwrap();
        }

        assert!(t.change_quality(1, &mut sink));
        assert_eq!(t.state(), TrackState::Uninitialized);
        assert_eq!(t.reset_reason(), Some("rep_up"));
        assert_eq!(t.cursor(), None);
        assert_eq!(t.level(), 1);
        // restarts at the segment ending on the buffered edge
        assert_eq!(t.next_fragment(0.5, &sink), Some(1));
    }

    #[test]
    fn segment_lookup() {
        let t = track(&[2.0, 2.0, 2.0]);
        assert_eq!(t.find_segment_for_time(0.0), Some(0));
        assert_eq!(t.find_segment_for_time(3.0), Some(1));
        assert_eq!(t.find_segment_for_time(6.0), Some(2));
        assert_eq!(t.find_segment_for_time(7.0), None);
    }

    #[test]
    fn stops_requesting_with_enough_buffer() {
        let mut sink = MemorySink::new();
        let mut t = track(&[10.0; 4]);
        t.append_init(&mut sink).unwrap();
        for _ in 0..3 {
            let index = t.next_fragment(0.0, &sink).unwrap();
            assert_eq!(Some(index), t.cursor());
            t.append_media(b"x", &mut sink).unwrap();
        }
        assert_eq!(t.buffer_size(0.0, &sink), 30.0);
        assert_eq!(t.next_fragment(0.0, &sink), None);
        assert_eq!(t.next_fragment(15.0, &sink), Some(3));
    }

    #[test]
    fn last_append_exhausts_the_track() {
        let mut sink = MemorySink::new();
        let mut t = track(&[2.0, 2.0]);
        t.append_init(&mut sink).unwrap();
        t.next_fragment(0.0, &sink);
        t.append_media(b"a", &mut sink).unwrap();
        t.next_fragment(0.0, &sink);
        t.append_media(b"b", &mut sink).unwrap();
        assert_eq!(t.state(), TrackState::Exhausted);
        assert!(!t.is_active());
        assert_eq!(t.buffer_size(1.0, &sink), 3.0);
    }

    #[test]
    fn seek_cache_flushes_once_past_resume_threshold() {
        let mut sink = MemorySink::new();
        let mut t = track(&[1.8, 1.7, 1.7, 2.0]);
        t.append_init(&mut sink).unwrap();
        t.reset("seeking", &mut sink);
        t.set_seek_phase(SeekPhase::Started);
        t.append_init(&mut sink).unwrap();
        assert_eq!(t.state(), TrackState::Seeking);

        for (i, payload) in [b"aa", b"bb"].iter().enumerate() {
            assert_eq!(t.next_fragment(0.0, &sink), Some(i));
            t.append_media(*payload, &mut sink).unwrap();
            assert_eq!(t.state(), TrackState::Seeking);
        }
        assert_eq!(t.cached_bytes(), 4);
        assert!(sink.buffered(TrackKind::Video).is_empty());

        t.next_fragment(0.0, &sink);
        t.append_media(b"cc", &mut sink).unwrap();
        assert_eq!(t.cached_bytes(), 0);
        assert_eq!(t.seek_phase(), SeekPhase::EnoughData);
        assert_eq!(t.state(), TrackState::Ready);

        let video = sink.track(TrackKind::Video).unwrap();
        let (len, span) = *video.appends.last().unwrap();
        assert_eq!(len, 6);
        let span = span.unwrap();
        assert_eq!(span.start, 0.0);
        assert!((span.end - 5.2).abs() < 1e-9);
    }

    #[test]
    fn seek_cache_flushes_at_the_last_segment() {
        let mut sink = MemorySink::new();
        let mut t = track(&[2.0, 1.5]);
        t.append_init(&mut sink).unwrap();
        t.reset("seeking", &mut sink);
        t.set_seek_phase(SeekPhase::Started);
        t.append_init(&mut sink).unwrap();

        t.next_fragment(0.0, &sink);
        t.append_media(b"aa", &mut sink).unwrap();
        assert_eq!(t.cached_bytes(), 2);
        t.next_fragment(0.0, &sink);
        t.append_media(b"bb", &mut sink).unwrap();

        // 3.5s never reaches the resume threshold, the tail is appended anyway
        assert_eq!(t.cached_bytes(), 0);
        assert_eq!(t.seek_phase(), SeekPhase::EnoughData);
        assert_eq!(t.state(), TrackState::Exhausted);
        assert_eq!(sink.buffered(TrackKind::Video), vec![TimeRange::new(0.0, 3.5)]);
        let (len, _) = *sink.track(TrackKind::Video).unwrap().appends.last().unwrap();
        assert_eq!(len, 4);
    }

    #[test]
    fn reset_discards_unflushed_seek_data() {
        let mut sink = MemorySink::new();
        let mut t = track(&[2.0; 4]);
        t.append_init(&mut sink).unwrap();
        t.set_seek_phase(SeekPhase::Started);
        t.next_fragment(0.0, &sink);
        t.append_media(b"aa", &mut sink).unwrap();
        assert_eq!(t.cached_bytes(), 2);
        t.reset("seeking", &mut sink);
        assert_eq!(t.cached_bytes(), 0);
        assert_eq!(t.cursor(), None);
    }

    #[test]
    fn track_info_requires_codec_data() {
        let t = track(&[2.0]);
        assert!(matches!(t.track_info(), Err(PlayerError::UnsupportedFeature(_))));
    }
}
