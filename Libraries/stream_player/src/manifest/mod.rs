//! Uniform presentation model shared by both manifest formats.
//!
//! A [`Manifest`] holds at most one audio and one video [`AdaptationSet`]. Each set lists its
//! [`Representation`]s (the quality ladder) and every representation carries its own time-ordered
//! [`Segment`] list. The DASH and Smooth Streaming decoders live in [`dash`] and [`smooth`].

pub mod dash;
pub mod elements;
pub mod smooth;

use std::fmt;

use indexmap::IndexMap;
use tracing::debug;

use crate::error::{PlayerError, Result};

/// Flavor name (`playready`, `widevine`, ...) to license server URL, in document order.
pub type ProtectionMap = IndexMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamFormat {
    Dash,
    SmoothStreaming,
}

impl StreamFormat {
    pub fn from_url(url: &str) -> Self {
        if url.ends_with(".mpd") {
            StreamFormat::Dash
        } else {
            StreamFormat::SmoothStreaming
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TrackKind {
    Audio,
    Video,
}

impl TrackKind {
    pub fn from_mime(mime: &str) -> Option<Self> {
        if mime.contains("video") {
            Some(TrackKind::Video)
        } else if mime.contains("audio") {
            Some(TrackKind::Audio)
        } else {
            None
        }
    }
}

impl fmt::Display for TrackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackKind::Audio => write!(f, "audio"),
            TrackKind::Video => write!(f, "video"),
        }
    }
}

/// Inclusive byte range, as used by the HTTP `Range` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    pub fn new(start: u64, end: u64) -> Self {
        ByteRange { start, end }
    }

    /// Parses `a-b`.
    pub fn parse(text: &str) -> Option<Self> {
        let (start, end) = text.trim().split_once('-')?;
        let start = start.trim().parse().ok()?;
        let end = end.trim().parse().ok()?;
        (end >= start).then_some(ByteRange { start, end })
    }

    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    pub fn spec(&self) -> String {
        format!("{}-{}", self.start, self.end)
    }
}

/// One fetchable unit of media.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub time: f64,                  // start, seconds
    pub duration: f64,              // seconds
    pub range: Option<ByteRange>,   // None fetches the whole resource
    pub time_ticks: Option<u64>,    // start in manifest ticks, template-addressed formats only
    pub index_end: Option<u64>,     // last byte of this segment's index data, if listed
    pub url: Option<String>,        // overrides the representation url
}

impl Segment {
    pub fn timed(time: f64, duration: f64) -> Self {
        Segment { time, duration, range: None, time_ticks: None, index_end: None, url: None }
    }

    pub fn end_time(&self) -> f64 {
        self.time + self.duration
    }

    pub fn contains(&self, time: f64) -> bool {
        self.time <= time && time <= self.end_time()
    }
}

/// Codec parameters needed to synthesize an initialization segment.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum CodecPrivate {
    #[default]
    None,
    Avc {
        sps: Vec<u8>,
        pps: Vec<u8>,
    },
    Aac {
        config: Vec<u8>,
        sample_rate: Option<u32>,
        channels: Option<u16>,
        bits_per_sample: Option<u16>,
        packet_size: Option<u32>,
    },
}

/// One encoded quality of a track.
///
/// The manifest fields are fixed after normalization. `init_fragment`, `initialized` and, for
/// indexed DASH content, `segments` are filled in while playing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Representation {
    pub id: Option<String>,
    pub bandwidth: u64,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub frame_rate: Option<f64>,
    pub audio_sampling_rate: Option<u32>,
    pub mime_type: Option<String>,
    pub codecs: Option<String>,
    pub quality_ranking: Option<u32>,
    pub url: String,
    pub codec_private: CodecPrivate,
    pub segments: Vec<Segment>,
    pub timescale: Option<u64>,
    pub init_range: Option<ByteRange>,
    pub index_range: Option<ByteRange>,
    pub init_fragment: Option<Vec<u8>>,
    pub initialized: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AdaptationSet {
    pub kind: TrackKind,
    pub mime: String,
    pub codecs: String,
    pub representations: Vec<Representation>,
    pub content_protection: Option<ProtectionMap>,
}

impl AdaptationSet {
    pub fn bitrates(&self) -> Vec<u64> {
        self.representations.iter().map(|r| r.bandwidth).collect()
    }
}

/// Protection data advertised by a Smooth Streaming manifest.
#[derive(Clone, PartialEq)]
pub struct ProtectionInfo {
    pub system_id: [u8; 16],
    pub header: Vec<u8>,
    pub iv_size: u8,
    pub key_id: [u8; 16],   // GUID byte order, as carried in the header
}

impl fmt::Debug for ProtectionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProtectionInfo")
            .field("system_id", &uuid::Uuid::from_bytes(self.system_id))
            .field("header_len", &self.header.len())
            .field("iv_size", &self.iv_size)
            .field("key_id", &uuid::Uuid::from_bytes_le(self.key_id))
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Manifest {
    pub format: StreamFormat,
    pub url: String,
    pub duration: f64,
    pub adaptation_sets: Vec<AdaptationSet>,
    pub protection: Option<ProtectionInfo>,
}

impl Manifest {
    /// Decodes `raw` according to `format` into the uniform model.
    pub fn normalize(raw: &str, format: StreamFormat, url: &str) -> Result<Self> {
        let manifest = match format {
            StreamFormat::Dash => dash::parse(raw, url)?,
            StreamFormat::SmoothStreaming => smooth::parse(raw, url)?,
        };
        for set in &manifest.adaptation_sets {
            if set.representations.is_empty() {
                return Err(PlayerError::manifest(format!("{} adaptation set has no representations", set.kind)));
            }
            for rep in &set.representations {
                check_segment_order(&rep.segments)?;
            }
        }
        debug!(
            "normalized {:?} manifest: {:.3}s, {} adaptation set(s)",
            format,
            manifest.duration,
            manifest.adaptation_sets.len()
        );
        Ok(manifest)
    }

    pub fn is_encrypted(&self) -> bool {
        self.protection.is_some()
    }
}

const ORDER_TOLERANCE: f64 = 1e-6;

/// Segments must be time-ordered without overlap.
pub fn check_segment_order(segments: &[Segment]) -> Result<()> {
    for pair in segments.windows(2) {
        if pair[1].time + ORDER_TOLERANCE < pair[0].end_time() {
            return Err(PlayerError::manifest(format!(
                "segment at {:.3}s overlaps previous segment ending at {:.3}s",
                pair[1].time,
                pair[0].end_time()
            )));
        }
    }
    Ok(())
}

/// Keeps the last adaptation set of each kind, preserving document order among the survivors.
pub(crate) fn select_last_per_kind(sets: Vec<AdaptationSet>) -> Vec<AdaptationSet> {
    let mut keep = vec![false; sets.len()];
    let (mut audio, mut video) = (false, false);
    for (i, set) in sets.iter().enumerate().rev() {
        let seen = match set.kind {
            TrackKind::Audio => &mut audio,
            TrackKind::Video => &mut video,
        };
        if !*seen {
            *seen = true;
            keep[i] = true;
        }
    }
    sets.into_iter()
        .zip(keep)
        .filter_map(|(set, keep)| keep.then_some(set))
        .collect()
}

/// Resolves `target` against `base`. Absolute targets pass through.
pub fn resolve_url(base: &str, target: &str) -> Result<String> {
    let target = target.trim();
    if let Ok(absolute) = url::Url::parse(target) {
        return Ok(absolute.to_string());
    }
    let base = url::Url::parse(base)
        .map_err(|e| PlayerError::manifest(format!("invalid manifest url '{}': {}", base, e)))?;
    base.join(target)
        .map(|u| u.to_string())
        .map_err(|e| PlayerError::manifest(format!("cannot resolve '{}': {}", target, e)))
}

/// Parses `PT#H#M#S` durations (fractional seconds allowed) or a plain number of seconds.
pub fn parse_duration(text: &str) -> Option<f64> {
    let text = text.trim();
    if let Ok(iso) = iso8601_duration::Duration::parse(text) {
        return iso.to_std().map(|d| d.as_secs_f64());
    }
    text.parse::<f64>().ok().filter(|v| v.is_finite() && *v >= 0.0)
}

pub(crate) fn parse_hex(text: &str) -> Option<Vec<u8>> {
    let text = text.trim();
    if text.len() % 2 != 0 || !text.is_ascii() {
        return None;
    }
    (0..text.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&text[i..i + 2], 16).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment(time: f64, duration: f64) -> Segment {
        Segment::timed(time, duration)
    }

    #[test]
    fn format_follows_url_suffix() {
        assert_eq!(StreamFormat::from_url("http://h/a/manifest.mpd"), StreamFormat::Dash);
        assert_eq!(StreamFormat::from_url("http://h/a.ism/Manifest"), StreamFormat::SmoothStreaming);
    }

    #[test]
    fn byte_ranges() {
        let range = ByteRange::parse("100-199").unwrap();
        assert_eq!(range.len(), 100);
        assert_eq!(range.spec(), "100-199");
        assert!(ByteRange::parse("200-100").is_none());
        assert!(ByteRange::parse("abc").is_none());
    }

    #[test]
    fn durations() {
        assert_eq!(parse_duration("PT1H2M3S"), Some(3723.0));
        assert!((parse_duration("PT634.566S").unwrap() - 634.566).abs() < 1e-3);
        assert_eq!(parse_duration("12.5"), Some(12.5));
        assert_eq!(parse_duration("soon"), None);
    }

    #[test]
    fn relative_urls_resolve_against_manifest() {
        assert_eq!(resolve_url("http://h/a/b.mpd", "v.mp4").unwrap(), "http://h/a/v.mp4");
        assert_eq!(resolve_url("http://h/a/b.mpd", "/v.mp4").unwrap(), "http://h/v.mp4");
        assert_eq!(resolve_url("http://h/a/b.mpd", "https://cdn/x.mp4").unwrap(), "https://cdn/x.mp4");
    }

    #[test]
    fn overlapping_segments_are_rejected() {
        assert!(check_segment_order(&[segment(0.0, 2.0), segment(2.0, 2.0)]).is_ok());
        assert!(check_segment_order(&[segment(0.0, 2.0), segment(1.5, 2.0)]).is_err());
    }

    #[test]
    fn hex_strings() {
        assert_eq!(parse_hex("00ff1A"), Some(vec![0x00, 0xFF, 0x1A]));
        assert_eq!(parse_hex("abc"), None);
        assert_eq!(parse_hex("zz"), None);
    }
}
