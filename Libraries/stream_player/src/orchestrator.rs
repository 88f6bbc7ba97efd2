use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use mp4_box::reader::{extract_init_segment, parse_segment_index};
use mp4_box::writer::synthesize_init_segment;
use regex::Regex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::abr::AbrPolicy;
use crate::error::Result;
use crate::manifest::smooth::{BITRATE_PLACEHOLDER, START_TIME_PLACEHOLDER};
use crate::manifest::{ByteRange, Segment, StreamFormat, TrackKind};
use crate::sink::MediaSink;
use crate::track::TrackBuffer;
use crate::PlayerEvent;

pub type RequestId = u64;

/// One HTTP GET the orchestrator wants performed.
#[derive(Debug, Clone, PartialEq)]
pub struct FragmentRequest {
    pub id: RequestId,
    pub track: TrackKind,
    pub url: String,
    pub range: Option<ByteRange>,   // sent as a Range header
    pub is_init: bool,
    pub is_index: bool,
    pub start_byte: u64,            // first byte of the response within the resource
}

impl FragmentRequest {
    pub fn range_header(&self) -> Option<String> {
        self.range.map(|r| format!("bytes={}", r.spec()))
    }
}

/// Handle on an issued request. Cancelling is fire-and-forget: a completion that still arrives
/// is recognized by its id and ignored.
#[derive(Debug, Clone)]
pub struct RequestHandle {
    pub id: RequestId,
    cancel: CancellationToken,
}

impl RequestHandle {
    pub fn new(id: RequestId, cancel: CancellationToken) -> Self {
        Self { id, cancel }
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// Completion of a request: the HTTP status and body, or the transport failure.
#[derive(Debug, Clone)]
pub struct FragmentResponse {
    pub id: RequestId,
    pub track: TrackKind,
    pub result: Result<(u16, Bytes)>,
}

/// Performs fragment requests without blocking the caller. Completions are delivered out of band
/// and handed back through [`FragmentOrchestrator::on_response`].
pub trait FragmentTransport: Send + Sync {
    fn issue(&self, request: FragmentRequest) -> RequestHandle;
}

/// Drives the requests of one track, one at a time.
pub struct FragmentOrchestrator {
    track: TrackBuffer,
    policy: Option<Box<dyn AbrPolicy>>,
    transport: Arc<dyn FragmentTransport>,
    outstanding: Option<(FragmentRequest, RequestHandle)>,
    next_id: RequestId,
    events: Vec<PlayerEvent>,
}

impl fmt::Debug for FragmentOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FragmentOrchestrator")
            .field("track", &self.track)
            .field("adaptive", &self.policy.is_some())
            .field("outstanding", &self.outstanding.as_ref().map(|(r, _)| r.id))
            .finish()
    }
}

impl FragmentOrchestrator {
    /// `policy` is only consulted for video tracks.
    pub fn new(track: TrackBuffer, policy: Option<Box<dyn AbrPolicy>>, transport: Arc<dyn FragmentTransport>) -> Self {
        let policy = policy.filter(|_| track.kind() == TrackKind::Video);
        Self { track, policy, transport, outstanding: None, next_id: 1, events: Vec::new() }
    }

    pub fn track(&self) -> &TrackBuffer {
        &self.track
    }

    pub fn track_mut(&mut self) -> &mut TrackBuffer {
        &mut self.track
    }

    pub fn kind(&self) -> TrackKind {
        self.track.kind()
    }

    pub fn outstanding(&self) -> Option<&FragmentRequest> {
        self.outstanding.as_ref().map(|(r, _)| r)
    }

    pub fn drain_events(&mut self) -> Vec<PlayerEvent> {
        std::mem::take(&mut self.events)
    }

    /// One polling step. Returns `false` once the track is inactive.
    pub fn tick(&mut self, now: f64, sink: &mut dyn MediaSink) -> bool {
        if !self.track.is_active() {
            trace!("{} not active", self.kind());
            return false;
        }
        if self.outstanding.is_some() {
            trace!("{} request pending", self.kind());
            return true;
        }
        if !self.prepare_initialization(sink) {
            return true;
        }

        let Some(index) = self.track.next_fragment(now, sink) else {
            return true;
        };

        if let Some(policy) = self.policy.as_mut() {
            if let Some(level) = policy.decide(&self.track.ladder(), self.track.level()) {
                let old_bandwidth = self.track.current_rep().bandwidth;
                self.cancel_requests();
                if self.track.change_quality(level, sink) {
                    let new_bandwidth = self.track.current_rep().bandwidth;
                    info!("{} quality switch {} -> {} bps", self.kind(), old_bandwidth, new_bandwidth);
                    self.events.push(PlayerEvent::QualitySwitch {
                        track: self.kind(),
                        old_bandwidth,
                        new_bandwidth,
                    });
                }
                return true;
            }
        }

        self.request_media(index);
        true
    }

    // Returns true when the track is initialized and may request media this tick.
    fn prepare_initialization(&mut self, sink: &mut dyn MediaSink) -> bool {
        if self.track.current_rep().init_fragment.is_none() {
            match self.track.format() {
                StreamFormat::SmoothStreaming => {
                    if let Err(e) = self.synthesize_init(sink) {
                        self.report_failure("initialization synthesis", &e.to_string());
                    }
                }
                StreamFormat::Dash => self.request_init(),
            }
            return false;
        }
        if !self.track.is_initialized() {
            if let Err(e) = self.track.append_init(sink) {
                self.report_failure("initialization append", &e.to_string());
                return false;
            }
        }
        true
    }

    fn synthesize_init(&mut self, sink: &mut dyn MediaSink) -> Result<()> {
        let info = self.track.track_info()?;
        let synthesized = synthesize_init_segment(&info);
        let init = extract_init_segment(&synthesized)?.to_vec();
        debug!("{} synthesized {} byte initialization segment", self.kind(), init.len());
        self.track.set_init_fragment(init);
        self.track.append_init(sink)
    }

    fn request_init(&mut self) {
        let rep = self.track.current_rep();
        let start = rep.init_range.map(|r| r.start).unwrap_or(0);
        let mut end = rep.init_range.map(|r| r.end);
        let mut is_index = false;
        // the index directly follows the initialization data, fetch both at once
        if let Some(index) = rep.index_range {
            end = Some(index.end);
            is_index = true;
        }
        let range = end.map(|end| ByteRange::new(start, end));
        let url = rep.url.clone();
        self.issue(url, range, true, is_index, start);
    }

    fn request_media(&mut self, index: usize) {
        let rep = self.track.current_rep();
        let Some(segment) = rep.segments.get(index) else {
            return;
        };
        match self.track.format() {
            StreamFormat::SmoothStreaming => {
                let url = fill_template(&rep.url, rep.bandwidth, segment);
                self.issue(url, None, false, false, 0);
            }
            StreamFormat::Dash => {
                let url = segment.url.clone().unwrap_or_else(|| rep.url.clone());
                let range = segment.range;
                self.issue(url, range, false, false, range.map(|r| r.start).unwrap_or(0));
            }
        }
    }

    fn issue(&mut self, url: String, range: Option<ByteRange>, is_init: bool, is_index: bool, start_byte: u64) {
        let (url, range) = range_in_query(url, range);
        let request = FragmentRequest {
            id: self.next_id,
            track: self.kind(),
            url,
            range,
            is_init,
            is_index,
            start_byte,
        };
        self.next_id += 1;
        debug!(
            "{} request {}: url={}, range={:?}, init={}, index={}",
            request.track, request.id, request.url, request.range_header(), is_init, is_index
        );
        let handle = self.transport.issue(request.clone());
        self.outstanding = Some((request, handle));
    }

    /// Cancels the outstanding request, if any.
    pub fn cancel_requests(&mut self) {
        if let Some((request, handle)) = self.outstanding.take() {
            debug!("{} cancelled request {}", request.track, request.id);
            handle.cancel();
        }
    }

    /// Handles the completion of a request issued by this orchestrator.
    pub fn on_response(&mut self, response: FragmentResponse, sink: &mut dyn MediaSink) {
        let current = self.outstanding.as_ref().map(|(r, _)| r.id);
        if current != Some(response.id) {
            debug!("{} ignoring completion of untracked request {}", self.kind(), response.id);
            return;
        }
        let Some((request, _)) = self.outstanding.take() else {
            return;
        };

        let data = match response.result {
            Ok((status, _)) if status >= 300 => {
                warn!("{} HTTP request failure, status={}", request.track, status);
                return;
            }
            Ok((_, data)) => data,
            Err(e) => {
                warn!("{} request {} failed: {}", request.track, request.id, e);
                return;
            }
        };

        if request.is_index {
            match parse_segment_index(&data, request.start_byte) {
                Ok(references) => {
                    let segments = references
                        .into_iter()
                        .map(|r| Segment {
                            time: r.time,
                            duration: r.duration,
                            range: Some(ByteRange::new(r.offset, r.offset + r.size.saturating_sub(1))),
                            time_ticks: None,
                            index_end: None,
                            url: None,
                        })
                        .collect();
                    self.track.set_segments(segments);
                }
                Err(e) => {
                    self.report_failure("segment index", &e.to_string());
                    return;
                }
            }
        }

        if request.is_init {
            match extract_init_segment(&data) {
                Ok(init) => {
                    self.track.set_init_fragment(init.to_vec());
                    if !self.track.is_initialized() {
                        if let Err(e) = self.track.append_init(sink) {
                            self.report_failure("initialization append", &e.to_string());
                        }
                    }
                }
                Err(e) => self.report_failure("initialization segment", &e.to_string()),
            }
            return;
        }

        match self.track.append_media(&data, sink) {
            Ok(()) if !self.track.is_active() => {
                self.events.push(PlayerEvent::TrackExhausted { track: self.kind() });
            }
            Ok(()) => {}
            Err(e) => self.report_failure("fragment", &e.to_string()),
        }
    }

    fn report_failure(&mut self, what: &str, error: &str) {
        warn!("{} {} dropped: {}", self.kind(), what, error);
        self.events.push(PlayerEvent::Warning(format!("{} {}: {}", self.kind(), what, error)));
    }
}

/// Substitutes the bitrate and start tick into a fragment URL template.
pub fn fill_template(template: &str, bandwidth: u64, segment: &Segment) -> String {
    let ticks = segment.time_ticks.unwrap_or_default();
    template
        .replace(BITRATE_PLACEHOLDER, &bandwidth.to_string())
        .replace(START_TIME_PLACEHOLDER, &ticks.to_string())
}

/// Hosts that take the byte range as a query parameter get it there instead of in a header.
pub fn range_in_query(url: String, range: Option<ByteRange>) -> (String, Option<ByteRange>) {
    let Some(range) = range else {
        return (url, None);
    };
    if !url.contains("youtube.com") {
        return (url, Some(range));
    }
    let stripped = match Regex::new(r"&range=[^&]*") {
        Ok(re) => re.replace_all(&url, "").into_owned(),
        Err(_) => url,
    };
    (format!("{}&range={}", stripped, range.spec()), None)
}
