#![allow(dead_code)]

use bytes::Bytes;
use mp4_box::writer::{synthesize_init_segment, AudioParams, TrackInfo, TrackParams};
use stream_player::manifest::{AdaptationSet, ByteRange, Representation, Segment, TrackKind};
use stream_player::orchestrator::{FragmentRequest, FragmentResponse};

pub const MANIFEST_URL: &str = "http://media.example/vod/stream.mpd";

pub fn audio_init() -> Vec<u8> {
    synthesize_init_segment(&TrackInfo {
        params: TrackParams::Audio(AudioParams {
            sample_rate: 44_100,
            audio_specific_config: vec![0x12, 0x10],
        }),
        protection: None,
    })
}

/// One representation per bandwidth, all sharing the same byte-ranged segment layout.
pub fn ranged_set(kind: TrackKind, bandwidths: &[u64], durations: &[f64]) -> AdaptationSet {
    let mut segments = Vec::new();
    let mut time = 0.0;
    for (i, duration) in durations.iter().enumerate() {
        let start = 1000 + 1000 * i as u64;
        segments.push(Segment {
            range: Some(ByteRange::new(start, start + 999)),
            ..Segment::timed(time, *duration)
        });
        time += duration;
    }
    let mime = match kind {
        TrackKind::Audio => "audio/mp4",
        TrackKind::Video => "video/mp4",
    };
    let representations = bandwidths
        .iter()
        .map(|bandwidth| Representation {
            bandwidth: *bandwidth,
            mime_type: Some(mime.to_string()),
            url: format!("http://media.example/vod/{}_{}.mp4", kind, bandwidth),
            init_range: Some(ByteRange::new(0, 999)),
            segments: segments.clone(),
            ..Default::default()
        })
        .collect();
    AdaptationSet {
        kind,
        mime: mime.to_string(),
        codecs: String::new(),
        representations,
        content_protection: None,
    }
}

pub fn respond(request: &FragmentRequest, status: u16, body: Vec<u8>) -> FragmentResponse {
    FragmentResponse { id: request.id, track: request.track, result: Ok((status, Bytes::from(body))) }
}

/// Stand-in media payload. Segment-index content is appended as received, so any bytes do.
pub fn media(len: usize) -> Vec<u8> {
    vec![0x5A; len]
}
