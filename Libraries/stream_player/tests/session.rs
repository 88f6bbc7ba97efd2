mod common;

use std::sync::Arc;

use stream_player::abr::{AbrPolicy, AdaptivePolicy};
use stream_player::estimator::{shared_estimator, with_estimator};
use stream_player::manifest::{AdaptationSet, ByteRange, StreamFormat, TrackKind};
use stream_player::orchestrator::FragmentOrchestrator;
use stream_player::session::{PlaybackCommand, Session};
use stream_player::track::{SeekPhase, TrackBuffer, TrackState};
use stream_player::transport::RecordingTransport;
use stream_player::{MemorySink, PlayerConfig, PlayerEvent};

use common::{audio_init, media, ranged_set, respond};

fn session_for(set: AdaptationSet, config: &PlayerConfig) -> (Session, Arc<RecordingTransport>) {
    let transport = Arc::new(RecordingTransport::new());
    let track = TrackBuffer::new(set, StreamFormat::Dash, None, config.track_thresholds());
    let orchestrator = FragmentOrchestrator::new(track, None, transport.clone());
    (Session::new(vec![orchestrator], config), transport)
}

// Answers the most recent request with `body`.
fn answer(session: &mut Session, transport: &RecordingTransport, sink: &mut MemorySink, body: Vec<u8>) {
    let request = transport.last().unwrap();
    session.on_response(respond(&request, 200, body), sink);
}

fn track_state(session: &Session) -> TrackState {
    session.orchestrator(TrackKind::Video).unwrap().track().state()
}

#[test]
fn seek_buffers_until_the_resume_threshold_then_flushes_once() {
    let config = PlayerConfig::default();
    let set = ranged_set(TrackKind::Video, &[800_000], &[2.0, 2.0, 1.2, 2.0, 2.0]);
    let (mut session, transport) = session_for(set, &config);
    let mut sink = MemorySink::new();

    session.tick(0.0, &mut sink);
    answer(&mut session, &transport, &mut sink, audio_init());
    assert_eq!(track_state(&session), TrackState::Ready);

    session.seek_started(&mut sink);
    assert_eq!(session.seek_phase(), SeekPhase::Started);
    assert_eq!(sink.track(TrackKind::Video).unwrap().aborts, 1);

    // the reset representation is initialized again before media flows
    session.tick(0.0, &mut sink);
    assert_eq!(track_state(&session), TrackState::Seeking);
    answer(&mut session, &transport, &mut sink, media(100));
    session.tick(0.0, &mut sink);
    answer(&mut session, &transport, &mut sink, media(100));

    let track = session.orchestrator(TrackKind::Video).unwrap().track();
    assert_eq!(track.cached_bytes(), 200);
    assert!(sink.track(TrackKind::Video).unwrap().appends.iter().all(|(_, span)| span.is_none()));
    assert!(!session.has_enough_data_on_seek());

    session.tick(0.0, &mut sink);
    answer(&mut session, &transport, &mut sink, media(100));

    let appends = &sink.track(TrackKind::Video).unwrap().appends;
    assert_eq!(appends.len(), 3);
    let (len, span) = appends[2];
    assert_eq!(len, 300);
    let span = span.unwrap();
    assert_eq!(span.start, 0.0);
    assert!((span.end - 5.2).abs() < 1e-9);
    assert_eq!(session.orchestrator(TrackKind::Video).unwrap().track().cached_bytes(), 0);

    session.tick(0.0, &mut sink);
    assert_eq!(session.seek_phase(), SeekPhase::EnoughData);
    session.seek_completed();
    assert_eq!(session.seek_phase(), SeekPhase::None);
    assert_eq!(track_state(&session), TrackState::Ready);
}

#[test]
fn seeking_cancels_the_request_in_flight() {
    let config = PlayerConfig::default();
    let (mut session, transport) = session_for(ranged_set(TrackKind::Video, &[800_000], &[2.0, 2.0]), &config);
    let mut sink = MemorySink::new();

    session.tick(0.0, &mut sink);
    answer(&mut session, &transport, &mut sink, audio_init());
    session.tick(0.0, &mut sink);
    let in_flight = transport.last().unwrap();

    session.seek_started(&mut sink);
    assert!(transport.was_cancelled(&in_flight));
    assert_eq!(session.orchestrator(TrackKind::Video).unwrap().track().reset_reason(), Some("seeking"));

    // the late completion is dropped
    session.on_response(respond(&in_flight, 200, media(100)), &mut sink);
    assert_eq!(sink.track(TrackKind::Video).unwrap().appends.len(), 1);
    assert_eq!(session.orchestrator(TrackKind::Video).unwrap().track().cached_bytes(), 0);

    session.tick(0.0, &mut sink);
    let reissued = transport.last().unwrap();
    assert_ne!(reissued.id, in_flight.id);
    assert_eq!(reissued.range, in_flight.range);
}

#[test]
fn autoplay_resumes_pauses_and_ends() {
    let config = PlayerConfig { autoplay: true, ..PlayerConfig::default() };
    let (mut session, transport) = session_for(ranged_set(TrackKind::Video, &[800_000], &[2.0; 5]), &config);
    let mut sink = MemorySink::new();
    assert!(session.is_paused() && session.is_autopaused());

    session.tick(0.0, &mut sink);
    answer(&mut session, &transport, &mut sink, audio_init());
    for _ in 0..3 {
        assert_eq!(session.tick(0.0, &mut sink), None);
        answer(&mut session, &transport, &mut sink, media(100));
    }

    // 6s buffered ahead
    assert_eq!(session.tick(0.0, &mut sink), Some(PlaybackCommand::Play));
    assert!(!session.is_paused());

    // under a second left in front of the playhead
    assert_eq!(session.tick(5.5, &mut sink), Some(PlaybackCommand::Pause));
    assert!(session.is_autopaused());

    session.user_pause();
    answer(&mut session, &transport, &mut sink, media(100));
    // a user pause is never lifted automatically
    assert_eq!(session.tick(5.5, &mut sink), None);
    assert!(session.is_paused());
    answer(&mut session, &transport, &mut sink, media(100));

    assert_eq!(session.tick(5.5, &mut sink), None);
    assert!(session.is_ended());
    assert!(sink.is_ended());
    assert_eq!(
        session.drain_events(),
        vec![PlayerEvent::TrackExhausted { track: TrackKind::Video }, PlayerEvent::EndOfStream]
    );

    // nothing happens after the end
    assert_eq!(session.tick(5.5, &mut sink), None);
    assert!(session.drain_events().is_empty());
}

#[test]
fn user_play_overrides_the_autopause() {
    let config = PlayerConfig::default();
    let (mut session, transport) = session_for(ranged_set(TrackKind::Video, &[800_000], &[2.0; 3]), &config);
    let mut sink = MemorySink::new();
    assert!(session.is_paused() && !session.is_autopaused());

    session.tick(0.0, &mut sink);
    answer(&mut session, &transport, &mut sink, audio_init());
    for _ in 0..2 {
        session.tick(0.0, &mut sink);
        answer(&mut session, &transport, &mut sink, media(100));
    }
    // playback was never requested
    assert_eq!(session.tick(0.0, &mut sink), None);
    assert!(session.is_paused());

    session.user_play();
    assert!(!session.is_paused());
    assert_eq!(session.tick(0.5, &mut sink), None);
}

// Answers the most recent request issued for `kind`.
fn answer_track(session: &mut Session, transport: &RecordingTransport, sink: &mut MemorySink, kind: TrackKind, body: Vec<u8>) {
    let request = transport.requests().into_iter().rev().find(|r| r.track == kind).unwrap();
    session.on_response(respond(&request, 200, body), sink);
}

fn adaptive_session(bits_per_second: u64) -> (Session, Arc<RecordingTransport>) {
    let estimator = shared_estimator();
    with_estimator(&estimator, |e| {
        for _ in 0..2000 {
            e.observe(bits_per_second / 8, 1000.0);
        }
    });
    let config = PlayerConfig::default();
    let transport = Arc::new(RecordingTransport::new());
    let video = TrackBuffer::new(
        ranged_set(TrackKind::Video, &[500_000, 1_500_000], &[2.0, 2.0, 2.0]),
        StreamFormat::Dash,
        None,
        config.track_thresholds(),
    );
    let audio = TrackBuffer::new(
        ranged_set(TrackKind::Audio, &[128_000], &[2.0, 2.0, 2.0]),
        StreamFormat::Dash,
        None,
        config.track_thresholds(),
    );
    let policy: Box<dyn AbrPolicy> = Box::new(AdaptivePolicy::new(estimator));
    let orchestrators = vec![
        FragmentOrchestrator::new(video, Some(policy), transport.clone()),
        FragmentOrchestrator::new(audio, None, transport.clone()),
    ];
    (Session::new(orchestrators, &config), transport)
}

// Runs both tracks through initialization and their first segment, then reaches the first
// decision past the cooldown.
fn first_decision(session: &mut Session, transport: &RecordingTransport, sink: &mut MemorySink) {
    for body in [audio_init(), media(100)] {
        session.tick(0.0, sink);
        answer_track(session, transport, sink, TrackKind::Video, body.clone());
        answer_track(session, transport, sink, TrackKind::Audio, body);
    }
    session.tick(0.0, sink);
}

#[test]
fn a_one_megabit_estimate_keeps_the_lowest_video_level() {
    let (mut session, transport) = adaptive_session(1_000_000);
    let mut sink = MemorySink::new();
    first_decision(&mut session, &transport, &mut sink);

    // 1.5 Mbit/s is above 0.85 * 1 Mbit/s - 128 kbit/s
    let video = session.orchestrator(TrackKind::Video).unwrap();
    assert_eq!(video.track().level(), 0);
    let request = video.outstanding().unwrap();
    assert_eq!(request.url, "http://media.example/vod/video_500000.mp4");
    assert_eq!(request.range, Some(ByteRange::new(2000, 2999)));
    assert!(session.drain_events().is_empty());
}

#[test]
fn a_three_megabit_estimate_switches_video_only() {
    let (mut session, transport) = adaptive_session(3_000_000);
    let mut sink = MemorySink::new();
    first_decision(&mut session, &transport, &mut sink);

    assert_eq!(session.orchestrator(TrackKind::Video).unwrap().track().level(), 1);
    assert_eq!(session.orchestrator(TrackKind::Audio).unwrap().track().level(), 0);
    assert_eq!(
        session.drain_events(),
        vec![PlayerEvent::QualitySwitch { track: TrackKind::Video, old_bandwidth: 500_000, new_bandwidth: 1_500_000 }]
    );
}
