mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc::{self, UnboundedSender};
use tokio_util::sync::CancellationToken;

use stream_player::estimator::shared_estimator;
use stream_player::manifest::{Manifest, StreamFormat, TrackKind};
use stream_player::orchestrator::{FragmentRequest, FragmentResponse, FragmentTransport, RequestHandle};
use stream_player::{MemorySink, PlayerCallback, PlayerConfig, PlayerError, PlayerEvent, StreamPlayer};

use common::{audio_init, media, respond, MANIFEST_URL};

// Completes every request as soon as it is issued.
struct LoopbackTransport {
    completions: UnboundedSender<FragmentResponse>,
}

impl FragmentTransport for LoopbackTransport {
    fn issue(&self, request: FragmentRequest) -> RequestHandle {
        let body = if request.is_init { audio_init() } else { media(256) };
        let _ = self.completions.send(respond(&request, 200, body));
        RequestHandle::new(request.id, CancellationToken::new())
    }
}

const SEGMENT_LIST: &str = r#"<MPD mediaPresentationDuration="PT6S"><Period>
  <AdaptationSet mimeType="audio/mp4" codecs="mp4a.40.2">
    <ContentProtection schemeIdUri="http://youtube.com/drm/2012/10/10">
      <yt:SystemURL type="widevine">https://license.example/wv</yt:SystemURL>
      <yt:SystemURL type="clearkey">https://license.example/ck</yt:SystemURL>
    </ContentProtection>
    <Representation bandwidth="128000" audioSamplingRate="44100"><BaseURL>audio.mp4</BaseURL>
      <SegmentList timescale="1000" duration="2000">
        <Initialization range="0-999"/>
        <SegmentURL mediaRange="1000-1999"/>
        <SegmentURL mediaRange="2000-2999"/>
        <SegmentURL mediaRange="3000-3999"/>
      </SegmentList>
    </Representation>
  </AdaptationSet>
</Period></MPD>"#;

fn recorder() -> (PlayerCallback, Arc<Mutex<Vec<PlayerEvent>>>) {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    let callback: PlayerCallback = Arc::new(move |event| sink.lock().unwrap().push(event));
    (callback, events)
}

fn player(config: PlayerConfig, callback: PlayerCallback) -> stream_player::Result<StreamPlayer> {
    let manifest = Manifest::normalize(SEGMENT_LIST, StreamFormat::Dash, MANIFEST_URL)?;
    let (completion_tx, completions) = mpsc::unbounded_channel();
    let transport = Arc::new(LoopbackTransport { completions: completion_tx });
    StreamPlayer::with_transport(
        config,
        manifest,
        Box::new(MemorySink::new()),
        callback,
        transport,
        shared_estimator(),
        completions,
    )
}

fn config() -> PlayerConfig {
    PlayerConfig {
        url: MANIFEST_URL.to_string(),
        autoplay: true,
        tick_interval_ms: 5,
        ..PlayerConfig::default()
    }
}

#[tokio::test]
async fn plays_to_the_end_of_the_stream() {
    let (callback, events) = recorder();
    let mut player = player(config(), callback).unwrap();

    tokio::time::timeout(Duration::from_secs(10), player.run(CancellationToken::new()))
        .await
        .expect("player did not finish")
        .unwrap();

    assert!(player.session().is_ended());
    let track = player.session().orchestrator(TrackKind::Audio).unwrap().track();
    assert_eq!(track.cursor(), Some(3));

    let events = events.lock().unwrap();
    assert!(matches!(events.first(), Some(PlayerEvent::KeySystemSelected { .. })));
    assert_eq!(
        events[1..],
        [PlayerEvent::TrackExhausted { track: TrackKind::Audio }, PlayerEvent::EndOfStream]
    );
}

#[tokio::test]
async fn preferred_flavor_selects_the_key_system() {
    let (callback, events) = recorder();
    let config = PlayerConfig { flavor: Some("clearkey".to_string()), ..config() };
    let _player = player(config, callback).unwrap();

    let events = events.lock().unwrap();
    assert_eq!(
        events.as_slice(),
        [PlayerEvent::KeySystemSelected {
            flavor: "clearkey".to_string(),
            key_system: "webkit-org.w3.clearkey".to_string(),
            license_url: "https://license.example/ck".to_string(),
            init_data: None,
        }]
    );

    let (callback, _) = recorder();
    let config = PlayerConfig { flavor: Some("playready".to_string()), ..PlayerConfig::default() };
    assert!(matches!(player(config, callback), Err(PlayerError::UnsupportedFeature(_))));
}

#[tokio::test]
async fn cancellation_stops_a_paused_player() {
    let (callback, _) = recorder();
    // two segments fill the forward buffer, so the stream never runs out
    let config = PlayerConfig { autoplay: false, enough_buffer_secs: 3.0, ..config() };
    let mut player = player(config, callback).unwrap();
    let handle = player.handle();

    let cancel = CancellationToken::new();
    let stopper = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        stopper.cancel();
    });
    tokio::time::timeout(Duration::from_secs(10), player.run(cancel))
        .await
        .expect("cancellation was not observed")
        .unwrap();

    // never asked to play, so the clock stood still
    assert!(!player.session().is_ended());
    assert!(player.session().is_paused());
    assert_eq!(player.session().orchestrator(TrackKind::Audio).unwrap().track().cursor(), Some(2));
    assert_eq!(handle.position(), 0.0);
}
