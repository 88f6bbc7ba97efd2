use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::watch;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::abr::build_policy;
use crate::config::PlayerConfig;
use crate::drm::{choose_key_system, prepare_key_request, protection_init_data};
use crate::error::Result;
use crate::estimator::{shared_estimator, SharedEstimator};
use crate::manifest::{Manifest, StreamFormat, TrackKind};
use crate::orchestrator::{FragmentOrchestrator, FragmentResponse, FragmentTransport};
use crate::session::{PlaybackCommand, Session};
use crate::sink::{range_containing, MediaSink};
use crate::track::{SeekPhase, TrackBuffer};
use crate::transport::{fetch_manifest, HttpTransport};
use crate::{PlayerCallback, PlayerEvent};

/// Requests a running player accepts from the host.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PlayerControl {
    Seek(f64),
    Play,
    Pause,
}

/// Cloneable remote for a [`StreamPlayer`] that is running on another task.
#[derive(Debug, Clone)]
pub struct PlayerHandle {
    controls: UnboundedSender<PlayerControl>,
    position: watch::Receiver<f64>,
}

impl PlayerHandle {
    pub fn seek(&self, time: f64) {
        self.send(PlayerControl::Seek(time));
    }

    pub fn play(&self) {
        self.send(PlayerControl::Play);
    }

    pub fn pause(&self) {
        self.send(PlayerControl::Pause);
    }

    /// Last published presentation time, in seconds.
    pub fn position(&self) -> f64 {
        *self.position.borrow()
    }

    fn send(&self, control: PlayerControl) {
        if self.controls.send(control).is_err() {
            debug!("player stopped, {:?} ignored", control);
        }
    }
}

// Presentation clock. Advances with wall time while playing and never runs past buffered media.
#[derive(Debug)]
struct Playhead {
    position: f64,
    playing: bool,
    last: Instant,
}

impl Playhead {
    fn new() -> Self {
        Playhead { position: 0.0, playing: false, last: Instant::now() }
    }

    fn advance(&mut self, limit: f64) -> f64 {
        let now = Instant::now();
        if self.playing {
            let elapsed = now.duration_since(self.last).as_secs_f64();
            self.position = (self.position + elapsed).min(limit.max(self.position));
        }
        self.last = now;
        self.position
    }

    fn set_playing(&mut self, playing: bool) {
        self.last = Instant::now();
        self.playing = playing;
    }

    fn jump(&mut self, position: f64) {
        self.position = position;
        self.last = Instant::now();
    }
}

/// Plays one presentation into a [`MediaSink`].
///
/// The player owns the session and is driven by [`StreamPlayer::run`]: a periodic tick runs the
/// session policy, while fragment completions arrive over a channel from the transport.
pub struct StreamPlayer {
    config: PlayerConfig,
    manifest: Manifest,
    session: Session,
    sink: Box<dyn MediaSink>,
    callback: PlayerCallback,
    estimator: SharedEstimator,
    completions: UnboundedReceiver<FragmentResponse>,
    controls: UnboundedReceiver<PlayerControl>,
    control_tx: UnboundedSender<PlayerControl>,
    position_tx: watch::Sender<f64>,
    playhead: Playhead,
}

impl StreamPlayer {
    /// Fetches and normalizes the manifest at `config.url` and prepares a session over HTTP.
    pub async fn new(config: PlayerConfig, sink: Box<dyn MediaSink>, callback: PlayerCallback) -> Result<Self> {
        config.validate()?;
        let client = Client::new();
        let raw = fetch_manifest(&client, &config.url).await?;
        let format = StreamFormat::from_url(&config.url);
        let manifest = Manifest::normalize(&raw, format, &config.url)?;

        let estimator = shared_estimator();
        let (completion_tx, completions) = mpsc::unbounded_channel();
        let transport = Arc::new(HttpTransport::new(client, estimator.clone(), completion_tx));
        Self::with_transport(config, manifest, sink, callback, transport, estimator, completions)
    }

    /// Builds a player over an already normalized manifest and a caller supplied transport whose
    /// completions arrive on `completions`.
    pub fn with_transport(
        config: PlayerConfig,
        manifest: Manifest,
        sink: Box<dyn MediaSink>,
        callback: PlayerCallback,
        transport: Arc<dyn FragmentTransport>,
        estimator: SharedEstimator,
        completions: UnboundedReceiver<FragmentResponse>,
    ) -> Result<Self> {
        negotiate_protection(&manifest, &config, &callback)?;

        let thresholds = config.track_thresholds();
        let orchestrators = manifest
            .adaptation_sets
            .iter()
            .map(|set| {
                let track = TrackBuffer::new(set.clone(), manifest.format, manifest.protection.clone(), thresholds);
                let policy = (set.kind == TrackKind::Video).then(|| build_policy(&config, estimator.clone()));
                FragmentOrchestrator::new(track, policy, transport.clone())
            })
            .collect();
        let session = Session::new(orchestrators, &config);
        info!(
            "prepared {:?} presentation of {:.3}s with {} track(s)",
            manifest.format,
            manifest.duration,
            manifest.adaptation_sets.len()
        );

        let (control_tx, controls) = mpsc::unbounded_channel();
        let (position_tx, _) = watch::channel(0.0);
        Ok(StreamPlayer {
            config,
            manifest,
            session,
            sink,
            callback,
            estimator,
            completions,
            controls,
            control_tx,
            position_tx,
            playhead: Playhead::new(),
        })
    }

    pub fn handle(&self) -> PlayerHandle {
        PlayerHandle { controls: self.control_tx.clone(), position: self.position_tx.subscribe() }
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn estimator(&self) -> &SharedEstimator {
        &self.estimator
    }

    pub fn position(&self) -> f64 {
        self.playhead.position
    }

    /// Runs until the stream ends or `cancel` fires.
    pub async fn run(&mut self, cancel: CancellationToken) -> Result<()> {
        let mut ticker = interval(Duration::from_millis(self.config.tick_interval_ms));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("player cancelled at {:.3}s", self.playhead.position);
                    break;
                }
                _ = ticker.tick() => {
                    if self.step() {
                        info!("playback finished at {:.3}s", self.playhead.position);
                        break;
                    }
                }
                Some(response) = self.completions.recv() => {
                    self.session.on_response(response, self.sink.as_mut());
                    self.dispatch_events();
                }
                Some(control) = self.controls.recv() => self.apply(control),
            }
        }

        for orchestrator in self.session.orchestrators() {
            if let Some(request) = orchestrator.outstanding() {
                debug!("{} request {} left pending", request.track, request.id);
            }
        }
        Ok(())
    }

    /// One tick of the presentation clock and the session policy. Returns true once ended.
    pub fn step(&mut self) -> bool {
        let limit = self.playable_until();
        let now = self.playhead.advance(limit);
        self.position_tx.send_replace(now);

        match self.session.tick(now, self.sink.as_mut()) {
            Some(PlaybackCommand::Play) => self.playhead.set_playing(true),
            Some(PlaybackCommand::Pause) => self.playhead.set_playing(false),
            None => {}
        }
        if self.session.seek_phase() == SeekPhase::EnoughData {
            self.session.seek_completed();
        }
        self.dispatch_events();
        self.session.is_ended()
    }

    fn apply(&mut self, control: PlayerControl) {
        match control {
            PlayerControl::Play => {
                self.session.user_play();
                self.playhead.set_playing(true);
            }
            PlayerControl::Pause => {
                self.session.user_pause();
                self.playhead.set_playing(false);
            }
            PlayerControl::Seek(time) => {
                let time = time.clamp(0.0, self.manifest.duration);
                info!("seek to {:.3}s", time);
                self.playhead.jump(time);
                self.position_tx.send_replace(time);
                self.session.seek_started(self.sink.as_mut());
                self.dispatch_events();
            }
        }
    }

    // End of the media every track has buffered contiguously from the playhead.
    fn playable_until(&self) -> f64 {
        let position = self.playhead.position;
        self.session
            .orchestrators()
            .iter()
            .map(|o| {
                range_containing(&self.sink.buffered(o.kind()), position)
                    .map(|r| r.end)
                    .unwrap_or(position)
            })
            .fold(self.manifest.duration, f64::min)
    }

    fn dispatch_events(&mut self) {
        for event in self.session.drain_events() {
            (self.callback)(event);
        }
    }
}

// Picks the key system for a protected presentation and tells the host about it.
fn negotiate_protection(manifest: &Manifest, config: &PlayerConfig, callback: &PlayerCallback) -> Result<()> {
    let Some(protection) = manifest.adaptation_sets.iter().find_map(|s| s.content_protection.as_ref()) else {
        return Ok(());
    };
    // License exchange belongs to the host, which may accept any key system we offer.
    let choice = choose_key_system(protection, config.flavor.as_deref(), |_| true)?;
    let init_data = match manifest.protection.as_ref() {
        Some(info) => prepare_key_request(&choice, &protection_init_data(info))?,
        None => None,
    };
    if manifest.protection.is_some() && init_data.is_none() {
        warn!("no usable initialization data for {}", choice.key_system);
    }
    info!("selected key system {} for flavor {}", choice.key_system, choice.flavor);
    callback(PlayerEvent::KeySystemSelected {
        flavor: choice.flavor,
        key_system: choice.key_system,
        license_url: choice.license_url,
        init_data,
    });
    Ok(())
}
