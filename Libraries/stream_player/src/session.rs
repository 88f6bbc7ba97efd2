use tracing::{debug, info, trace};

use crate::config::PlayerConfig;
use crate::manifest::TrackKind;
use crate::orchestrator::{FragmentOrchestrator, FragmentResponse};
use crate::sink::MediaSink;
use crate::track::SeekPhase;
use crate::PlayerEvent;

/// What the host should do with the presentation clock after a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackCommand {
    Play,
    Pause,
}

/// Joint policy over all tracks of a presentation: buffering sufficiency, automatic pause and
/// resume, seek coordination and end of stream.
#[derive(Debug)]
pub struct Session {
    orchestrators: Vec<FragmentOrchestrator>,
    seek_phase: SeekPhase,
    paused: bool,
    autopaused: bool,   // paused by the session rather than by the user
    ended: bool,
    auto_pause_start: f64,
    pause_resume: f64,
    events: Vec<PlayerEvent>,
}

impl Session {
    /// Playback starts paused. With `autoplay` the pause counts as automatic, so playback begins
    /// once enough media is buffered.
    pub fn new(orchestrators: Vec<FragmentOrchestrator>, config: &PlayerConfig) -> Self {
        Session {
            orchestrators,
            seek_phase: SeekPhase::None,
            paused: true,
            autopaused: config.autoplay,
            ended: false,
            auto_pause_start: config.auto_pause_start_secs,
            pause_resume: config.pause_resume_secs,
            events: Vec::new(),
        }
    }

    pub fn orchestrators(&self) -> &[FragmentOrchestrator] {
        &self.orchestrators
    }

    pub fn orchestrator(&self, kind: TrackKind) -> Option<&FragmentOrchestrator> {
        self.orchestrators.iter().find(|o| o.kind() == kind)
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn is_autopaused(&self) -> bool {
        self.autopaused
    }

    pub fn is_ended(&self) -> bool {
        self.ended
    }

    pub fn seek_phase(&self) -> SeekPhase {
        self.seek_phase
    }

    pub fn drain_events(&mut self) -> Vec<PlayerEvent> {
        let mut events = Vec::new();
        for orchestrator in &mut self.orchestrators {
            events.extend(orchestrator.drain_events());
        }
        events.append(&mut self.events);
        events
    }

    /// Runs every track's orchestrator once, then applies the pause policy.
    pub fn tick(&mut self, now: f64, sink: &mut dyn MediaSink) -> Option<PlaybackCommand> {
        if self.ended || !sink.is_open() {
            return None;
        }

        let mut not_enough_buffered = true;
        for orchestrator in &mut self.orchestrators {
            if !orchestrator.tick(now, sink) {
                continue;
            }
            let buffered = orchestrator.track().buffer_size(now, sink);
            trace!("{} buffered {:.3}s ahead of {:.3}s", orchestrator.kind(), buffered, now);
            let threshold = if self.paused { self.pause_resume } else { self.auto_pause_start };
            if buffered >= threshold {
                not_enough_buffered = false;
            }
        }

        if self.has_enough_data_on_seek() {
            not_enough_buffered = false;
        }

        if self.orchestrators.iter().any(|o| !o.track().is_active()) {
            info!("ending stream");
            sink.end_of_stream();
            self.ended = true;
            self.events.push(PlayerEvent::EndOfStream);
            return None;
        }

        if self.paused {
            if self.autopaused && !not_enough_buffered {
                debug!("autoresuming at {:.3}s", now);
                self.paused = false;
                self.autopaused = false;
                return Some(PlaybackCommand::Play);
            }
        } else if not_enough_buffered {
            debug!("autopausing at {:.3}s", now);
            self.paused = true;
            self.autopaused = true;
            return Some(PlaybackCommand::Pause);
        }
        None
    }

    /// True once every track has buffered enough after a seek. Sticky until the seek completes.
    pub fn has_enough_data_on_seek(&mut self) -> bool {
        match self.seek_phase {
            SeekPhase::EnoughData => true,
            SeekPhase::None => false,
            SeekPhase::Started => {
                let all = self
                    .orchestrators
                    .iter()
                    .all(|o| o.track().seek_phase() == SeekPhase::EnoughData);
                if all {
                    debug!("all tracks have enough data after seek");
                    self.seek_phase = SeekPhase::EnoughData;
                }
                all
            }
        }
    }

    /// Routes a completion to the orchestrator of its track.
    pub fn on_response(&mut self, response: FragmentResponse, sink: &mut dyn MediaSink) {
        match self.orchestrators.iter_mut().find(|o| o.kind() == response.track) {
            Some(orchestrator) => orchestrator.on_response(response, sink),
            None => debug!("response {} for unknown {} track", response.id, response.track),
        }
    }

    pub fn user_pause(&mut self) {
        self.paused = true;
        self.autopaused = false;
    }

    pub fn user_play(&mut self) {
        self.paused = false;
        self.autopaused = false;
    }

    /// The presentation position jumped: drop in-flight work and buffer afresh from there.
    pub fn seek_started(&mut self, sink: &mut dyn MediaSink) {
        info!("seeking");
        for orchestrator in &mut self.orchestrators {
            orchestrator.cancel_requests();
            orchestrator.track_mut().reset("seeking", sink);
        }
        self.seek_phase = SeekPhase::Started;
        for orchestrator in &mut self.orchestrators {
            orchestrator.track_mut().set_seek_phase(SeekPhase::Started);
        }
    }

    pub fn seek_completed(&mut self) {
        info!("seeked");
        self.seek_phase = SeekPhase::None;
        for orchestrator in &mut self.orchestrators {
            orchestrator.track_mut().set_seek_phase(SeekPhase::None);
        }
    }
}
