//! Decides when the sessions play, pause or reload.

use crate::catalog::TrackId;
use crate::error::Result;
use crate::events::{EntityTelemetry, Event, SessionPhase, StateUpdate};
use crate::listener::ListenerStateUpdater;
use crate::manager::AudioSessionManager;
use crate::render::SessionKind;
use crate::state::{GameState, PlaybackState};
use std::time::{Duration, Instant};

/// Reacts to host events by driving the [`AudioSessionManager`] and the
/// [`ListenerStateUpdater`].
///
/// - A new track reloads both sessions. They stay paused unless a session is
///   in progress, in which case ambient sound resumes right away.
/// - While a session is in progress, positional sound plays only from an
///   in-vehicle camera.
/// - A session start resumes both sessions after the settle delay, provided
///   the session is still running and a track is still loaded by then. Camera
///   changes during the delay only decide whether positional sound joins in.
/// - A session end pauses everything.
///
/// Time is passed in by the caller so the settle delay can be tested without
/// sleeping.
pub struct PlaybackStateMachine {
    state: PlaybackState,
    game: GameState,
    manager: AudioSessionManager,
    listener: ListenerStateUpdater,
    settle_delay: Duration,
    pending_resume: Option<Instant>,
    /// Camera decision taken while the settle delay runs
    deferred_positional: Option<bool>,
}

impl PlaybackStateMachine {
    pub fn new(
        manager: AudioSessionManager,
        listener: ListenerStateUpdater,
        settle_delay: Duration,
    ) -> Self {
        Self {
            state: PlaybackState::NoTrack,
            game: GameState::default(),
            manager,
            listener,
            settle_delay,
            pending_resume: None,
            deferred_positional: None,
        }
    }

    pub fn handle(&mut self, event: Event, now: Instant) {
        match event {
            Event::StateChanged(update) => self.on_state_changed(update, now),
            Event::SessionStarted => self.on_session_started(now),
            Event::SessionEnded => self.on_session_ended(),
            Event::Telemetry(samples) => self.on_telemetry(&samples),
            Event::SoundLoaded(completion) => self.manager.on_sound_loaded(completion),
            Event::TransportLost(e) => log::warn!("Telemetry transport lost: {}", e),
            Event::Shutdown => self.shutdown(),
        }
    }

    /// When the pending settle-delay resume is due, if any.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending_resume
    }

    /// Fires the settle-delay resume once `now` has reached its deadline.
    pub fn poll_timers(&mut self, now: Instant) {
        let Some(deadline) = self.pending_resume else {
            return;
        };
        if now < deadline {
            return;
        }
        self.pending_resume = None;
        let positional = self.deferred_positional.take().unwrap_or(true);

        if self.state.track().is_none() || !self.game.in_progress() {
            log::debug!("Settle delay elapsed with nothing to resume");
            return;
        }
        log_failure("resume ambient sounds", self.manager.resume_ambient());
        if positional {
            log_failure("resume positional sounds", self.manager.resume_positional());
        }
    }

    /// Cancels pending work and releases both sessions.
    pub fn shutdown(&mut self) {
        log::info!("Shutting down sound sessions");
        self.cancel_resume();
        self.state = PlaybackState::NoTrack;
        self.manager.unload();
    }

    pub fn state(&self) -> &PlaybackState {
        &self.state
    }

    pub fn game(&self) -> &GameState {
        &self.game
    }

    pub fn manager(&self) -> &AudioSessionManager {
        &self.manager
    }

    pub fn manager_mut(&mut self) -> &mut AudioSessionManager {
        &mut self.manager
    }

    fn on_state_changed(&mut self, update: StateUpdate, now: Instant) {
        let camera_changed = self.game.camera != Some(update.camera);
        if camera_changed {
            log::debug!("Camera: {:?}", update.camera);
        }
        self.game.viewed_entity = update.viewed_entity;
        self.game.camera = Some(update.camera);
        self.game.ui_overlay = update.ui_overlay;

        let track = update
            .track
            .as_deref()
            .filter(|code| !code.is_empty())
            .map(TrackId::new);
        self.game.track = track.clone();
        let reloaded = self.change_track(track);

        let mut started = false;
        if update.phase != self.game.phase {
            match update.phase {
                SessionPhase::InProgress => {
                    self.on_session_started(now);
                    started = true;
                }
                SessionPhase::NoSession => self.on_session_ended(),
            }
        }

        if reloaded {
            if self.game.in_progress() && !started {
                log_failure("resume ambient sounds", self.manager.resume_ambient());
            } else {
                log_failure("pause sounds", self.manager.pause_all());
            }
        }

        if self.game.in_progress() && !started && self.state.track().is_some() {
            self.apply_camera_policy(camera_changed);
        }
    }

    /// Returns whether a new track was loaded.
    fn change_track(&mut self, track: Option<TrackId>) -> bool {
        match track {
            None => {
                if self.state != PlaybackState::NoTrack {
                    log::info!("Track unloaded");
                }
                self.state = PlaybackState::NoTrack;
                log_failure("pause sounds", self.manager.pause_all());
                false
            }
            Some(track) if self.state.track() == Some(&track) => false,
            Some(track) => {
                log::info!("Track: {}", track);
                if let Err(e) = self.manager.load_track(&track) {
                    log::error!("Failed to load sounds for track {}: {}", track, e);
                }
                self.state = PlaybackState::TrackLoaded { track };
                true
            }
        }
    }

    fn apply_camera_policy(&mut self, camera_changed: bool) {
        let Some(camera) = self.game.camera else {
            return;
        };
        let audible = camera.is_in_vehicle() && (camera_changed || !self.game.ui_overlay);
        if self.pending_resume.is_some() {
            // Settling: pausing is safe now, resuming waits for the timer
            self.deferred_positional = Some(audible);
            if !audible {
                log_failure("pause positional sounds", self.manager.pause_positional());
            }
        } else if audible {
            log_failure("resume positional sounds", self.manager.resume_positional());
        } else {
            log_failure("pause positional sounds", self.manager.pause_positional());
        }
    }

    fn on_session_started(&mut self, now: Instant) {
        log::info!("Session started");
        self.game.phase = SessionPhase::InProgress;
        self.cancel_resume();
        if self.state.track().is_some() {
            self.pending_resume = Some(now + self.settle_delay);
        }
    }

    fn on_session_ended(&mut self) {
        log::info!("Session ended");
        self.game.phase = SessionPhase::NoSession;
        self.cancel_resume();
        log_failure("pause sounds", self.manager.pause_all());
    }

    fn cancel_resume(&mut self) {
        self.pending_resume = None;
        self.deferred_positional = None;
    }

    fn on_telemetry(&mut self, samples: &[EntityTelemetry]) {
        let viewed = self.game.viewed_entity;
        for sample in samples.iter().filter(|s| s.entity_id == viewed) {
            let session = self.manager.session_mut(SessionKind::Positional);
            if let Err(e) = self.listener.update(session, sample) {
                log::error!("Failed to update listener: {}", e);
            }
        }
    }
}

fn log_failure(action: &str, result: Result<()>) {
    if let Err(e) = result {
        log::error!("Failed to {}: {}", action, e);
    }
}
