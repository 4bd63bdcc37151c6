//! Game session controller.
//!
//! The timed state machine at the center of the adaptation loop. It owns
//! the session lifecycle (`Idle → Active → Ended`), polls the emotion probe
//! while the game is playing, keeps the single pending-emotion slot, commits
//! samples to the store on word completion / periodic flush / unload, and
//! applies the difficulty policy after every commit.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::time::Duration;
use tokio::sync::{Mutex, broadcast};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use joyverse_core::clock::{Clock, SystemClock};
use joyverse_core::difficulty::{DifficultyPolicy, DifficultyTier};
use joyverse_core::emotion::background_theme;
use joyverse_core::error::{JoyverseError, Result};
use joyverse_core::probe::{EmotionProbe, ProbeError};
use joyverse_core::session::{
    EmotionSample, FlushTrigger, GameKind, GameStatus, PendingEmotion, SessionEvent, SessionStore,
    SessionSummary,
};

use joyverse_infrastructure::EngineConfig;

#[cfg(test)]
#[path = "controller_test.rs"]
mod tests;

/// Word a periodic/terminal flush is attributed to when the game has not
/// reported the word in progress yet.
const FALLBACK_WORD: &str = "unknown";

/// Capacity of the controller's event channel. Slow subscribers lag rather
/// than block the control loop.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Timer configuration for the polling and flush loops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionTiming {
    /// Delay before the first probe after play starts
    pub initial_probe_delay: Duration,
    /// Interval between probes
    pub probe_interval: Duration,
    /// Interval between periodic flushes of an unconsumed pending emotion
    pub flush_interval: Duration,
}

impl Default for SessionTiming {
    fn default() -> Self {
        Self {
            initial_probe_delay: Duration::from_secs(10),
            probe_interval: Duration::from_secs(10),
            flush_interval: Duration::from_secs(30),
        }
    }
}

impl SessionTiming {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            initial_probe_delay: config.initial_probe_delay(),
            probe_interval: config.probe_interval(),
            flush_interval: config.flush_interval(),
        }
    }
}

/// Lifecycle phase of the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Active,
    Ended,
}

/// Mutable controller state, behind one lock.
struct ControllerState {
    phase: Phase,
    session_id: Option<String>,
    started_at: Option<DateTime<Utc>>,
    difficulty: DifficultyTier,
    pending: Option<PendingEmotion>,
    current_word: Option<String>,
    last_saved_at: Option<DateTime<Utc>>,
}

impl ControllerState {
    fn new() -> Self {
        Self {
            phase: Phase::Idle,
            session_id: None,
            started_at: None,
            difficulty: DifficultyTier::default(),
            pending: None,
            current_word: None,
            last_saved_at: None,
        }
    }
}

/// Client-side orchestrator for one user's play session.
///
/// Collaborators are trait objects so the controller can be driven against
/// the real HTTP store and landmark probe in production and against mocks
/// in tests. All public methods are safe to call from any task; internal
/// state sits behind a single async mutex that is never held across a
/// store or probe await.
pub struct GameSessionController {
    store: Arc<dyn SessionStore>,
    probe: Arc<dyn EmotionProbe>,
    clock: Arc<dyn Clock>,
    timing: SessionTiming,
    user_id: String,
    game: GameKind,
    events: broadcast::Sender<SessionEvent>,
    state: Mutex<ControllerState>,
    /// Token owning the probe and flush loops; present only while they run.
    loops: StdMutex<Option<CancellationToken>>,
}

impl GameSessionController {
    /// Creates a controller for `user_id` playing `game`.
    pub fn new(
        store: Arc<dyn SessionStore>,
        probe: Arc<dyn EmotionProbe>,
        user_id: impl Into<String>,
        game: GameKind,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            store,
            probe,
            clock: Arc::new(SystemClock),
            timing: SessionTiming::default(),
            user_id: user_id.into(),
            game,
            events,
            state: Mutex::new(ControllerState::new()),
            loops: StdMutex::new(None),
        }
    }

    /// Overrides the wall clock (tests pin timestamps through this).
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Overrides the loop timing.
    pub fn with_timing(mut self, timing: SessionTiming) -> Self {
        self.timing = timing;
        self
    }

    /// Subscribes to controller events.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    // ========================================================================
    // Game UI signals
    // ========================================================================

    /// Reacts to a game status transition.
    ///
    /// - `Playing` activates the session (starting one if the user has no
    ///   active session) and starts the probe/flush loops.
    /// - `Paused` stops the loops, keeping session and pending state.
    /// - `GameOver` flushes, stops the loops, and closes the session.
    /// - `Ready` is a no-op.
    pub async fn handle_status(self: &Arc<Self>, status: GameStatus) -> Result<()> {
        debug!(?status, "game status changed");
        match status {
            GameStatus::Ready => Ok(()),
            GameStatus::Playing => self.activate().await,
            GameStatus::Paused => {
                self.stop_loops();
                Ok(())
            }
            GameStatus::GameOver => self.finish().await.map(|_| ()),
        }
    }

    /// Records the word the player is currently solving, so stall flushes
    /// can attribute their sample.
    pub async fn current_word_changed(&self, word: &str) {
        let mut state = self.state.lock().await;
        state.current_word = Some(word.to_string());
    }

    /// Commits the pending emotion for a just-completed word.
    ///
    /// Exactly one commit happens per completed word; a word whose lifetime
    /// saw no probe result commits nothing. After a successful commit the
    /// difficulty policy runs and the resulting tier is applied.
    pub async fn word_completed(&self, word: &str) -> Result<()> {
        match self.commit_pending(Some(word), FlushTrigger::WordCompleted).await {
            Ok(_) => Ok(()),
            Err(err) => {
                warn!(error = %err, word, "word-completion commit failed, sample retained");
                Err(err)
            }
        }
    }

    /// Manual save: flushes the pending emotion and refreshes the save
    /// timestamp, independent of the periodic timer.
    pub async fn save(&self) -> Result<()> {
        match self.commit_pending(None, FlushTrigger::ManualSave).await {
            Ok(_) => {
                let at = self.clock.now();
                {
                    let mut state = self.state.lock().await;
                    state.last_saved_at = Some(at);
                }
                self.emit(SessionEvent::SaveCompleted { at });
                Ok(())
            }
            Err(err) => {
                self.emit(SessionEvent::SaveFailed {
                    reason: err.to_string(),
                });
                Err(err)
            }
        }
    }

    /// Best-effort flush before the page/tab goes away.
    ///
    /// Flushing an already-empty slot performs zero persistence calls, so
    /// unload handlers may call this unconditionally and repeatedly.
    pub async fn flush_on_unload(&self) -> Result<()> {
        match self.commit_pending(None, FlushTrigger::Unload).await {
            Ok(_) => Ok(()),
            Err(err) => {
                self.emit(SessionEvent::SaveFailed {
                    reason: err.to_string(),
                });
                Err(err)
            }
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub async fn phase(&self) -> Phase {
        self.state.lock().await.phase
    }

    pub async fn session_id(&self) -> Option<String> {
        self.state.lock().await.session_id.clone()
    }

    /// The difficulty tier currently in effect.
    pub async fn difficulty(&self) -> DifficultyTier {
        self.state.lock().await.difficulty
    }

    pub async fn has_pending_emotion(&self) -> bool {
        self.state.lock().await.pending.is_some()
    }

    pub async fn last_saved_at(&self) -> Option<DateTime<Utc>> {
        self.state.lock().await.last_saved_at
    }

    // ========================================================================
    // Lifecycle internals
    // ========================================================================

    async fn activate(self: &Arc<Self>) -> Result<()> {
        {
            let state = self.state.lock().await;
            match state.phase {
                Phase::Active => {
                    // Concurrent start is a no-op: keep the existing session,
                    // just make sure the loops are running (resume from pause).
                    drop(state);
                    self.ensure_loops();
                    return Ok(());
                }
                Phase::Ended => {
                    warn!("ignoring Playing signal on an ended session");
                    return Ok(());
                }
                Phase::Idle => {}
            }
        }

        // Reuse the user's active session if the store has one; otherwise
        // start fresh.
        let existing = self.store.active_session(&self.user_id).await?;
        let (session_id, difficulty) = match existing {
            Some(session) => {
                info!(session_id = %session.id, "reusing active session");
                (session.id, session.difficulty)
            }
            None => {
                let started = self.store.start_session(&self.user_id, self.game).await?;
                info!(session_id = %started.session_id, "session started");
                (started.session_id, DifficultyTier::default())
            }
        };

        {
            let mut state = self.state.lock().await;
            state.phase = Phase::Active;
            state.session_id = Some(session_id);
            state.started_at = Some(self.clock.now());
            state.difficulty = difficulty;
        }
        self.ensure_loops();
        Ok(())
    }

    async fn finish(&self) -> Result<SessionSummary> {
        // Flush while still active; a terminal-flush failure is surfaced but
        // must not prevent the session from closing.
        if let Err(err) = self.commit_pending(None, FlushTrigger::GameOver).await {
            warn!(error = %err, "terminal flush failed");
            self.emit(SessionEvent::SaveFailed {
                reason: err.to_string(),
            });
        }

        self.stop_loops();

        let (session_id, duration_seconds) = {
            let mut state = self.state.lock().await;
            if state.phase != Phase::Active {
                return Err(JoyverseError::internal("no active session to end"));
            }
            state.phase = Phase::Ended;
            state.pending = None;
            let session_id = state
                .session_id
                .clone()
                .ok_or_else(|| JoyverseError::internal("active phase without a session id"))?;
            let duration = state
                .started_at
                .map(|started| (self.clock.now() - started).num_seconds().max(0) as u64);
            (session_id, duration)
        };

        let summary = self.store.end_session(&session_id, duration_seconds).await?;
        info!(session_id = %session_id, rounds = summary.rounds_played, "session ended");
        self.emit(SessionEvent::SessionEnded {
            summary: summary.clone(),
        });
        Ok(summary)
    }

    // ========================================================================
    // Timer loops
    // ========================================================================

    fn ensure_loops(self: &Arc<Self>) {
        let mut loops = self.loops.lock().unwrap();
        if loops.is_some() {
            return;
        }
        let token = CancellationToken::new();
        *loops = Some(token.clone());

        let controller = Arc::clone(self);
        let probe_token = token.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = probe_token.cancelled() => return,
                _ = tokio::time::sleep(controller.timing.initial_probe_delay) => {}
            }
            let mut ticker = tokio::time::interval(controller.timing.probe_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = probe_token.cancelled() => break,
                    _ = ticker.tick() => controller.probe_tick().await,
                }
            }
        });

        let controller = Arc::clone(self);
        let flush_token = token;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(controller.timing.flush_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            // interval() fires immediately; swallow the zeroth tick so the
            // first flush happens one full interval in.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = flush_token.cancelled() => break,
                    _ = ticker.tick() => controller.flush_tick().await,
                }
            }
        });
    }

    fn stop_loops(&self) {
        let mut loops = self.loops.lock().unwrap();
        if let Some(token) = loops.take() {
            token.cancel();
        }
    }

    /// One probe cycle: capture, overwrite the pending slot, update the
    /// cosmetic background. Failures skip the cycle and keep prior state.
    async fn probe_tick(&self) {
        let difficulty = {
            let state = self.state.lock().await;
            if state.phase != Phase::Active {
                return;
            }
            state.difficulty
        };

        match self.probe.capture().await {
            Ok(reading) => {
                {
                    let mut state = self.state.lock().await;
                    // The session may have ended while the capture was in
                    // flight; never write into an ended session.
                    if state.phase != Phase::Active {
                        return;
                    }
                    state.pending = Some(PendingEmotion::from_reading(
                        &reading,
                        difficulty,
                        self.clock.now(),
                    ));
                }
                if let Some(theme) = background_theme(&reading.emotion) {
                    self.emit(SessionEvent::BackgroundEmotionChanged {
                        emotion: reading.emotion,
                        theme,
                    });
                }
            }
            Err(ProbeError::Busy) => {
                debug!("probe tick dropped, capture already in flight");
            }
            Err(err) => {
                debug!(error = %err, "probe tick skipped");
            }
        }
    }

    /// One flush cycle: commit a pending emotion the player has sat on for
    /// a full interval, attributed to the word in progress.
    async fn flush_tick(&self) {
        if let Err(err) = self.commit_pending(None, FlushTrigger::PeriodicFlush).await {
            warn!(error = %err, "periodic flush failed, sample retained for retry");
        }
    }

    // ========================================================================
    // Commit path
    // ========================================================================

    /// Commits the pending emotion, if any, as one sample.
    ///
    /// Returns the committed sample, or `None` when the slot was empty or
    /// the session is not active (both are non-events). On store failure the
    /// slot is left intact so the next flush opportunity retries.
    ///
    /// This is the single place samples are created, which is what enforces
    /// the one-commit-per-word discipline.
    async fn commit_pending(
        &self,
        word_override: Option<&str>,
        trigger: FlushTrigger,
    ) -> Result<Option<EmotionSample>> {
        let (session_id, pending, word) = {
            let state = self.state.lock().await;
            if state.phase != Phase::Active {
                return Ok(None);
            }
            let (Some(session_id), Some(pending)) = (&state.session_id, &state.pending) else {
                return Ok(None);
            };
            let word = word_override
                .map(str::to_string)
                .or_else(|| state.current_word.clone())
                .unwrap_or_else(|| FALLBACK_WORD.to_string());
            (session_id.clone(), pending.clone(), word)
        };

        let sample = pending.clone().into_sample(word.clone());
        self.store
            .append_emotion_sample(&session_id, sample.clone())
            .await?;

        {
            let mut state = self.state.lock().await;
            // A new probe result may have landed while the append was in
            // flight; only clear the slot if it still holds what we wrote.
            if state
                .pending
                .as_ref()
                .is_some_and(|current| current.captured_at == pending.captured_at)
            {
                state.pending = None;
            }
            state.last_saved_at = Some(self.clock.now());
        }

        debug!(word = %word, emotion = %sample.emotion, ?trigger, "sample committed");
        self.emit(SessionEvent::SampleCommitted {
            word,
            emotion: sample.emotion.clone(),
            trigger,
        });

        self.apply_policy(&sample).await;
        Ok(Some(sample))
    }

    /// Runs the difficulty policy against a freshly committed sample.
    async fn apply_policy(&self, sample: &EmotionSample) {
        let changed = {
            let mut state = self.state.lock().await;
            if state.phase != Phase::Active {
                return;
            }
            let previous = state.difficulty;
            let next = DifficultyPolicy::next(previous, &sample.emotion, sample.confidence);
            if next != previous {
                state.difficulty = next;
                Some((previous, next))
            } else {
                None
            }
        };

        if let Some((previous, next)) = changed {
            info!(%previous, %next, "difficulty adjusted");
            self.emit(SessionEvent::DifficultyChanged { previous, next });
        }
    }

    fn emit(&self, event: SessionEvent) {
        // Nobody listening is fine; events are advisory.
        let _ = self.events.send(event);
    }
}

impl Drop for GameSessionController {
    fn drop(&mut self) {
        if let Ok(mut loops) = self.loops.lock() {
            if let Some(token) = loops.take() {
                token.cancel();
            }
        }
    }
}
