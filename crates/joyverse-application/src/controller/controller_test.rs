use super::*;

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex as StdMutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use joyverse_core::emotion::EmotionReading;
use joyverse_core::session::{AppendAck, Session, StartedSession};

// ============================================================================
// Mocks
// ============================================================================

/// Store double that records every call and can be told to fail appends.
struct RecordingStore {
    started: StdMutex<Vec<String>>,
    appended: StdMutex<Vec<(String, EmotionSample)>>,
    ended: StdMutex<Vec<(String, Option<u64>)>>,
    active: StdMutex<Option<Session>>,
    fail_appends: AtomicBool,
}

impl RecordingStore {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            started: StdMutex::new(Vec::new()),
            appended: StdMutex::new(Vec::new()),
            ended: StdMutex::new(Vec::new()),
            active: StdMutex::new(None),
            fail_appends: AtomicBool::new(false),
        })
    }

    fn with_active_session(session: Session) -> Arc<Self> {
        let store = Self::new();
        *store.active.lock().unwrap() = Some(session);
        store
    }

    fn append_count(&self) -> usize {
        self.appended.lock().unwrap().len()
    }

    fn appended_samples(&self) -> Vec<(String, EmotionSample)> {
        self.appended.lock().unwrap().clone()
    }

    fn start_count(&self) -> usize {
        self.started.lock().unwrap().len()
    }

    fn ended_sessions(&self) -> Vec<(String, Option<u64>)> {
        self.ended.lock().unwrap().clone()
    }
}

#[async_trait]
impl SessionStore for RecordingStore {
    async fn start_session(
        &self,
        user_id: &str,
        game: GameKind,
    ) -> joyverse_core::error::Result<StartedSession> {
        self.started.lock().unwrap().push(user_id.to_string());
        Ok(StartedSession {
            session_id: "session-1".to_string(),
            game,
        })
    }

    async fn append_emotion_sample(
        &self,
        session_id: &str,
        sample: EmotionSample,
    ) -> joyverse_core::error::Result<AppendAck> {
        if self.fail_appends.load(Ordering::SeqCst) {
            return Err(JoyverseError::persistence("backend unavailable"));
        }
        let mut appended = self.appended.lock().unwrap();
        appended.push((session_id.to_string(), sample));
        Ok(AppendAck {
            total_samples: appended.len(),
        })
    }

    async fn end_session(
        &self,
        session_id: &str,
        duration_seconds: Option<u64>,
    ) -> joyverse_core::error::Result<SessionSummary> {
        self.ended
            .lock()
            .unwrap()
            .push((session_id.to_string(), duration_seconds));
        let total_samples = self.append_count();
        Ok(SessionSummary {
            session_id: session_id.to_string(),
            game: GameKind::SnakeWords,
            duration_seconds: duration_seconds.unwrap_or(0),
            rounds_played: total_samples as u32,
            total_samples,
        })
    }

    async fn active_session(
        &self,
        _user_id: &str,
    ) -> joyverse_core::error::Result<Option<Session>> {
        Ok(self.active.lock().unwrap().clone())
    }
}

/// Probe double that plays back a script of results.
///
/// An exhausted script reports "no face", the probe's most common
/// real-world failure.
struct ScriptedProbe {
    readings: StdMutex<VecDeque<std::result::Result<EmotionReading, ProbeError>>>,
    captures: AtomicUsize,
}

impl ScriptedProbe {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            readings: StdMutex::new(VecDeque::new()),
            captures: AtomicUsize::new(0),
        })
    }

    fn push_reading(&self, emotion: &str, confidence: f32) {
        self.readings
            .lock()
            .unwrap()
            .push_back(Ok(EmotionReading::new(emotion, confidence)));
    }

    fn push_error(&self, err: ProbeError) {
        self.readings.lock().unwrap().push_back(Err(err));
    }

    fn capture_count(&self) -> usize {
        self.captures.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmotionProbe for ScriptedProbe {
    async fn capture(&self) -> std::result::Result<EmotionReading, ProbeError> {
        self.captures.fetch_add(1, Ordering::SeqCst);
        self.readings
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ProbeError::Capture("no face detected".into())))
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn controller(
    store: Arc<RecordingStore>,
    probe: Arc<ScriptedProbe>,
) -> Arc<GameSessionController> {
    Arc::new(GameSessionController::new(
        store,
        probe,
        "child-9",
        GameKind::SnakeWords,
    ))
}

fn easy_session(id: &str) -> Session {
    let mut session = Session::new(id, "child-9", GameKind::SnakeWords, Utc::now());
    session.difficulty = DifficultyTier::Easy;
    session
}

fn drain_events(rx: &mut broadcast::Receiver<SessionEvent>) -> Vec<SessionEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

/// Lets spawned loop tasks run after a paused-clock advance.
async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}

// ============================================================================
// Lifecycle
// ============================================================================

#[tokio::test]
async fn test_playing_starts_a_session() {
    let store = RecordingStore::new();
    let probe = ScriptedProbe::new();
    let controller = controller(store.clone(), probe);

    controller.handle_status(GameStatus::Playing).await.unwrap();

    assert_eq!(store.start_count(), 1);
    assert_eq!(controller.phase().await, Phase::Active);
    assert_eq!(controller.session_id().await, Some("session-1".to_string()));
    assert_eq!(controller.difficulty().await, DifficultyTier::Medium);
    controller.handle_status(GameStatus::GameOver).await.unwrap();
}

#[tokio::test]
async fn test_playing_reuses_existing_active_session() {
    let store = RecordingStore::with_active_session(easy_session("existing-1"));
    let probe = ScriptedProbe::new();
    let controller = controller(store.clone(), probe);

    controller.handle_status(GameStatus::Playing).await.unwrap();

    // No new session; the existing one and its tier are adopted.
    assert_eq!(store.start_count(), 0);
    assert_eq!(
        controller.session_id().await,
        Some("existing-1".to_string())
    );
    assert_eq!(controller.difficulty().await, DifficultyTier::Easy);
    controller.handle_status(GameStatus::GameOver).await.unwrap();
}

#[tokio::test]
async fn test_repeated_playing_is_a_no_op() {
    let store = RecordingStore::new();
    let probe = ScriptedProbe::new();
    let controller = controller(store.clone(), probe);

    controller.handle_status(GameStatus::Playing).await.unwrap();
    controller.handle_status(GameStatus::Playing).await.unwrap();

    assert_eq!(store.start_count(), 1);
    controller.handle_status(GameStatus::GameOver).await.unwrap();
}

#[tokio::test]
async fn test_game_over_flushes_and_ends_session() {
    let store = RecordingStore::new();
    let probe = ScriptedProbe::new();
    probe.push_reading("happy", 0.9);
    let controller = controller(store.clone(), probe);
    let mut events = controller.subscribe();

    controller.handle_status(GameStatus::Playing).await.unwrap();
    controller.probe_tick().await;
    controller.current_word_changed("sun").await;
    controller.handle_status(GameStatus::GameOver).await.unwrap();

    // The pending reading was flushed before the session closed.
    assert_eq!(store.append_count(), 1);
    let ended = store.ended_sessions();
    assert_eq!(ended.len(), 1);
    assert_eq!(ended[0].0, "session-1");
    assert_eq!(controller.phase().await, Phase::Ended);

    let events = drain_events(&mut events);
    assert!(events
        .iter()
        .any(|event| matches!(event, SessionEvent::SessionEnded { .. })));
}

#[tokio::test]
async fn test_playing_after_end_is_ignored() {
    let store = RecordingStore::new();
    let probe = ScriptedProbe::new();
    let controller = controller(store.clone(), probe);

    controller.handle_status(GameStatus::Playing).await.unwrap();
    controller.handle_status(GameStatus::GameOver).await.unwrap();
    controller.handle_status(GameStatus::Playing).await.unwrap();

    assert_eq!(store.start_count(), 1);
    assert_eq!(controller.phase().await, Phase::Ended);
}

// ============================================================================
// Commit on word completion
// ============================================================================

#[tokio::test]
async fn test_commit_on_completion_applies_policy() {
    let store = RecordingStore::with_active_session(easy_session("existing-1"));
    let probe = ScriptedProbe::new();
    probe.push_reading("happy", 0.9);
    let controller = controller(store.clone(), probe);
    let mut events = controller.subscribe();

    controller.handle_status(GameStatus::Playing).await.unwrap();
    controller.probe_tick().await;
    controller.word_completed("cat").await.unwrap();

    // Exactly one sample, carrying the tier in effect at capture time.
    let samples = store.appended_samples();
    assert_eq!(samples.len(), 1);
    let (session_id, sample) = &samples[0];
    assert_eq!(session_id, "existing-1");
    assert_eq!(sample.word, "cat");
    assert_eq!(sample.emotion, "happy");
    assert_eq!(sample.difficulty, DifficultyTier::Easy);

    // The policy then raised the tier.
    assert_eq!(controller.difficulty().await, DifficultyTier::Medium);
    let events = drain_events(&mut events);
    assert!(events.iter().any(|event| matches!(
        event,
        SessionEvent::DifficultyChanged {
            previous: DifficultyTier::Easy,
            next: DifficultyTier::Medium,
        }
    )));
    controller.handle_status(GameStatus::GameOver).await.unwrap();
}

#[tokio::test]
async fn test_word_without_probe_result_commits_nothing() {
    let store = RecordingStore::new();
    let probe = ScriptedProbe::new();
    let controller = controller(store.clone(), probe);

    controller.handle_status(GameStatus::Playing).await.unwrap();
    controller.word_completed("cat").await.unwrap();

    assert_eq!(store.append_count(), 0);
    controller.handle_status(GameStatus::GameOver).await.unwrap();
}

#[tokio::test]
async fn test_pending_slot_keeps_latest_reading_only() {
    let store = RecordingStore::new();
    let probe = ScriptedProbe::new();
    probe.push_reading("happy", 0.9);
    probe.push_reading("sad", 0.8);
    let controller = controller(store.clone(), probe);

    controller.handle_status(GameStatus::Playing).await.unwrap();
    controller.probe_tick().await;
    controller.probe_tick().await;
    controller.word_completed("cat").await.unwrap();

    let samples = store.appended_samples();
    assert_eq!(samples.len(), 1);
    assert_eq!(samples[0].1.emotion, "sad");
    controller.handle_status(GameStatus::GameOver).await.unwrap();
}

#[tokio::test]
async fn test_one_commit_per_word() {
    let store = RecordingStore::new();
    let probe = ScriptedProbe::new();
    probe.push_reading("happy", 0.9);
    let controller = controller(store.clone(), probe);

    controller.handle_status(GameStatus::Playing).await.unwrap();
    controller.probe_tick().await;
    controller.word_completed("cat").await.unwrap();
    // The slot was consumed; a second completion has nothing to commit.
    controller.word_completed("cat").await.unwrap();

    assert_eq!(store.append_count(), 1);
    controller.handle_status(GameStatus::GameOver).await.unwrap();
}

// ============================================================================
// Flush paths
// ============================================================================

#[tokio::test]
async fn test_unload_flush_commits_once_and_is_idempotent() {
    let store = RecordingStore::new();
    let probe = ScriptedProbe::new();
    probe.push_reading("happy", 0.9);
    let controller = controller(store.clone(), probe);

    controller.handle_status(GameStatus::Playing).await.unwrap();
    controller.current_word_changed("sun").await;
    controller.probe_tick().await;

    controller.flush_on_unload().await.unwrap();
    assert_eq!(store.append_count(), 1);
    assert_eq!(store.appended_samples()[0].1.word, "sun");

    // Second flush with a cleared slot performs zero persistence calls.
    controller.flush_on_unload().await.unwrap();
    assert_eq!(store.append_count(), 1);
    controller.handle_status(GameStatus::GameOver).await.unwrap();
}

#[tokio::test]
async fn test_manual_save_flushes_and_stamps() {
    let store = RecordingStore::new();
    let probe = ScriptedProbe::new();
    probe.push_reading("calm", 0.8);
    let controller = controller(store.clone(), probe);
    let mut events = controller.subscribe();

    controller.handle_status(GameStatus::Playing).await.unwrap();
    controller.probe_tick().await;
    assert!(controller.last_saved_at().await.is_none());

    controller.save().await.unwrap();

    assert_eq!(store.append_count(), 1);
    assert!(controller.last_saved_at().await.is_some());
    let events = drain_events(&mut events);
    assert!(events
        .iter()
        .any(|event| matches!(event, SessionEvent::SaveCompleted { .. })));
    controller.handle_status(GameStatus::GameOver).await.unwrap();
}

#[tokio::test]
async fn test_failed_append_retains_pending_for_retry() {
    let store = RecordingStore::new();
    let probe = ScriptedProbe::new();
    probe.push_reading("happy", 0.9);
    let controller = controller(store.clone(), probe);

    controller.handle_status(GameStatus::Playing).await.unwrap();
    controller.probe_tick().await;

    store.fail_appends.store(true, Ordering::SeqCst);
    assert!(controller.word_completed("cat").await.is_err());
    assert!(controller.has_pending_emotion().await);
    assert_eq!(store.append_count(), 0);

    // The next flush opportunity retries the same reading.
    store.fail_appends.store(false, Ordering::SeqCst);
    controller.flush_on_unload().await.unwrap();
    assert_eq!(store.append_count(), 1);
    assert_eq!(store.appended_samples()[0].1.emotion, "happy");
    controller.handle_status(GameStatus::GameOver).await.unwrap();
}

#[tokio::test]
async fn test_terminal_flush_failure_emits_save_failed() {
    let store = RecordingStore::new();
    let probe = ScriptedProbe::new();
    probe.push_reading("happy", 0.9);
    let controller = controller(store.clone(), probe);
    let mut events = controller.subscribe();

    controller.handle_status(GameStatus::Playing).await.unwrap();
    controller.probe_tick().await;

    store.fail_appends.store(true, Ordering::SeqCst);
    controller.handle_status(GameStatus::GameOver).await.unwrap();

    // The session still closed; the lost sample was surfaced.
    assert_eq!(store.ended_sessions().len(), 1);
    let events = drain_events(&mut events);
    assert!(events
        .iter()
        .any(|event| matches!(event, SessionEvent::SaveFailed { .. })));
}

// ============================================================================
// Probe behavior
// ============================================================================

#[tokio::test]
async fn test_probe_failure_is_a_skipped_cycle() {
    let store = RecordingStore::new();
    let probe = ScriptedProbe::new();
    probe.push_error(ProbeError::Capture("no face detected".into()));
    probe.push_error(ProbeError::Classifier("timeout".into()));
    let controller = controller(store.clone(), probe.clone());
    let mut events = controller.subscribe();

    controller.handle_status(GameStatus::Playing).await.unwrap();
    controller.probe_tick().await;
    controller.probe_tick().await;

    assert_eq!(probe.capture_count(), 2);
    assert!(!controller.has_pending_emotion().await);
    assert_eq!(controller.difficulty().await, DifficultyTier::Medium);
    assert!(drain_events(&mut events).is_empty());
    controller.handle_status(GameStatus::GameOver).await.unwrap();
}

#[tokio::test]
async fn test_probe_emits_background_change_for_mapped_emotions() {
    let store = RecordingStore::new();
    let probe = ScriptedProbe::new();
    probe.push_reading("sad", 0.7);
    probe.push_reading("surprised", 0.9);
    let controller = controller(store.clone(), probe);
    let mut events = controller.subscribe();

    controller.handle_status(GameStatus::Playing).await.unwrap();
    controller.probe_tick().await;
    controller.probe_tick().await;

    let events = drain_events(&mut events);
    let backgrounds: Vec<_> = events
        .iter()
        .filter(|event| matches!(event, SessionEvent::BackgroundEmotionChanged { .. }))
        .collect();
    // "sad" maps to a theme; "surprised" deliberately does not.
    assert_eq!(backgrounds.len(), 1);
    controller.handle_status(GameStatus::GameOver).await.unwrap();
}

#[tokio::test]
async fn test_no_write_into_ended_session() {
    let store = RecordingStore::new();
    let probe = ScriptedProbe::new();
    let controller = controller(store.clone(), probe.clone());

    controller.handle_status(GameStatus::Playing).await.unwrap();
    controller.handle_status(GameStatus::GameOver).await.unwrap();

    // Stray timer callbacks after the end must not touch the store.
    probe.push_reading("happy", 0.9);
    controller.probe_tick().await;
    controller.flush_tick().await;
    controller.word_completed("cat").await.unwrap();

    assert_eq!(store.append_count(), 0);
    assert_eq!(probe.capture_count(), 0);
}

// ============================================================================
// Timer loops (paused clock)
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_probe_loop_respects_initial_delay_and_interval() {
    let store = RecordingStore::new();
    let probe = ScriptedProbe::new();
    let controller = controller(store.clone(), probe.clone());

    controller.handle_status(GameStatus::Playing).await.unwrap();
    settle().await;
    assert_eq!(probe.capture_count(), 0);

    // First capture fires after the initial 10s delay.
    tokio::time::advance(Duration::from_secs(10)).await;
    settle().await;
    assert_eq!(probe.capture_count(), 1);

    // Then one capture per 10s interval.
    tokio::time::advance(Duration::from_secs(10)).await;
    settle().await;
    assert_eq!(probe.capture_count(), 2);
    controller.handle_status(GameStatus::GameOver).await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_periodic_flush_commits_stalled_pending() {
    let store = RecordingStore::new();
    let probe = ScriptedProbe::new();
    probe.push_reading("happy", 0.9);
    let controller = controller(store.clone(), probe);

    controller.handle_status(GameStatus::Playing).await.unwrap();
    controller.current_word_changed("sun").await;
    settle().await;

    // Probe at 10s fills the slot; no word completes before the 30s flush.
    tokio::time::advance(Duration::from_secs(10)).await;
    settle().await;
    assert!(controller.has_pending_emotion().await);

    tokio::time::advance(Duration::from_secs(20)).await;
    settle().await;

    let samples = store.appended_samples();
    assert_eq!(samples.len(), 1);
    assert_eq!(samples[0].1.word, "sun");
    assert_eq!(samples[0].1.emotion, "happy");

    // A later flush with an empty slot commits nothing.
    tokio::time::advance(Duration::from_secs(30)).await;
    settle().await;
    assert_eq!(store.append_count(), 1);
    controller.handle_status(GameStatus::GameOver).await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_pause_stops_both_loops() {
    let store = RecordingStore::new();
    let probe = ScriptedProbe::new();
    probe.push_reading("happy", 0.9);
    let controller = controller(store.clone(), probe.clone());

    controller.handle_status(GameStatus::Playing).await.unwrap();
    settle().await;
    tokio::time::advance(Duration::from_secs(10)).await;
    settle().await;
    assert_eq!(probe.capture_count(), 1);

    controller.handle_status(GameStatus::Paused).await.unwrap();
    settle().await;

    tokio::time::advance(Duration::from_secs(60)).await;
    settle().await;
    assert_eq!(probe.capture_count(), 1);
    assert_eq!(store.append_count(), 0);
    // Pending and session survive the pause.
    assert!(controller.has_pending_emotion().await);
    assert_eq!(controller.phase().await, Phase::Active);

    // Resuming restarts polling without a new session.
    controller.handle_status(GameStatus::Playing).await.unwrap();
    settle().await;
    tokio::time::advance(Duration::from_secs(10)).await;
    settle().await;
    assert_eq!(probe.capture_count(), 2);
    assert_eq!(store.start_count(), 1);
    controller.handle_status(GameStatus::GameOver).await.unwrap();
}
