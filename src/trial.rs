// Trial state machine: Idle -> ReactionRound(1..=N) -> GestureSequence(0..len) -> Complete.
// Every entry point takes the host timestamp, resolves any expired settle guard first,
// then applies at most one transition. Pointer input is the exception for a lapsed miss
// window: the press is judged against the layout still on screen, then the round re-arms.
// Nothing here waits or schedules callbacks.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::classifier::{select_hand, Detection, LandmarkClassifier};
use crate::error::{Result, TrialError};
use crate::ledger::{ScoreLedger, ScoreRecord};
use crate::stopwatch::Stopwatch;
use crate::targets::TargetField;
use crate::types::*;
use crate::viewport::ViewportMapper;

pub const DEFAULT_PLAYER: &str = "Anonymous";

/// Mutable state of the current run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialContext {
    pub phase: TrialPhase,
    pub player: String,
    /// Gesture order for this run. Empty until the gesture phase begins.
    pub sequence: Vec<GestureLabel>,
}

impl Default for TrialContext {
    fn default() -> Self {
        TrialContext {
            phase: TrialPhase::Idle,
            player: DEFAULT_PLAYER.to_string(),
            sequence: Vec::new(),
        }
    }
}

impl TrialContext {
    pub fn current_gesture(&self) -> Option<GestureLabel> {
        match self.phase {
            TrialPhase::GestureSequence { index } => self.sequence.get(index).copied(),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SettleAction {
    /// Re-place the current round's targets after a miss.
    RearmRound,
    /// Move past a matched gesture.
    AdvanceGesture,
}

/// Quiet period after a transition. Input during the window is accepted but inert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SettleGuard {
    until: Timestamp,
    action: SettleAction,
}

/// Random permutation of the full gesture vocabulary.
pub fn shuffled_sequence<R: rand::Rng + ?Sized>(rng: &mut R) -> Vec<GestureLabel> {
    let mut sequence = GestureLabel::ALL.to_vec();
    sequence.shuffle(rng);
    sequence
}

pub fn player_name(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        DEFAULT_PLAYER.to_string()
    } else {
        trimmed.to_string()
    }
}

pub struct Trial {
    config: TrialConfig,
    classifier: LandmarkClassifier,
    field: TargetField,
    stopwatch: Stopwatch,
    ledger: ScoreLedger,
    rng: StdRng,
    context: TrialContext,
    guard: Option<SettleGuard>,
}

impl Trial {
    pub fn new(config: TrialConfig, ledger: ScoreLedger) -> Result<Self> {
        Self::with_rng(config, ledger, StdRng::from_entropy())
    }

    pub fn with_rng(config: TrialConfig, ledger: ScoreLedger, rng: StdRng) -> Result<Self> {
        validate_config(&config)?;

        Ok(Trial {
            classifier: LandmarkClassifier::new(config.min_wrist_visibility, config.prompt_hand),
            field: TargetField::new(config.surface.clone()),
            stopwatch: Stopwatch::new(),
            ledger,
            rng,
            context: TrialContext::default(),
            guard: None,
            config,
        })
    }

    pub fn config(&self) -> &TrialConfig {
        &self.config
    }

    pub fn context(&self) -> &TrialContext {
        &self.context
    }

    pub fn phase(&self) -> TrialPhase {
        self.context.phase
    }

    pub fn targets(&self) -> &TargetField {
        &self.field
    }

    pub fn stopwatch(&self) -> &Stopwatch {
        &self.stopwatch
    }

    pub fn ledger(&self) -> &ScoreLedger {
        &self.ledger
    }

    /// Whether a settle window is still open at `now`.
    pub fn is_settling(&self, now: Timestamp) -> bool {
        self.guard.map_or(false, |g| now < g.until)
    }

    /// Which detector the host should run for the next frame, if any.
    pub fn required_source(&self) -> Option<LandmarkSource> {
        match self.context.phase {
            TrialPhase::ReactionRound { .. } => Some(LandmarkSource::Hand),
            TrialPhase::GestureSequence { .. } => self.context.current_gesture().map(|g| g.source()),
            TrialPhase::Idle | TrialPhase::Complete => None,
        }
    }

    pub fn timer_text(&self, now: Timestamp) -> String {
        self.stopwatch.display(now)
    }

    pub fn leaderboard_top(&self, k: usize) -> Vec<ScoreRecord> {
        self.ledger.top_n(k)
    }

    /// Default-sized leaderboard slice.
    pub fn leaderboard(&self) -> Vec<ScoreRecord> {
        self.ledger.top_n(self.config.leaderboard_size)
    }

    pub fn clear_leaderboard(&mut self) {
        self.ledger.clear();
    }

    /// Begin a new run from any state.
    pub fn start_trial(&mut self, player: &str, now: Timestamp) -> Vec<RenderIntent> {
        self.context = TrialContext {
            phase: TrialPhase::Idle,
            player: player_name(player),
            sequence: Vec::new(),
        };
        self.guard = None;
        self.field.clear();
        self.stopwatch.reset();
        self.stopwatch.start(now);
        info!(player = %self.context.player, "trial started");

        let mut intents = vec![RenderIntent::ShowTimer { visible: true }];
        self.enter_round(1, &mut intents);
        intents
    }

    /// Resolve an expired settle window. Call once per display refresh.
    pub fn tick(&mut self, now: Timestamp) -> Vec<RenderIntent> {
        let mut intents = Vec::new();
        self.resolve_guard(now, &mut intents);
        intents
    }

    /// Host reports the camera or detector is unavailable. Classification simply never runs.
    pub fn camera_unavailable(&self) -> Vec<RenderIntent> {
        vec![RenderIntent::ShowStatus {
            text: "Camera not found. Gestures will be skipped.".to_string(),
        }]
    }

    /// Pointer resolved onto a target.
    pub fn on_pointer_hit(&mut self, id: TargetId, now: Timestamp) -> Vec<RenderIntent> {
        let mut intents = Vec::new();
        let rearm = self.begin_pointer(now, &mut intents);

        let handled = match self.active_round(now) {
            Some(round) => self.dispatch_hit(round, id, now, &mut intents),
            None => false,
        };
        self.finish_pointer(rearm, handled, &mut intents);
        intents
    }

    /// Pointer landed on the play surface but not on any target.
    pub fn on_pointer_miss(&mut self, now: Timestamp) -> Vec<RenderIntent> {
        let mut intents = Vec::new();
        let rearm = self.begin_pointer(now, &mut intents);

        let handled = match self.active_round(now) {
            Some(round) => {
                self.register_miss(round, now, &mut intents);
                true
            }
            None => false,
        };
        self.finish_pointer(rearm, handled, &mut intents);
        intents
    }

    /// Hit-test a pointer press in play-surface pixels and dispatch it.
    pub fn on_pointer_at(&mut self, point: ScreenPoint, now: Timestamp) -> Vec<RenderIntent> {
        let mut intents = Vec::new();
        let rearm = self.begin_pointer(now, &mut intents);

        let hit = self.field.hit_test(point).map(|t| t.id);
        let handled = match (self.active_round(now), hit) {
            (Some(round), Some(id)) => self.dispatch_hit(round, id, now, &mut intents),
            (Some(round), None) if self.field.on_surface(point) => {
                self.register_miss(round, now, &mut intents);
                true
            }
            _ => false,
        };
        self.finish_pointer(rearm, handled, &mut intents);
        intents
    }

    /// Project the tracked fingertip of a hand batch into play-surface pixels.
    pub fn track_fingertip(&self, batch: &LandmarkBatch, mapper: &ViewportMapper) -> Option<ScreenPoint> {
        if batch.source != LandmarkSource::Hand {
            return None;
        }
        select_hand(&batch.frames, self.config.prompt_hand).and_then(|frame| mapper.map_fingertip(frame))
    }

    /// One detection tick from the host.
    pub fn on_landmark_frames(&mut self, batch: &LandmarkBatch, now: Timestamp) -> Vec<RenderIntent> {
        let mut intents = Vec::new();
        self.resolve_guard(now, &mut intents);

        let TrialPhase::GestureSequence { index } = self.context.phase else {
            debug!(phase = ?self.context.phase, "discarding landmarks outside gesture phase");
            return intents;
        };
        if self.is_settling(now) {
            return intents;
        }
        if batch.gesture_index.map_or(false, |i| i != index) {
            debug!(expected = index, got = ?batch.gesture_index, "discarding stale landmarks");
            return intents;
        }
        let Some(target) = self.context.current_gesture() else {
            return intents;
        };
        if batch.source != target.source() {
            debug!(source = ?batch.source, "discarding landmarks from inactive detector");
            return intents;
        }

        match self.classifier.detect(batch) {
            Detection::NoSubject => intents.push(status(match batch.source {
                LandmarkSource::Hand => "Bring hand into view...",
                LandmarkSource::Body => "Step back to show upper body...",
            })),
            Detection::Unrecognized => intents.push(status(match batch.source {
                LandmarkSource::Hand => "Tracking Hand...",
                LandmarkSource::Body => "Tracking Body...",
            })),
            Detection::Recognized(label) if label == target => {
                info!(gesture = label.as_str(), index, "gesture matched");
                intents.push(RenderIntent::FlashSuccess);
                intents.push(status(&format!("✅ CLEARED: {}", label.display_name())));
                self.guard = Some(SettleGuard {
                    until: now.plus_millis(self.config.match_settle_ms),
                    action: SettleAction::AdvanceGesture,
                });
            }
            Detection::Recognized(label) => {
                intents.push(status(&format!("Detected: {}", label.display_name())));
            }
        }
        intents
    }

    /// End the run now with whatever time has accrued.
    pub fn skip_to_end(&mut self, now: Timestamp) -> Vec<RenderIntent> {
        let mut intents = Vec::new();
        match self.context.phase {
            TrialPhase::Idle | TrialPhase::Complete => {}
            _ => {
                info!(phase = ?self.context.phase, "trial skipped to end");
                self.guard = None;
                self.complete(now, &mut intents);
            }
        }
        intents
    }

    /// Current round if the round accepts pointer input at `now`.
    fn active_round(&self, now: Timestamp) -> Option<u32> {
        match self.context.phase {
            TrialPhase::ReactionRound { round } if !self.is_settling(now) => Some(round),
            _ => None,
        }
    }

    /// Settle step for pointer input. A lapsed miss window that the host has not ticked
    /// past still has the previous layout on screen, so the press is judged against it
    /// and the re-arm is deferred to `finish_pointer`. Returns whether a re-arm is pending.
    fn begin_pointer(&mut self, now: Timestamp, intents: &mut Vec<RenderIntent>) -> bool {
        match self.guard {
            Some(guard) if guard.action == SettleAction::RearmRound && now >= guard.until => {
                self.guard = None;
                true
            }
            _ => {
                self.resolve_guard(now, intents);
                false
            }
        }
    }

    /// Re-arm the round if the press did not already replace the layout or open a new window.
    fn finish_pointer(&mut self, rearm: bool, handled: bool, intents: &mut Vec<RenderIntent>) {
        if !rearm || handled {
            return;
        }
        if let TrialPhase::ReactionRound { round } = self.context.phase {
            self.enter_round(round, intents);
        }
    }

    /// Judge a press on target `id`. Returns false when the id is not on the field.
    fn dispatch_hit(&mut self, round: u32, id: TargetId, now: Timestamp, intents: &mut Vec<RenderIntent>) -> bool {
        match self.field.get(id).map(Target::is_designated) {
            Some(true) => self.advance_round(round, now, intents),
            Some(false) => self.register_miss(round, now, intents),
            None => {
                debug!(err = %TrialError::UnknownTarget(id), "ignoring stale pointer hit");
                return false;
            }
        }
        true
    }

    fn resolve_guard(&mut self, now: Timestamp, intents: &mut Vec<RenderIntent>) {
        let Some(guard) = self.guard else {
            return;
        };
        if now < guard.until {
            return;
        }
        self.guard = None;

        match (guard.action, self.context.phase) {
            (SettleAction::RearmRound, TrialPhase::ReactionRound { round }) => {
                self.enter_round(round, intents);
            }
            (SettleAction::AdvanceGesture, TrialPhase::GestureSequence { index }) => {
                let next = index + 1;
                if next >= self.context.sequence.len() {
                    // The transition belongs to the instant the window closed.
                    self.complete(guard.until, intents);
                } else {
                    self.context.phase = TrialPhase::GestureSequence { index: next };
                    self.show_prompt(intents);
                }
            }
            (action, phase) => debug!(?action, ?phase, "dropping settle guard for ended phase"),
        }
    }

    fn enter_round(&mut self, round: u32, intents: &mut Vec<RenderIntent>) {
        self.context.phase = TrialPhase::ReactionRound { round };
        intents.push(RenderIntent::ShowRound {
            text: format!("Round {} of {}", round, self.config.round_count),
        });
        intents.push(RenderIntent::RemoveAllTargets);

        let size = self.field.target_size();
        for target in self.field.generate(&mut self.rng) {
            intents.push(RenderIntent::PlaceTarget {
                id: target.id,
                color: target.color.clone(),
                x: target.rect.x,
                y: target.rect.y,
                size,
            });
        }
    }

    fn register_miss(&mut self, round: u32, now: Timestamp, intents: &mut Vec<RenderIntent>) {
        self.stopwatch.apply_penalty(self.config.miss_penalty_ms);
        debug!(round, penalty_ms = self.stopwatch.penalty_ms(), "reaction miss");
        intents.push(RenderIntent::ShowRound {
            text: format!(
                "Missed! +{}s Penalty",
                self.config.miss_penalty_ms as f64 / 1000.0
            ),
        });
        self.guard = Some(SettleGuard {
            until: now.plus_millis(self.config.miss_settle_ms),
            action: SettleAction::RearmRound,
        });
    }

    fn advance_round(&mut self, round: u32, now: Timestamp, intents: &mut Vec<RenderIntent>) {
        if round >= self.config.round_count {
            self.begin_gestures(now, intents);
        } else {
            self.enter_round(round + 1, intents);
        }
    }

    fn begin_gestures(&mut self, now: Timestamp, intents: &mut Vec<RenderIntent>) {
        self.field.clear();
        self.context.sequence = shuffled_sequence(&mut self.rng);
        self.context.phase = TrialPhase::GestureSequence { index: 0 };
        info!(
            elapsed_ms = self.stopwatch.elapsed_now(now).as_millis(),
            "reaction rounds complete"
        );

        intents.push(RenderIntent::RemoveAllTargets);
        self.show_prompt(intents);
    }

    fn show_prompt(&self, intents: &mut Vec<RenderIntent>) {
        if let Some(label) = self.context.current_gesture() {
            intents.push(RenderIntent::ShowOverlay {
                label,
                icon: label.icon().to_string(),
                prompt: format!("Perform: {}", label.display_name()),
            });
            intents.push(status("Detecting..."));
        }
    }

    fn complete(&mut self, now: Timestamp, intents: &mut Vec<RenderIntent>) {
        self.stopwatch.stop(now);
        self.field.clear();
        self.context.phase = TrialPhase::Complete;

        let total = self.stopwatch.elapsed_secs(now);
        let player = self.context.player.clone();
        self.ledger.append(&player, total);
        info!(player = %player, total, "trial complete");

        intents.push(RenderIntent::RemoveAllTargets);
        intents.push(RenderIntent::ShowTimer { visible: false });
        intents.push(status(&format!("Finished in {:.3}s", total)));
        intents.push(RenderIntent::ShowLeaderboard);
    }
}

fn status(text: &str) -> RenderIntent {
    RenderIntent::ShowStatus {
        text: text.to_string(),
    }
}

fn validate_config(config: &TrialConfig) -> Result<()> {
    if config.round_count == 0 {
        return Err(TrialError::InvalidConfig(
            "round_count must be at least 1".to_string(),
        ));
    }
    let surface = &config.surface;
    if !(surface.width > 0.0 && surface.height > 0.0) {
        return Err(TrialError::InvalidConfig(format!(
            "play surface must have a positive size, got {}x{}",
            surface.width, surface.height
        )));
    }
    if !(surface.target_size > 0.0) {
        return Err(TrialError::InvalidConfig(
            "target_size must be positive".to_string(),
        ));
    }
    Ok(())
}
