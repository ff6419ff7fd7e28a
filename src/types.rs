// Strong typing over strings. Newtypes for timestamps and target ids, fixed-shape landmark records.
// Landmark indices follow the MediaPipe Hands / Pose conventions.

use serde::{Deserialize, Serialize};

/// Host monotonic instant in microseconds. Newtype for type safety.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub struct Timestamp(u64);

impl Timestamp {
    pub fn from_micros(us: u64) -> Self {
        Timestamp(us)
    }

    pub fn from_millis(ms: u64) -> Self {
        Timestamp(ms.saturating_mul(1000))
    }

    pub fn as_micros(&self) -> u64 {
        self.0
    }

    pub fn as_millis(&self) -> f64 {
        self.0 as f64 / 1000.0
    }

    /// This instant shifted forward by `ms` milliseconds.
    pub fn plus_millis(&self, ms: u64) -> Self {
        Timestamp(self.0.saturating_add(ms.saturating_mul(1000)))
    }

    /// Microseconds from `earlier` to `self`, zero if `earlier` is later.
    pub fn micros_since(&self, earlier: Timestamp) -> u64 {
        self.0.saturating_sub(earlier.0)
    }
}

/// Point in viewport / play-surface pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct ScreenPoint {
    pub x: f32,
    pub y: f32,
}

impl ScreenPoint {
    pub fn new(x: f32, y: f32) -> Self {
        ScreenPoint { x, y }
    }
}

/// Axis-aligned rectangle in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct ScreenRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl ScreenRect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        ScreenRect {
            x,
            y,
            width,
            height,
        }
    }

    pub fn center(&self) -> ScreenPoint {
        ScreenPoint::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Inclusive on all edges.
    pub fn contains(&self, point: ScreenPoint) -> bool {
        point.x >= self.x
            && point.x <= self.x + self.width
            && point.y >= self.y
            && point.y <= self.y + self.height
    }
}

/// One detected keypoint. `visibility` is absent for models that do not report it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct LandmarkPoint {
    pub x: f32,
    pub y: f32,
    #[serde(default)]
    pub visibility: Option<f32>,
}

impl LandmarkPoint {
    pub fn new(x: f32, y: f32) -> Self {
        LandmarkPoint {
            x,
            y,
            visibility: None,
        }
    }

    pub fn with_visibility(x: f32, y: f32, visibility: f32) -> Self {
        LandmarkPoint {
            x,
            y,
            visibility: Some(visibility),
        }
    }

    /// Missing visibility counts as fully visible.
    pub fn visibility_or_full(&self) -> f32 {
        self.visibility.unwrap_or(1.0)
    }
}

/// Which detector produced a batch of frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LandmarkSource {
    Hand,
    Body,
}

impl LandmarkSource {
    /// Minimum number of points a frame from this source must carry.
    pub fn required_points(&self) -> usize {
        match self {
            LandmarkSource::Hand => HAND_POINT_COUNT,
            LandmarkSource::Body => BODY_MIN_POINT_COUNT,
        }
    }
}

/// Detector handedness label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Handedness {
    Left,
    Right,
}

impl Handedness {
    /// Detector label expected for a prompted hand on a mirrored selfie camera.
    /// Prompt `Right` expects the detector to report `Left`, and vice versa.
    pub fn mirrored(&self) -> Handedness {
        match self {
            Handedness::Left => Handedness::Right,
            Handedness::Right => Handedness::Left,
        }
    }
}

pub const HAND_POINT_COUNT: usize = 21;
pub const BODY_MIN_POINT_COUNT: usize = 17;

/// Landmarks for one detected subject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct LandmarkFrame {
    pub points: Vec<LandmarkPoint>,
    #[serde(default)]
    pub handedness: Option<Handedness>,
}

impl LandmarkFrame {
    pub fn new(points: Vec<LandmarkPoint>) -> Self {
        LandmarkFrame {
            points,
            handedness: None,
        }
    }

    pub fn point(&self, index: usize) -> Option<&LandmarkPoint> {
        self.points.get(index)
    }

    pub fn has_points_for(&self, source: LandmarkSource) -> bool {
        self.points.len() >= source.required_points()
    }
}

/// One detection tick from the host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LandmarkBatch {
    pub source: LandmarkSource,
    #[serde(default)]
    pub frames: Vec<LandmarkFrame>,
    /// Gesture index the host was detecting for when it sent the request.
    #[serde(default)]
    pub gesture_index: Option<usize>,
}

/// Fixed gesture vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GestureLabel {
    Rock,
    Paper,
    Scissor,
    RaiseHand,
    RaiseBothHands,
    TPose,
}

impl GestureLabel {
    pub const ALL: [GestureLabel; 6] = [
        GestureLabel::Rock,
        GestureLabel::Paper,
        GestureLabel::Scissor,
        GestureLabel::RaiseBothHands,
        GestureLabel::TPose,
        GestureLabel::RaiseHand,
    ];

    /// Manual gestures come from a hand frame, postural ones from a body frame.
    pub fn source(&self) -> LandmarkSource {
        match self {
            GestureLabel::Rock | GestureLabel::Paper | GestureLabel::Scissor => {
                LandmarkSource::Hand
            }
            GestureLabel::RaiseHand | GestureLabel::RaiseBothHands | GestureLabel::TPose => {
                LandmarkSource::Body
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            GestureLabel::Rock => "rock",
            GestureLabel::Paper => "paper",
            GestureLabel::Scissor => "scissor",
            GestureLabel::RaiseHand => "raise_hand",
            GestureLabel::RaiseBothHands => "raise_both_hands",
            GestureLabel::TPose => "t_pose",
        }
    }

    /// Upper-case label for prompts, underscores shown as spaces.
    pub fn display_name(&self) -> String {
        self.as_str().replace('_', " ").to_uppercase()
    }

    pub fn icon(&self) -> &'static str {
        match self {
            GestureLabel::Rock => "✊",
            GestureLabel::Paper => "✋",
            GestureLabel::Scissor => "✌️",
            GestureLabel::RaiseHand => "🙋",
            GestureLabel::RaiseBothHands => "🙌",
            GestureLabel::TPose => "🧍",
        }
    }
}

/// Active phase of a trial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum TrialPhase {
    Idle,
    /// 1-based round number.
    ReactionRound { round: u32 },
    /// 0-based index into the run's gesture order.
    GestureSequence { index: usize },
    Complete,
}

/// Identifier of an on-screen target within the current round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TargetId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    Designated,
    Decoy,
}

/// One interactive control placed on the play surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Target {
    pub id: TargetId,
    pub kind: TargetKind,
    pub color: String,
    pub rect: ScreenRect,
}

impl Target {
    pub fn is_designated(&self) -> bool {
        self.kind == TargetKind::Designated
    }
}

/// Render intents for the display sink. The engine never draws.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RenderIntent {
    ShowStatus { text: String },
    ShowRound { text: String },
    ShowOverlay { label: GestureLabel, icon: String, prompt: String },
    FlashSuccess,
    PlaceTarget { id: TargetId, color: String, x: f32, y: f32, size: f32 },
    RemoveAllTargets,
    ShowTimer { visible: bool },
    ShowLeaderboard,
}

/// Trial configuration passed from JS.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrialConfig {
    #[serde(default = "default_round_count")]
    pub round_count: u32,
    #[serde(default = "default_miss_penalty_ms")]
    pub miss_penalty_ms: u64,
    /// Quiet period after a miss before the round re-arms.
    #[serde(default = "default_miss_settle_ms")]
    pub miss_settle_ms: u64,
    /// Quiet period after a gesture match before the index advances.
    #[serde(default = "default_match_settle_ms")]
    pub match_settle_ms: u64,
    #[serde(default)]
    pub surface: SurfaceSettings,
    #[serde(default = "default_min_wrist_visibility")]
    pub min_wrist_visibility: f32,
    #[serde(default = "default_leaderboard_size")]
    pub leaderboard_size: usize,
    #[serde(default = "default_storage_key")]
    pub storage_key: String,
    /// Hand the player is asked to use. `None` classifies the first detected hand.
    #[serde(default)]
    pub prompt_hand: Option<Handedness>,
    /// Selfie cameras show a mirrored preview.
    #[serde(default = "default_true")]
    pub mirror: bool,
}

impl Default for TrialConfig {
    fn default() -> Self {
        TrialConfig {
            round_count: default_round_count(),
            miss_penalty_ms: default_miss_penalty_ms(),
            miss_settle_ms: default_miss_settle_ms(),
            match_settle_ms: default_match_settle_ms(),
            surface: SurfaceSettings::default(),
            min_wrist_visibility: default_min_wrist_visibility(),
            leaderboard_size: default_leaderboard_size(),
            storage_key: default_storage_key(),
            prompt_hand: None,
            mirror: true,
        }
    }
}

/// Play surface and target layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SurfaceSettings {
    #[serde(default = "default_surface_width")]
    pub width: f32,
    #[serde(default = "default_surface_height")]
    pub height: f32,
    /// Edge length of a square target in pixels.
    #[serde(default = "default_target_size")]
    pub target_size: f32,
    #[serde(default = "default_decoy_colors")]
    pub decoy_colors: Vec<String>,
    #[serde(default = "default_designated_color")]
    pub designated_color: String,
}

impl Default for SurfaceSettings {
    fn default() -> Self {
        SurfaceSettings {
            width: default_surface_width(),
            height: default_surface_height(),
            target_size: default_target_size(),
            decoy_colors: default_decoy_colors(),
            designated_color: default_designated_color(),
        }
    }
}

fn default_round_count() -> u32 {
    5
}

fn default_miss_penalty_ms() -> u64 {
    1000
}

fn default_miss_settle_ms() -> u64 {
    200
}

fn default_match_settle_ms() -> u64 {
    500
}

fn default_min_wrist_visibility() -> f32 {
    0.5
}

fn default_leaderboard_size() -> usize {
    10
}

fn default_storage_key() -> String {
    "rtg_leaderboard_v2".to_string()
}

fn default_true() -> bool {
    true
}

fn default_surface_width() -> f32 {
    640.0
}

fn default_surface_height() -> f32 {
    480.0
}

fn default_target_size() -> f32 {
    60.0
}

fn default_decoy_colors() -> Vec<String> {
    ["red", "blue", "white", "black", "purple"]
        .iter()
        .map(|c| c.to_string())
        .collect()
}

fn default_designated_color() -> String {
    "green".to_string()
}
