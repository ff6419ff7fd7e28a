// trial_engine: Rust/WASM engine for the reaction + gesture trial.
// All trial logic lives here; JS owns the camera, detector models, DOM, and clock, and is plumbing.

mod classifier;
mod error;
mod ledger;
mod stopwatch;
mod store;
mod targets;
mod trial;
mod types;
mod viewport;

use wasm_bindgen::prelude::*;

pub use classifier::{
    arm_angle, classify, classify_body, classify_body_with, classify_hand, select_hand, Detection,
    LandmarkClassifier,
};
pub use error::TrialError;
pub use ledger::{ScoreLedger, ScoreRecord};
pub use stopwatch::Stopwatch;
pub use store::{MemoryStore, ScoreStore};
#[cfg(target_arch = "wasm32")]
pub use store::LocalStorageStore;
pub use targets::TargetField;
pub use trial::{shuffled_sequence, Trial, TrialContext};
pub use types::*;
pub use viewport::{fingertip, ViewportMapper};

/// Initialize panic hook for better error messages in browser console.
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

fn to_js(err: TrialError) -> JsValue {
    JsValue::from_str(&err.to_string())
}

fn intents_json(intents: &[RenderIntent]) -> Result<String, TrialError> {
    Ok(serde_json::to_string(intents)?)
}

fn default_store() -> Box<dyn ScoreStore> {
    #[cfg(target_arch = "wasm32")]
    {
        Box::new(LocalStorageStore)
    }
    #[cfg(not(target_arch = "wasm32"))]
    {
        Box::new(MemoryStore::new())
    }
}

/// Main engine interface exposed to JavaScript.
/// Every call carries the host's monotonic time in microseconds and returns the
/// render intents it produced as a JSON array.
#[wasm_bindgen]
pub struct Engine {
    trial: Trial,
}

impl Engine {
    /// Build an engine over an explicit store (native hosts, tests).
    pub fn with_store(config_json: &str, store: Box<dyn ScoreStore>) -> Result<Engine, TrialError> {
        let config: TrialConfig = serde_json::from_str(config_json)
            .map_err(|e| TrialError::InvalidConfig(e.to_string()))?;
        let ledger = ScoreLedger::open(store, &config.storage_key);
        Ok(Engine {
            trial: Trial::new(config, ledger)?,
        })
    }

    pub fn trial(&self) -> &Trial {
        &self.trial
    }

    fn landmark_step(&mut self, batch_json: &str, now_us: u64) -> Result<String, TrialError> {
        let batch: LandmarkBatch = serde_json::from_str(batch_json)?;
        intents_json(&self.trial.on_landmark_frames(&batch, Timestamp::from_micros(now_us)))
    }

    fn fingertip_step(
        &self,
        batch_json: &str,
        video_width: f32,
        video_height: f32,
        viewport_json: &str,
    ) -> Result<String, TrialError> {
        let batch: LandmarkBatch = serde_json::from_str(batch_json)?;
        let viewport: ScreenRect = serde_json::from_str(viewport_json)?;
        let mapper = ViewportMapper::new(video_width, video_height, viewport, self.trial.config().mirror)?;
        Ok(serde_json::to_string(&self.trial.track_fingertip(&batch, &mapper))?)
    }
}

#[wasm_bindgen]
impl Engine {
    #[wasm_bindgen(constructor)]
    pub fn new(config_json: &str) -> Result<Engine, JsValue> {
        Engine::with_store(config_json, default_store()).map_err(to_js)
    }

    /// Begin a run for `player_name` (blank means "Anonymous").
    pub fn start_trial(&mut self, player_name: &str, now_us: u64) -> Result<String, JsValue> {
        intents_json(&self.trial.start_trial(player_name, Timestamp::from_micros(now_us))).map_err(to_js)
    }

    /// Per-frame housekeeping: closes expired settle windows.
    pub fn tick(&mut self, now_us: u64) -> Result<String, JsValue> {
        intents_json(&self.trial.tick(Timestamp::from_micros(now_us))).map_err(to_js)
    }

    /// Feed one detection tick: `{ "source": "hand"|"body", "frames": [...], "gesture_index"?: n }`.
    pub fn on_landmark_frames(&mut self, batch_json: &str, now_us: u64) -> Result<String, JsValue> {
        self.landmark_step(batch_json, now_us).map_err(to_js)
    }

    pub fn on_pointer_hit(&mut self, target_id: u32, now_us: u64) -> Result<String, JsValue> {
        intents_json(&self.trial.on_pointer_hit(TargetId(target_id), Timestamp::from_micros(now_us)))
            .map_err(to_js)
    }

    pub fn on_pointer_miss(&mut self, now_us: u64) -> Result<String, JsValue> {
        intents_json(&self.trial.on_pointer_miss(Timestamp::from_micros(now_us))).map_err(to_js)
    }

    /// Pointer press at play-surface pixel `(x, y)`; hit-tested against the live targets.
    pub fn on_pointer_at(&mut self, x: f32, y: f32, now_us: u64) -> Result<String, JsValue> {
        intents_json(
            &self
                .trial
                .on_pointer_at(ScreenPoint::new(x, y), Timestamp::from_micros(now_us)),
        )
        .map_err(to_js)
    }

    /// Map the tracked fingertip into play-surface pixels. Returns `{x, y}` or `null`.
    /// `viewport_json` is the video element's rect `{x, y, width, height}` on the play surface.
    pub fn track_fingertip(
        &self,
        batch_json: &str,
        video_width: f32,
        video_height: f32,
        viewport_json: &str,
    ) -> Result<String, JsValue> {
        self.fingertip_step(batch_json, video_width, video_height, viewport_json)
            .map_err(to_js)
    }

    pub fn skip_to_end(&mut self, now_us: u64) -> Result<String, JsValue> {
        intents_json(&self.trial.skip_to_end(Timestamp::from_micros(now_us))).map_err(to_js)
    }

    pub fn camera_unavailable(&self) -> Result<String, JsValue> {
        intents_json(&self.trial.camera_unavailable()).map_err(to_js)
    }

    /// `"hand"`, `"body"`, or undefined when no detector is needed.
    pub fn required_source(&self) -> Option<String> {
        self.trial.required_source().map(|source| match source {
            LandmarkSource::Hand => "hand".to_string(),
            LandmarkSource::Body => "body".to_string(),
        })
    }

    /// Current phase as JSON, e.g. `{"phase":"gesture_sequence","index":2}`.
    pub fn phase(&self) -> Result<String, JsValue> {
        serde_json::to_string(&self.trial.phase())
            .map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
    }

    /// Trial context as JSON: phase, player, gesture order.
    pub fn context(&self) -> Result<String, JsValue> {
        serde_json::to_string(self.trial.context())
            .map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
    }

    pub fn timer_text(&self, now_us: u64) -> String {
        self.trial.timer_text(Timestamp::from_micros(now_us))
    }

    /// The `k` fastest runs as a JSON array.
    pub fn leaderboard_top(&self, k: usize) -> Result<String, JsValue> {
        serde_json::to_string(&self.trial.leaderboard_top(k))
            .map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
    }

    /// The configured leaderboard slice (10 by default) as a JSON array.
    pub fn leaderboard(&self) -> Result<String, JsValue> {
        serde_json::to_string(&self.trial.leaderboard())
            .map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
    }

    pub fn clear_leaderboard(&mut self) {
        self.trial.clear_leaderboard();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_creation_works() {
        let engine = Engine::new(r#"{"round_count":3,"surface":{"width":800}}"#);
        assert!(engine.is_ok());
    }

    #[test]
    fn invalid_config_is_typed_error() {
        let engine = Engine::with_store(r#"{"round_count":0}"#, Box::new(MemoryStore::new()));
        assert!(matches!(engine, Err(TrialError::InvalidConfig(_))));
    }

    #[test]
    fn start_trial_returns_intent_json() {
        let mut engine = Engine::new("{}").unwrap();
        let json = engine.start_trial("Ada", 0).unwrap();
        let intents: Vec<RenderIntent> = serde_json::from_str(&json).unwrap();
        assert!(intents.contains(&RenderIntent::ShowTimer { visible: true }));
        assert!(json.contains("\"type\":\"PlaceTarget\""));
        assert_eq!(engine.required_source().as_deref(), Some("hand"));
    }

    #[test]
    fn fingertip_maps_through_mirrored_viewport() {
        let mut engine = Engine::new("{}").unwrap();
        engine.start_trial("p", 0).unwrap();

        let mut points = vec![serde_json::json!({"x": 0.0, "y": 0.0}); HAND_POINT_COUNT];
        points[8] = serde_json::json!({"x": 0.25, "y": 0.5});
        let batch = serde_json::json!({"source": "hand", "frames": [{"points": points}]}).to_string();
        let viewport = r#"{"x":0,"y":0,"width":640,"height":480}"#;

        let json = engine.track_fingertip(&batch, 640.0, 480.0, viewport).unwrap();
        let point: Option<ScreenPoint> = serde_json::from_str(&json).unwrap();
        let point = point.unwrap();
        assert!((point.x - 480.0).abs() < 1e-3);
        assert!((point.y - 240.0).abs() < 1e-3);
    }

    #[test]
    fn skip_records_score_in_leaderboard_json() {
        let mut engine = Engine::new("{}").unwrap();
        engine.start_trial("Ada", 1_000_000).unwrap();
        engine.on_pointer_miss(1_500_000).unwrap();
        engine.skip_to_end(3_000_000).unwrap();

        let records: Vec<ScoreRecord> = serde_json::from_str(&engine.leaderboard_top(10).unwrap()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].total_time, 3.0);
        assert_eq!(engine.timer_text(9_000_000), "3.000");

        engine.clear_leaderboard();
        assert_eq!(engine.leaderboard().unwrap(), "[]");
    }

    #[test]
    fn context_json_reports_phase() {
        let mut engine = Engine::new("{}").unwrap();
        assert!(engine.context().unwrap().contains("\"phase\":\"idle\""));
        engine.start_trial("p", 0).unwrap();
        assert!(engine.context().unwrap().contains("\"reaction_round\""));
        assert_eq!(engine.phase().unwrap(), r#"{"phase":"reaction_round","round":1}"#);
    }
}
