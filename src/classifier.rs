// Landmark classification: hand frames -> rock/paper/scissor, body frames -> postures.
// Pure geometry over one frame. Missing points or low wrist visibility decline rather than guess.

use tracing::debug;

use crate::error::{Result, TrialError};
use crate::types::*;

// Hand landmark indices.
pub const INDEX_MCP: usize = 5;
pub const INDEX_TIP: usize = 8;
pub const MIDDLE_MCP: usize = 9;
pub const MIDDLE_TIP: usize = 12;
pub const RING_MCP: usize = 13;
pub const RING_TIP: usize = 16;
pub const PINKY_MCP: usize = 17;
pub const PINKY_TIP: usize = 20;

// Body landmark indices.
pub const NOSE: usize = 0;
pub const LEFT_SHOULDER: usize = 11;
pub const RIGHT_SHOULDER: usize = 12;
pub const LEFT_ELBOW: usize = 13;
pub const RIGHT_ELBOW: usize = 14;
pub const LEFT_WRIST: usize = 15;
pub const RIGHT_WRIST: usize = 16;

/// (tip, base joint) for index, middle, ring, pinky. Thumb is ignored.
const DIGITS: [(usize, usize); 4] = [
    (INDEX_TIP, INDEX_MCP),
    (MIDDLE_TIP, MIDDLE_MCP),
    (RING_TIP, RING_MCP),
    (PINKY_TIP, PINKY_MCP),
];

const STRAIGHT_ARM_DEG: f32 = 140.0;
const RAISED_ARM_DEG: f32 = 120.0;
const T_POSE_LEVEL_TOLERANCE: f32 = 0.15;

pub const DEFAULT_MIN_WRIST_VISIBILITY: f32 = 0.5;

/// Outcome of classifying one detection tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Detection {
    /// No usable frame for the source (nothing in view, or too few points).
    NoSubject,
    /// A subject is in view but matches no rule.
    Unrecognized,
    Recognized(GestureLabel),
}

/// Check that a frame carries every index the source's convention needs.
pub fn validate_frame(frame: &LandmarkFrame, source: LandmarkSource) -> Result<()> {
    if frame.has_points_for(source) {
        Ok(())
    } else {
        Err(TrialError::InvalidFrame {
            input: source,
            expected: source.required_points(),
            actual: frame.points.len(),
        })
    }
}

/// Per-digit extension for index, middle, ring, pinky. `None` if the frame is short.
pub fn extended_digits(frame: &LandmarkFrame) -> Option<[bool; 4]> {
    let mut extended = [false; 4];
    for (slot, (tip, base)) in extended.iter_mut().zip(DIGITS) {
        let tip = frame.point(tip)?;
        let base = frame.point(base)?;
        // Image y grows downward; a raised fingertip has the smaller y.
        *slot = tip.y < base.y;
    }
    Some(extended)
}

pub fn classify_hand(frame: &LandmarkFrame) -> Option<GestureLabel> {
    match extended_digits(frame)? {
        [false, false, false, false] => Some(GestureLabel::Rock),
        [true, true, true, true] => Some(GestureLabel::Paper),
        [true, true, false, false] => Some(GestureLabel::Scissor),
        _ => None,
    }
}

/// Interior angle at the elbow in degrees, folded into [0, 180].
pub fn arm_angle(shoulder: &LandmarkPoint, elbow: &LandmarkPoint, wrist: &LandmarkPoint) -> f32 {
    let radians =
        (wrist.y - elbow.y).atan2(wrist.x - elbow.x) - (shoulder.y - elbow.y).atan2(shoulder.x - elbow.x);
    let angle = radians.to_degrees().abs();
    if angle > 180.0 {
        360.0 - angle
    } else {
        angle
    }
}

/// One side of the body: shoulder, elbow, wrist.
#[derive(Debug, Clone, Copy)]
struct Arm<'a> {
    shoulder: &'a LandmarkPoint,
    wrist: &'a LandmarkPoint,
    angle: f32,
}

impl<'a> Arm<'a> {
    fn from_frame(frame: &'a LandmarkFrame, shoulder: usize, elbow: usize, wrist: usize) -> Option<Self> {
        let shoulder = frame.point(shoulder)?;
        let elbow = frame.point(elbow)?;
        let wrist = frame.point(wrist)?;
        Some(Arm {
            shoulder,
            wrist,
            angle: arm_angle(shoulder, elbow, wrist),
        })
    }

    fn is_straight(&self) -> bool {
        self.angle > STRAIGHT_ARM_DEG
    }

    fn wrist_level_with_shoulder(&self) -> bool {
        (self.wrist.y - self.shoulder.y).abs() < T_POSE_LEVEL_TOLERANCE
    }

    fn is_raised(&self) -> bool {
        self.wrist.y < self.shoulder.y && self.angle > RAISED_ARM_DEG
    }

    fn is_lowered(&self) -> bool {
        self.wrist.y > self.shoulder.y
    }
}

pub fn classify_body(frame: &LandmarkFrame) -> Option<GestureLabel> {
    classify_body_with(frame, DEFAULT_MIN_WRIST_VISIBILITY)
}

/// Body classification with an explicit wrist visibility floor. First matching rule wins.
pub fn classify_body_with(frame: &LandmarkFrame, min_wrist_visibility: f32) -> Option<GestureLabel> {
    let nose = frame.point(NOSE)?;
    let left = Arm::from_frame(frame, LEFT_SHOULDER, LEFT_ELBOW, LEFT_WRIST)?;
    let right = Arm::from_frame(frame, RIGHT_SHOULDER, RIGHT_ELBOW, RIGHT_WRIST)?;

    if left.wrist.visibility_or_full() < min_wrist_visibility
        || right.wrist.visibility_or_full() < min_wrist_visibility
    {
        return None;
    }

    if left.wrist.y < nose.y && right.wrist.y < nose.y && left.is_straight() && right.is_straight() {
        return Some(GestureLabel::RaiseBothHands);
    }

    if left.wrist_level_with_shoulder()
        && right.wrist_level_with_shoulder()
        && left.is_straight()
        && right.is_straight()
    {
        return Some(GestureLabel::TPose);
    }

    if (left.is_raised() && right.is_lowered()) || (right.is_raised() && left.is_lowered()) {
        return Some(GestureLabel::RaiseHand);
    }

    None
}

pub fn classify(frame: &LandmarkFrame, source: LandmarkSource) -> Option<GestureLabel> {
    match source {
        LandmarkSource::Hand => classify_hand(frame),
        LandmarkSource::Body => classify_body(frame),
    }
}

/// Pick the hand frame to classify. Without a prompt, the first detected hand.
/// With a prompt, the frame whose detector label is the prompt's mirror.
pub fn select_hand(frames: &[LandmarkFrame], prompt: Option<Handedness>) -> Option<&LandmarkFrame> {
    match prompt {
        None => frames.first(),
        Some(hand) => {
            let wanted = hand.mirrored();
            frames.iter().find(|f| f.handedness == Some(wanted))
        }
    }
}

/// Classifier configured for one trial.
pub struct LandmarkClassifier {
    min_wrist_visibility: f32,
    prompt_hand: Option<Handedness>,
}

impl LandmarkClassifier {
    pub fn new(min_wrist_visibility: f32, prompt_hand: Option<Handedness>) -> Self {
        LandmarkClassifier {
            min_wrist_visibility,
            prompt_hand,
        }
    }

    /// Classify one detection tick from a single source.
    pub fn detect(&self, batch: &LandmarkBatch) -> Detection {
        let frame = match batch.source {
            LandmarkSource::Hand => select_hand(&batch.frames, self.prompt_hand),
            LandmarkSource::Body => batch.frames.first(),
        };
        let Some(frame) = frame else {
            return Detection::NoSubject;
        };

        if let Err(err) = validate_frame(frame, batch.source) {
            debug!(%err, "ignoring short landmark frame");
            return Detection::NoSubject;
        }

        let label = match batch.source {
            LandmarkSource::Hand => classify_hand(frame),
            LandmarkSource::Body => classify_body_with(frame, self.min_wrist_visibility),
        };

        match label {
            Some(label) => Detection::Recognized(label),
            None => Detection::Unrecognized,
        }
    }
}

impl Default for LandmarkClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_WRIST_VISIBILITY, None)
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn hand_decision_table() {
        for bits in 0u8..16 {
            let extended = [bits & 1 != 0, bits & 2 != 0, bits & 4 != 0, bits & 8 != 0];
            let expected = match extended {
                [false, false, false, false] => Some(GestureLabel::Rock),
                [true, true, true, true] => Some(GestureLabel::Paper),
                [true, true, false, false] => Some(GestureLabel::Scissor),
                _ => None,
            };
            assert_eq!(classify_hand(&hand(extended)), expected, "digits {:?}", extended);
        }
    }

    #[test]
    fn short_hand_frame_declines() {
        let frame = LandmarkFrame::new(vec![LandmarkPoint::new(0.5, 0.5); 10]);
        assert_eq!(classify_hand(&frame), None);
        assert!(validate_frame(&frame, LandmarkSource::Hand).is_err());
    }

    #[test]
    fn arm_angle_straight_and_right() {
        let shoulder = LandmarkPoint::new(0.0, 0.0);
        let elbow = LandmarkPoint::new(1.0, 0.0);
        let straight = LandmarkPoint::new(2.0, 0.0);
        let bent = LandmarkPoint::new(1.0, 1.0);
        assert!((arm_angle(&shoulder, &elbow, &straight) - 180.0).abs() < 1e-3);
        assert!((arm_angle(&shoulder, &elbow, &bent) - 90.0).abs() < 1e-3);
    }

    #[test]
    fn arm_angle_folds_reflex_angles() {
        // Raw atan2 difference here is about 343 degrees.
        let shoulder = LandmarkPoint::new(-1.0, 0.15);
        let elbow = LandmarkPoint::new(0.0, 0.0);
        let wrist = LandmarkPoint::new(-1.0, -0.15);
        let angle = arm_angle(&shoulder, &elbow, &wrist);
        assert!((0.0..=180.0).contains(&angle));
        assert!(angle < 20.0);
    }

    #[test]
    fn body_postures() {
        assert_eq!(classify_body(&body_for(GestureLabel::RaiseBothHands)), Some(GestureLabel::RaiseBothHands));
        assert_eq!(classify_body(&body_for(GestureLabel::TPose)), Some(GestureLabel::TPose));
        assert_eq!(classify_body(&body_for(GestureLabel::RaiseHand)), Some(GestureLabel::RaiseHand));
        assert_eq!(classify_body(&body(NOSE_POS, LEFT_DOWN, RIGHT_OUT)), None);
        assert_eq!(classify_body(&body(NOSE_POS, LEFT_DOWN, RIGHT_DOWN)), None);
    }

    #[test]
    fn right_arm_raise_is_raise_hand() {
        assert_eq!(classify_body(&body(NOSE_POS, LEFT_DOWN, RIGHT_UP)), Some(GestureLabel::RaiseHand));
    }

    #[test]
    fn low_wrist_visibility_declines() {
        let mut frame = body_for(GestureLabel::TPose);
        frame.points[LEFT_WRIST].visibility = Some(0.3);
        assert_eq!(classify_body(&frame), None);
        // Missing visibility counts as visible.
        frame.points[LEFT_WRIST].visibility = None;
        assert_eq!(classify_body(&frame), Some(GestureLabel::TPose));
    }

    #[test]
    fn short_body_frame_declines() {
        let frame = LandmarkFrame::new(vec![LandmarkPoint::new(0.5, 0.5); 12]);
        assert_eq!(classify_body(&frame), None);
    }

    #[test]
    fn select_hand_follows_mirror_convention() {
        let mut left = hand([true; 4]);
        left.handedness = Some(Handedness::Left);
        let mut right = hand([false; 4]);
        right.handedness = Some(Handedness::Right);
        let frames = vec![right.clone(), left.clone()];

        assert_eq!(select_hand(&frames, None), Some(&right));
        assert_eq!(select_hand(&frames, Some(Handedness::Right)), Some(&left));
        assert_eq!(select_hand(&frames, Some(Handedness::Left)), Some(&right));
        assert_eq!(select_hand(&frames[..1], Some(Handedness::Right)), None);
    }

    #[test]
    fn detect_distinguishes_absent_from_unrecognized() {
        let classifier = LandmarkClassifier::default();
        let empty = LandmarkBatch {
            source: LandmarkSource::Hand,
            frames: vec![],
            gesture_index: None,
        };
        assert_eq!(classifier.detect(&empty), Detection::NoSubject);

        let odd = LandmarkBatch {
            source: LandmarkSource::Hand,
            frames: vec![hand([true, false, true, false])],
            gesture_index: None,
        };
        assert_eq!(classifier.detect(&odd), Detection::Unrecognized);

        let body = LandmarkBatch {
            source: LandmarkSource::Body,
            frames: vec![body_for(GestureLabel::TPose)],
            gesture_index: None,
        };
        assert_eq!(classifier.detect(&body), Detection::Recognized(GestureLabel::TPose));
    }

    #[test]
    fn every_label_has_a_fixture() {
        for label in GestureLabel::ALL {
            assert_eq!(classify(&frame_for(label), label.source()), Some(label));
        }
    }

    fn coord() -> impl Strategy<Value = (f32, f32)> {
        (0.0f32..1.0, 0.0f32..1.0)
    }

    fn arm() -> impl Strategy<Value = [(f32, f32); 3]> {
        (coord(), coord(), coord()).prop_map(|(a, b, c)| [a, b, c])
    }

    proptest! {
        /// A lower-priority posture is only reported when no higher-priority rule holds.
        #[test]
        fn body_priority_is_respected(nose in coord(), left in arm(), right in arm()) {
            let frame = body(nose, left, right);
            let l = Arm::from_frame(&frame, LEFT_SHOULDER, LEFT_ELBOW, LEFT_WRIST).unwrap();
            let r = Arm::from_frame(&frame, RIGHT_SHOULDER, RIGHT_ELBOW, RIGHT_WRIST).unwrap();
            let both_up = l.wrist.y < nose.1 && r.wrist.y < nose.1 && l.is_straight() && r.is_straight();
            let t_pose = l.wrist_level_with_shoulder() && r.wrist_level_with_shoulder()
                && l.is_straight() && r.is_straight();
            let one_up = (l.is_raised() && r.is_lowered()) || (r.is_raised() && l.is_lowered());

            let expected = if both_up {
                Some(GestureLabel::RaiseBothHands)
            } else if t_pose {
                Some(GestureLabel::TPose)
            } else if one_up {
                Some(GestureLabel::RaiseHand)
            } else {
                None
            };
            prop_assert_eq!(classify_body(&frame), expected);
        }

        /// Only tip-versus-base ordering matters; every other point is noise.
        #[test]
        fn all_tips_above_bases_is_paper(ys in prop::collection::vec(0.0f32..1.0, HAND_POINT_COUNT)) {
            let mut frame = LandmarkFrame::new(ys.iter().map(|y| LandmarkPoint::new(0.5, *y)).collect());
            for (tip, base) in DIGITS {
                frame.points[tip].y = frame.points[base].y - 0.01;
            }
            prop_assert_eq!(classify_hand(&frame), Some(GestureLabel::Paper));
        }

        #[test]
        fn arm_angle_is_bounded(a in coord(), b in coord(), c in coord()) {
            let angle = arm_angle(
                &LandmarkPoint::new(a.0, a.1),
                &LandmarkPoint::new(b.0, b.1),
                &LandmarkPoint::new(c.0, c.1),
            );
            prop_assert!((0.0..=180.0).contains(&angle));
        }
    }
}
