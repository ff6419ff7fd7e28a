// Target field: the reaction round's registry of on-screen targets and its hit-test.
// Positions are drawn inside the play surface so each target's full extent stays visible.

use rand::Rng;

use crate::types::*;

/// Active targets for the current round.
pub struct TargetField {
    settings: SurfaceSettings,
    targets: Vec<Target>,
    next_id: u32,
}

impl TargetField {
    pub fn new(settings: SurfaceSettings) -> Self {
        TargetField {
            settings,
            targets: Vec::new(),
            next_id: 0,
        }
    }

    /// Replace all targets: one decoy per configured colour, then the designated target.
    pub fn generate<R: Rng + ?Sized>(&mut self, rng: &mut R) -> &[Target] {
        self.targets.clear();

        let colors: Vec<String> = self.settings.decoy_colors.clone();
        for color in colors {
            let target = self.place(rng, TargetKind::Decoy, color);
            self.targets.push(target);
        }
        let color = self.settings.designated_color.clone();
        let designated = self.place(rng, TargetKind::Designated, color);
        self.targets.push(designated);

        &self.targets
    }

    pub fn clear(&mut self) {
        self.targets.clear();
    }

    pub fn targets(&self) -> &[Target] {
        &self.targets
    }

    pub fn get(&self, id: TargetId) -> Option<&Target> {
        self.targets.iter().find(|t| t.id == id)
    }

    pub fn designated(&self) -> Option<&Target> {
        self.targets.iter().find(|t| t.is_designated())
    }

    /// Topmost target under `point`. Later-placed targets sit on top.
    pub fn hit_test(&self, point: ScreenPoint) -> Option<&Target> {
        self.targets.iter().rev().find(|t| t.rect.contains(point))
    }

    /// Whether `point` lies on the play surface at all.
    pub fn on_surface(&self, point: ScreenPoint) -> bool {
        ScreenRect::new(0.0, 0.0, self.settings.width, self.settings.height).contains(point)
    }

    pub fn target_size(&self) -> f32 {
        self.settings.target_size
    }

    fn place<R: Rng + ?Sized>(&mut self, rng: &mut R, kind: TargetKind, color: String) -> Target {
        let size = self.settings.target_size;
        let x = random_offset(rng, self.settings.width - size);
        let y = random_offset(rng, self.settings.height - size);

        let id = TargetId(self.next_id);
        self.next_id = self.next_id.wrapping_add(1);

        Target {
            id,
            kind,
            color,
            rect: ScreenRect::new(x, y, size, size),
        }
    }
}

/// Uniform in [0, span), or 0 when the surface is no larger than a target.
fn random_offset<R: Rng + ?Sized>(rng: &mut R, span: f32) -> f32 {
    if span > 0.0 {
        rng.gen_range(0.0..span)
    } else {
        0.0
    }
}
