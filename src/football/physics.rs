//! Ball physics for the football pitch
//!
//! Pure state machine: one `step` per tick, no clocks, no channels. The
//! room decides when to step, when to sync, and what a goal means for the
//! score; this module only moves the ball and reports which side it
//! crossed.

use uuid::Uuid;

use crate::ws::protocol::{BallState, Team};

/// Pitch geometry and ball tunables
#[derive(Debug, Clone)]
pub struct PitchConfig {
    /// Field width in world units (goals sit on the short edges)
    pub width: f64,
    /// Field height in world units
    pub height: f64,
    /// Margin between the field border and the playable boundary
    pub padding: f64,
    /// Goal mouth height, centered vertically on each short edge
    pub goal_width: f64,
    /// How far past the boundary the goal extends
    pub goal_depth: f64,
    /// Per-tick velocity multiplier (grass drag), < 1
    pub friction: f64,
    /// Spin-to-curve coupling factor
    pub spin_curve: f64,
    /// Per-tick spin multiplier, < 1
    pub spin_decay: f64,
    /// Velocity components under this magnitude snap to zero
    pub deadband: f64,
    /// Speed magnitude cap, enforced every tick
    pub max_speed: f64,
    /// Wall bounce restitution, < 1 (lossy)
    pub bounce: f64,
}

impl Default for PitchConfig {
    fn default() -> Self {
        Self {
            width: 800.0,
            height: 500.0,
            padding: 20.0,
            goal_width: 120.0,
            goal_depth: 30.0,
            friction: 0.985,
            spin_curve: 0.05,
            spin_decay: 0.98,
            deadband: 0.01,
            max_speed: 15.0,
            bounce: 0.7,
        }
    }
}

impl PitchConfig {
    pub fn center(&self) -> (f64, f64) {
        (self.width / 2.0, self.height / 2.0)
    }

    /// Top edge of the goal mouth band
    pub fn goal_top(&self) -> f64 {
        (self.height - self.goal_width) / 2.0
    }

    /// Bottom edge of the goal mouth band
    pub fn goal_bottom(&self) -> f64 {
        (self.height + self.goal_width) / 2.0
    }

    fn in_goal_band(&self, y: f64) -> bool {
        y >= self.goal_top() && y <= self.goal_bottom()
    }
}

/// The shared ball. Singleton per room, re-centered on goal.
#[derive(Debug, Clone)]
pub struct Ball {
    pub x: f64,
    pub y: f64,
    pub vx: f64,
    pub vy: f64,
    pub spin: f64,
    pub last_kicker: Option<Uuid>,
    pub last_kick_ms: u64,
}

impl Ball {
    /// A stationary ball at field center
    pub fn centered(pitch: &PitchConfig) -> Self {
        let (x, y) = pitch.center();
        Self {
            x,
            y,
            vx: 0.0,
            vy: 0.0,
            spin: 0.0,
            last_kicker: None,
            last_kick_ms: 0,
        }
    }

    pub fn state(&self) -> BallState {
        BallState {
            x: self.x,
            y: self.y,
            vx: self.vx,
            vy: self.vy,
            spin: self.spin,
            last_kicker_id: self.last_kicker,
        }
    }

    /// One integration tick. Returns the scoring team when the ball
    /// crossed into a goal mouth; no wall handling happens on that tick.
    ///
    /// Order matters and is observable: integrate with the current
    /// velocity first, then curve, then friction, then the clamps.
    pub fn step(&mut self, pitch: &PitchConfig) -> Option<Team> {
        // 1. Integrate
        self.x += self.vx;
        self.y += self.vy;

        // 2. Spin curves the trajectory; the vy line sees the updated vx
        self.vx += self.vy * self.spin * pitch.spin_curve;
        self.vy -= self.vx * self.spin * pitch.spin_curve;
        self.spin *= pitch.spin_decay;

        // 3. Grass drag
        self.vx *= pitch.friction;
        self.vy *= pitch.friction;

        // 4. Deadband stops perpetual creep
        if self.vx.abs() < pitch.deadband {
            self.vx = 0.0;
        }
        if self.vy.abs() < pitch.deadband {
            self.vy = 0.0;
        }

        // 5. Speed cap
        let speed = (self.vx * self.vx + self.vy * self.vy).sqrt();
        if speed > pitch.max_speed {
            let scale = pitch.max_speed / speed;
            self.vx *= scale;
            self.vy *= scale;
        }

        // 6. Goal mouths: left belongs to blue, right to red
        if pitch.in_goal_band(self.y) {
            if self.x < pitch.padding - pitch.goal_depth / 2.0 {
                return Some(Team::Blue);
            }
            if self.x > pitch.width - pitch.padding + pitch.goal_depth / 2.0 {
                return Some(Team::Red);
            }
        }

        // 7. Wall bounce. Left/right walls are solid only outside the
        // goal mouth band.
        if self.y < pitch.padding {
            self.y = pitch.padding;
            self.vy = -self.vy * pitch.bounce;
        } else if self.y > pitch.height - pitch.padding {
            self.y = pitch.height - pitch.padding;
            self.vy = -self.vy * pitch.bounce;
        }

        if !pitch.in_goal_band(self.y) {
            if self.x < pitch.padding {
                self.x = pitch.padding;
                self.vx = -self.vx * pitch.bounce;
            } else if self.x > pitch.width - pitch.padding {
                self.x = pitch.width - pitch.padding;
                self.vx = -self.vx * pitch.bounce;
            }
        }

        None
    }
}
