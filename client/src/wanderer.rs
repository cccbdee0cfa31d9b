//! Autopilot for a headless avatar: walks in a straight line for a while,
//! idles, then picks a new heading. Deterministic for a given seed.

use office_shared::participant::ParticipantState;

const SPEED: f64 = 200.0;
const OFFICE_WIDTH: f64 = 1600.0;
const OFFICE_HEIGHT: f64 = 750.0;
const MIN_LEG: f64 = 0.5;
const MAX_LEG: f64 = 2.5;
const IDLE_CHANCE: f64 = 0.3;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Heading {
    Left,
    Right,
    Up,
    Down,
    Idle,
}

#[derive(Debug)]
pub struct Wanderer {
    heading: Heading,
    remaining: f64,
    seed: u32,
}

impl Wanderer {
    pub fn new(seed: u32) -> Self {
        Self {
            heading: Heading::Idle,
            remaining: 0.0,
            seed: seed.max(1),
        }
    }

    fn next_random(&mut self) -> f64 {
        self.seed = self.seed.wrapping_mul(1664525).wrapping_add(1013904223) & 0x7fff_ffff;
        self.seed as f64 / 0x7fff_ffffu32 as f64
    }

    fn pick_heading(&mut self) {
        self.heading = if self.next_random() < IDLE_CHANCE {
            Heading::Idle
        } else {
            match (self.next_random() * 4.0) as u32 {
                0 => Heading::Left,
                1 => Heading::Right,
                2 => Heading::Up,
                _ => Heading::Down,
            }
        };
        self.remaining = MIN_LEG + self.next_random() * (MAX_LEG - MIN_LEG);
    }

    /// Advance `state` by `dt` seconds.
    pub fn update(&mut self, dt: f64, state: &mut ParticipantState) {
        self.remaining -= dt;
        if self.remaining <= 0.0 {
            self.pick_heading();
        }

        let step = SPEED * dt;
        let (dx, dy) = match self.heading {
            Heading::Left => (-step, 0.0),
            Heading::Right => (step, 0.0),
            Heading::Up => (0.0, -step),
            Heading::Down => (0.0, step),
            Heading::Idle => (0.0, 0.0),
        };
        state.x = (state.x + dx).clamp(0.0, OFFICE_WIDTH);
        state.y = (state.y + dy).clamp(0.0, OFFICE_HEIGHT);

        match self.heading {
            Heading::Left => {
                state.anim = "faune-run-side".to_string();
                state.flip_x = true;
            }
            Heading::Right => {
                state.anim = "faune-run-side".to_string();
                state.flip_x = false;
            }
            Heading::Up => state.anim = "faune-run-up".to_string(),
            Heading::Down => state.anim = "faune-run-down".to_string(),
            Heading::Idle => state.anim = idle_of(&state.anim),
        }
    }
}

/// `faune-run-side` -> `faune-idle-side`. Keys without that shape pass
/// through unchanged.
fn idle_of(anim: &str) -> String {
    let mut parts: Vec<&str> = anim.split('-').collect();
    if parts.len() < 3 {
        return anim.to_string();
    }
    parts[1] = "idle";
    parts.join("-")
}
