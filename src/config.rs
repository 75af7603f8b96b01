//! Game configuration
//!
//! All scheduler and physics tuning lives here so hosts can persist it
//! however they like; the core never touches storage itself.

use serde::{Deserialize, Serialize};

use crate::consts::*;

/// Quality preset levels
///
/// Quality is not a global: a controller entity dispatches a
/// [`crate::events::QUALITY`] event and interested entities adjust
/// themselves from the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum QualityPreset {
    Low,
    #[default]
    Medium,
    High,
}

impl QualityPreset {
    pub fn as_str(&self) -> &'static str {
        match self {
            QualityPreset::Low => "Low",
            QualityPreset::Medium => "Medium",
            QualityPreset::High => "High",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "low" => Some(QualityPreset::Low),
            "medium" | "med" => Some(QualityPreset::Medium),
            "high" => Some(QualityPreset::High),
            _ => None,
        }
    }
}

/// Scheduler and physics tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameConfig {
    // === Scheduler ===
    /// Render framerate the accumulator assumes (Hz)
    pub framerate: f32,
    /// Fixed physics sub-steps per render frame at slow_mo = 1
    pub tick_iterations: u32,
    /// Time dilation factor in (0, 1]. Scales both the simulated dt and
    /// the number of ticks realized per frame, so perceived speed falls
    /// faster than linearly. See DESIGN.md for the tradeoff.
    pub slow_mo: f32,

    // === Physics ===
    /// Gravity acceleration (world units/s²); pinball tables usually tilt
    /// so gravity points down-table
    pub gravity: (f32, f32),
    /// Solver iterations per step
    pub solver_iterations: u32,
    /// Broadphase spatial-hash cell size (world units)
    pub cell_size: f32,
    /// Whether bodies may fall asleep when idle
    pub sleep_enabled: bool,

    // === Presentation ===
    /// Graphics quality preset (delivered to entities via dispatch)
    pub quality: QualityPreset,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            framerate: DEFAULT_FRAMERATE,
            tick_iterations: DEFAULT_TICK_ITERATIONS,
            slow_mo: 1.0,
            gravity: (0.0, -9.81),
            solver_iterations: DEFAULT_SOLVER_ITERATIONS,
            cell_size: DEFAULT_CELL_SIZE,
            sleep_enabled: true,
            quality: QualityPreset::Medium,
        }
    }
}

impl GameConfig {
    /// Fixed simulation timestep for one tick at the current settings
    pub fn tick_dt(&self) -> f32 {
        (1.0 / self.framerate) * self.slow_mo / self.tick_iterations as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tick_dt_concrete_scenario() {
        let cfg = GameConfig {
            framerate: 60.0,
            tick_iterations: 5,
            slow_mo: 1.0,
            ..Default::default()
        };
        assert!((cfg.tick_dt() - 1.0 / 300.0).abs() < 1e-9);
    }

    #[test]
    fn test_quality_round_trip() {
        for q in [QualityPreset::Low, QualityPreset::Medium, QualityPreset::High] {
            assert_eq!(QualityPreset::from_str(q.as_str()), Some(q));
        }
        assert_eq!(QualityPreset::from_str("ultra"), None);
    }
}
