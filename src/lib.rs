//! Tiltball - simulation core for a browser pinball game
//!
//! Core modules:
//! - `game`: Fixed-step scheduler, entity lifecycle, event dispatch
//! - `entity`: Entity contract and incrementally-indexed entity list
//! - `physics`: 2D rigid-body world with a spatial-hash broadphase
//! - `contacts`: Begin/during/end contact classification across ticks
//!
//! The crate is deterministic and headless: rendering and audio are
//! external collaborators reached through the [`renderer::Renderer`]
//! trait and the event dispatch bus respectively. The host drives the
//! whole simulation by calling [`game::Game::run_frame`] once per
//! display frame.

pub mod config;
pub mod contacts;
pub mod entity;
pub mod error;
pub mod events;
pub mod game;
pub mod math;
pub mod physics;
pub mod renderer;

pub use config::{GameConfig, QualityPreset};
pub use entity::{Caps, Entity, EntityId, ShapeRef};
pub use error::GameError;
pub use events::GameEvent;
pub use game::Game;
pub use physics::{Body, BodyHandle, BodyType, Material, PhysicsWorld, Shape};

/// Simulation tuning constants
pub mod consts {
    /// Default render framerate the scheduler assumes (Hz)
    pub const DEFAULT_FRAMERATE: f32 = 60.0;
    /// Default physics sub-steps per render frame
    pub const DEFAULT_TICK_ITERATIONS: u32 = 10;
    /// Broadphase spatial-hash cell size (world units)
    pub const DEFAULT_CELL_SIZE: f32 = 2.0;
    /// AABBs spanning more cells than this are routed to the huge-body list
    pub const HUGE_BODY_CELL_LIMIT: usize = 500;
    /// Default solver iterations per step
    pub const DEFAULT_SOLVER_ITERATIONS: u32 = 10;
    /// Bodies slower than this (units/s) accumulate sleep time
    pub const SLEEP_SPEED_LIMIT: f32 = 0.05;
    /// Idle time before a body falls asleep (seconds)
    pub const SLEEP_TIME_LIMIT: f32 = 1.0;
}
