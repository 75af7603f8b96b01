//! Renderer collaborator contract
//!
//! The core never draws. Entities declare sprite handles; the game
//! registers them with whatever renderer the host supplies and calls
//! `render` once per frame after all physics sub-steps.

/// Opaque handle to a render primitive owned by the host renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SpriteId(pub u32);

/// Host-provided rendering backend.
pub trait Renderer {
    /// Register a sprite when its owning entity is added
    fn add(&mut self, sprite: SpriteId);
    /// Unregister a sprite when its owning entity is removed
    fn remove(&mut self, sprite: SpriteId);
    /// Draw the frame; called once per `run_frame`, never paused
    fn render(&mut self);
}

/// Renderer that draws nothing. Used headless and in tests.
#[derive(Debug, Default)]
pub struct NullRenderer {
    /// Frames rendered so far
    pub frames: u64,
    /// Currently registered sprites
    pub sprites: Vec<SpriteId>,
}

impl NullRenderer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Renderer for NullRenderer {
    fn add(&mut self, sprite: SpriteId) {
        self.sprites.push(sprite);
    }

    fn remove(&mut self, sprite: SpriteId) {
        if let Some(pos) = self.sprites.iter().position(|s| *s == sprite) {
            self.sprites.remove(pos);
        } else {
            log::warn!("removing unregistered sprite {sprite:?}");
        }
    }

    fn render(&mut self) {
        self.frames += 1;
    }
}
