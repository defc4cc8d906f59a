//! Navigation session state.
//!
//! A session is `Idle` until a route is displayed, then `Active` while the
//! route is being consumed. Stopping clears every field. The generation
//! counter changes on each start and stop so work begun under one session can
//! tell that it has been superseded.
//!
//! Whether the map should still show a route is tracked separately: arrival
//! and render failures end the session but leave the last drawing up, a
//! user stop hides it.

use log::info;

use crate::error::NavigationError;
use crate::Coordinate;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
pub enum SessionState {
    Idle,
    Active,
}

#[derive(Debug, Clone, Default)]
pub struct NavigationSession {
    route: Vec<Coordinate>,
    last_redraw_ms: i64,
    active: bool,
    generation: u64,
    route_displayed: bool,
}

impl NavigationSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin tracking `route`. The initial display counts as a redraw at `now_ms`.
    ///
    /// Starting an already active session replaces its route.
    pub fn start(&mut self, route: Vec<Coordinate>, now_ms: i64) -> Result<u64, NavigationError> {
        if route.len() < 2 {
            return Err(NavigationError::RouteTooShort { points: route.len() as u32 });
        }

        self.generation += 1;
        info!(
            "[NavigationSession] Started session #{} with {} points",
            self.generation,
            route.len()
        );
        self.route = route;
        self.last_redraw_ms = now_ms;
        self.active = true;
        self.route_displayed = true;
        Ok(self.generation)
    }

    /// Drop every point before `index`. Out-of-range indices are clamped so
    /// at least the final point remains.
    pub fn advance_to(&mut self, index: usize) {
        if !self.active || index == 0 {
            return;
        }
        let index = index.min(self.route.len().saturating_sub(1));
        self.route.drain(..index);
    }

    pub fn mark_redrawn(&mut self, now_ms: i64) {
        self.last_redraw_ms = now_ms;
    }

    /// Return to `Idle` and clear all session fields.
    pub fn stop(&mut self) {
        if self.active {
            info!("[NavigationSession] Stopped session #{}", self.generation);
            self.generation += 1;
        }
        self.active = false;
        self.route.clear();
        self.last_redraw_ms = 0;
    }

    /// Record that the route was removed from the map.
    pub fn hide_route(&mut self) {
        self.route_displayed = false;
    }

    /// False once the route has been removed from the map.
    pub fn route_displayed(&self) -> bool {
        self.route_displayed
    }

    pub fn state(&self) -> SessionState {
        if self.active {
            SessionState::Active
        } else {
            SessionState::Idle
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// The part of the route still ahead of the user.
    pub fn remaining(&self) -> &[Coordinate] {
        &self.route
    }

    pub fn last_redraw_ms(&self) -> i64 {
        self.last_redraw_ms
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// True while the session started as `generation` is still running.
    pub fn is_current(&self, generation: u64) -> bool {
        self.active && self.generation == generation
    }
}
