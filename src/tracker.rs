//! # Navigation Tracker
//!
//! Consumes a walking route as the user moves along it.
//!
//! ```text
//! location provider ──► on_position ──► ProximityMatcher ──► NavigationSession
//!                                                               │ (trim prefix)
//!                                                               ▼
//!                                      MapSurface ◄── RoutePresenter (2s throttle)
//! ```
//!
//! Position updates may arrive on any thread. The session sits behind a
//! mutex that is never held while the map surface runs, so a surface may
//! block on the UI thread while that thread queries or stops the tracker.
//! Each map call remembers the session generation it was made for; when a
//! start or stop lands in the meantime, the tracker redraws the current
//! route or clears the map again so a late update never outlives its session.
//!
//! Hosts whose map work completes asynchronously on the UI thread can report
//! a late failure with [`NavigationTracker::report_render_failure`], passing
//! the session id returned by `start`; failures from superseded sessions are
//! ignored.

use std::sync::{Mutex, MutexGuard, PoisonError};

use log::{debug, error, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::error::NavigationError;
use crate::geo_utils::polyline_length;
use crate::matcher::{MatchOutcome, ProximityMatcher};
use crate::polyline::decode_polyline6;
use crate::presenter::{MapSurface, PresentOutcome, RoutePresenter, MIN_ROUTE_POINTS};
use crate::session::{NavigationSession, SessionState};
use crate::{Coordinate, NavigationConfig, PositionSample};

// ============================================================================
// Location Input
// ============================================================================

/// Platform location provider a request targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
pub enum LocationSource {
    Gps,
    Network,
}

/// Update cadence requested from a location provider.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
pub struct LocationRequest {
    pub source: LocationSource,
    /// Minimum time between updates in milliseconds
    pub interval_ms: u32,
    /// Minimum movement between updates in meters
    pub min_distance_meters: f64,
}

/// Registers and unregisters platform location callbacks.
///
/// While registered, the host delivers each fix to
/// [`NavigationTracker::on_position`].
pub trait LocationProvider: Send + Sync {
    fn request_updates(&self, requests: &[LocationRequest]) -> Result<(), NavigationError>;
    fn remove_updates(&self);
}

impl<P: LocationProvider + ?Sized> LocationProvider for std::sync::Arc<P> {
    fn request_updates(&self, requests: &[LocationRequest]) -> Result<(), NavigationError> {
        (**self).request_updates(requests)
    }

    fn remove_updates(&self) {
        (**self).remove_updates()
    }
}

/// A pull-based source of position samples.
pub trait PositionStream {
    fn next_position(&mut self) -> Option<PositionSample>;
}

impl<I: Iterator<Item = PositionSample>> PositionStream for I {
    fn next_position(&mut self) -> Option<PositionSample> {
        self.next()
    }
}

// ============================================================================
// Events
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
pub enum StopReason {
    DestinationReached,
    RenderFailed,
    UserStopped,
}

/// What a position update did to the session.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
pub enum TrackerEvent {
    /// No active session, or the fix was unusable.
    Ignored,
    /// The fix matched nothing ahead of the user.
    NoProgress,
    /// Part of the route was consumed.
    Advanced {
        remaining_points: u32,
        remaining_meters: f64,
        /// False when the throttle kept the previous drawing on screen
        redrawn: bool,
    },
    /// The last route point was reached; tracking stopped.
    DestinationReached,
    /// Tracking stopped for another reason.
    Stopped { reason: StopReason },
}

// ============================================================================
// Tracker
// ============================================================================

pub struct NavigationTracker<M: MapSurface, C: Clock = SystemClock> {
    session: Mutex<NavigationSession>,
    matcher: ProximityMatcher,
    presenter: RoutePresenter<M>,
    clock: C,
    config: NavigationConfig,
    location: Option<Box<dyn LocationProvider>>,
}

impl<M: MapSurface> NavigationTracker<M, SystemClock> {
    pub fn new(surface: M, config: NavigationConfig) -> Self {
        Self::with_clock(surface, config, SystemClock)
    }
}

impl<M: MapSurface, C: Clock> NavigationTracker<M, C> {
    pub fn with_clock(surface: M, config: NavigationConfig, clock: C) -> Self {
        Self {
            session: Mutex::new(NavigationSession::new()),
            matcher: ProximityMatcher::new(config.proximity_threshold_meters),
            presenter: RoutePresenter::new(surface, config.route_style.clone(), config.redraw_interval_ms),
            clock,
            config,
            location: None,
        }
    }

    pub fn with_location_provider(mut self, provider: Box<dyn LocationProvider>) -> Self {
        self.location = Some(provider);
        self
    }

    pub fn config(&self) -> &NavigationConfig {
        &self.config
    }

    pub fn presenter(&self) -> &RoutePresenter<M> {
        &self.presenter
    }

    fn lock_session(&self) -> MutexGuard<'_, NavigationSession> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state(&self) -> SessionState {
        self.lock_session().state()
    }

    pub fn remaining_route(&self) -> Vec<Coordinate> {
        self.lock_session().remaining().to_vec()
    }

    /// Display `route` and start tracking it. Returns the session id.
    ///
    /// Any running session is replaced. If the map cannot draw the route the
    /// tracker stays idle.
    pub fn start(&self, route: Vec<Coordinate>) -> Result<u64, NavigationError> {
        if route.len() < MIN_ROUTE_POINTS {
            warn!("[NavigationTracker] Refusing route with {} point(s)", route.len());
            return Err(NavigationError::RouteTooShort { points: route.len() as u32 });
        }

        let mut session = self.lock_session();
        let was_active = session.is_active();
        session.stop();
        let session_id = session.start(route.clone(), self.clock.now_ms())?;
        drop(session);

        if was_active {
            self.remove_location_updates();
        }

        if let Err(e) = self.presenter.draw(&route) {
            error!("[NavigationTracker] Could not display route: {}", e);
            let mut session = self.lock_session();
            if session.is_current(session_id) {
                session.stop();
            }
            return Err(e);
        }
        self.reconcile(session_id);

        if !self.lock_session().is_current(session_id) {
            debug!("[NavigationTracker] Session #{} ended while it was being drawn", session_id);
            return Ok(session_id);
        }
        info!("[NavigationTracker] Navigation #{} started ({} points)", session_id, route.len());

        if let Some(provider) = &self.location {
            if let Err(e) = provider.request_updates(&self.config.location_requests) {
                // The route stays on screen; it just will not be consumed
                warn!("[NavigationTracker] Location updates unavailable: {}", e);
            }
        }

        Ok(session_id)
    }

    /// Decode an OSRM polyline6 geometry and start tracking it.
    pub fn start_polyline(&self, encoded: &str) -> Result<u64, NavigationError> {
        let route = decode_polyline6(encoded);
        if route.is_empty() {
            warn!("[NavigationTracker] No coordinates decoded from polyline");
            return Err(NavigationError::EmptyPolyline);
        }
        self.start(route)
    }

    /// Feed one position fix through the matcher, session and presenter.
    pub fn on_position(&self, sample: PositionSample) -> TrackerEvent {
        let position = sample.coordinate;
        let mut session = self.lock_session();

        if !session.is_active() {
            return TrackerEvent::Ignored;
        }
        if position.is_unset() || !position.is_valid() {
            debug!("[NavigationTracker] Ignoring unusable fix at t={}", sample.timestamp_ms);
            return TrackerEvent::Ignored;
        }

        match self.matcher.find_progress(session.remaining(), &position) {
            MatchOutcome::NoProgress => TrackerEvent::NoProgress,
            MatchOutcome::DestinationReached { .. } => {
                info!("[NavigationTracker] Destination reached");
                self.halt(session, StopReason::DestinationReached);
                TrackerEvent::DestinationReached
            }
            MatchOutcome::Advanced { index } => {
                let before = session.remaining().len();
                session.advance_to(index as usize);
                let remaining_points = session.remaining().len();
                let remaining_meters = polyline_length(session.remaining());

                match self.present(session) {
                    Ok(PresentOutcome::Complete) => TrackerEvent::DestinationReached,
                    Ok(outcome) => {
                        let redrawn = outcome == PresentOutcome::Redrawn;
                        if redrawn {
                            debug!(
                                "[NavigationTracker] Route updated: {} points completed, {} remaining",
                                before - remaining_points,
                                remaining_points
                            );
                        }
                        TrackerEvent::Advanced {
                            remaining_points: remaining_points as u32,
                            remaining_meters,
                            redrawn,
                        }
                    }
                    Err(_) => TrackerEvent::Stopped { reason: StopReason::RenderFailed },
                }
            }
        }
    }

    /// Redraw the remaining route if the throttle allows it.
    ///
    /// A rendering failure stops the session.
    pub fn redraw(&self) -> Result<PresentOutcome, NavigationError> {
        let session = self.lock_session();
        if !session.is_active() {
            return Ok(PresentOutcome::Complete);
        }
        self.present(session)
    }

    /// Throttle check under the lock, draw without it.
    ///
    /// The redraw slot is claimed before the lock is released so concurrent
    /// fixes inside the interval are throttled rather than drawn twice.
    fn present(
        &self,
        mut session: MutexGuard<'_, NavigationSession>,
    ) -> Result<PresentOutcome, NavigationError> {
        if session.remaining().len() < MIN_ROUTE_POINTS {
            self.halt(session, StopReason::DestinationReached);
            return Ok(PresentOutcome::Complete);
        }

        let now = self.clock.now_ms();
        if !self.presenter.is_due(session.last_redraw_ms(), now) {
            debug!(
                "[NavigationTracker] Throttled: {}ms since last redraw",
                now.saturating_sub(session.last_redraw_ms())
            );
            return Ok(PresentOutcome::Throttled);
        }

        session.mark_redrawn(now);
        let generation = session.generation();
        let route = session.remaining().to_vec();
        drop(session);

        match self.presenter.draw(&route) {
            Ok(()) => {
                self.reconcile(generation);
                Ok(PresentOutcome::Redrawn)
            }
            Err(e) => {
                let session = self.lock_session();
                if session.is_current(generation) {
                    error!("[NavigationTracker] Error updating route display: {}", e);
                    self.halt(session, StopReason::RenderFailed);
                } else {
                    debug!("[NavigationTracker] Ignoring draw failure from superseded session #{}", generation);
                }
                Err(e)
            }
        }
    }

    /// Bring the map back in line after a map call made for `generation`,
    /// if a start or stop happened while the host was busy with it.
    fn reconcile(&self, generation: u64) {
        let session = self.lock_session();
        if session.generation() == generation {
            return;
        }

        if session.is_active() {
            let current = session.generation();
            let route = session.remaining().to_vec();
            drop(session);
            debug!("[NavigationTracker] Redrawing session #{} over stale map update", current);
            if let Err(e) = self.presenter.draw(&route) {
                warn!("[NavigationTracker] Could not restore route of #{}: {}", current, e);
            }
        } else if !session.route_displayed() {
            drop(session);
            debug!("[NavigationTracker] Clearing stale map update from #{}", generation);
            if let Err(e) = self.presenter.clear() {
                warn!("[NavigationTracker] Could not clear stale route: {}", e);
            }
        }
    }

    /// Drive the tracker from `stream` until it ends or the session goes idle.
    /// Returns the last event produced.
    pub fn follow<S: PositionStream>(&self, mut stream: S) -> TrackerEvent {
        let mut last = TrackerEvent::Ignored;
        while self.state() == SessionState::Active {
            match stream.next_position() {
                Some(sample) => last = self.on_position(sample),
                None => break,
            }
        }
        last
    }

    /// Stop session `session_id` after the host's asynchronous map update
    /// failed. Returns false if that session is no longer running.
    pub fn report_render_failure(&self, session_id: u64) -> bool {
        let session = self.lock_session();
        if !session.is_current(session_id) {
            debug!("[NavigationTracker] Ignoring render failure from stale session #{}", session_id);
            return false;
        }
        error!("[NavigationTracker] Host reported render failure for #{}", session_id);
        self.halt(session, StopReason::RenderFailed);
        true
    }

    /// Stop navigating and remove the route from the map.
    pub fn stop(&self) -> Result<(), NavigationError> {
        let mut session = self.lock_session();
        let was_active = session.is_active();
        session.stop();
        session.hide_route();
        let generation = session.generation();
        drop(session);

        if was_active {
            self.remove_location_updates();
        }
        let cleared = self.presenter.clear();
        self.reconcile(generation);

        info!("[NavigationTracker] Navigation stopped ({:?})", StopReason::UserStopped);
        cleared
    }

    /// Stop tracking but leave the last drawn route on screen.
    fn halt(&self, mut session: MutexGuard<'_, NavigationSession>, reason: StopReason) {
        session.stop();
        drop(session);
        self.remove_location_updates();
        info!("[NavigationTracker] Tracking halted: {:?}", reason);
    }

    fn remove_location_updates(&self) {
        if let Some(provider) = &self.location {
            provider.remove_updates();
        }
    }
}

impl<M: MapSurface, C: Clock> Drop for NavigationTracker<M, C> {
    fn drop(&mut self) {
        if self.lock_session().is_active() {
            self.remove_location_updates();
        }
    }
}
