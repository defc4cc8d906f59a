//! # Proximity Matcher
//!
//! Decides how much of a walking route the user has completed.
//!
//! The matcher looks for the furthest route point within a fixed radius of the
//! user's position, scanning only forward of the last matched point. Points
//! behind the cursor are never reconsidered even when they are closer, so the
//! consumed part of the route can only grow.

use log::debug;

use crate::geo_utils::haversine_distance;
use crate::Coordinate;

/// Default proximity radius in meters.
pub const DEFAULT_PROXIMITY_THRESHOLD_METERS: f64 = 20.0;

/// Result of matching a position against the remaining route.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "ffi", derive(uniffi::Enum))]
pub enum MatchOutcome {
    /// No point ahead of the cursor is within range, or the position is unusable.
    NoProgress,
    /// The user reached `index`; points before it are completed.
    Advanced { index: u32 },
    /// The user reached the final point of the route.
    DestinationReached { index: u32 },
}

impl MatchOutcome {
    /// Index of the matched point, 0 when there was no progress.
    pub fn matched_index(&self) -> usize {
        match self {
            MatchOutcome::NoProgress => 0,
            MatchOutcome::Advanced { index } | MatchOutcome::DestinationReached { index } => {
                *index as usize
            }
        }
    }

    pub fn is_destination(&self) -> bool {
        matches!(self, MatchOutcome::DestinationReached { .. })
    }
}

/// Finds the furthest route point within a distance threshold.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProximityMatcher {
    threshold_meters: f64,
}

impl Default for ProximityMatcher {
    fn default() -> Self {
        Self::new(DEFAULT_PROXIMITY_THRESHOLD_METERS)
    }
}

impl ProximityMatcher {
    pub fn new(threshold_meters: f64) -> Self {
        Self { threshold_meters }
    }

    pub fn threshold_meters(&self) -> f64 {
        self.threshold_meters
    }

    /// Match `position` against `route`, treating index 0 as already reached.
    ///
    /// ```rust
    /// use route_progress::{Coordinate, MatchOutcome, ProximityMatcher};
    ///
    /// let route = vec![
    ///     Coordinate::new(41.1297, 14.7697),
    ///     Coordinate::new(41.1307, 14.7697),
    ///     Coordinate::new(41.1317, 14.7697),
    /// ];
    /// let matcher = ProximityMatcher::default();
    ///
    /// let outcome = matcher.find_progress(&route, &Coordinate::new(41.1307, 14.7698));
    /// assert_eq!(outcome, MatchOutcome::Advanced { index: 1 });
    /// ```
    pub fn find_progress(&self, route: &[Coordinate], position: &Coordinate) -> MatchOutcome {
        self.find_progress_from(route, position, 0)
    }

    /// Match `position` against `route`, scanning strictly after `from_index`.
    ///
    /// Unset `(0, 0)` fixes and out-of-range coordinates yield
    /// [`MatchOutcome::NoProgress`].
    pub fn find_progress_from(
        &self,
        route: &[Coordinate],
        position: &Coordinate,
        from_index: usize,
    ) -> MatchOutcome {
        if position.is_unset() || !position.is_valid() {
            debug!("[ProximityMatcher] Ignoring unusable fix {:?}", position);
            return MatchOutcome::NoProgress;
        }

        let matched = route
            .iter()
            .enumerate()
            .skip(from_index.saturating_add(1))
            .filter(|(_, point)| haversine_distance(point, position) <= self.threshold_meters)
            .map(|(i, _)| i)
            .last();

        match matched {
            None => MatchOutcome::NoProgress,
            Some(i) if i + 1 == route.len() => MatchOutcome::DestinationReached { index: i as u32 },
            Some(i) => MatchOutcome::Advanced { index: i as u32 },
        }
    }
}

/// Cursor over a fixed route that remembers the last matched index.
///
/// Successive calls to [`RouteProgress::update`] never move the cursor back.
#[derive(Debug, Clone)]
pub struct RouteProgress {
    matcher: ProximityMatcher,
    matched_index: usize,
}

impl RouteProgress {
    pub fn new(matcher: ProximityMatcher) -> Self {
        Self { matcher, matched_index: 0 }
    }

    pub fn matched_index(&self) -> usize {
        self.matched_index
    }

    /// Match a new position and move the cursor forward on progress.
    pub fn update(&mut self, route: &[Coordinate], position: &Coordinate) -> MatchOutcome {
        let outcome = self.matcher.find_progress_from(route, position, self.matched_index);
        if outcome != MatchOutcome::NoProgress {
            self.matched_index = outcome.matched_index();
        }
        outcome
    }

    pub fn reset(&mut self) {
        self.matched_index = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn equator_route() -> Vec<Coordinate> {
        vec![
            Coordinate::new(0.0, 0.0),
            Coordinate::new(0.0, 0.0001),
            Coordinate::new(0.0, 0.0002),
            Coordinate::new(0.0, 0.0003),
        ]
    }

    /// ~111 m per step along a meridian
    fn long_route() -> Vec<Coordinate> {
        (0..10)
            .map(|i| Coordinate::new(41.1297 + i as f64 * 0.001, 14.7697))
            .collect()
    }

    #[test]
    fn test_tight_radius_matches_point_under_user() {
        // Neighbours are ~11.1 m away, outside a 10 m radius
        let matcher = ProximityMatcher::new(10.0);
        let route = equator_route();
        let outcome = matcher.find_progress(&route, &Coordinate::new(0.0, 0.0002));
        assert_eq!(outcome, MatchOutcome::Advanced { index: 2 });
        assert_eq!(
            &route[outcome.matched_index()..],
            &[Coordinate::new(0.0, 0.0002), Coordinate::new(0.0, 0.0003)]
        );
    }

    #[test]
    fn test_default_radius_takes_furthest_point() {
        // The last point is ~11.1 m ahead, still inside 20 m
        let matcher = ProximityMatcher::default();
        let outcome = matcher.find_progress(&equator_route(), &Coordinate::new(0.0, 0.0002));
        assert_eq!(outcome, MatchOutcome::DestinationReached { index: 3 });
        assert!(outcome.is_destination());
    }

    #[test]
    fn test_far_position_no_progress() {
        let matcher = ProximityMatcher::default();
        let outcome = matcher.find_progress(&long_route(), &Coordinate::new(45.0, 9.0));
        assert_eq!(outcome, MatchOutcome::NoProgress);
        assert_eq!(outcome.matched_index(), 0);
    }

    #[test]
    fn test_near_start_is_no_progress() {
        let matcher = ProximityMatcher::default();
        let route = long_route();
        let outcome = matcher.find_progress(&route, &route[0]);
        assert_eq!(outcome, MatchOutcome::NoProgress);
    }

    #[test]
    fn test_unset_fix_ignored() {
        let matcher = ProximityMatcher::default();
        // The route starts at (0,0), but a (0,0) fix is never trusted
        let outcome = matcher.find_progress(&equator_route(), &Coordinate::new(0.0, 0.0));
        assert_eq!(outcome, MatchOutcome::NoProgress);
    }

    #[test]
    fn test_invalid_fix_ignored() {
        let matcher = ProximityMatcher::default();
        let outcome = matcher.find_progress(&long_route(), &Coordinate::new(f64::NAN, 14.7697));
        assert_eq!(outcome, MatchOutcome::NoProgress);
    }

    #[test]
    fn test_empty_route() {
        let matcher = ProximityMatcher::default();
        assert_eq!(
            matcher.find_progress(&[], &Coordinate::new(41.0, 14.0)),
            MatchOutcome::NoProgress
        );
    }

    #[test]
    fn test_scan_skips_points_before_cursor() {
        let matcher = ProximityMatcher::default();
        let route = long_route();
        // Standing on point 3 with the cursor already at 5
        let outcome = matcher.find_progress_from(&route, &route[3], 5);
        assert_eq!(outcome, MatchOutcome::NoProgress);
    }

    #[test]
    fn test_cursor_past_end_is_no_progress() {
        let matcher = ProximityMatcher::default();
        let route = long_route();
        assert_eq!(matcher.find_progress_from(&route, &route[3], usize::MAX), MatchOutcome::NoProgress);
        assert_eq!(matcher.find_progress_from(&route, &route[3], route.len()), MatchOutcome::NoProgress);
    }

    #[test]
    fn test_progress_is_monotonic() {
        let route = long_route();
        let mut progress = RouteProgress::new(ProximityMatcher::default());
        let mut last = 0;

        // Walk forward, with a GPS glitch back to the start halfway
        let walk = [1usize, 2, 2, 0, 4, 3, 6, 8];
        for &i in &walk {
            let position = Coordinate::new(route[i].latitude + 0.00002, route[i].longitude);
            progress.update(&route, &position);
            assert!(progress.matched_index() >= last);
            last = progress.matched_index();
        }
        assert_eq!(progress.matched_index(), 8);

        let outcome = progress.update(&route, &route[9]);
        assert_eq!(outcome, MatchOutcome::DestinationReached { index: 9 });

        progress.reset();
        assert_eq!(progress.matched_index(), 0);
    }
}
