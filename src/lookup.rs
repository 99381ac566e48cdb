//! Track point queries used to anchor course points onto a track.
//!
//! Both queries return the point just before the match, clamped to the first
//! point. Tracks are ordered by distance and time, so both are binary
//! searches for the first index satisfying a predicate.

use chrono::{DateTime, Utc};

use crate::error::{Result, TcxError};
use crate::model::{Track, TrackPoint};

/// The point before the first one recorded strictly past `target_distance`.
///
/// Total over every input: a target before the track start (or NaN) yields the
/// first point and a target at or beyond the last recorded distance yields
/// the last point.
pub fn find_nearest_by_distance(track: &Track, target_distance: f64) -> &TrackPoint {
    let points = track.points();
    let first_past = points.partition_point(|p| p.distance_meters <= target_distance);
    if first_past == points.len() {
        track.last()
    } else {
        &points[first_past.saturating_sub(1)]
    }
}

/// The point before the one recorded exactly at `target_time`, compared at
/// millisecond precision. A match on the first point returns that point.
pub fn find_time_equivalent(track: &Track, target_time: DateTime<Utc>) -> Result<&TrackPoint> {
    let points = track.points();
    let target = target_time.timestamp_millis();
    let candidate = points.partition_point(|p| p.time.timestamp_millis() < target);

    match points.get(candidate) {
        Some(p) if p.time.timestamp_millis() == target => {
            Ok(&points[candidate.saturating_sub(1)])
        }
        _ => Err(TcxError::NotFound(target_time)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Position;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_714_550_400 + secs, 0).unwrap()
    }

    fn track(distances: &[f64]) -> Track {
        let points = distances
            .iter()
            .enumerate()
            .map(|(i, d)| TrackPoint {
                time: at(i as i64 * 60),
                position: Position::new(35.0, 139.0 + i as f64 * 1e-3),
                altitude_meters: 0.0,
                distance_meters: *d,
            })
            .collect();
        Track::new(points).unwrap()
    }

    fn nearest(track: &Track, target: f64) -> f64 {
        find_nearest_by_distance(track, target).distance_meters
    }

    #[test]
    fn test_nearest_between_points() {
        let t = track(&[0.0, 10.0, 20.0, 30.0]);
        assert_eq!(nearest(&t, 5.0), 0.0);
        assert_eq!(nearest(&t, 25.0), 20.0);
    }

    #[test]
    fn test_nearest_clamps_both_ends() {
        let t = track(&[0.0, 10.0, 20.0, 30.0]);
        assert_eq!(nearest(&t, -5.0), 0.0);
        assert_eq!(nearest(&t, 1000.0), 30.0);
        assert_eq!(nearest(&t, 30.0), 30.0);
        assert_eq!(nearest(&t, f64::NAN), 0.0);
    }

    #[test]
    fn test_nearest_exact_distance_is_its_own_floor() {
        // The first point strictly past 10m is the one at 20m, so its
        // predecessor, the point at 10m, is returned.
        let t = track(&[0.0, 10.0, 20.0, 30.0]);
        assert_eq!(nearest(&t, 10.0), 10.0);
        assert_eq!(nearest(&t, 20.0), 20.0);
        assert_eq!(nearest(&t, 0.0), 0.0);
        assert_eq!(nearest(&t, 9.999), 0.0);
    }

    #[test]
    fn test_nearest_with_repeated_distances() {
        // Stopped at 10m for two samples.
        let t = track(&[0.0, 10.0, 10.0, 20.0]);
        let p = find_nearest_by_distance(&t, 15.0);
        assert_eq!(p.time, at(120));

        // Ties resolve to the last of the equal points.
        let p = find_nearest_by_distance(&t, 10.0);
        assert_eq!(p.time, at(120));

        let p = find_nearest_by_distance(&t, 9.0);
        assert_eq!(p.time, at(0));
    }

    #[test]
    fn test_nearest_single_point() {
        let t = track(&[42.0]);
        assert_eq!(nearest(&t, 0.0), 42.0);
        assert_eq!(nearest(&t, 100.0), 42.0);
    }

    #[test]
    fn test_nearest_matches_linear_scan() {
        let distances = [0.0, 3.5, 3.5, 7.0, 12.25, 12.25, 12.25, 40.0];
        let t = track(&distances);
        let mut target = -2.0;
        while target < 45.0 {
            let expected = match distances.iter().position(|d| *d > target) {
                Some(0) => 0,
                Some(i) => i - 1,
                None => distances.len() - 1,
            };
            let got = find_nearest_by_distance(&t, target);
            assert_eq!(got, &t.points()[expected], "target {target}");
            target += 0.25;
        }
    }

    #[test]
    fn test_time_equivalent_returns_predecessor() {
        let t = track(&[0.0, 10.0, 20.0]);
        let p = find_time_equivalent(&t, at(60)).unwrap();
        assert_eq!(p.time, at(0));
        let p = find_time_equivalent(&t, at(120)).unwrap();
        assert_eq!(p.time, at(60));
    }

    #[test]
    fn test_time_equivalent_first_point_clamped() {
        let t = track(&[0.0, 10.0, 20.0]);
        let p = find_time_equivalent(&t, at(0)).unwrap();
        assert_eq!(p.time, at(0));
    }

    #[test]
    fn test_time_equivalent_not_found() {
        let t = track(&[0.0, 10.0, 20.0]);
        for missing in [at(-60), at(30), at(61), at(600)] {
            let err = find_time_equivalent(&t, missing).unwrap_err();
            assert!(matches!(err, TcxError::NotFound(time) if time == missing));
        }
    }

    #[test]
    fn test_time_equivalent_ignores_sub_millisecond_difference() {
        let t = track(&[0.0, 10.0, 20.0]);
        let nudged = at(60) + chrono::Duration::microseconds(400);
        let p = find_time_equivalent(&t, nudged).unwrap();
        assert_eq!(p.time, at(0));
    }
}
