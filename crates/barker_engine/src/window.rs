//! Window scheduling and dispatch-gap auditing.

use crate::PatternConfig;
use barker_core::ScheduleWindow;
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Uniform instant inside `window` at or after `now`.
///
/// Uses today's occurrence while its end is still ahead (starting no earlier
/// than `now`), otherwise tomorrow's full occurrence.
pub fn next_dispatch_time<R: Rng>(
    window: &ScheduleWindow,
    now: DateTime<Utc>,
    rng: &mut R,
) -> DateTime<Utc> {
    let today = now.date_naive();
    let (start, end) = window.occurrence(today);
    let (lo, hi) = if now < end {
        (start.max(now), end)
    } else {
        window.occurrence(today + Duration::days(1))
    };

    let span = (hi - lo).num_milliseconds();
    if span <= 0 {
        return lo;
    }
    lo + Duration::milliseconds(rng.gen_range(0..span))
}

/// Bernoulli draw with the window's post probability.
pub fn should_dispatch<R: Rng>(window: &ScheduleWindow, rng: &mut R) -> bool {
    let p = window.post_probability;
    if !p.is_finite() || p <= 0.0 {
        return false;
    }
    rng.gen_bool(p.min(1.0))
}

/// A planned dispatch.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedDispatch {
    /// Window the instant falls in.
    pub window: ScheduleWindow,
    /// Drawn instant.
    pub fire_at: DateTime<Utc>,
    /// End of the window occurrence containing `fire_at`.
    pub window_end: DateTime<Utc>,
}

/// Earliest next dispatch across `windows`, drawing one instant per window.
pub fn plan_next<R: Rng>(
    windows: &[ScheduleWindow],
    after: DateTime<Utc>,
    rng: &mut R,
) -> Option<PlannedDispatch> {
    windows
        .iter()
        .map(|window| {
            let fire_at = next_dispatch_time(window, after, rng);
            let (_, window_end) = window.occurrence(fire_at.date_naive());
            PlannedDispatch {
                window: window.clone(),
                fire_at,
                window_end,
            }
        })
        .min_by_key(|plan| plan.fire_at)
}

/// Result of a dispatch-gap audit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternReport {
    /// Mean gap between consecutive posts, in hours.
    pub mean_gap_hours: f64,
    /// Sample variance of the gaps, in hours².
    pub variance_hours: f64,
    /// Whether the gaps look machine-regular.
    pub suspicious: bool,
    /// Number of gaps examined.
    pub sample_size: usize,
}

/// Audit the spacing of successful posts.
///
/// Gaps are taken between chronologically sorted timestamps. The result is
/// suspicious when at least `min_samples` gaps exist and their sample
/// variance is below the threshold.
pub fn detect_pattern(posted_at: &[DateTime<Utc>], config: &PatternConfig) -> PatternReport {
    let mut times = posted_at.to_vec();
    times.sort();

    let gaps: Vec<f64> = times
        .windows(2)
        .map(|pair| (pair[1] - pair[0]).num_milliseconds() as f64 / 3_600_000.0)
        .collect();
    let n = gaps.len();

    let mean = if n == 0 {
        0.0
    } else {
        gaps.iter().sum::<f64>() / n as f64
    };
    let variance = if n < 2 {
        0.0
    } else {
        gaps.iter().map(|g| (g - mean).powi(2)).sum::<f64>() / (n - 1) as f64
    };

    PatternReport {
        mean_gap_hours: mean,
        variance_hours: variance,
        suspicious: n >= *config.min_samples() && variance < *config.variance_threshold_hours(),
        sample_size: n,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveTime, TimeZone};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn window(start: (u32, u32), end: (u32, u32), p: f64) -> ScheduleWindow {
        ScheduleWindow::new(
            "test",
            NaiveTime::from_hms_opt(start.0, start.1, 0).unwrap(),
            NaiveTime::from_hms_opt(end.0, end.1, 0).unwrap(),
            p,
        )
    }

    fn at(day: u32, h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 7, day, h, m, 0).unwrap()
    }

    #[test]
    fn test_draw_inside_todays_window() {
        let w = window((9, 0), (12, 0), 1.0);
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..500 {
            let t = next_dispatch_time(&w, at(10, 6, 0), &mut rng);
            assert!(t >= at(10, 9, 0) && t < at(10, 12, 0), "{t}");
        }
    }

    #[test]
    fn test_draw_never_in_the_past_mid_window() {
        let w = window((9, 0), (12, 0), 1.0);
        let mut rng = StdRng::seed_from_u64(8);
        for _ in 0..500 {
            let t = next_dispatch_time(&w, at(10, 11, 30), &mut rng);
            assert!(t >= at(10, 11, 30) && t < at(10, 12, 0), "{t}");
        }
    }

    #[test]
    fn test_elapsed_window_rolls_to_tomorrow() {
        let w = window((9, 0), (12, 0), 1.0);
        let mut rng = StdRng::seed_from_u64(9);
        for now in [at(10, 12, 0), at(10, 23, 59)] {
            let t = next_dispatch_time(&w, now, &mut rng);
            assert!(t >= at(11, 9, 0) && t < at(11, 12, 0), "{t}");
        }
    }

    #[test]
    fn test_same_seed_same_draw() {
        let w = window((18, 0), (22, 0), 1.0);
        let a = next_dispatch_time(&w, at(10, 8, 0), &mut StdRng::seed_from_u64(42));
        let b = next_dispatch_time(&w, at(10, 8, 0), &mut StdRng::seed_from_u64(42));
        assert_eq!(a, b);
    }

    #[test]
    fn test_should_dispatch_extremes() {
        let mut rng = StdRng::seed_from_u64(1);
        assert!((0..100).all(|_| should_dispatch(&window((9, 0), (10, 0), 1.0), &mut rng)));
        assert!((0..100).all(|_| !should_dispatch(&window((9, 0), (10, 0), 0.0), &mut rng)));
    }

    #[test]
    fn test_should_dispatch_rate() {
        let mut rng = StdRng::seed_from_u64(2);
        let w = window((9, 0), (10, 0), 0.3);
        let hits = (0..10_000).filter(|_| should_dispatch(&w, &mut rng)).count();
        assert!((2_500..3_500).contains(&hits), "{hits}");
    }

    #[test]
    fn test_plan_next_picks_earliest_window() {
        let windows = vec![window((18, 0), (20, 0), 1.0), window((8, 0), (9, 0), 1.0)];
        let mut rng = StdRng::seed_from_u64(3);

        let plan = plan_next(&windows, at(10, 7, 0), &mut rng).unwrap();
        assert_eq!(plan.window.start, NaiveTime::from_hms_opt(8, 0, 0).unwrap());
        assert_eq!(plan.window_end, at(10, 9, 0));

        let plan = plan_next(&windows, plan.window_end, &mut rng).unwrap();
        assert_eq!(plan.window_end, at(10, 20, 0));

        let plan = plan_next(&windows, plan.window_end, &mut rng).unwrap();
        assert_eq!(plan.window_end, at(11, 9, 0));
    }

    #[test]
    fn test_plan_next_without_windows() {
        assert!(plan_next(&[], at(10, 7, 0), &mut StdRng::seed_from_u64(0)).is_none());
    }

    #[test]
    fn test_too_few_gaps_is_never_suspicious() {
        let times: Vec<_> = (0..4).map(|h| at(10, h * 4, 0)).collect();
        let report = detect_pattern(&times, &PatternConfig::default());
        assert_eq!(report.sample_size, 3);
        assert!(!report.suspicious);
        assert!((report.mean_gap_hours - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_irregular_gaps_are_not_suspicious() {
        let offsets = [0, 1, 9, 10, 20, 22, 31, 40, 41, 55];
        let times: Vec<_> = offsets
            .iter()
            .map(|h| at(1, 0, 0) + Duration::hours(*h))
            .collect();
        let report = detect_pattern(&times, &PatternConfig::default());
        assert!(report.variance_hours >= 2.0);
        assert!(!report.suspicious);
    }

    #[test]
    fn test_empty_history() {
        let report = detect_pattern(&[], &PatternConfig::default());
        assert_eq!(report.sample_size, 0);
        assert_eq!(report.mean_gap_hours, 0.0);
        assert!(!report.suspicious);
    }
}
