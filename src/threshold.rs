use log::warn;
use serde_derive::{Deserialize, Serialize};

use crate::error::Error;
use crate::math;

/// Raw step-test row as entered: pace minutes/seconds, heart rate, lactate.
/// Decimal commas are tolerated in every field.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct InputRow {
    pub min: String,
    pub sec: String,
    pub hr: String,
    pub lac: String,
}

impl InputRow {
    pub fn new(min: &str, sec: &str, hr: &str, lac: &str) -> Self {
        Self {
            min: min.into(),
            sec: sec.into(),
            hr: hr.into(),
            lac: lac.into(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub enum ThresholdMethod {
    /// Absolute lactate values, 2.0 / 4.0 mmol/l.
    Fixed,
    /// Offsets from the lowest observed lactate, +0.5 / +1.5 mmol/l.
    Baseline,
    /// Maximum perpendicular distance from a cubic fit to its chord.
    Dmax,
}

/// One valid sample. The working set is always sorted by pace descending
/// (slowest effort first); every threshold function relies on that order.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct ProcessedPoint {
    pub pace_decimal: f64, // min/km in decimal (5.5 means 5:30)
    pub hr: i32,
    pub lac: f64,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct ThresholdResult {
    pub pace_decimal: f64,
    pub hr: i32,
    pub lac: f64,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct PreviousThreshold {
    pub pace_decimal: f64,
    pub hr: i32,
}

/// Carryover from an earlier test for side-by-side comparison.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PreviousResult {
    pub date: String,
    pub aerobic: PreviousThreshold,
    pub anaerobic: PreviousThreshold,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct TestResult {
    pub athlete_name: String,
    pub test_date: String,
    pub method: ThresholdMethod,
    pub points: Vec<ProcessedPoint>,
    pub aerobic: ThresholdResult,
    pub anaerobic: ThresholdResult,
    pub min_hr: i32,
    pub max_hr: i32,
    pub max_lac: f64,
    pub previous: Option<PreviousResult>,
}

const DMAX_MIN_POINTS: usize = 4;
const DMAX_STEPS: usize = 500;

/// Decimal pace to "M:SS", carrying 60-second rounding into the minute.
pub fn format_pace(decimal_pace: f64) -> String {
    let mins = decimal_pace.floor() as i64;
    let secs = ((decimal_pace - mins as f64) * 60.0).round() as i64;

    if secs == 60 {
        return format!("{}:00", mins + 1);
    }

    format!("{}:{:02}", mins, secs)
}

fn parse_field(s: &str) -> Option<f64> {
    s.replace(',', ".").trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parses rows, dropping any with an unparseable pace-minute, heart rate or
/// lactate, and sorts by pace descending.
pub fn parse_rows(rows: &[InputRow]) -> Vec<ProcessedPoint> {
    let mut points: Vec<ProcessedPoint> = rows
        .iter()
        .filter_map(|row| {
            let m = parse_field(&row.min)?;
            let s = parse_field(&row.sec).unwrap_or(0.0);
            let h = parse_field(&row.hr)?;
            let l = parse_field(&row.lac)?;

            Some(ProcessedPoint {
                pace_decimal: m + s / 60.0,
                hr: h.round() as i32,
                lac: l,
            })
        })
        .collect();

    points.sort_by(|a, b| {
        b.pace_decimal
            .partial_cmp(&a.pace_decimal)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    points
}

/// Linear interpolation at `target_lac` between the bracketing samples,
/// clamped to the slowest/fastest point outside the observed range.
pub fn interpolate_threshold(points: &[ProcessedPoint], target_lac: f64) -> ThresholdResult {
    for pair in points.windows(2) {
        let (p1, p2) = (pair[0], pair[1]);

        if p1.lac <= target_lac && p2.lac >= target_lac {
            let range = p2.lac - p1.lac;
            if range == 0.0 {
                return ThresholdResult {
                    pace_decimal: p1.pace_decimal,
                    hr: p1.hr,
                    lac: target_lac,
                };
            }

            let fraction = (target_lac - p1.lac) / range;

            return ThresholdResult {
                pace_decimal: math::lerp(p1.pace_decimal, p2.pace_decimal, fraction),
                hr: math::lerp(p1.hr as f64, p2.hr as f64, fraction).round() as i32,
                lac: target_lac,
            };
        }
    }

    let last = points[points.len() - 1];
    if last.lac < target_lac {
        return ThresholdResult {
            pace_decimal: last.pace_decimal,
            hr: last.hr,
            lac: last.lac,
        };
    }

    let first = points[0];
    ThresholdResult {
        pace_decimal: first.pace_decimal,
        hr: first.hr,
        lac: first.lac,
    }
}

/// HR at a pace inside the sampled range; points are pace-descending.
fn interpolate_hr_at_pace(points: &[ProcessedPoint], target_pace: f64) -> i32 {
    for pair in points.windows(2) {
        let (p1, p2) = (pair[0], pair[1]);

        if target_pace <= p1.pace_decimal && target_pace >= p2.pace_decimal {
            let range = p1.pace_decimal - p2.pace_decimal;
            if range == 0.0 {
                return p1.hr;
            }

            let fraction = (p1.pace_decimal - target_pace) / range;
            return math::lerp(p1.hr as f64, p2.hr as f64, fraction).round() as i32;
        }
    }

    points[points.len() - 1].hr
}

struct Thresholds {
    aerobic: ThresholdResult,
    anaerobic: ThresholdResult,
}

fn fixed_thresholds(points: &[ProcessedPoint]) -> Thresholds {
    Thresholds {
        aerobic: interpolate_threshold(points, 2.0),
        anaerobic: interpolate_threshold(points, 4.0),
    }
}

fn min_lactate(points: &[ProcessedPoint]) -> f64 {
    points.iter().map(|p| p.lac).fold(f64::INFINITY, f64::min)
}

fn baseline_thresholds(points: &[ProcessedPoint]) -> Thresholds {
    let min_lac = min_lactate(points);

    Thresholds {
        aerobic: interpolate_threshold(points, min_lac + 0.5),
        anaerobic: interpolate_threshold(points, min_lac + 1.5),
    }
}

/// Dmax: cubic fit over (pace ascending, lactate), chord between the
/// endpoints, anaerobic threshold at the curve point farthest from the
/// chord. Aerobic falls back to the baseline definition, since Dmax
/// conventionally locates only the upper threshold.
fn dmax_thresholds(points: &[ProcessedPoint]) -> Thresholds {
    if points.len() < DMAX_MIN_POINTS {
        warn!(
            "Dmax needs {} points, got {}; falling back to baseline method",
            DMAX_MIN_POINTS,
            points.len()
        );
        return baseline_thresholds(points);
    }

    // Ascending pace (fastest effort first) for a well-posed fit.
    let xs: Vec<f64> = points.iter().rev().map(|p| p.pace_decimal).collect();
    let ys: Vec<f64> = points.iter().rev().map(|p| p.lac).collect();

    let coeffs = match math::polyfit(&xs, &ys, 3) {
        Some(c) => c,
        None => {
            warn!("singular Dmax fit; falling back to baseline method");
            return baseline_thresholds(points);
        }
    };

    let (start_x, start_y) = (xs[0], ys[0]);
    let (end_x, end_y) = (xs[xs.len() - 1], ys[ys.len() - 1]);

    let dx = end_x - start_x;
    if dx.abs() < 1e-9 {
        warn!("degenerate Dmax chord; falling back to baseline method");
        return baseline_thresholds(points);
    }

    let step = dx / DMAX_STEPS as f64;
    let mut max_dist = 0.0;
    let mut best = (start_x, start_y);

    for i in 0..=DMAX_STEPS {
        let x = start_x + i as f64 * step;
        let y = math::poly_eval(&coeffs, x);

        let dist = math::point_line_distance(x, y, start_x, start_y, end_x, end_y);
        if dist > max_dist {
            max_dist = dist;
            best = (x, y);
        }
    }

    let (ana_pace, ana_lac) = best;

    Thresholds {
        aerobic: interpolate_threshold(points, min_lactate(points) + 0.5),
        anaerobic: ThresholdResult {
            pace_decimal: ana_pace,
            hr: interpolate_hr_at_pace(points, ana_pace),
            lac: (ana_lac * 100.0).round() / 100.0,
        },
    }
}

/// Pure entry point: raw rows in, full test result out. Fewer than two
/// complete rows is a validation error raised before any math runs.
pub fn calculate_test_results(
    name: &str,
    date: &str,
    rows: &[InputRow],
    method: ThresholdMethod,
    previous: Option<PreviousResult>,
) -> Result<TestResult, Error> {
    let points = parse_rows(rows);

    if points.len() < 2 {
        return Err(Error::InsufficientData {
            required: 2,
            got: points.len(),
        });
    }

    let thresholds = match method {
        ThresholdMethod::Fixed => fixed_thresholds(&points),
        ThresholdMethod::Baseline => baseline_thresholds(&points),
        ThresholdMethod::Dmax => dmax_thresholds(&points),
    };

    let min_hr = points.iter().map(|p| p.hr).min().unwrap_or(0);
    let max_hr = points.iter().map(|p| p.hr).max().unwrap_or(0);
    let max_lac = points.iter().map(|p| p.lac).fold(f64::NEG_INFINITY, f64::max);

    Ok(TestResult {
        athlete_name: name.to_string(),
        test_date: date.to_string(),
        method,
        points,
        aerobic: thresholds.aerobic,
        anaerobic: thresholds.anaerobic,
        min_hr,
        max_hr,
        max_lac,
        previous,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step_test_rows() -> Vec<InputRow> {
        vec![
            InputRow::new("7", "00", "125", "1.1"),
            InputRow::new("6", "30", "132", "1.2"),
            InputRow::new("6", "00", "139", "1.4"),
            InputRow::new("5", "30", "148", "1.7"),
            InputRow::new("5", "00", "158", "2.4"),
            InputRow::new("4", "45", "166", "3.5"),
            InputRow::new("4", "30", "174", "5.8"),
            InputRow::new("4", "15", "181", "8.4"),
        ]
    }

    #[test]
    fn parsing_tolerates_comma_decimals() {
        let rows = vec![InputRow::new("5,5", "0", "150", "3,0")];
        let points = parse_rows(&rows);

        assert_eq!(points.len(), 1);
        assert!((points[0].pace_decimal - 5.5).abs() < 1e-9);
        assert_eq!(points[0].hr, 150);
        assert!((points[0].lac - 3.0).abs() < 1e-9);
    }

    #[test]
    fn partial_rows_are_dropped_not_defaulted() {
        let rows = vec![
            InputRow::new("5", "30", "", "2.0"),
            InputRow::new("5", "00", "150", "abc"),
            InputRow::new("", "00", "150", "2.0"),
            InputRow::new("4", "30", "160", "4.0"),
        ];

        assert_eq!(parse_rows(&rows).len(), 1);
    }

    #[test]
    fn missing_seconds_default_to_zero() {
        let rows = vec![InputRow::new("6", "", "140", "1.5")];
        let points = parse_rows(&rows);
        assert!((points[0].pace_decimal - 6.0).abs() < 1e-9);
    }

    #[test]
    fn points_are_sorted_pace_descending() {
        let points = parse_rows(&step_test_rows());
        for pair in points.windows(2) {
            assert!(pair[0].pace_decimal > pair[1].pace_decimal);
        }
        assert!((points[0].pace_decimal - 7.0).abs() < 1e-9);
    }

    #[test]
    fn interpolation_at_exact_sample_is_lossless() {
        let points = parse_rows(&step_test_rows());
        let r = interpolate_threshold(&points, 2.4);

        assert!((r.pace_decimal - 5.0).abs() < 1e-9);
        assert_eq!(r.hr, 158);
    }

    #[test]
    fn interpolation_clamps_outside_observed_range() {
        let points = parse_rows(&step_test_rows());

        let above = interpolate_threshold(&points, 20.0);
        assert!((above.pace_decimal - 4.25).abs() < 1e-9);
        assert_eq!(above.hr, 181);

        let below = interpolate_threshold(&points, 0.5);
        assert!((below.pace_decimal - 7.0).abs() < 1e-9);
        assert_eq!(below.hr, 125);
    }

    #[test]
    fn fixed_thresholds_bracket_the_crossing_rows() {
        let result = calculate_test_results(
            "Test Athlete",
            "2026-01-15",
            &step_test_rows(),
            ThresholdMethod::Fixed,
            None,
        )
        .unwrap();

        // 2.0 mmol/l crosses between 5:30 @ 1.7 and 5:00 @ 2.4.
        assert!(result.aerobic.pace_decimal > 5.0 && result.aerobic.pace_decimal < 5.5);
        // 4.0 mmol/l crosses between 4:45 @ 3.5 and 4:30 @ 5.8.
        assert!(result.anaerobic.pace_decimal > 4.5 && result.anaerobic.pace_decimal < 4.75);

        assert_eq!(result.min_hr, 125);
        assert_eq!(result.max_hr, 181);
        assert!((result.max_lac - 8.4).abs() < 1e-9);
    }

    #[test]
    fn baseline_thresholds_offset_from_min_lactate() {
        let result = calculate_test_results(
            "Test Athlete",
            "2026-01-15",
            &step_test_rows(),
            ThresholdMethod::Baseline,
            None,
        )
        .unwrap();

        // min lac 1.1: aerobic at 1.6 (between 1.4 and 1.7), anaerobic at
        // 2.6 (between 2.4 and 3.5).
        assert!((result.aerobic.lac - 1.6).abs() < 1e-9);
        assert!(result.aerobic.pace_decimal > 5.5 && result.aerobic.pace_decimal < 6.0);
        assert!((result.anaerobic.lac - 2.6).abs() < 1e-9);
        assert!(result.anaerobic.pace_decimal > 4.75 && result.anaerobic.pace_decimal < 5.0);
    }

    #[test]
    fn dmax_point_is_interior_for_convex_curve() {
        let result = calculate_test_results(
            "Test Athlete",
            "2026-01-15",
            &step_test_rows(),
            ThresholdMethod::Dmax,
            None,
        )
        .unwrap();

        let fastest = 4.25;
        let slowest = 7.0;
        assert!(result.anaerobic.pace_decimal > fastest);
        assert!(result.anaerobic.pace_decimal < slowest);
        assert!(result.anaerobic.hr >= 125 && result.anaerobic.hr <= 181);

        // Aerobic side falls back to the baseline definition.
        assert!((result.aerobic.lac - 1.6).abs() < 1e-9);
    }

    #[test]
    fn dmax_with_three_points_falls_back_to_baseline() {
        let rows = vec![
            InputRow::new("6", "00", "130", "1.0"),
            InputRow::new("5", "00", "150", "2.0"),
            InputRow::new("4", "00", "170", "5.0"),
        ];

        let dmax =
            calculate_test_results("A", "d", &rows, ThresholdMethod::Dmax, None).unwrap();
        let baseline =
            calculate_test_results("A", "d", &rows, ThresholdMethod::Baseline, None).unwrap();

        assert_eq!(dmax.anaerobic, baseline.anaerobic);
        assert_eq!(dmax.aerobic, baseline.aerobic);
    }

    #[test]
    fn fewer_than_two_rows_is_a_validation_error() {
        let rows = vec![InputRow::new("5", "00", "150", "2.0")];
        let err = calculate_test_results("A", "d", &rows, ThresholdMethod::Fixed, None);
        assert!(matches!(err, Err(Error::InsufficientData { got: 1, .. })));
    }

    #[test]
    fn previous_result_is_carried_through() {
        let previous = PreviousResult {
            date: "2025-11-01".into(),
            aerobic: PreviousThreshold {
                pace_decimal: 5.4,
                hr: 150,
            },
            anaerobic: PreviousThreshold {
                pace_decimal: 4.7,
                hr: 170,
            },
        };

        let result = calculate_test_results(
            "Test Athlete",
            "2026-01-15",
            &step_test_rows(),
            ThresholdMethod::Fixed,
            Some(previous.clone()),
        )
        .unwrap();

        assert_eq!(result.previous, Some(previous));
    }

    #[test]
    fn pace_formatting_carries_the_minute() {
        assert_eq!(format_pace(5.5), "5:30");
        assert_eq!(format_pace(4.999), "5:00");
        assert_eq!(format_pace(6.0), "6:00");
        assert_eq!(format_pace(4.05), "4:03");
    }
}
