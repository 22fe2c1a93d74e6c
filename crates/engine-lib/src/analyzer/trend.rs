//! Metric trend analysis
//!
//! Fits a least-squares line through a metric's recent history and orients
//! the slope by the metric's polarity, so `Declining` always means "moving
//! toward the bad side" regardless of whether high or low values are bad.

use crate::models::{MetricPoint, MetricThreshold, ThresholdDirection, TrendDirection, TrendForecast};

/// Fits linear trends over metric history windows
pub struct TrendAnalyzer {
    /// Slopes below this magnitude (units/hour) are classified as stable
    pub epsilon: f64,
    /// Minimum history points required before a forecast is produced
    pub min_samples: usize,
}

impl TrendAnalyzer {
    pub fn new(epsilon: f64, min_samples: usize) -> Self {
        Self {
            epsilon,
            min_samples,
        }
    }

    /// Produce a forecast for one metric, or `None` when the history is too
    /// short to fit a line.
    ///
    /// `points` must be sorted by timestamp ascending.
    pub fn analyze(
        &self,
        metric: &str,
        points: &[MetricPoint],
        threshold: &MetricThreshold,
    ) -> Option<TrendForecast> {
        if points.len() < self.min_samples {
            return None;
        }

        let slope = self.slope_per_hour(points)?;
        let confidence = self.r_squared(points, slope).clamp(0.0, 1.0);

        let direction = if slope.abs() < self.epsilon {
            TrendDirection::Stable
        } else {
            let worsening = match threshold.direction {
                ThresholdDirection::LowerIsWorse => slope < 0.0,
                ThresholdDirection::HigherIsWorse => slope > 0.0,
            };
            if worsening {
                TrendDirection::Declining
            } else {
                TrendDirection::Improving
            }
        };

        let hours_to_critical = if direction == TrendDirection::Declining {
            self.project_hours_to_critical(points, slope, threshold)
        } else {
            None
        };

        Some(TrendForecast {
            metric: metric.to_string(),
            direction,
            rate_per_hour: slope.abs(),
            confidence,
            hours_to_critical,
        })
    }

    /// Least-squares slope in metric units per hour
    fn slope_per_hour(&self, points: &[MetricPoint]) -> Option<f64> {
        let n = points.len() as f64;
        if n < 2.0 {
            return None;
        }

        // Normalize timestamps to hours from the first point to avoid
        // precision issues with large epoch values
        let t0 = points.first()?.timestamp;

        let mut sum_x = 0.0;
        let mut sum_y = 0.0;
        let mut sum_xy = 0.0;
        let mut sum_xx = 0.0;

        for point in points {
            let x = (point.timestamp - t0).num_seconds() as f64 / 3600.0;
            let y = point.value;
            sum_x += x;
            sum_y += y;
            sum_xy += x * y;
            sum_xx += x * x;
        }

        let denominator = n * sum_xx - sum_x * sum_x;
        if denominator.abs() < f64::EPSILON {
            return None;
        }

        Some((n * sum_xy - sum_x * sum_y) / denominator)
    }

    /// Coefficient of determination for the fitted line
    fn r_squared(&self, points: &[MetricPoint], slope: f64) -> f64 {
        if points.len() < 2 {
            return 0.0;
        }

        let t0 = match points.first() {
            Some(p) => p.timestamp,
            None => return 0.0,
        };
        let n = points.len() as f64;

        let mean_y: f64 = points.iter().map(|p| p.value).sum::<f64>() / n;
        let mean_x: f64 = points
            .iter()
            .map(|p| (p.timestamp - t0).num_seconds() as f64 / 3600.0)
            .sum::<f64>()
            / n;
        let intercept = mean_y - slope * mean_x;

        let mut ss_res = 0.0;
        let mut ss_tot = 0.0;

        for point in points {
            let x = (point.timestamp - t0).num_seconds() as f64 / 3600.0;
            let y_pred = slope * x + intercept;
            ss_res += (point.value - y_pred).powi(2);
            ss_tot += (point.value - mean_y).powi(2);
        }

        if ss_tot.abs() < f64::EPSILON {
            return 0.0;
        }

        1.0 - (ss_res / ss_tot)
    }

    /// Project hours until the critical threshold is crossed, given a
    /// worsening slope. Returns `None` for non-positive or non-finite
    /// projections (already past critical, or degenerate fit).
    fn project_hours_to_critical(
        &self,
        points: &[MetricPoint],
        slope: f64,
        threshold: &MetricThreshold,
    ) -> Option<f64> {
        let current = points.last()?.value;
        let hours = (threshold.critical - current) / slope;
        if hours.is_finite() && hours > 0.0 {
            Some(hours)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn points_from(values: &[f64]) -> Vec<MetricPoint> {
        let start = Utc::now() - Duration::hours(values.len() as i64);
        values
            .iter()
            .enumerate()
            .map(|(i, v)| MetricPoint::new(start + Duration::hours(i as i64), *v))
            .collect()
    }

    #[test]
    fn test_insufficient_samples() {
        let analyzer = TrendAnalyzer::new(0.1, 3);
        let threshold = MetricThreshold::lower_is_worse(80.0, 70.0);
        assert!(analyzer
            .analyze("battery_soh", &points_from(&[90.0, 89.0]), &threshold)
            .is_none());
    }

    #[test]
    fn test_flat_history_is_stable() {
        let analyzer = TrendAnalyzer::new(0.1, 3);
        let threshold = MetricThreshold::lower_is_worse(80.0, 70.0);
        let forecast = analyzer
            .analyze("battery_soh", &points_from(&[90.0, 90.0, 90.0, 90.0]), &threshold)
            .expect("forecast");
        assert_eq!(forecast.direction, TrendDirection::Stable);
        assert!(forecast.hours_to_critical.is_none());
    }

    #[test]
    fn test_falling_soh_is_declining() {
        let analyzer = TrendAnalyzer::new(0.1, 3);
        let threshold = MetricThreshold::lower_is_worse(80.0, 70.0);
        let forecast = analyzer
            .analyze("battery_soh", &points_from(&[90.0, 88.0, 86.0, 84.0]), &threshold)
            .expect("forecast");
        assert_eq!(forecast.direction, TrendDirection::Declining);
        // Perfectly linear history: 2 units/hour, high confidence
        assert!((forecast.rate_per_hour - 2.0).abs() < 1e-9);
        assert!(forecast.confidence > 0.99);
        // 84 -> 70 at 2/hour = 7 hours
        let hours = forecast.hours_to_critical.expect("projection");
        assert!((hours - 7.0).abs() < 1e-9);
    }

    #[test]
    fn test_rising_temp_is_declining() {
        let analyzer = TrendAnalyzer::new(0.1, 3);
        let threshold = MetricThreshold::higher_is_worse(40.0, 45.0);
        let forecast = analyzer
            .analyze("battery_temp", &points_from(&[35.0, 36.0, 37.0, 38.0]), &threshold)
            .expect("forecast");
        assert_eq!(forecast.direction, TrendDirection::Declining);
        let hours = forecast.hours_to_critical.expect("projection");
        assert!((hours - 7.0).abs() < 1e-9);
    }

    #[test]
    fn test_rising_soh_is_improving() {
        let analyzer = TrendAnalyzer::new(0.1, 3);
        let threshold = MetricThreshold::lower_is_worse(80.0, 70.0);
        let forecast = analyzer
            .analyze("battery_soh", &points_from(&[84.0, 86.0, 88.0, 90.0]), &threshold)
            .expect("forecast");
        assert_eq!(forecast.direction, TrendDirection::Improving);
        assert!(forecast.hours_to_critical.is_none());
    }

    #[test]
    fn test_already_past_critical_has_no_projection() {
        let analyzer = TrendAnalyzer::new(0.1, 3);
        let threshold = MetricThreshold::lower_is_worse(80.0, 70.0);
        let forecast = analyzer
            .analyze("battery_soh", &points_from(&[72.0, 70.0, 68.0, 66.0]), &threshold)
            .expect("forecast");
        assert_eq!(forecast.direction, TrendDirection::Declining);
        assert!(forecast.hours_to_critical.is_none());
    }
}
