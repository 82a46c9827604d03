//! Short-horizon linear-regression forecast of CPU/memory usage, plus the
//! autocorrelation-based seasonality helper used by the traffic-pattern
//! classifier.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::stats;
use crate::store::Sample;

const LOW_CONFIDENCE_THRESHOLD: f64 = 0.5;
const SAFETY_MARGIN: f64 = 1.2;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Forecast {
    pub namespace: String,
    pub service: String,
    pub horizon_hours: f64,
    pub predicted_cpu_millicores: f64,
    pub predicted_memory_bytes: f64,
    pub confidence: f64,
    pub timestamp: DateTime<Utc>,
}

/// Linear regression of a usage series against hours-since-first-sample.
/// Returns `(prediction, r_squared)`.
fn forecast_series(samples: &[Sample], horizon_hours: f64) -> (f64, f64) {
    if samples.is_empty() {
        return (0.0, 0.0);
    }
    let t0 = samples[0].timestamp;
    let xs: Vec<f64> = samples
        .iter()
        .map(|s| (s.timestamp - t0).num_seconds() as f64 / 3600.0)
        .collect();
    let ys: Vec<f64> = samples.iter().map(|s| s.value).collect();
    let fit = stats::linear_regression(&xs, &ys);

    let current_value = *ys.last().unwrap();
    let prediction = (current_value + fit.slope * horizon_hours).max(0.0);
    (prediction, fit.r_squared)
}

pub fn predict_resources(
    namespace: &str,
    service: &str,
    cpu_samples: &[Sample],
    memory_samples: &[Sample],
    horizon_hours: f64,
    min_samples: usize,
) -> Forecast {
    if cpu_samples.len() < min_samples && memory_samples.len() < min_samples {
        return Forecast {
            namespace: namespace.to_string(),
            service: service.to_string(),
            horizon_hours,
            predicted_cpu_millicores: 0.0,
            predicted_memory_bytes: 0.0,
            confidence: 0.0,
            timestamp: Utc::now(),
        };
    }

    let (cpu_pred, cpu_r2) = forecast_series(cpu_samples, horizon_hours);
    let (mem_pred, mem_r2) = forecast_series(memory_samples, horizon_hours);
    let confidence = (cpu_r2 + mem_r2) / 2.0;

    let (cpu_pred, mem_pred) = if confidence < LOW_CONFIDENCE_THRESHOLD {
        (cpu_pred * SAFETY_MARGIN, mem_pred * SAFETY_MARGIN)
    } else {
        (cpu_pred, mem_pred)
    };

    Forecast {
        namespace: namespace.to_string(),
        service: service.to_string(),
        horizon_hours,
        predicted_cpu_millicores: cpu_pred,
        predicted_memory_bytes: mem_pred,
        confidence,
        timestamp: Utc::now(),
    }
}

/// A period is declared at the smallest lag `k >= 12` maximizing `r(k)` if
/// that maximum exceeds `0.6`.
pub fn detect_seasonality(values: &[f64]) -> Option<usize> {
    let n = values.len();
    if n <= 12 {
        return None;
    }
    let max_lag = n / 4;
    if max_lag < 12 {
        return None;
    }
    let mut best_lag = None;
    let mut best_r = SEASONALITY_THRESHOLD;
    for lag in 12..=max_lag {
        let r = stats::autocorrelation(values, lag);
        if r > best_r {
            best_r = r;
            best_lag = Some(lag);
        }
    }
    best_lag
}

const SEASONALITY_THRESHOLD: f64 = 0.6;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn hourly_samples(values: &[f64]) -> Vec<Sample> {
        values
            .iter()
            .enumerate()
            .map(|(i, v)| Sample {
                timestamp: Utc.timestamp_opt(i as i64 * 3600, 0).unwrap(),
                value: *v,
            })
            .collect()
    }

    #[test]
    fn perfect_linear_trend_forecasts_without_safety_margin() {
        let values: Vec<f64> = (0..11).map(|i| 100.0 + 10.0 * i as f64).collect();
        let samples = hourly_samples(&values);
        let forecast = predict_resources("ns", "app", &samples, &samples, 24.0, 10);
        assert!((forecast.predicted_cpu_millicores - 440.0).abs() < 1.0);
        assert!(forecast.confidence >= 0.99);
    }

    #[test]
    fn insufficient_samples_yields_zero_confidence() {
        let samples = hourly_samples(&[1.0, 2.0]);
        let forecast = predict_resources("ns", "app", &samples, &samples, 24.0, 10);
        assert_eq!(forecast.confidence, 0.0);
        assert_eq!(forecast.predicted_cpu_millicores, 0.0);
    }
}
