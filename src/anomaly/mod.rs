//! Z-score, ratio-spike, ratio-drop, drift, and oscillation detectors.
//! All detectors run independently over the same window; outputs are
//! concatenated without deduplication, per the contract this module
//! implements.

pub mod forecast;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::stats;
use crate::store::Sample;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnomalyKind {
    Spike,
    Drop,
    Drift,
    Oscillation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Anomaly {
    pub kind: AnomalyKind,
    pub severity: Severity,
    pub description: String,
    pub detected_at: DateTime<Utc>,
    pub observed_value: f64,
    pub expected_value: f64,
}

pub struct AnomalyDetectorConfig {
    pub z_threshold: f64,
    pub spike_threshold: f64,
    pub drop_threshold: f64,
    pub min_samples: usize,
}

impl Default for AnomalyDetectorConfig {
    fn default() -> Self {
        Self {
            z_threshold: 3.0,
            spike_threshold: 2.0,
            drop_threshold: 0.5,
            min_samples: 10,
        }
    }
}

pub struct AnomalyDetector {
    config: AnomalyDetectorConfig,
}

impl AnomalyDetector {
    pub fn new(config: AnomalyDetectorConfig) -> Self {
        Self { config }
    }

    pub fn detect(&self, samples: &[Sample]) -> Vec<Anomaly> {
        if samples.len() < self.config.min_samples {
            return Vec::new();
        }

        let mut out = Vec::new();
        out.extend(self.z_score(samples));
        out.extend(self.ratio_spike(samples));
        out.extend(self.ratio_drop(samples));
        out.extend(self.drift(samples));
        out.extend(self.oscillation(samples));
        out
    }

    fn z_score(&self, samples: &[Sample]) -> Vec<Anomaly> {
        let values: Vec<f64> = samples.iter().map(|s| s.value).collect();
        let mean = stats::mean(&values);
        let sigma = stats::stddev(&values);
        if sigma == 0.0 {
            return Vec::new();
        }
        let tau = self.config.z_threshold;
        samples
            .iter()
            .filter_map(|s| {
                let z = (s.value - mean).abs() / sigma;
                if z <= tau {
                    return None;
                }
                let severity = if z > 5.0 {
                    Severity::Critical
                } else if z > tau + 1.5 {
                    Severity::High
                } else if z > tau + 1.0 {
                    Severity::Medium
                } else {
                    Severity::Low
                };
                let kind = if s.value > mean { AnomalyKind::Spike } else { AnomalyKind::Drop };
                Some(Anomaly {
                    kind,
                    severity,
                    description: format!("z-score {z:.2} exceeds threshold {tau}"),
                    detected_at: s.timestamp,
                    observed_value: s.value,
                    expected_value: mean,
                })
            })
            .collect()
    }

    fn ratio_spike(&self, samples: &[Sample]) -> Vec<Anomaly> {
        let tau = self.config.spike_threshold;
        samples
            .windows(2)
            .filter_map(|pair| {
                let (prev, cur) = (pair[0].value, pair[1].value);
                if prev <= 0.0 {
                    return None;
                }
                let ratio = cur / prev;
                if ratio <= tau {
                    return None;
                }
                let severity = if ratio > 5.0 {
                    Severity::Critical
                } else if ratio > 3.0 {
                    Severity::High
                } else {
                    Severity::Medium
                };
                Some(Anomaly {
                    kind: AnomalyKind::Spike,
                    severity,
                    description: format!("value ratio {ratio:.2} exceeds spike threshold {tau}"),
                    detected_at: pair[1].timestamp,
                    observed_value: cur,
                    expected_value: prev,
                })
            })
            .collect()
    }

    fn ratio_drop(&self, samples: &[Sample]) -> Vec<Anomaly> {
        let tau = self.config.drop_threshold;
        samples
            .windows(2)
            .filter_map(|pair| {
                let (prev, cur) = (pair[0].value, pair[1].value);
                if prev <= 0.0 {
                    return None;
                }
                let ratio = cur / prev;
                if ratio >= tau {
                    return None;
                }
                let inverse = if ratio > 0.0 { 1.0 / ratio } else { f64::INFINITY };
                let severity = if inverse > 5.0 {
                    Severity::Critical
                } else if inverse > 3.0 {
                    Severity::High
                } else {
                    Severity::Medium
                };
                Some(Anomaly {
                    kind: AnomalyKind::Drop,
                    severity,
                    description: format!("value ratio {ratio:.2} below drop threshold {tau}"),
                    detected_at: pair[1].timestamp,
                    observed_value: cur,
                    expected_value: prev,
                })
            })
            .collect()
    }

    fn drift(&self, samples: &[Sample]) -> Vec<Anomaly> {
        let n = samples.len();
        let mid = n / 2;
        if mid == 0 || mid == n {
            return Vec::new();
        }
        let first_half: Vec<f64> = samples[..mid].iter().map(|s| s.value).collect();
        let second_half: Vec<f64> = samples[mid..].iter().map(|s| s.value).collect();
        let mu1 = stats::mean(&first_half);
        let mu2 = stats::mean(&second_half);
        if mu1 == 0.0 {
            return Vec::new();
        }
        let relative_shift = (mu2 - mu1).abs() / mu1;
        if relative_shift <= 0.3 {
            return Vec::new();
        }
        let severity = if relative_shift > 0.5 { Severity::High } else { Severity::Medium };
        vec![Anomaly {
            kind: AnomalyKind::Drift,
            severity,
            description: format!("mean shifted by {:.1}% between window halves", relative_shift * 100.0),
            detected_at: samples[n - 1].timestamp,
            observed_value: mu2,
            expected_value: mu1,
        }]
    }

    fn oscillation(&self, samples: &[Sample]) -> Vec<Anomaly> {
        let values: Vec<f64> = samples.iter().map(|s| s.value).collect();
        let diffs: Vec<f64> = values.windows(2).map(|w| w[1] - w[0]).collect();
        if diffs.len() < 2 {
            return Vec::new();
        }
        let mut sign_changes = 0usize;
        for pair in diffs.windows(2) {
            if pair[0] * pair[1] < 0.0 {
                sign_changes += 1;
            }
        }
        let change_rate = sign_changes as f64 / (diffs.len() - 1) as f64;
        let mean = stats::mean(&values);
        let sigma = stats::stddev(&values);
        if change_rate > 0.5 && sigma > 0.2 * mean {
            vec![Anomaly {
                kind: AnomalyKind::Oscillation,
                severity: Severity::Medium,
                description: format!("sign-change rate {change_rate:.2} with high relative variance"),
                detected_at: samples[samples.len() - 1].timestamp,
                observed_value: sigma,
                expected_value: mean,
            }]
        } else {
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn samples_from(values: &[f64]) -> Vec<Sample> {
        values
            .iter()
            .enumerate()
            .map(|(i, v)| Sample {
                timestamp: Utc.timestamp_opt(i as i64, 0).unwrap(),
                value: *v,
            })
            .collect()
    }

    #[test]
    fn spike_detection_flags_injected_outlier() {
        let detector = AnomalyDetector::new(AnomalyDetectorConfig::default());
        let samples = samples_from(&[100.0, 105.0, 102.0, 98.0, 103.0, 500.0, 101.0, 99.0, 104.0, 100.0, 102.0]);
        let anomalies = detector.detect(&samples);
        assert!(anomalies.iter().any(|a| matches!(a.kind, AnomalyKind::Spike) && a.observed_value == 500.0));
        let ratio_hit = anomalies
            .iter()
            .find(|a| matches!(a.kind, AnomalyKind::Spike) && a.observed_value == 500.0 && a.expected_value == 103.0);
        assert!(ratio_hit.is_some());
        assert!(matches!(ratio_hit.unwrap().severity, Severity::High));
    }

    #[test]
    fn strictly_monotone_series_emits_no_spike_drop_or_oscillation() {
        let detector = AnomalyDetector::new(AnomalyDetectorConfig::default());
        let values: Vec<f64> = (0..20).map(|i| 10.0 + i as f64).collect();
        let samples = samples_from(&values);
        let anomalies = detector.detect(&samples);
        assert!(!anomalies
            .iter()
            .any(|a| matches!(a.kind, AnomalyKind::Spike | AnomalyKind::Drop | AnomalyKind::Oscillation)));
    }

    #[test]
    fn fewer_than_min_samples_yields_empty_list() {
        let detector = AnomalyDetector::new(AnomalyDetectorConfig::default());
        let samples = samples_from(&[1.0, 2.0, 3.0]);
        assert!(detector.detect(&samples).is_empty());
    }
}
