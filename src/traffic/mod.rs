//! Derives request-rate/latency/error-rate proxies, cost breakdown, waste,
//! and a traffic-pattern classification for a service. No service mesh is
//! assumed; everything here is a documented proxy layer over CPU usage and
//! pod restarts, kept separate so a future real telemetry source could
//! replace only this module.

use serde::{Deserialize, Serialize};

use crate::anomaly::forecast::detect_seasonality;
use crate::recommend::CostModel;
use crate::stats;
use crate::store::{percentile, Sample};

const SPIKE_STDDEV_RATIO: f64 = 0.5;
const TREND_SLOPE_RATIO: f64 = 0.1;
const REQUEST_ESTIMATE_BUFFER: f64 = 1.3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrafficPattern {
    Spiking,
    Increasing,
    Declining,
    Periodic,
    Steady,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrafficAnalysis {
    pub namespace: String,
    pub service: String,
    pub request_rate_proxy: f64,
    pub error_rate_proxy: f64,
    pub p50_latency_ms_proxy: f64,
    pub p95_latency_ms_proxy: f64,
    pub p99_latency_ms_proxy: f64,
    pub pattern: TrafficPattern,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostBreakdown {
    pub namespace: String,
    pub service: String,
    pub monthly_cpu_cost: f64,
    pub monthly_memory_cost: f64,
    pub total_cost: f64,
    pub wasted_cost: f64,
    pub efficiency_score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WasteReport {
    pub namespace: String,
    pub service: String,
    pub waste_percent: f64,
}

pub struct TrafficAnalyzer {
    cost: CostModel,
}

impl TrafficAnalyzer {
    pub fn new(cost: CostModel) -> Self {
        Self { cost }
    }

    /// `cpu_samples` ascending by timestamp, values in millicores.
    pub fn analyze_traffic(&self, namespace: &str, service: &str, cpu_samples: &[Sample]) -> TrafficAnalysis {
        let values: Vec<f64> = cpu_samples.iter().map(|s| s.value).collect();
        let mean_cpu = stats::mean(&values);
        let request_rate_proxy = mean_cpu / 10.0;

        let mut drops = 0usize;
        let mut transitions = 0usize;
        for pair in values.windows(2) {
            transitions += 1;
            if pair[0] > 0.0 && (pair[1] / pair[0]) < 0.2 {
                drops += 1;
            }
        }
        let error_rate_proxy = if transitions > 0 {
            (drops as f64 / transitions as f64).min(1.0)
        } else {
            0.0
        };

        let mut sorted = values.clone();
        let p50 = percentile(&mut sorted, 50.0);
        let mut sorted95 = values.clone();
        let p95 = percentile(&mut sorted95, 95.0);
        let mut sorted99 = values.clone();
        let p99 = percentile(&mut sorted99, 99.0);

        let pattern = classify_pattern(&values);

        TrafficAnalysis {
            namespace: namespace.to_string(),
            service: service.to_string(),
            request_rate_proxy,
            error_rate_proxy,
            p50_latency_ms_proxy: p50 / 10.0,
            p95_latency_ms_proxy: p95 / 10.0,
            p99_latency_ms_proxy: p99 / 10.0,
            pattern,
        }
    }

    pub fn cost_breakdown(
        &self,
        namespace: &str,
        service: &str,
        cpu_p95: f64,
        memory_p95: f64,
        cpu_request: Option<f64>,
        memory_request: Option<f64>,
    ) -> CostBreakdown {
        let cpu_basis = cpu_request.unwrap_or(cpu_p95 * REQUEST_ESTIMATE_BUFFER);
        let memory_basis = memory_request.unwrap_or(memory_p95 * REQUEST_ESTIMATE_BUFFER);

        let monthly_cpu_cost = self.cost.monthly_cpu_cost(cpu_basis);
        let monthly_memory_cost = self.cost.monthly_memory_cost(memory_basis);
        let total_cost = monthly_cpu_cost + monthly_memory_cost;

        let wasted_cpu = (cpu_basis - cpu_p95).max(0.0);
        let wasted_memory = (memory_basis - memory_p95).max(0.0);
        let wasted_cost = self.cost.monthly_cpu_cost(wasted_cpu) + self.cost.monthly_memory_cost(wasted_memory);

        let efficiency_score = if total_cost > 0.0 {
            (100.0 - (wasted_cost / total_cost) * 100.0).clamp(0.0, 100.0)
        } else {
            100.0
        };

        CostBreakdown {
            namespace: namespace.to_string(),
            service: service.to_string(),
            monthly_cpu_cost,
            monthly_memory_cost,
            total_cost,
            wasted_cost,
            efficiency_score,
        }
    }

    pub fn waste(
        &self,
        namespace: &str,
        service: &str,
        cpu_p95: f64,
        memory_p95: f64,
        cpu_request: Option<f64>,
        memory_request: Option<f64>,
    ) -> WasteReport {
        let cpu_basis = cpu_request.unwrap_or(cpu_p95 * REQUEST_ESTIMATE_BUFFER);
        let memory_basis = memory_request.unwrap_or(memory_p95 * REQUEST_ESTIMATE_BUFFER);

        let requested_total = cpu_basis + memory_basis;
        let used_total = cpu_p95 + memory_p95;
        let waste_percent = if requested_total > 0.0 {
            ((requested_total - used_total) / requested_total * 100.0).max(0.0)
        } else {
            0.0
        };

        WasteReport {
            namespace: namespace.to_string(),
            service: service.to_string(),
            waste_percent,
        }
    }
}

fn classify_pattern(values: &[f64]) -> TrafficPattern {
    if values.len() < 2 {
        return TrafficPattern::Steady;
    }
    let mean = stats::mean(values);
    let stddev = stats::stddev(values);

    if stddev > SPIKE_STDDEV_RATIO * mean {
        return TrafficPattern::Spiking;
    }

    let xs: Vec<f64> = (0..values.len()).map(|i| i as f64).collect();
    let fit = stats::linear_regression(&xs, values);
    if fit.slope > TREND_SLOPE_RATIO * mean {
        return TrafficPattern::Increasing;
    }
    if fit.slope < -TREND_SLOPE_RATIO * mean {
        return TrafficPattern::Declining;
    }

    if detect_seasonality(values).is_some() {
        return TrafficPattern::Periodic;
    }

    TrafficPattern::Steady
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn steady_series_classifies_as_steady() {
        let values = vec![50.0; 20];
        assert!(matches!(classify_pattern(&values), TrafficPattern::Steady));
    }

    #[test]
    fn rising_series_classifies_as_increasing() {
        let values: Vec<f64> = (0..20).map(|i| 10.0 + i as f64 * 5.0).collect();
        assert!(matches!(classify_pattern(&values), TrafficPattern::Increasing));
    }

    #[test]
    fn request_rate_proxy_divides_mean_cpu_by_ten() {
        let analyzer = TrafficAnalyzer::new(CostModel::default());
        let samples: Vec<Sample> = (0..5)
            .map(|i| Sample {
                timestamp: chrono::Utc::now() + chrono::Duration::seconds(i),
                value: 100.0,
            })
            .collect();
        let analysis = analyzer.analyze_traffic("ns", "svc", &samples);
        assert!((analysis.request_rate_proxy - 10.0).abs() < 1e-9);
    }
}
