//! Joins deployment spec (requests/limits, replicas, autoscaler config)
//! with Store history to produce a per-deployment analysis record.
//! Grounded on the teacher's `ResourceInspector` procedural shape
//! (aggregate-then-summarize), carrying the utilization/stability/
//! cost-efficiency formulas instead of the teacher's check-list scoring.

pub mod scoring;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use crate::k8s::{ClusterClient, ClusterError};
use crate::stats;
use crate::store::MetricsStore;
use scoring::ScoringEngine;

const DEFAULT_ANALYSIS_WINDOW_DAYS: i64 = 7;
const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(30);

const THETA_OVER: f64 = 0.5;
const THETA_UNDER: f64 = 0.8;
const CEILING_FRACTION: f64 = 0.1;
const IDLE_FRACTION: f64 = 0.8;
const MISTUNE_DELTA_PP: f64 = 20.0;
const MISTUNE_EVENTS_PER_DAY: f64 = 24.0;

#[derive(Debug, thiserror::Error)]
pub enum AnalyzerError {
    #[error("insufficient data")]
    InsufficientData,
    #[error("cluster error: {0}")]
    Cluster(#[from] ClusterError),
    #[error("deployment not found: {0}")]
    NotFound(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutoscalerInfo {
    pub min_replicas: i32,
    pub max_replicas: i32,
    pub target_cpu_utilization: f64,
    pub current_cpu_utilization: f64,
    pub scaling_events_per_day: f64,
    pub fraction_at_max: f64,
    pub fraction_at_min: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRecord {
    pub namespace: String,
    pub deployment: String,
    pub generated_at: DateTime<Utc>,

    pub cpu_request: i64,
    pub cpu_limit: i64,
    pub memory_request: i64,
    pub memory_limit: i64,
    pub replicas: i32,
    pub restart_count: i32,

    pub cpu_p50: f64,
    pub cpu_p95: f64,
    pub cpu_p99: f64,
    pub cpu_avg: f64,
    pub cpu_max: f64,
    pub cpu_variance: f64,

    pub memory_p50: f64,
    pub memory_p95: f64,
    pub memory_p99: f64,
    pub memory_avg: f64,
    pub memory_max: f64,
    pub memory_variance: f64,

    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub autoscaler: Option<AutoscalerInfo>,

    pub cpu_over_provisioned: bool,
    pub cpu_under_provisioned: bool,
    pub memory_over_provisioned: bool,
    pub memory_under_provisioned: bool,
    pub autoscaler_hits_ceiling: bool,
    pub autoscaler_idle_at_min: bool,
    pub autoscaler_mistuned: bool,

    pub utilization_score: f64,
    pub stability_score: f64,
    pub cost_efficiency_score: f64,
    pub overall_score: f64,
}

impl AnalysisRecord {
    pub fn cpu_utilization(&self) -> f64 {
        if self.cpu_request > 0 {
            self.cpu_p95 / self.cpu_request as f64
        } else {
            0.0
        }
    }

    pub fn memory_utilization(&self) -> f64 {
        if self.memory_request > 0 {
            self.memory_p95 / self.memory_request as f64
        } else {
            0.0
        }
    }
}

pub struct ResourceAnalyzer {
    store: Arc<MetricsStore>,
    cluster: Arc<dyn ClusterClient>,
    min_samples: usize,
    analysis_window: chrono::Duration,
    cache: RwLock<HashMap<(String, String), (Instant, AnalysisRecord)>>,
    cache_ttl: Duration,
}

impl ResourceAnalyzer {
    pub fn new(store: Arc<MetricsStore>, cluster: Arc<dyn ClusterClient>, min_samples: usize) -> Self {
        Self {
            store,
            cluster,
            min_samples,
            analysis_window: chrono::Duration::days(DEFAULT_ANALYSIS_WINDOW_DAYS),
            cache: RwLock::new(HashMap::new()),
            cache_ttl: DEFAULT_CACHE_TTL,
        }
    }

    pub fn with_min_samples(mut self, n: usize) -> Self {
        self.min_samples = n.max(1);
        self
    }

    pub async fn analyze(&self, namespace: &str, deployment: &str) -> Result<AnalysisRecord, AnalyzerError> {
        let key = (namespace.to_string(), deployment.to_string());
        if let Some((fetched_at, record)) = self.cache.read().unwrap().get(&key) {
            if fetched_at.elapsed() < self.cache_ttl {
                return Ok(record.clone());
            }
        }

        let record = self.analyze_uncached(namespace, deployment).await?;
        self.cache
            .write()
            .unwrap()
            .insert(key, (Instant::now(), record.clone()));
        Ok(record)
    }

    async fn analyze_uncached(
        &self,
        namespace: &str,
        deployment: &str,
    ) -> Result<AnalysisRecord, AnalyzerError> {
        let deployments = self.cluster.list_deployments(Some(namespace)).await?;
        let spec = deployments
            .into_iter()
            .find(|d| d.name == deployment)
            .ok_or_else(|| AnalyzerError::NotFound(format!("{namespace}/{deployment}")))?;

        let pods = self.cluster.list_pods(namespace, &spec.selector).await?;
        let restart_count: i32 = pods.iter().map(|p| p.restart_count).sum();

        let mut cpu_values = Vec::new();
        let mut memory_values = Vec::new();
        for pod in &pods {
            let resource_id = format!("pod/{}", pod.name);
            cpu_values.extend(
                self.store
                    .query(&resource_id, "cpu", self.analysis_window)
                    .into_iter()
                    .map(|s| s.value),
            );
            memory_values.extend(
                self.store
                    .query(&resource_id, "memory", self.analysis_window)
                    .into_iter()
                    .map(|s| s.value),
            );
        }

        if cpu_values.len() < self.min_samples || memory_values.len() < self.min_samples {
            return Err(AnalyzerError::InsufficientData);
        }

        let cpu_pct = percentiles_of(&mut cpu_values.clone());
        let memory_pct = percentiles_of(&mut memory_values.clone());

        let autoscalers = self.cluster.list_autoscalers(Some(namespace)).await?;
        let autoscaler_spec = autoscalers.into_iter().find(|a| a.target_deployment == deployment);

        let autoscaler = match &autoscaler_spec {
            Some(a) => Some(self.build_autoscaler_info(namespace, a).await),
            None => None,
        };

        let cpu_over_provisioned =
            spec.cpu_request > 0 && (cpu_pct.p95 / spec.cpu_request as f64) < THETA_OVER;
        let cpu_under_provisioned =
            spec.cpu_limit > 0 && (cpu_pct.p95 / spec.cpu_limit as f64) > THETA_UNDER;
        let memory_over_provisioned =
            spec.memory_request > 0 && (memory_pct.p95 / spec.memory_request as f64) < THETA_OVER;
        let memory_under_provisioned =
            spec.memory_limit > 0 && (memory_pct.p95 / spec.memory_limit as f64) > THETA_UNDER;

        let autoscaler_hits_ceiling = autoscaler.as_ref().map(|a| a.fraction_at_max > CEILING_FRACTION).unwrap_or(false);
        let autoscaler_idle_at_min = autoscaler.as_ref().map(|a| a.fraction_at_min > IDLE_FRACTION).unwrap_or(false);
        let autoscaler_mistuned = autoscaler
            .as_ref()
            .map(|a| {
                (a.current_cpu_utilization - a.target_cpu_utilization).abs() > MISTUNE_DELTA_PP
                    || a.scaling_events_per_day > MISTUNE_EVENTS_PER_DAY
            })
            .unwrap_or(false);

        let cpu_variance = stats::variance(&cpu_values);
        let memory_variance = stats::variance(&memory_values);

        let cpu_utilization = if spec.cpu_request > 0 {
            cpu_pct.p95 / spec.cpu_request as f64
        } else {
            0.0
        };
        let memory_utilization = if spec.memory_request > 0 {
            memory_pct.p95 / spec.memory_request as f64
        } else {
            0.0
        };

        let utilization_score = ScoringEngine::deployment_utilization_score(cpu_utilization, memory_utilization);
        let stability_score = ScoringEngine::stability_score(
            restart_count,
            cpu_variance,
            memory_variance,
            autoscaler.as_ref().map(|a| a.scaling_events_per_day),
        );
        let cost_efficiency_score = ScoringEngine::cost_efficiency_score(&[
            (cpu_over_provisioned, cpu_utilization),
            (memory_over_provisioned, memory_utilization),
        ]);
        let overall_score = ScoringEngine::overall_score(utilization_score, stability_score, cost_efficiency_score);

        Ok(AnalysisRecord {
            namespace: namespace.to_string(),
            deployment: deployment.to_string(),
            generated_at: Utc::now(),
            cpu_request: spec.cpu_request,
            cpu_limit: spec.cpu_limit,
            memory_request: spec.memory_request,
            memory_limit: spec.memory_limit,
            replicas: spec.replicas,
            restart_count,
            cpu_p50: cpu_pct.p50,
            cpu_p95: cpu_pct.p95,
            cpu_p99: cpu_pct.p99,
            cpu_avg: stats::mean(&cpu_values),
            cpu_max: stats::max(&cpu_values),
            cpu_variance,
            memory_p50: memory_pct.p50,
            memory_p95: memory_pct.p95,
            memory_p99: memory_pct.p99,
            memory_avg: stats::mean(&memory_values),
            memory_max: stats::max(&memory_values),
            memory_variance,
            autoscaler,
            cpu_over_provisioned,
            cpu_under_provisioned,
            memory_over_provisioned,
            memory_under_provisioned,
            autoscaler_hits_ceiling,
            autoscaler_idle_at_min,
            autoscaler_mistuned,
            utilization_score,
            stability_score,
            cost_efficiency_score,
            overall_score,
        })
    }

    async fn build_autoscaler_info(
        &self,
        namespace: &str,
        spec: &crate::k8s::AutoscalerSpec,
    ) -> AutoscalerInfo {
        let resource_id = format!("hpa/{}", spec.name);
        let replica_samples = self.store.query(&resource_id, "current_replicas", self.analysis_window);
        let total = replica_samples.len().max(1) as f64;
        let at_max = replica_samples
            .iter()
            .filter(|s| s.value as i32 == spec.max_replicas)
            .count() as f64;
        let at_min = replica_samples
            .iter()
            .filter(|s| s.value as i32 == spec.min_replicas)
            .count() as f64;

        let mut scaling_events = 0usize;
        for window in replica_samples.windows(2) {
            if window[0].value != window[1].value {
                scaling_events += 1;
            }
        }
        let window_days = (self.analysis_window.num_seconds() as f64 / 86_400.0).max(1.0 / 24.0);
        let scaling_events_per_day = scaling_events as f64 / window_days;

        let current_cpu = self
            .store
            .query(&resource_id, "current_cpu", self.analysis_window)
            .last()
            .map(|s| s.value)
            .unwrap_or(0.0);

        let _ = namespace;
        AutoscalerInfo {
            min_replicas: spec.min_replicas,
            max_replicas: spec.max_replicas,
            target_cpu_utilization: spec.target_cpu_utilization,
            current_cpu_utilization: current_cpu,
            scaling_events_per_day,
            fraction_at_max: at_max / total,
            fraction_at_min: at_min / total,
        }
    }
}

struct PercentileTriple {
    p50: f64,
    p95: f64,
    p99: f64,
}

fn percentiles_of(values: &mut [f64]) -> PercentileTriple {
    PercentileTriple {
        p50: crate::store::percentile(values, 50.0),
        p95: crate::store::percentile(values, 95.0),
        p99: crate::store::percentile(values, 99.0),
    }
}

