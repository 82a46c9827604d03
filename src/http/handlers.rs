use std::sync::Arc;

use axum::extract::{Path, Query, State};
use serde::Serialize;
use serde_json::json;

use crate::core::CoreHandle;
use crate::error::AppError;
use crate::store::Sample;

use super::duration::parse_iso8601_duration;
use super::envelope::Envelope;

pub type AppState = State<Arc<CoreHandle>>;

fn default_duration(literal: Option<&str>, default: chrono::Duration) -> Result<chrono::Duration, AppError> {
    match literal {
        None => Ok(default),
        Some(s) => parse_iso8601_duration(s)
            .ok_or_else(|| AppError::InvalidParams(format!("unparseable duration literal: {s}"))),
    }
}

pub async fn health() -> Envelope<serde_json::Value> {
    Envelope::ok(json!({ "status": "ok" }))
}

pub async fn ready(State(core): AppState) -> Result<Envelope<serde_json::Value>, AppError> {
    core.cluster
        .ping()
        .await
        .map_err(|e| AppError::NotReady(e.to_string()))?;
    Ok(Envelope::ok(json!({ "ready": true })))
}

#[derive(Serialize)]
pub struct StatusResponse {
    version: &'static str,
    uptime_secs: u64,
    sampler_running: bool,
}

pub async fn status(State(core): AppState) -> Envelope<StatusResponse> {
    Envelope::ok(StatusResponse {
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: core.uptime_secs(),
        sampler_running: core.sampler.is_running(),
    })
}

#[derive(Serialize)]
pub struct ClusterOverview {
    node_count: usize,
    pod_count: usize,
    namespaces: Vec<String>,
    total_cpu_millicores: f64,
    total_memory_bytes: f64,
}

pub async fn cluster_overview(State(core): AppState) -> Result<Envelope<ClusterOverview>, AppError> {
    let nodes = core.cluster.list_nodes().await?;
    let mut pod_count = 0usize;
    for ns in &core.config.namespaces {
        pod_count += core.cluster.list_pods(ns, "").await?.len();
    }

    let mut total_cpu = 0.0;
    let mut total_memory = 0.0;
    for node in &nodes {
        let resource_id = format!("node/{}", node.name);
        if let Some(last) = latest_sample(&core, &resource_id, "cpu") {
            total_cpu += last.value;
        }
        if let Some(last) = latest_sample(&core, &resource_id, "memory") {
            total_memory += last.value;
        }
    }

    Ok(Envelope::ok(ClusterOverview {
        node_count: nodes.len(),
        pod_count,
        namespaces: core.config.namespaces.clone(),
        total_cpu_millicores: total_cpu,
        total_memory_bytes: total_memory,
    }))
}

fn latest_sample(core: &CoreHandle, resource_id: &str, metric: &str) -> Option<Sample> {
    core.store
        .query(resource_id, metric, chrono::Duration::hours(24))
        .into_iter()
        .last()
}

/// Resolves a Deployment's selector and lists its member pods. The store is
/// keyed by each pod's own Kubernetes-generated name, never the deployment
/// name, so callers must enumerate pods before querying per-pod series.
async fn member_pods(core: &CoreHandle, namespace: &str, deployment: &str) -> Result<Vec<crate::k8s::PodRef>, AppError> {
    let deployments = core.cluster.list_deployments(Some(namespace)).await?;
    let spec = deployments
        .into_iter()
        .find(|d| d.name == deployment)
        .ok_or_else(|| AppError::NotFound(format!("{namespace}/{deployment}")))?;
    Ok(core.cluster.list_pods(namespace, &spec.selector).await?)
}

fn pod_cpu_samples(core: &CoreHandle, pods: &[crate::k8s::PodRef], duration: chrono::Duration) -> Vec<Sample> {
    let mut values = Vec::new();
    for pod in pods {
        values.extend(core.store.query(&format!("pod/{}", pod.name), "cpu", duration));
    }
    values
}

#[derive(Serialize)]
pub struct ServiceSummary {
    namespace: String,
    deployment: String,
    replicas: i32,
    overall_score: f64,
    cpu_utilization: f64,
    memory_utilization: f64,
}

pub async fn list_services(State(core): AppState) -> Result<Envelope<Vec<ServiceSummary>>, AppError> {
    let mut summaries = Vec::new();
    for ns in &core.config.namespaces {
        let deployments = core.cluster.list_deployments(Some(ns)).await?;
        for d in deployments {
            match core.analyzer.analyze(&d.namespace, &d.name).await {
                Ok(record) => summaries.push(ServiceSummary {
                    namespace: record.namespace.clone(),
                    deployment: record.deployment.clone(),
                    replicas: record.replicas,
                    overall_score: record.overall_score,
                    cpu_utilization: record.cpu_utilization(),
                    memory_utilization: record.memory_utilization(),
                }),
                Err(crate::analyzer::AnalyzerError::InsufficientData) => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }
    Ok(Envelope::ok(summaries))
}

#[derive(Serialize)]
pub struct ServiceDetail {
    analysis: crate::analyzer::AnalysisRecord,
    traffic: crate::traffic::TrafficAnalysis,
    cost: crate::traffic::CostBreakdown,
    member_pods: Vec<crate::k8s::PodRef>,
}

pub async fn service_detail(
    State(core): AppState,
    Path((namespace, name)): Path<(String, String)>,
) -> Result<Envelope<ServiceDetail>, AppError> {
    let analysis = core.analyzer.analyze(&namespace, &name).await?;
    let member_pods = member_pods(&core, &namespace, &name).await?;
    let cpu_values = pod_cpu_samples(&core, &member_pods, chrono::Duration::days(1));
    let traffic = core.traffic.analyze_traffic(&namespace, &name, &cpu_values);
    let cost = core.traffic.cost_breakdown(
        &namespace,
        &name,
        analysis.cpu_p95,
        analysis.memory_p95,
        Some(analysis.cpu_request as f64),
        Some(analysis.memory_request as f64),
    );

    Ok(Envelope::ok(ServiceDetail {
        analysis,
        traffic,
        cost,
        member_pods,
    }))
}

pub async fn latest_node_metrics(State(core): AppState) -> Result<Envelope<Vec<serde_json::Value>>, AppError> {
    let nodes = core.cluster.list_nodes().await?;
    let out = nodes
        .into_iter()
        .map(|n| {
            let resource_id = format!("node/{}", n.name);
            json!({
                "name": n.name,
                "cpu_millicores": latest_sample(&core, &resource_id, "cpu").map(|s| s.value),
                "memory_bytes": latest_sample(&core, &resource_id, "memory").map(|s| s.value),
            })
        })
        .collect();
    Ok(Envelope::ok(out))
}

pub async fn latest_pod_metrics(
    State(core): AppState,
    Path(namespace): Path<String>,
) -> Result<Envelope<Vec<serde_json::Value>>, AppError> {
    let pods = core.cluster.list_pods(&namespace, "").await?;
    let out = pods
        .into_iter()
        .map(|p| {
            let resource_id = format!("pod/{}", p.name);
            json!({
                "name": p.name,
                "cpu_millicores": latest_sample(&core, &resource_id, "cpu").map(|s| s.value),
                "memory_bytes": latest_sample(&core, &resource_id, "memory").map(|s| s.value),
            })
        })
        .collect();
    Ok(Envelope::ok(out))
}

#[derive(serde::Deserialize)]
pub struct TimeseriesParams {
    resource: String,
    metric: String,
    duration: Option<String>,
}

pub async fn timeseries(
    State(core): AppState,
    Query(params): Query<TimeseriesParams>,
) -> Result<Envelope<Vec<Sample>>, AppError> {
    let duration = default_duration(params.duration.as_deref(), chrono::Duration::hours(1))?;
    Ok(Envelope::ok(core.store.query(&params.resource, &params.metric, duration)))
}

pub async fn latest_hpa_metrics(
    State(core): AppState,
    Path(namespace): Path<String>,
) -> Result<Envelope<Vec<crate::k8s::AutoscalerSample>>, AppError> {
    Ok(Envelope::ok(core.cluster.sample_autoscaler_status(&namespace).await?))
}

pub async fn list_recommendations(State(core): AppState) -> Envelope<Vec<crate::recommend::Recommendation>> {
    Envelope::ok(core.recommendations.all())
}

pub async fn get_recommendation(
    State(core): AppState,
    Path(id): Path<String>,
) -> Result<Envelope<crate::recommend::Recommendation>, AppError> {
    core.recommendations
        .get(&id)
        .map(Envelope::ok)
        .ok_or_else(|| AppError::NotFound(id))
}

pub async fn apply_recommendation(Path(_id): Path<String>) -> AppError {
    AppError::NotImplemented
}

pub async fn analysis(
    State(core): AppState,
    Path((namespace, service)): Path<(String, String)>,
) -> Result<Envelope<crate::analyzer::AnalysisRecord>, AppError> {
    Ok(Envelope::ok(core.analyzer.analyze(&namespace, &service).await?))
}

#[derive(serde::Deserialize)]
pub struct DurationParam {
    duration: Option<String>,
}

pub async fn traffic(
    State(core): AppState,
    Path((namespace, service)): Path<(String, String)>,
    Query(params): Query<DurationParam>,
) -> Result<Envelope<crate::traffic::TrafficAnalysis>, AppError> {
    let duration = default_duration(params.duration.as_deref(), chrono::Duration::hours(24))?;
    let pods = member_pods(&core, &namespace, &service).await?;
    let samples = pod_cpu_samples(&core, &pods, duration);
    Ok(Envelope::ok(core.traffic.analyze_traffic(&namespace, &service, &samples)))
}

pub async fn cost(
    State(core): AppState,
    Path((namespace, service)): Path<(String, String)>,
) -> Result<Envelope<crate::traffic::CostBreakdown>, AppError> {
    let analysis = match core.analyzer.analyze(&namespace, &service).await {
        Ok(analysis) => analysis,
        Err(crate::analyzer::AnalyzerError::InsufficientData) => {
            return Ok(Envelope::ok(crate::traffic::CostBreakdown {
                namespace,
                service,
                monthly_cpu_cost: 0.0,
                monthly_memory_cost: 0.0,
                total_cost: 0.0,
                wasted_cost: 0.0,
                efficiency_score: 0.0,
            }));
        }
        Err(e) => return Err(e.into()),
    };
    Ok(Envelope::ok(core.traffic.cost_breakdown(
        &namespace,
        &service,
        analysis.cpu_p95,
        analysis.memory_p95,
        Some(analysis.cpu_request as f64),
        Some(analysis.memory_request as f64),
    )))
}

#[derive(serde::Deserialize)]
pub struct AnomalyParams {
    resource: String,
    metric: Option<String>,
    duration: Option<String>,
}

pub async fn anomalies(
    State(core): AppState,
    Query(params): Query<AnomalyParams>,
) -> Result<Envelope<Vec<crate::anomaly::Anomaly>>, AppError> {
    let duration = default_duration(params.duration.as_deref(), chrono::Duration::hours(24))?;
    let metric = params.metric.as_deref().unwrap_or("cpu");
    let samples = core.store.query(&params.resource, metric, duration);
    Ok(Envelope::ok(core.anomalies.detect(&samples)))
}

