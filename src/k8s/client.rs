//! Cluster client backed by a real Kubernetes API server, grounded on the
//! teacher's `K8sClient`: same `Api<T>` accessor shape, same metrics.k8s.io
//! raw-request pattern for node/pod usage.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use http::Request;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::autoscaling::v2::HorizontalPodAutoscaler;
use k8s_openapi::api::core::v1::{Node, Pod};
use kube::api::ListParams;
use kube::config::Kubeconfig;
use kube::{Api, Client, Config};
use serde::Deserialize;
use std::collections::HashMap;

use super::quantity::{parse_cpu_str, parse_memory_str};
use super::{AutoscalerSample, AutoscalerSpec, ClusterClient, DeploymentSpec, NodeRef, PodRef, UsageSample};

#[derive(Debug, thiserror::Error)]
pub enum ClusterError {
    #[error("{0}")]
    Message(String),
}

impl From<kube::Error> for ClusterError {
    fn from(e: kube::Error) -> Self {
        ClusterError::Message(e.to_string())
    }
}

fn infer_cluster_name() -> Option<String> {
    let kubeconfig = Kubeconfig::read().ok()?;
    let current = kubeconfig.current_context.as_ref()?;
    let named = kubeconfig.contexts.iter().find(|nc| nc.name == *current)?;
    let ctx = named.context.as_ref()?;
    Some(ctx.cluster.clone())
}

#[derive(Clone)]
pub struct KubeClusterClient {
    client: Client,
    cluster_name: Option<String>,
}

impl KubeClusterClient {
    pub async fn new(config_file: Option<&str>) -> anyhow::Result<Self> {
        if let Some(path) = config_file {
            std::env::set_var("KUBECONFIG", path);
        }
        let cluster_name = infer_cluster_name();
        let config = Config::infer().await?;
        let client = Client::try_from(config)?;
        Ok(Self { client, cluster_name })
    }

    pub fn cluster_name(&self) -> Option<&str> {
        self.cluster_name.as_deref()
    }

    fn deployments(&self, namespace: Option<&str>) -> Api<Deployment> {
        match namespace {
            Some(ns) => Api::namespaced(self.client.clone(), ns),
            None => Api::all(self.client.clone()),
        }
    }

    fn pods(&self, namespace: &str) -> Api<Pod> {
        Api::namespaced(self.client.clone(), namespace)
    }

    fn nodes(&self) -> Api<Node> {
        Api::all(self.client.clone())
    }

    fn autoscalers(&self, namespace: Option<&str>) -> Api<HorizontalPodAutoscaler> {
        match namespace {
            Some(ns) => Api::namespaced(self.client.clone(), ns),
            None => Api::all(self.client.clone()),
        }
    }
}

#[async_trait]
impl ClusterClient for KubeClusterClient {
    async fn list_deployments(
        &self,
        namespace: Option<&str>,
    ) -> Result<Vec<DeploymentSpec>, ClusterError> {
        let list = self.deployments(namespace).list(&ListParams::default()).await?;
        let mut out = Vec::with_capacity(list.items.len());
        for d in list.items {
            let name = d.metadata.name.clone().unwrap_or_default();
            let namespace = d.metadata.namespace.clone().unwrap_or_default();
            let spec = d.spec.unwrap_or_default();
            let selector = spec
                .selector
                .match_labels
                .unwrap_or_default()
                .into_iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect::<Vec<_>>()
                .join(",");
            let container = spec
                .template
                .spec
                .as_ref()
                .and_then(|ps| ps.containers.first());
            let (cpu_request, cpu_limit, memory_request, memory_limit) =
                container.map(extract_resources).unwrap_or((0, 0, 0, 0));
            out.push(DeploymentSpec {
                namespace,
                name,
                selector,
                replicas: spec.replicas.unwrap_or(0),
                cpu_request,
                cpu_limit,
                memory_request,
                memory_limit,
            });
        }
        Ok(out)
    }

    async fn list_pods(&self, namespace: &str, selector: &str) -> Result<Vec<PodRef>, ClusterError> {
        let params = if selector.is_empty() {
            ListParams::default()
        } else {
            ListParams::default().labels(selector)
        };
        let list = self.pods(namespace).list(&params).await?;
        Ok(list
            .items
            .into_iter()
            .map(|p| {
                let restart_count = p
                    .status
                    .as_ref()
                    .and_then(|s| s.container_statuses.as_ref())
                    .map(|statuses| statuses.iter().map(|c| c.restart_count).sum())
                    .unwrap_or(0);
                PodRef {
                    namespace: p.metadata.namespace.unwrap_or_default(),
                    name: p.metadata.name.unwrap_or_default(),
                    restart_count,
                }
            })
            .collect())
    }

    async fn list_nodes(&self) -> Result<Vec<NodeRef>, ClusterError> {
        let list = self.nodes().list(&ListParams::default()).await?;
        Ok(list
            .items
            .into_iter()
            .map(|n| NodeRef {
                name: n.metadata.name.unwrap_or_default(),
            })
            .collect())
    }

    async fn list_autoscalers(
        &self,
        namespace: Option<&str>,
    ) -> Result<Vec<AutoscalerSpec>, ClusterError> {
        let list = self
            .autoscalers(namespace)
            .list(&ListParams::default())
            .await?;
        Ok(list
            .items
            .into_iter()
            .map(|hpa| {
                let name = hpa.metadata.name.clone().unwrap_or_default();
                let namespace = hpa.metadata.namespace.clone().unwrap_or_default();
                let spec = hpa.spec.unwrap_or_default();
                let target_deployment = spec.scale_target_ref.name;
                let target_cpu_utilization = spec
                    .metrics
                    .unwrap_or_default()
                    .into_iter()
                    .find_map(|m| {
                        m.resource.and_then(|r| {
                            if r.name == "cpu" {
                                r.target.average_utilization.map(|v| v as f64)
                            } else {
                                None
                            }
                        })
                    })
                    .unwrap_or(80.0);
                AutoscalerSpec {
                    namespace,
                    name,
                    target_deployment,
                    min_replicas: spec.min_replicas.unwrap_or(1),
                    max_replicas: spec.max_replicas,
                    target_cpu_utilization,
                }
            })
            .collect())
    }

    async fn sample_node_usage(&self) -> Result<Vec<UsageSample>, ClusterError> {
        let req = Request::builder()
            .method("GET")
            .uri("/apis/metrics.k8s.io/v1beta1/nodes")
            .body(vec![])
            .map_err(|e| ClusterError::Message(format!("build request: {e}")))?;
        let list: NodeMetricsList = match self.client.request(req).await {
            Ok(l) => l,
            Err(e) => return Err(ClusterError::Message(e.to_string())),
        };
        Ok(list
            .items
            .into_iter()
            .map(|m| {
                let cpu = m.usage.get("cpu").map(|s| s.as_str()).unwrap_or("0");
                let memory = m.usage.get("memory").map(|s| s.as_str()).unwrap_or("0");
                UsageSample {
                    resource_id: format!("node/{}", m.metadata.name),
                    cpu_millicores: parse_cpu_str(cpu).unwrap_or(0) as f64,
                    memory_bytes: parse_memory_str(memory).unwrap_or(0) as f64,
                    timestamp: m.timestamp.unwrap_or_else(Utc::now),
                }
            })
            .collect())
    }

    async fn sample_pod_usage(&self, namespace: &str) -> Result<Vec<UsageSample>, ClusterError> {
        let uri = format!("/apis/metrics.k8s.io/v1beta1/namespaces/{namespace}/pods");
        let req = Request::builder()
            .method("GET")
            .uri(uri)
            .body(vec![])
            .map_err(|e| ClusterError::Message(format!("build request: {e}")))?;
        let list: PodMetricsList = match self.client.request(req).await {
            Ok(l) => l,
            Err(e) => return Err(ClusterError::Message(e.to_string())),
        };
        Ok(list
            .items
            .into_iter()
            .map(|pm| {
                let mut cpu_total = 0i64;
                let mut mem_total = 0i64;
                for c in &pm.containers {
                    let cpu = c.usage.get("cpu").map(|s| s.as_str()).unwrap_or("0");
                    let memory = c.usage.get("memory").map(|s| s.as_str()).unwrap_or("0");
                    cpu_total += parse_cpu_str(cpu).unwrap_or(0);
                    mem_total += parse_memory_str(memory).unwrap_or(0);
                }
                UsageSample {
                    resource_id: format!("pod/{}", pm.metadata.name),
                    cpu_millicores: cpu_total as f64,
                    memory_bytes: mem_total as f64,
                    timestamp: pm.timestamp.unwrap_or_else(Utc::now),
                }
            })
            .collect())
    }

    async fn sample_autoscaler_status(
        &self,
        namespace: &str,
    ) -> Result<Vec<AutoscalerSample>, ClusterError> {
        let list = self
            .autoscalers(Some(namespace))
            .list(&ListParams::default())
            .await?;
        let now = Utc::now();
        Ok(list
            .items
            .into_iter()
            .map(|hpa| {
                let name = hpa.metadata.name.clone().unwrap_or_default();
                let spec = hpa.spec.clone().unwrap_or_default();
                let status = hpa.status;
                let current_cpu = status
                    .current_metrics
                    .unwrap_or_default()
                    .into_iter()
                    .find_map(|m| {
                        m.resource.and_then(|r| {
                            if r.name == "cpu" {
                                r.current.average_utilization.map(|v| v as f64)
                            } else {
                                None
                            }
                        })
                    })
                    .unwrap_or(0.0);
                let target_cpu = spec
                    .metrics
                    .unwrap_or_default()
                    .into_iter()
                    .find_map(|m| {
                        m.resource.and_then(|r| {
                            if r.name == "cpu" {
                                r.target.average_utilization.map(|v| v as f64)
                            } else {
                                None
                            }
                        })
                    })
                    .unwrap_or(80.0);
                AutoscalerSample {
                    resource_id: format!("hpa/{name}"),
                    current_replicas: status.current_replicas.unwrap_or(0),
                    desired_replicas: status.desired_replicas,
                    target_cpu_utilization: target_cpu,
                    current_cpu_utilization: current_cpu,
                    timestamp: now,
                }
            })
            .collect())
    }

    async fn ping(&self) -> Result<(), ClusterError> {
        self.client.apiserver_version().await?;
        Ok(())
    }
}

fn extract_resources(
    container: &k8s_openapi::api::core::v1::Container,
) -> (i64, i64, i64, i64) {
    let resources = container.resources.clone().unwrap_or_default();
    let requests = resources.requests.unwrap_or_default();
    let limits = resources.limits.unwrap_or_default();
    let cpu_request = requests
        .get("cpu")
        .and_then(|q| parse_cpu_str(&q.0))
        .unwrap_or(0);
    let cpu_limit = limits
        .get("cpu")
        .and_then(|q| parse_cpu_str(&q.0))
        .unwrap_or(0);
    let memory_request = requests
        .get("memory")
        .and_then(|q| parse_memory_str(&q.0))
        .unwrap_or(0);
    let memory_limit = limits
        .get("memory")
        .and_then(|q| parse_memory_str(&q.0))
        .unwrap_or(0);
    (cpu_request, cpu_limit, memory_request, memory_limit)
}

#[derive(Deserialize)]
struct NodeMetricsList {
    items: Vec<NodeMetrics>,
}

#[derive(Deserialize)]
struct NodeMetrics {
    metadata: NodeMetricsMeta,
    #[serde(default)]
    timestamp: Option<DateTime<Utc>>,
    usage: HashMap<String, String>,
}

#[derive(Deserialize)]
struct NodeMetricsMeta {
    name: String,
}

#[derive(Deserialize)]
struct PodMetricsList {
    items: Vec<PodMetrics>,
}

#[derive(Deserialize)]
struct PodMetrics {
    metadata: PodMetricsMeta,
    #[serde(default)]
    timestamp: Option<DateTime<Utc>>,
    containers: Vec<ContainerMetrics>,
}

#[derive(Deserialize)]
struct PodMetricsMeta {
    name: String,
}

#[derive(Deserialize)]
struct ContainerMetrics {
    usage: HashMap<String, String>,
}
