pub mod client;
pub mod fake;
pub mod quantity;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use client::{ClusterError, KubeClusterClient};
pub use fake::FakeClusterClient;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentSpec {
    pub namespace: String,
    pub name: String,
    pub selector: String,
    pub replicas: i32,
    pub cpu_request: i64,
    pub cpu_limit: i64,
    pub memory_request: i64,
    pub memory_limit: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PodRef {
    pub namespace: String,
    pub name: String,
    pub restart_count: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeRef {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutoscalerSpec {
    pub namespace: String,
    pub name: String,
    pub target_deployment: String,
    pub min_replicas: i32,
    pub max_replicas: i32,
    pub target_cpu_utilization: f64,
}

/// One live usage reading for a pod or node, in the Store's units
/// (millicores, bytes).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageSample {
    pub resource_id: String,
    pub cpu_millicores: f64,
    pub memory_bytes: f64,
    pub timestamp: DateTime<Utc>,
}

/// One live autoscaler status reading.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutoscalerSample {
    pub resource_id: String,
    pub current_replicas: i32,
    pub desired_replicas: i32,
    pub target_cpu_utilization: f64,
    pub current_cpu_utilization: f64,
    pub timestamp: DateTime<Utc>,
}

/// Abstraction over the orchestrator. Kept intentionally thin: exactly the
/// operations the analytics core needs, nothing the cluster API happens to
/// offer besides that.
#[async_trait]
pub trait ClusterClient: Send + Sync {
    async fn list_deployments(
        &self,
        namespace: Option<&str>,
    ) -> Result<Vec<DeploymentSpec>, ClusterError>;

    async fn list_pods(&self, namespace: &str, selector: &str) -> Result<Vec<PodRef>, ClusterError>;

    async fn list_nodes(&self) -> Result<Vec<NodeRef>, ClusterError>;

    async fn list_autoscalers(
        &self,
        namespace: Option<&str>,
    ) -> Result<Vec<AutoscalerSpec>, ClusterError>;

    async fn sample_node_usage(&self) -> Result<Vec<UsageSample>, ClusterError>;

    async fn sample_pod_usage(&self, namespace: &str) -> Result<Vec<UsageSample>, ClusterError>;

    async fn sample_autoscaler_status(
        &self,
        namespace: &str,
    ) -> Result<Vec<AutoscalerSample>, ClusterError>;

    /// Used by `/ready`: succeeds only if the cluster client can return a
    /// live sample.
    async fn ping(&self) -> Result<(), ClusterError>;
}
