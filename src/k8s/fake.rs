//! In-memory test double for `ClusterClient`, used by unit and integration
//! tests in place of a real cluster.

use async_trait::async_trait;
use std::sync::RwLock;

use super::{
    AutoscalerSample, AutoscalerSpec, ClusterClient, ClusterError, DeploymentSpec, NodeRef, PodRef,
    UsageSample,
};

#[derive(Default)]
pub struct FakeClusterClient {
    pub deployments: RwLock<Vec<DeploymentSpec>>,
    pub pods: RwLock<Vec<PodRef>>,
    pub nodes: RwLock<Vec<NodeRef>>,
    pub autoscalers: RwLock<Vec<AutoscalerSpec>>,
    pub node_usage: RwLock<Vec<UsageSample>>,
    pub pod_usage: RwLock<Vec<UsageSample>>,
    pub autoscaler_status: RwLock<Vec<AutoscalerSample>>,
    pub ping_ok: RwLock<bool>,
}

impl FakeClusterClient {
    pub fn new() -> Self {
        Self {
            ping_ok: RwLock::new(true),
            ..Default::default()
        }
    }

    pub fn with_deployment(self, d: DeploymentSpec) -> Self {
        self.deployments.write().unwrap().push(d);
        self
    }

    pub fn with_pod(self, p: PodRef) -> Self {
        self.pods.write().unwrap().push(p);
        self
    }

    pub fn with_autoscaler(self, a: AutoscalerSpec) -> Self {
        self.autoscalers.write().unwrap().push(a);
        self
    }

    pub fn set_ping_ok(&self, ok: bool) {
        *self.ping_ok.write().unwrap() = ok;
    }
}

#[async_trait]
impl ClusterClient for FakeClusterClient {
    async fn list_deployments(
        &self,
        namespace: Option<&str>,
    ) -> Result<Vec<DeploymentSpec>, ClusterError> {
        let items = self.deployments.read().unwrap().clone();
        Ok(match namespace {
            Some(ns) => items.into_iter().filter(|d| d.namespace == ns).collect(),
            None => items,
        })
    }

    async fn list_pods(&self, namespace: &str, _selector: &str) -> Result<Vec<PodRef>, ClusterError> {
        Ok(self
            .pods
            .read()
            .unwrap()
            .iter()
            .filter(|p| p.namespace == namespace)
            .cloned()
            .collect())
    }

    async fn list_nodes(&self) -> Result<Vec<NodeRef>, ClusterError> {
        Ok(self.nodes.read().unwrap().clone())
    }

    async fn list_autoscalers(
        &self,
        namespace: Option<&str>,
    ) -> Result<Vec<AutoscalerSpec>, ClusterError> {
        let items = self.autoscalers.read().unwrap().clone();
        Ok(match namespace {
            Some(ns) => items.into_iter().filter(|a| a.namespace == ns).collect(),
            None => items,
        })
    }

    async fn sample_node_usage(&self) -> Result<Vec<UsageSample>, ClusterError> {
        Ok(self.node_usage.read().unwrap().clone())
    }

    async fn sample_pod_usage(&self, _namespace: &str) -> Result<Vec<UsageSample>, ClusterError> {
        Ok(self.pod_usage.read().unwrap().clone())
    }

    async fn sample_autoscaler_status(
        &self,
        _namespace: &str,
    ) -> Result<Vec<AutoscalerSample>, ClusterError> {
        Ok(self.autoscaler_status.read().unwrap().clone())
    }

    async fn ping(&self) -> Result<(), ClusterError> {
        if *self.ping_ok.read().unwrap() {
            Ok(())
        } else {
            Err(ClusterError::Message("fake cluster unreachable".into()))
        }
    }
}
