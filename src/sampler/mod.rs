//! Periodic driver that pulls one usage sample per pod/node/autoscaler
//! from the cluster client and appends it to the Store. Grounded on the
//! teacher's node-inspection polling idiom (cooperative tasks, tick
//! logging) but driven by `tokio::time::interval` rather than a one-shot
//! deadline loop, since the Sampler runs for the life of the process.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::k8s::ClusterClient;
use crate::store::MetricsStore;

#[derive(Debug, thiserror::Error)]
pub enum SamplerError {
    #[error("sampler already running")]
    AlreadyRunning,
}

pub struct Sampler {
    store: Arc<MetricsStore>,
    cluster: Arc<dyn ClusterClient>,
    namespaces: Vec<String>,
    collection_interval: Duration,
    sweep_interval: Duration,
    retention: chrono::Duration,
    running: AtomicBool,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
    tasks: std::sync::Mutex<Vec<JoinHandle<()>>>,
}

impl Sampler {
    pub fn new(
        store: Arc<MetricsStore>,
        cluster: Arc<dyn ClusterClient>,
        namespaces: Vec<String>,
        collection_interval: Duration,
        sweep_interval: Duration,
        retention: chrono::Duration,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        Self {
            store,
            cluster,
            namespaces,
            collection_interval,
            sweep_interval,
            retention,
            running: AtomicBool::new(false),
            shutdown_tx,
            shutdown_rx,
            tasks: std::sync::Mutex::new(Vec::new()),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Spawns the collection and sweep tasks. Idempotent-guarded: a second
    /// call while already running fails with `AlreadyRunning`.
    pub fn start(self: &Arc<Self>) -> Result<(), SamplerError> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(SamplerError::AlreadyRunning);
        }

        let collect_handle = tokio::spawn(Self::collection_loop(self.clone()));
        let sweep_handle = tokio::spawn(Self::sweep_loop(self.clone()));
        *self.tasks.lock().unwrap() = vec![collect_handle, sweep_handle];
        Ok(())
    }

    /// Cancels both tasks and returns only once both have observed
    /// cancellation.
    pub async fn stop(&self) {
        let _ = self.shutdown_tx.send(true);
        let handles: Vec<JoinHandle<()>> = std::mem::take(&mut *self.tasks.lock().unwrap());
        for handle in handles {
            let _ = handle.await;
        }
        self.running.store(false, Ordering::SeqCst);
    }

    async fn collection_loop(self_arc: Arc<Self>) {
        let mut ticker = tokio::time::interval(self_arc.collection_interval);
        let mut shutdown = self_arc.shutdown_rx.clone();
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self_arc.collect_once().await;
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        log::info!("sampler collection loop observed shutdown");
                        return;
                    }
                }
            }
        }
    }

    async fn sweep_loop(self_arc: Arc<Self>) {
        let mut ticker = tokio::time::interval(self_arc.sweep_interval);
        let mut shutdown = self_arc.shutdown_rx.clone();
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let removed = self_arc.store.sweep(self_arc.retention);
                    log::debug!("retention sweep removed {removed} samples");
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        log::info!("sampler sweep loop observed shutdown");
                        return;
                    }
                }
            }
        }
    }

    async fn collect_once(&self) {
        match self.cluster.sample_node_usage().await {
            Ok(samples) => {
                for s in samples {
                    self.store.store(&s.resource_id, "cpu", s.cpu_millicores, s.timestamp);
                    self.store.store(&s.resource_id, "memory", s.memory_bytes, s.timestamp);
                }
            }
            Err(e) => log::warn!("node usage collection failed: {e}"),
        }

        for ns in &self.namespaces {
            match self.cluster.sample_pod_usage(ns).await {
                Ok(samples) => {
                    for s in samples {
                        self.store.store(&s.resource_id, "cpu", s.cpu_millicores, s.timestamp);
                        self.store.store(&s.resource_id, "memory", s.memory_bytes, s.timestamp);
                    }
                }
                Err(e) => log::warn!("pod usage collection failed for namespace {ns}: {e}"),
            }

            match self.cluster.sample_autoscaler_status(ns).await {
                Ok(samples) => {
                    for s in samples {
                        self.store
                            .store(&s.resource_id, "current_replicas", s.current_replicas as f64, s.timestamp);
                        self.store
                            .store(&s.resource_id, "desired_replicas", s.desired_replicas as f64, s.timestamp);
                        self.store
                            .store(&s.resource_id, "target_cpu", s.target_cpu_utilization, s.timestamp);
                        self.store
                            .store(&s.resource_id, "current_cpu", s.current_cpu_utilization, s.timestamp);
                    }
                }
                Err(e) => log::warn!("autoscaler sampling failed for namespace {ns}: {e}"),
            }
        }
    }
}
