//! Top-level dependency bundle injected into the Sampler, Analyzer,
//! Engine, and HTTP router — no ambient globals.

use std::sync::{Arc, Mutex};
use std::time::Instant;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::analyzer::ResourceAnalyzer;
use crate::anomaly::{AnomalyDetector, AnomalyDetectorConfig};
use crate::broadcast::{EnvelopeKind, PushBroadcaster, PushEnvelope};
use crate::clock::Clock;
use crate::config::Config;
use crate::k8s::ClusterClient;
use crate::recommend::{CostModel, RecommendationEngine};
use crate::sampler::Sampler;
use crate::store::MetricsStore;
use crate::traffic::TrafficAnalyzer;

pub struct CoreHandle {
    pub store: Arc<MetricsStore>,
    pub cluster: Arc<dyn ClusterClient>,
    pub analyzer: Arc<ResourceAnalyzer>,
    pub recommendations: Arc<RecommendationEngine>,
    pub traffic: Arc<TrafficAnalyzer>,
    pub anomalies: Arc<AnomalyDetector>,
    pub broadcaster: Arc<PushBroadcaster>,
    pub sampler: Arc<Sampler>,
    pub clock: Arc<dyn Clock>,
    pub config: Config,
    pub started_at: Instant,
    broadcast_shutdown_tx: watch::Sender<bool>,
    broadcast_shutdown_rx: watch::Receiver<bool>,
    broadcast_task: Mutex<Option<JoinHandle<()>>>,
}

impl CoreHandle {
    pub fn new(config: Config, cluster: Arc<dyn ClusterClient>, clock: Arc<dyn Clock>) -> Self {
        let store = Arc::new(MetricsStore::new(clock.clone()));
        let analyzer = Arc::new(ResourceAnalyzer::new(store.clone(), cluster.clone(), config.min_samples));
        let cost_model = CostModel {
            cpu_price_per_vcpu_hour: config.cpu_price_per_vcpu_hour,
            memory_price_per_gib_hour: config.memory_price_per_gib_hour,
        };
        let recommendations = Arc::new(RecommendationEngine::new(cost_model));
        let traffic = Arc::new(TrafficAnalyzer::new(cost_model));
        let anomalies = Arc::new(AnomalyDetector::new(AnomalyDetectorConfig {
            z_threshold: config.anomaly_z_threshold,
            spike_threshold: config.spike_threshold,
            drop_threshold: config.drop_threshold,
            min_samples: config.min_samples,
        }));
        let broadcaster = Arc::new(PushBroadcaster::new(clock.clone()).with_broadcast_interval(config.update_interval));
        let sampler = Arc::new(Sampler::new(
            store.clone(),
            cluster.clone(),
            config.namespaces.clone(),
            config.collection_interval,
            config.cleanup_interval,
            chrono::Duration::from_std(config.retention_period).unwrap_or_else(|_| chrono::Duration::hours(24)),
        ));

        let (broadcast_shutdown_tx, broadcast_shutdown_rx) = watch::channel(false);

        Self {
            store,
            cluster,
            analyzer,
            recommendations,
            traffic,
            anomalies,
            broadcaster,
            sampler,
            clock,
            config,
            started_at: Instant::now(),
            broadcast_shutdown_tx,
            broadcast_shutdown_rx,
            broadcast_task: Mutex::new(None),
        }
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    /// Spawns the single cooperative broadcaster loop: one tick every
    /// `broadcaster.broadcast_interval()`, pushing a metrics, a
    /// recommendations, and a status snapshot to every subscriber.
    /// Mirrors the Sampler's start/stop shape (watch-based shutdown,
    /// awaited join on stop).
    pub fn start_broadcast_loop(self: &Arc<Self>) {
        let core = self.clone();
        let mut shutdown = self.broadcast_shutdown_rx.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(core.broadcaster.broadcast_interval());
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        core.broadcast_snapshot().await;
                    }
                    _ = shutdown.changed() => {
                        if *shutdown.borrow() {
                            log::info!("broadcast loop observed shutdown");
                            return;
                        }
                    }
                }
            }
        });
        *self.broadcast_task.lock().unwrap() = Some(handle);
    }

    pub async fn stop_broadcast_loop(&self) {
        let _ = self.broadcast_shutdown_tx.send(true);
        let handle = self.broadcast_task.lock().unwrap().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }

    async fn broadcast_snapshot(&self) {
        let now = self.broadcaster.now();

        let nodes = self.cluster.list_nodes().await.unwrap_or_else(|e| {
            log::warn!("broadcast: failed to list nodes: {e}");
            Vec::new()
        });
        let metrics_payload: Vec<serde_json::Value> = nodes
            .iter()
            .map(|n| {
                let resource_id = format!("node/{}", n.name);
                serde_json::json!({
                    "name": n.name,
                    "cpu_millicores": self.store.query(&resource_id, "cpu", chrono::Duration::hours(1)).last().map(|s| s.value),
                    "memory_bytes": self.store.query(&resource_id, "memory", chrono::Duration::hours(1)).last().map(|s| s.value),
                })
            })
            .collect();
        self.broadcaster.broadcast(PushEnvelope {
            kind: EnvelopeKind::MetricsUpdate,
            timestamp: now,
            payload: serde_json::json!(metrics_payload),
        });

        self.broadcaster.broadcast(PushEnvelope {
            kind: EnvelopeKind::RecommendationsUpdate,
            timestamp: now,
            payload: serde_json::json!(self.recommendations.all()),
        });

        self.broadcaster.broadcast(PushEnvelope {
            kind: EnvelopeKind::StatusUpdate,
            timestamp: now,
            payload: serde_json::json!({
                "uptime_secs": self.uptime_secs(),
                "sampler_running": self.sampler.is_running(),
            }),
        });
    }
}
