//! Process configuration: environment variables with documented defaults,
//! overridable by a small CLI surface for local runs. A malformed or
//! missing knob degrades to the default and logs a warning; it never
//! aborts startup.

use clap::Parser;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub update_interval: Duration,
    pub namespaces: Vec<String>,
    pub collection_interval: Duration,
    pub retention_period: Duration,
    pub cleanup_interval: Duration,
    pub cpu_price_per_vcpu_hour: f64,
    pub memory_price_per_gib_hour: f64,
    pub anomaly_z_threshold: f64,
    pub spike_threshold: f64,
    pub drop_threshold: f64,
    pub min_samples: usize,
    pub trend_history_days: u64,
    pub kubeconfig: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            update_interval: Duration::from_secs(5),
            namespaces: vec!["default".to_string()],
            collection_interval: Duration::from_secs(15),
            retention_period: Duration::from_secs(24 * 3600),
            cleanup_interval: Duration::from_secs(3600),
            cpu_price_per_vcpu_hour: 0.03,
            memory_price_per_gib_hour: 0.004,
            anomaly_z_threshold: 3.0,
            spike_threshold: 2.0,
            drop_threshold: 0.5,
            min_samples: 10,
            trend_history_days: 7,
            kubeconfig: None,
        }
    }
}

/// Local/dev override surface, mirroring the teacher's `cli::Args` shape.
#[derive(Debug, Parser)]
#[command(name = "podwise-sidecar", about = "Kubernetes analytics sidecar")]
pub struct Args {
    #[arg(long)]
    pub port: Option<u16>,
    #[arg(long)]
    pub namespace: Option<String>,
    #[arg(long)]
    pub kubeconfig: Option<String>,
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

impl Config {
    /// Reads `PODWISE_*` env vars, falling back to defaults on anything
    /// missing or unparseable. Never fails.
    pub fn load() -> Self {
        let mut cfg = Self::default();

        if let Some(v) = env_u16("PODWISE_PORT") {
            cfg.port = v;
        }
        if let Some(v) = env_u64("PODWISE_UPDATE_INTERVAL_SECS") {
            cfg.update_interval = Duration::from_secs(v);
        }
        if let Ok(v) = std::env::var("PODWISE_NAMESPACES") {
            let namespaces: Vec<String> = v
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
            if namespaces.is_empty() {
                log::warn!("PODWISE_NAMESPACES set but empty; keeping default");
            } else {
                cfg.namespaces = namespaces;
            }
        }
        if let Some(v) = env_u64("PODWISE_COLLECTION_INTERVAL_SECS") {
            cfg.collection_interval = Duration::from_secs(v);
        }
        if let Some(v) = env_u64("PODWISE_RETENTION_HOURS") {
            cfg.retention_period = Duration::from_secs(v * 3600);
        }
        if let Some(v) = env_u64("PODWISE_CLEANUP_INTERVAL_SECS") {
            cfg.cleanup_interval = Duration::from_secs(v);
        }
        if let Some(v) = env_f64("PODWISE_CPU_PRICE_PER_VCPU_HOUR") {
            cfg.cpu_price_per_vcpu_hour = v;
        }
        if let Some(v) = env_f64("PODWISE_MEMORY_PRICE_PER_GIB_HOUR") {
            cfg.memory_price_per_gib_hour = v;
        }
        if let Some(v) = env_f64("PODWISE_ANOMALY_Z_THRESHOLD") {
            cfg.anomaly_z_threshold = v;
        }
        if let Some(v) = env_f64("PODWISE_SPIKE_THRESHOLD") {
            cfg.spike_threshold = v;
        }
        if let Some(v) = env_f64("PODWISE_DROP_THRESHOLD") {
            cfg.drop_threshold = v;
        }
        if let Some(v) = env_u64("PODWISE_MIN_SAMPLES") {
            cfg.min_samples = v as usize;
        }
        if let Some(v) = env_u64("PODWISE_TREND_HISTORY_DAYS") {
            cfg.trend_history_days = v;
        }
        if let Ok(v) = std::env::var("PODWISE_KUBECONFIG") {
            cfg.kubeconfig = Some(v);
        }

        cfg
    }

    /// Applies CLI overrides on top of the env-derived config, matching the
    /// precedence a local `--flag` run expects.
    pub fn apply_args(mut self, args: &Args) -> Self {
        if let Some(port) = args.port {
            self.port = port;
        }
        if let Some(ns) = &args.namespace {
            self.namespaces = vec![ns.clone()];
        }
        if let Some(kubeconfig) = &args.kubeconfig {
            self.kubeconfig = Some(kubeconfig.clone());
        }
        self
    }
}

fn env_u16(key: &str) -> Option<u16> {
    match std::env::var(key) {
        Ok(v) => match v.parse() {
            Ok(n) => Some(n),
            Err(_) => {
                log::warn!("{key}={v:?} is not a valid u16; using default");
                None
            }
        },
        Err(_) => None,
    }
}

fn env_u64(key: &str) -> Option<u64> {
    match std::env::var(key) {
        Ok(v) => match v.parse() {
            Ok(n) => Some(n),
            Err(_) => {
                log::warn!("{key}={v:?} is not a valid integer; using default");
                None
            }
        },
        Err(_) => None,
    }
}

fn env_f64(key: &str) -> Option<f64> {
    match std::env::var(key) {
        Ok(v) => match v.parse() {
            Ok(n) => Some(n),
            Err(_) => {
                log::warn!("{key}={v:?} is not a valid number; using default");
                None
            }
        },
        Err(_) => None,
    }
}
