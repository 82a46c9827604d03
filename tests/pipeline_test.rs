//! Drives the Store → Resource Analyzer → Recommendation Engine pipeline
//! end to end through a `FakeClusterClient`-backed `CoreHandle`, with a
//! `ManualClock` standing in for wall-clock time so the analysis window is
//! deterministic.

use chrono::{TimeZone, Utc};

use podwise::clock::ManualClock;
use podwise::config::Config;
use podwise::core::CoreHandle;
use podwise::k8s::{DeploymentSpec, FakeClusterClient, PodRef};
use podwise::recommend::RecommendationKind;
use std::sync::Arc;

#[tokio::test]
async fn analyze_then_recommend_right_sizes_an_over_provisioned_deployment() {
    let now = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
    let clock = Arc::new(ManualClock::new(now));

    let cluster = Arc::new(
        FakeClusterClient::new()
            .with_deployment(DeploymentSpec {
                namespace: "ns".into(),
                name: "svc".into(),
                selector: "app=svc".into(),
                replicas: 2,
                cpu_request: 1000,
                cpu_limit: 2000,
                memory_request: 512 * 1024 * 1024,
                memory_limit: 1024 * 1024 * 1024,
            })
            .with_pod(PodRef {
                namespace: "ns".into(),
                name: "svc-abc123".into(),
                restart_count: 0,
            }),
    );

    let config = Config::default();
    let core = Arc::new(CoreHandle::new(config, cluster, clock));

    for i in 0..12i64 {
        let ts = now - chrono::Duration::minutes(i);
        core.store.store("pod/svc-abc123", "cpu", 400.0, ts);
        core.store.store("pod/svc-abc123", "memory", 200.0 * 1024.0 * 1024.0, ts);
    }

    let analysis = core.analyzer.analyze("ns", "svc").await.expect("analysis should succeed with enough samples");
    assert!((analysis.cpu_p95 - 400.0).abs() < 1e-6);
    assert!(analysis.cpu_over_provisioned);
    assert!(analysis.memory_over_provisioned);

    let recommendations = core.recommendations.generate(&analysis);
    assert!(!recommendations.is_empty());

    let cpu_resize = recommendations
        .iter()
        .find(|r| matches!(r.kind, RecommendationKind::Resource) && r.current_config.contains_key("cpu_request"))
        .expect("expected a CPU resize recommendation");
    let recommended_cpu = cpu_resize
        .recommended_config
        .get("cpu_request")
        .and_then(|v| v.as_f64())
        .unwrap();
    assert!((recommended_cpu - 480.0).abs() < 1.0, "expected ~400*1.2 buffer, got {recommended_cpu}");

    assert_eq!(core.recommendations.all().len(), recommendations.len());
}

#[tokio::test]
async fn analyze_with_too_few_samples_is_insufficient_data() {
    let now = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
    let clock = Arc::new(ManualClock::new(now));

    let cluster = Arc::new(
        FakeClusterClient::new()
            .with_deployment(DeploymentSpec {
                namespace: "ns".into(),
                name: "svc".into(),
                selector: "app=svc".into(),
                replicas: 1,
                cpu_request: 1000,
                cpu_limit: 2000,
                memory_request: 512 * 1024 * 1024,
                memory_limit: 1024 * 1024 * 1024,
            })
            .with_pod(PodRef {
                namespace: "ns".into(),
                name: "svc-xyz".into(),
                restart_count: 0,
            }),
    );

    let config = Config::default();
    let core = Arc::new(CoreHandle::new(config, cluster, clock));

    core.store.store("pod/svc-xyz", "cpu", 100.0, now);
    core.store.store("pod/svc-xyz", "memory", 100.0, now);

    let err = core.analyzer.analyze("ns", "svc").await.unwrap_err();
    assert!(matches!(err, podwise::analyzer::AnalyzerError::InsufficientData));
}
