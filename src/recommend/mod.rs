//! Consumes analysis records and emits typed recommendations with cost
//! deltas and priority. Grounded on the teacher's `ScoringEngine`
//! companion module shape (pure rule functions) plus the capacity-engine
//! pattern from the pack (`Soroban-Registry`'s `generate_recommendations`):
//! UUID-identified, priority-tiered, savings-annotated outputs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::sync::RwLock;
use uuid::Uuid;

use crate::analyzer::AnalysisRecord;

const BUFFER_OVER: f64 = 1.2;
const BUFFER_UNDER: f64 = 1.5;
const CPU_FLOOR_MILLICORES: f64 = 10.0;
const MEMORY_FLOOR_BYTES: f64 = 16.0 * 1024.0 * 1024.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecommendationKind {
    Resource,
    Autoscaler,
    Replica,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    pub id: String,
    pub kind: RecommendationKind,
    pub namespace: String,
    pub deployment: String,
    pub priority: Priority,
    pub description: String,
    pub current_config: HashMap<String, serde_json::Value>,
    pub recommended_config: HashMap<String, serde_json::Value>,
    pub estimated_monthly_savings: f64,
    pub impact: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy)]
pub struct CostModel {
    pub cpu_price_per_vcpu_hour: f64,
    pub memory_price_per_gib_hour: f64,
}

impl Default for CostModel {
    fn default() -> Self {
        Self {
            cpu_price_per_vcpu_hour: 0.03,
            memory_price_per_gib_hour: 0.004,
        }
    }
}

impl CostModel {
    pub fn monthly_cpu_cost(&self, millicores: f64) -> f64 {
        (millicores / 1000.0) * self.cpu_price_per_vcpu_hour * 24.0 * 30.0
    }

    pub fn monthly_memory_cost(&self, bytes: f64) -> f64 {
        (bytes / 2f64.powi(30)) * self.memory_price_per_gib_hour * 24.0 * 30.0
    }
}

pub struct RecommendationEngine {
    cost: CostModel,
    set: RwLock<HashMap<String, Recommendation>>,
}

impl RecommendationEngine {
    pub fn new(cost: CostModel) -> Self {
        Self {
            cost,
            set: RwLock::new(HashMap::new()),
        }
    }

    pub fn all(&self) -> Vec<Recommendation> {
        self.set.read().unwrap().values().cloned().collect()
    }

    pub fn get(&self, id: &str) -> Option<Recommendation> {
        self.set.read().unwrap().get(id).cloned()
    }

    pub fn by_deployment(&self, namespace: &str, deployment: &str) -> Vec<Recommendation> {
        self.set
            .read()
            .unwrap()
            .values()
            .filter(|r| r.namespace == namespace && r.deployment == deployment)
            .cloned()
            .collect()
    }

    pub fn clear(&self) {
        self.set.write().unwrap().clear();
    }

    pub fn generate(&self, analysis: &AnalysisRecord) -> Vec<Recommendation> {
        let mut out = Vec::new();
        let mut cpu_resize = None;
        let mut memory_resize = None;

        if analysis.cpu_over_provisioned || analysis.cpu_under_provisioned {
            let buffer = if analysis.cpu_under_provisioned {
                BUFFER_UNDER
            } else {
                BUFFER_OVER
            };
            let recommended_request = (analysis.cpu_p95 * buffer).max(CPU_FLOOR_MILLICORES);
            let recommended_limit = 2.0 * recommended_request;
            let current_cost = self.cost.monthly_cpu_cost(analysis.cpu_request as f64);
            let recommended_cost = self.cost.monthly_cpu_cost(recommended_request);
            let savings = current_cost - recommended_cost;
            let priority = assign_priority(analysis.cpu_under_provisioned, analysis.autoscaler_mistuned, savings);
            let rec = self.build(
                RecommendationKind::Resource,
                analysis,
                priority,
                format!(
                    "CPU request for {}/{} is {} relative to observed usage",
                    analysis.namespace,
                    analysis.deployment,
                    if analysis.cpu_under_provisioned { "too tight" } else { "over-sized" }
                ),
                json_map([("cpu_request", json!(analysis.cpu_request)), ("cpu_limit", json!(analysis.cpu_limit))]),
                json_map([
                    ("cpu_request", json!(recommended_request.round())),
                    ("cpu_limit", json!(recommended_limit.round())),
                ]),
                savings,
                "adjusts CPU reservation to match observed P95 usage",
            );
            cpu_resize = Some(rec);
        }

        if analysis.memory_over_provisioned || analysis.memory_under_provisioned {
            let buffer = if analysis.memory_under_provisioned {
                BUFFER_UNDER
            } else {
                BUFFER_OVER
            };
            let recommended_request = (analysis.memory_p95 * buffer).max(MEMORY_FLOOR_BYTES);
            let recommended_limit = 2.0 * recommended_request;
            let current_cost = self.cost.monthly_memory_cost(analysis.memory_request as f64);
            let recommended_cost = self.cost.monthly_memory_cost(recommended_request);
            let savings = current_cost - recommended_cost;
            let priority = assign_priority(analysis.memory_under_provisioned, analysis.autoscaler_mistuned, savings);
            let rec = self.build(
                RecommendationKind::Resource,
                analysis,
                priority,
                format!(
                    "Memory request for {}/{} is {} relative to observed usage",
                    analysis.namespace,
                    analysis.deployment,
                    if analysis.memory_under_provisioned { "too tight" } else { "over-sized" }
                ),
                json_map([("memory_request", json!(analysis.memory_request)), ("memory_limit", json!(analysis.memory_limit))]),
                json_map([
                    ("memory_request", json!(recommended_request.round())),
                    ("memory_limit", json!(recommended_limit.round())),
                ]),
                savings,
                "adjusts memory reservation to match observed P95 usage",
            );
            memory_resize = Some(rec);
        }

        if let (Some(cpu), Some(memory)) = (&cpu_resize, &memory_resize) {
            let savings = cpu.estimated_monthly_savings + memory.estimated_monthly_savings;
            let mut current = cpu.current_config.clone();
            current.extend(memory.current_config.clone());
            let mut recommended = cpu.recommended_config.clone();
            recommended.extend(memory.recommended_config.clone());
            let priority = assign_priority(
                analysis.cpu_under_provisioned || analysis.memory_under_provisioned,
                analysis.autoscaler_mistuned,
                savings,
            );
            out.push(self.build(
                RecommendationKind::Resource,
                analysis,
                priority,
                format!("Combined CPU+memory resize for {}/{}", analysis.namespace, analysis.deployment),
                current,
                recommended,
                savings,
                "applies both CPU and memory resize together",
            ));
        }
        out.extend(cpu_resize);
        out.extend(memory_resize);

        let mut autoscaler_fired = 0;
        let mut autoscaler_current = HashMap::new();
        let mut autoscaler_recommended = HashMap::new();

        if let Some(autoscaler) = &analysis.autoscaler {
            if analysis.autoscaler_idle_at_min && autoscaler.min_replicas > 1 {
                autoscaler_fired += 1;
                let recommended_min = autoscaler.min_replicas - 1;
                autoscaler_current.insert("min_replicas".to_string(), json!(autoscaler.min_replicas));
                autoscaler_recommended.insert("min_replicas".to_string(), json!(recommended_min));
                out.push(self.build(
                    RecommendationKind::Autoscaler,
                    analysis,
                    Priority::Low,
                    format!("Autoscaler for {}/{} is idle at its floor", analysis.namespace, analysis.deployment),
                    json_map([("min_replicas", json!(autoscaler.min_replicas))]),
                    json_map([("min_replicas", json!(recommended_min))]),
                    0.0,
                    "reduces the autoscaler floor to cut idle replica cost",
                ));
            }

            if analysis.autoscaler_hits_ceiling {
                autoscaler_fired += 1;
                let recommended_max = autoscaler.max_replicas + 2;
                autoscaler_current.insert("max_replicas".to_string(), json!(autoscaler.max_replicas));
                autoscaler_recommended.insert("max_replicas".to_string(), json!(recommended_max));
                out.push(self.build(
                    RecommendationKind::Autoscaler,
                    analysis,
                    Priority::High,
                    format!("Autoscaler for {}/{} repeatedly hits its ceiling", analysis.namespace, analysis.deployment),
                    json_map([("max_replicas", json!(autoscaler.max_replicas))]),
                    json_map([("max_replicas", json!(recommended_max))]),
                    0.0,
                    "raises the autoscaler ceiling to absorb observed peak load",
                ));
            }

            if analysis.autoscaler_mistuned {
                autoscaler_fired += 1;
                let recommended_target = if autoscaler.current_cpu_utilization > autoscaler.target_cpu_utilization {
                    (autoscaler.current_cpu_utilization + autoscaler.target_cpu_utilization) / 2.0
                } else {
                    (autoscaler.target_cpu_utilization + 10.0).min(80.0)
                };
                autoscaler_current.insert("target_cpu_utilization".to_string(), json!(autoscaler.target_cpu_utilization));
                autoscaler_recommended.insert("target_cpu_utilization".to_string(), json!(recommended_target.round()));
                out.push(self.build(
                    RecommendationKind::Autoscaler,
                    analysis,
                    Priority::Medium,
                    format!("Autoscaler target for {}/{} is mistuned", analysis.namespace, analysis.deployment),
                    json_map([("target_cpu_utilization", json!(autoscaler.target_cpu_utilization))]),
                    json_map([("target_cpu_utilization", json!(recommended_target.round()))]),
                    0.0,
                    "retargets autoscaler CPU utilization toward the midpoint of observed vs configured",
                ));
            }

            if autoscaler_fired >= 2 {
                out.push(self.build(
                    RecommendationKind::Autoscaler,
                    analysis,
                    Priority::Medium,
                    format!("Combined autoscaler retuning for {}/{}", analysis.namespace, analysis.deployment),
                    autoscaler_current,
                    autoscaler_recommended,
                    0.0,
                    "applies all fired autoscaler adjustments together",
                ));
            }
        }

        let has_autoscaler = analysis.autoscaler.is_some();
        let cpu_u = analysis.cpu_utilization();
        let memory_u = analysis.memory_utilization();

        if !has_autoscaler && (cpu_u > 0.8 || memory_u > 0.8) {
            out.push(self.build(
                RecommendationKind::Replica,
                analysis,
                Priority::High,
                format!("{}/{} has no autoscaler and is over 80% utilized", analysis.namespace, analysis.deployment),
                json_map([("replicas", json!(analysis.replicas))]),
                json_map([("replicas", json!(analysis.replicas + 1))]),
                0.0,
                "adds one replica to relieve sustained high utilization",
            ));
        } else if !has_autoscaler && cpu_u < 0.5 && memory_u < 0.5 && analysis.replicas > 1 {
            out.push(self.build(
                RecommendationKind::Replica,
                analysis,
                Priority::Low,
                format!("{}/{} has no autoscaler and is under-utilized", analysis.namespace, analysis.deployment),
                json_map([("replicas", json!(analysis.replicas))]),
                json_map([("replicas", json!(analysis.replicas - 1))]),
                0.0,
                "removes one replica from an under-utilized deployment",
            ));
        }

        let any_rule_fired = !out.is_empty();
        if !any_rule_fired
            && analysis.overall_score < 70.0
            && analysis.cpu_request > 0
            && analysis.memory_request > 0
        {
            let recommended_cpu = (analysis.cpu_p95 * BUFFER_OVER).max(CPU_FLOOR_MILLICORES);
            let recommended_memory = (analysis.memory_p95 * BUFFER_OVER).max(MEMORY_FLOOR_BYTES);
            let savings = (self.cost.monthly_cpu_cost(analysis.cpu_request as f64)
                - self.cost.monthly_cpu_cost(recommended_cpu))
                + (self.cost.monthly_memory_cost(analysis.memory_request as f64)
                    - self.cost.monthly_memory_cost(recommended_memory));
            out.push(self.build(
                RecommendationKind::Resource,
                analysis,
                Priority::Low,
                format!("General optimization opportunity for {}/{}", analysis.namespace, analysis.deployment),
                json_map([
                    ("cpu_request", json!(analysis.cpu_request)),
                    ("memory_request", json!(analysis.memory_request)),
                ]),
                json_map([
                    ("cpu_request", json!(recommended_cpu.round())),
                    ("memory_request", json!(recommended_memory.round())),
                ]),
                savings,
                "fallback right-sizing when no specific rule fired but the overall score is low",
            ));
        }

        let mut set = self.set.write().unwrap();
        for rec in &out {
            set.insert(rec.id.clone(), rec.clone());
        }
        out
    }

    #[allow(clippy::too_many_arguments)]
    fn build(
        &self,
        kind: RecommendationKind,
        analysis: &AnalysisRecord,
        priority: Priority,
        description: String,
        current_config: HashMap<String, serde_json::Value>,
        recommended_config: HashMap<String, serde_json::Value>,
        estimated_monthly_savings: f64,
        impact: &str,
    ) -> Recommendation {
        Recommendation {
            id: Uuid::new_v4().to_string(),
            kind,
            namespace: analysis.namespace.clone(),
            deployment: analysis.deployment.clone(),
            priority,
            description,
            current_config,
            recommended_config,
            estimated_monthly_savings,
            impact: impact.to_string(),
            created_at: Utc::now(),
        }
    }
}

fn assign_priority(under_provisioned: bool, mistuned: bool, savings: f64) -> Priority {
    if under_provisioned || savings >= 50.0 {
        Priority::High
    } else if savings >= 20.0 || mistuned {
        Priority::Medium
    } else {
        Priority::Low
    }
}

fn json_map<const N: usize>(pairs: [(&str, serde_json::Value); N]) -> HashMap<String, serde_json::Value> {
    pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::AutoscalerInfo;

    fn base_analysis() -> AnalysisRecord {
        AnalysisRecord {
            namespace: "ns".into(),
            deployment: "app".into(),
            generated_at: Utc::now(),
            cpu_request: 200,
            cpu_limit: 400,
            memory_request: 256 * 1024 * 1024,
            memory_limit: 512 * 1024 * 1024,
            replicas: 2,
            restart_count: 0,
            cpu_p50: 70.0,
            cpu_p95: 80.0,
            cpu_p99: 85.0,
            cpu_avg: 65.0,
            cpu_max: 90.0,
            cpu_variance: 10.0,
            memory_p50: 100_000_000.0,
            memory_p95: 120_000_000.0,
            memory_p99: 130_000_000.0,
            memory_avg: 95_000_000.0,
            memory_max: 140_000_000.0,
            memory_variance: 10.0,
            autoscaler: None,
            cpu_over_provisioned: true,
            cpu_under_provisioned: false,
            memory_over_provisioned: false,
            memory_under_provisioned: false,
            autoscaler_hits_ceiling: false,
            autoscaler_idle_at_min: false,
            autoscaler_mistuned: false,
            utilization_score: 80.0,
            stability_score: 100.0,
            cost_efficiency_score: 90.0,
            overall_score: 88.0,
        }
    }

    #[test]
    fn cpu_resize_uses_buffer_over_for_right_sizing_scenario() {
        let engine = RecommendationEngine::new(CostModel::default());
        let recs = engine.generate(&base_analysis());
        let resource_rec = recs
            .iter()
            .find(|r| matches!(r.kind, RecommendationKind::Resource))
            .expect("expected a resource recommendation");
        let recommended_cpu = resource_rec.recommended_config.get("cpu_request").unwrap();
        assert!((recommended_cpu.as_f64().unwrap() - 96.0).abs() < 1.0);
        assert!(matches!(resource_rec.priority, Priority::Medium | Priority::Low));
    }

    #[test]
    fn autoscaler_ceiling_recommends_max_plus_two() {
        let engine = RecommendationEngine::new(CostModel::default());
        let mut analysis = base_analysis();
        analysis.cpu_over_provisioned = false;
        analysis.autoscaler_hits_ceiling = true;
        analysis.autoscaler = Some(AutoscalerInfo {
            min_replicas: 2,
            max_replicas: 5,
            target_cpu_utilization: 70.0,
            current_cpu_utilization: 75.0,
            scaling_events_per_day: 1.0,
            fraction_at_max: 0.3,
            fraction_at_min: 0.0,
        });
        let recs = engine.generate(&analysis);
        let rec = recs
            .iter()
            .find(|r| matches!(r.kind, RecommendationKind::Autoscaler))
            .expect("expected an autoscaler recommendation");
        assert_eq!(rec.recommended_config.get("max_replicas").unwrap(), &json!(7));
    }

    #[test]
    fn min_decrease_does_not_fire_when_min_replicas_is_one() {
        let engine = RecommendationEngine::new(CostModel::default());
        let mut analysis = base_analysis();
        analysis.cpu_over_provisioned = false;
        analysis.autoscaler_idle_at_min = true;
        analysis.autoscaler = Some(AutoscalerInfo {
            min_replicas: 1,
            max_replicas: 5,
            target_cpu_utilization: 70.0,
            current_cpu_utilization: 20.0,
            scaling_events_per_day: 0.0,
            fraction_at_max: 0.0,
            fraction_at_min: 0.9,
        });
        let recs = engine.generate(&analysis);
        assert!(!recs.iter().any(|r| r.recommended_config.contains_key("min_replicas")));
    }

    #[test]
    fn zero_p95_still_yields_a_nonzero_floor() {
        let engine = RecommendationEngine::new(CostModel::default());
        let mut analysis = base_analysis();
        analysis.cpu_p95 = 0.0;
        let recs = engine.generate(&analysis);
        let resource_rec = recs.iter().find(|r| matches!(r.kind, RecommendationKind::Resource)).unwrap();
        let recommended_cpu = resource_rec.recommended_config.get("cpu_request").unwrap().as_f64().unwrap();
        assert!(recommended_cpu > 0.0);
    }
}
