//! Pure scoring functions, mirroring the teacher's `ScoringEngine` shape —
//! a zero-sized struct of associated functions rather than an owned value —
//! but carrying the utilization/stability/cost-efficiency/overall formulas
//! instead of the teacher's inspection-weight table.

const U_OPT_LO: f64 = 0.7;
const U_OPT_HI: f64 = 0.9;
const CPU_VARIANCE_THRESHOLD: f64 = 1_000.0;
const MEMORY_VARIANCE_THRESHOLD: f64 = 1_000_000_000.0;
const SCALING_FREQUENCY_THRESHOLD_PER_DAY: f64 = 10.0;

pub struct ScoringEngine;

impl ScoringEngine {
    /// `U(u)`: 100 in the optimal band, ramping linearly to 0 outside it.
    pub fn utilization_score(u: f64) -> f64 {
        if u < 0.0 {
            return 0.0;
        }
        let score = if u <= U_OPT_LO {
            (u / U_OPT_LO) * 100.0
        } else if u <= U_OPT_HI {
            100.0
        } else if u <= 2.0 {
            100.0 * (2.0 - u) / (2.0 - U_OPT_HI)
        } else {
            0.0
        };
        score.max(0.0)
    }

    /// Deployment-level utilization score: mean of the per-resource scores.
    pub fn deployment_utilization_score(cpu_utilization: f64, memory_utilization: f64) -> f64 {
        (Self::utilization_score(cpu_utilization) + Self::utilization_score(memory_utilization)) / 2.0
    }

    pub fn stability_score(
        restart_count: i32,
        cpu_variance: f64,
        memory_variance: f64,
        scaling_events_per_day: Option<f64>,
    ) -> f64 {
        let mut score = 100.0;
        score -= 5.0 * restart_count as f64;
        if cpu_variance > CPU_VARIANCE_THRESHOLD {
            score -= 10.0;
        }
        if memory_variance > MEMORY_VARIANCE_THRESHOLD {
            score -= 10.0;
        }
        if let Some(freq) = scaling_events_per_day {
            if freq > SCALING_FREQUENCY_THRESHOLD_PER_DAY {
                score -= 20.0;
            }
        }
        score.max(0.0)
    }

    pub fn cost_efficiency_score(over_provisioned: &[(bool, f64)]) -> f64 {
        let mut score = 100.0;
        for &(is_over, utilization) in over_provisioned {
            if is_over {
                score -= (1.0 - utilization) * 50.0;
            }
        }
        score.max(0.0)
    }

    pub fn overall_score(utilization: f64, stability: f64, cost_efficiency: f64) -> f64 {
        0.5 * utilization + 0.3 * stability + 0.2 * cost_efficiency
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utilization_score_optimal_band_is_100() {
        assert_eq!(ScoringEngine::utilization_score(0.8), 100.0);
        assert_eq!(ScoringEngine::utilization_score(0.7), 100.0);
        assert_eq!(ScoringEngine::utilization_score(0.9), 100.0);
    }

    #[test]
    fn utilization_score_ramps_down_past_2() {
        assert_eq!(ScoringEngine::utilization_score(2.0), 0.0);
        assert_eq!(ScoringEngine::utilization_score(3.0), 0.0);
    }

    #[test]
    fn stability_score_penalizes_restarts_and_variance() {
        let score = ScoringEngine::stability_score(2, 2_000.0, 0.0, None);
        assert_eq!(score, 100.0 - 10.0 - 10.0);
    }

    #[test]
    fn overall_score_is_weighted_sum() {
        let overall = ScoringEngine::overall_score(80.0, 90.0, 70.0);
        assert!((overall - (0.5 * 80.0 + 0.3 * 90.0 + 0.2 * 70.0)).abs() < 1e-9);
    }
}
