//! Small numeric helpers shared by the Analyzer, Traffic/Cost Analyzer,
//! and Anomaly/Forecast Engine: mean, sample variance, ordinary least
//! squares, and autocorrelation.

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

pub fn max(values: &[f64]) -> f64 {
    values.iter().cloned().fold(f64::MIN, f64::max)
}

/// Sample variance (divides by n-1); 0.0 for fewer than 2 points.
pub fn variance(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }
    let m = mean(values);
    values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (n - 1) as f64
}

pub fn stddev(values: &[f64]) -> f64 {
    variance(values).sqrt()
}

#[derive(Debug, Clone, Copy)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
    pub r_squared: f64,
}

/// Ordinary least squares fit of `ys` against `xs`, with R² clamped to
/// `[0,1]`. Returns a flat zero-slope fit through the mean when there are
/// fewer than 2 points or `xs` has no spread.
pub fn linear_regression(xs: &[f64], ys: &[f64]) -> LinearFit {
    let n = xs.len();
    if n < 2 || n != ys.len() {
        return LinearFit {
            slope: 0.0,
            intercept: mean(ys),
            r_squared: 0.0,
        };
    }
    let x_mean = mean(xs);
    let y_mean = mean(ys);
    let mut num = 0.0;
    let mut den = 0.0;
    for i in 0..n {
        num += (xs[i] - x_mean) * (ys[i] - y_mean);
        den += (xs[i] - x_mean).powi(2);
    }
    if den == 0.0 {
        return LinearFit {
            slope: 0.0,
            intercept: y_mean,
            r_squared: 0.0,
        };
    }
    let slope = num / den;
    let intercept = y_mean - slope * x_mean;

    let ss_tot: f64 = ys.iter().map(|y| (y - y_mean).powi(2)).sum();
    let ss_res: f64 = xs
        .iter()
        .zip(ys.iter())
        .map(|(x, y)| {
            let pred = intercept + slope * x;
            (y - pred).powi(2)
        })
        .sum();
    let r_squared = if ss_tot == 0.0 {
        1.0
    } else {
        (1.0 - ss_res / ss_tot).clamp(0.0, 1.0)
    };

    LinearFit {
        slope,
        intercept,
        r_squared,
    }
}

/// `r(k) = Σ(xᵢ − μ)(xᵢ₋ₖ − μ) / (n·σ²)` for lag `k`.
pub fn autocorrelation(values: &[f64], lag: usize) -> f64 {
    let n = values.len();
    if lag == 0 || lag >= n {
        return 0.0;
    }
    let m = mean(values);
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / n as f64;
    if var == 0.0 {
        return 0.0;
    }
    let mut num = 0.0;
    for i in lag..n {
        num += (values[i] - m) * (values[i - lag] - m);
    }
    num / (n as f64 * var)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn perfect_linear_trend_has_r_squared_near_one() {
        let xs: Vec<f64> = (0..11).map(|i| i as f64).collect();
        let ys: Vec<f64> = (0..11).map(|i| 100.0 + 10.0 * i as f64).collect();
        let fit = linear_regression(&xs, &ys);
        assert!((fit.slope - 10.0).abs() < 1e-6);
        assert!(fit.r_squared >= 0.99);
    }

    #[test]
    fn variance_of_constant_series_is_zero() {
        assert_eq!(variance(&[5.0, 5.0, 5.0]), 0.0);
    }
}
