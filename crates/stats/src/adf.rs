//! Augmented Dickey-Fuller unit-root test.
//!
//! Regresses `delta_y[t]` on a constant, the lagged level `y[t-1]`, and `p`
//! lagged differences, then tests the lagged-level coefficient's
//! t-statistic against the Dickey-Fuller distribution. The lag order is
//! selected by AIC over a common sample, so identical input always yields
//! an identical verdict.

/// Minimum observations before the test is attempted; below this the
/// result is `None` (insufficient data, not an error).
pub const ADF_MIN_OBS: usize = 20;

/// Significance level for the stationarity verdict.
const STATIONARY_P: f64 = 0.05;

/// MacKinnon (1994) asymptotic surface for the constant-only case:
/// cumulative probability at selected tau quantiles. The p-value is linear
/// interpolation between adjacent rows, clamped at the tails.
const TAU_P_SURFACE: &[(f64, f64)] = &[
    (-3.96, 0.001),
    (-3.43, 0.010),
    (-3.12, 0.025),
    (-2.86, 0.050),
    (-2.57, 0.100),
    (-1.57, 0.500),
    (-0.44, 0.900),
    (-0.07, 0.950),
    (0.23, 0.975),
    (0.60, 0.990),
];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AdfResult {
    /// The tau statistic of the lagged-level coefficient.
    pub statistic: f64,
    /// Approximate MacKinnon p-value for the constant-only case.
    pub p_value: f64,
    /// Lag order selected by AIC.
    pub lag: usize,
    /// `p_value < 0.05`.
    pub is_stationary: bool,
}

/// Runs the ADF test on a series. `max_lag` caps the AIC lag search; when
/// absent, Schwert's rule `12 * (n/100)^(1/4)` is used. Returns `None` for
/// fewer than [`ADF_MIN_OBS`] points or a degenerate regression (e.g. a
/// constant series).
pub fn adf_test(series: &[f64], max_lag: Option<usize>) -> Option<AdfResult> {
    let n = series.len();
    if n < ADF_MIN_OBS {
        return None;
    }

    let diffs: Vec<f64> = series.windows(2).map(|w| w[1] - w[0]).collect();

    let schwert = (12.0 * (n as f64 / 100.0).powf(0.25)) as usize;
    let dof_cap = (n.saturating_sub(6)) / 2;
    let pmax = max_lag.unwrap_or(schwert).min(dof_cap);

    // Lag selection over the common sample [pmax, n-2] so every candidate
    // sees the same observations.
    let mut best: Option<(f64, usize)> = None;
    for p in 0..=pmax {
        if let Some(fit) = dickey_fuller_fit(series, &diffs, p, pmax) {
            let nobs = fit.nobs as f64;
            let k = (p + 2) as f64;
            if fit.sse <= 0.0 {
                continue;
            }
            let aic = nobs * (fit.sse / nobs).ln() + 2.0 * k;
            if best.map_or(true, |(b, _)| aic < b) {
                best = Some((aic, p));
            }
        }
    }
    let (_, lag) = best?;

    // Refit with the chosen lag on the full available sample.
    let fit = dickey_fuller_fit(series, &diffs, lag, lag)?;
    let dof = fit.nobs.checked_sub(lag + 2).filter(|d| *d > 0)? as f64;
    let s2 = fit.sse / dof;
    let var_gamma = s2 * fit.inv_gamma;
    if !(var_gamma.is_finite() && var_gamma > 0.0) {
        return None;
    }
    let statistic = fit.gamma / var_gamma.sqrt();
    if !statistic.is_finite() {
        return None;
    }

    let p_value = mackinnon_p(statistic);
    Some(AdfResult {
        statistic,
        p_value,
        lag,
        is_stationary: p_value < STATIONARY_P,
    })
}

struct DfFit {
    gamma: f64,
    /// Diagonal of `(X'X)^-1` at the lagged-level column.
    inv_gamma: f64,
    sse: f64,
    nobs: usize,
}

/// OLS of `diffs[t]` on `[1, series[t], diffs[t-1..t-p]]` for
/// `t in [start, diffs.len())`. Columns: 0 = constant, 1 = lagged level.
fn dickey_fuller_fit(series: &[f64], diffs: &[f64], p: usize, start: usize) -> Option<DfFit> {
    let k = p + 2;
    let nobs = diffs.len().checked_sub(start)?;
    if nobs < k + 1 {
        return None;
    }

    let mut xtx = vec![vec![0.0; k]; k];
    let mut xty = vec![0.0; k];
    let mut row = vec![0.0; k];
    let mut yty = 0.0;

    for t in start..diffs.len() {
        row[0] = 1.0;
        row[1] = series[t];
        for j in 0..p {
            row[2 + j] = diffs[t - 1 - j];
        }
        let yv = diffs[t];
        yty += yv * yv;
        for i in 0..k {
            xty[i] += row[i] * yv;
            for j in i..k {
                xtx[i][j] += row[i] * row[j];
            }
        }
    }
    for i in 0..k {
        for j in 0..i {
            xtx[i][j] = xtx[j][i];
        }
    }

    let inv = invert(xtx)?;
    let mut beta = vec![0.0; k];
    for i in 0..k {
        beta[i] = (0..k).map(|j| inv[i][j] * xty[j]).sum();
    }

    // SSE = y'y - beta' X'y.
    let explained: f64 = (0..k).map(|i| beta[i] * xty[i]).sum();
    let sse = (yty - explained).max(0.0);

    Some(DfFit {
        gamma: beta[1],
        inv_gamma: inv[1][1],
        sse,
        nobs,
    })
}

/// Gauss-Jordan inverse with partial pivoting. `None` when the matrix is
/// singular to working precision (collinear regressors, constant input).
fn invert(mut m: Vec<Vec<f64>>) -> Option<Vec<Vec<f64>>> {
    let k = m.len();
    let scale = m
        .iter()
        .flat_map(|r| r.iter())
        .fold(0.0_f64, |acc, v| acc.max(v.abs()));
    if scale == 0.0 {
        return None;
    }
    let tol = scale * 1e-12;

    let mut inv: Vec<Vec<f64>> = (0..k)
        .map(|i| (0..k).map(|j| if i == j { 1.0 } else { 0.0 }).collect())
        .collect();

    for col in 0..k {
        let pivot_row = (col..k)
            .max_by(|a, b| m[*a][col].abs().total_cmp(&m[*b][col].abs()))
            .unwrap_or(col);
        if m[pivot_row][col].abs() < tol {
            return None;
        }
        m.swap(col, pivot_row);
        inv.swap(col, pivot_row);

        let pivot = m[col][col];
        for j in 0..k {
            m[col][j] /= pivot;
            inv[col][j] /= pivot;
        }
        for i in 0..k {
            if i == col {
                continue;
            }
            let factor = m[i][col];
            if factor == 0.0 {
                continue;
            }
            for j in 0..k {
                m[i][j] -= factor * m[col][j];
                inv[i][j] -= factor * inv[col][j];
            }
        }
    }
    Some(inv)
}

fn mackinnon_p(tau: f64) -> f64 {
    let first = TAU_P_SURFACE[0];
    let last = TAU_P_SURFACE[TAU_P_SURFACE.len() - 1];
    if tau <= first.0 {
        return first.1;
    }
    if tau >= last.0 {
        return last.1;
    }
    for pair in TAU_P_SURFACE.windows(2) {
        let (t0, p0) = pair[0];
        let (t1, p1) = pair[1];
        if tau <= t1 {
            let frac = (tau - t0) / (t1 - t0);
            return p0 + frac * (p1 - p0);
        }
    }
    last.1
}
