/// Result of an ordinary-least-squares fit of `y = alpha + beta * x`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OlsFit {
    pub alpha: f64,
    pub beta: f64,
}

/// Least-squares fit of `y` on `x`, minimizing `sum((y_i - a - b*x_i)^2)`.
///
/// Returns `None` for fewer than two points or when `x` has no variance;
/// a flat regressor is a valid (if uninteresting) input, not an error.
pub fn ols(y: &[f64], x: &[f64]) -> Option<OlsFit> {
    let n = y.len().min(x.len());
    if n < 2 {
        return None;
    }
    let nf = n as f64;
    let mean_x = x[..n].iter().sum::<f64>() / nf;
    let mean_y = y[..n].iter().sum::<f64>() / nf;

    let mut sxx = 0.0;
    let mut sxy = 0.0;
    for i in 0..n {
        let dx = x[i] - mean_x;
        sxx += dx * dx;
        sxy += dx * (y[i] - mean_y);
    }

    if sxx.abs() < f64::EPSILON {
        return None;
    }

    let beta = sxy / sxx;
    let alpha = mean_y - beta * mean_x;
    if beta.is_finite() && alpha.is_finite() {
        Some(OlsFit { alpha, beta })
    } else {
        None
    }
}

/// OLS slope of `y` regressed on `x` over the trailing window of `w` points
/// ending at each index. Output `t` is `None` until `w` observations exist,
/// or when the window's `x` values are constant.
pub fn rolling_hedge_ratio(y: &[f64], x: &[f64], w: usize) -> Vec<Option<f64>> {
    let n = y.len().min(x.len());
    let mut out = vec![None; n];
    if w < 2 {
        return out;
    }
    for t in 0..n {
        if t + 1 >= w {
            let lo = t + 1 - w;
            out[t] = ols(&y[lo..=t], &x[lo..=t]).map(|fit| fit.beta);
        }
    }
    out
}
