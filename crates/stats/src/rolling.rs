//! Trailing-window statistics. All functions share the same window
//! semantics: at index `t` the window is `[t - w + 1, t]`; with fewer than
//! `w` valid observations the output at `t` is `None`.

/// Sample mean and standard deviation (ddof = 1) of a window.
fn mean_std(window: &[f64]) -> (f64, f64) {
    let n = window.len() as f64;
    let mean = window.iter().sum::<f64>() / n;
    let var = window.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / (n - 1.0);
    (mean, var.sqrt())
}

/// `spread_t = y_t - beta_t * x_t`, using the hedge ratio estimated at the
/// same point (no look-ahead). `None` wherever the hedge ratio is `None`.
pub fn spread_series(y: &[f64], x: &[f64], betas: &[Option<f64>]) -> Vec<Option<f64>> {
    let n = y.len().min(x.len()).min(betas.len());
    (0..n).map(|t| betas[t].map(|b| y[t] - b * x[t])).collect()
}

/// Rolling z-score of a (possibly gappy) series: standardized deviation of
/// the point from its trailing-window mean. `None` when any window slot is
/// `None`, or when the window standard deviation is zero.
pub fn rolling_zscore(series: &[Option<f64>], w: usize) -> Vec<Option<f64>> {
    let n = series.len();
    let mut out = vec![None; n];
    if w < 2 {
        return out;
    }
    let mut window = Vec::with_capacity(w);
    for t in 0..n {
        if t + 1 < w {
            continue;
        }
        window.clear();
        for slot in &series[t + 1 - w..=t] {
            match slot {
                Some(v) => window.push(*v),
                None => break,
            }
        }
        if window.len() < w {
            continue;
        }
        let (mean, std) = mean_std(&window);
        if std > 0.0 {
            out[t] = Some((window[w - 1] - mean) / std);
        }
    }
    out
}

/// Rolling Pearson correlation of two aligned price series. Outputs are in
/// `[-1, 1]`; a window where either side has zero variance yields `None`.
pub fn rolling_correlation(y: &[f64], x: &[f64], w: usize) -> Vec<Option<f64>> {
    let n = y.len().min(x.len());
    let mut out = vec![None; n];
    if w < 2 {
        return out;
    }
    for t in 0..n {
        if t + 1 < w {
            continue;
        }
        let lo = t + 1 - w;
        let wy = &y[lo..=t];
        let wx = &x[lo..=t];
        let wf = w as f64;
        let mean_y = wy.iter().sum::<f64>() / wf;
        let mean_x = wx.iter().sum::<f64>() / wf;
        let mut cov = 0.0;
        let mut var_y = 0.0;
        let mut var_x = 0.0;
        for i in 0..w {
            let dy = wy[i] - mean_y;
            let dx = wx[i] - mean_x;
            cov += dy * dx;
            var_y += dy * dy;
            var_x += dx * dx;
        }
        if var_y.abs() < f64::EPSILON || var_x.abs() < f64::EPSILON {
            continue;
        }
        let r = cov / (var_y.sqrt() * var_x.sqrt());
        if r.is_finite() {
            out[t] = Some(r.clamp(-1.0, 1.0));
        }
    }
    out
}

/// Rolling annualized volatility: sample standard deviation of natural-log
/// returns over `w` returns (`w + 1` prices), scaled by
/// `sqrt(periods_per_year)`. A window containing a non-positive price has
/// no defined log return and yields `None`.
pub fn rolling_volatility(prices: &[f64], w: usize, periods_per_year: f64) -> Vec<Option<f64>> {
    let n = prices.len();
    let mut out = vec![None; n];
    if w < 2 {
        return out;
    }
    let scale = periods_per_year.sqrt();
    let mut returns = Vec::with_capacity(w);
    for t in 0..n {
        if t < w {
            continue;
        }
        returns.clear();
        let mut valid = true;
        for i in t - w..t {
            if prices[i] <= 0.0 || prices[i + 1] <= 0.0 {
                valid = false;
                break;
            }
            returns.push((prices[i + 1] / prices[i]).ln());
        }
        if !valid {
            continue;
        }
        let (_, std) = mean_std(&returns);
        if std.is_finite() {
            out[t] = Some(std * scale);
        }
    }
    out
}
