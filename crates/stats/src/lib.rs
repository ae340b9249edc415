//! # Pairflow Rolling Statistics Library
//!
//! Pure, stateless functions over numeric series: OLS hedge-ratio
//! estimation, spread construction, rolling z-score, rolling Pearson
//! correlation, rolling annualized volatility, and an Augmented
//! Dickey-Fuller stationarity test.
//!
//! ## Architectural Principles
//!
//! - **Layer 1 Logic:** no I/O, no clocks, no shared state. Every output is
//!   a pure function of its input slices, which makes the whole analytics
//!   pipeline replayable and trivially testable.
//! - **Null propagation:** every window-based function returns `None` at
//!   index `t` unless the full trailing window `[t - w + 1, t]` is
//!   available and non-degenerate. `None` means "not yet computable";
//!   callers must never coerce it to zero.
//!
//! ## Public API
//!
//! - `ols` / `rolling_hedge_ratio`: least-squares slope estimation.
//! - `spread_series`: `y_t - beta_t * x_t` with the same-point hedge ratio.
//! - `rolling_zscore`, `rolling_correlation`, `rolling_volatility`.
//! - `adf_test` / `AdfResult`: deterministic unit-root test with AIC lag
//!   selection and an interpolated MacKinnon p-value.

pub mod adf;
pub mod regression;
pub mod rolling;

pub use adf::{adf_test, AdfResult, ADF_MIN_OBS};
pub use regression::{ols, rolling_hedge_ratio, OlsFit};
pub use rolling::{rolling_correlation, rolling_volatility, rolling_zscore, spread_series};
