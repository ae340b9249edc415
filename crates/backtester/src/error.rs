use thiserror::Error;

#[derive(Error, Debug)]
pub enum BacktestError {
    #[error("Invalid backtest thresholds: {0}")]
    InvalidThresholds(String),
}
