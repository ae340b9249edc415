use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Invalid timeframe '{0}': expected a label like 1s, 1m, 5m or 1h")]
    InvalidTimeframe(String),
}
