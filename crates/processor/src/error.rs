use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProcessorError {
    #[error("Failed to persist analytics records: {0}")]
    Persistence(#[from] database::DbError),
}
