use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Store access failed: {0}")]
    Database(#[from] database::DbError),

    #[error("Processing failed: {0}")]
    Processor(#[from] processor::ProcessorError),
}
