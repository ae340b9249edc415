pub mod enums;
pub mod error;
pub mod structs;
pub mod timeframe;

// Re-export the core types to provide a clean public API.
pub use enums::{BarFill, Position, TradeDirection};
pub use error::CoreError;
pub use structs::{AnalyticsRecord, Bar, SymbolPair, Tick, TradeEvent};
pub use timeframe::Timeframe;
