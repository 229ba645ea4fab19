pub mod candle;
pub mod loader;

pub use candle::{Candle, CandleError, Indicators};
pub use loader::{load_csv, parse_timestamp, slice_horizon};
