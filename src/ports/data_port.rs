//! Candle data access port trait.

use std::path::Path;

use crate::domain::error::MqlError;
use crate::domain::ohlcv::Candle;

pub trait DataPort {
    /// Load an ordered candle series from `source`.
    fn load_candles(&self, source: &Path) -> Result<Vec<Candle>, MqlError>;
}
