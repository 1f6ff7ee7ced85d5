//! Candle and tick representation.

use serde::Serialize;

/// One OHLCV bar. `time` is the bar open time in epoch seconds.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Candle {
    pub time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<f64>,
}

impl Candle {
    pub fn new(time: i64, open: f64, high: f64, low: f64, close: f64) -> Self {
        Candle {
            time,
            open,
            high,
            low,
            close,
            volume: None,
        }
    }

    pub fn with_volume(mut self, volume: f64) -> Self {
        self.volume = Some(volume);
        self
    }

    /// Volume, or 0 when the source carried none.
    pub fn volume_or_zero(&self) -> f64 {
        self.volume.unwrap_or(0.0)
    }

    /// (high + low) / 2
    pub fn median_price(&self) -> f64 {
        (self.high + self.low) / 2.0
    }

    /// (high + low + close) / 3
    pub fn typical_price(&self) -> f64 {
        (self.high + self.low + self.close) / 3.0
    }

    /// (high + low + 2 * close) / 4
    pub fn weighted_price(&self) -> f64 {
        (self.high + self.low + 2.0 * self.close) / 4.0
    }

    /// max(high - low, |high - prev_close|, |low - prev_close|)
    pub fn true_range(&self, prev_close: f64) -> f64 {
        let hl = self.high - self.low;
        let hc = (self.high - prev_close).abs();
        let lc = (self.low - prev_close).abs();
        hl.max(hc).max(lc)
    }

    /// Price selected by an applied-price code (`PRICE_CLOSE` = 0 .. `PRICE_WEIGHTED` = 6).
    /// Unknown codes fall back to the close.
    pub fn price(&self, applied: i64) -> f64 {
        match applied {
            1 => self.open,
            2 => self.high,
            3 => self.low,
            4 => self.median_price(),
            5 => self.typical_price(),
            6 => self.weighted_price(),
            _ => self.close,
        }
    }
}

/// A single bid/ask quote.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Tick {
    pub time: i64,
    pub bid: f64,
    pub ask: f64,
}

impl Tick {
    pub fn mid(&self) -> f64 {
        (self.bid + self.ask) / 2.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_candle() -> Candle {
        Candle::new(1_700_000_000, 100.0, 110.0, 90.0, 105.0).with_volume(50_000.0)
    }

    #[test]
    fn typical_price() {
        let c = sample_candle();
        // (110 + 90 + 105) / 3 = 101.666...
        let expected = (110.0 + 90.0 + 105.0) / 3.0;
        assert!((c.typical_price() - expected).abs() < f64::EPSILON);
    }

    #[test]
    fn true_range_hl_dominates() {
        let c = sample_candle();
        // high-low=20, |high-100|=10, |low-100|=10 → 20
        assert!((c.true_range(100.0) - 20.0).abs() < f64::EPSILON);
    }

    #[test]
    fn true_range_gap_up() {
        let c = sample_candle();
        // high-low=20, |110-70|=40, |90-70|=20 → 40
        assert!((c.true_range(70.0) - 40.0).abs() < f64::EPSILON);
    }

    #[test]
    fn applied_price_codes() {
        let c = sample_candle();
        assert!((c.price(0) - 105.0).abs() < f64::EPSILON);
        assert!((c.price(1) - 100.0).abs() < f64::EPSILON);
        assert!((c.price(2) - 110.0).abs() < f64::EPSILON);
        assert!((c.price(3) - 90.0).abs() < f64::EPSILON);
        assert!((c.price(4) - 100.0).abs() < f64::EPSILON);
        assert!((c.price(6) - 102.5).abs() < f64::EPSILON);
        assert!((c.price(42) - 105.0).abs() < f64::EPSILON);
    }

    #[test]
    fn missing_volume_reads_as_zero() {
        let c = Candle::new(0, 1.0, 1.0, 1.0, 1.0);
        assert_eq!(c.volume, None);
        assert!((c.volume_or_zero()).abs() < f64::EPSILON);
    }
}
