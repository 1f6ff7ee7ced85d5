//! JSON report adapter.

use std::fs;
use std::path::Path;

use tracing::info;

use crate::domain::backtest::BacktestReport;
use crate::domain::error::MqlError;
use crate::ports::report_port::ReportPort;

#[derive(Debug, Default, Clone, Copy)]
pub struct JsonReportAdapter {
    pub pretty: bool,
}

impl JsonReportAdapter {
    pub fn new(pretty: bool) -> Self {
        Self { pretty }
    }

    pub fn render(&self, report: &BacktestReport) -> Result<String, MqlError> {
        let rendered = if self.pretty {
            serde_json::to_string_pretty(report)
        } else {
            serde_json::to_string(report)
        };
        rendered.map_err(|e| MqlError::Report {
            reason: format!("failed to serialize report: {}", e),
        })
    }
}

impl ReportPort for JsonReportAdapter {
    fn write(&self, report: &BacktestReport, output_path: &Path) -> Result<(), MqlError> {
        let json = self.render(report)?;
        fs::write(output_path, json).map_err(|e| MqlError::Report {
            reason: format!("failed to write {}: {}", output_path.display(), e),
        })?;
        info!(path = %output_path.display(), "report written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::backtest::{BacktestOptions, BacktestRunner};
    use crate::domain::ohlcv::Candle;
    use tempfile::TempDir;

    fn report() -> BacktestReport {
        let source = r#"
            int ticks = 0;
            string last = "";
            void OnTick() { ticks++; last = "bar"; OrderSend(Symbol(), OP_BUY, 0.1, Ask, 0, 0, 0); }
        "#;
        let candles = vec![
            Candle::new(0, 1.0, 1.0, 1.0, 1.0),
            Candle::new(60, 1.1, 1.1, 1.1, 1.1),
        ];
        let mut runner = BacktestRunner::new(source, candles, BacktestOptions::default()).unwrap();
        runner.run().unwrap();
        runner.report()
    }

    #[test]
    fn renders_globals_metrics_and_orders() {
        let json: serde_json::Value =
            serde_json::from_str(&JsonReportAdapter::new(false).render(&report()).unwrap()).unwrap();
        assert_eq!(json["globals"]["ticks"], 2);
        assert_eq!(json["globals"]["last"], "bar");
        assert!(json["metrics"]["balance"].is_number());
        assert!(json["metrics"]["freeMargin"].is_number());
        assert_eq!(json["orders"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn writes_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("report.json");
        JsonReportAdapter::new(true).write(&report(), &path).unwrap();
        let written = fs::read_to_string(&path).unwrap();
        assert!(written.contains("\"globals\""));
        assert!(written.contains('\n'));
    }

    #[test]
    fn unwritable_path_is_report_error() {
        let err = JsonReportAdapter::new(true)
            .write(&report(), Path::new("/nonexistent/dir/report.json"))
            .unwrap_err();
        assert!(matches!(err, MqlError::Report { .. }));
    }
}
