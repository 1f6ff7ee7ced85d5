//! End-to-end backtests through `BacktestRunner`.
//!
//! Tests cover:
//! - Handler order for experts over a short series
//! - Order lifecycle from program code to account metrics
//! - Indicator cache keying across parameter sets
//! - Custom indicators through iCustom, including cycles
//! - Coarser timeframes read from a finer chart
//! - Chart objects drawn from program code
//! - Reports for finished runs

mod common;

use approx::assert_relative_eq;
use common::*;
use mqlsim::domain::backtest::{BacktestOptions, ProgramType};
use mqlsim::domain::broker::OrderState;
use mqlsim::domain::error::MqlError;
use mqlsim::domain::runtime::value::Value;

mod event_order {
    use super::*;

    const LOGGER: &str = r#"
        double seen[];
        int inits = 0;
        int deinits = 0;
        int OnInit() { inits++; return 0; }
        void OnTick() {
            int n = ArraySize(seen);
            ArrayResize(seen, n + 1);
            seen[n] = Close[0];
        }
        void OnDeinit(const int reason) { deinits++; }
    "#;

    #[test]
    fn ticks_see_each_close_in_order() {
        let mut r = runner(LOGGER, minute_candles(&[1.05, 1.10, 1.15]));
        r.run().unwrap();

        let seen = r.global("seen").unwrap();
        let items: Vec<f64> = seen
            .as_array()
            .unwrap()
            .borrow()
            .items
            .iter()
            .map(Value::to_f64)
            .collect();
        assert_eq!(items, vec![1.05, 1.10, 1.15]);
        assert_eq!(r.global("inits"), Some(Value::Int(1)));
        assert_eq!(r.global("deinits"), Some(Value::Int(1)));
        assert!(r.is_finished());
    }

    #[test]
    fn legacy_handler_names_run() {
        let source = r#"
            int calls = 0;
            int init() { calls += 100; return 0; }
            int start() { calls++; return 0; }
        "#;
        let mut r = runner(source, minute_candles(&[1.0, 1.0]));
        assert_eq!(r.program_type(), ProgramType::Expert);
        r.run().unwrap();
        assert_eq!(r.global("calls"), Some(Value::Int(102)));
    }

    #[test]
    fn runtime_errors_in_ticks_stop_the_run() {
        let source = r#"
            void OnTick() { Missing(1); }
        "#;
        let mut r = runner(source, minute_candles(&[1.0]));
        let err = r.run().unwrap_err();
        assert!(matches!(err, MqlError::UnknownFunction { .. }));
    }
}

mod orders {
    use super::*;

    const TRADER: &str = r#"
        int ticket = -1;
        double realized = 0;
        void OnTick() {
            if (Bars == 1) {
                ticket = OrderSend(Symbol(), OP_BUY, 2.0, Ask, 3, 0, 0, "entry", 7);
            }
            if (Bars == 3 && OrderSelect(ticket, SELECT_BY_TICKET)) {
                OrderClose(ticket, OrderLots(), Bid, 3);
                if (OrderSelect(ticket, SELECT_BY_TICKET, MODE_HISTORY)) realized = OrderProfit();
            }
        }
    "#;

    #[test]
    fn send_then_close_moves_to_history() {
        let mut r = runner(TRADER, minute_candles(&[1.10, 1.15, 1.20, 1.25]));
        r.run().unwrap();

        let broker = &r.services().broker;
        let history = broker.history();
        assert_eq!(history.len(), 1);
        let order = history[0];
        assert_eq!(order.state, OrderState::Closed);
        assert_eq!(order.magic, 7);
        assert_eq!(order.comment, "entry");
        assert_eq!(order.close_time, Some(120));
        assert_relative_eq!(order.close_price.unwrap(), 1.20, epsilon = 1e-9);
        assert_relative_eq!(order.profit, 0.2, epsilon = 1e-9);

        assert_relative_eq!(global_f64(&r, "realized"), order.profit, epsilon = 1e-12);
        let metrics = r.metrics();
        assert_relative_eq!(metrics.closed_profit, order.profit, epsilon = 1e-12);
        assert_relative_eq!(metrics.balance, 10_000.0 + order.profit, epsilon = 1e-9);
        assert_relative_eq!(metrics.open_profit, 0.0);
    }

    #[test]
    fn open_orders_float_with_the_market() {
        let source = r#"
            void OnTick() { if (Bars == 1) OrderSend(Symbol(), OP_SELL, 1.0, Bid, 0, 0, 0); }
        "#;
        let mut r = runner(source, minute_candles(&[1.30, 1.20]));
        r.run().unwrap();
        let metrics = r.metrics();
        assert_relative_eq!(metrics.open_profit, 0.1, epsilon = 1e-9);
        assert_relative_eq!(metrics.equity, metrics.balance + 0.1, epsilon = 1e-9);
        assert!(r.services().broker.history().is_empty());
    }
}

mod indicator_cache {
    use super::*;

    #[test]
    fn distinct_parameters_get_distinct_entries() {
        let source = r#"
            double first;
            double other;
            double again;
            void OnTick() {
                first = iMA("TEST", 15, 3, 0, 0, 6, 0);
                other = iMA("TEST", 15, 5, 0, 0, 6, 0);
                again = iMA("TEST", 15, 3, 0, 0, 6, 0);
            }
        "#;
        let mut r = runner(source, wave_candles(120, 60));
        r.run().unwrap();

        assert_eq!(r.services().indicators.len(), 2);
        assert_eq!(global_f64(&r, "first"), global_f64(&r, "again"));
        assert!(global_f64(&r, "first") > 1.0);
        assert_ne!(global_f64(&r, "first"), global_f64(&r, "other"));
    }
}

mod custom_indicators {
    use super::*;

    const MOMENTUM: &str = r#"
        input int Lag = 1;
        double Diff[];
        int OnInit() { SetIndexBuffer(0, Diff); return 0; }
        int OnCalculate(const int rates_total, const int prev_calculated, const int begin, const double &price[]) {
            Diff[0] = rates_total > Lag ? Close[0] - Close[Lag] : 0;
            return rates_total;
        }
    "#;

    #[test]
    fn expert_reads_custom_buffer() {
        let source = r#"
            double diff = 0;
            void OnTick() { diff = iCustom(NULL, 0, "Momentum", 2, 0, 0); }
        "#;
        let options = options_with_indicators(&[("Momentum", MOMENTUM)]);
        let mut r = runner_with(source, minute_candles(&[1.0, 1.5, 2.5, 4.0]), options);
        r.run().unwrap();
        assert_relative_eq!(global_f64(&r, "diff"), 2.5, epsilon = 1e-12);
    }

    #[test]
    fn program_calling_itself_is_rejected() {
        let source = r#"
            double Out[];
            int OnInit() { SetIndexBuffer(0, Out); return 0; }
            int OnCalculate(const int total, const int prev, const int begin, const double &price[]) {
                Out[0] = iCustom(NULL, 0, "Echo", 0, 0);
                return total;
            }
        "#;
        let options = BacktestOptions {
            program_name: Some("Echo".to_string()),
            ..options_with_indicators(&[("Echo", source)])
        };
        let mut r = runner_with(source, minute_candles(&[1.0, 1.1]), options);
        let err = r.run().unwrap_err();
        assert!(matches!(err, MqlError::CyclicIndicator { ref name } if name == "Echo"));
        assert!(r.services().custom.runners.is_empty());
    }

    #[test]
    fn mutual_recursion_is_rejected() {
        let caller = |other: &str| {
            format!(
                r#"
                double Out[];
                int OnInit() {{ SetIndexBuffer(0, Out); return 0; }}
                int OnCalculate(const int total, const int prev, const int begin, const double &price[]) {{
                    Out[0] = iCustom(NULL, 0, "{other}", 0, 0);
                    return total;
                }}
                "#
            )
        };
        let (a, b) = (caller("B"), caller("A"));
        let expert = r#"void OnTick() { iCustom(NULL, 0, "A", 0, 0); }"#;
        let options = options_with_indicators(&[("A", a.as_str()), ("B", b.as_str())]);
        let mut r = runner_with(expert, minute_candles(&[1.0, 1.1]), options);
        let err = r.run().unwrap_err();
        assert!(matches!(err, MqlError::CyclicIndicator { .. }));
    }
}

mod timeframes {
    use super::*;

    #[test]
    fn coarser_series_never_shows_later_bars() {
        let source = r#"
            double closes[6];
            double highs[6];
            void OnTick() {
                closes[Bars - 1] = iClose(NULL, 3, 0);
                highs[Bars - 1] = iHigh(NULL, 3, 0);
            }
        "#;
        let mut r = runner(source, minute_candles(&[1.0, 4.0, 2.0, 3.0, 6.0, 5.0]));
        r.run().unwrap();
        let closes = r.global("closes").unwrap().as_array().unwrap();
        let closes: Vec<f64> = closes.borrow().items.iter().map(Value::to_f64).collect();
        assert_eq!(closes, vec![1.0, 4.0, 2.0, 3.0, 6.0, 5.0]);
        let highs = r.global("highs").unwrap().as_array().unwrap();
        let highs: Vec<f64> = highs.borrow().items.iter().map(Value::to_f64).collect();
        assert_eq!(highs, vec![1.0, 4.0, 4.0, 3.0, 6.0, 6.0]);
    }
}

mod chart_objects {
    use super::*;

    #[test]
    fn expert_keeps_a_rolling_set_of_arrows() {
        let source = r#"
            int dup_error = 0;
            void OnTick() {
                ObjectCreate("bar_" + IntegerToString(Bars), OBJ_ARROW, 0, Time[0], Close[0]);
                ObjectDelete("bar_" + IntegerToString(Bars - 2));
                if (!ObjectCreate("status", OBJ_LABEL, 0, 0, 0)) dup_error = GetLastError();
                ObjectSetText("status", "bars " + IntegerToString(Bars), 10);
            }
        "#;
        let mut r = runner(source, minute_candles(&[1.0, 1.5, 2.0, 2.5]));
        r.run().unwrap();

        let terminal = &r.services().terminal;
        let names: Vec<&str> = terminal.objects().iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, vec!["status", "bar_3", "bar_4"]);
        let newest = terminal.object("bar_4").unwrap();
        assert_eq!(newest.points[0], (180, 2.5));
        assert_eq!(terminal.object("status").unwrap().text, "bars 4");
        assert_eq!(r.global("dup_error"), Some(Value::Int(4200)));
    }
}

mod reports {
    use super::*;

    #[test]
    fn report_carries_globals_metrics_and_orders() {
        let source = r#"
            input double Lots = 0.5;
            string state = "idle";
            void OnTick() { if (Bars == 2) { OrderSend(Symbol(), OP_BUY, Lots, Ask, 0, 0, 0); state = "long"; } }
        "#;
        let mut r = runner(source, minute_candles(&[1.0, 1.1, 1.3]));
        r.run().unwrap();
        let report = r.report();
        assert_eq!(report.globals["state"], serde_json::json!("long"));
        assert_eq!(report.globals["Lots"], serde_json::json!(0.5));
        assert!(!report.globals.contains_key("Bid"));
        assert_eq!(report.orders.len(), 1);
        assert_relative_eq!(report.metrics.open_profit, 0.1, epsilon = 1e-9);
    }
}
