//! CLI orchestration: option building, overrides and the program summary.

mod common;

use std::fs;
use std::io::Write;
use std::process::ExitCode;

use clap::Parser;
use common::*;
use mqlsim::adapters::file_config_adapter::FileConfigAdapter;
use mqlsim::cli::{self, Cli, Overrides};
use mqlsim::domain::backtest::ProgramType;
use mqlsim::domain::error::MqlError;
use mqlsim::domain::runtime::value::Value;
use tempfile::TempDir;

const CONFIG: &str = r#"
[backtest]
initial_balance = 2500
currency = EUR
symbol = EURUSD
timeframe = 5

[inputs]
Period = 14
Factor = 1.5
Label = fast
"#;

const EXPERT: &str = r#"
    #property strict
    input int Period = 3;
    int ticks = 0;
    int OnInit() { return 0; }
    void OnTick() { ticks++; }
    void OnDeinit(const int reason) {}
"#;

mod options {
    use super::*;

    #[test]
    fn built_from_config_sections() {
        let adapter = FileConfigAdapter::from_string(CONFIG).unwrap();
        let options = cli::build_backtest_options(&adapter).unwrap();
        assert_eq!(options.initial_balance, 2500.0);
        assert_eq!(options.account_currency, "EUR");
        assert_eq!(options.symbol, "EURUSD");
        assert_eq!(options.timeframe, Some(300));
        assert_eq!(options.input_values["Period"], Value::Int(14));
        assert_eq!(options.input_values["Factor"], Value::Double(1.5));
        assert_eq!(options.input_values["Label"], Value::Str("fast".into()));
    }

    #[test]
    fn defaults_without_sections() {
        let adapter = FileConfigAdapter::from_string("[backtest]\n").unwrap();
        let options = cli::build_backtest_options(&adapter).unwrap();
        assert_eq!(options.initial_balance, 10_000.0);
        assert_eq!(options.timeframe, None);
        assert!(options.input_values.is_empty());
    }

    #[test]
    fn invalid_values_are_config_errors() {
        for content in [
            "[backtest]\ninitial_balance = -5\n",
            "[backtest]\ninitial_margin = -1\n",
            "[backtest]\ntimeframe = -15\n",
        ] {
            let adapter = FileConfigAdapter::from_string(content).unwrap();
            let err = cli::build_backtest_options(&adapter).unwrap_err();
            assert!(matches!(err, MqlError::ConfigInvalid { .. }), "{content}");
        }
    }

    #[test]
    fn command_line_overrides_win() {
        let adapter = FileConfigAdapter::from_string(CONFIG).unwrap();
        let mut options = cli::build_backtest_options(&adapter).unwrap();
        let overrides = Overrides {
            symbol: Some("GBPUSD".into()),
            balance: Some(99.0),
            timeframe: Some(60),
            inputs: vec![("Period".into(), "21".into()), ("Extra".into(), "true".into())],
        };
        cli::apply_overrides(&mut options, &overrides).unwrap();
        assert_eq!(options.symbol, "GBPUSD");
        assert_eq!(options.initial_balance, 99.0);
        assert_eq!(options.timeframe, Some(3600));
        assert_eq!(options.input_values["Period"], Value::Int(21));
        assert_eq!(options.input_values["Extra"], Value::Bool(true));
    }

    #[test]
    fn input_values_prefer_numbers() {
        assert_eq!(cli::input_value("7"), Value::Int(7));
        assert_eq!(cli::input_value("7.25"), Value::Double(7.25));
        assert_eq!(cli::input_value("\"quoted\""), Value::Str("quoted".into()));
    }
}

mod pipeline {
    use super::*;

    #[test]
    fn runs_and_reports() {
        let (kind, report) =
            cli::run_backtest_pipeline(EXPERT, minute_candles(&[1.0, 1.1, 1.2]), Default::default()).unwrap();
        assert_eq!(kind, ProgramType::Expert);
        assert_eq!(report.globals["ticks"], serde_json::json!(3));
    }

    #[test]
    fn describes_program() {
        let summary = cli::describe_program(EXPERT).unwrap();
        assert_eq!(summary.program_type, ProgramType::Expert);
        assert_eq!(summary.handlers, vec!["OnInit", "OnTick", "OnDeinit"]);
        assert_eq!(summary.inputs, vec!["Period".to_string()]);
        assert!(summary.properties.iter().any(|(name, _)| name == "strict"));
    }

    #[test]
    fn loads_indicator_directory() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("Trend.mq4"), "int OnCalculate() { return 0; }").unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();
        let sources = cli::load_indicator_sources(dir.path()).unwrap();
        assert_eq!(sources.len(), 1);
        assert!(sources.contains_key("Trend"));
    }

    #[test]
    fn backtest_command_writes_report() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("expert.mq4");
        let data = dir.path().join("bars.csv");
        let config = dir.path().join("run.ini");
        let output = dir.path().join("report.json");
        fs::write(&source, EXPERT).unwrap();
        fs::write(&data, "2024.01.01,00:00,1.0,1.1,0.9,1.05\n2024.01.01,00:01,1.05,1.2,1.0,1.1\n").unwrap();
        let mut file = fs::File::create(&config).unwrap();
        file.write_all(CONFIG.as_bytes()).unwrap();

        let cli = Cli::try_parse_from([
            "mqlsim",
            "backtest",
            "--source",
            source.to_str().unwrap(),
            "--data",
            data.to_str().unwrap(),
            "--config",
            config.to_str().unwrap(),
            "--output",
            output.to_str().unwrap(),
            "--input",
            "Period=9",
        ])
        .unwrap();
        assert_eq!(cli::run(cli), ExitCode::SUCCESS);

        let report: serde_json::Value = serde_json::from_str(&fs::read_to_string(&output).unwrap()).unwrap();
        assert_eq!(report["globals"]["ticks"], 2);
        assert_eq!(report["globals"]["Period"], 9);
        assert_eq!(report["metrics"]["balance"], 2500.0);
    }

    #[test]
    fn missing_source_maps_to_io_exit_code() {
        let cli = Cli::try_parse_from(["mqlsim", "check", "--source", "/nonexistent/x.mq4"]).unwrap();
        assert_eq!(cli::run(cli), ExitCode::from(1));
    }

    #[test]
    fn malformed_input_flag_is_rejected() {
        let parsed = Cli::try_parse_from([
            "mqlsim", "backtest", "--source", "a", "--data", "b", "--input", "novalue",
        ]);
        assert!(parsed.is_err());
    }
}
