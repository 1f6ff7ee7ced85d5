//! CLI definition and dispatch.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::info;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::json_report_adapter::JsonReportAdapter;
use crate::domain::backtest::{BacktestOptions, BacktestReport, BacktestRunner, ProgramType};
use crate::domain::error::MqlError;
use crate::domain::ohlcv::Candle;
use crate::domain::runtime::program::RuntimeState;
use crate::domain::runtime::value::Value;
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;
use crate::ports::report_port::ReportPort;

/// Event handlers reported by `check`, in lifecycle order.
pub const HANDLERS: [&str; 9] = [
    "OnInit",
    "OnStart",
    "OnTick",
    "OnCalculate",
    "OnTimer",
    "OnTrade",
    "OnChartEvent",
    "OnTester",
    "OnDeinit",
];

#[derive(Parser, Debug)]
#[command(name = "mqlsim", about = "MQL4/MQL5 program interpreter and backtester")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a program over a candle file
    Backtest {
        #[arg(short, long)]
        source: PathBuf,
        #[arg(short, long)]
        data: PathBuf,
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(long)]
        symbol: Option<String>,
        #[arg(long)]
        balance: Option<f64>,
        /// Chart timeframe in minutes
        #[arg(long)]
        timeframe: Option<i64>,
        /// Directory of custom indicator sources for iCustom
        #[arg(long)]
        indicators: Option<PathBuf>,
        /// Input override as name=value, repeatable
        #[arg(long = "input", value_parser = parse_input)]
        inputs: Vec<(String, String)>,
    },
    /// Parse a program and list its kind and handlers
    Check {
        #[arg(short, long)]
        source: PathBuf,
    },
}

/// Install the stderr log subscriber. `RUST_LOG` overrides the `info` default.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

pub fn run(cli: Cli) -> ExitCode {
    let result = match cli.command {
        Command::Backtest {
            source,
            data,
            config,
            output,
            symbol,
            balance,
            timeframe,
            indicators,
            inputs,
        } => {
            let overrides = Overrides {
                symbol,
                balance,
                timeframe,
                inputs,
            };
            run_backtest(
                &source,
                &data,
                config.as_deref(),
                output.as_deref(),
                indicators.as_deref(),
                &overrides,
            )
        }
        Command::Check { source } => run_check(&source),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::from(&e)
        }
    }
}

/// Command line values that take precedence over the config file.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub symbol: Option<String>,
    pub balance: Option<f64>,
    /// Minutes.
    pub timeframe: Option<i64>,
    pub inputs: Vec<(String, String)>,
}

fn parse_input(text: &str) -> Result<(String, String), String> {
    match text.split_once('=') {
        Some((name, value)) if !name.trim().is_empty() => {
            Ok((name.trim().to_string(), value.trim().to_string()))
        }
        _ => Err(format!("expected name=value, got '{}'", text)),
    }
}

/// Interpret an input override: integer, then double, then bool, else string.
pub fn input_value(text: &str) -> Value {
    if let Ok(i) = text.parse::<i64>() {
        return Value::Int(i);
    }
    if let Ok(d) = text.parse::<f64>() {
        return Value::Double(d);
    }
    match text {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => Value::Str(text.trim_matches('"').to_string()),
    }
}

/// Build options from the `[backtest]` and `[inputs]` sections.
pub fn build_backtest_options(adapter: &dyn ConfigPort) -> Result<BacktestOptions, MqlError> {
    let defaults = BacktestOptions::default();

    let initial_balance = adapter.get_double("backtest", "initial_balance", defaults.initial_balance);
    if initial_balance.is_nan() || initial_balance <= 0.0 {
        return Err(MqlError::ConfigInvalid {
            section: "backtest".into(),
            key: "initial_balance".into(),
            reason: "must be positive".into(),
        });
    }
    let initial_margin = adapter.get_double("backtest", "initial_margin", defaults.initial_margin);
    if initial_margin < 0.0 {
        return Err(MqlError::ConfigInvalid {
            section: "backtest".into(),
            key: "initial_margin".into(),
            reason: "must not be negative".into(),
        });
    }
    let timeframe = match adapter.get_int("backtest", "timeframe", 0) {
        0 => None,
        minutes if minutes > 0 => Some(minutes * 60),
        _ => {
            return Err(MqlError::ConfigInvalid {
                section: "backtest".into(),
                key: "timeframe".into(),
                reason: "must be a positive number of minutes".into(),
            });
        }
    };

    let input_values = adapter
        .section("inputs")
        .into_iter()
        .map(|(name, text)| (name, input_value(&text)))
        .collect();

    Ok(BacktestOptions {
        initial_balance,
        initial_margin,
        account_currency: adapter
            .get_string("backtest", "currency")
            .unwrap_or(defaults.account_currency),
        symbol: adapter.get_string("backtest", "symbol").unwrap_or(defaults.symbol),
        entry_point: adapter.get_string("backtest", "entry_point"),
        timeframe,
        input_values,
        ..defaults
    })
}

pub fn apply_overrides(options: &mut BacktestOptions, overrides: &Overrides) -> Result<(), MqlError> {
    if let Some(symbol) = &overrides.symbol {
        options.symbol = symbol.clone();
    }
    if let Some(balance) = overrides.balance {
        if balance.is_nan() || balance <= 0.0 {
            return Err(MqlError::ConfigInvalid {
                section: "cli".into(),
                key: "balance".into(),
                reason: "must be positive".into(),
            });
        }
        options.initial_balance = balance;
    }
    if let Some(minutes) = overrides.timeframe {
        if minutes <= 0 {
            return Err(MqlError::ConfigInvalid {
                section: "cli".into(),
                key: "timeframe".into(),
                reason: "must be a positive number of minutes".into(),
            });
        }
        options.timeframe = Some(minutes * 60);
    }
    for (name, text) in &overrides.inputs {
        options.input_values.insert(name.clone(), input_value(text));
    }
    Ok(())
}

/// Every `.mq4`/`.mq5` file in `dir`, keyed by file stem.
pub fn load_indicator_sources(dir: &Path) -> Result<HashMap<String, String>, MqlError> {
    let mut sources = HashMap::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let is_program = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("mq4") || e.eq_ignore_ascii_case("mq5"));
        if !is_program {
            continue;
        }
        if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
            sources.insert(stem.to_string(), fs::read_to_string(&path)?);
        }
    }
    Ok(sources)
}

/// Compile, run to completion and report.
pub fn run_backtest_pipeline(
    source: &str,
    candles: Vec<Candle>,
    options: BacktestOptions,
) -> Result<(ProgramType, BacktestReport), MqlError> {
    let mut runner = BacktestRunner::new(source, candles, options)?;
    runner.run()?;
    Ok((runner.program_type(), runner.report()))
}

fn run_backtest(
    source_path: &Path,
    data_path: &Path,
    config_path: Option<&Path>,
    output_path: Option<&Path>,
    indicator_dir: Option<&Path>,
    overrides: &Overrides,
) -> Result<(), MqlError> {
    let mut options = match config_path {
        Some(path) => {
            info!(path = %path.display(), "loading config");
            build_backtest_options(&FileConfigAdapter::from_file(path)?)?
        }
        None => BacktestOptions::default(),
    };
    apply_overrides(&mut options, overrides)?;
    if let Some(dir) = indicator_dir {
        options.indicator_source = load_indicator_sources(dir)?;
    }
    options.program_name = source_path
        .file_stem()
        .and_then(|s| s.to_str())
        .map(str::to_string);

    let source = fs::read_to_string(source_path)?;
    let candles = CsvAdapter::new().load_candles(data_path)?;
    info!(bars = candles.len(), data = %data_path.display(), "candles loaded");

    let (program_type, report) = run_backtest_pipeline(&source, candles, options)?;
    print_summary(program_type, &report);

    if let Some(path) = output_path {
        JsonReportAdapter::new(true).write(&report, path)?;
    }
    Ok(())
}

fn print_summary(program_type: ProgramType, report: &BacktestReport) {
    let m = &report.metrics;
    println!("Program:        {}", program_type.as_str());
    println!("Balance:        {:.2}", m.balance);
    println!("Equity:         {:.2}", m.equity);
    println!("Closed profit:  {:.2}", m.closed_profit);
    println!("Open profit:    {:.2}", m.open_profit);
    println!("Margin:         {:.2}", m.margin);
    println!("Free margin:    {:.2}", m.free_margin);
    println!("Orders:         {}", report.orders.len());
}

/// Kind, handlers and `#property` lines of a compiled program.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgramSummary {
    pub program_type: ProgramType,
    pub handlers: Vec<&'static str>,
    pub inputs: Vec<String>,
    pub properties: Vec<(String, String)>,
}

pub fn describe_program(source: &str) -> Result<ProgramSummary, MqlError> {
    let runtime = RuntimeState::compile(source)?;
    Ok(ProgramSummary {
        program_type: ProgramType::detect(&runtime),
        handlers: HANDLERS
            .iter()
            .copied()
            .filter(|h| runtime.has_function(h))
            .collect(),
        inputs: runtime.input_names(),
        properties: runtime.properties.clone(),
    })
}

fn run_check(source_path: &Path) -> Result<(), MqlError> {
    let source = fs::read_to_string(source_path)?;
    let summary = describe_program(&source).map_err(|e| match e {
        MqlError::Parse(p) => {
            eprintln!("{}", p.display_with_context(&source));
            MqlError::Parse(p)
        }
        other => other,
    })?;
    println!("Program:    {}", summary.program_type.as_str());
    println!("Handlers:   {}", summary.handlers.join(", "));
    if !summary.inputs.is_empty() {
        println!("Inputs:     {}", summary.inputs.join(", "));
    }
    for (name, value) in &summary.properties {
        println!("#property   {} {}", name, value);
    }
    Ok(())
}
