//! Core domain: language front end, interpreter, builtins, indicator engine
//! and the simulated market/broker/account driven by the backtest runner.

pub mod ohlcv;
pub mod error;
pub mod lang;
pub mod runtime;
pub mod builtins;
pub mod indicator;
pub mod services;
pub mod market;
pub mod broker;
pub mod account;
pub mod terminal;
pub mod backtest;
