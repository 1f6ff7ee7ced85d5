//! Symbol properties and quotes (`MarketInfo`, `SymbolInfo*`, `Symbol*`).

use crate::domain::builtins::BuiltinRegistry;
use crate::domain::builtins::args::{arg, bool_arg, i64_arg, ok_bool, ok_f64, ok_i64, ok_str, str_arg};
use crate::domain::error::MqlError;
use crate::domain::runtime::value::Value;
use crate::domain::services::Services;

type R = Result<Value, MqlError>;

const ERR_UNKNOWN_SYMBOL: i64 = 4106;

const MODE_LOW: i64 = 1;
const MODE_HIGH: i64 = 2;
const MODE_TIME: i64 = 5;
const MODE_BID: i64 = 9;
const MODE_ASK: i64 = 10;
const MODE_POINT: i64 = 11;
const MODE_DIGITS: i64 = 12;
const MODE_SPREAD: i64 = 13;
const MODE_STOPLEVEL: i64 = 14;
const MODE_LOTSIZE: i64 = 15;
const MODE_TICKVALUE: i64 = 16;
const MODE_TICKSIZE: i64 = 17;
const MODE_MINLOT: i64 = 23;
const MODE_LOTSTEP: i64 = 24;
const MODE_MAXLOT: i64 = 25;

const SYMBOL_BID: i64 = 1;
const SYMBOL_ASK: i64 = 4;
const SYMBOL_TIME: i64 = 15;
const SYMBOL_POINT: i64 = 16;
const SYMBOL_DIGITS: i64 = 17;
const SYMBOL_SPREAD: i64 = 18;

pub fn register(r: &mut BuiltinRegistry) {
    r.register("MarketInfo", market_info);
    r.register("Symbol", |s, _| ok_str(s.symbol.clone()));
    r.register("Period", |s, _| ok_i64(s.period_minutes()));
    r.register("SymbolInfoDouble", symbol_info_double);
    r.register("SymbolInfoInteger", symbol_info_integer);
    r.register("SymbolsTotal", |s, a| {
        ok_i64(s.market.symbols(bool_arg(a, 0, false)).len() as i64)
    });
    r.register("SymbolName", |s, a| {
        let names = s.market.symbols(bool_arg(a, 1, false));
        let name = usize::try_from(i64_arg(a, 0, -1))
            .ok()
            .and_then(|i| names.get(i).cloned())
            .unwrap_or_default();
        ok_str(name)
    });
    r.register("SymbolSelect", |s, a| {
        ok_bool(s.market.select(&str_arg(a, 0), bool_arg(a, 1, true)))
    });
    r.register("RefreshRates", |_, _| ok_bool(true));
}

/// Bid/ask of `symbol` at the current bar: the chart quote, the latest
/// tick, or the last visible close.
pub(crate) fn quote(services: &mut Services, symbol: &str) -> Option<(f64, f64)> {
    if symbol == services.symbol {
        return Some((services.bid, services.ask));
    }
    if let Some(tick) = services.market.tick_at(symbol, services.time) {
        return Some((tick.bid, tick.ask));
    }
    let timeframe = services.timeframe;
    services
        .visible_candles(symbol, timeframe)
        .last()
        .map(|c| (c.close, c.close))
}

fn known(services: &mut Services, symbol: &str) -> bool {
    if symbol == services.symbol || services.market.has_symbol(symbol) {
        return true;
    }
    services.last_error = ERR_UNKNOWN_SYMBOL;
    false
}

fn spread_points(services: &Services, bid: f64, ask: f64) -> i64 {
    if services.point <= 0.0 {
        return 0;
    }
    ((ask - bid) / services.point).round() as i64
}

/// `MarketInfo(symbol, mode)`. Unknown symbols read as 0.
fn market_info(services: &mut Services, args: &[Value]) -> R {
    let symbol = services.resolve_symbol(&arg(args, 0));
    if !known(services, &symbol) {
        return ok_f64(0.0);
    }
    let (bid, ask) = quote(services, &symbol).unwrap_or_default();
    let mode = i64_arg(args, 1, -1);
    let value = match mode {
        MODE_LOW | MODE_HIGH => {
            let timeframe = services.timeframe;
            let candles = services.visible_candles(&symbol, timeframe);
            match candles.last() {
                Some(c) if mode == MODE_LOW => c.low,
                Some(c) => c.high,
                None => 0.0,
            }
        }
        MODE_TIME => services.time as f64,
        MODE_BID => bid,
        MODE_ASK => ask,
        MODE_POINT | MODE_TICKSIZE => services.point,
        MODE_DIGITS => services.digits as f64,
        MODE_SPREAD => spread_points(services, bid, ask) as f64,
        MODE_STOPLEVEL => 0.0,
        MODE_LOTSIZE => 100_000.0,
        MODE_TICKVALUE => 1.0,
        MODE_MINLOT | MODE_LOTSTEP => 0.01,
        MODE_MAXLOT => 100.0,
        _ => 0.0,
    };
    ok_f64(value)
}

fn symbol_info_double(services: &mut Services, args: &[Value]) -> R {
    let symbol = services.resolve_symbol(&arg(args, 0));
    if !known(services, &symbol) {
        return ok_f64(0.0);
    }
    let (bid, ask) = quote(services, &symbol).unwrap_or_default();
    ok_f64(match i64_arg(args, 1, -1) {
        SYMBOL_BID => bid,
        SYMBOL_ASK => ask,
        SYMBOL_POINT => services.point,
        _ => 0.0,
    })
}

fn symbol_info_integer(services: &mut Services, args: &[Value]) -> R {
    let symbol = services.resolve_symbol(&arg(args, 0));
    if !known(services, &symbol) {
        return ok_i64(0);
    }
    let (bid, ask) = quote(services, &symbol).unwrap_or_default();
    ok_i64(match i64_arg(args, 1, -1) {
        SYMBOL_DIGITS => services.digits,
        SYMBOL_SPREAD => spread_points(services, bid, ask),
        SYMBOL_TIME => services.time,
        _ => 0,
    })
}
