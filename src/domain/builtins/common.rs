//! Output, error state and terminal checks.

use tracing::info;

use crate::domain::builtins::BuiltinRegistry;
use crate::domain::builtins::args::{i64_arg, ok_bool, ok_i64, ok_str};
use crate::domain::builtins::string::format_arguments;
use crate::domain::error::MqlError;
use crate::domain::runtime::value::Value;
use crate::domain::services::Services;

type R = Result<Value, MqlError>;

const TERMINAL_BUILD: i64 = 5;
const TERMINAL_CONNECTED: i64 = 6;
const TERMINAL_TRADE_ALLOWED: i64 = 8;

pub fn register(r: &mut BuiltinRegistry) {
    r.register("Print", print);
    r.register("PrintFormat", print_format);
    r.register("printf", print_format);
    r.register("Alert", alert);
    r.register("Comment", comment);
    r.register("GetTickCount", |s, _| ok_i64(s.started.elapsed().as_millis() as i64));
    r.register("Sleep", |_, _| Ok(Value::Void));
    r.register("GetLastError", get_last_error);
    r.register("ResetLastError", |s, _| {
        s.last_error = 0;
        Ok(Value::Void)
    });
    r.register("IsStopped", |s, _| ok_bool(s.stop_requested));
    r.register("ExpertRemove", |s, _| {
        s.stop_requested = true;
        Ok(Value::Void)
    });
    r.register("UninitializeReason", |_, _| ok_i64(0));
    r.register("IsTesting", |_, _| ok_bool(true));
    r.register("IsOptimization", |_, _| ok_bool(false));
    r.register("IsVisualMode", |_, _| ok_bool(false));
    r.register("IsDemo", |_, _| ok_bool(true));
    r.register("IsConnected", |_, _| ok_bool(true));
    r.register("IsTradeAllowed", |_, _| ok_bool(true));
    r.register("TerminalInfoInteger", terminal_info_integer);
    r.register("TerminalCompany", |_, _| ok_str("mqlsim"));
    r.register("TerminalName", |_, _| ok_str("mqlsim backtester"));
}

fn joined(args: &[Value]) -> String {
    args.iter().map(|a| a.unref().to_string()).collect()
}

fn emit(services: &mut Services, line: String) {
    info!(target: "mql", symbol = %services.symbol, time = services.time, "{}", line);
    services.terminal.print(line);
}

fn print(services: &mut Services, args: &[Value]) -> R {
    emit(services, joined(args));
    Ok(Value::Void)
}

fn print_format(services: &mut Services, args: &[Value]) -> R {
    emit(services, format_arguments(args));
    Ok(Value::Void)
}

fn alert(services: &mut Services, args: &[Value]) -> R {
    emit(services, format!("Alert: {}", joined(args)));
    Ok(Value::Void)
}

fn comment(services: &mut Services, args: &[Value]) -> R {
    let text = joined(args);
    info!(target: "mql", "comment: {}", text);
    services.terminal.set_comment(text);
    Ok(Value::Void)
}

/// Returns the last error code and clears it.
fn get_last_error(services: &mut Services, _: &[Value]) -> R {
    let code = services.last_error;
    services.last_error = 0;
    ok_i64(code)
}

fn terminal_info_integer(_: &mut Services, args: &[Value]) -> R {
    ok_i64(match i64_arg(args, 0, -1) {
        TERMINAL_CONNECTED | TERMINAL_TRADE_ALLOWED | TERMINAL_BUILD => 1,
        _ => 0,
    })
}
