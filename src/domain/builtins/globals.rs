//! Terminal global variables (`GlobalVariable*`).

use crate::domain::builtins::BuiltinRegistry;
use crate::domain::builtins::args::{f64_arg, i64_arg, ok_bool, ok_f64, ok_i64, ok_str, str_arg};
use crate::domain::error::MqlError;
use crate::domain::runtime::value::Value;
use crate::domain::services::Services;

type R = Result<Value, MqlError>;

const ERR_GLOBAL_VARIABLE_NOT_FOUND: i64 = 4058;

pub fn register(r: &mut BuiltinRegistry) {
    r.register("GlobalVariableSet", |s, a| {
        let time = s.time;
        ok_i64(s.terminal.set_global(&str_arg(a, 0), f64_arg(a, 1, 0.0), time))
    });
    r.register("GlobalVariableGet", global_get);
    r.register("GlobalVariableCheck", |s, a| {
        ok_bool(s.terminal.global(&str_arg(a, 0)).is_some())
    });
    r.register("GlobalVariableDel", |s, a| ok_bool(s.terminal.delete_global(&str_arg(a, 0))));
    r.register("GlobalVariableTime", |s, a| {
        ok_i64(s.terminal.global(&str_arg(a, 0)).map_or(0, |g| g.time))
    });
    r.register("GlobalVariablesDeleteAll", |s, a| {
        ok_i64(s.terminal.delete_globals(&str_arg(a, 0)) as i64)
    });
    r.register("GlobalVariablesTotal", |s, _| ok_i64(s.terminal.globals_total() as i64));
    r.register("GlobalVariableName", |s, a| {
        let index = i64_arg(a, 0, -1);
        let name = usize::try_from(index)
            .ok()
            .and_then(|i| s.terminal.global_name(i))
            .unwrap_or("");
        ok_str(name)
    });
    r.register("GlobalVariableTemp", global_temp);
    r.register("GlobalVariableSetOnCondition", |s, a| {
        let time = s.time;
        ok_bool(s.terminal.set_global_on_condition(
            &str_arg(a, 0),
            f64_arg(a, 1, 0.0),
            f64_arg(a, 2, 0.0),
            time,
        ))
    });
    r.register("GlobalVariablesFlush", |_, _| Ok(Value::Void));
}

/// Missing variables read as 0 and set `ERR_GLOBAL_VARIABLE_NOT_FOUND`.
fn global_get(services: &mut Services, args: &[Value]) -> R {
    match services.terminal.global(&str_arg(args, 0)) {
        Some(g) => ok_f64(g.value),
        None => {
            services.last_error = ERR_GLOBAL_VARIABLE_NOT_FOUND;
            ok_f64(0.0)
        }
    }
}

/// Create the variable at 0 unless it already exists.
fn global_temp(services: &mut Services, args: &[Value]) -> R {
    let name = str_arg(args, 0);
    if services.terminal.global(&name).is_some() {
        return ok_bool(false);
    }
    let time = services.time;
    services.terminal.set_global(&name, 0.0, time);
    ok_bool(true)
}
