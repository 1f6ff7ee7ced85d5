use crate::domain::builtins::BuiltinRegistry;
use crate::domain::builtins::args::{f64_arg, i64_arg, ok_bool, str_arg};
use crate::domain::error::MqlError;
use crate::domain::runtime::value::Value;
use crate::domain::services::Services;
use crate::domain::terminal::ChartEvent;

type R = Result<Value, MqlError>;

/// `CHARTEVENT_CUSTOM`: custom event ids are reported offset by this value.
pub const CHARTEVENT_CUSTOM: i64 = 1000;

pub fn register(r: &mut BuiltinRegistry) {
    r.register("EventSetTimer", |s, a| {
        let now = s.time;
        ok_bool(s.terminal.set_timer(i64_arg(a, 0, 0), now))
    });
    r.register("EventSetMillisecondTimer", |s, a| {
        // Bars have whole-second timestamps.
        let ms = i64_arg(a, 0, 0);
        let now = s.time;
        ok_bool(ms > 0 && s.terminal.set_timer((ms + 999) / 1000, now))
    });
    r.register("EventKillTimer", |s, _| {
        s.terminal.kill_timer();
        Ok(Value::Void)
    });
    r.register("EventChartCustom", event_chart_custom);
}

/// `EventChartCustom(chart_id, event_id, lparam, dparam, sparam)`.
fn event_chart_custom(services: &mut Services, args: &[Value]) -> R {
    let event_id = i64_arg(args, 1, 0);
    if !(0..=65_535 - CHARTEVENT_CUSTOM).contains(&event_id) {
        return ok_bool(false);
    }
    services.terminal.queue_chart_event(ChartEvent {
        id: CHARTEVENT_CUSTOM + event_id,
        lparam: i64_arg(args, 2, 0),
        dparam: f64_arg(args, 3, 0.0),
        sparam: str_arg(args, 4),
    });
    ok_bool(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::builtins::test_support::{call, s};

    #[test]
    fn timer_starts_from_current_bar() {
        let mut sv = Services::default();
        sv.time = 600;
        assert_eq!(call(&mut sv, "EventSetTimer", vec![Value::Int(60)]), Value::Bool(true));
        assert!(!sv.terminal.should_trigger_timer(659));
        assert!(sv.terminal.should_trigger_timer(660));
        call(&mut sv, "EventKillTimer", vec![]);
        assert!(!sv.terminal.should_trigger_timer(10_000));
    }

    #[test]
    fn millisecond_timer_rounds_up() {
        let mut sv = Services::default();
        call(&mut sv, "EventSetMillisecondTimer", vec![Value::Int(1500)]);
        assert!(!sv.terminal.should_trigger_timer(1));
        assert!(sv.terminal.should_trigger_timer(2));
    }

    #[test]
    fn custom_events_are_offset() {
        let mut sv = Services::default();
        let ok = call(
            &mut sv,
            "EventChartCustom",
            vec![Value::Int(0), Value::Int(7), Value::Int(2), Value::Double(0.5), s("hi")],
        );
        assert_eq!(ok, Value::Bool(true));
        let events = sv.terminal.take_chart_events();
        assert_eq!(
            events,
            vec![ChartEvent {
                id: 1007,
                lparam: 2,
                dparam: 0.5,
                sparam: "hi".into()
            }]
        );
    }
}
