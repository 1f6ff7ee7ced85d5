use chrono::{DateTime, Datelike, Timelike, Utc};

use crate::domain::builtins::BuiltinRegistry;
use crate::domain::builtins::args::{i64_arg, ok_i64};
use crate::domain::error::MqlError;
use crate::domain::runtime::value::Value;
use crate::domain::services::Services;

type R = Result<Value, MqlError>;

#[derive(Clone, Copy)]
enum Part {
    Year,
    Month,
    Day,
    Hour,
    Minute,
    Second,
    DayOfWeek,
    DayOfYear,
}

fn part(time: i64, part: Part) -> i64 {
    let Some(dt): Option<DateTime<Utc>> = DateTime::from_timestamp(time, 0) else {
        return 0;
    };
    (match part {
        Part::Year => dt.year() as u32,
        Part::Month => dt.month(),
        Part::Day => dt.day(),
        Part::Hour => dt.hour(),
        Part::Minute => dt.minute(),
        Part::Second => dt.second(),
        Part::DayOfWeek => dt.weekday().num_days_from_sunday(),
        Part::DayOfYear => dt.ordinal(),
    }) as i64
}

pub fn register(r: &mut BuiltinRegistry) {
    r.register("TimeCurrent", |s, _| ok_i64(s.time));
    r.register("TimeLocal", |s, _| ok_i64(s.time));
    r.register("TimeGMT", |s, _| ok_i64(s.time));

    // Current-bar accessors.
    r.register("Year", |s, _| current(s, Part::Year));
    r.register("Month", |s, _| current(s, Part::Month));
    r.register("Day", |s, _| current(s, Part::Day));
    r.register("Hour", |s, _| current(s, Part::Hour));
    r.register("Minute", |s, _| current(s, Part::Minute));
    r.register("Seconds", |s, _| current(s, Part::Second));
    r.register("DayOfWeek", |s, _| current(s, Part::DayOfWeek));
    r.register("DayOfYear", |s, _| current(s, Part::DayOfYear));

    r.register("TimeYear", |_, a| of(a, Part::Year));
    r.register("TimeMonth", |_, a| of(a, Part::Month));
    r.register("TimeDay", |_, a| of(a, Part::Day));
    r.register("TimeHour", |_, a| of(a, Part::Hour));
    r.register("TimeMinute", |_, a| of(a, Part::Minute));
    r.register("TimeSeconds", |_, a| of(a, Part::Second));
    r.register("TimeDayOfWeek", |_, a| of(a, Part::DayOfWeek));
    r.register("TimeDayOfYear", |_, a| of(a, Part::DayOfYear));
}

fn current(services: &Services, p: Part) -> R {
    ok_i64(part(services.time, p))
}

fn of(args: &[Value], p: Part) -> R {
    ok_i64(part(i64_arg(args, 0, 0), p))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::builtins::test_support::call;

    // 2024-03-15 13:45:30 UTC, a Friday.
    const T: i64 = 1_710_510_330;

    #[test]
    fn parts_of_timestamp() {
        let mut s = Services::default();
        let at = |s: &mut Services, name| call(s, name, vec![Value::Int(T)]);
        assert_eq!(at(&mut s, "TimeYear"), Value::Int(2024));
        assert_eq!(at(&mut s, "TimeMonth"), Value::Int(3));
        assert_eq!(at(&mut s, "TimeDay"), Value::Int(15));
        assert_eq!(at(&mut s, "TimeHour"), Value::Int(13));
        assert_eq!(at(&mut s, "TimeMinute"), Value::Int(45));
        assert_eq!(at(&mut s, "TimeSeconds"), Value::Int(30));
        assert_eq!(at(&mut s, "TimeDayOfWeek"), Value::Int(5));
        assert_eq!(at(&mut s, "TimeDayOfYear"), Value::Int(75));
    }

    #[test]
    fn current_bar_accessors() {
        let mut s = Services::default();
        s.time = T;
        assert_eq!(call(&mut s, "TimeCurrent", vec![]), Value::Int(T));
        assert_eq!(call(&mut s, "Hour", vec![]), Value::Int(13));
        assert_eq!(call(&mut s, "DayOfWeek", vec![]), Value::Int(5));
    }
}
