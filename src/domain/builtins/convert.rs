//! Number, character and time conversions.

use chrono::{DateTime, NaiveDateTime, NaiveTime};

use crate::domain::builtins::BuiltinRegistry;
use crate::domain::builtins::args::{f64_arg, i64_arg, ok_f64, ok_i64, ok_str, str_arg};
use crate::domain::error::MqlError;
use crate::domain::lang::lexer::parse_datetime_literal;
use crate::domain::runtime::value::Value;
use crate::domain::services::Services;

type R = Result<Value, MqlError>;

const TIME_DATE: i64 = 1;
const TIME_MINUTES: i64 = 2;
const TIME_SECONDS: i64 = 4;

pub fn register(r: &mut BuiltinRegistry) {
    r.register("IntegerToString", integer_to_string);
    r.register("DoubleToString", double_to_string);
    r.register("DoubleToStr", double_to_string);
    r.register("StringToDouble", |_, a| ok_f64(parse_double(&str_arg(a, 0))));
    r.register("StrToDouble", |_, a| ok_f64(parse_double(&str_arg(a, 0))));
    r.register("StringToInteger", |_, a| ok_i64(parse_integer(&str_arg(a, 0))));
    r.register("StrToInteger", |_, a| ok_i64(parse_integer(&str_arg(a, 0))));
    r.register("CharToString", char_to_string);
    r.register("CharToStr", char_to_string);
    r.register("TimeToString", time_to_string);
    r.register("TimeToStr", time_to_string);
    r.register("StringToTime", string_to_time);
    r.register("StrToTime", string_to_time);
}

/// `IntegerToString(value, width = 0, fill = ' ')`.
fn integer_to_string(_: &mut Services, args: &[Value]) -> R {
    let text = i64_arg(args, 0, 0).to_string();
    let width = i64_arg(args, 1, 0).max(0) as usize;
    let fill = char::from_u32(i64_arg(args, 2, ' ' as i64) as u32).unwrap_or(' ');
    let pad = width.saturating_sub(text.chars().count());
    ok_str(format!("{}{}", fill.to_string().repeat(pad), text))
}

/// `DoubleToString(value, digits = 8)`. Negative digits switch to
/// exponent notation.
fn double_to_string(_: &mut Services, args: &[Value]) -> R {
    let value = f64_arg(args, 0, 0.0);
    let digits = i64_arg(args, 1, 8);
    if digits < 0 {
        return ok_str(format!("{:.*e}", (-digits).min(16) as usize, value));
    }
    ok_str(format!("{:.*}", digits.min(16) as usize, value))
}

/// Leading numeric prefix, 0 when there is none.
fn parse_double(text: &str) -> f64 {
    let text = text.trim();
    let end = text
        .char_indices()
        .take_while(|(i, c)| {
            c.is_ascii_digit() || *c == '.' || ((*c == '-' || *c == '+') && *i == 0) || *c == 'e' || *c == 'E'
        })
        .last()
        .map_or(0, |(i, c)| i + c.len_utf8());
    (0..=end)
        .rev()
        .find_map(|e| text[..e].parse::<f64>().ok())
        .unwrap_or(0.0)
}

fn parse_integer(text: &str) -> i64 {
    let text = text.trim();
    let end = text
        .char_indices()
        .take_while(|(i, c)| c.is_ascii_digit() || ((*c == '-' || *c == '+') && *i == 0))
        .last()
        .map_or(0, |(i, _)| i + 1);
    text[..end].parse().unwrap_or(0)
}

fn char_to_string(_: &mut Services, args: &[Value]) -> R {
    let text = match args.first().map(Value::unref) {
        Some(Value::Str(s)) => s.chars().take(1).collect(),
        _ => char::from_u32(i64_arg(args, 0, 0) as u32)
            .map(String::from)
            .unwrap_or_default(),
    };
    ok_str(text)
}

/// Render epoch seconds as `yyyy.mm.dd hh:mi[:ss]` (UTC).
pub(crate) fn format_time(time: i64, flags: i64) -> String {
    let Some(dt) = DateTime::from_timestamp(time, 0) else {
        return String::new();
    };
    let mut parts = Vec::new();
    if flags & TIME_DATE != 0 {
        parts.push(dt.format("%Y.%m.%d").to_string());
    }
    if flags & TIME_SECONDS != 0 {
        parts.push(dt.format("%H:%M:%S").to_string());
    } else if flags & TIME_MINUTES != 0 {
        parts.push(dt.format("%H:%M").to_string());
    }
    parts.join(" ")
}

fn time_to_string(_: &mut Services, args: &[Value]) -> R {
    ok_str(format_time(
        i64_arg(args, 0, 0),
        i64_arg(args, 1, TIME_DATE | TIME_MINUTES),
    ))
}

/// Accepts `yyyy.mm.dd [hh:mi[:ss]]`, ISO-8601 dates, and a bare `hh:mi`
/// meaning that time on the current bar's day.
pub(crate) fn parse_time(text: &str, now: i64) -> i64 {
    let text = text.trim();
    if let Some(t) = parse_datetime_literal(text) {
        return t;
    }
    for pattern in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, pattern) {
            return dt.and_utc().timestamp();
        }
    }
    if let Ok(date) = chrono::NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return date.and_time(NaiveTime::MIN).and_utc().timestamp();
    }
    let time = NaiveTime::parse_from_str(text, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(text, "%H:%M"));
    match (time, DateTime::from_timestamp(now, 0)) {
        (Ok(time), Some(day)) => day.date_naive().and_time(time).and_utc().timestamp(),
        _ => 0,
    }
}

fn string_to_time(services: &mut Services, args: &[Value]) -> R {
    ok_i64(parse_time(&str_arg(args, 0), services.time))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::builtins::test_support::{call, s};

    #[test]
    fn double_to_string_digits() {
        let mut sv = Services::default();
        assert_eq!(
            call(&mut sv, "DoubleToString", vec![Value::Double(1.23456), Value::Int(2)]),
            s("1.23")
        );
        assert_eq!(
            call(&mut sv, "DoubleToStr", vec![Value::Double(2.0)]),
            s("2.00000000")
        );
    }

    #[test]
    fn integer_to_string_pads() {
        let mut sv = Services::default();
        assert_eq!(
            call(
                &mut sv,
                "IntegerToString",
                vec![Value::Int(7), Value::Int(3), Value::Int('0' as i64)]
            ),
            s("007")
        );
    }

    #[test]
    fn string_to_number_takes_prefix() {
        assert!((parse_double("1.5abc") - 1.5).abs() < f64::EPSILON);
        assert!((parse_double("-2e3") + 2000.0).abs() < f64::EPSILON);
        assert!((parse_double("x") - 0.0).abs() < f64::EPSILON);
        assert_eq!(parse_integer(" 42px"), 42);
        assert_eq!(parse_integer("-7"), -7);
        assert_eq!(parse_integer("abc"), 0);
    }

    #[test]
    fn char_conversions() {
        let mut sv = Services::default();
        assert_eq!(call(&mut sv, "CharToString", vec![Value::Int(65)]), s("A"));
        assert_eq!(call(&mut sv, "CharToStr", vec![s("xyz")]), s("x"));
    }

    mod time {
        use super::*;

        #[test]
        fn time_to_string_modes() {
            assert_eq!(format_time(1_704_067_200 + 3_725, 3), "2024.01.01 01:02");
            assert_eq!(format_time(1_704_067_200 + 3_725, 5), "2024.01.01 01:02:05");
            assert_eq!(format_time(1_704_067_200, TIME_DATE), "2024.01.01");
        }

        #[test]
        fn string_to_time_formats() {
            assert_eq!(parse_time("2024.01.01 00:00", 0), 1_704_067_200);
            assert_eq!(parse_time("2024-01-01T00:01:00", 0), 1_704_067_260);
            assert_eq!(parse_time("2024-01-02", 0), 1_704_153_600);
            assert_eq!(parse_time("10:30", 1_704_067_200 + 50), 1_704_067_200 + 37_800);
            assert_eq!(parse_time("garbage", 0), 0);
        }
    }
}
