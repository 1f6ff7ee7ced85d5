//! In-memory files of the virtual terminal.

use crate::domain::builtins::BuiltinRegistry;
use crate::domain::builtins::args::{arg, i64_arg, ok_bool, ok_i64, ok_str, str_arg};
use crate::domain::error::MqlError;
use crate::domain::runtime::value::{Value, format_double};
use crate::domain::services::Services;

type R = Result<Value, MqlError>;

pub fn register(r: &mut BuiltinRegistry) {
    r.register("FileOpen", file_open);
    r.register("FileClose", |s, a| {
        s.terminal.close(i64_arg(a, 0, -1));
        Ok(Value::Void)
    });
    r.register("FileWrite", file_write);
    r.register("FileWriteString", file_write_string);
    r.register("FileReadString", |s, a| ok_str(s.terminal.read_string(i64_arg(a, 0, -1))));
    r.register("FileIsEnding", |s, a| ok_bool(s.terminal.is_ending(i64_arg(a, 0, -1))));
    r.register("FileDelete", |s, a| ok_bool(s.terminal.delete_file(&str_arg(a, 0))));
    r.register("FileIsExist", |s, a| ok_bool(s.terminal.file_exists(&str_arg(a, 0))));
}

/// `FileOpen(name, flags, delimiter = '\t')`. The delimiter is a character
/// code or a one-character string.
fn file_open(services: &mut Services, args: &[Value]) -> R {
    let delimiter = match arg(args, 2) {
        Value::Str(s) => s.chars().next().unwrap_or('\t'),
        Value::Void => '\t',
        other => char::from_u32(other.to_i64() as u32).unwrap_or('\t'),
    };
    let handle = services
        .terminal
        .open(&str_arg(args, 0), i64_arg(args, 1, 0), delimiter);
    ok_i64(handle)
}

fn field(value: &Value) -> String {
    match value.unref() {
        Value::Double(d) => format_double(d),
        other => other.to_string(),
    }
}

/// Write the remaining arguments as one delimited line.
fn file_write(services: &mut Services, args: &[Value]) -> R {
    let handle = i64_arg(args, 0, -1);
    let fields: Vec<String> = args.iter().skip(1).map(field).collect();
    ok_i64(services.terminal.write_fields(handle, &fields) as i64)
}

/// `FileWriteString(handle, text, length = all)`.
fn file_write_string(services: &mut Services, args: &[Value]) -> R {
    let handle = i64_arg(args, 0, -1);
    let text = str_arg(args, 1);
    let text = match i64_arg(args, 2, -1) {
        n if n >= 0 => text.chars().take(n as usize).collect(),
        _ => text,
    };
    ok_i64(services.terminal.write(handle, &text) as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::builtins::test_support::{call, s};
    use crate::domain::terminal::{FILE_CSV, FILE_READ, FILE_WRITE};

    #[test]
    fn csv_write_then_read_fields() {
        let mut sv = Services::default();
        let h = call(
            &mut sv,
            "FileOpen",
            vec![s("trades.csv"), Value::Int(FILE_WRITE | FILE_CSV), s(",")],
        );
        call(&mut sv, "FileWrite", vec![h.clone(), s("EURUSD"), Value::Double(1.0)]);
        call(&mut sv, "FileClose", vec![h]);
        assert_eq!(sv.terminal.file_contents("trades.csv"), Some("EURUSD,1.0\n"));

        let h = call(
            &mut sv,
            "FileOpen",
            vec![s("trades.csv"), Value::Int(FILE_READ | FILE_CSV), Value::Int(',' as i64)],
        );
        assert_eq!(call(&mut sv, "FileReadString", vec![h.clone()]), s("EURUSD"));
        assert_eq!(call(&mut sv, "FileReadString", vec![h.clone()]), s("1.0"));
        assert_eq!(call(&mut sv, "FileIsEnding", vec![h]), Value::Bool(true));
    }

    #[test]
    fn write_string_and_delete() {
        let mut sv = Services::default();
        let h = call(&mut sv, "FileOpen", vec![s("log.txt"), Value::Int(FILE_WRITE)]);
        assert_eq!(
            call(&mut sv, "FileWriteString", vec![h, s("abcdef"), Value::Int(3)]),
            Value::Int(3)
        );
        assert_eq!(sv.terminal.file_contents("log.txt"), Some("abc"));
        assert_eq!(call(&mut sv, "FileIsExist", vec![s("log.txt")]), Value::Bool(true));
        assert_eq!(call(&mut sv, "FileDelete", vec![s("log.txt")]), Value::Bool(true));
        assert_eq!(call(&mut sv, "FileIsExist", vec![s("log.txt")]), Value::Bool(false));
    }

    #[test]
    fn missing_file_gives_invalid_handle() {
        let mut sv = Services::default();
        assert_eq!(
            call(&mut sv, "FileOpen", vec![s("none"), Value::Int(FILE_READ)]),
            Value::Int(-1)
        );
        assert_eq!(call(&mut sv, "FileReadString", vec![Value::Int(-1)]), s(""));
    }
}
