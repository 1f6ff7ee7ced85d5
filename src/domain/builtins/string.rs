use crate::domain::builtins::BuiltinRegistry;
use crate::domain::builtins::args::{
    array_arg, i64_arg, ok_i64, ok_str, str_arg, write_ref,
};
use crate::domain::error::MqlError;
use crate::domain::runtime::value::{Value, format_double};
use crate::domain::services::Services;

type R = Result<Value, MqlError>;

pub fn register(r: &mut BuiltinRegistry) {
    r.register("StringLen", |_, a| ok_i64(str_arg(a, 0).chars().count() as i64));
    r.register("StringSubstr", string_substr);
    r.register("StringFind", string_find);
    r.register("StringTrimLeft", |_, a| ok_str(str_arg(a, 0).trim_start()));
    r.register("StringTrimRight", |_, a| ok_str(str_arg(a, 0).trim_end()));
    r.register("StringToUpper", string_to_upper);
    r.register("StringToLower", string_to_lower);
    r.register("StringReplace", string_replace);
    r.register("StringConcatenate", string_concatenate);
    r.register("StringSplit", string_split);
    r.register("StringGetChar", string_get_char);
    r.register("StringSetChar", string_set_char);
    r.register("StringFormat", |_, a| ok_str(format_arguments(a)));
}

fn chars(text: &str) -> Vec<char> {
    text.chars().collect()
}

/// `StringSubstr(text, start, length = -1)`. Out-of-range starts give "".
fn string_substr(_: &mut Services, args: &[Value]) -> R {
    let text = chars(&str_arg(args, 0));
    let start = i64_arg(args, 1, 0).max(0) as usize;
    if start >= text.len() {
        return ok_str("");
    }
    let length = i64_arg(args, 2, -1);
    let end = if length < 0 {
        text.len()
    } else {
        (start + length as usize).min(text.len())
    };
    ok_str(text[start..end].iter().collect::<String>())
}

/// Character index of the first match at or after `start`, or -1.
fn string_find(_: &mut Services, args: &[Value]) -> R {
    let text = str_arg(args, 0);
    let needle = str_arg(args, 1);
    let start = i64_arg(args, 2, 0).max(0) as usize;
    let Some((byte_start, _)) = text.char_indices().nth(start) else {
        return ok_i64(-1);
    };
    match text[byte_start..].find(&needle) {
        Some(pos) => ok_i64((start + text[byte_start..byte_start + pos].chars().count()) as i64),
        None => ok_i64(-1),
    }
}

/// Case functions rewrite a by-reference argument and also return the
/// converted string.
fn string_to_upper(_: &mut Services, args: &[Value]) -> R {
    let upper = str_arg(args, 0).to_uppercase();
    write_ref(args, 0, Value::Str(upper.clone()));
    ok_str(upper)
}

fn string_to_lower(_: &mut Services, args: &[Value]) -> R {
    let lower = str_arg(args, 0).to_lowercase();
    write_ref(args, 0, Value::Str(lower.clone()));
    ok_str(lower)
}

/// Replace every occurrence in place; returns the replacement count.
fn string_replace(_: &mut Services, args: &[Value]) -> R {
    let text = str_arg(args, 0);
    let find = str_arg(args, 1);
    if find.is_empty() {
        return ok_i64(0);
    }
    let count = text.matches(&find).count();
    write_ref(args, 0, Value::Str(text.replace(&find, &str_arg(args, 2))));
    ok_i64(count as i64)
}

fn string_concatenate(_: &mut Services, args: &[Value]) -> R {
    ok_str(args.iter().map(|a| a.unref().to_string()).collect::<String>())
}

/// `StringSplit(text, separator, result[])`: fill `result` and return the
/// part count. The separator is a character code or a string.
fn string_split(_: &mut Services, args: &[Value]) -> R {
    let text = str_arg(args, 0);
    let separator = match args.get(1).map(Value::unref) {
        Some(Value::Int(code)) => char::from_u32(code as u32).map(String::from).unwrap_or_default(),
        _ => str_arg(args, 1),
    };
    let parts: Vec<Value> = if separator.is_empty() {
        vec![Value::Str(text)]
    } else {
        text.split(separator.as_str())
            .map(|p| Value::Str(p.to_string()))
            .collect()
    };
    let count = parts.len() as i64;
    if let Some(result) = array_arg(args, 2) {
        result.borrow_mut().items = parts;
    }
    ok_i64(count)
}

fn string_get_char(_: &mut Services, args: &[Value]) -> R {
    let text = str_arg(args, 0);
    let index = i64_arg(args, 1, 0);
    let code = usize::try_from(index)
        .ok()
        .and_then(|i| text.chars().nth(i))
        .map_or(0, |c| c as i64);
    ok_i64(code)
}

/// Return `text` with the character at `index` replaced; an index equal to
/// the length appends.
fn string_set_char(_: &mut Services, args: &[Value]) -> R {
    let mut text = chars(&str_arg(args, 0));
    let index = i64_arg(args, 1, 0);
    let Some(c) = char::from_u32(i64_arg(args, 2, 0) as u32) else {
        return ok_str(text.into_iter().collect::<String>());
    };
    match usize::try_from(index) {
        Ok(i) if i < text.len() => text[i] = c,
        Ok(i) if i == text.len() => text.push(c),
        _ => {}
    }
    ok_str(text.into_iter().collect::<String>())
}

pub(crate) fn format_arguments(args: &[Value]) -> String {
    let Some(format) = args.first() else {
        return String::new();
    };
    let values: Vec<Value> = args[1..].iter().map(Value::unref).collect();
    format_printf(&format.unref().to_string(), &values)
}

#[derive(Default)]
struct Spec {
    left: bool,
    plus: bool,
    space: bool,
    zero: bool,
    alternate: bool,
    width: Option<usize>,
    precision: Option<usize>,
}

impl Spec {
    fn pad(&self, body: String) -> String {
        let width = self.width.unwrap_or(0);
        let len = body.chars().count();
        if len >= width {
            return body;
        }
        let fill = width - len;
        if self.left {
            format!("{}{}", body, " ".repeat(fill))
        } else if self.zero {
            let (sign, digits) = match body.chars().next() {
                Some(c @ ('-' | '+' | ' ')) => (c.to_string(), body[1..].to_string()),
                _ => (String::new(), body),
            };
            format!("{}{}{}", sign, "0".repeat(fill), digits)
        } else {
            format!("{}{}", " ".repeat(fill), body)
        }
    }

    fn signed(&self, negative: bool, magnitude: String) -> String {
        let sign = if negative {
            "-"
        } else if self.plus {
            "+"
        } else if self.space {
            " "
        } else {
            ""
        };
        format!("{}{}", sign, magnitude)
    }
}

/// printf-style formatting: flags `-+ 0#`, width, precision (`*` reads an
/// argument) and the conversions `d i u x X o c e E f g G s %`. Length
/// modifiers (`l`, `ll`, `h`, `I64`) are accepted and ignored.
pub fn format_printf(format: &str, values: &[Value]) -> String {
    let mut out = String::new();
    let mut next = values.iter();
    let mut chars = format.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        if chars.peek() == Some(&'%') {
            chars.next();
            out.push('%');
            continue;
        }
        let mut spec = Spec::default();
        while let Some(&f) = chars.peek() {
            match f {
                '-' => spec.left = true,
                '+' => spec.plus = true,
                ' ' => spec.space = true,
                '0' => spec.zero = true,
                '#' => spec.alternate = true,
                _ => break,
            }
            chars.next();
        }
        if chars.peek() == Some(&'*') {
            chars.next();
            spec.width = next.next().map(|v| v.to_i64().max(0) as usize);
        } else {
            spec.width = read_number(&mut chars);
        }
        if chars.peek() == Some(&'.') {
            chars.next();
            if chars.peek() == Some(&'*') {
                chars.next();
                spec.precision = next.next().map(|v| v.to_i64().max(0) as usize);
            } else {
                spec.precision = Some(read_number(&mut chars).unwrap_or(0));
            }
        }
        while let Some(&m) = chars.peek() {
            if matches!(m, 'l' | 'h' | 'I' | '6' | '4') {
                chars.next();
            } else {
                break;
            }
        }
        let Some(conversion) = chars.next() else {
            out.push('%');
            break;
        };
        let value = next.next().cloned().unwrap_or(Value::Int(0));
        out.push_str(&convert(&spec, conversion, &value));
    }
    out
}

fn read_number(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> Option<usize> {
    let mut digits = String::new();
    while let Some(&d) = chars.peek() {
        if d.is_ascii_digit() {
            digits.push(d);
            chars.next();
        } else {
            break;
        }
    }
    digits.parse().ok()
}

fn convert(spec: &Spec, conversion: char, value: &Value) -> String {
    match conversion {
        'd' | 'i' => {
            let v = value.to_i64();
            let mut digits = v.unsigned_abs().to_string();
            if let Some(p) = spec.precision {
                while digits.len() < p {
                    digits.insert(0, '0');
                }
            }
            spec.pad(spec.signed(v < 0, digits))
        }
        'u' => spec.pad((value.to_i64() as u64).to_string()),
        'x' | 'X' | 'o' => {
            let v = value.to_i64() as u64;
            let body = match conversion {
                'x' => format!("{:x}", v),
                'X' => format!("{:X}", v),
                _ => format!("{:o}", v),
            };
            let prefix = match (spec.alternate && v != 0, conversion) {
                (true, 'x') => "0x",
                (true, 'X') => "0X",
                (true, _) => "0",
                _ => "",
            };
            spec.pad(format!("{}{}", prefix, body))
        }
        'c' => spec.pad(
            char::from_u32(value.to_i64() as u32)
                .map(String::from)
                .unwrap_or_default(),
        ),
        'f' | 'F' => {
            let v = value.to_f64();
            let body = format!("{:.*}", spec.precision.unwrap_or(6), v.abs());
            spec.pad(spec.signed(v.is_sign_negative() && v != 0.0, body))
        }
        'e' | 'E' => {
            let v = value.to_f64();
            let body = exponent(v.abs(), spec.precision.unwrap_or(6), conversion == 'E');
            spec.pad(spec.signed(v < 0.0, body))
        }
        'g' | 'G' => {
            let v = value.to_f64();
            let body = general(v.abs(), spec.precision.unwrap_or(6), conversion == 'G');
            spec.pad(spec.signed(v < 0.0, body))
        }
        's' => {
            let text = match value {
                Value::Double(d) => format_double(*d),
                other => other.to_string(),
            };
            let text = match spec.precision {
                Some(p) => text.chars().take(p).collect(),
                None => text,
            };
            spec.pad(text)
        }
        other => format!("%{}", other),
    }
}

/// C-style `%e`: mantissa, sign and at least two exponent digits.
fn exponent(v: f64, precision: usize, upper: bool) -> String {
    let raw = format!("{:.*e}", precision, v);
    let (mantissa, exp) = raw.split_once('e').unwrap_or((raw.as_str(), "0"));
    let exp: i32 = exp.parse().unwrap_or(0);
    let sign = if exp < 0 { '-' } else { '+' };
    let e = if upper { 'E' } else { 'e' };
    format!("{}{}{}{:02}", mantissa, e, sign, exp.abs())
}

fn general(v: f64, precision: usize, upper: bool) -> String {
    let precision = precision.max(1);
    if v == 0.0 {
        return "0".to_string();
    }
    let exp = v.log10().floor() as i32;
    let body = if exp < -4 || exp >= precision as i32 {
        exponent(v, precision - 1, upper)
    } else {
        let decimals = (precision as i32 - 1 - exp).max(0) as usize;
        format!("{:.*}", decimals, v)
    };
    strip_trailing_zeros(body)
}

fn strip_trailing_zeros(body: String) -> String {
    let (number, suffix) = match body.find(['e', 'E']) {
        Some(i) => (body[..i].to_string(), body[i..].to_string()),
        None => (body, String::new()),
    };
    let number = if number.contains('.') {
        number.trim_end_matches('0').trim_end_matches('.').to_string()
    } else {
        number
    };
    format!("{}{}", number, suffix)
}
