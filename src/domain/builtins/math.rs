use crate::domain::builtins::BuiltinRegistry;
use crate::domain::builtins::args::{f64_arg, i64_arg, ok_bool, ok_f64, ok_i64};
use crate::domain::error::MqlError;
use crate::domain::runtime::value::Value;
use crate::domain::services::Services;

type R = Result<Value, MqlError>;

pub fn register(r: &mut BuiltinRegistry) {
    r.register("MathAbs", math_abs);
    r.register("fabs", math_abs);
    r.register("MathPow", math_pow);
    r.register("pow", math_pow);
    r.register("MathSqrt", |_, a| ok_f64(f64_arg(a, 0, 0.0).sqrt()));
    r.register("sqrt", |_, a| ok_f64(f64_arg(a, 0, 0.0).sqrt()));
    r.register("MathMax", math_max);
    r.register("fmax", math_max);
    r.register("MathMin", math_min);
    r.register("fmin", math_min);
    r.register("MathFloor", |_, a| ok_f64(f64_arg(a, 0, 0.0).floor()));
    r.register("MathCeil", |_, a| ok_f64(f64_arg(a, 0, 0.0).ceil()));
    r.register("MathRound", |_, a| ok_f64(f64_arg(a, 0, 0.0).round()));
    r.register("MathLog", |_, a| ok_f64(f64_arg(a, 0, 0.0).ln()));
    r.register("MathLog10", |_, a| ok_f64(f64_arg(a, 0, 0.0).log10()));
    r.register("MathExp", |_, a| ok_f64(f64_arg(a, 0, 0.0).exp()));
    r.register("MathMod", |_, a| ok_f64(f64_arg(a, 0, 0.0) % f64_arg(a, 1, 1.0)));
    r.register("MathSin", |_, a| ok_f64(f64_arg(a, 0, 0.0).sin()));
    r.register("MathCos", |_, a| ok_f64(f64_arg(a, 0, 0.0).cos()));
    r.register("MathTan", |_, a| ok_f64(f64_arg(a, 0, 0.0).tan()));
    r.register("MathArctan", |_, a| ok_f64(f64_arg(a, 0, 0.0).atan()));
    r.register("MathRand", math_rand);
    r.register("MathSrand", math_srand);
    r.register("MathIsValidNumber", |_, a| ok_bool(f64_arg(a, 0, 0.0).is_finite()));
    r.register("NormalizeDouble", normalize_double);
}

/// Integer arguments stay integers.
fn math_abs(_: &mut Services, args: &[Value]) -> R {
    match args.first().map(Value::unref) {
        Some(Value::Int(i)) => ok_i64(i.abs()),
        _ => ok_f64(f64_arg(args, 0, 0.0).abs()),
    }
}

fn math_pow(_: &mut Services, args: &[Value]) -> R {
    ok_f64(f64_arg(args, 0, 0.0).powf(f64_arg(args, 1, 1.0)))
}

fn both_ints(args: &[Value]) -> Option<(i64, i64)> {
    match (args.first().map(Value::unref), args.get(1).map(Value::unref)) {
        (Some(Value::Int(a)), Some(Value::Int(b))) => Some((a, b)),
        _ => None,
    }
}

fn math_max(_: &mut Services, args: &[Value]) -> R {
    if let Some((a, b)) = both_ints(args) {
        return ok_i64(a.max(b));
    }
    ok_f64(f64_arg(args, 0, 0.0).max(f64_arg(args, 1, 0.0)))
}

fn math_min(_: &mut Services, args: &[Value]) -> R {
    if let Some((a, b)) = both_ints(args) {
        return ok_i64(a.min(b));
    }
    ok_f64(f64_arg(args, 0, 0.0).min(f64_arg(args, 1, 0.0)))
}

/// Linear congruential generator, 0..=32767.
fn math_rand(services: &mut Services, _: &[Value]) -> R {
    services.random_state = services
        .random_state
        .wrapping_mul(1_103_515_245)
        .wrapping_add(12_345);
    ok_i64(((services.random_state >> 16) & 0x7fff) as i64)
}

fn math_srand(services: &mut Services, args: &[Value]) -> R {
    services.random_state = i64_arg(args, 0, 1) as u32;
    Ok(Value::Void)
}

pub(crate) fn round_to(value: f64, digits: i64) -> f64 {
    let factor = 10f64.powi(digits.clamp(0, 15) as i32);
    (value * factor).round() / factor
}

fn normalize_double(_: &mut Services, args: &[Value]) -> R {
    ok_f64(round_to(f64_arg(args, 0, 0.0), i64_arg(args, 1, 0)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::builtins::test_support::call;

    #[test]
    fn abs_keeps_integer_kind() {
        let mut s = Services::default();
        assert_eq!(call(&mut s, "MathAbs", vec![Value::Int(-3)]), Value::Int(3));
        assert_eq!(
            call(&mut s, "MathAbs", vec![Value::Double(-1.5)]),
            Value::Double(1.5)
        );
    }

    #[test]
    fn min_max_and_pow() {
        let mut s = Services::default();
        assert_eq!(
            call(&mut s, "MathMax", vec![Value::Int(2), Value::Int(7)]),
            Value::Int(7)
        );
        assert_eq!(
            call(&mut s, "MathMin", vec![Value::Double(2.5), Value::Int(7)]),
            Value::Double(2.5)
        );
        assert_eq!(
            call(&mut s, "MathPow", vec![Value::Int(2), Value::Int(10)]),
            Value::Double(1024.0)
        );
    }

    #[test]
    fn normalize_rounds_to_digits() {
        let mut s = Services::default();
        let v = call(
            &mut s,
            "NormalizeDouble",
            vec![Value::Double(1.234567), Value::Int(4)],
        );
        assert!((v.to_f64() - 1.2346).abs() < 1e-12);
    }

    #[test]
    fn rand_is_seeded_and_bounded() {
        let mut a = Services::default();
        let mut b = Services::default();
        call(&mut a, "MathSrand", vec![Value::Int(42)]);
        call(&mut b, "MathSrand", vec![Value::Int(42)]);
        for _ in 0..20 {
            let x = call(&mut a, "MathRand", vec![]).to_i64();
            assert_eq!(x, call(&mut b, "MathRand", vec![]).to_i64());
            assert!((0..=32767).contains(&x));
        }
    }

    #[test]
    fn valid_number() {
        let mut s = Services::default();
        assert_eq!(
            call(&mut s, "MathIsValidNumber", vec![Value::Double(f64::NAN)]),
            Value::Bool(false)
        );
    }
}
