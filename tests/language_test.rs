//! Language-level behavior through the public interpreter API.
//!
//! Tests cover:
//! - Overload selection by arity and default parameters
//! - Static locals persisting across calls
//! - Virtual dispatch through base-typed references
//! - Control flow, strings and arrays as programs use them
//! - Array writes far past the end fail instead of allocating

mod common;

use common::*;
use mqlsim::domain::error::{ArityProblem, MqlError};
use mqlsim::domain::runtime::program::RuntimeState;
use mqlsim::domain::runtime::value::Value;

mod overloads {
    use super::*;

    const SOURCE: &str = r#"
        int f() { return 0; }
        int f(int a, int b = 1) { return a + b; }
    "#;

    #[test]
    fn arity_selects_overload() {
        assert_eq!(call_once(SOURCE, "f", vec![]).unwrap(), Value::Int(0));
        assert_eq!(call_once(SOURCE, "f", vec![Value::Int(1)]).unwrap(), Value::Int(2));
        assert_eq!(
            call_once(SOURCE, "f", vec![Value::Int(1), Value::Int(5)]).unwrap(),
            Value::Int(6)
        );
    }

    #[test]
    fn too_many_arguments_fail() {
        let err = call_once(SOURCE, "f", vec![Value::Int(1), Value::Int(2), Value::Int(3)]).unwrap_err();
        assert!(matches!(err, MqlError::ArgumentCount { .. }));
        assert!(err.is_too_many_arguments());
    }

    #[test]
    fn gap_after_default_reports_supplied_count() {
        let source = "int g(int a = 1, int b) { return a + b; }";
        let err = call_once(source, "g", vec![Value::Int(5)]).unwrap_err();
        assert!(matches!(
            &err,
            MqlError::ArgumentCount { supplied: 1, problem: ArityProblem::Missing { parameter }, .. }
                if parameter == "b"
        ));
        assert!(err.to_string().contains("with 1 argument(s)"));
    }

    #[test]
    fn unknown_function_fails() {
        let err = call_once(SOURCE, "g", vec![]).unwrap_err();
        assert!(matches!(err, MqlError::UnknownFunction { name } if name == "g"));
    }
}

mod statics {
    use super::*;

    const SOURCE: &str = r#"
        int counter() { static int c = 0; c++; return c; }
    "#;

    #[test]
    fn persist_across_calls() {
        let mut runtime = RuntimeState::compile(SOURCE).unwrap();
        let seen: Vec<Value> = (0..3)
            .map(|_| call_in(&mut runtime, "counter", vec![]).unwrap())
            .collect();
        assert_eq!(seen, vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
    }

    #[test]
    fn reset_with_fresh_runtime() {
        let mut runtime = RuntimeState::compile(SOURCE).unwrap();
        call_in(&mut runtime, "counter", vec![]).unwrap();
        call_in(&mut runtime, "counter", vec![]).unwrap();
        let mut fresh = RuntimeState::compile(SOURCE).unwrap();
        assert_eq!(call_in(&mut fresh, "counter", vec![]).unwrap(), Value::Int(1));
    }
}

mod classes {
    use super::*;

    const SOURCE: &str = r#"
        class Shape {
        public:
            virtual double Area() { return 0; }
            string Describe() { return "area=" + DoubleToString(Area(), 1); }
        };
        class Square : public Shape {
            double side;
        public:
            Square(double s) { side = s; }
            virtual double Area() { return side * side; }
        };

        double area_via_base() {
            Shape *s = new Square(3);
            double a = s.Area();
            delete s;
            return a;
        }

        string describe_via_base() {
            Shape *s = new Square(2);
            string d = s.Describe();
            delete s;
            return d;
        }
    "#;

    #[test]
    fn virtual_dispatch_runs_derived_body() {
        assert_eq!(call_once(SOURCE, "area_via_base", vec![]).unwrap(), Value::Double(9.0));
    }

    #[test]
    fn base_method_dispatches_to_override() {
        assert_eq!(
            call_once(SOURCE, "describe_via_base", vec![]).unwrap(),
            Value::Str("area=4.0".to_string())
        );
    }
}

mod programs {
    use super::*;

    #[test]
    fn loops_switch_and_arrays() {
        let source = r#"
            int classify(int n) {
                switch (n % 3) {
                    case 0: return 10;
                    case 1: return 20;
                    default: return 30;
                }
            }
            int total() {
                int values[];
                ArrayResize(values, 5);
                for (int i = 0; i < 5; i++) values[i] = classify(i);
                int sum = 0;
                int k = 0;
                while (k < ArraySize(values)) { sum += values[k]; k++; }
                return sum;
            }
        "#;
        assert_eq!(call_once(source, "total", vec![]).unwrap(), Value::Int(90));
    }

    #[test]
    fn string_builtins_compose() {
        let source = r#"
            string shout(string s) { return StringSubstr(s, 0, 3) + "-" + IntegerToString(StringLen(s)); }
        "#;
        assert_eq!(
            call_once(source, "shout", vec![Value::Str("hello".into())]).unwrap(),
            Value::Str("hel-5".into())
        );
    }

    #[test]
    fn write_far_past_the_end_is_an_error() {
        let source = r#"
            int poke() {
                int a[];
                a[1000000000] = 1;
                return ArraySize(a);
            }
            int grow() {
                int a[];
                a[3] = 7;
                return ArraySize(a) * 10 + a[3];
            }
        "#;
        let err = call_once(source, "poke", vec![]).unwrap_err();
        assert!(err.to_string().contains("out of range"), "{err}");
        assert_eq!(call_once(source, "grow", vec![]).unwrap(), Value::Int(47));
        assert_eq!(call_once("int r() { int a[]; return ArrayResize(a, 1000000000); }", "r", vec![]).unwrap(), Value::Int(-1));
        let declared = call_once("int d() { double big[100000][100000]; return 0; }", "d", vec![]).unwrap_err();
        assert!(matches!(declared, MqlError::Runtime { .. }));
    }

    #[test]
    fn parse_errors_carry_position() {
        let err = RuntimeState::compile("int f( { return 1; }").unwrap_err();
        match err {
            MqlError::Parse(p) => assert!(p.position > 0),
            other => panic!("unexpected error: {other}"),
        }
    }
}
