use crate::domain::builtins::BuiltinRegistry;
use crate::domain::builtins::args::{i64_arg, ok_f64, ok_i64, ok_str};
use crate::domain::error::MqlError;
use crate::domain::runtime::value::Value;
use crate::domain::services::Services;

type R = Result<Value, MqlError>;

const ACCOUNT_LOGIN: i64 = 0;
const ACCOUNT_NAME: i64 = 1;
const ACCOUNT_COMPANY: i64 = 2;
const ACCOUNT_SERVER: i64 = 3;
const ACCOUNT_LEVERAGE: i64 = 35;
const ACCOUNT_CURRENCY: i64 = 36;
const ACCOUNT_BALANCE: i64 = 37;
const ACCOUNT_CREDIT: i64 = 38;
const ACCOUNT_PROFIT: i64 = 39;
const ACCOUNT_EQUITY: i64 = 40;
const ACCOUNT_MARGIN: i64 = 41;
const ACCOUNT_MARGIN_FREE: i64 = 42;

const LOGIN: i64 = 1;
const LEVERAGE: i64 = 100;
const NAME: &str = "Backtest";
const COMPANY: &str = "mqlsim";
const SERVER: &str = "backtest";

pub fn register(r: &mut BuiltinRegistry) {
    r.register("AccountBalance", |s, _| ok_f64(double_property(s, ACCOUNT_BALANCE)));
    r.register("AccountEquity", |s, _| ok_f64(double_property(s, ACCOUNT_EQUITY)));
    r.register("AccountProfit", |s, _| ok_f64(double_property(s, ACCOUNT_PROFIT)));
    r.register("AccountFreeMargin", |s, _| ok_f64(double_property(s, ACCOUNT_MARGIN_FREE)));
    r.register("AccountMargin", |s, _| ok_f64(double_property(s, ACCOUNT_MARGIN)));
    r.register("AccountCredit", |s, _| ok_f64(double_property(s, ACCOUNT_CREDIT)));
    r.register("AccountCurrency", |s, _| ok_str(string_property(s, ACCOUNT_CURRENCY)));
    r.register("AccountCompany", |_, _| ok_str(COMPANY));
    r.register("AccountName", |_, _| ok_str(NAME));
    r.register("AccountNumber", |_, _| ok_i64(LOGIN));
    r.register("AccountServer", |_, _| ok_str(SERVER));
    r.register("AccountLeverage", |_, _| ok_i64(LEVERAGE));
    r.register("AccountInfoDouble", |s, a| ok_f64(double_property(s, i64_arg(a, 0, -1))));
    r.register("AccountInfoInteger", account_info_integer);
    r.register("AccountInfoString", |s, a| ok_str(string_property(s, i64_arg(a, 0, -1))));
}

fn double_property(services: &Services, property: i64) -> f64 {
    let m = services.metrics();
    match property {
        ACCOUNT_BALANCE => m.balance,
        ACCOUNT_CREDIT => services.account.credit(),
        ACCOUNT_PROFIT => m.open_profit,
        ACCOUNT_EQUITY => m.equity,
        ACCOUNT_MARGIN => m.margin,
        ACCOUNT_MARGIN_FREE => m.free_margin,
        _ => 0.0,
    }
}

fn string_property(services: &Services, property: i64) -> String {
    match property {
        ACCOUNT_CURRENCY => services.account.currency().to_string(),
        ACCOUNT_NAME => NAME.to_string(),
        ACCOUNT_COMPANY => COMPANY.to_string(),
        ACCOUNT_SERVER => SERVER.to_string(),
        _ => String::new(),
    }
}

fn account_info_integer(_: &mut Services, args: &[Value]) -> R {
    ok_i64(match i64_arg(args, 0, -1) {
        ACCOUNT_LOGIN => LOGIN,
        ACCOUNT_LEVERAGE => LEVERAGE,
        _ => 0,
    })
}
