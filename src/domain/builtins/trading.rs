//! Order functions over the simulated broker. A ticket of -1 in
//! `OrderClose/OrderModify/OrderDelete` means the selected order.

use tracing::debug;

use crate::domain::broker::{OrderRequest, OrderState, OrderType};
use crate::domain::builtins::BuiltinRegistry;
use crate::domain::builtins::args::{arg, f64_arg, i64_arg, ok_bool, ok_f64, ok_i64, ok_str, str_arg};
use crate::domain::builtins::market_info::quote;
use crate::domain::error::MqlError;
use crate::domain::runtime::value::Value;
use crate::domain::services::Services;

type R = Result<Value, MqlError>;

const ERR_INVALID_TRADE_PARAMETERS: i64 = 3;
const ERR_INVALID_TICKET: i64 = 4108;
const SELECT_BY_TICKET: i64 = 1;
const MODE_HISTORY: i64 = 1;

pub fn register(r: &mut BuiltinRegistry) {
    r.register("OrderSend", order_send);
    r.register("OrderClose", order_close);
    r.register("OrderModify", order_modify);
    r.register("OrderDelete", order_delete);
    r.register("OrderSelect", order_select);
    r.register("OrdersTotal", |s, _| ok_i64(s.broker.active_orders().len() as i64));
    r.register("OrdersHistoryTotal", |s, _| ok_i64(s.broker.history().len() as i64));
    r.register("HistoryTotal", |s, _| ok_i64(s.broker.history().len() as i64));

    r.register("OrderTicket", |s, _| ok_i64(s.selected().map_or(-1, |o| o.ticket as i64)));
    r.register("OrderType", |s, _| ok_i64(s.selected().map_or(-1, |o| o.order_type.code())));
    r.register("OrderSymbol", |s, _| ok_str(s.selected().map(|o| o.symbol.clone()).unwrap_or_default()));
    r.register("OrderLots", |s, _| ok_f64(s.selected().map_or(0.0, |o| o.volume)));
    r.register("OrderOpenPrice", |s, _| ok_f64(s.selected().map_or(0.0, |o| o.open_price)));
    r.register("OrderOpenTime", |s, _| ok_i64(s.selected().and_then(|o| o.open_time).unwrap_or(0)));
    r.register("OrderClosePrice", order_close_price);
    r.register("OrderCloseTime", |s, _| ok_i64(s.selected().and_then(|o| o.close_time).unwrap_or(0)));
    r.register("OrderStopLoss", |s, _| ok_f64(s.selected().and_then(|o| o.sl).unwrap_or(0.0)));
    r.register("OrderTakeProfit", |s, _| ok_f64(s.selected().and_then(|o| o.tp).unwrap_or(0.0)));
    r.register("OrderProfit", order_profit);
    r.register("OrderMagicNumber", |s, _| ok_i64(s.selected().map_or(0, |o| o.magic)));
    r.register("OrderComment", |s, _| ok_str(s.selected().map(|o| o.comment.clone()).unwrap_or_default()));
    r.register("OrderCommission", |_, _| ok_f64(0.0));
    r.register("OrderSwap", |_, _| ok_f64(0.0));
    r.register("OrderExpiration", |_, _| ok_i64(0));
}

/// `OrderSend(symbol, cmd, volume, price, slippage, sl, tp, comment, magic,
/// expiration, color)`: ticket, or -1 with `_LastError` set.
fn order_send(services: &mut Services, args: &[Value]) -> R {
    let symbol = services.resolve_symbol(&arg(args, 0));
    let volume = f64_arg(args, 2, 0.0);
    let Some(order_type) = OrderType::from_code(i64_arg(args, 1, -1)) else {
        services.last_error = ERR_INVALID_TRADE_PARAMETERS;
        return ok_i64(-1);
    };
    if volume <= 0.0 {
        services.last_error = ERR_INVALID_TRADE_PARAMETERS;
        return ok_i64(-1);
    }
    let (bid, ask) = quote(services, &symbol).unwrap_or((services.bid, services.ask));
    let request = OrderRequest {
        symbol,
        order_type,
        volume,
        price: f64_arg(args, 3, 0.0),
        sl: f64_arg(args, 5, 0.0),
        tp: f64_arg(args, 6, 0.0),
        comment: str_arg(args, 7),
        magic: i64_arg(args, 8, 0),
    };
    let time = services.time;
    let ticket = services.broker.send_order(request, time, bid, ask);
    debug!(ticket, ?order_type, volume, time, "order sent");
    ok_i64(ticket as i64)
}

fn resolve_ticket(services: &Services, args: &[Value]) -> Option<usize> {
    match i64_arg(args, 0, -1) {
        t if t < 0 => services.selected_order,
        t => Some(t as usize),
    }
}

/// `OrderClose(ticket, lots, price, slippage, color)`. A non-positive price
/// closes at the market: bid for buys, ask for sells. The realized profit
/// is credited to the account.
fn order_close(services: &mut Services, args: &[Value]) -> R {
    let Some(ticket) = resolve_ticket(services, args) else {
        services.last_error = ERR_INVALID_TICKET;
        return ok_bool(false);
    };
    let Some(order) = services.broker.order(ticket).cloned() else {
        services.last_error = ERR_INVALID_TICKET;
        return ok_bool(false);
    };
    let mut price = f64_arg(args, 2, 0.0);
    if price <= 0.0 {
        let (bid, ask) = quote(services, &order.symbol).unwrap_or((services.bid, services.ask));
        price = if order.order_type.is_buy() { bid } else { ask };
    }
    let time = services.time;
    match services.broker.close(ticket, price, time) {
        Some(profit) => {
            services.account.apply_profit(profit);
            debug!(ticket, price, profit, "order closed");
            ok_bool(true)
        }
        None => {
            services.last_error = ERR_INVALID_TICKET;
            ok_bool(false)
        }
    }
}

/// `OrderModify(ticket, price, sl, tp, expiration, color)`.
fn order_modify(services: &mut Services, args: &[Value]) -> R {
    let Some(ticket) = resolve_ticket(services, args) else {
        return ok_bool(false);
    };
    let modified = services.broker.modify(
        ticket,
        f64_arg(args, 1, 0.0),
        f64_arg(args, 2, 0.0),
        f64_arg(args, 3, 0.0),
    );
    if !modified {
        services.last_error = ERR_INVALID_TICKET;
    }
    ok_bool(modified)
}

/// Cancel a pending order. Open orders must be closed instead.
fn order_delete(services: &mut Services, args: &[Value]) -> R {
    let Some(ticket) = resolve_ticket(services, args) else {
        return ok_bool(false);
    };
    let time = services.time;
    let deleted = services.broker.delete(ticket, time);
    if !deleted {
        services.last_error = ERR_INVALID_TICKET;
    }
    ok_bool(deleted)
}

/// `OrderSelect(index, select, pool = MODE_TRADES)`.
fn order_select(services: &mut Services, args: &[Value]) -> R {
    let index = i64_arg(args, 0, -1);
    let by_ticket = i64_arg(args, 1, 0) == SELECT_BY_TICKET;
    let history = i64_arg(args, 2, 0) == MODE_HISTORY;
    let selected = match (usize::try_from(index), by_ticket) {
        (Err(_), _) => None,
        (Ok(ticket), true) => services.broker.order(ticket).map(|o| o.ticket),
        (Ok(position), false) => {
            let pool = if history {
                services.broker.history()
            } else {
                services.broker.active_orders()
            };
            pool.get(position).map(|o| o.ticket)
        }
    };
    services.selected_order = selected;
    ok_bool(selected.is_some())
}

/// Close price of a closed order; the current exit price while open.
fn order_close_price(services: &mut Services, _: &[Value]) -> R {
    let Some(order) = services.selected() else {
        return ok_f64(0.0);
    };
    if let Some(price) = order.close_price {
        return ok_f64(price);
    }
    if order.state != OrderState::Open {
        return ok_f64(0.0);
    }
    ok_f64(if order.order_type.is_buy() {
        services.bid
    } else {
        services.ask
    })
}

/// Realized profit once closed, floating profit while open.
fn order_profit(services: &mut Services, _: &[Value]) -> R {
    let profit = services.selected().map_or(0.0, |o| match o.state {
        OrderState::Open => o.unrealized(services.bid, services.ask),
        _ => o.profit,
    });
    ok_f64(profit)
}
