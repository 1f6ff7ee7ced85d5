//! In-memory order book: market and pending orders, stop/limit triggers,
//! stop-loss and take-profit exits, trade event queue.
//!
//! Tickets are indices into the order list. Orders are never removed;
//! closed orders form the history.

use std::collections::VecDeque;

use serde::Serialize;

use crate::domain::ohlcv::Candle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderState {
    Pending,
    Open,
    Closed,
}

/// `OP_BUY` = 0 .. `OP_SELLSTOP` = 5.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderType {
    Buy,
    Sell,
    BuyLimit,
    SellLimit,
    BuyStop,
    SellStop,
}

impl OrderType {
    pub fn from_code(code: i64) -> Option<Self> {
        Some(match code {
            0 => OrderType::Buy,
            1 => OrderType::Sell,
            2 => OrderType::BuyLimit,
            3 => OrderType::SellLimit,
            4 => OrderType::BuyStop,
            5 => OrderType::SellStop,
            _ => return None,
        })
    }

    pub fn code(&self) -> i64 {
        match self {
            OrderType::Buy => 0,
            OrderType::Sell => 1,
            OrderType::BuyLimit => 2,
            OrderType::SellLimit => 3,
            OrderType::BuyStop => 4,
            OrderType::SellStop => 5,
        }
    }

    pub fn is_buy(&self) -> bool {
        matches!(
            self,
            OrderType::Buy | OrderType::BuyLimit | OrderType::BuyStop
        )
    }

    pub fn is_pending(&self) -> bool {
        !matches!(self, OrderType::Buy | OrderType::Sell)
    }

    /// Market side a pending order becomes once triggered.
    pub fn market(&self) -> Self {
        if self.is_buy() {
            OrderType::Buy
        } else {
            OrderType::Sell
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub ticket: usize,
    pub symbol: String,
    #[serde(rename = "type")]
    pub order_type: OrderType,
    pub volume: f64,
    /// Requested price while pending, fill price once open.
    pub open_price: f64,
    pub sl: Option<f64>,
    pub tp: Option<f64>,
    pub open_time: Option<i64>,
    pub close_time: Option<i64>,
    pub close_price: Option<f64>,
    pub profit: f64,
    pub state: OrderState,
    pub magic: i64,
    pub comment: String,
}

impl Order {
    fn pnl(&self, price: f64) -> f64 {
        let diff = if self.order_type.is_buy() {
            price - self.open_price
        } else {
            self.open_price - price
        };
        diff * self.volume
    }

    /// Floating profit of an open order: buys exit at bid, sells at ask.
    pub fn unrealized(&self, bid: f64, ask: f64) -> f64 {
        if self.state != OrderState::Open {
            return 0.0;
        }
        self.pnl(if self.order_type.is_buy() { bid } else { ask })
    }

    pub fn should_take_profit(&self, candle: &Candle) -> bool {
        match self.tp {
            Some(tp) if self.order_type.is_buy() => candle.high >= tp,
            Some(tp) => candle.low <= tp,
            None => false,
        }
    }

    pub fn should_stop_loss(&self, candle: &Candle) -> bool {
        match self.sl {
            Some(sl) if self.order_type.is_buy() => candle.low <= sl,
            Some(sl) => candle.high >= sl,
            None => false,
        }
    }

    fn close_at(&mut self, price: f64, time: i64) -> f64 {
        self.close_price = Some(price);
        self.close_time = Some(time);
        self.state = OrderState::Closed;
        self.profit = self.pnl(price);
        self.profit
    }
}

/// Parameters of `OrderSend`.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderRequest {
    pub symbol: String,
    pub order_type: OrderType,
    pub volume: f64,
    pub price: f64,
    pub sl: f64,
    pub tp: f64,
    pub magic: i64,
    pub comment: String,
}

fn level(value: f64) -> Option<f64> {
    (value > 0.0).then_some(value)
}

#[derive(Debug, Default)]
pub struct Broker {
    orders: Vec<Order>,
    events: VecDeque<usize>,
}

impl Broker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Place an order and return its ticket. Market orders fill at ask
    /// (buy) or bid (sell); limit and stop orders wait for their price.
    pub fn send_order(&mut self, request: OrderRequest, time: i64, bid: f64, ask: f64) -> usize {
        let pending = request.order_type.is_pending();
        let open_price = match (pending, request.order_type.is_buy()) {
            (true, _) => request.price,
            (false, true) => ask,
            (false, false) => bid,
        };
        let ticket = self.orders.len();
        self.orders.push(Order {
            ticket,
            symbol: request.symbol,
            order_type: request.order_type,
            volume: request.volume,
            open_price,
            sl: level(request.sl),
            tp: level(request.tp),
            open_time: (!pending).then_some(time),
            close_time: None,
            close_price: None,
            profit: 0.0,
            state: if pending {
                OrderState::Pending
            } else {
                OrderState::Open
            },
            magic: request.magic,
            comment: request.comment,
        });
        self.events.push_back(ticket);
        ticket
    }

    /// Apply one candle: trigger pending orders whose price lies inside the
    /// bar, then close orders whose take-profit or stop-loss was touched.
    /// Returns the profit realized by those closes.
    pub fn update(&mut self, candle: &Candle) -> f64 {
        let mut realized = 0.0;
        for order in &mut self.orders {
            if order.state == OrderState::Pending {
                if candle.low <= order.open_price && order.open_price <= candle.high {
                    order.state = OrderState::Open;
                    order.order_type = order.order_type.market();
                    order.open_time = Some(candle.time);
                    self.events.push_back(order.ticket);
                } else {
                    continue;
                }
            }
            if order.state != OrderState::Open {
                continue;
            }
            let tp_hit = order.should_take_profit(candle);
            if tp_hit || order.should_stop_loss(candle) {
                let price = if tp_hit { order.tp } else { order.sl };
                realized += order.close_at(price.unwrap_or(candle.close), candle.time);
                self.events.push_back(order.ticket);
            }
        }
        realized
    }

    /// Close an open order at `price`. Returns the realized profit, or
    /// `None` when the ticket is unknown or not open.
    pub fn close(&mut self, ticket: usize, price: f64, time: i64) -> Option<f64> {
        let order = self
            .orders
            .get_mut(ticket)
            .filter(|o| o.state == OrderState::Open)?;
        let profit = order.close_at(price, time);
        self.events.push_back(ticket);
        Some(profit)
    }

    /// Change stops of an active order. A non-positive level clears it;
    /// the entry price only changes for pending orders.
    pub fn modify(&mut self, ticket: usize, price: f64, sl: f64, tp: f64) -> bool {
        let Some(order) = self
            .orders
            .get_mut(ticket)
            .filter(|o| o.state != OrderState::Closed)
        else {
            return false;
        };
        if order.state == OrderState::Pending && price > 0.0 {
            order.open_price = price;
        }
        order.sl = level(sl);
        order.tp = level(tp);
        self.events.push_back(ticket);
        true
    }

    /// Cancel a pending order.
    pub fn delete(&mut self, ticket: usize, time: i64) -> bool {
        let Some(order) = self
            .orders
            .get_mut(ticket)
            .filter(|o| o.state == OrderState::Pending)
        else {
            return false;
        };
        order.state = OrderState::Closed;
        order.close_time = Some(time);
        self.events.push_back(ticket);
        true
    }

    pub fn order(&self, ticket: usize) -> Option<&Order> {
        self.orders.get(ticket)
    }

    pub fn all_orders(&self) -> &[Order] {
        &self.orders
    }

    /// Pending and open orders.
    pub fn active_orders(&self) -> Vec<&Order> {
        self.orders
            .iter()
            .filter(|o| o.state != OrderState::Closed)
            .collect()
    }

    pub fn history(&self) -> Vec<&Order> {
        self.orders
            .iter()
            .filter(|o| o.state == OrderState::Closed)
            .collect()
    }

    pub fn open_profit(&self, bid: f64, ask: f64) -> f64 {
        self.orders.iter().map(|o| o.unrealized(bid, ask)).sum()
    }

    pub fn closed_profit(&self) -> f64 {
        self.orders
            .iter()
            .filter(|o| o.state == OrderState::Closed)
            .map(|o| o.profit)
            .sum()
    }

    /// Tickets touched since the last call, oldest first.
    pub fn take_events(&mut self) -> Vec<usize> {
        self.events.drain(..).collect()
    }
}
