//! Account ledger. Equity and free margin are derived from the broker's
//! floating profit at the current quote.

use serde::Serialize;

use crate::domain::broker::Broker;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountMetrics {
    pub balance: f64,
    pub equity: f64,
    pub closed_profit: f64,
    pub open_profit: f64,
    pub margin: f64,
    pub free_margin: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Account {
    balance: f64,
    credit: f64,
    margin: f64,
    currency: String,
}

impl Default for Account {
    fn default() -> Self {
        Account::new(10_000.0, 0.0, "USD")
    }
}

impl Account {
    pub fn new(balance: f64, margin: f64, currency: &str) -> Self {
        Account {
            balance,
            credit: 0.0,
            margin,
            currency: currency.to_string(),
        }
    }

    pub fn apply_profit(&mut self, profit: f64) {
        self.balance += profit;
    }

    pub fn balance(&self) -> f64 {
        self.balance
    }

    pub fn credit(&self) -> f64 {
        self.credit
    }

    pub fn margin(&self) -> f64 {
        self.margin
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    pub fn metrics(&self, broker: &Broker, bid: f64, ask: f64) -> AccountMetrics {
        let open_profit = broker.open_profit(bid, ask);
        let equity = self.balance + open_profit;
        AccountMetrics {
            balance: self.balance,
            equity,
            closed_profit: broker.closed_profit(),
            open_profit,
            margin: self.margin,
            free_margin: equity - self.margin,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::broker::{OrderRequest, OrderType};

    #[test]
    fn defaults() {
        let account = Account::default();
        assert!((account.balance() - 10_000.0).abs() < f64::EPSILON);
        assert!((account.margin() - 0.0).abs() < f64::EPSILON);
        assert_eq!(account.currency(), "USD");
    }

    #[test]
    fn profit_moves_balance() {
        let mut account = Account::new(100.0, 0.0, "EUR");
        account.apply_profit(25.5);
        account.apply_profit(-5.5);
        assert!((account.balance() - 120.0).abs() < f64::EPSILON);
    }

    #[test]
    fn metrics_include_floating_profit() {
        let mut broker = Broker::new();
        broker.send_order(
            OrderRequest {
                symbol: "X".into(),
                order_type: OrderType::Buy,
                volume: 10.0,
                price: 0.0,
                sl: 0.0,
                tp: 0.0,
                magic: 0,
                comment: String::new(),
            },
            0,
            1.0,
            1.0,
        );
        let account = Account::new(1000.0, 50.0, "USD");
        let m = account.metrics(&broker, 1.5, 1.6);
        assert!((m.open_profit - 5.0).abs() < f64::EPSILON);
        assert!((m.equity - 1005.0).abs() < f64::EPSILON);
        assert!((m.free_margin - 955.0).abs() < f64::EPSILON);
        assert!((m.closed_profit - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn metrics_serialize_in_camel_case() {
        let m = Account::default().metrics(&Broker::new(), 0.0, 0.0);
        let json = serde_json::to_value(m).unwrap();
        assert!(json.get("freeMargin").is_some());
        assert!(json.get("closedProfit").is_some());
    }
}
