use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use strum::{Display, EnumIter};

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub(crate) struct Amount {
    pub quantity: Decimal,
    pub asset: String,
}

impl Amount {
    pub(crate) fn new(quantity: Decimal, asset: impl Into<String>) -> Self {
        Self {
            quantity,
            asset: asset.into(),
        }
    }

    pub(crate) fn is_zero(&self) -> bool {
        self.quantity.is_zero()
    }

    /// Returns `None` for a zero quantity, since a fee of nothing is no fee.
    pub(crate) fn non_zero(self) -> Option<Self> {
        if self.is_zero() { None } else { Some(self) }
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} {}", self.quantity.normalize(), self.asset)
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Display, EnumIter)]
pub(crate) enum RecordType {
    Deposit,
    Withdrawal,
    Trade,
    Staking,
    Dividend,
    Spend,
}

/// Unified record for all exchanges and wallets.
///
/// Records are only built through the named constructors, which guarantee
/// that a record has at least one of `buy` and `sell`, and that a trade has
/// both.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub(crate) struct TransactionOutRecord {
    #[serde(rename = "type")]
    pub record_type: RecordType,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub buy: Option<Amount>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sell: Option<Amount>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fee: Option<Amount>,
    pub wallet: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl TransactionOutRecord {
    fn new(
        record_type: RecordType,
        timestamp: DateTime<Utc>,
        buy: Option<Amount>,
        sell: Option<Amount>,
        wallet: &str,
    ) -> Self {
        Self {
            record_type,
            timestamp,
            buy,
            sell,
            fee: None,
            wallet: wallet.to_owned(),
            note: None,
        }
    }

    pub(crate) fn deposit(timestamp: DateTime<Utc>, buy: Amount, wallet: &str) -> Self {
        Self::new(RecordType::Deposit, timestamp, Some(buy), None, wallet)
    }

    pub(crate) fn staking(timestamp: DateTime<Utc>, buy: Amount, wallet: &str) -> Self {
        Self::new(RecordType::Staking, timestamp, Some(buy), None, wallet)
    }

    pub(crate) fn dividend(timestamp: DateTime<Utc>, buy: Amount, wallet: &str) -> Self {
        Self::new(RecordType::Dividend, timestamp, Some(buy), None, wallet)
    }

    pub(crate) fn withdrawal(timestamp: DateTime<Utc>, sell: Amount, wallet: &str) -> Self {
        Self::new(RecordType::Withdrawal, timestamp, None, Some(sell), wallet)
    }

    pub(crate) fn spend(timestamp: DateTime<Utc>, sell: Amount, wallet: &str) -> Self {
        Self::new(RecordType::Spend, timestamp, None, Some(sell), wallet)
    }

    pub(crate) fn trade(timestamp: DateTime<Utc>, buy: Amount, sell: Amount, wallet: &str) -> Self {
        Self::new(RecordType::Trade, timestamp, Some(buy), Some(sell), wallet)
    }

    pub(crate) fn with_fee(mut self, fee: Option<Amount>) -> Self {
        self.fee = fee;
        self
    }

    pub(crate) fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

impl fmt::Display for TransactionOutRecord {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} {}", self.record_type, self.timestamp.format("%Y-%m-%dT%H:%M:%S%.f %Z"))?;
        if let Some(buy) = &self.buy {
            write!(f, " +{}", buy)?;
        }
        if let Some(sell) = &self.sell {
            write!(f, " -{}", sell)?;
        }
        if let Some(fee) = &self.fee {
            write!(f, " fee={}", fee)?;
        }
        write!(f, " '{}'", self.wallet)?;
        if let Some(note) = &self.note {
            write!(f, " '{}'", note)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;
    use strum::IntoEnumIterator;

    fn timestamp() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2023, 4, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn trade_has_both_legs() {
        let tx = TransactionOutRecord::trade(
            timestamp(),
            Amount::new(dec!(2), "BTC"),
            Amount::new(dec!(100), "USD"),
            "Kraken",
        );
        assert_eq!(tx.record_type, RecordType::Trade);
        assert!(tx.buy.is_some() && tx.sell.is_some());
        assert!(tx.fee.is_none());
    }

    #[test]
    fn zero_fee_is_dropped() {
        assert_eq!(Amount::new(dec!(0.000), "ETH").non_zero(), None);
        assert_eq!(
            Amount::new(dec!(0.1), "ETH").non_zero(),
            Some(Amount::new(dec!(0.1), "ETH"))
        );
    }

    #[test]
    fn record_type_names() {
        let names: Vec<String> = RecordType::iter().map(|t| t.to_string()).collect();
        assert_eq!(names, ["Deposit", "Withdrawal", "Trade", "Staking", "Dividend", "Spend"]);
    }

    #[test]
    fn display_record() {
        let tx = TransactionOutRecord::withdrawal(timestamp(), Amount::new(dec!(5.0), "ADA"), "ADALITE")
            .with_fee(Some(Amount::new(dec!(0.17), "ADA")))
            .with_note("abc");
        assert_eq!(
            tx.to_string(),
            "Withdrawal 2023-04-01T12:00:00 UTC -5 ADA fee=0.17 ADA 'ADALITE' 'abc'"
        );
    }
}
