//! Transaction model and raw ingest records.

use chrono::NaiveDateTime;
use sentinel_core::error::{EngineError, Result};
use serde::{Deserialize, Serialize};

/// Dense node index assigned by the graph builder.
///
/// Indices are assigned in ascending account-id order, so iterating
/// `0..node_count` visits accounts lexicographically. Every deterministic
/// traversal in the pipeline relies on this.
pub type NodeId = u32;

/// Index into the flat edge table.
pub type EdgeId = u32;

/// A validated financial transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    /// Opaque transaction identifier.
    pub txn_id: String,
    /// Sending account.
    pub sender: String,
    /// Receiving account.
    pub receiver: String,
    /// Transferred amount; always finite and positive.
    pub amount: f64,
    /// Naive instant; timezone handling is out of scope.
    pub timestamp: NaiveDateTime,
}

impl Transaction {
    /// Create a validated transaction.
    ///
    /// Fails with [`EngineError::MalformedInput`] when the amount is not a
    /// finite positive number or an account id is empty.
    pub fn new(
        txn_id: impl Into<String>,
        sender: impl Into<String>,
        receiver: impl Into<String>,
        amount: f64,
        timestamp: NaiveDateTime,
    ) -> Result<Self> {
        let txn_id = txn_id.into();
        let sender = sender.into();
        let receiver = receiver.into();

        if !amount.is_finite() || amount <= 0.0 {
            return Err(EngineError::malformed(format!(
                "transaction {txn_id}: amount must be a positive number, got {amount}"
            )));
        }
        if sender.is_empty() || receiver.is_empty() {
            return Err(EngineError::malformed(format!(
                "transaction {txn_id}: empty account id"
            )));
        }

        Ok(Self {
            txn_id,
            sender,
            receiver,
            amount,
            timestamp,
        })
    }

    /// Returns true if sender and receiver are the same account.
    #[must_use]
    pub fn is_self_loop(&self) -> bool {
        self.sender == self.receiver
    }
}

/// Raw record handed over by the CSV-parsing collaborator.
///
/// The amount arrives as a decimal, the timestamp as ISO-8601 without a
/// timezone. Parsing failures are fatal [`EngineError::MalformedInput`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionRecord {
    /// Opaque transaction identifier.
    pub transaction_id: String,
    /// Sending account.
    pub sender_id: String,
    /// Receiving account.
    pub receiver_id: String,
    /// Decimal amount.
    pub amount: f64,
    /// ISO-8601 timestamp, no timezone.
    pub timestamp: String,
}

impl TransactionRecord {
    /// Parse and validate into a [`Transaction`].
    pub fn parse(&self) -> Result<Transaction> {
        let timestamp = parse_timestamp(&self.timestamp).map_err(|e| {
            EngineError::malformed(format!(
                "transaction {}: bad timestamp {:?}: {e}",
                self.transaction_id, self.timestamp
            ))
        })?;

        Transaction::new(
            self.transaction_id.clone(),
            self.sender_id.clone(),
            self.receiver_id.clone(),
            self.amount,
            timestamp,
        )
    }
}

/// Parse an ISO-8601 timestamp without timezone.
///
/// Accepts the `T` and space separators, with optional fractional seconds.
pub fn parse_timestamp(s: &str) -> std::result::Result<NaiveDateTime, chrono::ParseError> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(s: &str) -> NaiveDateTime {
        parse_timestamp(s).unwrap()
    }

    #[test]
    fn test_valid_transaction() {
        let txn = Transaction::new("T1", "A", "B", 100.0, ts("2024-03-01T10:00:00")).unwrap();
        assert_eq!(txn.sender, "A");
        assert!(!txn.is_self_loop());
    }

    #[test]
    fn test_rejects_non_positive_amounts() {
        let stamp = ts("2024-03-01T10:00:00");
        assert!(Transaction::new("T1", "A", "B", 0.0, stamp).is_err());
        assert!(Transaction::new("T1", "A", "B", -5.0, stamp).is_err());
        assert!(Transaction::new("T1", "A", "B", f64::NAN, stamp).is_err());
        assert!(Transaction::new("T1", "A", "B", f64::INFINITY, stamp).is_err());
    }

    #[test]
    fn test_rejects_empty_accounts() {
        let stamp = ts("2024-03-01T10:00:00");
        assert!(Transaction::new("T1", "", "B", 10.0, stamp).is_err());
        assert!(Transaction::new("T1", "A", "", 10.0, stamp).is_err());
    }

    #[test]
    fn test_self_loop_flag() {
        let txn = Transaction::new("T1", "A", "A", 10.0, ts("2024-03-01T10:00:00")).unwrap();
        assert!(txn.is_self_loop());
    }

    #[test]
    fn test_timestamp_formats() {
        assert!(parse_timestamp("2024-03-01T10:00:00").is_ok());
        assert!(parse_timestamp("2024-03-01 10:00:00").is_ok());
        assert!(parse_timestamp("2024-03-01T10:00:00.250").is_ok());
        assert!(parse_timestamp("yesterday").is_err());
    }

    #[test]
    fn test_record_parse() {
        let record = TransactionRecord {
            transaction_id: "T1".to_string(),
            sender_id: "ACC-1".to_string(),
            receiver_id: "ACC-2".to_string(),
            amount: 950.0,
            timestamp: "2024-03-01T10:00:00".to_string(),
        };
        let txn = record.parse().unwrap();
        assert_eq!(txn.receiver, "ACC-2");

        let bad = TransactionRecord {
            timestamp: "not-a-date".to_string(),
            ..record
        };
        let err = bad.parse().unwrap_err();
        assert!(err.is_fatal());
    }
}
