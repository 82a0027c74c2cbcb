//! Core domain and wire types for the bulk-transfer service.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Status of a bulk request. Terminal states (`Completed`, `Failed`) are
/// sticky — no transition leaves them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RequestStatus {
    Pending,
    Completed,
    Failed,
}

impl RequestStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, RequestStatus::Completed | RequestStatus::Failed)
    }

    pub fn as_db_str(self) -> &'static str {
        match self {
            RequestStatus::Pending => "PENDING",
            RequestStatus::Completed => "COMPLETED",
            RequestStatus::Failed => "FAILED",
        }
    }

    pub fn from_db_str(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(RequestStatus::Pending),
            "COMPLETED" => Some(RequestStatus::Completed),
            "FAILED" => Some(RequestStatus::Failed),
            _ => None,
        }
    }
}

/// A bank account the organization holds funds in. Mutated only under an
/// exclusive row lock, by intake (reserve) and the finalizer
/// (finalize/cancel).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BankAccount {
    pub id: i64,
    pub organization_name: String,
    pub bic: String,
    pub iban: String,
    pub balance_cents: i64,
    pub ongoing_transfer_cents: i64,
}

/// A client-submitted bulk credit-transfer request and its lifecycle
/// state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkRequest {
    pub id: i64,
    pub request_uuid: Uuid,
    pub bank_account_id: i64,
    pub status: RequestStatus,
    pub total_amount_cents: i64,
    pub processed_amount_cents: i64,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// A single credit-transfer ledger row. `amount_cents` is stored negative
/// to denote a debit; the sign is applied once at creation and never
/// re-flipped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: i64,
    pub transfer_uuid: Uuid,
    pub bulk_request_uuid: Uuid,
    pub counterparty_name: String,
    pub counterparty_iban: String,
    pub counterparty_bic: String,
    pub amount_cents: i64,
    pub amount_currency: String,
    pub bank_account_id: i64,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

/// Transient, in-queue envelope for a single credit transfer. `amount_cents`
/// is always positive here; the storage layer negates it on write.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferJob {
    pub transfer_uuid: Uuid,
    pub bulk_request_uuid: Uuid,
    pub bank_account_id: i64,
    pub counterparty_name: String,
    pub counterparty_iban: String,
    pub counterparty_bic: String,
    pub amount_cents: i64,
    pub amount_currency: String,
    pub description: String,
}

/// Transient, in-queue envelope reporting the outcome of a single child
/// transfer back to the finalizer. Never erase this into a generic
/// "message" type — dispatch is by queue identity and `success` is a
/// first-class discriminator, not a payload field to branch on later.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalizeBulkJob {
    pub bulk_request_uuid: Uuid,
    pub bank_account_id: i64,
    pub single_transferred_amount_cents: i64,
    pub success: bool,
}

// --- HTTP wire types -------------------------------------------------

/// One transfer within a bulk request, as received over HTTP. `amount`
/// is a string so the caller can express exact decimal cents without
/// float round-trip loss; it is parsed by `amounts::to_cents` downstream.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreditTransfer {
    pub amount: String,
    pub currency: String,
    pub counterparty_name: String,
    pub counterparty_bic: String,
    pub counterparty_iban: String,
    pub description: String,
}

/// `POST /transfers/bulk` request body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BulkTransferRequest {
    pub request_id: String,
    pub organization_bic: String,
    pub organization_iban: String,
    pub credit_transfers: Vec<CreditTransfer>,
}

impl CreditTransfer {
    /// Shape checks `serde` can't express: 3-letter currency code, and a
    /// description long enough to be useful on a bank statement.
    pub fn validate_shape(&self) -> Result<(), String> {
        if self.currency.len() != 3 || !self.currency.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(format!("currency must be a 3-letter code: {}", self.currency));
        }
        if self.description.len() < 10 {
            return Err("description must be at least 10 characters".to_string());
        }
        Ok(())
    }
}

impl BulkTransferRequest {
    pub fn validate_shape(&self) -> Result<(), String> {
        for transfer in &self.credit_transfers {
            transfer.validate_shape()?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkTransferSuccessResponse {
    pub bulk_id: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetails {
    pub reason: String,
    pub details: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkTransferErrorResponse {
    pub bulk_id: String,
    pub message: String,
    pub error: ErrorDetails,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states_are_sticky() {
        assert!(RequestStatus::Completed.is_terminal());
        assert!(RequestStatus::Failed.is_terminal());
        assert!(!RequestStatus::Pending.is_terminal());
    }

    #[test]
    fn db_str_round_trips() {
        for status in [
            RequestStatus::Pending,
            RequestStatus::Completed,
            RequestStatus::Failed,
        ] {
            assert_eq!(RequestStatus::from_db_str(status.as_db_str()), Some(status));
        }
    }

    #[test]
    fn credit_transfer_rejects_unknown_fields() {
        let json = r#"{
            "amount": "10.00",
            "currency": "EUR",
            "counterparty_name": "Acme",
            "counterparty_bic": "OIVUSCLQXXX",
            "counterparty_iban": "FR1047460800000200610",
            "description": "invoice settlement",
            "extra": "nope"
        }"#;
        let result: Result<CreditTransfer, _> = serde_json::from_str(json);
        assert!(result.is_err());
    }
}
