//! Row <-> struct mapping for the persistence layer.

use tokio_postgres::Row;

use super::DbError;
use crate::types::{BankAccount, BulkRequest, RequestStatus, Transaction};

impl BankAccount {
    pub fn from_row(row: &Row) -> Result<Self, DbError> {
        Ok(Self {
            id: row.try_get("id")?,
            organization_name: row.try_get("organization_name")?,
            bic: row.try_get("bic")?,
            iban: row.try_get("iban")?,
            balance_cents: row.try_get("balance_cents")?,
            ongoing_transfer_cents: row.try_get("ongoing_transfer_cents")?,
        })
    }
}

impl BulkRequest {
    pub fn from_row(row: &Row) -> Result<Self, DbError> {
        let status_str: String = row.try_get("status")?;
        let status = RequestStatus::from_db_str(&status_str).ok_or_else(|| {
            DbError::Invariant(format!("unknown bulk_requests.status value: {status_str}"))
        })?;

        Ok(Self {
            id: row.try_get("id")?,
            request_uuid: row.try_get("request_uuid")?,
            bank_account_id: row.try_get("bank_account_id")?,
            status,
            total_amount_cents: row.try_get("total_amount_cents")?,
            processed_amount_cents: row.try_get("processed_amount_cents")?,
            created_at: row.try_get("created_at")?,
            completed_at: row.try_get("completed_at")?,
        })
    }
}

impl Transaction {
    pub fn from_row(row: &Row) -> Result<Self, DbError> {
        Ok(Self {
            id: row.try_get("id")?,
            transfer_uuid: row.try_get("transfer_uuid")?,
            bulk_request_uuid: row.try_get("bulk_request_uuid")?,
            counterparty_name: row.try_get("counterparty_name")?,
            counterparty_iban: row.try_get("counterparty_iban")?,
            counterparty_bic: row.try_get("counterparty_bic")?,
            amount_cents: row.try_get("amount_cents")?,
            amount_currency: row.try_get("amount_currency")?,
            bank_account_id: row.try_get("bank_account_id")?,
            description: row.try_get("description")?,
            created_at: row.try_get("created_at")?,
        })
    }
}
