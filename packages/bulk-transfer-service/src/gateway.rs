//! Remote transfer gateway (C7)
//!
//! Abstracts the interbank network call a transfer worker makes to
//! actually move funds. Production deployments point this at a real
//! payment rail; tests substitute the mock generated by `mockall`.

use async_trait::async_trait;

use crate::types::TransferJob;

/// Sends a single credit transfer to the interbank network and reports
/// whether the remote side accepted it. Implementations are expected to
/// be idempotent on the `transfer_uuid` — the worker may call `send`
/// more than once for the same job after a redelivery.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RemoteTransferGateway: Send + Sync {
    async fn send(&self, job: &TransferJob) -> bool;
}

/// Reference gateway used outside of tests: accepts every transfer.
/// Stands in for the real interbank network integration.
pub struct AcceptAllGateway;

#[async_trait]
impl RemoteTransferGateway for AcceptAllGateway {
    async fn send(&self, job: &TransferJob) -> bool {
        tracing::info!(
            transfer_uuid = %job.transfer_uuid,
            amount_cents = job.amount_cents,
            "sending transfer to remote gateway"
        );
        true
    }
}
