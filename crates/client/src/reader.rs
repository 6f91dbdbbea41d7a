//! Source chain log reader.

use alloy_json_rpc::RpcError;
use alloy_primitives::{Address, B256};
use alloy_provider::Provider;
use alloy_rpc_types_eth::{Filter, Log};
use alloy_transport::TransportError;
use std::{future::Future, time::Duration};
use thiserror::Error;
use tracing::debug;

/// JSON-RPC codes that mean "slow down" rather than "bad request".
const RATE_LIMIT_CODES: [i64; 2] = [429, -32005];

/// Failure of a chain read.
///
/// [`ReaderError::Timeout`] and [`ReaderError::Connection`] are transient and
/// worth retrying; the other variants will fail the same way again.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReaderError {
    #[error("rpc call timed out after {0:?}")]
    Timeout(Duration),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("malformed rpc response: {0}")]
    MalformedResponse(String),

    #[error("rpc request rejected ({code}): {message}")]
    Rejected { code: i64, message: String },
}

impl ReaderError {
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::Connection(_))
    }
}

impl From<TransportError> for ReaderError {
    fn from(err: TransportError) -> Self {
        match err {
            RpcError::Transport(kind) => Self::Connection(kind.to_string()),
            RpcError::ErrorResp(payload) if RATE_LIMIT_CODES.contains(&payload.code) => {
                Self::Connection(format!("rate limited: {}", payload.message))
            }
            RpcError::ErrorResp(payload) => Self::Rejected {
                code: payload.code,
                message: payload.message.to_string(),
            },
            other => Self::MalformedResponse(other.to_string()),
        }
    }
}

/// Read access to the source chain.
pub trait ChainReader: Send + Sync {
    /// Current head block number.
    fn latest_block_height(&self) -> impl Future<Output = Result<u64, ReaderError>> + Send;

    /// Logs emitted by `contract` with topic0 `event_signature` in the
    /// inclusive range `[from_block, to_block]`.
    fn get_logs(
        &self,
        from_block: u64,
        to_block: u64,
        event_signature: B256,
        contract: Address,
    ) -> impl Future<Output = Result<Vec<Log>, ReaderError>> + Send;
}

/// [`ChainReader`] backed by an alloy provider.
#[derive(Debug, Clone)]
pub struct RpcChainReader<P> {
    provider: P,
}

impl<P> RpcChainReader<P>
where
    P: Provider + Clone,
{
    pub const fn new(provider: P) -> Self {
        Self { provider }
    }
}

impl<P> ChainReader for RpcChainReader<P>
where
    P: Provider + Clone,
{
    async fn latest_block_height(&self) -> Result<u64, ReaderError> {
        Ok(self.provider.get_block_number().await?)
    }

    async fn get_logs(
        &self,
        from_block: u64,
        to_block: u64,
        event_signature: B256,
        contract: Address,
    ) -> Result<Vec<Log>, ReaderError> {
        let filter = Filter::new()
            .address(contract)
            .event_signature(event_signature)
            .from_block(from_block)
            .to_block(to_block);

        let logs = self.provider.get_logs(&filter).await?;

        debug!(
            from = from_block,
            to = to_block,
            count = logs.len(),
            "Fetched logs"
        );

        Ok(logs)
    }
}
