//! The relay cycle.
//!
//! One cycle plans the next safe window, fetches and decodes its deposit
//! logs, drops the ones already relayed, builds a signed mint for each new
//! deposit and finally commits the window to the checkpoint store. Any
//! failure before the commit leaves the persisted checkpoint untouched, so
//! the same window is scanned again on the next cycle.

use crate::{
    error::RelayError,
    metrics::Metrics,
    retry::{call_with_retry, RetryPolicy},
    state::EngineState,
};
use alloy_primitives::B256;
use alloy_rpc_types_eth::Log;
use checkpoint::{CheckpointError, CheckpointStore, DedupLedger};
use client::ChainReader;
use config::RelayParams;
use deposit::{DecodeError, DepositEvent, DepositId, EventDecoder};
use mint::{InstructionBuilder, MintInstruction};
use scanner::{plan, safe_head, ScanWindow};
use std::{collections::HashSet, fmt, time::Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

/// A log inside a scanned window that could not be relayed.
///
/// These never block progress: they are reported and the window still
/// commits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntegrityFailure {
    pub window: ScanWindow,
    pub block_number: Option<u64>,
    pub tx_hash: Option<B256>,
    pub log_index: Option<u64>,
    pub reason: String,
}

impl IntegrityFailure {
    fn from_log(window: ScanWindow, log: &Log, reason: impl Into<String>) -> Self {
        Self {
            window,
            block_number: log.block_number,
            tx_hash: log.transaction_hash,
            log_index: log.log_index,
            reason: reason.into(),
        }
    }

    fn undecodable(window: ScanWindow, log: &Log, err: &DecodeError) -> Self {
        Self::from_log(window, log, err.to_string())
    }

    fn outside_window(window: ScanWindow, log: &Log, event: &DepositEvent) -> Self {
        Self::from_log(
            window,
            log,
            format!("log at block {} is outside the scanned window", event.block_number),
        )
    }
}

impl fmt::Display for IntegrityFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "window {}", self.window)?;
        if let Some(tx) = self.tx_hash {
            write!(f, " tx {tx}")?;
        }
        if let Some(index) = self.log_index {
            write!(f, " log {index}")?;
        }
        write!(f, ": {}", self.reason)
    }
}

/// What a committed cycle did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub window: ScanWindow,
    pub chain_head: u64,
    pub safe_head: u64,
    /// Signed mints, in chain order
    pub built: Vec<MintInstruction>,
    /// Deposits dropped as already processed
    pub skipped: usize,
    pub integrity_failures: Vec<IntegrityFailure>,
}

impl CycleReport {
    /// More confirmed blocks are waiting beyond this window.
    pub const fn has_backlog(&self) -> bool {
        self.window.to_block < self.safe_head
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Nothing new is final yet.
    Idle { chain_head: u64 },
    Committed(CycleReport),
}

/// Drives scan cycles over one source contract.
///
/// The engine owns the in-memory dedup ledger, the last committed block and
/// the next destination nonce. The checkpoint is loaded lazily on the first
/// cycle.
pub struct RelayEngine<R, D, B, S> {
    reader: R,
    decoder: D,
    builder: B,
    store: S,
    params: RelayParams,
    retry: RetryPolicy,
    metrics: Metrics,
    state: EngineState,
    loaded: bool,
    last_processed_block: u64,
    ledger: DedupLedger,
    next_nonce: u64,
}

impl<R, D, B, S> RelayEngine<R, D, B, S>
where
    R: ChainReader,
    D: EventDecoder,
    B: InstructionBuilder,
    S: CheckpointStore,
{
    /// Fails if `params` do not validate.
    pub fn new(
        reader: R,
        decoder: D,
        builder: B,
        store: S,
        params: RelayParams,
        initial_nonce: u64,
    ) -> Result<Self, RelayError> {
        params.validate()?;
        Ok(Self {
            reader,
            decoder,
            builder,
            store,
            retry: RetryPolicy::from_params(&params),
            params,
            metrics: Metrics::new(),
            state: EngineState::Idle,
            loaded: false,
            last_processed_block: 0,
            ledger: DedupLedger::default(),
            next_nonce: initial_nonce,
        })
    }

    pub const fn state(&self) -> EngineState {
        self.state
    }

    /// Nonce the next built instruction will carry.
    pub const fn next_nonce(&self) -> u64 {
        self.next_nonce
    }

    /// Last committed block, once the checkpoint has been loaded.
    pub const fn last_processed_block(&self) -> Option<u64> {
        if self.loaded {
            Some(self.last_processed_block)
        } else {
            None
        }
    }

    /// Run cycles until `cancel` fires or a fatal error occurs.
    ///
    /// A cycle that leaves confirmed blocks behind is followed immediately by
    /// the next one. After a failed cycle the pause is doubled.
    pub async fn run(&mut self, cancel: CancellationToken) -> Result<(), RelayError> {
        info!(
            confirmations = self.params.block_confirmations_required,
            batch_size = self.params.scan_batch_size,
            poll_interval = ?self.params.poll_interval(),
            contract = %self.decoder.contract(),
            "Starting relay engine"
        );

        while !cancel.is_cancelled() {
            let pause = match self.run_cycle(&cancel).await {
                Ok(CycleOutcome::Committed(report)) if report.has_backlog() => {
                    debug!(
                        to = report.window.to_block,
                        safe_head = report.safe_head,
                        "Catching up, continuing without pause"
                    );
                    None
                }
                Ok(_) => Some(self.params.poll_interval()),
                Err(RelayError::Cancelled) => break,
                Err(e) if e.is_fatal() => {
                    error!(error = %e, "Relay engine stopped");
                    return Err(e);
                }
                Err(e) => {
                    error!(error = %e, "Cycle failed, window will be retried");
                    Some(self.params.poll_interval() * 2)
                }
            };

            if let Some(pause) = pause {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(pause) => {}
                }
            }
        }

        info!(
            last_processed_block = ?self.last_processed_block(),
            next_nonce = self.next_nonce,
            "Relay engine stopped"
        );
        Ok(())
    }

    /// Run exactly one cycle.
    ///
    /// On error the engine state is `FailedFatal` for fatal errors and
    /// `FailedRetryable` otherwise; the persisted checkpoint is unchanged.
    pub async fn run_cycle(
        &mut self,
        cancel: &CancellationToken,
    ) -> Result<CycleOutcome, RelayError> {
        let started = Instant::now();
        let result = self.cycle(cancel).await;

        if matches!(result, Err(RelayError::Cancelled)) {
            self.transition(EngineState::Idle);
            return result;
        }

        let next = match &result {
            Ok(_) => EngineState::Idle,
            Err(e) if e.is_fatal() => EngineState::FailedFatal,
            Err(_) => EngineState::FailedRetryable,
        };
        self.transition(next);

        self.metrics.record_cycle(result.is_ok(), started.elapsed());
        result
    }

    /// Run one cycle as a standalone job. Cancellation is a clean stop and
    /// yields `None`, like it does for [`RelayEngine::run`].
    pub async fn run_once(
        &mut self,
        cancel: &CancellationToken,
    ) -> Result<Option<CycleOutcome>, RelayError> {
        match self.run_cycle(cancel).await {
            Ok(outcome) => Ok(Some(outcome)),
            Err(RelayError::Cancelled) => {
                info!("Cycle cancelled");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn cycle(&mut self, cancel: &CancellationToken) -> Result<CycleOutcome, RelayError> {
        self.ensure_loaded().await?;

        self.transition(EngineState::Fetching);
        let chain_head = call_with_retry(
            &self.retry,
            cancel,
            &self.metrics,
            "latest_block_height",
            None,
            || self.reader.latest_block_height(),
        )
        .await?;
        self.metrics.set_chain_head(chain_head);

        let confirmations = self.params.block_confirmations_required;
        let Some(window) = plan(
            chain_head,
            self.last_processed_block,
            confirmations,
            self.params.scan_batch_size,
        ) else {
            debug!(
                chain_head,
                last_processed_block = self.last_processed_block,
                "No newly confirmed blocks"
            );
            return Ok(CycleOutcome::Idle { chain_head });
        };

        info!(
            from = window.from_block,
            to = window.to_block,
            blocks = window.len(),
            chain_head,
            "Scanning window"
        );

        let contract = self.decoder.contract();
        let signature = self.decoder.event_signature();
        let logs = call_with_retry(
            &self.retry,
            cancel,
            &self.metrics,
            "get_logs",
            Some(window),
            || {
                self.reader
                    .get_logs(window.from_block, window.to_block, signature, contract)
            },
        )
        .await?;

        self.transition(EngineState::Decoding);
        let (events, integrity_failures) = self.decode_window(window, &logs);

        self.transition(EngineState::Filtering);
        let (pending, skipped) = self.filter_new(events);
        if skipped > 0 {
            self.metrics.record_deposits_skipped(skipped);
        }

        self.transition(EngineState::Building);
        let built = self.build_all(window, &pending)?;

        self.transition(EngineState::Committing);
        self.commit(window).await?;

        info!(
            from = window.from_block,
            to = window.to_block,
            built = built.len(),
            skipped,
            integrity_failures = integrity_failures.len(),
            processed = self.ledger.len(),
            "Window committed"
        );

        Ok(CycleOutcome::Committed(CycleReport {
            window,
            chain_head,
            safe_head: safe_head(chain_head, confirmations),
            built,
            skipped,
            integrity_failures,
        }))
    }

    async fn ensure_loaded(&mut self) -> Result<(), RelayError> {
        if self.loaded {
            return Ok(());
        }

        let checkpoint = self
            .store
            .load()
            .await
            .map_err(RelayError::CheckpointLoad)?;

        info!(
            last_processed_block = checkpoint.last_processed_block,
            processed = checkpoint.processed_ids.len(),
            "Checkpoint loaded"
        );

        self.ledger = DedupLedger::from_checkpoint(&checkpoint);
        self.last_processed_block = checkpoint.last_processed_block;
        self.loaded = true;
        self.metrics
            .set_last_processed_block(self.last_processed_block);
        Ok(())
    }

    /// Decode every log, keeping valid in-window events in chain order.
    fn decode_window(
        &self,
        window: ScanWindow,
        logs: &[Log],
    ) -> (Vec<DepositEvent>, Vec<IntegrityFailure>) {
        let mut events = Vec::with_capacity(logs.len());
        let mut failures = Vec::new();

        for log in logs {
            let failure = match self.decoder.decode(log) {
                Ok(event) if window.contains(event.block_number) => {
                    events.push(event);
                    continue;
                }
                Ok(event) => IntegrityFailure::outside_window(window, log, &event),
                Err(e) => IntegrityFailure::undecodable(window, log, &e),
            };

            error!(
                window = %failure.window,
                block = ?failure.block_number,
                tx_hash = ?failure.tx_hash,
                log_index = ?failure.log_index,
                reason = %failure.reason,
                "Dropping log that failed validation"
            );
            self.metrics.record_integrity_failure();
            failures.push(failure);
        }

        events.sort_by_key(DepositEvent::position);
        (events, failures)
    }

    /// Split `events` into deposits still to relay and a count of skipped ones.
    fn filter_new(&self, events: Vec<DepositEvent>) -> (Vec<DepositEvent>, usize) {
        let mut seen: HashSet<DepositId> = HashSet::with_capacity(events.len());
        let mut pending = Vec::with_capacity(events.len());
        let mut skipped = 0;

        for event in events {
            if self.ledger.is_new(&event.deposit_id) && seen.insert(event.deposit_id) {
                pending.push(event);
            } else {
                trace!(deposit_id = %event.deposit_id, "Deposit already processed");
                skipped += 1;
            }
        }

        (pending, skipped)
    }

    fn build_all(
        &mut self,
        window: ScanWindow,
        pending: &[DepositEvent],
    ) -> Result<Vec<MintInstruction>, RelayError> {
        let mut built = Vec::with_capacity(pending.len());

        for event in pending {
            let instruction = self
                .builder
                .build(event, self.next_nonce)
                .map_err(|source| RelayError::Build {
                    deposit_id: event.deposit_id,
                    block: event.block_number,
                    window,
                    source,
                })?;

            self.ledger.mark_processed(event.deposit_id);
            self.next_nonce += 1;
            self.metrics.record_deposit_relayed();

            info!(
                deposit_id = %event.deposit_id,
                block = event.block_number,
                recipient = %event.recipient,
                amount = %event.amount,
                to = %instruction.to,
                from = %instruction.from,
                nonce = instruction.nonce,
                data = %data_prefix(&instruction.data),
                tx_hash = %instruction.tx_hash,
                "[SIMULATION] Built signed mint transaction, not broadcasting"
            );
            built.push(instruction);
        }

        Ok(built)
    }

    async fn commit(&mut self, window: ScanWindow) -> Result<(), RelayError> {
        if window.to_block <= self.last_processed_block {
            return Err(RelayError::CheckpointSave {
                window,
                source: CheckpointError::Regression {
                    current: self.last_processed_block,
                    attempted: window.to_block,
                },
            });
        }

        let checkpoint = self.ledger.snapshot(window.to_block);
        if let Err(source) = self.store.save(&checkpoint).await {
            warn!(window = %window, error = %source, "Checkpoint save failed");
            return Err(RelayError::CheckpointSave { window, source });
        }

        self.last_processed_block = window.to_block;
        self.metrics.record_window_committed(window.to_block);
        Ok(())
    }

    fn transition(&mut self, next: EngineState) {
        if self.state != next {
            trace!(from = %self.state, to = %next, "Engine state");
            self.state = next;
        }
    }
}

/// First bytes of calldata as hex, for log lines.
fn data_prefix(data: &[u8]) -> String {
    const PREFIX_LEN: usize = 32;
    let shown = &data[..data.len().min(PREFIX_LEN)];
    let hex = alloy_primitives::hex::encode_prefixed(shown);
    if data.len() > PREFIX_LEN {
        format!("{hex}..")
    } else {
        hex
    }
}
