//! Relay cycle scenarios against a scripted source chain.

use crate::setup::*;
use alloy_primitives::{Address, U256};
use alloy_sol_types::SolCall;
use binding::IDestinationBridge::mintTokensCall;
use checkpoint::{Checkpoint, FileCheckpointStore};
use relayer::{CycleOutcome, EngineState, RelayEngine, RelayError};
use scanner::ScanWindow;
use std::collections::BTreeSet;
use tokio_util::sync::CancellationToken;


const RECIPIENT: Address = Address::repeat_byte(0x03);

fn committed(outcome: CycleOutcome) -> relayer::CycleReport {
    match outcome {
        CycleOutcome::Committed(report) => report,
        other => panic!("expected a committed cycle, got {other:?}"),
    }
}

#[tokio::test]
async fn test_idle_until_blocks_are_confirmed() {
    let reader = MockChainReader::new(4_500_112);
    let builder = CountingBuilder::new();
    let store = FlakyStore::fresh();
    let mut engine = engine(&reader, &builder, &store);

    let outcome = engine.run_cycle(&CancellationToken::new()).await.unwrap();

    assert_eq!(
        outcome,
        CycleOutcome::Idle {
            chain_head: 4_500_112
        }
    );
    assert!(reader.log_queries().is_empty());
    assert_eq!(store.saved(), None);
    assert_eq!(engine.state(), EngineState::Idle);
    assert_eq!(engine.last_processed_block(), Some(4_500_100));
}

#[tokio::test]
async fn test_relays_confirmed_deposit_once() {
    let reader = MockChainReader::new(4_500_130);
    let log = deposit_log(4_500_105, 0, 0xaa, RECIPIENT, 1_000);
    let id = deposit_id(&log);
    reader.push_log(log);

    let builder = CountingBuilder::new();
    let store = FlakyStore::fresh();
    let mut engine = engine(&reader, &builder, &store);

    let report = committed(engine.run_cycle(&CancellationToken::new()).await.unwrap());

    assert_eq!(
        report.window,
        ScanWindow {
            from_block: 4_500_101,
            to_block: 4_500_118
        }
    );
    assert_eq!(reader.log_queries(), vec![(4_500_101, 4_500_118)]);
    assert_eq!(report.built.len(), 1);
    assert_eq!(report.skipped, 0);
    assert!(report.integrity_failures.is_empty());
    assert!(!report.has_backlog());

    let instruction = &report.built[0];
    assert_eq!(instruction.to, DESTINATION_BRIDGE);
    assert_eq!(instruction.nonce, INITIAL_NONCE);
    let call = mintTokensCall::abi_decode(&instruction.data).unwrap();
    assert_eq!(call.recipient, RECIPIENT);
    assert_eq!(call.amount, U256::from(1_000));

    assert_eq!(
        store.saved(),
        Some(Checkpoint::new(4_500_118, BTreeSet::from([id])))
    );
    assert_eq!(engine.last_processed_block(), Some(4_500_118));
    assert_eq!(engine.next_nonce(), INITIAL_NONCE + 1);
    assert_eq!(engine.state(), EngineState::Idle);

    // Nothing new is confirmed yet.
    let outcome = engine.run_cycle(&CancellationToken::new()).await.unwrap();
    assert!(matches!(outcome, CycleOutcome::Idle { .. }));
    assert_eq!(builder.calls(), 1);
}

#[tokio::test]
async fn test_events_built_in_chain_order() {
    let reader = MockChainReader::new(4_500_130);
    reader.push_log(deposit_log(4_500_110, 4, 0xa3, Address::repeat_byte(0x33), 3));
    reader.push_log(deposit_log(4_500_102, 1, 0xa1, Address::repeat_byte(0x11), 1));
    reader.push_log(deposit_log(4_500_110, 0, 0xa2, Address::repeat_byte(0x22), 2));

    let builder = CountingBuilder::new();
    let store = FlakyStore::fresh();
    let mut engine = engine(&reader, &builder, &store);

    let report = committed(engine.run_cycle(&CancellationToken::new()).await.unwrap());

    let recipients: Vec<Address> = report
        .built
        .iter()
        .map(|i| mintTokensCall::abi_decode(&i.data).unwrap().recipient)
        .collect();
    assert_eq!(
        recipients,
        vec![
            Address::repeat_byte(0x11),
            Address::repeat_byte(0x22),
            Address::repeat_byte(0x33)
        ]
    );
    let nonces: Vec<u64> = report.built.iter().map(|i| i.nonce).collect();
    assert_eq!(nonces, vec![INITIAL_NONCE, INITIAL_NONCE + 1, INITIAL_NONCE + 2]);
}

#[tokio::test]
async fn test_replay_against_processed_ids_builds_nothing() {
    let reader = MockChainReader::new(4_500_130);
    reader.push_log(deposit_log(4_500_105, 0, 0xaa, RECIPIENT, 1_000));
    reader.push_log(deposit_log(4_500_117, 3, 0xab, RECIPIENT, 2_000));

    let builder = CountingBuilder::new();
    let store = FlakyStore::fresh();
    let mut first = engine(&reader, &builder, &store);
    committed(first.run_cycle(&CancellationToken::new()).await.unwrap());
    let first_checkpoint = store.saved().unwrap();
    assert_eq!(builder.calls(), 2);

    // Same window again, but with the ids already recorded.
    let replay_store = FlakyStore::seeded(Checkpoint::new(
        4_500_100,
        first_checkpoint.processed_ids.clone(),
    ));
    let replay_builder = CountingBuilder::new();
    let mut replay = engine(&reader, &replay_builder, &replay_store);
    let report = committed(replay.run_cycle(&CancellationToken::new()).await.unwrap());

    assert!(report.built.is_empty());
    assert_eq!(report.skipped, 2);
    assert_eq!(replay_builder.calls(), 0);
    assert_eq!(replay_store.saved(), Some(first_checkpoint));
    assert_eq!(replay.next_nonce(), INITIAL_NONCE);
}

#[tokio::test]
async fn test_duplicate_log_in_batch_is_built_once() {
    let reader = MockChainReader::new(4_500_130);
    let log = deposit_log(4_500_105, 0, 0xaa, RECIPIENT, 1_000);
    reader.push_log(log.clone());
    reader.push_log(log);

    let builder = CountingBuilder::new();
    let store = FlakyStore::fresh();
    let mut engine = engine(&reader, &builder, &store);

    let report = committed(engine.run_cycle(&CancellationToken::new()).await.unwrap());
    assert_eq!(report.built.len(), 1);
    assert_eq!(report.skipped, 1);
    assert_eq!(builder.calls(), 1);
}

#[tokio::test]
async fn test_decode_failure_reported_and_window_commits() {
    let reader = MockChainReader::new(4_500_130);
    let good = deposit_log(4_500_105, 0, 0xaa, RECIPIENT, 1_000);
    let good_id = deposit_id(&good);
    reader.push_log(good);
    reader.push_log(garbage_log(4_500_107, 1, 0xee));
    reader.push_log(deposit_log(4_500_109, 2, 0xef, Address::ZERO, 5));

    let builder = CountingBuilder::new();
    let store = FlakyStore::fresh();
    let mut engine = engine(&reader, &builder, &store);

    let report = committed(engine.run_cycle(&CancellationToken::new()).await.unwrap());

    assert_eq!(report.built.len(), 1);
    assert_eq!(report.integrity_failures.len(), 2);
    let failure = &report.integrity_failures[0];
    assert_eq!(failure.window, report.window);
    assert_eq!(failure.block_number, Some(4_500_107));
    assert_eq!(failure.log_index, Some(1));
    assert!(!failure.reason.is_empty());
    assert!(report.integrity_failures[1].reason.contains("zero address"));

    let saved = store.saved().unwrap();
    assert_eq!(saved.last_processed_block, 4_500_118);
    assert_eq!(saved.processed_ids, BTreeSet::from([good_id]));
}

#[tokio::test]
async fn test_log_outside_window_is_never_built() {
    let reader = MockChainReader::new(4_500_130);
    reader.push_stray_log(deposit_log(4_500_125, 0, 0xaa, RECIPIENT, 1_000));

    let builder = CountingBuilder::new();
    let store = FlakyStore::fresh();
    let mut engine = engine(&reader, &builder, &store);

    let report = committed(engine.run_cycle(&CancellationToken::new()).await.unwrap());

    assert!(report.built.is_empty());
    assert_eq!(report.integrity_failures.len(), 1);
    assert!(report.integrity_failures[0]
        .reason
        .contains("outside the scanned window"));
    assert_eq!(builder.calls(), 0);
    assert!(store.saved().unwrap().processed_ids.is_empty());
}

#[tokio::test]
async fn test_build_failure_aborts_without_commit() {
    let reader = MockChainReader::new(4_500_130);
    let first = deposit_log(4_500_103, 0, 0xa1, RECIPIENT, 1);
    let second = deposit_log(4_500_110, 0, 0xa2, RECIPIENT, 2);
    let (first_id, second_id) = (deposit_id(&first), deposit_id(&second));
    reader.push_log(first);
    reader.push_log(second);

    let builder = CountingBuilder::new();
    builder.fail_for(second_id);
    let store = FlakyStore::fresh();
    let mut engine = engine(&reader, &builder, &store);

    let err = engine
        .run_cycle(&CancellationToken::new())
        .await
        .unwrap_err();
    match &err {
        RelayError::Build {
            deposit_id, block, ..
        } => {
            assert_eq!(*deposit_id, second_id);
            assert_eq!(*block, 4_500_110);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(!err.is_fatal());
    assert_eq!(engine.state(), EngineState::FailedRetryable);
    assert_eq!(store.saved(), None);
    assert_eq!(engine.last_processed_block(), Some(4_500_100));
    assert_eq!(builder.calls(), 2);

    // The same window is retried; only the failed deposit is built again.
    builder.clear_failures();
    let report = committed(engine.run_cycle(&CancellationToken::new()).await.unwrap());
    assert_eq!(report.window.from_block, 4_500_101);
    assert_eq!(report.built.len(), 1);
    assert_eq!(report.skipped, 1);
    assert_eq!(builder.calls(), 3);
    assert_eq!(report.built[0].nonce, INITIAL_NONCE + 1);
    assert_eq!(
        store.saved().unwrap().processed_ids,
        BTreeSet::from([first_id, second_id])
    );
}

#[tokio::test]
async fn test_catch_up_reports_backlog() {
    let reader = MockChainReader::new(4_500_130);
    let builder = CountingBuilder::new();
    let store = FlakyStore::fresh();
    let params = config::RelayParams {
        scan_batch_size: 10,
        ..test_params()
    };
    let mut engine = engine_with(&reader, &builder, &store, params);
    let cancel = CancellationToken::new();

    let report = committed(engine.run_cycle(&cancel).await.unwrap());
    assert_eq!(report.window.to_block, 4_500_110);
    assert!(report.has_backlog());

    let report = committed(engine.run_cycle(&cancel).await.unwrap());
    assert_eq!(
        report.window,
        ScanWindow {
            from_block: 4_500_111,
            to_block: 4_500_118
        }
    );
    assert!(!report.has_backlog());
}

#[tokio::test]
async fn test_corrupt_checkpoint_is_fatal() {
    let dir = std::env::temp_dir().join(format!("relayer-engine-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("scanner_state.json");
    std::fs::write(&path, b"{\"last_processed_block\": ").unwrap();

    let reader = MockChainReader::new(4_500_130);
    let mut engine = RelayEngine::new(
        reader.clone(),
        deposit::TokensLockedDecoder::new(SOURCE_BRIDGE, SOURCE_TOKEN),
        CountingBuilder::new(),
        FileCheckpointStore::new(&path, START_BLOCK),
        test_params(),
        INITIAL_NONCE,
    )
    .unwrap();

    let err = engine
        .run_cycle(&CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, RelayError::CheckpointLoad(_)));
    assert!(err.is_fatal());
    assert_eq!(engine.state(), EngineState::FailedFatal);
    assert_eq!(reader.head_queries(), 0);
    // The corrupt file is left for an operator to inspect.
    assert_eq!(
        std::fs::read(&path).unwrap(),
        b"{\"last_processed_block\": ".to_vec()
    );

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn test_invalid_params_rejected() {
    let reader = MockChainReader::new(0);
    let params = config::RelayParams {
        scan_batch_size: 0,
        ..test_params()
    };
    let result = RelayEngine::new(
        reader,
        deposit::TokensLockedDecoder::new(SOURCE_BRIDGE, SOURCE_TOKEN),
        CountingBuilder::new(),
        FlakyStore::fresh(),
        params,
        INITIAL_NONCE,
    );
    assert!(matches!(
        result,
        Err(RelayError::Config(config::ConfigError::ZeroBatchSize))
    ));
}
