//! Integration tests for SingleFlightLoader
//!
//! These tests verify that:
//! - Engine load calls are serialized, never overlapping
//! - The in-flight counter returns to its baseline on success and failure
//! - Archive selection results flow into the engine call and the recent list
//! - Patch auto-application follows the sidecar/explicit rule

mod common;

use camino::Utf8PathBuf;
use common::{FakeEngine, FixedSelector, Harness, LoadCall, temp_dir, write_file};
use emushell::metrics::Metrics;
use emushell::services::{
    LoadError, LoadOutcome, LoadRequest, PATCH_EXTENSIONS, PlainFileSelector, SingleFlightLoader,
    resolve_patch,
};
use proptest::prelude::*;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::sync::mpsc;
use std::time::Duration;

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .unwrap()
}

#[test]
fn test_concurrent_loads_never_overlap() {
    let runtime = runtime();
    let (_temp, dir) = temp_dir();
    let rom = write_file(&dir, "game.nes", b"NES\x1a");

    let engine = FakeEngine::new();
    engine.set_load_delay(Duration::from_millis(10));
    let loader = Arc::new(SingleFlightLoader::new(
        engine.clone(),
        Arc::new(PlainFileSelector),
        Arc::new(Metrics::new()),
        runtime.handle(),
    ));

    let (done_tx, done_rx) = mpsc::channel::<LoadOutcome>();
    let requests = 8;

    let callers: Vec<_> = (0..requests)
        .map(|_| {
            let loader = loader.clone();
            let rom = rom.clone();
            let done_tx = done_tx.clone();
            std::thread::spawn(move || {
                loader
                    .load(LoadRequest::new(rom), move |outcome| {
                        done_tx.send(outcome).unwrap();
                    })
                    .unwrap();
            })
        })
        .collect();
    for caller in callers {
        caller.join().unwrap();
    }

    for _ in 0..requests {
        let outcome = done_rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(outcome.result.is_ok());
    }

    assert_eq!(engine.loads().len(), requests);
    assert_eq!(engine.max_concurrent_loads(), 1);
}

#[test]
fn test_in_flight_counter_returns_to_baseline() {
    let runtime = runtime();
    let (_temp, dir) = temp_dir();
    let archive = write_file(&dir, "pack.zip", b"PK\x03\x04");

    let engine = FakeEngine::new();
    engine.set_load_delay(Duration::from_millis(20));
    let loader = SingleFlightLoader::new(
        engine.clone(),
        FixedSelector::new(Some(2), "Entry"),
        Arc::new(Metrics::new()),
        runtime.handle(),
    );
    let session = loader.session().clone();
    assert_eq!(session.in_flight(), 0);

    let (done_tx, done_rx) = mpsc::channel::<LoadOutcome>();

    // One success, then one engine-level failure
    for fail in [false, true] {
        engine.set_flags(|flags| flags.fail_loads = fail);
        let done_tx = done_tx.clone();
        loader
            .load(LoadRequest::new(&archive), move |outcome| {
                done_tx.send(outcome).unwrap();
            })
            .unwrap();
        assert!(session.is_loading());

        let outcome = done_rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(outcome.result.is_err(), fail);
        if fail {
            assert!(matches!(outcome.result, Err(LoadError::LoadFailed { .. })));
        }
        drop(outcome);

        assert_eq!(session.in_flight(), 0);
    }
}

#[test]
fn test_counter_released_when_continuation_panics() {
    let runtime = runtime();
    let (_temp, dir) = temp_dir();
    let archive = write_file(&dir, "pack.zip", b"PK\x03\x04");

    let engine = FakeEngine::new();
    let metrics = Arc::new(Metrics::new());
    let loader = SingleFlightLoader::new(
        engine.clone(),
        FixedSelector::new(Some(0), "Entry"),
        metrics.clone(),
        runtime.handle(),
    );

    loader
        .load(LoadRequest::new(&archive), |_| panic!("continuation bug"))
        .unwrap();

    assert!(common::wait_until(Duration::from_secs(5), || {
        loader.session().in_flight() == 0 && metrics.loads_completed.load(Ordering::Relaxed) == 1
    }));

    // The worker survives and keeps serving requests
    let (done_tx, done_rx) = mpsc::channel();
    loader
        .load(LoadRequest::new(&archive), move |outcome| {
            done_tx.send(outcome.result).unwrap();
        })
        .unwrap();
    assert_eq!(done_rx.recv_timeout(Duration::from_secs(5)).unwrap(), Ok(()));
}

#[test]
fn test_missing_path_queues_nothing() {
    let runtime = runtime();
    let engine = FakeEngine::new();
    let loader = SingleFlightLoader::new(
        engine.clone(),
        Arc::new(PlainFileSelector),
        Arc::new(Metrics::new()),
        runtime.handle(),
    );

    let missing = Utf8PathBuf::from("/definitely/not/here.nes");
    let result = loader.load(LoadRequest::new(&missing), |_| {});

    assert_eq!(result, Err(LoadError::PathNotFound(missing)));
    std::thread::sleep(Duration::from_millis(20));
    assert!(engine.loads().is_empty());
}

#[test]
fn test_cancelled_selection_queues_nothing() {
    let runtime = runtime();
    let (_temp, dir) = temp_dir();
    let archive = write_file(&dir, "pack.zip", b"PK\x03\x04");

    let engine = FakeEngine::new();
    let loader = SingleFlightLoader::new(
        engine.clone(),
        FixedSelector::new(None, "unused"),
        Arc::new(Metrics::new()),
        runtime.handle(),
    );

    let result = loader.load(LoadRequest::new(&archive), |_| {});

    assert_eq!(result, Err(LoadError::UserCancelled));
    assert_eq!(loader.session().in_flight(), 0);
    assert!(engine.loads().is_empty());
}

#[test]
fn test_archive_load_updates_recent_list() {
    let selector = FixedSelector::new(Some(1), "Game B (USA)");
    let mut harness = Harness::new(selector.clone());
    let archive = write_file(&harness.dir, "game.zip", b"PK\x03\x04");

    harness.shell.load(LoadRequest::new(&archive)).unwrap();
    assert!(harness.pump_until(|shell| !shell.config().recent_files.is_empty()));

    assert_eq!(selector.calls.load(Ordering::SeqCst), 1);
    assert_eq!(
        harness.engine.loads(),
        vec![LoadCall {
            path: archive.clone(),
            archive_index: Some(1),
            patch: None,
        }]
    );

    let recent = &harness.shell.config().recent_files;
    assert_eq!(recent.len(), 1);
    let entry = recent.first().unwrap();
    assert_eq!(entry.path, archive);
    assert_eq!(entry.display_name, "Game B (USA)");
    assert_eq!(entry.archive_index, Some(1));
    assert_eq!(harness.shell.loader().session().in_flight(), 0);
}

#[test]
fn test_failed_load_is_reported_and_still_recorded() {
    let mut harness = Harness::new(Arc::new(PlainFileSelector));
    let rom = write_file(&harness.dir, "broken.nes", b"garbage");
    harness.engine.set_flags(|flags| flags.fail_loads = true);

    harness.shell.load(LoadRequest::new(&rom)).unwrap();
    assert!(harness.pump_until(|shell| !shell.config().recent_files.is_empty()));

    let shown = harness.prompter.shown();
    assert!(
        shown
            .iter()
            .any(|prompt| matches!(prompt, emushell::ui::Prompt::LoadFailed { .. })),
        "expected a load failure report, got {:?}",
        shown
    );
    assert!(!harness.shell.presentation().state().is_active());
}

#[test]
fn test_sidecar_patch_passed_to_engine() {
    let mut harness = Harness::new(Arc::new(PlainFileSelector));
    let rom = write_file(&harness.dir, "game.nes", b"NES\x1a");
    let patch = write_file(&harness.dir, "game.bps", b"BPS1");

    harness
        .shell
        .load(LoadRequest::new(&rom).with_auto_apply_patch(true))
        .unwrap();
    assert!(common::wait_until(Duration::from_secs(5), || {
        harness.engine.loads().len() == 1
    }));

    assert_eq!(harness.engine.loads()[0].patch, Some(patch));
}

#[test]
fn test_continuations_run_in_submission_order() {
    let mut harness = Harness::new(Arc::new(PlainFileSelector));
    let first = write_file(&harness.dir, "a.nes", b"NES\x1a");
    let second = write_file(&harness.dir, "b.nes", b"NES\x1a");
    harness.engine.set_load_delay(Duration::from_millis(30));

    harness.shell.load(LoadRequest::new(&first)).unwrap();
    harness.shell.load(LoadRequest::new(&second)).unwrap();
    assert!(harness.pump_until(|shell| shell.config().recent_files.len() == 2));

    let loaded: Vec<_> = harness
        .engine
        .loads()
        .into_iter()
        .map(|call| call.path)
        .collect();
    assert_eq!(loaded, vec![first.clone(), second.clone()]);

    // The most recent entry comes first
    let recent = &harness.shell.config().recent_files;
    assert_eq!(recent.first().unwrap().path, second);
    assert_eq!(recent.get(1).unwrap().path, first);
    assert_eq!(harness.shell.loader().session().in_flight(), 0);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn patch_applied_only_when_a_patch_file_exists(
        sidecars in proptest::collection::vec(any::<bool>(), PATCH_EXTENSIONS.len()),
        explicit in prop_oneof![Just(None), Just(Some(false)), Just(Some(true))],
        auto_apply in any::<bool>(),
    ) {
        let (_temp, dir) = temp_dir();
        let rom = write_file(&dir, "game.nes", b"NES\x1a");
        for (ext, present) in PATCH_EXTENSIONS.iter().zip(&sidecars) {
            if *present {
                write_file(&dir, &format!("game.{ext}"), b"PATCH");
            }
        }

        let mut req = LoadRequest::new(&rom).with_auto_apply_patch(auto_apply);
        if let Some(exists) = explicit {
            let chosen = dir.join("chosen.ips");
            if exists {
                write_file(&dir, "chosen.ips", b"PATCH");
            }
            req.patch_path = Some(chosen);
        }

        let expected = match explicit {
            Some(exists) => auto_apply && exists,
            None => auto_apply && sidecars.iter().any(|present| *present),
        };

        let resolved = resolve_patch(&req);
        prop_assert_eq!(resolved.is_some(), expected);

        if explicit.is_none() {
            if let Some(patch) = resolved {
                let first = PATCH_EXTENSIONS
                    .iter()
                    .zip(&sidecars)
                    .find(|(_, present)| **present)
                    .map(|(ext, _)| dir.join(format!("game.{ext}")));
                prop_assert_eq!(Some(patch), first);
            }
        }
    }
}
