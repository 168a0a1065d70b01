//! Integration tests for the executor engine
//!
//! These exercise the public API from several threads at once and check
//! that ordering, failure routing and shutdown hold under contention.

use anyhow::Result;
use shard_executor::{EngineConfig, ExecutorEngine};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};

#[test]
fn test_concurrent_executions_keep_their_own_order() {
    let engine = Arc::new(ExecutorEngine::new(2).unwrap());
    let barrier = Arc::new(Barrier::new(2));

    let first = {
        let engine = engine.clone();
        let barrier = barrier.clone();
        thread::spawn(move || {
            barrier.wait();
            engine.execute(vec!["a1", "a2", "a3"], |name: &'static str| -> Result<String> {
                thread::sleep(Duration::from_millis(5));
                Ok(name.to_uppercase())
            })
        })
    };
    let second = {
        let engine = engine.clone();
        let barrier = barrier.clone();
        thread::spawn(move || {
            barrier.wait();
            engine.execute(vec!["b1", "b2"], |name: &'static str| -> Result<String> {
                thread::sleep(Duration::from_millis(1));
                Ok(name.to_uppercase())
            })
        })
    };

    assert_eq!(first.join().unwrap().unwrap(), vec!["A1", "A2", "A3"]);
    assert_eq!(second.join().unwrap().unwrap(), vec!["B1", "B2"]);

    let engine = Arc::try_unwrap(engine).ok().unwrap();
    engine.close().unwrap();
}

#[test]
fn test_many_callers_share_one_pool() {
    let engine = Arc::new(ExecutorEngine::new(3).unwrap());

    let callers: Vec<_> = (0..8u64)
        .map(|caller| {
            let engine = engine.clone();
            thread::spawn(move || {
                let inputs: Vec<u64> = (0..20).map(|i| caller * 100 + i).collect();
                let outputs = engine
                    .execute(inputs.clone(), |x: u64| -> Result<u64> { Ok(x + 1) })
                    .unwrap();
                (inputs, outputs)
            })
        })
        .collect();

    for caller in callers {
        let (inputs, outputs) = caller.join().unwrap();
        let expected: Vec<u64> = inputs.iter().map(|x| x + 1).collect();
        assert_eq!(outputs, expected);
    }

    let engine = Arc::try_unwrap(engine).ok().unwrap();
    engine.close().unwrap();
}

#[test]
fn test_results_match_unit_for_any_worker_count() {
    for workers in [1, 2, 5, 16] {
        let engine = ExecutorEngine::new(workers).unwrap();
        let inputs: Vec<i64> = (-10..10).collect();

        let outputs = engine
            .execute(inputs.clone(), |x: i64| -> Result<i64> { Ok(x * x - 3) })
            .unwrap();

        let expected: Vec<i64> = inputs.iter().map(|x| x * x - 3).collect();
        assert_eq!(outputs, expected, "mismatch with {workers} workers");
        engine.close().unwrap();
    }
}

#[test]
fn test_failure_never_yields_partial_results() {
    let handled = Arc::new(AtomicUsize::new(0));
    let counter = handled.clone();
    let engine = ExecutorEngine::new(4)
        .unwrap()
        .with_failure_handler(move |_: &anyhow::Error| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

    for bad in [0usize, 5, 9] {
        let result = engine.execute(0..10usize, move |x: usize| -> Result<usize> {
            if x == bad {
                anyhow::bail!("row {} is corrupt", x);
            }
            Ok(x)
        });
        assert!(result.is_err(), "input {bad} should fail the execution");
    }

    assert_eq!(handled.load(Ordering::SeqCst), 3);
    engine.close().unwrap();
}

#[test]
fn test_merge_with_sum() {
    let engine = ExecutorEngine::new(2).unwrap();

    let total = engine
        .execute_and_merge(
            vec![2, 3, 4],
            |x: i32| -> Result<i32> { Ok(x) },
            |values: Vec<i32>| -> Result<i32> { Ok(values.iter().sum()) },
        )
        .unwrap();

    assert_eq!(total, 9);
    engine.close().unwrap();
}

#[test]
fn test_merge_failure_is_returned() {
    let engine = ExecutorEngine::new(2).unwrap();

    let result = engine.execute_and_merge(
        vec![1, 2],
        |x: i32| -> Result<i32> { Ok(x) },
        |_: Vec<i32>| -> Result<i32> { anyhow::bail!("cannot merge heterogeneous rows") },
    );

    let error = format!("{:#}", result.unwrap_err());
    assert!(error.contains("cannot merge heterogeneous rows"));
    engine.close().unwrap();
}

#[test]
fn test_engine_from_config_names_threads() {
    let config = EngineConfig {
        max_threads: 2,
        thread_name_prefix: "inventory-db".to_string(),
        ..EngineConfig::default()
    };
    let engine = ExecutorEngine::from_config(&config).unwrap();
    assert!(engine.workers() >= 1 && engine.workers() <= 2);

    let names = engine
        .execute(0..4, |_: i32| -> Result<String> {
            Ok(thread::current().name().unwrap_or_default().to_string())
        })
        .unwrap();

    assert_eq!(names[0], thread::current().name().unwrap_or_default());
    assert!(names[1..].iter().all(|name| name.starts_with("inventory-db-")));
    engine.close().unwrap();
}

#[test]
fn test_dropped_engine_drains_queued_work() {
    let completed = Arc::new(AtomicUsize::new(0));

    {
        let engine = ExecutorEngine::new(1)
            .unwrap()
            .with_failure_handler(|_: &anyhow::Error| {});
        let counter = completed.clone();

        // Inline failure returns at once while four pooled tasks are queued
        let result = engine.execute(0..5, move |x: i32| -> Result<i32> {
            if x == 0 {
                anyhow::bail!("first shard down");
            }
            thread::sleep(Duration::from_millis(5));
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(x)
        });
        assert!(result.is_err());
    }

    // Drop without close lets the queue drain before the workers exit
    assert_eq!(completed.load(Ordering::SeqCst), 4);
}

#[test]
fn test_dropped_engine_forces_shutdown_after_grace() {
    let config = EngineConfig {
        exit_grace_ms: 50,
        close_timeout_ms: 20,
        ..EngineConfig::default()
    };
    let engine = ExecutorEngine::with_workers(1, &config)
        .unwrap()
        .with_failure_handler(|_: &anyhow::Error| {});
    let queued_runs = Arc::new(AtomicUsize::new(0));
    let counter = queued_runs.clone();

    // One long pooled unit blocks the only worker; two short ones queue behind it
    let (started_tx, started_rx) = crossbeam::channel::bounded(1);
    let result = engine.execute(vec![0u64, 2000, 1, 1], move |millis: u64| -> Result<u64> {
        match millis {
            0 => {
                started_rx.recv_timeout(Duration::from_secs(5))?;
                anyhow::bail!("first shard down");
            }
            1 => {
                counter.fetch_add(1, Ordering::SeqCst);
            }
            _ => {
                started_tx.send(())?;
                thread::sleep(Duration::from_millis(millis));
            }
        }
        Ok(millis)
    });
    assert!(result.is_err());

    let started = Instant::now();
    drop(engine);
    let elapsed = started.elapsed();

    // Grace period plus close timeout, far short of the stuck unit
    assert!(elapsed < Duration::from_millis(1000), "drop took {elapsed:?}");
    assert_eq!(queued_runs.load(Ordering::SeqCst), 0);
}

#[test]
fn test_close_reports_stuck_worker() {
    let config = EngineConfig {
        close_timeout_ms: 25,
        ..EngineConfig::default()
    };
    let engine = ExecutorEngine::with_workers(1, &config)
        .unwrap()
        .with_failure_handler(|_: &anyhow::Error| {});

    // The calling thread fails only after the pooled task has started
    let (started_tx, started_rx) = crossbeam::channel::bounded(1);
    let result = engine.execute(vec![0u64, 500], move |millis: u64| -> Result<u64> {
        if millis == 0 {
            started_rx.recv_timeout(Duration::from_secs(5))?;
            anyhow::bail!("fail fast on the calling thread");
        }
        started_tx.send(())?;
        thread::sleep(Duration::from_millis(millis));
        Ok(millis)
    });
    assert!(result.is_err());

    let error = engine.close().unwrap_err();
    assert!(error.to_string().contains("could not be terminated"));
}
