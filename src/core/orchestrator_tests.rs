//! Tests for phase ordering, escalation, daemon supervision and require.

use super::*;
use crate::config::EventBusConfig;
use crate::core::context::RunContext;
use crate::core::daemon::DaemonState;
use crate::core::report::UnitStatus;
use crate::error::{RequireError, UnitError};
use crate::events::EventKey;
use crate::policies::{BackoffPolicy, JitterPolicy};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU32, Ordering as AtomicOrdering};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

type Log = Arc<Mutex<Vec<String>>>;

fn log() -> Log {
    Arc::new(Mutex::new(Vec::new()))
}

fn pos(log: &Log, entry: &str) -> usize {
    log.lock()
        .iter()
        .position(|e| e == entry)
        .unwrap_or_else(|| panic!("missing log entry {entry}"))
}

fn has(log: &Log, entry: &str) -> bool {
    log.lock().iter().any(|e| e == entry)
}

/// Unit that logs `name:start`, sleeps `delay_ms`, logs `name:end`.
fn timed(name: &'static str, phase: Phase, delay_ms: u64, log: &Log) -> Unit {
    let log = Arc::clone(log);
    Unit::new(name, phase, move |_ctx: RunContext| {
        let log = Arc::clone(&log);
        async move {
            log.lock().push(format!("{name}:start"));
            sleep(Duration::from_millis(delay_ms)).await;
            log.lock().push(format!("{name}:end"));
            Ok(())
        }
    })
}

/// Unit that fails after `delay_ms`.
fn failing(name: &'static str, phase: Phase, delay_ms: u64) -> Unit {
    Unit::new(name, phase, move |_ctx: RunContext| async move {
        sleep(Duration::from_millis(delay_ms)).await;
        Err(UnitError::fail("boom"))
    })
}

/// Daemon that fails `failures` times before succeeding.
fn flaky_daemon(name: &'static str, failures: u32, calls: &Arc<AtomicU32>) -> Unit {
    let calls = Arc::clone(calls);
    Unit::new(name, Phase::Daemon, move |_ctx: RunContext| {
        let calls = Arc::clone(&calls);
        async move {
            if calls.fetch_add(1, AtomicOrdering::SeqCst) < failures {
                Err(UnitError::fail("not ready"))
            } else {
                Ok(())
            }
        }
    })
}

fn capture(boot: &mut Boot) -> Log {
    let lines = log();
    let sink = Arc::clone(&lines);
    boot.set_sink(move |line: &str| sink.lock().push(line.to_string()));
    lines
}

#[tokio::test(start_paused = true)]
async fn phases_run_in_order() {
    let log = log();
    let mut boot = Boot::new();
    boot.register([
        timed("n1", Phase::Normal, 30, &log),
        timed("f1", Phase::Front, 10, &log),
        timed("a1", Phase::After, 5, &log),
        timed("f2", Phase::Front, 10, &log),
        timed("n2", Phase::Normal, 20, &log),
        timed("bg", Phase::Background, 500, &log),
    ])
    .unwrap();

    let report = boot.start().await.unwrap();

    assert!(pos(&log, "f1:end") < pos(&log, "f2:start"));
    for normal in ["n1:start", "n2:start"] {
        assert!(pos(&log, "f2:end") < pos(&log, normal));
    }
    for normal in ["n1:end", "n2:end"] {
        assert!(pos(&log, normal) < pos(&log, "a1:start"));
    }
    // background is joined before start() returns
    assert!(has(&log, "bg:end"));
    assert_eq!(report.units.len(), 6);
    assert!(report.elapsed >= Duration::from_millis(500));
}

#[tokio::test(start_paused = true)]
async fn normal_units_run_concurrently() {
    let log = log();
    let mut boot = Boot::new();
    boot.register([
        timed("n1", Phase::Normal, 100, &log),
        timed("n2", Phase::Normal, 100, &log),
        timed("n3", Phase::Normal, 100, &log),
    ])
    .unwrap();

    let report = boot.start().await.unwrap();
    assert_eq!(report.elapsed, Duration::from_millis(100));
}

#[tokio::test(start_paused = true)]
async fn non_recoverable_normal_failure_escalates() {
    let log = log();
    let mut boot = Boot::new();
    boot.register([
        failing("db", Phase::Normal, 10).recoverable(false),
        timed("slow", Phase::Normal, 1_000, &log),
        timed("after", Phase::After, 0, &log),
    ])
    .unwrap();

    let err = boot.start().await.unwrap_err();
    assert!(matches!(
        &err,
        BootError::UnitFailed { name, phase: Phase::Normal, .. } if name == "db"
    ));
    assert!(err.is_fatal());
    assert!(!has(&log, "after:start"));
    assert!(!has(&log, "slow:end"));
}

#[tokio::test(start_paused = true)]
async fn front_failure_stops_before_later_phases() {
    let log = log();
    let mut boot = Boot::new();
    boot.register([
        failing("config", Phase::Front, 0).recoverable(false),
        timed("db", Phase::Normal, 0, &log),
    ])
    .unwrap();

    let err = boot.start().await.unwrap_err();
    assert_eq!(err.unit(), Some("config"));
    assert!(log.lock().is_empty());
}

#[tokio::test(start_paused = true)]
async fn background_escalation_aborts_start() {
    let log = log();
    let mut boot = Boot::new();
    boot.register([
        failing("bg", Phase::Background, 10).recoverable(false),
        timed("slow", Phase::Normal, 1_000, &log),
        timed("after", Phase::After, 0, &log),
    ])
    .unwrap();

    let started = Instant::now();
    let err = boot.start().await.unwrap_err();
    assert_eq!(err.unit(), Some("bg"));
    assert_eq!(started.elapsed(), Duration::from_millis(10));
    assert!(!has(&log, "after:start"));
}

#[tokio::test(start_paused = true)]
async fn after_failure_escalates() {
    let log = log();
    let mut boot = Boot::new();
    boot.register([
        timed("db", Phase::Normal, 10, &log),
        failing("warmup", Phase::After, 5).recoverable(false),
        timed("announce", Phase::After, 0, &log),
    ])
    .unwrap();

    let err = boot.start().await.unwrap_err();
    assert!(matches!(
        &err,
        BootError::UnitFailed { name, phase: Phase::After, .. } if name == "warmup"
    ));
    assert_eq!(err.as_label(), "boot_unit_failed");
    assert!(err.is_fatal());
    assert!(has(&log, "db:end"));
    assert!(!has(&log, "announce:start"));
}

#[tokio::test(start_paused = true)]
async fn recoverable_failure_is_reported_not_escalated() {
    let mut boot = Boot::new();
    boot.register([failing("metrics", Phase::Normal, 0)]).unwrap();

    let report = boot.start().await.unwrap();
    assert_eq!(report.recovered().count(), 1);
    assert!(matches!(
        &report.unit("metrics").unwrap().status,
        UnitStatus::Recovered { error } if error.contains("boom")
    ));
}

#[tokio::test(start_paused = true)]
async fn daemon_failure_restarts_instead_of_escalating() {
    let calls = Arc::new(AtomicU32::new(0));
    let mut boot = Boot::new();
    boot.register([flaky_daemon("worker", 1, &calls)]).unwrap();
    assert_eq!(
        boot.daemon_status("worker").map(|s| s.state),
        Some(DaemonState::Idle)
    );

    let report = boot.start().await.unwrap();

    let status = boot.daemon_status("worker").unwrap();
    assert_eq!(status.state, DaemonState::Stopped);
    assert_eq!(status.restarts, 1);
    assert_eq!(status.last_failure.as_deref(), Some("execution failed: not ready"));
    assert_eq!(report.unit("worker").unwrap().restarts, 1);
    assert_eq!(calls.load(AtomicOrdering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn daemon_timeout_restarts() {
    let calls = Arc::new(AtomicU32::new(0));
    let hanging = {
        let calls = Arc::clone(&calls);
        Unit::new("poller", Phase::Daemon, move |_ctx: RunContext| {
            let first = calls.fetch_add(1, AtomicOrdering::SeqCst) == 0;
            async move {
                if first {
                    sleep(Duration::from_secs(10)).await;
                }
                Ok(())
            }
        })
        .timeout(Duration::from_millis(50))
        .recoverable(false)
    };

    let mut boot = Boot::new();
    boot.register([hanging]).unwrap();
    let report = boot.start().await.unwrap();

    let status = boot.daemon_status("poller").unwrap();
    assert_eq!(status.state, DaemonState::Stopped);
    assert_eq!(status.restarts, 1);
    assert_eq!(status.last_failure.as_deref(), Some("timed out after 50ms"));
    assert_eq!(calls.load(AtomicOrdering::SeqCst), 2);
    // 50ms timeout + 1s default restart pause
    assert!(report.elapsed >= Duration::from_millis(1_050));
    assert!(report.elapsed < Duration::from_secs(2));
}

#[tokio::test(start_paused = true)]
async fn daemon_restart_pause_is_jittered() {
    let calls = Arc::new(AtomicU32::new(0));
    let mut boot = Boot::with_config(BootConfig {
        daemon_backoff: BackoffPolicy {
            jitter: JitterPolicy::Full,
            ..BackoffPolicy::fixed(Duration::from_secs(1))
        },
        ..BootConfig::default()
    });
    boot.register([flaky_daemon("worker", 3, &calls)]).unwrap();

    let report = boot.start().await.unwrap();
    assert_eq!(boot.daemon_status("worker").unwrap().restarts, 3);
    assert!(report.elapsed <= Duration::from_secs(3));
}

#[tokio::test(start_paused = true)]
async fn daemon_signal_fires_every_iteration() {
    let calls = Arc::new(AtomicU32::new(0));
    let mut boot = Boot::new();
    boot.register([flaky_daemon("worker", 2, &calls)]).unwrap();
    // an After unit waiting on the daemon is released by the first iteration
    boot.register([Unit::new("after", Phase::After, |ctx: RunContext| async move {
        ctx.require(ctx.scope(), "worker").await?;
        Ok(())
    })])
    .unwrap();

    boot.start().await.unwrap();
    assert_eq!(boot.signal_fires("worker"), Some(3));
    assert_eq!(boot.signal_fires("after"), Some(1));
    assert_eq!(boot.signal_fires("nobody"), None);
}

#[tokio::test(start_paused = true)]
async fn require_waits_for_dependency() {
    let log = log();
    let waiter = {
        let log = Arc::clone(&log);
        Unit::new("cache", Phase::Normal, move |ctx: RunContext| {
            let log = Arc::clone(&log);
            async move {
                ctx.require(ctx.scope(), "db").await?;
                log.lock().push("cache:end".into());
                Ok(())
            }
        })
    };

    let mut boot = Boot::new();
    boot.register([waiter.recoverable(false), timed("db", Phase::Normal, 40, &log)])
        .unwrap();
    boot.start().await.unwrap();

    assert!(pos(&log, "db:end") < pos(&log, "cache:end"));
}

#[tokio::test(start_paused = true)]
async fn require_returns_scope_error_when_scope_ends_first() {
    let result = Arc::new(Mutex::new(None));
    let waiter = {
        let result = Arc::clone(&result);
        Unit::new("waiter", Phase::Normal, move |ctx: RunContext| {
            let result = Arc::clone(&result);
            async move {
                let scope = CancellationToken::new();
                let canceller = scope.clone();
                tokio::spawn(async move {
                    sleep(Duration::from_millis(10)).await;
                    canceller.cancel();
                });
                *result.lock() = Some(ctx.require(&scope, "db").await);
                Ok(())
            }
        })
    };

    let log = log();
    let mut boot = Boot::new();
    boot.register([waiter, timed("db", Phase::Normal, 100, &log)]).unwrap();
    boot.start().await.unwrap();

    assert_eq!(
        result.lock().clone(),
        Some(Err(RequireError::Canceled { name: "db".into() }))
    );
}

#[tokio::test(start_paused = true)]
async fn require_unknown_unit_fails_immediately() {
    let mut boot = Boot::new();
    boot.register([Unit::new("lonely", Phase::Front, |ctx: RunContext| async move {
        ctx.require(ctx.scope(), "nonexistent").await?;
        Ok(())
    })
    .recoverable(false)])
    .unwrap();

    let started = Instant::now();
    let err = boot.start().await.unwrap_err();
    assert_eq!(started.elapsed(), Duration::ZERO);
    assert!(matches!(
        err,
        BootError::UnitFailed {
            source: UnitError::Require(RequireError::NotFound { .. }),
            ..
        }
    ));
}

#[tokio::test(start_paused = true)]
async fn require_suspends_the_timeout() {
    let log = log();
    let waiter = Unit::new("api", Phase::Normal, |ctx: RunContext| async move {
        ctx.require(ctx.scope(), "db").await?;
        Ok(())
    })
    .timeout(Duration::from_millis(50))
    .recoverable(false);

    let mut boot = Boot::new();
    boot.register([waiter, timed("db", Phase::Normal, 150, &log)])
        .unwrap();

    let report = boot.start().await.unwrap();
    let api = report.unit("api").unwrap();
    assert_eq!(api.status, UnitStatus::Succeeded);
    assert!(!api.timed_out);
}

#[tokio::test(start_paused = true)]
async fn non_recoverable_timeout_escalates() {
    let log = log();
    let mut boot = Boot::new();
    boot.register([timed("slow", Phase::Front, 1_000, &log)
        .timeout(Duration::from_millis(50))
        .recoverable(false)])
        .unwrap();

    let err = boot.start().await.unwrap_err();
    assert!(matches!(
        err,
        BootError::UnitTimeout { ref name, timeout, .. }
            if name == "slow" && timeout == Duration::from_millis(50)
    ));
}

#[tokio::test(start_paused = true)]
async fn watchdog_fails_slow_boot() {
    let log = log();
    let mut boot = Boot::new();
    boot.boot_timeout(Duration::from_millis(100));
    boot.register([timed("stuck", Phase::Normal, 10_000, &log)])
        .unwrap();

    let started = Instant::now();
    let err = boot.start().await.unwrap_err();
    assert!(matches!(
        err,
        BootError::BootTimeout { timeout } if timeout == Duration::from_millis(100)
    ));
    assert_eq!(started.elapsed(), Duration::from_millis(100));
    assert!(!has(&log, "stuck:end"));
}

#[tokio::test(start_paused = true)]
async fn zero_boot_timeout_disables_watchdog() {
    let log = log();
    let mut boot = Boot::new();
    boot.boot_timeout(Duration::ZERO);
    boot.register([timed("long", Phase::Normal, 120_000, &log)])
        .unwrap();

    assert!(boot.start().await.is_ok());
}

#[tokio::test]
async fn duplicate_names_are_rejected() {
    let log = log();
    let mut boot = Boot::new();
    let lines = capture(&mut boot);

    let err = boot
        .register([
            timed("db", Phase::Normal, 0, &log),
            timed("db", Phase::After, 0, &log),
        ])
        .unwrap_err();

    assert!(matches!(err, BootError::DuplicateUnit { ref name } if name == "db"));
    assert!(lines.lock().iter().any(|l| l.contains("register unit name repeat: db")));
    assert_eq!(boot.len(), 1);
}

#[tokio::test]
async fn repeated_names_share_a_signal() {
    let log = log();
    let mut boot = Boot::new();
    boot.allow_name_repeat();
    boot.register([
        timed("migrate", Phase::Front, 0, &log),
        timed("migrate", Phase::Normal, 0, &log),
    ])
    .unwrap();

    boot.start().await.unwrap();
    assert_eq!(boot.signal_fires("migrate"), Some(2));
}

#[tokio::test]
async fn start_runs_once() {
    let mut boot = Boot::new();
    boot.register([Unit::new("noop", Phase::Normal, |_ctx: RunContext| async { Ok(()) })])
        .unwrap();

    assert!(!boot.is_started());
    boot.start().await.unwrap();
    assert!(boot.is_started());

    let err = boot.start().await.unwrap_err();
    assert!(matches!(err, BootError::AlreadyStarted));
    assert!(!err.is_fatal());

    let err = boot
        .register([Unit::new("late", Phase::Normal, |_ctx: RunContext| async { Ok(()) })])
        .unwrap_err();
    assert!(matches!(err, BootError::AlreadyStarted));
    assert_eq!(
        format!("{boot:?}"),
        "Boot { units: 1, started: true, boot_timeout: 60s }"
    );
}

#[tokio::test]
async fn lines_go_through_the_sink() {
    let mut boot = Boot::with_config(BootConfig {
        banner: true,
        ..BootConfig::default()
    });
    let lines = capture(&mut boot);
    boot.register([Unit::new("db", Phase::Normal, |ctx: RunContext| async move {
        ctx.printf(format_args!("listening on {}", 5432));
        Ok(())
    })])
    .unwrap();

    boot.start().await.unwrap();

    let lines = lines.lock();
    assert!(lines.iter().any(|l| l.contains("|_.__/")));
    assert!(lines.iter().any(|l| l.contains("[BOOT]") && l.contains("boot start")));
    assert!(lines.iter().any(|l| l.contains("[NORMAL:db]") && l.contains("listening on 5432")));
    assert!(lines.iter().any(|l| l.contains("unit success")));
}

#[tokio::test]
async fn units_share_store_and_events() {
    let bus = EventBus::new(EventBusConfig::default());
    let seen = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&seen);
    bus.subscribe::<u32, _>(&EventKey::new("ready"), move |n| {
        counter.fetch_add(*n, AtomicOrdering::SeqCst);
        Ok(())
    })
    .unwrap();

    let mut boot = Boot::builder(BootConfig::default())
        .with_events(Arc::clone(&bus))
        .build();
    boot.register([
        Unit::new("config", Phase::Front, |ctx: RunContext| async move {
            ctx.store().set("dsn", String::from("postgres://localhost"));
            Ok(())
        }),
        Unit::new("db", Phase::Normal, |ctx: RunContext| async move {
            let dsn: String = ctx.store().load_wait(ctx.scope(), "dsn").await?;
            ctx.print(&dsn);
            if let Some(events) = ctx.events() {
                events.publish(&EventKey::new("ready"), 7u32).map_err(UnitError::fail)?;
            }
            Ok(())
        })
        .recoverable(false),
    ])
    .unwrap();

    boot.start().await.unwrap();
    assert_eq!(seen.load(AtomicOrdering::SeqCst), 7);
    assert_eq!(
        boot.store().get::<String>("dsn").as_deref(),
        Some("postgres://localhost")
    );
    bus.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn end_to_end_startup() {
    let log = log();
    let calls = Arc::new(AtomicU32::new(0));

    let init_config = {
        let log = Arc::clone(&log);
        Unit::new("init-config", Phase::Front, move |ctx: RunContext| {
            let log = Arc::clone(&log);
            async move {
                ctx.store().set("env", "test");
                log.lock().push("init-config:end".into());
                Ok(())
            }
        })
        .recoverable(false)
    };
    let cache = {
        let log = Arc::clone(&log);
        Unit::new("cache", Phase::Normal, move |ctx: RunContext| {
            let log = Arc::clone(&log);
            async move {
                log.lock().push("cache:start".into());
                ctx.require(ctx.scope(), "db").await?;
                log.lock().push("cache:end".into());
                Ok(())
            }
        })
        .recoverable(false)
    };
    let ready_log = {
        let log = Arc::clone(&log);
        Unit::new("ready-log", Phase::After, move |ctx: RunContext| {
            let log = Arc::clone(&log);
            async move {
                ctx.print("application ready");
                log.lock().push("ready-log:end".into());
                Ok(())
            }
        })
    };

    let mut boot = Boot::new();
    boot.register([
        init_config,
        timed("db", Phase::Normal, 10, &log).recoverable(false),
        cache,
        flaky_daemon("worker", 1, &calls),
        ready_log,
    ])
    .unwrap();

    let report = boot.start().await.unwrap();

    assert!(pos(&log, "init-config:end") < pos(&log, "db:start"));
    assert!(pos(&log, "db:end") < pos(&log, "cache:end"));
    assert!(pos(&log, "cache:end") < pos(&log, "ready-log:end"));
    assert!(pos(&log, "db:end") < pos(&log, "ready-log:end"));

    let worker = boot.daemon_status("worker").unwrap();
    assert_eq!(worker.restarts, 1);
    assert_eq!(worker.state, DaemonState::Stopped);
    assert_eq!(report.unit("worker").unwrap().restarts, 1);
    assert_eq!(report.units.len(), 5);
    assert_eq!(report.recovered().count(), 0);
}
