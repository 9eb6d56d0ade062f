//! End-to-end properties of the scan orchestration engine, driven against
//! in-memory persistence with scripted tool plugins.

mod support;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;

use support::{Behavior, FailingFindingStore, ScriptedPlugin, TestContext};
use vantage_core::dispatcher::CreateScanRequest;
use vantage_core::error::EngineError;
use vantage_core::store::{FindingStore, ScanStore};
use vantage_core::tools::ToolPlugin;
use vantage_model::{FindingDraft, ScanStatus, Severity};

fn as_plugins(plugins: &[Arc<ScriptedPlugin>]) -> Vec<Arc<dyn ToolPlugin>> {
    plugins
        .iter()
        .map(|plugin| plugin.clone() as Arc<dyn ToolPlugin>)
        .collect()
}

#[tokio::test]
async fn happy_path_visits_the_canonical_status_sequence() {
    let plugin_a = ScriptedPlugin::yielding("pluginA", 3);
    let plugin_b = ScriptedPlugin::yielding("pluginB", 0);
    let ctx = TestContext::new(as_plugins(&[plugin_a.clone(), plugin_b.clone()]));

    let scan = ctx.seed_scan(&["pluginA", "pluginB"]).await;
    let mut logs = ctx.broker.subscribe(scan.id);

    let dispatcher = ctx.dispatcher(2);
    let accepted = dispatcher.start(scan.id).await.unwrap();
    assert_eq!(accepted.status, ScanStatus::Queued);

    let finished = ctx.wait_for_status(scan.id, ScanStatus::Completed).await;
    assert!(finished.finished_at.is_some());

    // Monotonic prefix of pending -> queued -> running -> completed.
    assert_eq!(
        ctx.recorder.path_for(scan.id),
        vec![ScanStatus::Queued, ScanStatus::Running, ScanStatus::Completed]
    );

    // Exactly pluginA's findings persisted, in tool order.
    let findings = ctx.memory.findings_for_scan(scan.id).await.unwrap();
    assert_eq!(findings.len(), 3);
    assert!(findings.iter().all(|finding| finding.tool == "pluginA"));

    // Log stream: one starting line per tool, three per-line entries, and
    // one completion summary.
    let mut lines = Vec::new();
    loop {
        match tokio::time::timeout(Duration::from_secs(2), logs.recv()).await {
            Ok(Ok(frame)) => {
                let done = frame.line.starts_with("== scan finished");
                lines.push(frame.line);
                if done {
                    break;
                }
            }
            Ok(Err(_)) => break,
            Err(_) => panic!("log stream never delivered the completion summary"),
        }
    }
    assert_eq!(
        lines
            .iter()
            .filter(|line| line.starts_with("== running"))
            .count(),
        2
    );
    assert_eq!(
        lines
            .iter()
            .filter(|line| line.ends_with(".example.com"))
            .count(),
        3
    );
    assert_eq!(lines.last().unwrap(), "== scan finished, 3 findings ==");
    assert_eq!(plugin_a.run_count(), 1);
    assert_eq!(plugin_b.run_count(), 1);
}

#[tokio::test]
async fn stop_before_running_lands_in_stopped_with_zero_findings() {
    let plugin = ScriptedPlugin::yielding("pluginA", 3);
    let ctx = TestContext::new(as_plugins(&[plugin.clone()]));
    let scan = ctx.seed_scan(&["pluginA"]).await;

    // Marker set while the scan is still pending; no abort handle exists.
    ctx.cancel.request_stop(scan.id);
    ctx.executor().execute(scan.clone(), None).await;

    let stored = ctx.stores.scans.get_scan(scan.id).await.unwrap().unwrap();
    assert_eq!(stored.status, ScanStatus::Stopped);
    assert!(stored.finished_at.is_some());
    assert!(ctx.memory.findings_for_scan(scan.id).await.unwrap().is_empty());
    assert_eq!(plugin.run_count(), 0);

    // Bookkeeping cleared on exit: a later stop against the finished scan
    // leaves no marker behind.
    assert!(!ctx.cancel.is_stop_requested(scan.id));
}

#[tokio::test]
async fn cooperative_stop_keeps_only_findings_produced_before_the_check() {
    let gate = Arc::new(Notify::new());
    let streaming = ScriptedPlugin::new(
        "streamer",
        Behavior::GateThenCheck {
            first: vec![FindingDraft::new(
                "subdomain",
                "early.example.com",
                Severity::Info,
            )],
            rest: vec![
                FindingDraft::new("subdomain", "late-1.example.com", Severity::Info),
                FindingDraft::new("subdomain", "late-2.example.com", Severity::Info),
            ],
            gate: gate.clone(),
        },
    );
    let follower = ScriptedPlugin::yielding("follower", 2);
    let ctx = TestContext::new(as_plugins(&[streaming.clone(), follower.clone()]));

    let scan = ctx.seed_scan(&["streamer", "follower"]).await;
    let mut logs = ctx.broker.subscribe(scan.id);

    let executor = ctx.executor();
    let worker = {
        let scan = scan.clone();
        tokio::spawn(async move { executor.execute(scan, None).await })
    };

    // Wait until the tool has produced its first finding, then stop.
    let first = logs.recv().await.unwrap();
    assert_eq!(first.line, "== running streamer ==");
    let line = logs.recv().await.unwrap();
    assert_eq!(line.line, "early.example.com");
    ctx.cancel.request_stop(scan.id);
    gate.notify_one();
    worker.await.unwrap();

    let stored = ctx.stores.scans.get_scan(scan.id).await.unwrap().unwrap();
    assert_eq!(stored.status, ScanStatus::Stopped);

    // The interrupted tool's partial output is kept; the follower never ran.
    let findings = ctx.memory.findings_for_scan(scan.id).await.unwrap();
    assert_eq!(findings.len(), 1);
    assert_eq!(findings[0].value, "early.example.com");
    assert_eq!(follower.run_count(), 0);
}

#[tokio::test]
async fn unknown_tool_identifiers_are_silently_skipped() {
    let plugin = ScriptedPlugin::yielding("pluginA", 1);
    let ctx = TestContext::new(as_plugins(&[plugin.clone()]));
    let scan = ctx.seed_scan(&["ghost-tool", "pluginA"]).await;

    ctx.executor().execute(scan.clone(), None).await;

    let stored = ctx.stores.scans.get_scan(scan.id).await.unwrap().unwrap();
    assert_eq!(stored.status, ScanStatus::Completed);
    assert_eq!(ctx.memory.findings_for_scan(scan.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn batch_timeout_becomes_a_tool_fault_and_the_scan_continues() {
    let slow = ScriptedPlugin::new(
        "slow-batch",
        Behavior::SleepBeyond {
            limit: Duration::from_millis(20),
            work: Duration::from_millis(200),
        },
    );
    let follower = ScriptedPlugin::yielding("follower", 2);
    let ctx = TestContext::new(as_plugins(&[slow.clone(), follower.clone()]));
    let scan = ctx.seed_scan(&["slow-batch", "follower"]).await;

    ctx.executor().execute(scan.clone(), None).await;

    let stored = ctx.stores.scans.get_scan(scan.id).await.unwrap().unwrap();
    assert_eq!(stored.status, ScanStatus::Completed);

    let findings = ctx.memory.findings_for_scan(scan.id).await.unwrap();
    let faults: Vec<_> = findings
        .iter()
        .filter(|finding| finding.severity == Severity::Error)
        .collect();
    assert_eq!(faults.len(), 1);
    assert_eq!(faults[0].tool, "slow-batch");
    assert_eq!(faults[0].category, "error");
    assert_eq!(findings.len(), 3);
    assert_eq!(follower.run_count(), 1);
}

#[tokio::test]
async fn orchestration_fault_moves_the_scan_to_error_and_skips_the_rest() {
    let first = ScriptedPlugin::yielding("pluginA", 1);
    let second = ScriptedPlugin::yielding("pluginB", 1);
    let ctx = TestContext::new(as_plugins(&[first.clone(), second.clone()]));

    // Swap in a findings store that fails on the first batch persist.
    let mut stores = ctx.stores.clone();
    stores.findings = Arc::new(FailingFindingStore);
    let executor = vantage_core::executor::ScanExecutor::new(
        stores,
        ctx.registry.clone(),
        ctx.broker.clone(),
        ctx.cancel.clone(),
    );

    let scan = ctx.seed_scan(&["pluginA", "pluginB"]).await;
    let mut logs = ctx.broker.subscribe(scan.id);
    executor.execute(scan.clone(), None).await;

    let stored = ctx.stores.scans.get_scan(scan.id).await.unwrap().unwrap();
    assert_eq!(stored.status, ScanStatus::Error);
    assert_eq!(second.run_count(), 0);

    // The fault is announced on the log stream.
    let mut saw_error = false;
    while let Ok(frame) = logs.try_recv() {
        saw_error |= frame.line.starts_with("ERROR:");
    }
    assert!(saw_error);
}

#[tokio::test]
async fn starting_an_active_scan_is_a_conflict() {
    let gate = Arc::new(Notify::new());
    let blocking = ScriptedPlugin::new(
        "blocker",
        Behavior::GateThenCheck {
            first: vec![],
            rest: vec![],
            gate: gate.clone(),
        },
    );
    let ctx = TestContext::new(as_plugins(&[blocking.clone()]));
    let dispatcher = ctx.dispatcher(2);

    let scan = dispatcher
        .create_scan(CreateScanRequest {
            target: "example.com".into(),
            tools: vec!["blocker".into()],
            project_id: None,
        })
        .await
        .unwrap();

    ctx.wait_for_status(scan.id, ScanStatus::Running).await;
    let err = dispatcher.start(scan.id).await.unwrap_err();
    assert!(matches!(err, EngineError::Conflict(_)));

    gate.notify_one();
    let finished = ctx.wait_for_status(scan.id, ScanStatus::Completed).await;

    // A terminal scan cannot re-enter the queue either.
    assert!(finished.status.is_terminal());
    let err = dispatcher.start(scan.id).await.unwrap_err();
    assert!(matches!(err, EngineError::Conflict(_)));
}

#[tokio::test]
async fn forceful_stop_aborts_a_blocked_worker() {
    let blocked = ScriptedPlugin::new("tarpit", Behavior::BlockUntilAborted);
    let ctx = TestContext::new(as_plugins(&[blocked.clone()]));
    let dispatcher = ctx.dispatcher(1);

    let scan = dispatcher
        .create_scan(CreateScanRequest {
            target: "example.com".into(),
            tools: vec!["tarpit".into()],
            project_id: None,
        })
        .await
        .unwrap();

    ctx.wait_for_status(scan.id, ScanStatus::Running).await;
    dispatcher.stop(scan.id).await.unwrap();

    let stored = ctx.wait_for_status(scan.id, ScanStatus::Stopped).await;
    assert!(stored.finished_at.is_some());

    // Stop is idempotent, including against the now-terminal scan.
    dispatcher.stop(scan.id).await.unwrap();
    let stored = ctx.stores.scans.get_scan(scan.id).await.unwrap().unwrap();
    assert_eq!(stored.status, ScanStatus::Stopped);
}

#[tokio::test]
async fn scheduled_scans_flow_through_the_dispatcher_end_to_end() {
    use std::time::Duration;

    use chrono::{Duration as ChronoDuration, Utc};
    use vantage_core::store::ScheduleStore;
    use vantage_core::ticker::ScheduleTicker;
    use vantage_model::Schedule;

    let plugin = ScriptedPlugin::yielding("pluginA", 2);
    let ctx = TestContext::new(as_plugins(&[plugin.clone()]));
    let dispatcher = ctx.dispatcher(2);

    let mut schedule =
        Schedule::new("example.com", vec!["pluginA".into()], 5, None);
    schedule.next_run_at = Utc::now() - ChronoDuration::minutes(1);
    ctx.memory.create_schedule(&schedule).await.unwrap();

    let ticker = ScheduleTicker::new(
        ctx.memory.clone(),
        Arc::new(dispatcher),
        Duration::from_secs(60),
    );
    let now = Utc::now();
    assert_eq!(ticker.run_once(now).await.unwrap(), 1);

    let scans = ctx.stores.scans.list_scans(10).await.unwrap();
    assert_eq!(scans.len(), 1);
    let scan = ctx.wait_for_status(scans[0].id, ScanStatus::Completed).await;
    assert_eq!(scan.target, "example.com");
    assert_eq!(ctx.memory.findings_for_scan(scan.id).await.unwrap().len(), 2);

    let advanced = ctx
        .memory
        .get_schedule(schedule.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(advanced.last_run_at, Some(now));
    assert_eq!(advanced.next_run_at, now + ChronoDuration::minutes(5));
}
