// tests/coordinator_policies.rs

use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use gridtask::policy;
use gridtask::session::{Coordinator, SessionOptions};
use gridtask::task::{JobFailure, SingleNode};
use gridtask::topology::{NodeId, TopologySnapshot};
use gridtask::transport::LocalTransport;
use gridtask_test_utils::builders::TopologyBuilder;
use gridtask_test_utils::fake_transport::ManualTransport;
use gridtask_test_utils::tasks::{FanOutTask, ScriptedJob, ScriptedTask, TargetArg};
use gridtask_test_utils::{init_tracing, with_timeout};

type TestResult = Result<(), Box<dyn Error>>;

fn topology(count: usize) -> Arc<TopologySnapshot> {
    TopologyBuilder::new().servers(count).build_arc()
}

fn node_order<T, E>(reduced: &[(NodeId, Result<T, E>)]) -> Vec<&str> {
    reduced.iter().map(|(node, _)| node.as_str()).collect()
}

#[tokio::test]
async fn results_reduce_in_arrival_order() -> TestResult {
    init_tracing();

    let topology = topology(3);
    let transport = LocalTransport::new(&topology)
        .with_latency(&NodeId::from("n1"), Duration::from_millis(300))
        .with_latency(&NodeId::from("n3"), Duration::from_millis(100));
    let coordinator = Coordinator::new(FanOutTask::new(), transport);

    let reduced = with_timeout(coordinator.execute(&(), topology)).await?;

    assert_eq!(node_order(&reduced), vec!["n2", "n3", "n1"]);
    assert!(reduced.iter().all(|(_, outcome)| outcome.is_ok()));
    Ok(())
}

#[tokio::test]
async fn quorum_policy_reduces_early_and_only_once() -> TestResult {
    init_tracing();

    let topology = topology(3);
    let transport = LocalTransport::new(&topology)
        .with_latency(&NodeId::from("n2"), Duration::from_millis(100))
        .with_latency(&NodeId::from("n3"), Duration::from_millis(100));
    let task = Arc::new(
        FanOutTask::new().with_policy(|_, received| policy::reduce_on_quorum(received, 1)),
    );
    let coordinator = Coordinator::from_shared(Arc::clone(&task), Arc::new(transport));

    let reduced = with_timeout(coordinator.execute(&(), topology)).await?;
    assert_eq!(node_order(&reduced), vec!["n1"]);

    // Let the slow jobs finish; their results must not trigger a second reduce.
    tokio::time::sleep(Duration::from_millis(250)).await;
    assert_eq!(task.reduce_calls(), 1);
    assert_eq!(task.map_calls(), 1);
    Ok(())
}

#[tokio::test]
async fn departed_node_fails_over_to_a_live_one() -> TestResult {
    init_tracing();

    let topology = topology(3);
    let transport = LocalTransport::new(&topology);
    transport.depart(&NodeId::from("n1"));

    let coordinator = Coordinator::new(
        FanOutTask::new().with_policy(|result, _| policy::failover_on_failure(result)),
        transport,
    );

    let reduced = with_timeout(coordinator.execute(&(), topology)).await?;

    assert_eq!(reduced.len(), 3);
    assert!(reduced.iter().all(|(_, outcome)| outcome.is_ok()));
    let on_n2 = reduced.iter().filter(|(node, _)| node.as_str() == "n2").count();
    assert_eq!(on_n2, 2);
    assert!(reduced.iter().all(|(node, _)| node.as_str() != "n1"));
    Ok(())
}

#[tokio::test]
async fn failing_job_fails_over_and_succeeds_elsewhere() -> TestResult {
    init_tracing();

    let topology = topology(2);
    let task = FanOutTask::new()
        .with_job(
            "n1",
            ScriptedJob::FailOn {
                node: NodeId::from("n1"),
                failure: JobFailure::msg("out of memory"),
            },
        )
        .with_policy(|result, _| policy::failover_on_failure(result));
    let coordinator = Coordinator::new(task, LocalTransport::new(&topology));

    let reduced = with_timeout(coordinator.execute(&(), topology)).await?;

    assert_eq!(reduced.len(), 2);
    for (node, outcome) in &reduced {
        assert_eq!(node.as_str(), "n2");
        assert_eq!(outcome.as_deref().ok(), Some("hello from n2"));
    }
    Ok(())
}

#[tokio::test]
async fn failures_are_kept_as_data_under_wait_policy() -> TestResult {
    init_tracing();

    let topology = topology(3);
    let failure = JobFailure::msg("index corrupted");
    let task = FanOutTask::new().with_job("n2", ScriptedJob::Fail(failure.clone()));
    let coordinator = Coordinator::new(task, LocalTransport::new(&topology));

    let reduced = with_timeout(coordinator.execute(&(), topology)).await?;

    assert_eq!(reduced.len(), 3);
    let (_, outcome) = reduced
        .iter()
        .find(|(node, _)| node.as_str() == "n2")
        .expect("n2 reported");
    let err = outcome.as_ref().expect_err("n2 failed");
    assert!(err.ptr_eq(&failure));
    Ok(())
}

#[tokio::test]
async fn failover_cap_comes_from_session_options() -> TestResult {
    init_tracing();

    let topology = topology(3);
    let transport = LocalTransport::new(&topology);
    transport.depart(&NodeId::from("n1"));

    let coordinator = Coordinator::new(
        FanOutTask::new().with_policy(|result, _| policy::failover_on_failure(result)),
        transport,
    )
    .with_options(SessionOptions {
        failover_attempts: 0,
    });

    let reduced = with_timeout(coordinator.execute(&(), topology)).await?;

    let failed: Vec<&str> = reduced
        .iter()
        .filter(|(_, outcome)| outcome.is_err())
        .map(|(node, _)| node.as_str())
        .collect();
    assert_eq!(failed, vec!["n1"]);
    Ok(())
}

#[tokio::test]
async fn refused_dispatch_is_reported_as_failed_job() -> TestResult {
    init_tracing();

    let topology = topology(2);
    let transport = ManualTransport::<ScriptedJob>::shared();
    transport.refuse("n2");
    let coordinator = Coordinator::from_shared(Arc::new(FanOutTask::new()), Arc::clone(&transport));

    let handle = coordinator.submit(&(), topology)?;
    let dispatched = with_timeout(transport.wait_for_dispatches(1)).await;
    assert_eq!(dispatched[0].node.id().as_str(), "n1");
    assert!(dispatched[0].reply.success("done".to_string()));

    let reduced = with_timeout(handle.join()).await?;
    let (node, outcome) = reduced
        .iter()
        .find(|(_, outcome)| outcome.is_err())
        .expect("refused job is a failure");
    assert_eq!(node.as_str(), "n2");
    let message = outcome.as_ref().err().map(ToString::to_string).unwrap_or_default();
    assert!(message.contains("refused"), "unexpected failure: {message}");
    Ok(())
}

#[tokio::test]
async fn dropped_reply_handle_does_not_hang_the_session() -> TestResult {
    init_tracing();

    let topology = topology(2);
    let transport = ManualTransport::<ScriptedJob>::shared();
    let coordinator = Coordinator::from_shared(Arc::new(FanOutTask::new()), Arc::clone(&transport));

    let handle = coordinator.submit(&(), topology)?;
    let mut dispatched = with_timeout(transport.wait_for_dispatches(2)).await;

    let lost = dispatched.pop().expect("second dispatch");
    drop(lost);
    assert!(dispatched[0].reply.success("done".to_string()));

    let reduced = with_timeout(handle.join()).await?;
    assert_eq!(reduced.len(), 2);
    assert_eq!(reduced.iter().filter(|(_, o)| o.is_err()).count(), 1);
    Ok(())
}

#[tokio::test]
async fn duplicate_and_late_deliveries_are_discarded() -> TestResult {
    init_tracing();

    let topology = topology(2);
    let transport = ManualTransport::<ScriptedJob>::shared();
    let coordinator = Coordinator::from_shared(
        Arc::new(SingleNode::new(ScriptedTask::echo())),
        Arc::clone(&transport),
    );

    let handle = coordinator.submit(&TargetArg::new("n1"), topology)?;
    let dispatched = with_timeout(transport.wait_for_dispatches(1)).await;
    let reply = dispatched[0].reply.clone();

    assert!(reply.success("first".to_string()));
    reply.success("second".to_string());

    let reduced = with_timeout(handle.join()).await?;
    assert_eq!(reduced, "first");

    // The session is gone: nothing listens any more.
    assert!(!reply.success("too late".to_string()));
    Ok(())
}

#[tokio::test]
async fn concurrent_sessions_do_not_share_results() -> TestResult {
    init_tracing();

    let topology = topology(5);
    let coordinator = Coordinator::new(
        SingleNode::new(ScriptedTask::echo()),
        LocalTransport::new(&topology),
    );

    let mut handles = Vec::new();
    for i in 1..=5 {
        let arg = TargetArg::new(&format!("n{i}"));
        handles.push((i, coordinator.submit(&arg, Arc::clone(&topology))?));
    }

    let mut sessions = Vec::new();
    for (i, handle) in handles {
        sessions.push(handle.session());
        let reduced = with_timeout(handle.join()).await?;
        assert_eq!(reduced, format!("hello from n{i}"));
    }

    sessions.sort_by_key(|s| s.0);
    sessions.dedup();
    assert_eq!(sessions.len(), 5);
    Ok(())
}
