// tests/cancel_behaviour.rs

use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;

use gridtask::errors::GridError;
use gridtask::session::Coordinator;
use gridtask::task::SingleNode;
use gridtask_test_utils::builders::TopologyBuilder;
use gridtask_test_utils::fake_transport::ManualTransport;
use gridtask_test_utils::tasks::{FanOutTask, ScriptedJob, ScriptedTask, TargetArg};
use gridtask_test_utils::{init_tracing, with_timeout};

type TestResult = Result<(), Box<dyn Error>>;

#[tokio::test]
async fn cancelling_the_wait_returns_cancelled() -> TestResult {
    init_tracing();

    let topology = TopologyBuilder::new().servers(2).build_arc();
    let transport = ManualTransport::<ScriptedJob>::shared();
    let coordinator = Coordinator::from_shared(
        Arc::new(SingleNode::new(ScriptedTask::echo())),
        Arc::clone(&transport),
    );

    let handle = coordinator.submit(&TargetArg::new("n2"), topology)?;
    let dispatched = with_timeout(transport.wait_for_dispatches(1)).await;

    let (cancel_tx, cancel_rx) = oneshot::channel();
    cancel_tx.send(()).expect("receiver alive");

    let outcome = with_timeout(handle.join_with_cancel(cancel_rx)).await;
    assert!(matches!(outcome, Err(GridError::Cancelled)));

    // The dispatched job was not retracted; the session still listens.
    assert!(dispatched[0].reply.success("finished anyway".to_string()));
    Ok(())
}

#[tokio::test]
async fn dropped_cancel_sender_is_not_a_cancellation() -> TestResult {
    init_tracing();

    let topology = TopologyBuilder::new().servers(1).build_arc();
    let transport = ManualTransport::<ScriptedJob>::shared();
    let coordinator = Coordinator::from_shared(
        Arc::new(SingleNode::new(ScriptedTask::echo())),
        Arc::clone(&transport),
    );

    let handle = coordinator.submit(&TargetArg::new("n1"), topology)?;
    let (cancel_tx, cancel_rx) = oneshot::channel::<()>();
    drop(cancel_tx);

    let dispatched = with_timeout(transport.wait_for_dispatches(1)).await;
    let reply = dispatched[0].reply.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        reply.success("done".to_string());
    });

    let reduced = with_timeout(handle.join_with_cancel(cancel_rx)).await?;
    assert_eq!(reduced, "done");
    Ok(())
}

#[tokio::test]
async fn dropping_the_handle_lets_the_session_finish() -> TestResult {
    init_tracing();

    let topology = TopologyBuilder::new().servers(2).build_arc();
    let transport = ManualTransport::<ScriptedJob>::shared();
    let task = Arc::new(FanOutTask::new());
    let coordinator = Coordinator::from_shared(Arc::clone(&task), Arc::clone(&transport));

    let handle = coordinator.submit(&(), topology)?;
    drop(handle);

    let dispatched = with_timeout(transport.wait_for_dispatches(2)).await;
    for dispatch in &dispatched {
        dispatch.reply.success("ok".to_string());
    }

    with_timeout(async {
        while task.reduce_calls() == 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert_eq!(task.reduce_calls(), 1);
    Ok(())
}
