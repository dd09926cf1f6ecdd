// tests/tx_task.rs

use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use gridtask::diag::tx::TxJob;
use gridtask::diag::{TxInfo, TxLog, TxProjection, TxSortOrder, TxTask, TxTaskArg};
use gridtask::errors::{GridError, MappingError};
use gridtask::session::Coordinator;
use gridtask::topology::{NodeId, TopologySnapshot};
use gridtask::transport::LocalTransport;
use gridtask_test_utils::builders::TopologyBuilder;
use gridtask_test_utils::fake_transport::ManualTransport;
use gridtask_test_utils::{init_tracing, with_timeout};

type TestResult = Result<(), Box<dyn Error>>;

fn secs(s: u64) -> Duration {
    Duration::from_secs(s)
}

fn topology() -> Arc<TopologySnapshot> {
    TopologyBuilder::new()
        .server("s1")
        .server("s2")
        .client("c1")
        .build_arc()
}

fn sample_log() -> TxLog {
    TxLog::new(vec![
        TxInfo::new("tx-a", secs(5), 10).with_label("tx123").with_start_time(300),
        TxInfo::new("tx-b", secs(40), 2).with_label("batch-7").with_start_time(100),
        TxInfo::new("tx-c", secs(12), 80).with_start_time(200),
        TxInfo::new("tx-d", secs(90), 1).with_label("tx999").with_start_time(400),
    ])
}

fn transport_with_logs(topology: &TopologySnapshot) -> LocalTransport {
    topology.iter().fold(LocalTransport::new(topology), |t, node| {
        t.with_resource(node.id(), sample_log())
    })
}

fn xids(txs: &[TxInfo]) -> Vec<&str> {
    txs.iter().map(|tx| tx.xid.as_str()).collect()
}

#[tokio::test]
async fn lists_transactions_on_every_node_sorted_by_duration() -> TestResult {
    init_tracing();

    let topology = topology();
    let coordinator = Coordinator::new(TxTask, transport_with_logs(&topology));

    let arg = TxTaskArg {
        min_duration: Some(secs(10)),
        ..TxTaskArg::default()
    };
    let result = with_timeout(coordinator.execute(&arg, topology)).await?;

    assert_eq!(result.nodes().len(), 3);
    for entry in result.nodes() {
        let txs = entry.outcome.as_ref().expect("node answered");
        assert_eq!(xids(txs), vec!["tx-d", "tx-b", "tx-c"]);
    }
    assert_eq!(result.total_transactions(), 9);
    assert_eq!(result.failed_nodes().count(), 0);
    Ok(())
}

#[tokio::test]
async fn label_size_order_and_limit_are_applied_per_node() -> TestResult {
    init_tracing();

    let topology = topology();
    let coordinator = Coordinator::new(TxTask, transport_with_logs(&topology));

    let arg = TxTaskArg {
        label: Some("^tx[0-9]+$".to_string()),
        order: TxSortOrder::Size,
        limit: Some(1),
        projection: Some(TxProjection::Nodes(vec![NodeId::from("s2")])),
        ..TxTaskArg::default()
    };
    let result = with_timeout(coordinator.execute(&arg, topology)).await?;

    assert_eq!(result.nodes().len(), 1);
    let s2 = result.get(&NodeId::from("s2")).expect("s2 answered");
    assert_eq!(xids(s2.outcome.as_ref().expect("ok")), vec!["tx-a"]);
    Ok(())
}

#[tokio::test]
async fn start_time_order_and_min_size() -> TestResult {
    init_tracing();

    let topology = topology();
    let coordinator = Coordinator::new(TxTask, transport_with_logs(&topology));

    let arg = TxTaskArg {
        min_size: Some(2),
        order: TxSortOrder::StartTime,
        projection: Some(TxProjection::Clients),
        ..TxTaskArg::default()
    };
    let result = with_timeout(coordinator.execute(&arg, topology)).await?;

    let c1 = result.get(&NodeId::from("c1")).expect("client answered");
    assert_eq!(xids(c1.outcome.as_ref().expect("ok")), vec!["tx-b", "tx-c", "tx-a"]);
    Ok(())
}

#[tokio::test]
async fn node_without_a_transaction_log_is_reported_not_hidden() -> TestResult {
    init_tracing();

    let topology = topology();
    let transport = LocalTransport::new(&topology).with_resource(&NodeId::from("s1"), sample_log());
    let coordinator = Coordinator::new(TxTask, transport);

    let arg = TxTaskArg {
        projection: Some(TxProjection::Servers),
        ..TxTaskArg::default()
    };
    let result = with_timeout(coordinator.execute(&arg, topology)).await?;

    let failed: Vec<&str> = result.failed_nodes().map(NodeId::as_str).collect();
    assert_eq!(failed, vec!["s2"]);
    assert_eq!(result.total_transactions(), 4);
    Ok(())
}

#[tokio::test]
async fn invalid_label_pattern_fails_before_dispatch() -> TestResult {
    init_tracing();

    let transport = ManualTransport::<TxJob>::shared();
    let coordinator = Coordinator::from_shared(Arc::new(TxTask), Arc::clone(&transport));

    let arg = TxTaskArg {
        label: Some("tx123[".to_string()),
        ..TxTaskArg::default()
    };
    let err = coordinator.submit(&arg, topology()).expect_err("bad regex");

    assert!(matches!(err, GridError::InvalidArgument(_)));
    assert!(transport.history().is_empty());
    Ok(())
}

#[test]
fn projection_errors() {
    let topology = TopologyBuilder::new().servers(2).build();

    let missing = TxTaskArg {
        projection: Some(TxProjection::Nodes(vec![NodeId::from("n1"), NodeId::from("n7")])),
        ..TxTaskArg::default()
    };
    match missing.select_nodes(&topology) {
        Err(GridError::Mapping(MappingError::NodeNotFound { id, .. })) => {
            assert_eq!(id.as_str(), "n7")
        }
        other => panic!("expected NodeNotFound, got {other:?}"),
    }

    let no_clients = TxTaskArg {
        projection: Some(TxProjection::Clients),
        ..TxTaskArg::default()
    };
    assert!(matches!(
        no_clients.select_nodes(&topology),
        Err(GridError::Mapping(MappingError::EmptyProjection(_)))
    ));

    let empty_list = TxTaskArg {
        projection: Some(TxProjection::Nodes(Vec::new())),
        ..TxTaskArg::default()
    };
    assert!(matches!(empty_list.validate(), Err(GridError::InvalidArgument(_))));

    let zero_limit = TxTaskArg {
        limit: Some(0),
        ..TxTaskArg::default()
    };
    assert!(matches!(zero_limit.validate(), Err(GridError::InvalidArgument(_))));
}

#[test]
fn explicit_projection_keeps_snapshot_order() {
    let topology = TopologyBuilder::new().servers(3).build();
    let arg = TxTaskArg {
        projection: Some(TxProjection::Nodes(vec![NodeId::from("n3"), NodeId::from("n1")])),
        ..TxTaskArg::default()
    };

    let selected: Vec<&str> = arg
        .select_nodes(&topology)
        .unwrap()
        .into_iter()
        .map(|n| n.id().as_str())
        .collect();
    assert_eq!(selected, vec!["n1", "n3"]);
}

#[test]
fn sort_order_parses_case_insensitively() {
    assert_eq!("duration".parse::<TxSortOrder>(), Ok(TxSortOrder::Duration));
    assert_eq!("SIZE".parse::<TxSortOrder>(), Ok(TxSortOrder::Size));
    assert_eq!("start_time".parse::<TxSortOrder>(), Ok(TxSortOrder::StartTime));
    assert!("LATEST".parse::<TxSortOrder>().is_err());
}
