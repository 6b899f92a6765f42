//! Integration tests for identity, graph building and synthesis passes.

use infra_core::{
    CoreError, DependencyGraph, IdentifierGenerator, PassState, RecordingAdapter, ScopePath,
    SynthesisLog, SynthesisPass, UnitState,
};
use tempfile::tempdir;

#[test]
fn test_cycle_rejection_keeps_previous_state() {
    let ids = IdentifierGenerator::new();
    let scope = ScopePath::root();
    let mut graph = DependencyGraph::new();
    let a = graph.add_unit(ids.construct(&scope, "Queue", "a").unwrap(), "a").unwrap();
    let b = graph.add_unit(ids.construct(&scope, "Queue", "b").unwrap(), "b").unwrap();

    graph.add_edge(a, b).unwrap();
    let before = graph.edges();

    let err = graph.add_edge(b, a).unwrap_err();
    assert!(matches!(err, CoreError::CyclicDependency { .. }));
    assert!(err.to_string().contains("Queue-a"));
    assert_eq!(graph.edges(), before);
    assert_eq!(graph.topological_order(), vec![a, b]);
}

#[test]
fn test_same_identifier_in_sibling_scopes() {
    let ids = IdentifierGenerator::new();
    let mut graph = DependencyGraph::new();
    let prod = ScopePath::root().child("prod").unwrap();
    let dev = ScopePath::root().child("dev").unwrap();

    let p = graph.add_unit(ids.construct(&prod, "Table", "orders").unwrap(), 1).unwrap();
    let d = graph.add_unit(ids.construct(&dev, "Table", "orders").unwrap(), 2).unwrap();

    assert_ne!(p, d);
    assert_eq!(graph.find("prod/Table-orders"), Some(p));
    assert_eq!(graph.find("dev/Table-orders"), Some(d));
    assert!(matches!(
        graph.add_unit(ids.construct(&dev, "Table", "orders").unwrap(), 3),
        Err(CoreError::IdentifierCollision { .. })
    ));
}

#[test]
fn test_log_round_trips_through_disk() {
    let ids = IdentifierGenerator::new();
    let scope = ScopePath::parse("orders-prod");
    let mut graph = DependencyGraph::new();
    let table = graph.add_unit(ids.construct(&scope, "Table", "orders").unwrap(), ()).unwrap();
    let queue = graph.add_unit(ids.construct(&scope, "Queue", "events").unwrap(), ()).unwrap();
    let role = graph.add_unit(ids.construct(&scope, "Role", "consumer").unwrap(), ()).unwrap();
    graph.chain(&[queue, role, table]).unwrap();

    let mut adapter = RecordingAdapter::new();
    let log = SynthesisPass::new("orders-prod").run(&mut graph, &mut adapter).unwrap();
    assert!(graph.units().all(|u| u.state() == UnitState::Ordered));

    let dir = tempdir().unwrap();
    let path = dir.path().join("logs").join("manifest.json");
    log.save(&path).unwrap();

    let loaded = SynthesisLog::load(&path).unwrap();
    assert_eq!(loaded.pass_id, log.pass_id);
    assert_eq!(loaded.state, PassState::Completed);
    assert_eq!(
        loaded.order,
        vec![
            "orders-prod/Queue-events",
            "orders-prod/Role-consumer",
            "orders-prod/Table-orders"
        ]
    );
    assert_eq!(loaded.units[2].predecessors, vec!["orders-prod/Role-consumer"]);
}
