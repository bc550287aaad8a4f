//! Integration tests for agent reservations, workload and goal dispatch.

use std::sync::Arc;

use bplan_core::{ErrorKind, Goal, ManagerConfig, PlanError};
use bplan_test_utils::{CoordinatorCall, create_plans, recording_manager};

// ---------------------------------------------------------------------------
// Exclusivity
// ---------------------------------------------------------------------------

#[tokio::test]
async fn exclusive_reservation_blocks_other_plans() {
    let (manager, _) = recording_manager(ManagerConfig::default());
    let plans = create_plans(&manager, &["a", "b"]);
    let (a, b) = (&plans[0].id, &plans[1].id);

    let reservation = manager.reserve_agent(a, "X", true).await.unwrap();
    assert!(reservation.exclusive);
    assert_eq!(reservation.plan_id, *a);

    let err = manager.reserve_agent(b, "X", false).await.unwrap_err();
    assert!(matches!(
        err,
        PlanError::ReservationConflict { ref holder, .. } if holder == a
    ));
    assert_eq!(err.kind(), ErrorKind::InvariantViolation);
    assert!(manager.reserve_agent(b, "X", true).await.is_err());

    assert!(manager.release_agent(a, "X").await.unwrap());
    manager.reserve_agent(b, "X", false).await.unwrap();
}

#[tokio::test]
async fn shared_reservations_coexist_until_exclusive_requested() {
    let (manager, _) = recording_manager(ManagerConfig::default());
    let plans = create_plans(&manager, &["a", "b", "c"]);

    manager.reserve_agent(&plans[0].id, "X", false).await.unwrap();
    manager.reserve_agent(&plans[1].id, "X", false).await.unwrap();
    assert!(matches!(
        manager.reserve_agent(&plans[2].id, "X", true).await,
        Err(PlanError::ReservationConflict { .. })
    ));

    let workload = manager.get_agent_workload();
    let x = &workload["X"];
    assert_eq!(x.total, 2);
    assert!(!x.exclusive);
    assert!(x.plans.contains(&plans[0].id));
    assert!(x.plans.contains(&plans[1].id));
}

#[tokio::test]
async fn sole_holder_may_upgrade_to_exclusive() {
    let (manager, _) = recording_manager(ManagerConfig::default());
    let id = create_plans(&manager, &["a"]).remove(0).id;

    manager.reserve_agent(&id, "X", false).await.unwrap();
    manager.reserve_agent(&id, "X", true).await.unwrap();

    let snapshot = manager.get_plan_status(&id).unwrap();
    assert_eq!(snapshot.assigned_agents.len(), 1);
    assert!(snapshot.assigned_agents["X"].exclusive);
    assert!(manager.get_agent_workload()["X"].exclusive);
}

#[tokio::test]
async fn reservation_shows_in_plan_snapshot() {
    let (manager, _) = recording_manager(ManagerConfig::default());
    let id = create_plans(&manager, &["a"]).remove(0).id;
    manager.reserve_agent(&id, "builder", false).await.unwrap();

    let snapshot = manager.get_plan_status(&id).unwrap();
    let reservation = &snapshot.assigned_agents["builder"];
    assert_eq!(reservation.agent_name, "builder");
    assert!(!reservation.exclusive);
}

// ---------------------------------------------------------------------------
// Rejections
// ---------------------------------------------------------------------------

#[tokio::test]
async fn terminal_plan_cannot_reserve() {
    let (manager, coordinator) = recording_manager(ManagerConfig::default());
    let id = create_plans(&manager, &["a"]).remove(0).id;
    manager.cancel(&id).await.unwrap();

    assert!(matches!(
        manager.reserve_agent(&id, "X", false).await,
        Err(PlanError::PlanFinished { .. })
    ));
    assert!(coordinator.calls().is_empty());
}

#[tokio::test]
async fn unknown_plan_cannot_reserve_or_release() {
    let (manager, _) = recording_manager(ManagerConfig::default());
    assert_eq!(
        manager.reserve_agent("ghost", "X", true).await.unwrap_err().kind(),
        ErrorKind::NotFound
    );
    assert_eq!(
        manager.release_agent("ghost", "X").await.unwrap_err().kind(),
        ErrorKind::NotFound
    );
}

#[tokio::test]
async fn coordinator_refusal_records_nothing() {
    let (manager, coordinator) = recording_manager(ManagerConfig::default());
    let id = create_plans(&manager, &["a"]).remove(0).id;
    coordinator.refuse("X");

    let err = manager.reserve_agent(&id, "X", true).await.unwrap_err();
    assert!(matches!(err, PlanError::CoordinatorRefused { .. }));
    assert_eq!(err.kind(), ErrorKind::CollaboratorFailure);
    assert!(manager.get_plan_status(&id).unwrap().assigned_agents.is_empty());
    assert!(manager.get_agent_workload().is_empty());
}

#[tokio::test]
async fn coordinator_error_records_nothing() {
    let (manager, coordinator) = recording_manager(ManagerConfig::default());
    let id = create_plans(&manager, &["a"]).remove(0).id;
    coordinator.fail_agent("X");

    assert!(matches!(
        manager.reserve_agent(&id, "X", false).await,
        Err(PlanError::Coordinator(_))
    ));
    assert!(manager.get_agent_workload().is_empty());
}

// ---------------------------------------------------------------------------
// Release
// ---------------------------------------------------------------------------

#[tokio::test]
async fn release_is_idempotent() {
    let (manager, coordinator) = recording_manager(ManagerConfig::default());
    let id = create_plans(&manager, &["a"]).remove(0).id;
    manager.reserve_agent(&id, "X", true).await.unwrap();

    assert!(manager.release_agent(&id, "X").await.unwrap());
    assert!(!manager.release_agent(&id, "X").await.unwrap());
    assert_eq!(coordinator.released_for(&id), vec!["X"]);
}

#[tokio::test]
async fn failed_coordinator_release_keeps_reservation() {
    let (manager, coordinator) = recording_manager(ManagerConfig::default());
    let id = create_plans(&manager, &["a"]).remove(0).id;
    manager.reserve_agent(&id, "X", true).await.unwrap();
    coordinator.fail_releases();

    assert!(manager.release_agent(&id, "X").await.is_err());
    assert!(manager.get_plan_status(&id).unwrap().assigned_agents.contains_key("X"));
}

#[tokio::test]
async fn suspend_keeps_reservations() {
    let (manager, _) = recording_manager(ManagerConfig::default());
    let id = create_plans(&manager, &["a"]).remove(0).id;
    manager.start(&id).await.unwrap();
    manager.reserve_agent(&id, "X", true).await.unwrap();
    manager.suspend(&id).await.unwrap();

    assert!(manager.get_plan_status(&id).unwrap().assigned_agents.contains_key("X"));
}

#[tokio::test]
async fn finished_plans_keep_their_agents_until_released() {
    let (manager, coordinator) = recording_manager(ManagerConfig::default());
    let plans = create_plans(&manager, &["a", "b"]);
    let (a, b) = (&plans[0].id, &plans[1].id);
    manager.reserve_agent(a, "X", true).await.unwrap();
    manager.start(a).await.unwrap();
    manager.complete(a).unwrap();

    assert!(manager.get_plan_status(a).unwrap().assigned_agents.contains_key("X"));
    assert!(coordinator.released_for(a).is_empty());
    assert!(matches!(
        manager.reserve_agent(b, "X", false).await,
        Err(PlanError::ReservationConflict { ref holder, .. }) if holder == a
    ));

    assert!(manager.release_agent(a, "X").await.unwrap());
    manager.reserve_agent(b, "X", false).await.unwrap();
}

// ---------------------------------------------------------------------------
// Races with the coordinator
// ---------------------------------------------------------------------------

#[tokio::test]
async fn racing_exclusive_reservations_roll_back_the_loser() {
    let (manager, coordinator) = recording_manager(ManagerConfig::default());
    let manager = Arc::new(manager);
    let plans = create_plans(&manager, &["a", "b"]);
    // Both requests pass validation before either commits.
    coordinator.gate_reservations(2);

    let handles: Vec<_> = plans
        .iter()
        .map(|p| {
            let manager = manager.clone();
            let id = p.id.clone();
            tokio::spawn(async move { manager.reserve_agent(&id, "X", true).await })
        })
        .collect();
    let mut results = Vec::new();
    for handle in handles {
        results.push(handle.await.unwrap());
    }

    let winner = results
        .iter()
        .find_map(|r| r.as_ref().ok())
        .map(|r| r.plan_id.clone())
        .unwrap();
    let (loser, err) = plans
        .iter()
        .zip(&results)
        .find_map(|(p, r)| r.as_ref().err().map(|e| (p.id.clone(), e)))
        .unwrap();
    assert!(matches!(
        err,
        PlanError::ReservationConflict { holder, .. } if *holder == winner
    ));

    assert_eq!(coordinator.released_for(&loser), vec!["X"]);
    assert!(coordinator.released_for(&winner).is_empty());
    let workload = manager.get_agent_workload();
    assert_eq!(workload["X"].total, 1);
    assert!(workload["X"].plans.contains(&winner));
}

#[tokio::test]
async fn reservation_for_plan_cancelled_mid_flight_is_rolled_back() {
    let (manager, coordinator) = recording_manager(ManagerConfig::default());
    let manager = Arc::new(manager);
    let id = create_plans(&manager, &["a"]).remove(0).id;

    let gate = coordinator.gate_reservations(2);
    let handle = {
        let manager = manager.clone();
        let id = id.clone();
        tokio::spawn(async move { manager.reserve_agent(&id, "X", true).await })
    };

    gate.wait().await;
    manager.cancel(&id).await.unwrap();
    gate.wait().await;

    assert!(matches!(
        handle.await.unwrap(),
        Err(PlanError::PlanFinished { .. })
    ));
    assert_eq!(coordinator.released_for(&id), vec!["X"]);
    assert!(manager.get_agent_workload().is_empty());
}

#[tokio::test]
async fn hold_released_mid_flight_is_still_rolled_back() {
    let (manager, coordinator) = recording_manager(ManagerConfig::default());
    let manager = Arc::new(manager);
    let id = create_plans(&manager, &["a"]).remove(0).id;
    manager.reserve_agent(&id, "X", false).await.unwrap();

    // Upgrade request in flight while the existing hold goes away.
    let gate = coordinator.gate_reservations(2);
    let handle = {
        let manager = manager.clone();
        let id = id.clone();
        tokio::spawn(async move { manager.reserve_agent(&id, "X", true).await })
    };

    gate.wait().await;
    assert!(manager.release_agent(&id, "X").await.unwrap());
    manager.cancel(&id).await.unwrap();
    gate.wait().await;

    assert!(handle.await.unwrap().is_err());
    // One release from release_agent, one rolling back the upgrade grant.
    assert_eq!(coordinator.released_for(&id), vec!["X", "X"]);
    assert!(manager.get_agent_workload().is_empty());
}

// ---------------------------------------------------------------------------
// Goal dispatch
// ---------------------------------------------------------------------------

#[tokio::test]
async fn dispatch_goal_forwards_to_reserved_agent() {
    let (manager, coordinator) = recording_manager(ManagerConfig::default());
    let id = create_plans(&manager, &["a"]).remove(0).id;
    manager
        .add_goal_to_plan(&id, Goal::new("compile the crate"))
        .unwrap();
    manager.start(&id).await.unwrap();
    manager.reserve_agent(&id, "builder", true).await.unwrap();

    let result = manager.dispatch_goal(&id, "builder", 0).await.unwrap();
    assert!(result.success);
    assert_eq!(result.agent.as_deref(), Some("builder"));
    assert!(coordinator.calls().contains(&CoordinatorCall::Dispatch {
        agent: "builder".into(),
        plan_id: id.clone(),
        goal: "compile the crate".into(),
    }));
}

#[tokio::test]
async fn dispatch_goal_preconditions() {
    let (manager, _) = recording_manager(ManagerConfig::default());
    let id = create_plans(&manager, &["a"]).remove(0).id;
    manager.add_goal_to_plan(&id, Goal::new("only goal")).unwrap();
    manager.reserve_agent(&id, "builder", false).await.unwrap();

    assert!(matches!(
        manager.dispatch_goal(&id, "builder", 0).await,
        Err(PlanError::PlanNotActive { .. })
    ));

    manager.start(&id).await.unwrap();
    assert!(matches!(
        manager.dispatch_goal(&id, "builder", 5).await,
        Err(PlanError::GoalNotFound { index: 5, .. })
    ));
    assert!(matches!(
        manager.dispatch_goal(&id, "stranger", 0).await,
        Err(PlanError::AgentNotReserved { .. })
    ));
}

#[tokio::test]
async fn dispatch_goal_surfaces_coordinator_error() {
    let (manager, coordinator) = recording_manager(ManagerConfig::default());
    let id = create_plans(&manager, &["a"]).remove(0).id;
    manager.add_goal_to_plan(&id, Goal::new("g")).unwrap();
    manager.start(&id).await.unwrap();
    manager.reserve_agent(&id, "builder", false).await.unwrap();
    coordinator.fail_agent("builder");

    let err = manager.dispatch_goal(&id, "builder", 0).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CollaboratorFailure);
}

// ---------------------------------------------------------------------------
// Export
// ---------------------------------------------------------------------------

#[tokio::test]
async fn export_reflects_plans_and_workload() {
    let (manager, _) = recording_manager(ManagerConfig::default());
    let plans = create_plans(&manager, &["a", "b"]);
    manager.reserve_agent(&plans[0].id, "X", true).await.unwrap();

    let doc = manager.export();
    assert_eq!(doc.plans.len(), 2);
    assert_eq!(doc.plans[0].id, plans[0].id);
    assert_eq!(doc.agent_workload["X"].total, 1);

    let tmp = tempfile::TempDir::new().unwrap();
    let path = tmp.path().join("state.json");
    doc.write_to(&path).unwrap();

    let value: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert!(value["export_timestamp"].is_string());
    assert_eq!(value["plans"].as_array().unwrap().len(), 2);
    assert_eq!(value["plans"][0]["status"], "created");
    assert!(value["agent_workload"]["X"]["exclusive"].as_bool().unwrap());
}
