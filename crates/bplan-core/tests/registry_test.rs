//! Integration tests for plan creation, goals, dependencies and snapshots.

use std::collections::HashSet;

use bplan_core::{ErrorKind, Goal, ManagerConfig, NewPlan, PlanError, PlanPriority, PlanStatus};
use bplan_test_utils::{create_plans, recording_manager};

// ---------------------------------------------------------------------------
// Creation
// ---------------------------------------------------------------------------

#[test]
fn created_plans_have_unique_ids_and_created_status() {
    let (manager, _) = recording_manager(ManagerConfig::default());
    let plans = create_plans(&manager, &["a", "b", "c", "d", "e"]);

    let ids: HashSet<_> = plans.iter().map(|p| p.id.clone()).collect();
    assert_eq!(ids.len(), plans.len());
    for plan in &plans {
        assert_eq!(plan.status, PlanStatus::Created);
        assert!(plan.started_at.is_none());
        assert!(plan.completed_at.is_none());
    }
}

#[test]
fn create_plan_records_all_fields() {
    let (manager, _) = recording_manager(ManagerConfig::default());
    let plan = manager
        .create_plan(
            NewPlan::new("indexer")
                .description("Build the search index")
                .priority(PlanPriority::Critical)
                .workspace("/tmp/indexer")
                .tags(["search", "backend"]),
        )
        .unwrap();

    assert_eq!(plan.name, "indexer");
    assert_eq!(plan.description, "Build the search index");
    assert_eq!(plan.priority, PlanPriority::Critical);
    assert_eq!(plan.workspace_path.as_deref(), Some(std::path::Path::new("/tmp/indexer")));
    assert!(plan.tags.contains("search"));
    assert!(plan.tags.contains("backend"));
    assert!(plan.goals.is_empty());
    assert!(plan.dependencies.is_empty());
    assert!(plan.assigned_agents.is_empty());
}

#[test]
fn child_plan_links_to_parent() {
    let (manager, _) = recording_manager(ManagerConfig::default());
    let p1 = manager
        .create_plan(NewPlan::new("P1").priority(PlanPriority::High))
        .unwrap();
    let p2 = manager
        .create_plan(NewPlan::new("P2").parent(&p1.id))
        .unwrap();

    let p1 = manager.get_plan_status(&p1.id).unwrap();
    assert!(p1.child_plan_ids.contains(&p2.id));
    assert_eq!(p2.parent_plan_id.as_deref(), Some(p1.id.as_str()));
}

#[test]
fn unknown_parent_is_rejected_without_creating_anything() {
    let (manager, _) = recording_manager(ManagerConfig::default());
    let err = manager
        .create_plan(NewPlan::new("orphan").parent("no-such-plan"))
        .unwrap_err();

    assert!(matches!(err, PlanError::ParentNotFound(_)));
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert!(manager.list_plans(None).is_empty());
}

// ---------------------------------------------------------------------------
// Goals
// ---------------------------------------------------------------------------

#[test]
fn goals_are_appended_in_order() {
    let (manager, _) = recording_manager(ManagerConfig::default());
    let plan = &create_plans(&manager, &["a"])[0];

    let first = manager
        .add_goal_to_plan(&plan.id, Goal::new("design").criteria(["doc reviewed"]))
        .unwrap();
    let second = manager
        .add_goal_to_plan(&plan.id, Goal::new("implement").constraints(["no unsafe"]))
        .unwrap();
    assert_eq!((first, second), (0, 1));

    let snapshot = manager.get_plan_status(&plan.id).unwrap();
    let descriptions: Vec<_> = snapshot.goals.iter().map(|g| g.description.as_str()).collect();
    assert_eq!(descriptions, vec!["design", "implement"]);
    assert_eq!(snapshot.goals[1].constraints, vec!["no unsafe"]);
}

#[test]
fn add_goal_to_unknown_plan_fails() {
    let (manager, _) = recording_manager(ManagerConfig::default());
    let err = manager
        .add_goal_to_plan("missing", Goal::new("anything"))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

// ---------------------------------------------------------------------------
// Dependencies
// ---------------------------------------------------------------------------

#[test]
fn reverse_dependency_is_rejected_and_graph_unchanged() {
    let (manager, _) = recording_manager(ManagerConfig::default());
    let plans = create_plans(&manager, &["a", "b"]);
    let (a, b) = (&plans[0].id, &plans[1].id);

    assert!(manager.add_dependency(a, b).unwrap());
    let err = manager.add_dependency(b, a).unwrap_err();
    assert!(matches!(err, PlanError::DependencyCycle { .. }));
    assert_eq!(err.kind(), ErrorKind::InvariantViolation);

    let a_snap = manager.get_plan_status(a).unwrap();
    let b_snap = manager.get_plan_status(b).unwrap();
    assert_eq!(a_snap.dependencies.iter().collect::<Vec<_>>(), vec![b]);
    assert!(b_snap.dependencies.is_empty());
}

#[test]
fn transitive_cycle_is_rejected() {
    let (manager, _) = recording_manager(ManagerConfig::default());
    let plans = create_plans(&manager, &["a", "b", "c"]);
    let (a, b, c) = (&plans[0].id, &plans[1].id, &plans[2].id);

    manager.add_dependency(a, b).unwrap();
    manager.add_dependency(b, c).unwrap();
    assert!(manager.add_dependency(c, a).is_err());
    assert!(manager.get_plan_status(c).unwrap().dependencies.is_empty());
}

#[test]
fn self_dependency_is_a_cycle() {
    let (manager, _) = recording_manager(ManagerConfig::default());
    let a = &create_plans(&manager, &["a"])[0].id;
    assert!(matches!(
        manager.add_dependency(a, a),
        Err(PlanError::DependencyCycle { .. })
    ));
}

#[test]
fn duplicate_dependency_is_idempotent() {
    let (manager, _) = recording_manager(ManagerConfig::default());
    let plans = create_plans(&manager, &["a", "b"]);
    assert!(manager.add_dependency(&plans[0].id, &plans[1].id).unwrap());
    assert!(!manager.add_dependency(&plans[0].id, &plans[1].id).unwrap());
    assert_eq!(manager.get_plan_status(&plans[0].id).unwrap().dependencies.len(), 1);
}

#[test]
fn dependency_on_unknown_plan_fails() {
    let (manager, _) = recording_manager(ManagerConfig::default());
    let a = &create_plans(&manager, &["a"])[0].id;
    assert!(matches!(
        manager.add_dependency(a, "ghost"),
        Err(PlanError::PlanNotFound(ref id)) if id == "ghost"
    ));
    assert!(matches!(
        manager.add_dependency("ghost", a),
        Err(PlanError::PlanNotFound(_))
    ));
}

// ---------------------------------------------------------------------------
// Listing and snapshots
// ---------------------------------------------------------------------------

#[test]
fn list_plans_matches_individual_snapshots() {
    let (manager, _) = recording_manager(ManagerConfig::default());
    let plans = create_plans(&manager, &["one", "two", "three", "four"]);
    manager.add_dependency(&plans[3].id, &plans[0].id).unwrap();
    manager
        .add_goal_to_plan(&plans[1].id, Goal::new("goal"))
        .unwrap();

    let listed = manager.list_plans(None);
    assert_eq!(listed.len(), plans.len());
    for (snapshot, created) in listed.iter().zip(&plans) {
        assert_eq!(snapshot.id, created.id, "list is in creation order");
        assert_eq!(Some(snapshot), manager.get_plan_status(&snapshot.id).as_ref());
    }
}

#[tokio::test]
async fn list_plans_filters_by_status() {
    let (manager, _) = recording_manager(ManagerConfig::default());
    let plans = create_plans(&manager, &["a", "b", "c"]);
    manager.start(&plans[1].id).await.unwrap();

    let active = manager.list_plans(Some(PlanStatus::Active));
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].id, plans[1].id);
    assert_eq!(manager.list_plans(Some(PlanStatus::Created)).len(), 2);
    assert!(manager.list_plans(Some(PlanStatus::Failed)).is_empty());
}

#[test]
fn snapshots_are_detached_copies() {
    let (manager, _) = recording_manager(ManagerConfig::default());
    let plan = &create_plans(&manager, &["a"])[0];
    let before = manager.get_plan_status(&plan.id).unwrap();

    manager.add_goal_to_plan(&plan.id, Goal::new("later")).unwrap();

    assert!(before.goals.is_empty());
    assert_eq!(manager.get_plan_status(&plan.id).unwrap().goals.len(), 1);
}

#[test]
fn get_plan_status_unknown_is_none() {
    let (manager, _) = recording_manager(ManagerConfig::default());
    assert!(manager.get_plan_status("missing").is_none());
}

// ---------------------------------------------------------------------------
// Ready plans and ordering
// ---------------------------------------------------------------------------

#[tokio::test]
async fn ready_plans_respect_dependencies_and_priority() {
    let (manager, _) = recording_manager(ManagerConfig::default());
    let low = manager
        .create_plan(NewPlan::new("low").priority(PlanPriority::Low))
        .unwrap();
    let crit = manager
        .create_plan(NewPlan::new("crit").priority(PlanPriority::Critical))
        .unwrap();
    let blocked = manager
        .create_plan(NewPlan::new("blocked").priority(PlanPriority::Critical))
        .unwrap();
    manager.add_dependency(&blocked.id, &low.id).unwrap();

    let ready: Vec<_> = manager.ready_plans().into_iter().map(|p| p.name).collect();
    assert_eq!(ready, vec!["crit", "low"]);

    manager.start(&low.id).await.unwrap();
    let ready: Vec<_> = manager.ready_plans().into_iter().map(|p| p.name).collect();
    assert_eq!(ready, vec!["crit", "blocked"]);
}

#[test]
fn execution_order_puts_dependencies_first() {
    let (manager, _) = recording_manager(ManagerConfig::default());
    let base = manager.create_plan(NewPlan::new("base")).unwrap();
    let urgent = manager
        .create_plan(NewPlan::new("urgent").priority(PlanPriority::Critical))
        .unwrap();
    let top = manager
        .create_plan(NewPlan::new("top").priority(PlanPriority::Critical))
        .unwrap();
    manager.add_dependency(&top.id, &base.id).unwrap();

    let order = manager.execution_order();
    let pos = |id: &str| order.iter().position(|x| x == id).unwrap();
    assert_eq!(order.len(), 3);
    assert_eq!(order[0], urgent.id, "highest priority ready plan goes first");
    assert!(pos(&base.id) < pos(&top.id));
}

#[tokio::test]
async fn status_summary_counts_each_status() {
    let (manager, _) = recording_manager(ManagerConfig::default());
    let plans = create_plans(&manager, &["a", "b", "c", "d"]);
    manager.start(&plans[0].id).await.unwrap();
    manager.start(&plans[1].id).await.unwrap();
    manager.complete(&plans[1].id).unwrap();
    manager.cancel(&plans[2].id).await.unwrap();

    let summary = manager.status_summary();
    assert_eq!(summary.total, 4);
    assert_eq!(summary.active, 1);
    assert_eq!(summary.completed, 1);
    assert_eq!(summary.cancelled, 1);
    assert_eq!(summary.created, 1);
}
