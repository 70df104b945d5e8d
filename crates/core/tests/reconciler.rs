//! Planning rules for ingestion batches and drift reports.

mod support;

use std::sync::Arc;

use calrecon_common::time::MockClock;
use calrecon_core::{
    Action, DeleteCause, Drift, DriftReport, ReconcilePolicy, Reconciler, SuppressionList,
};
use calrecon_domain::{
    DateRange, EventRecord, Identity, RecordKey, SourceKind, SuppressionEntry, TimeWindow,
};
use chrono::{Duration, NaiveDate};
use support::fixtures::{at, fields, record, LOCATION};
use support::store::MemoryStore;
use support::suppressions::MemorySuppressions;

const NOW_DAY: u32 = 15;

struct Rig {
    store: MemoryStore,
    suppressions: MemorySuppressions,
    reconciler: Reconciler,
}

fn rig() -> Rig {
    let store = MemoryStore::new();
    let suppressions = MemorySuppressions::new();
    let policy = ReconcilePolicy { required_misses: 2, suppression_ttl: Some(Duration::days(30)) };
    let reconciler = Reconciler::new(
        Arc::new(store.clone()),
        Arc::new(suppressions.clone()),
        policy,
        Arc::new(MockClock::new(at(1, NOW_DAY, 8))),
    );
    Rig { store, suppressions, reconciler }
}

fn window() -> TimeWindow {
    DateRange::new(
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        NaiveDate::from_ymd_opt(2024, 1, 31).unwrap(),
    )
    .unwrap()
    .to_window()
}

fn report(drifts: Vec<Drift>) -> DriftReport {
    DriftReport {
        target_location: LOCATION.into(),
        window: window(),
        scanned_at: at(1, NOW_DAY, 8),
        drifts,
        ignored: 0,
        warnings: Vec::new(),
    }
}

fn names(actions: &[Action]) -> Vec<&'static str> {
    actions.iter().map(Action::name).collect()
}

#[tokio::test]
async fn ingestion_batch_maps_onto_store_state() {
    let rig = rig();
    rig.store.seed(record("SAME", Some("evt-1")));
    rig.store.seed(record("EDITED", Some("evt-2")));
    rig.store.seed(record("UNWRITTEN", None));
    let mut pending = record("PENDING", Some("evt-4"));
    pending.consecutive_misses = 1;
    rig.store.seed(pending);

    let mut edited = record("EDITED", None);
    edited.fields.summary = "Edited upstream".into();
    let batch = vec![
        record("NEW", None),
        record("SAME", None),
        edited,
        record("UNWRITTEN", None),
        record("PENDING", None),
        record("NEW", None),
    ];

    let plan = rig.reconciler.plan_ingestion(LOCATION, batch).await.unwrap();

    assert_eq!(names(&plan.actions), ["update", "create", "create"]);
    assert_eq!(plan.unchanged, 1);
    // The pending record and the repeated NEW.
    assert_eq!(plan.skipped, 2);

    match &plan.actions[0] {
        Action::Update { record, remote } => {
            assert!(remote);
            assert_eq!(record.fields.summary, "Edited upstream");
            assert_eq!(record.external_ref.as_deref(), Some("evt-2"));
        }
        other => panic!("unexpected {other:?}"),
    }
    let creates: Vec<_> = plan.actions[1..]
        .iter()
        .map(|a| a.key().identity.value().to_string())
        .collect();
    assert_eq!(creates, ["NEW", "UNWRITTEN"]);
}

#[tokio::test]
async fn repeated_signature_is_reported_as_collision() {
    let rig = rig();
    let signed = |summary: &str| {
        EventRecord::new(
            Identity::signature("0123456789abcdef0123456789abcdef"),
            LOCATION,
            SourceKind::FedCampusEvent,
            fields(summary, at(1, 10, 9)),
            at(1, 1, 0),
        )
    };

    let plan = rig
        .reconciler
        .plan_ingestion(LOCATION, vec![signed("Open House"), signed("Open  House")])
        .await
        .unwrap();

    assert_eq!(plan.actions.len(), 1);
    assert_eq!(plan.skipped, 1);
    assert_eq!(plan.warnings.len(), 1);
    assert!(plan.warnings[0].contains("signature collision"));
}

#[tokio::test]
async fn missing_record_cools_down_before_deletion() {
    let rig = rig();
    let fresh = record("R1", Some("evt-1"));
    let mut missed_once = record("R2", Some("evt-2"));
    missed_once.consecutive_misses = 1;

    let plan = rig
        .reconciler
        .plan_drift(&report(vec![
            Drift::Missing { record: Box::new(fresh.clone()) },
            Drift::Missing { record: Box::new(missed_once.clone()) },
        ]))
        .await
        .unwrap();

    assert_eq!(names(&plan.actions), ["mark_missing", "delete", "suppress"]);
    assert_eq!(plan.actions[0].key(), fresh.key());
    match &plan.actions[1] {
        Action::Delete { cause, external_ref, .. } => {
            assert_eq!(*cause, DeleteCause::ConfirmedAbsent);
            assert_eq!(external_ref.as_deref(), Some("evt-2"));
        }
        other => panic!("unexpected {other:?}"),
    }
    match &plan.actions[2] {
        Action::Suppress { key, expires_at, .. } => {
            assert_eq!(*key, missed_once.key());
            assert_eq!(*expires_at, Some(at(1, NOW_DAY, 8) + Duration::days(30)));
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test]
async fn added_events_respect_suppressions_and_other_locations() {
    let rig = rig();
    let mut elsewhere = record("MOVED", Some("evt-old"));
    elsewhere.target_location = "personal".into();
    elsewhere.consecutive_misses = 1;
    rig.store.seed(elsewhere.clone());
    let blocked = record("BLOCKED", Some("evt-b"));
    rig.suppressions
        .add(SuppressionEntry::new(blocked.key(), "user deleted", at(1, 1, 0), None))
        .await
        .unwrap();

    let drifts = [record("MOVED", Some("evt-new")), blocked, record("FRESH", Some("evt-f"))]
        .into_iter()
        .map(|r| Drift::Added { record: Box::new(r) })
        .collect();
    let plan = rig.reconciler.plan_drift(&report(drifts)).await.unwrap();

    assert_eq!(plan.skipped, 1);
    assert_eq!(names(&plan.actions), ["move", "create"]);
    match &plan.actions[0] {
        Action::Move { key, to_location, external_ref } => {
            assert_eq!(*key, elsewhere.key());
            assert_eq!(to_location, LOCATION);
            assert_eq!(external_ref, "evt-new");
        }
        other => panic!("unexpected {other:?}"),
    }
    assert!(matches!(plan.actions[1], Action::Create { remote: false, .. }));
}

#[tokio::test]
async fn identity_still_live_elsewhere_is_a_second_copy() {
    let rig = rig();
    let mut home = record("SHARED", Some("evt-home"));
    home.target_location = "personal".into();
    rig.store.seed(home.clone());

    let added = Drift::Added { record: Box::new(record("SHARED", Some("evt-work"))) };
    let plan = rig.reconciler.plan_drift(&report(vec![added])).await.unwrap();

    assert_eq!(names(&plan.actions), ["create"]);
    match &plan.actions[0] {
        Action::Create { record, remote } => {
            assert!(!remote);
            assert_eq!(record.target_location, LOCATION);
            assert_eq!(record.external_ref.as_deref(), Some("evt-work"));
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test]
async fn stale_records_follow_their_source() {
    let rig = rig();
    let fed = record("R1", Some("evt-1"));
    let mut fed_live = fed.clone();
    fed_live.fields.summary = "Edited in calendar".into();

    let mut own = record("R2", Some("evt-2"));
    own.source_kind = SourceKind::UserAuthored;
    let mut own_live = own.clone();
    own_live.fields.summary = "Renamed by owner".into();

    let plan = rig
        .reconciler
        .plan_drift(&report(vec![
            Drift::Stale { stored: Box::new(fed.clone()), live: Box::new(fed_live) },
            Drift::Stale { stored: Box::new(own), live: Box::new(own_live) },
        ]))
        .await
        .unwrap();

    match (&plan.actions[0], &plan.actions[1]) {
        (
            Action::Update { record: pushed, remote: true },
            Action::Update { record: mirrored, remote: false },
        ) => {
            assert_eq!(pushed.fields, fed.fields);
            assert_eq!(mirrored.fields.summary, "Renamed by owner");
            assert_eq!(mirrored.source_kind, SourceKind::UserAuthored);
            assert_eq!(mirrored.last_observed_at, Some(at(1, NOW_DAY, 8)));
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test]
async fn unchanged_and_duplicate_drifts() {
    let rig = rig();
    let key = RecordKey::new(Identity::reservation("R1"), LOCATION);

    let plan = rig
        .reconciler
        .plan_drift(&report(vec![
            Drift::Unchanged { key: key.clone() },
            Drift::Duplicate { key: key.clone(), external_ref: "evt-copy".into() },
        ]))
        .await
        .unwrap();

    assert_eq!(names(&plan.actions), ["touch", "delete"]);
    match &plan.actions[1] {
        Action::Delete { cause, external_ref, .. } => {
            assert_eq!(*cause, DeleteCause::Duplicate);
            assert_eq!(external_ref.as_deref(), Some("evt-copy"));
        }
        other => panic!("unexpected {other:?}"),
    }
}
