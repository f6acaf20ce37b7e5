//! Edge case tests for tally-engine
//!
//! These tests cover boundary conditions, unusual inputs, and the
//! convergence guarantees as seen through the public API.

use tally_engine::{
    merge, Change, ChangeKind, ChangeLog, ChangeRequest, Error, ListService, LogSnapshot,
    ValidationError,
};

const LIST: &str = "groceries";

fn request(kind: &str, item: &str, target: Option<i64>, bought: Option<i64>) -> ChangeRequest {
    ChangeRequest {
        kind: kind.to_string(),
        list_id: LIST.to_string(),
        item_name: item.to_string(),
        target,
        bought,
        replica: "phone".to_string(),
        timestamp: Some(1),
    }
}

// ============================================================================
// String Edge Cases
// ============================================================================

#[test]
fn unicode_item_names() {
    let service = ListService::new();
    let names = ["牛乳", "хлеб", "خبز", "🥚🥚", "crème fraîche"];

    for (i, name) in names.iter().enumerate() {
        service
            .submit(Change::add(LIST, *name, 1, "phone", i as u64))
            .unwrap();
    }

    let view = service.get_state(LIST).unwrap();
    for name in names {
        assert!(view.state.contains_key(name), "missing {name}");
    }
}

#[test]
fn item_names_differing_only_in_case_are_distinct() {
    let merged = merge(vec![
        Change::add(LIST, "Milk", 1, "a", 1),
        Change::add(LIST, "milk", 2, "a", 2),
    ]);
    assert_eq!(merged.items.len(), 2);
}

#[test]
fn whitespace_only_names_are_rejected() {
    let service = ListService::new();
    assert_eq!(
        service.submit(Change::add(LIST, "   ", 1, "phone", 1)),
        Err(Error::Validation(ValidationError::EmptyItemName))
    );
    assert_eq!(
        service.submit(Change::add("\t", "milk", 1, "phone", 1)),
        Err(Error::Validation(ValidationError::EmptyListId))
    );
}

#[test]
fn very_long_item_name() {
    let long = "x".repeat(100_000);
    let service = ListService::new();
    service.submit(Change::add(LIST, long.clone(), 1, "phone", 1)).unwrap();
    assert!(service.get_state(LIST).unwrap().state.contains_key(&long));
}

#[test]
fn malformed_replica_ids_are_rejected() {
    let service = ListService::new();
    let oversized = "r".repeat(500);
    for replica in ["", " leading", "new\nline", oversized.as_str()] {
        let result = service.submit(Change::add(LIST, "milk", 1, replica, 1));
        assert!(
            matches!(result, Err(Error::Validation(ValidationError::InvalidReplica(_)))),
            "accepted {replica:?}"
        );
    }
    assert!(!service.log().contains_list(LIST));
}

// ============================================================================
// Numeric Edge Cases
// ============================================================================

#[test]
fn quantity_boundaries() {
    let merged = merge(vec![
        Change::add(LIST, "milk", u64::MAX, "a", 1),
        Change::update(LIST, "milk", u64::MAX, u64::MAX, "a", 2),
    ]);
    let milk = merged.get("milk").unwrap();
    assert_eq!((milk.target, milk.bought), (u64::MAX, u64::MAX));
    assert_eq!(milk.remaining(), 0);
}

#[test]
fn timestamp_boundaries() {
    let merged = merge(vec![
        Change::add(LIST, "milk", 1, "a", 0),
        Change::update(LIST, "milk", 7, 0, "a", u64::MAX),
        Change::remove(LIST, "milk", "b", u64::MAX - 1),
    ]);
    let milk = merged.get("milk").unwrap();
    assert_eq!((milk.target, milk.deleted), (7, true));
}

#[test]
fn bought_may_exceed_target() {
    let merged = merge(vec![Change::update(LIST, "milk", 2, 5, "a", 1)]);
    let milk = merged.get("milk").unwrap();
    assert_eq!(milk.bought, 5);
    assert_eq!(milk.remaining(), 0);
}

#[test]
fn negative_quantities_are_validation_errors() {
    let service = ListService::new();

    let err = service
        .submit_request(request("update", "milk", Some(3), Some(-1)))
        .unwrap_err();
    assert_eq!(
        err,
        Error::Validation(ValidationError::NegativeQuantity {
            field: "bought",
            value: -1
        })
    );
    assert!(matches!(service.get_state(LIST), Err(Error::NotFound(_))));
}

#[test]
fn missing_quantities_default_to_zero() {
    let service = ListService::new();
    let stored = service
        .submit_request(request("remove", "milk", None, None))
        .unwrap();
    assert_eq!((stored.target, stored.bought), (0, 0));
}

#[test]
fn unknown_kind_is_rejected() {
    let service = ListService::new();
    let err = service
        .submit_request(request("rename", "milk", Some(1), None))
        .unwrap_err();
    assert_eq!(
        err,
        Error::Validation(ValidationError::UnknownKind("rename".to_string()))
    );
}

// ============================================================================
// Wire Format Edge Cases
// ============================================================================

#[test]
fn request_accepts_snake_case_aliases() {
    let json = r#"{"type":"add","list_id":"groceries","item_name":"milk","target":2,"replica":"phone","timestamp":3}"#;
    let request: ChangeRequest = serde_json::from_str(json).unwrap();
    let change = request.into_change(|_| unreachable!()).unwrap();
    assert_eq!(change, Change::add(LIST, "milk", 2, "phone", 3));
}

#[test]
fn change_serializes_with_wire_names() {
    let json = serde_json::to_value(Change::remove(LIST, "milk", "phone", 9)).unwrap();
    assert_eq!(json["type"], "remove");
    assert_eq!(json["listId"], LIST);
    assert_eq!(json["itemName"], "milk");
}

// ============================================================================
// Ordering Edge Cases
// ============================================================================

#[test]
fn same_stamp_different_kinds() {
    // Remove outranks update outranks add at an equal stamp
    let changes = vec![
        Change::add(LIST, "milk", 1, "a", 5),
        Change::update(LIST, "milk", 9, 9, "a", 5),
        Change::remove(LIST, "milk", "a", 5),
    ];
    let merged = merge(changes.clone());
    let milk = merged.get("milk").unwrap();
    assert_eq!((milk.target, milk.bought, milk.deleted), (9, 9, true));

    let mut reversed = changes;
    reversed.reverse();
    assert_eq!(merge(reversed).items, merged.items);
}

#[test]
fn replica_tie_break_is_lexical() {
    let merged = merge(vec![
        Change::update(LIST, "milk", 1, 0, "B", 4),
        Change::update(LIST, "milk", 2, 0, "a", 4),
    ]);
    // "a" > "B" byte-wise, so "a" is the later writer
    assert_eq!(merged.get("milk").unwrap().target, 2);
}

#[test]
fn update_on_tombstone_keeps_it_deleted() {
    let merged = merge(vec![
        Change::add(LIST, "milk", 1, "a", 1),
        Change::remove(LIST, "milk", "a", 2),
        Change::update(LIST, "milk", 4, 2, "b", 3),
    ]);
    let milk = merged.get("milk").unwrap();
    assert_eq!((milk.target, milk.bought, milk.deleted), (4, 2, true));
}

#[test]
fn update_before_add_is_delivered() {
    // The add is older but arrives last
    let merged = merge(vec![
        Change::update(LIST, "milk", 3, 1, "b", 5),
        Change::add(LIST, "milk", 1, "a", 2),
    ]);
    let milk = merged.get("milk").unwrap();
    assert_eq!((milk.target, milk.bought, milk.deleted), (3, 1, false));
}

// ============================================================================
// Convergence Scenarios
// ============================================================================

#[test]
fn replicas_converge_regardless_of_delivery() {
    let phone = vec![
        Change::add(LIST, "milk", 2, "phone", 1),
        Change::update(LIST, "milk", 2, 2, "phone", 3),
        Change::add(LIST, "eggs", 12, "phone", 4),
    ];
    let laptop = vec![
        Change::add(LIST, "bread", 1, "laptop", 1),
        Change::remove(LIST, "milk", "laptop", 2),
        Change::update(LIST, "eggs", 6, 0, "laptop", 5),
    ];

    let one = ListService::new();
    for change in phone.iter().chain(laptop.iter()) {
        one.submit(change.clone()).unwrap();
    }
    let two = ListService::new();
    for change in laptop.iter().rev().chain(phone.iter().rev()) {
        two.submit(change.clone()).unwrap();
    }
    // Replay everything again on the second replica
    for change in phone.iter().chain(laptop.iter()) {
        two.submit(change.clone()).unwrap();
    }

    assert_eq!(
        one.get_state(LIST).unwrap().state,
        two.get_state(LIST).unwrap().state
    );

    let state = one.get_state(LIST).unwrap().state;
    // Update at t=3 is newer than the remove at t=2, but only edits values
    assert!(state["milk"].deleted);
    assert_eq!(state["milk"].bought, 2);
    assert_eq!(state["eggs"].target, 6);
}

#[test]
fn many_replicas_racing_one_item() {
    let changes: Vec<_> = (0..100)
        .map(|i| Change::add(LIST, "milk", i, format!("replica-{i:03}"), 7))
        .collect();
    let merged = merge(changes.clone());
    let milk = merged.get("milk").unwrap();
    assert_eq!(milk.last_writer.replica, "replica-000");
    assert_eq!(merged.stats.superseded, 99);

    let mut reversed = changes;
    reversed.reverse();
    assert_eq!(merge(reversed).items, merged.items);
}

#[test]
fn large_log_merges() {
    let changes: Vec<_> = (0..5_000u64)
        .map(|i| match i % 3 {
            0 => Change::add(LIST, format!("item-{}", i % 50), i, "a", i),
            1 => Change::update(LIST, format!("item-{}", i % 50), i, i / 2, "b", i),
            _ => Change::remove(LIST, format!("item-{}", i % 50), "c", i),
        })
        .collect();
    let merged = merge(changes);
    assert_eq!(merged.items.len(), 50);
    assert_eq!(merged.stats.skipped, 0);
}

// ============================================================================
// Snapshot Edge Cases
// ============================================================================

#[test]
fn snapshot_empty_log() {
    let snapshot = ChangeLog::new().export_snapshot();
    assert_eq!(snapshot.change_count(), 0);
    let json = snapshot.to_json().unwrap();
    assert_eq!(LogSnapshot::from_json(&json).unwrap(), snapshot);
}

#[test]
fn snapshot_restores_identical_views() {
    let service = ListService::new();
    service.submit(Change::add(LIST, "milk", 2, "phone", 1)).unwrap();
    service.submit(Change::remove(LIST, "milk", "laptop", 2)).unwrap();
    service.submit(Change::add(LIST, "milk", 1, "phone", 3)).unwrap();

    let json = service.log().export_snapshot().to_json_pretty().unwrap();

    let log = ChangeLog::new();
    assert_eq!(log.import_snapshot(LogSnapshot::from_json(&json).unwrap()), 0);
    let restored = ListService::with_log(log);

    assert_eq!(
        restored.get_state(LIST).unwrap(),
        service.get_state(LIST).unwrap()
    );
}

#[test]
fn tampered_snapshot_records_are_skipped() {
    let json = r#"{
        "formatVersion": 1,
        "lists": {
            "groceries": [
                {"type": "add", "listId": "groceries", "itemName": "milk", "target": 1, "bought": 0, "replica": "a", "timestamp": 1},
                {"type": "add", "listId": "groceries", "itemName": "", "target": 1, "bought": 0, "replica": "a", "timestamp": 2},
                {"type": "add", "listId": "elsewhere", "itemName": "eggs", "target": 1, "bought": 0, "replica": "a", "timestamp": 3}
            ]
        }
    }"#;

    let log = ChangeLog::new();
    let rejected = log.import_snapshot(LogSnapshot::from_json(json).unwrap());
    assert_eq!(rejected, 2);
    assert_eq!(log.read_all(LIST).len(), 1);
    assert!(!log.contains_list("elsewhere"));
}

#[test]
fn undecodable_snapshot_record_does_not_lose_the_rest() {
    let json = r#"{
        "formatVersion": 1,
        "lists": {
            "groceries": [
                {"type": "add", "listId": "groceries", "itemName": "milk", "target": 5, "bought": 0, "replica": "a", "timestamp": 1},
                {"type": "rename", "listId": "groceries", "itemName": "milk", "replica": "a", "timestamp": 2}
            ]
        }
    }"#;

    let log = ChangeLog::new();
    let rejected = log.import_snapshot(LogSnapshot::from_json(json).unwrap());
    assert_eq!(rejected, 1);

    let service = ListService::with_log(log);
    let view = service.get_state(LIST).unwrap();
    assert_eq!(view.log.len(), 1);
    assert_eq!(view.state["milk"].target, 5);
}

#[test]
fn change_kind_parses_case_sensitively() {
    assert_eq!("add".parse::<ChangeKind>(), Ok(ChangeKind::Add));
    assert!("Add".parse::<ChangeKind>().is_err());
}
