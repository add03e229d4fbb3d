use behavelog_core::db::open_db_in_memory;
use behavelog_core::{
    CandidateEntry, EntryListQuery, EntryService, InMemoryConfigStore, InMemoryEntryLog,
    RejectionReason, SqliteConfigStore, SqliteEntryLog, SubmissionError, DEFAULT_CATEGORIES,
};
use rusqlite::params;

fn run_entry() -> CandidateEntry {
    CandidateEntry::new("Went for a run", "Exercise", "Health")
}

#[test]
fn unconfigured_deployment_scenario() {
    let conn = open_db_in_memory().unwrap();
    let store = SqliteConfigStore::try_new(&conn).unwrap();
    let log = SqliteEntryLog::try_new(&conn).unwrap();
    let service = EntryService::new(store, log);

    let options = service.get_form_options();
    assert_eq!(options.categories(), DEFAULT_CATEGORIES);
    assert!(options.has_impact_type("Health"));

    let first = service.submit(&run_entry()).unwrap();
    assert_eq!(first.id, 1);
    assert_eq!(first.category, "Exercise");
    assert_eq!(first.impact_type, "Health");

    let second = service.submit(&run_entry()).unwrap();
    assert_eq!(second.id, 2);

    let mut sleeping = run_entry();
    sleeping.category = "Sleeping".to_string();
    let err = service.submit(&sleeping).unwrap_err();
    assert!(matches!(
        err,
        SubmissionError::Rejected(RejectionReason::InvalidCategory { .. })
    ));

    assert_eq!(service.list_entries(&EntryListQuery::default()).unwrap().len(), 2);
    assert_eq!(service.get_entry(2).unwrap().unwrap(), second);
}

#[test]
fn every_offered_option_is_accepted() {
    let store = InMemoryConfigStore::new()
        .with("BEHAVIOR_CATEGORIES", "Sleep, Reading, Work")
        .with("IMPACT_TYPES", "Calm,Stress , Energy");
    let service = EntryService::new(store, InMemoryEntryLog::new());
    let options = service.get_form_options();

    for category in options.categories() {
        let entry = CandidateEntry::new("probe", category.as_str(), "Calm");
        assert_eq!(&service.submit(&entry).unwrap().category, category);
    }
    for impact_type in options.impact_types() {
        let entry = CandidateEntry::new("probe", "Sleep", impact_type.as_str());
        assert_eq!(&service.submit(&entry).unwrap().impact_type, impact_type);
    }
}

#[test]
fn sqlite_config_rows_drive_options_and_default_user() {
    let conn = open_db_in_memory().unwrap();
    conn.execute(
        "INSERT INTO config_properties (key, value) VALUES (?1, ?2), (?3, ?4);",
        params!["BEHAVIOR_CATEGORIES", "Sleeping, Work", "DEFAULT_USER", "sam"],
    )
    .unwrap();

    let service = EntryService::new(
        SqliteConfigStore::try_new(&conn).unwrap(),
        SqliteEntryLog::try_new(&conn).unwrap(),
    );
    assert_eq!(service.get_form_options().categories(), ["Sleeping", "Work"]);

    let entry = CandidateEntry::new("Napped", "Sleeping", "Neutral");
    let logged = service.submit(&entry).unwrap();
    assert_eq!(logged.user, "sam");

    let entry = CandidateEntry::new("Napped", "Sleeping", "Neutral").with_user("kit");
    assert_eq!(service.submit(&entry).unwrap().user, "kit");

    let exercise = CandidateEntry::new("Run", "Exercise", "Health");
    assert_eq!(service.submit(&exercise).unwrap_err().code(), "invalid_category");
}

#[test]
fn rejection_reasons_surface_one_to_one() {
    let service = EntryService::new(InMemoryConfigStore::new(), InMemoryEntryLog::new());
    let now_ms = 1_792_396_800_000;
    let cases = [
        (CandidateEntry::new(" ", "Work", "Neutral"), "empty_behavior", "behavior"),
        (CandidateEntry::new("x", "Sleeping", "Neutral"), "invalid_category", "category"),
        (CandidateEntry::new("x", "Work", "Mood"), "invalid_impact_type", "impactType"),
        (
            CandidateEntry::new("x", "Work", "Neutral").with_timestamp("soon"),
            "invalid_timestamp",
            "timestamp",
        ),
        (
            CandidateEntry::new("x", "Work", "Neutral").with_user("<script>"),
            "invalid_user",
            "user",
        ),
    ];

    for (entry, code, field) in cases {
        match service.submit_at(&entry, now_ms).unwrap_err() {
            SubmissionError::Rejected(reason) => {
                assert_eq!(reason.code(), code);
                assert_eq!(reason.field(), field);
            }
            other => panic!("expected rejection, got {other}"),
        }
    }
    assert!(service.log().is_empty());
}

#[test]
fn log_entry_serializes_with_boundary_field_names() {
    let service = EntryService::new(InMemoryConfigStore::new(), InMemoryEntryLog::new());
    let entry = run_entry().with_timestamp("1792396000000");
    let logged = service.submit_at(&entry, 1_792_396_800_000).unwrap();

    let json = serde_json::to_value(&logged).unwrap();
    assert_eq!(json["id"], 1);
    assert_eq!(json["impactType"], "Health");
    assert_eq!(json["timestamp"], 1_792_396_000_000_i64);
    assert!(json["recordedAt"].as_i64().unwrap() > 0);
}
