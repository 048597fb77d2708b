//! Integration tests for the schedule engine: find-or-create, the week read
//! model, template and day instantiation, and compensation on failure.

mod common;

use std::collections::HashSet;
use std::sync::atomic::Ordering;

use coachplan_core::engine::{InstantiationSource, InstantiationTarget};
use coachplan_core::error::{CopyStage, ScheduleError, ValidationError};
use coachplan_core::grouping::{ExerciseEntry, group_shape};
use coachplan_core::template::{create_template, parse_template_toml};
use coachplan_db::models::{BlockPosition, ExerciseDraft, GroupType};
use coachplan_db::queries::{blocks, days, exercises};
use coachplan_test_utils::TestDb;
use uuid::Uuid;

use common::{COACH, FlakyStore, STUDENT, block, engine_for, pg_engine, stretch, warmup, week};

const GROUPED_TEMPLATE: &str = r#"
[template]
name = "Upper A"
description = "push and pull"

[[exercises]]
name = "Bench press"
sets = 4
reps = "8"
group = "G1"
group_type = "bi-set"
group_rest_seconds = 120

[[exercises]]
name = "Bent-over row"
sets = 4
reps = "8"
group = "G1"
group_type = "bi-set"

[[exercises]]
name = "Face pull"
reps = "15"

[[blocks]]
name = "Rope"
position = "start"

[blocks.config]
type = "warmup"
activities = ["jump rope"]

[[blocks]]
name = "Cooldown"
position = "end"
order = 0

[blocks.config]
type = "stretch"
stretches = ["pecs"]
"#;

fn target(weekday: i32) -> InstantiationTarget {
    InstantiationTarget {
        student_id: STUDENT.to_owned(),
        coach_id: COACH.to_owned(),
        week: week(2024, 1, 1),
        weekday,
        order_in_day: 1,
    }
}

#[tokio::test]
async fn find_or_create_day_is_idempotent() {
    let db = TestDb::new().await;
    let engine = pg_engine(&db.pool);

    let first = engine
        .find_or_create_day(STUDENT, COACH, week(2024, 1, 3), 3, 1)
        .await
        .expect("create");
    let second = engine
        .find_or_create_day(STUDENT, COACH, week(2024, 1, 5), 3, 1)
        .await
        .expect("find");
    assert_eq!(first.id, second.id);
    assert_eq!(first.week_start, week(2024, 1, 1).start_date());

    let other_session = engine
        .find_or_create_day(STUDENT, COACH, week(2024, 1, 1), 3, 2)
        .await
        .expect("second session");
    assert_ne!(other_session.id, first.id);

    db.teardown().await;
}

#[tokio::test]
async fn concurrent_find_or_create_yields_one_day() {
    let db = TestDb::new().await;
    let engine = pg_engine(&db.pool);

    let (a, b) = tokio::join!(
        engine.find_or_create_day(STUDENT, COACH, week(2024, 1, 1), 2, 1),
        engine.find_or_create_day(STUDENT, COACH, week(2024, 1, 1), 2, 1),
    );
    assert_eq!(a.expect("first").id, b.expect("second").id);

    db.teardown().await;
}

#[tokio::test]
async fn weekday_out_of_range_is_rejected() {
    let db = TestDb::new().await;
    let engine = pg_engine(&db.pool);

    let err = engine
        .find_or_create_day(STUDENT, COACH, week(2024, 1, 1), 8, 1)
        .await
        .unwrap_err();
    assert!(matches!(err, ScheduleError::Validation(ValidationError::Weekday(8))));
    assert!(err.to_string().contains('8'));
    assert!(!err.is_retryable());

    let err = engine
        .find_or_create_day(STUDENT, COACH, week(2024, 1, 1), 1, 0)
        .await
        .unwrap_err();
    assert!(matches!(err, ScheduleError::Validation(ValidationError::OrderInDay(0))));

    let days = engine.load_week(STUDENT, COACH, week(2024, 1, 1)).await.unwrap();
    assert!(days.is_empty(), "nothing is written on validation failure");

    db.teardown().await;
}

#[tokio::test]
async fn template_instantiation_remaps_groups() {
    let db = TestDb::new().await;
    let engine = pg_engine(&db.pool);
    let draft = parse_template_toml(GROUPED_TEMPLATE).expect("parse");
    let template = create_template(&db.pool, COACH, &draft).await.expect("create template");

    let outcome = engine
        .instantiate(InstantiationSource::Template(template.id), &target(3))
        .await
        .expect("instantiate");

    assert_eq!(outcome.day.weekday, 3);
    assert_eq!(outcome.day.name.as_deref(), Some("Upper A"));
    assert_eq!(outcome.day.source_template_id, Some(template.id));
    assert_eq!(outcome.exercises.len(), 3);

    let by_name = |name: &str| outcome.exercises.iter().find(|e| e.name == name).unwrap();
    let bench = by_name("Bench press");
    let row = by_name("Bent-over row");
    let face_pull = by_name("Face pull");
    assert!(bench.group_id.is_some());
    assert_eq!(bench.group_id, row.group_id);
    assert_ne!(bench.group_id.as_deref(), Some("G1"));
    assert_eq!(bench.group_type, Some(GroupType::BiSet));
    assert_eq!(face_pull.group_id, None);
    assert_eq!(outcome.group_mapping.get("G1"), bench.group_id.as_ref());
    assert!(outcome.exercises.iter().all(|e| !e.completed));

    // Block without a usable order falls back to its list position.
    let cooldown = outcome.blocks.iter().find(|b| b.name == "Cooldown").unwrap();
    assert_eq!(cooldown.order, 2);

    let days = engine.load_week(STUDENT, COACH, week(2024, 1, 1)).await.unwrap();
    assert_eq!(days.len(), 1);
    let view = &days[0];
    assert_eq!(view.entries.len(), 2);
    let ExerciseEntry::Group(group) = &view.entries[0] else {
        panic!("first entry should be the bi-set, got {:?}", view.entries[0]);
    };
    assert_eq!(group.members.len(), 2);
    assert_eq!(group.members[0].name, "Bench press");
    assert_eq!(group.rest_seconds, Some(120));
    assert_eq!(view.blocks.start.len(), 1);
    assert_eq!(view.blocks.end.len(), 1);
    assert!(view.blocks.middle.is_empty());

    db.teardown().await;
}

#[tokio::test]
async fn instantiating_twice_replaces_content() {
    let db = TestDb::new().await;
    let engine = pg_engine(&db.pool);
    let draft = parse_template_toml(GROUPED_TEMPLATE).expect("parse");
    let template = create_template(&db.pool, COACH, &draft).await.expect("create template");
    let source = InstantiationSource::Template(template.id);

    let once = engine.instantiate(source, &target(5)).await.expect("first");
    let twice = engine.instantiate(source, &target(5)).await.expect("second");
    assert_eq!(once.day.id, twice.day.id);

    let ex = exercises::list_exercises_for_days(&db.pool, &[twice.day.id]).await.unwrap();
    let bl = blocks::list_blocks_for_days(&db.pool, &[twice.day.id]).await.unwrap();
    assert_eq!(ex.len(), 3);
    assert_eq!(bl.len(), 2);
    assert_eq!(group_shape(&ex), group_shape(&once.exercises));

    let content = |rows: &[coachplan_db::models::Exercise]| {
        let mut v: Vec<(String, i32, i32, String)> = rows
            .iter()
            .map(|e| (e.name.clone(), e.order, e.sets, e.reps.clone()))
            .collect();
        v.sort();
        v
    };
    assert_eq!(content(&ex), content(&once.exercises));

    db.teardown().await;
}

#[tokio::test]
async fn template_name_does_not_override_authored_day_name() {
    let db = TestDb::new().await;
    let engine = pg_engine(&db.pool);
    let draft = parse_template_toml(GROUPED_TEMPLATE).expect("parse");
    let template = create_template(&db.pool, COACH, &draft).await.expect("create template");

    let day = engine
        .find_or_create_day(STUDENT, COACH, week(2024, 1, 1), 1, 1)
        .await
        .unwrap();
    engine
        .store()
        .update_day_details(day.id, Some("Heavy Monday"), None, None)
        .await
        .unwrap();

    let outcome = engine
        .instantiate(InstantiationSource::Template(template.id), &target(1))
        .await
        .unwrap();
    assert_eq!(outcome.day.name.as_deref(), Some("Heavy Monday"));
    assert_eq!(outcome.day.description.as_deref(), Some("push and pull"));

    db.teardown().await;
}

#[tokio::test]
async fn day_instantiation_copies_prescription_not_progress() {
    let db = TestDb::new().await;
    let engine = pg_engine(&db.pool);

    let source = engine
        .find_or_create_day(STUDENT, COACH, week(2024, 1, 1), 2, 1)
        .await
        .unwrap();
    let authored = engine
        .author_day(
            source.id,
            &[
                ExerciseDraft::new("Squat", 1, 5, "5"),
                ExerciseDraft::new("Lunge", 2, 3, "10").grouped("S", GroupType::Superset, 1),
                ExerciseDraft::new("Step-up", 3, 3, "10").grouped("S", GroupType::Superset, 2),
            ],
            &[block("Hips", BlockPosition::Middle, Some(1), stretch())],
        )
        .await
        .expect("author");
    exercises::set_exercise_completed(&db.pool, authored.exercises[0].id, true)
        .await
        .unwrap();

    let mut next = target(2);
    next.week = week(2024, 1, 8);
    let outcome = engine
        .instantiate(InstantiationSource::Day(source.id), &next)
        .await
        .expect("copy day");

    assert_eq!(outcome.exercises.len(), 3);
    assert!(outcome.exercises.iter().all(|e| !e.completed));
    assert_eq!(outcome.blocks.len(), 1);
    assert_eq!(outcome.blocks[0].position, BlockPosition::Middle);
    let lunge = outcome.exercises.iter().find(|e| e.name == "Lunge").unwrap();
    assert_ne!(lunge.group_id.as_deref(), Some("S"));
    assert_eq!(group_shape(&outcome.exercises), vec![2]);

    // The source is untouched.
    let src = exercises::list_exercises_for_days(&db.pool, &[source.id]).await.unwrap();
    assert!(src.iter().any(|e| e.completed));
    assert!(src.iter().any(|e| e.group_id.as_deref() == Some("S")));

    db.teardown().await;
}

#[tokio::test]
async fn missing_template_is_not_found_and_writes_nothing() {
    let db = TestDb::new().await;
    let engine = pg_engine(&db.pool);

    let err = engine
        .instantiate(InstantiationSource::Template(Uuid::new_v4()), &target(4))
        .await
        .unwrap_err();
    assert!(matches!(err, ScheduleError::NotFound { entity: "template", .. }), "got: {err}");

    let days = engine.load_week(STUDENT, COACH, week(2024, 1, 1)).await.unwrap();
    assert!(days.is_empty());

    db.teardown().await;
}

#[tokio::test]
async fn authoring_rejects_oversized_groups() {
    let db = TestDb::new().await;
    let engine = pg_engine(&db.pool);
    let day = engine
        .find_or_create_day(STUDENT, COACH, week(2024, 1, 1), 1, 1)
        .await
        .unwrap();

    let err = engine
        .author_day(
            day.id,
            &[
                ExerciseDraft::new("A", 1, 3, "10").grouped("B", GroupType::BiSet, 1),
                ExerciseDraft::new("B", 2, 3, "10").grouped("B", GroupType::BiSet, 2),
                ExerciseDraft::new("C", 3, 3, "10").grouped("B", GroupType::BiSet, 3),
            ],
            &[],
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ScheduleError::Validation(ValidationError::GroupTooLarge { max: 2, actual: 3, .. })
    ));

    db.teardown().await;
}

#[tokio::test]
async fn block_failure_is_compensated() {
    let db = TestDb::new().await;
    let store = FlakyStore::new(&db.pool);
    let engine = engine_for(store.clone());

    let day = engine
        .find_or_create_day(STUDENT, COACH, week(2024, 1, 1), 4, 1)
        .await
        .unwrap();
    engine
        .author_day(
            day.id,
            &[ExerciseDraft::new("Old", 1, 3, "10")],
            &[block("Old warmup", BlockPosition::Start, Some(1), warmup())],
        )
        .await
        .expect("initial content");

    store.fail_block_inserts.store(true, Ordering::SeqCst);
    let err = engine
        .author_day(
            day.id,
            &[ExerciseDraft::new("New", 1, 3, "10")],
            &[block("New warmup", BlockPosition::Start, Some(1), warmup())],
        )
        .await
        .unwrap_err();

    match &err {
        ScheduleError::PartialCopy {
            day_id,
            stage,
            compensated,
            ..
        } => {
            assert_eq!(*day_id, day.id);
            assert_eq!(*stage, CopyStage::Blocks);
            assert!(*compensated);
        }
        other => panic!("expected PartialCopy, got {other:?}"),
    }
    assert!(err.is_retryable());

    // Neither half of the new content is left behind.
    let view = engine.load_day(day.id).await.unwrap();
    assert_eq!(view.exercises().count(), 0);
    assert!(view.blocks.is_empty());

    // The retry succeeds once the store recovers.
    store.fail_block_inserts.store(false, Ordering::SeqCst);
    engine
        .author_day(
            day.id,
            &[ExerciseDraft::new("New", 1, 3, "10")],
            &[block("New warmup", BlockPosition::Start, Some(1), warmup())],
        )
        .await
        .expect("retry");
    let view = engine.load_day(day.id).await.unwrap();
    let names: HashSet<&str> = view.exercises().map(|e| e.name.as_str()).collect();
    assert_eq!(names, HashSet::from(["New"]));
    assert_eq!(view.blocks.len(), 1);

    db.teardown().await;
}

#[tokio::test]
async fn failed_details_update_leaves_target_content_untouched() {
    let db = TestDb::new().await;
    let store = FlakyStore::new(&db.pool);
    let engine = engine_for(store.clone());

    let source = engine
        .find_or_create_day(STUDENT, COACH, week(2024, 1, 1), 1, 1)
        .await
        .unwrap();
    engine
        .author_day(source.id, &[ExerciseDraft::new("Bench", 1, 4, "6")], &[])
        .await
        .expect("author source");
    days::update_day_details(&db.pool, source.id, Some("Upper"), None, None)
        .await
        .unwrap();

    let mut next = target(1);
    next.week = week(2024, 1, 8);
    let dest = engine
        .find_or_create_day(STUDENT, COACH, next.week, 1, 1)
        .await
        .unwrap();
    engine
        .author_day(dest.id, &[ExerciseDraft::new("Squat", 1, 5, "5")], &[])
        .await
        .expect("author target");

    store.fail_day_details.store(true, Ordering::SeqCst);
    let err = engine
        .instantiate(InstantiationSource::Day(source.id), &next)
        .await
        .unwrap_err();
    assert!(matches!(err, ScheduleError::RemoteSync { .. }), "got {err:?}");
    assert!(err.is_retryable());

    let view = engine.load_day(dest.id).await.unwrap();
    let names: Vec<&str> = view.exercises().map(|e| e.name.as_str()).collect();
    assert_eq!(names, ["Squat"]);
    assert_eq!(view.day.name, None);

    store.fail_day_details.store(false, Ordering::SeqCst);
    let outcome = engine
        .instantiate(InstantiationSource::Day(source.id), &next)
        .await
        .expect("retry");
    assert_eq!(outcome.day.id, dest.id);
    assert_eq!(outcome.day.name.as_deref(), Some("Upper"));
    let view = engine.load_day(dest.id).await.unwrap();
    let names: Vec<&str> = view.exercises().map(|e| e.name.as_str()).collect();
    assert_eq!(names, ["Bench"]);

    db.teardown().await;
}
