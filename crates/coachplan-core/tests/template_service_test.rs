//! Integration tests for storing, exporting and applying templates.

mod common;

use coachplan_core::engine::{InstantiationSource, InstantiationTarget};
use coachplan_core::grouping::group_shape;
use coachplan_core::template::{
    create_template, delete_template, get_template_detail, list_templates, parse_template_toml,
    render_template_toml,
};
use coachplan_db::models::{BlockPosition, GroupType};
use coachplan_test_utils::TestDb;

use common::{COACH, STUDENT, pg_engine, week};

const TEMPLATE: &str = r#"
[template]
name = "Lower B"
category = "strength"

[[exercises]]
name = "Front squat"
sets = 5
reps = "3"
load = "80%"

[[exercises]]
name = "Nordic curl"
reps = "6"
group = "H"
group_type = "superset"
group_rest_seconds = 90

[[exercises]]
name = "Copenhagen plank"
reps = "20s"
group = "H"
group_type = "superset"

[[blocks]]
name = "Intervals"
position = "end"
estimated_minutes = 12

[blocks.config]
type = "cardio"
modality = "bike"
intervals = 6
"#;

#[tokio::test]
async fn stored_template_exports_to_equivalent_toml() {
    let db = TestDb::new().await;
    let draft = parse_template_toml(TEMPLATE).unwrap();
    let template = create_template(&db.pool, COACH, &draft).await.unwrap();

    let detail = get_template_detail(&db.pool, template.id).await.unwrap();
    assert_eq!(detail.template.category.as_deref(), Some("strength"));
    assert_eq!(detail.exercises.len(), 3);
    assert_eq!(detail.blocks.len(), 1);

    let rendered = render_template_toml(&detail).unwrap();
    assert!(rendered.contains(&template.id.to_string()));
    let reparsed = parse_template_toml(&rendered).expect("exported template parses");
    assert_eq!(reparsed.name, draft.name);
    assert_eq!(reparsed.exercises, draft.exercises);
    assert_eq!(reparsed.blocks, draft.blocks);

    db.teardown().await;
}

#[tokio::test]
async fn templates_are_listed_per_coach_and_deletable() {
    let db = TestDb::new().await;
    let draft = parse_template_toml(TEMPLATE).unwrap();
    let mine = create_template(&db.pool, COACH, &draft).await.unwrap();
    create_template(&db.pool, "coach-2", &draft).await.unwrap();

    let listed = list_templates(&db.pool, COACH).await.unwrap();
    assert_eq!(listed.iter().map(|t| t.id).collect::<Vec<_>>(), vec![mine.id]);

    assert!(delete_template(&db.pool, mine.id).await.unwrap());
    assert!(!delete_template(&db.pool, mine.id).await.unwrap());
    assert!(list_templates(&db.pool, COACH).await.unwrap().is_empty());
    assert!(get_template_detail(&db.pool, mine.id).await.is_err());

    db.teardown().await;
}

#[tokio::test]
async fn applied_template_survives_template_deletion() {
    let db = TestDb::new().await;
    let engine = pg_engine(&db.pool);
    let draft = parse_template_toml(TEMPLATE).unwrap();
    let template = create_template(&db.pool, COACH, &draft).await.unwrap();

    let outcome = engine
        .instantiate(
            InstantiationSource::Template(template.id),
            &InstantiationTarget {
                student_id: STUDENT.to_owned(),
                coach_id: COACH.to_owned(),
                week: week(2024, 4, 1),
                weekday: 6,
                order_in_day: 1,
            },
        )
        .await
        .unwrap();
    assert_eq!(group_shape(&outcome.exercises), vec![2]);
    assert!(
        outcome
            .exercises
            .iter()
            .filter(|e| e.group_id.is_some())
            .all(|e| e.group_type == Some(GroupType::Superset))
    );
    assert_eq!(outcome.blocks[0].position, BlockPosition::End);
    assert_eq!(outcome.blocks[0].order, 1);

    delete_template(&db.pool, template.id).await.unwrap();

    let view = engine.load_day(outcome.day.id).await.unwrap();
    assert_eq!(view.exercises().count(), 3);
    assert_eq!(view.blocks.end.len(), 1);

    db.teardown().await;
}
