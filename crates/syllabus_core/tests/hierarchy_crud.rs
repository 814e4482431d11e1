use rusqlite::Connection;
use syllabus_core::db::open_db_in_memory;
use syllabus_core::repo::node_repo::NewNode;
use syllabus_core::{
    Actor, ErrorKind, HierarchyLevel, HierarchyNode, HierarchyRepository, HierarchyService,
    HierarchyServiceError, MoveDirection, NodeChanges, NodeDraft, NodeField, RepoError, Role,
    SqliteHierarchyRepository, DELETE_BLOCKED_MESSAGE,
};
use uuid::Uuid;

fn service(conn: &Connection) -> HierarchyService<SqliteHierarchyRepository<'_>> {
    HierarchyService::new(SqliteHierarchyRepository::try_new(conn).unwrap())
}

fn teacher() -> Actor {
    Actor::new(Uuid::new_v4(), Role::Teacher)
}

fn draft(parent_id: Option<Uuid>, name: &str) -> NodeDraft {
    NodeDraft {
        parent_id,
        name: name.to_string(),
        slug: None,
    }
}

fn names(nodes: &[HierarchyNode]) -> Vec<&str> {
    nodes.iter().map(|node| node.name.as_str()).collect()
}

/// Seeds exam -> subject and returns the subject id.
fn seed_subject(service: &HierarchyService<SqliteHierarchyRepository<'_>>) -> Uuid {
    let actor = teacher();
    let exam = service
        .create_node(&actor, HierarchyLevel::Exam, draft(None, "JEE Advanced"))
        .unwrap();
    service
        .create_node(
            &actor,
            HierarchyLevel::Subject,
            draft(Some(exam.id), "Physics"),
        )
        .unwrap()
        .id
}

#[test]
fn create_derives_slug_and_appends_position() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);
    let actor = teacher();
    let subject_id = seed_subject(&service);

    for name in ["Kinematics", "Optics", "Waves"] {
        service
            .create_node(&actor, HierarchyLevel::Chapter, draft(Some(subject_id), name))
            .unwrap();
    }
    let created = service
        .create_node(
            &actor,
            HierarchyLevel::Chapter,
            draft(Some(subject_id), "Thermodynamics"),
        )
        .unwrap();

    assert_eq!(created.slug, "thermodynamics");
    assert_eq!(created.position, 3);
    assert_eq!(created.parent_id, Some(subject_id));
    assert!(created.created_at > 0);

    let listed = service
        .list_children(HierarchyLevel::Chapter, Some(subject_id))
        .unwrap();
    assert_eq!(
        names(&listed),
        vec!["Kinematics", "Optics", "Waves", "Thermodynamics"]
    );
}

#[test]
fn explicit_slug_is_kept_and_name_is_trimmed() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);
    let exam = service
        .create_node(
            &teacher(),
            HierarchyLevel::Exam,
            NodeDraft {
                parent_id: None,
                name: "  NEET UG  ".to_string(),
                slug: Some("neet".to_string()),
            },
        )
        .unwrap();

    assert_eq!(exam.name, "NEET UG");
    assert_eq!(exam.slug, "neet");
    assert_eq!(exam.position, 0);
}

#[test]
fn create_rejects_taken_slug_before_writing() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);
    let actor = teacher();
    service
        .create_node(&actor, HierarchyLevel::Exam, draft(None, "JEE Main"))
        .unwrap();

    let err = service
        .create_node(&actor, HierarchyLevel::Exam, draft(None, "JEE main"))
        .unwrap_err();
    assert!(matches!(err, HierarchyServiceError::SlugTaken { ref slug, .. } if slug == "jee-main"));
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert_eq!(err.field(), Some(NodeField::Slug));
    assert_eq!(service.list_children(HierarchyLevel::Exam, None).unwrap().len(), 1);
}

#[test]
fn same_slug_is_allowed_in_different_levels() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);
    let actor = teacher();
    let exam = service
        .create_node(&actor, HierarchyLevel::Exam, draft(None, "Physics"))
        .unwrap();
    let subject = service
        .create_node(&actor, HierarchyLevel::Subject, draft(Some(exam.id), "Physics"))
        .unwrap();
    assert_eq!(exam.slug, subject.slug);
}

#[test]
fn repository_maps_unique_violation_to_slug_taken() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteHierarchyRepository::try_new(&conn).unwrap();
    let node = NewNode {
        parent_id: None,
        name: "JEE".to_string(),
        slug: "jee".to_string(),
        position: 0,
    };
    repo.create_node(HierarchyLevel::Exam, &node).unwrap();

    let err = repo.create_node(HierarchyLevel::Exam, &node).unwrap_err();
    assert!(matches!(err, RepoError::SlugTaken { level: HierarchyLevel::Exam, .. }));
}

#[test]
fn create_validates_fields_and_parent() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);
    let actor = teacher();

    let blank = service
        .create_node(&actor, HierarchyLevel::Exam, draft(None, "   "))
        .unwrap_err();
    assert_eq!(blank.kind(), ErrorKind::Validation);
    assert_eq!(blank.field(), Some(NodeField::Name));

    let symbols = service
        .create_node(&actor, HierarchyLevel::Exam, draft(None, "!!"))
        .unwrap_err();
    assert_eq!(symbols.field(), Some(NodeField::Slug));

    let orphan = service
        .create_node(&actor, HierarchyLevel::Topic, draft(None, "Lenses"))
        .unwrap_err();
    assert_eq!(orphan.field(), Some(NodeField::Parent));

    let missing_parent = service
        .create_node(
            &actor,
            HierarchyLevel::Topic,
            draft(Some(Uuid::new_v4()), "Lenses"),
        )
        .unwrap_err();
    assert!(matches!(
        missing_parent,
        HierarchyServiceError::ParentNotFound {
            level: HierarchyLevel::Chapter,
            ..
        }
    ));
}

#[test]
fn unprivileged_actor_cannot_mutate() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);
    let student = Actor::new(Uuid::new_v4(), Role::parse("student"));

    let err = service
        .create_node(&student, HierarchyLevel::Exam, draft(None, "JEE"))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Authorization);
    assert!(service.list_children(HierarchyLevel::Exam, None).unwrap().is_empty());
}

#[test]
fn update_keeps_own_slug_and_rejects_foreign_slug() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);
    let actor = teacher();
    let subject_id = seed_subject(&service);
    let optics = service
        .create_node(&actor, HierarchyLevel::Chapter, draft(Some(subject_id), "Optics"))
        .unwrap();
    service
        .create_node(&actor, HierarchyLevel::Chapter, draft(Some(subject_id), "Waves"))
        .unwrap();

    let renamed = service
        .update_node(
            &actor,
            HierarchyLevel::Chapter,
            optics.id,
            NodeChanges {
                name: "Ray Optics".to_string(),
                slug: "optics".to_string(),
            },
        )
        .unwrap();
    assert_eq!(renamed.name, "Ray Optics");
    assert_eq!(renamed.slug, "optics");
    assert_eq!(renamed.position, optics.position);

    let err = service
        .update_node(
            &actor,
            HierarchyLevel::Chapter,
            optics.id,
            NodeChanges {
                name: "Ray Optics".to_string(),
                slug: "waves".to_string(),
            },
        )
        .unwrap_err();
    assert!(matches!(err, HierarchyServiceError::SlugTaken { .. }));

    let missing = service
        .update_node(
            &actor,
            HierarchyLevel::Chapter,
            Uuid::new_v4(),
            NodeChanges {
                name: "Ghost".to_string(),
                slug: "ghost".to_string(),
            },
        )
        .unwrap_err();
    assert_eq!(missing.kind(), ErrorKind::NotFound);
}

#[test]
fn slug_availability_ignores_excluded_row() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);
    let exam = service
        .create_node(&teacher(), HierarchyLevel::Exam, draft(None, "JEE"))
        .unwrap();

    assert!(!service
        .is_slug_available(HierarchyLevel::Exam, "jee", None)
        .unwrap());
    assert!(service
        .is_slug_available(HierarchyLevel::Exam, "jee", Some(exam.id))
        .unwrap());
    assert!(service
        .is_slug_available(HierarchyLevel::Subject, "jee", None)
        .unwrap());
}

#[test]
fn delete_is_blocked_while_children_exist() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);
    let actor = teacher();
    let subject_id = seed_subject(&service);
    let chapter = service
        .create_node(&actor, HierarchyLevel::Chapter, draft(Some(subject_id), "Optics"))
        .unwrap();

    assert_eq!(service.child_count(HierarchyLevel::Subject, subject_id).unwrap(), 1);
    let err = service
        .delete_node(&actor, HierarchyLevel::Subject, subject_id)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::HasChildren);
    assert_eq!(err.user_message(), DELETE_BLOCKED_MESSAGE);
    assert!(service.get_node(HierarchyLevel::Subject, subject_id).is_ok());

    service
        .delete_node(&actor, HierarchyLevel::Chapter, chapter.id)
        .unwrap();
    service
        .delete_node(&actor, HierarchyLevel::Subject, subject_id)
        .unwrap();
    let gone = service
        .get_node(HierarchyLevel::Subject, subject_id)
        .unwrap_err();
    assert_eq!(gone.kind(), ErrorKind::NotFound);
}

#[test]
fn repository_delete_refuses_rows_with_children() {
    let conn = open_db_in_memory().unwrap();
    let subject_id = seed_subject(&service(&conn));
    let repo = SqliteHierarchyRepository::try_new(&conn).unwrap();
    repo.create_node(
        HierarchyLevel::Chapter,
        &NewNode {
            parent_id: Some(subject_id),
            name: "Optics".to_string(),
            slug: "optics".to_string(),
            position: 0,
        },
    )
    .unwrap();

    let err = repo
        .delete_node(HierarchyLevel::Subject, subject_id)
        .unwrap_err();
    assert!(matches!(err, RepoError::HasChildren { child_count: 1, .. }));
}

#[test]
fn move_swaps_with_neighbor_and_is_noop_at_edges() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);
    let actor = teacher();
    let subject_id = seed_subject(&service);
    let mut ids = Vec::new();
    for name in ["Kinematics", "Optics", "Waves"] {
        ids.push(
            service
                .create_node(&actor, HierarchyLevel::Chapter, draft(Some(subject_id), name))
                .unwrap()
                .id,
        );
    }

    let moved = service
        .move_node(&actor, HierarchyLevel::Chapter, ids[1], MoveDirection::Up)
        .unwrap();
    assert_eq!(names(&moved), vec!["Optics", "Kinematics", "Waves"]);

    let top = service
        .move_node(&actor, HierarchyLevel::Chapter, ids[1], MoveDirection::Up)
        .unwrap();
    assert_eq!(names(&top), vec!["Optics", "Kinematics", "Waves"]);

    let bottom = service
        .move_node(&actor, HierarchyLevel::Chapter, ids[2], MoveDirection::Down)
        .unwrap();
    assert_eq!(names(&bottom), vec!["Optics", "Kinematics", "Waves"]);
}

#[test]
fn move_resequences_tied_positions_first() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);
    let actor = teacher();
    let subject_id = seed_subject(&service);
    let mut ids = Vec::new();
    for name in ["Kinematics", "Optics", "Waves"] {
        ids.push(
            service
                .create_node(&actor, HierarchyLevel::Chapter, draft(Some(subject_id), name))
                .unwrap()
                .id,
        );
    }
    conn.execute("UPDATE chapters SET position = 0;", []).unwrap();

    let moved = service
        .move_node(&actor, HierarchyLevel::Chapter, ids[2], MoveDirection::Up)
        .unwrap();
    assert_eq!(names(&moved), vec!["Kinematics", "Waves", "Optics"]);
    let positions: Vec<i64> = moved.iter().map(|node| node.position).collect();
    assert_eq!(positions, vec![0, 1, 2]);
}

#[test]
fn stale_swap_is_reported_as_conflict() {
    let conn = open_db_in_memory().unwrap();
    let subject_id = seed_subject(&service(&conn));
    let repo = SqliteHierarchyRepository::try_new(&conn).unwrap();
    let mut ids = Vec::new();
    for (position, name) in ["Kinematics", "Optics"].into_iter().enumerate() {
        ids.push(
            repo.create_node(
                HierarchyLevel::Chapter,
                &NewNode {
                    parent_id: Some(subject_id),
                    name: name.to_string(),
                    slug: name.to_lowercase(),
                    position: position as i64,
                },
            )
            .unwrap()
            .id,
        );
    }

    let swap = syllabus_core::PositionSwap {
        moving_id: ids[1],
        moving_position: 5,
        neighbor_id: ids[0],
        neighbor_position: 0,
    };
    let err = repo
        .swap_positions(HierarchyLevel::Chapter, &swap)
        .unwrap_err();
    assert!(matches!(err, RepoError::PositionConflict { .. }));

    let listed = repo
        .list_children(HierarchyLevel::Chapter, Some(subject_id))
        .unwrap();
    assert_eq!(names(&listed), vec!["Kinematics", "Optics"]);
}

#[test]
fn list_page_reports_totals() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);
    let actor = teacher();
    for index in 0..12 {
        service
            .create_node(
                &actor,
                HierarchyLevel::Exam,
                draft(None, &format!("Exam {index:02}")),
            )
            .unwrap();
    }

    let first = service
        .list_page(HierarchyLevel::Exam, None, None, None)
        .unwrap();
    assert_eq!(first.items.len(), 10);
    assert_eq!(first.pagination.total, 12);
    assert_eq!(first.pagination.pages, 2);

    let second = service
        .list_page(HierarchyLevel::Exam, None, Some(2), Some(10))
        .unwrap();
    assert_eq!(names(&second.items), vec!["Exam 10", "Exam 11"]);
}

#[test]
fn resequence_children_renumbers_in_display_order() {
    let conn = open_db_in_memory().unwrap();
    let subject_id = seed_subject(&service(&conn));
    let repo = SqliteHierarchyRepository::try_new(&conn).unwrap();
    for (position, name) in [(7, "Kinematics"), (7, "Optics"), (12, "Waves")] {
        repo.create_node(
            HierarchyLevel::Chapter,
            &NewNode {
                parent_id: Some(subject_id),
                name: name.to_string(),
                slug: name.to_lowercase(),
                position,
            },
        )
        .unwrap();
    }

    repo.resequence_children(HierarchyLevel::Chapter, Some(subject_id))
        .unwrap();

    let listed = repo
        .list_children(HierarchyLevel::Chapter, Some(subject_id))
        .unwrap();
    assert_eq!(names(&listed), vec!["Kinematics", "Optics", "Waves"]);
    let positions: Vec<i64> = listed.iter().map(|node| node.position).collect();
    assert_eq!(positions, vec![0, 1, 2]);
}
