use super::common::*;
use chrono::Duration;

use crate::academics::domain::{ExamId, ExamStatus, ExamType, NewExam, SubjectId};
use crate::academics::error::AcademicError;
use crate::academics::lifecycle::{ExamTransition, InvalidStateTransition};

#[test]
fn status_chain_only_moves_forward() {
    assert_eq!(
        ExamStatus::Draft.apply(ExamTransition::Activate),
        Ok(ExamStatus::Active)
    );
    assert_eq!(
        ExamStatus::Active.apply(ExamTransition::Lock),
        Ok(ExamStatus::Locked)
    );
    assert_eq!(
        ExamStatus::Locked.apply(ExamTransition::Publish),
        Ok(ExamStatus::Published)
    );

    for transition in [
        ExamTransition::Activate,
        ExamTransition::Lock,
        ExamTransition::Publish,
    ] {
        assert!(ExamStatus::Published.apply(transition).is_err());
    }
    assert!(ExamStatus::Active.apply(ExamTransition::Activate).is_err());
    assert!(ExamStatus::Draft.apply(ExamTransition::Lock).is_err());
    assert!(ExamStatus::Published.is_terminal());
}

#[test]
fn mark_update_permissions_follow_status() {
    assert!(ExamStatus::Active.accepts_mark_updates(false));
    assert!(!ExamStatus::Locked.accepts_mark_updates(false));
    assert!(ExamStatus::Locked.accepts_mark_updates(true));
    assert!(!ExamStatus::Published.accepts_mark_updates(true));

    assert!(ExamStatus::Active.accepts_new_marks());
    assert!(!ExamStatus::Locked.accepts_new_marks());
    assert!(ExamStatus::Draft.accepts_questions());
    assert!(!ExamStatus::Active.accepts_questions());
}

#[test]
fn invalid_transition_message_names_required_state() {
    let err = InvalidStateTransition {
        from: ExamStatus::Draft,
        transition: ExamTransition::Publish,
    };
    assert_eq!(
        err.to_string(),
        "cannot publish an exam in DRAFT state (requires LOCKED)"
    );
}

#[test]
fn create_exam_starts_in_draft() {
    let fixture = fixture();
    let exam = draft_exam(&fixture, SUBJECT, ExamType::Internal1);

    assert_eq!(exam.status, ExamStatus::Draft);
    assert_eq!(exam.created_at, start_of_term());
    assert!(exam.activated_at.is_none());
}

#[test]
fn create_exam_rejects_unknown_subject_and_bad_totals() {
    let fixture = fixture();

    let unknown = fixture.services.exams.create_exam(NewExam {
        subject_id: SubjectId::new("sub-missing"),
        name: "Mid term".to_string(),
        exam_type: ExamType::Internal1,
        total_marks: 50.0,
        duration_minutes: 60,
    });
    match unknown {
        Err(AcademicError::EntityNotFound { entity, .. }) => assert_eq!(entity, "subject"),
        other => panic!("expected missing subject, got {other:?}"),
    }

    let zero_total = fixture.services.exams.create_exam(NewExam {
        subject_id: SubjectId::new(SUBJECT),
        name: "Mid term".to_string(),
        exam_type: ExamType::Internal1,
        total_marks: 0.0,
        duration_minutes: 60,
    });
    match zero_total {
        Err(AcademicError::Validation { field, .. }) => assert_eq!(field, "total_marks"),
        other => panic!("expected total marks validation, got {other:?}"),
    }
}

#[test]
fn publish_on_draft_is_rejected() {
    let fixture = fixture();
    let exam = draft_exam(&fixture, SUBJECT, ExamType::External);

    match fixture.services.exams.publish(&exam.id) {
        Err(AcademicError::InvalidStateTransition(InvalidStateTransition {
            from: ExamStatus::Draft,
            transition: ExamTransition::Publish,
        })) => {}
        other => panic!("expected invalid transition, got {other:?}"),
    }

    let stored = fixture.services.exams.get(&exam.id).expect("exam present");
    assert_eq!(stored.status, ExamStatus::Draft);
}

#[test]
fn full_lifecycle_stamps_each_transition() {
    let fixture = fixture();
    let (exam, _) = active_exam(
        &fixture,
        SUBJECT,
        ExamType::Internal1,
        vec![question(1, 10.0, true, &[(CO1, 100.0)])],
    );
    assert_eq!(exam.activated_at, Some(start_of_term()));

    fixture.clock.advance(Duration::days(2));
    let locked = fixture.services.exams.lock(&exam.id).expect("lock");
    assert_eq!(locked.status, ExamStatus::Locked);

    fixture.clock.advance(Duration::days(1));
    let published = fixture.services.exams.publish(&exam.id).expect("publish");
    assert_eq!(published.status, ExamStatus::Published);
    assert_eq!(
        published.locked_at,
        Some(start_of_term() + Duration::days(2))
    );
    assert_eq!(
        published.published_at,
        Some(start_of_term() + Duration::days(3))
    );

    match fixture.services.exams.activate(&exam.id) {
        Err(AcademicError::InvalidStateTransition(err)) => {
            assert_eq!(err.from, ExamStatus::Published)
        }
        other => panic!("published exams cannot move, got {other:?}"),
    }
}

#[test]
fn questions_are_frozen_after_activation() {
    let fixture = fixture();
    let (exam, _) = active_exam(
        &fixture,
        SUBJECT,
        ExamType::Internal1,
        vec![question(1, 10.0, true, &[(CO1, 100.0)])],
    );

    match fixture
        .services
        .exams
        .add_question(&exam.id, question(2, 5.0, true, &[(CO1, 100.0)]))
    {
        Err(AcademicError::BusinessRuleViolation(message)) => {
            assert!(message.contains("DRAFT"), "unexpected message: {message}")
        }
        other => panic!("expected business rule violation, got {other:?}"),
    }
}

#[test]
fn add_question_validates_numbers_and_outcome_weights() {
    let fixture = fixture();
    seed_subject(
        &fixture.store,
        "sub-os",
        "CS302",
        None,
        Default::default(),
    );
    seed_outcome(&fixture.store, "co-os-1", "sub-os", "CO1", 70.0);
    let exam = draft_exam(&fixture, SUBJECT, ExamType::Internal2);

    fixture
        .services
        .exams
        .add_question(&exam.id, question(1, 10.0, true, &[(CO1, 60.0), (CO2, 40.0)]))
        .expect("first question");

    match fixture
        .services
        .exams
        .add_question(&exam.id, question(1, 5.0, true, &[(CO1, 100.0)]))
    {
        Err(AcademicError::Validation { field, .. }) => assert_eq!(field, "number"),
        other => panic!("expected duplicate number rejection, got {other:?}"),
    }

    match fixture
        .services
        .exams
        .add_question(&exam.id, question(2, 5.0, true, &[("co-os-1", 100.0)]))
    {
        Err(AcademicError::Validation { field, .. }) => assert_eq!(field, "co_weights"),
        other => panic!("expected foreign outcome rejection, got {other:?}"),
    }

    match fixture
        .services
        .exams
        .add_question(&exam.id, question(3, 5.0, true, &[(CO1, 120.0)]))
    {
        Err(AcademicError::Validation { field, .. }) => assert_eq!(field, "co_weights"),
        other => panic!("expected out of range weight, got {other:?}"),
    }

    match fixture
        .services
        .exams
        .add_question(&exam.id, question(4, 0.0, true, &[]))
    {
        Err(AcademicError::Validation { field, .. }) => assert_eq!(field, "max_marks"),
        other => panic!("expected max marks validation, got {other:?}"),
    }

    let questions = fixture.services.exams.questions(&exam.id).expect("list");
    assert_eq!(questions.len(), 1);
}

#[test]
fn delete_removes_unmarked_exams_only() {
    let fixture = fixture();
    let draft = draft_exam(&fixture, SUBJECT, ExamType::Assignment);
    fixture.services.exams.delete(&draft.id).expect("delete draft");
    assert!(matches!(
        fixture.services.exams.get(&draft.id),
        Err(AcademicError::EntityNotFound { .. })
    ));

    let marked = scored_exam(
        &fixture,
        SUBJECT,
        ExamType::Internal1,
        CO1,
        &[(STUDENT_A, 55.0)],
    );
    match fixture.services.exams.delete(&marked.id) {
        Err(AcademicError::BusinessRuleViolation(_)) => {}
        other => panic!("marked exams must survive, got {other:?}"),
    }
}

#[test]
fn unknown_exam_reports_not_found() {
    let fixture = fixture();
    match fixture.services.exams.lock(&ExamId::new("exam-missing")) {
        Err(AcademicError::EntityNotFound { entity, id }) => {
            assert_eq!(entity, "exam");
            assert_eq!(id, "exam-missing");
        }
        other => panic!("expected not found, got {other:?}"),
    }
}
