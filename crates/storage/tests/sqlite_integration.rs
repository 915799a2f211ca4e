use chrono::Duration;
use storage::repository::{SessionRecord, StorageError, TestSessionRepository};
use storage::sqlite::SqliteRepository;
use vision_core::model::{Eye, Session, TestKind, UserId};
use vision_core::time::fixed_now;
use vision_core::vision::acuity::{AcuityAnswer, VisualAcuity, letter_for_step};
use vision_core::vision::contrast::{ContrastAnswer, ContrastSensitivity};

async fn connect(name: &str) -> SqliteRepository {
    let url = format!("sqlite:file:{name}?mode=memory&cache=shared");
    let repo = SqliteRepository::connect(&url).await.expect("connect");
    repo.migrate().await.expect("migrate");
    repo
}

fn answer_correctly(session: &mut Session<VisualAcuity>) {
    let step = session.current_step();
    session
        .submit(
            AcuityAnswer {
                selected_option: letter_for_step(step).into(),
            },
            fixed_now(),
        )
        .unwrap();
}

#[tokio::test]
async fn sqlite_roundtrip_persists_eye_state_and_logs() {
    let repo = connect("memdb_roundtrip").await;

    let session: Session<VisualAcuity> = Session::new(UserId::new(1), Eye::Left, fixed_now());
    let id = repo
        .insert_session(&SessionRecord::from_session(&session).unwrap())
        .await
        .expect("insert");

    let mut loaded: Session<VisualAcuity> =
        repo.get_session(id).await.unwrap().into_session().unwrap();
    assert_eq!(loaded.id(), Some(id));
    answer_correctly(&mut loaded);
    answer_correctly(&mut loaded);

    let revision = repo
        .update_session(&SessionRecord::from_session(&loaded).unwrap())
        .await
        .expect("update");
    assert_eq!(revision, 1);

    let reloaded: Session<VisualAcuity> =
        repo.get_session(id).await.unwrap().into_session().unwrap();
    assert_eq!(reloaded.current_step(), 3);
    assert_eq!(reloaded.revision(), 1);
    assert_eq!(reloaded.logs(), loaded.logs());
    assert_eq!(reloaded.eye_result(Eye::Left), loaded.eye_result(Eye::Left));
}

#[tokio::test]
async fn sqlite_appends_only_new_log_rows() {
    let repo = connect("memdb_append").await;

    let session: Session<VisualAcuity> = Session::new(UserId::new(1), Eye::Left, fixed_now());
    let id = repo
        .insert_session(&SessionRecord::from_session(&session).unwrap())
        .await
        .unwrap();

    for expected_logs in 1..=3 {
        let mut loaded: Session<VisualAcuity> =
            repo.get_session(id).await.unwrap().into_session().unwrap();
        answer_correctly(&mut loaded);
        repo.update_session(&SessionRecord::from_session(&loaded).unwrap())
            .await
            .unwrap();

        let stored = repo.get_session(id).await.unwrap();
        assert_eq!(stored.logs.len(), expected_logs);
    }

    let stored = repo.get_session(id).await.unwrap();
    let steps: Vec<u32> = stored.logs.iter().map(|l| l.step).collect();
    assert_eq!(steps, vec![1, 2, 3]);
    assert_eq!(stored.revision, 3);
}

#[tokio::test]
async fn sqlite_rejects_stale_revision() {
    let repo = connect("memdb_conflict").await;

    let session: Session<VisualAcuity> = Session::new(UserId::new(1), Eye::Left, fixed_now());
    let id = repo
        .insert_session(&SessionRecord::from_session(&session).unwrap())
        .await
        .unwrap();

    let first = repo.get_session(id).await.unwrap();
    let second = first.clone();

    repo.update_session(&first).await.expect("first writer wins");
    let err = repo.update_session(&second).await.unwrap_err();
    assert!(matches!(err, StorageError::Conflict));
}

#[tokio::test]
async fn sqlite_missing_session_is_not_found() {
    let repo = connect("memdb_missing").await;
    let err = repo
        .get_session(vision_core::model::SessionId::new(404))
        .await
        .unwrap_err();
    assert!(matches!(err, StorageError::NotFound));
}

#[tokio::test]
async fn sqlite_latest_and_history_are_per_user_and_kind() {
    let repo = connect("memdb_latest").await;
    let user = UserId::new(7);

    let older: Session<VisualAcuity> = Session::new(user, Eye::Left, fixed_now());
    let older_id = repo
        .insert_session(&SessionRecord::from_session(&older).unwrap())
        .await
        .unwrap();
    let newer: Session<VisualAcuity> =
        Session::new(user, Eye::Right, fixed_now() + Duration::hours(1));
    let newer_id = repo
        .insert_session(&SessionRecord::from_session(&newer).unwrap())
        .await
        .unwrap();

    let contrast: Session<ContrastSensitivity> = Session::new(user, Eye::Left, fixed_now());
    repo.insert_session(&SessionRecord::from_session(&contrast).unwrap())
        .await
        .unwrap();
    let other_user: Session<VisualAcuity> =
        Session::new(UserId::new(8), Eye::Left, fixed_now() + Duration::hours(2));
    repo.insert_session(&SessionRecord::from_session(&other_user).unwrap())
        .await
        .unwrap();

    let latest = repo
        .latest_session(user, TestKind::VisualAcuity)
        .await
        .unwrap()
        .expect("latest");
    assert_eq!(latest.id, Some(newer_id));
    assert_eq!(latest.active_eye, Eye::Right);

    let history = repo
        .list_sessions(user, TestKind::VisualAcuity, 10)
        .await
        .unwrap();
    let ids: Vec<_> = history.iter().filter_map(|r| r.id).collect();
    assert_eq!(ids, vec![newer_id, older_id]);

    let limited = repo
        .list_sessions(user, TestKind::VisualAcuity, 1)
        .await
        .unwrap();
    assert_eq!(limited.len(), 1);

    assert!(
        repo.latest_session(user, TestKind::TumblingE)
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn sqlite_preserves_contrast_grid_snapshot() {
    let repo = connect("memdb_contrast").await;

    let mut session: Session<ContrastSensitivity> =
        Session::new(UserId::new(1), Eye::Left, fixed_now());
    let colors = vec![
        "#FF0000".to_string(),
        "#FF0000".to_string(),
        "#00FF00".to_string(),
        "#FF0000".to_string(),
    ];
    session
        .submit(
            ContrastAnswer {
                selected_index: 2,
                colors: colors.clone(),
            },
            fixed_now(),
        )
        .unwrap();

    let id = repo
        .insert_session(&SessionRecord::from_session(&session).unwrap())
        .await
        .unwrap();
    let loaded: Session<ContrastSensitivity> =
        repo.get_session(id).await.unwrap().into_session().unwrap();

    let log = &loaded.logs()[0];
    assert_eq!(log.entry.colors, colors);
    assert!(log.entry.correct);
}
