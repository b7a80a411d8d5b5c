use chrono::Duration;
use practice_core::model::{Achievement, DetectionMode, Pose, Progress, Session, UserId};
use practice_core::time::fixed_now;
use storage::repository::{ProgressRepository, StorageError};
use storage::sqlite::SqliteRepository;

fn build_session(pose: Pose, secs: i64, hold: f64, accuracy: f64) -> Session {
    let now = fixed_now();
    Session::new(
        pose,
        now,
        now + Duration::seconds(secs),
        hold,
        accuracy,
        1,
        DetectionMode::Local,
    )
    .unwrap()
}

#[tokio::test]
async fn sqlite_roundtrip_preserves_aggregate() {
    let repo = SqliteRepository::connect("sqlite:file:memdb_roundtrip?mode=memory&cache=shared")
        .await
        .expect("connect");
    repo.migrate().await.expect("migrate");

    let now = fixed_now();
    let mut progress = Progress::new(UserId::new(1), now);
    progress.add_session(build_session(Pose::Tree, 20, 21.0, 98.0), now);
    progress.add_session(build_session(Pose::Cobra, 30, 4.5, 71.0), now);
    progress.add_achievement(Achievement::new(
        "first_perfect",
        "First Perfect Pose",
        "Achieved your first perfect pose",
        now,
    ));

    let version = repo.save_progress(&progress, None).await.unwrap();
    assert_eq!(version, 1);

    let fetched = repo
        .get_progress(UserId::new(1))
        .await
        .expect("fetch")
        .expect("present");
    assert_eq!(fetched.version, 1);
    assert_eq!(fetched.progress, progress);
    assert_eq!(fetched.progress.pose_stat(Pose::Tree).attempts, 1);
    assert_eq!(fetched.progress.achievements().len(), 1);
}

#[tokio::test]
async fn sqlite_rejects_stale_writes() {
    let repo = SqliteRepository::connect("sqlite:file:memdb_conflict?mode=memory&cache=shared")
        .await
        .expect("connect");
    repo.migrate().await.expect("migrate");

    let now = fixed_now();
    let mut progress = Progress::new(UserId::new(2), now);
    assert_eq!(repo.save_progress(&progress, None).await.unwrap(), 1);
    assert!(matches!(
        repo.save_progress(&progress, None).await,
        Err(StorageError::Conflict)
    ));

    progress.add_session(build_session(Pose::Dog, 10, 3.0, 85.0), now);
    assert_eq!(repo.save_progress(&progress, Some(1)).await.unwrap(), 2);

    // A writer that loaded version 1 before the save above loses.
    assert!(matches!(
        repo.save_progress(&progress, Some(1)).await,
        Err(StorageError::Conflict)
    ));

    let stored = repo.get_progress(UserId::new(2)).await.unwrap().unwrap();
    assert_eq!(stored.version, 2);
    assert_eq!(stored.progress.total_sessions(), 1);
}

#[tokio::test]
async fn sqlite_lists_and_deletes_users() {
    let repo = SqliteRepository::connect("sqlite:file:memdb_delete?mode=memory&cache=shared")
        .await
        .expect("connect");
    repo.migrate().await.expect("migrate");
    // Running migrations twice is a no-op.
    repo.migrate().await.expect("migrate again");

    let now = fixed_now();
    for id in [7, 3] {
        repo.save_progress(&Progress::new(UserId::new(id), now), None)
            .await
            .unwrap();
    }
    assert_eq!(
        repo.list_user_ids().await.unwrap(),
        vec![UserId::new(3), UserId::new(7)]
    );

    assert!(repo.delete_progress(UserId::new(3)).await.unwrap());
    assert!(!repo.delete_progress(UserId::new(3)).await.unwrap());
    assert!(repo.get_progress(UserId::new(3)).await.unwrap().is_none());
    assert!(matches!(
        repo.save_progress(&Progress::new(UserId::new(3), now), Some(1))
            .await,
        Err(StorageError::Conflict)
    ));
}
