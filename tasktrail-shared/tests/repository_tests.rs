/// Integration tests for repositories and the transaction coordinator
///
/// Requires DATABASE_URL; every test returns early without it.

mod common;

use std::time::Duration;

use serde_json::json;
use tasktrail_shared::db::{ExecScope, ExecutionContext};
use tasktrail_shared::error::{Entity, ErrorKind, ExecError, Operation, RepoError};
use tasktrail_shared::models::{CreateTask, CreateUser, TaskStatus, UserRole};
use tasktrail_shared::repository::Repositories;

#[tokio::test]
async fn test_user_crud() {
    let Some(db) = common::test_db().await else { return };

    let user = common::create_user(&db).await;
    assert_eq!(user.role, UserRole::User);

    let by_name = db.users().get_by_username(&user.username).await.unwrap();
    assert_eq!(by_name.id, user.id);

    let mut promoted = by_name.clone();
    promoted.role = UserRole::Admin;
    let updated = db.users().update(&promoted).await.unwrap();
    assert_eq!(updated.role, UserRole::Admin);
    assert!(updated.updated_at >= user.updated_at);

    db.users().delete(user.id).await.unwrap();
    let err = db.users().get_by_id(user.id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_duplicate_username_is_conflict() {
    let Some(db) = common::test_db().await else { return };

    let user = common::create_user(&db).await;
    let err = db
        .users()
        .create(CreateUser {
            username: user.username.clone(),
            password_hash: "hash".to_string(),
            role: UserRole::User,
        })
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Conflict);
}

#[tokio::test]
async fn test_deleting_project_owner_is_conflict() {
    let Some(db) = common::test_db().await else { return };

    let owner = common::create_user(&db).await;
    common::create_project(&db, &owner, "Owned").await;

    let err = db.users().delete(owner.id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
}

#[tokio::test]
async fn test_project_with_unknown_owner_is_validation() {
    let Some(db) = common::test_db().await else { return };

    let err = db
        .projects()
        .create(tasktrail_shared::models::CreateProject {
            name: "Orphan".to_string(),
            description: String::new(),
            owner_id: i64::MAX,
        })
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[tokio::test]
async fn test_project_crud_and_soft_delete() {
    let Some(db) = common::test_db().await else { return };

    let owner = common::create_user(&db).await;
    let project = common::create_project(&db, &owner, "Alpha").await;
    assert!(project.is_live());

    let mut renamed = project.clone();
    renamed.name = "Alpha 2".to_string();
    renamed.description = "second cut".to_string();
    let updated = db.projects().update(&renamed).await.unwrap();
    assert_eq!(updated.name, "Alpha 2");
    assert_eq!(updated.owner_id, owner.id);

    let deletion = db.projects().delete(project.id).await.unwrap();
    assert_eq!(deletion.cascaded_tasks, 0);

    let err = db.projects().get_by_id(project.id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let err = db.projects().delete(project.id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let err = db.projects().update(&renamed).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_get_by_owner_totals() {
    let Some(db) = common::test_db().await else { return };

    let owner = common::create_user(&db).await;
    for i in 0..3 {
        common::create_project(&db, &owner, &format!("P{i}")).await;
    }

    let (page, total) = db.projects().get_by_owner(owner.id, 2, 0).await.unwrap();
    assert_eq!(total, 3);
    assert_eq!(page.len(), 2);
    assert_eq!(page[0].name, "P2", "newest first");

    let (rest, _) = db.projects().get_by_owner(owner.id, 2, 2).await.unwrap();
    assert_eq!(rest.len(), 1);
    assert_eq!(rest[0].name, "P0");
}

#[tokio::test]
async fn test_task_json_fields_round_trip() {
    let Some(db) = common::test_db().await else { return };

    let owner = common::create_user(&db).await;
    let project = common::create_project(&db, &owner, "Json").await;

    let mut new_task = CreateTask::new(project.id, "Ship it");
    new_task.custom_fields = json!({ "priority": 3, "labels": { "ui": true } })
        .as_object()
        .cloned()
        .unwrap();
    new_task.tags = vec!["release".to_string(), "q4".to_string()];
    new_task.assignee_id = Some(owner.id);

    let task = db.tasks().create(new_task.clone()).await.unwrap();
    let fetched = db.tasks().get_by_id(task.id).await.unwrap();

    assert_eq!(fetched.custom_fields, new_task.custom_fields);
    assert_eq!(fetched.tags, new_task.tags);
    assert!(fetched.metadata.is_empty());
    assert_eq!(fetched.status, TaskStatus::Todo);
    assert_eq!(fetched.assignee_id, Some(owner.id));

    let plain = db
        .tasks()
        .create(CreateTask::new(project.id, "Plain"))
        .await
        .unwrap();
    let plain = db.tasks().get_by_id(plain.id).await.unwrap();
    assert!(plain.custom_fields.is_empty());
    assert!(plain.tags.is_empty());
}

#[tokio::test]
async fn test_task_in_unknown_project_is_validation() {
    let Some(db) = common::test_db().await else { return };

    let err = db
        .tasks()
        .create(CreateTask::new(i64::MAX, "Nowhere"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[tokio::test]
async fn test_column_violations_name_the_column() {
    let Some(db) = common::test_db().await else { return };
    let owner = common::create_user(&db).await;
    let project = common::create_project(&db, &owner, "Columns").await;
    let ctx = db.pool_context();

    let field_of = |err: RepoError| match err {
        RepoError::Validation { field, .. } => field.into_owned(),
        other => panic!("expected validation error, got {other:?}"),
    };

    let not_null = ctx
        .execute(
            sqlx::query("INSERT INTO projects (name, owner_id) VALUES (NULL, $1)").bind(owner.id),
        )
        .await
        .map_err(RepoError::storage(Entity::Project, Operation::Create))
        .unwrap_err();
    assert_eq!(field_of(not_null), "name");

    let task = db.tasks().create(CreateTask::new(project.id, "checked")).await.unwrap();
    let check = ctx
        .execute(sqlx::query("UPDATE tasks SET status = 'someday' WHERE id = $1").bind(task.id))
        .await
        .map_err(RepoError::storage(Entity::Task, Operation::UpdateStatus))
        .unwrap_err();
    assert_eq!(field_of(check), "status");

    let too_long = ctx
        .execute(
            sqlx::query("UPDATE users SET username = $1 WHERE id = $2")
                .bind("u".repeat(80))
                .bind(owner.id),
        )
        .await
        .map_err(RepoError::storage(Entity::User, Operation::Update))
        .unwrap_err();
    assert_eq!(field_of(too_long), "user");
}

#[tokio::test]
async fn test_update_status_touches_only_status() {
    let Some(db) = common::test_db().await else { return };

    let owner = common::create_user(&db).await;
    let project = common::create_project(&db, &owner, "Status").await;
    let mut new_task = CreateTask::new(project.id, "Review");
    new_task.description = "keep me".to_string();
    new_task.tags = vec!["a".to_string()];
    let task = db.tasks().create(new_task).await.unwrap();

    db.tasks()
        .update_status(task.id, TaskStatus::Completed)
        .await
        .unwrap();

    let after = db.tasks().get_by_id(task.id).await.unwrap();
    assert_eq!(after.status, TaskStatus::Completed);
    assert_eq!(after.title, task.title);
    assert_eq!(after.description, "keep me");
    assert_eq!(after.tags, task.tags);
    assert_eq!(after.created_at, task.created_at);
    assert!(after.updated_at >= task.updated_at);

    let err = db
        .tasks()
        .update_status(i64::MAX, TaskStatus::Cancelled)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn test_list_by_project_and_status() {
    let Some(db) = common::test_db().await else { return };

    let owner = common::create_user(&db).await;
    let project = common::create_project(&db, &owner, "Lists").await;
    let tasks = db
        .tasks()
        .bulk_create(vec![
            CreateTask::new(project.id, "one"),
            CreateTask::new(project.id, "two"),
            CreateTask::new(project.id, "three"),
        ])
        .await
        .unwrap();
    db.tasks().delete(tasks[0].id).await.unwrap();

    let (page, total) = db.tasks().get_by_project_id(project.id, 10, 0).await.unwrap();
    assert_eq!(total, 2, "deleted tasks are not listed");
    assert!(page.iter().all(|task| task.id != tasks[0].id));

    db.tasks()
        .update_status(tasks[1].id, TaskStatus::InProgress)
        .await
        .unwrap();
    let (in_progress, _) = db
        .tasks()
        .get_by_status(TaskStatus::InProgress, 100, 0)
        .await
        .unwrap();
    assert!(in_progress.iter().any(|task| task.id == tasks[1].id));
    assert!(in_progress.iter().all(|task| task.status == TaskStatus::InProgress));
}

#[tokio::test]
async fn test_bulk_create_empty_is_noop() {
    let Some(db) = common::test_db().await else { return };

    let created = db.tasks().bulk_create(Vec::new()).await.unwrap();
    assert!(created.is_empty());
}

#[tokio::test]
async fn test_transaction_commit_persists_every_write() {
    let Some(db) = common::test_db().await else { return };

    let owner = common::create_user(&db).await;
    let project = common::create_project(&db, &owner, "Commit").await;

    let tx = db.begin().await.unwrap();
    let task = tx
        .tasks()
        .create(CreateTask::new(project.id, "inside"))
        .await
        .unwrap();
    tx.audit()
        .log_action(
            &tasktrail_shared::models::RequestMeta::for_actor(owner.id),
            tasktrail_shared::models::AuditAction::Create,
            tasktrail_shared::error::Entity::Task,
            task.id,
            &task,
        )
        .await
        .unwrap();
    tx.commit().await.unwrap();

    assert!(db.tasks().get_by_id(task.id).await.is_ok());
    let entries = db
        .audit()
        .list_for_entity(tasktrail_shared::error::Entity::Task, task.id, 10, 0)
        .await
        .unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].entity_data["title"], json!("inside"));
}

#[tokio::test]
async fn test_transaction_rollback_discards_every_write() {
    let Some(db) = common::test_db().await else { return };

    let owner = common::create_user(&db).await;
    let project = common::create_project(&db, &owner, "Rollback").await;

    let tx = db.begin().await.unwrap();
    let created = tx
        .tasks()
        .bulk_create(vec![
            CreateTask::new(project.id, "a"),
            CreateTask::new(project.id, "b"),
        ])
        .await
        .unwrap();
    tx.rollback().await.unwrap();

    for task in created {
        let err = db.tasks().get_by_id(task.id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}

#[tokio::test]
async fn test_transaction_closure_rolls_back_on_error() {
    let Some(db) = common::test_db().await else { return };

    let owner = common::create_user(&db).await;
    let project = common::create_project(&db, &owner, "Closure").await;
    let project_id = project.id;

    let result: Result<(), RepoError> = db
        .transaction(|tx| async move {
            tx.tasks()
                .create(CreateTask::new(project_id, "doomed"))
                .await?;
            // Unknown project: the whole unit of work must go
            tx.tasks().create(CreateTask::new(i64::MAX, "bad")).await?;
            Ok(())
        })
        .await;
    assert_eq!(result.unwrap_err().kind(), ErrorKind::Validation);

    let (_, total) = db.tasks().get_by_project_id(project_id, 10, 0).await.unwrap();
    assert_eq!(total, 0);
}

#[tokio::test]
async fn test_context_unusable_after_commit() {
    let Some(db) = common::test_db().await else { return };

    let tx = db.begin().await.unwrap();
    let ctx = tx.context();
    assert!(ctx.is_open());
    tx.commit().await.unwrap();
    assert!(!ctx.is_open());

    let err = ctx.execute(sqlx::query("SELECT 1")).await.unwrap_err();
    assert!(matches!(err, ExecError::TransactionClosed));

    let err = ctx.users().count().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Connectivity);
}

#[tokio::test]
async fn test_cancelled_scope_is_connectivity() {
    let Some(db) = common::test_db().await else { return };

    let scope = ExecScope::new();
    scope.cancel_token().cancel();
    let cancelled = db.with_scope(scope);

    let err = cancelled.users().count().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Connectivity);
    assert!(matches!(
        err,
        RepoError::Storage {
            source: ExecError::Cancelled,
            ..
        }
    ));
}

#[tokio::test]
async fn test_deadline_exceeded_is_connectivity() {
    let Some(db) = common::test_db().await else { return };

    let slow = db.with_scope(ExecScope::with_timeout(Duration::from_millis(50)));
    let err = slow
        .pool_context()
        .execute(sqlx::query("SELECT pg_sleep(2)"))
        .await
        .unwrap_err();

    assert!(matches!(err, ExecError::DeadlineExceeded));
}
