//! User service integration tests: CRUD guards, temporary-user lifecycle and
//! effective-privilege lookup over the in-memory directory.

use std::sync::Arc;

use mongard::directory::{Directory, MemoryDirectory, TempUserMeta, TempUserStatus};
use mongard::error::AppError;
use mongard::roles::model::RoleRef;
use mongard::users::UserService;

fn admin(role: &str) -> RoleRef {
    RoleRef::new(role, "admin")
}

fn service() -> (Arc<MemoryDirectory>, UserService) {
    let dir = Arc::new(MemoryDirectory::new());
    let svc = UserService::new(dir.clone());
    (dir, svc)
}

#[tokio::test]
async fn create_user_defaults_to_read_write_on_target_db() {
    let (dir, svc) = service();
    svc.create_user("alice", "s3cr3t9", vec![]).await.unwrap();

    let user = dir.find_user("alice").await.unwrap().unwrap();
    assert_eq!(user.id, "admin.alice");
    assert_eq!(user.roles, vec![admin("readWrite")]);
    assert!(user.created_at().is_some());
    assert!(!user.is_temporary());
}

#[tokio::test]
async fn create_user_guards() {
    let (_dir, svc) = service();

    let err = svc.create_user("", "pw123", vec![]).await.unwrap_err();
    assert!(matches!(err, AppError::Validation { .. }));

    let err = svc.create_user("bob", "p@ss!", vec![]).await.unwrap_err();
    assert!(err.to_string().contains("letters and numbers"));

    let err = svc
        .create_user(
            "bob",
            "pw123",
            vec![admin("clusterAdmin"), admin("readAnyDatabase")],
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation { .. }));
}

#[tokio::test]
async fn duplicate_user_names_are_rejected() {
    let (_dir, svc) = service();
    svc.create_user("alice", "pw123", vec![]).await.unwrap();
    let err = svc.create_user("alice", "pw456", vec![]).await.unwrap_err();
    assert!(matches!(err, AppError::Conflict { .. }));
}

#[tokio::test]
async fn root_users_cannot_be_edited_but_can_change_password() {
    let (dir, svc) = service();
    dir.seed_user("superman", vec![admin("root")]);

    let err = svc
        .update_user("admin.superman", None, Some(vec![admin("read")]))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("Root users cannot be edited"));

    // The dedicated password action still works for root.
    svc.update_password("admin.superman", "newpass1").await.unwrap();
    assert_eq!(dir.password_of("superman").as_deref(), Some("newpass1"));
}

#[tokio::test]
async fn update_user_patches_roles() {
    let (dir, svc) = service();
    dir.seed_user("alice", vec![admin("read")]);

    svc.update_user("admin.alice", None, Some(vec![admin("readWrite")])).await.unwrap();
    let user = dir.find_user("alice").await.unwrap().unwrap();
    assert_eq!(user.roles, vec![admin("readWrite")]);

    let err = svc.update_user("admin.ghost", None, None).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound { .. }));

    let err = svc.update_user("no-dot-id", None, None).await.unwrap_err();
    assert!(matches!(err, AppError::Validation { .. }));
}

#[tokio::test]
async fn password_update_requires_an_existing_user() {
    let (_dir, svc) = service();
    let err = svc.update_password("admin.ghost", "pw123").await.unwrap_err();
    assert!(matches!(err, AppError::NotFound { .. }));

    let err = svc.update_password("admin.ghost", "").await.unwrap_err();
    assert!(matches!(err, AppError::Validation { .. }));
}

#[tokio::test]
async fn last_user_and_admin_users_cannot_be_deleted() {
    let (dir, svc) = service();
    dir.seed_user("alice", vec![admin("read")]);

    let err = svc.delete_user("admin.alice").await.unwrap_err();
    assert!(err.to_string().contains("last user"));

    dir.seed_user("superman", vec![admin("root")]);
    let err = svc.delete_user("admin.superman").await.unwrap_err();
    assert!(err.to_string().contains("administrative privileges"));

    svc.delete_user("admin.alice").await.unwrap();
    assert!(dir.find_user("alice").await.unwrap().is_none());
}

#[tokio::test]
async fn temporary_user_lifecycle() {
    let (dir, svc) = service();

    let err = svc.create_temporary_user("temp1", "pw123", vec![], 0.0).await.unwrap_err();
    assert!(err.to_string().contains("positive number"));

    svc.create_temporary_user("temp1", "pw123", vec![admin("read")], 12.0).await.unwrap();

    let user = dir.find_user("temp1").await.unwrap().unwrap();
    assert!(user.is_temporary());
    assert!(user.temp_expires_at().is_some());

    let meta = dir.list_temp_user_meta().await.unwrap();
    assert_eq!(meta.len(), 1);
    assert_eq!(meta[0].username, "temp1");
    assert_eq!(meta[0].status, TempUserStatus::Active);

    let listing = svc.list_users().await.unwrap();
    let row = listing.iter().find(|u| u.name == "temp1").unwrap();
    assert!(row.is_temporary);
    assert!(row.expires_at.is_some());
}

#[tokio::test]
async fn listing_flips_expired_metadata_and_merges_it() {
    let (dir, svc) = service();
    // A user created before customData carried temporary markers: only the
    // metadata row knows it is temporary, and it expired an hour ago.
    dir.seed_user("oldtemp", vec![admin("read")]);
    let past = bson::DateTime::from_millis(bson::DateTime::now().timestamp_millis() - 3_600_000);
    dir.insert_temp_user_meta(&TempUserMeta {
        id: None,
        username: "oldtemp".to_string(),
        created_at: past,
        expires_at: past,
        expired_at: None,
        status: TempUserStatus::Active,
        roles: vec![admin("read")],
    })
    .await
    .unwrap();

    let listing = svc.list_users().await.unwrap();
    let row = listing.iter().find(|u| u.name == "oldtemp").unwrap();
    assert!(row.is_temporary, "metadata fallback must mark the user temporary");
    assert!(row.expires_at.is_some());

    let meta = dir.list_temp_user_meta().await.unwrap();
    assert_eq!(meta[0].status, TempUserStatus::Expired);
    assert!(meta[0].expired_at.is_some());
}

#[tokio::test]
async fn effective_privileges_cover_inherited_roles() {
    let (dir, svc) = service();
    dir.seed_custom_role("base", vec![], vec![]);
    dir.seed_custom_role("wrapper", vec![], vec![admin("base")]);
    dir.seed_user("alice", vec![admin("wrapper")]);

    let info = svc.effective_privileges("alice").await.unwrap();
    assert_eq!(info.id, "admin.alice");
    assert_eq!(info.roles, vec![admin("wrapper")]);
    assert!(info.inherited_roles.contains(&admin("base")));

    let err = svc.effective_privileges("ghost").await.unwrap_err();
    assert!(matches!(err, AppError::NotFound { .. }));
}
