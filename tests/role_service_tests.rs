//! Role service integration tests: normalize -> validate -> commit
//! orchestration over the in-memory directory.

use std::sync::Arc;

use mongard::directory::{Directory, MemoryDirectory};
use mongard::error::AppError;
use mongard::roles::model::{Privilege, PrivilegeResource, RoleRef, RoleRefInput};
use mongard::roles::RoleService;

fn admin(role: &str) -> RoleRef {
    RoleRef::new(role, "admin")
}

fn priv_on(db: &str, actions: &[&str]) -> Privilege {
    Privilege {
        resource: PrivilegeResource { db: db.into(), collection: None },
        actions: actions.iter().map(|a| a.to_string()).collect(),
    }
}

fn service() -> (Arc<MemoryDirectory>, RoleService) {
    let dir = Arc::new(MemoryDirectory::new());
    let svc = RoleService::new(dir.clone());
    (dir, svc)
}

#[tokio::test]
async fn create_normalizes_bare_strings_to_target_db() {
    let (dir, svc) = service();
    svc.create_custom_role(
        "dataAnalyst",
        vec![priv_on("analytics", &["find", "listCollections"])],
        vec![
            RoleRefInput::Name("readWrite".into()),
            RoleRefInput::Scoped { role: Some("read".into()), db: None },
        ],
    )
    .await
    .unwrap();

    let roles = dir.list_custom_roles().await.unwrap();
    assert_eq!(roles.len(), 1);
    let role = &roles[0];
    assert_eq!(role.role, "dataAnalyst");
    assert!(role.is_custom);
    assert_eq!(role.roles, vec![admin("readWrite"), admin("read")]);
    assert_eq!(role.privileges.len(), 1);
}

#[tokio::test]
async fn create_rejects_blank_name_and_disallowed_actions() {
    let (_dir, svc) = service();

    let err = svc.create_custom_role("   ", vec![], vec![]).await.unwrap_err();
    assert!(matches!(err, AppError::Validation { .. }));

    let err = svc
        .create_custom_role("ops", vec![priv_on("admin", &["shutdown"])], vec![])
        .await
        .unwrap_err();
    assert!(err.to_string().contains("shutdown"));

    let err =
        svc.create_custom_role("ops", vec![priv_on("admin", &[])], vec![]).await.unwrap_err();
    assert!(matches!(err, AppError::Validation { .. }));
}

#[tokio::test]
async fn create_rejects_missing_inherited_roles_before_writing() {
    let (dir, svc) = service();
    let err = svc
        .create_custom_role("ops", vec![], vec![RoleRefInput::Name("ghost".into())])
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::MissingRoles { .. }));
    assert!(dir.list_custom_roles().await.unwrap().is_empty());
}

#[tokio::test]
async fn duplicate_create_surfaces_directory_fault() {
    let (_dir, svc) = service();
    svc.create_custom_role("ops", vec![], vec![]).await.unwrap();
    let err = svc.create_custom_role("ops", vec![], vec![]).await.unwrap_err();
    assert!(matches!(err, AppError::Directory { .. }));
}

#[tokio::test]
async fn update_revalidates_only_when_inherited_set_is_present() {
    let (dir, svc) = service();
    dir.seed_custom_role("roleA", vec![], vec![]);
    dir.seed_custom_role("roleB", vec![], vec![admin("roleA")]);

    // Privileges-only update on A never runs the cycle check.
    svc.update_custom_role("roleA", Some(vec![priv_on("admin", &["find"])]), None)
        .await
        .unwrap();

    // The same update carrying an inherited set that closes a cycle fails
    // and leaves the stored edges untouched.
    let err = svc
        .update_custom_role(
            "roleA",
            None,
            Some(vec![RoleRefInput::Scoped { role: Some("roleB".into()), db: None }]),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::CircularInheritance { .. }));

    let roles = dir.list_custom_roles().await.unwrap();
    let role_a = roles.iter().find(|r| r.role == "roleA").unwrap();
    assert!(role_a.roles.is_empty());
    assert_eq!(role_a.privileges, vec![priv_on("admin", &["find"])]);
}

#[tokio::test]
async fn update_with_no_fields_is_a_no_op() {
    let (dir, svc) = service();
    svc.update_custom_role("missing", None, None).await.unwrap();
    assert!(dir.list_custom_roles().await.unwrap().is_empty());
}

#[tokio::test]
async fn update_of_unknown_role_surfaces_directory_fault() {
    let (_dir, svc) = service();
    let err = svc
        .update_custom_role("missing", Some(vec![priv_on("admin", &["find"])]), None)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Directory { .. }));
}

#[tokio::test]
async fn delete_is_refused_while_a_user_holds_the_role() {
    let (dir, svc) = service();
    dir.seed_custom_role("dataAnalyst", vec![], vec![]);
    dir.seed_user("alice", vec![admin("dataAnalyst")]);

    let err = svc.delete_custom_role("dataAnalyst").await.unwrap_err();
    match err {
        AppError::Conflict { message } => assert!(message.contains("alice")),
        other => panic!("expected Conflict, got {other:?}"),
    }
}

#[tokio::test]
async fn delete_is_refused_for_transitively_inherited_roles() {
    // bob holds wrapper; wrapper inherits base, so base is still in use.
    let (dir, svc) = service();
    dir.seed_custom_role("base", vec![], vec![]);
    dir.seed_custom_role("wrapper", vec![], vec![admin("base")]);
    dir.seed_user("bob", vec![admin("wrapper")]);

    let err = svc.delete_custom_role("base").await.unwrap_err();
    assert!(matches!(err, AppError::Conflict { .. }));

    // Unreferenced roles go away cleanly.
    dir.seed_custom_role("orphan", vec![], vec![]);
    svc.delete_custom_role("orphan").await.unwrap();
    assert!(!dir.list_custom_roles().await.unwrap().iter().any(|r| r.role == "orphan"));
}
