//! Privilege Normalizer: shapes caller input into canonical `Privilege` and
//! `RoleRef` lists and rejects malformed or disallowed data before it reaches
//! the inheritance validator. Never touches the directory.

use crate::error::{AppError, AppResult};
use crate::roles::actions;
use crate::roles::model::{Privilege, RoleRef, RoleRefInput};

/// Validate and trim a role name. Blank names are rejected.
pub fn normalize_role_name(name: &str) -> AppResult<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(AppError::validation("Role name is required"));
    }
    Ok(trimmed.to_string())
}

/// Validate privileges against the static action allow-list.
/// Fails on the first offending privilege; nothing is partially applied.
pub fn validate_privileges(privileges: &[Privilege]) -> AppResult<()> {
    let allowed = actions::allowed_actions();
    for priv_ in privileges {
        if priv_.actions.is_empty() {
            return Err(AppError::validation("Each privilege must specify at least one action"));
        }
        for action in &priv_.actions {
            if action.trim().is_empty() {
                return Err(AppError::validation("Privilege actions must be non-empty strings"));
            }
            if !allowed.contains(action.as_str()) {
                return Err(AppError::validation(format!(
                    "Action \"{action}\" is not allowed for custom roles"
                )));
            }
        }
    }
    Ok(())
}

/// Expand shorthand inherited-role references into `{role, db}` pairs,
/// defaulting the db to the operation's target database.
pub fn normalize_inherited_roles(
    inputs: &[RoleRefInput],
    default_db: &str,
) -> AppResult<Vec<RoleRef>> {
    inputs
        .iter()
        .map(|input| match input {
            RoleRefInput::Name(name) => {
                if name.trim().is_empty() {
                    return Err(AppError::validation(
                        "Inherited roles must be strings or objects with a role field",
                    ));
                }
                Ok(RoleRef::new(name.trim(), default_db))
            }
            RoleRefInput::Scoped { role, db } => {
                let role = role.as_deref().map(str::trim).unwrap_or_default();
                if role.is_empty() {
                    return Err(AppError::validation(
                        "Inherited roles must be strings or objects with a role field",
                    ));
                }
                let db = db.as_deref().map(str::trim).filter(|d| !d.is_empty()).unwrap_or(default_db);
                Ok(RoleRef::new(role, db))
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roles::model::PrivilegeResource;

    fn priv_on(db: &str, actions: &[&str]) -> Privilege {
        Privilege {
            resource: PrivilegeResource { db: db.into(), collection: None },
            actions: actions.iter().map(|a| a.to_string()).collect(),
        }
    }

    #[test]
    fn role_name_must_be_non_blank() {
        assert!(normalize_role_name("  ").is_err());
        assert_eq!(normalize_role_name(" auditor ").unwrap(), "auditor");
    }

    #[test]
    fn privileges_require_allowed_actions() {
        assert!(validate_privileges(&[priv_on("analytics", &["find", "listCollections"])]).is_ok());
        // empty-db resource means "any database" and is permitted
        assert!(validate_privileges(&[priv_on("", &["find"])]).is_ok());

        let err = validate_privileges(&[priv_on("analytics", &["shutdown"])]).unwrap_err();
        assert!(err.to_string().contains("shutdown"));

        assert!(validate_privileges(&[priv_on("analytics", &[])]).is_err());
        assert!(validate_privileges(&[priv_on("analytics", &["  "])]).is_err());
    }

    #[test]
    fn bare_strings_default_to_target_db() {
        let refs = normalize_inherited_roles(
            &[
                RoleRefInput::Name("readWrite".into()),
                RoleRefInput::Scoped { role: Some("auditor".into()), db: Some("reports".into()) },
                RoleRefInput::Scoped { role: Some("read".into()), db: None },
            ],
            "admin",
        )
        .unwrap();
        assert_eq!(refs[0], RoleRef::new("readWrite", "admin"));
        assert_eq!(refs[1], RoleRef::new("auditor", "reports"));
        assert_eq!(refs[2], RoleRef::new("read", "admin"));
    }

    #[test]
    fn missing_role_field_is_rejected() {
        let err = normalize_inherited_roles(
            &[RoleRefInput::Scoped { role: None, db: Some("admin".into()) }],
            "admin",
        )
        .unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));
        assert!(normalize_inherited_roles(&[RoleRefInput::Name("".into())], "admin").is_err());
    }
}
