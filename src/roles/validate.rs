//! Role Inheritance Validator: the correctness gate between "caller wants to
//! create/update a role" and "directory is mutated".
//!
//! Two checks run against the live directory: every referenced inherited role
//! must exist, and the inheritance graph must stay acyclic once the proposed
//! edges are overlaid. The graph is rebuilt from a fresh directory snapshot on
//! every call and never persisted. The validator performs no writes itself;
//! there is no mutual exclusion between its reads and the caller's subsequent
//! write, so serialization of mutations belongs to the caller (see
//! `roles::service`).

use std::collections::{HashMap, HashSet};

use crate::directory::Directory;
use crate::error::{AppError, AppResult};
use crate::roles::model::{Privilege, RoleRef};
use crate::roles::normalize;

/// Confirm that every referenced inherited role exists in the directory,
/// built-ins included. Reports all missing pairs in one failure.
pub async fn assert_inherited_roles_exist(
    dir: &dyn Directory,
    inherited: &[RoleRef],
) -> AppResult<()> {
    if inherited.is_empty() {
        return Ok(());
    }

    let existing = dir.find_roles(inherited).await?;
    let found: HashSet<String> = existing.iter().map(RoleRef::key).collect();
    let missing: Vec<RoleRef> =
        inherited.iter().filter(|r| !found.contains(&r.key())).cloned().collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(AppError::missing_roles(missing))
    }
}

/// Prove the inheritance graph stays acyclic once the candidate role's
/// proposed edges are in place.
///
/// Cycles are detected on role identity, not role+db pairs: role names are
/// unique in the directory, so the db qualifier is irrelevant to reachability.
/// Only custom roles are fetched; built-ins contribute no outgoing edges and
/// cannot participate in a cycle.
pub async fn assert_no_cycle(
    dir: &dyn Directory,
    candidate: &str,
    inherited: &[RoleRef],
) -> AppResult<()> {
    if inherited.is_empty() {
        return Ok(());
    }

    let mut graph: HashMap<String, Vec<String>> = HashMap::new();
    for role in dir.list_custom_roles().await? {
        let children = role.roles.iter().map(|r| r.role.clone()).collect();
        graph.insert(role.role, children);
    }

    // Overlay the candidate's proposed edges, deduplicated by role name.
    // This models the graph as if the write had already happened, which is
    // what makes the check correct for updates as well as creates.
    let mut proposed: Vec<String> = Vec::new();
    let mut seen: HashSet<&str> = HashSet::new();
    for r in inherited {
        if seen.insert(r.role.as_str()) {
            proposed.push(r.role.clone());
        }
    }
    graph.insert(candidate.to_string(), proposed);

    match find_cycle(&graph, candidate) {
        Some(node) => Err(AppError::circular(node)),
        None => Ok(()),
    }
}

/// Depth-first reachability from `start` using an explicit worklist instead of
/// native recursion, so arbitrarily deep custom-role chains cannot overflow
/// the call stack. `on_stack` holds the ancestors of the node currently being
/// expanded; reaching one of them again closes a cycle. Fully explored nodes
/// move to `visited` and are skipped thereafter, bounding the walk at O(V+E).
/// Returns the node at which the cycle closes.
pub fn find_cycle(graph: &HashMap<String, Vec<String>>, start: &str) -> Option<String> {
    enum Frame<'a> {
        Enter(&'a str),
        Leave(&'a str),
    }

    let mut on_stack: HashSet<&str> = HashSet::new();
    let mut visited: HashSet<&str> = HashSet::new();
    let mut work: Vec<Frame> = vec![Frame::Enter(start)];

    while let Some(frame) = work.pop() {
        match frame {
            Frame::Enter(node) => {
                if on_stack.contains(node) {
                    return Some(node.to_string());
                }
                if !visited.insert(node) {
                    continue;
                }
                on_stack.insert(node);
                work.push(Frame::Leave(node));
                if let Some(children) = graph.get(node) {
                    for child in children {
                        work.push(Frame::Enter(child));
                    }
                }
            }
            Frame::Leave(node) => {
                on_stack.remove(node);
            }
        }
    }
    None
}

/// The full pre-write gate: privileges against the allow-list, then existence,
/// then cycle detection. Existence runs first because a missing role is more
/// actionable than a cycle report. Pure; the persistence call belongs to the
/// caller and must only happen after this returns Ok.
pub async fn validate_and_stage(
    dir: &dyn Directory,
    candidate: &str,
    privileges: &[Privilege],
    inherited: &[RoleRef],
) -> AppResult<()> {
    normalize::validate_privileges(privileges)?;
    assert_inherited_roles_exist(dir, inherited).await?;
    assert_no_cycle(dir, candidate, inherited).await
}
