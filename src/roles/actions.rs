//! Static catalog of privilege actions and inheritable built-in roles.
//! Single source of truth for custom-role creation: the tree drives the UI
//! picker, the `action` leaves form the privilege allow-list, and the `role`
//! leaves are the built-in role names offered for inheritance.

use once_cell::sync::Lazy;
use serde::Serialize;
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Action,
    Role,
}

/// Tree is recursive: each node has a name and optional children. Leaves carry
/// a kind: `action` leaves are valid in `privileges[].actions`, `role` leaves
/// are valid built-in names for inherited roles.
#[derive(Debug, Serialize)]
pub struct ActionsNode {
    pub name: &'static str,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<NodeKind>,
    #[serde(skip_serializing_if = "children_empty")]
    pub children: &'static [ActionsNode],
}

fn children_empty(children: &&'static [ActionsNode]) -> bool {
    children.is_empty()
}

const fn action(name: &'static str) -> ActionsNode {
    ActionsNode { name, kind: Some(NodeKind::Action), children: &[] }
}

const fn role(name: &'static str) -> ActionsNode {
    ActionsNode { name, kind: Some(NodeKind::Role), children: &[] }
}

const fn group(name: &'static str, children: &'static [ActionsNode]) -> ActionsNode {
    ActionsNode { name, kind: None, children }
}

pub static ACTIONS_TREE: &[ActionsNode] = &[
    group(
        "Collection Actions",
        &[
            group(
                "Query and Write Actions",
                &[
                    action("find"),
                    action("insert"),
                    action("remove"),
                    action("update"),
                    action("bypassDocumentValidation"),
                ],
            ),
            group(
                "Database Management Actions",
                &[
                    action("createCollection"),
                    action("createIndex"),
                    action("dropCollection"),
                    action("killAnyCursor"),
                ],
            ),
            group("Change Stream Actions", &[action("changeStream")]),
            group(
                "Server Administration Actions",
                &[
                    action("collMod"),
                    action("compact"),
                    action("convertToCapped"),
                    action("dropIndex"),
                    action("reIndex"),
                ],
            ),
            group(
                "Diagnostic Actions",
                &[
                    action("collStats"),
                    action("dbHash"),
                    action("listIndexes"),
                    action("validate"),
                ],
            ),
            group(
                "Sharding Actions",
                &[
                    action("moveChunk"),
                    action("splitChunk"),
                    action("analyzeShardKey"),
                    action("refineCollectionShardKey"),
                    action("clearJumboFlag"),
                    action("reshardCollection"),
                ],
            ),
        ],
    ),
    group(
        "Database Actions and Roles",
        &[
            group(
                "Actions",
                &[
                    group("Database Management Actions", &[action("enableProfiler")]),
                    group(
                        "Server Administration Actions",
                        &[action("dropDatabase"), action("renameCollectionSameDB")],
                    ),
                    group(
                        "Diagnostic Actions",
                        &[action("dbStats"), action("listCollections")],
                    ),
                ],
            ),
            group(
                "Built-In Roles",
                &[role("read"), role("readWrite"), role("dbAdmin")],
            ),
        ],
    ),
    group(
        "Global Actions and Roles",
        &[
            group(
                "Actions",
                &[
                    group(
                        "Query and Write Actions",
                        &[
                            action("useUUID"),
                            action("killop"),
                            action("bypassDefaultMaxTimeMS"),
                        ],
                    ),
                    group(
                        "Server Administration Actions",
                        &[
                            action("setUserWriteBlockMode"),
                            action("bypassWriteBlockingMode"),
                        ],
                    ),
                    group(
                        "Session Actions",
                        &[action("listSessions"), action("killAnySession")],
                    ),
                    group(
                        "Diagnostic Actions",
                        &[
                            action("connPoolStats"),
                            action("getCmdLineOpts"),
                            action("getLog"),
                            action("getParameter"),
                            action("getShardMap"),
                            action("hostInfo"),
                            action("inprog"),
                            action("listDatabases"),
                            action("listShards"),
                            action("netstat"),
                            action("replSetGetConfig"),
                            action("replSetGetStatus"),
                            action("serverStatus"),
                            action("shardingState"),
                            action("top"),
                        ],
                    ),
                    group(
                        "Atlas Data Federation Actions",
                        &[
                            action("sqlGetSchema"),
                            action("sqlSetSchema"),
                            action("viewAllHistory"),
                            action("outToS3"),
                            action("outToAzure"),
                            action("outToGCS"),
                            action("storageGetConfig"),
                            action("storageSetConfig"),
                        ],
                    ),
                    group(
                        "Sharding Actions",
                        &[
                            action("flushRouterConfig"),
                            action("enableSharding"),
                            action("checkMetadataConsistency"),
                            action("shardedDataDistribution"),
                        ],
                    ),
                    group(
                        "Atlas Streams Processing Actions",
                        &[
                            action("getStreamProcessor"),
                            action("createStreamProcessor"),
                            action("processStreamProcessor"),
                            action("startStreamProcessor"),
                            action("stopStreamProcessor"),
                            action("dropStreamProcessor"),
                            action("sampleStreamProcessor"),
                            action("listStreamProcessors"),
                            action("listStreamConnections"),
                            action("streamProcessorStats"),
                        ],
                    ),
                ],
            ),
            group(
                "Built-In Roles",
                &[
                    role("readAnyDatabase"),
                    role("readWriteAnyDatabase"),
                    role("backup"),
                    role("enableSharding"),
                    role("dbAdminAnyDatabase"),
                    role("clusterMonitor"),
                    role("killOpSession"),
                    role("autoCompact"),
                    role("manageShardBalancer"),
                ],
            ),
        ],
    ),
];

fn collect_leaves(kind: NodeKind) -> Vec<&'static str> {
    let mut out = Vec::new();
    // Worklist walk; leaves without an explicit kind count as actions.
    let mut work: Vec<&'static ActionsNode> = ACTIONS_TREE.iter().collect();
    while let Some(node) = work.pop() {
        if node.children.is_empty() {
            if node.kind.unwrap_or(NodeKind::Action) == kind {
                out.push(node.name);
            }
        } else {
            work.extend(node.children.iter());
        }
    }
    out
}

static ALLOWED_ACTIONS: Lazy<HashSet<&'static str>> =
    Lazy::new(|| collect_leaves(NodeKind::Action).into_iter().collect());

/// The fixed allow-list of privilege actions for custom roles.
pub fn allowed_actions() -> &'static HashSet<&'static str> {
    &ALLOWED_ACTIONS
}

pub fn actions_tree() -> &'static [ActionsNode] {
    ACTIONS_TREE
}

/// Built-in role names the tree offers for inheritance.
pub fn inheritable_builtin_names() -> Vec<&'static str> {
    collect_leaves(NodeKind::Role)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allow_list_contains_core_actions() {
        let actions = allowed_actions();
        for a in ["find", "insert", "remove", "update", "listCollections", "serverStatus"] {
            assert!(actions.contains(a), "expected {a} in allow-list");
        }
        assert!(!actions.contains("read"), "role leaves must not be actions");
        assert!(!actions.contains("shutdown"), "unlisted actions stay disallowed");
    }

    #[test]
    fn role_leaves_are_inheritable_builtins() {
        let names = inheritable_builtin_names();
        assert!(names.contains(&"read"));
        assert!(names.contains(&"readWrite"));
        assert!(names.contains(&"clusterMonitor"));
        assert!(!names.contains(&"find"));
    }

    #[test]
    fn tree_serializes_with_type_only_on_leaves() {
        let v = serde_json::to_value(actions_tree()).unwrap();
        let first = &v[0];
        assert_eq!(first["name"], "Collection Actions");
        assert!(first.get("type").is_none());
        let leaf = &first["children"][0]["children"][0];
        assert_eq!(leaf["name"], "find");
        assert_eq!(leaf["type"], "action");
        assert!(leaf.get("children").is_none());
    }
}
