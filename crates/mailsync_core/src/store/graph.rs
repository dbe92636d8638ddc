//! Static foreign-key graph and cascade planning.
//!
//! # Responsibility
//! - Model the fixed FK relationships as a small directed acyclic edge table.
//! - Plan dependency-ordered DELETE statements for cascading removals.
//!
//! # Invariants
//! - Cascade plans list dependent tables strictly before their parents, so
//!   executing them in order never leaves a dangling reference visible.
//! - Every generated statement binds exactly one `?1` parameter, the root
//!   primary-key value.

/// One enforced foreign-key relationship between two tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FkEdge {
    pub parent: &'static str,
    pub parent_pk: &'static str,
    pub child: &'static str,
    pub child_fk: &'static str,
}

/// The fixed schema's reference graph: Users -> {UserSessions, Campaigns},
/// Campaigns -> Members.
pub const FK_EDGES: &[FkEdge] = &[
    FkEdge {
        parent: "Users",
        parent_pk: "Id",
        child: "UserSessions",
        child_fk: "UserId",
    },
    FkEdge {
        parent: "Users",
        parent_pk: "Id",
        child: "Campaigns",
        child_fk: "UserId",
    },
    FkEdge {
        parent: "Campaigns",
        parent_pk: "Id",
        child: "Members",
        child_fk: "CampaignId",
    },
];

/// Edges whose parent is `table`.
pub fn edges_from(table: &str) -> impl Iterator<Item = &'static FkEdge> {
    let table = table.to_owned();
    FK_EDGES.iter().filter(move |edge| edge.parent == table)
}

/// Plans the DELETE statements for removing rows of `root` matching
/// `root_filter`, dependents first.
///
/// Child rows are selected through nested subqueries against the parent
/// chain, so the whole plan stays keyed on the single root parameter.
pub fn cascade_delete_plan(root: &'static str, root_filter: &str) -> Vec<String> {
    let mut plan = Vec::new();
    collect_deletes(root, root_filter.to_owned(), &mut plan);
    plan
}

fn collect_deletes(table: &'static str, filter: String, plan: &mut Vec<String>) {
    for edge in edges_from(table) {
        let child_filter = format!(
            "{} IN (SELECT {} FROM {} WHERE {})",
            edge.child_fk, edge.parent_pk, table, filter
        );
        collect_deletes(edge.child, child_filter, plan);
    }
    plan.push(format!("DELETE FROM {table} WHERE {filter};"));
}
