//! Flat-to-tree assembly for calculation threads.
//!
//! The store hands back every node of a tree as a flat list ordered by
//! creation time. [`build_tree`] turns that list into a nested
//! [`TreeBranch`] in two linear passes and refuses any input that does not
//! form exactly one well-rooted tree.

use std::collections::HashMap;

use serde::Serialize;

use crate::error::CoreError;
use crate::types::DbId;

/// Anything that can be placed in a calculation tree.
pub trait TreeRecord {
    fn id(&self) -> DbId;
    fn root_id(&self) -> Option<DbId>;
    fn parent_id(&self) -> Option<DbId>;
}

/// Deepest reply chain a tree may hold; the root sits at depth `0`.
///
/// Serialization recurses once per level, so this bounds the stack a
/// request thread spends rendering a tree.
pub const MAX_TREE_DEPTH: usize = 128;

/// A node together with its ordered children.
///
/// Serializes as the node's own fields plus a `children` array.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TreeBranch<T> {
    #[serde(flatten)]
    pub node: T,
    pub children: Vec<TreeBranch<T>>,
}

// The derived drop glue recurses once per level.
impl<T> Drop for TreeBranch<T> {
    fn drop(&mut self) {
        let mut stack = std::mem::take(&mut self.children);
        while let Some(mut branch) = stack.pop() {
            stack.append(&mut branch.children);
        }
    }
}

impl<T> TreeBranch<T> {
    /// Pre-order traversal over every node in the tree.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter { stack: vec![self] }
    }

    /// Total number of nodes, this one included.
    pub fn node_count(&self) -> usize {
        self.iter().count()
    }
}

/// Pre-order iterator returned by [`TreeBranch::iter`].
pub struct Iter<'a, T> {
    stack: Vec<&'a TreeBranch<T>>,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        let branch = self.stack.pop()?;
        self.stack.extend(branch.children.iter().rev());
        Some(&branch.node)
    }
}

fn inconsistent(root_id: DbId, detail: String) -> CoreError {
    tracing::error!(%root_id, detail = %detail, "Calculation tree invariant violated");
    CoreError::Inconsistent(detail)
}

/// Assemble the flat node set of one tree into a nested structure.
///
/// Sibling order is the order of `records`, which the store returns by
/// ascending creation time.
///
/// # Errors
///
/// - [`CoreError::NotFound`] when `records` is empty.
/// - [`CoreError::Inconsistent`] when the records do not form a single tree
///   rooted at `root_id`: no parentless node or more than one, a root whose id
///   differs from `root_id`, a node claiming another root, a dangling parent
///   reference, a duplicated id, or nodes unreachable from the root.
pub fn build_tree<T: TreeRecord>(root_id: DbId, records: Vec<T>) -> Result<TreeBranch<T>, CoreError> {
    if records.is_empty() {
        return Err(CoreError::NotFound {
            entity: "Calculation",
            id: root_id,
        });
    }
    let n = records.len();

    // Pass 1: id -> position lookup.
    let mut index: HashMap<DbId, usize> = HashMap::with_capacity(n);
    for (i, record) in records.iter().enumerate() {
        if index.insert(record.id(), i).is_some() {
            return Err(inconsistent(
                root_id,
                format!("node {} appears more than once", record.id()),
            ));
        }
    }

    // Pass 2: link each node under its parent and find the root.
    let mut children: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut root: Option<usize> = None;
    for (i, record) in records.iter().enumerate() {
        if record.root_id() != Some(root_id) {
            return Err(inconsistent(
                root_id,
                format!(
                    "node {} claims root {:?}, expected {root_id}",
                    record.id(),
                    record.root_id()
                ),
            ));
        }
        match record.parent_id() {
            None => {
                if let Some(existing) = root {
                    return Err(inconsistent(
                        root_id,
                        format!(
                            "tree has more than one root ({} and {})",
                            records[existing].id(),
                            record.id()
                        ),
                    ));
                }
                root = Some(i);
            }
            Some(parent_id) => {
                let parent = *index.get(&parent_id).ok_or_else(|| {
                    inconsistent(
                        root_id,
                        format!("node {} references missing parent {parent_id}", record.id()),
                    )
                })?;
                children[parent].push(i);
            }
        }
    }

    let root = root.ok_or_else(|| {
        inconsistent(root_id, format!("no root node among {n} nodes"))
    })?;
    if records[root].id() != root_id {
        return Err(inconsistent(
            root_id,
            format!("root node has id {}", records[root].id()),
        ));
    }

    // Breadth-first order from the root. Every node has one parent, so each
    // index is enqueued at most once; anything left over sits on a cycle.
    let mut order = Vec::with_capacity(n);
    let mut depth = vec![0usize; n];
    order.push(root);
    let mut cursor = 0;
    while cursor < order.len() {
        let i = order[cursor];
        cursor += 1;
        if depth[i] > MAX_TREE_DEPTH {
            return Err(inconsistent(
                root_id,
                format!("node {} is deeper than {MAX_TREE_DEPTH} levels", records[i].id()),
            ));
        }
        for &c in &children[i] {
            depth[c] = depth[i] + 1;
        }
        order.extend_from_slice(&children[i]);
    }
    if order.len() != n {
        return Err(inconsistent(
            root_id,
            format!("{} nodes are unreachable from the root", n - order.len()),
        ));
    }

    // Build bottom-up so every child branch exists before its parent.
    let mut slots: Vec<Option<T>> = records.into_iter().map(Some).collect();
    let mut built: Vec<Option<TreeBranch<T>>> = (0..n).map(|_| None).collect();
    for &i in order.iter().rev() {
        let node = slots[i]
            .take()
            .ok_or_else(|| inconsistent(root_id, "node visited twice".to_string()))?;
        let child_branches = std::mem::take(&mut children[i])
            .into_iter()
            .map(|c| built[c].take())
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| inconsistent(root_id, "child branch missing".to_string()))?;
        built[i] = Some(TreeBranch {
            node,
            children: child_branches,
        });
    }

    built[root]
        .take()
        .ok_or_else(|| inconsistent(root_id, "root branch missing".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use uuid::Uuid;

    #[derive(Debug, Clone, PartialEq, Serialize)]
    struct Rec {
        id: DbId,
        root_id: Option<DbId>,
        parent_id: Option<DbId>,
        label: &'static str,
    }

    impl TreeRecord for Rec {
        fn id(&self) -> DbId {
            self.id
        }
        fn root_id(&self) -> Option<DbId> {
            self.root_id
        }
        fn parent_id(&self) -> Option<DbId> {
            self.parent_id
        }
    }

    fn rec(id: DbId, root: DbId, parent: Option<DbId>, label: &'static str) -> Rec {
        Rec {
            id,
            root_id: Some(root),
            parent_id: parent,
            label,
        }
    }

    fn labels(branch: &TreeBranch<Rec>) -> Vec<&'static str> {
        branch.children.iter().map(|c| c.node.label).collect()
    }

    #[test]
    fn empty_input_is_not_found() {
        let root = Uuid::new_v4();
        assert_matches!(
            build_tree::<Rec>(root, Vec::new()),
            Err(CoreError::NotFound { id, .. }) if id == root
        );
    }

    #[test]
    fn single_root() {
        let root = Uuid::new_v4();
        let tree = build_tree(root, vec![rec(root, root, None, "r")]).unwrap();
        assert_eq!(tree.node.label, "r");
        assert!(tree.children.is_empty());
        assert_eq!(tree.node_count(), 1);
    }

    #[test]
    fn nests_children_in_input_order() {
        let (r, a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let records = vec![
            rec(r, r, None, "root"),
            rec(a, r, Some(r), "a"),
            rec(b, r, Some(a), "b"),
            rec(c, r, Some(r), "c"),
        ];
        let tree = build_tree(r, records).unwrap();
        assert_eq!(labels(&tree), vec!["a", "c"]);
        assert_eq!(labels(&tree.children[0]), vec!["b"]);
        assert!(tree.children[1].children.is_empty());
        assert_eq!(tree.node_count(), 4);
    }

    #[test]
    fn child_listed_before_parent_still_links() {
        let (r, a, b) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let records = vec![
            rec(b, r, Some(a), "b"),
            rec(a, r, Some(r), "a"),
            rec(r, r, None, "root"),
        ];
        let tree = build_tree(r, records).unwrap();
        assert_eq!(labels(&tree), vec!["a"]);
        assert_eq!(labels(&tree.children[0]), vec!["b"]);
    }

    #[test]
    fn pre_order_iteration_visits_each_node_once() {
        let (r, a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let records = vec![
            rec(r, r, None, "root"),
            rec(a, r, Some(r), "a"),
            rec(b, r, Some(r), "b"),
            rec(c, r, Some(a), "c"),
        ];
        let tree = build_tree(r, records).unwrap();
        let visited: Vec<_> = tree.iter().map(|n| n.label).collect();
        assert_eq!(visited, vec!["root", "a", "c", "b"]);
    }

    fn chain(len: usize) -> (DbId, Vec<Rec>) {
        let root = Uuid::new_v4();
        let mut records = vec![rec(root, root, None, "n")];
        let mut parent = root;
        for _ in 0..len {
            let id = Uuid::new_v4();
            records.push(rec(id, root, Some(parent), "n"));
            parent = id;
        }
        (root, records)
    }

    /// Runs `f` on a thread with a small stack, like a runtime worker.
    fn on_small_stack<F: FnOnce() + Send + 'static>(f: F) {
        std::thread::Builder::new()
            .stack_size(2 * 1024 * 1024)
            .spawn(f)
            .unwrap()
            .join()
            .unwrap();
    }

    #[test]
    fn chain_at_depth_limit_builds() {
        let (root, records) = chain(MAX_TREE_DEPTH);
        let tree = build_tree(root, records).unwrap();
        assert_eq!(tree.node_count(), MAX_TREE_DEPTH + 1);
    }

    #[test]
    fn chain_past_depth_limit_is_inconsistent() {
        let (root, records) = chain(MAX_TREE_DEPTH + 1);
        assert_matches!(build_tree(root, records), Err(CoreError::Inconsistent(_)));
    }

    #[test]
    fn deep_chain_drops_on_small_stack() {
        on_small_stack(|| {
            let id = Uuid::new_v4();
            let mut tree = TreeBranch {
                node: rec(id, id, None, "n"),
                children: Vec::new(),
            };
            for _ in 0..50_000 {
                let id = Uuid::new_v4();
                tree = TreeBranch {
                    node: rec(id, id, None, "n"),
                    children: vec![tree],
                };
            }
            assert_eq!(tree.node_count(), 50_001);
            drop(tree);
        });
    }

    #[test]
    fn tree_at_depth_limit_serializes_on_small_stack() {
        on_small_stack(|| {
            let (root, records) = chain(MAX_TREE_DEPTH);
            let tree = build_tree(root, records).unwrap();
            let json = serde_json::to_string(&tree).unwrap();
            assert_eq!(json.matches("\"children\"").count(), MAX_TREE_DEPTH + 1);
        });
    }

    #[test]
    fn missing_root_is_inconsistent() {
        let (r, a) = (Uuid::new_v4(), Uuid::new_v4());
        let records = vec![rec(a, r, Some(r), "orphan")];
        assert_matches!(build_tree(r, records), Err(CoreError::Inconsistent(_)));
    }

    #[test]
    fn two_roots_are_inconsistent() {
        let (r, other) = (Uuid::new_v4(), Uuid::new_v4());
        let records = vec![rec(r, r, None, "r"), rec(other, r, None, "x")];
        assert_matches!(build_tree(r, records), Err(CoreError::Inconsistent(_)));
    }

    #[test]
    fn mismatched_root_reference_is_inconsistent() {
        let (r, a, elsewhere) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let records = vec![rec(r, r, None, "r"), rec(a, elsewhere, Some(r), "a")];
        assert_matches!(build_tree(r, records), Err(CoreError::Inconsistent(_)));
    }

    #[test]
    fn unfinalized_root_is_inconsistent() {
        let r = Uuid::new_v4();
        let records = vec![Rec {
            id: r,
            root_id: None,
            parent_id: None,
            label: "r",
        }];
        assert_matches!(build_tree(r, records), Err(CoreError::Inconsistent(_)));
    }

    #[test]
    fn dangling_parent_is_inconsistent() {
        let (r, a) = (Uuid::new_v4(), Uuid::new_v4());
        let records = vec![rec(r, r, None, "r"), rec(a, r, Some(Uuid::new_v4()), "a")];
        assert_matches!(build_tree(r, records), Err(CoreError::Inconsistent(_)));
    }

    #[test]
    fn cycle_is_inconsistent() {
        let (r, a, b) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let records = vec![
            rec(r, r, None, "r"),
            rec(a, r, Some(b), "a"),
            rec(b, r, Some(a), "b"),
        ];
        assert_matches!(build_tree(r, records), Err(CoreError::Inconsistent(_)));
    }

    #[test]
    fn self_parent_is_inconsistent() {
        let (r, a) = (Uuid::new_v4(), Uuid::new_v4());
        let records = vec![rec(r, r, None, "r"), rec(a, r, Some(a), "a")];
        assert_matches!(build_tree(r, records), Err(CoreError::Inconsistent(_)));
    }

    #[test]
    fn duplicate_id_is_inconsistent() {
        let r = Uuid::new_v4();
        let records = vec![rec(r, r, None, "r"), rec(r, r, None, "r")];
        assert_matches!(build_tree(r, records), Err(CoreError::Inconsistent(_)));
    }

    #[test]
    fn serializes_flattened_with_children() {
        let (r, a) = (Uuid::new_v4(), Uuid::new_v4());
        let tree = build_tree(r, vec![rec(r, r, None, "root"), rec(a, r, Some(r), "a")]).unwrap();
        let json = serde_json::to_value(&tree).unwrap();
        assert_eq!(json["label"], "root");
        assert_eq!(json["children"][0]["label"], "a");
        assert!(json["children"][0]["children"].as_array().unwrap().is_empty());
    }
}
