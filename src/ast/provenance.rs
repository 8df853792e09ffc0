//! Provenance side-map
//!
//! Every expression node traces back to an IR entity so later analyses
//! can relate output code to input values. The map is keyed by stable
//! node IDs rather than back-pointers, keeping the AST a strict tree.

use crate::ast::nodes::{FunctionDef, NodeId};
use crate::ir::{BlockId, ValueId};
use std::collections::{HashMap, HashSet};

/// The IR entity an AST node represents
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IrEntity {
    Value(ValueId),
    /// Structural nodes synthesized while structuring a block (e.g. the
    /// literal `true` of an entry reaching condition)
    Block(BlockId),
}

/// Bidirectional bookkeeping between AST nodes and IR entities
#[derive(Debug, Default)]
pub struct Provenance {
    nodes: HashMap<NodeId, IrEntity>,
    /// Use-provenance for boolean subterms: which IR computation a node
    /// of a composite guard mirrors
    uses: HashMap<NodeId, ValueId>,
}

impl Provenance {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, node: NodeId, entity: IrEntity) {
        self.nodes.insert(node, entity);
    }

    pub fn get(&self, node: NodeId) -> Option<IrEntity> {
        self.nodes.get(&node).copied()
    }

    pub fn set_use(&mut self, node: NodeId, value: ValueId) {
        self.uses.insert(node, value);
    }

    pub fn get_use(&self, node: NodeId) -> Option<ValueId> {
        self.uses.get(&node).copied()
    }

    /// Copy entries from one node to another. Idempotent; entries the
    /// source lacks are left untouched on the destination.
    pub fn copy(&mut self, from: NodeId, to: NodeId) {
        if let Some(entity) = self.nodes.get(&from).copied() {
            self.nodes.insert(to, entity);
        }
        if let Some(value) = self.uses.get(&from).copied() {
            self.uses.insert(to, value);
        }
    }

    /// Drop entries for nodes no longer part of any AST
    pub fn prune(&mut self, live: &HashSet<NodeId>) {
        self.nodes.retain(|id, _| live.contains(id));
        self.uses.retain(|id, _| live.contains(id));
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Verify that every expression node of a function has provenance
///
/// A missing entry is an internal contract violation, not an input
/// problem.
pub fn check_totality(func: &FunctionDef, provenance: &Provenance) -> Result<(), String> {
    let mut missing = None;
    func.body.for_each_expr(&mut |e| {
        if missing.is_none() && provenance.get(e.id).is_none() {
            missing = Some(format!(
                "expression node {} in `{}` has no provenance entry",
                e.id, func.name
            ));
        }
    });
    match missing {
        Some(msg) => Err(msg),
        None => Ok(()),
    }
}

/// Collect the IDs of all live expression nodes in a function
pub fn live_expr_nodes(func: &FunctionDef, out: &mut HashSet<NodeId>) {
    func.body.for_each_expr(&mut |e| {
        out.insert(e.id);
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_copy_is_idempotent() {
        let mut prov = Provenance::new();
        let a = NodeId(1);
        let b = NodeId(2);
        prov.set(a, IrEntity::Value(ValueId(7)));
        prov.set_use(a, ValueId(7));

        prov.copy(a, b);
        prov.copy(a, b);

        assert_eq!(prov.get(b), Some(IrEntity::Value(ValueId(7))));
        assert_eq!(prov.get_use(b), Some(ValueId(7)));
    }

    #[test]
    fn test_copy_from_unregistered_is_noop() {
        let mut prov = Provenance::new();
        prov.copy(NodeId(10), NodeId(11));
        assert_eq!(prov.get(NodeId(11)), None);
    }

    #[test]
    fn test_prune_retains_live() {
        let mut prov = Provenance::new();
        prov.set(NodeId(1), IrEntity::Value(ValueId(0)));
        prov.set(NodeId(2), IrEntity::Block(BlockId(0)));

        let mut live = HashSet::new();
        live.insert(NodeId(2));
        prov.prune(&live);

        assert_eq!(prov.get(NodeId(1)), None);
        assert_eq!(prov.get(NodeId(2)), Some(IrEntity::Block(BlockId(0))));
    }
}
