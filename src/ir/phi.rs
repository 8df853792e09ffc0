//! SSA phi nodes
//!
//! Phi nodes merge values at control flow join points. During AST
//! generation they are materialized as selector variables assigned
//! on each incoming edge.

use crate::ir::types::{BlockId, IrType, ValueId};

/// SSA phi node: selects among values from predecessor blocks
#[derive(Clone, Debug)]
pub struct PhiNode {
    /// The SSA value being defined
    pub dst: ValueId,
    /// Type of the result
    pub ty: IrType,
    /// Incoming values: (predecessor block, value from that block)
    pub incoming: Vec<(BlockId, ValueId)>,
}

impl PhiNode {
    pub fn new(dst: ValueId, ty: IrType) -> Self {
        Self {
            dst,
            ty,
            incoming: Vec::new(),
        }
    }

    /// Add an incoming edge
    pub fn add_incoming(&mut self, block: BlockId, value: ValueId) {
        self.incoming.push((block, value));
    }

    /// Look up the incoming value for a predecessor
    pub fn incoming_from(&self, block: BlockId) -> Option<ValueId> {
        self.incoming
            .iter()
            .find(|(b, _)| *b == block)
            .map(|(_, v)| *v)
    }
}
