//! IR function builder
//!
//! This module provides a builder pattern for constructing IR functions
//! block by block. The loader uses it when resolving parsed input, and
//! tests use it to assemble functions directly.

use crate::ir::instr::{Instr, Terminator};
use crate::ir::module::{BasicBlock, IrFunction, Param};
use crate::ir::phi::PhiNode;
use crate::ir::types::{BlockId, BlockIdAllocator, IrType, ValueId, ValueIdAllocator};
use std::collections::HashMap;

/// Builder for constructing IR functions
pub struct FunctionBuilder {
    value_alloc: ValueIdAllocator,
    block_alloc: BlockIdAllocator,
    params: Vec<Param>,
    blocks: HashMap<BlockId, BasicBlock>,
    value_names: HashMap<ValueId, String>,
    /// Current block being built
    current_block: Option<BlockId>,
    current_phi_nodes: Vec<PhiNode>,
    current_instructions: Vec<Instr>,
}

impl FunctionBuilder {
    pub fn new() -> Self {
        Self {
            value_alloc: ValueIdAllocator::new(),
            block_alloc: BlockIdAllocator::new(),
            params: Vec::new(),
            blocks: HashMap::new(),
            value_names: HashMap::new(),
            current_block: None,
            current_phi_nodes: Vec::new(),
            current_instructions: Vec::new(),
        }
    }

    /// Allocate a fresh value ID
    pub fn fresh_value(&mut self) -> ValueId {
        self.value_alloc.fresh()
    }

    /// Allocate a fresh value ID carrying a source-level name
    pub fn named_value(&mut self, name: &str) -> ValueId {
        let value = self.value_alloc.fresh();
        self.value_names.insert(value, name.to_string());
        value
    }

    /// Add a function parameter
    pub fn add_param(&mut self, name: &str, ty: IrType) -> ValueId {
        let value = self.named_value(name);
        self.params.push(Param {
            value,
            name: name.to_string(),
            ty,
        });
        value
    }

    /// Create a new block and return its ID
    pub fn new_block(&mut self) -> BlockId {
        self.block_alloc.fresh()
    }

    /// Start building a block
    pub fn start_block(&mut self, id: BlockId) {
        assert!(
            self.current_block.is_none(),
            "Must finish current block before starting a new one"
        );
        self.current_block = Some(id);
        self.current_phi_nodes.clear();
        self.current_instructions.clear();
    }

    /// Add a phi node to the current block
    pub fn add_phi(&mut self, phi: PhiNode) {
        self.current_phi_nodes.push(phi);
    }

    /// Add an instruction to the current block
    pub fn add_instr(&mut self, instr: Instr) {
        self.current_instructions.push(instr);
    }

    /// Finish the current block with the given terminator
    pub fn finish_block(&mut self, terminator: Terminator) {
        let id = self
            .current_block
            .take()
            .expect("No block is being built");
        let mut block = BasicBlock::new(id, terminator);
        block.phi_nodes = std::mem::take(&mut self.current_phi_nodes);
        block.instructions = std::mem::take(&mut self.current_instructions);
        self.blocks.insert(id, block);
    }

    /// Build the function, computing predecessor lists
    pub fn finish(self, name: String, return_type: IrType, entry_block: BlockId) -> IrFunction {
        let mut blocks = self.blocks;

        // Predecessor lists are derived from the terminators
        let edges: Vec<(BlockId, BlockId)> = blocks
            .iter()
            .flat_map(|(&id, block)| block.successors().into_iter().map(move |succ| (id, succ)))
            .collect();
        for (pred, succ) in edges {
            if let Some(block) = blocks.get_mut(&succ) {
                block.add_predecessor(pred);
            }
        }

        IrFunction {
            name,
            params: self.params,
            return_type,
            entry_block,
            blocks,
            value_names: self.value_names,
        }
    }
}

impl Default for FunctionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::instr::BinaryOp;

    #[test]
    fn test_predecessors_from_terminators() {
        let mut b = FunctionBuilder::new();
        let x = b.add_param("x", IrType::Int {
            bits: 32,
            signed: true,
        });

        let entry = b.new_block();
        let then_bb = b.new_block();
        let join = b.new_block();

        b.start_block(entry);
        let zero = b.fresh_value();
        b.add_instr(Instr::Const {
            dst: zero,
            value: 0,
            ty: IrType::Int {
                bits: 32,
                signed: true,
            },
        });
        let cond = b.fresh_value();
        b.add_instr(Instr::Binary {
            dst: cond,
            op: BinaryOp::Lt,
            lhs: x,
            rhs: zero,
            ty: IrType::Bool,
        });
        b.finish_block(Terminator::Branch {
            cond,
            true_target: then_bb,
            false_target: join,
        });

        b.start_block(then_bb);
        b.finish_block(Terminator::Jump { target: join });

        b.start_block(join);
        b.finish_block(Terminator::Return { value: Some(x) });

        let func = b.finish(
            "test".to_string(),
            IrType::Int {
                bits: 32,
                signed: true,
            },
            entry,
        );

        let join_block = func.get_block(join).unwrap();
        assert_eq!(join_block.predecessors.len(), 2);
        assert!(join_block.predecessors.contains(&entry));
        assert!(join_block.predecessors.contains(&then_bb));
        assert!(func.get_block(entry).unwrap().predecessors.is_empty());
    }

    #[test]
    fn test_defs_index() {
        let mut b = FunctionBuilder::new();
        let n = b.add_param("n", IrType::Int {
            bits: 32,
            signed: true,
        });
        let entry = b.new_block();
        b.start_block(entry);
        let c = b.fresh_value();
        b.add_instr(Instr::Const {
            dst: c,
            value: 7,
            ty: IrType::Int {
                bits: 32,
                signed: true,
            },
        });
        b.finish_block(Terminator::Return { value: Some(c) });
        let func = b.finish(
            "defs".to_string(),
            IrType::Int {
                bits: 32,
                signed: true,
            },
            entry,
        );

        let defs = func.defs();
        assert_eq!(defs.get(&n), Some(&crate::ir::DefSite::Param(0)));
        assert_eq!(defs.get(&c), Some(&crate::ir::DefSite::Instr(entry, 0)));
    }
}
