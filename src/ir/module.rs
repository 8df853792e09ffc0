//! IR module structures
//!
//! This module defines the module, function, and basic block structures
//! of the input IR. A module is an ordered sequence of functions; each
//! function is a CFG of basic blocks in SSA form. The IR is read-only
//! once built.

use crate::ir::instr::{Instr, Terminator};
use crate::ir::phi::PhiNode;
use crate::ir::types::{BlockId, IrType, ValueId};
use std::collections::HashMap;

/// An IR module consists of functions
#[derive(Clone, Debug, Default)]
pub struct IrModule {
    pub functions: Vec<IrFunction>,
}

impl IrModule {
    pub fn new() -> Self {
        Self {
            functions: Vec::new(),
        }
    }

    pub fn add_function(&mut self, func: IrFunction) {
        self.functions.push(func);
    }
}

/// A function parameter
#[derive(Clone, Debug)]
pub struct Param {
    pub value: ValueId,
    pub name: String,
    pub ty: IrType,
}

/// Where an SSA value is defined within a function
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DefSite {
    /// Parameter at the given index
    Param(usize),
    /// Instruction at (block, index)
    Instr(BlockId, usize),
    /// Phi node at (block, index)
    Phi(BlockId, usize),
}

/// A function is a CFG in SSA form
#[derive(Clone, Debug)]
pub struct IrFunction {
    pub name: String,
    pub params: Vec<Param>,
    pub return_type: IrType,
    /// Entry block ID
    pub entry_block: BlockId,
    /// All basic blocks
    pub blocks: HashMap<BlockId, BasicBlock>,
    /// Source-level names for values, where known
    pub value_names: HashMap<ValueId, String>,
}

impl IrFunction {
    /// Get a reference to a block by ID
    pub fn get_block(&self, id: BlockId) -> Option<&BasicBlock> {
        self.blocks.get(&id)
    }

    /// Build an index from value to defining site
    pub fn defs(&self) -> HashMap<ValueId, DefSite> {
        let mut defs = HashMap::new();
        for (i, param) in self.params.iter().enumerate() {
            defs.insert(param.value, DefSite::Param(i));
        }
        for (&id, block) in &self.blocks {
            for (i, phi) in block.phi_nodes.iter().enumerate() {
                defs.insert(phi.dst, DefSite::Phi(id, i));
            }
            for (i, instr) in block.instructions.iter().enumerate() {
                if let Some(dst) = instr.dst() {
                    defs.insert(dst, DefSite::Instr(id, i));
                }
            }
        }
        defs
    }

    /// Build an index from value to its type
    pub fn value_types(&self) -> HashMap<ValueId, IrType> {
        let mut types = HashMap::new();
        for param in &self.params {
            types.insert(param.value, param.ty.clone());
        }
        for block in self.blocks.values() {
            for phi in &block.phi_nodes {
                types.insert(phi.dst, phi.ty.clone());
            }
            for instr in &block.instructions {
                if let (Some(dst), Some(ty)) = (instr.dst(), instr.result_type()) {
                    types.insert(dst, ty.clone());
                }
            }
        }
        types
    }
}

/// A basic block in SSA form
#[derive(Clone, Debug)]
pub struct BasicBlock {
    pub id: BlockId,
    /// Phi nodes at block entry
    pub phi_nodes: Vec<PhiNode>,
    /// Instructions in this block
    pub instructions: Vec<Instr>,
    /// Block terminator
    pub terminator: Terminator,
    /// Predecessor blocks
    pub predecessors: Vec<BlockId>,
}

impl BasicBlock {
    /// Create a new basic block with the given ID and terminator
    pub fn new(id: BlockId, terminator: Terminator) -> Self {
        Self {
            id,
            phi_nodes: Vec::new(),
            instructions: Vec::new(),
            terminator,
            predecessors: Vec::new(),
        }
    }

    /// Add a predecessor block
    pub fn add_predecessor(&mut self, pred: BlockId) {
        if !self.predecessors.contains(&pred) {
            self.predecessors.push(pred);
        }
    }

    /// Get successor blocks from the terminator
    pub fn successors(&self) -> Vec<BlockId> {
        self.terminator.successors()
    }
}
