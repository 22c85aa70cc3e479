//! IR function bodies
//!
//! Blocks are stored in a slab indexed by `BlockId`; `layout` is the order
//! in which blocks are printed and emitted. Loop and switch lowering
//! reserves blocks early (so they exist as branch targets) but appends them
//! to the layout only once emission reaches them.

use super::blocks::BasicBlock;
use super::types::IrType;
use occ_common::{BlockId, LocalId, TempId};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct IrFunction {
    /// Block slab; index is the block id
    pub blocks: Vec<BasicBlock>,
    /// Layout order of the blocks
    pub layout: Vec<BlockId>,
    /// Stack slot types; index is the local id
    pub locals: Vec<IrType>,
    next_temp: TempId,
}

impl IrFunction {
    /// A fresh function with its entry block laid out
    pub fn new() -> Self {
        let mut f = Self::default();
        f.add_block("entry");
        f
    }

    pub fn entry(&self) -> BlockId {
        self.layout[0]
    }

    pub fn block(&self, id: BlockId) -> &BasicBlock {
        &self.blocks[id as usize]
    }

    pub fn block_mut(&mut self, id: BlockId) -> &mut BasicBlock {
        &mut self.blocks[id as usize]
    }

    /// Create a block and append it to the layout
    pub fn add_block(&mut self, name: &str) -> BlockId {
        let id = self.reserve_block(name);
        self.layout.push(id);
        id
    }

    /// Create a block without placing it in the layout yet
    pub fn reserve_block(&mut self, name: &str) -> BlockId {
        let id = self.blocks.len() as BlockId;
        self.blocks.push(BasicBlock::new(id, name));
        id
    }

    /// Place a reserved block at the end of the layout
    pub fn append_block(&mut self, id: BlockId) {
        debug_assert!(!self.layout.contains(&id));
        self.layout.push(id);
    }

    /// Place a reserved block at a specific layout position; switch
    /// lowering uses this to keep its compare chain ahead of the body
    pub fn insert_block(&mut self, position: usize, id: BlockId) {
        debug_assert!(!self.layout.contains(&id));
        self.layout.insert(position, id);
    }

    pub fn new_temp(&mut self) -> TempId {
        let id = self.next_temp;
        self.next_temp += 1;
        id
    }

    pub fn new_local(&mut self, ty: IrType) -> LocalId {
        let id = self.locals.len() as LocalId;
        self.locals.push(ty);
        id
    }

    /// Blocks in layout order
    pub fn layout_blocks(&self) -> impl Iterator<Item = &BasicBlock> {
        self.layout.iter().map(|&id| &self.blocks[id as usize])
    }
}

impl fmt::Display for IrFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, ty) in self.locals.iter().enumerate() {
            writeln!(f, "  local.{} : {}", i, ty)?;
        }
        for block in self.layout_blocks() {
            write!(f, "{}", block)?;
        }
        Ok(())
    }
}
