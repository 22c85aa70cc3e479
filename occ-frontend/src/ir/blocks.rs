//! Basic block management

use super::instructions::Instr;
use occ_common::BlockId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A straight-line instruction sequence ending in one terminator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BasicBlock {
    pub id: BlockId,
    pub name: String,
    pub instrs: Vec<Instr>,
}

impl BasicBlock {
    pub fn new(id: BlockId, name: &str) -> Self {
        Self {
            id,
            name: name.to_string(),
            instrs: Vec::new(),
        }
    }

    pub fn has_terminator(&self) -> bool {
        self.instrs.last().is_some_and(Instr::is_terminator)
    }
}

impl fmt::Display for BasicBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "b{}.{}:", self.id, self.name)?;
        for instr in &self.instrs {
            writeln!(f, "  {}", instr)?;
        }
        Ok(())
    }
}
