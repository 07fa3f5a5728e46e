//! Stored results of a solve run.

use serde::{Deserialize, Serialize};

use crate::assembly::Assembly;
use crate::disassembly::{Disassembly, Separation, SeparationInfo};

/// The disassembly kept with a solution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisassemblyRecord {
    Full(Separation),
    Info(SeparationInfo),
}

impl DisassemblyRecord {
    pub fn as_disassembly(&self) -> &dyn Disassembly {
        match self {
            DisassemblyRecord::Full(separation) => separation,
            DisassemblyRecord::Info(info) => info,
        }
    }
}

/// An assembly, numbered in discovery order, with its disassembly if one
/// was searched for and found.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Solution {
    pub assembly: Assembly,
    /// Number of the assembly among all assemblies found, from 0.
    pub assembly_number: u64,
    /// Number among the disassemblable assemblies, when disassembled.
    #[serde(default)]
    pub solution_number: Option<u64>,
    #[serde(default)]
    pub disassembly: Option<DisassemblyRecord>,
}

impl Solution {
    pub fn new(assembly: Assembly, assembly_number: u64) -> Self {
        Self {
            assembly,
            assembly_number,
            solution_number: None,
            disassembly: None,
        }
    }

    pub fn with_disassembly(mut self, solution_number: u64, disassembly: DisassemblyRecord) -> Self {
        self.solution_number = Some(solution_number);
        self.disassembly = Some(disassembly);
        self
    }

    pub fn disassembly(&self) -> Option<&dyn Disassembly> {
        self.disassembly.as_ref().map(DisassemblyRecord::as_disassembly)
    }

    pub fn separation(&self) -> Option<&Separation> {
        match &self.disassembly {
            Some(DisassemblyRecord::Full(separation)) => Some(separation),
            _ => None,
        }
    }

    /// Replaces a full disassembly by its move counts.
    pub fn drop_states(&mut self) {
        if let Some(DisassemblyRecord::Full(separation)) = &self.disassembly {
            self.disassembly = Some(DisassemblyRecord::Info(SeparationInfo::from(separation)));
        }
    }

    pub fn remove_pieces(&mut self, from: usize, count: usize) {
        self.assembly.remove_pieces(from, count);
        if let Some(DisassemblyRecord::Full(separation)) = &mut self.disassembly {
            separation.remove_pieces(from as u16, count as u16);
        }
    }

    pub fn add_non_placed_pieces(&mut self, from: usize, count: usize) {
        self.assembly.add_non_placed_pieces(from, count);
        if let Some(DisassemblyRecord::Full(separation)) = &mut self.disassembly {
            separation.add_non_placed_pieces(from as u16, count as u16);
        }
    }
}
