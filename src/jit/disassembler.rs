//! Bytecode-annotated disassembly of baseline JIT code.
//!
//! The compiler records, for every bytecode instruction, where its code
//! starts on the main path and (if it has one) on the slow path. After
//! linking, those labels carve the finalized code into regions:
//!
//! ```text
//! [start_of_code, first main label)            prologue
//! [main[i], next main label | slow entry)      one region per set main label
//! [slow[i], next slow label | end_of_slow)     one region per set slow label
//! [end_of_slow_path, end_of_code)              epilogue
//! ```
//!
//! `dump` prints each region's machine code under the instruction that
//! produced it.

use std::io::{self, Write};

use serde::Serialize;

use super::codebuf::Label;
use super::data_log;
use super::link::{CodeLocation, LinkBuffer};
use super::x86_64_disasm;
use crate::vm::InstructionFormatter;

const MAIN_PATH_PREFIX: &str = "    ";
const SLOW_PATH_PREFIX: &str = "    (S) ";
const CODE_PREFIX: &str = "        ";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RegionKind {
    Prologue,
    MainPath,
    SlowPath,
    Epilogue,
}

/// A resolved address range `[start, end)`.
///
/// `start >= end` is a legal, empty region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Region {
    pub kind: RegionKind,
    /// The instruction the region is attributed to. `None` for the
    /// prologue and epilogue.
    pub bytecode_index: Option<usize>,
    pub start: CodeLocation,
    pub end: CodeLocation,
}

impl Region {
    pub fn len(&self) -> usize {
        self.end.address().saturating_sub(self.start.address())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Every region a dump visits, in visit order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DisassemblyLayout {
    pub code_start: CodeLocation,
    pub code_size: usize,
    pub prologue: Region,
    pub main_path: Vec<Region>,
    pub slow_path: Vec<Region>,
    pub epilogue: Region,
}

impl DisassemblyLayout {
    pub fn regions(&self) -> impl Iterator<Item = &Region> {
        std::iter::once(&self.prologue)
            .chain(&self.main_path)
            .chain(&self.slow_path)
            .chain(std::iter::once(&self.epilogue))
    }
}

/// Label tables for one compiled code block.
#[derive(Debug, Clone)]
pub struct JitDisassembler {
    main_path: Vec<Option<Label>>,
    slow_path: Vec<Option<Label>>,
    start_of_code: Option<Label>,
    end_of_main_path: Option<Label>,
    end_of_slow_path: Option<Label>,
    end_of_code: Option<Label>,
}

impl JitDisassembler {
    pub fn new(instruction_count: usize) -> Self {
        Self {
            main_path: vec![None; instruction_count],
            slow_path: vec![None; instruction_count],
            start_of_code: None,
            end_of_main_path: None,
            end_of_slow_path: None,
            end_of_code: None,
        }
    }

    pub fn instruction_count(&self) -> usize {
        self.main_path.len()
    }

    pub fn set_start_of_code(&mut self, label: Label) {
        self.start_of_code = Some(label);
    }

    pub fn set_for_bytecode_main_path(&mut self, index: usize, label: Label) {
        self.check_index(index);
        self.main_path[index] = Some(label);
    }

    pub fn set_for_bytecode_slow_path(&mut self, index: usize, label: Label) {
        self.check_index(index);
        self.slow_path[index] = Some(label);
    }

    pub fn set_end_of_main_path(&mut self, label: Label) {
        self.end_of_main_path = Some(label);
    }

    pub fn set_end_of_slow_path(&mut self, label: Label) {
        self.end_of_slow_path = Some(label);
    }

    pub fn set_end_of_code(&mut self, label: Label) {
        self.end_of_code = Some(label);
    }

    /// Where the slow path begins. Recorded by the compiler; the dump
    /// itself derives the slow-path entry from the slow-path labels.
    pub fn end_of_main_path(&self) -> Option<Label> {
        self.end_of_main_path
    }

    fn check_index(&self, index: usize) {
        assert!(
            index < self.main_path.len(),
            "bytecode index {} out of range ({} instructions)",
            index,
            self.main_path.len()
        );
    }

    fn marker(label: Option<Label>, name: &str) -> Label {
        match label {
            Some(label) => label,
            None => panic!("JIT disassembly marker `{}` was never set", name),
        }
    }

    /// Resolve the label tables against finalized code.
    ///
    /// # Panics
    ///
    /// If a boundary marker is unset or any label lies outside `link`.
    pub fn layout(&self, link: &LinkBuffer) -> DisassemblyLayout {
        let start_of_code = link.location_of(Self::marker(self.start_of_code, "start_of_code"));
        let end_of_slow_path =
            link.location_of(Self::marker(self.end_of_slow_path, "end_of_slow_path"));
        let end_of_code = link.location_of(Self::marker(self.end_of_code, "end_of_code"));

        let prologue_end = first_set(&self.main_path)
            .map(|label| link.location_of(label))
            .unwrap_or(start_of_code);

        let slow_path_entry = first_set(&self.slow_path)
            .map(|label| link.location_of(label))
            .unwrap_or(end_of_slow_path);

        DisassemblyLayout {
            code_start: link.debug_address(),
            code_size: link.debug_size(),
            prologue: Region {
                kind: RegionKind::Prologue,
                bytecode_index: None,
                start: start_of_code,
                end: prologue_end,
            },
            main_path: walk(RegionKind::MainPath, &self.main_path, slow_path_entry, link),
            slow_path: walk(RegionKind::SlowPath, &self.slow_path, end_of_slow_path, link),
            epilogue: Region {
                kind: RegionKind::Epilogue,
                bytecode_index: None,
                start: end_of_slow_path,
                end: end_of_code,
            },
        }
    }

    /// Print the annotated disassembly of the code in `link`.
    ///
    /// # Panics
    ///
    /// On the same contract violations as `layout`, or if `code_block`
    /// does not have the instruction count the tables were built for.
    pub fn dump(
        &self,
        out: &mut dyn Write,
        code_block: &dyn InstructionFormatter,
        link: &LinkBuffer,
    ) -> io::Result<()> {
        assert_eq!(
            code_block.instruction_count(),
            self.instruction_count(),
            "code block '{}' does not match the label tables",
            code_block.name()
        );

        let layout = self.layout(link);

        writeln!(
            out,
            "Baseline JIT code for CodeBlock {}, instruction count = {}",
            code_block.name(),
            code_block.instruction_count()
        )?;
        writeln!(
            out,
            "   Code at [{}, {}):",
            link.debug_address(),
            link.debug_end()
        )?;

        dump_region(out, link, &layout.prologue)?;
        dump_path(out, MAIN_PATH_PREFIX, &layout.main_path, code_block, link)?;
        writeln!(out, "    (End Of Main Path)")?;
        dump_path(out, SLOW_PATH_PREFIX, &layout.slow_path, code_block, link)?;
        writeln!(out, "    (End Of Slow Path)")?;
        dump_region(out, link, &layout.epilogue)?;

        out.flush()
    }

    /// `dump` to the process-wide data file.
    pub fn dump_to_data_file(
        &self,
        code_block: &dyn InstructionFormatter,
        link: &LinkBuffer,
    ) -> io::Result<()> {
        data_log::with_data_file(|out| self.dump(out, code_block, link))
    }
}

fn first_set(labels: &[Option<Label>]) -> Option<Label> {
    labels.iter().flatten().next().copied()
}

/// One region per set label, each ending at the next set label, the last
/// one ending at `terminator`.
fn walk(
    kind: RegionKind,
    labels: &[Option<Label>],
    terminator: CodeLocation,
    link: &LinkBuffer,
) -> Vec<Region> {
    let mut set = labels
        .iter()
        .enumerate()
        .filter_map(|(index, label)| label.map(|label| (index, label)))
        .peekable();

    let mut regions = Vec::new();
    while let Some((index, label)) = set.next() {
        let end = match set.peek() {
            Some(&(_, next)) => link.location_of(next),
            None => terminator,
        };
        regions.push(Region {
            kind,
            bytecode_index: Some(index),
            start: link.location_of(label),
            end,
        });
    }
    regions
}

fn dump_path(
    out: &mut dyn Write,
    prefix: &str,
    regions: &[Region],
    code_block: &dyn InstructionFormatter,
    link: &LinkBuffer,
) -> io::Result<()> {
    for region in regions {
        if let Some(index) = region.bytecode_index {
            writeln!(out, "{}{}", prefix, code_block.format_instruction(index))?;
        }
        dump_region(out, link, region)?;
    }
    Ok(())
}

fn dump_region(out: &mut dyn Write, link: &LinkBuffer, region: &Region) -> io::Result<()> {
    let range = link.code_range(region.start, region.end);
    x86_64_disasm::disassemble(&range, CODE_PREFIX, out)
}
