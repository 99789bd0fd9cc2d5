//! End-to-end: compile fixture programs and check their disassembly dumps.

use std::path::{Path, PathBuf};

use jitdump::jit::{CompiledCode, JitCompiler, RegionKind, data_log};
use jitdump::{CodeBlock, Program, RuntimeConfig};

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/programs")
        .join(name)
}

fn fixed_base() -> RuntimeConfig {
    RuntimeConfig {
        base_address: Some(0x10000),
        ..RuntimeConfig::default()
    }
}

fn compile(name: &str) -> (CodeBlock, CompiledCode) {
    let program = Program::load(&fixture("sum.toml")).unwrap();
    let block = program.get(name).unwrap().clone();
    let compiled = JitCompiler::new(&fixed_base()).compile(&block).unwrap();
    (block, compiled)
}

fn dump_text(block: &CodeBlock, compiled: &CompiledCode) -> String {
    let mut out = Vec::new();
    compiled.dump_disassembly(&mut out, block).unwrap();
    String::from_utf8(out).unwrap()
}

#[test]
fn test_dump_header_and_markers() {
    let (block, compiled) = compile("sum");
    let text = dump_text(&block, &compiled);
    let lines: Vec<&str> = text.lines().collect();

    assert_eq!(lines[0], "Baseline JIT code for CodeBlock sum, instruction count = 21");
    assert_eq!(
        lines[1],
        format!("   Code at [0x10000, {:#x}):", 0x10000 + compiled.link.debug_size())
    );
    assert_eq!(lines[2], "        0x10000: push rbp");
    assert_eq!(lines.iter().filter(|l| **l == "    (End Of Main Path)").count(), 1);
    assert_eq!(lines.iter().filter(|l| **l == "    (End Of Slow Path)").count(), 1);
    let last = format!("        {:#x}: ret", 0x10000 + compiled.link.debug_size() - 1);
    assert_eq!(lines.last(), Some(&last.as_str()));
    assert!(!text.contains(".byte"), "undecoded bytes in:\n{}", text);
}

#[test]
fn test_every_instruction_annotated_in_order() {
    let (block, compiled) = compile("sum");
    let text = dump_text(&block, &compiled);

    let (main, slow) = text.split_once("    (End Of Main Path)\n").unwrap();
    let main_annotations: Vec<&str> = main
        .lines()
        .filter(|l| l.starts_with("    ["))
        .collect();
    let expected: Vec<String> = block
        .code
        .iter()
        .enumerate()
        .map(|(i, op)| format!("    [{:4}] {}", i, op))
        .collect();
    assert_eq!(main_annotations, expected);

    let slow_annotations: Vec<&str> = slow
        .lines()
        .filter(|l| l.starts_with("    (S) "))
        .collect();
    assert_eq!(
        slow_annotations,
        vec![
            "    (S) [   6] lt",
            "    (S) [   7] jmp_if_false 19",
            "    (S) [  10] add",
            "    (S) [  14] add",
        ]
    );
}

#[test]
fn test_regions_cover_code_without_gaps() {
    for name in ["sum", "flags"] {
        let (_, compiled) = compile(name);
        let layout = compiled.layout();

        let mut cursor = layout.code_start.address();
        for region in layout.regions() {
            assert_eq!(region.start.address(), cursor, "{}: gap before {:?}", name, region);
            cursor = region.end.address();
        }
        assert_eq!(cursor, layout.code_start.address() + layout.code_size);
    }
}

#[test]
fn test_nop_regions_are_empty() {
    let (block, compiled) = compile("sum");
    let layout = compiled.layout();

    assert!(layout.main_path[16].is_empty());
    assert!(layout.main_path[18].is_empty());
    assert_eq!(layout.main_path.iter().filter(|r| r.is_empty()).count(), 2);

    let text = dump_text(&block, &compiled);
    assert!(text.contains("    [  16] nop\n    [  17] jmp 4\n"));
}

#[test]
fn test_branches_target_main_path_labels() {
    let (block, compiled) = compile("sum");
    let layout = compiled.layout();
    let text = dump_text(&block, &compiled);

    // `jmp 4` is a single jmp to the main-path code of instruction 4.
    let loop_head = layout.main_path[4].start;
    let jmp_line = format!("{}: jmp {}", layout.main_path[17].start, loop_head);
    assert!(text.contains(&jmp_line), "missing `{}` in:\n{}", jmp_line, text);
}

#[test]
fn test_slow_paths_jump_back_to_next_instruction() {
    let (_, compiled) = compile("flags");
    let layout = compiled.layout();

    let slow: Vec<_> = layout
        .slow_path
        .iter()
        .map(|r| {
            assert_eq!(r.kind, RegionKind::SlowPath);
            r.bytecode_index
        })
        .collect();
    assert_eq!(slow, vec![Some(1), Some(4), Some(8)]);

    // The last main region stops at the first slow region.
    assert_eq!(layout.main_path.last().unwrap().end, layout.slow_path[0].start);
}

#[test]
fn test_dump_is_reproducible_at_fixed_base() {
    let (block, first) = compile("flags");
    let (_, second) = compile("flags");
    assert_eq!(dump_text(&block, &first), dump_text(&block, &second));
    assert_eq!(first.link.code(), second.link.code());
}

#[test]
fn test_show_disassembly_writes_data_file() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("jit.log");
    data_log::set_data_file(&log).unwrap();

    let program = Program::load(&fixture("sum.toml")).unwrap();
    let config = RuntimeConfig {
        show_disassembly: true,
        ..fixed_base()
    };
    let compiler = JitCompiler::new(&config);
    for block in &program.functions {
        compiler.compile(block).unwrap();
    }
    data_log::reset_to_stderr().unwrap();

    let text = std::fs::read_to_string(&log).unwrap();
    assert!(text.contains("Baseline JIT code for CodeBlock sum, instruction count = 21\n"));
    assert!(text.contains("Baseline JIT code for CodeBlock flags, instruction count = 10\n"));
    assert_eq!(text.matches("    (End Of Slow Path)\n").count(), 2);
}

#[test]
fn test_layout_json() {
    let (_, compiled) = compile("flags");
    let json = serde_json::to_value(compiled.layout()).unwrap();

    assert_eq!(json["code_start"], 0x10000);
    assert_eq!(json["prologue"]["kind"], "prologue");
    assert_eq!(json["main_path"].as_array().unwrap().len(), 10);
    assert_eq!(json["slow_path"][2]["bytecode_index"], 8);
    assert_eq!(json["epilogue"]["kind"], "epilogue");
}
