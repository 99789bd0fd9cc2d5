use std::path::{Path, PathBuf};
use std::process::Command;

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/programs")
        .join(name)
}

fn run_jitdump(args: &[&str]) -> (String, String, bool) {
    let output = Command::new(env!("CARGO_BIN_EXE_jitdump"))
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("failed to execute jitdump");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

fn assert_success(args: &[&str]) -> String {
    let (stdout, stderr, success) = run_jitdump(args);
    assert!(success, "jitdump {:?} should succeed, stderr:\n{}", args, stderr);
    stdout
}

fn assert_failure(args: &[&str]) -> String {
    let (_, stderr, success) = run_jitdump(args);
    assert!(!success, "jitdump {:?} should fail", args);
    stderr
}

#[test]
fn test_dump_text() {
    let sum = fixture("sum.toml");
    let stdout = assert_success(&["dump", sum.to_str().unwrap(), "--base-address", "0x10000"]);

    assert!(stdout.starts_with("Baseline JIT code for CodeBlock sum, instruction count = 21\n"));
    assert!(stdout.contains("   Code at [0x10000, "));
    assert!(stdout.contains("\n\nBaseline JIT code for CodeBlock flags, instruction count = 10\n"));
    assert_eq!(stdout.matches("    (End Of Main Path)\n").count(), 2);
}

#[test]
fn test_dump_single_function_is_deterministic() {
    let sum = fixture("sum.toml");
    let args = [
        "dump",
        sum.to_str().unwrap(),
        "--function",
        "flags",
        "--base-address",
        "65536",
    ];
    let first = assert_success(&args);
    let second = assert_success(&args);

    assert_eq!(first, second);
    assert!(first.starts_with("Baseline JIT code for CodeBlock flags"));
    assert!(!first.contains("CodeBlock sum"));
    assert!(first.contains("    (S) [   8] neg\n"));
}

#[test]
fn test_dump_json() {
    let sum = fixture("sum.toml");
    let stdout = assert_success(&[
        "dump",
        sum.to_str().unwrap(),
        "--format",
        "json",
        "--base-address",
        "0x10000",
    ]);

    let json: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    let functions = json.as_array().unwrap();
    assert_eq!(functions.len(), 2);
    assert_eq!(functions[0]["function"], "sum");
    assert_eq!(functions[0]["instruction_count"], 21);
    assert_eq!(functions[0]["code_start"], 0x10000);
    assert_eq!(functions[0]["main_path"].as_array().unwrap().len(), 21);
    assert_eq!(functions[1]["slow_path"].as_array().unwrap().len(), 3);
}

#[test]
fn test_dump_to_output_file() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("sum.txt");
    let sum = fixture("sum.toml");

    let stdout = assert_success(&[
        "dump",
        sum.to_str().unwrap(),
        "-f",
        "sum",
        "-o",
        out.to_str().unwrap(),
    ]);
    assert!(stdout.is_empty());

    let text = std::fs::read_to_string(&out).unwrap();
    assert!(text.starts_with("Baseline JIT code for CodeBlock sum"));
    assert!(text.ends_with("ret\n"));
}

#[test]
fn test_config_file_enables_data_file() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("jitdump.toml");
    std::fs::copy(fixture("jitdump.toml"), &config).unwrap();
    let sum = fixture("sum.toml");

    let stdout = assert_success(&[
        "check",
        sum.to_str().unwrap(),
        "--config",
        config.to_str().unwrap(),
    ]);
    assert!(stdout.contains("ok: sum (21 instructions, "));
    assert!(stdout.contains("ok: flags (10 instructions, "));

    // data_file is relative to the config file.
    let log = std::fs::read_to_string(dir.path().join("jit.log")).unwrap();
    assert!(log.contains("   Code at [0x10000, "));
    assert!(log.contains("CodeBlock flags"));
}

#[test]
fn test_bytecode_listing() {
    let stdout = assert_success(&["bytecode", fixture("sum.toml").to_str().unwrap()]);

    assert!(stdout.starts_with("== Function[0]: sum (arity: 0, locals: 2) ==\n"));
    assert!(stdout.contains("0017: jmp 4 ; loop\n"));
    assert!(stdout.contains("== Function[1]: flags (arity: 0, locals: 0) ==\n"));
}

#[test]
fn test_check_reports_verification_error() {
    let stderr = assert_failure(&["check", fixture("unbalanced.toml").to_str().unwrap()]);
    assert!(stderr.contains("function 'underflow'"), "stderr:\n{}", stderr);
    assert!(stderr.contains("stack underflow at pc=1"), "stderr:\n{}", stderr);
}

#[test]
fn test_bad_instruction() {
    let stderr = assert_failure(&["bytecode", fixture("bad_op.toml").to_str().unwrap()]);
    assert!(stderr.contains("frobnicate"), "stderr:\n{}", stderr);
}

#[test]
fn test_unknown_function() {
    let sum = fixture("sum.toml");
    let stderr = assert_failure(&["dump", sum.to_str().unwrap(), "--function", "missing"]);
    assert!(stderr.contains("no function named 'missing'"));
}

#[test]
fn test_invalid_base_address() {
    let sum = fixture("sum.toml");
    let stderr = assert_failure(&["dump", sum.to_str().unwrap(), "--base-address", "0xnope"]);
    assert!(stderr.contains("invalid base address '0xnope'"));
}

#[test]
fn test_base_address_without_room_for_code() {
    let sum = fixture("sum.toml");
    let stderr = assert_failure(&[
        "dump",
        sum.to_str().unwrap(),
        "--base-address",
        "0xffffffffffffffff",
    ]);
    assert!(stderr.contains("leaves no room"), "stderr:\n{}", stderr);
    assert!(!stderr.contains("panicked"), "stderr:\n{}", stderr);
}

#[test]
fn test_config_file_is_not_a_program() {
    let stderr = assert_failure(&["dump", fixture("jitdump.toml").to_str().unwrap()]);
    assert!(stderr.contains("error: failed to parse program"), "stderr:\n{}", stderr);
}

#[test]
fn test_dump_leaves_data_file_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("jitdump.toml");
    std::fs::copy(fixture("jitdump.toml"), &config).unwrap();
    let log = dir.path().join("jit.log");
    std::fs::write(&log, "earlier run\n").unwrap();
    let sum = fixture("sum.toml");

    let stdout = assert_success(&[
        "dump",
        sum.to_str().unwrap(),
        "--config",
        config.to_str().unwrap(),
    ]);
    assert!(stdout.contains("   Code at [0x10000, "));
    assert_eq!(std::fs::read_to_string(&log).unwrap(), "earlier run\n");
}
