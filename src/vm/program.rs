//! Program files: a TOML list of code blocks in textual bytecode.
//!
//! ```toml
//! [[function]]
//! name = "count"
//! locals = 1
//! code = ["push_int 0", "store_local 0", "load_local 0", "ret"]
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use super::ops::{Op, ParseOpError};
use super::CodeBlock;

#[derive(Debug, thiserror::Error)]
pub enum ProgramError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse program: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("function '{function}', instruction {index} (`{text}`): {source}")]
    Instruction {
        function: String,
        index: usize,
        text: String,
        source: ParseOpError,
    },
    #[error("duplicate function '{0}'")]
    DuplicateFunction(String),
    #[error("no function named '{0}'")]
    UnknownFunction(String),
    #[error("program defines no functions")]
    Empty,
}

/// On-disk form of a program.
#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct ProgramFile {
    #[serde(default, rename = "function")]
    functions: Vec<FunctionEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct FunctionEntry {
    name: String,
    #[serde(default)]
    arity: usize,
    #[serde(default)]
    locals: usize,
    code: Vec<String>,
}

/// A set of code blocks, in file order.
#[derive(Debug, Clone, Default)]
pub struct Program {
    pub functions: Vec<CodeBlock>,
}

impl Program {
    /// Load a program from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ProgramError> {
        let content = fs::read_to_string(path).map_err(|source| ProgramError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ProgramError> {
        let file: ProgramFile = toml::from_str(content)?;
        if file.functions.is_empty() {
            return Err(ProgramError::Empty);
        }
        let mut functions: Vec<CodeBlock> = Vec::with_capacity(file.functions.len());

        for entry in file.functions {
            if functions.iter().any(|f| f.name == entry.name) {
                return Err(ProgramError::DuplicateFunction(entry.name));
            }

            let mut code = Vec::with_capacity(entry.code.len());
            for (index, text) in entry.code.iter().enumerate() {
                let op: Op = text.parse().map_err(|source| ProgramError::Instruction {
                    function: entry.name.clone(),
                    index,
                    text: text.clone(),
                    source,
                })?;
                code.push(op);
            }

            functions.push(CodeBlock {
                name: entry.name,
                arity: entry.arity,
                locals_count: entry.locals,
                code,
            });
        }

        Ok(Self { functions })
    }

    /// Render back to the TOML form accepted by `from_toml_str`.
    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        let file = ProgramFile {
            functions: self
                .functions
                .iter()
                .map(|f| FunctionEntry {
                    name: f.name.clone(),
                    arity: f.arity,
                    locals: f.locals_count,
                    code: f.code.iter().map(Op::to_string).collect(),
                })
                .collect(),
        };
        toml::to_string_pretty(&file)
    }

    pub fn get(&self, name: &str) -> Result<&CodeBlock, ProgramError> {
        self.functions
            .iter()
            .find(|f| f.name == name)
            .ok_or_else(|| ProgramError::UnknownFunction(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[[function]]
name = "answer"
code = ["push_int 42", "ret"]

[[function]]
name = "negate"
arity = 1
locals = 1
code = ["load_local 0", "neg", "ret"]
"#;

    #[test]
    fn test_parse_program() {
        let program = Program::from_toml_str(SAMPLE).unwrap();
        assert_eq!(program.functions.len(), 2);
        assert_eq!(program.functions[0].code, vec![Op::PushInt(42), Op::Ret]);

        let negate = program.get("negate").unwrap();
        assert_eq!(negate.arity, 1);
        assert_eq!(negate.locals_count, 1);
        assert_eq!(negate.code[1], Op::Neg);
    }

    #[test]
    fn test_unknown_function() {
        let program = Program::from_toml_str(SAMPLE).unwrap();
        assert!(matches!(
            program.get("missing"),
            Err(ProgramError::UnknownFunction(name)) if name == "missing"
        ));
    }

    #[test]
    fn test_bad_instruction_reports_position() {
        let err = Program::from_toml_str(
            r#"
[[function]]
name = "f"
code = ["push_int 1", "bogus", "ret"]
"#,
        )
        .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("function 'f'"), "{}", message);
        assert!(message.contains("instruction 1"), "{}", message);
        assert!(message.contains("bogus"), "{}", message);
    }

    #[test]
    fn test_duplicate_function() {
        let err = Program::from_toml_str(
            r#"
[[function]]
name = "f"
code = ["ret"]

[[function]]
name = "f"
code = ["ret"]
"#,
        )
        .unwrap_err();
        assert!(matches!(err, ProgramError::DuplicateFunction(name) if name == "f"));
    }

    #[test]
    fn test_unknown_keys_rejected() {
        let err = Program::from_toml_str(
            r#"
[jit]
show_disassembly = true
"#,
        )
        .unwrap_err();
        assert!(matches!(err, ProgramError::Parse(_)), "{}", err);

        let err = Program::from_toml_str(
            r#"
[[function]]
name = "f"
local = 1
code = ["ret"]
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("local"), "{}", err);
    }

    #[test]
    fn test_empty_program() {
        let err = Program::from_toml_str("").unwrap_err();
        assert!(matches!(err, ProgramError::Empty));
    }

    #[test]
    fn test_toml_round_trip() {
        let program = Program::from_toml_str(SAMPLE).unwrap();
        let text = program.to_toml_string().unwrap();
        let reparsed = Program::from_toml_str(&text).unwrap();
        assert_eq!(reparsed.functions, program.functions);
    }
}
