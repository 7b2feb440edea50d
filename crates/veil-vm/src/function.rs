//! Function definitions and the registry value type
//!
//! Functions are registered once and read-only afterwards. VM functions
//! are held behind `Arc` so the dispatch loop resolves a name to a cheap
//! clone instead of copying instruction lists.

use crate::error::VmError;
use crate::foreign::ForeignFunction;
use rustc_hash::FxHashMap;
use std::sync::Arc;
use veil_types::Instruction;

/// An interpreted function definition.
#[derive(Debug, Clone, PartialEq)]
pub struct VMFunction {
    pub name: String,
    /// Parameter names, in binding order
    pub parameters: Vec<String>,
    /// Names this function expects to have captured for it
    pub upvalues: Vec<String>,
    /// Enclosing function, for lexically nested definitions
    pub parent: Option<String>,
    pub register_count: usize,
    pub instructions: Vec<Instruction>,
    /// Symbolic label -> instruction index
    pub labels: FxHashMap<String, usize>,
}

impl VMFunction {
    /// Resolve a symbolic jump target.
    pub fn label_target(&self, label: &str) -> Result<usize, VmError> {
        self.labels
            .get(label)
            .copied()
            .ok_or_else(|| VmError::UndefinedLabel(label.to_string()))
    }
}

/// A registry entry: either bytecode or a native implementation,
/// resolved once at call time.
#[derive(Clone)]
pub enum Function {
    VM(Arc<VMFunction>),
    Foreign(ForeignFunction),
}

impl Function {
    pub fn name(&self) -> &str {
        match self {
            Function::VM(function) => &function.name,
            Function::Foreign(function) => &function.name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use veil_types::Instruction;

    #[test]
    fn test_label_target() {
        let mut labels = FxHashMap::default();
        labels.insert("done".to_string(), 2);

        let function = VMFunction {
            name: "f".to_string(),
            parameters: vec![],
            upvalues: vec![],
            parent: None,
            register_count: 1,
            instructions: vec![
                Instruction::JMP("done".to_string()),
                Instruction::LDI(0, veil_types::Value::I64(0)),
                Instruction::RET(0),
            ],
            labels,
        };

        assert_eq!(function.label_target("done").unwrap(), 2);
        assert_eq!(
            function.label_target("missing"),
            Err(VmError::UndefinedLabel("missing".to_string()))
        );
    }
}
