//! Deterministic-execution validator
//!
//! Every node must accept or reject the same bytes the same way, so
//! rejections are enumerated reasons with stable numeric codes. All reasons
//! are collected: module-level checks first, then each method in table order.

use crate::module::{Method, ModuleDescription, DEFAULT_BASE_TYPE};
use crate::opcode::Instruction;
use std::collections::HashSet;
use std::fmt;
use tracing::{debug, warn};

/// Default maximum encoded module size
pub const DEFAULT_MAX_CODE_SIZE: usize = 24_576;

/// Class of non-deterministic host facility
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NonDeterminism {
    /// `clock.*`
    WallClock,
    /// `random.*`
    RandomSource,
    /// `fs.*`, `net.*`
    ExternalIo,
    /// `reflect.*`
    Reflection,
}

impl NonDeterminism {
    fn classify(import: &str) -> Option<Self> {
        let prefix = import.split('.').next().unwrap_or_default();
        match prefix {
            "clock" => Some(Self::WallClock),
            "random" => Some(Self::RandomSource),
            "fs" | "net" => Some(Self::ExternalIo),
            "reflect" => Some(Self::Reflection),
            _ => None,
        }
    }
}

/// Why a module was rejected
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationReason {
    /// Contract type name is empty
    MissingTypeName,
    /// Type does not derive from the base contract
    InvalidBaseType {
        /// Base type found in the module
        found: String,
    },
    /// Import of a non-deterministic facility
    NonDeterministicImport {
        /// Import name
        import: String,
        /// Facility class
        kind: NonDeterminism,
    },
    /// Import name is not a known host function
    UnknownImport {
        /// Import name
        import: String,
    },
    /// Floating point instruction
    FloatingPoint {
        /// Method name
        method: String,
        /// Instruction index
        at: usize,
    },
    /// Instruction only the injector may write
    ReservedInstruction {
        /// Method name
        method: String,
        /// Instruction index
        at: usize,
    },
    /// Jump outside the method
    JumpOutOfRange {
        /// Method name
        method: String,
        /// Instruction index
        at: usize,
        /// Offending target
        target: u32,
    },
    /// Call to a method index that does not exist
    UnknownMethodIndex {
        /// Method name
        method: String,
        /// Instruction index
        at: usize,
        /// Offending index
        index: u16,
    },
    /// Host call to an import index that does not exist
    UnknownImportIndex {
        /// Method name
        method: String,
        /// Instruction index
        at: usize,
        /// Offending index
        index: u16,
    },
    /// Argument index beyond the parameter count
    ArgumentOutOfRange {
        /// Method name
        method: String,
        /// Instruction index
        at: usize,
        /// Offending index
        index: u8,
    },
    /// Local index beyond the local count
    LocalOutOfRange {
        /// Method name
        method: String,
        /// Instruction index
        at: usize,
        /// Offending index
        index: u8,
    },
    /// Method takes part in a call cycle
    Recursion {
        /// Method name
        method: String,
    },
    /// More than one initializer
    MultipleInitializers {
        /// Second and later initializer
        method: String,
    },
    /// Method name used twice
    DuplicateMethod {
        /// Method name
        method: String,
    },
    /// Module has no methods
    NoMethods,
    /// Method can run past its last instruction
    FallsThrough {
        /// Method name
        method: String,
    },
    /// Module exceeds the size limit
    CodeTooLarge {
        /// Encoded size
        size: usize,
        /// Limit
        limit: usize,
    },
    /// Module already carries metering
    PreInstrumented,
}

impl ValidationReason {
    /// Stable numeric code
    pub fn code(&self) -> u16 {
        match self {
            Self::MissingTypeName => 1,
            Self::InvalidBaseType { .. } => 2,
            Self::NonDeterministicImport { .. } => 3,
            Self::UnknownImport { .. } => 4,
            Self::FloatingPoint { .. } => 5,
            Self::ReservedInstruction { .. } => 6,
            Self::JumpOutOfRange { .. } => 7,
            Self::UnknownMethodIndex { .. } => 8,
            Self::UnknownImportIndex { .. } => 9,
            Self::ArgumentOutOfRange { .. } => 10,
            Self::LocalOutOfRange { .. } => 11,
            Self::Recursion { .. } => 12,
            Self::MultipleInitializers { .. } => 13,
            Self::DuplicateMethod { .. } => 14,
            Self::NoMethods => 15,
            Self::FallsThrough { .. } => 16,
            Self::CodeTooLarge { .. } => 17,
            Self::PreInstrumented => 18,
        }
    }
}

impl fmt::Display for ValidationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] ", self.code())?;
        match self {
            Self::MissingTypeName => write!(f, "missing type name"),
            Self::InvalidBaseType { found } => write!(f, "invalid base type {:?}", found),
            Self::NonDeterministicImport { import, kind } => {
                write!(f, "non-deterministic import {} ({:?})", import, kind)
            }
            Self::UnknownImport { import } => write!(f, "unknown import {}", import),
            Self::FloatingPoint { method, at } => {
                write!(f, "floating point in {} at {}", method, at)
            }
            Self::ReservedInstruction { method, at } => {
                write!(f, "reserved instruction in {} at {}", method, at)
            }
            Self::JumpOutOfRange { method, at, target } => {
                write!(f, "jump to {} out of range in {} at {}", target, method, at)
            }
            Self::UnknownMethodIndex { method, at, index } => {
                write!(f, "unknown method {} called in {} at {}", index, method, at)
            }
            Self::UnknownImportIndex { method, at, index } => {
                write!(f, "unknown import {} used in {} at {}", index, method, at)
            }
            Self::ArgumentOutOfRange { method, at, index } => {
                write!(f, "argument {} out of range in {} at {}", index, method, at)
            }
            Self::LocalOutOfRange { method, at, index } => {
                write!(f, "local {} out of range in {} at {}", index, method, at)
            }
            Self::Recursion { method } => write!(f, "recursive method {}", method),
            Self::MultipleInitializers { method } => {
                write!(f, "second initializer {}", method)
            }
            Self::DuplicateMethod { method } => write!(f, "duplicate method {}", method),
            Self::NoMethods => write!(f, "no methods"),
            Self::FallsThrough { method } => write!(f, "method {} falls through", method),
            Self::CodeTooLarge { size, limit } => {
                write!(f, "code size {} exceeds {}", size, limit)
            }
            Self::PreInstrumented => write!(f, "module is already instrumented"),
        }
    }
}

/// Outcome of validation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationResult {
    /// Every rejection reason, in deterministic order
    pub reasons: Vec<ValidationReason>,
}

impl ValidationResult {
    /// True if no reason was found
    pub fn is_valid(&self) -> bool {
        self.reasons.is_empty()
    }

    /// Numeric codes of all reasons
    pub fn codes(&self) -> Vec<u16> {
        self.reasons.iter().map(ValidationReason::code).collect()
    }
}

/// Module validator
#[derive(Debug, Clone)]
pub struct Validator {
    base_type: String,
    max_code_size: usize,
}

impl Default for Validator {
    fn default() -> Self {
        Self::new(DEFAULT_BASE_TYPE, DEFAULT_MAX_CODE_SIZE)
    }
}

impl Validator {
    /// Validator requiring `base_type` and at most `max_code_size` bytes
    pub fn new(base_type: &str, max_code_size: usize) -> Self {
        Self {
            base_type: base_type.to_string(),
            max_code_size,
        }
    }

    /// Inspect a decompiled module
    pub fn validate(&self, module: &ModuleDescription) -> ValidationResult {
        let mut reasons = Vec::new();

        self.check_module(module, &mut reasons);
        for method in &module.methods {
            check_method(module, method, &mut reasons);
        }
        check_recursion(module, &mut reasons);

        let result = ValidationResult { reasons };
        if result.is_valid() {
            debug!(
                contract = %module.contract_type,
                methods = module.methods.len(),
                "Module accepted"
            );
        } else {
            warn!(
                contract = %module.contract_type,
                codes = ?result.codes(),
                "Module rejected"
            );
        }
        result
    }

    fn check_module(&self, module: &ModuleDescription, reasons: &mut Vec<ValidationReason>) {
        if module.contract_type.is_empty() {
            reasons.push(ValidationReason::MissingTypeName);
        }
        if module.base_type != self.base_type || module.contract_type == module.base_type {
            reasons.push(ValidationReason::InvalidBaseType {
                found: module.base_type.clone(),
            });
        }
        if module.code_size > self.max_code_size {
            reasons.push(ValidationReason::CodeTooLarge {
                size: module.code_size,
                limit: self.max_code_size,
            });
        }
        if module.instrumented {
            reasons.push(ValidationReason::PreInstrumented);
        }

        for import in &module.imports {
            if let Some(kind) = NonDeterminism::classify(&import.name) {
                reasons.push(ValidationReason::NonDeterministicImport {
                    import: import.name.clone(),
                    kind,
                });
            } else if import.host.is_none() {
                reasons.push(ValidationReason::UnknownImport {
                    import: import.name.clone(),
                });
            }
        }

        if module.methods.is_empty() {
            reasons.push(ValidationReason::NoMethods);
        }

        let mut seen = HashSet::new();
        let mut initializer_seen = false;
        for method in &module.methods {
            if !seen.insert(method.name.as_str()) {
                reasons.push(ValidationReason::DuplicateMethod {
                    method: method.name.clone(),
                });
            }
            if method.attributes.is_initializer() {
                if initializer_seen {
                    reasons.push(ValidationReason::MultipleInitializers {
                        method: method.name.clone(),
                    });
                }
                initializer_seen = true;
            }
        }
    }
}

fn check_method(module: &ModuleDescription, method: &Method, reasons: &mut Vec<ValidationReason>) {
    let name = || method.name.clone();
    let len = method.code.len();

    for (at, instruction) in method.code.iter().enumerate() {
        match instruction {
            Instruction::FloatAdd | Instruction::FloatMul | Instruction::FloatDiv => {
                reasons.push(ValidationReason::FloatingPoint { method: name(), at });
            }
            Instruction::Gas(_) => {
                reasons.push(ValidationReason::ReservedInstruction { method: name(), at });
            }
            Instruction::Jump(target) | Instruction::JumpIf(target) => {
                if *target as usize >= len {
                    reasons.push(ValidationReason::JumpOutOfRange {
                        method: name(),
                        at,
                        target: *target,
                    });
                }
            }
            Instruction::Call(index) => {
                if usize::from(*index) >= module.methods.len() {
                    reasons.push(ValidationReason::UnknownMethodIndex {
                        method: name(),
                        at,
                        index: *index,
                    });
                }
            }
            Instruction::Host(index) => {
                if usize::from(*index) >= module.imports.len() {
                    reasons.push(ValidationReason::UnknownImportIndex {
                        method: name(),
                        at,
                        index: *index,
                    });
                }
            }
            Instruction::LoadArg(index) => {
                if *index >= method.params {
                    reasons.push(ValidationReason::ArgumentOutOfRange {
                        method: name(),
                        at,
                        index: *index,
                    });
                }
            }
            Instruction::LoadLocal(index) | Instruction::StoreLocal(index) => {
                if *index >= method.locals {
                    reasons.push(ValidationReason::LocalOutOfRange {
                        method: name(),
                        at,
                        index: *index,
                    });
                }
            }
            _ => {}
        }
    }

    let ends_cleanly = matches!(
        method.code.last(),
        Some(Instruction::Return | Instruction::Stop | Instruction::Abort | Instruction::Jump(_))
    );
    if !ends_cleanly {
        reasons.push(ValidationReason::FallsThrough { method: name() });
    }
}

/// Flag every method that can reach itself through `Call`
fn check_recursion(module: &ModuleDescription, reasons: &mut Vec<ValidationReason>) {
    let count = module.methods.len();
    let edges: Vec<Vec<usize>> = module
        .methods
        .iter()
        .map(|method| {
            let mut callees: Vec<usize> = method
                .code
                .iter()
                .filter_map(|i| match i {
                    Instruction::Call(index) => Some(usize::from(*index)),
                    _ => None,
                })
                .filter(|index| *index < count)
                .collect();
            callees.sort_unstable();
            callees.dedup();
            callees
        })
        .collect();

    for start in 0..count {
        let mut visited = vec![false; count];
        let mut stack = edges[start].clone();
        let mut cyclic = false;
        while let Some(node) = stack.pop() {
            if node == start {
                cyclic = true;
                break;
            }
            if !visited[node] {
                visited[node] = true;
                stack.extend(edges[node].iter().copied());
            }
        }
        if cyclic {
            reasons.push(ValidationReason::Recursion {
                method: module.methods[start].name.clone(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{MethodBuilder, ModuleBuilder};
    use crate::decode::decompile;

    fn validate(builder: ModuleBuilder) -> ValidationResult {
        let module = decompile(&builder.encode()).unwrap();
        Validator::default().validate(&module)
    }

    fn minimal() -> ModuleBuilder {
        ModuleBuilder::contract("Token").method(MethodBuilder::new("run").stop())
    }

    // ==================== Accept ====================

    #[test]
    fn test_minimal_module_is_valid() {
        let result = validate(minimal());
        assert!(result.is_valid(), "{:?}", result);
    }

    #[test]
    fn test_full_host_surface_is_valid() {
        let mut builder = ModuleBuilder::contract("Token");
        for host in crate::opcode::HostFunction::ALL {
            builder = builder.import(host.name());
        }
        let result = validate(builder.method(
            MethodBuilder::new("run")
                .params(1)
                .locals(1)
                .load_arg(0)
                .op(Instruction::StoreLocal(0))
                .op(Instruction::LoadLocal(0))
                .op(Instruction::JumpIf(5))
                .stop()
                .stop(),
        ));
        assert!(result.is_valid(), "{:?}", result);
    }

    // ==================== Module-level reasons ====================

    #[test]
    fn test_type_shape() {
        let result = validate(
            ModuleBuilder::contract("")
                .base("Object")
                .method(MethodBuilder::new("run").stop()),
        );
        assert_eq!(result.codes(), vec![1, 2]);

        let result = validate(
            ModuleBuilder::contract("SmartContract").method(MethodBuilder::new("run").stop()),
        );
        assert_eq!(result.codes(), vec![2]);
    }

    #[test]
    fn test_non_deterministic_imports() {
        let result = validate(
            minimal()
                .import("clock.now")
                .import("random.next")
                .import("fs.read")
                .import("net.connect")
                .import("reflect.type_of")
                .import("math.sqrt"),
        );
        let kinds: Vec<_> = result
            .reasons
            .iter()
            .filter_map(|r| match r {
                ValidationReason::NonDeterministicImport { kind, .. } => Some(*kind),
                _ => None,
            })
            .collect();
        assert_eq!(
            kinds,
            vec![
                NonDeterminism::WallClock,
                NonDeterminism::RandomSource,
                NonDeterminism::ExternalIo,
                NonDeterminism::ExternalIo,
                NonDeterminism::Reflection,
            ]
        );
        assert_eq!(result.codes(), vec![3, 3, 3, 3, 3, 4]);
    }

    #[test]
    fn test_no_methods() {
        assert_eq!(validate(ModuleBuilder::contract("Token")).codes(), vec![15]);
    }

    #[test]
    fn test_duplicates_and_initializers() {
        let result = validate(
            ModuleBuilder::contract("Token")
                .method(MethodBuilder::new("a").initializer().stop())
                .method(MethodBuilder::new("a").stop())
                .method(MethodBuilder::new("b").initializer().stop()),
        );
        assert_eq!(result.codes(), vec![14, 13]);
    }

    #[test]
    fn test_code_too_large() {
        let module = decompile(&minimal().encode()).unwrap();
        let result = Validator::new(DEFAULT_BASE_TYPE, 8).validate(&module);
        assert_eq!(
            result.reasons,
            vec![ValidationReason::CodeTooLarge {
                size: module.code_size,
                limit: 8
            }]
        );
    }

    #[test]
    fn test_pre_instrumented() {
        let result = validate(minimal().instrumented(true));
        assert_eq!(result.codes(), vec![18]);
    }

    // ==================== Method-level reasons ====================

    #[test]
    fn test_banned_instructions() {
        let result = validate(
            ModuleBuilder::contract("Token").method(
                MethodBuilder::new("run")
                    .op(Instruction::FloatMul)
                    .op(Instruction::Gas(5))
                    .stop(),
            ),
        );
        assert_eq!(
            result.reasons,
            vec![
                ValidationReason::FloatingPoint {
                    method: "run".into(),
                    at: 0
                },
                ValidationReason::ReservedInstruction {
                    method: "run".into(),
                    at: 1
                },
            ]
        );
    }

    #[test]
    fn test_index_checks() {
        let result = validate(
            ModuleBuilder::contract("Token").method(
                MethodBuilder::new("run")
                    .op(Instruction::JumpIf(99))
                    .call(4)
                    .host(0)
                    .load_arg(0)
                    .op(Instruction::LoadLocal(0))
                    .stop(),
            ),
        );
        assert_eq!(result.codes(), vec![7, 8, 9, 10, 11]);
    }

    #[test]
    fn test_falls_through() {
        let result = validate(
            ModuleBuilder::contract("Token")
                .method(MethodBuilder::new("empty"))
                .method(MethodBuilder::new("open").push_int(1)),
        );
        assert_eq!(result.codes(), vec![16, 16]);
    }

    #[test]
    fn test_recursion() {
        let result = validate(
            ModuleBuilder::contract("Token")
                .method(MethodBuilder::new("a").call(1).stop())
                .method(MethodBuilder::new("b").call(0).stop())
                .method(MethodBuilder::new("c").call(2).stop())
                .method(MethodBuilder::new("d").call(0).stop()),
        );
        assert_eq!(
            result.reasons,
            vec![
                ValidationReason::Recursion { method: "a".into() },
                ValidationReason::Recursion { method: "b".into() },
                ValidationReason::Recursion { method: "c".into() },
            ]
        );
    }

    #[test]
    fn test_validation_is_deterministic() {
        let builder = ModuleBuilder::contract("")
            .import("clock.now")
            .method(MethodBuilder::new("a").call(0).op(Instruction::FloatAdd));
        assert_eq!(validate(builder.clone()), validate(builder));
    }

    #[test]
    fn test_reason_display_carries_code() {
        let reason = ValidationReason::Recursion { method: "a".into() };
        assert_eq!(reason.to_string(), "[12] recursive method a");
    }
}
