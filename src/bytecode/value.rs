//! Runtime values for the Vesper VM.

use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::bytecode::builtins;
use crate::bytecode::chunk::{Closure, CompiledFunction};
use crate::error::RuntimeError;

/// A runtime value. Rc-backed variants make cloning cheap; values are
/// immutable once constructed (builtins like `push` allocate fresh
/// arrays).
#[derive(Debug, Clone)]
pub enum Value {
    Integer(i64),
    Boolean(bool),
    Null,
    Str(Rc<String>),
    Array(Rc<Vec<Value>>),
    Hash(Rc<IndexMap<HashKey, HashPair>>),
    /// A raw compiled body, as stored in the constant pool.
    Function(Rc<CompiledFunction>),
    /// The callable object on the stack.
    Closure(Rc<Closure>),
    /// Index into the shared builtin registry.
    Builtin(u16),
    /// Marker wrapping a value that must bubble out of the enclosing
    /// block. Part of the shared value vocabulary; the VM encodes returns
    /// in control flow instead of constructing these.
    ReturnValue(Box<Value>),
    /// In-band error value; the builtin-misuse return convention.
    Error(String),
}

impl Value {
    /// The type tag used in error messages and hash keys.
    pub fn type_tag(&self) -> &'static str {
        match self {
            Value::Integer(_) => "INTEGER",
            Value::Boolean(_) => "BOOLEAN",
            Value::Null => "NULL",
            Value::Str(_) => "STRING",
            Value::Array(_) => "ARRAY",
            Value::Hash(_) => "HASH",
            Value::Function(_) => "COMPILED_FUNCTION",
            Value::Closure(_) => "CLOSURE",
            Value::Builtin(_) => "BUILTIN",
            Value::ReturnValue(_) => "RETURN_VALUE",
            Value::Error(_) => "ERROR",
        }
    }

    /// Everything is truthy except false and null.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Boolean(b) => *b,
            Value::Null => false,
            _ => true,
        }
    }

    /// The hash key for this value, or an error for unhashable types.
    pub fn hash_key(&self) -> Result<HashKey, RuntimeError> {
        match self {
            Value::Integer(n) => Ok(HashKey {
                type_tag: self.type_tag(),
                value: *n as u64,
            }),
            Value::Boolean(b) => Ok(HashKey {
                type_tag: self.type_tag(),
                value: u64::from(*b),
            }),
            Value::Str(s) => Ok(HashKey {
                type_tag: self.type_tag(),
                value: fnv1a_64(s.as_bytes()),
            }),
            other => Err(RuntimeError::UnusableHashKey(other.type_tag())),
        }
    }

    /// The display string the REPL prints.
    pub fn inspect(&self) -> String {
        self.to_string()
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Null, Value::Null) => true,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => Rc::ptr_eq(a, b),
            (Value::Hash(a), Value::Hash(b)) => Rc::ptr_eq(a, b),
            (Value::Function(a), Value::Function(b)) => Rc::ptr_eq(a, b),
            (Value::Closure(a), Value::Closure(b)) => Rc::ptr_eq(a, b),
            (Value::Builtin(a), Value::Builtin(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(n) => write!(f, "{}", n),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Null => write!(f, "Null"),
            Value::Str(s) => write!(f, "{}", s),
            Value::Array(elements) => {
                write!(f, "[")?;
                for (i, element) in elements.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", element)?;
                }
                write!(f, "]")
            }
            Value::Hash(pairs) => {
                write!(f, "{{")?;
                for (i, (_, pair)) in pairs.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", pair.key, pair.value)?;
                }
                write!(f, "}}")
            }
            Value::Function(func) => write!(f, "CompiledFunction[{:p}]", Rc::as_ptr(func)),
            Value::Closure(closure) => write!(f, "Closure[{:p}]", Rc::as_ptr(closure)),
            Value::Builtin(index) => {
                write!(f, "builtin function {}", builtins::name_of(*index))
            }
            Value::ReturnValue(value) => write!(f, "{}", value),
            Value::Error(message) => write!(f, "ERROR: {}", message),
        }
    }
}

/// Key identity for hash entries.
///
/// Invariant: equal values of a hashable type yield equal keys, and keys
/// of different types never collide (the tag is part of the identity).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HashKey {
    pub type_tag: &'static str,
    pub value: u64,
}

/// A hash entry, keeping the original key value for display.
#[derive(Debug, Clone, PartialEq)]
pub struct HashPair {
    pub key: Value,
    pub value: Value,
}

/// FNV-1a, 64-bit.
fn fnv1a_64(bytes: &[u8]) -> u64 {
    const OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
    const PRIME: u64 = 0x0000_0100_0000_01b3;

    let mut hash = OFFSET_BASIS;
    for byte in bytes {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(PRIME);
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_hash_keys() {
        let hello1 = Value::Str(Rc::new("Hello World".to_string()));
        let hello2 = Value::Str(Rc::new("Hello World".to_string()));
        let diff = Value::Str(Rc::new("My name is johnny".to_string()));

        assert_eq!(hello1.hash_key().unwrap(), hello2.hash_key().unwrap());
        assert_ne!(hello1.hash_key().unwrap(), diff.hash_key().unwrap());
    }

    #[test]
    fn test_hash_keys_do_not_collide_across_types() {
        let one = Value::Integer(1);
        let truthy = Value::Boolean(true);
        assert_ne!(one.hash_key().unwrap(), truthy.hash_key().unwrap());
    }

    #[test]
    fn test_unhashable() {
        let arr = Value::Array(Rc::new(vec![]));
        let err = arr.hash_key().unwrap_err();
        assert_eq!(err.to_string(), "unusable as hash key: ARRAY");
    }

    #[test]
    fn test_truthiness() {
        assert!(Value::Integer(0).is_truthy());
        assert!(Value::Str(Rc::new(String::new())).is_truthy());
        assert!(!Value::Boolean(false).is_truthy());
        assert!(!Value::Null.is_truthy());
    }

    #[test]
    fn test_inspect() {
        assert_eq!(Value::Integer(42).inspect(), "42");
        assert_eq!(Value::Boolean(true).inspect(), "true");
        assert_eq!(Value::Null.inspect(), "Null");
        assert_eq!(
            Value::Array(Rc::new(vec![Value::Integer(1), Value::Integer(2)])).inspect(),
            "[1, 2]"
        );
        assert_eq!(
            Value::Error("unknown operator".to_string()).inspect(),
            "ERROR: unknown operator"
        );
    }
}
