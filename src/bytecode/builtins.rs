//! Builtin functions, registered once and shared by compiler and VM.
//!
//! The compiler binds each name to its index here; the VM dispatches
//! `OpGetBuiltin`/`OpCall` through the same table, so the index space is
//! defined in exactly one place. Misuse returns an in-band
//! [`Value::Error`] rather than aborting the VM.

use std::rc::Rc;

use crate::bytecode::value::Value;

/// A native function. Returning `None` means "no value"; the VM pushes
/// null in its place.
pub type BuiltinFn = fn(&[Value]) -> Option<Value>;

/// A named builtin registry entry.
pub struct BuiltinDef {
    pub name: &'static str,
    pub func: BuiltinFn,
}

/// The builtin registry. Positions are the `OpGetBuiltin` operands.
pub static BUILTINS: &[BuiltinDef] = &[
    BuiltinDef {
        name: "len",
        func: builtin_len,
    },
    BuiltinDef {
        name: "puts",
        func: builtin_puts,
    },
    BuiltinDef {
        name: "first",
        func: builtin_first,
    },
    BuiltinDef {
        name: "last",
        func: builtin_last,
    },
    BuiltinDef {
        name: "rest",
        func: builtin_rest,
    },
    BuiltinDef {
        name: "push",
        func: builtin_push,
    },
];

/// The registry name for an `OpGetBuiltin` operand.
pub fn name_of(index: u16) -> &'static str {
    BUILTINS
        .get(index as usize)
        .map(|def| def.name)
        .unwrap_or("unknown")
}

fn wrong_arity(got: usize, want: usize) -> Option<Value> {
    Some(Value::Error(format!(
        "wrong number of arguments. got={}, want={}",
        got, want
    )))
}

fn builtin_len(args: &[Value]) -> Option<Value> {
    if args.len() != 1 {
        return wrong_arity(args.len(), 1);
    }
    match &args[0] {
        Value::Str(s) => Some(Value::Integer(s.len() as i64)),
        Value::Array(elements) => Some(Value::Integer(elements.len() as i64)),
        other => Some(Value::Error(format!(
            "argument to `len` not supported, got {}",
            other.type_tag()
        ))),
    }
}

fn builtin_puts(args: &[Value]) -> Option<Value> {
    for arg in args {
        println!("{}", arg.inspect());
    }
    None
}

fn builtin_first(args: &[Value]) -> Option<Value> {
    if args.len() != 1 {
        return wrong_arity(args.len(), 1);
    }
    match &args[0] {
        Value::Array(elements) => Some(elements.first().cloned().unwrap_or(Value::Null)),
        other => Some(Value::Error(format!(
            "argument to `first` must be ARRAY, got {}",
            other.type_tag()
        ))),
    }
}

fn builtin_last(args: &[Value]) -> Option<Value> {
    if args.len() != 1 {
        return wrong_arity(args.len(), 1);
    }
    match &args[0] {
        Value::Array(elements) => Some(elements.last().cloned().unwrap_or(Value::Null)),
        other => Some(Value::Error(format!(
            "argument to `last` must be ARRAY, got {}",
            other.type_tag()
        ))),
    }
}

fn builtin_rest(args: &[Value]) -> Option<Value> {
    if args.len() != 1 {
        return wrong_arity(args.len(), 1);
    }
    match &args[0] {
        Value::Array(elements) if !elements.is_empty() => {
            Some(Value::Array(Rc::new(elements[1..].to_vec())))
        }
        Value::Array(_) => Some(Value::Null),
        other => Some(Value::Error(format!(
            "argument to `rest` must be ARRAY, got {}",
            other.type_tag()
        ))),
    }
}

fn builtin_push(args: &[Value]) -> Option<Value> {
    if args.len() != 2 {
        return wrong_arity(args.len(), 2);
    }
    match &args[0] {
        Value::Array(elements) => {
            let mut extended = elements.as_ref().clone();
            extended.push(args[1].clone());
            Some(Value::Array(Rc::new(extended)))
        }
        other => Some(Value::Error(format!(
            "argument to `push` must be ARRAY, got {}",
            other.type_tag()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn array(values: Vec<i64>) -> Value {
        Value::Array(Rc::new(values.into_iter().map(Value::Integer).collect()))
    }

    #[test]
    fn test_len() {
        let s = Value::Str(Rc::new("hello".to_string()));
        assert_eq!(builtin_len(&[s]), Some(Value::Integer(5)));
        assert_eq!(builtin_len(&[array(vec![1, 2, 3])]), Some(Value::Integer(3)));
    }

    #[test]
    fn test_len_misuse() {
        assert_eq!(
            builtin_len(&[Value::Integer(1)]),
            Some(Value::Error(
                "argument to `len` not supported, got INTEGER".to_string()
            ))
        );
        assert_eq!(
            builtin_len(&[]),
            Some(Value::Error(
                "wrong number of arguments. got=0, want=1".to_string()
            ))
        );
    }

    #[test]
    fn test_first_last() {
        assert_eq!(
            builtin_first(&[array(vec![1, 2, 3])]),
            Some(Value::Integer(1))
        );
        assert_eq!(
            builtin_last(&[array(vec![1, 2, 3])]),
            Some(Value::Integer(3))
        );
        assert_eq!(builtin_first(&[array(vec![])]), Some(Value::Null));
        assert_eq!(builtin_last(&[array(vec![])]), Some(Value::Null));
    }

    #[test]
    fn test_rest() {
        match builtin_rest(&[array(vec![1, 2, 3])]) {
            Some(Value::Array(elements)) => {
                assert_eq!(*elements, vec![Value::Integer(2), Value::Integer(3)]);
            }
            other => panic!("expected array, got {:?}", other),
        }
        assert_eq!(builtin_rest(&[array(vec![])]), Some(Value::Null));
    }

    #[test]
    fn test_push_allocates_fresh() {
        let original = array(vec![1]);
        let pushed = builtin_push(&[original.clone(), Value::Integer(2)]);
        match pushed {
            Some(Value::Array(elements)) => {
                assert_eq!(elements.len(), 2);
            }
            other => panic!("expected array, got {:?}", other),
        }
        // The original is untouched.
        match original {
            Value::Array(elements) => assert_eq!(elements.len(), 1),
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_registry_order() {
        let names: Vec<_> = BUILTINS.iter().map(|def| def.name).collect();
        assert_eq!(names, ["len", "puts", "first", "last", "rest", "push"]);
    }
}
