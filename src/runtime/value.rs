use crate::emit::Callable;
use crate::runtime::error::{RuntimeError, RuntimeResult};
use std::cell::{Ref, RefCell};
use std::collections::HashSet;
use std::fmt;
use std::rc::Rc;

/// Nesting shown when rendering; deeper lists print as `[...]`.
const RENDER_DEPTH: usize = 64;
/// Elements rendered for one value before the rest is elided.
const RENDER_ITEMS: usize = 10_000;

#[derive(Clone, Debug)]
pub enum Value {
    Unit,
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(Rc<str>),
    List(List),
    Function(Callable),
}

/// Shared, mutable list storage. Stores go through [`List::push`] and
/// [`List::set`], which refuse to make a list reachable from itself, so list
/// graphs stay acyclic.
#[derive(Clone)]
pub struct List(Rc<RefCell<Vec<Value>>>);

impl List {
    pub fn new(items: Vec<Value>) -> Self {
        List(Rc::new(RefCell::new(items)))
    }

    pub fn ptr_eq(&self, other: &List) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub fn borrow(&self) -> Ref<'_, Vec<Value>> {
        self.0.borrow()
    }

    pub fn len(&self) -> usize {
        self.0.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.borrow().is_empty()
    }

    pub fn push(&self, item: Value) -> RuntimeResult<()> {
        self.check_store(&item)?;
        self.0.borrow_mut().push(item);
        Ok(())
    }

    /// Replaces the element at `position`, which the caller has bounds
    /// checked.
    pub fn set(&self, position: usize, item: Value) -> RuntimeResult<()> {
        self.check_store(&item)?;
        let mut items = self.0.borrow_mut();
        match items.get_mut(position) {
            Some(slot) => {
                *slot = item;
                Ok(())
            }
            None => Err(RuntimeError::IndexOutOfBounds {
                index: position as i64,
                len: items.len(),
            }),
        }
    }

    fn check_store(&self, item: &Value) -> RuntimeResult<()> {
        if item.reaches(self) {
            return Err(RuntimeError::CyclicList);
        }
        Ok(())
    }

    fn id(&self) -> *const RefCell<Vec<Value>> {
        Rc::as_ptr(&self.0)
    }
}

impl fmt::Debug for List {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("List").field("len", &self.len()).finish()
    }
}

impl Drop for List {
    // Unlinks nested lists one at a time so dropping a deep list does not
    // recurse.
    fn drop(&mut self) {
        if Rc::strong_count(&self.0) != 1 {
            return;
        }
        let Ok(mut items) = self.0.try_borrow_mut() else {
            return;
        };
        let mut pending = std::mem::take(&mut *items);
        drop(items);
        while let Some(value) = pending.pop() {
            if let Value::List(list) = &value {
                if Rc::strong_count(&list.0) == 1 {
                    if let Ok(mut inner) = list.0.try_borrow_mut() {
                        pending.append(&mut inner);
                    }
                }
            }
        }
    }
}

impl Value {
    pub fn string(value: impl Into<Rc<str>>) -> Self {
        Value::Str(value.into())
    }

    pub fn list(items: Vec<Value>) -> Self {
        Value::List(List::new(items))
    }

    pub fn as_bool(&self) -> bool {
        match self {
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::List(items) => !items.borrow().is_empty(),
            Value::Function(_) => true,
            Value::Unit => false,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Unit => "unit",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Bool(_) => "bool",
            Value::Str(_) => "string",
            Value::List(_) => "list",
            Value::Function(_) => "function",
        }
    }

    /// Structural equality; functions compare by identity.
    pub fn equals(&self, other: &Value) -> bool {
        let mut pending = vec![(self.clone(), other.clone())];
        while let Some((left, right)) = pending.pop() {
            match (&left, &right) {
                (Value::List(a), Value::List(b)) => {
                    if a.ptr_eq(b) {
                        continue;
                    }
                    let (a, b) = (a.borrow(), b.borrow());
                    if a.len() != b.len() {
                        return false;
                    }
                    pending.extend(a.iter().cloned().zip(b.iter().cloned()));
                }
                _ => {
                    if !left.scalar_equals(&right) {
                        return false;
                    }
                }
            }
        }
        true
    }

    fn scalar_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Unit, Value::Unit) => true,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Int(a), Value::Float(b)) | (Value::Float(b), Value::Int(a)) => {
                (*a as f64) == *b
            }
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Function(a), Value::Function(b)) => a.same_as(b),
            _ => false,
        }
    }

    /// Whether `target` is this value or is nested anywhere inside it.
    pub fn reaches(&self, target: &List) -> bool {
        let Value::List(start) = self else {
            return false;
        };
        let mut seen = HashSet::new();
        let mut pending = vec![start.clone()];
        while let Some(list) = pending.pop() {
            if list.ptr_eq(target) {
                return true;
            }
            if !seen.insert(list.id()) {
                continue;
            }
            pending.extend(list.borrow().iter().filter_map(|item| match item {
                Value::List(inner) => Some(inner.clone()),
                _ => None,
            }));
        }
        false
    }

    /// Rendering used inside lists and by the REPL: strings are quoted.
    pub fn repr(&self) -> String {
        match self {
            Value::Str(s) => format!("{s:?}"),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut budget = RENDER_ITEMS;
        write_value(f, self, false, 0, &mut budget)
    }
}

fn write_value(
    f: &mut fmt::Formatter<'_>,
    value: &Value,
    quoted: bool,
    depth: usize,
    budget: &mut usize,
) -> fmt::Result {
    match value {
        Value::Unit => write!(f, "()"),
        Value::Int(v) => write!(f, "{v}"),
        Value::Float(v) => {
            if v.is_finite() && v.fract() == 0.0 {
                write!(f, "{v:.1}")
            } else {
                write!(f, "{v}")
            }
        }
        Value::Bool(v) => write!(f, "{v}"),
        Value::Str(v) if quoted => write!(f, "{v:?}"),
        Value::Str(v) => write!(f, "{v}"),
        Value::List(_) if depth >= RENDER_DEPTH => write!(f, "[...]"),
        Value::List(items) => {
            write!(f, "[")?;
            for (idx, item) in items.borrow().iter().enumerate() {
                if idx > 0 {
                    write!(f, ", ")?;
                }
                if *budget == 0 {
                    write!(f, "...")?;
                    break;
                }
                *budget -= 1;
                write_value(f, item, true, depth + 1, budget)?;
            }
            write!(f, "]")
        }
        Value::Function(callable) => write!(f, "<fn {}>", callable.name()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lists_quote_their_strings() {
        let value = Value::list(vec![Value::Int(1), Value::string("a"), Value::Float(2.0)]);
        assert_eq!(value.to_string(), "[1, \"a\", 2.0]");
    }

    #[test]
    fn equality_is_structural() {
        let a = Value::list(vec![Value::Int(1), Value::string("x")]);
        let b = Value::list(vec![Value::Float(1.0), Value::string("x")]);
        assert!(a.equals(&b));
        assert!(!Value::Unit.equals(&Value::Bool(false)));
    }

    #[test]
    fn a_list_cannot_be_stored_inside_itself() {
        let outer = List::new(vec![Value::Int(1)]);
        let inner = Value::list(vec![Value::List(outer.clone())]);
        assert!(matches!(
            outer.push(Value::List(outer.clone())),
            Err(RuntimeError::CyclicList)
        ));
        assert!(matches!(outer.set(0, inner), Err(RuntimeError::CyclicList)));
        assert_eq!(outer.len(), 1);

        let other = Value::list(vec![Value::Int(2)]);
        outer.push(other.clone()).expect("unrelated list");
        outer.push(other).expect("shared list");
        assert_eq!(Value::List(outer).to_string(), "[1, [2], [2]]");
    }

    #[test]
    fn deep_lists_render_compare_and_drop() {
        let build = || {
            let mut value = Value::Int(0);
            for _ in 0..200_000 {
                value = Value::list(vec![value]);
            }
            value
        };
        let (a, b) = (build(), build());
        assert!(a.equals(&b));
        let text = a.to_string();
        assert!(text.starts_with("[[[["));
        assert!(text.contains("[...]"));
        drop(a);
        drop(b);
    }

    #[test]
    fn long_lists_are_elided() {
        let value = Value::list((0..20_000).map(Value::Int).collect());
        let text = value.to_string();
        assert!(text.ends_with(", ...]"));
        assert!(text.starts_with("[0, 1, 2"));
    }
}
