//! Concrete values, heaps and satisfying models.

use std::{collections::BTreeMap, fmt, sync::Arc};

use crate::term::{AllocSite, Literal, MemorySpace, TermType};

/// Address of a heap object. Address `0` is never allocated.
pub type Addr = u64;

/// A concrete value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Boolean
    Bool(bool),
    /// Integer, wrapped to the width of its type
    Int(i64),
    /// Floating point
    Float(f64),
    /// The null reference
    Null,
    /// Reference to a heap object
    Ref(Addr),
    /// Atomic string value (opaque string strategy)
    Str(Arc<str>),
}

impl Value {
    /// Returns the boolean, if this is one.
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the integer, if this is one.
    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the address, if this is a non-null reference.
    #[must_use]
    pub fn as_addr(&self) -> Option<Addr> {
        match self {
            Value::Ref(addr) => Some(*addr),
            _ => None,
        }
    }

    /// Returns the string, if this is an atomic string.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Converts a literal.
    #[must_use]
    pub fn from_literal(literal: &Literal) -> Value {
        match literal {
            Literal::Bool(b) => Value::Bool(*b),
            Literal::Int(v) => Value::Int(*v),
            Literal::Float(_) => Value::Float(literal.as_float().unwrap_or_default()),
            Literal::Null => Value::Null,
            Literal::Str(s) => Value::Str(s.clone()),
        }
    }

    /// Converts back to a literal; heap references have no literal form.
    #[must_use]
    pub fn to_literal(&self) -> Option<Literal> {
        match self {
            Value::Bool(b) => Some(Literal::Bool(*b)),
            Value::Int(v) => Some(Literal::Int(*v)),
            Value::Float(f) => Some(Literal::float(*f)),
            Value::Null => Some(Literal::Null),
            Value::Str(s) => Some(Literal::Str(s.clone())),
            Value::Ref(_) => None,
        }
    }

    /// The default value of a type (`false`, `0`, `0.0`, `null`).
    #[must_use]
    pub fn default_of(ty: &TermType) -> Value {
        match ty {
            TermType::Bool => Value::Bool(false),
            TermType::Int(_) => Value::Int(0),
            TermType::Float | TermType::Double => Value::Float(0.0),
            _ => Value::Null,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v:?}"),
            Value::Null => write!(f, "null"),
            Value::Ref(addr) => write!(f, "#{addr}"),
            Value::Str(s) => write!(f, "{s:?}"),
        }
    }
}

/// Where a heap object came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Created by an allocation term during the execution.
    Allocated(AllocSite),
    /// Part of the input heap; its contents are unconstrained until read.
    Input,
}

/// A heap object.
#[derive(Debug, Clone, PartialEq)]
pub struct HeapObject {
    /// Dynamic type.
    pub ty: TermType,
    /// Provenance.
    pub origin: Origin,
    /// Array length, `None` for objects.
    pub length: Option<i64>,
    /// Field values per memory space.
    pub fields: BTreeMap<(MemorySpace, Arc<str>), Value>,
    /// Element values per memory space.
    pub elements: BTreeMap<(MemorySpace, i64), Value>,
    /// Contents at allocation time, for allocated arrays.
    pub initial: Vec<Value>,
    /// Space of the most recent element access.
    pub last_space: MemorySpace,
}

impl HeapObject {
    /// Creates an object with no recorded contents.
    #[must_use]
    pub fn new(ty: TermType, origin: Origin, length: Option<i64>) -> Self {
        HeapObject {
            ty,
            origin,
            length,
            fields: BTreeMap::new(),
            elements: BTreeMap::new(),
            initial: Vec::new(),
            last_space: MemorySpace::SHARED,
        }
    }

    /// Returns `true` for input objects.
    #[must_use]
    pub fn is_input(&self) -> bool {
        self.origin == Origin::Input
    }
}

/// A concrete heap. Addresses are dense and start at 1.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Heap {
    objects: Vec<HeapObject>,
}

impl Heap {
    /// Creates an empty heap.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an object and returns its address.
    pub fn allocate(&mut self, object: HeapObject) -> Addr {
        self.objects.push(object);
        self.objects.len() as Addr
    }

    /// Looks up an object.
    #[must_use]
    pub fn get(&self, addr: Addr) -> Option<&HeapObject> {
        usize::try_from(addr)
            .ok()
            .and_then(|a| a.checked_sub(1))
            .and_then(|i| self.objects.get(i))
    }

    /// Looks up an object mutably.
    pub fn get_mut(&mut self, addr: Addr) -> Option<&mut HeapObject> {
        usize::try_from(addr)
            .ok()
            .and_then(|a| a.checked_sub(1))
            .and_then(move |i| self.objects.get_mut(i))
    }

    /// Number of objects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Returns `true` if no object was allocated.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Iterates `(address, object)` pairs in address order.
    pub fn iter(&self) -> impl Iterator<Item = (Addr, &HeapObject)> {
        self.objects
            .iter()
            .enumerate()
            .map(|(i, o)| (i as Addr + 1, o))
    }
}

/// A satisfying assignment.
///
/// Maps every variable bound during the witness execution, by display name, to its value.
/// References point into [`Model::heap`], the heap the witness was found in (input
/// objects carry the contents that were read).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Model {
    /// Variable values by name.
    pub values: BTreeMap<String, Value>,
    /// The witness heap.
    pub heap: Heap,
}

impl Model {
    /// Value of a variable by display name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Integer value of a variable.
    #[must_use]
    pub fn int(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(Value::as_int)
    }

    /// Boolean value of a variable.
    #[must_use]
    pub fn bool(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(Value::as_bool)
    }

    /// Decodes a structural string (an object whose `value` field is a `char[]`).
    #[must_use]
    pub fn string_at(&self, addr: Addr) -> Option<String> {
        let object = self.heap.get(addr)?;
        let array = object
            .fields
            .iter()
            .find(|((_, name), _)| &**name == "value")
            .and_then(|(_, v)| v.as_addr())?;
        let array = self.heap.get(array)?;
        let length = usize::try_from(array.length?).ok()?;
        let mut units = Vec::with_capacity(length);
        for i in 0..length {
            let index = i as i64;
            let value = array
                .elements
                .iter()
                .find(|((_, idx), _)| *idx == index)
                .map(|(_, v)| v)
                .or_else(|| array.initial.get(i))?;
            units.push(u16::try_from(value.as_int()?).ok()?);
        }
        String::from_utf16(&units).ok()
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (name, value)) in self.values.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{name} = {value}")?;
        }
        write!(f, "}}")
    }
}

/// The verdict of a reachability query.
#[derive(Debug, Clone, PartialEq)]
pub enum SolverResult {
    /// The point is reachable; the model is a witness.
    Sat(Model),
    /// The point is provably unreachable.
    Unsat,
    /// No verdict; the reason says why.
    Unknown(String),
}

impl SolverResult {
    /// Returns `true` for [`SolverResult::Sat`].
    #[must_use]
    pub fn is_sat(&self) -> bool {
        matches!(self, SolverResult::Sat(_))
    }

    /// Returns `true` for [`SolverResult::Unsat`].
    #[must_use]
    pub fn is_unsat(&self) -> bool {
        matches!(self, SolverResult::Unsat)
    }

    /// Returns `true` for [`SolverResult::Unknown`].
    #[must_use]
    pub fn is_unknown(&self) -> bool {
        matches!(self, SolverResult::Unknown(_))
    }

    /// The model of a `Sat` verdict.
    #[must_use]
    pub fn model(&self) -> Option<&Model> {
        match self {
            SolverResult::Sat(model) => Some(model),
            _ => None,
        }
    }
}

impl fmt::Display for SolverResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SolverResult::Sat(model) => write!(f, "SAT {model}"),
            SolverResult::Unsat => write!(f, "UNSAT"),
            SolverResult::Unknown(reason) => write!(f, "UNKNOWN ({reason})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heap_addresses_start_at_one() {
        let mut heap = Heap::new();
        let a = heap.allocate(HeapObject::new(TermType::object(), Origin::Input, None));
        let b = heap.allocate(HeapObject::new(TermType::object(), Origin::Input, None));
        assert_eq!((a, b), (1, 2));
        assert!(heap.get(0).is_none());
        assert!(heap.get(2).is_some());
        assert!(heap.get(3).is_none());
    }

    #[test]
    fn test_literal_conversion() {
        assert_eq!(Value::from_literal(&Literal::Int(3)), Value::Int(3));
        assert_eq!(Value::Bool(true).to_literal(), Some(Literal::Bool(true)));
        assert_eq!(Value::Ref(1).to_literal(), None);
    }

    #[test]
    fn test_string_decoding() {
        let mut heap = Heap::new();
        let mut chars = HeapObject::new(TermType::char_array(), Origin::Input, Some(2));
        chars.initial = vec![Value::Int(0x68), Value::Int(0x69)];
        let array = heap.allocate(chars);
        let mut string = HeapObject::new(TermType::string(), Origin::Input, None);
        string
            .fields
            .insert((MemorySpace::SHARED, Arc::from("value")), Value::Ref(array));
        let s = heap.allocate(string);

        let model = Model {
            values: BTreeMap::new(),
            heap,
        };
        assert_eq!(model.string_at(s).as_deref(), Some("hi"));
    }
}
