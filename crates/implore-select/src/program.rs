//! Compiled predicate programs
//!
//! A compiled program is the immutable input to the evaluator: a flat table of
//! atomic predicates, one postfix program per hierarchy level, and the nested
//! programs that proximity predicates may reference.

use crate::error::{SelectionError, SelectionResult};
use crate::tristate::TriState;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Dense predicate id in `[0, N)`
pub type PredicateId = usize;

/// A tier of the hierarchy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Level {
    Group,
    Item,
    Leaf,
}

impl Level {
    /// All levels in evaluation order
    pub const ALL: [Level; 3] = [Level::Group, Level::Item, Level::Leaf];

    /// Position in `ALL`
    pub fn index(self) -> usize {
        match self {
            Level::Group => 0,
            Level::Item => 1,
            Level::Leaf => 2,
        }
    }

    /// Get the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Group => "group",
            Level::Item => "item",
            Level::Leaf => "leaf",
        }
    }
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Comparator {
    /// Equal (==)
    Eq,
    /// Not equal (!=)
    Ne,
    /// Less than (<)
    Lt,
    /// Less than or equal (<=)
    Le,
    /// Greater than (>)
    Gt,
    /// Greater than or equal (>=)
    Ge,
}

impl Comparator {
    /// Evaluate the comparison for two f64 values
    ///
    /// Equality uses an inclusive absolute tolerance, so a zero tolerance is
    /// exact comparison.
    pub fn evaluate(&self, lhs: f64, rhs: f64, tolerance: f64) -> bool {
        match self {
            Comparator::Lt => lhs < rhs,
            Comparator::Le => lhs <= rhs,
            Comparator::Gt => lhs > rhs,
            Comparator::Ge => lhs >= rhs,
            Comparator::Eq => (lhs - rhs).abs() <= tolerance,
            Comparator::Ne => (lhs - rhs).abs() > tolerance,
        }
    }

    /// Evaluate against an already computed ordering of `lhs` relative to `rhs`
    pub fn accepts(&self, ordering: Ordering) -> bool {
        match self {
            Comparator::Eq => ordering == Ordering::Equal,
            Comparator::Ne => ordering != Ordering::Equal,
            Comparator::Lt => ordering == Ordering::Less,
            Comparator::Le => ordering != Ordering::Greater,
            Comparator::Gt => ordering == Ordering::Greater,
            Comparator::Ge => ordering != Ordering::Less,
        }
    }

    /// Whether this is `Eq` or `Ne`
    pub fn is_equality(&self) -> bool {
        matches!(self, Comparator::Eq | Comparator::Ne)
    }
}

/// Coordinate axis of a leaf position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    /// Component index into a `[f64; 3]`
    pub fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }
}

/// Value carried by a named attribute, or a default for one
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttrValue {
    Number(f64),
    Text(String),
}

impl AttrValue {
    /// Name of the variant, for error messages
    pub fn kind(&self) -> &'static str {
        match self {
            AttrValue::Number(_) => "number",
            AttrValue::Text(_) => "text",
        }
    }
}

impl From<f64> for AttrValue {
    fn from(value: f64) -> Self {
        AttrValue::Number(value)
    }
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        AttrValue::Text(value.to_string())
    }
}

/// What an atomic predicate compares
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Selector {
    /// Identity string of the element
    Name,
    /// Integer index of the element
    Index,
    /// One coordinate of a leaf position
    Coordinate(Axis),
    /// Named attribute, with an optional per-query default
    Attribute {
        key: String,
        default: Option<AttrValue>,
    },
    /// Distance test from a leaf position
    Proximity,
}

impl Selector {
    /// Create a named attribute selector without a default
    pub fn attribute(key: impl Into<String>) -> Self {
        Selector::Attribute {
            key: key.into(),
            default: None,
        }
    }

    /// Create a named attribute selector with a default
    pub fn attribute_or(key: impl Into<String>, default: impl Into<AttrValue>) -> Self {
        Selector::Attribute {
            key: key.into(),
            default: Some(default.into()),
        }
    }
}

/// Target of a proximity test
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ProximityTarget {
    /// A fixed point
    Point([f64; 3]),
    /// Index into `CompiledProgram::bracketed`
    Reference(usize),
}

/// Radius and target of a proximity predicate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProximitySpec {
    pub radius: f64,
    pub target: ProximityTarget,
}

impl ProximitySpec {
    /// Proximity to a fixed point
    pub fn around(center: [f64; 3], radius: f64) -> Self {
        Self {
            radius,
            target: ProximityTarget::Point(center),
        }
    }

    /// Proximity to a bracketed sub-selection
    pub fn to_reference(reference: usize, radius: f64) -> Self {
        Self {
            radius,
            target: ProximityTarget::Reference(reference),
        }
    }
}

/// Right-hand side of an atomic predicate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Parameter {
    /// Exact string
    Text(String),
    /// Any of several exact strings
    TextSet(Vec<String>),
    /// Shell-style pattern (`*`, `?`) matched against the whole string
    Glob(String),
    /// Regular expression matched against the whole string
    Regex(String),
    /// Scalar number
    Number(f64),
    /// Any of several numbers
    NumberSet(Vec<f64>),
    /// Inclusive numeric range
    Range { min: f64, max: f64 },
    /// Distance test
    Proximity(ProximitySpec),
}

impl Parameter {
    /// Whether the parameter expects a string on the left-hand side
    pub fn is_textual(&self) -> bool {
        matches!(
            self,
            Parameter::Text(_) | Parameter::TextSet(_) | Parameter::Glob(_) | Parameter::Regex(_)
        )
    }

    /// Whether the parameter expects a number on the left-hand side
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            Parameter::Number(_) | Parameter::NumberSet(_) | Parameter::Range { .. }
        )
    }
}

/// A single typed comparison, owned by exactly one level
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AtomicPredicate {
    pub id: PredicateId,
    pub level: Level,
    pub selector: Selector,
    pub comparator: Comparator,
    pub parameter: Parameter,
}

/// One postfix instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Instruction {
    /// Push the cached value of a predicate
    Push(PredicateId),
    /// Push a constant
    Const(TriState),
    /// Pop two, push their conjunction
    And,
    /// Pop two, push their disjunction
    Or,
    /// Pop one, push its negation
    Not,
}

/// Postfix program for one level
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LevelProgram {
    pub instructions: Vec<Instruction>,
}

impl LevelProgram {
    /// Create a program from instructions
    pub fn new(instructions: Vec<Instruction>) -> Self {
        Self { instructions }
    }

    /// Program that always yields `value`
    pub fn constant(value: TriState) -> Self {
        Self::new(vec![Instruction::Const(value)])
    }

    /// Fold the program over the predicate cache
    ///
    /// Slots that have not been computed read as `Unknown` and propagate through
    /// the tri-state tables.
    pub fn run(&self, level: Level, cache: &[TriState]) -> SelectionResult<TriState> {
        let mut stack: Vec<TriState> = Vec::with_capacity(self.instructions.len());

        for instruction in &self.instructions {
            match *instruction {
                Instruction::Push(id) => {
                    let value = cache.get(id).copied().ok_or_else(|| {
                        SelectionError::MalformedProgram {
                            level,
                            message: format!("predicate {} outside cache of {}", id, cache.len()),
                        }
                    })?;
                    stack.push(value);
                }
                Instruction::Const(value) => stack.push(value),
                Instruction::Not => {
                    let value = pop(&mut stack, level)?;
                    stack.push(value.not());
                }
                Instruction::And | Instruction::Or => {
                    let rhs = pop(&mut stack, level)?;
                    let lhs = pop(&mut stack, level)?;
                    stack.push(if *instruction == Instruction::And {
                        lhs.and(rhs)
                    } else {
                        lhs.or(rhs)
                    });
                }
            }
        }

        match stack.as_slice() {
            [value] => Ok(*value),
            other => Err(SelectionError::MalformedProgram {
                level,
                message: format!("program left {} values on the stack", other.len()),
            }),
        }
    }

    /// Check stack balance and predicate id range without running the program
    pub fn validate(&self, level: Level, predicate_count: usize) -> SelectionResult<()> {
        let mut depth: usize = 0;
        for instruction in &self.instructions {
            match *instruction {
                Instruction::Push(id) if id >= predicate_count => {
                    return Err(SelectionError::MalformedProgram {
                        level,
                        message: format!("push of unknown predicate {}", id),
                    });
                }
                Instruction::Push(_) | Instruction::Const(_) => depth += 1,
                Instruction::Not if depth >= 1 => {}
                Instruction::And | Instruction::Or if depth >= 2 => depth -= 1,
                _ => {
                    return Err(SelectionError::MalformedProgram {
                        level,
                        message: "stack underflow".to_string(),
                    });
                }
            }
        }
        if depth != 1 {
            return Err(SelectionError::MalformedProgram {
                level,
                message: format!("program left {} values on the stack", depth),
            });
        }
        Ok(())
    }
}

fn pop(stack: &mut Vec<TriState>, level: Level) -> SelectionResult<TriState> {
    stack.pop().ok_or_else(|| SelectionError::MalformedProgram {
        level,
        message: "stack underflow".to_string(),
    })
}

/// Immutable, shareable compiled form of a selection expression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledProgram {
    /// Atomic predicates, indexed by id
    pub predicates: Vec<AtomicPredicate>,
    /// Postfix programs indexed by `Level::index`
    pub levels: [LevelProgram; 3],
    /// Sub-programs targeted by `ProximityTarget::Reference`
    pub bracketed: Vec<CompiledProgram>,
    /// The whole program is unconditionally true
    pub is_tautology: bool,
}

impl CompiledProgram {
    /// Program that selects everything
    pub fn everything() -> Self {
        Self {
            predicates: Vec::new(),
            levels: [
                LevelProgram::constant(TriState::True),
                LevelProgram::constant(TriState::True),
                LevelProgram::constant(TriState::True),
            ],
            bracketed: Vec::new(),
            is_tautology: true,
        }
    }

    /// Program that selects nothing
    pub fn nothing() -> Self {
        Self {
            predicates: Vec::new(),
            levels: [
                LevelProgram::constant(TriState::False),
                LevelProgram::constant(TriState::False),
                LevelProgram::constant(TriState::False),
            ],
            bracketed: Vec::new(),
            is_tautology: false,
        }
    }

    /// The postfix program for a level
    pub fn level(&self, level: Level) -> &LevelProgram {
        &self.levels[level.index()]
    }

    /// Predicates owned by a level
    pub fn predicates_at(&self, level: Level) -> impl Iterator<Item = &AtomicPredicate> {
        self.predicates.iter().filter(move |p| p.level == level)
    }

    /// Structural well-formedness check, recursing into bracketed programs
    pub fn validate(&self) -> SelectionResult<()> {
        for (position, predicate) in self.predicates.iter().enumerate() {
            if predicate.id != position {
                return Err(SelectionError::MalformedProgram {
                    level: predicate.level,
                    message: format!(
                        "predicate at position {} has id {}",
                        position, predicate.id
                    ),
                });
            }
        }
        if !self.is_tautology {
            for level in Level::ALL {
                self.level(level).validate(level, self.predicates.len())?;
            }
        }
        for bracketed in &self.bracketed {
            bracketed.validate()?;
        }
        Ok(())
    }

    /// Whether `validate` succeeds
    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }
}
