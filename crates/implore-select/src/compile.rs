//! Lowering of boolean expression trees into compiled programs
//!
//! Each level program is the whole expression: predicates owned by the level
//! or an ancestor are pushed from the cache, predicates owned by a deeper level
//! are pushed as `Unknown`. Under the tri-state tables a group or item program
//! therefore yields `False` only when no choice of deeper values can satisfy
//! the expression, which is what makes top-down pruning sound.

use crate::program::*;
use crate::tristate::TriState;
use serde::{Deserialize, Serialize};

/// A selection expression prior to compilation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PredicateExpr {
    /// Logical AND of two expressions
    And(Box<PredicateExpr>, Box<PredicateExpr>),

    /// Logical OR of two expressions
    Or(Box<PredicateExpr>, Box<PredicateExpr>),

    /// Logical NOT of an expression
    Not(Box<PredicateExpr>),

    /// A single comparison
    Atom {
        level: Level,
        selector: Selector,
        comparator: Comparator,
        parameter: Parameter,
    },

    /// Leaf distance to the leaves selected by a bracketed sub-expression
    Proximity {
        comparator: Comparator,
        radius: f64,
        reference: Box<PredicateExpr>,
    },

    /// Everything (constant true)
    All,

    /// Nothing (constant false)
    None,
}

impl PredicateExpr {
    /// Create an AND expression
    pub fn and(left: PredicateExpr, right: PredicateExpr) -> Self {
        PredicateExpr::And(Box::new(left), Box::new(right))
    }

    /// Create an OR expression
    pub fn or(left: PredicateExpr, right: PredicateExpr) -> Self {
        PredicateExpr::Or(Box::new(left), Box::new(right))
    }

    /// Create a NOT expression
    pub fn not(expr: PredicateExpr) -> Self {
        PredicateExpr::Not(Box::new(expr))
    }

    /// Create an atomic comparison
    pub fn atom(
        level: Level,
        selector: Selector,
        comparator: Comparator,
        parameter: Parameter,
    ) -> Self {
        PredicateExpr::Atom {
            level,
            selector,
            comparator,
            parameter,
        }
    }

    /// `<level>.name == name`
    pub fn name_is(level: Level, name: &str) -> Self {
        Self::atom(
            level,
            Selector::Name,
            Comparator::Eq,
            Parameter::Text(name.to_string()),
        )
    }

    /// Leaves within `radius` of a fixed point
    pub fn within(center: [f64; 3], radius: f64) -> Self {
        Self::atom(
            Level::Leaf,
            Selector::Proximity,
            Comparator::Le,
            Parameter::Proximity(ProximitySpec::around(center, radius)),
        )
    }

    /// Leaves within `radius` of any leaf selected by `reference`
    pub fn within_selection(radius: f64, reference: PredicateExpr) -> Self {
        PredicateExpr::Proximity {
            comparator: Comparator::Le,
            radius,
            reference: Box::new(reference),
        }
    }
}

/// Lowered tree with interned predicate ids
enum Node {
    And(Box<Node>, Box<Node>),
    Or(Box<Node>, Box<Node>),
    Not(Box<Node>),
    Const(TriState),
    Pred(PredicateId, Level),
}

impl Node {
    /// Fold with every predicate unknown
    fn fold_unknown(&self) -> TriState {
        match self {
            Node::And(a, b) => a.fold_unknown().and(b.fold_unknown()),
            Node::Or(a, b) => a.fold_unknown().or(b.fold_unknown()),
            Node::Not(a) => a.fold_unknown().not(),
            Node::Const(value) => *value,
            Node::Pred(..) => TriState::Unknown,
        }
    }

    fn emit(&self, level: Level, out: &mut Vec<Instruction>) {
        match self {
            Node::And(a, b) => {
                a.emit(level, out);
                b.emit(level, out);
                out.push(Instruction::And);
            }
            Node::Or(a, b) => {
                a.emit(level, out);
                b.emit(level, out);
                out.push(Instruction::Or);
            }
            Node::Not(a) => {
                a.emit(level, out);
                out.push(Instruction::Not);
            }
            Node::Const(value) => out.push(Instruction::Const(*value)),
            Node::Pred(id, owner) if *owner <= level => out.push(Instruction::Push(*id)),
            Node::Pred(..) => out.push(Instruction::Const(TriState::Unknown)),
        }
    }
}

#[derive(Default)]
struct Compiler {
    predicates: Vec<AtomicPredicate>,
    bracket_sources: Vec<PredicateExpr>,
    bracketed: Vec<CompiledProgram>,
}

impl Compiler {
    fn intern(
        &mut self,
        level: Level,
        selector: &Selector,
        comparator: Comparator,
        parameter: Parameter,
    ) -> PredicateId {
        if let Some(existing) = self.predicates.iter().find(|p| {
            p.level == level
                && p.selector == *selector
                && p.comparator == comparator
                && p.parameter == parameter
        }) {
            return existing.id;
        }
        let id = self.predicates.len();
        self.predicates.push(AtomicPredicate {
            id,
            level,
            selector: selector.clone(),
            comparator,
            parameter,
        });
        id
    }

    fn bracket(&mut self, expr: &PredicateExpr) -> usize {
        if let Some(position) = self.bracket_sources.iter().position(|e| e == expr) {
            return position;
        }
        self.bracket_sources.push(expr.clone());
        self.bracketed.push(compile(expr));
        self.bracketed.len() - 1
    }

    fn lower(&mut self, expr: &PredicateExpr) -> Node {
        match expr {
            PredicateExpr::And(a, b) => Node::And(Box::new(self.lower(a)), Box::new(self.lower(b))),
            PredicateExpr::Or(a, b) => Node::Or(Box::new(self.lower(a)), Box::new(self.lower(b))),
            PredicateExpr::Not(a) => Node::Not(Box::new(self.lower(a))),
            PredicateExpr::All => Node::Const(TriState::True),
            PredicateExpr::None => Node::Const(TriState::False),
            PredicateExpr::Atom {
                level,
                selector,
                comparator,
                parameter,
            } => Node::Pred(
                self.intern(*level, selector, *comparator, parameter.clone()),
                *level,
            ),
            PredicateExpr::Proximity {
                comparator,
                radius,
                reference,
            } => {
                let reference = self.bracket(reference);
                let parameter = Parameter::Proximity(ProximitySpec::to_reference(reference, *radius));
                Node::Pred(
                    self.intern(Level::Leaf, &Selector::Proximity, *comparator, parameter),
                    Level::Leaf,
                )
            }
        }
    }
}

/// Compile an expression tree
pub fn compile(expr: &PredicateExpr) -> CompiledProgram {
    let mut compiler = Compiler::default();
    let root = compiler.lower(expr);

    if root.fold_unknown().is_true() {
        return CompiledProgram::everything();
    }

    let levels = Level::ALL.map(|level| {
        let mut instructions = Vec::new();
        root.emit(level, &mut instructions);
        LevelProgram::new(instructions)
    });

    CompiledProgram {
        predicates: compiler.predicates,
        levels,
        bracketed: compiler.bracketed,
        is_tautology: false,
    }
}
