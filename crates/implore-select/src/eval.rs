//! Hierarchical evaluation of compiled programs
//!
//! An [`Evaluator`] binds a compiled program to a structure. It owns the
//! predicate cache and the materialized reference selections, so each thread
//! that evaluates in parallel needs its own instance.
//!
//! Evaluation is top-down: the group program runs before the item program,
//! which runs before the leaf program, and a definite `False` at any level
//! prunes everything below it.

use crate::config::{EvaluatorConfig, ReferenceResolution};
use crate::error::{SelectionError, SelectionResult};
use crate::program::*;
use crate::selection::{distance_sq, MaterializedSelection, Selection};
use crate::structure::{ElementRef, Structure};
use crate::tristate::TriState;
use regex::{Regex, RegexBuilder};
use std::cmp::Ordering;

/// Instrumentation counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EvalStats {
    /// Atomic predicate computations, indexed by `Level::index`
    pub computed: [usize; 3],
    /// Bracketed sub-selections materialized
    pub materializations: usize,
}

impl EvalStats {
    pub fn computed_at(&self, level: Level) -> usize {
        self.computed[level.index()]
    }
}

/// Evaluator for one program over one structure
///
/// `R` is the structure that bracketed sub-expressions are resolved against;
/// it may be the same instance as `S`.
pub struct Evaluator<'a, S: Structure + ?Sized, R: Structure + ?Sized = S> {
    program: &'a CompiledProgram,
    structure: &'a S,
    reference: &'a R,
    config: EvaluatorConfig,
    /// Compiled patterns for glob and regex parameters, indexed by predicate id
    matchers: Vec<Option<Regex>>,
    /// Predicate ids per level
    owned: [Vec<PredicateId>; 3],
    cache: Vec<TriState>,
    bound_refs: Vec<Option<MaterializedSelection>>,
    stats: EvalStats,
}

impl<'a, S: Structure + ?Sized> Evaluator<'a, S, S> {
    /// Evaluator whose bracketed sub-expressions resolve against `structure` itself
    pub fn for_structure(program: &'a CompiledProgram, structure: &'a S) -> SelectionResult<Self> {
        Self::new(program, structure, structure)
    }
}

impl<'a, S: Structure + ?Sized, R: Structure + ?Sized> Evaluator<'a, S, R> {
    /// Create an evaluator with the default configuration
    pub fn new(
        program: &'a CompiledProgram,
        structure: &'a S,
        reference: &'a R,
    ) -> SelectionResult<Self> {
        Self::with_config(program, structure, reference, EvaluatorConfig::default())
    }

    /// Create an evaluator
    ///
    /// Fails with `CompilationMismatch` when the program cannot be evaluated
    /// against `structure` (or its bracketed programs against `reference`), and
    /// with `MalformedProgram` when a level program is not well formed.
    pub fn with_config(
        program: &'a CompiledProgram,
        structure: &'a S,
        reference: &'a R,
        config: EvaluatorConfig,
    ) -> SelectionResult<Self> {
        let mut evaluator = Self {
            program,
            structure,
            reference,
            config,
            matchers: Vec::new(),
            owned: Default::default(),
            cache: Vec::new(),
            bound_refs: Vec::new(),
            stats: EvalStats::default(),
        };

        if program.is_tautology {
            tracing::debug!("tautology program, skipping predicate cache");
            return Ok(evaluator);
        }

        program.validate()?;
        evaluator.matchers = prepare(program, structure, reference, &evaluator.config)?;
        for level in Level::ALL {
            evaluator.owned[level.index()] = program.predicates_at(level).map(|p| p.id).collect();
        }
        evaluator.cache = vec![TriState::Unknown; program.predicates.len()];
        evaluator.bound_refs = vec![None; program.bracketed.len()];

        tracing::debug!(
            "evaluator ready: {} predicates, {} bracketed references",
            program.predicates.len(),
            program.bracketed.len()
        );

        if evaluator.config.reference_resolution == ReferenceResolution::Eager {
            evaluator.resolve_all()?;
        }

        Ok(evaluator)
    }

    /// Instrumentation counters accumulated so far
    pub fn stats(&self) -> EvalStats {
        self.stats
    }

    /// Current cache value of a predicate (`Unknown` when never computed)
    pub fn cached(&self, id: PredicateId) -> TriState {
        self.cache.get(id).copied().unwrap_or_default()
    }

    /// A bracketed sub-selection, if it has been materialized
    pub fn bound_reference(&self, reference: usize) -> Option<&MaterializedSelection> {
        self.bound_refs.get(reference).and_then(Option::as_ref)
    }

    /// Evaluate the group program for `group`
    pub fn evaluate_group(&mut self, group: usize) -> SelectionResult<TriState> {
        self.evaluate_level(ElementRef::Group(group))
    }

    /// Evaluate the item program for `item`
    ///
    /// Reads group slots left by the last `evaluate_group` call.
    pub fn evaluate_item(&mut self, item: usize) -> SelectionResult<TriState> {
        self.evaluate_level(ElementRef::Item(item))
    }

    /// Evaluate the leaf program for `leaf`
    ///
    /// Reads group and item slots left by the last ancestor evaluations.
    pub fn evaluate_leaf(&mut self, leaf: usize) -> SelectionResult<TriState> {
        self.evaluate_level(ElementRef::Leaf(leaf))
    }

    /// Clear the slots owned by `level` back to `Unknown`
    ///
    /// Call before moving to a sibling element at that level.
    pub fn reset(&mut self, level: Level) {
        for &id in &self.owned[level.index()] {
            self.cache[id] = TriState::Unknown;
        }
    }

    /// Clear every slot
    pub fn reset_all(&mut self) {
        self.cache.iter_mut().for_each(|slot| *slot = TriState::Unknown);
    }

    fn reset_from(&mut self, level: Level) {
        for deeper in Level::ALL.into_iter().filter(|l| *l >= level) {
            self.reset(deeper);
        }
    }

    /// Whether a leaf is selected
    ///
    /// Evaluates the owning group, then the owning item, then the leaf,
    /// stopping at the first definite `False`. An `Unknown` verdict counts as
    /// selected.
    pub fn is_leaf_selected(&mut self, leaf: usize) -> SelectionResult<bool> {
        let item = self.structure.item_of(leaf);
        let group = self.structure.group_of(item);

        self.reset_from(Level::Group);
        if self.evaluate_group(group)?.is_false() {
            return Ok(false);
        }
        if self.evaluate_item(item)?.is_false() {
            return Ok(false);
        }
        Ok(self.evaluate_leaf(leaf)?.is_selected())
    }

    /// Whether at least one leaf of `item` is selected
    pub fn is_item_selected(&mut self, item: usize) -> SelectionResult<bool> {
        let group = self.structure.group_of(item);

        self.reset_from(Level::Group);
        if self.evaluate_group(group)?.is_false() {
            return Ok(false);
        }
        self.any_leaf_of(item)
    }

    /// Whether at least one leaf of `group` is selected
    pub fn is_group_selected(&mut self, group: usize) -> SelectionResult<bool> {
        self.reset_from(Level::Group);
        if self.evaluate_group(group)?.is_false() {
            return Ok(false);
        }
        for item in self.structure.items_of(group) {
            if self.any_leaf_of(item)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Item evaluation followed by an existential scan of its leaves;
    /// group slots must already be current
    fn any_leaf_of(&mut self, item: usize) -> SelectionResult<bool> {
        self.reset_from(Level::Item);
        if self.evaluate_item(item)?.is_false() {
            return Ok(false);
        }
        for leaf in self.structure.leaves_of(item) {
            self.reset(Level::Leaf);
            if self.evaluate_leaf(leaf)?.is_selected() {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Walk the whole structure and collect what is selected
    pub fn select(&mut self) -> SelectionResult<Selection> {
        let mut selection = Selection::default();
        for group in 0..self.structure.group_count() {
            self.select_group(group, &mut selection)?;
        }
        tracing::debug!(
            "selected {} groups, {} items, {} leaves",
            selection.groups.len(),
            selection.items.len(),
            selection.leaves.len()
        );
        Ok(selection)
    }

    fn select_group(&mut self, group: usize, selection: &mut Selection) -> SelectionResult<()> {
        self.reset_from(Level::Group);
        if self.evaluate_group(group)?.is_false() {
            tracing::trace!("group {} pruned", group);
            return Ok(());
        }

        let mut group_hit = false;
        for item in self.structure.items_of(group) {
            self.reset_from(Level::Item);
            if self.evaluate_item(item)?.is_false() {
                continue;
            }

            let mut item_hit = false;
            for leaf in self.structure.leaves_of(item) {
                self.reset(Level::Leaf);
                if self.evaluate_leaf(leaf)?.is_selected() {
                    selection.leaves.push(leaf);
                    item_hit = true;
                }
            }
            if item_hit {
                selection.items.push(item);
                group_hit = true;
            }
        }
        if group_hit {
            selection.groups.push(group);
        }
        Ok(())
    }

    /// Materialize every bracketed sub-selection that is still unresolved
    pub fn resolve_all(&mut self) -> SelectionResult<()> {
        for reference in 0..self.bound_refs.len() {
            self.resolve(reference)?;
        }
        Ok(())
    }

    /// Materialize a bracketed sub-selection once, then reuse it
    fn resolve(&mut self, reference: usize) -> SelectionResult<&MaterializedSelection> {
        if self.bound_refs[reference].is_none() {
            let program = self.program;
            let bracketed = &program.bracketed[reference];
            let mut nested =
                Evaluator::with_config(bracketed, self.reference, self.reference, self.config.clone())?;
            let selection = nested.select()?;
            let positions = selection
                .leaves
                .iter()
                .map(|&leaf| self.reference.position(leaf))
                .collect();

            tracing::debug!(
                "materialized reference {} with {} leaves",
                reference,
                selection.leaves.len()
            );
            self.stats.materializations += 1;
            return Ok(self.bound_refs[reference].insert(MaterializedSelection {
                leaves: selection.leaves,
                positions,
            }));
        }
        self.bound_refs[reference]
            .as_ref()
            .ok_or_else(|| SelectionError::MalformedProgram {
                level: Level::Leaf,
                message: format!("reference {} not materialized", reference),
            })
    }

    fn evaluate_level(&mut self, element: ElementRef) -> SelectionResult<TriState> {
        if self.program.is_tautology {
            return Ok(TriState::True);
        }

        let level = element.level();
        let program = self.program;
        for position in 0..self.owned[level.index()].len() {
            let id = self.owned[level.index()][position];
            let value = self.compute(&program.predicates[id], element)?;
            self.cache[id] = TriState::from(value);
            self.stats.computed[level.index()] += 1;
        }

        program.level(level).run(level, &self.cache)
    }

    fn compute(&mut self, predicate: &'a AtomicPredicate, element: ElementRef) -> SelectionResult<bool> {
        let structure = self.structure;
        match &predicate.selector {
            Selector::Name => self.compare_text(predicate, structure.name(element)),
            Selector::Index => self.compare_number(predicate, structure.index(element) as f64),
            Selector::Coordinate(axis) => {
                let leaf = leaf_of(predicate, element)?;
                self.compare_number(predicate, structure.position(leaf)[axis.index()])
            }
            Selector::Attribute { key, default } => {
                let value = match structure.attribute(element, key).or_else(|| default.clone()) {
                    Some(value) => value,
                    None => {
                        tracing::warn!("attribute '{}' missing on {:?}", key, element);
                        return Err(SelectionError::MissingAttribute {
                            key: key.clone(),
                            level: element.level(),
                            element: structure.name(element).to_string(),
                        });
                    }
                };
                self.compare_attribute(predicate, key, &value)
            }
            Selector::Proximity => {
                let leaf = leaf_of(predicate, element)?;
                self.compute_proximity(predicate, structure.position(leaf))
            }
        }
    }

    fn compare_attribute(
        &self,
        predicate: &AtomicPredicate,
        key: &str,
        value: &AttrValue,
    ) -> SelectionResult<bool> {
        match value {
            AttrValue::Text(text) if predicate.parameter.is_textual() => {
                self.compare_text(predicate, text)
            }
            AttrValue::Text(text) => match text.trim().parse::<f64>() {
                Ok(number) => self.compare_number(predicate, number),
                Err(_) => Err(SelectionError::AttributeType {
                    key: key.to_string(),
                    expected: "number",
                    found: value.kind(),
                }),
            },
            AttrValue::Number(number) if predicate.parameter.is_numeric() => {
                self.compare_number(predicate, *number)
            }
            AttrValue::Number(_) => Err(SelectionError::AttributeType {
                key: key.to_string(),
                expected: "text",
                found: value.kind(),
            }),
        }
    }

    fn compare_text(&self, predicate: &AtomicPredicate, text: &str) -> SelectionResult<bool> {
        let comparator = predicate.comparator;
        let hit = match &predicate.parameter {
            Parameter::Text(expected) => return Ok(comparator.accepts(self.text_order(text, expected))),
            Parameter::TextSet(options) => options
                .iter()
                .any(|option| self.text_order(text, option) == Ordering::Equal),
            Parameter::Glob(_) | Parameter::Regex(_) => match &self.matchers[predicate.id] {
                Some(matcher) => matcher.is_match(text),
                None => return Err(mismatch(predicate, "pattern was not compiled")),
            },
            _ => return Err(mismatch(predicate, "text compared with a non-text parameter")),
        };
        Ok(membership(comparator, hit))
    }

    fn compare_number(&self, predicate: &AtomicPredicate, value: f64) -> SelectionResult<bool> {
        let comparator = predicate.comparator;
        let tolerance = self.config.float_tolerance;
        let hit = match &predicate.parameter {
            Parameter::Number(expected) => return Ok(comparator.evaluate(value, *expected, tolerance)),
            Parameter::NumberSet(options) => options.iter().any(|o| (value - o).abs() <= tolerance),
            Parameter::Range { min, max } => value >= *min && value <= *max,
            _ => return Err(mismatch(predicate, "number compared with a non-numeric parameter")),
        };
        Ok(membership(comparator, hit))
    }

    /// Squared-distance test against a point or a bound reference
    ///
    /// `<`/`<=` hold when any target leaf satisfies the bound, `>`/`>=` when
    /// every one does; an empty reference satisfies only the latter.
    fn compute_proximity(&mut self, predicate: &'a AtomicPredicate, point: [f64; 3]) -> SelectionResult<bool> {
        let spec = match &predicate.parameter {
            Parameter::Proximity(spec) => spec,
            _ => return Err(mismatch(predicate, "proximity without a proximity parameter")),
        };
        let comparator = predicate.comparator;
        let tolerance = self.config.float_tolerance;
        let radius_sq = spec.radius * spec.radius;
        let accept = move |d2: f64| comparator.evaluate(d2, radius_sq, tolerance);

        match spec.target {
            ProximityTarget::Point(center) => Ok(accept(distance_sq(point, center))),
            ProximityTarget::Reference(reference) => {
                let selection = self.resolve(reference)?;
                Ok(match comparator {
                    Comparator::Lt | Comparator::Le => selection.any_within(point, accept),
                    _ => selection.all_within(point, accept),
                })
            }
        }
    }

    fn text_order(&self, lhs: &str, rhs: &str) -> Ordering {
        if self.config.case_sensitive_names {
            lhs.cmp(rhs)
        } else {
            lhs.to_lowercase().cmp(&rhs.to_lowercase())
        }
    }
}

impl<S: Structure + ?Sized, R: Structure + ?Sized> Clone for Evaluator<'_, S, R> {
    fn clone(&self) -> Self {
        Self {
            program: self.program,
            structure: self.structure,
            reference: self.reference,
            config: self.config.clone(),
            matchers: self.matchers.clone(),
            owned: self.owned.clone(),
            cache: self.cache.clone(),
            bound_refs: self.bound_refs.clone(),
            stats: self.stats,
        }
    }
}

#[cfg(feature = "parallel")]
impl<S: Structure + Sync + ?Sized, R: Structure + Sync + ?Sized> Evaluator<'_, S, R> {
    /// Parallel `select` over groups
    ///
    /// References are materialized once here; every worker then gets its own
    /// clone of the resolved evaluator. Counters of the workers are not merged.
    pub fn select_parallel(&mut self) -> SelectionResult<Selection> {
        use rayon::prelude::*;

        self.resolve_all()?;
        let base = &*self;
        let parts: Vec<SelectionResult<Selection>> = (0..self.structure.group_count())
            .into_par_iter()
            .map_init(
                || base.clone(),
                |evaluator, group| {
                    let mut part = Selection::default();
                    evaluator.select_group(group, &mut part)?;
                    Ok(part)
                },
            )
            .collect();

        let mut selection = Selection::default();
        for part in parts {
            selection.extend(part?);
        }
        Ok(selection)
    }
}

/// `Eq` keeps members, `Ne` keeps non-members
fn membership(comparator: Comparator, hit: bool) -> bool {
    if comparator == Comparator::Ne {
        !hit
    } else {
        hit
    }
}

fn mismatch(predicate: &AtomicPredicate, message: &str) -> SelectionError {
    SelectionError::CompilationMismatch {
        predicate: predicate.id,
        message: message.to_string(),
    }
}

fn leaf_of(predicate: &AtomicPredicate, element: ElementRef) -> SelectionResult<usize> {
    match element {
        ElementRef::Leaf(leaf) => Ok(leaf),
        _ => Err(mismatch(predicate, "leaf selector evaluated above leaf level")),
    }
}

/// Check every predicate against the structure and compile its pattern
fn prepare<T: Structure + ?Sized, U: Structure + ?Sized>(
    program: &CompiledProgram,
    structure: &T,
    reference: &U,
    config: &EvaluatorConfig,
) -> SelectionResult<Vec<Option<Regex>>> {
    let mut matchers = Vec::with_capacity(program.predicates.len());
    let tolerance = config.float_tolerance;
    for predicate in &program.predicates {
        check_predicate(predicate, structure, program.bracketed.len())?;
        let uses_tolerance = predicate.comparator.is_equality()
            && matches!(predicate.parameter, Parameter::Number(_) | Parameter::NumberSet(_));
        if uses_tolerance && !(tolerance.is_finite() && tolerance >= 0.0) {
            return Err(mismatch(predicate, "float tolerance must be finite and non-negative"));
        }
        matchers.push(compile_pattern(predicate, config)?);
    }
    for bracketed in &program.bracketed {
        if !bracketed.is_tautology {
            prepare(bracketed, reference, reference, config)?;
        }
    }
    Ok(matchers)
}

fn check_predicate<T: Structure + ?Sized>(
    predicate: &AtomicPredicate,
    structure: &T,
    bracketed: usize,
) -> SelectionResult<()> {
    let parameter = &predicate.parameter;
    let comparator = predicate.comparator;

    if matches!(predicate.selector, Selector::Coordinate(_) | Selector::Proximity)
        && predicate.level != Level::Leaf
    {
        return Err(mismatch(predicate, "position selector outside leaf level"));
    }

    let set_like = matches!(
        parameter,
        Parameter::TextSet(_) | Parameter::Glob(_) | Parameter::Regex(_) | Parameter::NumberSet(_) | Parameter::Range { .. }
    );
    if set_like && !comparator.is_equality() {
        return Err(mismatch(predicate, "set, range and pattern parameters take == or != only"));
    }

    match &predicate.selector {
        Selector::Name if !parameter.is_textual() => {
            Err(mismatch(predicate, "name compared with a non-text parameter"))
        }
        Selector::Index | Selector::Coordinate(_) if !parameter.is_numeric() => {
            Err(mismatch(predicate, "numeric selector with a non-numeric parameter"))
        }
        Selector::Attribute { key, default } => {
            if !(parameter.is_textual() || parameter.is_numeric()) {
                return Err(mismatch(predicate, "attribute compared with a proximity parameter"));
            }
            match default {
                None if !structure.declares_attribute(predicate.level, key) => Err(mismatch(
                    predicate,
                    &format!("attribute '{}' unknown at {} level", key, predicate.level),
                )),
                Some(AttrValue::Number(_)) if parameter.is_textual() => {
                    Err(mismatch(predicate, "numeric default for a text comparison"))
                }
                Some(AttrValue::Text(text))
                    if parameter.is_numeric() && text.trim().parse::<f64>().is_err() =>
                {
                    Err(mismatch(predicate, "non-numeric text default for a numeric comparison"))
                }
                _ => Ok(()),
            }
        }
        Selector::Proximity => match parameter {
            Parameter::Proximity(spec) => {
                if comparator.is_equality() {
                    Err(mismatch(predicate, "proximity takes <, <=, > or >="))
                } else if !(spec.radius.is_finite() && spec.radius >= 0.0) {
                    Err(mismatch(predicate, "proximity radius must be finite and non-negative"))
                } else if matches!(spec.target, ProximityTarget::Reference(r) if r >= bracketed) {
                    Err(mismatch(predicate, "proximity reference out of range"))
                } else {
                    Ok(())
                }
            }
            _ => Err(mismatch(predicate, "proximity without a proximity parameter")),
        },
        _ if matches!(parameter, Parameter::Proximity(_)) => {
            Err(mismatch(predicate, "proximity parameter on a non-proximity selector"))
        }
        _ => Ok(()),
    }
}

fn compile_pattern(
    predicate: &AtomicPredicate,
    config: &EvaluatorConfig,
) -> SelectionResult<Option<Regex>> {
    let pattern = match &predicate.parameter {
        Parameter::Regex(pattern) => format!("^(?:{})$", pattern),
        Parameter::Glob(glob) => glob_to_regex(glob),
        _ => return Ok(None),
    };
    RegexBuilder::new(&pattern)
        .case_insensitive(!config.case_sensitive_names)
        .build()
        .map(Some)
        .map_err(|e| mismatch(predicate, &format!("invalid pattern: {}", e)))
}

/// Translate `*` and `?` wildcards into an anchored regex
fn glob_to_regex(glob: &str) -> String {
    let mut pattern = String::with_capacity(glob.len() + 2);
    pattern.push('^');
    for c in glob.chars() {
        match c {
            '*' => pattern.push_str(".*"),
            '?' => pattern.push('.'),
            _ => pattern.push_str(&regex::escape(c.encode_utf8(&mut [0; 4]))),
        }
    }
    pattern.push('$');
    pattern
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::{compile, PredicateExpr};
    use crate::hierarchy::Hierarchy;

    fn chain() -> Hierarchy {
        Hierarchy::builder()
            .group("A")
            .item("GLY", 1)
            .leaf("N", 1, [0.0, 0.0, 0.0])
            .leaf("CA", 2, [1.0, 0.0, 0.0])
            .attr("bfactor", 10.0)
            .item("ALA", 2)
            .leaf("N", 3, [4.0, 0.0, 0.0])
            .leaf("CA", 4, [5.0, 0.0, 0.0])
            .attr("bfactor", 30.0)
            .leaf("CB", 5, [5.0, 1.0, 0.0])
            .attr("bfactor", 35.0)
            .build()
    }

    #[test]
    fn test_glob_to_regex() {
        let re = Regex::new(&glob_to_regex("C?*")).unwrap();
        assert!(re.is_match("CA"));
        assert!(re.is_match("CB1"));
        assert!(!re.is_match("C"));
        assert!(Regex::new(&glob_to_regex("H.1")).unwrap().is_match("H.1"));
        assert!(!Regex::new(&glob_to_regex("H.1")).unwrap().is_match("HX1"));
    }

    #[test]
    fn test_glob_and_regex_names() {
        let h = chain();
        let glob = compile(&PredicateExpr::atom(
            Level::Leaf,
            Selector::Name,
            Comparator::Eq,
            Parameter::Glob("C*".to_string()),
        ));
        let mut eval = Evaluator::for_structure(&glob, &h).unwrap();
        assert_eq!(eval.select().unwrap().leaves, vec![1, 3, 4]);

        let regex = compile(&PredicateExpr::atom(
            Level::Leaf,
            Selector::Name,
            Comparator::Ne,
            Parameter::Regex("C[AB]".to_string()),
        ));
        let mut eval = Evaluator::for_structure(&regex, &h).unwrap();
        assert_eq!(eval.select().unwrap().leaves, vec![0, 2]);
    }

    #[test]
    fn test_case_insensitive_names() {
        let h = chain();
        let program = compile(&PredicateExpr::name_is(Level::Item, "gly"));
        let config = EvaluatorConfig {
            case_sensitive_names: false,
            ..Default::default()
        };
        let mut eval = Evaluator::with_config(&program, &h, &h, config).unwrap();
        assert_eq!(eval.select().unwrap().counts(), (1, 1, 2));

        let mut strict = Evaluator::for_structure(&program, &h).unwrap();
        assert!(strict.select().unwrap().is_empty());
    }

    #[test]
    fn test_index_range_and_set() {
        let h = chain();
        let range = compile(&PredicateExpr::atom(
            Level::Leaf,
            Selector::Index,
            Comparator::Eq,
            Parameter::Range { min: 2.0, max: 4.0 },
        ));
        let mut eval = Evaluator::for_structure(&range, &h).unwrap();
        assert_eq!(eval.select().unwrap().leaves, vec![1, 2, 3]);

        let set = compile(&PredicateExpr::atom(
            Level::Item,
            Selector::Index,
            Comparator::Ne,
            Parameter::NumberSet(vec![1.0]),
        ));
        let mut eval = Evaluator::for_structure(&set, &h).unwrap();
        assert_eq!(eval.select().unwrap().items, vec![1]);
    }

    #[test]
    fn test_coordinate_selector() {
        let h = chain();
        let program = compile(&PredicateExpr::atom(
            Level::Leaf,
            Selector::Coordinate(Axis::X),
            Comparator::Ge,
            Parameter::Number(4.0),
        ));
        let mut eval = Evaluator::for_structure(&program, &h).unwrap();
        assert_eq!(eval.select().unwrap().leaves, vec![2, 3, 4]);
    }

    #[test]
    fn test_text_ordering() {
        let h = chain();
        let program = compile(&PredicateExpr::atom(
            Level::Leaf,
            Selector::Name,
            Comparator::Lt,
            Parameter::Text("CB".to_string()),
        ));
        let mut eval = Evaluator::for_structure(&program, &h).unwrap();
        assert_eq!(eval.select().unwrap().leaves, vec![1, 3]);
    }

    #[test]
    fn test_leaf_selector_above_leaf_level_is_rejected() {
        let h = chain();
        let program = compile(&PredicateExpr::atom(
            Level::Item,
            Selector::Coordinate(Axis::Y),
            Comparator::Gt,
            Parameter::Number(0.0),
        ));
        assert!(matches!(
            Evaluator::for_structure(&program, &h),
            Err(SelectionError::CompilationMismatch { predicate: 0, .. })
        ));
    }

    #[test]
    fn test_pattern_with_ordering_is_rejected() {
        let h = chain();
        let program = compile(&PredicateExpr::atom(
            Level::Leaf,
            Selector::Name,
            Comparator::Gt,
            Parameter::Glob("C*".to_string()),
        ));
        assert!(Evaluator::for_structure(&program, &h).is_err());
    }

    #[test]
    fn test_invalid_regex_is_rejected() {
        let h = chain();
        let program = compile(&PredicateExpr::atom(
            Level::Leaf,
            Selector::Name,
            Comparator::Eq,
            Parameter::Regex("C[".to_string()),
        ));
        assert!(matches!(
            Evaluator::for_structure(&program, &h),
            Err(SelectionError::CompilationMismatch { .. })
        ));
    }

    #[test]
    fn test_numeric_text_default() {
        let h = chain();
        let parsed = compile(&PredicateExpr::atom(
            Level::Leaf,
            Selector::attribute_or("charge", " 2.5 "),
            Comparator::Ge,
            Parameter::Number(2.0),
        ));
        let mut eval = Evaluator::for_structure(&parsed, &h).unwrap();
        assert_eq!(eval.select().unwrap().leaves.len(), 5);

        let unparsable = compile(&PredicateExpr::atom(
            Level::Leaf,
            Selector::attribute_or("charge", "none"),
            Comparator::Ge,
            Parameter::Number(2.0),
        ));
        assert!(matches!(
            Evaluator::for_structure(&unparsable, &h),
            Err(SelectionError::CompilationMismatch { predicate: 0, .. })
        ));
    }

    #[test]
    fn test_text_attribute_against_number() {
        let h = Hierarchy::builder()
            .leaf("CA", 1, [0.0; 3])
            .attr("occupancy", "0.5")
            .leaf("CB", 2, [0.0; 3])
            .attr("occupancy", "n/a")
            .build();
        let program = compile(&PredicateExpr::atom(
            Level::Leaf,
            Selector::attribute("occupancy"),
            Comparator::Lt,
            Parameter::Number(1.0),
        ));
        let mut eval = Evaluator::for_structure(&program, &h).unwrap();
        assert!(eval.is_leaf_selected(0).unwrap());
        assert!(matches!(
            eval.is_leaf_selected(1),
            Err(SelectionError::AttributeType { .. })
        ));
    }

    #[test]
    fn test_proximity_beyond_point() {
        let h = chain();
        let program = compile(&PredicateExpr::atom(
            Level::Leaf,
            Selector::Proximity,
            Comparator::Gt,
            Parameter::Proximity(ProximitySpec::around([0.0, 0.0, 0.0], 1.5)),
        ));
        let mut eval = Evaluator::for_structure(&program, &h).unwrap();
        assert_eq!(eval.select().unwrap().leaves, vec![2, 3, 4]);
    }

    #[test]
    fn test_clone_keeps_resolved_references() {
        let h = chain();
        let program = compile(&PredicateExpr::within_selection(
            1.2,
            PredicateExpr::name_is(Level::Leaf, "CB"),
        ));
        let mut eval = Evaluator::for_structure(&program, &h).unwrap();
        eval.resolve_all().unwrap();
        let mut copy = eval.clone();
        assert_eq!(copy.select().unwrap().leaves, vec![3, 4]);
        assert_eq!(copy.stats().materializations, 1);
    }
}
