//! Compiled, immutable execution plan

use crate::expr::BoundExpr;
use crate::query::SortDirection;
use smallvec::SmallVec;
use std::collections::HashMap;
use std::fmt::{self, Write as _};
use std::sync::Arc;
use xmlview_model::{Cardinality, MappingDocument, NodeId, QualifiedName};

macro_rules! arena_id {
    ($name:ident, $prefix:literal) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub usize);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "{}"), self.0)
            }
        }
    };
}

arena_id!(ClassId, "M");
arena_id!(ChoiceId, "C");
arena_id!(RecursionId, "R");

/// Column `column` (index into [`ClassPlan::columns`]) of the nearest row of
/// `class` in scope. Rows of recursion depth classes answer for their shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotRef {
    pub class: ClassId,
    pub column: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamBinding {
    /// Column of the bound group restricted by the parameter.
    pub column: String,
    pub value: SlotRef,
}

/// Scope-tagged predicate. With a non-empty `probe` the condition is tested
/// existentially over rows of the probed nested classes.
#[derive(Debug, Clone)]
pub struct Filter {
    pub probe: SmallVec<[ClassId; 2]>,
    pub condition: BoundExpr,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapKind {
    /// `rowlimit`: stop iterating at the cap.
    Truncate,
    /// `rowlimitexception`: fail once the cap is exceeded.
    Raise,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowCap {
    pub limit: usize,
    pub kind: CapKind,
}

impl fmt::Display for RowCap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            CapKind::Truncate => write!(f, "rowlimit {}", self.limit),
            CapKind::Raise => write!(f, "rowlimitexception {}", self.limit),
        }
    }
}

/// One correlated query per mapping class.
#[derive(Debug, Clone)]
pub struct ClassPlan {
    pub id: ClassId,
    /// Bound mapping node; the recursive node for recursion depth classes.
    pub node: NodeId,
    pub source: QualifiedName,
    pub parent: Option<ClassId>,
    /// Class whose projection and content this class renders. Equals `id`
    /// except for recursion depth classes, whose shape is the anchor class.
    pub shape: ClassId,
    /// Recursion depth, 0 outside recursion.
    pub depth: u32,
    pub columns: Vec<String>,
    pub parameters: Vec<ParamBinding>,
    pub filters: Vec<Filter>,
    pub cap: Option<RowCap>,
    pub cardinality: Cardinality,
    /// Reads from the production's staging snapshot instead of the source.
    pub staged: bool,
}

impl ClassPlan {
    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(column))
    }
}

#[derive(Debug, Clone)]
pub struct BranchPlan {
    pub node: NodeId,
    /// `None` for the default branch.
    pub criteria: Option<BoundExpr>,
}

#[derive(Debug, Clone)]
pub struct ChoicePlan {
    pub id: ChoiceId,
    pub node: NodeId,
    /// Non-excluded branches in declared order.
    pub branches: Vec<BranchPlan>,
    pub exception_on_default: bool,
}

#[derive(Debug, Clone)]
pub struct RecursionPlan {
    pub id: RecursionId,
    pub node: NodeId,
    pub anchor: NodeId,
    pub anchor_class: ClassId,
    pub limit: u32,
    pub exception_on_limit: bool,
    /// Tested against the parent row before descending.
    pub criteria: Option<BoundExpr>,
    /// `depths[d - 1]` is the class fetched at depth `d`, for `d` in `1..=limit`.
    /// Only depths below `limit` render; the last class is probed in
    /// exception mode.
    pub depths: Vec<ClassId>,
}

impl RecursionPlan {
    pub fn class_at(&self, depth: u32) -> Option<ClassId> {
        let index = usize::try_from(depth).ok()?.checked_sub(1)?;
        self.depths.get(index).copied()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortKey {
    pub column: usize,
    pub direction: SortDirection,
}

/// Per-class ORDER BY keys. Keys only order rows of their class within one
/// parent row.
#[derive(Debug, Clone, Default)]
pub struct MergeOrder {
    keys: HashMap<ClassId, Vec<SortKey>>,
}

impl MergeOrder {
    pub fn push(&mut self, class: ClassId, key: SortKey) {
        self.keys.entry(class).or_default().push(key);
    }

    pub fn keys(&self, class: ClassId) -> &[SortKey] {
        self.keys.get(&class).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn classes(&self) -> impl Iterator<Item = ClassId> + '_ {
        self.keys.keys().copied()
    }
}

/// One step of a unit's listing.
///
/// The engine executes `Materialize` and `Unload` around the unit. `Fetch`,
/// `EvaluateChoice` and `Recurse` record, in pre-order, the walk the engine
/// makes over the mapping tree; they are shown by [`Program::explain`] and
/// are not interpreted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
    Materialize { group: QualifiedName },
    Fetch { class: ClassId },
    EvaluateChoice { choice: ChoiceId },
    Recurse {
        recursion: RecursionId,
        depth: u32,
        class: ClassId,
    },
    Unload { group: QualifiedName },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    /// Nesting level, for display.
    pub level: usize,
    pub instruction: Instruction,
}

/// Instructions for one top-level element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitPlan {
    pub root: NodeId,
    pub steps: Vec<Step>,
}

impl UnitPlan {
    pub fn materialized(&self) -> impl Iterator<Item = &QualifiedName> {
        self.steps.iter().filter_map(|step| match &step.instruction {
            Instruction::Materialize { group } => Some(group),
            _ => None,
        })
    }

    pub fn unloaded(&self) -> impl Iterator<Item = &QualifiedName> {
        self.steps.iter().filter_map(|step| match &step.instruction {
            Instruction::Unload { group } => Some(group),
            _ => None,
        })
    }
}

/// Executable plan for one query against one mapping document. Immutable
/// and shared across productions.
#[derive(Debug, Clone)]
pub struct Program {
    pub(crate) document: Arc<MappingDocument>,
    pub(crate) classes: Vec<ClassPlan>,
    pub(crate) choices: Vec<ChoicePlan>,
    pub(crate) recursions: Vec<RecursionPlan>,
    pub(crate) units: Vec<UnitPlan>,
    pub(crate) merge_order: MergeOrder,
    pub(crate) node_classes: HashMap<NodeId, ClassId>,
    pub(crate) node_choices: HashMap<NodeId, ChoiceId>,
    pub(crate) node_recursions: HashMap<NodeId, RecursionId>,
    pub(crate) value_slots: HashMap<NodeId, SlotRef>,
}

impl Program {
    pub fn document(&self) -> &Arc<MappingDocument> {
        &self.document
    }

    pub fn classes(&self) -> &[ClassPlan] {
        &self.classes
    }

    pub fn class(&self, id: ClassId) -> &ClassPlan {
        &self.classes[id.0]
    }

    pub fn choices(&self) -> &[ChoicePlan] {
        &self.choices
    }

    pub fn choice(&self, id: ChoiceId) -> &ChoicePlan {
        &self.choices[id.0]
    }

    pub fn recursions(&self) -> &[RecursionPlan] {
        &self.recursions
    }

    pub fn recursion(&self, id: RecursionId) -> &RecursionPlan {
        &self.recursions[id.0]
    }

    pub fn units(&self) -> &[UnitPlan] {
        &self.units
    }

    pub fn merge_order(&self) -> &MergeOrder {
        &self.merge_order
    }

    /// Depth-0 mapping class of a bound node.
    pub fn class_of(&self, node: NodeId) -> Option<ClassId> {
        self.node_classes.get(&node).copied()
    }

    pub fn choice_of(&self, node: NodeId) -> Option<ChoiceId> {
        self.node_choices.get(&node).copied()
    }

    pub fn recursion_of(&self, node: NodeId) -> Option<RecursionId> {
        self.node_recursions.get(&node).copied()
    }

    /// Slot rendered by a data-bearing element or attribute.
    pub fn value_slot(&self, node: NodeId) -> Option<SlotRef> {
        self.value_slots.get(&node).copied()
    }

    /// Indented listing of every unit's instructions.
    pub fn explain(&self) -> String {
        let mut out = String::new();
        for (index, unit) in self.units.iter().enumerate() {
            let root = self.document.node(unit.root);
            let _ = writeln!(out, "unit {} {}", index, root.display_path());
            for step in &unit.steps {
                let indent = "  ".repeat(step.level + 1);
                let _ = writeln!(out, "{}{}", indent, self.describe(&step.instruction));
            }
        }
        out
    }

    fn describe(&self, instruction: &Instruction) -> String {
        match instruction {
            Instruction::Materialize { group } => format!("materialize {}", group),
            Instruction::Unload { group } => format!("unload {}", group),
            Instruction::Fetch { class } => {
                let plan = self.class(*class);
                let mut line = format!(
                    "fetch {} {} from {}",
                    plan.id,
                    self.document.node(plan.node).display_path(),
                    plan.source
                );
                if plan.staged {
                    line.push_str(" (staged)");
                }
                if !plan.parameters.is_empty() {
                    let params: Vec<String> = plan
                        .parameters
                        .iter()
                        .map(|p| {
                            let source = self.class(p.value.class);
                            let column = source
                                .columns
                                .get(p.value.column)
                                .map(String::as_str)
                                .unwrap_or("?");
                            format!("{} = {}.{}", p.column, source.id, column)
                        })
                        .collect();
                    let _ = write!(line, " where {}", params.join(", "));
                }
                for filter in &plan.filters {
                    if filter.probe.is_empty() {
                        let _ = write!(line, " filter [{}]", filter.text);
                    } else {
                        let probe: Vec<String> =
                            filter.probe.iter().map(ToString::to_string).collect();
                        let _ = write!(
                            line,
                            " filter exists {} [{}]",
                            probe.join("/"),
                            filter.text
                        );
                    }
                }
                let keys = self.merge_order.keys(*class);
                if !keys.is_empty() {
                    let keys: Vec<String> = keys
                        .iter()
                        .map(|k| {
                            let column = plan.columns.get(k.column).map(String::as_str).unwrap_or("?");
                            match k.direction {
                                SortDirection::Asc => column.to_string(),
                                SortDirection::Desc => format!("{} desc", column),
                            }
                        })
                        .collect();
                    let _ = write!(line, " order by {}", keys.join(", "));
                }
                if let Some(cap) = plan.cap {
                    let _ = write!(line, " {}", cap);
                }
                line
            }
            Instruction::EvaluateChoice { choice } => {
                let plan = self.choice(*choice);
                format!(
                    "choose {} {} ({} branches{})",
                    plan.id,
                    self.document.node(plan.node).display_path(),
                    plan.branches.len(),
                    if plan.exception_on_default {
                        ", exception on default"
                    } else {
                        ""
                    }
                )
            }
            Instruction::Recurse {
                recursion,
                depth,
                class,
            } => {
                let plan = self.recursion(*recursion);
                let mode = if *depth >= plan.limit {
                    " (limit check)"
                } else {
                    ""
                };
                format!(
                    "recurse {} depth {} fetch {} from {}{}",
                    plan.id,
                    depth,
                    class,
                    self.class(*class).source,
                    mode
                )
            }
        }
    }
}
