//! Document planner
//!
//! Compiles a mapping document and a resolved [`XmlQuery`] into a
//! [`Program`]:
//!
//! 1. one correlated query ([`ClassPlan`]) per bound node, with its
//!    projection and positional parameters
//! 2. recursion unrolled into depth-indexed classes sharing the anchor's shape
//! 3. WHERE conjuncts scope-tagged to a class, row caps attached
//! 4. ORDER BY keys collected into the merge order
//! 5. choice decision lists
//! 6. per-unit instruction lists with staging materialize/unload steps

use crate::error::{PlannerError, Result};
use crate::expr::{BoundExpr, LikePattern};
use crate::program::{
    BranchPlan, CapKind, ChoiceId, ChoicePlan, ClassId, ClassPlan, Filter, Instruction,
    MergeOrder, ParamBinding, Program, RecursionId, RecursionPlan, RowCap, SlotRef, SortKey,
    Step, UnitPlan,
};
use crate::query::XmlQuery;
use crate::scope::ScopeResolver;
use smallvec::SmallVec;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;
use xmlview_model::{
    CompareOp, Expr, MappingDocument, NodeId, NodeKind, QualifiedName, TreePath, Value,
    DEFAULT_RECURSION_LIMIT,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlannerOptions {
    /// Depth used for recursive elements declaring `recursionLimit <= 0`.
    pub default_recursion_limit: u32,
}

impl Default for PlannerOptions {
    fn default() -> Self {
        Self {
            default_recursion_limit: DEFAULT_RECURSION_LIMIT,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct DocumentPlanner {
    options: PlannerOptions,
}

impl DocumentPlanner {
    pub fn new(options: PlannerOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &PlannerOptions {
        &self.options
    }

    pub fn plan(&self, document: Arc<MappingDocument>, query: &XmlQuery) -> Result<Program> {
        let compiled = {
            let mut compilation = Compilation::new(&document, self.options);
            compilation.compile(query)?;
            compilation.finish()
        };
        debug!(
            document = %document.name(),
            classes = compiled.classes.len(),
            choices = compiled.choices.len(),
            recursions = compiled.recursions.len(),
            units = compiled.units.len(),
            "planned document"
        );
        Ok(Program {
            document,
            classes: compiled.classes,
            choices: compiled.choices,
            recursions: compiled.recursions,
            units: compiled.units,
            merge_order: compiled.merge_order,
            node_classes: compiled.node_classes,
            node_choices: compiled.node_choices,
            node_recursions: compiled.node_recursions,
            value_slots: compiled.value_slots,
        })
    }
}

/// Where an expression is bound.
#[derive(Debug, Clone, Copy)]
enum BindMode {
    /// Query predicate: only document paths are allowed.
    Predicate,
    /// Criteria declared on a mapping node; bare columns resolve from `at`.
    Criteria { at: NodeId },
}

struct Compiled {
    classes: Vec<ClassPlan>,
    choices: Vec<ChoicePlan>,
    recursions: Vec<RecursionPlan>,
    units: Vec<UnitPlan>,
    merge_order: MergeOrder,
    node_classes: HashMap<NodeId, ClassId>,
    node_choices: HashMap<NodeId, ChoiceId>,
    node_recursions: HashMap<NodeId, RecursionId>,
    value_slots: HashMap<NodeId, SlotRef>,
}

struct Compilation<'a> {
    doc: &'a MappingDocument,
    resolver: ScopeResolver<'a>,
    options: PlannerOptions,
    classes: Vec<ClassPlan>,
    choices: Vec<ChoicePlan>,
    recursions: Vec<RecursionPlan>,
    units: Vec<UnitPlan>,
    merge_order: MergeOrder,
    node_classes: HashMap<NodeId, ClassId>,
    node_choices: HashMap<NodeId, ChoiceId>,
    node_recursions: HashMap<NodeId, RecursionId>,
    value_slots: HashMap<NodeId, SlotRef>,
}

impl<'a> Compilation<'a> {
    fn new(doc: &'a MappingDocument, options: PlannerOptions) -> Self {
        Self {
            doc,
            resolver: ScopeResolver::new(doc),
            options,
            classes: Vec::new(),
            choices: Vec::new(),
            recursions: Vec::new(),
            units: Vec::new(),
            merge_order: MergeOrder::default(),
            node_classes: HashMap::new(),
            node_choices: HashMap::new(),
            node_recursions: HashMap::new(),
            value_slots: HashMap::new(),
        }
    }

    fn compile(&mut self, query: &XmlQuery) -> Result<()> {
        self.compile_classes()?;
        self.compile_value_slots()?;
        self.compile_parameters()?;
        self.compile_recursions()?;
        self.compile_choices()?;
        if let Some(criteria) = &query.criteria {
            for conjunct in criteria.conjuncts() {
                self.compile_conjunct(conjunct)?;
            }
        }
        for key in &query.order_by {
            self.compile_order_key(&key.path, key.direction)?;
        }
        self.share_anchor_shape();
        self.compile_units();
        for class in &self.classes {
            debug!(
                class = %class.id,
                node = %self.doc.node(class.node).display_path(),
                source = %class.source,
                depth = class.depth,
                columns = class.columns.len(),
                filters = class.filters.len(),
                staged = class.staged,
                "compiled mapping class"
            );
        }
        Ok(())
    }

    fn finish(self) -> Compiled {
        Compiled {
            classes: self.classes,
            choices: self.choices,
            recursions: self.recursions,
            units: self.units,
            merge_order: self.merge_order,
            node_classes: self.node_classes,
            node_choices: self.node_choices,
            node_recursions: self.node_recursions,
            value_slots: self.value_slots,
        }
    }

    fn class_id(&self, node: NodeId) -> Result<ClassId> {
        let class = match self.doc.anchor_of(node) {
            // Columns of a recursive node are the anchor's, depth by depth.
            Some(anchor) => anchor,
            None => node,
        };
        self.node_classes
            .get(&class)
            .copied()
            .ok_or_else(|| PlannerError::UnboundReference(self.doc.node(node).display_path()))
    }

    /// Slot for `column` of `class`, extending the projection on first use.
    fn slot(&mut self, class: ClassId, column: &str) -> SlotRef {
        let plan = &mut self.classes[class.0];
        let index = match plan.column_index(column) {
            Some(index) => index,
            None => {
                plan.columns.push(column.to_string());
                plan.columns.len() - 1
            }
        };
        SlotRef {
            class,
            column: index,
        }
    }

    fn compile_classes(&mut self) -> Result<()> {
        for node in self.doc.nodes() {
            if matches!(node.kind, NodeKind::Recursive(_)) {
                continue;
            }
            let Some(binding) = node.binding() else {
                continue;
            };
            let id = ClassId(self.classes.len());
            let parent = self
                .doc
                .enclosing_class(node.id)
                .and_then(|c| self.node_classes.get(&c).copied());
            self.classes.push(ClassPlan {
                id,
                node: node.id,
                source: binding.source.clone(),
                parent,
                shape: id,
                depth: 0,
                columns: Vec::new(),
                parameters: Vec::new(),
                filters: Vec::new(),
                cap: None,
                cardinality: node.cardinality().unwrap_or_default(),
                staged: false,
            });
            self.node_classes.insert(node.id, id);
        }
        Ok(())
    }

    fn compile_value_slots(&mut self) -> Result<()> {
        let doc = self.doc;
        for node in doc.nodes() {
            let Some(column) = node.kind.value_column() else {
                continue;
            };
            let class_node = self.resolver.resolve_column(node.id, column, false)?;
            let class = self.class_id(class_node)?;
            let slot = self.slot(class, &column.column);
            self.value_slots.insert(node.id, slot);
        }
        Ok(())
    }

    fn bind_parameters(&mut self, node: NodeId) -> Result<Vec<ParamBinding>> {
        let doc = self.doc;
        let mut parameters = Vec::new();
        if let Some(binding) = doc.node(node).binding() {
            for correlation in &binding.parameters {
                let class_node = self.resolver.resolve_column(node, &correlation.parent, true)?;
                let class = self.class_id(class_node)?;
                let value = self.slot(class, &correlation.parent.column);
                parameters.push(ParamBinding {
                    column: correlation.column.clone(),
                    value,
                });
            }
        }
        Ok(parameters)
    }

    fn compile_parameters(&mut self) -> Result<()> {
        for index in 0..self.classes.len() {
            let node = self.classes[index].node;
            let parameters = self.bind_parameters(node)?;
            self.classes[index].parameters = parameters;
        }
        Ok(())
    }

    fn compile_recursions(&mut self) -> Result<()> {
        let doc = self.doc;
        for node in doc.nodes() {
            let NodeKind::Recursive(recursive) = &node.kind else {
                continue;
            };
            let (Some(anchor), Some(binding)) = (node.anchor, recursive.binding.as_ref()) else {
                continue;
            };
            let anchor_class = self.class_id(anchor)?;
            let limit = recursive.effective_limit(self.options.default_recursion_limit);
            let parameters = self.bind_parameters(node.id)?;
            let criteria = match &recursive.criteria {
                Some(expr) => Some(self.bind(expr, BindMode::Criteria { at: anchor })?),
                None => None,
            };
            let enclosing = doc
                .enclosing_class(node.id)
                .and_then(|c| self.node_classes.get(&c).copied());

            let id = RecursionId(self.recursions.len());
            let mut depths = Vec::with_capacity(limit as usize);
            let mut parent = enclosing;
            for depth in 1..=limit {
                let class = ClassId(self.classes.len());
                self.classes.push(ClassPlan {
                    id: class,
                    node: node.id,
                    source: binding.source.clone(),
                    parent,
                    shape: anchor_class,
                    depth,
                    columns: Vec::new(),
                    parameters: parameters.clone(),
                    filters: Vec::new(),
                    cap: None,
                    cardinality: recursive.cardinality,
                    staged: false,
                });
                depths.push(class);
                parent = Some(class);
            }
            debug!(
                recursion = %id,
                node = %node.display_path(),
                anchor = %doc.node(anchor).display_path(),
                limit,
                exception_on_limit = recursive.exception_on_limit,
                "unrolled recursion"
            );
            self.recursions.push(RecursionPlan {
                id,
                node: node.id,
                anchor,
                anchor_class,
                limit,
                exception_on_limit: recursive.exception_on_limit,
                criteria,
                depths,
            });
            self.node_recursions.insert(node.id, id);
        }
        Ok(())
    }

    fn compile_choices(&mut self) -> Result<()> {
        let doc = self.doc;
        for node in doc.nodes() {
            let NodeKind::Choice(choice) = &node.kind else {
                continue;
            };
            let mut branches = Vec::new();
            for child in doc.children(node.id) {
                let NodeKind::Criteria(criteria) = &doc.node(*child).kind else {
                    continue;
                };
                if criteria.exclude {
                    continue;
                }
                let bound = match &criteria.criteria {
                    Some(expr) => Some(self.bind(expr, BindMode::Criteria { at: *child })?),
                    None => None,
                };
                branches.push(BranchPlan {
                    node: *child,
                    criteria: bound,
                });
            }
            let id = ChoiceId(self.choices.len());
            debug!(
                choice = %id,
                node = %node.display_path(),
                branches = branches.len(),
                "compiled choice"
            );
            self.choices.push(ChoicePlan {
                id,
                node: node.id,
                branches,
                exception_on_default: choice.exception_on_default,
            });
            self.node_choices.insert(node.id, id);
        }
        Ok(())
    }

    fn bind(&mut self, expr: &Expr, mode: BindMode) -> Result<BoundExpr> {
        Ok(match expr {
            Expr::Literal { value } => BoundExpr::Literal(value.clone()),
            Expr::Path { path } => BoundExpr::Slot(self.path_slot(path)?),
            Expr::Context { target, .. } => BoundExpr::Slot(self.path_slot(target)?),
            Expr::Column { column } => match mode {
                BindMode::Predicate => {
                    return Err(PlannerError::ColumnInPredicate(column.to_string()))
                }
                BindMode::Criteria { at } => {
                    let class_node = self.resolver.resolve_column(at, column, false)?;
                    let class = self.class_id(class_node)?;
                    BoundExpr::Slot(self.slot(class, &column.column))
                }
            },
            Expr::Compare { op, left, right } => BoundExpr::Compare {
                op: *op,
                left: Box::new(self.bind(left, mode)?),
                right: Box::new(self.bind(right, mode)?),
            },
            Expr::Like {
                expr,
                pattern,
                negated,
            } => BoundExpr::Like {
                expr: Box::new(self.bind(expr, mode)?),
                pattern: LikePattern::new(pattern)?,
                negated: *negated,
            },
            Expr::In {
                expr,
                list,
                negated,
            } => BoundExpr::In {
                expr: Box::new(self.bind(expr, mode)?),
                list: list
                    .iter()
                    .map(|item| self.bind(item, mode))
                    .collect::<Result<_>>()?,
                negated: *negated,
            },
            Expr::IsNull { expr, negated } => BoundExpr::IsNull {
                expr: Box::new(self.bind(expr, mode)?),
                negated: *negated,
            },
            Expr::And { operands } => BoundExpr::And(
                operands
                    .iter()
                    .map(|operand| self.bind(operand, mode))
                    .collect::<Result<_>>()?,
            ),
            Expr::Or { operands } => BoundExpr::Or(
                operands
                    .iter()
                    .map(|operand| self.bind(operand, mode))
                    .collect::<Result<_>>()?,
            ),
            Expr::Not { operand } => BoundExpr::Not(Box::new(self.bind(operand, mode)?)),
            Expr::RowLimit { .. } => return Err(PlannerError::InvalidRowLimit(expr.to_string())),
        })
    }

    fn path_slot(&mut self, path: &TreePath) -> Result<SlotRef> {
        let reference = self.resolver.data_reference(path)?;
        let class = self.class_id(reference.class)?;
        Ok(self.slot(class, &reference.column))
    }

    fn compile_conjunct(&mut self, conjunct: &Expr) -> Result<()> {
        if let Some((target, exception, limit)) = row_limit(conjunct)? {
            return self.compile_row_limit(target, exception, limit);
        }

        let mut paths: Vec<&TreePath> = Vec::new();
        let mut contexts: Vec<(&TreePath, &TreePath)> = Vec::new();
        conjunct.walk(&mut |e| match e {
            Expr::Path { path } => paths.push(path),
            Expr::Context { scope, target } => contexts.push((scope, target)),
            _ => {}
        });

        let mut referenced = Vec::new();
        for path in &paths {
            referenced.push(self.resolver.data_reference(path)?.class);
        }
        let mut explicit: Option<(NodeId, String)> = None;
        for (scope, target) in &contexts {
            let resolved = self.resolver.context(scope, target)?;
            referenced.push(resolved.target.class);
            let label = format!("context({}, {})", scope, target);
            match &explicit {
                Some((existing, first)) if *existing != resolved.scope => {
                    return Err(PlannerError::IncompatibleContext {
                        first: first.clone(),
                        second: label,
                    });
                }
                Some(_) => {}
                None => explicit = Some((resolved.scope, label)),
            }
        }

        let condition = self.bind(conjunct, BindMode::Predicate)?;
        let text = conjunct.to_string();

        let Some(deepest) = self.resolver.deepest(&referenced) else {
            if referenced.is_empty() {
                // Constant predicate: restrict every outermost class.
                let outermost: Vec<ClassId> = self
                    .classes
                    .iter()
                    .filter(|c| c.parent.is_none() && c.depth == 0)
                    .map(|c| c.id)
                    .collect();
                for class in outermost {
                    self.classes[class.0].filters.push(Filter {
                        probe: SmallVec::new(),
                        condition: condition.clone(),
                        text: text.clone(),
                    });
                }
                return Ok(());
            }
            return Err(PlannerError::DisjointReferences(text));
        };

        let scope = match &explicit {
            Some((scope, _)) => *scope,
            None => self.resolver.default_scope(deepest),
        };
        if !self.doc.is_ancestor_or_self(scope, deepest) {
            return Err(PlannerError::DisjointReferences(text));
        }
        let chain = self.doc.class_chain(deepest);
        let mut probe: SmallVec<[ClassId; 2]> = SmallVec::new();
        let mut below = false;
        for class_node in chain {
            if below {
                probe.push(self.class_id(class_node)?);
            }
            if class_node == scope {
                below = true;
            }
        }
        let scope_class = self.class_id(scope)?;
        debug!(
            class = %scope_class,
            probe = probe.len(),
            predicate = %text,
            "scoped predicate"
        );
        self.classes[scope_class.0].filters.push(Filter {
            probe,
            condition,
            text,
        });
        Ok(())
    }

    fn compile_row_limit(&mut self, target: &TreePath, exception: bool, limit: usize) -> Result<()> {
        let class_node = self.resolver.row_limit_target(target)?;
        let classes: Vec<ClassId> = match self.node_recursions.get(&class_node) {
            Some(recursion) => self.recursions[recursion.0].depths.clone(),
            None => vec![self.class_id(class_node)?],
        };
        let cap = RowCap {
            limit,
            kind: if exception {
                CapKind::Raise
            } else {
                CapKind::Truncate
            },
        };
        for class in classes {
            let plan = &mut self.classes[class.0];
            match plan.cap {
                Some(existing) if existing != cap => {
                    return Err(PlannerError::ConflictingRowLimit {
                        class: self.doc.node(plan.node).display_path(),
                        first: existing.to_string(),
                        second: cap.to_string(),
                    });
                }
                _ => plan.cap = Some(cap),
            }
        }
        Ok(())
    }

    fn compile_order_key(
        &mut self,
        path: &TreePath,
        direction: crate::query::SortDirection,
    ) -> Result<()> {
        let node = self.resolver.resolve(path)?;
        if self.doc.owning_class(node).is_none() || self.doc.node(node).kind.value_column().is_none()
        {
            return Err(PlannerError::UnmappedOrderKey(path.to_string()));
        }
        let slot = self.path_slot(path)?;
        self.merge_order.push(
            slot.class,
            SortKey {
                column: slot.column,
                direction,
            },
        );
        Ok(())
    }

    /// Depth classes render the anchor's content, so they project the
    /// anchor's columns and inherit its ordering.
    fn share_anchor_shape(&mut self) {
        for recursion in &self.recursions {
            let columns = self.classes[recursion.anchor_class.0].columns.clone();
            let keys = self.merge_order.keys(recursion.anchor_class).to_vec();
            for class in &recursion.depths {
                self.classes[class.0].columns = columns.clone();
                for key in &keys {
                    self.merge_order.push(*class, *key);
                }
            }
        }
    }

    fn compile_units(&mut self) {
        let doc = self.doc;
        for root in doc.roots() {
            let mut groups: Vec<QualifiedName> = Vec::new();
            for id in doc.walk(*root) {
                if let NodeKind::Element(element) = &doc.node(id).kind {
                    for group in &element.staging_tables {
                        if !groups.contains(group) {
                            groups.push(group.clone());
                        }
                    }
                }
            }
            let unit_nodes = doc.walk(*root);
            for class in &mut self.classes {
                if unit_nodes.contains(&class.node) && groups.contains(&class.source) {
                    class.staged = true;
                }
            }

            let mut steps: Vec<Step> = groups
                .iter()
                .map(|group| Step {
                    level: 0,
                    instruction: Instruction::Materialize {
                        group: group.clone(),
                    },
                })
                .collect();
            self.unit_steps(*root, 0, &mut steps);
            steps.extend(groups.iter().map(|group| Step {
                level: 0,
                instruction: Instruction::Unload {
                    group: group.clone(),
                },
            }));
            if !groups.is_empty() {
                debug!(
                    root = %doc.node(*root).display_path(),
                    staging = groups.len(),
                    "scheduled staging tables"
                );
            }
            self.units.push(UnitPlan { root: *root, steps });
        }
    }

    fn unit_steps(&self, node: NodeId, level: usize, steps: &mut Vec<Step>) {
        let doc = self.doc;
        let mapping = doc.node(node);
        if mapping.kind.is_excluded() {
            return;
        }
        let mut level = level;
        if let Some(class) = self.node_classes.get(&node) {
            steps.push(Step {
                level,
                instruction: Instruction::Fetch { class: *class },
            });
            level += 1;
        }
        if let Some(choice) = self.node_choices.get(&node) {
            steps.push(Step {
                level,
                instruction: Instruction::EvaluateChoice { choice: *choice },
            });
            let plan = &self.choices[choice.0];
            for branch in &plan.branches {
                for child in doc.children(branch.node) {
                    self.unit_steps(*child, level + 1, steps);
                }
            }
            return;
        }
        if let Some(recursion) = self.node_recursions.get(&node) {
            let plan = &self.recursions[recursion.0];
            let rendered = plan.limit.saturating_sub(1);
            let last = if plan.exception_on_limit {
                plan.limit
            } else {
                rendered
            };
            for depth in 1..=last {
                if let Some(class) = plan.class_at(depth) {
                    steps.push(Step {
                        level: level + depth as usize - 1,
                        instruction: Instruction::Recurse {
                            recursion: *recursion,
                            depth,
                            class,
                        },
                    });
                }
            }
            return;
        }
        for child in doc.children(node) {
            self.unit_steps(*child, level, steps);
        }
    }
}

/// Recognize `rowlimit(path) = n` in either operand order.
fn row_limit(expr: &Expr) -> Result<Option<(&TreePath, bool, usize)>> {
    let Expr::Compare { op, left, right } = expr else {
        return Ok(None);
    };
    let (call, literal) = match (left.as_ref(), right.as_ref()) {
        (call @ Expr::RowLimit { .. }, literal) | (literal, call @ Expr::RowLimit { .. }) => {
            (call, literal)
        }
        _ => return Ok(None),
    };
    let Expr::RowLimit { target, exception } = call else {
        return Ok(None);
    };
    let limit = match (op, literal) {
        (CompareOp::Eq, Expr::Literal { value }) => match value {
            Value::Integer(n) => usize::try_from(*n).ok(),
            Value::String(s) => s.trim().parse::<usize>().ok(),
            _ => None,
        },
        _ => None,
    };
    match limit {
        Some(limit) => Ok(Some((target, *exception, limit))),
        None => Err(PlannerError::InvalidRowLimit(expr.to_string())),
    }
}
