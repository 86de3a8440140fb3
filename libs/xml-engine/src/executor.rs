//! Production: executes a [`Program`] against a tuple source
//!
//! Rendering is a depth-first walk over the mapping tree. Every bound node
//! opens one cursor per parent row; the rows currently being rendered form a
//! frame stack that answers slot lookups for parameters, filters and
//! criteria. A production is single threaded; independent productions may
//! share one program.

use crate::error::{ProcessingError, Result};
use crate::fragment::{AttributeFragment, ElementFragment, Fragment, FragmentDocument};
use crate::source::{Tuple, TupleCursor, TupleSource};
use crate::staging::StagingStore;
use std::cmp::Ordering;
use tracing::{debug, debug_span, trace};
use xmlview_model::{
    Attribute, Element, MappingDocument, Namespace, NodeId, NodeKind, RecursiveElement, Value,
};
use xmlview_planner::{
    BoundExpr, CapKind, ChoiceId, ClassId, ClassPlan, Program, RecursionId, RowScope, SlotRef,
    SortDirection, SortKey, UnitPlan,
};

static NULL: Value = Value::Null;

/// Counters collected over one production.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductionStats {
    pub documents: usize,
    pub cursors_opened: usize,
    pub tuples_read: usize,
    pub fragments_emitted: usize,
    pub staging_materialized: usize,
}

#[derive(Debug, Clone)]
pub struct ProductionOutput {
    pub documents: Vec<FragmentDocument>,
    pub stats: ProductionStats,
}

/// Run `program` against `source`. Any failure aborts the production and
/// releases every cursor and staging snapshot it opened.
pub fn execute(program: &Program, source: &dyn TupleSource) -> Result<ProductionOutput> {
    Production::new(program, source).run()
}

struct Frame {
    class: ClassId,
    shape: ClassId,
    row: Tuple,
    placeholder: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InstanceState {
    Unopened,
    Open,
    Emitting(usize),
    Exhausted,
    Capped,
    Failed,
}

/// Lifecycle of one mapping-class instance (one cursor for one parent row).
struct ClassInstance {
    class: ClassId,
    state: InstanceState,
}

impl ClassInstance {
    fn new(class: ClassId) -> Self {
        Self {
            class,
            state: InstanceState::Unopened,
        }
    }

    fn advance(&mut self, next: InstanceState) {
        trace!(class = %self.class, from = ?self.state, to = ?next, "class instance");
        self.state = next;
    }
}

pub struct Production<'a> {
    program: &'a Program,
    document: &'a MappingDocument,
    source: &'a dyn TupleSource,
    frames: Vec<Frame>,
    /// Active recursion depths, innermost last.
    recursion: Vec<(RecursionId, u32)>,
    staging: StagingStore,
    stats: ProductionStats,
}

impl<'a> Production<'a> {
    pub fn new(program: &'a Program, source: &'a dyn TupleSource) -> Self {
        Self {
            program,
            document: program.document().as_ref(),
            source,
            frames: Vec::new(),
            recursion: Vec::new(),
            staging: StagingStore::new(),
            stats: ProductionStats::default(),
        }
    }

    pub fn run(mut self) -> Result<ProductionOutput> {
        let span = debug_span!("production", document = %self.document.name());
        let _enter = span.enter();

        let program = self.program;
        let mut documents = Vec::new();
        for unit in program.units() {
            self.run_unit(unit, &mut documents)?;
        }
        self.stats.documents = documents.len();
        debug!(
            documents = self.stats.documents,
            cursors = self.stats.cursors_opened,
            tuples = self.stats.tuples_read,
            fragments = self.stats.fragments_emitted,
            "production complete"
        );
        Ok(ProductionOutput {
            documents,
            stats: self.stats,
        })
    }

    fn run_unit(&mut self, unit: &'a UnitPlan, documents: &mut Vec<FragmentDocument>) -> Result<()> {
        let span = debug_span!("unit", root = %self.document.node(unit.root).display_path());
        let _enter = span.enter();

        let source = self.source;
        for group in unit.materialized() {
            self.staging.materialize(group, source)?;
            self.stats.staging_materialized += 1;
        }
        let rendered = self.render_unit(unit.root, documents);
        for group in unit.unloaded() {
            self.staging.unload(group);
        }
        rendered
    }

    fn render_unit(&mut self, root: NodeId, documents: &mut Vec<FragmentDocument>) -> Result<()> {
        let document = self.document;
        let NodeKind::Element(element) = &document.node(root).kind else {
            return Err(ProcessingError::Internal(format!(
                "top-level node {} is not an element",
                document.node(root).display_path()
            )));
        };

        let mut roots = Vec::new();
        match self.program.class_of(root) {
            Some(class) => {
                let mut emit = |p: &mut Self| -> Result<()> {
                    roots.push(p.element_instance(root, element, &element.name, element.namespace.as_ref())?);
                    Ok(())
                };
                self.for_each_row(class, &mut emit)?;
                if roots.is_empty() {
                    trace!(root = %element.name, "bound root without rows");
                    roots.push(bare_element(element));
                }
            }
            None => roots.push(self.element_instance(
                root,
                element,
                &element.name,
                element.namespace.as_ref(),
            )?),
        }

        documents.extend(roots.into_iter().map(|root| FragmentDocument {
            name: document.name().clone(),
            formatted: document.format(),
            root,
        }));
        Ok(())
    }

    /// Build one element instance whose content comes from `content`.
    /// Recursive instances use the anchor as content under their own name.
    fn element_instance(
        &mut self,
        content: NodeId,
        element: &'a Element,
        name: &str,
        namespace: Option<&Namespace>,
    ) -> Result<ElementFragment> {
        let mut fragment = ElementFragment {
            name: name.to_string(),
            namespace: namespace.cloned(),
            declarations: element.declarations.clone(),
            normalize: element.normalize,
            ..Default::default()
        };
        self.element_text(content, element, &mut fragment);
        self.render_children(content, &mut fragment)?;
        self.stats.fragments_emitted += 1;
        Ok(fragment)
    }

    fn element_text(&self, content: NodeId, element: &Element, fragment: &mut ElementFragment) {
        if let Some(fixed) = &element.fixed_value {
            fragment.text = Some(fixed.clone());
            return;
        }
        let Some(slot) = self.program.value_slot(content) else {
            return;
        };
        match self.text_of(slot) {
            Some(text) => fragment.text = Some(text),
            None => match &element.default_value {
                Some(default) => fragment.text = Some(default.clone()),
                None => fragment.nil = element.nillable,
            },
        }
    }

    fn render_children(&mut self, parent: NodeId, out: &mut ElementFragment) -> Result<()> {
        let document = self.document;
        for child in document.children(parent) {
            self.render_node(*child, out)?;
        }
        Ok(())
    }

    fn render_node(&mut self, id: NodeId, out: &mut ElementFragment) -> Result<()> {
        let document = self.document;
        let node = document.node(id);
        if node.kind.is_excluded() {
            return Ok(());
        }
        let class = self.program.class_of(id);

        match &node.kind {
            NodeKind::Attribute(attribute) => {
                if let Some(fragment) = self.attribute_instance(id, attribute) {
                    out.attributes.push(fragment);
                }
                Ok(())
            }
            NodeKind::Comment(comment) => {
                out.children.push(Fragment::Comment(comment.text.clone()));
                Ok(())
            }
            NodeKind::Element(element) => match class {
                Some(class) => {
                    let mut emit = |p: &mut Self| -> Result<()> {
                        let fragment =
                            p.element_instance(id, element, &element.name, element.namespace.as_ref())?;
                        out.children.push(Fragment::Element(fragment));
                        Ok(())
                    };
                    self.fetch(class, &mut emit)
                }
                None => {
                    let fragment =
                        self.element_instance(id, element, &element.name, element.namespace.as_ref())?;
                    if element.cardinality.min_occurs == 0 && fragment.is_vacant() {
                        trace!(node = %node.display_path(), "omitted vacant element");
                    } else {
                        out.children.push(Fragment::Element(fragment));
                    }
                    Ok(())
                }
            },
            NodeKind::Sequence(_) => match class {
                Some(class) => {
                    let mut emit = |p: &mut Self| -> Result<()> { p.render_children(id, out) };
                    self.fetch(class, &mut emit)
                }
                None => self.render_children(id, out),
            },
            NodeKind::Choice(_) => {
                let choice = self.program.choice_of(id).ok_or_else(|| {
                    ProcessingError::Internal(format!("choice {} was not planned", node.display_path()))
                })?;
                match class {
                    Some(class) => {
                        let mut emit = |p: &mut Self| -> Result<()> { p.choose(choice, out) };
                        self.fetch(class, &mut emit)
                    }
                    None => self.choose(choice, out),
                }
            }
            // Branches render through their choice.
            NodeKind::Criteria(_) => Ok(()),
            NodeKind::Recursive(recursive) => self.recurse(id, recursive, out),
        }
    }

    fn attribute_instance(&self, id: NodeId, attribute: &Attribute) -> Option<AttributeFragment> {
        let value = match &attribute.fixed_value {
            Some(fixed) => Some(fixed.clone()),
            None => self.program.value_slot(id).and_then(|slot| self.text_of(slot)),
        };
        let value = match value {
            Some(value) => value,
            None if attribute.optional => return None,
            None => String::new(),
        };
        Some(AttributeFragment {
            name: attribute.name.clone(),
            // Attributes are never in the default namespace.
            namespace: attribute.namespace.clone().filter(|ns| !ns.is_default()),
            value,
        })
    }

    fn choose(&mut self, choice: ChoiceId, out: &mut ElementFragment) -> Result<()> {
        let program = self.program;
        let plan = program.choice(choice);
        let mut fallback = None;
        for branch in &plan.branches {
            match &branch.criteria {
                None => {
                    fallback.get_or_insert(branch.node);
                }
                Some(criteria) => {
                    if criteria.test(&*self) == Some(true) {
                        trace!(choice = %plan.id, branch = %branch.node, "branch selected");
                        return self.render_children(branch.node, out);
                    }
                }
            }
        }
        match fallback {
            Some(node) => self.render_children(node, out),
            None if plan.exception_on_default => Err(ProcessingError::NoMatchingBranch(
                self.document.node(plan.node).display_path(),
            )),
            None => Ok(()),
        }
    }

    fn recurse(&mut self, id: NodeId, recursive: &'a RecursiveElement, out: &mut ElementFragment) -> Result<()> {
        let program = self.program;
        let document = self.document;
        let recursion = program.recursion_of(id).ok_or_else(|| {
            ProcessingError::Internal(format!(
                "recursion {} was not planned",
                document.node(id).display_path()
            ))
        })?;
        let plan = program.recursion(recursion);
        let NodeKind::Element(anchor) = &document.node(plan.anchor).kind else {
            return Err(ProcessingError::Internal(format!(
                "anchor of {} is not an element",
                document.node(id).display_path()
            )));
        };

        if let Some(criteria) = &plan.criteria {
            if criteria.test(&*self) != Some(true) {
                return Ok(());
            }
        }

        let current = self
            .recursion
            .iter()
            .rev()
            .find(|(active, _)| *active == recursion)
            .map(|(_, depth)| *depth)
            .unwrap_or(0);
        let depth = current + 1;

        if depth >= plan.limit {
            if plan.exception_on_limit {
                let class = plan.class_at(plan.limit).ok_or_else(|| {
                    ProcessingError::Internal(format!("recursion {} has no limit class", plan.id))
                })?;
                if self.has_rows(class)? {
                    return Err(ProcessingError::RecursionLimitExceeded {
                        node: document.node(id).display_path(),
                        limit: plan.limit,
                    });
                }
            } else {
                trace!(recursion = %plan.id, depth, "recursion truncated at limit");
            }
            return Ok(());
        }

        let class = plan.class_at(depth).ok_or_else(|| {
            ProcessingError::Internal(format!("recursion {} has no class at depth {}", plan.id, depth))
        })?;
        let namespace = recursive.namespace.as_ref().or(anchor.namespace.as_ref());
        self.recursion.push((recursion, depth));
        let mut emit = |p: &mut Self| -> Result<()> {
            let fragment = p.element_instance(plan.anchor, anchor, &recursive.name, namespace)?;
            out.children.push(Fragment::Element(fragment));
            Ok(())
        };
        let result = self.fetch(class, &mut emit);
        self.recursion.pop();
        result
    }

    /// Rows of `class` for the current frame, followed by a placeholder
    /// instance when none qualify and the node requires an occurrence.
    /// Nothing nested under a placeholder gets one of its own.
    fn fetch<F>(&mut self, class: ClassId, emit: &mut F) -> Result<()>
    where
        F: FnMut(&mut Self) -> Result<()>,
    {
        let count = self.for_each_row(class, emit)?;
        let program = self.program;
        let plan = program.class(class);
        if count == 0 && plan.cardinality.min_occurs >= 1 && !self.under_placeholder() {
            trace!(class = %class, "placeholder instance");
            self.frames.push(Frame {
                class,
                shape: plan.shape,
                row: vec![Value::Null; plan.columns.len()],
                placeholder: true,
            });
            let result = (*emit)(self);
            self.frames.pop();
            result?;
        }
        Ok(())
    }

    /// Emit every qualifying row of `class`. Returns the number emitted.
    fn for_each_row<F>(&mut self, class: ClassId, emit: &mut F) -> Result<usize>
    where
        F: FnMut(&mut Self) -> Result<()>,
    {
        let program = self.program;
        let plan = program.class(class);
        let mut instance = ClassInstance::new(class);
        if self.under_placeholder() {
            instance.advance(InstanceState::Exhausted);
            return Ok(0);
        }
        match self.iterate(plan, &mut instance, emit) {
            Ok(count) => Ok(count),
            Err(err) => {
                instance.advance(InstanceState::Failed);
                Err(err)
            }
        }
    }

    fn iterate<F>(&mut self, plan: &'a ClassPlan, instance: &mut ClassInstance, emit: &mut F) -> Result<usize>
    where
        F: FnMut(&mut Self) -> Result<()>,
    {
        let program = self.program;
        let (mut cursor, mapping) = self.open_class(plan)?;
        instance.advance(InstanceState::Open);

        let keys = program.merge_order().keys(plan.id);
        let mut emitted = 0;
        if keys.is_empty() {
            while let Some(row) = self.next_passing(plan, cursor.as_mut(), &mapping)? {
                if !self.admit(plan, emitted)? {
                    instance.advance(InstanceState::Capped);
                    return Ok(emitted);
                }
                instance.advance(InstanceState::Emitting(emitted));
                self.emit_row(plan, row, emit)?;
                emitted += 1;
            }
        } else {
            let mut rows = Vec::new();
            while let Some(row) = self.next_passing(plan, cursor.as_mut(), &mapping)? {
                rows.push(row);
            }
            drop(cursor);
            sort_rows(&mut rows, keys);
            for row in rows {
                if !self.admit(plan, emitted)? {
                    instance.advance(InstanceState::Capped);
                    return Ok(emitted);
                }
                instance.advance(InstanceState::Emitting(emitted));
                self.emit_row(plan, row, emit)?;
                emitted += 1;
            }
        }
        instance.advance(InstanceState::Exhausted);
        Ok(emitted)
    }

    /// Whether another row may be emitted after `emitted` rows. Row caps
    /// apply before maxOccurs.
    fn admit(&self, plan: &ClassPlan, emitted: usize) -> Result<bool> {
        if let Some(cap) = plan.cap {
            if emitted >= cap.limit {
                return match cap.kind {
                    CapKind::Truncate => {
                        debug!(class = %plan.id, limit = cap.limit, "row limit reached");
                        Ok(false)
                    }
                    CapKind::Raise => Err(ProcessingError::RowLimitExceeded {
                        node: self.document.node(plan.node).display_path(),
                        limit: cap.limit,
                    }),
                };
            }
        }
        // Top-level elements produce one document per row.
        if self.document.parent(plan.node).is_none() {
            return Ok(true);
        }
        if let Some(max) = plan.cardinality.max() {
            if emitted >= max {
                if max == 1 {
                    return Err(ProcessingError::TooManyOccurrences {
                        node: self.document.node(plan.node).display_path(),
                    });
                }
                trace!(class = %plan.id, max, "maxOccurs reached");
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn emit_row<F>(&mut self, plan: &ClassPlan, row: Tuple, emit: &mut F) -> Result<()>
    where
        F: FnMut(&mut Self) -> Result<()>,
    {
        self.frames.push(Frame {
            class: plan.id,
            shape: plan.shape,
            row,
            placeholder: false,
        });
        let result = (*emit)(self);
        self.frames.pop();
        result
    }

    /// Next tuple of `cursor` that satisfies every filter of `plan`.
    fn next_passing(
        &mut self,
        plan: &'a ClassPlan,
        cursor: &mut (dyn TupleCursor + 'a),
        mapping: &[usize],
    ) -> Result<Option<Tuple>> {
        while let Some(tuple) = cursor.next_tuple()? {
            self.stats.tuples_read += 1;
            let row = project(tuple, mapping);
            if plan.filters.is_empty() {
                return Ok(Some(row));
            }
            self.frames.push(Frame {
                class: plan.id,
                shape: plan.shape,
                row,
                placeholder: false,
            });
            let passed = self.passes(plan);
            let frame = self.frames.pop();
            if passed? {
                return Ok(frame.map(|f| f.row));
            }
        }
        Ok(None)
    }

    fn passes(&mut self, plan: &'a ClassPlan) -> Result<bool> {
        for filter in &plan.filters {
            let held = if filter.probe.is_empty() {
                filter.condition.test(&*self) == Some(true)
            } else {
                self.probe(&filter.probe, &filter.condition)?
            };
            if !held {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Whether some combination of rows of the nested `classes` satisfies
    /// `condition`.
    fn probe(&mut self, classes: &[ClassId], condition: &BoundExpr) -> Result<bool> {
        let Some((first, rest)) = classes.split_first() else {
            return Ok(condition.test(&*self) == Some(true));
        };
        let program = self.program;
        let plan = program.class(*first);
        let (mut cursor, mapping) = self.open_class(plan)?;
        while let Some(tuple) = cursor.next_tuple()? {
            self.stats.tuples_read += 1;
            self.frames.push(Frame {
                class: plan.id,
                shape: plan.shape,
                row: project(tuple, &mapping),
                placeholder: false,
            });
            let found = self.probe(rest, condition);
            self.frames.pop();
            if found? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn has_rows(&mut self, class: ClassId) -> Result<bool> {
        if self.under_placeholder() {
            return Ok(false);
        }
        let program = self.program;
        let (mut cursor, _) = self.open_class(program.class(class))?;
        let found = cursor.next_tuple()?.is_some();
        if found {
            self.stats.tuples_read += 1;
        }
        Ok(found)
    }

    /// Open the cursor of `plan` for the current frame and map its columns
    /// onto the class projection.
    fn open_class(&mut self, plan: &ClassPlan) -> Result<(Box<dyn TupleCursor + 'a>, Vec<usize>)> {
        let source = self.source;
        let cursor: Box<dyn TupleCursor + 'a> = if plan.staged {
            let restrict: Vec<(String, Value)> = plan
                .parameters
                .iter()
                .map(|p| (p.column.clone(), self.lookup(p.value).clone()))
                .collect();
            Box::new(self.staging.open(&plan.source, &restrict)?)
        } else {
            let params: Vec<Value> = plan
                .parameters
                .iter()
                .map(|p| self.lookup(p.value).clone())
                .collect();
            source.open(&plan.source, &params)?
        };
        self.stats.cursors_opened += 1;
        trace!(class = %plan.id, group = %plan.source, staged = plan.staged, "opened cursor");

        let mapping = plan
            .columns
            .iter()
            .map(|column| {
                cursor
                    .columns()
                    .iter()
                    .position(|c| c.eq_ignore_ascii_case(column))
                    .ok_or_else(|| ProcessingError::MissingColumn {
                        group: plan.source.to_string(),
                        column: column.clone(),
                    })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok((cursor, mapping))
    }

    fn lookup(&self, slot: SlotRef) -> &Value {
        RowScope::value(self, slot).unwrap_or(&NULL)
    }

    fn text_of(&self, slot: SlotRef) -> Option<String> {
        self.lookup(slot).to_text()
    }

    fn under_placeholder(&self) -> bool {
        self.frames.iter().any(|f| f.placeholder)
    }
}

impl RowScope for Production<'_> {
    fn value(&self, slot: SlotRef) -> Option<&Value> {
        self.frames
            .iter()
            .rev()
            .find(|f| f.class == slot.class || f.shape == slot.class)
            .and_then(|f| f.row.get(slot.column))
    }
}

fn project(tuple: Tuple, mapping: &[usize]) -> Tuple {
    mapping
        .iter()
        .map(|index| tuple.get(*index).cloned().unwrap_or_default())
        .collect()
}

/// Stable sort by ORDER BY keys; nulls lowest.
fn sort_rows(rows: &mut [Tuple], keys: &[SortKey]) {
    rows.sort_by(|a, b| {
        keys.iter()
            .map(|key| {
                let left = a.get(key.column).unwrap_or(&NULL);
                let right = b.get(key.column).unwrap_or(&NULL);
                let ordering = left.sort_cmp(right);
                match key.direction {
                    SortDirection::Asc => ordering,
                    SortDirection::Desc => ordering.reverse(),
                }
            })
            .find(|o| *o != Ordering::Equal)
            .unwrap_or(Ordering::Equal)
    });
}

/// Root rendered when its class yields no rows.
fn bare_element(element: &Element) -> ElementFragment {
    ElementFragment {
        name: element.name.clone(),
        namespace: element.namespace.clone(),
        declarations: element.declarations.clone(),
        normalize: element.normalize,
        ..Default::default()
    }
}
