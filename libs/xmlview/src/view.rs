//! Plan-cached entry point: plan, produce, serialize

use crate::error::Result;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, trace};
use xmlview_engine::{execute, ProductionOutput, TupleSource};
use xmlview_format::{SerializerOptions, XmlSerializer};
use xmlview_model::{DocumentDef, MappingDocument};
use xmlview_planner::{DocumentPlanner, PlannerOptions, Program, XmlQuery};

const DEFAULT_PLAN_CACHE: usize = 1000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewOptions {
    pub planner: PlannerOptions,
    pub serializer: SerializerOptions,
    /// Compiled programs kept per view.
    pub plan_cache_size: usize,
}

impl Default for ViewOptions {
    fn default() -> Self {
        Self {
            planner: PlannerOptions::default(),
            serializer: SerializerOptions::default(),
            plan_cache_size: DEFAULT_PLAN_CACHE,
        }
    }
}

/// A mapping document together with its planner, serializer and a cache of
/// compiled programs keyed by query.
///
/// Programs are immutable and shared, so one view can serve concurrent
/// productions against different sources.
pub struct XmlView {
    document: Arc<MappingDocument>,
    planner: DocumentPlanner,
    serializer: XmlSerializer,
    cache: Arc<Mutex<LruCache<String, Arc<Program>>>>,
}

impl XmlView {
    pub fn new(document: Arc<MappingDocument>) -> Self {
        Self::with_options(document, ViewOptions::default())
    }

    pub fn with_options(document: Arc<MappingDocument>, options: ViewOptions) -> Self {
        let capacity = NonZeroUsize::new(options.plan_cache_size).unwrap_or(NonZeroUsize::MIN);
        Self {
            document,
            planner: DocumentPlanner::new(options.planner),
            serializer: XmlSerializer::new(options.serializer),
            cache: Arc::new(Mutex::new(LruCache::new(capacity))),
        }
    }

    /// Validate `def` and wrap it in a view.
    pub fn from_def(def: DocumentDef) -> Result<Self> {
        Ok(Self::new(Arc::new(def.build()?)))
    }

    pub fn document(&self) -> &Arc<MappingDocument> {
        &self.document
    }

    /// Compile `query`, reusing a cached program for an identical query.
    pub fn plan(&self, query: &XmlQuery) -> Result<Arc<Program>> {
        let key = serde_json::to_string(query)?;
        {
            let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
            if let Some(program) = cache.get(&key) {
                trace!(document = %self.document.name(), "plan cache hit");
                return Ok(Arc::clone(program));
            }
        }

        let program = Arc::new(self.planner.plan(Arc::clone(&self.document), query)?);
        debug!(
            document = %self.document.name(),
            classes = program.classes().len(),
            "compiled program"
        );

        {
            let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
            cache.put(key, Arc::clone(&program));
        }
        Ok(program)
    }

    /// Plan and run `query`, returning fragment trees.
    pub fn produce(&self, query: &XmlQuery, source: &dyn TupleSource) -> Result<ProductionOutput> {
        let program = self.plan(query)?;
        Ok(execute(&program, source)?)
    }

    /// Plan, run and serialize `query`: one XML string per document.
    pub fn render(&self, query: &XmlQuery, source: &dyn TupleSource) -> Result<Vec<String>> {
        let output = self.produce(query, source)?;
        Ok(self.serializer.serialize_all(&output.documents)?)
    }

    /// Instruction listing for `query`.
    pub fn explain(&self, query: &XmlQuery) -> Result<String> {
        Ok(self.plan(query)?.explain())
    }

    pub fn cached_plans(&self) -> usize {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn clear_cache(&self) {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }
}
