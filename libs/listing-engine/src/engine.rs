use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use listing_core::{
    CursorCodec, CursorPage, Error, FacetCounts, FieldAccess, FilterExpr, ListRequest, ListResult,
    OffsetPage, OrderBy, PageRequest, RawFilters, SortKey, SortSpec, Suggestions, ValidationError,
    Value,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::assemble::ResultAssembler;
use crate::condition::ConditionBuilder;
use crate::config::EngineConfig;
use crate::cursor::CursorPaginator;
use crate::executor::{QueryContext, QueryExecutor, StoreError, StoreQuery, Window};
use crate::facet::{CacheStore, FacetCache};
use crate::filter_hash::short_filter_hash;
use crate::offset::OffsetPaginator;
use crate::schema::ResourceSchema;
use crate::sort::SortResolver;

/// Upper bound for the number of suggestions per call.
pub const MAX_SUGGESTIONS: u64 = 20;

/// Rows fetched per requested suggestion, to absorb duplicate values.
const SUGGEST_OVERFETCH: u64 = 5;

/// What gets logged about a store call. Never returned to callers.
struct QueryShape<'a> {
    op: &'static str,
    filter_nodes: usize,
    sort: String,
    window: String,
    field: Option<&'a str>,
}

/// Per-resource listing service: validates and compiles a request, runs it
/// through the executor under the configured deadline and assembles the
/// response envelope.
pub struct ListingEngine<R> {
    schema: Arc<ResourceSchema>,
    config: EngineConfig,
    codec: CursorCodec,
    executor: Arc<dyn QueryExecutor<R>>,
    facets: FacetCache,
}

impl<R> ListingEngine<R>
where
    R: FieldAccess + Send + 'static,
{
    pub fn new(
        schema: ResourceSchema,
        config: EngineConfig,
        executor: Arc<dyn QueryExecutor<R>>,
    ) -> Self {
        let codec = CursorCodec::signed(config.cursor_secret.as_bytes());
        Self {
            schema: Arc::new(schema),
            config,
            codec,
            executor,
            facets: FacetCache::in_memory(),
        }
    }

    /// Replace the in-process facet cache store.
    pub fn with_cache_store(mut self, store: Arc<dyn CacheStore>) -> Self {
        self.facets = FacetCache::new(store);
        self
    }

    pub fn schema(&self) -> &ResourceSchema {
        &self.schema
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn compile_filters(&self, raw: &RawFilters) -> Result<FilterExpr, ValidationError> {
        ConditionBuilder::new(&self.schema, &self.config).compile(raw)
    }

    pub fn resolve_sort(&self, specs: &[SortSpec]) -> Result<OrderBy, ValidationError> {
        SortResolver::new(&self.schema, self.config.max_sort_fields).resolve_many(specs)
    }

    /// Run one list request. Validation happens before any store access.
    pub async fn list(
        &self,
        req: &ListRequest,
        cancel: &CancellationToken,
    ) -> Result<ListResult<R>, Error> {
        self.list_projected(req, cancel, std::convert::identity).await
    }

    /// [`list`](Self::list) with a list-view projection applied to each record.
    #[tracing::instrument(
        name = "listing.engine.list",
        skip(self, req, cancel, project),
        level = "debug",
        fields(resource = %self.schema.name())
    )]
    pub async fn list_projected<T, F>(
        &self,
        req: &ListRequest,
        cancel: &CancellationToken,
        project: F,
    ) -> Result<ListResult<T>, Error>
    where
        F: FnMut(R) -> T,
    {
        let filter = self.compile_filters(&req.filters).inspect_err(|e| {
            debug!(error = %e, "rejected filters");
        })?;
        let order = self.resolve_sort(&req.sort).inspect_err(|e| {
            debug!(error = %e, "rejected sort");
        })?;

        let mut assembler = ResultAssembler::new(project);
        match &req.page {
            PageRequest::Offset { page, page_size } => self
                .list_offset(&filter, &order, *page, *page_size, cancel, &mut assembler)
                .await
                .map(ListResult::Offset),
            PageRequest::Cursor { token, limit } => self
                .list_cursor(&filter, &order, token.as_deref(), *limit, cancel, &mut assembler)
                .await
                .map(ListResult::Cursor),
        }
    }

    async fn list_offset<T, F>(
        &self,
        filter: &FilterExpr,
        order: &OrderBy,
        page: u64,
        page_size: u64,
        cancel: &CancellationToken,
        assembler: &mut ResultAssembler<F>,
    ) -> Result<OffsetPage<T>, Error>
    where
        F: FnMut(R) -> T,
    {
        let paginator = OffsetPaginator::new(self.config.page_size_cap());
        let window = paginator.validate(page, page_size).inspect_err(|e| {
            debug!(error = %e, "rejected page window");
        })?;
        let window = Window::Offset {
            skip: window.skip,
            limit: window.limit,
        };

        let query = StoreQuery {
            filter,
            sort: order,
            window: &window,
            with_total: true,
        };
        let shape = self.shape("execute", &query);
        let ctx = self.context(cancel);
        let result = self
            .guarded(&shape, cancel, &ctx, self.executor.execute(&query, &ctx))
            .await?;

        let Some(total) = result.total else {
            error!(
                resource = %self.schema.name(),
                window = %shape.window,
                "executor returned no total for an offset query"
            );
            return Err(Error::Storage);
        };

        let plan = paginator.plan(page, page_size, total)?;
        Ok(assembler.offset_page(result.records, page, page_size, total, &plan))
    }

    async fn list_cursor<T, F>(
        &self,
        filter: &FilterExpr,
        order: &OrderBy,
        token: Option<&str>,
        limit: u64,
        cancel: &CancellationToken,
        assembler: &mut ResultAssembler<F>,
    ) -> Result<CursorPage<T>, Error>
    where
        F: FnMut(R) -> T,
    {
        let paginator = CursorPaginator::new(&self.codec, self.config.page_size_cap());
        let filter_hash = short_filter_hash(filter);
        let plan = paginator.plan(token, limit, order, filter_hash.as_deref(), &self.schema)?;

        let window = Window::Seek {
            after: plan.after,
            limit: plan.fetch_limit,
        };
        let query = StoreQuery {
            filter,
            sort: order,
            window: &window,
            with_total: false,
        };
        let shape = self.shape("execute", &query);
        let ctx = self.context(cancel);
        let result = self
            .guarded(&shape, cancel, &ctx, self.executor.execute(&query, &ctx))
            .await?;

        let page = paginator.assemble(result.records, plan.limit, order, filter_hash.as_deref())?;
        Ok(assembler.cursor_page(page))
    }

    /// Counts of matching records grouped by `field`, served through the
    /// facet cache keyed by field and filter.
    #[tracing::instrument(
        name = "listing.engine.facets",
        skip(self, filters, cancel),
        level = "debug",
        fields(resource = %self.schema.name())
    )]
    pub async fn facets(
        &self,
        filters: &RawFilters,
        field: &str,
        cancel: &CancellationToken,
    ) -> Result<FacetCounts, Error> {
        let field = field.trim().to_lowercase();
        if !self.schema.is_facetable(&field) {
            debug!(field = %field, "rejected facet field");
            return Err(ValidationError::UnknownField(field).into());
        }
        let filter = self.compile_filters(filters).inspect_err(|e| {
            debug!(error = %e, "rejected filters");
        })?;
        let key = format!(
            "{}:{}:{}",
            self.schema.name(),
            field,
            short_filter_hash(&filter).as_deref().unwrap_or("*")
        );

        self.facets
            .get_or_compute(&key, self.config.facet_ttl, || async {
                let shape = QueryShape {
                    op: "count_by",
                    filter_nodes: filter.node_count(),
                    sort: String::new(),
                    window: String::new(),
                    field: Some(field.as_str()),
                };
                let ctx = self.context(cancel);
                let values = self
                    .guarded(&shape, cancel, &ctx, self.executor.count_by(&filter, &field, &ctx))
                    .await?;
                Ok::<_, Error>(FacetCounts::new(field.clone(), values))
            })
            .await
    }

    /// Distinct values of `field` starting with `prefix`, ascending. The
    /// prefix follows the text policy and the schema's base filters apply.
    /// `limit` above [`MAX_SUGGESTIONS`] is capped; zero is rejected.
    #[tracing::instrument(
        name = "listing.engine.suggest",
        skip(self, prefix, cancel),
        level = "debug",
        fields(resource = %self.schema.name())
    )]
    pub async fn suggest(
        &self,
        field: &str,
        prefix: &str,
        limit: u64,
        cancel: &CancellationToken,
    ) -> Result<Suggestions, Error> {
        let field = field.trim().to_lowercase();
        if !self.schema.is_suggestable(&field) {
            debug!(field = %field, "rejected suggestion field");
            return Err(ValidationError::UnknownField(field).into());
        }
        if limit == 0 {
            return Err(ValidationError::out_of_range(
                "limit",
                format!("must be between 1 and {MAX_SUGGESTIONS}"),
            )
            .into());
        }
        let limit = limit.min(MAX_SUGGESTIONS);
        let filter = ConditionBuilder::new(&self.schema, &self.config)
            .compile_prefix(&field, "prefix", prefix)
            .inspect_err(|e| {
                debug!(error = %e, "rejected prefix");
            })?;

        let order = OrderBy(vec![
            SortKey::asc(field.as_str()),
            SortKey::asc(self.schema.tiebreaker()),
        ]);
        let window = Window::Seek {
            after: None,
            limit: limit * SUGGEST_OVERFETCH,
        };
        let query = StoreQuery {
            filter: &filter,
            sort: &order,
            window: &window,
            with_total: false,
        };
        let shape = self.shape("execute", &query);
        let ctx = self.context(cancel);
        let result = self
            .guarded(&shape, cancel, &ctx, self.executor.execute(&query, &ctx))
            .await?;

        let mut suggestions: Vec<String> = Vec::new();
        for record in result.records {
            let value = match record.field(&field) {
                None | Some(Value::Null) => continue,
                Some(Value::String(s)) => s,
                Some(other) => other.to_string(),
            };
            if !suggestions.contains(&value) {
                suggestions.push(value);
            }
            if suggestions.len() as u64 == limit {
                break;
            }
        }
        Ok(Suggestions { field, suggestions })
    }

    fn context(&self, cancel: &CancellationToken) -> QueryContext {
        QueryContext::new(cancel.child_token(), self.config.query_timeout)
    }

    fn shape(&self, op: &'static str, query: &StoreQuery<'_>) -> QueryShape<'static> {
        QueryShape {
            op,
            filter_nodes: query.filter.node_count(),
            sort: query.sort.to_signed_tokens(),
            window: query.window.to_string(),
            field: None,
        }
    }

    /// Race a store call against the caller's token and the deadline. Store
    /// failures are logged here with full detail and leave as generic errors.
    async fn guarded<T, Fut>(
        &self,
        shape: &QueryShape<'_>,
        cancel: &CancellationToken,
        ctx: &QueryContext,
        call: Fut,
    ) -> Result<T, Error>
    where
        Fut: Future<Output = Result<T, StoreError>>,
    {
        let started = Instant::now();
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(StoreError::Cancelled),
            res = tokio::time::timeout(self.config.query_timeout, call) => {
                res.unwrap_or(Err(StoreError::Timeout))
            }
        };
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match outcome {
            Ok(v) => {
                debug!(op = shape.op, elapsed_ms, "store call finished");
                Ok(v)
            }
            Err(err) => {
                // Stop anything the executor left running.
                ctx.cancel.cancel();
                Err(self.store_failure(err, shape, elapsed_ms))
            }
        }
    }

    fn store_failure(&self, err: StoreError, shape: &QueryShape<'_>, elapsed_ms: u64) -> Error {
        let resource = self.schema.name();
        match err {
            StoreError::Timeout => {
                error!(
                    resource,
                    op = shape.op,
                    filter_nodes = shape.filter_nodes,
                    sort = %shape.sort,
                    window = %shape.window,
                    field = shape.field.unwrap_or(""),
                    elapsed_ms,
                    timeout_ms = self.config.query_timeout.as_millis() as u64,
                    "store call timed out"
                );
                Error::StorageTimeout
            }
            StoreError::Cancelled => {
                warn!(resource, op = shape.op, elapsed_ms, "store call cancelled by caller");
                Error::Cancelled
            }
            err @ (StoreError::Unsupported(_) | StoreError::Backend(_)) => {
                error!(
                    resource,
                    op = shape.op,
                    filter_nodes = shape.filter_nodes,
                    sort = %shape.sort,
                    window = %shape.window,
                    field = shape.field.unwrap_or(""),
                    elapsed_ms,
                    error = ?err,
                    "store call failed"
                );
                Error::Storage
            }
        }
    }
}
