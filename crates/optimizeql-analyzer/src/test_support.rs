//! In-crate doubles for `Connector` and `LlmProvider`

use async_trait::async_trait;
use optimizeql_core::{
    Connector, Dialect, ExplainResult, IndexInfo, LlmError, LlmProvider, LlmResult, OptimizeError, QueryRows,
    Result, TableSchema,
};
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

pub(crate) fn init_test_logging() {
    use std::sync::Once;
    static INIT: Once = Once::new();

    INIT.call_once(|| {
        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::from_default_env()
                    .add_directive("optimizeql_analyzer=debug".parse().unwrap()),
            )
            .with_test_writer()
            .finish();

        let _ = tracing::subscriber::set_global_default(subscriber);
    });
}

/// Scripted connector: each operation answers from the maps it was built with
#[derive(Default)]
pub(crate) struct MockConnector {
    pub dialect: Option<Dialect>,
    pub explain: Option<std::result::Result<ExplainResult, String>>,
    pub schemas: HashMap<String, TableSchema>,
    pub failing_tables: Vec<String>,
    /// Keyed by the exact SQL passed to `execute_limited`; missing keys fail
    pub results: HashMap<String, std::result::Result<QueryRows, String>>,
    pub executed: Mutex<Vec<(String, usize, u64)>>,
    pub schema_calls: Mutex<Vec<String>>,
    pub closed: AtomicBool,
}

impl MockConnector {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect: Some(dialect),
            ..Default::default()
        }
    }

    pub fn with_plan(mut self, raw_plan: &str) -> Self {
        self.explain = Some(Ok(ExplainResult {
            raw_plan: raw_plan.to_string(),
            planning_time_ms: Some(0.1),
            execution_time_ms: Some(1.5),
        }));
        self
    }

    pub fn with_explain_error(mut self, message: &str) -> Self {
        self.explain = Some(Err(message.to_string()));
        self
    }

    pub fn with_schema(mut self, schema: TableSchema) -> Self {
        self.schemas.insert(schema.table_name.clone(), schema);
        self
    }

    pub fn with_failing_table(mut self, table: &str) -> Self {
        self.failing_tables.push(table.to_string());
        self
    }

    pub fn with_result(mut self, sql: &str, rows: QueryRows) -> Self {
        self.results.insert(sql.to_string(), Ok(rows));
        self
    }

    pub fn with_query_error(mut self, sql: &str, message: &str) -> Self {
        self.results.insert(sql.to_string(), Err(message.to_string()));
        self
    }
}

#[async_trait]
impl Connector for MockConnector {
    fn dialect(&self) -> Dialect {
        self.dialect.unwrap_or(Dialect::Postgresql)
    }

    async fn test_connection(&self) -> bool {
        !self.closed.load(Ordering::SeqCst)
    }

    async fn explain_analyze(&self, _sql: &str, _timeout_ms: u64) -> Result<ExplainResult> {
        match &self.explain {
            Some(Ok(explain)) => Ok(explain.clone()),
            Some(Err(message)) => Err(OptimizeError::PlanExecution(message.clone())),
            None => Err(OptimizeError::NotSupported("no plan scripted".to_string())),
        }
    }

    async fn get_table_schema(&self, table: &str, _schema: Option<&str>) -> Result<TableSchema> {
        self.schema_calls.lock().unwrap().push(table.to_string());
        if self.failing_tables.iter().any(|t| t == table) {
            return Err(OptimizeError::Schema(format!("permission denied for table {}", table)));
        }
        Ok(self
            .schemas
            .get(table)
            .cloned()
            .unwrap_or_else(|| TableSchema::empty(table)))
    }

    async fn get_existing_indexes(&self, tables: &[String]) -> Result<Vec<IndexInfo>> {
        Ok(tables
            .iter()
            .filter_map(|t| self.schemas.get(t))
            .flat_map(|s| s.indexes.clone())
            .collect())
    }

    async fn execute_limited(&self, sql: &str, row_limit: usize, timeout_ms: u64) -> Result<QueryRows> {
        self.executed
            .lock()
            .unwrap()
            .push((sql.to_string(), row_limit, timeout_ms));
        match self.results.get(sql) {
            Some(Ok(rows)) => Ok(rows.clone()),
            Some(Err(message)) => Err(OptimizeError::Query(message.clone())),
            None => Err(OptimizeError::Query(format!("relation for {:?} does not exist", sql))),
        }
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Provider that answers every request with the same text or error
pub(crate) struct StaticProvider {
    pub model: String,
    pub reply: LlmResult<String>,
    /// `(system, user, max_tokens)` of every call
    pub calls: Mutex<Vec<(String, String, u32)>>,
}

impl StaticProvider {
    pub fn replying(reply: &str) -> Self {
        Self {
            model: "static-model".to_string(),
            reply: Ok(reply.to_string()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(error: LlmError) -> Self {
        Self {
            model: "static-model".to_string(),
            reply: Err(error),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn named(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl LlmProvider for StaticProvider {
    fn name(&self) -> &str {
        "static"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn generate(&self, system_prompt: &str, user_message: &str, max_tokens: u32) -> LlmResult<String> {
        self.calls
            .lock()
            .unwrap()
            .push((system_prompt.to_string(), user_message.to_string(), max_tokens));
        self.reply.clone()
    }
}
