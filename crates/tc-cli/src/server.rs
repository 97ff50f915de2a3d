use std::collections::HashMap;
use std::sync::Arc;

use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::*;
use rmcp::{ErrorData as McpError, ServerHandler, tool, tool_handler, tool_router};
use schemars::JsonSchema;
use serde::Deserialize;
use tc_core::{BagOfWords, ClusterError, ClusterMode, TermFrequencies, TextClust};
use tokio::sync::Mutex;

use crate::settings::Settings;

const DEFAULT_TOP: usize = 10;
const DEFAULT_TERMS: usize = 5;

#[derive(Clone)]
pub struct TextClustServer {
    state: Arc<Mutex<ServerState>>,
    tool_router: ToolRouter<Self>,
}

struct ServerState {
    engine: TextClust,
    tokenizer: BagOfWords,
}

impl TextClustServer {
    pub fn new(settings: Settings) -> Result<Self, ClusterError> {
        let engine = TextClust::new(settings.clustering)?;
        Ok(Self {
            state: Arc::new(Mutex::new(ServerState {
                engine,
                tokenizer: settings.tokenizer,
            })),
            tool_router: Self::tool_router(),
        })
    }

    fn stats_json(engine: &TextClust) -> serde_json::Value {
        serde_json::to_value(engine.stats()).unwrap_or_default()
    }
}

fn invalid(e: ClusterError) -> McpError {
    McpError::invalid_params(e.to_string(), None)
}

fn parse_mode(mode: Option<&str>) -> Result<ClusterMode, McpError> {
    match mode {
        None => Ok(ClusterMode::Micro),
        Some(m) => m
            .parse()
            .map_err(|e: String| McpError::invalid_params(e, None)),
    }
}

fn json_result(value: &serde_json::Value) -> CallToolResult {
    CallToolResult::success(vec![Content::text(
        serde_json::to_string_pretty(value).unwrap_or_default(),
    )])
}

// --- Tool parameter types ---

#[derive(Debug, Deserialize, JsonSchema)]
struct LearnRequest {
    /// Term-frequency map for the record. Takes precedence over `text`.
    terms: Option<HashMap<String, f64>>,
    /// Raw text, tokenized into a bag of words when `terms` is absent
    text: Option<String>,
    /// Record timestamp. Required when real-time fading is enabled.
    time: Option<f64>,
    /// Upstream record id, kept with the cluster
    id: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct PredictRequest {
    terms: Option<HashMap<String, f64>>,
    text: Option<String>,
    /// "micro" (default) or "macro"
    mode: Option<String>,
}

#[derive(Debug, Deserialize, JsonSchema)]
struct ShowRequest {
    /// "micro" (default) or "macro"
    mode: Option<String>,
    /// Number of clusters to list, heaviest first
    top: Option<usize>,
    /// Number of terms shown per cluster
    terms: Option<usize>,
}

fn observation(
    terms: Option<HashMap<String, f64>>,
    text: Option<&str>,
    tokenizer: &BagOfWords,
) -> TermFrequencies {
    match (terms, text) {
        (Some(terms), _) => terms,
        (None, Some(text)) => tokenizer.term_frequencies(text),
        (None, None) => TermFrequencies::new(),
    }
}

#[tool_router]
impl TextClustServer {
    #[tool(
        description = "Learn one record from the stream. Pass either a term-frequency map or raw text. Returns the micro cluster the record was assigned to."
    )]
    async fn tc_learn(
        &self,
        Parameters(req): Parameters<LearnRequest>,
    ) -> Result<CallToolResult, McpError> {
        let mut state = self.state.lock().await;
        let ServerState { engine, tokenizer } = &mut *state;

        let terms = observation(req.terms, req.text.as_deref(), tokenizer);
        let cluster = engine
            .learn_one(&terms, req.time, req.id.as_deref())
            .map_err(invalid)?;

        let result = serde_json::json!({
            "cluster": cluster,
            "stats": Self::stats_json(engine),
        });
        Ok(json_result(&result))
    }

    #[tool(
        description = "Find the nearest micro cluster (mode \"micro\") or macro cluster (mode \"macro\") for a record without learning it. Returns null when no cluster is eligible."
    )]
    async fn tc_predict(
        &self,
        Parameters(req): Parameters<PredictRequest>,
    ) -> Result<CallToolResult, McpError> {
        let mode = parse_mode(req.mode.as_deref())?;
        let mut state = self.state.lock().await;
        let ServerState { engine, tokenizer } = &mut *state;

        let terms = observation(req.terms, req.text.as_deref(), tokenizer);
        let assignment = engine.predict_one(&terms, mode).map_err(invalid)?;

        let result = serde_json::json!({ "assignment": assignment });
        Ok(json_result(&result))
    }

    #[tool(
        description = "Recluster the live micro clusters into macro clusters (topics). Returns the micro→macro mapping and each macro cluster's weight and top terms."
    )]
    async fn tc_macro_clusters(&self) -> Result<CallToolResult, McpError> {
        let mut state = self.state.lock().await;
        let engine = &mut state.engine;

        let mapping: serde_json::Map<String, serde_json::Value> = engine
            .micro_to_macro()
            .iter()
            .map(|(micro, label)| (micro.to_string(), serde_json::json!(label)))
            .collect();
        let macros = engine.top_clusters(usize::MAX, DEFAULT_TERMS, ClusterMode::Macro);

        let result = serde_json::json!({
            "micro_to_macro": mapping,
            "macro_clusters": macros,
        });
        Ok(json_result(&result))
    }

    #[tool(
        description = "List the heaviest clusters with their top terms, as plain text."
    )]
    async fn tc_show(
        &self,
        Parameters(req): Parameters<ShowRequest>,
    ) -> Result<CallToolResult, McpError> {
        let mode = parse_mode(req.mode.as_deref())?;
        let mut state = self.state.lock().await;
        let summaries = state.engine.top_clusters(
            req.top.unwrap_or(DEFAULT_TOP),
            req.terms.unwrap_or(DEFAULT_TERMS),
            mode,
        );
        Ok(CallToolResult::success(vec![Content::text(
            tc_core::render_summaries(mode, &summaries),
        )]))
    }

    #[tool(
        description = "Engine statistics: live micro clusters, learned observations, current time, last cleanup time, and whether the macro clustering is up to date."
    )]
    async fn tc_stats(&self) -> Result<CallToolResult, McpError> {
        let state = self.state.lock().await;
        Ok(json_result(&Self::stats_json(&state.engine)))
    }
}

#[tool_handler]
impl ServerHandler for TextClustServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "Online text stream clustering (textClust).\n\n\
                 Feed records one at a time with tc_learn, in time order. Each record joins its \
                 nearest micro cluster or starts a new one; old clusters fade away.\n\
                 Use tc_predict to classify a record without learning it, tc_macro_clusters to \
                 see the current topics, tc_show for a readable listing, and tc_stats for counters."
                    .into(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}
