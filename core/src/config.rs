use config::{Config, ConfigBuilder, ConfigError, Environment, File};
use config::builder::DefaultState;
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct StorageConfig {
    pub data_dir: String,
    pub embeddings_dir: String,
    pub wal_file: String,
}

impl StorageConfig {
    pub fn wal_path(&self) -> PathBuf {
        Path::new(&self.data_dir).join(&self.wal_file)
    }

    pub fn embeddings_path(&self) -> PathBuf {
        PathBuf::from(&self.embeddings_dir)
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct GraphConfig {
    pub similarity_threshold: f64,
    pub topic_similarity_threshold: f64,
    pub damping_factor: f64,
    pub tolerance: f64,
    pub max_iterations: usize,
    pub min_size: f64,
    pub max_size: f64,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.5,
            topic_similarity_threshold: 0.7,
            damping_factor: 0.85,
            tolerance: 1e-6,
            max_iterations: 100,
            min_size: 15.0,
            max_size: 50.0,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct LlmConfig {
    pub model: String,
    pub answer_max_tokens: u32,
    pub answer_temperature: f32,
    pub topic_max_tokens: u32,
    pub topic_temperature: f32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: "gpt-3.5-turbo".to_string(),
            answer_max_tokens: 500,
            answer_temperature: 0.3,
            topic_max_tokens: 2000,
            topic_temperature: 0.7,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct AppConfig {
    pub storage: StorageConfig,
    pub graph: GraphConfig,
    pub llm: LlmConfig,
}

impl AppConfig {
    /// Loads `config/default`, then `config/{RUN_MODE}`, then `CARDGRAPH__*`
    /// environment variables. Missing files fall back to built-in defaults.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("config")
    }

    pub fn load_from(dir: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let dir = dir.as_ref();
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let builder = with_defaults(Config::builder())?
            .add_source(File::from(dir.join("default")).required(false))
            .add_source(File::from(dir.join(&run_mode)).required(false))
            .add_source(Environment::with_prefix("CARDGRAPH").separator("__"));

        builder.build()?.try_deserialize()
    }
}

fn with_defaults(
    builder: ConfigBuilder<DefaultState>,
) -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    let graph = GraphConfig::default();
    let llm = LlmConfig::default();

    builder
        .set_default("storage.data_dir", "data")?
        .set_default("storage.embeddings_dir", "data/embeddings")?
        .set_default("storage.wal_file", "cards.wal")?
        .set_default("graph.similarity_threshold", graph.similarity_threshold)?
        .set_default(
            "graph.topic_similarity_threshold",
            graph.topic_similarity_threshold,
        )?
        .set_default("graph.damping_factor", graph.damping_factor)?
        .set_default("graph.tolerance", graph.tolerance)?
        .set_default("graph.max_iterations", graph.max_iterations as i64)?
        .set_default("graph.min_size", graph.min_size)?
        .set_default("graph.max_size", graph.max_size)?
        .set_default("llm.model", llm.model)?
        .set_default("llm.answer_max_tokens", llm.answer_max_tokens as i64)?
        .set_default("llm.answer_temperature", llm.answer_temperature as f64)?
        .set_default("llm.topic_max_tokens", llm.topic_max_tokens as i64)?
        .set_default("llm.topic_temperature", llm.topic_temperature as f64)
}
