//! Init command implementation
//!
//! Scaffolds a JURIS deployment: `juris.toml`, `.env.example`, `.gitignore`
//! and the `data/` directory.

use super::output::Output;
use std::fs;
use std::path::Path;

/// Result of the init operation
pub enum InitResult {
    /// Initialization completed successfully
    Success,
    /// Project already exists (juris.toml found)
    AlreadyExists,
    /// An error occurred during initialization
    Error(String),
}

/// Configuration for the init command
pub struct InitConfig {
    /// Directory to initialize
    pub path: std::path::PathBuf,
    /// Overwrite existing files
    pub force: bool,
    /// LLM provider to configure (openai or ollama)
    pub provider: String,
    /// Web search provider to configure (tavily or duckduckgo)
    pub web_provider: String,
    /// Host address for the server
    pub host: String,
    /// Port for the server
    pub port: u16,
}

/// Run the init command
pub fn run(config: InitConfig, output: &Output) -> InitResult {
    output.banner();
    output.header("Initializing JURIS");

    let base_path = &config.path;

    let config_path = base_path.join("juris.toml");
    if config_path.exists() && !config.force {
        output.warning("juris.toml already exists!");
        output.hint("Use --force to overwrite existing files");
        return InitResult::AlreadyExists;
    }

    output.subheader("Creating directories");

    let data_dir = base_path.join("data");
    if !data_dir.exists() {
        if let Err(e) = fs::create_dir_all(&data_dir) {
            output.error(&format!("Failed to create data: {}", e));
            return InitResult::Error(e.to_string());
        }
        output.created_dir("data");
    } else {
        output.skipped("data", "already exists");
    }

    output.subheader("Creating configuration files");

    let toml_content = generate_juris_toml(&config);
    if let Err(e) = write_file(&config_path, &toml_content, config.force) {
        output.error(&format!("Failed to create juris.toml: {}", e));
        return InitResult::Error(e.to_string());
    }
    output.created("config", "juris.toml");

    let env_example_path = base_path.join(".env.example");
    if let Err(e) = write_file(&env_example_path, &generate_env_example(&config), config.force) {
        output.error(&format!("Failed to create .env.example: {}", e));
        return InitResult::Error(e.to_string());
    }
    output.created("env", ".env.example");

    let gitignore_path = base_path.join(".gitignore");
    if !gitignore_path.exists() {
        if let Err(e) = write_file(&gitignore_path, &generate_gitignore(), false) {
            output.warning(&format!("Failed to create .gitignore: {}", e));
        } else {
            output.created("file", ".gitignore");
        }
    }

    output.complete("JURIS initialized successfully!");

    output.header("Next Steps");
    output.newline();
    output.info("1. Set up environment variables:");
    output.command("cp .env.example .env");
    output.command("# Edit .env and fill in the API keys");
    output.newline();

    output.info("2. Point [case_law] at your Pinecone index:");
    output.command("# Set pinecone_host in juris.toml");
    output.newline();

    if config.provider == "ollama" {
        output.info("3. Start Ollama (if not running):");
        output.command("ollama serve");
        output.command("ollama pull llama3.1");
        output.newline();
    }

    output.info("Start the server:");
    output.command("juris-server");
    output.newline();

    output.hint(&format!(
        "Server will be available at http://{}:{}",
        config.host, config.port
    ));
    output.hint("Try a one-off job with: juris-server research \"<your question>\"");

    InitResult::Success
}

fn write_file(path: &Path, content: &str, force: bool) -> std::io::Result<()> {
    if path.exists() && !force {
        return Ok(()); // Skip existing files unless force is true
    }
    fs::write(path, content)
}

fn generate_juris_toml(config: &InitConfig) -> String {
    let llm_section = if config.provider == "ollama" {
        r#"# Local Ollama server
[llm]
provider = "ollama"
model = "llama3.1"
base_url = "http://localhost:11434""#
    } else {
        r#"# OpenAI API (set OPENAI_API_KEY in .env)
[llm]
provider = "openai"
model = "gpt-4o"
api_key_env = "OPENAI_API_KEY"
api_base = "https://api.openai.com/v1"
temperature = 0.2"#
    };

    let web_section = if config.web_provider == "duckduckgo" {
        r#"[web]
enabled = true
provider = "duckduckgo"
max_results = 7
timeout_secs = 60"#
    } else {
        r#"[web]
enabled = true
provider = "tavily"
api_key_env = "TAVILY_API_KEY"
search_depth = "advanced"
max_results = 7
timeout_secs = 60"#
    };

    format!(
        r#"# JURIS configuration
# Secrets are never stored here: *_env keys name environment variables.

[server]
host = "{host}"
port = {port}
log_level = "info"

[storage]
# memory | sqlite | turso
backend = "sqlite"
path = "./data/juris.db"

{llm_section}

[embeddings]
api_key_env = "OPENAI_API_KEY"
model = "text-embedding-3-large"

[case_law]
enabled = true
# pinecone | memory
backend = "pinecone"
pinecone_host = "your-index.svc.your-region.pinecone.io"
pinecone_api_key_env = "PINECONE_API_KEY"
top_k = 15
timeout_secs = 60

{web_section}

[synthesis]
timeout_secs = 300
jurisdiction = "Massachusetts"
jurisdiction_keywords = ["massachusetts", "mass"]

[retention]
# Finished jobs are kept forever unless max_age_secs is set
# max_age_secs = 604800
sweep_interval_secs = 300
"#,
        host = config.host,
        port = config.port,
        llm_section = llm_section,
        web_section = web_section,
    )
}

fn generate_env_example(config: &InitConfig) -> String {
    let mut content = String::from(
        r#"# JURIS Environment Variables
# ===========================
# Copy this file to .env and fill in the values.

# Optional: Logging level (trace, debug, info, warn, error)
RUST_LOG=info,juris=debug

# REQUIRED: embeddings for case-law retrieval (and completions with the openai provider)
OPENAI_API_KEY=sk-...

# REQUIRED: Pinecone index holding the case-law corpus
PINECONE_API_KEY=your-pinecone-key
"#,
    );

    if config.web_provider != "duckduckgo" {
        content.push_str(
            r#"
# REQUIRED: Tavily web search
TAVILY_API_KEY=tvly-...
"#,
        );
    }

    content.push_str(
        r#"
# Optional: Turso cloud database (storage.backend = "turso")
# TURSO_DATABASE_URL=libsql://your-db.turso.io
# TURSO_AUTH_TOKEN=your-token
"#,
    );
    content
}

fn generate_gitignore() -> String {
    r#"# JURIS Generated Files
/data/
*.db
*.db-journal

# Environment
.env
.env.local
.env.*.local

# Rust
/target/

# OS
.DS_Store
Thumbs.db
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::toml_config::{JurisConfig, LlmProviderKind, StorageBackend, WebProviderKind};
    use tempfile::TempDir;

    fn create_test_config(temp_dir: &TempDir) -> InitConfig {
        InitConfig {
            path: temp_dir.path().to_path_buf(),
            force: false,
            provider: "openai".to_string(),
            web_provider: "tavily".to_string(),
            host: "127.0.0.1".to_string(),
            port: 3000,
        }
    }

    #[test]
    fn test_generated_toml_parses() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config = create_test_config(&temp_dir);

        let parsed = JurisConfig::parse(&generate_juris_toml(&config)).unwrap();
        assert_eq!(parsed.server.port, 3000);
        assert_eq!(parsed.storage.backend, StorageBackend::Sqlite);
        assert_eq!(parsed.llm.provider, LlmProviderKind::OpenAI);
        assert_eq!(parsed.web.provider, WebProviderKind::Tavily);
        assert_eq!(parsed.case_law.top_k, 15);
        assert!(parsed.retention.max_age_secs.is_none());
    }

    #[test]
    fn test_generated_toml_ollama_duckduckgo() {
        let config = InitConfig {
            path: std::path::PathBuf::from("/tmp"),
            force: false,
            provider: "ollama".to_string(),
            web_provider: "duckduckgo".to_string(),
            host: "0.0.0.0".to_string(),
            port: 8080,
        };

        let parsed = JurisConfig::parse(&generate_juris_toml(&config)).unwrap();
        assert_eq!(parsed.llm.provider, LlmProviderKind::Ollama);
        assert_eq!(parsed.web.provider, WebProviderKind::DuckDuckGo);
        assert_eq!(parsed.bind_address(), "0.0.0.0:8080");

        let env = generate_env_example(&config);
        assert!(!env.contains("TAVILY_API_KEY"));
        assert!(env.contains("PINECONE_API_KEY"));
    }

    #[test]
    fn test_write_file_skips_existing_without_force() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let file_path = temp_dir.path().join("test.txt");

        fs::write(&file_path, "original").expect("Failed to write");

        write_file(&file_path, "new content", false).unwrap();
        assert_eq!(fs::read_to_string(&file_path).unwrap(), "original");

        write_file(&file_path, "new content", true).unwrap();
        assert_eq!(fs::read_to_string(&file_path).unwrap(), "new content");
    }

    #[test]
    fn test_run_creates_all_files() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config = create_test_config(&temp_dir);
        let output = Output::no_color();

        match run(config, &output) {
            InitResult::Success => (),
            _ => panic!("Expected Success"),
        }

        assert!(temp_dir.path().join("juris.toml").exists());
        assert!(temp_dir.path().join(".env.example").exists());
        assert!(temp_dir.path().join(".gitignore").exists());
        assert!(temp_dir.path().join("data").is_dir());
    }

    #[test]
    fn test_run_already_exists_without_force() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        fs::write(temp_dir.path().join("juris.toml"), "existing").expect("Failed to write");

        let config = create_test_config(&temp_dir);
        let output = Output::no_color();

        match run(config, &output) {
            InitResult::AlreadyExists => (),
            _ => panic!("Expected AlreadyExists"),
        }
    }

    #[test]
    fn test_run_force_overwrites() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        fs::write(temp_dir.path().join("juris.toml"), "existing").expect("Failed to write");

        let mut config = create_test_config(&temp_dir);
        config.force = true;
        let output = Output::no_color();

        match run(config, &output) {
            InitResult::Success => (),
            _ => panic!("Expected Success"),
        }

        let content =
            fs::read_to_string(temp_dir.path().join("juris.toml")).expect("Failed to read");
        assert!(content.contains("[server]"));
        assert!(!content.contains("existing"));
    }
}
