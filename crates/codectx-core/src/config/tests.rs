use std::io::Write;
use std::path::PathBuf;

use codectx_index::LanguageKind;
use serial_test::serial;

use super::*;

const ENV_KEYS: [&str; 14] = [
    "CODECTX_BIND",
    "CODECTX_PORT",
    "PORT",
    "CODECTX_AUTH_TOKEN",
    "CODECTX_PROJECT_ROOT",
    "CODECTX_CONCURRENCY",
    "CODECTX_WATCH",
    "CODECTX_EMBED_PROVIDER",
    "CODECTX_EMBED_MODEL",
    "CODECTX_EMBED_BASE_URL",
    "CODECTX_STORE_BACKEND",
    "CODECTX_DATA_DIR",
    "CODECTX_QDRANT_URL",
    "CODECTX_QUERY_TOP_N",
];

fn clear_env() {
    for key in ENV_KEYS {
        unsafe { std::env::remove_var(key) };
    }
}

fn write_config(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[test]
fn defaults_match_documented_values() {
    let config = Config::default();
    assert_eq!(config.server.bind, "127.0.0.1");
    assert_eq!(config.server.port, 3000);
    assert!(config.server.auth_token.is_none());
    assert_eq!(config.server.rate_limit, 0);
    assert_eq!(config.server.max_body_size, 50 * 1024 * 1024);
    assert_eq!(config.index.project_root, PathBuf::from("."));
    assert_eq!(config.index.concurrency, 4);
    assert!(config.index.prune_deleted);
    assert!(config.index.startup_ingest);
    assert!(!config.index.watch);
    assert_eq!(config.index.languages.len(), 3);
    assert_eq!(config.embedding.provider, EmbeddingProvider::Ollama);
    assert_eq!(config.embedding.model(), "all-minilm");
    assert_eq!(config.embedding.dimensions, 384);
    assert_eq!(config.store.backend, StoreBackend::Sqlite);
    assert_eq!(config.store.table, "code_context");
    assert_eq!(config.query.top_n, 10);
}

#[test]
#[serial]
fn load_missing_file_falls_back_to_defaults() {
    clear_env();
    let config = Config::load(std::path::Path::new("/nonexistent/codectx.toml")).unwrap();
    assert_eq!(config.server.port, 3000);
    assert_eq!(config.store.backend, StoreBackend::Sqlite);
}

#[test]
#[serial]
fn load_partial_file_keeps_other_defaults() {
    clear_env();
    let file = write_config(
        r#"
[server]
port = 8080

[store]
backend = "memory"
"#,
    );
    let config = Config::load(file.path()).unwrap();
    assert_eq!(config.server.port, 8080);
    assert_eq!(config.server.bind, "127.0.0.1");
    assert_eq!(config.store.backend, StoreBackend::Memory);
    assert_eq!(config.store.table, "code_context");
    assert_eq!(config.query.top_n, 10);
}

#[test]
#[serial]
fn load_language_sets() {
    clear_env();
    let file = write_config(
        r#"
[[index.languages]]
language = "typescript"
extensions = ["ts"]

[[index.languages]]
language = "java"
extensions = ["java"]
"#,
    );
    let config = Config::load(file.path()).unwrap();
    assert_eq!(
        config.index.languages,
        vec![
            LanguageSet::new(LanguageKind::TypeScript, &["ts"]),
            LanguageSet::new(LanguageKind::Java, &["java"]),
        ]
    );
}

#[test]
#[serial]
fn load_rejects_malformed_toml() {
    clear_env();
    let file = write_config("[server\nport = ");
    let err = Config::load(file.path()).unwrap_err();
    assert!(format!("{err:#}").contains("failed to parse config file"));
}

#[test]
#[serial]
fn env_overrides_take_precedence_over_file() {
    clear_env();
    let file = write_config("[server]\nport = 8080\n");
    unsafe {
        std::env::set_var("CODECTX_PORT", "9090");
        std::env::set_var("CODECTX_STORE_BACKEND", "qdrant");
        std::env::set_var("CODECTX_EMBED_PROVIDER", "candle");
        std::env::set_var("CODECTX_QUERY_TOP_N", "3");
        std::env::set_var("CODECTX_WATCH", "true");
    }
    let config = Config::load(file.path()).unwrap();
    clear_env();

    assert_eq!(config.server.port, 9090);
    assert_eq!(config.store.backend, StoreBackend::Qdrant);
    assert_eq!(config.embedding.provider, EmbeddingProvider::Candle);
    assert_eq!(
        config.embedding.model(),
        "sentence-transformers/all-MiniLM-L6-v2"
    );
    assert_eq!(config.query.top_n, 3);
    assert!(config.index.watch);
}

#[test]
#[serial]
fn plain_port_used_when_prefixed_absent() {
    clear_env();
    unsafe { std::env::set_var("PORT", "4000") };
    let config = Config::load(std::path::Path::new("/nonexistent.toml")).unwrap();
    assert_eq!(config.server.port, 4000);

    unsafe { std::env::set_var("CODECTX_PORT", "5000") };
    let config = Config::load(std::path::Path::new("/nonexistent.toml")).unwrap();
    clear_env();
    assert_eq!(config.server.port, 5000);
}

#[test]
#[serial]
fn invalid_env_values_are_ignored() {
    clear_env();
    unsafe {
        std::env::set_var("CODECTX_PORT", "not-a-port");
        std::env::set_var("CODECTX_CONCURRENCY", "-1");
        std::env::set_var("CODECTX_STORE_BACKEND", "lancedb");
        std::env::set_var("CODECTX_WATCH", "maybe");
    }
    let config = Config::load(std::path::Path::new("/nonexistent.toml")).unwrap();
    clear_env();

    assert_eq!(config.server.port, 3000);
    assert_eq!(config.index.concurrency, 4);
    assert_eq!(config.store.backend, StoreBackend::Sqlite);
    assert!(!config.index.watch);
}

#[test]
#[serial]
fn empty_auth_token_env_disables_auth() {
    clear_env();
    let file = write_config("[server]\nauth_token = \"secret\"\n");
    unsafe { std::env::set_var("CODECTX_AUTH_TOKEN", "") };
    let config = Config::load(file.path()).unwrap();
    clear_env();
    assert!(config.server.auth_token.is_none());
}

#[test]
fn validate_accepts_defaults() {
    Config::default().validate().unwrap();
}

#[test]
fn validate_rejects_zero_values() {
    let mut config = Config::default();
    config.index.concurrency = 0;
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.query.top_n = 0;
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.embedding.dimensions = 0;
    assert!(config.validate().is_err());
}

#[test]
fn validate_rejects_empty_language_sets() {
    let mut config = Config::default();
    config.index.languages.clear();
    assert!(config.validate().is_err());

    let mut config = Config::default();
    config.index.languages[0].extensions.clear();
    let err = config.validate().unwrap_err();
    assert!(err.to_string().contains("javascript"));
}

#[test]
fn indexer_config_excludes_data_dir() {
    let mut config = Config::default();
    config.store.data_dir = PathBuf::from("/var/lib/ctx-store");
    let indexer = config.indexer_config();
    assert!(indexer.exclude_dirs.iter().any(|d| d == "ctx-store"));
    assert!(indexer.exclude_dirs.iter().any(|d| d == "node_modules"));
    assert_eq!(indexer.concurrency, 4);
}

#[test]
fn indexer_config_does_not_duplicate_excluded_dir() {
    let mut config = Config::default();
    config.store.data_dir = PathBuf::from("build");
    let indexer = config.indexer_config();
    assert_eq!(indexer.exclude_dirs.iter().filter(|d| *d == "build").count(), 1);
}

#[test]
fn ingest_plans_follow_language_sets() {
    let mut config = Config::default();
    config.index.project_root = PathBuf::from("/repo");
    let plans = config.ingest_plans();
    assert_eq!(plans.len(), 3);
    assert_eq!(plans[0].root, PathBuf::from("/repo"));
    assert_eq!(plans[0].language, Some(LanguageKind::JavaScript));
    assert_eq!(plans[0].extensions, vec!["js", "jsx", "mjs"]);
    assert_eq!(plans[2].language, Some(LanguageKind::Java));
}

#[test]
fn extensions_are_deduplicated() {
    let mut config = Config::default();
    config
        .index
        .languages
        .push(LanguageSet::new(LanguageKind::TypeScript, &["TS", "mts"]));
    let exts = config.index.extensions();
    assert_eq!(exts, vec!["js", "jsx", "mjs", "ts", "tsx", "java", "mts"]);
}

#[test]
fn sqlite_path_uses_table_name() {
    let store = StoreConfig::default();
    assert_eq!(store.sqlite_path(), PathBuf::from(".codectx/code_context.db"));
}

#[test]
fn shipped_default_config_matches_builtin_defaults() {
    let shipped: Config = toml::from_str(include_str!("../../../../config/default.toml")).unwrap();
    let builtin = Config::default();
    assert_eq!(shipped.server.port, builtin.server.port);
    assert_eq!(shipped.server.max_body_size, builtin.server.max_body_size);
    assert_eq!(shipped.index.exclude_dirs, builtin.index.exclude_dirs);
    assert_eq!(shipped.index.languages, builtin.index.languages);
    assert_eq!(shipped.embedding.model(), builtin.embedding.model());
    assert_eq!(shipped.store.sqlite_path(), builtin.store.sqlite_path());
    assert_eq!(shipped.query.top_n, builtin.query.top_n);
}
