use std::path::PathBuf;

use super::Config;

impl Config {
    pub(crate) fn apply_env_overrides(&mut self) {
        self.apply_env_overrides_server();
        self.apply_env_overrides_index();
        self.apply_env_overrides_backends();
    }

    fn apply_env_overrides_server(&mut self) {
        if let Ok(v) = std::env::var("CODECTX_BIND") {
            self.server.bind = v;
        }
        // Plain PORT is honored for hosting platforms; the prefixed one wins.
        for key in ["PORT", "CODECTX_PORT"] {
            if let Ok(v) = std::env::var(key) {
                if let Ok(port) = v.parse::<u16>() {
                    self.server.port = port;
                } else {
                    tracing::warn!("ignoring invalid {key} value: {v}");
                }
            }
        }
        if let Ok(v) = std::env::var("CODECTX_AUTH_TOKEN") {
            self.server.auth_token = if v.is_empty() { None } else { Some(v) };
        }
    }

    fn apply_env_overrides_index(&mut self) {
        if let Ok(v) = std::env::var("CODECTX_PROJECT_ROOT") {
            self.index.project_root = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("CODECTX_CONCURRENCY") {
            if let Ok(n) = v.parse::<usize>() {
                self.index.concurrency = n;
            } else {
                tracing::warn!("ignoring invalid CODECTX_CONCURRENCY value: {v}");
            }
        }
        if let Ok(v) = std::env::var("CODECTX_WATCH")
            && let Ok(watch) = v.parse::<bool>()
        {
            self.index.watch = watch;
        }
    }

    fn apply_env_overrides_backends(&mut self) {
        if let Ok(v) = std::env::var("CODECTX_EMBED_PROVIDER") {
            if let Ok(kind) = serde_json::from_value(serde_json::Value::String(v.clone())) {
                self.embedding.provider = kind;
            } else {
                tracing::warn!("ignoring invalid CODECTX_EMBED_PROVIDER value: {v}");
            }
        }
        if let Ok(v) = std::env::var("CODECTX_EMBED_MODEL") {
            self.embedding.model = Some(v);
        }
        if let Ok(v) = std::env::var("CODECTX_EMBED_BASE_URL") {
            self.embedding.base_url = v;
        }
        if let Ok(v) = std::env::var("CODECTX_STORE_BACKEND") {
            if let Ok(backend) = serde_json::from_value(serde_json::Value::String(v.clone())) {
                self.store.backend = backend;
            } else {
                tracing::warn!("ignoring invalid CODECTX_STORE_BACKEND value: {v}");
            }
        }
        if let Ok(v) = std::env::var("CODECTX_DATA_DIR") {
            self.store.data_dir = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("CODECTX_QDRANT_URL") {
            self.store.qdrant_url = v;
        }
        if let Ok(v) = std::env::var("CODECTX_QUERY_TOP_N") {
            if let Ok(n) = v.parse::<usize>() {
                self.query.top_n = n;
            } else {
                tracing::warn!("ignoring invalid CODECTX_QUERY_TOP_N value: {v}");
            }
        }
    }
}
