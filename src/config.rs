use std::env;

pub struct Config {
    pub database_url: String,
    pub bind_addr: String,
    pub upload_tmp_dir: String,
    pub storage: StorageConfig,
    pub tls: Option<TlsConfig>,
}

#[derive(Clone, Debug)]
pub struct StorageConfig {
    /// Public prefix photos are served from, e.g. `https://s3.amazonaws.com/`.
    pub base_url: String,
    pub bucket: String,
    /// Where uploads are sent. Defaults to `base_url`.
    pub endpoint: String,
    pub token: Option<String>,
}

pub struct TlsConfig {
    pub cert_path: String,
    pub key_path: String,
}

impl Config {
    pub fn load() -> Self {
        let base_url = load_or("S3_BASE_URL", "https://s3.amazonaws.com/");
        let endpoint = var("S3_ENDPOINT").unwrap_or_else(|| base_url.clone());

        let tls = match (var("TLS_CERT"), var("TLS_KEY")) {
            (Some(cert_path), Some(key_path)) => Some(TlsConfig {
                cert_path,
                key_path,
            }),
            (None, None) => None,
            _ => {
                warn!("Only one of TLS_CERT and TLS_KEY set, serving plain HTTP");
                None
            }
        };

        Self {
            database_url: load_or("DATABASE_URL", "catcollector.db"),
            bind_addr: load_or("BIND_ADDR", "127.0.0.1:5050"),
            upload_tmp_dir: load_or("UPLOAD_TMP_DIR", "./tmp"),
            storage: StorageConfig {
                base_url,
                bucket: load_or("S3_BUCKET", "catcollector"),
                endpoint,
                token: var("S3_TOKEN"),
            },
            tls,
        }
    }
}

fn var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn load_or(key: &str, default: &str) -> String {
    var(key).unwrap_or_else(|| {
        info!("{} not set, using default: {}", key, default);
        default.to_string()
    })
}
