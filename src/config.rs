//! Carga y gestión de configuración de la aplicación (servicios remotos,
//! credenciales y límites del árbol y de la caché).

use std::env;
use std::str::FromStr;

use anyhow::{anyhow, Result};

use crate::cache::DEFAULT_CAPACITY;
use crate::tree::DEFAULT_MAX_DEPTH;

/// Configuración completa de la aplicación.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub docservice_url: String,
    pub analyst_url: String,
    pub analytics_url: String,
    pub api_key: String,
    pub access_token: String,
    pub server_addr: String,
    pub chatbot_base_url: String,

    pub cache_capacity: usize,
    pub max_tree_depth: usize,
    pub request_timeout_secs: u64,
    pub blob_ttl_secs: i64,
}

impl AppConfig {
    /// Carga la configuración desde variables de entorno (usando .env si existe).
    pub fn from_env() -> Result<Self> {
        let docservice_url = required("DOCSERVICE_URL")?;
        let analyst_url = required("ANALYST_URL")?;
        let analytics_url = required("ANALYTICS_URL")?;
        let api_key = required("API_KEY")?;
        let access_token = required("ACCESS_TOKEN")?;

        for (name, value) in [
            ("DOCSERVICE_URL", &docservice_url),
            ("ANALYST_URL", &analyst_url),
            ("ANALYTICS_URL", &analytics_url),
        ] {
            url::Url::parse(value).map_err(|e| anyhow!("{name} no es una URL válida: {e}"))?;
        }

        let server_addr =
            env::var("SERVER_ADDR").unwrap_or_else(|_| "127.0.0.1:3322".to_string());
        let chatbot_base_url = env::var("CHATBOT_BASE_URL")
            .unwrap_or_else(|_| "http://localhost:8080/chat".to_string());

        Ok(Self {
            docservice_url,
            analyst_url,
            analytics_url,
            api_key,
            access_token,
            server_addr,
            chatbot_base_url,
            cache_capacity: parsed_or("CACHE_CAPACITY", DEFAULT_CAPACITY)?,
            max_tree_depth: parsed_or("MAX_TREE_DEPTH", DEFAULT_MAX_DEPTH)?,
            request_timeout_secs: parsed_or("REQUEST_TIMEOUT_SECS", 30)?,
            blob_ttl_secs: parsed_or("BLOB_TTL_SECS", 600)?,
        })
    }
}

fn required(name: &str) -> Result<String> {
    env::var(name).map_err(|_| anyhow!("Falta {name} en el entorno"))
}

fn parsed_or<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow!("Valor inválido para {name} ('{raw}'): {e}")),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
impl AppConfig {
    /// Configuración mínima para tests, sin tocar el entorno.
    pub fn for_tests() -> Self {
        Self {
            docservice_url: "http://docs.test".into(),
            analyst_url: "http://analyst.test".into(),
            analytics_url: "http://analytics.test".into(),
            api_key: "key".into(),
            access_token: "token".into(),
            server_addr: "127.0.0.1:0".into(),
            chatbot_base_url: "http://chat.test".into(),
            cache_capacity: DEFAULT_CAPACITY,
            max_tree_depth: DEFAULT_MAX_DEPTH,
            request_timeout_secs: 5,
            blob_ttl_secs: 600,
        }
    }
}
