//! Almacén de blobs de corta vida servidos en `/api/blobs/{token}`.
//! Es el equivalente en servidor de las "object URLs" del navegador.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use tracing::debug;
use uuid::Uuid;

const URL_PREFIX: &str = "/api/blobs/";

#[derive(Debug, Clone)]
pub struct Blob {
    pub content_type: String,
    pub bytes: Vec<u8>,
    created_at: DateTime<Utc>,
}

#[derive(Debug)]
pub struct BlobStore {
    ttl: Duration,
    blobs: HashMap<String, Blob>,
}

impl BlobStore {
    pub fn new(ttl_secs: i64) -> Self {
        Self {
            ttl: Duration::seconds(ttl_secs),
            blobs: HashMap::new(),
        }
    }

    /// Registra el contenido y devuelve la URL con la que se sirve.
    pub fn register(&mut self, content_type: &str, bytes: Vec<u8>) -> String {
        self.purge_expired();
        let token = Uuid::new_v4().simple().to_string();
        self.blobs.insert(
            token.clone(),
            Blob {
                content_type: content_type.to_string(),
                bytes,
                created_at: Utc::now(),
            },
        );
        format!("{URL_PREFIX}{token}")
    }

    pub fn get(&self, token: &str) -> Option<&Blob> {
        self.blobs
            .get(token)
            .filter(|b| Utc::now() - b.created_at < self.ttl)
    }

    /// ¿Sigue viva la URL? Las URLs ajenas al almacén nunca lo están.
    pub fn is_live(&self, url: &str) -> bool {
        token_of(url).is_some_and(|t| self.get(t).is_some())
    }

    /// Libera el blob de una URL previamente registrada.
    pub fn revoke(&mut self, url: &str) -> bool {
        match token_of(url) {
            Some(token) => {
                debug!("Revocando blob {token}");
                self.blobs.remove(token).is_some()
            }
            None => false,
        }
    }

    fn purge_expired(&mut self) {
        let now = Utc::now();
        let ttl = self.ttl;
        self.blobs.retain(|_, b| now - b.created_at < ttl);
    }

    pub fn len(&self) -> usize {
        self.blobs.len()
    }
}

fn token_of(url: &str) -> Option<&str> {
    url.strip_prefix(URL_PREFIX).filter(|t| !t.is_empty())
}
