//! Caché acotada de artefactos ya descargados (HTML, FSM, URL de blobs PDF).
//!
//! Expulsión FIFO por orden de inserción: leer una clave no la rejuvenece.

use std::collections::{HashMap, VecDeque};

use tracing::debug;

pub const DEFAULT_CAPACITY: usize = 10;

/// Clave de la vista HTML de un proyecto.
pub fn html_key(project_id: &str) -> String {
    project_id.to_string()
}

/// Clave de la configuración FSM de un proyecto.
pub fn fsm_key(project_id: &str) -> String {
    format!("{project_id}_fsm")
}

/// Clave de la URL de blob de un documento PDF.
pub fn pdf_key(doc_id: &str) -> String {
    doc_id.to_string()
}

#[derive(Debug)]
pub struct ArtifactCache {
    capacity: usize,
    entries: HashMap<String, String>,
    order: VecDeque<String>,
}

impl ArtifactCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            entries: HashMap::with_capacity(capacity),
            order: VecDeque::with_capacity(capacity),
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn has(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Inserta una entrada. Si la clave es nueva y la caché está llena, expulsa
    /// la más antigua y la devuelve. Reescribir una clave existente conserva
    /// su posición en la cola.
    pub fn put(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<(String, String)> {
        let key = key.into();
        let value = value.into();

        if let Some(slot) = self.entries.get_mut(&key) {
            *slot = value;
            return None;
        }

        let mut evicted = None;
        if self.entries.len() >= self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                debug!("Caché llena, expulsando '{oldest}'");
                evicted = self.entries.remove(&oldest).map(|v| (oldest, v));
            }
        }

        self.order.push_back(key.clone());
        self.entries.insert(key, value);
        evicted
    }

    /// Elimina la entrada para forzar una nueva descarga en la próxima lectura.
    pub fn invalidate(&mut self, key: &str) -> Option<String> {
        let removed = self.entries.remove(key)?;
        self.order.retain(|k| k != key);
        Some(removed)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for ArtifactCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
