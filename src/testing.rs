//! Dobles de prueba: servicio de documentos en memoria y notificador que graba.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::{
    document_client::DocumentService,
    models::{ArtifactKind, DocumentUpload, KbEntry, PathUpdate, RemoteProject},
    notify::{ConfirmOptions, ConfirmOutcome, NotificationKind, Notifier},
    remote::ServiceError,
};

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    ListProjects,
    GetProject(String),
    DeleteProject(String),
    ListKnowledgeBase(String),
    Upload { project: String, paths: Vec<String> },
    UpdatePath(PathUpdate),
    UpdatePaths(Vec<PathUpdate>),
    DeleteDocument(String),
    DeleteDocuments(Vec<String>),
    FetchArtifact(String, ArtifactKind),
    SaveArtifact(String, ArtifactKind, String),
    FetchContent(String),
}

#[derive(Default)]
pub struct FakeDocs {
    calls: Mutex<Vec<Call>>,
    fail: AtomicBool,
    next_id: AtomicUsize,
    pub projects: Mutex<Vec<RemoteProject>>,
    pub knowledge_base: Mutex<HashMap<String, Vec<KbEntry>>>,
    pub artifacts: Mutex<HashMap<(String, ArtifactKind), String>>,
    pub contents: Mutex<HashMap<String, Vec<u8>>>,
    /// Si está fijado, la subida devuelve estos ids en lugar de generarlos.
    pub upload_ids: Mutex<Option<Vec<String>>>,
}

impl FakeDocs {
    pub fn failing() -> Self {
        let docs = Self::default();
        docs.set_failing(true);
        docs
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    fn record(&self, call: Call) -> Result<(), ServiceError> {
        self.calls.lock().unwrap().push(call);
        if self.fail.load(Ordering::SeqCst) {
            return Err(ServiceError::Status {
                status: 500,
                body: "fallo simulado".into(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentService for FakeDocs {
    async fn list_projects(&self) -> Result<Vec<RemoteProject>, ServiceError> {
        self.record(Call::ListProjects)?;
        Ok(self.projects.lock().unwrap().clone())
    }

    async fn get_project(&self, project_id: &str) -> Result<RemoteProject, ServiceError> {
        self.record(Call::GetProject(project_id.into()))?;
        self.projects
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.id == project_id)
            .cloned()
            .ok_or(ServiceError::Status {
                status: 404,
                body: String::new(),
            })
    }

    async fn delete_project(&self, project_id: &str) -> Result<(), ServiceError> {
        self.record(Call::DeleteProject(project_id.into()))
    }

    async fn list_knowledge_base(&self, project_id: &str) -> Result<Vec<KbEntry>, ServiceError> {
        self.record(Call::ListKnowledgeBase(project_id.into()))?;
        Ok(self
            .knowledge_base
            .lock()
            .unwrap()
            .get(project_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn upload_files(
        &self,
        project_id: &str,
        files: &[DocumentUpload],
    ) -> Result<Vec<String>, ServiceError> {
        self.record(Call::Upload {
            project: project_id.into(),
            paths: files.iter().map(|f| f.path.clone()).collect(),
        })?;
        if let Some(ids) = self.upload_ids.lock().unwrap().clone() {
            return Ok(ids);
        }
        Ok(files
            .iter()
            .map(|_| format!("new-{}", self.next_id.fetch_add(1, Ordering::SeqCst)))
            .collect())
    }

    async fn update_document_path(&self, update: &PathUpdate) -> Result<(), ServiceError> {
        self.record(Call::UpdatePath(update.clone()))
    }

    async fn update_document_paths(&self, updates: &[PathUpdate]) -> Result<(), ServiceError> {
        self.record(Call::UpdatePaths(updates.to_vec()))
    }

    async fn delete_document(&self, doc_id: &str) -> Result<(), ServiceError> {
        self.record(Call::DeleteDocument(doc_id.into()))
    }

    async fn delete_documents(&self, doc_ids: &[String]) -> Result<(), ServiceError> {
        self.record(Call::DeleteDocuments(doc_ids.to_vec()))
    }

    async fn fetch_artifact(&self, project_id: &str, kind: ArtifactKind) -> Result<String, ServiceError> {
        self.record(Call::FetchArtifact(project_id.into(), kind))?;
        self.artifacts
            .lock()
            .unwrap()
            .get(&(project_id.to_string(), kind))
            .cloned()
            .ok_or(ServiceError::Status {
                status: 404,
                body: String::new(),
            })
    }

    async fn save_artifact(
        &self,
        project_id: &str,
        kind: ArtifactKind,
        content: &str,
    ) -> Result<(), ServiceError> {
        self.record(Call::SaveArtifact(project_id.into(), kind, content.into()))?;
        self.artifacts
            .lock()
            .unwrap()
            .insert((project_id.to_string(), kind), content.to_string());
        Ok(())
    }

    async fn fetch_document_content(&self, doc_id: &str) -> Result<Vec<u8>, ServiceError> {
        self.record(Call::FetchContent(doc_id.into()))?;
        Ok(self
            .contents
            .lock()
            .unwrap()
            .get(doc_id)
            .cloned()
            .unwrap_or_else(|| b"%PDF-1.4".to_vec()))
    }
}

/// Graba todo lo notificado y contesta las confirmaciones con un valor fijo.
pub struct RecordingNotifier {
    pub answer: ConfirmOutcome,
    pub seen: Mutex<Vec<(NotificationKind, String)>>,
}

impl RecordingNotifier {
    pub fn confirming() -> Self {
        Self {
            answer: ConfirmOutcome::Confirmed,
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn cancelling() -> Self {
        Self {
            answer: ConfirmOutcome::Cancelled,
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn kinds(&self) -> Vec<NotificationKind> {
        self.seen.lock().unwrap().iter().map(|(k, _)| *k).collect()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, kind: NotificationKind, title: &str, _text: &str) {
        self.seen.lock().unwrap().push((kind, title.to_string()));
    }

    fn confirm(&self, _title: &str, _text: &str, _options: &ConfirmOptions) -> ConfirmOutcome {
        self.answer
    }
}
