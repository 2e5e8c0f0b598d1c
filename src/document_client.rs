//! Cliente del servicio de documentos / base de conocimiento.
//!
//! El servicio no conoce carpetas: cada documento guarda una ruta de texto
//! y los "movimientos" son actualizaciones de esa ruta, individuales o en bloque.
//! Los artefactos HTML y FSM viajan como `{"content": <base64>}`.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use crate::{
    config::AppConfig,
    models::{ArtifactKind, DocumentUpload, KbEntry, PathUpdate, RemoteProject},
    remote::{build_http_client, check_status, endpoint, ServiceError},
};

/// Operaciones del servicio de documentos que usa la consola.
#[async_trait]
pub trait DocumentService: Send + Sync {
    async fn list_projects(&self) -> Result<Vec<RemoteProject>, ServiceError>;
    async fn get_project(&self, project_id: &str) -> Result<RemoteProject, ServiceError>;
    async fn delete_project(&self, project_id: &str) -> Result<(), ServiceError>;
    async fn list_knowledge_base(&self, project_id: &str) -> Result<Vec<KbEntry>, ServiceError>;

    /// Sube los ficheros y devuelve los ids remotos en el mismo orden.
    async fn upload_files(
        &self,
        project_id: &str,
        files: &[DocumentUpload],
    ) -> Result<Vec<String>, ServiceError>;

    async fn update_document_path(&self, update: &PathUpdate) -> Result<(), ServiceError>;
    async fn update_document_paths(&self, updates: &[PathUpdate]) -> Result<(), ServiceError>;
    async fn delete_document(&self, doc_id: &str) -> Result<(), ServiceError>;
    async fn delete_documents(&self, doc_ids: &[String]) -> Result<(), ServiceError>;

    async fn fetch_artifact(&self, project_id: &str, kind: ArtifactKind) -> Result<String, ServiceError>;
    async fn save_artifact(
        &self,
        project_id: &str,
        kind: ArtifactKind,
        content: &str,
    ) -> Result<(), ServiceError>;

    /// Contenido binario original de un documento.
    async fn fetch_document_content(&self, doc_id: &str) -> Result<Vec<u8>, ServiceError>;
}

#[derive(Serialize, Deserialize)]
struct ArtifactPayload {
    content: String,
}

#[derive(Deserialize)]
struct UploadResponse {
    ids: Vec<String>,
}

/// Implementación HTTP sobre `reqwest`.
#[derive(Clone)]
pub struct DocumentClient {
    base_url: String,
    http: reqwest::Client,
}

impl DocumentClient {
    pub fn from_config(cfg: &AppConfig) -> anyhow::Result<Self> {
        Ok(Self {
            base_url: cfg.docservice_url.clone(),
            http: build_http_client(cfg)?,
        })
    }

    fn url(&self, path: &str) -> String {
        endpoint(&self.base_url, path)
    }
}

fn decode_artifact(payload: ArtifactPayload) -> Result<String, ServiceError> {
    let bytes = BASE64
        .decode(payload.content.trim())
        .map_err(|e| ServiceError::Payload(format!("base64 inválido: {e}")))?;
    String::from_utf8(bytes).map_err(|e| ServiceError::Payload(format!("artefacto no UTF-8: {e}")))
}

#[async_trait]
impl DocumentService for DocumentClient {
    async fn list_projects(&self) -> Result<Vec<RemoteProject>, ServiceError> {
        let resp = self.http.get(self.url("projects")).send().await?;
        Ok(check_status(resp).await?.json().await?)
    }

    async fn get_project(&self, project_id: &str) -> Result<RemoteProject, ServiceError> {
        let resp = self
            .http
            .get(self.url(&format!("projects/{project_id}")))
            .send()
            .await?;
        Ok(check_status(resp).await?.json().await?)
    }

    async fn delete_project(&self, project_id: &str) -> Result<(), ServiceError> {
        let resp = self
            .http
            .delete(self.url(&format!("projects/{project_id}")))
            .send()
            .await?;
        check_status(resp).await?;
        Ok(())
    }

    async fn list_knowledge_base(&self, project_id: &str) -> Result<Vec<KbEntry>, ServiceError> {
        let resp = self
            .http
            .get(self.url(&format!("projects/{project_id}/knowledge-base")))
            .send()
            .await?;
        Ok(check_status(resp).await?.json().await?)
    }

    async fn upload_files(
        &self,
        project_id: &str,
        files: &[DocumentUpload],
    ) -> Result<Vec<String>, ServiceError> {
        let paths: Vec<&str> = files.iter().map(|f| f.path.as_str()).collect();
        let mut form = Form::new().text(
            "paths",
            serde_json::to_string(&paths).map_err(|e| ServiceError::Payload(e.to_string()))?,
        );
        for file in files {
            let part = Part::bytes(file.bytes.clone())
                .file_name(file.file_name.clone())
                .mime_str(&file.content_type)?;
            form = form.part("files", part);
        }

        debug!("Subiendo {} ficheros al proyecto {project_id}", files.len());
        let resp = self
            .http
            .post(self.url(&format!("projects/{project_id}/knowledge-base")))
            .multipart(form)
            .send()
            .await?;
        let body: UploadResponse = check_status(resp).await?.json().await?;
        Ok(body.ids)
    }

    async fn update_document_path(&self, update: &PathUpdate) -> Result<(), ServiceError> {
        let resp = self
            .http
            .patch(self.url(&format!("knowledge-base/{}/path", update.id)))
            .json(&json!({ "path": update.path }))
            .send()
            .await?;
        check_status(resp).await?;
        Ok(())
    }

    async fn update_document_paths(&self, updates: &[PathUpdate]) -> Result<(), ServiceError> {
        let resp = self
            .http
            .patch(self.url("knowledge-base/paths"))
            .json(updates)
            .send()
            .await?;
        check_status(resp).await?;
        Ok(())
    }

    async fn delete_document(&self, doc_id: &str) -> Result<(), ServiceError> {
        let resp = self
            .http
            .delete(self.url(&format!("knowledge-base/{doc_id}")))
            .send()
            .await?;
        check_status(resp).await?;
        Ok(())
    }

    async fn delete_documents(&self, doc_ids: &[String]) -> Result<(), ServiceError> {
        let resp = self
            .http
            .post(self.url("knowledge-base/delete"))
            .json(doc_ids)
            .send()
            .await?;
        check_status(resp).await?;
        Ok(())
    }

    async fn fetch_artifact(&self, project_id: &str, kind: ArtifactKind) -> Result<String, ServiceError> {
        let resp = self
            .http
            .get(self.url(&format!("projects/{project_id}/{}", kind.suffix())))
            .send()
            .await?;
        let payload: ArtifactPayload = check_status(resp).await?.json().await?;
        decode_artifact(payload)
    }

    async fn save_artifact(
        &self,
        project_id: &str,
        kind: ArtifactKind,
        content: &str,
    ) -> Result<(), ServiceError> {
        let payload = ArtifactPayload {
            content: BASE64.encode(content.as_bytes()),
        };
        let resp = self
            .http
            .put(self.url(&format!("projects/{project_id}/{}", kind.suffix())))
            .json(&payload)
            .send()
            .await?;
        check_status(resp).await?;
        Ok(())
    }

    async fn fetch_document_content(&self, doc_id: &str) -> Result<Vec<u8>, ServiceError> {
        let resp = self
            .http
            .get(self.url(&format!("knowledge-base/{doc_id}/content")))
            .send()
            .await?;
        Ok(check_status(resp).await?.bytes().await?.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_base64_artifacts() {
        let payload = ArtifactPayload {
            content: BASE64.encode("<h1>Hola</h1>"),
        };
        assert_eq!(decode_artifact(payload).unwrap(), "<h1>Hola</h1>");
    }

    #[test]
    fn rejects_broken_base64() {
        let payload = ArtifactPayload {
            content: "%%%no-es-base64".into(),
        };
        assert!(matches!(decode_artifact(payload), Err(ServiceError::Payload(_))));
    }
}
