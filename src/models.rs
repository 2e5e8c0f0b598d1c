//! Modelos de dominio: nodos del árbol de proyectos y registros de los
//! servicios remotos (proyectos, entradas de la base de conocimiento).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identificador del nodo raíz centinela. Es el único nodo sin padre.
pub const ROOT_ID: &str = "root";

/// Tipo de fichero de un nodo. El orden de declaración es el orden de
/// agrupación del listado (proyectos y carpetas primero).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileKind {
    Project,
    Folder,
    Pdf,
    Csv,
    Xlsx,
    Html,
    Json,
    Unknown,
}

impl FileKind {
    /// Deduce el tipo a partir de la extensión del nombre (sin distinguir mayúsculas).
    pub fn from_name(name: &str) -> Self {
        let extension = name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_lowercase())
            .unwrap_or_default();
        match extension.as_str() {
            "pdf" => Self::Pdf,
            "csv" => Self::Csv,
            "xlsx" => Self::Xlsx,
            "html" | "htm" => Self::Html,
            "json" | "fsm" => Self::Json,
            _ => Self::Unknown,
        }
    }

    /// Sólo PDF, CSV y XLSX pueden subirse a la base de conocimiento.
    pub fn is_uploadable(self) -> bool {
        matches!(self, Self::Pdf | Self::Csv | Self::Xlsx)
    }
}

/// Una entrada del árbol de proyectos: proyecto, carpeta o fichero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Node {
    pub id: String,
    pub parent: Option<String>,
    pub is_folder: bool,
    pub label: String,
    pub file_kind: FileKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_project_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_doc_id: Option<String>,
}

impl Node {
    pub fn root() -> Self {
        Self {
            id: ROOT_ID.to_string(),
            parent: None,
            is_folder: true,
            label: String::new(),
            file_kind: FileKind::Folder,
            remote_project_id: None,
            remote_doc_id: None,
        }
    }

    pub fn project(project: &RemoteProject) -> Self {
        Self {
            id: project_node_id(&project.id),
            parent: Some(ROOT_ID.to_string()),
            is_folder: true,
            label: project.name.clone(),
            file_kind: FileKind::Project,
            remote_project_id: Some(project.id.clone()),
            remote_doc_id: None,
        }
    }

    pub fn folder(parent: &str, name: &str) -> Self {
        Self {
            id: format!("folder:{}", Uuid::new_v4()),
            parent: Some(parent.to_string()),
            is_folder: true,
            label: name.to_string(),
            file_kind: FileKind::Folder,
            remote_project_id: None,
            remote_doc_id: None,
        }
    }

    pub fn document(parent: &str, name: &str, project_id: &str, doc_id: &str) -> Self {
        Self {
            id: format!("doc:{doc_id}"),
            parent: Some(parent.to_string()),
            is_folder: false,
            label: name.to_string(),
            file_kind: FileKind::from_name(name),
            remote_project_id: Some(project_id.to_string()),
            remote_doc_id: Some(doc_id.to_string()),
        }
    }

    /// Artefacto generado del proyecto (vista HTML o configuración FSM).
    /// No forma parte de la colección del árbol: se sintetiza al listar el
    /// proyecto y es de sólo lectura.
    pub fn artifact(project_id: &str, project_name: &str, kind: ArtifactKind) -> Self {
        Self {
            id: artifact_node_id(project_id, kind),
            parent: Some(project_node_id(project_id)),
            is_folder: false,
            label: format!("{project_name}.{}", kind.suffix()),
            file_kind: match kind {
                ArtifactKind::Html => FileKind::Html,
                ArtifactKind::Fsm => FileKind::Json,
            },
            remote_project_id: Some(project_id.to_string()),
            remote_doc_id: None,
        }
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// Proyecto de primer nivel (`parent == root`).
    pub fn is_project(&self) -> bool {
        self.parent.as_deref() == Some(ROOT_ID)
    }

    pub fn is_artifact(&self) -> bool {
        !self.is_folder && self.remote_doc_id.is_none()
    }
}

pub fn project_node_id(remote_project_id: &str) -> String {
    format!("project:{remote_project_id}")
}

pub fn artifact_node_id(remote_project_id: &str, kind: ArtifactKind) -> String {
    format!("artifact:{remote_project_id}:{}", kind.suffix())
}

/// Descompone el id de un nodo artefacto en (proyecto remoto, tipo).
pub fn parse_artifact_node_id(id: &str) -> Option<(&str, ArtifactKind)> {
    let (project, suffix) = id.strip_prefix("artifact:")?.rsplit_once(':')?;
    let kind = match suffix {
        "html" => ArtifactKind::Html,
        "fsm" => ArtifactKind::Fsm,
        _ => return None,
    };
    Some((project, kind))
}

/// Artefactos derivados de un proyecto.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Html,
    Fsm,
}

impl ArtifactKind {
    pub fn suffix(self) -> &'static str {
        match self {
            Self::Html => "html",
            Self::Fsm => "fsm",
        }
    }
}

/// Proyecto tal como lo devuelve el servicio de documentos.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteProject {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Entrada de la base de conocimiento de un proyecto.
/// `path` es la ruta completa dentro del proyecto, nombre incluido.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KbEntry {
    pub id: String,
    pub file_name: String,
    #[serde(default)]
    pub path: Option<String>,
}

/// Nueva ruta remota de un documento.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathUpdate {
    pub id: String,
    pub path: String,
}

/// Fichero recibido del usuario, todavía sin destino remoto.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFile {
    pub name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl LocalFile {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let name = name.into();
        let content_type = mime_guess::from_path(&name)
            .first_or_octet_stream()
            .to_string();
        Self {
            name,
            content_type,
            bytes,
        }
    }
}

/// Fichero listo para subir: ya lleva la ruta remota calculada.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentUpload {
    pub file_name: String,
    pub path: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Árbol anidado para la navegación de directorios locales (subida de carpetas).
#[derive(Debug, Clone, Serialize)]
pub struct LocalTreeNode {
    pub path: std::path::PathBuf,
    pub name: String,
    pub is_dir: bool,
    pub children: Vec<LocalTreeNode>,
}
