//! Despachador de acciones.
//!
//! Traduce una acción del usuario más la selección actual en llamadas al
//! árbol de proyectos, a la caché de artefactos y al servicio de documentos.
//! Todo fallo remoto acaba en una notificación y nunca en un cambio local.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error, info};

use crate::{
    actions::{allowed_actions, is_allowed, Action, SelectionShape},
    blobs::{Blob, BlobStore},
    cache::{fsm_key, html_key, pdf_key, ArtifactCache},
    config::AppConfig,
    document_client::DocumentService,
    models::{
        parse_artifact_node_id, project_node_id, ArtifactKind, DocumentUpload, FileKind, LocalFile,
        Node, RemoteProject,
    },
    notify::{ConfirmOptions, ConfirmOutcome, NotificationKind, Notifier},
    remote::ServiceError,
    tree::{Mutation, ProjectTree, TreeError},
    upload,
};

/// Campos que el editor necesita en toda configuración FSM.
fn fsm_defaults() -> [(&'static str, Value); 2] {
    [
        ("editor_active", Value::Bool(true)),
        ("editor_initial_file", Value::String(String::new())),
    ]
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Tree(#[from] TreeError),
    #[error("la acción {action:?} no está permitida para la selección {shape:?}")]
    NotAllowed { action: Action, shape: SelectionShape },
    #[error("falta el parámetro '{0}'")]
    MissingArgument(&'static str),
    #[error("tipo de fichero no admitido: {0}")]
    UnsupportedFile(String),
    #[error("contenido de artefacto inválido: {0}")]
    InvalidArtifact(String),
    #[error("no se pudo leer la carpeta local: {0}")]
    LocalFolder(String),
}

/// Petición de acción tal como llega del frontend.
#[derive(Debug, Clone, Deserialize)]
pub struct ActionRequest {
    pub action: Action,
    #[serde(default)]
    pub selection: Vec<String>,
    /// Carpeta abierta en el explorador; destino de crear/subir sin selección.
    #[serde(default)]
    pub current_folder: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub destination: Option<String>,
    #[serde(default)]
    pub local_path: Option<PathBuf>,
    #[serde(default)]
    pub confirmed: bool,
    #[serde(skip)]
    pub files: Vec<LocalFile>,
}

impl ActionRequest {
    pub fn new(action: Action, selection: &[&str]) -> Self {
        Self {
            action,
            selection: selection.iter().map(|s| s.to_string()).collect(),
            current_folder: None,
            name: None,
            destination: None,
            local_path: None,
            confirmed: false,
            files: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DownloadLink {
    pub file_name: String,
    pub url: String,
}

/// Resultado visible de una acción.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Outcome {
    Html { project_id: String, content: String },
    Fsm { project_id: String, document: Value },
    Pdf { doc_id: String, url: String },
    NavigatedInto { folder_id: String },
    Navigate { route: String },
    Launch { url: String },
    Download { files: Vec<DownloadLink> },
    Details { project: RemoteProject },
    TreeChanged { nodes: Vec<Node> },
    Removed { ids: Vec<String> },
    Saved { project_id: String, kind: ArtifactKind },
    /// La llamada remota falló; ya se ha notificado al usuario.
    Failed,
    Cancelled,
    Nothing,
}

#[derive(Debug, Clone, Serialize)]
pub struct DispatcherStats {
    pub projects: usize,
    pub nodes: usize,
    pub cached_artifacts: usize,
    pub live_blobs: usize,
}

pub struct Dispatcher {
    tree: tokio::sync::Mutex<ProjectTree>,
    cache: Mutex<ArtifactCache>,
    blobs: Mutex<BlobStore>,
    docs: Arc<dyn DocumentService>,
    chatbot_base_url: String,
    max_depth: usize,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn join_path(base: &str, name: &str) -> String {
    if base.is_empty() {
        name.to_string()
    } else {
        format!("{base}/{name}")
    }
}

/// Añade los campos por defecto del editor que falten. Devuelve si hubo cambios.
fn patch_fsm_defaults(document: &mut Value) -> Result<bool, ServiceError> {
    let object = document
        .as_object_mut()
        .ok_or_else(|| ServiceError::Payload("la FSM no es un objeto JSON".to_string()))?;
    let mut patched = false;
    for (field, default) in fsm_defaults() {
        if !object.contains_key(field) {
            object.insert(field.to_string(), default);
            patched = true;
        }
    }
    Ok(patched)
}

impl Dispatcher {
    pub fn new(docs: Arc<dyn DocumentService>, cfg: &AppConfig) -> Self {
        Self {
            tree: tokio::sync::Mutex::new(ProjectTree::new(cfg.max_tree_depth)),
            cache: Mutex::new(ArtifactCache::new(cfg.cache_capacity)),
            blobs: Mutex::new(BlobStore::new(cfg.blob_ttl_secs)),
            docs,
            chatbot_base_url: cfg.chatbot_base_url.clone(),
            max_depth: cfg.max_tree_depth,
        }
    }

    // ---------------------------------------------------------------------
    // CARGA Y CONSULTAS
    // ---------------------------------------------------------------------

    /// Vuelve a construir el árbol completo desde el servicio de documentos.
    /// Si falla cualquier listado, el árbol actual se conserva intacto.
    pub async fn reload_projects(&self, notifier: &dyn Notifier) -> Result<bool, TreeError> {
        let projects = match self.docs.list_projects().await {
            Ok(projects) => projects,
            Err(err) => {
                error!("Error listando proyectos: {err}");
                notifier.notify_failure("No se pudieron cargar los proyectos", &err);
                return Ok(false);
            }
        };

        let listings =
            futures::future::join_all(projects.iter().map(|p| self.docs.list_knowledge_base(&p.id))).await;

        let mut fresh = ProjectTree::new(self.max_depth);
        for (project, listing) in projects.iter().zip(listings) {
            match listing {
                Ok(entries) => fresh.load_project(project, &entries)?,
                Err(err) => {
                    error!("Error listando la base de conocimiento de {}: {err}", project.id);
                    notifier.notify_failure("No se pudieron cargar los proyectos", &err);
                    return Ok(false);
                }
            }
        }

        *self.tree.lock().await = fresh;
        info!("Árbol recargado: {} proyectos", projects.len());
        Ok(true)
    }

    pub async fn nodes(&self) -> Vec<Node> {
        self.tree.lock().await.nodes().to_vec()
    }

    /// Hijos de un nodo. Los proyectos muestran además sus dos artefactos.
    pub async fn children(&self, id: &str, grouped: bool) -> Result<Vec<Node>, TreeError> {
        let tree = self.tree.lock().await;
        let node = tree.node(id)?;
        let mut children: Vec<Node> = if grouped {
            tree.children_grouped(id).into_iter().cloned().collect()
        } else {
            tree.children(id).into_iter().cloned().collect()
        };
        if node.is_project() {
            if let Some(project_id) = &node.remote_project_id {
                for kind in [ArtifactKind::Html, ArtifactKind::Fsm] {
                    children.push(Node::artifact(project_id, &node.label, kind));
                }
            }
        }
        Ok(children)
    }

    pub async fn ancestors(&self, id: &str) -> Result<Vec<Node>, TreeError> {
        let tree = self.tree.lock().await;
        if tree.get(id).is_some() {
            return Ok(tree.ancestor_chain(id)?.into_iter().cloned().collect());
        }
        let artifact = Self::resolve(&tree, id)?;
        let project = artifact.parent.as_deref().unwrap_or(id);
        let mut chain: Vec<Node> = tree.ancestor_chain(project)?.into_iter().cloned().collect();
        chain.push(artifact);
        Ok(chain)
    }

    pub async fn allowed_for(&self, ids: &[String]) -> Result<(SelectionShape, Vec<Action>), TreeError> {
        let selection = self.resolve_selection(ids).await?;
        let refs: Vec<&Node> = selection.iter().collect();
        let shape = SelectionShape::of(&refs);
        Ok((shape, allowed_actions(shape)))
    }

    pub fn blob(&self, token: &str) -> Option<Blob> {
        lock(&self.blobs).get(token).cloned()
    }

    pub async fn stats(&self) -> DispatcherStats {
        let (projects, nodes) = {
            let tree = self.tree.lock().await;
            (tree.projects().len(), tree.len())
        };
        DispatcherStats {
            projects,
            nodes,
            cached_artifacts: lock(&self.cache).len(),
            live_blobs: lock(&self.blobs).len(),
        }
    }

    /// Nodo del árbol o artefacto sintetizado de un proyecto existente.
    fn resolve(tree: &ProjectTree, id: &str) -> Result<Node, TreeError> {
        if let Some(node) = tree.get(id) {
            return Ok(node.clone());
        }
        let (project_id, kind) =
            parse_artifact_node_id(id).ok_or_else(|| TreeError::UnknownNode(id.to_string()))?;
        let project = tree.node(&project_node_id(project_id))?;
        Ok(Node::artifact(project_id, &project.label, kind))
    }

    async fn resolve_selection(&self, ids: &[String]) -> Result<Vec<Node>, TreeError> {
        let tree = self.tree.lock().await;
        ids.iter().map(|id| Self::resolve(&tree, id)).collect()
    }

    // ---------------------------------------------------------------------
    // CACHÉ
    // ---------------------------------------------------------------------

    fn cached(&self, key: &str) -> Option<String> {
        lock(&self.cache).get(key).map(str::to_string)
    }

    fn store(&self, key: &str, value: String) {
        let evicted = lock(&self.cache).put(key, value);
        if let Some((old_key, old_value)) = evicted {
            debug!("Artefacto '{old_key}' expulsado de la caché");
            lock(&self.blobs).revoke(&old_value);
        }
    }

    fn forget(&self, key: &str) {
        let removed = lock(&self.cache).invalidate(key);
        if let Some(value) = removed {
            lock(&self.blobs).revoke(&value);
        }
    }

    async fn artifact_content(&self, project_id: &str, kind: ArtifactKind) -> Result<String, ServiceError> {
        let key = match kind {
            ArtifactKind::Html => html_key(project_id),
            ArtifactKind::Fsm => fsm_key(project_id),
        };
        if let Some(content) = self.cached(&key) {
            return Ok(content);
        }
        let content = self.docs.fetch_artifact(project_id, kind).await?;
        if kind == ArtifactKind::Html {
            self.store(&key, content.clone());
        }
        Ok(content)
    }

    // ---------------------------------------------------------------------
    // DESPACHO
    // ---------------------------------------------------------------------

    pub async fn dispatch(&self, req: ActionRequest, notifier: &dyn Notifier) -> Result<Outcome, DispatchError> {
        let selection = self.resolve_selection(&req.selection).await?;
        let refs: Vec<&Node> = selection.iter().collect();
        let shape = SelectionShape::of(&refs);
        if !is_allowed(req.action, shape) {
            return Err(DispatchError::NotAllowed {
                action: req.action,
                shape,
            });
        }
        debug!("Acción {:?} sobre {:?}", req.action, req.selection);

        match req.action {
            Action::Open => self.open(&selection[0], notifier).await,
            Action::Edit => Ok(Outcome::Navigate {
                route: format!("/projects/{}/edit", remote_project(&selection[0])?),
            }),
            Action::Launch => Ok(Outcome::Launch {
                url: format!(
                    "{}/{}",
                    self.chatbot_base_url.trim_end_matches('/'),
                    remote_project(&selection[0])?
                ),
            }),
            Action::ShowDetails => self.show_details(remote_project(&selection[0])?, notifier).await,
            Action::Download => self.download(&selection, notifier).await,
            Action::Delete => self.delete(&selection, notifier).await,
            Action::Rename => {
                let name = req.name.as_deref().ok_or(DispatchError::MissingArgument("name"))?;
                self.rename(&selection[0], name, notifier).await
            }
            Action::CreateFolder => {
                let parent = target_folder(&selection, req.current_folder.as_deref())?;
                let name = req.name.as_deref().ok_or(DispatchError::MissingArgument("name"))?;
                let folder = self.tree.lock().await.create_folder(&parent, name)?;
                Ok(Outcome::TreeChanged { nodes: vec![folder] })
            }
            Action::UploadFile => {
                let parent = target_folder(&selection, req.current_folder.as_deref())?;
                self.upload_files(&parent, req.files, notifier).await
            }
            Action::UploadFolder => {
                let parent = target_folder(&selection, req.current_folder.as_deref())?;
                let path = req
                    .local_path
                    .as_deref()
                    .ok_or(DispatchError::MissingArgument("local_path"))?;
                self.upload_folder(&parent, path, notifier).await
            }
            Action::DragDropComplete => {
                let destination = req
                    .destination
                    .as_deref()
                    .ok_or(DispatchError::MissingArgument("destination"))?;
                if let Some(artifact) = selection.iter().find(|n| n.is_artifact()) {
                    return Err(TreeError::ReadOnly(artifact.id.clone()).into());
                }
                self.move_selection(&req.selection, destination, notifier).await
            }
        }
    }

    async fn open(&self, node: &Node, notifier: &dyn Notifier) -> Result<Outcome, DispatchError> {
        if node.is_folder {
            return Ok(Outcome::NavigatedInto {
                folder_id: node.id.clone(),
            });
        }

        let label = node.label.to_lowercase();
        match (node.remote_project_id.as_deref(), node.remote_doc_id.as_deref()) {
            (Some(project_id), None) if label.ends_with(".html") => Ok(self.open_html(project_id, notifier).await),
            (Some(project_id), None) if label.ends_with(".fsm") => self.open_fsm(project_id, notifier).await,
            (_, Some(doc_id)) if label.ends_with(".pdf") => Ok(self.open_pdf(doc_id, notifier).await),
            _ => {
                debug!("Sin visor para '{}'", node.label);
                Ok(Outcome::Nothing)
            }
        }
    }

    async fn open_html(&self, project_id: &str, notifier: &dyn Notifier) -> Outcome {
        match self.artifact_content(project_id, ArtifactKind::Html).await {
            Ok(content) => Outcome::Html {
                project_id: project_id.to_string(),
                content,
            },
            Err(err) => {
                error!("Error abriendo la vista HTML de {project_id}: {err}");
                notifier.notify_failure("No se pudo abrir la vista previa", &err);
                Outcome::Failed
            }
        }
    }

    /// Abre la FSM completando los campos del editor que falten. Si hubo que
    /// completarla, se guarda en remoto antes de cachear la versión corregida.
    async fn open_fsm(&self, project_id: &str, notifier: &dyn Notifier) -> Result<Outcome, DispatchError> {
        let key = fsm_key(project_id);
        if let Some(raw) = self.cached(&key) {
            if let Ok(document) = serde_json::from_str::<Value>(&raw) {
                return Ok(Outcome::Fsm {
                    project_id: project_id.to_string(),
                    document,
                });
            }
            self.forget(&key);
        }

        let loaded = async {
            let raw = self.docs.fetch_artifact(project_id, ArtifactKind::Fsm).await?;
            let mut document: Value =
                serde_json::from_str(&raw).map_err(|e| ServiceError::Payload(e.to_string()))?;
            let content = if patch_fsm_defaults(&mut document)? {
                let patched = serde_json::to_string_pretty(&document)
                    .map_err(|e| ServiceError::Payload(e.to_string()))?;
                self.docs
                    .save_artifact(project_id, ArtifactKind::Fsm, &patched)
                    .await?;
                info!("FSM de {project_id} completada con los campos del editor");
                patched
            } else {
                raw
            };
            Ok::<_, ServiceError>((document, content))
        }
        .await;

        match loaded {
            Ok((document, content)) => {
                self.store(&key, content);
                Ok(Outcome::Fsm {
                    project_id: project_id.to_string(),
                    document,
                })
            }
            Err(err) => {
                error!("Error abriendo la FSM de {project_id}: {err}");
                notifier.notify_failure("No se pudo abrir la configuración", &err);
                Ok(Outcome::Failed)
            }
        }
    }

    async fn open_pdf(&self, doc_id: &str, notifier: &dyn Notifier) -> Outcome {
        let key = pdf_key(doc_id);
        if let Some(url) = self.cached(&key) {
            if lock(&self.blobs).is_live(&url) {
                return Outcome::Pdf {
                    doc_id: doc_id.to_string(),
                    url,
                };
            }
            self.forget(&key);
        }

        match self.docs.fetch_document_content(doc_id).await {
            Ok(bytes) => {
                let url = lock(&self.blobs).register("application/pdf", bytes);
                self.store(&key, url.clone());
                Outcome::Pdf {
                    doc_id: doc_id.to_string(),
                    url,
                }
            }
            Err(err) => {
                error!("Error descargando el PDF {doc_id}: {err}");
                notifier.notify_failure("No se pudo abrir el documento", &err);
                Outcome::Failed
            }
        }
    }

    async fn show_details(&self, project_id: &str, notifier: &dyn Notifier) -> Result<Outcome, DispatchError> {
        match self.docs.get_project(project_id).await {
            Ok(project) => Ok(Outcome::Details { project }),
            Err(err) => {
                error!("Error consultando el proyecto {project_id}: {err}");
                notifier.notify_failure("No se pudieron cargar los detalles", &err);
                Ok(Outcome::Failed)
            }
        }
    }

    /// Descarga todo o nada: si falla un fichero no se entrega ningún enlace.
    async fn download(&self, selection: &[Node], notifier: &dyn Notifier) -> Result<Outcome, DispatchError> {
        let mut fetched = Vec::with_capacity(selection.len());
        for node in selection {
            let bytes = match (&node.remote_doc_id, parse_artifact_node_id(&node.id)) {
                (Some(doc_id), _) => self.docs.fetch_document_content(doc_id).await,
                (None, Some((project_id, kind))) => self
                    .artifact_content(project_id, kind)
                    .await
                    .map(String::into_bytes),
                (None, None) => return Err(TreeError::ReadOnly(node.id.clone()).into()),
            };
            match bytes {
                Ok(bytes) => fetched.push((node.label.clone(), bytes)),
                Err(err) => {
                    error!("Error descargando '{}': {err}", node.label);
                    notifier.notify_failure("No se pudo descargar", &err);
                    return Ok(Outcome::Failed);
                }
            }
        }

        let mut blobs = lock(&self.blobs);
        let files = fetched
            .into_iter()
            .map(|(file_name, bytes)| {
                let content_type = mime_guess::from_path(&file_name).first_or_octet_stream();
                DownloadLink {
                    url: blobs.register(content_type.as_ref(), bytes),
                    file_name,
                }
            })
            .collect();
        Ok(Outcome::Download { files })
    }

    async fn delete(&self, selection: &[Node], notifier: &dyn Notifier) -> Result<Outcome, DispatchError> {
        if let Some(artifact) = selection.iter().find(|n| n.is_artifact()) {
            return Err(TreeError::ReadOnly(artifact.id.clone()).into());
        }
        let text = match selection {
            [node] => format!("¿Seguro que desea borrar '{}'?", node.label),
            many => format!("¿Seguro que desea borrar {} elementos?", many.len()),
        };
        if notifier.confirm("Borrar", &text, &ConfirmOptions::destructive("Borrar")) == ConfirmOutcome::Cancelled {
            return Ok(Outcome::Cancelled);
        }

        if let [project] = selection {
            if project.is_project() {
                return self.delete_project(project, notifier).await;
            }
        }

        let ids: Vec<String> = selection.iter().map(|n| n.id.clone()).collect();
        let mut tree = self.tree.lock().await;
        let doc_ids = tree.documents_under(&ids)?;
        let mutation = tree.delete_nodes(&ids, self.docs.as_ref()).await?;
        drop(tree);
        match mutation {
            Mutation::Applied => {
                for doc_id in &doc_ids {
                    self.forget(&pdf_key(doc_id));
                }
                notifier.notify(
                    NotificationKind::Success,
                    "Borrado",
                    &format!("Se han borrado {} documentos.", doc_ids.len()),
                );
                Ok(Outcome::Removed { ids })
            }
            Mutation::Rejected(err) => {
                notifier.notify_failure("No se pudo borrar", &err);
                Ok(Outcome::Failed)
            }
        }
    }

    async fn delete_project(&self, node: &Node, notifier: &dyn Notifier) -> Result<Outcome, DispatchError> {
        let project_id = remote_project(node)?;
        let mut tree = self.tree.lock().await;
        if let Err(err) = self.docs.delete_project(project_id).await {
            error!("Error borrando el proyecto {project_id}: {err}");
            notifier.notify_failure("No se pudo borrar el proyecto", &err);
            return Ok(Outcome::Failed);
        }
        let removed = tree.remove_project(&node.id)?;
        drop(tree);

        self.forget(&html_key(project_id));
        self.forget(&fsm_key(project_id));
        for doc_id in removed.iter().filter_map(|n| n.remote_doc_id.as_deref()) {
            self.forget(&pdf_key(doc_id));
        }
        notifier.notify(
            NotificationKind::Success,
            "Proyecto borrado",
            &format!("'{}' se ha borrado.", node.label),
        );
        Ok(Outcome::Removed {
            ids: vec![node.id.clone()],
        })
    }

    async fn rename(&self, node: &Node, name: &str, notifier: &dyn Notifier) -> Result<Outcome, DispatchError> {
        let mut tree = self.tree.lock().await;
        let mutation = tree.rename_node(&node.id, name, self.docs.as_ref()).await?;
        match mutation {
            Mutation::Applied => Ok(Outcome::TreeChanged {
                nodes: vec![tree.node(&node.id)?.clone()],
            }),
            Mutation::Rejected(err) => {
                notifier.notify_failure("No se pudo renombrar", &err);
                Ok(Outcome::Failed)
            }
        }
    }

    async fn move_selection(
        &self,
        ids: &[String],
        destination: &str,
        notifier: &dyn Notifier,
    ) -> Result<Outcome, DispatchError> {
        let mut tree = self.tree.lock().await;
        let mutation = tree.move_nodes(ids, destination, self.docs.as_ref()).await?;
        match mutation {
            Mutation::Applied => {
                let nodes = ids
                    .iter()
                    .map(|id| tree.node(id).cloned())
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Outcome::TreeChanged { nodes })
            }
            Mutation::Rejected(err) => {
                notifier.notify_failure("No se pudo mover", &err);
                Ok(Outcome::Failed)
            }
        }
    }

    /// Destino remoto de una subida: proyecto y ruta base de la carpeta.
    fn upload_target(tree: &ProjectTree, parent: &str) -> Result<(String, String), TreeError> {
        if !tree.node(parent)?.is_folder {
            return Err(TreeError::NotAFolder(parent.to_string()));
        }
        let project_id = tree
            .project_of(parent)?
            .remote_project_id
            .clone()
            .ok_or_else(|| TreeError::Detached(parent.to_string()))?;
        Ok((project_id, tree.remote_path(parent)?))
    }

    async fn upload_files(
        &self,
        parent: &str,
        files: Vec<LocalFile>,
        notifier: &dyn Notifier,
    ) -> Result<Outcome, DispatchError> {
        if files.is_empty() {
            return Err(DispatchError::MissingArgument("files"));
        }
        if let Some(bad) = files
            .iter()
            .find(|f| !FileKind::from_name(&f.name).is_uploadable())
        {
            return Err(DispatchError::UnsupportedFile(bad.name.clone()));
        }
        let names = files
            .iter()
            .map(|f| ProjectTree::clean_name(&f.name))
            .collect::<Result<Vec<_>, _>>()?;

        let mut tree = self.tree.lock().await;
        let (project_id, base) = Self::upload_target(&tree, parent)?;
        let uploads: Vec<DocumentUpload> = files
            .into_iter()
            .zip(names)
            .map(|(f, name)| DocumentUpload {
                path: join_path(&base, &name),
                file_name: name,
                content_type: f.content_type,
                bytes: f.bytes,
            })
            .collect();

        let ids = match self.docs.upload_files(&project_id, &uploads).await {
            Ok(ids) => ids,
            Err(err) => {
                error!("Error subiendo {} ficheros a {project_id}: {err}", uploads.len());
                notifier.notify_failure("No se pudieron subir los ficheros", &err);
                return Ok(Outcome::Failed);
            }
        };

        let names: Vec<String> = uploads.into_iter().map(|u| u.file_name).collect();
        let nodes = tree.add_files(parent, &names, &ids)?;
        notifier.notify(
            NotificationKind::Success,
            "Subida completada",
            &format!("Se han subido {} ficheros.", nodes.len()),
        );
        Ok(Outcome::TreeChanged { nodes })
    }

    /// Sube una carpeta local completa. Las carpetas del árbol se crean sólo
    /// después de que el servicio acepte los ficheros.
    async fn upload_folder(&self, parent: &str, path: &Path, notifier: &dyn Notifier) -> Result<Outcome, DispatchError> {
        let root = path.to_path_buf();
        let scan = tokio::task::spawn_blocking(move || upload::scan_folder(&root))
            .await
            .map_err(|e| DispatchError::LocalFolder(e.to_string()))?
            .map_err(|e| DispatchError::LocalFolder(e.to_string()))?;
        info!("Carpeta {}: {scan}", path.display());

        if scan.files.is_empty() {
            notifier.notify(
                NotificationKind::Info,
                "Nada que subir",
                "La carpeta no contiene ficheros PDF, CSV ni XLSX.",
            );
            return Ok(Outcome::Nothing);
        }

        // Carpetas y nombres normalizados antes de subir: las rutas remotas y
        // las etiquetas del árbol salen de los mismos segmentos.
        let mut prepared: Vec<(Vec<String>, String)> = Vec::with_capacity(scan.files.len());
        for scanned in &scan.files {
            let dirs = scanned
                .dirs
                .iter()
                .map(|d| ProjectTree::clean_name(d))
                .collect::<Result<Vec<_>, _>>()?;
            prepared.push((dirs, ProjectTree::clean_name(&scanned.file.name)?));
        }

        let mut tree = self.tree.lock().await;
        let (project_id, base) = Self::upload_target(&tree, parent)?;
        tree.check_folder_depth(parent, scan.folder_levels())?;

        let uploads: Vec<DocumentUpload> = scan
            .files
            .iter()
            .zip(&prepared)
            .map(|(s, (dirs, name))| {
                let dir = dirs.iter().fold(base.clone(), |acc, d| join_path(&acc, d));
                DocumentUpload {
                    file_name: name.clone(),
                    path: join_path(&dir, name),
                    content_type: s.file.content_type.clone(),
                    bytes: s.file.bytes.clone(),
                }
            })
            .collect();

        let ids = match self.docs.upload_files(&project_id, &uploads).await {
            Ok(ids) => ids,
            Err(err) => {
                error!("Error subiendo la carpeta {}: {err}", path.display());
                notifier.notify_failure("No se pudo subir la carpeta", &err);
                return Ok(Outcome::Failed);
            }
        };
        if ids.len() != uploads.len() {
            return Err(TreeError::UploadMismatch {
                files: uploads.len(),
                ids: ids.len(),
            }
            .into());
        }

        let mut nodes = Vec::new();
        let mut folders: Vec<String> = Vec::new();
        for ((dirs, name), doc_id) in prepared.into_iter().zip(ids) {
            let folder = tree.ensure_folder_path(parent, &dirs)?;
            nodes.extend(tree.add_files(&folder, &[name], &[doc_id])?);
            if !folders.contains(&folder) {
                folders.push(folder);
            }
        }
        let mut changed: Vec<Node> = folders
            .iter()
            .map(|id| tree.node(id).cloned())
            .collect::<Result<_, _>>()?;
        changed.extend(nodes);

        notifier.notify(
            NotificationKind::Success,
            "Carpeta subida",
            &format!("Se han subido {} ficheros.", scan.files.len()),
        );
        Ok(Outcome::TreeChanged { nodes: changed })
    }

    /// Guarda un artefacto editado e invalida su entrada en caché para que la
    /// próxima apertura lo descargue de nuevo.
    pub async fn save_artifact(
        &self,
        project_id: &str,
        kind: ArtifactKind,
        content: &str,
        notifier: &dyn Notifier,
    ) -> Result<Outcome, DispatchError> {
        if kind == ArtifactKind::Fsm {
            serde_json::from_str::<Value>(content).map_err(|e| DispatchError::InvalidArtifact(e.to_string()))?;
        }
        if let Err(err) = self.docs.save_artifact(project_id, kind, content).await {
            error!("Error guardando {} de {project_id}: {err}", kind.suffix());
            notifier.notify_failure("No se pudo guardar", &err);
            return Ok(Outcome::Failed);
        }

        self.forget(&match kind {
            ArtifactKind::Html => html_key(project_id),
            ArtifactKind::Fsm => fsm_key(project_id),
        });
        notifier.notify(NotificationKind::Success, "Guardado", "Los cambios se han guardado.");
        Ok(Outcome::Saved {
            project_id: project_id.to_string(),
            kind,
        })
    }
}

fn remote_project(node: &Node) -> Result<&str, TreeError> {
    node.remote_project_id
        .as_deref()
        .ok_or_else(|| TreeError::Detached(node.id.clone()))
}

/// Carpeta destino de crear/subir: la carpeta o proyecto seleccionado, o la
/// carpeta abierta si no hay selección.
fn target_folder(selection: &[Node], current_folder: Option<&str>) -> Result<String, DispatchError> {
    match selection {
        [node] if node.is_folder => Ok(node.id.clone()),
        [] => current_folder
            .map(str::to_string)
            .ok_or(DispatchError::MissingArgument("current_folder")),
        _ => Err(DispatchError::MissingArgument("current_folder")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::KbEntry;
    use crate::testing::{Call, FakeDocs, RecordingNotifier};

    fn project(id: &str, name: &str) -> RemoteProject {
        RemoteProject {
            id: id.into(),
            name: name.into(),
            description: None,
            created_at: None,
        }
    }

    /// P / F / doc.pdf (X)
    async fn setup() -> (Arc<FakeDocs>, Dispatcher, String) {
        let docs = Arc::new(FakeDocs::default());
        docs.projects.lock().unwrap().push(project("p1", "P"));
        docs.knowledge_base.lock().unwrap().insert(
            "p1".into(),
            vec![KbEntry {
                id: "X".into(),
                file_name: "doc.pdf".into(),
                path: Some("F/doc.pdf".into()),
            }],
        );
        let dispatcher = Dispatcher::new(docs.clone(), &AppConfig::for_tests());
        assert!(dispatcher
            .reload_projects(&RecordingNotifier::confirming())
            .await
            .unwrap());
        let folder = dispatcher
            .children("project:p1", false)
            .await
            .unwrap()
            .into_iter()
            .find(|n| n.label == "F")
            .unwrap()
            .id;
        docs.clear_calls();
        (docs, dispatcher, folder)
    }

    fn request(action: Action, selection: &[&str]) -> ActionRequest {
        ActionRequest::new(action, selection)
    }

    #[tokio::test]
    async fn deleting_folder_end_to_end() {
        let (docs, dispatcher, folder) = setup().await;
        let notifier = RecordingNotifier::confirming();

        let outcome = dispatcher
            .dispatch(request(Action::Delete, &[&folder]), &notifier)
            .await
            .unwrap();
        assert!(matches!(outcome, Outcome::Removed { .. }));
        assert_eq!(docs.calls(), [Call::DeleteDocuments(vec!["X".into()])]);

        let tree = dispatcher.tree.lock().await;
        assert!(tree.children("project:p1").is_empty());
        assert_eq!(notifier.kinds(), [NotificationKind::Success]);
    }

    #[tokio::test]
    async fn failed_delete_notifies_and_keeps_nodes() {
        let (docs, dispatcher, folder) = setup().await;
        docs.set_failing(true);
        let notifier = RecordingNotifier::confirming();
        let before = dispatcher.nodes().await;

        let outcome = dispatcher
            .dispatch(request(Action::Delete, &[&folder]), &notifier)
            .await
            .unwrap();
        assert!(matches!(outcome, Outcome::Failed));
        assert_eq!(notifier.kinds(), [NotificationKind::Retry]);
        assert_eq!(dispatcher.nodes().await, before);
    }

    #[tokio::test]
    async fn cancelled_delete_makes_no_calls() {
        let (docs, dispatcher, folder) = setup().await;
        let outcome = dispatcher
            .dispatch(request(Action::Delete, &[&folder]), &RecordingNotifier::cancelling())
            .await
            .unwrap();
        assert!(matches!(outcome, Outcome::Cancelled));
        assert!(docs.calls().is_empty());
    }

    #[tokio::test]
    async fn opening_fsm_injects_editor_defaults_and_caches_patch() {
        let (docs, dispatcher, _) = setup().await;
        docs.artifacts
            .lock()
            .unwrap()
            .insert(("p1".into(), ArtifactKind::Fsm), r#"{"states": ["inicio"]}"#.into());
        let notifier = RecordingNotifier::confirming();

        let outcome = dispatcher
            .dispatch(request(Action::Open, &["artifact:p1:fsm"]), &notifier)
            .await
            .unwrap();
        let Outcome::Fsm { document, .. } = outcome else {
            panic!("se esperaba una FSM, llegó {outcome:?}");
        };
        assert_eq!(document["editor_active"], Value::Bool(true));
        assert_eq!(document["editor_initial_file"], Value::String(String::new()));

        let saved = docs
            .calls()
            .into_iter()
            .find_map(|c| match c {
                Call::SaveArtifact(_, ArtifactKind::Fsm, content) => Some(content),
                _ => None,
            })
            .expect("la FSM corregida debe guardarse en remoto");
        let saved: Value = serde_json::from_str(&saved).unwrap();
        assert_eq!(saved, document);

        let cached: Value = serde_json::from_str(&dispatcher.cached(&fsm_key("p1")).unwrap()).unwrap();
        assert_eq!(cached, document);

        // Segunda apertura: sale de la caché sin tocar el servicio.
        docs.clear_calls();
        dispatcher
            .dispatch(request(Action::Open, &["artifact:p1:fsm"]), &notifier)
            .await
            .unwrap();
        assert!(docs.calls().is_empty());
    }

    #[tokio::test]
    async fn complete_fsm_is_not_resaved() {
        let (docs, dispatcher, _) = setup().await;
        docs.artifacts.lock().unwrap().insert(
            ("p1".into(), ArtifactKind::Fsm),
            r#"{"editor_active": false, "editor_initial_file": "main.fsm"}"#.into(),
        );

        let outcome = dispatcher
            .dispatch(request(Action::Open, &["artifact:p1:fsm"]), &RecordingNotifier::confirming())
            .await
            .unwrap();
        let Outcome::Fsm { document, .. } = outcome else {
            panic!("se esperaba una FSM");
        };
        assert_eq!(document["editor_active"], Value::Bool(false));
        assert_eq!(docs.calls(), [Call::FetchArtifact("p1".into(), ArtifactKind::Fsm)]);
    }

    #[tokio::test]
    async fn html_is_fetched_once_and_refetched_after_save() {
        let (docs, dispatcher, _) = setup().await;
        docs.artifacts
            .lock()
            .unwrap()
            .insert(("p1".into(), ArtifactKind::Html), "<h1>v1</h1>".into());
        let notifier = RecordingNotifier::confirming();
        let open = || request(Action::Open, &["artifact:p1:html"]);

        dispatcher.dispatch(open(), &notifier).await.unwrap();
        dispatcher.dispatch(open(), &notifier).await.unwrap();
        assert_eq!(docs.calls(), [Call::FetchArtifact("p1".into(), ArtifactKind::Html)]);

        let saved = dispatcher
            .save_artifact("p1", ArtifactKind::Html, "<h1>v2</h1>", &notifier)
            .await
            .unwrap();
        assert!(matches!(saved, Outcome::Saved { .. }));
        assert!(dispatcher.cached(&html_key("p1")).is_none());

        let Outcome::Html { content, .. } = dispatcher.dispatch(open(), &notifier).await.unwrap() else {
            panic!("se esperaba HTML");
        };
        assert_eq!(content, "<h1>v2</h1>");
    }

    #[tokio::test]
    async fn saving_invalid_fsm_is_rejected_locally() {
        let (docs, dispatcher, _) = setup().await;
        let err = dispatcher
            .save_artifact("p1", ArtifactKind::Fsm, "{roto", &RecordingNotifier::confirming())
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::InvalidArtifact(_)));
        assert!(docs.calls().is_empty());
    }

    #[tokio::test]
    async fn pdf_resolves_to_a_cached_blob_url() {
        let (docs, dispatcher, _) = setup().await;
        let notifier = RecordingNotifier::confirming();

        let Outcome::Pdf { url, .. } = dispatcher
            .dispatch(request(Action::Open, &["doc:X"]), &notifier)
            .await
            .unwrap()
        else {
            panic!("se esperaba un PDF");
        };
        assert!(lock(&dispatcher.blobs).is_live(&url));

        let Outcome::Pdf { url: again, .. } = dispatcher
            .dispatch(request(Action::Open, &["doc:X"]), &notifier)
            .await
            .unwrap()
        else {
            panic!("se esperaba un PDF");
        };
        assert_eq!(url, again);
        assert_eq!(docs.calls(), [Call::FetchContent("X".into())]);
    }

    #[tokio::test]
    async fn opening_folder_navigates_and_unknown_suffix_is_noop() {
        let (docs, dispatcher, folder) = setup().await;
        let notifier = RecordingNotifier::confirming();

        let outcome = dispatcher
            .dispatch(request(Action::Open, &[&folder]), &notifier)
            .await
            .unwrap();
        assert!(matches!(outcome, Outcome::NavigatedInto { folder_id } if folder_id == folder));

        let mut uploaded = request(Action::UploadFile, &[&folder]);
        uploaded.files = vec![LocalFile::new("tabla.csv", b"a,b".to_vec())];
        dispatcher.dispatch(uploaded, &notifier).await.unwrap();
        docs.clear_calls();

        let outcome = dispatcher
            .dispatch(request(Action::Open, &["doc:new-0"]), &notifier)
            .await
            .unwrap();
        assert!(matches!(outcome, Outcome::Nothing));
        assert!(docs.calls().is_empty());
    }

    #[tokio::test]
    async fn actions_outside_the_policy_are_refused() {
        let (_, dispatcher, _) = setup().await;
        let mut rename = request(Action::Rename, &["doc:X"]);
        rename.name = Some("otro.pdf".into());

        let err = dispatcher
            .dispatch(rename, &RecordingNotifier::confirming())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DispatchError::NotAllowed {
                action: Action::Rename,
                shape: SelectionShape::SingleFile
            }
        ));
    }

    #[tokio::test]
    async fn upload_goes_remote_first_then_inserts() {
        let (docs, dispatcher, folder) = setup().await;
        let notifier = RecordingNotifier::confirming();
        let mut req = request(Action::UploadFile, &[&folder]);
        req.files = vec![
            LocalFile::new("a.pdf", b"%PDF".to_vec()),
            LocalFile::new("b.xlsx", b"PK".to_vec()),
        ];

        let Outcome::TreeChanged { nodes } = dispatcher.dispatch(req, &notifier).await.unwrap() else {
            panic!("se esperaba un cambio en el árbol");
        };
        assert_eq!(
            docs.calls(),
            [Call::Upload {
                project: "p1".into(),
                paths: vec!["F/a.pdf".into(), "F/b.xlsx".into()]
            }]
        );
        assert_eq!(nodes.len(), 2);
        assert!(nodes.iter().all(|n| n.parent.as_deref() == Some(folder.as_str())));
    }

    #[tokio::test]
    async fn upload_id_mismatch_is_loud() {
        let (docs, dispatcher, folder) = setup().await;
        *docs.upload_ids.lock().unwrap() = Some(vec!["solo-uno".into()]);
        let mut req = request(Action::UploadFile, &[&folder]);
        req.files = vec![
            LocalFile::new("a.pdf", vec![]),
            LocalFile::new("b.pdf", vec![]),
        ];

        let err = dispatcher
            .dispatch(req, &RecordingNotifier::confirming())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DispatchError::Tree(TreeError::UploadMismatch { files: 2, ids: 1 })
        ));
        assert_eq!(dispatcher.children(&folder, false).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn failed_upload_inserts_nothing() {
        let (docs, dispatcher, _) = setup().await;
        docs.set_failing(true);
        let notifier = RecordingNotifier::confirming();
        let mut req = request(Action::UploadFile, &[]);
        req.current_folder = Some("project:p1".into());
        req.files = vec![LocalFile::new("a.pdf", vec![])];

        let outcome = dispatcher.dispatch(req, &notifier).await.unwrap();
        assert!(matches!(outcome, Outcome::Failed));
        assert_eq!(notifier.kinds(), [NotificationKind::Retry]);
        assert_eq!(dispatcher.children("project:p1", false).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn unsupported_uploads_are_refused() {
        let (docs, dispatcher, folder) = setup().await;
        let mut req = request(Action::UploadFile, &[&folder]);
        req.files = vec![LocalFile::new("script.sh", vec![])];

        let err = dispatcher
            .dispatch(req, &RecordingNotifier::confirming())
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::UnsupportedFile(name) if name == "script.sh"));
        assert!(docs.calls().is_empty());
    }

    #[tokio::test]
    async fn upload_folder_creates_folders_after_upload() {
        let (docs, dispatcher, _) = setup().await;
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("manuales");
        std::fs::create_dir_all(&root).unwrap();
        std::fs::write(root.join("guia.pdf"), b"%PDF").unwrap();

        let mut req = request(Action::UploadFolder, &[]);
        req.current_folder = Some("project:p1".into());
        req.local_path = Some(root);
        let Outcome::TreeChanged { nodes } = dispatcher
            .dispatch(req, &RecordingNotifier::confirming())
            .await
            .unwrap()
        else {
            panic!("se esperaba un cambio en el árbol");
        };

        assert_eq!(
            docs.calls(),
            [Call::Upload {
                project: "p1".into(),
                paths: vec!["manuales/guia.pdf".into()]
            }]
        );
        assert_eq!(nodes[0].label, "manuales");
        assert!(nodes[0].is_folder);
        assert_eq!(nodes[1].parent.as_deref(), Some(nodes[0].id.as_str()));
    }

    #[tokio::test]
    async fn drag_drop_moves_file_to_project_root() {
        let (docs, dispatcher, _) = setup().await;
        let mut req = request(Action::DragDropComplete, &["doc:X"]);
        req.destination = Some("project:p1".into());

        let outcome = dispatcher
            .dispatch(req, &RecordingNotifier::confirming())
            .await
            .unwrap();
        assert!(matches!(outcome, Outcome::TreeChanged { .. }));
        assert_eq!(
            docs.calls(),
            [Call::UpdatePath(crate::models::PathUpdate {
                id: "X".into(),
                path: "doc.pdf".into()
            })]
        );
    }

    #[tokio::test]
    async fn project_actions() {
        let (docs, dispatcher, _) = setup().await;
        let notifier = RecordingNotifier::confirming();

        let Outcome::Launch { url } = dispatcher
            .dispatch(request(Action::Launch, &["project:p1"]), &notifier)
            .await
            .unwrap()
        else {
            panic!("se esperaba un enlace");
        };
        assert_eq!(url, "http://chat.test/p1");

        let Outcome::Details { project } = dispatcher
            .dispatch(request(Action::ShowDetails, &["project:p1"]), &notifier)
            .await
            .unwrap()
        else {
            panic!("se esperaban detalles");
        };
        assert_eq!(project.name, "P");

        let outcome = dispatcher
            .dispatch(request(Action::Delete, &["project:p1"]), &notifier)
            .await
            .unwrap();
        assert!(matches!(outcome, Outcome::Removed { .. }));
        assert!(docs.calls().contains(&Call::DeleteProject("p1".into())));
        assert!(dispatcher.nodes().await.iter().all(|n| n.id != "doc:X"));
    }

    #[tokio::test]
    async fn download_returns_blob_links() {
        let (_, dispatcher, _) = setup().await;
        let Outcome::Download { files } = dispatcher
            .dispatch(request(Action::Download, &["doc:X"]), &RecordingNotifier::confirming())
            .await
            .unwrap()
        else {
            panic!("se esperaba una descarga");
        };
        assert_eq!(files[0].file_name, "doc.pdf");
        let token = files[0].url.rsplit('/').next().unwrap();
        assert_eq!(dispatcher.blob(token).unwrap().bytes, b"%PDF-1.4");
    }

    #[tokio::test]
    async fn failed_reload_keeps_the_current_tree() {
        let (docs, dispatcher, _) = setup().await;
        let before = dispatcher.nodes().await;
        docs.set_failing(true);
        let notifier = RecordingNotifier::confirming();

        assert!(!dispatcher.reload_projects(&notifier).await.unwrap());
        assert_eq!(dispatcher.nodes().await, before);
        assert_eq!(notifier.kinds(), [NotificationKind::Retry]);
    }

    #[tokio::test]
    async fn artifacts_are_listed_but_read_only() {
        let (_, dispatcher, folder) = setup().await;
        let labels: Vec<_> = dispatcher
            .children("project:p1", true)
            .await
            .unwrap()
            .into_iter()
            .map(|n| n.label)
            .collect();
        assert_eq!(labels, ["F", "P.html", "P.fsm"]);

        let mut req = request(Action::DragDropComplete, &["artifact:p1:html"]);
        req.destination = Some(folder);
        let err = dispatcher
            .dispatch(req, &RecordingNotifier::confirming())
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::Tree(TreeError::ReadOnly(_))));

        let chain: Vec<_> = dispatcher
            .ancestors("artifact:p1:fsm")
            .await
            .unwrap()
            .into_iter()
            .map(|n| n.id)
            .collect();
        assert_eq!(chain, ["root", "project:p1", "artifact:p1:fsm"]);
    }

    #[tokio::test]
    async fn upload_folder_rejects_blank_directory_names_before_uploading() {
        let (docs, dispatcher, _) = setup().await;
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("man");
        std::fs::create_dir_all(root.join(" ")).unwrap();
        std::fs::write(root.join(" ").join("a.pdf"), b"%PDF").unwrap();
        let before = dispatcher.nodes().await;

        let mut req = request(Action::UploadFolder, &[]);
        req.current_folder = Some("project:p1".into());
        req.local_path = Some(root);
        let err = dispatcher
            .dispatch(req, &RecordingNotifier::confirming())
            .await
            .unwrap_err();

        assert!(matches!(err, DispatchError::Tree(TreeError::InvalidName(name)) if name.is_empty()));
        assert!(docs.calls().is_empty());
        assert_eq!(dispatcher.nodes().await, before);
    }

    #[tokio::test]
    async fn upload_folder_trims_names_into_paths_and_labels() {
        let (docs, dispatcher, _) = setup().await;
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("man");
        std::fs::create_dir_all(root.join("sub ")).unwrap();
        std::fs::write(root.join("sub ").join("a.pdf"), b"%PDF").unwrap();

        let mut req = request(Action::UploadFolder, &[]);
        req.current_folder = Some("project:p1".into());
        req.local_path = Some(root);
        let Outcome::TreeChanged { nodes } = dispatcher
            .dispatch(req, &RecordingNotifier::confirming())
            .await
            .unwrap()
        else {
            panic!("se esperaba un cambio en el árbol");
        };

        assert_eq!(
            docs.calls(),
            [Call::Upload {
                project: "p1".into(),
                paths: vec!["man/sub/a.pdf".into()]
            }]
        );
        assert_eq!(nodes[0].label, "sub");
        let tree = dispatcher.tree.lock().await;
        assert_eq!(tree.remote_path(&nodes[1].id).unwrap(), "man/sub/a.pdf");
    }

    #[tokio::test]
    async fn upload_file_names_are_checked_before_uploading() {
        let (docs, dispatcher, folder) = setup().await;
        let mut req = request(Action::UploadFile, &[&folder]);
        req.files = vec![LocalFile::new("otra/x.pdf", vec![])];

        let err = dispatcher
            .dispatch(req, &RecordingNotifier::confirming())
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::Tree(TreeError::InvalidName(_))));
        assert!(docs.calls().is_empty());
        assert_eq!(dispatcher.children(&folder, false).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn deleting_one_file_uses_the_single_delete_call() {
        let (docs, dispatcher, folder) = setup().await;
        let outcome = dispatcher
            .dispatch(request(Action::Delete, &["doc:X"]), &RecordingNotifier::confirming())
            .await
            .unwrap();

        assert!(matches!(outcome, Outcome::Removed { .. }));
        assert_eq!(docs.calls(), [Call::DeleteDocument("X".into())]);
        assert!(dispatcher.children(&folder, false).await.unwrap().is_empty());
    }
}
