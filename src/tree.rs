//! Modelo del árbol de proyectos.
//!
//! Todos los nodos (raíz, proyectos, carpetas, ficheros) viven en una única
//! colección plana con punteros al padre, en orden de inserción. Las
//! mutaciones respaldadas por el servicio de documentos siguen siempre el
//! mismo orden: primero la llamada remota, y sólo si tiene éxito se toca el
//! estado local.

use std::collections::{HashMap, HashSet};

use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::{
    document_client::DocumentService,
    models::{project_node_id, FileKind, KbEntry, Node, PathUpdate, RemoteProject, ROOT_ID},
    remote::ServiceError,
};

/// Profundidad máxima de carpetas (raíz = 0, proyecto = 1).
pub const DEFAULT_MAX_DEPTH: usize = 3;

/// Violaciones de precondiciones del árbol. Indican un defecto del llamador,
/// no un fallo del entorno, y nunca van acompañadas de cambios locales.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TreeError {
    #[error("nodo desconocido: {0}")]
    UnknownNode(String),
    #[error("el destino {0} no es una carpeta")]
    NotAFolder(String),
    #[error("no se puede mover {node} dentro de sí mismo o de un descendiente ({destination})")]
    CyclicMove { node: String, destination: String },
    #[error("{node} y {destination} pertenecen a proyectos distintos")]
    CrossProject { node: String, destination: String },
    #[error("el nodo {0} es de sólo lectura")]
    ReadOnly(String),
    #[error("la profundidad {depth} de {node} supera el máximo permitido ({max})")]
    DepthExceeded { node: String, depth: usize, max: usize },
    #[error("se subieron {files} ficheros pero el servicio devolvió {ids} ids")]
    UploadMismatch { files: usize, ids: usize },
    #[error("nombre inválido: '{0}'")]
    InvalidName(String),
    #[error("el nodo {0} no pertenece a ningún proyecto")]
    Detached(String),
    #[error("árbol inconsistente en {0}")]
    Corrupted(String),
}

/// Resultado de una mutación respaldada por una llamada remota.
#[derive(Debug)]
#[must_use]
pub enum Mutation {
    /// El servicio confirmó y el cambio local se aplicó.
    Applied,
    /// El servicio falló; el árbol no se ha tocado.
    Rejected(ServiceError),
}

impl Mutation {
    pub fn succeeded(&self) -> bool {
        matches!(self, Self::Applied)
    }
}

#[derive(Debug, Clone)]
pub struct ProjectTree {
    nodes: Vec<Node>,
    index: HashMap<String, usize>,
    max_depth: usize,
}

impl Default for ProjectTree {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_DEPTH)
    }
}

impl ProjectTree {
    pub fn new(max_depth: usize) -> Self {
        let mut tree = Self {
            nodes: Vec::new(),
            index: HashMap::new(),
            max_depth,
        };
        tree.insert(Node::root());
        tree
    }

    fn insert(&mut self, node: Node) {
        self.index.insert(node.id.clone(), self.nodes.len());
        self.nodes.push(node);
    }

    fn reindex(&mut self) {
        self.index = self
            .nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (n.id.clone(), i))
            .collect();
    }

    fn node_mut(&mut self, id: &str) -> Result<&mut Node, TreeError> {
        let idx = *self
            .index
            .get(id)
            .ok_or_else(|| TreeError::UnknownNode(id.to_string()))?;
        Ok(&mut self.nodes[idx])
    }

    pub fn get(&self, id: &str) -> Option<&Node> {
        self.index.get(id).map(|&i| &self.nodes[i])
    }

    pub fn node(&self, id: &str) -> Result<&Node, TreeError> {
        self.get(id).ok_or_else(|| TreeError::UnknownNode(id.to_string()))
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    // ---------------------------------------------------------------------
    // CONSULTAS ESTRUCTURALES
    // ---------------------------------------------------------------------

    /// Hijos directos en orden de inserción.
    pub fn children(&self, id: &str) -> Vec<&Node> {
        self.nodes
            .iter()
            .filter(|n| n.parent.as_deref() == Some(id))
            .collect()
    }

    /// Hijos agrupados por tipo de fichero; dentro de cada grupo se respeta
    /// el orden de inserción.
    pub fn children_grouped(&self, id: &str) -> Vec<&Node> {
        let mut children = self.children(id);
        children.sort_by_key(|n| n.file_kind);
        children
    }

    pub fn projects(&self) -> Vec<&Node> {
        self.children(ROOT_ID)
    }

    /// Cadena de ancestros desde la raíz hasta `id`, ambos incluidos.
    pub fn ancestor_chain(&self, id: &str) -> Result<Vec<&Node>, TreeError> {
        let mut current = self.node(id)?;
        let mut chain = vec![current];
        while let Some(parent) = current.parent.as_deref() {
            if chain.len() > self.nodes.len() {
                return Err(TreeError::Corrupted(id.to_string()));
            }
            current = self.node(parent)?;
            chain.push(current);
        }
        chain.reverse();
        Ok(chain)
    }

    /// Proyecto que contiene a `id` (primer ancestro distinto de la raíz).
    pub fn project_of(&self, id: &str) -> Result<&Node, TreeError> {
        self.ancestor_chain(id)?
            .get(1)
            .copied()
            .ok_or_else(|| TreeError::Detached(id.to_string()))
    }

    /// Número de aristas hasta la raíz.
    pub fn depth(&self, id: &str) -> Result<usize, TreeError> {
        Ok(self.ancestor_chain(id)?.len() - 1)
    }

    /// Todos los nodos alcanzables desde `id` (excluido), en preorden.
    pub fn descendants(&self, id: &str) -> Result<Vec<&Node>, TreeError> {
        self.node(id)?;
        let mut out = Vec::new();
        let mut stack: Vec<&Node> = self.children(id).into_iter().rev().collect();
        while let Some(node) = stack.pop() {
            if out.len() > self.nodes.len() {
                return Err(TreeError::Corrupted(id.to_string()));
            }
            out.push(node);
            stack.extend(self.children(&node.id).into_iter().rev());
        }
        Ok(out)
    }

    /// Niveles de carpeta que ocupa `id` contando su cadena de subcarpetas más profunda.
    fn folder_height(&self, id: &str) -> usize {
        match self.get(id) {
            Some(node) if node.is_folder => {
                1 + self
                    .children(id)
                    .iter()
                    .map(|c| self.folder_height(&c.id))
                    .max()
                    .unwrap_or(0)
            }
            _ => 0,
        }
    }

    /// Ids remotos de todos los documentos en `ids` y sus subárboles, sin duplicados.
    pub fn documents_under(&self, ids: &[String]) -> Result<Vec<String>, TreeError> {
        let mut seen = HashSet::new();
        let mut docs = Vec::new();
        for id in ids {
            let node = self.node(id)?;
            for n in std::iter::once(node).chain(self.descendants(id)?) {
                if let Some(doc) = &n.remote_doc_id {
                    if seen.insert(doc.clone()) {
                        docs.push(doc.clone());
                    }
                }
            }
        }
        Ok(docs)
    }

    // ---------------------------------------------------------------------
    // RUTAS REMOTAS
    // ---------------------------------------------------------------------

    /// Ruta remota de un nodo: etiquetas por debajo del proyecto unidas con `/`.
    pub fn remote_path(&self, id: &str) -> Result<String, TreeError> {
        self.path_with(id, &HashMap::new(), None)
    }

    /// Ruta remota aplicando un reparentado y/o renombrado hipotéticos.
    fn path_with(
        &self,
        id: &str,
        reparent: &HashMap<&str, &str>,
        relabel: Option<(&str, &str)>,
    ) -> Result<String, TreeError> {
        let mut segments = Vec::new();
        let mut current = self.node(id)?;
        while !current.is_project() {
            if current.is_root() || segments.len() > self.nodes.len() {
                return Err(TreeError::Detached(id.to_string()));
            }
            let label = match relabel {
                Some((target, name)) if target == current.id => name,
                _ => current.label.as_str(),
            };
            segments.push(label);
            let parent = reparent
                .get(current.id.as_str())
                .copied()
                .or(current.parent.as_deref())
                .ok_or_else(|| TreeError::Corrupted(current.id.clone()))?;
            current = self.node(parent)?;
        }
        segments.reverse();
        Ok(segments.join("/"))
    }

    /// Nuevas rutas de todos los documentos afectados por mover o renombrar `roots`.
    fn path_updates(
        &self,
        roots: &[String],
        reparent: &HashMap<&str, &str>,
        relabel: Option<(&str, &str)>,
    ) -> Result<Vec<PathUpdate>, TreeError> {
        let mut seen = HashSet::new();
        let mut updates = Vec::new();
        for root in roots {
            let node = self.node(root)?;
            for n in std::iter::once(node).chain(self.descendants(root)?) {
                let Some(doc) = &n.remote_doc_id else { continue };
                if seen.insert(doc.as_str()) {
                    updates.push(PathUpdate {
                        id: doc.clone(),
                        path: self.path_with(&n.id, reparent, relabel)?,
                    });
                }
            }
        }
        Ok(updates)
    }

    // ---------------------------------------------------------------------
    // MUTACIONES LOCALES
    // ---------------------------------------------------------------------

    /// Normaliza el nombre de una carpeta o fichero: sin espacios en los
    /// extremos, no vacío y sin `/`. Toda etiqueta y todo segmento de ruta
    /// remota pasa por aquí.
    pub fn clean_name(name: &str) -> Result<String, TreeError> {
        let name = name.trim();
        if name.is_empty() || name.contains('/') {
            return Err(TreeError::InvalidName(name.to_string()));
        }
        Ok(name.to_string())
    }

    fn check_editable(node: &Node) -> Result<(), TreeError> {
        if node.is_root() || node.is_project() {
            return Err(TreeError::ReadOnly(node.id.clone()));
        }
        Ok(())
    }

    /// Crea una carpeta vacía. No se comprueban nombres duplicados entre hermanos.
    /// Las carpetas sólo existen en local hasta que contienen documentos.
    pub fn create_folder(&mut self, parent: &str, name: &str) -> Result<Node, TreeError> {
        let name = Self::clean_name(name)?;
        let parent_node = self.node(parent)?;
        if !parent_node.is_folder {
            return Err(TreeError::NotAFolder(parent.to_string()));
        }
        self.project_of(parent)?;
        let depth = self.depth(parent)? + 1;
        if depth > self.max_depth {
            return Err(TreeError::DepthExceeded {
                node: name,
                depth,
                max: self.max_depth,
            });
        }

        let folder = Node::folder(parent, &name);
        debug!("Carpeta '{}' creada en {parent}", folder.label);
        self.insert(folder.clone());
        Ok(folder)
    }

    /// Comprueba que una cadena de `levels` subcarpetas cabe bajo `parent`.
    pub fn check_folder_depth(&self, parent: &str, levels: usize) -> Result<(), TreeError> {
        let depth = self.depth(parent)? + levels;
        if depth > self.max_depth {
            return Err(TreeError::DepthExceeded {
                node: parent.to_string(),
                depth,
                max: self.max_depth,
            });
        }
        Ok(())
    }

    /// Devuelve la carpeta al final de `segments` bajo `parent`, reutilizando
    /// la primera carpeta hermana con el mismo nombre o creándola.
    pub fn ensure_folder_path(&mut self, parent: &str, segments: &[String]) -> Result<String, TreeError> {
        self.check_folder_depth(parent, segments.len())?;
        self.ensure_folders_unchecked(parent, segments)
    }

    fn ensure_folders_unchecked(&mut self, parent: &str, segments: &[String]) -> Result<String, TreeError> {
        let mut current = parent.to_string();
        for segment in segments {
            let segment = Self::clean_name(segment)?;
            let existing = self
                .children(&current)
                .into_iter()
                .find(|c| c.is_folder && c.label == segment)
                .map(|c| c.id.clone());
            current = match existing {
                Some(id) => id,
                None => {
                    let folder = Node::folder(&current, &segment);
                    let id = folder.id.clone();
                    self.insert(folder);
                    id
                }
            };
        }
        Ok(current)
    }

    /// Inserta los ficheros recién subidos, emparejados por posición con los
    /// ids devueltos por el servicio. Una diferencia de longitudes es un error
    /// de integridad y no inserta nada.
    pub fn add_files(
        &mut self,
        parent: &str,
        file_names: &[String],
        remote_ids: &[String],
    ) -> Result<Vec<Node>, TreeError> {
        if file_names.len() != remote_ids.len() {
            error!(
                "Subida inconsistente en {parent}: {} ficheros, {} ids",
                file_names.len(),
                remote_ids.len()
            );
            return Err(TreeError::UploadMismatch {
                files: file_names.len(),
                ids: remote_ids.len(),
            });
        }
        let file_names = file_names
            .iter()
            .map(|n| Self::clean_name(n))
            .collect::<Result<Vec<_>, _>>()?;
        let parent_node = self.node(parent)?;
        if !parent_node.is_folder {
            return Err(TreeError::NotAFolder(parent.to_string()));
        }
        let project_id = self
            .project_of(parent)?
            .remote_project_id
            .clone()
            .ok_or_else(|| TreeError::Detached(parent.to_string()))?;

        let inserted: Vec<Node> = file_names
            .iter()
            .zip(remote_ids)
            .map(|(name, doc)| Node::document(parent, name, &project_id, doc))
            .collect();
        for node in &inserted {
            self.insert(node.clone());
        }
        Ok(inserted)
    }

    fn remove_subtree(&mut self, ids: &[String]) -> Result<Vec<Node>, TreeError> {
        let mut doomed: HashSet<String> = HashSet::new();
        for id in ids {
            doomed.insert(id.clone());
            doomed.extend(self.descendants(id)?.into_iter().map(|n| n.id.clone()));
        }
        let (removed, kept): (Vec<Node>, Vec<Node>) = std::mem::take(&mut self.nodes)
            .into_iter()
            .partition(|n| doomed.contains(&n.id));
        self.nodes = kept;
        self.reindex();
        Ok(removed)
    }

    /// Quita del árbol un proyecto ya borrado en remoto.
    pub fn remove_project(&mut self, id: &str) -> Result<Vec<Node>, TreeError> {
        if !self.node(id)?.is_project() {
            return Err(TreeError::NotAFolder(id.to_string()));
        }
        self.remove_subtree(&[id.to_string()])
    }

    /// Sustituye el subárbol de un proyecto a partir del listado remoto de su
    /// base de conocimiento. Las carpetas se derivan de la ruta de cada entrada.
    pub fn load_project(&mut self, project: &RemoteProject, entries: &[KbEntry]) -> Result<(), TreeError> {
        let project_id = project_node_id(&project.id);
        if self.get(&project_id).is_some() {
            self.remove_subtree(&[project_id.clone()])?;
        }

        self.insert(Node::project(project));

        for entry in entries {
            let doc_node_id = format!("doc:{}", entry.id);
            if self.get(&doc_node_id).is_some() {
                warn!("Documento {} duplicado en el listado de {}", entry.id, project.id);
                continue;
            }
            let segments: Vec<String> = entry
                .path
                .as_deref()
                .map(|p| {
                    let mut parts: Vec<String> = p
                        .split('/')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(str::to_string)
                        .collect();
                    parts.pop();
                    parts
                })
                .unwrap_or_default();
            let parent = self.ensure_folders_unchecked(&project_id, &segments)?;
            self.insert(Node::document(&parent, &entry.file_name, &project.id, &entry.id));
        }

        debug!("Proyecto {} cargado con {} documentos", project.id, entries.len());
        Ok(())
    }

    // ---------------------------------------------------------------------
    // MUTACIONES RESPALDADAS EN REMOTO
    // ---------------------------------------------------------------------

    /// Mueve `ids` a la carpeta `destination`. Un único fichero usa la
    /// actualización de ruta individual; carpetas y selecciones múltiples
    /// usan una sola actualización en bloque con todos los documentos afectados.
    pub async fn move_nodes(
        &mut self,
        ids: &[String],
        destination: &str,
        docs: &dyn DocumentService,
    ) -> Result<Mutation, TreeError> {
        let dest = self.node(destination)?;
        if !dest.is_folder {
            return Err(TreeError::NotAFolder(destination.to_string()));
        }
        let dest_project = self.project_of(destination)?.id.clone();
        let dest_chain: HashSet<String> = self
            .ancestor_chain(destination)?
            .into_iter()
            .map(|n| n.id.clone())
            .collect();
        let dest_depth = dest_chain.len() - 1;

        let mut moved: Vec<String> = Vec::new();
        for id in ids {
            let node = self.node(id)?;
            Self::check_editable(node)?;
            if dest_chain.contains(id) {
                return Err(TreeError::CyclicMove {
                    node: id.clone(),
                    destination: destination.to_string(),
                });
            }
            if self.project_of(id)?.id != dest_project {
                return Err(TreeError::CrossProject {
                    node: id.clone(),
                    destination: destination.to_string(),
                });
            }
            if node.is_folder {
                let depth = dest_depth + self.folder_height(id);
                if depth > self.max_depth {
                    return Err(TreeError::DepthExceeded {
                        node: id.clone(),
                        depth,
                        max: self.max_depth,
                    });
                }
            }
            if !moved.contains(id) {
                moved.push(id.clone());
            }
        }
        if moved.is_empty() {
            return Ok(Mutation::Applied);
        }

        let reparent: HashMap<&str, &str> = moved.iter().map(|id| (id.as_str(), destination)).collect();
        let updates = self.path_updates(&moved, &reparent, None)?;
        let single_file = moved.len() == 1 && !self.node(&moved[0])?.is_folder;

        let result = match updates.as_slice() {
            [] => Ok(()),
            [update] if single_file => docs.update_document_path(update).await,
            _ => docs.update_document_paths(&updates).await,
        };
        if let Err(err) = result {
            error!("Error moviendo {} nodos a {destination}: {err}", moved.len());
            return Ok(Mutation::Rejected(err));
        }

        for id in &moved {
            self.node_mut(id)?.parent = Some(destination.to_string());
        }
        info!(
            "Movidos {} nodos a {destination} ({} rutas actualizadas)",
            moved.len(),
            updates.len()
        );
        Ok(Mutation::Applied)
    }

    /// Renombra una carpeta o un fichero, actualizando antes las rutas remotas
    /// de todos los documentos que cuelgan de él.
    pub async fn rename_node(
        &mut self,
        id: &str,
        name: &str,
        docs: &dyn DocumentService,
    ) -> Result<Mutation, TreeError> {
        let name = Self::clean_name(name)?;
        let node = self.node(id)?;
        Self::check_editable(node)?;
        let is_folder = node.is_folder;

        let roots = [id.to_string()];
        let updates = self.path_updates(&roots, &HashMap::new(), Some((id, name.as_str())))?;
        let result = match updates.as_slice() {
            [] => Ok(()),
            [update] if !is_folder => docs.update_document_path(update).await,
            _ => docs.update_document_paths(&updates).await,
        };
        if let Err(err) = result {
            error!("Error renombrando {id} a '{name}': {err}");
            return Ok(Mutation::Rejected(err));
        }

        let node = self.node_mut(id)?;
        if !node.is_folder {
            node.file_kind = FileKind::from_name(&name);
        }
        node.label = name;
        Ok(Mutation::Applied)
    }

    /// Borra los nodos y sus subárboles con una única llamada remota: el
    /// borrado individual para un único fichero, el borrado en bloque para
    /// carpetas y selecciones múltiples. Sin documentos afectados (carpetas
    /// vacías) no hay llamada remota.
    pub async fn delete_nodes(
        &mut self,
        ids: &[String],
        docs: &dyn DocumentService,
    ) -> Result<Mutation, TreeError> {
        for id in ids {
            Self::check_editable(self.node(id)?)?;
        }
        let doc_ids = self.documents_under(ids)?;

        let single_file = match ids {
            [id] => !self.node(id)?.is_folder,
            _ => false,
        };

        let result = match doc_ids.as_slice() {
            [] => Ok(()),
            [doc] if single_file => docs.delete_document(doc).await,
            _ => docs.delete_documents(&doc_ids).await,
        };
        if let Err(err) = result {
            error!("Error borrando {} documentos: {err}", doc_ids.len());
            return Ok(Mutation::Rejected(err));
        }

        let removed = self.remove_subtree(ids)?;
        info!(
            "Borrados {} nodos ({} documentos remotos)",
            removed.len(),
            doc_ids.len()
        );
        Ok(Mutation::Applied)
    }

    // ---------------------------------------------------------------------
    // INVARIANTES
    // ---------------------------------------------------------------------

    /// Comprueba las invariantes estructurales de toda la colección.
    pub fn validate(&self) -> Result<(), TreeError> {
        let roots = self.nodes.iter().filter(|n| n.parent.is_none()).count();
        if roots != 1 || self.get(ROOT_ID).map_or(true, |r| !r.is_root()) {
            return Err(TreeError::Corrupted(ROOT_ID.to_string()));
        }
        if self.index.len() != self.nodes.len() {
            return Err(TreeError::Corrupted("index".to_string()));
        }
        for node in &self.nodes {
            if let Some(parent) = node.parent.as_deref() {
                if !self.node(parent)?.is_folder {
                    return Err(TreeError::NotAFolder(parent.to_string()));
                }
            }
            if node.is_folder && node.remote_doc_id.is_some() {
                return Err(TreeError::Corrupted(node.id.clone()));
            }
            self.ancestor_chain(&node.id)?;
        }
        Ok(())
    }
}
