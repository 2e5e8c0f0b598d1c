//! Acciones del usuario y política de acciones permitidas según la forma de
//! la selección.

use serde::{Deserialize, Serialize};

use crate::models::Node;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Action {
    Open,
    Edit,
    Download,
    Launch,
    Delete,
    Rename,
    CreateFolder,
    UploadFile,
    UploadFolder,
    ShowDetails,
    DragDropComplete,
}

/// Forma de la selección actual, lo único que decide el menú de acciones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum SelectionShape {
    Empty,
    SingleFile,
    SingleFolder,
    SingleProject,
    Multiple { any_folder: bool, any_project: bool },
}

impl SelectionShape {
    pub fn of(selection: &[&Node]) -> Self {
        match selection {
            [] => Self::Empty,
            [node] if node.is_project() => Self::SingleProject,
            [node] if node.is_folder => Self::SingleFolder,
            [_] => Self::SingleFile,
            many => Self::Multiple {
                any_folder: many.iter().any(|n| n.is_folder && !n.is_project()),
                any_project: many.iter().any(|n| n.is_project()),
            },
        }
    }
}

/// Acciones que ofrece el menú contextual para una forma de selección.
/// Soltar tras arrastrar no pasa por el menú y se valida aparte.
pub fn allowed_actions(shape: SelectionShape) -> Vec<Action> {
    use Action::*;

    match shape {
        SelectionShape::Empty => vec![CreateFolder, UploadFile, UploadFolder],
        SelectionShape::SingleFolder => {
            vec![Open, CreateFolder, UploadFile, UploadFolder, Rename, Delete]
        }
        SelectionShape::SingleProject => vec![Open, Launch, Edit, ShowDetails, Delete],
        SelectionShape::SingleFile => vec![Open, Download, Delete],
        SelectionShape::Multiple { any_project: true, .. } => vec![],
        SelectionShape::Multiple { any_folder: true, .. } => vec![Delete],
        SelectionShape::Multiple { .. } => vec![Download, Delete],
    }
}

pub fn is_allowed(action: Action, shape: SelectionShape) -> bool {
    match action {
        Action::DragDropComplete => {
            !matches!(shape, SelectionShape::Empty | SelectionShape::SingleProject)
                && !matches!(shape, SelectionShape::Multiple { any_project: true, .. })
        }
        _ => allowed_actions(shape).contains(&action),
    }
}
