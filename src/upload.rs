//! Lectura de directorios locales para la subida de carpetas completas y para
//! el navegador de directorios del frontend.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{anyhow, Result};
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::models::{FileKind, LocalFile, LocalTreeNode};

/// Fichero encontrado en la carpeta, con las carpetas que lo contienen
/// relativas al padre de la raíz (la propia raíz incluida).
#[derive(Debug, Clone)]
pub struct ScannedFile {
    pub dirs: Vec<String>,
    pub file: LocalFile,
}

/// Resultado de recorrer una carpeta local.
#[derive(Debug, Default)]
pub struct FolderScan {
    pub files: Vec<ScannedFile>,
    pub files_scanned: u32,
    pub files_skipped: u32,
}

impl FolderScan {
    /// Profundidad de carpetas más honda que habrá que crear.
    pub fn folder_levels(&self) -> usize {
        self.files.iter().map(|f| f.dirs.len()).max().unwrap_or(0)
    }
}

impl std::fmt::Display for FolderScan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} ficheros escaneados, {} aptos para subir, {} omitidos",
            self.files_scanned,
            self.files.len(),
            self.files_skipped
        )
    }
}

/// Recorre `root` recursivamente y lee los ficheros PDF, CSV y XLSX. El resto
/// se omite. El orden es estable (por nombre) para que la correspondencia
/// posicional con los ids devueltos por la subida sea reproducible.
pub fn scan_folder(root: &Path) -> Result<FolderScan> {
    if !root.is_dir() {
        return Err(anyhow!("La ruta no es un directorio: {}", root.display()));
    }
    let root_name = root
        .file_name()
        .map(|s| s.to_string_lossy().to_string())
        .ok_or_else(|| anyhow!("La carpeta no tiene nombre: {}", root.display()))?;

    let mut scan = FolderScan::default();
    for entry in WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
    {
        scan.files_scanned += 1;
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().to_string();

        if !FileKind::from_name(&name).is_uploadable() {
            info!("Saltando fichero con extensión no soportada: {}", path.display());
            scan.files_skipped += 1;
            continue;
        }

        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("No se pudo leer {}: {e}. Saltando fichero.", path.display());
                scan.files_skipped += 1;
                continue;
            }
        };

        let mut dirs = vec![root_name.clone()];
        if let Some(parent) = path.parent().and_then(|p| p.strip_prefix(root).ok()) {
            dirs.extend(
                parent
                    .components()
                    .map(|c| c.as_os_str().to_string_lossy().to_string()),
            );
        }
        scan.files.push(ScannedFile {
            dirs,
            file: LocalFile::new(name, bytes),
        });
    }

    Ok(scan)
}

/// Lista un directorio (un nivel): primero subdirectorios, después ficheros
/// que se pueden subir, cada grupo ordenado por nombre.
pub fn list_local_directory(path: &Path) -> std::io::Result<LocalTreeNode> {
    let name = path
        .file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string_lossy().to_string());

    let mut entries: Vec<_> = fs::read_dir(path)?.filter_map(Result::ok).collect();
    entries.sort_by(|a, b| {
        let a_is_dir = a.file_type().map(|ft| ft.is_dir()).unwrap_or(false);
        let b_is_dir = b.file_type().map(|ft| ft.is_dir()).unwrap_or(false);
        b_is_dir.cmp(&a_is_dir).then_with(|| a.file_name().cmp(&b.file_name()))
    });

    let children = entries
        .into_iter()
        .filter_map(|entry| {
            let is_dir = entry.file_type().ok()?.is_dir();
            let name = entry.file_name().to_string_lossy().to_string();
            if !is_dir && !FileKind::from_name(&name).is_uploadable() {
                return None;
            }
            Some(LocalTreeNode {
                path: entry.path(),
                name,
                is_dir,
                children: Vec::new(),
            })
        })
        .collect();

    Ok(LocalTreeNode {
        path: PathBuf::from(path),
        name,
        is_dir: true,
        children,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("informes");
        fs::create_dir_all(root.join("2024")).unwrap();
        fs::write(root.join("resumen.pdf"), b"%PDF").unwrap();
        fs::write(root.join("notas.txt"), b"ignorar").unwrap();
        fs::write(root.join("2024").join("ventas.csv"), b"a,b").unwrap();
        dir
    }

    #[test]
    fn scan_keeps_relative_dirs_and_skips_unsupported() {
        let dir = fixture();
        let scan = scan_folder(&dir.path().join("informes")).unwrap();

        assert_eq!(scan.files_scanned, 3);
        assert_eq!(scan.files_skipped, 1);
        let found: Vec<_> = scan
            .files
            .iter()
            .map(|f| (f.dirs.join("/"), f.file.name.clone()))
            .collect();
        assert_eq!(
            found,
            [
                ("informes/2024".to_string(), "ventas.csv".to_string()),
                ("informes".to_string(), "resumen.pdf".to_string()),
            ]
        );
        assert_eq!(scan.folder_levels(), 2);
        assert_eq!(scan.files[1].file.content_type, "application/pdf");
    }

    #[test]
    fn scan_rejects_plain_files() {
        let dir = fixture();
        assert!(scan_folder(&dir.path().join("informes").join("resumen.pdf")).is_err());
    }

    #[test]
    fn listing_puts_directories_first() {
        let dir = fixture();
        let tree = list_local_directory(&dir.path().join("informes")).unwrap();
        let names: Vec<_> = tree.children.iter().map(|c| c.name.clone()).collect();
        assert_eq!(names, ["2024", "resumen.pdf"]);
    }
}
