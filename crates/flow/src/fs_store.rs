// Archivo: fs_store.rs
// Propósito: `SnapshotStore` sobre el sistema de archivos. Cada job es una
// carpeta bajo `root`; los artefactos se escriben en un archivo temporal y
// se publican con `rename` al hacer commit.
use crate::domain::ArtifactKind;
use crate::errors::{FlowError, Result};
use crate::repository::{ArtifactWriter, SnapshotStore};
use log::{debug, warn};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct FileSnapshotStore {
    root: PathBuf,
}

impl FileSnapshotStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_of(&self, job_name: &str, artifact: ArtifactKind) -> PathBuf {
        self.root.join(job_name).join(artifact.file_name())
    }
}

/// Escritor de un artefacto. Si se descarta sin `commit` borra su archivo
/// temporal.
struct FileArtifactWriter {
    tmp_path: PathBuf,
    final_path: PathBuf,
    out: BufWriter<File>,
    committed: bool,
}

impl Write for FileArtifactWriter {
    fn write(&mut self, data: &[u8]) -> std::io::Result<usize> {
        self.out.write(data)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.out.flush()
    }
}

impl ArtifactWriter for FileArtifactWriter {
    fn commit(mut self: Box<Self>) -> Result<()> {
        self.out
            .flush()
            .map_err(|e| FlowError::Storage(format!("flush {}: {}", self.tmp_path.display(), e)))?;
        self.out.get_ref().sync_all()?;
        fs::rename(&self.tmp_path, &self.final_path)?;
        self.committed = true;
        Ok(())
    }
}

impl Drop for FileArtifactWriter {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        match fs::remove_file(&self.tmp_path) {
            Ok(()) => debug!("Artefacto descartado: {}", self.tmp_path.display()),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!("No se pudo borrar {}: {}", self.tmp_path.display(), e),
        }
    }
}

impl SnapshotStore for FileSnapshotStore {
    fn create(&self, job_name: &str, artifact: ArtifactKind) -> Result<Box<dyn ArtifactWriter>> {
        let final_path = self.path_of(job_name, artifact);
        let dir = self.root.join(job_name);
        fs::create_dir_all(&dir)?;
        let tmp_path = dir.join(format!(".{}.{}.tmp", artifact.file_name(), Uuid::new_v4()));
        let file = File::create(&tmp_path)?;
        Ok(Box::new(FileArtifactWriter { tmp_path, final_path, out: BufWriter::new(file), committed: false }))
    }

    fn open(&self, job_name: &str, artifact: ArtifactKind) -> Result<Box<dyn Read + Send>> {
        let path = self.path_of(job_name, artifact);
        match File::open(&path) {
            Ok(f) => Ok(Box::new(BufReader::new(f))),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(FlowError::NotFound(path.display().to_string())),
            Err(e) => Err(e.into()),
        }
    }

    fn exists(&self, job_name: &str, artifact: ArtifactKind) -> Result<bool> {
        Ok(self.path_of(job_name, artifact).is_file())
    }
}
