// Archivo: fs.rs
// Propósito: colaboradores respaldados por directorios locales. El fetcher
// lee las listas que otro proceso deja en un directorio y el sender deja
// cada reporte en un directorio de spool para que otro proceso lo suba.
use crate::errors::ProviderError;
use crate::fetcher::{BlockListFetcher, LazyBlockList};
use crate::report::ReportSender;
use bsa_domain::BlockListType;
use chrono::Utc;
use log::info;
use std::fs::{self, File};
use std::io::{BufReader, ErrorKind};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

/// Lee `<dir>/BLOCK.csv` y `<dir>/BLOCK_PLUS.csv`. Si existe
/// `<dir>/<LISTA>.checksum` su contenido es el checksum publicado.
#[derive(Debug, Clone)]
pub struct DirectoryBlockListFetcher {
  dir: PathBuf,
}

impl DirectoryBlockListFetcher {
  pub fn new(dir: impl Into<PathBuf>) -> Self {
    Self { dir: dir.into() }
  }

  fn read_checksum(&self, block_list: BlockListType) -> Result<Option<String>, ProviderError> {
    let path = self.dir.join(format!("{}.checksum", block_list.as_str()));
    match fs::read_to_string(&path) {
      Ok(s) => Ok(Some(s.trim().to_string()).filter(|s| !s.is_empty())),
      Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
      Err(e) => Err(e.into()),
    }
  }
}

impl BlockListFetcher for DirectoryBlockListFetcher {
  fn fetch(&self, block_list: BlockListType) -> Result<LazyBlockList, ProviderError> {
    let path = self.dir.join(block_list.file_name());
    let file = File::open(&path).map_err(|e| ProviderError::retriable(format!("{}: {}", path.display(), e)))?;
    let checksum = self.read_checksum(block_list)?;
    Ok(LazyBlockList::new(block_list, checksum, Box::new(BufReader::new(file))))
  }
}

/// Deja cada reporte como un archivo JSON en `dir`.
#[derive(Debug)]
pub struct SpoolReportSender {
  dir: PathBuf,
  seq: AtomicU64,
}

impl SpoolReportSender {
  pub fn new(dir: impl Into<PathBuf>) -> Self {
    Self { dir: dir.into(), seq: AtomicU64::new(0) }
  }

  fn spool(&self, kind: &str, report: &str) -> Result<(), ProviderError> {
    fs::create_dir_all(&self.dir)?;
    let name = format!("{}-{}-{:04}.json",
                       kind,
                       Utc::now().format("%Y%m%dt%H%M%S%.3fz"),
                       self.seq.fetch_add(1, Ordering::SeqCst));
    let tmp = self.dir.join(format!(".{}.tmp", name));
    fs::write(&tmp, report)?;
    fs::rename(&tmp, self.dir.join(&name))?;
    info!("Reporte {} en spool: {}", kind, name);
    Ok(())
  }
}

impl ReportSender for SpoolReportSender {
  fn send_order_status_report(&self, report: &str) -> Result<(), ProviderError> {
    self.spool("order_status", report)
  }

  fn add_unblockable_domains(&self, report: &str) -> Result<(), ProviderError> {
    self.spool("unblockable_domains", report)
  }
}
