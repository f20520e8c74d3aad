// Archivo: stubs.rs
// Propósito: colaboradores en memoria para pruebas. Permiten encolar
// fallos para simular errores transitorios o permanentes.
use crate::errors::ProviderError;
use crate::fetcher::{BlockListFetcher, LazyBlockList};
use crate::report::ReportSender;
use bsa_domain::BlockListType;
use std::collections::{HashMap, VecDeque};
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

fn lock<T>(m: &Mutex<T>) -> Result<MutexGuard<'_, T>, ProviderError> {
  m.lock().map_err(|e| ProviderError::fatal(format!("mutex poisoned: {:?}", e)))
}

/// Fetcher que sirve listas desde memoria.
#[derive(Debug, Default)]
pub struct InMemoryBlockListFetcher {
  lists: Mutex<HashMap<BlockListType, (String, Option<String>)>>,
  failures: Mutex<VecDeque<ProviderError>>,
  calls: AtomicUsize,
}

impl InMemoryBlockListFetcher {
  pub fn new() -> Self {
    Self::default()
  }

  /// Publica el contenido de una lista y, opcionalmente, su checksum.
  pub fn publish(&self, block_list: BlockListType, body: &str, checksum: Option<&str>) -> Result<(), ProviderError> {
    lock(&self.lists)?.insert(block_list, (body.to_string(), checksum.map(str::to_string)));
    Ok(())
  }

  /// Las próximas llamadas a `fetch` fallarán con estos errores, en orden.
  pub fn fail_next(&self, errors: impl IntoIterator<Item = ProviderError>) -> Result<(), ProviderError> {
    lock(&self.failures)?.extend(errors);
    Ok(())
  }

  pub fn calls(&self) -> usize {
    self.calls.load(Ordering::SeqCst)
  }
}

impl BlockListFetcher for InMemoryBlockListFetcher {
  fn fetch(&self, block_list: BlockListType) -> Result<LazyBlockList, ProviderError> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    if let Some(e) = lock(&self.failures)?.pop_front() {
      return Err(e);
    }
    let lists = lock(&self.lists)?;
    let (body, checksum) = lists.get(&block_list)
                                .cloned()
                                .ok_or_else(|| ProviderError::retriable(format!("lista {} no publicada", block_list)))?;
    Ok(LazyBlockList::new(block_list, checksum, Box::new(Cursor::new(body.into_bytes()))))
  }
}

/// Sender que guarda los reportes recibidos.
#[derive(Debug, Default)]
pub struct RecordingReportSender {
  order_reports: Mutex<Vec<String>>,
  unblockable_reports: Mutex<Vec<String>>,
  failures: Mutex<VecDeque<ProviderError>>,
}

impl RecordingReportSender {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn fail_next(&self, errors: impl IntoIterator<Item = ProviderError>) -> Result<(), ProviderError> {
    lock(&self.failures)?.extend(errors);
    Ok(())
  }

  pub fn order_reports(&self) -> Vec<String> {
    self.order_reports.lock().unwrap_or_else(|e| e.into_inner()).clone()
  }

  pub fn unblockable_reports(&self) -> Vec<String> {
    self.unblockable_reports.lock().unwrap_or_else(|e| e.into_inner()).clone()
  }

  fn next_failure(&self) -> Result<(), ProviderError> {
    match lock(&self.failures)?.pop_front() {
      Some(e) => Err(e),
      None => Ok(()),
    }
  }
}

impl ReportSender for RecordingReportSender {
  fn send_order_status_report(&self, report: &str) -> Result<(), ProviderError> {
    self.next_failure()?;
    lock(&self.order_reports)?.push(report.to_string());
    Ok(())
  }

  fn add_unblockable_domains(&self, report: &str) -> Result<(), ProviderError> {
    self.next_failure()?;
    lock(&self.unblockable_reports)?.push(report.to_string());
    Ok(())
  }
}
