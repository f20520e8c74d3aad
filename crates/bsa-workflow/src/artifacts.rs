// Archivo: artifacts.rs
// Propósito: lectura y escritura de los artefactos de un job en el
// `SnapshotStore`: listas crudas (con su checksum), diffs y dominios no
// bloqueables, una entrada por línea.
use crate::errors::WorkflowError;
use bsa_domain::{BlockListLines, BlockListType, DomainError, Line};
use bsa_providers::LazyBlockList;
use flow::domain::ArtifactKind;
use flow::repository::SnapshotStore;
use sha2::{Digest, Sha256};
use std::fmt::Display;
use std::io::{self, BufRead, BufReader, Write};
use std::marker::PhantomData;
use std::str::FromStr;

/// Escribe `items` como un artefacto de texto, uno por línea. Devuelve la
/// cantidad escrita. El artefacto sólo se publica si todo se escribió.
pub fn write_records<I, T>(store: &dyn SnapshotStore, job_name: &str, kind: ArtifactKind, items: I)
                           -> Result<usize, WorkflowError>
  where I: IntoIterator<Item = T>,
        T: Display
{
  let mut writer = store.create(job_name, kind)?;
  let mut count = 0;
  for item in items {
    writeln!(writer, "{}", item)?;
    count += 1;
  }
  writer.flush()?;
  writer.commit()?;
  Ok(count)
}

/// Guarda un documento completo (p. ej. un reporte JSON) como artefacto.
pub fn write_document(store: &dyn SnapshotStore, job_name: &str, kind: ArtifactKind, text: &str)
                      -> Result<(), WorkflowError> {
  let mut writer = store.create(job_name, kind)?;
  writer.write_all(text.as_bytes())?;
  writer.flush()?;
  writer.commit()?;
  Ok(())
}

/// Iterador perezoso sobre un artefacto de registros.
pub struct Records<T> {
  lines: io::Lines<BufReader<Box<dyn io::Read + Send>>>,
  _marker: PhantomData<T>,
}

impl<T> Iterator for Records<T>
  where T: FromStr<Err = DomainError>
{
  type Item = Result<T, WorkflowError>;

  fn next(&mut self) -> Option<Self::Item> {
    loop {
      let line = match self.lines.next()? {
        Ok(l) => l,
        Err(e) => return Some(Err(e.into())),
      };
      if line.trim().is_empty() {
        continue;
      }
      return Some(line.parse::<T>().map_err(WorkflowError::from));
    }
  }
}

pub fn read_records<T>(store: &dyn SnapshotStore, job_name: &str, kind: ArtifactKind)
                       -> Result<Records<T>, WorkflowError>
  where T: FromStr<Err = DomainError>
{
  let reader = store.open(job_name, kind)?;
  Ok(Records { lines: BufReader::new(reader).lines(), _marker: PhantomData })
}

/// Líneas de las dos listas de un job, `BLOCK` primero.
pub fn read_block_lists(store: &dyn SnapshotStore, job_name: &str)
                        -> Result<impl Iterator<Item = Result<Line, DomainError>>, WorkflowError> {
  let mut lists = Vec::with_capacity(BlockListType::ALL.len());
  for list in BlockListType::ALL {
    let reader = store.open(job_name, ArtifactKind::BlockList(list))?;
    lists.push(BlockListLines::new(BufReader::new(reader)));
  }
  Ok(lists.into_iter().flatten())
}

/// `Write` que calcula sha256 de todo lo que pasa por él.
struct HashingWriter<W> {
  inner: W,
  hasher: Sha256,
}

impl<W: Write> Write for HashingWriter<W> {
  fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
    let n = self.inner.write(buf)?;
    self.hasher.update(&buf[..n]);
    Ok(n)
  }

  fn flush(&mut self) -> io::Result<()> {
    self.inner.flush()
  }
}

/// Copia el cuerpo de la lista al store y devuelve su checksum (sha256 en
/// hex minúsculas).
pub fn save_and_checksum(store: &dyn SnapshotStore, job_name: &str, list: &mut LazyBlockList)
                         -> Result<String, WorkflowError> {
  let writer = store.create(job_name, ArtifactKind::BlockList(list.block_list()))?;
  let mut hashing = HashingWriter { inner: writer, hasher: Sha256::new() };
  io::copy(list.reader(), &mut hashing)?;
  hashing.flush()?;
  let HashingWriter { inner, hasher } = hashing;
  inner.commit()?;
  Ok(format!("{:x}", hasher.finalize()))
}
