use crate::errors::ProviderError;
use bsa_domain::BlockListType;
use std::io::Read;

/// Lista descargada cuyo cuerpo se consume en streaming.
pub struct LazyBlockList {
  block_list: BlockListType,
  checksum: Option<String>,
  body: Box<dyn Read + Send>,
}

impl LazyBlockList {
  pub fn new(block_list: BlockListType, checksum: Option<String>, body: Box<dyn Read + Send>) -> Self {
    Self { block_list, checksum, body }
  }

  pub fn block_list(&self) -> BlockListType {
    self.block_list
  }

  /// Checksum que publica la autoridad para esta lista, si lo publica.
  pub fn peek_checksum(&self) -> Option<&str> {
    self.checksum.as_deref()
  }

  pub fn reader(&mut self) -> &mut (dyn Read + Send + 'static) {
    &mut *self.body
  }
}

impl std::fmt::Debug for LazyBlockList {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("LazyBlockList")
     .field("block_list", &self.block_list)
     .field("checksum", &self.checksum)
     .finish()
  }
}

/// Fuente de las listas de bloqueo publicadas por la autoridad.
pub trait BlockListFetcher: Send + Sync {
  fn fetch(&self, block_list: BlockListType) -> Result<LazyBlockList, ProviderError>;
}
