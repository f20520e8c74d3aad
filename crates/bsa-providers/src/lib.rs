//! bsa-providers: colaboradores externos del pipeline
//!
//! Contratos para obtener las listas de bloqueo (`BlockListFetcher`) y para
//! enviar reportes a la autoridad (`ReportSender`), con implementaciones
//! sobre directorios locales y en memoria.
mod errors;
mod fetcher;
mod fs;
mod report;
pub mod stubs;

pub use errors::ProviderError;
pub use fetcher::{BlockListFetcher, LazyBlockList};
pub use fs::{DirectoryBlockListFetcher, SpoolReportSender};
pub use report::ReportSender;
