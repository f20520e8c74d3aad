// Archivo: domain.rs
// Propósito: tipos de dominio de la capa de jobs: el registro de job, sus
// stages, checksums y los artefactos que cada job guarda en el store.
use crate::errors::FlowError;
use bsa_domain::BlockListType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Etapas del pipeline de descarga, en orden de avance.
///
/// Los stages antes de `Done` son "en vuelo"; `Done`, `Nop` y
/// `ChecksumsNotMatch` son terminales. El orden del enum es el orden del
/// pipeline y se usa para verificar que los stages sólo avanzan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DownloadStage {
    Download,
    MakeDiff,
    ApplyDiff,
    StartUploading,
    UploadDomainsInUse,
    FinishUploading,
    Done,
    Nop,
    ChecksumsNotMatch,
}

impl DownloadStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            DownloadStage::Download => "DOWNLOAD",
            DownloadStage::MakeDiff => "MAKE_DIFF",
            DownloadStage::ApplyDiff => "APPLY_DIFF",
            DownloadStage::StartUploading => "START_UPLOADING",
            DownloadStage::UploadDomainsInUse => "UPLOAD_DOMAINS_IN_USE",
            DownloadStage::FinishUploading => "FINISH_UPLOADING",
            DownloadStage::Done => "DONE",
            DownloadStage::Nop => "NOP",
            DownloadStage::ChecksumsNotMatch => "CHECKSUMS_NOT_MATCH",
        }
    }

    /// `true` si el job ya no avanza.
    pub fn is_terminal(&self) -> bool {
        matches!(self, DownloadStage::Done | DownloadStage::Nop | DownloadStage::ChecksumsNotMatch)
    }
}

impl fmt::Display for DownloadStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DownloadStage {
    type Err = FlowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let stage = match s.trim() {
            "DOWNLOAD" => DownloadStage::Download,
            "MAKE_DIFF" => DownloadStage::MakeDiff,
            "APPLY_DIFF" => DownloadStage::ApplyDiff,
            "START_UPLOADING" => DownloadStage::StartUploading,
            "UPLOAD_DOMAINS_IN_USE" => DownloadStage::UploadDomainsInUse,
            "FINISH_UPLOADING" => DownloadStage::FinishUploading,
            "DONE" => DownloadStage::Done,
            "NOP" => DownloadStage::Nop,
            "CHECKSUMS_NOT_MATCH" => DownloadStage::ChecksumsNotMatch,
            other => return Err(FlowError::Other(format!("stage desconocido: {}", other))),
        };
        Ok(stage)
    }
}

/// Checksum (sha256 hex) de cada lista descargada.
pub type Checksums = BTreeMap<BlockListType, String>;

/// Serializa checksums como `BLOCK=<hex>,BLOCK_PLUS=<hex>`.
pub fn checksums_to_string(checksums: &Checksums) -> String {
    checksums.iter()
             .map(|(k, v)| format!("{}={}", k, v))
             .collect::<Vec<_>>()
             .join(",")
}

/// Inverso de [`checksums_to_string`]. La cadena vacía produce un mapa vacío.
pub fn parse_checksums(text: &str) -> Result<Checksums, FlowError> {
    let mut out = Checksums::new();
    for entry in text.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let (k, v) = entry.split_once('=')
                          .ok_or_else(|| FlowError::Other(format!("checksum mal formado: {}", entry)))?;
        let list = k.parse::<BlockListType>().map_err(|e| FlowError::Other(e.to_string()))?;
        out.insert(list, v.trim().to_string());
    }
    Ok(out)
}

/// Formato del nombre de job: derivado de la hora de creación, en
/// minúsculas y apto como nombre de carpeta.
pub const JOB_NAME_FORMAT: &str = "%Y-%m-%dt%H%M%S%.3fz";

pub fn job_name_for(creation_time: &DateTime<Utc>) -> String {
    creation_time.format(JOB_NAME_FORMAT).to_string()
}

/// Registro persistente de una ejecución del pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadJob {
    pub job_id: i64,
    pub creation_time: DateTime<Utc>,
    pub update_time: DateTime<Utc>,
    pub stage: DownloadStage,
    pub checksums: Checksums,
}

impl DownloadJob {
    pub fn job_name(&self) -> String {
        job_name_for(&self.creation_time)
    }
}

/// Job terminado en `Done` contra el que se compara la siguiente descarga.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletedJob {
    pub job_id: i64,
    pub job_name: String,
    pub checksums: Checksums,
}

impl From<&DownloadJob> for CompletedJob {
    fn from(job: &DownloadJob) -> Self {
        CompletedJob { job_id: job.job_id,
                       job_name: job.job_name(),
                       checksums: job.checksums.clone() }
    }
}

/// Resultado de un cambio de stage con control optimista.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistResult {
    Ok { job: DownloadJob },
    Conflict { actual: DownloadStage },
}

/// Artefactos que un job guarda en su carpeta del store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    BlockList(BlockListType),
    LabelDiffs,
    OrderDiffs,
    NonBlockedDomains,
    InProgressOrdersReport,
    UnblockableDomainsReport,
    CompletedOrdersReport,
}

impl ArtifactKind {
    pub fn file_name(&self) -> String {
        match self {
            ArtifactKind::BlockList(list) => list.file_name(),
            ArtifactKind::LabelDiffs => "labels_diff.csv".into(),
            ArtifactKind::OrderDiffs => "orders_diff.csv".into(),
            ArtifactKind::NonBlockedDomains => "domains_in_use.csv".into(),
            ArtifactKind::InProgressOrdersReport => "in_progress_orders.json".into(),
            ArtifactKind::UnblockableDomainsReport => "unblockable_domains.json".into(),
            ArtifactKind::CompletedOrdersReport => "completed_orders.json".into(),
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.file_name())
    }
}

/// Token opaco que identifica un lease adquirido sobre el lock distribuido.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LeaseToken(pub String);

impl LeaseToken {
    pub fn generate() -> Self {
        LeaseToken(uuid::Uuid::new_v4().to_string())
    }
}

impl fmt::Display for LeaseToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
