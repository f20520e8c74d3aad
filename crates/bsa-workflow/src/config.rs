// Archivo: config.rs
// Propósito: configuración del pipeline, con valores por defecto y carga
// desde variables de entorno (`.env` incluido).
use crate::errors::WorkflowError;
use crate::retry::RetryBackoff;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Cota superior para intervalos y lease (diez años).
pub const MAX_INTERVAL_SECS: i64 = 10 * 365 * 86_400;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadConfig {
  /// URL de la base del registro (`BSA_DB_URL` o `DATABASE_URL`).
  pub database_url: String,
  /// Raíz del store de artefactos por job.
  pub snapshot_dir: PathBuf,
  /// Carpeta de donde se leen `BLOCK.csv` y `BLOCK_PLUS.csv`.
  pub block_list_dir: PathBuf,
  /// Carpeta donde se dejan los reportes para la autoridad.
  pub report_spool_dir: PathBuf,
  /// TLDs inscritos en el programa de bloqueo (todos soportan la tabla LDH).
  pub enrolled_tlds: Vec<String>,
  pub label_txn_batch_size: usize,
  pub lock_lease_secs: u64,
  pub download_interval_secs: i64,
  pub max_nop_interval_secs: i64,
  pub retry_max_attempts: usize,
  pub retry_initial_delay_ms: u64,
  pub retry_max_delay_ms: u64,
  /// Atajo por checksums (`NOP` / `CHECKSUMS_NOT_MATCH`). Apagado mientras
  /// la autoridad no publique checksums.
  pub checksum_check_enabled: bool,
}

impl Default for DownloadConfig {
  fn default() -> Self {
    DownloadConfig { database_url: "bsa.db".into(),
                     snapshot_dir: PathBuf::from("var/bsa/snapshots"),
                     block_list_dir: PathBuf::from("var/bsa/block_lists"),
                     report_spool_dir: PathBuf::from("var/bsa/reports"),
                     enrolled_tlds: Vec::new(),
                     label_txn_batch_size: 500,
                     lock_lease_secs: 3600,
                     download_interval_secs: 1800,
                     max_nop_interval_secs: 86400,
                     retry_max_attempts: 5,
                     retry_initial_delay_ms: 500,
                     retry_max_delay_ms: 30_000,
                     checksum_check_enabled: false }
  }
}

impl DownloadConfig {
  /// Carga `.env` (si existe) y lee la configuración del entorno.
  pub fn from_env() -> Result<Self, WorkflowError> {
    dotenvy::dotenv().ok();
    Self::from_lookup(|key| std::env::var(key).ok())
  }

  /// Construye la configuración a partir de una función de consulta de
  /// claves. Las claves ausentes toman el valor por defecto.
  pub fn from_lookup<F>(lookup: F) -> Result<Self, WorkflowError>
    where F: Fn(&str) -> Option<String>
  {
    let d = DownloadConfig::default();
    let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
    let config =
      DownloadConfig { database_url: get("BSA_DB_URL").or_else(|| get("DATABASE_URL")).unwrap_or(d.database_url),
                       snapshot_dir: get("BSA_SNAPSHOT_DIR").map(PathBuf::from).unwrap_or(d.snapshot_dir),
                       block_list_dir: get("BSA_BLOCK_LIST_DIR").map(PathBuf::from).unwrap_or(d.block_list_dir),
                       report_spool_dir: get("BSA_REPORT_SPOOL_DIR").map(PathBuf::from).unwrap_or(d.report_spool_dir),
                       enrolled_tlds: get("BSA_ENROLLED_TLDS").map(|v| parse_tlds(&v)).unwrap_or(d.enrolled_tlds),
                       label_txn_batch_size: parse_key(&get, "BSA_LABEL_TXN_BATCH_SIZE", d.label_txn_batch_size)?,
                       lock_lease_secs: parse_key(&get, "BSA_LOCK_LEASE_SECS", d.lock_lease_secs)?,
                       download_interval_secs: parse_key(&get, "BSA_DOWNLOAD_INTERVAL_SECS", d.download_interval_secs)?,
                       max_nop_interval_secs: parse_key(&get, "BSA_MAX_NOP_INTERVAL_SECS", d.max_nop_interval_secs)?,
                       retry_max_attempts: parse_key(&get, "BSA_RETRY_MAX_ATTEMPTS", d.retry_max_attempts)?,
                       retry_initial_delay_ms: parse_key(&get, "BSA_RETRY_INITIAL_DELAY_MS", d.retry_initial_delay_ms)?,
                       retry_max_delay_ms: parse_key(&get, "BSA_RETRY_MAX_DELAY_MS", d.retry_max_delay_ms)?,
                       checksum_check_enabled: parse_key(&get, "BSA_CHECKSUM_CHECK_ENABLED", d.checksum_check_enabled)? };
    config.validate()?;
    Ok(config)
  }

  /// Verifica rangos que el tipo no garantiza.
  pub fn validate(&self) -> Result<(), WorkflowError> {
    if self.label_txn_batch_size == 0 {
      return Err(WorkflowError::Validation("BSA_LABEL_TXN_BATCH_SIZE debe ser mayor que 0".into()));
    }
    if self.retry_max_attempts == 0 {
      return Err(WorkflowError::Validation("BSA_RETRY_MAX_ATTEMPTS debe ser mayor que 0".into()));
    }
    if self.lock_lease_secs == 0 {
      return Err(WorkflowError::Validation("BSA_LOCK_LEASE_SECS debe ser mayor que 0".into()));
    }
    if self.download_interval_secs < 0 || self.max_nop_interval_secs < 0 {
      return Err(WorkflowError::Validation("los intervalos no pueden ser negativos".into()));
    }
    for (key, secs) in [("BSA_LOCK_LEASE_SECS", i64::try_from(self.lock_lease_secs).unwrap_or(i64::MAX)),
                        ("BSA_DOWNLOAD_INTERVAL_SECS", self.download_interval_secs),
                        ("BSA_MAX_NOP_INTERVAL_SECS", self.max_nop_interval_secs)]
    {
      if secs > MAX_INTERVAL_SECS {
        return Err(WorkflowError::Validation(format!("{}: {} supera el máximo de {} segundos",
                                                     key, secs, MAX_INTERVAL_SECS)));
      }
    }
    Ok(())
  }

  /// URL de la base apta para logs: sin usuario ni contraseña.
  pub fn redacted_database_url(&self) -> String {
    redact_userinfo(&self.database_url)
  }

  pub fn lock_lease(&self) -> Duration {
    Duration::from_secs(self.lock_lease_secs)
  }

  pub fn download_interval(&self) -> chrono::Duration {
    chrono::Duration::seconds(self.download_interval_secs)
  }

  pub fn max_nop_interval(&self) -> chrono::Duration {
    chrono::Duration::seconds(self.max_nop_interval_secs)
  }

  pub fn retry_backoff(&self) -> RetryBackoff {
    RetryBackoff::new(Duration::from_millis(self.retry_initial_delay_ms),
                      Duration::from_millis(self.retry_max_delay_ms)).with_max_attempts(self.retry_max_attempts)
  }
}

fn parse_key<T, G>(get: &G, key: &str, default: T) -> Result<T, WorkflowError>
  where T: FromStr,
        G: Fn(&str) -> Option<String>
{
  match get(key) {
    None => Ok(default),
    Some(raw) => raw.parse::<T>()
                    .map_err(|_| WorkflowError::Validation(format!("{}: valor inválido '{}'", key, raw))),
  }
}

fn redact_userinfo(url: &str) -> String {
  let Some((scheme, rest)) = url.split_once("://") else {
    return url.to_string();
  };
  let authority_end = rest.find('/').unwrap_or(rest.len());
  match rest[..authority_end].rfind('@') {
    Some(at) => format!("{}://***@{}", scheme, &rest[at + 1..]),
    None => url.to_string(),
  }
}

fn parse_tlds(raw: &str) -> Vec<String> {
  raw.split(',')
     .map(|t| t.trim().trim_start_matches('.').to_lowercase())
     .filter(|t| !t.is_empty())
     .collect()
}
