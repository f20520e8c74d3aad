use bsa_workflow::{BsaActionFactory, DownloadConfig, InvocationStatus, RunOutcome};
use flow::domain::DownloadStage;
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

fn temp_dir() -> PathBuf {
  let dir = std::env::temp_dir().join(format!("bsa_wiring_{}", Uuid::new_v4()));
  fs::create_dir_all(&dir).unwrap();
  dir
}

fn files_in(dir: &Path) -> Vec<String> {
  let mut names: Vec<String> = fs::read_dir(dir).map(|rd| {
                                                   rd.filter_map(|e| e.ok())
                                                     .map(|e| e.file_name().to_string_lossy().into_owned())
                                                     .collect()
                                                 })
                                                .unwrap_or_default();
  names.sort();
  names
}

#[test]
fn sqlite_and_directories_end_to_end() {
  let root = temp_dir();
  let config = DownloadConfig { database_url: root.join("bsa.db").to_string_lossy().into_owned(),
                                snapshot_dir: root.join("snapshots"),
                                block_list_dir: root.join("incoming"),
                                report_spool_dir: root.join("spool"),
                                enrolled_tlds: vec!["app".into()],
                                retry_initial_delay_ms: 0,
                                retry_max_delay_ms: 0,
                                ..DownloadConfig::default() };
  fs::create_dir_all(&config.block_list_dir).unwrap();
  fs::write(config.block_list_dir.join("BLOCK.csv"), "domainLabel,orderIDs\nfoo,1\n").unwrap();
  fs::write(config.block_list_dir.join("BLOCK_PLUS.csv"), "domainLabel,orderIDs\nbar,2\n").unwrap();

  let action = BsaActionFactory::from_config(config.clone()).unwrap();
  assert_eq!(action.run(),
             InvocationStatus::Completed(RunOutcome::Finished { job_id: 1, stage: DownloadStage::Done }));

  let jobs = files_in(&config.snapshot_dir);
  assert_eq!(jobs.len(), 1);
  let artifacts = files_in(&config.snapshot_dir.join(&jobs[0]));
  assert!(artifacts.contains(&"BLOCK.csv".to_string()), "{:?}", artifacts);
  assert!(artifacts.iter().all(|a| !a.ends_with(".tmp")), "{:?}", artifacts);

  // sólo reportes de órdenes: ningún dominio quedó sin bloquear
  let spooled = files_in(&config.report_spool_dir);
  assert_eq!(spooled.len(), 2, "{:?}", spooled);
  assert!(spooled.iter().all(|f| f.starts_with("order_status-")));

  // mismo contenido dentro del intervalo: nada que hacer
  assert_eq!(action.run(), InvocationStatus::Completed(RunOutcome::NothingToDo));
  let _ = fs::remove_dir_all(&root);
}

#[test]
fn missing_lists_fail_without_leaving_the_download_stage() {
  let root = temp_dir();
  let config = DownloadConfig { database_url: root.join("bsa.db").to_string_lossy().into_owned(),
                                snapshot_dir: root.join("snapshots"),
                                block_list_dir: root.join("incoming"),
                                report_spool_dir: root.join("spool"),
                                retry_max_attempts: 2,
                                retry_initial_delay_ms: 0,
                                retry_max_delay_ms: 0,
                                ..DownloadConfig::default() };
  let action = BsaActionFactory::from_config(config.clone()).unwrap();
  let status = action.run();
  assert!(matches!(status, InvocationStatus::Failed(ref m) if m.contains("BLOCK.csv")), "{:?}", status);
  assert_eq!(status.http_status(), 200);
  assert!(files_in(&config.report_spool_dir).is_empty());
  let _ = fs::remove_dir_all(&root);
}

#[test]
fn invalid_configuration_is_rejected() {
  let config = DownloadConfig { label_txn_batch_size: 0, ..DownloadConfig::default() };
  assert!(BsaActionFactory::from_config(config).is_err());
}
