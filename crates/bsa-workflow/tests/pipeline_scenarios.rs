use bsa_domain::{BlockListType, InMemoryLabelRepository, LabelRepository, StaticIdnChecker};
use bsa_providers::stubs::{InMemoryBlockListFetcher, RecordingReportSender};
use bsa_providers::ProviderError;
use bsa_workflow::{BsaActionFactory, BsaDownloadAction, DownloadConfig, InvocationStatus, RunOutcome};
use chrono::{DateTime, Duration, TimeZone, Utc};
use flow::domain::{job_name_for, ArtifactKind, DownloadStage};
use flow::{Clock, ExecutionLock, FakeClock, InMemoryExecutionLock, InMemoryJobRepository, InMemorySnapshotStore,
           JobRepository, BSA_LOCK_NAME};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use std::sync::Arc;

struct Harness {
  labels: Arc<InMemoryLabelRepository>,
  jobs: Arc<InMemoryJobRepository>,
  lock: Arc<InMemoryExecutionLock>,
  store: InMemorySnapshotStore,
  fetcher: Arc<InMemoryBlockListFetcher>,
  sender: Arc<RecordingReportSender>,
  clock: Arc<FakeClock>,
  action: BsaDownloadAction,
}

fn t0() -> DateTime<Utc> {
  Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
}

fn test_config() -> DownloadConfig {
  DownloadConfig { label_txn_batch_size: 2,
                   retry_max_attempts: 3,
                   retry_initial_delay_ms: 0,
                   retry_max_delay_ms: 0,
                   ..DownloadConfig::default() }
}

fn harness(config: DownloadConfig) -> Harness {
  let labels = Arc::new(InMemoryLabelRepository::new());
  let jobs = Arc::new(InMemoryJobRepository::new());
  let lock = Arc::new(InMemoryExecutionLock::new());
  let store = InMemorySnapshotStore::new();
  let fetcher = Arc::new(InMemoryBlockListFetcher::new());
  let sender = Arc::new(RecordingReportSender::new());
  let clock = Arc::new(FakeClock::new(t0()));
  let idn = StaticIdnChecker::ldh_only(["app", "dev"]).with_tld("page");
  let action = BsaActionFactory::assemble(config,
                                          labels.clone(),
                                          jobs.clone(),
                                          lock.clone(),
                                          Arc::new(store.clone()),
                                          fetcher.clone(),
                                          sender.clone(),
                                          Arc::new(idn),
                                          clock.clone());
  Harness { labels, jobs, lock, store, fetcher, sender, clock, action }
}

fn publish(h: &Harness, block: &str, block_plus: &str) {
  h.fetcher.publish(BlockListType::Block, &format!("domainLabel,orderIDs\n{}", block), None).unwrap();
  h.fetcher.publish(BlockListType::BlockPlus, &format!("domainLabel,orderIDs\n{}", block_plus), None).unwrap();
}

fn finished(job_id: i64) -> InvocationStatus {
  InvocationStatus::Completed(RunOutcome::Finished { job_id, stage: DownloadStage::Done })
}

fn parse(report: &str) -> Value {
  serde_json::from_str(report).unwrap()
}

#[test]
fn first_run_blocks_everything_and_reports() {
  let h = harness(test_config());
  h.labels.register_domain("foo.app", t0() - Duration::days(1)).unwrap();
  publish(&h, "foo,1;2\n", "bar,3\n");

  let status = h.action.run();
  assert_eq!(status, finished(1));
  assert_eq!(status.http_status(), 200);

  let job = h.jobs.get_job(1).unwrap();
  assert_eq!(job.stage, DownloadStage::Done);
  assert_eq!(job.checksums.len(), 2);
  let expected = format!("{:x}", Sha256::digest("domainLabel,orderIDs\nfoo,1;2\n".as_bytes()));
  assert_eq!(job.checksums.get(&BlockListType::Block), Some(&expected));

  assert!(h.labels.find_label("foo").unwrap().is_some());
  assert_eq!(h.labels.find_label("bar").unwrap().unwrap().creation_time, t0());

  let job_name = job_name_for(&t0());
  let label_diffs = h.store.read_to_string(&job_name, ArtifactKind::LabelDiffs).unwrap().unwrap();
  assert_eq!(label_diffs, "foo,CREATE,LDH\nbar,CREATE,LDH\n");

  let reports = h.sender.order_reports();
  assert_eq!(reports.len(), 2);
  assert_eq!(parse(&reports[0]),
             json!([{"blockOrderId": 1, "status": "ActivationInProgress"},
                    {"blockOrderId": 2, "status": "ActivationInProgress"},
                    {"blockOrderId": 3, "status": "ActivationInProgress"}]));
  assert_eq!(parse(&reports[1])[2], json!({"blockOrderId": 3, "status": "Active"}));

  let unblockable = h.sender.unblockable_reports();
  assert_eq!(unblockable.len(), 1);
  assert_eq!(parse(&unblockable[0]),
             json!({"invalid": ["bar.page", "foo.page"], "registered": ["foo.app"]}));
  // copia de auditoría idéntica a lo enviado
  let audit = h.store.read_to_string(&job_name, ArtifactKind::UnblockableDomainsReport).unwrap();
  assert_eq!(audit.as_deref(), Some(unblockable[0].as_str()));
}

#[test]
fn second_run_diffs_against_the_previous_job() {
  let h = harness(test_config());
  h.labels.register_domain("foo.app", t0() - Duration::days(1)).unwrap();
  publish(&h, "foo,1;2\n", "bar,3\n");
  assert_eq!(h.action.run(), finished(1));

  h.clock.advance(Duration::minutes(31));
  publish(&h, "foo,1;2;4\n", "");
  assert_eq!(h.action.run(), finished(2));

  assert!(h.labels.find_label("bar").unwrap().is_none());
  assert!(h.labels.find_label("foo").unwrap().is_some());

  let reports = h.sender.order_reports();
  assert_eq!(reports.len(), 4);
  assert_eq!(parse(&reports[2]),
             json!([{"blockOrderId": 4, "status": "ActivationInProgress"},
                    {"blockOrderId": 3, "status": "ReleaseInProgress"}]));
  assert_eq!(parse(&reports[3]),
             json!([{"blockOrderId": 4, "status": "Active"}, {"blockOrderId": 3, "status": "Closed"}]));

  // foo gana una orden: se reutiliza su dominio registrado
  let unblockable = h.sender.unblockable_reports();
  assert_eq!(parse(&unblockable[1]), json!({"invalid": ["foo.page"], "registered": ["foo.app"]}));
}

#[test]
fn unchanged_lists_send_no_reports() {
  let h = harness(test_config());
  publish(&h, "foo,1\n", "");
  assert_eq!(h.action.run(), finished(1));
  let sent = h.sender.order_reports().len();

  h.clock.advance(Duration::hours(1));
  assert_eq!(h.action.run(), finished(2));
  assert_eq!(h.sender.order_reports().len(), sent);
  let job_name = job_name_for(&h.jobs.get_job(2).unwrap().creation_time);
  assert_eq!(h.store.read_to_string(&job_name, ArtifactKind::LabelDiffs).unwrap().as_deref(), Some(""));
}

#[test]
fn nothing_to_do_before_the_download_interval() {
  let h = harness(test_config());
  publish(&h, "foo,1\n", "");
  assert_eq!(h.action.run(), finished(1));
  h.clock.advance(Duration::minutes(5));
  assert_eq!(h.action.run(), InvocationStatus::Completed(RunOutcome::NothingToDo));
  assert_eq!(h.jobs.all_jobs().unwrap().len(), 1);
}

#[test]
fn lock_held_by_another_worker_is_a_silent_no_op() {
  let h = harness(test_config());
  publish(&h, "foo,1\n", "");
  h.lock.try_acquire(BSA_LOCK_NAME, "otro-worker", std::time::Duration::from_secs(600), t0()).unwrap().unwrap();

  let status = h.action.run();
  assert_eq!(status, InvocationStatus::LockNotAcquired);
  assert_eq!(status.http_status(), 200);
  assert!(h.jobs.all_jobs().unwrap().is_empty());
  assert_eq!(h.fetcher.calls(), 0);

  // al vencer el lease la siguiente invocación avanza
  h.clock.advance(Duration::minutes(11));
  assert_eq!(h.action.run(), finished(1));
  assert!(h.lock.holder(BSA_LOCK_NAME, h.clock.now()).is_none());
}

#[test]
fn failed_upload_resumes_from_the_checkpointed_stage() {
  let h = harness(test_config());
  publish(&h, "foo,1\n", "");
  h.sender.fail_next([ProviderError::fatal("401 unauthorized")]).unwrap();

  let status = h.action.run();
  assert!(matches!(status, InvocationStatus::Failed(ref m) if m.contains("401")));
  assert_eq!(status.http_status(), 200);
  assert_eq!(h.jobs.get_job(1).unwrap().stage, DownloadStage::StartUploading);
  assert!(h.labels.find_label("foo").unwrap().is_some());

  assert_eq!(h.action.run(), finished(1));
  // no se vuelve a descargar ni a aplicar
  assert_eq!(h.fetcher.calls(), 2);
  assert_eq!(h.labels.journal().unwrap().len(), 2);
  assert_eq!(h.sender.order_reports().len(), 2);
}

#[test]
fn transient_fetch_failures_are_retried_within_the_stage() {
  let h = harness(test_config());
  publish(&h, "foo,1\n", "");
  h.fetcher.fail_next([ProviderError::retriable("503"), ProviderError::retriable("timeout")]).unwrap();
  assert_eq!(h.action.run(), finished(1));
  assert_eq!(h.fetcher.calls(), 4);
}

#[test]
fn exhausted_retries_leave_the_stage_untouched() {
  let h = harness(test_config());
  publish(&h, "foo,1\n", "");
  h.fetcher.fail_next((0..3).map(|i| ProviderError::retriable(format!("503 #{}", i)))).unwrap();

  assert!(matches!(h.action.run(), InvocationStatus::Failed(_)));
  assert_eq!(h.fetcher.calls(), 3);
  assert_eq!(h.jobs.get_job(1).unwrap().stage, DownloadStage::Download);

  assert_eq!(h.action.run(), finished(1));
  assert_eq!(h.jobs.all_jobs().unwrap().len(), 1);
}

#[test]
fn malformed_block_list_fails_in_make_diff() {
  let h = harness(test_config());
  publish(&h, "foo,abc\n", "");
  let status = h.action.run();
  assert!(matches!(status, InvocationStatus::Failed(ref m) if m.contains("foo,abc")));
  assert_eq!(h.jobs.get_job(1).unwrap().stage, DownloadStage::MakeDiff);
  assert!(h.labels.labels().unwrap().is_empty());
}

#[test]
fn stages_never_move_backwards_across_invocations() {
  let h = harness(test_config());
  publish(&h, "foo,1\nbar,2\nbaz,3\n", "qux,4\n");
  h.sender.fail_next([ProviderError::fatal("a"), ProviderError::fatal("b")]).unwrap();
  let mut seen = Vec::new();
  for _ in 0..4 {
    h.action.run();
    seen.push(h.jobs.get_job(1).unwrap().stage);
  }
  assert!(seen.windows(2).all(|w| w[0] <= w[1]), "{:?}", seen);
  assert_eq!(seen.last(), Some(&DownloadStage::Done));
}

#[test]
fn checksum_short_circuit_when_enabled() {
  let h = harness(DownloadConfig { checksum_check_enabled: true, ..test_config() });
  let block = "domainLabel,orderIDs\nfoo,1\n";
  let plus = "domainLabel,orderIDs\n";
  let sum = |s: &str| format!("{:x}", Sha256::digest(s.as_bytes()));
  h.fetcher.publish(BlockListType::Block, block, Some(&sum(block))).unwrap();
  h.fetcher.publish(BlockListType::BlockPlus, plus, Some(&sum(plus))).unwrap();
  assert_eq!(h.action.run(), finished(1));

  h.clock.advance(Duration::hours(1));
  assert_eq!(h.action.run(),
             InvocationStatus::Completed(RunOutcome::Finished { job_id: 2, stage: DownloadStage::Nop }));
  assert_eq!(h.sender.order_reports().len(), 2);

  // la autoridad publica un checksum que no coincide con lo descargado
  h.clock.advance(Duration::hours(1));
  h.fetcher.publish(BlockListType::Block, "domainLabel,orderIDs\nfoo,1;2\n", Some("deadbeef")).unwrap();
  assert_eq!(h.action.run(),
             InvocationStatus::Completed(RunOutcome::Finished { job_id: 3, stage: DownloadStage::ChecksumsNotMatch }));

  // requiere un operador: no se crean más jobs
  h.clock.advance(Duration::hours(2));
  assert_eq!(h.action.run(), InvocationStatus::Completed(RunOutcome::NothingToDo));
  assert_eq!(h.jobs.all_jobs().unwrap().len(), 3);
}

#[test]
fn checksum_mismatch_is_ignored_while_disabled() {
  let h = harness(test_config());
  h.fetcher.publish(BlockListType::Block, "foo,1\n", Some("deadbeef")).unwrap();
  h.fetcher.publish(BlockListType::BlockPlus, "", Some("deadbeef")).unwrap();
  assert_eq!(h.action.run(), finished(1));
}
