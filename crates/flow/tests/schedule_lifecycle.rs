use chrono::{Duration, TimeZone, Utc};
use flow::domain::{Checksums, DownloadJob, DownloadStage};
use flow::stubs::InMemoryJobRepository;
use flow::{DownloadScheduler, FlowError, JobRepository};
use std::sync::Arc;

fn scheduler(repo: &Arc<InMemoryJobRepository>) -> DownloadScheduler {
  DownloadScheduler::new(repo.clone(), Duration::minutes(30), Duration::hours(24))
}

fn job(id: i64, created: chrono::DateTime<Utc>, stage: DownloadStage) -> DownloadJob {
  DownloadJob { job_id: id, creation_time: created, update_time: created, stage, checksums: Checksums::new() }
}

#[test]
fn first_run_creates_job_that_always_downloads() {
  let repo = Arc::new(InMemoryJobRepository::new());
  let now = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
  let s = scheduler(&repo).schedule(now).unwrap().expect("schedule");
  assert_eq!(s.job_id(), 1);
  assert_eq!(s.stage(), DownloadStage::Download);
  assert!(s.always_download());
  assert!(s.latest_completed().is_none());
  assert_eq!(s.job_name(), "2024-05-01t000000.000z");
}

#[test]
fn in_flight_job_is_resumed_with_previous_completed_job() {
  let repo = Arc::new(InMemoryJobRepository::new());
  let t0 = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
  repo.insert(job(1, t0, DownloadStage::Done)).unwrap();
  repo.insert(job(2, t0 + Duration::hours(1), DownloadStage::ApplyDiff)).unwrap();
  let s = scheduler(&repo).schedule(t0 + Duration::hours(2)).unwrap().expect("resume");
  assert_eq!(s.job_id(), 2);
  assert_eq!(s.stage(), DownloadStage::ApplyDiff);
  assert_eq!(s.latest_completed().unwrap().job_id, 1);
  assert_eq!(repo.all_jobs().unwrap().len(), 2, "resuming must not create a job");
}

#[test]
fn done_job_waits_for_download_interval() {
  let repo = Arc::new(InMemoryJobRepository::new());
  let t0 = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
  repo.insert(job(1, t0, DownloadStage::Done)).unwrap();
  let sched = scheduler(&repo);
  assert!(sched.schedule(t0 + Duration::minutes(10)).unwrap().is_none());

  let s = sched.schedule(t0 + Duration::minutes(31)).unwrap().expect("new job");
  assert_eq!(s.job_id(), 2);
  assert!(!s.always_download());
  assert_eq!(s.latest_completed().unwrap().job_name, "2024-05-01t000000.000z");
}

#[test]
fn stale_completed_job_forces_full_download() {
  let repo = Arc::new(InMemoryJobRepository::new());
  let t0 = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
  repo.insert(job(1, t0, DownloadStage::Done)).unwrap();
  repo.insert(job(2, t0 + Duration::hours(25), DownloadStage::Nop)).unwrap();
  let s = scheduler(&repo).schedule(t0 + Duration::hours(26)).unwrap().expect("new job");
  assert!(s.always_download());
  assert_eq!(s.latest_completed().unwrap().job_id, 1);
}

#[test]
fn checksum_mismatch_blocks_scheduling() {
  let repo = Arc::new(InMemoryJobRepository::new());
  let t0 = Utc::now();
  repo.insert(job(1, t0, DownloadStage::ChecksumsNotMatch)).unwrap();
  assert!(scheduler(&repo).schedule(t0 + Duration::days(3)).unwrap().is_none());
}

#[test]
fn stage_updates_only_move_forward() {
  let repo = Arc::new(InMemoryJobRepository::new());
  let now = Utc::now();
  let mut s = scheduler(&repo).schedule(now).unwrap().unwrap();

  // checksums may only be written from DOWNLOAD and only to the post-download stages
  assert!(s.update_job_stage_with_checksums(DownloadStage::ApplyDiff, &Checksums::new(), now).is_err());
  s.update_job_stage_with_checksums(DownloadStage::MakeDiff, &Checksums::new(), now).unwrap();
  assert!(s.update_job_stage_with_checksums(DownloadStage::Nop, &Checksums::new(), now).is_err());

  assert!(s.update_job_stage(DownloadStage::MakeDiff, now).is_err());
  assert!(s.update_job_stage(DownloadStage::Download, now).is_err());
  s.update_job_stage(DownloadStage::ApplyDiff, now).unwrap();
  assert_eq!(repo.get_job(s.job_id()).unwrap().stage, DownloadStage::ApplyDiff);
}

#[test]
fn concurrent_stage_writer_is_a_conflict() {
  let repo = Arc::new(InMemoryJobRepository::new());
  let now = Utc::now();
  let mut s = scheduler(&repo).schedule(now).unwrap().unwrap();
  repo.persist_stage(s.job_id(), DownloadStage::Download, DownloadStage::MakeDiff, None, now).unwrap();
  match s.update_job_stage(DownloadStage::ApplyDiff, now) {
    Err(FlowError::Conflict(_)) => {}
    other => panic!("expected conflict, got {:?}", other),
  }
}
