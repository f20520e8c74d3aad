use bsa_domain::BlockListType;
use chrono::{Duration, TimeZone, Utc};
use flow::domain::{parse_checksums, Checksums, DownloadStage, PersistResult};
use flow::stubs::InMemoryJobRepository;
use flow::JobRepository;

#[test]
fn job_ids_are_monotonic_and_jobs_start_in_download() {
  let repo = InMemoryJobRepository::new();
  let t0 = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
  let first = repo.create_job(t0).unwrap();
  let second = repo.create_job(t0 + Duration::minutes(30)).unwrap();
  assert_eq!(first.job_id, 1);
  assert_eq!(second.job_id, 2);
  assert_eq!(second.stage, DownloadStage::Download);
  assert_eq!(first.job_name(), "2024-03-01t120000.000z");
  assert_eq!(repo.latest_job().unwrap().unwrap().job_id, 2);
}

#[test]
fn persist_stage_detects_conflicting_writers() {
  let repo = InMemoryJobRepository::new();
  let t0 = Utc::now();
  let job = repo.create_job(t0).unwrap();

  let mut checksums = Checksums::new();
  checksums.insert(BlockListType::Block, "aa".into());
  checksums.insert(BlockListType::BlockPlus, "bb".into());
  match repo.persist_stage(job.job_id, DownloadStage::Download, DownloadStage::MakeDiff, Some(&checksums), t0).unwrap() {
    PersistResult::Ok { job } => {
      assert_eq!(job.stage, DownloadStage::MakeDiff);
      assert_eq!(job.checksums, checksums);
    }
    PersistResult::Conflict { .. } => panic!("unexpected conflict"),
  }

  // second writer still believes the job is in DOWNLOAD
  match repo.persist_stage(job.job_id, DownloadStage::Download, DownloadStage::MakeDiff, None, t0).unwrap() {
    PersistResult::Conflict { actual } => assert_eq!(actual, DownloadStage::MakeDiff),
    PersistResult::Ok { .. } => panic!("stale writer must conflict"),
  }
  assert!(repo.get_job(99).is_err());
}

#[test]
fn latest_job_in_stage_skips_newer_jobs_in_other_stages() {
  let repo = InMemoryJobRepository::new();
  let t0 = Utc::now();
  let a = repo.create_job(t0).unwrap();
  repo.persist_stage(a.job_id, DownloadStage::Download, DownloadStage::Done, None, t0).unwrap();
  let _b = repo.create_job(t0).unwrap();
  let done = repo.latest_job_in_stage(DownloadStage::Done).unwrap().unwrap();
  assert_eq!(done.job_id, a.job_id);
  assert!(repo.latest_job_in_stage(DownloadStage::Nop).unwrap().is_none());
}

#[test]
fn checksum_text_format() {
  let parsed = parse_checksums("BLOCK=abc, BLOCK_PLUS=def").unwrap();
  assert_eq!(parsed.get(&BlockListType::BlockPlus).map(String::as_str), Some("def"));
  assert_eq!(flow::domain::checksums_to_string(&parsed), "BLOCK=abc,BLOCK_PLUS=def");
  assert!(parse_checksums("").unwrap().is_empty());
  assert!(parse_checksums("BLOCK").is_err());
}
