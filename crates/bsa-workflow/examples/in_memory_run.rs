use bsa_domain::{BlockListType, InMemoryLabelRepository, StaticIdnChecker};
use bsa_providers::stubs::{InMemoryBlockListFetcher, RecordingReportSender};
use bsa_workflow::{BsaActionFactory, DownloadConfig, WorkflowError};
use chrono::{Duration, Utc};
use flow::{FakeClock, InMemoryExecutionLock, InMemoryJobRepository, InMemorySnapshotStore, JobRepository};
use std::sync::Arc;

fn main() -> Result<(), WorkflowError> {
  // Colaboradores en memoria
  let labels = Arc::new(InMemoryLabelRepository::new());
  let jobs = Arc::new(InMemoryJobRepository::new());
  let fetcher = Arc::new(InMemoryBlockListFetcher::new());
  let sender = Arc::new(RecordingReportSender::new());
  let clock = Arc::new(FakeClock::new(Utc::now()));
  labels.register_domain("shop.app", Utc::now() - Duration::days(30))?;

  let config = DownloadConfig { retry_initial_delay_ms: 0, retry_max_delay_ms: 0, ..DownloadConfig::default() };
  let action = BsaActionFactory::assemble(config,
                                          labels.clone(),
                                          jobs.clone(),
                                          Arc::new(InMemoryExecutionLock::new()),
                                          Arc::new(InMemorySnapshotStore::new()),
                                          fetcher.clone(),
                                          sender.clone(),
                                          Arc::new(StaticIdnChecker::ldh_only(["app", "dev"])),
                                          clock.clone());

  // Primera ronda: todo es nuevo
  fetcher.publish(BlockListType::Block, "domainLabel,orderIDs\nshop,100;101\n", None)?;
  fetcher.publish(BlockListType::BlockPlus, "domainLabel,orderIDs\nbank,102\n", None)?;
  println!("ronda 1: {:?}", action.run());

  // Segunda ronda: se libera `bank` y `shop` gana una orden
  clock.advance(Duration::hours(1));
  fetcher.publish(BlockListType::Block, "domainLabel,orderIDs\nshop,100;101;103\n", None)?;
  fetcher.publish(BlockListType::BlockPlus, "domainLabel,orderIDs\n", None)?;
  println!("ronda 2: {:?}", action.run());

  for job in jobs.all_jobs()? {
    println!("job {} ({}) -> {}", job.job_id, job.job_name(), job.stage);
  }
  println!("latest: {:?}", jobs.latest_job()?.map(|j| j.stage));
  for report in sender.order_reports() {
    println!("orders: {}", report);
  }
  for report in sender.unblockable_reports() {
    println!("unblockable: {}", report);
  }
  Ok(())
}
