//! Crate `flow`: jobs de descarga, checkpoints y contratos de infraestructura
//!
//! Define el registro de job (`DownloadJob`) con su `DownloadStage`, el
//! contrato de persistencia `JobRepository`, el store de artefactos por job
//! (`SnapshotStore`) y el lock distribuido (`ExecutionLock`), junto con
//! implementaciones en memoria y en disco.
//!
//! Diseño resumido:
//! - Checkpoints: cada stage completado se persiste antes de empezar el
//!   siguiente, así una invocación fallida se reanuda donde quedó.
//! - Locking optimista: los cambios de stage llevan el stage esperado y
//!   devuelven `PersistResult::Conflict` si no coincide.
//! - Un solo ejecutor: `BsaLock` garantiza que sólo una invocación avanza
//!   el pipeline a la vez.
//!
//! Ejemplo rápido:
//! ```rust
//! use flow::stubs::InMemoryJobRepository;
//! use flow::DownloadScheduler;
//! use std::sync::Arc;
//! let repo = Arc::new(InMemoryJobRepository::new());
//! let scheduler = DownloadScheduler::new(repo, chrono::Duration::minutes(30), chrono::Duration::days(1));
//! let schedule = scheduler.schedule(chrono::Utc::now()).unwrap();
//! assert!(schedule.is_some());
//! ```
pub mod clock;
pub mod domain;
pub mod errors;
pub mod fs_store;
pub mod lock;
pub mod repository;
pub mod schedule;
pub mod stubs;

pub use clock::*;
pub use domain::*;
pub use errors::*;
pub use fs_store::FileSnapshotStore;
pub use lock::*;
pub use repository::*;
pub use schedule::*;
pub use stubs::*;
