//! bsa-domain: tipos del dominio de listas de bloqueo
//!
//! Líneas de las listas publicadas por la autoridad, labels y órdenes
//! clasificados por el diff, dominios no bloqueables, la consulta IDN y el
//! contrato del repositorio de labels persistentes.
mod block_list;
mod errors;
mod idn_checker;
mod label;
mod label_repository;
mod non_blocked_domain;
mod order;

pub use block_list::{BlockListLines, BlockListType, Line, BLOCK_LIST_HEADER, ORDER_ID_SENTINEL};
pub use errors::DomainError;
pub use idn_checker::{is_ldh_label, IdnChecker, StaticIdnChecker, LDH_TABLE};
pub use label::{Label, LabelType};
pub use label_repository::{BsaDomainInUse, BsaLabel, CommitRecord, DomainInUseReason, InMemoryLabelRepository,
                           LabelRepository, LabelTransaction};
pub use non_blocked_domain::{NonBlockedDomain, Reason};
pub use order::{Order, OrderType};
