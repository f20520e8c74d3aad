// Archivo: apply.rs
// Propósito: aplicar un lote de labels del diff al repositorio de labels y
// calcular los dominios que no se pueden bloquear.
//
// Orden obligatorio: los labels nuevos se insertan y confirman en una
// transacción propia antes de abrir la transacción que cuenta dominios. La
// creación de dominios en el registro consulta los labels confirmados; si
// el conteo corriera antes, un dominio creado en paralelo podría escaparse.
use crate::errors::WorkflowError;
use bsa_domain::{BsaDomainInUse, BsaLabel, DomainError, DomainInUseReason, IdnChecker, Label, LabelRepository,
                 LabelTransaction, LabelType, NonBlockedDomain, Reason};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use log::{error, info};
use std::collections::{BTreeMap, BTreeSet};

/// Aplica `labels` y devuelve los dominios no bloqueables resultantes.
///
/// - `CREATE`/`ADD`: se insertan (transacción 1) y luego se cuentan
///   (transacción 2, ver [`tally_non_blocked_domains_for_new_labels`]).
/// - `DELETE`: se borran junto con sus dominios en uso. Si se borran menos
///   filas que labels pedidos se registra un error y se continúa.
/// - `NEW_ORDER_ASSOCIATION`: todos deben existir; se reutilizan sus
///   dominios en uso y se recalculan los TLDs inválidos.
pub fn apply_label_diff(labels: &[Label],
                        repo: &dyn LabelRepository,
                        idn_checker: &dyn IdnChecker,
                        job_creation_time: DateTime<Utc>,
                        now: DateTime<Utc>)
                        -> Result<Vec<NonBlockedDomain>, WorkflowError> {
  let mut labels_by_type: IndexMap<LabelType, Vec<Label>> = IndexMap::new();
  for label in labels {
    let key = if label.label_type().is_creation() { LabelType::Create } else { label.label_type() };
    labels_by_type.entry(key).or_default().push(label.clone());
  }

  if let Some(created) = labels_by_type.get(&LabelType::Create) {
    let rows: Vec<BsaLabel> = created.iter().map(|l| BsaLabel::new(l.label(), job_creation_time)).collect();
    let inserted = repo.insert_labels(&rows)?;
    info!("Insertados {} de {} labels nuevos", inserted, rows.len());
  }

  let mut non_blocked: Vec<NonBlockedDomain> = Vec::new();
  repo.transact(&mut |txn| {
        non_blocked.clear();
        for (label_type, group) in &labels_by_type {
          match label_type {
            LabelType::Create | LabelType::Add => {
              non_blocked.extend(tally_non_blocked_domains_for_new_labels(group, idn_checker, txn, now)?);
            }
            LabelType::Delete => {
              let deleted_labels: Vec<String> = unique_names(group);
              let n_deleted = txn.delete_labels(&deleted_labels)?;
              if n_deleted != deleted_labels.len() {
                error!("Only found {} entities among the {} labels: {:?}",
                       n_deleted,
                       deleted_labels.len(),
                       deleted_labels);
              }
            }
            LabelType::NewOrderAssociation => {
              let affected = unique_names(group);
              let in_db = txn.find_labels(&affected)?;
              if in_db.len() != affected.len() {
                let missing: Vec<&String> = affected.iter().filter(|l| !in_db.contains(*l)).collect();
                return Err(DomainError::InconsistentState(format!("Missing labels in DB: {:?}", missing)));
              }
              // reusar dominios registrados/reservados ya calculados
              for record in txn.domains_in_use_for_labels(&affected)? {
                non_blocked.push(NonBlockedDomain::of(&record.label, &record.tld, record.reason.to_reason()));
              }
              for label in group {
                non_blocked.extend(invalid_domains(label, idn_checker));
              }
            }
          }
        }
        Ok(())
      })?;
  info!("Procesados {} labels.", labels.len());
  Ok(non_blocked)
}

/// Cuenta los dominios no bloqueables de labels recién insertados y
/// persiste los que están en uso.
///
/// Para cada label: los TLDs que no aceptan ninguna de sus tablas IDN dan
/// `INVALID`; en los que sí, `label.tld` registrado a `now` da
/// `REGISTERED`, y de los restantes los reservados dan `RESERVED`.
pub fn tally_non_blocked_domains_for_new_labels(labels: &[Label],
                                                idn_checker: &dyn IdnChecker,
                                                txn: &mut dyn LabelTransaction,
                                                now: DateTime<Utc>)
                                                -> Result<Vec<NonBlockedDomain>, DomainError> {
  let mut out = Vec::new();
  for label in labels {
    out.extend(invalid_domains(label, idn_checker));
  }

  // nombre completo -> (label, tld)
  let mut candidates: BTreeMap<String, (String, String)> = BTreeMap::new();
  for label in labels {
    for tld in idn_checker.supporting_tlds(label.idn_tables()) {
      candidates.insert(format!("{}.{}", label.label(), tld), (label.label().to_string(), tld));
    }
  }
  let names: Vec<String> = candidates.keys().cloned().collect();

  let registered = txn.registered_domains(&names, now)?;
  for domain in &registered {
    if let Some((label, tld)) = candidates.get(domain) {
      out.push(NonBlockedDomain::new(domain.clone(), Reason::Registered));
      txn.put_domain_in_use(&BsaDomainInUse::new(label.clone(), tld.clone(), DomainInUseReason::Registered))?;
    }
  }

  let remaining: Vec<String> = names.into_iter().filter(|n| !registered.contains(n)).collect();
  for domain in txn.reserved_domains(&remaining)? {
    if let Some((label, tld)) = candidates.get(&domain) {
      txn.put_domain_in_use(&BsaDomainInUse::new(label.clone(), tld.clone(), DomainInUseReason::Reserved))?;
      out.push(NonBlockedDomain::new(domain, Reason::Reserved));
    }
  }
  Ok(out)
}

fn invalid_domains(label: &Label, idn_checker: &dyn IdnChecker) -> Vec<NonBlockedDomain> {
  idn_checker.forbidding_tlds(label.idn_tables())
             .into_iter()
             .map(|tld| NonBlockedDomain::of(label.label(), &tld, Reason::Invalid))
             .collect()
}

fn unique_names(labels: &[Label]) -> Vec<String> {
  labels.iter()
        .map(|l| l.label().to_string())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

#[cfg(test)]
mod tests {
  use super::*;
  use bsa_domain::{CommitRecord, InMemoryLabelRepository, StaticIdnChecker, LDH_TABLE};
  use chrono::TimeZone;

  fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap()
  }

  fn checker() -> StaticIdnChecker {
    StaticIdnChecker::ldh_only(["a", "b"]).with_tld("c")
  }

  fn create(label: &str, idn: &dyn IdnChecker) -> Label {
    Label::new(label, LabelType::Create, idn.valid_idn_tables(label))
  }

  fn sorted(mut v: Vec<NonBlockedDomain>) -> Vec<String> {
    v.sort();
    v.into_iter().map(|d| d.to_string()).collect()
  }

  #[test]
  fn tally_reports_invalid_and_registered() {
    let repo = InMemoryLabelRepository::new();
    let idn = checker();
    repo.register_domain("label.a", t0()).unwrap();
    let out = apply_label_diff(&[create("label", &idn)], &repo, &idn, t0(), t0()).unwrap();
    assert_eq!(sorted(out), vec!["label.a,REGISTERED", "label.c,INVALID"]);
    let in_use = repo.domains_in_use("label").unwrap();
    assert_eq!(in_use, vec![BsaDomainInUse::new("label", "a", DomainInUseReason::Registered)]);
  }

  #[test]
  fn reserved_only_counts_unregistered_names() {
    let repo = InMemoryLabelRepository::new();
    let idn = checker();
    repo.register_domain("label.a", t0()).unwrap();
    repo.reserve_domain("label.a").unwrap();
    repo.reserve_domain("label.b").unwrap();
    let out = apply_label_diff(&[create("label", &idn)], &repo, &idn, t0(), t0()).unwrap();
    assert_eq!(sorted(out), vec!["label.a,REGISTERED", "label.b,RESERVED", "label.c,INVALID"]);
  }

  #[test]
  fn labels_commit_before_the_tally_transaction() {
    let repo = InMemoryLabelRepository::new();
    let idn = checker();
    repo.register_domain("label.b", t0()).unwrap();
    apply_label_diff(&[create("label", &idn)], &repo, &idn, t0(), t0()).unwrap();
    let journal = repo.journal().unwrap();
    assert!(matches!(&journal[0], CommitRecord::Labels(l) if l == &vec!["label".to_string()]));
    assert!(matches!(&journal[1], CommitRecord::Transaction { domains_in_use, .. } if domains_in_use == &vec!["label.b".to_string()]));
  }

  #[test]
  fn delete_cascades_and_tolerates_missing_labels() {
    let repo = InMemoryLabelRepository::new();
    let idn = checker();
    repo.register_domain("foo.a", t0()).unwrap();
    apply_label_diff(&[create("foo", &idn)], &repo, &idn, t0(), t0()).unwrap();
    let deletes = vec![Label::new("foo", LabelType::Delete, BTreeSet::new()),
                       Label::new("ghost", LabelType::Delete, BTreeSet::new())];
    let out = apply_label_diff(&deletes, &repo, &idn, t0(), t0()).unwrap();
    assert!(out.is_empty());
    assert!(repo.find_label("foo").unwrap().is_none());
    assert!(repo.domains_in_use("foo").unwrap().is_empty());
  }

  #[test]
  fn new_order_association_reuses_domains_in_use() {
    let repo = InMemoryLabelRepository::new();
    let idn = checker();
    repo.register_domain("foo.a", t0()).unwrap();
    apply_label_diff(&[create("foo", &idn)], &repo, &idn, t0(), t0()).unwrap();
    // el dominio se borra después: no se recalcula
    repo.delete_domain("foo.a", t0()).unwrap();
    let tables: BTreeSet<String> = [LDH_TABLE.to_string()].into_iter().collect();
    let noa = Label::new("foo", LabelType::NewOrderAssociation, tables);
    let out = apply_label_diff(&[noa], &repo, &idn, t0(), t0()).unwrap();
    assert_eq!(sorted(out), vec!["foo.a,REGISTERED", "foo.c,INVALID"]);
  }

  #[test]
  fn new_order_association_for_unknown_label_rolls_back() {
    let repo = InMemoryLabelRepository::new();
    let idn = checker();
    repo.register_domain("bar.a", t0()).unwrap();
    let batch = vec![create("bar", &idn), Label::new("ghost", LabelType::NewOrderAssociation, BTreeSet::new())];
    let err = apply_label_diff(&batch, &repo, &idn, t0(), t0()).unwrap_err();
    assert!(matches!(err, WorkflowError::Domain(DomainError::InconsistentState(ref m)) if m.contains("ghost")));
    // la inserción ya estaba confirmada; el conteo no
    assert!(repo.find_label("bar").unwrap().is_some());
    assert!(repo.domains_in_use("bar").unwrap().is_empty());
  }
}
