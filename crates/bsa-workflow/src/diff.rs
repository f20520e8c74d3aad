// Archivo: diff.rs
// Propósito: diff estructural entre dos snapshots de listas de bloqueo.
//
// `new_and_remaining` acumula los pares (label, orden) del snapshot actual.
// Al recorrer el snapshot anterior cada label recibe una vez el centinela
// `ORDER_ID_SENTINEL` ("el label ya existía") y cada par que también está
// en el actual se descuenta; los pares que no están pasan a `deleted`.
//
// Al terminar, en `new_and_remaining`:
// - sólo centinela: label sin cambios, se ignora;
// - centinela y órdenes: label existente con órdenes nuevas;
// - órdenes sin centinela: label nuevo con órdenes nuevas.
// En `deleted` las claves son labels afectados por borrados y los valores
// las órdenes retiradas.
use bsa_domain::{DomainError, IdnChecker, Label, LabelType, Line, Order, OrderType, ORDER_ID_SENTINEL};
use indexmap::IndexMap;
use log::{debug, warn};
use std::collections::BTreeSet;

type LabelOrders = IndexMap<String, Vec<i64>>;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockLabelsDiff {
  new_and_remaining: LabelOrders,
  deleted: LabelOrders,
  // labels de `deleted` que siguen presentes en el snapshot actual
  still_listed: Vec<String>,
}

impl BlockLabelsDiff {
  /// Calcula el diff consumiendo ambos snapshots en streaming. Una línea
  /// mal formada en cualquiera de los dos aborta el diff.
  pub fn create<C, P>(current: C, previous: Option<P>) -> Result<Self, DomainError>
    where C: IntoIterator<Item = Result<Line, DomainError>>,
          P: IntoIterator<Item = Result<Line, DomainError>>
  {
    let mut new_and_remaining = LabelOrders::new();
    for line in current {
      let (label, order_ids) = line?.into_parts();
      new_and_remaining.entry(label).or_default().extend(order_ids);
    }
    let current_labels = new_and_remaining.len();

    // los labels del snapshot actual ocupan los índices 0..current_labels
    let mut deleted = LabelOrders::new();
    for line in previous.into_iter().flatten() {
      let (label, order_ids) = line?.into_parts();
      let idx = match new_and_remaining.get_index_of(&label) {
        Some(idx) => idx,
        None => new_and_remaining.insert_full(label.clone(), Vec::new()).0,
      };
      let orders = &mut new_and_remaining[idx];
      if !orders.contains(&ORDER_ID_SENTINEL) {
        orders.push(ORDER_ID_SENTINEL);
      }
      for id in order_ids {
        match orders.iter().position(|o| *o == id) {
          Some(pos) => {
            orders.remove(pos);
          }
          None => match deleted.get_mut(&label) {
            Some(ids) => ids.push(id),
            None => {
              deleted.insert(label.clone(), vec![id]);
            }
          },
        }
      }
    }

    let still_listed: Vec<String> =
      deleted.keys()
             .filter(|l| new_and_remaining.get_index_of(l.as_str()).map_or(false, |idx| idx < current_labels))
             .cloned()
             .collect();
    if !still_listed.is_empty() {
      warn!("{} labels pierden órdenes pero siguen en la lista actual; se clasifican DELETE: {:?}",
            still_listed.len(),
            still_listed);
    }
    debug!("Diff: {} labels actuales, {} labels con órdenes retiradas", current_labels, deleted.len());
    Ok(Self { new_and_remaining, deleted, still_listed })
  }

  /// Órdenes nuevas (`CREATE`) seguidas de las retiradas (`DELETE`).
  pub fn orders(&self) -> impl Iterator<Item = Order> + '_ {
    let created = self.new_and_remaining
                      .values()
                      .flatten()
                      .filter(|id| **id != ORDER_ID_SENTINEL)
                      .map(|id| Order::new(*id, OrderType::Create));
    let deleted = self.deleted.values().flatten().map(|id| Order::new(*id, OrderType::Delete));
    created.chain(deleted)
  }

  /// Labels que cambiaron. Cada label aparece una sola vez: si tiene
  /// órdenes retiradas es `DELETE` aunque también haya ganado órdenes.
  pub fn labels<'a>(&'a self, idn_checker: &'a dyn IdnChecker) -> impl Iterator<Item = Label> + 'a {
    let changed = self.new_and_remaining
                      .iter()
                      .filter(|(_, ids)| ids.len() > 1 || !ids.contains(&ORDER_ID_SENTINEL))
                      .filter(|(label, _)| !self.deleted.contains_key(*label))
                      .map(move |(label, ids)| {
                        let label_type = if ids.contains(&ORDER_ID_SENTINEL) {
                          LabelType::NewOrderAssociation
                        } else {
                          LabelType::Create
                        };
                        Label::new(label.clone(), label_type, idn_checker.valid_idn_tables(label))
                      });
    let deleted = self.deleted.keys().map(|label| Label::new(label.clone(), LabelType::Delete, BTreeSet::new()));
    changed.chain(deleted)
  }

  pub fn new_and_remaining(&self) -> &IndexMap<String, Vec<i64>> {
    &self.new_and_remaining
  }

  pub fn deleted(&self) -> &IndexMap<String, Vec<i64>> {
    &self.deleted
  }

  /// Labels clasificados `DELETE` que siguen presentes en el snapshot
  /// actual con otras órdenes.
  pub fn still_listed_deletions(&self) -> &[String] {
    &self.still_listed
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use bsa_domain::StaticIdnChecker;

  fn lines(items: &[(&str, &[i64])]) -> Vec<Result<Line, DomainError>> {
    items.iter().map(|(l, ids)| Line::new(*l, ids.to_vec())).collect()
  }

  fn diff(current: &[(&str, &[i64])], previous: &[(&str, &[i64])]) -> BlockLabelsDiff {
    BlockLabelsDiff::create(lines(current), Some(lines(previous))).unwrap()
  }

  fn summary(d: &BlockLabelsDiff) -> (Vec<String>, Vec<String>) {
    let idn = StaticIdnChecker::ldh_only(["app"]);
    (d.labels(&idn).map(|l| l.to_string()).collect(), d.orders().map(|o| o.to_string()).collect())
  }

  #[test]
  fn first_run_creates_everything() {
    let current: &[(&str, &[i64])] = &[("foo", &[1, 2])];
    let d = BlockLabelsDiff::create(lines(current), None::<Vec<Result<Line, DomainError>>>).unwrap();
    let (labels, orders) = summary(&d);
    assert_eq!(labels, vec!["foo,CREATE,LDH"]);
    assert_eq!(orders, vec!["1,CREATE", "2,CREATE"]);
  }

  #[test]
  fn vanished_label_is_deleted_with_its_orders() {
    let d = diff(&[], &[("foo", &[1, 2])]);
    let (labels, orders) = summary(&d);
    assert_eq!(labels, vec!["foo,DELETE"]);
    assert_eq!(orders, vec!["1,DELETE", "2,DELETE"]);
  }

  #[test]
  fn new_order_on_existing_label() {
    let d = diff(&[("foo", &[1, 2])], &[("foo", &[1])]);
    let (labels, orders) = summary(&d);
    assert_eq!(labels, vec!["foo,NEW_ORDER_ASSOCIATION,LDH"]);
    assert_eq!(orders, vec!["2,CREATE"]);
  }

  #[test]
  fn unchanged_label_produces_nothing() {
    let d = diff(&[("foo", &[1])], &[("foo", &[1])]);
    let (labels, orders) = summary(&d);
    assert!(labels.is_empty());
    assert!(orders.is_empty());
    assert_eq!(d.new_and_remaining().get("foo"), Some(&vec![ORDER_ID_SENTINEL]));
  }

  #[test]
  fn partial_disassociation_is_classified_delete() {
    let d = diff(&[("foo", &[1])], &[("foo", &[1, 2])]);
    let (labels, orders) = summary(&d);
    assert_eq!(labels, vec!["foo,DELETE"]);
    assert_eq!(orders, vec!["2,DELETE"]);
    assert_eq!(d.still_listed_deletions(), &["foo".to_string()]);
  }

  #[test]
  fn swapped_order_yields_a_single_delete_label() {
    let d = diff(&[("foo", &[2])], &[("foo", &[1])]);
    let (labels, orders) = summary(&d);
    assert_eq!(labels, vec!["foo,DELETE"]);
    assert_eq!(orders, vec!["2,CREATE", "1,DELETE"]);
  }

  #[test]
  fn label_split_across_both_lists_gets_one_sentinel() {
    // el mismo label aparece en BLOCK y BLOCK_PLUS en ambos snapshots
    let d = diff(&[("foo", &[1]), ("foo", &[3])], &[("foo", &[1]), ("foo", &[3])]);
    assert_eq!(d.new_and_remaining().get("foo"), Some(&vec![ORDER_ID_SENTINEL]));
    assert!(d.deleted().is_empty());
  }

  #[test]
  fn malformed_line_aborts_the_diff() {
    let current = vec![Line::parse("foo,1"), Line::parse("bar,x")];
    let err = BlockLabelsDiff::create(current, None::<Vec<Result<Line, DomainError>>>).unwrap_err();
    assert!(matches!(err, DomainError::ValidationError(ref m) if m.contains("bar,x")));
  }

  fn pairs<'a>(entries: impl IntoIterator<Item = (&'a String, &'a Vec<i64>)>) -> BTreeSet<(String, i64)> {
    entries.into_iter()
           .flat_map(|(l, ids)| ids.iter().filter(|id| **id != ORDER_ID_SENTINEL).map(move |id| (l.clone(), *id)))
           .collect()
  }

  #[test]
  fn mixed_snapshots_classify_each_label_once_and_account_for_every_pair() {
    let current: &[(&str, &[i64])] = &[("a", &[1, 2]), ("b", &[3]), ("c", &[4]), ("e", &[9]), ("e", &[10])];
    let previous: &[(&str, &[i64])] = &[("a", &[1]), ("c", &[5]), ("d", &[6, 7]), ("e", &[9, 10])];
    let d = diff(current, previous);
    let (labels, orders) = summary(&d);
    assert_eq!(labels, vec!["a,NEW_ORDER_ASSOCIATION,LDH", "b,CREATE,LDH", "c,DELETE", "d,DELETE"]);
    assert_eq!(orders, vec!["2,CREATE", "3,CREATE", "4,CREATE", "5,DELETE", "6,DELETE", "7,DELETE"]);

    let names: Vec<String> = labels.iter().map(|l| l.split(',').next().unwrap().to_string()).collect();
    let unique: BTreeSet<&String> = names.iter().collect();
    assert_eq!(unique.len(), names.len());
    assert!(!unique.contains(&"e".to_string()));

    let as_map = |items: &[(&str, &[i64])]| -> IndexMap<String, Vec<i64>> {
      let mut m: IndexMap<String, Vec<i64>> = IndexMap::new();
      for (l, ids) in items {
        m.entry(l.to_string()).or_default().extend_from_slice(ids);
      }
      m
    };
    let current_pairs = pairs(&as_map(current));
    let previous_pairs = pairs(&as_map(previous));

    // lo que estaba antes y ya no está es exactamente `deleted`
    let removed: BTreeSet<(String, i64)> = previous_pairs.difference(&current_pairs).cloned().collect();
    assert_eq!(removed, pairs(d.deleted()));

    // lo actual es lo que no cambió más lo que se crea
    let unchanged: BTreeSet<(String, i64)> = current_pairs.intersection(&previous_pairs).cloned().collect();
    let created = pairs(d.new_and_remaining());
    assert!(unchanged.is_disjoint(&created));
    let union: BTreeSet<(String, i64)> = unchanged.union(&created).cloned().collect();
    assert_eq!(union, current_pairs);
    assert_eq!(d.still_listed_deletions(), &["c".to_string()]);
  }

  #[test]
  fn diff_is_deterministic() {
    let current: &[(&str, &[i64])] = &[("a", &[1, 2]), ("b", &[3]), ("c", &[4])];
    let previous: &[(&str, &[i64])] = &[("a", &[1]), ("c", &[5]), ("d", &[6])];
    assert_eq!(summary(&diff(current, previous)), summary(&diff(current, previous)));
  }
}
