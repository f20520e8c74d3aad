// Archivo: report.rs
// Propósito: documentos JSON que se envían a la autoridad.
use crate::errors::WorkflowError;
use bsa_domain::{NonBlockedDomain, Order, OrderType};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct OrderStatus {
  block_order_id: i64,
  status: &'static str,
}

fn in_progress_status(order_type: OrderType) -> &'static str {
  match order_type {
    OrderType::Create => "ActivationInProgress",
    OrderType::Delete => "ReleaseInProgress",
  }
}

fn completed_status(order_type: OrderType) -> &'static str {
  match order_type {
    OrderType::Create => "Active",
    OrderType::Delete => "Closed",
  }
}

fn to_order_status_report<I>(orders: I, status: fn(OrderType) -> &'static str) -> Result<Option<String>, WorkflowError>
  where I: IntoIterator<Item = Order>
{
  let entries: Vec<OrderStatus> = orders.into_iter()
                                        .map(|o| OrderStatus { block_order_id: o.order_id, status: status(o.order_type) })
                                        .collect();
  if entries.is_empty() {
    return Ok(None);
  }
  Ok(Some(serde_json::to_string_pretty(&entries)?))
}

/// Reporte de órdenes en proceso: `[{"blockOrderId": 1, "status":
/// "ActivationInProgress"}, ...]`. `None` si no hay órdenes.
pub fn to_in_progress_orders_report<I>(orders: I) -> Result<Option<String>, WorkflowError>
  where I: IntoIterator<Item = Order>
{
  to_order_status_report(orders, in_progress_status)
}

/// Reporte de órdenes completadas (`Active` / `Closed`).
pub fn to_completed_orders_report<I>(orders: I) -> Result<Option<String>, WorkflowError>
  where I: IntoIterator<Item = Order>
{
  to_order_status_report(orders, completed_status)
}

/// Reporte de dominios no bloqueables agrupados por motivo en minúsculas:
/// `{"registered": [...], "reserved": [...]}`. Dentro de cada motivo los
/// dominios van ordenados y sin repetir.
pub fn to_unblockable_domains_report<I>(domains: I) -> Result<Option<String>, WorkflowError>
  where I: IntoIterator<Item = NonBlockedDomain>
{
  let mut by_reason: BTreeMap<String, std::collections::BTreeSet<String>> = BTreeMap::new();
  for d in domains {
    by_reason.entry(d.reason.as_str().to_lowercase()).or_default().insert(d.domain);
  }
  if by_reason.is_empty() {
    return Ok(None);
  }
  Ok(Some(serde_json::to_string_pretty(&by_reason)?))
}
