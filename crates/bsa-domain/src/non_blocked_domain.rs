use crate::DomainError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Motivo por el que un dominio no puede bloquearse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Reason {
  Invalid,
  Registered,
  Reserved,
}

impl Reason {
  pub fn as_str(&self) -> &'static str {
    match self {
      Reason::Invalid => "INVALID",
      Reason::Registered => "REGISTERED",
      Reason::Reserved => "RESERVED",
    }
  }
}

impl fmt::Display for Reason {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for Reason {
  type Err = DomainError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.trim() {
      "INVALID" => Ok(Reason::Invalid),
      "REGISTERED" => Ok(Reason::Registered),
      "RESERVED" => Ok(Reason::Reserved),
      other => Err(DomainError::ValidationError(format!("motivo desconocido: {}", other))),
    }
  }
}

/// Nombre de dominio completo (`label.tld`) que no se puede bloquear.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NonBlockedDomain {
  pub domain: String,
  pub reason: Reason,
}

impl NonBlockedDomain {
  pub fn new(domain: impl Into<String>, reason: Reason) -> Self {
    Self { domain: domain.into(), reason }
  }

  pub fn of(label: &str, tld: &str, reason: Reason) -> Self {
    Self::new(format!("{}.{}", label, tld), reason)
  }
}

/// Formato de artefacto: `domain,REASON`.
impl fmt::Display for NonBlockedDomain {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{},{}", self.domain, self.reason)
  }
}

impl FromStr for NonBlockedDomain {
  type Err = DomainError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let (domain, reason) = s.trim().split_once(',').ok_or_else(|| {
                                                       DomainError::SerializationError(format!("dominio mal formado: '{}'", s))
                                                     })?;
    Ok(NonBlockedDomain::new(domain.trim(), reason.parse()?))
  }
}
