// Archivo: retry.rs
// Propósito: reintentos con backoff exponencial acotado para las llamadas a
// colaboradores externos dentro de un stage.
use crate::errors::WorkflowError;
use log::warn;
use std::fmt::Display;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryBackoff {
  pub initial_delay: Duration,
  pub max_delay: Duration,
  pub max_attempts: usize,
}

impl RetryBackoff {
  pub fn new(initial_delay: Duration, max_delay: Duration) -> Self {
    Self { initial_delay, max_delay, max_attempts: 1 }
  }

  pub fn with_max_attempts(mut self, max_attempts: usize) -> Self {
    self.max_attempts = max_attempts.max(1);
    self
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDisposition {
  Retry,
  Abort,
}

/// Clasificación por defecto: se reintenta sólo lo que
/// [`WorkflowError::is_retriable`] marca como transitorio.
pub fn classify_workflow_error(_attempt: usize, err: &WorkflowError) -> RetryDisposition {
  if err.is_retriable() {
    RetryDisposition::Retry
  } else {
    RetryDisposition::Abort
  }
}

/// Ejecuta `operation` hasta que tenga éxito, `classify_error` devuelva
/// `Abort` o se agoten `max_attempts` intentos. El último error se
/// propaga sin cambios. `operation` recibe el número de intento (desde 1).
pub fn retry_with_backoff<T, E, F, C>(config: &RetryBackoff, what: &str, mut operation: F, mut classify_error: C)
                                      -> Result<T, E>
  where F: FnMut(usize) -> Result<T, E>,
        C: FnMut(usize, &E) -> RetryDisposition,
        E: Display
{
  let mut attempt = 0;
  let mut backoff = config.initial_delay;
  loop {
    attempt += 1;
    match operation(attempt) {
      Ok(value) => return Ok(value),
      Err(err) => match classify_error(attempt, &err) {
        RetryDisposition::Abort => return Err(err),
        RetryDisposition::Retry => {
          if attempt >= config.max_attempts {
            warn!("{}: intento {}/{} falló, sin más reintentos: {}", what, attempt, config.max_attempts, err);
            return Err(err);
          }
          warn!("{}: intento {}/{} falló, reintento en {:?}: {}", what, attempt, config.max_attempts, backoff, err);
          if !backoff.is_zero() {
            std::thread::sleep(backoff);
          }
          backoff = next_backoff(backoff, config.max_delay);
        }
      },
    }
  }
}

fn next_backoff(current: Duration, max_backoff: Duration) -> Duration {
  if current.is_zero() {
    return max_backoff.min(Duration::from_millis(1));
  }
  current.saturating_mul(2).min(max_backoff)
}
