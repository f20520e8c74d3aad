use bsa_workflow::{BsaActionFactory, InvocationStatus};
use log::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Inicializa el subscriber de logs. `RUST_LOG` controla el filtro (por
/// defecto `info`); los eventos de `log` se redirigen al subscriber.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter)
                                     .with_target(true)
                                     .try_init();
}

/// Una invocación del pipeline de descarga, pensada para un disparo
/// periódico (cron). Siempre termina con código 0: el siguiente disparo
/// reanuda desde el último stage persistido.
fn main() {
    let _ = dotenvy::dotenv();
    init_tracing();

    let action = match BsaActionFactory::from_env() {
        Ok(action) => action,
        Err(e) => {
            error!("No se pudo armar el pipeline BSA: {}", e);
            return;
        }
    };
    let status = action.run();
    match &status {
        InvocationStatus::Completed(outcome) => info!("Invocación terminada: {:?}", outcome),
        InvocationStatus::LockNotAcquired => info!("Invocación omitida: lock tomado por otro worker"),
        InvocationStatus::Failed(msg) => warn!("Invocación fallida, se reanudará en el próximo disparo: {}", msg),
    }
    info!("status {}", status.http_status());
}
