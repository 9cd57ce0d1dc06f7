use std::{
    collections::HashSet,
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use common::{Task, TaskId, TaskStatus, WorkerId, HEARTBEAT_INTERVAL_SECS, POLL_INTERVAL_SECS};
use tokio::time::sleep;
use tracing::{info, warn};

use crate::registry_client::RegistryClient;

/// Lógica de procesamiento de un stage, elegida al construir el worker.
/// El harness pone el polling, el claim, el heartbeat y el handoff; el
/// adapter pone el trabajo en sí.
#[async_trait]
pub trait StageAdapter: Send + Sync {
    fn name(&self) -> &'static str;
    /// Estado de handoff del que este stage toma trabajo.
    fn input_status(&self) -> TaskStatus;
    /// Estado in-flight que entra con el claim.
    fn working_status(&self) -> TaskStatus;
    /// Estado de handoff que deja la tarea lista para el stage siguiente.
    fn done_status(&self) -> TaskStatus;
    /// Upstreams de los que este stage saca artefactos: un loop por cada uno.
    fn upstreams(&self) -> Vec<String>;

    async fn process(&self, task: &Task, upstream: &str) -> anyhow::Result<()>;
}

/// Tareas que este worker tiene reclamadas ahora mismo; el loop de
/// heartbeats las recorre sin importar en qué parte del trabajo estén.
pub type OwnedTasks = Arc<Mutex<HashSet<TaskId>>>;

/// Arranca el stage: un loop de claim por upstream más el loop de heartbeats.
pub fn run_stage(worker_id: WorkerId, registry: RegistryClient, adapter: Arc<dyn StageAdapter>) {
    let owned: OwnedTasks = Arc::new(Mutex::new(HashSet::new()));

    for upstream in adapter.upstreams() {
        tokio::spawn(claim_loop(
            worker_id.clone(),
            registry.clone(),
            adapter.clone(),
            upstream,
            owned.clone(),
        ));
    }

    tokio::spawn(heartbeat_loop(worker_id, registry, owned));
}

/// Un loop de fan-out: descubre tareas elegibles en el registry compartido
/// pero saca los artefactos solo de su propio upstream.
async fn claim_loop(
    worker_id: WorkerId,
    registry: RegistryClient,
    adapter: Arc<dyn StageAdapter>,
    upstream: String,
    owned: OwnedTasks,
) {
    info!(
        "loop de {} arrancado contra el upstream {}",
        adapter.name(),
        upstream
    );

    loop {
        sleep(Duration::from_secs(POLL_INTERVAL_SECS)).await;

        let tasks = match registry.tasks_by_status(adapter.input_status()).await {
            Ok(tasks) => tasks,
            Err(e) => {
                warn!("error consultando el registry: {:?}", e);
                continue;
            }
        };

        for task in tasks {
            if task.worker_id.is_some() {
                continue;
            }

            match registry
                .claim(
                    &task.id,
                    &worker_id,
                    adapter.input_status(),
                    adapter.working_status(),
                )
                .await
            {
                Ok(true) => {}
                // otro loop o worker llegó primero
                Ok(false) => continue,
                Err(e) => {
                    warn!("error reclamando la tarea {}: {:?}", task.id, e);
                    continue;
                }
            }

            info!(
                "tarea {} reclamada ({} sobre {})",
                task.id,
                adapter.name(),
                upstream
            );
            owned.lock().unwrap().insert(task.id.clone());

            let outcome = adapter.process(&task, &upstream).await;

            let handoff = match outcome {
                Ok(()) => {
                    info!("tarea {} completada por {}", task.id, adapter.name());
                    registry.transition(&task.id, adapter.done_status(), None).await
                }
                Err(e) => {
                    warn!("la tarea {} falló en {}: {:?}", task.id, adapter.name(), e);
                    registry
                        .transition(&task.id, TaskStatus::Failed, Some(e.to_string()))
                        .await
                }
            };
            if let Err(e) = handoff {
                warn!("no se pudo reportar el handoff de {}: {:?}", task.id, e);
            }

            owned.lock().unwrap().remove(&task.id);
        }
    }
}

/// Heartbeats independientes del procesamiento: mientras el adapter trabaja,
/// acá se sigue avisando que el worker está vivo.
async fn heartbeat_loop(worker_id: WorkerId, registry: RegistryClient, owned: OwnedTasks) {
    loop {
        sleep(Duration::from_secs(HEARTBEAT_INTERVAL_SECS)).await;

        let ids: Vec<TaskId> = owned.lock().unwrap().iter().cloned().collect();
        for id in ids {
            match registry.heartbeat(&id, &worker_id).await {
                Ok(true) => {}
                Ok(false) => warn!("el registry rechazó el heartbeat de {}: lease perdido", id),
                Err(e) => warn!("error enviando heartbeat de {}: {:?}", id, e),
            }
        }
    }
}
