use chrono::{DateTime, Duration, Utc};
use common::{TaskStatus, LEASE_TIMEOUT_SECS, MAX_TASK_RETRIES, RECONCILE_INTERVAL_SECS};
use tokio::time::sleep;
use tracing::{info, warn};

use crate::state::AppState;

/// Loop de reconciliación: el único mecanismo de recuperación del sistema.
/// Detecta leases vencidos y recicla (o entierra) las tareas afectadas.
pub async fn run_reconcile_loop(state: AppState) {
    loop {
        sleep(std::time::Duration::from_secs(RECONCILE_INTERVAL_SECS)).await;
        sweep_once(&state, Utc::now());
    }
}

/// Una pasada de reconciliación:
/// 1. busca tareas con dueño, en estado con claim y heartbeat vencido
/// 2. limpia el lease e incrementa retry_count
/// 3. si superó el máximo la marca failed; si no, la devuelve al handoff
///    anterior según la tabla de rollback
pub fn sweep_once(state: &AppState, now: DateTime<Utc>) {
    let timeout = Duration::seconds(LEASE_TIMEOUT_SECS);
    let mut tasks = state.tasks.lock().unwrap();

    for task in tasks.values_mut() {
        let expired = task.worker_id.is_some()
            && task.status.requires_claim()
            && task
                .last_heartbeat
                .map(|hb| now - hb > timeout)
                .unwrap_or(false);

        if !expired {
            continue;
        }

        warn!(
            "lease de la tarea {} vencido, el worker {} se da por muerto",
            task.id,
            task.worker_id.as_deref().unwrap_or("?")
        );

        task.worker_id = None;
        task.last_heartbeat = None;
        task.retry_count += 1;
        task.updated_at = now;

        if task.retry_count > MAX_TASK_RETRIES {
            task.status = TaskStatus::Failed;
            task.error_message = Some("Max retries exceeded".to_string());
            warn!(
                "tarea {} marcada failed tras {} reintentos",
                task.id, task.retry_count
            );
        } else if let Some(target) = task.status.rollback_target() {
            let old_status = task.status;
            task.status = target;
            info!(
                "tarea {} vuelve de {:?} a {:?} para el reintento #{}",
                task.id, old_status, target, task.retry_count
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::protocol::{ClaimRequest, TransitionRequest};
    use common::Task;

    fn tarea_con_lease_vencido(state: &AppState, status: TaskStatus, hace_secs: i64) -> Task {
        let task = state.create_task("doc.txt".to_string());
        state
            .transition(
                &task.id,
                TransitionRequest {
                    status: TaskStatus::UploadDone,
                    worker_id: None,
                    error_message: None,
                },
            )
            .unwrap();
        let from = status.rollback_target().unwrap();
        if from == TaskStatus::Chunked {
            state
                .transition(
                    &task.id,
                    TransitionRequest {
                        status: TaskStatus::Chunked,
                        worker_id: None,
                        error_message: None,
                    },
                )
                .unwrap();
        }
        state
            .claim(
                &task.id,
                ClaimRequest {
                    worker_id: "w-muerto".to_string(),
                    from,
                    to: status,
                },
            )
            .unwrap();

        // retrodatamos el heartbeat para simular el silencio del worker
        {
            let mut tasks = state.tasks.lock().unwrap();
            let t = tasks.get_mut(&task.id).unwrap();
            t.last_heartbeat = Some(Utc::now() - Duration::seconds(hace_secs));
        }
        state.get_task(&task.id).unwrap()
    }

    #[test]
    fn escenario_b_un_lease_vencido_se_recicla() {
        let state = AppState::new();
        let task = tarea_con_lease_vencido(&state, TaskStatus::Chunking, 40);

        sweep_once(&state, Utc::now());

        let task = state.get_task(&task.id).unwrap();
        assert_eq!(task.status, TaskStatus::UploadDone);
        assert!(task.worker_id.is_none());
        assert!(task.last_heartbeat.is_none());
        assert_eq!(task.retry_count, 1);
    }

    #[test]
    fn un_lease_de_embedding_vuelve_a_chunked() {
        let state = AppState::new();
        let task = tarea_con_lease_vencido(&state, TaskStatus::Embedding, 31);

        sweep_once(&state, Utc::now());

        let task = state.get_task(&task.id).unwrap();
        assert_eq!(task.status, TaskStatus::Chunked);
        assert_eq!(task.retry_count, 1);
    }

    #[test]
    fn un_heartbeat_fresco_no_se_toca() {
        let state = AppState::new();
        let task = tarea_con_lease_vencido(&state, TaskStatus::Chunking, 10);

        sweep_once(&state, Utc::now());

        let task = state.get_task(&task.id).unwrap();
        assert_eq!(task.status, TaskStatus::Chunking);
        assert_eq!(task.worker_id.as_deref(), Some("w-muerto"));
        assert_eq!(task.retry_count, 0);
    }

    #[test]
    fn escenario_c_el_cuarto_vencimiento_la_entierra() {
        let state = AppState::new();
        let mut task = tarea_con_lease_vencido(&state, TaskStatus::Chunking, 40);

        for esperado in 1..=3u32 {
            sweep_once(&state, Utc::now());
            task = state.get_task(&task.id).unwrap();
            assert_eq!(task.status, TaskStatus::UploadDone);
            assert_eq!(task.retry_count, esperado);

            // otro worker la vuelve a reclamar y también muere
            state
                .claim(
                    &task.id,
                    ClaimRequest {
                        worker_id: format!("w-{}", esperado),
                        from: TaskStatus::UploadDone,
                        to: TaskStatus::Chunking,
                    },
                )
                .unwrap();
            let mut tasks = state.tasks.lock().unwrap();
            tasks.get_mut(&task.id).unwrap().last_heartbeat =
                Some(Utc::now() - Duration::seconds(40));
        }

        sweep_once(&state, Utc::now());

        let task = state.get_task(&task.id).unwrap();
        assert_eq!(task.status, TaskStatus::Failed);
        assert_eq!(task.retry_count, 4);
        assert_eq!(task.error_message.as_deref(), Some("Max retries exceeded"));

        // y de failed no se sale
        assert!(state
            .transition(
                &task.id,
                TransitionRequest {
                    status: TaskStatus::UploadDone,
                    worker_id: None,
                    error_message: None,
                },
            )
            .is_err());
    }

    #[test]
    fn una_pasada_solo_incrementa_retry_una_vez() {
        let state = AppState::new();
        let task = tarea_con_lease_vencido(&state, TaskStatus::Chunking, 100);

        let now = Utc::now();
        sweep_once(&state, now);
        sweep_once(&state, now);

        // la segunda pasada la ve sin dueño y no la toca
        let task = state.get_task(&task.id).unwrap();
        assert_eq!(task.retry_count, 1);
    }
}
