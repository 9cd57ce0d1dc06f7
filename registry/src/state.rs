// registry/src/state.rs

use chrono::Utc;
use common::protocol::{ClaimRequest, TransitionRequest};
use common::{Task, TaskId, TaskStatus, WorkerId};
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};
use tracing::info;

/// Resultado de una mutación rechazada sobre el mapa de tareas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateError {
    /// El task id no existe.
    NotFound,
    /// La tarea está en un estado terminal y no se puede salir de él.
    Terminal,
    /// El compare-and-swap del claim no encontró la tarea libre en el
    /// estado esperado: otro worker llegó primero.
    Conflict,
}

#[derive(Clone)]
pub struct AppState {
    pub tasks: Arc<Mutex<HashMap<TaskId, Task>>>,
}

impl AppState {
    pub fn new() -> Self {
        Self {
            tasks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn create_task(&self, filename: String) -> Task {
        let task = Task::new(filename);
        let mut tasks = self.tasks.lock().unwrap();
        tasks.insert(task.id.clone(), task.clone());
        info!("tarea {} creada para el archivo {}", task.id, task.filename);
        task
    }

    pub fn get_task(&self, id: &TaskId) -> Option<Task> {
        let tasks = self.tasks.lock().unwrap();
        tasks.get(id).cloned()
    }

    pub fn all_tasks(&self) -> Vec<Task> {
        let tasks = self.tasks.lock().unwrap();
        tasks.values().cloned().collect()
    }

    /// Snapshot consistente: se toma el lock una sola vez y se clona.
    pub fn tasks_by_status(&self, status: TaskStatus) -> Vec<Task> {
        let tasks = self.tasks.lock().unwrap();
        tasks
            .values()
            .filter(|t| t.status == status)
            .cloned()
            .collect()
    }

    /// Transición confiada: no se validan aristas del grafo (los workers
    /// piden aristas válidas), solo que no se salga de un estado terminal.
    /// Repetir el estado actual es un no-op aceptado.
    pub fn transition(&self, id: &TaskId, req: TransitionRequest) -> Result<Task, UpdateError> {
        let mut tasks = self.tasks.lock().unwrap();
        let task = tasks.get_mut(id).ok_or(UpdateError::NotFound)?;

        if task.status == req.status {
            return Ok(task.clone());
        }
        if task.status.is_terminal() {
            return Err(UpdateError::Terminal);
        }

        let old_status = task.status;
        task.status = req.status;
        task.updated_at = Utc::now();

        if req.status.requires_claim() {
            task.worker_id = req.worker_id.clone();
            task.last_heartbeat = Some(Utc::now());
        } else {
            // Estados de handoff y terminales quedan sin dueño.
            task.worker_id = None;
            task.last_heartbeat = None;
        }

        if req.status == TaskStatus::Failed {
            task.error_message = req
                .error_message
                .or_else(|| Some("unspecified failure".to_string()));
        }

        info!(
            "tarea {} pasó de {:?} a {:?}{}",
            id,
            old_status,
            task.status,
            req.worker_id
                .as_deref()
                .map(|w| format!(" (worker {})", w))
                .unwrap_or_default()
        );
        Ok(task.clone())
    }

    /// Claim atómico: compare-and-swap bajo el lock del mapa. Solo tiene
    /// éxito si la tarea sigue en el estado de handoff esperado y sin dueño.
    pub fn claim(&self, id: &TaskId, req: ClaimRequest) -> Result<Task, UpdateError> {
        let mut tasks = self.tasks.lock().unwrap();
        let task = tasks.get_mut(id).ok_or(UpdateError::NotFound)?;

        if task.status != req.from || task.worker_id.is_some() {
            return Err(UpdateError::Conflict);
        }

        task.status = req.to;
        task.worker_id = Some(req.worker_id.clone());
        task.last_heartbeat = Some(Utc::now());
        task.updated_at = Utc::now();

        info!("tarea {} reclamada por el worker {}", id, req.worker_id);
        Ok(task.clone())
    }

    /// Refresca el lease solo si el worker sigue siendo el dueño. Un worker
    /// que perdió el lease recibe false y no muta nada (fencing).
    pub fn heartbeat(&self, id: &TaskId, worker_id: &WorkerId) -> bool {
        let mut tasks = self.tasks.lock().unwrap();
        match tasks.get_mut(id) {
            Some(task) if task.worker_id.as_ref() == Some(worker_id) => {
                task.last_heartbeat = Some(Utc::now());
                true
            }
            _ => false,
        }
    }
}
