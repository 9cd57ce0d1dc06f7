use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type TaskId = String;
pub type WorkerId = String;

/// Estados por los que pasa una tarea en el pipeline.
/// Se intercambian por la red como los ocho tokens en snake_case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    UploadDone,
    Chunking,
    Chunked,
    Embedding,
    Embedded,
    Indexed,
    Failed,
}

/// Tabla de rollback de la reconciliación: estado in-flight -> estado de
/// handoff anterior. Si se agrega otro stage con claim, se agrega una fila.
pub const ROLLBACK: &[(TaskStatus, TaskStatus)] = &[
    (TaskStatus::Chunking, TaskStatus::UploadDone),
    (TaskStatus::Embedding, TaskStatus::Chunked),
];

impl TaskStatus {
    /// Token de este status en la red (el mismo que usa serde).
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::UploadDone => "upload_done",
            TaskStatus::Chunking => "chunking",
            TaskStatus::Chunked => "chunked",
            TaskStatus::Embedding => "embedding",
            TaskStatus::Embedded => "embedded",
            TaskStatus::Indexed => "indexed",
            TaskStatus::Failed => "failed",
        }
    }

    /// Estados que solo se entran tomando ownership de la tarea.
    pub fn requires_claim(&self) -> bool {
        ROLLBACK.iter().any(|(claiming, _)| claiming == self)
    }

    /// Estados terminales: de acá no se sale.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Indexed | TaskStatus::Failed)
    }

    /// A qué estado de handoff vuelve la tarea cuando expira el lease.
    pub fn rollback_target(&self) -> Option<TaskStatus> {
        ROLLBACK
            .iter()
            .find(|(claiming, _)| claiming == self)
            .map(|(_, target)| *target)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub filename: String,
    pub status: TaskStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    /// Worker que tiene el lease de la tarea, si hay uno.
    pub worker_id: Option<WorkerId>,
    /// Última señal de vida del worker dueño del lease.
    pub last_heartbeat: Option<DateTime<Utc>>,
    /// Veces que la tarea fue reciclada por expiración de lease.
    pub retry_count: u32,
    /// Motivo de fallo, solo cuando status == failed.
    pub error_message: Option<String>,
}

impl Task {
    pub fn new(filename: String) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            filename,
            status: TaskStatus::Pending,
            created_at: now,
            updated_at: now,
            worker_id: None,
            last_heartbeat: None,
            retry_count: 0,
            error_message: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn los_tokens_de_status_son_snake_case() {
        assert_eq!(
            serde_json::to_string(&TaskStatus::UploadDone).unwrap(),
            "\"upload_done\""
        );
        assert_eq!(
            serde_json::from_str::<TaskStatus>("\"chunking\"").unwrap(),
            TaskStatus::Chunking
        );
    }

    #[test]
    fn as_str_coincide_con_el_token_de_serde() {
        let json = serde_json::to_string(&TaskStatus::Embedded).unwrap();
        assert_eq!(json, format!("\"{}\"", TaskStatus::Embedded.as_str()));
    }

    #[test]
    fn un_token_desconocido_se_rechaza() {
        assert!(serde_json::from_str::<TaskStatus>("\"vectorized\"").is_err());
    }

    #[test]
    fn solo_chunking_y_embedding_requieren_claim() {
        let claiming: Vec<TaskStatus> = [
            TaskStatus::Pending,
            TaskStatus::UploadDone,
            TaskStatus::Chunking,
            TaskStatus::Chunked,
            TaskStatus::Embedding,
            TaskStatus::Embedded,
            TaskStatus::Indexed,
            TaskStatus::Failed,
        ]
        .into_iter()
        .filter(|s| s.requires_claim())
        .collect();

        assert_eq!(claiming, vec![TaskStatus::Chunking, TaskStatus::Embedding]);
    }

    #[test]
    fn la_tabla_de_rollback_mapea_al_handoff_anterior() {
        assert_eq!(
            TaskStatus::Chunking.rollback_target(),
            Some(TaskStatus::UploadDone)
        );
        assert_eq!(
            TaskStatus::Embedding.rollback_target(),
            Some(TaskStatus::Chunked)
        );
        assert_eq!(TaskStatus::Chunked.rollback_target(), None);
    }

    #[test]
    fn una_tarea_nueva_arranca_pending_y_sin_lease() {
        let t = Task::new("doc.txt".to_string());
        assert_eq!(t.status, TaskStatus::Pending);
        assert!(t.worker_id.is_none());
        assert!(t.last_heartbeat.is_none());
        assert_eq!(t.retry_count, 0);
    }
}
