use anyhow::{Context, Result};
use common::protocol::{ClaimRequest, HeartbeatRequest, TransitionRequest};
use common::{Task, TaskId, TaskStatus, WorkerId};
use reqwest::Client;

/// Cliente tipado del registry, compartido por todos los loops del worker.
#[derive(Clone)]
pub struct RegistryClient {
    http: Client,
    base_url: String,
}

impl RegistryClient {
    pub fn new(base_url: String) -> Self {
        Self {
            http: Client::new(),
            base_url,
        }
    }

    pub async fn tasks_by_status(&self, status: TaskStatus) -> Result<Vec<Task>> {
        let url = format!("{}/tasks/status/{}", self.base_url, status.as_str());
        let resp = self.http.get(&url).send().await?;
        let tasks = resp
            .error_for_status()?
            .json::<Vec<Task>>()
            .await
            .context("respuesta inválida al listar tareas")?;
        Ok(tasks)
    }

    /// Intenta el claim atómico. Devuelve false cuando otro worker llegó
    /// primero (conflicto); cualquier otra falla es un error.
    pub async fn claim(
        &self,
        id: &TaskId,
        worker_id: &WorkerId,
        from: TaskStatus,
        to: TaskStatus,
    ) -> Result<bool> {
        let url = format!("{}/tasks/{}/claim", self.base_url, id);
        let resp = self
            .http
            .post(&url)
            .json(&ClaimRequest {
                worker_id: worker_id.clone(),
                from,
                to,
            })
            .send()
            .await?;

        if resp.status() == reqwest::StatusCode::CONFLICT {
            return Ok(false);
        }
        resp.error_for_status()?;
        Ok(true)
    }

    pub async fn transition(
        &self,
        id: &TaskId,
        status: TaskStatus,
        error_message: Option<String>,
    ) -> Result<()> {
        let url = format!("{}/tasks/{}/status", self.base_url, id);
        self.http
            .put(&url)
            .json(&TransitionRequest {
                status,
                worker_id: None,
                error_message,
            })
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    /// Devuelve false cuando el registry rechaza el heartbeat: perdimos
    /// el lease y otro worker (o la reconciliación) se quedó con la tarea.
    pub async fn heartbeat(&self, id: &TaskId, worker_id: &WorkerId) -> Result<bool> {
        let url = format!("{}/tasks/{}/heartbeat", self.base_url, id);
        let resp = self
            .http
            .post(&url)
            .json(&HeartbeatRequest {
                worker_id: worker_id.clone(),
            })
            .send()
            .await?;
        Ok(resp.status().is_success())
    }
}
