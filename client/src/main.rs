use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use common::protocol::{CreateTaskRequest, QueryRequest, QueryResponse, TransitionRequest};
use common::{Task, TaskStatus};
use reqwest::Client;
use std::{env, path::PathBuf};

/// - En Docker: REGISTRY_URL=http://registry:8001
/// - Local: default http://localhost:8001
fn registry_base_url() -> String {
    env::var("REGISTRY_URL").unwrap_or_else(|_| "http://localhost:8001".to_string())
}

fn query_base_url() -> String {
    env::var("QUERY_URL").unwrap_or_else(|_| "http://localhost:8000".to_string())
}

fn data_dir() -> String {
    env::var("DATA_DIR").unwrap_or_else(|_| "/data/uploads".to_string())
}

#[derive(Parser)]
#[command(name = "client")]
#[command(about = "CLI para subir documentos y consultar el pipeline RAG")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sube un documento: crea la tarea, copia el archivo y la marca lista
    Upload {
        #[arg(value_name = "ARCHIVO")]
        path: PathBuf,
    },
    /// Consulta el estado de una tarea
    Status {
        #[arg(value_name = "TASK_ID")]
        id: String,
    },
    /// Lista todas las tareas del registry
    Tasks,
    /// Hace una consulta RAG sobre los documentos indexados
    Query {
        #[arg(value_name = "TEXTO")]
        text: String,
        #[arg(long, default_value_t = 5)]
        top_k: usize,
        /// Restringe la búsqueda a una tarea concreta
        #[arg(long)]
        task_id: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let client = Client::new();

    match cli.command {
        Commands::Upload { path } => upload(&client, path).await?,
        Commands::Status { id } => status(&client, &id).await?,
        Commands::Tasks => tasks(&client).await?,
        Commands::Query {
            text,
            top_k,
            task_id,
        } => query(&client, text, top_k, task_id).await?,
    }

    Ok(())
}

/// Frontera de upload: crear la tarea, dejar el archivo en el storage
/// compartido y recién ahí marcarla upload_done.
async fn upload(client: &Client, path: PathBuf) -> Result<()> {
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .context("la ruta no tiene nombre de archivo")?;

    if !path.is_file() {
        bail!("no existe el archivo {}", path.display());
    }

    let base_url = registry_base_url();
    let resp = client
        .post(format!("{}/tasks", base_url))
        .json(&CreateTaskRequest {
            filename: filename.clone(),
        })
        .send()
        .await?;
    let task: Task = resp.json().await?;

    let dest = format!("{}/{}_{}", data_dir(), task.id, filename);
    tokio::fs::copy(&path, &dest)
        .await
        .with_context(|| format!("no se pudo copiar el archivo a {}", dest))?;

    client
        .put(format!("{}/tasks/{}/status", base_url, task.id))
        .json(&TransitionRequest {
            status: TaskStatus::UploadDone,
            worker_id: None,
            error_message: None,
        })
        .send()
        .await?
        .error_for_status()?;

    println!("Documento subido:");
    println!("  task id: {}", task.id);
    println!("  archivo: {}", filename);
    println!("  estado: upload_done");
    Ok(())
}

async fn status(client: &Client, id: &str) -> Result<()> {
    let resp = client
        .get(format!("{}/tasks/{}", registry_base_url(), id))
        .send()
        .await?;

    if !resp.status().is_success() {
        println!("No se encontró la tarea con id {id}");
        return Ok(());
    }

    let task: Task = resp.json().await?;
    print_task(&task);
    Ok(())
}

async fn tasks(client: &Client) -> Result<()> {
    let resp = client
        .get(format!("{}/tasks", registry_base_url()))
        .send()
        .await?;
    let tasks: Vec<Task> = resp.json().await?;

    if tasks.is_empty() {
        println!("No hay tareas.");
        return Ok(());
    }

    for task in tasks {
        println!(
            "{}  {:12}  retry={}  {}",
            task.id,
            task.status.as_str(),
            task.retry_count,
            task.filename
        );
    }
    Ok(())
}

async fn query(client: &Client, text: String, top_k: usize, task_id: Option<String>) -> Result<()> {
    let resp = client
        .post(format!("{}/query", query_base_url()))
        .json(&QueryRequest {
            query: text,
            task_ids: task_id.map(|id| vec![id]),
            top_k,
        })
        .send()
        .await?;

    if !resp.status().is_success() {
        println!("La consulta falló: {}", resp.status());
        return Ok(());
    }

    let answer: QueryResponse = resp.json().await?;
    println!("Respuesta:");
    println!("  {}", answer.response);
    println!("Fuentes:");
    for source in answer.sources {
        println!(
            "  {} (tarea {}, score {:.4})",
            source.chunk_id, source.task_id, source.score
        );
    }
    Ok(())
}

fn print_task(task: &Task) {
    println!("Tarea:");
    println!("  id: {}", task.id);
    println!("  archivo: {}", task.filename);
    println!("  estado: {}", task.status.as_str());
    println!("  retry_count: {}", task.retry_count);
    if let Some(worker) = &task.worker_id {
        println!("  worker: {}", worker);
    }
    if let Some(error) = &task.error_message {
        println!("  error: {}", error);
    }
}
