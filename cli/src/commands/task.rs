use serde_json::{Map, Value};
use tokio::sync::broadcast::{self, error::RecvError};

use qualcode_core::api::{CliError, TaskError, TaskOrchestrator, TaskSnapshot, TaskUpdate};

use super::cli::{RunArgs, StatusArgs, TaskRefArgs};

/// Builds the submission object from `--params-json` and `--param k=v` pairs.
pub fn build_params(pairs: &[String], base: Option<&str>) -> Result<Value, CliError> {
    let mut map = match base.map(str::trim).filter(|s| !s.is_empty()) {
        Some(raw) => match serde_json::from_str::<Value>(raw) {
            Ok(Value::Object(m)) => m,
            Ok(_) => {
                return Err(CliError::Task(TaskError::validation(
                    "--params-json must be a JSON object",
                )))
            }
            Err(e) => {
                return Err(CliError::Task(TaskError::validation(format!(
                    "--params-json is not valid JSON: {e}"
                ))))
            }
        },
        None => Map::new(),
    };

    for pair in pairs {
        let Some((key, raw)) = pair.split_once('=') else {
            return Err(CliError::Task(TaskError::validation(format!(
                "--param expects KEY=VALUE, got {pair:?}"
            ))));
        };
        let key = key.trim();
        if key.is_empty() {
            return Err(CliError::Task(TaskError::validation(format!(
                "--param has an empty key: {pair:?}"
            ))));
        }
        let value =
            serde_json::from_str::<Value>(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
        map.insert(key.to_string(), value);
    }
    Ok(Value::Object(map))
}

pub async fn run(orch: &TaskOrchestrator, args: RunArgs) -> Result<i32, CliError> {
    let params = build_params(&args.params, args.params_json.as_deref())?;
    let updates = orch.subscribe();
    let task = orch.submit(params).await?;
    println!("submitted {} task {}", task.kind, task.task_id);
    follow(updates, &task.task_id).await
}

/// Checks the old task once (recording its checkpoint), then resumes it.
pub async fn resume(orch: &TaskOrchestrator, args: TaskRefArgs) -> Result<i32, CliError> {
    let snapshot = orch.poll(&args.task_id).await?;
    print_snapshot(&snapshot);

    let updates = orch.subscribe();
    let task = orch.resume(&args.task_id).await?;
    println!("resumed {} as {}", args.task_id, task.task_id);
    follow(updates, &task.task_id).await
}

pub async fn watch(orch: &TaskOrchestrator, args: TaskRefArgs) -> Result<i32, CliError> {
    let updates = orch.subscribe();
    let task = orch.attach(&args.task_id)?;
    println!("watching {} task {}", task.kind, task.task_id);
    follow(updates, &task.task_id).await
}

pub async fn status(orch: &TaskOrchestrator, args: StatusArgs) -> Result<i32, CliError> {
    let snapshot = orch.poll(&args.task_id).await?;
    let out = serde_json::to_string_pretty(&snapshot)
        .map_err(|e| CliError::Command(e.to_string()))?;
    println!("{out}");
    Ok(0)
}

/// Prints updates for `task_id` until the session ends.
pub async fn follow(
    mut updates: broadcast::Receiver<TaskUpdate>,
    task_id: &str,
) -> Result<i32, CliError> {
    loop {
        let update = match updates.recv().await {
            Ok(u) => u,
            Err(RecvError::Lagged(skipped)) => {
                tracing::debug!(target: "qualcode.task", stage = "cli.follow.lagged", skipped = skipped);
                continue;
            }
            Err(RecvError::Closed) => {
                return Err(CliError::Command("update channel closed".to_string()));
            }
        };
        if update.task_id() != task_id {
            continue;
        }
        if let Some(exit) = settle(update)? {
            return Ok(exit);
        }
    }
}

/// Renders one update; `Some(exit)` once the task is finished.
fn settle(update: TaskUpdate) -> Result<Option<i32>, CliError> {
    match update {
        TaskUpdate::Started(_) => Ok(None),
        TaskUpdate::Progress(snapshot) => {
            print_snapshot(&snapshot);
            Ok(None)
        }
        TaskUpdate::Completed { result, .. } => {
            let out = serde_json::to_string_pretty(&result)
                .map_err(|e| CliError::Command(e.to_string()))?;
            println!("{out}");
            Ok(Some(0))
        }
        TaskUpdate::Failed { error, partial, .. } => {
            if let Some(partial) = partial {
                let out = serde_json::to_string_pretty(&partial)
                    .map_err(|e| CliError::Command(e.to_string()))?;
                println!("{out}");
            }
            if error.resumable {
                eprintln!("task can be resumed with `qualcode resume --task-id {}`", error.task_id);
            }
            Err(CliError::Task(TaskError::TaskReported(error)))
        }
        TaskUpdate::ConnectionLost { task_id, failures } => {
            Err(CliError::Task(TaskError::ConnectionLost { task_id, failures }))
        }
        TaskUpdate::ResultFetchFailed { message, .. } => Err(CliError::Command(message)),
        TaskUpdate::Cancelled { .. } => Ok(Some(0)),
    }
}

fn print_snapshot(snapshot: &TaskSnapshot) {
    let progress = match &snapshot.progress {
        Value::Null => String::new(),
        other => format!(" {other}"),
    };
    match &snapshot.message {
        Some(msg) => println!("[{}] {}{} {}", snapshot.task_id, snapshot.status, progress, msg),
        None => println!("[{}] {}{}", snapshot.task_id, snapshot.status, progress),
    }
}
