//! Dashboard commands.

use anyhow::{Context, Result, bail};
use taskdesk_core::api::TasksApi;
use taskdesk_core::routes::{self, Navigation, Route};
use taskdesk_core::session::SessionManager;
use taskdesk_core::tasks::{TaskFilter, TaskStore, format_created_at};
use taskdesk_core::validation::TaskForm;
use taskdesk_types::{Task, TaskStatus, UpdateTaskPayload};

/// Restores the session and passes the dashboard route guard.
pub async fn open_dashboard(session: &SessionManager) -> Result<TaskStore> {
    let status = session.restore().await;
    match routes::navigate(Route::Dashboard.path(), status) {
        Navigation::Render(Route::Dashboard) => {
            Ok(TaskStore::new(TasksApi::new(session.client().clone())))
        }
        Navigation::Loading => bail!("Session is still loading"),
        _ => bail!("Not signed in. Run `taskdesk signin` first."),
    }
}

pub async fn list(store: &mut TaskStore, status: Option<TaskStatus>) -> Result<()> {
    store
        .set_filter(TaskFilter::from(status))
        .await
        .context("load tasks")?;

    let tasks = store.visible();
    if tasks.is_empty() {
        println!("No tasks found.");
        return Ok(());
    }
    for task in tasks {
        println!(
            "{}  {:<11}  {:<12}  {}",
            task.id,
            task.status.label(),
            format_created_at(&task.created_at),
            task.title
        );
    }
    Ok(())
}

pub async fn show(store: &TaskStore, id: &str) -> Result<()> {
    let task = store
        .fetch_one(id)
        .await
        .with_context(|| format!("load task '{id}'"))?;
    print_task(&task);
    Ok(())
}

pub async fn add(store: &mut TaskStore, title: String, description: Option<String>) -> Result<()> {
    let task = store.create(TaskForm::new(title, description)).await?;
    println!("Created task {}", task.id);
    print_task(&task);
    Ok(())
}

pub async fn edit(
    store: &mut TaskStore,
    id: &str,
    title: Option<String>,
    description: Option<String>,
) -> Result<()> {
    let payload = UpdateTaskPayload {
        title,
        description,
        status: None,
    };
    let task = store.update(id, payload).await?;
    println!("Updated task {}", task.id);
    print_task(&task);
    Ok(())
}

pub async fn set_status(store: &mut TaskStore, id: &str, status: TaskStatus) -> Result<()> {
    store.fetch().await.context("load tasks")?;
    let unchanged = store
        .tasks()
        .iter()
        .any(|t| t.id == id && t.status == status);

    let task = store.update_status(id, status).await?;
    if unchanged {
        println!("Task {} is already {}", task.id, task.status.label());
    } else {
        println!("Task {} is now {}", task.id, task.status.label());
    }
    Ok(())
}

pub async fn delete(store: &mut TaskStore, id: &str) -> Result<()> {
    store
        .delete(id)
        .await
        .with_context(|| format!("delete task '{id}'"))?;
    println!("Deleted task {id}");
    Ok(())
}

fn print_task(task: &Task) {
    println!("{}", task.title);
    println!("  id:      {}", task.id);
    println!("  status:  {}", task.status.label());
    println!("  created: {}", format_created_at(&task.created_at));
    if let Some(description) = task.description.as_deref().filter(|d| !d.is_empty()) {
        println!();
        println!("{description}");
    }
}
