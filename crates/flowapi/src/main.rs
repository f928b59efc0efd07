use actix_cors::Cors;
use actix_web::{
    get, post, web, App, HttpResponse, HttpServer, Responder, Result as ActixResult,
};
use flowengine::{FlowEngine, MemoryStore, RunStore, TaskRegistry};
use flowmodel::{EngineError, Flow, StoreError};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Application state shared across handlers
struct AppState {
    engine: FlowEngine,
    store: Arc<MemoryStore>,
    registry: Arc<TaskRegistry>,
}

/// Request body for flow creation
#[derive(Debug, Deserialize)]
struct FlowPayload {
    flow: Flow,
}

/// Response for flow creation
#[derive(Debug, Serialize)]
struct FlowCreated {
    flow_id: String,
}

/// Response for run start
#[derive(Debug, Serialize)]
struct StartResponse {
    run_id: Uuid,
}

/// Response for run stop
#[derive(Debug, Serialize)]
struct StopResponse {
    run_id: Uuid,
    stopped: bool,
}

/// Error response
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

impl ErrorResponse {
    fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

/// Health check endpoint
#[get("/health")]
async fn health_check() -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "service": "flowapi"
    }))
}

/// List registered task names
#[get("/tasks")]
async fn list_tasks(data: web::Data<AppState>) -> ActixResult<impl Responder> {
    Ok(HttpResponse::Ok().json(data.registry.task_names().await))
}

/// Create a new flow
#[post("/flows")]
async fn create_flow(
    data: web::Data<AppState>,
    payload: web::Json<FlowPayload>,
) -> ActixResult<impl Responder> {
    let flow = payload.into_inner().flow;

    // Every declared task must have a registered implementation.
    let registered = data.registry.task_names().await;
    for task in &flow.tasks {
        if !registered.contains(&task.name) {
            return Ok(HttpResponse::BadRequest().json(ErrorResponse::new(format!(
                "task {} not registered",
                task.name
            ))));
        }
    }

    let flow_id = flow.id.clone();
    info!("creating flow: {} ({})", flow.name, flow_id);

    match data.store.create_flow(flow).await {
        Ok(()) => Ok(HttpResponse::Created().json(FlowCreated { flow_id })),
        Err(StoreError::FlowExists(_)) => {
            Ok(HttpResponse::Conflict().json(ErrorResponse::new("flow already exists")))
        }
        Err(err) => {
            Ok(HttpResponse::InternalServerError().json(ErrorResponse::new(err.to_string())))
        }
    }
}

/// List all flows
#[get("/flows")]
async fn list_flows(data: web::Data<AppState>) -> ActixResult<impl Responder> {
    match data.store.list_flows().await {
        Ok(flows) => Ok(HttpResponse::Ok().json(flows)),
        Err(err) => {
            Ok(HttpResponse::InternalServerError().json(ErrorResponse::new(err.to_string())))
        }
    }
}

/// Get a specific flow
#[get("/flows/{id}")]
async fn get_flow(
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> ActixResult<impl Responder> {
    let flow_id = path.into_inner();
    match data.store.get_flow(&flow_id).await {
        Ok(Some(flow)) => Ok(HttpResponse::Ok().json(flow)),
        Ok(None) => Ok(HttpResponse::NotFound().json(ErrorResponse::new("flow not found"))),
        Err(err) => {
            Ok(HttpResponse::InternalServerError().json(ErrorResponse::new(err.to_string())))
        }
    }
}

/// Start a run of a flow
#[post("/flows/{id}/start")]
async fn start_flow(
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> ActixResult<impl Responder> {
    let flow_id = path.into_inner();
    match data.engine.start(&flow_id).await {
        Ok(run_id) => Ok(HttpResponse::Ok().json(StartResponse { run_id })),
        Err(EngineError::FlowNotFound(_)) => {
            Ok(HttpResponse::NotFound().json(ErrorResponse::new("flow not found")))
        }
        Err(err) => {
            Ok(HttpResponse::InternalServerError().json(ErrorResponse::new(err.to_string())))
        }
    }
}

/// List runs of a flow, most recent first
#[get("/flows/{id}/runs")]
async fn list_runs(
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> ActixResult<impl Responder> {
    match data.store.list_runs(&path.into_inner()).await {
        Ok(runs) => Ok(HttpResponse::Ok().json(runs)),
        Err(err) => {
            Ok(HttpResponse::InternalServerError().json(ErrorResponse::new(err.to_string())))
        }
    }
}

/// Get a run together with its task-run trail
#[get("/runs/{id}")]
async fn get_run(
    data: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> ActixResult<impl Responder> {
    let run_id = path.into_inner();
    let run = match data.store.get_run(&run_id).await {
        Ok(Some(run)) => run,
        Ok(None) => {
            return Ok(HttpResponse::NotFound().json(ErrorResponse::new("run not found")))
        }
        Err(err) => {
            return Ok(
                HttpResponse::InternalServerError().json(ErrorResponse::new(err.to_string()))
            )
        }
    };
    let tasks = data
        .store
        .list_task_runs(&run_id)
        .await
        .unwrap_or_default();

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "run_id": run.id,
        "flow_id": run.flow_id,
        "status": run.status,
        "started_at": run.started_at,
        "finished_at": run.finished_at,
        "tasks": tasks,
    })))
}

/// Stop a run
#[post("/runs/{id}/stop")]
async fn stop_run(
    data: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> ActixResult<impl Responder> {
    let run_id = path.into_inner();
    match data.engine.stop(&run_id).await {
        Ok(()) => Ok(HttpResponse::Ok().json(StopResponse {
            run_id,
            stopped: true,
        })),
        Err(err) => {
            Ok(HttpResponse::InternalServerError().json(ErrorResponse::new(err.to_string())))
        }
    }
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    info!("starting flow manager API");

    let registry = Arc::new(TaskRegistry::new());
    flowtasks::register_builtin(&registry).await;

    let store = Arc::new(MemoryStore::new());
    let engine = FlowEngine::new(
        Arc::clone(&store) as Arc<dyn RunStore>,
        Arc::clone(&registry) as _,
    )
    .await;

    let app_state = web::Data::new(AppState {
        engine,
        store,
        registry,
    });

    let bind_address = std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
    info!("server starting on http://{}", bind_address);

    HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            .app_data(app_state.clone())
            .wrap(cors)
            .wrap(actix_web::middleware::Logger::default())
            .service(health_check)
            .service(list_tasks)
            .service(create_flow)
            .service(list_flows)
            .service(get_flow)
            .service(start_flow)
            .service(list_runs)
            .service(get_run)
            .service(stop_run)
    })
    .bind(&bind_address)?
    .run()
    .await?;

    Ok(())
}
