mod clients;
mod config;
mod controllers;
mod dto;
mod middleware;
mod models;
mod routes;
mod services;
mod state;
mod utils;

use anyhow::Result;
use axum::{response::Json, routing::get, Router};
use dotenvy::dotenv;
use serde_json::json;
use std::net::SocketAddr;
use tokio::signal;
use tracing::{error, info};

use config::environment::EnvironmentConfig;
use middleware::cors::{cors_middleware, cors_middleware_with_origins};
use state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Cargar variables de entorno
    dotenv().ok();

    // Configurar logging
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    info!("🚗 Rental Workflow Gateway - Back-office de location");
    info!("====================================================");

    let config = EnvironmentConfig::default();

    // Construir el estado: cliente del backend + orquestador de workflow
    let app_state = match AppState::new(config.clone()) {
        Ok(state) => state,
        Err(e) => {
            error!("❌ Error construyendo el estado de la aplicación: {}", e);
            return Err(anyhow::anyhow!("Error de inicialización: {}", e));
        }
    };

    let cors = if config.cors_origins.is_empty() {
        cors_middleware()
    } else {
        cors_middleware_with_origins(config.cors_origins.clone())
    };

    // Crear router de la API
    let app = Router::new()
        .route("/health", get(health_endpoint))
        .nest(
            "/api/workflow",
            routes::workflow_routes::create_workflow_router(),
        )
        .layer(cors)
        .with_state(app_state);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;

    info!("🌐 Servidor iniciando en http://{}", addr);
    info!("🔗 Backend de alquiler: {}", config.rental_api_base_url);
    info!("🔍 Endpoints disponibles:");
    info!("   GET  /health - Health check");
    info!("🧾 Workflow de location (5 etapas):");
    info!("   POST /api/workflow - Crear sesión de workflow");
    info!("   GET  /api/workflow/:id - Estado de la sesión");
    info!("   POST /api/workflow/:id/back - Volver a la etapa anterior");
    info!("   GET  /api/workflow/:id/customers - Buscar clientes (etapa 1)");
    info!("   POST /api/workflow/:id/customer/select - Seleccionar cliente");
    info!("   POST /api/workflow/:id/customer/create - Crear cliente");
    info!("   GET  /api/workflow/:id/vehicles - Vehículos disponibles (etapa 2)");
    info!("   POST /api/workflow/:id/vehicle - Elegir vehículo y fechas");
    info!("   POST /api/workflow/:id/contract - Preparar y aceptar contrato (etapa 3)");
    info!("   POST /api/workflow/:id/payment - Validar pago (etapa 4)");
    info!("   POST /api/workflow/:id/finalize - Finalizar la location (etapa 5)");

    // Iniciar servidor en background
    let server_handle = tokio::spawn(async move {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| {
                error!("❌ Error del servidor: {}", e);
                e
            })
    });

    // Esperar a que el servidor termine
    if let Err(e) = server_handle.await? {
        error!("❌ Servidor terminó con error: {}", e);
    }

    info!("👋 Servidor terminado");
    Ok(())
}

/// Endpoint de health check
async fn health_endpoint() -> Json<serde_json::Value> {
    Json(json!({
        "service": "rental-workflow-gateway",
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

/// Señal de apagado graceful
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("🛑 Señal Ctrl+C recibida, apagando servidor...");
        },
        _ = terminate => {
            info!("🛑 Señal de terminación recibida, apagando servidor...");
        },
    }
}
