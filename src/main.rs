// Módulos de la aplicación
mod actions;
mod analyst_client;
mod analytics_client;
mod api;
mod app_state;
mod blobs;
mod cache;
mod config;
mod dispatcher;
mod document_client;
mod models;
mod notify;
mod remote;
mod tree;
mod upload;

#[cfg(test)]
mod testing;

use crate::app_state::{AppState, Status};
use crate::notify::NotificationCenter;
use anyhow::Context;
use axum::Router;
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Cargar .env e inicializar logging
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // 2. Cargar configuración
    let cfg = config::AppConfig::from_env().context("Error al cargar la configuración")?;

    // 3. Clientes de los servicios remotos
    let docs = document_client::DocumentClient::from_config(&cfg)
        .context("Error creando el cliente del servicio de documentos")?;
    let analyst = analyst_client::AnalystClient::from_config(&cfg)
        .context("Error creando el cliente del servicio analista")?;
    let analytics = analytics_client::AnalyticsClient::from_config(&cfg)
        .context("Error creando el cliente de analítica")?;

    // 4. Despachador y carga inicial del árbol de proyectos
    let dispatcher = Arc::new(dispatcher::Dispatcher::new(Arc::new(docs), &cfg));
    let notifications = Arc::new(NotificationCenter::new());
    match dispatcher.reload_projects(notifications.as_ref()).await {
        Ok(true) => info!("Árbol de proyectos cargado."),
        Ok(false) => warn!("No se pudieron cargar los proyectos; se reintentará desde el frontend."),
        Err(e) => warn!("Listado de proyectos inconsistente: {e}"),
    }

    // Crear canal para la señal de apagado.
    let (shutdown_tx, shutdown_rx) = oneshot::channel();

    // 5. Crear estado compartido de la aplicación
    let app_state = AppState {
        config: cfg.clone(),
        dispatcher,
        notifications,
        analyst,
        analytics,
        status: Arc::new(Mutex::new(Status::ready())),
        shutdown_sender: Arc::new(Mutex::new(Some(shutdown_tx))),
    };

    // 6. Configurar el router de la API y el servicio de ficheros estáticos
    let app = Router::new()
        .merge(api::create_router(app_state.clone()))
        .fallback_service(ServeDir::new("frontend"))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );

    // 7. Iniciar el servidor
    let server_addr = &app_state.config.server_addr;
    let listener = tokio::net::TcpListener::bind(server_addr)
        .await
        .with_context(|| format!("No se pudo escuchar en {server_addr}"))?;
    let server_url = format!("http://{}", server_addr);
    info!("🚀 Servidor escuchando en {}", &server_url);

    // Abrir el frontend en el navegador por defecto
    if webbrowser::open(&server_url).is_err() {
        info!("No se pudo abrir el navegador. Por favor, accede a {} manualmente.", server_url);
    }

    // Configurar el apagado ordenado.
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            shutdown_rx.await.ok();
            info!("Señal de apagado recibida, iniciando cierre del servidor.");
        })
        .await?;

    info!("✅ Servidor cerrado correctamente.");
    Ok(())
}
