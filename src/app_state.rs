use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;
use crate::{
    analyst_client::AnalystClient, analytics_client::AnalyticsClient, config::AppConfig,
    dispatcher::Dispatcher, notify::NotificationCenter,
};

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub dispatcher: Arc<Dispatcher>,
    pub notifications: Arc<NotificationCenter>,
    pub analyst: AnalystClient,
    pub analytics: AnalyticsClient,
    pub status: Arc<Mutex<Status>>,
    pub shutdown_sender: Arc<Mutex<Option<oneshot::Sender<()>>>>,
}

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct Status {
    pub is_busy: bool,
    pub message: String,
}

impl Status {
    pub fn ready() -> Self {
        Self {
            is_busy: false,
            message: "Servidor listo.".to_string(),
        }
    }
}
