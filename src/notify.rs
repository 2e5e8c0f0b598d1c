//! Servicio de notificaciones y confirmaciones.
//!
//! Quien dispara una acción recibe un `Notifier` por referencia; no hay bus
//! global de eventos. `NotificationCenter` guarda el historial reciente que
//! consulta el frontend y `ScopedNotifier` acompaña a una única petición HTTP.

use std::collections::VecDeque;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::remote::ServiceError;

const HISTORY_LIMIT: usize = 50;

/// Texto genérico para cualquier fallo de una acción del usuario.
pub const GENERIC_FAILURE: &str = "Algo ha ido mal, por favor inténtelo de nuevo.";
const RETRY_FAILURE: &str = "El servicio no ha respondido a tiempo. Pulse reintentar.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Success,
    Info,
    Warning,
    Error,
    /// Error transitorio: el frontend ofrece un botón de reintento.
    Retry,
}

#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub kind: NotificationKind,
    pub title: String,
    pub text: String,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ConfirmOutcome {
    Confirmed,
    Cancelled,
}

#[derive(Debug, Clone)]
pub struct ConfirmOptions {
    pub confirm_label: String,
    pub cancel_label: String,
    pub destructive: bool,
}

impl ConfirmOptions {
    pub fn destructive(confirm_label: &str) -> Self {
        Self {
            confirm_label: confirm_label.to_string(),
            cancel_label: "Cancelar".to_string(),
            destructive: true,
        }
    }
}

pub trait Notifier: Send + Sync {
    fn notify(&self, kind: NotificationKind, title: &str, text: &str);

    fn confirm(&self, title: &str, text: &str, options: &ConfirmOptions) -> ConfirmOutcome;

    /// Traduce un fallo remoto al aviso genérico (o al de reintento si es transitorio).
    fn notify_failure(&self, title: &str, err: &ServiceError) {
        if err.is_retryable() {
            self.notify(NotificationKind::Retry, title, RETRY_FAILURE);
        } else {
            self.notify(NotificationKind::Error, title, GENERIC_FAILURE);
        }
    }
}

/// Historial acotado de notificaciones, compartido por toda la aplicación.
#[derive(Debug, Default)]
pub struct NotificationCenter {
    history: Mutex<VecDeque<Notification>>,
}

impl NotificationCenter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, notification: Notification) {
        match notification.kind {
            NotificationKind::Error => error!("[{}] {}", notification.title, notification.text),
            NotificationKind::Retry | NotificationKind::Warning => {
                warn!("[{}] {}", notification.title, notification.text)
            }
            _ => info!("[{}] {}", notification.title, notification.text),
        }
        let mut history = self.history.lock().unwrap_or_else(|p| p.into_inner());
        if history.len() >= HISTORY_LIMIT {
            history.pop_front();
        }
        history.push_back(notification);
    }

    /// Notificaciones más recientes primero.
    pub fn recent(&self, limit: usize) -> Vec<Notification> {
        let history = self.history.lock().unwrap_or_else(|p| p.into_inner());
        history.iter().rev().take(limit).cloned().collect()
    }
}

impl Notifier for NotificationCenter {
    fn notify(&self, kind: NotificationKind, title: &str, text: &str) {
        self.push(Notification {
            kind,
            title: title.to_string(),
            text: text.to_string(),
            at: Utc::now(),
        });
    }

    /// Sin un usuario al otro lado, las confirmaciones se cancelan.
    fn confirm(&self, title: &str, _text: &str, _options: &ConfirmOptions) -> ConfirmOutcome {
        warn!("Confirmación '{title}' sin interlocutor; se cancela");
        ConfirmOutcome::Cancelled
    }
}

/// Notificador de una petición: reenvía al centro, recuerda lo emitido para
/// devolverlo en la respuesta y contesta las confirmaciones con la decisión
/// que el usuario ya tomó en el frontend.
pub struct ScopedNotifier<'a> {
    center: &'a NotificationCenter,
    confirmed: bool,
    emitted: Mutex<Vec<Notification>>,
}

impl<'a> ScopedNotifier<'a> {
    pub fn new(center: &'a NotificationCenter, confirmed: bool) -> Self {
        Self {
            center,
            confirmed,
            emitted: Mutex::new(Vec::new()),
        }
    }

    pub fn into_notifications(self) -> Vec<Notification> {
        self.emitted.into_inner().unwrap_or_else(|p| p.into_inner())
    }
}

impl Notifier for ScopedNotifier<'_> {
    fn notify(&self, kind: NotificationKind, title: &str, text: &str) {
        let notification = Notification {
            kind,
            title: title.to_string(),
            text: text.to_string(),
            at: Utc::now(),
        };
        self.emitted
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(notification.clone());
        self.center.push(notification);
    }

    fn confirm(&self, _title: &str, _text: &str, _options: &ConfirmOptions) -> ConfirmOutcome {
        if self.confirmed {
            ConfirmOutcome::Confirmed
        } else {
            ConfirmOutcome::Cancelled
        }
    }
}
