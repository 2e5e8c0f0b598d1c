//! Cliente del servicio de analítica de conversaciones: eventos de sesión,
//! eventos de error y estadísticas agregadas por proyecto.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    config::AppConfig,
    remote::{build_http_client, check_status, endpoint, ServiceError},
};

/// Ventana temporal de las consultas de analítica.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeRange {
    Day,
    #[default]
    Week,
    Month,
    Year,
}

impl TimeRange {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Day => "day",
            Self::Week => "week",
            Self::Month => "month",
            Self::Year => "year",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionEvent {
    pub session_id: String,
    pub event_type: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub payload: Value,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionStats {
    pub total_sessions: u64,
    pub total_messages: u64,
    pub error_sessions: u64,
    pub average_session_seconds: f64,
}

#[derive(Clone)]
pub struct AnalyticsClient {
    base_url: String,
    http: reqwest::Client,
}

impl AnalyticsClient {
    pub fn from_config(cfg: &AppConfig) -> anyhow::Result<Self> {
        Ok(Self {
            base_url: cfg.analytics_url.clone(),
            http: build_http_client(cfg)?,
        })
    }

    async fn query<T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        project_id: &str,
        range: TimeRange,
    ) -> Result<T, ServiceError> {
        let resp = self
            .http
            .get(endpoint(&self.base_url, path))
            .query(&[("project_id", project_id), ("range", range.as_str())])
            .send()
            .await?;
        Ok(check_status(resp).await?.json().await?)
    }

    pub async fn session_events(&self, project_id: &str, range: TimeRange) -> Result<Vec<SessionEvent>, ServiceError> {
        self.query("sessions/events", project_id, range).await
    }

    pub async fn session_error_events(
        &self,
        project_id: &str,
        range: TimeRange,
    ) -> Result<Vec<SessionEvent>, ServiceError> {
        self.query("sessions/errors", project_id, range).await
    }

    pub async fn session_stats(&self, project_id: &str, range: TimeRange) -> Result<SessionStats, ServiceError> {
        self.query("sessions/stats", project_id, range).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranges_deserialize_from_lowercase_names() {
        let range: TimeRange = serde_json::from_str(r#""month""#).unwrap();
        assert_eq!(range, TimeRange::Month);
        assert_eq!(range.as_str(), "month");
        assert!(serde_json::from_str::<TimeRange>(r#""quarter""#).is_err());
    }

    #[test]
    fn stats_tolerate_missing_fields() {
        let stats: SessionStats = serde_json::from_str(r#"{"total_sessions": 12}"#).unwrap();
        assert_eq!(stats.total_sessions, 12);
        assert_eq!(stats.error_sessions, 0);
    }
}
