//! Cliente del servicio analista (datos tabulares): tablas subidas con su
//! fichero de anotaciones y una configuración JSON por tabla.

use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use serde_json::Value;

use crate::{
    config::AppConfig,
    models::LocalFile,
    remote::{build_http_client, check_status, endpoint, ServiceError},
};

#[derive(Deserialize)]
struct UploadedTable {
    id: String,
}

#[derive(Clone)]
pub struct AnalystClient {
    base_url: String,
    http: reqwest::Client,
}

impl AnalystClient {
    pub fn from_config(cfg: &AppConfig) -> anyhow::Result<Self> {
        Ok(Self {
            base_url: cfg.analyst_url.clone(),
            http: build_http_client(cfg)?,
        })
    }

    fn url(&self, path: &str) -> String {
        endpoint(&self.base_url, path)
    }

    pub async fn list_tables(&self) -> Result<Vec<String>, ServiceError> {
        let resp = self.http.get(self.url("tables")).send().await?;
        Ok(check_status(resp).await?.json().await?)
    }

    pub async fn table_config(&self, table_id: &str) -> Result<Value, ServiceError> {
        let resp = self
            .http
            .get(self.url(&format!("tables/{table_id}/config")))
            .send()
            .await?;
        Ok(check_status(resp).await?.json().await?)
    }

    pub async fn update_table_config(&self, table_id: &str, config: &Value) -> Result<(), ServiceError> {
        let resp = self
            .http
            .put(self.url(&format!("tables/{table_id}/config")))
            .json(config)
            .send()
            .await?;
        check_status(resp).await?;
        Ok(())
    }

    pub async fn delete_table(&self, table_id: &str) -> Result<(), ServiceError> {
        let resp = self
            .http
            .delete(self.url(&format!("tables/{table_id}")))
            .send()
            .await?;
        check_status(resp).await?;
        Ok(())
    }

    /// Sube una tabla junto con su fichero de anotaciones. Devuelve el id asignado.
    pub async fn upload_table(&self, table: LocalFile, annotations: LocalFile) -> Result<String, ServiceError> {
        let form = Form::new()
            .part("table", to_part(table)?)
            .part("annotations", to_part(annotations)?);
        let resp = self.http.post(self.url("tables")).multipart(form).send().await?;
        let body: UploadedTable = check_status(resp).await?.json().await?;
        Ok(body.id)
    }
}

fn to_part(file: LocalFile) -> Result<Part, ServiceError> {
    Ok(Part::bytes(file.bytes)
        .file_name(file.name)
        .mime_str(&file.content_type)?)
}
