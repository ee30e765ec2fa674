use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::envelope;

const SOAP_ACTION_SEARCH: &str = "search";
const SOAP_ACTION_GET: &str = "get";
const SOAP_ACTION_ADD: &str = "add";
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Error)]
pub enum CabinetError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
    #[error("service returned http {status}: {body}")]
    Http { status: StatusCode, body: String },
    #[error("malformed response: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("service fault {code}: {detail}")]
    Fault { code: String, detail: String },
    #[error("operation reported failure: {detail}")]
    Unsuccessful { detail: String },
    #[error("response is missing {0}")]
    MissingField(&'static str),
    #[error("file content is not valid base64: {0}")]
    Content(#[from] base64::DecodeError),
}

/// Credentials embedded in every request envelope.
#[derive(Debug, Clone)]
pub struct Passport {
    pub email: String,
    pub password: String,
    pub account: String,
    pub role: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CabinetClient {
    http: Client,
    endpoint: Url,
    passport: Passport,
}

impl CabinetClient {
    pub fn new(endpoint: &str, passport: Passport) -> Result<Self, CabinetError> {
        Self::with_timeout(endpoint, passport, DEFAULT_REQUEST_TIMEOUT)
    }

    pub fn with_timeout(
        endpoint: &str,
        passport: Passport,
        timeout: Duration,
    ) -> Result<Self, CabinetError> {
        Ok(Self {
            http: Client::builder().timeout(timeout).build()?,
            endpoint: Url::parse(endpoint)?,
            passport,
        })
    }

    /// Searches for folders named `name` under `parent_id`, or at the top
    /// level of the cabinet when no parent is given. Matching is exact-case
    /// on the service side.
    pub async fn lookup_folder(
        &self,
        name: &str,
        parent_id: Option<&str>,
    ) -> Result<Vec<FolderRecord>, CabinetError> {
        let parents: Vec<String> = parent_id.map(|id| vec![id.to_string()]).unwrap_or_default();
        let body = envelope::folder_search_body(Some(name), &parents);
        let xml = self.call(SOAP_ACTION_SEARCH, &body).await?;
        envelope::parse_folder_records(&xml)
    }

    /// Lists the direct children of every folder in `parent_ids` in a single
    /// round trip.
    pub async fn list_child_folders(
        &self,
        parent_ids: &[String],
    ) -> Result<Vec<FolderRecord>, CabinetError> {
        let body = envelope::folder_search_body(None, parent_ids);
        let xml = self.call(SOAP_ACTION_SEARCH, &body).await?;
        envelope::parse_folder_records(&xml)
    }

    /// Lists files under `folder_id`. The service returns files from the
    /// whole subtree, not just the immediate folder.
    pub async fn list_files(&self, folder_id: &str) -> Result<Vec<FileRecord>, CabinetError> {
        let body = envelope::file_search_body(folder_id);
        let xml = self.call(SOAP_ACTION_SEARCH, &body).await?;
        envelope::parse_file_records(&xml)
    }

    pub async fn fetch_file(&self, file_id: &str) -> Result<FileContent, CabinetError> {
        let xml = self
            .call(SOAP_ACTION_GET, &envelope::get_file_body(file_id))
            .await?;
        let (name, content) = envelope::parse_file_content(&xml)?;
        // The wire wraps base64 at arbitrary column widths.
        let compact: String = content.chars().filter(|c| !c.is_ascii_whitespace()).collect();
        let body = BASE64.decode(compact.as_bytes())?;
        Ok(FileContent { name, body })
    }

    pub async fn add_file(
        &self,
        name: &str,
        description: Option<&str>,
        folder_id: &str,
        content: &[u8],
    ) -> Result<UploadReceipt, CabinetError> {
        let encoded = BASE64.encode(content);
        let body = envelope::add_file_body(name, description, folder_id, &encoded);
        let xml = self.call(SOAP_ACTION_ADD, &body).await?;
        envelope::parse_upload_receipt(&xml)
    }

    async fn call(&self, action: &str, body: &str) -> Result<String, CabinetError> {
        let request = envelope::envelope(&self.passport, body);
        let response = self
            .http
            .post(self.endpoint.clone())
            .header("SOAPAction", action)
            .header(CONTENT_TYPE, "text/xml; charset=utf-8")
            .body(request)
            .send()
            .await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(CabinetError::Http { status, body });
        }
        Ok(response.text().await?)
    }
}

/// A folder as reported by the service. `internal_id` is stable across
/// renames and moves; `name` is unique only within one parent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FolderRecord {
    pub internal_id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
}

/// Reference to the folder containing a file. `name` may be a composite
/// path whose segments are joined with `" : "`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderRef {
    pub internal_id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    pub internal_id: String,
    pub name: String,
    pub folder: FolderRef,
}

#[derive(Debug)]
pub struct FileContent {
    pub name: String,
    pub body: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReceipt {
    pub internal_id: String,
}
