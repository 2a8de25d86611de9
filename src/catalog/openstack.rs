//! OpenStack Image service (Glance v2) catalog.

use super::{HttpSettings, ImageCatalog, build_http_client};
use crate::models::{Image, ImageFilter, ImageId, ImageUpdate, Visibility};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use reqwest::blocking::{Client, RequestBuilder, Response};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, instrument};

/// Media type Glance requires for image PATCH requests.
const JSON_PATCH_CONTENT_TYPE: &str = "application/openstack-images-v2.1-json-patch";

/// Domain used when `OS_*_DOMAIN_NAME` is not set.
const DEFAULT_DOMAIN: &str = "Default";

/// Glance schema attributes that are not custom properties.
const CORE_ATTRIBUTES: &[&str] = &[
    "checksum",
    "container_format",
    "direct_url",
    "disk_format",
    "file",
    "locations",
    "min_disk",
    "min_ram",
    "os_hash_algo",
    "os_hash_value",
    "schema",
    "self",
    "size",
    "status",
    "stores",
    "updated_at",
    "virtual_size",
];

/// Keystone credentials and scope, as given by the standard `OS_*`
/// variables.
#[derive(Debug, Clone)]
pub struct OpenStackSettings {
    /// Identity endpoint (`OS_AUTH_URL`).
    pub auth_url: String,
    /// User name (`OS_USERNAME`).
    pub username: String,
    /// Password (`OS_PASSWORD`).
    pub password: SecretString,
    /// Project id to scope to (`OS_PROJECT_ID`); also the image owner.
    pub project_id: Option<String>,
    /// Project name to scope to when no id is given (`OS_PROJECT_NAME`).
    pub project_name: Option<String>,
    /// User domain (`OS_USER_DOMAIN_NAME`).
    pub user_domain_name: String,
    /// Project domain (`OS_PROJECT_DOMAIN_NAME`).
    pub project_domain_name: String,
    /// Region used to pick the image endpoint (`OS_REGION_NAME`).
    pub region: Option<String>,
}

impl OpenStackSettings {
    /// Reads settings from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a required variable is missing.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads settings through `lookup`. Empty values count as unset.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a required variable is missing.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let require = |key: &str| {
            get(key).ok_or_else(|| Error::Config(format!("environment variable {key} is not set")))
        };

        let settings = Self {
            auth_url: require("OS_AUTH_URL")?,
            username: require("OS_USERNAME")?,
            password: SecretString::from(require("OS_PASSWORD")?),
            project_id: get("OS_PROJECT_ID"),
            project_name: get("OS_PROJECT_NAME"),
            user_domain_name: get("OS_USER_DOMAIN_NAME")
                .unwrap_or_else(|| DEFAULT_DOMAIN.to_string()),
            project_domain_name: get("OS_PROJECT_DOMAIN_NAME")
                .unwrap_or_else(|| DEFAULT_DOMAIN.to_string()),
            region: get("OS_REGION_NAME"),
        };

        if settings.project_id.is_none() && settings.project_name.is_none() {
            return Err(Error::Config(
                "one of OS_PROJECT_ID or OS_PROJECT_NAME must be set".to_string(),
            ));
        }
        Ok(settings)
    }

    fn auth_request(&self) -> serde_json::Value {
        let project = self.project_id.as_ref().map_or_else(
            || {
                serde_json::json!({
                    "name": self.project_name,
                    "domain": { "name": self.project_domain_name },
                })
            },
            |id| serde_json::json!({ "id": id }),
        );

        serde_json::json!({
            "auth": {
                "identity": {
                    "methods": ["password"],
                    "password": {
                        "user": {
                            "name": self.username,
                            "domain": { "name": self.user_domain_name },
                            "password": self.password.expose_secret(),
                        }
                    }
                },
                "scope": { "project": project }
            }
        })
    }
}

/// Authenticated session: token plus resolved image endpoint.
#[derive(Debug)]
struct Session {
    token: SecretString,
    endpoint: String,
    project_id: String,
}

/// Glance v2 catalog.
///
/// Authenticates once on [`connect`](Self::connect); the token is reused for
/// every request of the run.
#[derive(Debug)]
pub struct OpenStackCatalog {
    client: Client,
    session: Session,
}

impl OpenStackCatalog {
    /// Authenticates against Keystone and resolves the image endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if authentication fails or the service catalog has
    /// no public image endpoint for the configured region.
    #[instrument(name = "keeper.catalog.connect", skip_all, fields(auth_url = %settings.auth_url))]
    pub fn connect(settings: &OpenStackSettings, http: HttpSettings) -> Result<Self> {
        let client = build_http_client(http);

        let response = client
            .post(tokens_url(&settings.auth_url))
            .json(&settings.auth_request())
            .send()
            .map_err(|e| transport_error("authenticate", &e))?;
        let response = expect_status(response, "authenticate", |s| s.is_success())?;

        let token = response
            .headers()
            .get("X-Subject-Token")
            .and_then(|value| value.to_str().ok())
            .map(|value| SecretString::from(value.to_string()))
            .ok_or_else(|| Error::Catalog {
                operation: "authenticate".to_string(),
                status: None,
                cause: "response carried no X-Subject-Token header".to_string(),
            })?;

        let body: TokenResponse = response.json().map_err(|e| Error::OperationFailed {
            operation: "parse_token_response".to_string(),
            cause: e.to_string(),
        })?;

        let endpoint = select_endpoint(&body.token.catalog, settings.region.as_deref())
            .ok_or_else(|| Error::Catalog {
                operation: "authenticate".to_string(),
                status: None,
                cause: format!(
                    "no public image endpoint in service catalog{}",
                    settings
                        .region
                        .as_deref()
                        .map(|region| format!(" for region {region}"))
                        .unwrap_or_default()
                ),
            })?;

        let project_id = body
            .token
            .project
            .map(|project| project.id)
            .or_else(|| settings.project_id.clone())
            .ok_or_else(|| Error::Catalog {
                operation: "authenticate".to_string(),
                status: None,
                cause: "token is not scoped to a project".to_string(),
            })?;

        info!(endpoint = %endpoint, project_id = %project_id, "Connected to image service");

        Ok(Self {
            client,
            session: Session {
                token,
                endpoint,
                project_id,
            },
        })
    }

    /// Project the session is scoped to; used as the image owner.
    #[must_use]
    pub fn project_id(&self) -> &str {
        &self.session.project_id
    }

    /// Resolved image endpoint root.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.session.endpoint
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        builder.header("X-Auth-Token", self.session.token.expose_secret())
    }

    fn image_url(&self, id: &ImageId) -> String {
        format!("{}/v2/images/{}", self.session.endpoint, id)
    }
}

impl ImageCatalog for OpenStackCatalog {
    fn name(&self) -> &'static str {
        "openstack"
    }

    #[instrument(name = "keeper.catalog.list_images", skip(self))]
    fn list_images(&self, filter: &ImageFilter) -> Result<Vec<Image>> {
        let mut images = Vec::new();
        let mut request = self
            .client
            .get(format!("{}/v2/images", self.session.endpoint))
            .query(&list_query(filter));
        let mut pages = 0usize;

        loop {
            let response = self
                .authorized(request)
                .send()
                .map_err(|e| transport_error("list_images", &e))?;
            let response = expect_status(response, "list_images", |s| s == StatusCode::OK)?;
            let page: ImageListResponse = response.json().map_err(|e| Error::OperationFailed {
                operation: "parse_image_list".to_string(),
                cause: e.to_string(),
            })?;

            pages += 1;
            images.extend(page.images.into_iter().map(Image::from));

            match page.next {
                Some(next) => {
                    request = self.client.get(format!("{}{next}", self.session.endpoint));
                },
                None => break,
            }
        }

        debug!(count = images.len(), pages, "Listed images");
        Ok(images)
    }

    fn get_image(&self, id: &ImageId) -> Result<Option<Image>> {
        let response = self
            .authorized(self.client.get(self.image_url(id)))
            .send()
            .map_err(|e| transport_error("get_image", &e))?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = expect_status(response, "get_image", |s| s == StatusCode::OK)?;
        let image: GlanceImage = response.json().map_err(|e| Error::OperationFailed {
            operation: "parse_image".to_string(),
            cause: e.to_string(),
        })?;
        Ok(Some(image.into()))
    }

    #[instrument(name = "keeper.catalog.delete_image", skip(self), fields(image_id = %id))]
    fn delete_image(&self, id: &ImageId) -> Result<()> {
        let response = self
            .authorized(self.client.delete(self.image_url(id)))
            .send()
            .map_err(|e| transport_error("delete_image", &e))?;
        expect_status(response, "delete_image", |s| s == StatusCode::NO_CONTENT)?;
        Ok(())
    }

    #[instrument(name = "keeper.catalog.update_image", skip(self), fields(image_id = %id))]
    fn update_image(&self, id: &ImageId, update: &ImageUpdate) -> Result<()> {
        let operations = patch_operations(update);
        if operations.is_empty() {
            return Ok(());
        }

        let body = serde_json::to_vec(&operations).map_err(|e| Error::OperationFailed {
            operation: "serialize_image_patch".to_string(),
            cause: e.to_string(),
        })?;
        let response = self
            .authorized(self.client.patch(self.image_url(id)))
            .header(reqwest::header::CONTENT_TYPE, JSON_PATCH_CONTENT_TYPE)
            .body(body)
            .send()
            .map_err(|e| transport_error("update_image", &e))?;
        expect_status(response, "update_image", |s| s == StatusCode::OK)?;
        Ok(())
    }
}

/// Builds the Keystone v3 token URL from `OS_AUTH_URL`.
fn tokens_url(auth_url: &str) -> String {
    let base = auth_url.trim_end_matches('/');
    if base.ends_with("/v3") {
        format!("{base}/auth/tokens")
    } else {
        format!("{base}/v3/auth/tokens")
    }
}

/// Picks the public image endpoint, preferring `region` when given.
///
/// The returned URL has no trailing slash and no `/v2` suffix.
fn select_endpoint(catalog: &[CatalogEntry], region: Option<&str>) -> Option<String> {
    catalog
        .iter()
        .filter(|entry| entry.service_type == "image")
        .flat_map(|entry| entry.endpoints.iter())
        .filter(|endpoint| endpoint.interface == "public")
        .find(|endpoint| region.is_none_or(|region| endpoint.in_region(region)))
        .map(|endpoint| {
            let url = endpoint.url.trim_end_matches('/');
            url.strip_suffix("/v2").unwrap_or(url).to_string()
        })
}

fn list_query(filter: &ImageFilter) -> Vec<(&'static str, String)> {
    let mut query = Vec::new();
    if let Some(owner) = &filter.owner {
        query.push(("owner", owner.clone()));
    }
    if let Some(name) = &filter.name {
        query.push(("name", name.clone()));
    }
    if let Some(id) = &filter.id {
        query.push(("id", id.to_string()));
    }
    query
}

fn patch_operations(update: &ImageUpdate) -> Vec<PatchOperation> {
    let mut operations = Vec::new();
    if let Some(visibility) = update.visibility {
        operations.push(PatchOperation::replace("/visibility", visibility.as_str().into()));
    }
    if let Some(protected) = update.protected {
        operations.push(PatchOperation::replace("/protected", protected.into()));
    }
    if let Some(hidden) = update.hidden {
        operations.push(PatchOperation::replace("/os_hidden", hidden.into()));
    }
    operations
}

fn transport_error(operation: &str, err: &reqwest::Error) -> Error {
    Error::Catalog {
        operation: operation.to_string(),
        status: err.status().map(|status| status.as_u16()),
        cause: err.to_string(),
    }
}

fn expect_status<F>(response: Response, operation: &str, accept: F) -> Result<Response>
where
    F: Fn(StatusCode) -> bool,
{
    let status = response.status();
    if accept(status) {
        return Ok(response);
    }
    let body = response.text().unwrap_or_default();
    Err(Error::Catalog {
        operation: operation.to_string(),
        status: Some(status.as_u16()),
        cause: if body.trim().is_empty() {
            status.to_string()
        } else {
            body.trim().to_string()
        },
    })
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    token: Token,
}

#[derive(Debug, Deserialize)]
struct Token {
    #[serde(default)]
    catalog: Vec<CatalogEntry>,
    #[serde(default)]
    project: Option<ProjectRef>,
}

#[derive(Debug, Deserialize)]
struct ProjectRef {
    id: String,
}

#[derive(Debug, Deserialize)]
struct CatalogEntry {
    #[serde(rename = "type")]
    service_type: String,
    #[serde(default)]
    endpoints: Vec<Endpoint>,
}

#[derive(Debug, Deserialize)]
struct Endpoint {
    interface: String,
    url: String,
    #[serde(default)]
    region: Option<String>,
    #[serde(default)]
    region_id: Option<String>,
}

impl Endpoint {
    fn in_region(&self, region: &str) -> bool {
        self.region_id.as_deref() == Some(region) || self.region.as_deref() == Some(region)
    }
}

#[derive(Debug, Deserialize)]
struct ImageListResponse {
    #[serde(default)]
    images: Vec<GlanceImage>,
    #[serde(default)]
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GlanceImage {
    id: ImageId,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    visibility: Visibility,
    created_at: DateTime<Utc>,
    #[serde(default)]
    protected: bool,
    #[serde(default)]
    os_hidden: bool,
    #[serde(default)]
    owner: Option<String>,
    #[serde(flatten)]
    extra: BTreeMap<String, serde_json::Value>,
}

impl From<GlanceImage> for Image {
    fn from(image: GlanceImage) -> Self {
        Self {
            id: image.id,
            name: image.name.unwrap_or_default(),
            tags: image.tags,
            visibility: image.visibility,
            created_at: image.created_at,
            protected: image.protected,
            hidden: image.os_hidden,
            owner: image.owner,
            properties: custom_properties(image.extra),
        }
    }
}

/// Keeps the attributes outside the Glance schema. Strings are taken as
/// is; other values keep their JSON text.
fn custom_properties(extra: BTreeMap<String, serde_json::Value>) -> BTreeMap<String, String> {
    extra
        .into_iter()
        .filter(|(key, _)| !CORE_ATTRIBUTES.contains(&key.as_str()))
        .map(|(key, value)| {
            let value = match value {
                serde_json::Value::String(text) => text,
                other => other.to_string(),
            };
            (key, value)
        })
        .collect()
}

#[derive(Debug, Serialize, PartialEq)]
struct PatchOperation {
    op: &'static str,
    path: &'static str,
    value: serde_json::Value,
}

impl PatchOperation {
    const fn replace(path: &'static str, value: serde_json::Value) -> Self {
        Self {
            op: "replace",
            path,
            value,
        }
    }
}
