use crate::OpenDataError;
use reqwest::blocking::Client;
use serde_json::{Map, Value};
use std::thread;
use std::time::Duration;
use url::Url;

/// The ACRA UEN collection on data.gov.sg.
pub const ACRA_UEN_COLLECTION: &str = "2";

#[derive(Debug, Clone)]
pub struct OpenDataConfig {
    /// Root of the v2 metadata API.
    pub base_url: String,
    /// `datastore_search` endpoint (still served by the v1 API).
    pub datastore_url: String,
    /// Slept before every request.
    pub delay: Duration,
    pub timeout: Duration,
    /// Records requested per `datastore_search` page.
    pub page_size: usize,
}

impl Default for OpenDataConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api-production.data.gov.sg".to_string(),
            datastore_url: "https://data.gov.sg/api/action/datastore_search".to_string(),
            delay: Duration::from_secs(1),
            timeout: Duration::from_secs(60),
            page_size: 20_000,
        }
    }
}

/// Parameters of one `datastore_search` call. `resource_id` defaults to the
/// UEN collection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DatastoreQuery {
    pub resource_id: Option<String>,
    pub fields: Option<String>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl DatastoreQuery {
    pub fn page(resource_id: &str, fields: &str, limit: usize, offset: usize) -> Self {
        Self {
            resource_id: Some(resource_id.to_string()),
            fields: Some(fields.to_string()),
            limit: Some(limit),
            offset: Some(offset),
        }
    }

    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![(
            "resource_id",
            self.resource_id
                .clone()
                .unwrap_or_else(|| ACRA_UEN_COLLECTION.to_string()),
        )];
        if let Some(fields) = &self.fields {
            pairs.push(("fields", fields.clone()));
        }
        if let Some(limit) = self.limit {
            pairs.push(("limit", limit.to_string()));
        }
        if let Some(offset) = self.offset {
            pairs.push(("offset", offset.to_string()));
        }
        pairs
    }
}

pub struct OpenDataClient {
    client: Client,
    base_url: Url,
    datastore_url: Url,
    config: OpenDataConfig,
}

impl OpenDataClient {
    pub fn new(config: OpenDataConfig) -> Result<Self, OpenDataError> {
        let base_url = parse_base(&config.base_url)?;
        let datastore_url = Url::parse(&config.datastore_url)
            .map_err(|e| OpenDataError::InvalidUrl(format!("{}: {e}", config.datastore_url)))?;
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| OpenDataError::Transport {
                url: config.base_url.clone(),
                message: format!("failed to build http client: {e}"),
            })?;
        Ok(Self {
            client,
            base_url,
            datastore_url,
            config,
        })
    }

    pub fn config(&self) -> &OpenDataConfig {
        &self.config
    }

    /// Full `collections/{id}/metadata` response.
    pub fn collection_metadata(&self, collection: &str) -> Result<Value, OpenDataError> {
        let url = self.endpoint(&format!("v2/public/api/collections/{collection}/metadata"))?;
        self.get(url, &[])
    }

    /// Ids of the collection's child datasets.
    pub fn child_datasets(&self, collection: &str) -> Result<Vec<String>, OpenDataError> {
        let metadata = self.collection_metadata(collection)?;
        child_datasets_of(collection, &metadata)
    }

    pub fn dataset_metadata(&self, dataset: &str) -> Result<Value, OpenDataError> {
        let url = self.endpoint(&format!("v2/public/api/datasets/{dataset}/metadata"))?;
        self.get(url, &[])
    }

    /// Full `datastore_search` response.
    pub fn datastore_search(&self, query: &DatastoreQuery) -> Result<Value, OpenDataError> {
        self.get(self.datastore_url.clone(), &query.to_pairs())
    }

    /// `result.records` of one `datastore_search` page.
    pub fn datastore_records(
        &self,
        query: &DatastoreQuery,
    ) -> Result<Vec<Map<String, Value>>, OpenDataError> {
        let response = self.datastore_search(query)?;
        records_of(self.datastore_url.as_str(), response)
    }

    fn endpoint(&self, path: &str) -> Result<Url, OpenDataError> {
        self.base_url
            .join(path)
            .map_err(|e| OpenDataError::InvalidUrl(format!("{path}: {e}")))
    }

    fn get(&self, url: Url, query: &[(&str, String)]) -> Result<Value, OpenDataError> {
        if !self.config.delay.is_zero() {
            thread::sleep(self.config.delay);
        }
        tracing::debug!(%url, ?query, "open-data request");

        let resp = self
            .client
            .get(url.clone())
            .query(query)
            .send()
            .map_err(|e| OpenDataError::Transport {
                url: url.to_string(),
                message: e.to_string(),
            })?;
        let status = resp.status();
        let body = resp.text().map_err(|e| OpenDataError::Transport {
            url: url.to_string(),
            message: e.to_string(),
        })?;
        if !status.is_success() {
            return Err(status_error(status.as_u16(), url.as_str(), &body));
        }
        serde_json::from_str(&body).map_err(|e| OpenDataError::Decode {
            url: url.to_string(),
            message: e.to_string(),
        })
    }
}

/// `Url::join` drops the last path segment unless it ends with `/`.
fn parse_base(base: &str) -> Result<Url, OpenDataError> {
    let with_slash = if base.ends_with('/') {
        base.to_string()
    } else {
        format!("{base}/")
    };
    Url::parse(&with_slash).map_err(|e| OpenDataError::InvalidUrl(format!("{base}: {e}")))
}

pub(crate) fn status_error(status: u16, url: &str, body: &str) -> OpenDataError {
    let payload: Value = serde_json::from_str(body).unwrap_or(Value::Null);
    let field = |name: &str| match &payload[name] {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    };
    let (url, code, message) = (url.to_string(), field("code"), field("message"));
    match status {
        429 => OpenDataError::RateLimited { url, code, message },
        400 => OpenDataError::BadRequest { url, code, message },
        422 => OpenDataError::Unprocessable { url, code, message },
        _ => OpenDataError::Http {
            status,
            url,
            body: body.to_string(),
        },
    }
}

pub(crate) fn child_datasets_of(
    collection: &str,
    metadata: &Value,
) -> Result<Vec<String>, OpenDataError> {
    let children = &metadata["data"]["collectionMetadata"]["childDatasets"];
    let invalid = || OpenDataError::InvalidChildDatasets {
        collection: collection.to_string(),
        found: children.to_string(),
    };
    let ids = children
        .as_array()
        .ok_or_else(invalid)?
        .iter()
        .map(|v| v.as_str().map(str::to_string))
        .collect::<Option<Vec<_>>>()
        .ok_or_else(invalid)?;
    if ids.is_empty() || ids.iter().any(|id| !id.starts_with('d')) {
        return Err(invalid());
    }
    Ok(ids)
}

pub(crate) fn records_of(
    url: &str,
    response: Value,
) -> Result<Vec<Map<String, Value>>, OpenDataError> {
    let decode = |message: String| OpenDataError::Decode {
        url: url.to_string(),
        message,
    };
    let Value::Object(mut top) = response else {
        return Err(decode("response is not an object".to_string()));
    };
    let Some(Value::Object(mut result)) = top.remove("result") else {
        return Err(decode("missing result".to_string()));
    };
    match result.remove("records") {
        Some(Value::Array(records)) => records
            .into_iter()
            .map(|r| match r {
                Value::Object(map) => Ok(map),
                other => Err(decode(format!("record is not an object: {other}"))),
            })
            .collect(),
        _ => Err(decode("missing result.records".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn query_defaults_to_uen_collection() {
        let pairs = DatastoreQuery::default().to_pairs();
        assert_eq!(pairs, vec![("resource_id", "2".to_string())]);

        let pairs = DatastoreQuery::page("d_abc", "uen", 20_000, 40_000).to_pairs();
        assert_eq!(pairs.len(), 4);
        assert_eq!(pairs[3], ("offset", "40000".to_string()));
    }

    #[test]
    fn child_datasets_must_start_with_d() {
        let ok = json!({"data": {"collectionMetadata": {"childDatasets": ["d_1", "d_2"]}}});
        assert_eq!(child_datasets_of("2", &ok).unwrap(), vec!["d_1", "d_2"]);

        let bad = json!({"data": {"collectionMetadata": {"childDatasets": ["d_1", "x_2"]}}});
        assert!(matches!(
            child_datasets_of("2", &bad),
            Err(OpenDataError::InvalidChildDatasets { .. })
        ));
        let missing = json!({"data": {"collectionMetadata": {"childDatasets": null}}});
        assert!(child_datasets_of("2", &missing).is_err());
        let empty = json!({"data": {"collectionMetadata": {"childDatasets": []}}});
        assert!(child_datasets_of("2", &empty).is_err());
    }

    #[test]
    fn status_codes_map_to_kinds() {
        let body = r#"{"code": 24, "message": "too many requests"}"#;
        match status_error(429, "u", body) {
            OpenDataError::RateLimited { code, message, .. } => {
                assert_eq!(code, "24");
                assert_eq!(message, "too many requests");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(matches!(
            status_error(400, "u", "{}"),
            OpenDataError::BadRequest { .. }
        ));
        assert!(matches!(
            status_error(422, "u", "not json"),
            OpenDataError::Unprocessable { .. }
        ));
        assert!(matches!(
            status_error(503, "u", "down"),
            OpenDataError::Http { status: 503, .. }
        ));
    }

    #[test]
    fn records_are_extracted_from_result() {
        let page = json!({"success": true, "result": {"records": [{"uen": "1"}, {"uen": "2"}]}});
        assert_eq!(records_of("u", page).unwrap().len(), 2);
        assert!(records_of("u", json!({"result": {}})).is_err());
        assert!(records_of("u", json!([])).is_err());
    }

    #[test]
    fn base_url_keeps_its_path() {
        let base = parse_base("http://localhost:8080/proxy").unwrap();
        let url = base.join("v2/public/api/datasets/d_1/metadata").unwrap();
        assert_eq!(url.path(), "/proxy/v2/public/api/datasets/d_1/metadata");
    }
}
