use std::time::Duration;

use bytes::BytesMut;
use futures_util::StreamExt;
use harvester_core::{PageResult, Region};
use thiserror::Error;
use url::Url;

use crate::decode::decode_feature_collection;
use crate::encode::{encode_region, AttributePredicate, EncodeError, RequestEncoding};
use crate::{FailureKind, FetchError};

/// One bounded page request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageQuery<'a> {
    /// `None` queries the whole dataset.
    pub region: Option<&'a Region>,
    pub offset: usize,
    pub page_size: usize,
    /// Attribute holding each feature's identifier.
    pub id_field: &'a str,
}

/// The IO boundary of a harvest: fetches one page of features.
///
/// A page with fewer records than `page_size` is the last page of its query.
#[async_trait::async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, query: PageQuery<'_>) -> Result<PageResult, FetchError>;

    /// Largest page the feed serves.
    fn page_size(&self) -> usize;
}

#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub base_url: String,
    pub api_key: Option<String>,
    /// WFS feature type (layer) name.
    pub type_name: String,
    pub srs_name: String,
    pub encoding: RequestEncoding,
    /// Geometry column referenced by filter expressions.
    pub geometry_property: String,
    pub predicates: Vec<AttributePredicate>,
    pub page_size: usize,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub max_bytes: u64,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.vworld.kr/req/wfs".to_string(),
            api_key: None,
            type_name: String::new(),
            srs_name: "EPSG:5186".to_string(),
            encoding: RequestEncoding::PlainBbox,
            geometry_property: "ag_geom".to_string(),
            predicates: Vec::new(),
            page_size: 1000,
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(300),
            max_bytes: 256 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid base url {url}: {message}")]
    InvalidBaseUrl { url: String, message: String },
    #[error("feature type name is empty")]
    MissingTypeName,
    #[error("page size must be positive")]
    ZeroPageSize,
    #[error(transparent)]
    Encode(#[from] EncodeError),
}

/// WFS 2.0 `GetFeature` client returning GeoJSON pages.
#[derive(Debug, Clone)]
pub struct WfsFetcher {
    settings: FetchSettings,
    base_url: Url,
}

impl WfsFetcher {
    pub fn new(settings: FetchSettings) -> Result<Self, ConfigError> {
        let base_url = Url::parse(&settings.base_url).map_err(|err| ConfigError::InvalidBaseUrl {
            url: settings.base_url.clone(),
            message: err.to_string(),
        })?;
        if settings.type_name.trim().is_empty() {
            return Err(ConfigError::MissingTypeName);
        }
        if settings.page_size == 0 {
            return Err(ConfigError::ZeroPageSize);
        }
        // Surface encoding/predicate mismatches before the first request.
        encode_region(
            settings.encoding,
            None,
            &settings.srs_name,
            &settings.geometry_property,
            &settings.predicates,
        )?;
        Ok(Self { settings, base_url })
    }

    /// Full request URL for `query`.
    pub fn request_url(&self, query: &PageQuery<'_>) -> Result<Url, EncodeError> {
        let settings = &self.settings;
        let spatial = encode_region(
            settings.encoding,
            query.region,
            &settings.srs_name,
            &settings.geometry_property,
            &settings.predicates,
        )?;

        let mut url = self.base_url.clone();
        {
            let mut pairs = url.query_pairs_mut();
            if let Some(key) = settings.api_key.as_deref() {
                pairs.append_pair("key", key);
            }
            pairs
                .append_pair("SERVICE", "WFS")
                .append_pair("VERSION", "2.0.0")
                .append_pair("REQUEST", "GetFeature")
                .append_pair("TYPENAME", &settings.type_name)
                .append_pair("SRSNAME", &settings.srs_name)
                .append_pair("OUTPUT", "application/json")
                .append_pair("COUNT", &query.page_size.min(settings.page_size).to_string())
                .append_pair("STARTINDEX", &query.offset.to_string());
            if let Some((name, value)) = spatial {
                pairs.append_pair(name, &value);
            }
        }
        Ok(url)
    }

    // A fresh client per request keeps the feed connection stateless.
    fn build_client(&self) -> Result<reqwest::Client, FetchError> {
        reqwest::Client::builder()
            .connect_timeout(self.settings.connect_timeout)
            .timeout(self.settings.request_timeout)
            .build()
            .map_err(|err| FetchError::transient(err.to_string()))
    }

    fn too_large(&self, actual: u64) -> FetchError {
        FetchError::malformed(format!(
            "response too large (max {}, actual {actual})",
            self.settings.max_bytes
        ))
    }
}

#[async_trait::async_trait]
impl PageFetcher for WfsFetcher {
    async fn fetch(&self, query: PageQuery<'_>) -> Result<PageResult, FetchError> {
        let url = self
            .request_url(&query)
            .map_err(|err| FetchError::malformed(err.to_string()))?;
        let client = self.build_client()?;

        let response = client.get(url).send().await.map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::new(
                FailureKind::from_status(status.as_u16()),
                status.to_string(),
            ));
        }

        if let Some(content_len) = response.content_length() {
            if content_len > self.settings.max_bytes {
                return Err(self.too_large(content_len));
            }
        }

        let mut body = BytesMut::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(map_reqwest_error)?;
            let next_len = body.len() as u64 + chunk.len() as u64;
            if next_len > self.settings.max_bytes {
                return Err(self.too_large(next_len));
            }
            body.extend_from_slice(&chunk);
        }

        decode_feature_collection(&body, query.id_field)
            .map_err(|err| FetchError::malformed(err.to_string()))
    }

    fn page_size(&self) -> usize {
        self.settings.page_size
    }
}

fn map_reqwest_error(err: reqwest::Error) -> FetchError {
    if err.is_builder() {
        return FetchError::malformed(err.to_string());
    }
    if err.is_timeout() {
        return FetchError::transient(format!("timeout: {err}"));
    }
    FetchError::transient(err.to_string())
}
