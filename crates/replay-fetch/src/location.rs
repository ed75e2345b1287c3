//! Classification of report URLs into fetchable locations.

use percent_encoding::percent_decode_str;
use url::Url;

use crate::error::FetchError;

const AWS_DOMAIN: &str = "amazonaws.com";

/// Where a report lives.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RemoteLocation {
    /// Plain HTTP(S) resource.
    Http { url: String },
    /// Object in S3-compatible storage.
    ObjectStore(ObjectLocation),
}

/// Addressing details of an object in S3-compatible storage.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObjectLocation {
    pub bucket: String,
    /// Percent-decoded object key.
    pub key: String,
    /// Service endpoint URL, without bucket.
    pub endpoint: String,
    pub region: String,
    /// Address buckets as `endpoint/bucket` rather than `bucket.endpoint`.
    pub path_style: bool,
}

impl RemoteLocation {
    /// Classify a report URL.
    ///
    /// With object storage disabled every `http(s)` URL is fetched as-is.
    /// Otherwise these shapes are read as objects:
    ///
    /// - `https://{bucket}.s3[.-]{region}.amazonaws.com/{key}` (virtual-hosted)
    /// - `https://s3[.-]{region}.amazonaws.com/{bucket}/{key}` (path-style)
    /// - `https://{host}/{bucket}/{key}` (S3-compatible service)
    /// - `s3://{bucket}/{key}`
    ///
    /// URLs that lack a bucket or key fall back to HTTP.
    pub fn classify(
        url: &str,
        storage_enabled: bool,
        default_region: &str,
    ) -> Result<Self, FetchError> {
        let parsed = Url::parse(url).map_err(|e| FetchError::InvalidUrl {
            url: url.to_owned(),
            reason: e.to_string(),
        })?;

        match parsed.scheme() {
            "http" | "https" => {}
            "s3" if storage_enabled => {
                return s3_scheme(&parsed, default_region).ok_or_else(|| {
                    FetchError::InvalidUrl {
                        url: url.to_owned(),
                        reason: "expected s3://bucket/key".to_owned(),
                    }
                });
            }
            "s3" => {
                return Err(FetchError::InvalidUrl {
                    url: url.to_owned(),
                    reason: "object storage is disabled".to_owned(),
                });
            }
            other => {
                return Err(FetchError::InvalidUrl {
                    url: url.to_owned(),
                    reason: format!("unsupported scheme {other:?}"),
                });
            }
        }

        let http = || Self::Http {
            url: url.to_owned(),
        };

        if !storage_enabled {
            return Ok(http());
        }

        let Some(host) = parsed.host_str() else {
            return Ok(http());
        };

        let object = if let Some(labels) = aws_labels(host) {
            aws_location(labels, parsed.path(), default_region)
        } else {
            generic_location(&parsed, default_region)
        };

        Ok(object.map_or_else(http, Self::ObjectStore))
    }
}

/// `s3://bucket/key`
fn s3_scheme(url: &Url, region: &str) -> Option<RemoteLocation> {
    let bucket = url.host_str().filter(|b| !b.is_empty())?;
    let key = decode_key(url.path().trim_start_matches('/'))?;
    Some(RemoteLocation::ObjectStore(aws_object(bucket, key, region)))
}

/// Hosts under `amazonaws.com`. `labels` is the host without that suffix.
fn aws_location(labels: &str, path: &str, default_region: &str) -> Option<ObjectLocation> {
    let parts: Vec<&str> = labels.split('.').collect();
    let s3_index = parts
        .iter()
        .position(|p| *p == "s3" || p.starts_with("s3-"))?;

    let region = if let Some(region) = parts[s3_index].strip_prefix("s3-") {
        region.to_owned()
    } else if let Some(region) = parts.get(s3_index + 1) {
        (*region).to_owned()
    } else {
        default_region.to_owned()
    };

    let path = path.trim_start_matches('/');
    if s3_index == 0 {
        let (bucket, key) = path.split_once('/')?;
        let bucket = decode_key(bucket)?;
        Some(aws_object(&bucket, decode_key(key)?, &region))
    } else {
        let bucket = parts[..s3_index].join(".");
        Some(aws_object(&bucket, decode_key(path)?, &region))
    }
}

/// Any other host: `/{bucket}/{key}` against the host as endpoint.
fn generic_location(url: &Url, region: &str) -> Option<ObjectLocation> {
    let (bucket, key) = url.path().trim_start_matches('/').split_once('/')?;
    let bucket = decode_key(bucket)?;
    let key = decode_key(key)?;
    let endpoint = url.origin().ascii_serialization();

    Some(ObjectLocation {
        path_style: !is_aws_endpoint(&endpoint),
        bucket,
        key,
        endpoint,
        region: region.to_owned(),
    })
}

fn aws_object(bucket: &str, key: String, region: &str) -> ObjectLocation {
    let endpoint = format!("https://s3.{region}.{AWS_DOMAIN}");
    ObjectLocation {
        path_style: !is_aws_endpoint(&endpoint),
        bucket: bucket.to_owned(),
        key,
        endpoint,
        region: region.to_owned(),
    }
}

/// Labels in front of `amazonaws.com`, if `host` is that domain or under it.
fn aws_labels(host: &str) -> Option<&str> {
    if host == AWS_DOMAIN {
        return Some("");
    }
    host.strip_suffix(AWS_DOMAIN)?.strip_suffix('.')
}

fn is_aws_endpoint(endpoint: &str) -> bool {
    Url::parse(endpoint)
        .ok()
        .is_some_and(|u| u.host_str().and_then(aws_labels).is_some())
}

/// Percent-decode a path component; `None` if empty.
fn decode_key(raw: &str) -> Option<String> {
    let decoded = percent_decode_str(raw).decode_utf8_lossy().into_owned();
    (!decoded.is_empty()).then_some(decoded)
}
