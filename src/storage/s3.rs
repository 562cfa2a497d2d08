//! Requester-pays S3 listing and download.
//!
//! Uses raw blocking `reqwest` calls: `ListObjectsV2` for listing, plain `GET` for objects.
//! Every request carries `x-amz-request-payer: requester`, and is signed when credentials are configured.
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Utc;
use log::{debug, info, warn};
use reqwest::{StatusCode, Url};

use super::sigv4::{canonical_query, uri_encode, Credentials, Signer};
use crate::cancel::CancelToken;
use crate::config::S3Config;
use crate::error::Error;
use crate::xml;

const REQUEST_PAYER: (&str, &str) = ("x-amz-request-payer", "requester");
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// A listed object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectEntry {
    pub key: String,
    pub size: u64,
}

impl ObjectEntry {
    /// Last path segment of the key (`arXiv_src_1009_002.tar` for `src/arXiv_src_1009_002.tar`).
    pub fn file_name(&self) -> &str {
        self.key.rsplit('/').next().unwrap_or(&self.key)
    }
}

/// A `ListObjectsV2` answer.
#[derive(Debug, Default)]
pub struct ListPage {
    pub entries: Vec<ObjectEntry>,
    pub next_token: Option<String>,
}

/// Parse a `ListBucketResult` document.
pub fn parse_list(content: &str) -> Result<ListPage, Error> {
    let root = xml::parse(content)?;
    let entries = root
        .elements()
        .filter(|e| e.is("Contents"))
        .filter_map(|contents| {
            let key = contents.child("Key")?.text();
            let size = contents
                .child("Size")
                .and_then(|s| s.text().trim().parse().ok())
                .unwrap_or(0);
            Some(ObjectEntry { key, size })
        })
        .collect();

    let truncated = root
        .child("IsTruncated")
        .map(|t| t.text().trim() == "true")
        .unwrap_or(false);
    let next_token = root
        .child("NextContinuationToken")
        .map(|t| t.text().trim().to_string())
        .filter(|t| truncated && !t.is_empty());

    Ok(ListPage {
        entries,
        next_token,
    })
}

pub struct S3Client {
    client: reqwest::blocking::Client,
    /// Bucket URL, without trailing slash.
    base: String,
    extension: String,
    signer: Option<Signer>,
    cancel: CancelToken,
}

/// Iterator over listing pages, see [S3Client::pages].
pub struct Pages<'a> {
    client: &'a S3Client,
    prefix: String,
    token: Option<String>,
    done: bool,
}

impl<'a> Iterator for Pages<'a> {
    type Item = Result<Vec<ObjectEntry>, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.client.list_page(&self.prefix, self.token.as_deref()) {
            Ok(page) => {
                self.done = page.next_token.is_none();
                self.token = page.next_token;
                let entries = page
                    .entries
                    .into_iter()
                    .filter(|e| e.key.ends_with(&self.client.extension))
                    .collect();
                Some(Ok(entries))
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// Aborts a body copy once cancelled.
struct Cancellable<R> {
    inner: R,
    cancel: CancelToken,
}

impl<R: Read> Read for Cancellable<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if self.cancel.is_cancelled() {
            // not ErrorKind::Interrupted, which io::copy retries
            return Err(std::io::Error::new(std::io::ErrorKind::Other, "interrupted"));
        }
        self.inner.read(buf)
    }
}

impl S3Client {
    pub fn new(config: &S3Config, cancel: CancelToken) -> Result<Self, Error> {
        let base = match &config.endpoint {
            Some(endpoint) => endpoint.trim_end_matches('/').to_string(),
            None => format!("https://{}.s3.amazonaws.com", config.bucket),
        };

        let signer = match (&config.access_key, &config.secret_key) {
            (Some(access_key), Some(secret_key)) => Some(Signer::new(
                Credentials {
                    access_key: access_key.clone(),
                    secret_key: secret_key.clone(),
                },
                &config.region,
            )),
            _ => {
                warn!("no credentials configured, requests are not signed");
                None
            }
        };

        // no overall timeout: archives are several hundred megabytes
        let client = reqwest::blocking::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(None)
            .build()?;

        Ok(Self {
            client,
            base,
            extension: config.extension.clone(),
            signer,
            cancel,
        })
    }

    fn get(&self, url: &str) -> Result<reqwest::blocking::Response, Error> {
        let url = Url::parse(url).map_err(|e| Error::Custom(format!("{}: {}", url, e)))?;
        let mut request = self
            .client
            .get(url.clone())
            .header(REQUEST_PAYER.0, REQUEST_PAYER.1);
        if let Some(signer) = &self.signer {
            for (k, v) in signer.sign("GET", &url, &[REQUEST_PAYER], Utc::now())? {
                request = request.header(k, v);
            }
        }
        debug!("GET {}", url);
        Ok(request.send()?)
    }

    /// Fetch a single listing page.
    pub fn list_page(&self, prefix: &str, token: Option<&str>) -> Result<ListPage, Error> {
        let mut query = vec![("list-type", "2"), ("prefix", prefix)];
        if let Some(token) = token {
            query.push(("continuation-token", token));
        }
        let url = format!("{}/?{}", self.base, canonical_query(&query));

        let response = self.get(&url)?;
        if !response.status().is_success() {
            return Err(Error::Status {
                status: response.status().as_u16(),
                url,
            });
        }
        parse_list(&response.text()?)
    }

    /// Iterate over listing pages of keys under `prefix`, keeping keys with the configured extension.
    pub fn pages(&self, prefix: &str) -> Pages<'_> {
        Pages {
            client: self,
            prefix: prefix.to_string(),
            token: None,
            done: false,
        }
    }

    /// Every key under `prefix` with the configured extension.
    pub fn list(&self, prefix: &str) -> Result<Vec<ObjectEntry>, Error> {
        let mut entries = Vec::new();
        for page in self.pages(prefix) {
            entries.extend(page?);
        }
        info!("{} objects under {}", entries.len(), prefix);
        Ok(entries)
    }

    pub fn object_url(&self, key: &str) -> String {
        format!("{}/{}", self.base, uri_encode(key, true))
    }

    /// Download `key` to `dst`, through `<dst>.part`. Returns the number of bytes written.
    pub fn download(&self, key: &str, dst: &Path) -> Result<u64, Error> {
        let url = self.object_url(key);
        let response = self.get(&url)?;
        match response.status() {
            s if s.is_success() => (),
            StatusCode::NOT_FOUND => return Err(Error::MissingInBucket(key.to_string())),
            s => {
                return Err(Error::Status {
                    status: s.as_u16(),
                    url,
                })
            }
        }

        let part = part_path(dst);
        let mut out = File::create(&part)?;
        let mut body = BufReader::new(Cancellable {
            inner: response,
            cancel: self.cancel.clone(),
        });

        match std::io::copy(&mut body, &mut out) {
            Ok(written) => {
                drop(out);
                std::fs::rename(&part, dst)?;
                info!("downloaded {} ({} bytes)", key, written);
                Ok(written)
            }
            Err(e) => {
                drop(out);
                std::fs::remove_file(&part)?;
                if self.cancel.is_cancelled() {
                    Err(Error::Interrupted)
                } else {
                    Err(e.into())
                }
            }
        }
    }
}

/// `<dst>.part`, sibling of `dst`.
pub fn part_path(dst: &Path) -> PathBuf {
    let mut name = dst.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    dst.with_file_name(name)
}
