//! Incremental metadata harvesting.
use std::fs::OpenOptions;
use std::path::Path;
use std::time::Duration;

use chrono::NaiveDate;
use log::{debug, info, warn};
use reqwest::header::RETRY_AFTER;
use reqwest::StatusCode;

use super::record::{parse_page, MetadataRecord, Page};
use crate::cancel::CancelToken;
use crate::config::MetadataConfig;
use crate::error::Error;

const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(30);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// Records of a full harvest, along with the date of the last answer.
#[derive(Debug, Default)]
pub struct Harvest {
    pub records: Vec<MetadataRecord>,
    pub response_date: Option<String>,
}

pub struct Harvester {
    client: reqwest::blocking::Client,
    endpoint: String,
    set: String,
    page_delay: Duration,
    cancel: CancelToken,
}

/// Parse the `Retry-After` header when given in seconds.
fn retry_after(response: &reqwest::blocking::Response) -> Option<Duration> {
    response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

/// Parse the date part of a `date_retrieved` value (`2019-05-06T10:00:00Z` or `2019-05-06`).
fn parse_date(value: &str) -> Option<NaiveDate> {
    let date = value.get(..10).unwrap_or(value);
    NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()
}

/// Latest `date_retrieved` of the metadata table at `path`.
pub fn last_retrieved(path: &Path) -> Result<Option<NaiveDate>, Error> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut last = None;
    for row in reader.deserialize::<MetadataRecord>() {
        let row = row?;
        let date = row.date_retrieved.as_deref().and_then(parse_date);
        last = last.max(date);
    }
    Ok(last)
}

/// Append `records` to the metadata table at `path`, writing the header if the table is new.
pub fn append_records(path: &Path, records: &[MetadataRecord]) -> Result<(), Error> {
    let has_header = path.metadata().map(|m| m.len() > 0).unwrap_or(false);
    let f = OpenOptions::new().create(true).append(true).open(path)?;
    let mut writer = csv::WriterBuilder::new()
        .has_headers(!has_header)
        .from_writer(f);
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;
    Ok(())
}

impl Harvester {
    pub fn new(config: &MetadataConfig, cancel: CancelToken) -> Result<Self, Error> {
        let client = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            set: config.set.clone(),
            page_delay: Duration::from_secs(config.page_delay_secs),
            cancel,
        })
    }

    pub fn with_page_delay(mut self, page_delay: Duration) -> Self {
        self.page_delay = page_delay;
        self
    }

    /// Fetch a page, waiting and retrying the same request while the server answers 429 or 503.
    fn fetch(&self, query: &[(&str, String)]) -> Result<Page, Error> {
        loop {
            self.cancel.check()?;
            debug!("requesting {} {:?}", self.endpoint, query);
            let response = self.client.get(&self.endpoint).query(query).send()?;
            let status = response.status();

            if status == StatusCode::TOO_MANY_REQUESTS || status == StatusCode::SERVICE_UNAVAILABLE {
                let wait = retry_after(&response).unwrap_or(DEFAULT_RETRY_AFTER);
                warn!("{}: waiting {:?} before retrying", status, wait);
                self.cancel.sleep(wait)?;
                continue;
            }

            if !status.is_success() {
                return Err(Error::Status {
                    status: status.as_u16(),
                    url: response.url().to_string(),
                });
            }

            return parse_page(&response.text()?);
        }
    }

    /// Harvest every record of the set, from `from` (inclusive) when provided.
    pub fn harvest(&self, from: Option<NaiveDate>) -> Result<Harvest, Error> {
        let mut query = vec![
            ("verb", "ListRecords".to_string()),
            ("set", self.set.clone()),
            ("metadataPrefix", "arXiv".to_string()),
        ];
        if let Some(from) = from {
            query.push(("from", from.format("%Y-%m-%d").to_string()));
        }

        let mut harvest = Harvest::default();
        loop {
            let page = self.fetch(&query)?;
            harvest.records.extend(page.records);
            if page.response_date.is_some() {
                harvest.response_date = page.response_date;
            }

            match page.resumption {
                Some(token) => {
                    info!(
                        "harvested {}/{} records",
                        harvest.records.len(),
                        token
                            .complete_list_size
                            .map(|s| s.to_string())
                            .unwrap_or_else(|| "?".to_string())
                    );
                    query = vec![
                        ("verb", "ListRecords".to_string()),
                        ("resumptionToken", token.token),
                    ];
                    self.cancel.sleep(self.page_delay)?;
                }
                None => break,
            }
        }

        Ok(harvest)
    }

    /// Create or refresh the metadata table at `path`. Returns the number of new rows.
    ///
    /// An existing table is refreshed from the day after its latest `date_retrieved`.
    pub fn update(&self, path: &Path) -> Result<usize, Error> {
        let from = if path.is_file() {
            let last = last_retrieved(path)?;
            if let Some(last) = last {
                info!("{:?} last updated on {}", path, last);
            }
            last.and_then(|d| d.succ_opt())
        } else {
            info!("creating {:?}", path);
            None
        };

        let Harvest {
            mut records,
            response_date,
        } = self.harvest(from)?;

        if records.is_empty() {
            info!("no new records, metadata is up to date");
            return Ok(0);
        }

        for record in records.iter_mut() {
            record.date_retrieved = response_date.clone();
        }
        append_records(path, &records)?;
        info!("added {} records to {:?}", records.len(), path);
        Ok(records.len())
    }
}
