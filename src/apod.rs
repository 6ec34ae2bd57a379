use std::time::Duration;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use image::RgbaImage;
use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde::Deserialize;

pub const APOD_URL: &str = "https://api.nasa.gov/planetary/apod";
const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("HTTP request failed for {url}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("HTTP {status} for {url}")]
    Status { url: String, status: StatusCode },
    #[error("APOD metadata for {date} could not be parsed")]
    Metadata {
        date: NaiveDate,
        #[source]
        source: serde_json::Error,
    },
    #[error("APOD entry for {date} is a {media_type}, not an image")]
    NotAnImage { date: NaiveDate, media_type: String },
    #[error("APOD entry for {date} has no image URL")]
    MissingUrl { date: NaiveDate },
    #[error("Could not decode image from {url}")]
    Decode {
        url: String,
        #[source]
        source: image::ImageError,
    },
    #[error("No calendar day before {date}")]
    DateOutOfRange { date: NaiveDate },
}

/// Yields the decoded picture of the day for a date.
pub trait ApodSource {
    fn fetch(&mut self, date: NaiveDate, hd: bool) -> Result<RgbaImage, FetchError>;
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApodEntry {
    pub title: Option<String>,
    pub media_type: Option<String>,
    pub url: Option<String>,
    pub hdurl: Option<String>,
}

impl ApodEntry {
    /// Picks the URL to download, preferring `hdurl` when HD was asked for.
    pub fn image_url(&self, date: NaiveDate, hd: bool) -> Result<&str, FetchError> {
        if let Some(media_type) = self.media_type.as_deref() {
            if !media_type.eq_ignore_ascii_case("image") {
                return Err(FetchError::NotAnImage {
                    date,
                    media_type: media_type.to_string(),
                });
            }
        }

        let hd_url = hd.then_some(self.hdurl.as_deref()).flatten();
        hd_url
            .into_iter()
            .chain(self.url.as_deref())
            .map(str::trim)
            .find(|url| !url.is_empty())
            .ok_or(FetchError::MissingUrl { date })
    }
}

pub struct ApodClient {
    client: Client,
    endpoint: String,
    api_key: String,
}

impl ApodClient {
    pub fn new(api_key: String) -> Result<Self> {
        Self::with_endpoint(APOD_URL, api_key)
    }

    pub fn with_endpoint(endpoint: &str, api_key: String) -> Result<Self> {
        Ok(Self {
            client: build_http_client()?,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    pub fn fetch_entry(&self, date: NaiveDate, hd: bool) -> Result<ApodEntry, FetchError> {
        let params = metadata_query(date, hd, &self.api_key);
        let request = self.client.get(&self.endpoint).query(&params);
        let body = send_for_bytes(request, &self.endpoint)?;
        parse_entry(&body, date)
    }
}

impl ApodSource for ApodClient {
    fn fetch(&mut self, date: NaiveDate, hd: bool) -> Result<RgbaImage, FetchError> {
        let entry = self.fetch_entry(date, hd)?;
        let url = entry.image_url(date, hd)?;
        log::info!(
            "Downloading APOD {} ({}) from {url}",
            format_date(date),
            entry.title.as_deref().unwrap_or("untitled")
        );

        let bytes = send_for_bytes(self.client.get(url), url)?;
        decode_image(&bytes, url)
    }
}

fn build_http_client() -> Result<Client> {
    Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .timeout(Duration::from_secs(60))
        .build()
        .context("Could not initialize HTTP client for the APOD API")
}

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

pub fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT).ok()
}

fn metadata_query(date: NaiveDate, hd: bool, api_key: &str) -> [(&'static str, String); 3] {
    let hd = if hd { "True" } else { "False" };
    [
        ("date", format_date(date)),
        ("hd", hd.to_string()),
        ("api_key", api_key.to_string()),
    ]
}

fn send_for_bytes(
    request: reqwest::blocking::RequestBuilder,
    url: &str,
) -> Result<Vec<u8>, FetchError> {
    let request_error = |source| FetchError::Request {
        url: url.to_string(),
        source,
    };

    let response = request.send().map_err(request_error)?;
    let status = response.status();
    if !status.is_success() {
        return Err(FetchError::Status {
            url: url.to_string(),
            status,
        });
    }

    response
        .bytes()
        .map(|body| body.to_vec())
        .map_err(request_error)
}

fn parse_entry(body: &[u8], date: NaiveDate) -> Result<ApodEntry, FetchError> {
    serde_json::from_slice(body).map_err(|source| FetchError::Metadata { date, source })
}

fn decode_image(bytes: &[u8], url: &str) -> Result<RgbaImage, FetchError> {
    image::load_from_memory(bytes)
        .map(|decoded| decoded.to_rgba8())
        .map_err(|source| FetchError::Decode {
            url: url.to_string(),
            source,
        })
}
