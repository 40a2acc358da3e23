//! Remote Folder Client (component B).
//!
//! Lists image files recursively from an external folder URL and downloads
//! their bytes with a fallback sequence. Grounded in the teacher's
//! `ApiClient` (`src/common/api_client.rs`, now removed): one `reqwest`
//! client built once with connect/request timeouts, one `thiserror` enum
//! per failure mode.

use std::collections::{HashSet, VecDeque};
use std::time::Duration;

use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;

const PAGE_SIZE: u32 = 200;
const FOLDER_MIME: &str = "application/vnd.google-apps.folder";

#[derive(Debug, Error)]
pub enum RemoteFolderError {
    #[error("could not extract a folder id from {0:?}")]
    InvalidFolderReference(String),
    #[error("remote listing failed: {0}")]
    ListingFailed(String),
    #[error("remote fetch failed for file {0}")]
    FetchFailed(String),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemoteFile {
    pub id: String,
    pub name: String,
    #[serde(rename = "mimeType")]
    pub mime_type: String,
    #[serde(rename = "webViewLink")]
    pub web_view_link: Option<String>,
    #[serde(rename = "modifiedTime")]
    pub modified_time: Option<String>,
    pub size: Option<String>,
}

impl RemoteFile {
    /// The cache key used to decide whether this file needs re-processing:
    /// exactly `"<modifiedTime>|<size>|<name>"`.
    #[must_use]
    pub fn content_stamp(&self) -> String {
        format!(
            "{}|{}|{}",
            self.modified_time.as_deref().unwrap_or(""),
            self.size.as_deref().unwrap_or(""),
            self.name
        )
    }

    #[must_use]
    pub fn is_image(&self) -> bool {
        self.mime_type.starts_with("image/")
    }

    #[must_use]
    pub fn is_folder(&self) -> bool {
        self.mime_type == FOLDER_MIME
    }
}

#[derive(Debug, Deserialize)]
struct ListingPage {
    files: Vec<RemoteFile>,
    #[serde(rename = "nextPageToken")]
    next_page_token: Option<String>,
}

pub struct RemoteFolderClient {
    http: Client,
    api_key: String,
}

impl RemoteFolderClient {
    /// # Panics
    /// if the underlying `reqwest` client can't be built.
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            http: Client::builder()
                .connect_timeout(Duration::from_secs(5))
                .timeout(Duration::from_secs(30))
                .build()
                .expect("failed to create HTTP client"),
            api_key: api_key.into(),
        }
    }

    /// Extracts a folder id from a raw id, a `/folders/<id>` URL, or a
    /// `?id=` query string.
    ///
    /// # Errors
    /// If none of the recognized shapes match.
    pub fn extract_folder_id(reference: &str) -> Result<String, RemoteFolderError> {
        let raw_id_re = Regex::new(r"^[A-Za-z0-9_-]{10,}$").unwrap();
        if raw_id_re.is_match(reference) {
            return Ok(reference.to_string());
        }
        let path_re = Regex::new(r"/folders/([A-Za-z0-9_-]{10,})").unwrap();
        if let Some(caps) = path_re.captures(reference) {
            return Ok(caps[1].to_string());
        }
        let query_re = Regex::new(r"[?&]id=([A-Za-z0-9_-]{10,})").unwrap();
        if let Some(caps) = query_re.captures(reference) {
            return Ok(caps[1].to_string());
        }
        Err(RemoteFolderError::InvalidFolderReference(
            reference.to_string(),
        ))
    }

    /// Breadth-first, cycle-safe recursive listing of image files under
    /// `root_folder_id`. Stops once `max_items` files have been collected
    /// (0 = unlimited).
    ///
    /// # Errors
    /// If any listing page request fails.
    pub async fn list_images(
        &self,
        root_folder_id: &str,
        max_items: u32,
    ) -> Result<Vec<RemoteFile>, RemoteFolderError> {
        let mut collected = Vec::new();
        let mut visited = HashSet::new();
        let mut queue = VecDeque::new();
        queue.push_back(root_folder_id.to_string());
        visited.insert(root_folder_id.to_string());

        while let Some(folder_id) = queue.pop_front() {
            if max_items > 0 && collected.len() as u32 >= max_items {
                break;
            }
            let mut page_token: Option<String> = None;
            loop {
                let page = self.list_page(&folder_id, page_token.as_deref()).await?;
                for file in page.files {
                    if file.is_folder() {
                        if visited.insert(file.id.clone()) {
                            queue.push_back(file.id);
                        }
                    } else if file.is_image() {
                        collected.push(file);
                        if max_items > 0 && collected.len() as u32 >= max_items {
                            break;
                        }
                    }
                }
                if page.next_page_token.is_none()
                    || (max_items > 0 && collected.len() as u32 >= max_items)
                {
                    break;
                }
                page_token = page.next_page_token;
            }
        }

        Ok(collected)
    }

    async fn list_page(
        &self,
        folder_id: &str,
        page_token: Option<&str>,
    ) -> Result<ListingPage, RemoteFolderError> {
        let mut request = self
            .http
            .get("https://www.googleapis.com/drive/v3/files")
            .query(&[
                ("key", self.api_key.as_str()),
                ("q", &format!("'{folder_id}' in parents and trashed = false")),
                ("pageSize", &PAGE_SIZE.to_string()),
                (
                    "fields",
                    "nextPageToken, files(id,name,mimeType,webViewLink,modifiedTime,size)",
                ),
            ]);
        if let Some(token) = page_token {
            request = request.query(&[("pageToken", token)]);
        }
        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(RemoteFolderError::ListingFailed(format!(
                "status {}",
                response.status()
            )));
        }
        response
            .json::<ListingPage>()
            .await
            .map_err(RemoteFolderError::Http)
    }

    /// Downloads image bytes for `file`, trying the candidate URL sequence
    /// until one returns non-HTML bytes with a recognized image signature.
    ///
    /// # Errors
    /// If every candidate fails or returns HTML.
    pub async fn download(&self, file: &RemoteFile) -> Result<Vec<u8>, RemoteFolderError> {
        for url in self.candidate_urls(file) {
            if let Ok(response) = self.http.get(&url).send().await {
                if response.status().is_success() {
                    if let Ok(bytes) = response.bytes().await {
                        if looks_like_image(&bytes) {
                            return Ok(bytes.to_vec());
                        }
                    }
                }
            }
        }
        Err(RemoteFolderError::FetchFailed(file.id.clone()))
    }

    fn candidate_urls(&self, file: &RemoteFile) -> Vec<String> {
        vec![
            format!(
                "https://www.googleapis.com/drive/v3/files/{}?alt=media&key={}",
                file.id, self.api_key
            ),
            format!("https://drive.google.com/uc?export=download&id={}", file.id),
            format!("https://lh3.googleusercontent.com/d/{}=s0", file.id),
        ]
    }
}

fn looks_like_image(bytes: &[u8]) -> bool {
    if bytes.len() < 4 {
        return false;
    }
    let head = &bytes[..bytes.len().min(256)];
    let looks_like_html = head
        .windows(5)
        .any(|w| w.eq_ignore_ascii_case(b"<html"));
    if looks_like_html {
        return false;
    }
    bytes.starts_with(&[0xFF, 0xD8, 0xFF]) // JPEG
        || bytes.starts_with(b"\x89PNG")
        || bytes.starts_with(b"RIFF") // WEBP container
        || bytes.starts_with(b"GIF8")
        || bytes.starts_with(b"BM") // BMP
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_raw_id() {
        let id = RemoteFolderClient::extract_folder_id("1a2B3c4D5e6F7g8H9i").unwrap();
        assert_eq!(id, "1a2B3c4D5e6F7g8H9i");
    }

    #[test]
    fn extracts_id_from_path() {
        let id = RemoteFolderClient::extract_folder_id(
            "https://drive.google.com/drive/folders/1a2B3c4D5e6F7g8H9i?usp=sharing",
        )
        .unwrap();
        assert_eq!(id, "1a2B3c4D5e6F7g8H9i");
    }

    #[test]
    fn extracts_id_from_query() {
        let id =
            RemoteFolderClient::extract_folder_id("https://example.com/open?id=1a2B3c4D5e6F7g8H9i")
                .unwrap();
        assert_eq!(id, "1a2B3c4D5e6F7g8H9i");
    }

    #[test]
    fn rejects_unrecognized_reference() {
        assert!(RemoteFolderClient::extract_folder_id("nope").is_err());
    }

    #[test]
    fn content_stamp_format() {
        let f = RemoteFile {
            id: "x".into(),
            name: "a.jpg".into(),
            mime_type: "image/jpeg".into(),
            web_view_link: None,
            modified_time: Some("2024-01-01T00:00:00Z".into()),
            size: Some("123".into()),
        };
        assert_eq!(f.content_stamp(), "2024-01-01T00:00:00Z|123|a.jpg");
    }

    #[test]
    fn detects_image_signatures() {
        assert!(looks_like_image(&[0xFF, 0xD8, 0xFF, 0x00]));
        assert!(!looks_like_image(b"<html><body>"));
        assert!(!looks_like_image(b"no"));
    }
}
