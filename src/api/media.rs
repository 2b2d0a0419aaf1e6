//! Media references
//!
//! Thumbnails and raw files are addressed by URL only; the core never
//! fetches or parses them.

use reqwest::Url;

use super::service::ApiError;

#[derive(Debug, Clone)]
pub struct MediaUrls {
    origin: Url,
}

impl MediaUrls {
    pub fn new(origin: &str) -> Result<Self, ApiError> {
        let origin = Url::parse(origin)
            .map_err(|e| ApiError::InvalidRequest(format!("Invalid service origin '{}': {}", origin, e)))?;
        Ok(Self { origin })
    }

    /// `{origin}/thumbnails/{file_id}.webp`
    pub fn thumbnail_url(&self, file_id: &str) -> String {
        let mut url = self.origin.clone();
        url.set_path(&format!("thumbnails/{}.webp", file_id));
        url.set_query(None);
        url.to_string()
    }

    /// `{origin}/api/file?path=<encoded absolute path>`
    pub fn file_url(&self, filepath: &str) -> String {
        let mut url = self.origin.clone();
        url.set_path("api/file");
        url.query_pairs_mut().clear().append_pair("path", filepath);
        url.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thumbnail_url() {
        let media = MediaUrls::new("http://127.0.0.1:8000").unwrap();
        assert_eq!(
            media.thumbnail_url("3f2a9c"),
            "http://127.0.0.1:8000/thumbnails/3f2a9c.webp"
        );
    }

    #[test]
    fn test_file_url_encodes_path() {
        let media = MediaUrls::new("http://127.0.0.1:8000/").unwrap();
        assert_eq!(
            media.file_url("/home/ana/My Photos/a&b.jpg"),
            "http://127.0.0.1:8000/api/file?path=%2Fhome%2Fana%2FMy+Photos%2Fa%26b.jpg"
        );
    }

    #[test]
    fn test_invalid_origin() {
        assert!(MediaUrls::new("not a url").is_err());
    }
}
