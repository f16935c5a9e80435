// SPDX-License-Identifier: MIT

// Thin client for the photo host that keeps the voucher images: an upload call plus one metadata
// fetch to recover the photo page URL and the pieces of the thumbnail URL. Sits behind a trait so
// the store's image pipeline can be exercised without a network.

use std::path::Path;
use std::time::Duration;

use itertools::Itertools;
use regex::Regex;
use serde_json::Value;

use crate::errors::VoseqError;
use crate::records::Voucher;

pub const UPLOAD_URL: &str = "https://up.flickr.com/services/upload/";
pub const REST_URL: &str = "https://api.flickr.com/services/rest/";

/// What the metadata fetch returns for one photo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhotoInfo {
    pub page_url: String,
    pub farm: u64,
    pub server: String,
    pub secret: String,
}

pub trait PhotoHost {
    /// Uploads a local file and returns the photo id assigned by the host.
    fn upload(
        &self,
        file: &Path,
        title: &str,
        description: &str,
        tags: &str,
    ) -> Result<String, VoseqError>;

    /// Fetches the metadata needed to build the page and thumbnail URLs.
    fn photo_info(&self, photo_id: &str) -> Result<PhotoInfo, VoseqError>;
}

pub struct FlickrClient {
    api_key: String,
    api_secret: String,
    agent: ureq::Agent,
}

impl FlickrClient {
    pub fn new(api_key: &str, api_secret: &str) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(300))
            .build();
        FlickrClient {
            api_key: api_key.to_string(),
            api_secret: api_secret.to_string(),
            agent,
        }
    }
}

impl PhotoHost for FlickrClient {
    fn upload(
        &self,
        file: &Path,
        title: &str,
        description: &str,
        tags: &str,
    ) -> Result<String, VoseqError> {
        let bytes = std::fs::read(file)?;
        let file_name = file
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("photo.jpg");
        let boundary = format!("voseq-upload-{}", std::process::id());
        let fields = [
            ("api_key", self.api_key.as_str()),
            ("api_secret", self.api_secret.as_str()),
            ("title", title),
            ("description", description),
            ("tags", tags),
        ];
        let body = multipart_body(&boundary, &fields, file_name, &bytes);
        let response = self
            .agent
            .post(UPLOAD_URL)
            .set(
                "Content-Type",
                &format!("multipart/form-data; boundary={}", boundary),
            )
            .send_bytes(&body)
            .map_err(|e| VoseqError::Remote(e.to_string()))?;
        let text = response.into_string()?;
        parse_photo_id(&text)
    }

    fn photo_info(&self, photo_id: &str) -> Result<PhotoInfo, VoseqError> {
        let response = self
            .agent
            .get(REST_URL)
            .query("method", "flickr.photos.getInfo")
            .query("api_key", &self.api_key)
            .query("photo_id", photo_id)
            .query("format", "json")
            .query("nojsoncallback", "1")
            .call()
            .map_err(|e| VoseqError::Remote(e.to_string()))?;
        let text = response.into_string()?;
        let value: Value = serde_json::from_str(&text)
            .map_err(|e| VoseqError::Remote(format!("photo info response: {}", e)))?;
        parse_photo_info(&value)
    }
}

// The upload endpoint answers with a small XML document; the photo id is all we need from it.
pub fn parse_photo_id(xml: &str) -> Result<String, VoseqError> {
    let re = Regex::new(r"<photoid>\s*([^<]+?)\s*</photoid>")
        .map_err(|e| VoseqError::Format(e.to_string()))?;
    let captures = re.captures(xml).ok_or_else(|| {
        VoseqError::Remote(format!("no photoid in upload response: {}", xml.trim()))
    })?;
    Ok(captures[1].to_string())
}

pub fn parse_photo_info(value: &Value) -> Result<PhotoInfo, VoseqError> {
    let page_url = value
        .pointer("/photo/urls/url/0/_content")
        .and_then(Value::as_str)
        .ok_or_else(|| VoseqError::Remote(String::from("no page URL in photo info")))?
        .to_string();
    let farm = value
        .pointer("/photo/farm")
        .and_then(Value::as_u64)
        .ok_or_else(|| VoseqError::Remote(String::from("no farm in photo info")))?;
    let server = value
        .pointer("/photo/server")
        .and_then(Value::as_str)
        .ok_or_else(|| VoseqError::Remote(String::from("no server in photo info")))?
        .to_string();
    let secret = value
        .pointer("/photo/secret")
        .and_then(Value::as_str)
        .ok_or_else(|| VoseqError::Remote(String::from("no secret in photo info")))?
        .to_string();
    Ok(PhotoInfo {
        page_url,
        farm,
        server,
        secret,
    })
}

pub fn thumbnail_url(info: &PhotoInfo, photo_id: &str) -> String {
    format!(
        "https://farm{}.staticflickr.com/{}/{}_{}_m_d.jpg",
        info.farm, info.server, photo_id, info.secret
    )
}

/// Photo title shown on the host: voucher code plus binomial.
pub fn photo_title(voucher: &Voucher) -> String {
    format!("{} {} {}", voucher.code, voucher.genus, voucher.species)
}

pub fn photo_description(voucher: &Voucher) -> String {
    format!(
        "{}. {}. {}",
        voucher.country, voucher.specific_locality, voucher.published_in
    )
}

/// Tags for the photo: the voucher's place and lineage, each double-quoted.
pub fn photo_tags(voucher: &Voucher) -> String {
    [
        &voucher.country,
        &voucher.family,
        &voucher.subfamily,
        &voucher.tribe,
        &voucher.subtribe,
        &voucher.genus,
        &voucher.species,
    ]
    .iter()
    .map(|tag| format!("\"{}\"", tag))
    .join(" ")
}

fn multipart_body(
    boundary: &str,
    fields: &[(&str, &str)],
    file_name: &str,
    file_bytes: &[u8],
) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                boundary, name, value
            )
            .as_bytes(),
        );
    }
    body.extend_from_slice(
        format!(
            "--{}\r\nContent-Disposition: form-data; name=\"photo\"; filename=\"{}\"\r\n\
             Content-Type: application/octet-stream\r\n\r\n",
            boundary, file_name
        )
        .as_bytes(),
    );
    body.extend_from_slice(file_bytes);
    body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());
    body
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_photo_id() {
        let xml = "<?xml version=\"1.0\" encoding=\"utf-8\" ?>\n<rsp stat=\"ok\">\n\
                   <photoid>52117613907</photoid>\n</rsp>";
        assert_eq!("52117613907", parse_photo_id(xml).expect("photo id"));
    }

    #[test]
    fn test_parse_photo_id_missing() {
        let xml = "<rsp stat=\"fail\"><err code=\"100\" msg=\"Invalid API Key\"/></rsp>";
        assert!(parse_photo_id(xml).is_err());
    }

    #[test]
    fn test_parse_photo_info() {
        let value = json!({
            "photo": {
                "farm": 9,
                "server": "8237",
                "secret": "abc123",
                "urls": {
                    "url": [ { "type": "photopage", "_content": "https://www.flickr.com/photos/x/52117613907/" } ]
                }
            }
        });
        let info = parse_photo_info(&value).expect("photo info");
        assert_eq!(info.page_url, "https://www.flickr.com/photos/x/52117613907/");
        assert_eq!(info.farm, 9);
        assert_eq!(info.server, "8237");
        assert_eq!(info.secret, "abc123");
        assert_eq!(
            thumbnail_url(&info, "52117613907"),
            "https://farm9.staticflickr.com/8237/52117613907_abc123_m_d.jpg"
        );
    }

    #[test]
    fn test_photo_metadata_builders() {
        let mut voucher = Voucher::new("CP100-10");
        voucher.genus = String::from("Euptychia");
        voucher.species = String::from("ordinata");
        voucher.country = String::from("PERU");
        voucher.specific_locality = String::from("Quebrada Siete Jefes");
        voucher.published_in = String::from("Zootaxa 1234");
        voucher.family = String::from("Nymphalidae");
        voucher.subfamily = String::from("Satyrinae");
        assert_eq!("CP100-10 Euptychia ordinata", photo_title(&voucher));
        assert_eq!(
            "PERU. Quebrada Siete Jefes. Zootaxa 1234",
            photo_description(&voucher)
        );
        let tags = photo_tags(&voucher);
        assert_eq!(
            "\"PERU\" \"Nymphalidae\" \"Satyrinae\" \"\" \"\" \"Euptychia\" \"ordinata\"",
            tags
        );
    }
}
