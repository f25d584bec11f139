use serde::{Deserialize, Serialize};

/// The daily featured APOD entry. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PictureOfDay {
    pub title: String,
    #[serde(default)]
    pub explanation: String,
    pub url: String,
    pub media_type: String,
}

impl PictureOfDay {
    /// Only `"image"` entries can be rendered; videos and other media are not.
    pub fn is_image(&self) -> bool {
        self.media_type == "image"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_apod_payload() {
        let json = r#"{
            "date": "2024-01-01",
            "title": "Comet Tail",
            "explanation": "A long tail.",
            "url": "https://apod.nasa.gov/apod/image/comet.jpg",
            "media_type": "image",
            "service_version": "v1"
        }"#;
        let picture: PictureOfDay = serde_json::from_str(json).unwrap();
        assert_eq!(picture.title, "Comet Tail");
        assert!(picture.is_image());
    }

    #[test]
    fn test_video_is_not_image() {
        let json = r#"{"title":"Launch","url":"https://youtube.com/x","media_type":"video"}"#;
        let picture: PictureOfDay = serde_json::from_str(json).unwrap();
        assert_eq!(picture.explanation, "");
        assert!(!picture.is_image());
    }
}
