//! Descriptive tags attached to every storage transaction.

use chrono::Utc;

use weavecast_gateway::Tag;
use weavecast_protocol::{APP_NAME, APP_VERSION};

/// Builds the standard tag set for an uploaded media file: content
/// type, original file name, the uploading application and its
/// version, and the upload timestamp.
pub fn content_tags(file_name: &str, mime_type: &str) -> Vec<Tag> {
    vec![
        Tag::new("Content-Type", mime_type),
        Tag::new("File-Name", file_name),
        Tag::new("App-Name", APP_NAME),
        Tag::new("App-Version", APP_VERSION),
        Tag::new("Unix-Time", Utc::now().timestamp().to_string()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn value_of<'a>(tags: &'a [Tag], name: &str) -> Option<&'a str> {
        tags.iter()
            .find(|t| t.name == name)
            .map(|t| t.value.as_str())
    }

    #[test]
    fn carries_content_type_and_file_name() {
        let tags = content_tags("clip.mp4", "video/mp4");
        assert_eq!(value_of(&tags, "Content-Type"), Some("video/mp4"));
        assert_eq!(value_of(&tags, "File-Name"), Some("clip.mp4"));
    }

    #[test]
    fn identifies_the_application() {
        let tags = content_tags("clip.mp4", "video/mp4");
        assert_eq!(value_of(&tags, "App-Name"), Some(APP_NAME));
        assert_eq!(value_of(&tags, "App-Version"), Some(APP_VERSION));
    }

    #[test]
    fn unix_time_parses_as_seconds() {
        let tags = content_tags("clip.mp4", "video/mp4");
        let ts: i64 = value_of(&tags, "Unix-Time").unwrap().parse().unwrap();
        assert!(ts > 1_600_000_000);
    }
}
