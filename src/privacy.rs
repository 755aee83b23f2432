//! Redaction of personal identity fields
//!
//! Author and owner identities are replaced with [`REDACTED`] before a record
//! leaves the crate. Masking works on the serialized record so the same rules
//! cover every entity type. A dotted path reaches into a nested object and a
//! `[]` segment applies to each element of an array field.

use serde_json::Value;
use tracing::trace;

use crate::config::PrivacyConfig;
use crate::error::Result;
use crate::models::EntityRecord;

/// Replacement for masked values
pub const REDACTED: &str = "<redacted>";

/// Field paths that carry identity data
pub const MASKABLE_PATHS: &[&str] = &[
    "authorName",
    "authorProfileUrl",
    "authorProfileImageThumb.url",
    "ownerName",
    "ownerProfileUrl",
    "contributors[].name",
    "contributors[].profileUrl",
];

fn toggle(config: &PrivacyConfig, path: &str) -> bool {
    match path {
        "authorName" => config.author_name,
        "authorProfileUrl" => config.author_profile_url,
        "authorProfileImageThumb.url" => config.author_profile_image_thumb,
        "ownerName" => config.owner_name,
        "ownerProfileUrl" => config.owner_profile_url,
        "contributors[].name" => config.contributor_name,
        "contributors[].profileUrl" => config.contributor_profile_url,
        _ => false,
    }
}

/// Applies the configured redactions
#[derive(Debug, Clone, Default)]
pub struct PrivacyMask {
    config: PrivacyConfig,
}

impl PrivacyMask {
    pub fn new(config: PrivacyConfig) -> Self {
        Self { config }
    }

    /// Whether the field at `path` is masked
    pub fn should_mask(&self, path: &str) -> bool {
        toggle(&self.config, path)
    }

    /// Paths masked under the current configuration
    pub fn masked_paths(&self) -> impl Iterator<Item = &'static str> + '_ {
        MASKABLE_PATHS
            .iter()
            .copied()
            .filter(|path| toggle(&self.config, path))
    }

    /// Mask a serialized record in place. Null fields stay null.
    pub fn apply(&self, record: &mut Value) {
        for path in self.masked_paths() {
            match path.split_once("[].") {
                Some((array, field)) => {
                    if let Some(Value::Array(items)) = record.get_mut(array) {
                        for item in items {
                            redact(item, field);
                        }
                    }
                }
                None => redact(record, path),
            }
        }
        // The thumbnail caption repeats the author's name
        if self.config.author_name {
            redact(record, "authorProfileImageThumb.alt");
        }
    }

    /// Serialize `record` and mask it
    pub fn mask_record(&self, record: &EntityRecord) -> Result<Value> {
        let mut value = serde_json::to_value(record)?;
        self.apply(&mut value);
        Ok(value)
    }
}

fn redact(object: &mut Value, path: &str) {
    let (parent, field) = match path.rsplit_once('.') {
        Some((parent, field)) => {
            let pointer = format!("/{}", parent.replace('.', "/"));
            (object.pointer_mut(&pointer), field)
        }
        None => (Some(object), path),
    };
    if let Some(slot) = parent.and_then(|p| p.get_mut(field)) {
        if !slot.is_null() {
            trace!(path, "Masking field");
            *slot = Value::from(REDACTED);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AlbumRecord, ImageMeta, Person, PhotoRecord};
    use serde_json::json;

    fn photo() -> EntityRecord {
        EntityRecord::Photo(PhotoRecord {
            url: "https://www.facebook.com/photo/?fbid=1".into(),
            author_name: Some("Jane Doe".into()),
            author_profile_url: Some("https://www.facebook.com/jane.doe".into()),
            author_profile_image_thumb: Some(ImageMeta::new(
                "https://scontent/a.jpg",
                Some("Jane Doe".into()),
            )),
            likes_count: Some(12),
            ..Default::default()
        })
    }

    #[test]
    fn test_masks_author_and_keeps_siblings() {
        let mask = PrivacyMask::default();
        let value = mask.mask_record(&photo()).unwrap();

        assert_eq!(value["authorName"], json!(REDACTED));
        assert_eq!(value["authorProfileUrl"], json!(REDACTED));
        assert_eq!(value["authorProfileImageThumb"]["url"], json!(REDACTED));
        assert_eq!(value["authorProfileImageThumb"]["alt"], json!(REDACTED));
        assert_eq!(value["likesCount"], json!(12));
        assert_eq!(value["url"], json!("https://www.facebook.com/photo/?fbid=1"));
    }

    #[test]
    fn test_masking_is_stable() {
        let mask = PrivacyMask::default();
        let mut once = mask.mask_record(&photo()).unwrap();
        let twice = once.clone();
        mask.apply(&mut once);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_toggles_are_per_field() {
        let mut config = PrivacyConfig::all(false);
        config.author_name = true;
        let mask = PrivacyMask::new(config);
        let value = mask.mask_record(&photo()).unwrap();

        assert_eq!(value["authorName"], json!(REDACTED));
        assert_eq!(value["authorProfileUrl"], json!("https://www.facebook.com/jane.doe"));
        assert!(mask.should_mask("authorName"));
        assert!(!mask.should_mask("ownerName"));
        assert!(!mask.should_mask("likesCount"));
    }

    #[test]
    fn test_author_name_mask_covers_thumb_caption() {
        let mut config = PrivacyConfig::all(false);
        config.author_name = true;
        let value = PrivacyMask::new(config).mask_record(&photo()).unwrap();

        let thumb = &value["authorProfileImageThumb"];
        assert_eq!(thumb["alt"], json!(REDACTED));
        assert_eq!(thumb["url"], json!("https://scontent/a.jpg"));
        assert!(!value.to_string().contains("Jane Doe"));
    }

    #[test]
    fn test_thumb_keeps_its_shape() {
        let mut config = PrivacyConfig::all(false);
        config.author_profile_image_thumb = true;
        let value = PrivacyMask::new(config).mask_record(&photo()).unwrap();

        let thumb = &value["authorProfileImageThumb"];
        assert!(thumb.is_object());
        assert_eq!(thumb["url"], json!(REDACTED));
        assert_eq!(thumb["alt"], json!("Jane Doe"));
    }

    #[test]
    fn test_masks_album_contributors() {
        let record = EntityRecord::Album(AlbumRecord {
            url: "https://www.facebook.com/media/set/?set=oa.9".into(),
            owner_name: Some("Group Admin".into()),
            contributors: Some(vec![
                Person {
                    name: Some("A".into()),
                    profile_url: Some("https://www.facebook.com/a".into()),
                    fbid: Some("11".into()),
                },
                Person {
                    name: None,
                    profile_url: None,
                    fbid: Some("12".into()),
                },
            ]),
            items_count: Some(40),
            ..Default::default()
        });
        let value = PrivacyMask::default().mask_record(&record).unwrap();

        assert_eq!(value["ownerName"], json!(REDACTED));
        assert_eq!(value["ownerProfileUrl"], json!(null));
        assert_eq!(value["contributors"][0]["name"], json!(REDACTED));
        assert_eq!(value["contributors"][0]["profileUrl"], json!(REDACTED));
        assert_eq!(value["contributors"][0]["fbid"], json!("11"));
        assert_eq!(value["contributors"][1]["name"], json!(null));
        assert_eq!(value["itemsCount"], json!(40));
    }
}
