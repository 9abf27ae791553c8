use std::fmt;

use crate::config::UploadPolicy;
use crate::error::DiveLogError;
use crate::geo::LatLng;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DiveId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct UserId(pub String);

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PhotoId(pub String);

uniffi::custom_newtype!(DiveId, String);
uniffi::custom_newtype!(UserId, String);
uniffi::custom_newtype!(PhotoId, String);

impl fmt::Display for DiveId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for PhotoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DiveId {
    fn from(value: &str) -> Self {
        DiveId(value.to_string())
    }
}

impl From<&str> for UserId {
    fn from(value: &str) -> Self {
        UserId(value.to_string())
    }
}

#[derive(Clone, Debug, PartialEq, uniffi::Record)]
pub struct GeoLocation {
    pub lat: f64,
    pub lng: f64,
    /// Dive site display name.
    pub name: String,
    pub address: Option<String>,
}

#[derive(Clone, Debug, PartialEq, uniffi::Record)]
pub struct Photo {
    pub id: PhotoId,
    pub url: String,
    /// Blob store path, used to delete the photo with its dive.
    pub storage_path: String,
    pub caption: Option<String>,
    pub uploaded_at_unix: i64,
    pub file_name: String,
    pub size_bytes: u64,
}

#[derive(Clone, Debug, PartialEq, uniffi::Record)]
pub struct DiveRecord {
    pub id: DiveId,
    pub owner_id: UserId,
    pub location: GeoLocation,
    pub dive_time_unix: i64,
    pub created_at_unix: i64,
    pub max_depth_m: Option<f32>,
    pub duration_min: Option<u32>,
    pub visibility_m: Option<f32>,
    pub water_temp_c: Option<f32>,
    pub photos: Vec<Photo>,
    pub notes: Option<String>,
    pub buddy: Option<String>,
    pub marine_life: Option<String>,
}

impl DiveRecord {
    pub fn position(&self) -> LatLng {
        LatLng::new(self.location.lat, self.location.lng)
    }

    pub fn is_owned_by(&self, user: &UserId) -> bool {
        &self.owner_id == user
    }

    /// Whether `user` may edit or delete this dive. Anonymous users never can.
    pub fn can_edit(&self, user: Option<&UserId>) -> bool {
        user.is_some_and(|user| self.is_owned_by(user))
    }
}

/// User-editable fields of a dive, as submitted from the log form.
#[derive(Clone, Debug, PartialEq)]
pub struct DiveDraft {
    pub location: GeoLocation,
    pub dive_time_unix: i64,
    pub max_depth_m: Option<f32>,
    pub duration_min: Option<u32>,
    pub visibility_m: Option<f32>,
    pub water_temp_c: Option<f32>,
    pub notes: Option<String>,
    pub buddy: Option<String>,
    pub marine_life: Option<String>,
}

impl DiveDraft {
    pub fn validate(&self) -> Result<(), DiveLogError> {
        if self.location.name.trim().is_empty() {
            return Err(DiveLogError::validation("location", "a dive site name is required"));
        }
        if !(-90.0..=90.0).contains(&self.location.lat) {
            return Err(DiveLogError::validation(
                "location",
                format!("latitude {} is out of range", self.location.lat),
            ));
        }
        if !(-180.0..=180.0).contains(&self.location.lng) {
            return Err(DiveLogError::validation(
                "location",
                format!("longitude {} is out of range", self.location.lng),
            ));
        }
        if let Some(depth) = self.max_depth_m {
            if !depth.is_finite() || depth < 0.0 {
                return Err(DiveLogError::validation("max_depth_m", "must not be negative"));
            }
        }
        if let Some(visibility) = self.visibility_m {
            if !visibility.is_finite() || visibility < 0.0 {
                return Err(DiveLogError::validation("visibility_m", "must not be negative"));
            }
        }
        if let Some(temp) = self.water_temp_c {
            if !(-2.0..=40.0).contains(&temp) {
                return Err(DiveLogError::validation(
                    "water_temp_c",
                    format!("{temp} °C is not a plausible water temperature"),
                ));
            }
        }
        Ok(())
    }
}

/// A photo file picked by the user, not yet uploaded.
#[derive(Clone, Debug, PartialEq)]
pub struct PhotoUpload {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
    pub caption: Option<String>,
}

impl PhotoUpload {
    pub fn validate(&self, policy: &UploadPolicy) -> Result<(), DiveLogError> {
        if self.bytes.is_empty() {
            return Err(DiveLogError::validation(
                "photo",
                format!("{} is empty", self.file_name),
            ));
        }
        let content_type = self.content_type.to_ascii_lowercase();
        if !policy
            .allowed_content_types
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(&content_type))
        {
            return Err(DiveLogError::validation(
                "photo",
                format!("{} has unsupported type {}", self.file_name, self.content_type),
            ));
        }
        if self.bytes.len() as u64 > policy.max_photo_bytes {
            return Err(DiveLogError::validation(
                "photo",
                format!(
                    "{} is {} bytes, limit is {}",
                    self.file_name,
                    self.bytes.len(),
                    policy.max_photo_bytes
                ),
            ));
        }
        Ok(())
    }

    /// File name reduced to characters that are safe inside a blob path.
    pub fn sanitized_file_name(&self) -> String {
        let cleaned: String = self
            .file_name
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        if cleaned.is_empty() {
            "photo".to_string()
        } else {
            cleaned
        }
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::{draft, record, upload};
    use super::*;

    #[test]
    fn test_record_position() {
        let dive = record("a", 10.5, -20.25, &[]);
        assert_eq!(dive.position(), LatLng::new(10.5, -20.25));
    }

    #[test]
    fn test_draft_validation() {
        assert!(draft("Blue Hole", 17.3, -87.5).validate().is_ok());

        let mut bad = draft("  ", 17.3, -87.5);
        assert!(bad.validate().is_err());

        bad = draft("Blue Hole", 95.0, -87.5);
        assert!(bad.validate().is_err());

        bad = draft("Blue Hole", 17.3, 181.0);
        assert!(bad.validate().is_err());

        bad = draft("Blue Hole", 17.3, -87.5);
        bad.max_depth_m = Some(-1.0);
        assert_eq!(
            bad.validate(),
            Err(DiveLogError::validation("max_depth_m", "must not be negative"))
        );

        bad = draft("Blue Hole", 17.3, -87.5);
        bad.water_temp_c = Some(55.0);
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_upload_validation() {
        let policy = UploadPolicy::default();
        assert!(upload("reef.jpg").validate(&policy).is_ok());

        let mut pdf = upload("logbook.pdf");
        pdf.content_type = "application/pdf".to_string();
        assert!(pdf.validate(&policy).is_err());

        let mut empty = upload("empty.jpg");
        empty.bytes.clear();
        assert!(empty.validate(&policy).is_err());

        let tiny = UploadPolicy {
            max_photo_bytes: 2,
            ..UploadPolicy::default()
        };
        assert!(upload("reef.jpg").validate(&tiny).is_err());
    }

    #[test]
    fn test_upload_content_type_is_case_insensitive() {
        let mut photo = upload("reef.PNG");
        photo.content_type = "Image/PNG".to_string();
        assert!(photo.validate(&UploadPolicy::default()).is_ok());
    }

    #[test]
    fn test_sanitized_file_name() {
        let mut photo = upload("my reef/shot #1.jpg");
        assert_eq!(photo.sanitized_file_name(), "my_reef_shot__1.jpg");

        photo.file_name.clear();
        assert_eq!(photo.sanitized_file_name(), "photo");
    }
}
