//! Dive records and their photos, on top of document and blob store adapters.
//!
//! Only the owner of a dive may change or delete it. Deleting a dive deletes
//! every photo blob it references.

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::UploadPolicy;
use crate::error::DiveLogError;
use crate::models::{DiveDraft, DiveId, DiveRecord, Photo, PhotoId, PhotoUpload, UserId};

#[derive(Clone, Debug, Default, PartialEq)]
pub struct DiveQuery {
    /// Restrict to dives owned by this user; `None` lists everyone's dives.
    pub owner: Option<UserId>,
}

pub trait DiveStore {
    /// Matching dives, newest first by creation time.
    fn list_dives(&self, query: &DiveQuery) -> Result<Vec<DiveRecord>, DiveLogError>;
    fn load_dive(&self, id: &DiveId) -> Result<Option<DiveRecord>, DiveLogError>;
    fn upsert_dive(&mut self, dive: DiveRecord) -> Result<(), DiveLogError>;
    fn delete_dive(&mut self, id: &DiveId) -> Result<(), DiveLogError>;
}

pub trait BlobStore {
    /// Store a photo at `path` and return its public URL.
    fn put_photo(
        &mut self,
        path: &str,
        content_type: &str,
        bytes: &[u8],
    ) -> Result<String, DiveLogError>;
    fn delete_photo(&mut self, path: &str) -> Result<(), DiveLogError>;
}

#[derive(Debug)]
pub struct DiveLog<S, B> {
    store: S,
    blobs: B,
    policy: UploadPolicy,
}

impl<S: DiveStore, B: BlobStore> DiveLog<S, B> {
    pub fn new(store: S, blobs: B, policy: UploadPolicy) -> Self {
        Self {
            store,
            blobs,
            policy,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn blobs(&self) -> &B {
        &self.blobs
    }

    pub fn blobs_mut(&mut self) -> &mut B {
        &mut self.blobs
    }

    pub fn list_all(&self) -> Result<Vec<DiveRecord>, DiveLogError> {
        self.store.list_dives(&DiveQuery::default())
    }

    pub fn list_owned(&self, user: Option<&UserId>) -> Result<Vec<DiveRecord>, DiveLogError> {
        let user = user.ok_or(DiveLogError::Unauthenticated)?;
        self.store.list_dives(&DiveQuery {
            owner: Some(user.clone()),
        })
    }

    pub fn get(&self, id: &DiveId) -> Result<DiveRecord, DiveLogError> {
        self.store
            .load_dive(id)?
            .ok_or_else(|| DiveLogError::NotFound(id.to_string()))
    }

    /// Log a new dive with its photos.
    ///
    /// Photos are uploaded before the record is written; if anything fails,
    /// blobs uploaded so far are removed again.
    pub fn create(
        &mut self,
        user: Option<&UserId>,
        draft: DiveDraft,
        uploads: Vec<PhotoUpload>,
    ) -> Result<DiveRecord, DiveLogError> {
        let user = user.ok_or(DiveLogError::Unauthenticated)?;
        draft.validate()?;
        self.check_uploads(0, &uploads)?;

        let id = DiveId(Uuid::new_v4().to_string());
        let photos = self.upload_photos(&id, uploads)?;
        let now = Utc::now().timestamp();
        let dive = DiveRecord {
            id: id.clone(),
            owner_id: user.clone(),
            location: draft.location,
            dive_time_unix: draft.dive_time_unix,
            created_at_unix: now,
            max_depth_m: draft.max_depth_m,
            duration_min: draft.duration_min,
            visibility_m: draft.visibility_m,
            water_temp_c: draft.water_temp_c,
            photos,
            notes: draft.notes,
            buddy: draft.buddy,
            marine_life: draft.marine_life,
        };

        if let Err(err) = self.store.upsert_dive(dive.clone()) {
            self.discard_photos(&dive.photos);
            return Err(err);
        }
        info!(dive_id = %id, owner = %user, photos = dive.photos.len(), "dive logged");
        Ok(dive)
    }

    /// Replace the editable fields of a dive, keeping its photos.
    pub fn update(
        &mut self,
        user: Option<&UserId>,
        id: &DiveId,
        draft: DiveDraft,
    ) -> Result<DiveRecord, DiveLogError> {
        let mut dive = self.owned_dive(user, id)?;
        draft.validate()?;

        dive.location = draft.location;
        dive.dive_time_unix = draft.dive_time_unix;
        dive.max_depth_m = draft.max_depth_m;
        dive.duration_min = draft.duration_min;
        dive.visibility_m = draft.visibility_m;
        dive.water_temp_c = draft.water_temp_c;
        dive.notes = draft.notes;
        dive.buddy = draft.buddy;
        dive.marine_life = draft.marine_life;

        self.store.upsert_dive(dive.clone())?;
        debug!(dive_id = %id, "dive updated");
        Ok(dive)
    }

    pub fn add_photos(
        &mut self,
        user: Option<&UserId>,
        id: &DiveId,
        uploads: Vec<PhotoUpload>,
    ) -> Result<DiveRecord, DiveLogError> {
        let mut dive = self.owned_dive(user, id)?;
        self.check_uploads(dive.photos.len(), &uploads)?;

        let added = self.upload_photos(id, uploads)?;
        let previous = dive.photos.len();
        dive.photos.extend(added);
        if let Err(err) = self.store.upsert_dive(dive.clone()) {
            self.discard_photos(&dive.photos[previous..]);
            return Err(err);
        }
        debug!(dive_id = %id, added = dive.photos.len() - previous, "photos added");
        Ok(dive)
    }

    pub fn remove_photo(
        &mut self,
        user: Option<&UserId>,
        id: &DiveId,
        photo_id: &PhotoId,
    ) -> Result<DiveRecord, DiveLogError> {
        let mut dive = self.owned_dive(user, id)?;
        let index = dive
            .photos
            .iter()
            .position(|photo| &photo.id == photo_id)
            .ok_or_else(|| DiveLogError::PhotoNotFound(photo_id.to_string()))?;

        let photo = dive.photos.remove(index);
        self.store.upsert_dive(dive.clone())?;
        if let Err(err) = self.blobs.delete_photo(&photo.storage_path) {
            warn!(dive_id = %id, path = %photo.storage_path, error = %err, "orphaned photo blob");
        }
        Ok(dive)
    }

    /// Delete a dive, then every photo blob it owned.
    ///
    /// The record goes first: a failed delete leaves it intact with all of
    /// its photos. Individual blob failures afterwards are logged and skipped.
    pub fn delete(&mut self, user: Option<&UserId>, id: &DiveId) -> Result<(), DiveLogError> {
        let dive = self.owned_dive(user, id)?;
        self.store.delete_dive(id)?;

        let mut failed = 0usize;
        for photo in &dive.photos {
            if let Err(err) = self.blobs.delete_photo(&photo.storage_path) {
                failed += 1;
                warn!(dive_id = %id, path = %photo.storage_path, error = %err, "failed to delete photo blob");
            }
        }
        info!(
            dive_id = %id,
            photos = dive.photos.len(),
            failed_blobs = failed,
            "dive deleted"
        );
        Ok(())
    }

    fn owned_dive(&self, user: Option<&UserId>, id: &DiveId) -> Result<DiveRecord, DiveLogError> {
        let user = user.ok_or(DiveLogError::Unauthenticated)?;
        let dive = self.get(id)?;
        if !dive.is_owned_by(user) {
            return Err(DiveLogError::Forbidden(id.to_string()));
        }
        Ok(dive)
    }

    fn check_uploads(&self, existing: usize, uploads: &[PhotoUpload]) -> Result<(), DiveLogError> {
        if existing + uploads.len() > self.policy.max_photos_per_dive {
            return Err(DiveLogError::validation(
                "photos",
                format!(
                    "a dive can hold at most {} photos",
                    self.policy.max_photos_per_dive
                ),
            ));
        }
        for upload in uploads {
            upload.validate(&self.policy)?;
        }
        Ok(())
    }

    fn upload_photos(
        &mut self,
        dive_id: &DiveId,
        uploads: Vec<PhotoUpload>,
    ) -> Result<Vec<Photo>, DiveLogError> {
        let mut photos = Vec::with_capacity(uploads.len());
        for upload in uploads {
            let photo_id = PhotoId(Uuid::new_v4().to_string());
            let path = format!(
                "dives/{}/{}-{}",
                dive_id,
                photo_id,
                upload.sanitized_file_name()
            );
            match self
                .blobs
                .put_photo(&path, &upload.content_type, &upload.bytes)
            {
                Ok(url) => photos.push(Photo {
                    id: photo_id,
                    url,
                    storage_path: path,
                    caption: upload.caption,
                    uploaded_at_unix: Utc::now().timestamp(),
                    file_name: upload.file_name,
                    size_bytes: upload.bytes.len() as u64,
                }),
                Err(err) => {
                    self.discard_photos(&photos);
                    return Err(err);
                }
            }
        }
        Ok(photos)
    }

    fn discard_photos(&mut self, photos: &[Photo]) {
        for photo in photos {
            if let Err(err) = self.blobs.delete_photo(&photo.storage_path) {
                warn!(path = %photo.storage_path, error = %err, "failed to roll back photo upload");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures::{draft, upload};
    use crate::store_mock::{InMemoryBlobStore, InMemoryDiveStore};

    fn dive_log() -> DiveLog<InMemoryDiveStore, InMemoryBlobStore> {
        DiveLog::new(
            InMemoryDiveStore::new(),
            InMemoryBlobStore::new(),
            UploadPolicy::default(),
        )
    }

    fn alice() -> UserId {
        UserId::from("alice")
    }

    fn bob() -> UserId {
        UserId::from("bob")
    }

    #[test]
    fn test_create_uploads_photos() {
        let mut log = dive_log();
        let dive = log
            .create(
                Some(&alice()),
                draft("Blue Hole", 17.3, -87.5),
                vec![upload("reef.jpg"), upload("turtle.jpg")],
            )
            .unwrap();

        assert_eq!(dive.owner_id, alice());
        assert_eq!(dive.photos.len(), 2);
        assert_eq!(dive.photos[0].file_name, "reef.jpg");
        assert!(dive.photos[0]
            .storage_path
            .starts_with(&format!("dives/{}/", dive.id)));
        assert_eq!(log.blobs().len(), 2);
        assert_eq!(log.get(&dive.id).unwrap(), dive);
    }

    #[test]
    fn test_create_requires_sign_in() {
        let mut log = dive_log();
        let result = log.create(None, draft("Blue Hole", 17.3, -87.5), Vec::new());
        assert_eq!(result, Err(DiveLogError::Unauthenticated));
    }

    #[test]
    fn test_create_rejects_invalid_input_before_upload() {
        let mut log = dive_log();

        let mut pdf = upload("log.pdf");
        pdf.content_type = "application/pdf".to_string();
        let result = log.create(
            Some(&alice()),
            draft("Blue Hole", 17.3, -87.5),
            vec![upload("reef.jpg"), pdf],
        );
        assert!(matches!(result, Err(DiveLogError::Validation { .. })));
        assert_eq!(log.blobs().len(), 0);

        let too_many = (0..11).map(|i| upload(&format!("{i}.jpg"))).collect();
        let result = log.create(Some(&alice()), draft("Blue Hole", 17.3, -87.5), too_many);
        assert!(matches!(result, Err(DiveLogError::Validation { .. })));

        let result = log.create(Some(&alice()), draft("", 17.3, -87.5), Vec::new());
        assert!(matches!(result, Err(DiveLogError::Validation { .. })));
        assert!(log.list_all().unwrap().is_empty());
    }

    #[test]
    fn test_failed_upload_rolls_back_blobs() {
        let mut log = dive_log();
        log.blobs_mut().fail_after = Some(1);

        let result = log.create(
            Some(&alice()),
            draft("Blue Hole", 17.3, -87.5),
            vec![upload("a.jpg"), upload("b.jpg"), upload("c.jpg")],
        );

        assert!(matches!(result, Err(DiveLogError::Blob(_))));
        assert_eq!(log.blobs().len(), 0);
        assert!(log.list_all().unwrap().is_empty());
    }

    #[test]
    fn test_listing_is_newest_first_and_scoped() {
        let mut log = dive_log();
        let first = log
            .create(Some(&alice()), draft("One", 1.0, 1.0), Vec::new())
            .unwrap();
        let second = log
            .create(Some(&bob()), draft("Two", 2.0, 2.0), Vec::new())
            .unwrap();
        let third = log
            .create(Some(&alice()), draft("Three", 3.0, 3.0), Vec::new())
            .unwrap();

        let all: Vec<DiveId> = log.list_all().unwrap().into_iter().map(|d| d.id).collect();
        assert_eq!(all, vec![third.id.clone(), second.id, first.id.clone()]);

        let mine: Vec<DiveId> = log
            .list_owned(Some(&alice()))
            .unwrap()
            .into_iter()
            .map(|d| d.id)
            .collect();
        assert_eq!(mine, vec![third.id, first.id]);

        assert_eq!(log.list_owned(None), Err(DiveLogError::Unauthenticated));
    }

    #[test]
    fn test_update_is_owner_only_and_keeps_photos() {
        let mut log = dive_log();
        let dive = log
            .create(
                Some(&alice()),
                draft("Blue Hole", 17.3, -87.5),
                vec![upload("reef.jpg")],
            )
            .unwrap();

        let mut edit = draft("Great Blue Hole", 17.31, -87.53);
        edit.notes = Some("Stalactites at 40 m".to_string());

        assert_eq!(
            log.update(Some(&bob()), &dive.id, edit.clone()),
            Err(DiveLogError::Forbidden(dive.id.to_string()))
        );

        let updated = log.update(Some(&alice()), &dive.id, edit).unwrap();
        assert_eq!(updated.location.name, "Great Blue Hole");
        assert_eq!(updated.photos, dive.photos);
        assert_eq!(updated.created_at_unix, dive.created_at_unix);
        assert_eq!(log.get(&dive.id).unwrap(), updated);
    }

    #[test]
    fn test_add_and_remove_photos() {
        let mut log = dive_log();
        let dive = log
            .create(
                Some(&alice()),
                draft("Blue Hole", 17.3, -87.5),
                vec![upload("reef.jpg")],
            )
            .unwrap();

        let dive = log
            .add_photos(Some(&alice()), &dive.id, vec![upload("shark.jpg")])
            .unwrap();
        assert_eq!(dive.photos.len(), 2);
        assert_eq!(log.blobs().len(), 2);

        let removed = dive.photos[0].clone();
        let dive = log
            .remove_photo(Some(&alice()), &dive.id, &removed.id)
            .unwrap();
        assert_eq!(dive.photos.len(), 1);
        assert!(!log.blobs().contains(&removed.storage_path));

        assert!(matches!(
            log.remove_photo(Some(&alice()), &dive.id, &removed.id),
            Err(DiveLogError::PhotoNotFound(_))
        ));
    }

    #[test]
    fn test_delete_cascades_to_photos() {
        let mut log = dive_log();
        let dive = log
            .create(
                Some(&alice()),
                draft("Blue Hole", 17.3, -87.5),
                vec![upload("a.jpg"), upload("b.jpg")],
            )
            .unwrap();
        let keep = log
            .create(
                Some(&alice()),
                draft("Thistlegorm", 27.8, 33.9),
                vec![upload("c.jpg")],
            )
            .unwrap();

        assert_eq!(
            log.delete(Some(&bob()), &dive.id),
            Err(DiveLogError::Forbidden(dive.id.to_string()))
        );
        assert_eq!(log.delete(None, &dive.id), Err(DiveLogError::Unauthenticated));

        log.delete(Some(&alice()), &dive.id).unwrap();

        assert_eq!(log.get(&dive.id), Err(DiveLogError::NotFound(dive.id.to_string())));
        for photo in &dive.photos {
            assert!(!log.blobs().contains(&photo.storage_path));
        }
        assert!(log.blobs().contains(&keep.photos[0].storage_path));
        assert_eq!(log.blobs().len(), 1);
    }

    #[test]
    fn test_delete_continues_past_missing_blobs() {
        let mut log = dive_log();
        let dive = log
            .create(
                Some(&alice()),
                draft("Blue Hole", 17.3, -87.5),
                vec![upload("a.jpg"), upload("b.jpg")],
            )
            .unwrap();
        log.blobs_mut().remove(&dive.photos[0].storage_path);

        log.delete(Some(&alice()), &dive.id).unwrap();

        assert!(log.list_all().unwrap().is_empty());
        assert_eq!(log.blobs().len(), 0);
    }

    #[test]
    fn test_failed_record_delete_keeps_photos() {
        let mut log = dive_log();
        let dive = log
            .create(
                Some(&alice()),
                draft("Blue Hole", 17.3, -87.5),
                vec![upload("a.jpg")],
            )
            .unwrap();
        log.store_mut().fail_delete = true;

        assert!(matches!(
            log.delete(Some(&alice()), &dive.id),
            Err(DiveLogError::Store(_))
        ));
        assert_eq!(log.get(&dive.id).unwrap(), dive);
        assert!(log.blobs().contains(&dive.photos[0].storage_path));
    }

    #[test]
    fn test_can_edit() {
        let mut log = dive_log();
        let dive = log
            .create(Some(&alice()), draft("Blue Hole", 17.3, -87.5), Vec::new())
            .unwrap();

        assert!(dive.can_edit(Some(&alice())));
        assert!(!dive.can_edit(Some(&bob())));
        assert!(!dive.can_edit(None));
    }
}
