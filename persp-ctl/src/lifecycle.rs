//! Create/read/update/delete orchestration around the codec
//!
//! Every operation runs the codec strictly before (encode) or after (decode)
//! its single network call, so a codec failure never leaves a partial write
//! on the server, and a decode failure never touches local state.

use persp_common::model::{authored_diff, merge_computed};
use persp_common::{decode, encode, Error, Perspective, Result};
use tracing::info;

use crate::confirmation::{parse_created_id, validate_external_id};
use crate::state::{StateRecord, StateStore};
use crate::transport::Transport;

/// Lifecycle operations for perspectives managed under local labels
pub struct Lifecycle<T: Transport> {
    transport: T,
    store: StateStore,
}

impl<T: Transport> Lifecycle<T> {
    pub fn new(transport: T, store: StateStore) -> Self {
        Self { transport, store }
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Create a new perspective from intent
    ///
    /// Ref ids assigned during encode are persisted with the record so a later
    /// update reuses them.
    pub async fn create(&self, label: &str, intent: Perspective) -> Result<StateRecord> {
        if self.store.exists(label)? {
            return Err(Error::Config(format!(
                "`{}` is already managed; use update or delete it first",
                label
            )));
        }

        let mut perspective = intent;
        let body = encode(&mut perspective)?;
        let confirmation = self.transport.create(body).await?;
        let id = parse_created_id(&confirmation)?;

        let record = StateRecord::new(id, perspective);
        self.store.save(label, &record)?;
        info!(label = %label, id = %record.id, "Created perspective");
        Ok(record)
    }

    /// Refresh the stored record from the server
    pub async fn read(&self, label: &str) -> Result<StateRecord> {
        let record = self.store.load(label)?;
        validate_external_id(&record.id)?;

        let body = self.transport.fetch(&record.id).await?;
        let mut remote = decode(&body)?;
        remote.ref_id_watermark = remote
            .ref_id_watermark
            .max(record.perspective.ref_id_watermark);

        let refreshed = StateRecord::new(record.id, remote);
        self.store.save(label, &refreshed)?;
        info!(
            label = %label,
            id = %refreshed.id,
            groups = refreshed.perspective.groups.len(),
            "Read perspective"
        );
        Ok(refreshed)
    }

    /// Replace the server document with intent merged over the stored record
    pub async fn update(&self, label: &str, intent: Perspective) -> Result<StateRecord> {
        let record = self.store.load(label)?;
        validate_external_id(&record.id)?;

        let mut merged = merge_computed(&intent, &record.perspective);
        let body = encode(&mut merged)?;
        self.transport.replace(&record.id, body).await?;

        let updated = StateRecord::new(record.id, merged);
        self.store.save(label, &updated)?;
        info!(label = %label, id = %updated.id, "Updated perspective");
        Ok(updated)
    }

    /// Delete the perspective and forget its record
    pub async fn delete(&self, label: &str) -> Result<()> {
        let record = self.store.load(label)?;
        validate_external_id(&record.id)?;

        self.transport.remove(&record.id).await?;
        self.store.remove(label)?;
        info!(label = %label, id = %record.id, "Deleted perspective");
        Ok(())
    }

    /// Start managing an existing perspective by id
    pub async fn import(&self, label: &str, id: &str) -> Result<StateRecord> {
        validate_external_id(id)?;
        if self.store.exists(label)? {
            return Err(Error::Config(format!("`{}` is already managed", label)));
        }

        let body = self.transport.fetch(id).await?;
        let perspective = decode(&body)?;

        let record = StateRecord::new(id, perspective);
        self.store.save(label, &record)?;
        info!(label = %label, id = %id, "Imported perspective");
        Ok(record)
    }

    /// Refresh, then list authored differences between intent and the server
    pub async fn plan(&self, label: &str, intent: &Perspective) -> Result<Vec<String>> {
        let record = self.read(label).await?;
        Ok(authored_diff(intent, &record.perspective))
    }
}
