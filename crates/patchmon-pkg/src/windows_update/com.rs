//! Windows Update Agent access over COM
//!
//! Every search runs on one blocking thread that enters a single-threaded
//! apartment, creates its own session, and leaves the apartment when done.
//! No COM object outlives the thread that created it.

use async_trait::async_trait;
use tracing::debug;
use windows::Win32::System::Com::{
    CLSCTX_INPROC_SERVER, COINIT_APARTMENTTHREADED, CoCreateInstance, CoInitializeEx,
    CoUninitialize,
};
use windows::Win32::System::UpdateAgent::{
    IUpdate, IUpdateCollection, IUpdateSession, UpdateSession,
};
use windows::core::BSTR;

use super::{UpdateItems, UpdateRecord, UpdateSearcher, read_records};
use crate::error::PackageError;

/// Update searcher backed by `Microsoft.Update.Session`
#[derive(Debug, Clone, Default)]
pub struct ComUpdateSearcher;

impl ComUpdateSearcher {
    /// Create a new COM searcher
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl UpdateSearcher for ComUpdateSearcher {
    async fn search(&self, criteria: &str) -> Result<Vec<UpdateRecord>, PackageError> {
        let criteria = criteria.to_string();

        tokio::task::spawn_blocking(move || search_blocking(&criteria))
            .await
            .map_err(|e| PackageError::SessionUnavailable(format!("search thread failed: {e}")))?
    }
}

/// COM initialization for the current thread, undone on drop
struct Apartment;

impl Apartment {
    fn enter() -> Result<Self, PackageError> {
        // S_FALSE (already initialized here) is success and still needs a matching uninitialize
        unsafe { CoInitializeEx(None, COINIT_APARTMENTTHREADED) }
            .ok()
            .map_err(|e| PackageError::SessionUnavailable(format!("COM initialization failed: {e}")))?;
        Ok(Self)
    }
}

impl Drop for Apartment {
    fn drop(&mut self) {
        unsafe { CoUninitialize() };
    }
}

fn search_failed(criteria: &str, e: &windows::core::Error) -> PackageError {
    PackageError::SearchFailed {
        criteria: criteria.to_string(),
        message: e.to_string(),
    }
}

/// Run one search on the calling thread
fn search_blocking(criteria: &str) -> Result<Vec<UpdateRecord>, PackageError> {
    // declared first so COM objects below are released before uninitializing
    let _apartment = Apartment::enter()?;

    let session: IUpdateSession =
        unsafe { CoCreateInstance(&UpdateSession, None, CLSCTX_INPROC_SERVER) }.map_err(|e| {
            PackageError::SessionUnavailable(format!("failed to create UpdateSession: {e}"))
        })?;

    let searcher = unsafe { session.CreateUpdateSearcher() }.map_err(|e| {
        PackageError::SessionUnavailable(format!("failed to create UpdateSearcher: {e}"))
    })?;

    debug!(criteria, "searching windows updates");

    let result = unsafe { searcher.Search(&BSTR::from(criteria)) }
        .map_err(|e| search_failed(criteria, &e))?;
    let updates = unsafe { result.Updates() }.map_err(|e| search_failed(criteria, &e))?;
    let count = unsafe { updates.Count() }.map_err(|e| search_failed(criteria, &e))?;

    debug!(criteria, count, "found updates");

    Ok(read_records(&ComUpdates(updates), count))
}

struct ComUpdates(IUpdateCollection);

impl UpdateItems for ComUpdates {
    type Item = IUpdate;
    type Error = windows::core::Error;

    fn get(&self, index: i32) -> windows::core::Result<IUpdate> {
        unsafe { self.0.get_Item(index) }
    }

    fn read(item: &IUpdate) -> windows::core::Result<UpdateRecord> {
        read_update(item)
    }
}

/// Read the properties of one update
///
/// Only the title is required; anything else that fails to read is left empty.
fn read_update(update: &IUpdate) -> windows::core::Result<UpdateRecord> {
    let title = unsafe { update.Title() }?.to_string();

    let (update_id, revision_number) = match unsafe { update.Identity() } {
        Ok(identity) => (
            unsafe { identity.UpdateID() }
                .ok()
                .map(|id| id.to_string())
                .filter(|id| !id.is_empty()),
            unsafe { identity.RevisionNumber() }.ok(),
        ),
        Err(_) => (None, None),
    };

    Ok(UpdateRecord {
        title,
        kb_article_ids: kb_article_ids(update),
        update_id,
        revision_number,
        msrc_severity: unsafe { update.MsrcSeverity() }.ok().map(|s| s.to_string()),
        categories: category_names(update),
    })
}

fn kb_article_ids(update: &IUpdate) -> Vec<String> {
    let Ok(ids) = (unsafe { update.KBArticleIDs() }) else {
        return Vec::new();
    };
    let count = unsafe { ids.Count() }.unwrap_or(0);

    (0..count)
        .filter_map(|i| unsafe { ids.get_Item(i) }.ok())
        .map(|id| id.to_string())
        .collect()
}

fn category_names(update: &IUpdate) -> Vec<String> {
    let Ok(categories) = (unsafe { update.Categories() }) else {
        return Vec::new();
    };
    let count = unsafe { categories.Count() }.unwrap_or(0);

    (0..count)
        .filter_map(|i| unsafe { categories.get_Item(i) }.ok())
        .filter_map(|category| unsafe { category.Name() }.ok())
        .map(|name| name.to_string())
        .collect()
}
