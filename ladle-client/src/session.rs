//! Plan session
//!
//! 组合层 - 传输 + 缓存 + 事件泵 / composition of transport, cache and feed pump.
//!
//! A session owns one [`RangeCache`] and keeps it converged with the engine:
//!
//! - Mutations go through the speculative path: snapshot, local mirror,
//!   transport call, restore on failure.
//! - Feed events go through the authoritative path: positions from the event
//!   overwrite whatever the mirror produced.
//! - Lag or an update failure collapses to a full range refetch.
//!
//! Tests drive the feed deterministically with [`PlanSession::apply_next`];
//! production code spawns [`PlanSession::spawn_feed_pump`] and reads the
//! cache whenever it wants to render.

use std::fmt;
use std::sync::{Arc, Mutex};

use chrono::NaiveDate;
use futures::StreamExt;
use shared::plan::request::{
    CreateEntryRequest, CreatedReceipt, DeleteReceipt, EntryView, MoveEntryRequest, MoveReceipt,
    PlanRange, UpdateEntryRequest, UpdateReceipt,
};
use shared::{MealSlot, PlanEvent};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::cache::{RangeCache, Reconciliation};
use crate::drag::DragSession;
use crate::error::{ClientError, ClientResult};
use crate::transport::{FeedStream, PlanTransport};

/// One user's live view of a date range
pub struct PlanSession {
    transport: Arc<dyn PlanTransport>,
    cache: Arc<Mutex<RangeCache>>,
    feed: Option<FeedStream>,
    shutdown: CancellationToken,
    pump: Option<JoinHandle<()>>,
}

impl fmt::Debug for PlanSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlanSession").finish_non_exhaustive()
    }
}

impl PlanSession {
    /// Open a session over `range`: fetch the range once and cache it
    pub async fn open(transport: Arc<dyn PlanTransport>, range: PlanRange) -> ClientResult<Self> {
        let entries = transport.list(range).await?;
        let mut cache = RangeCache::new(range);
        cache.fill(entries);
        Ok(Self {
            transport,
            cache: Arc::new(Mutex::new(cache)),
            feed: None,
            shutdown: CancellationToken::new(),
            pump: None,
        })
    }

    /// Subscribe to the household feed without consuming it
    ///
    /// Frames are drained by [`PlanSession::apply_next`] or handed off to
    /// [`PlanSession::spawn_feed_pump`].
    pub async fn connect_feed(&mut self) -> ClientResult<()> {
        self.feed = Some(self.transport.subscribe().await?);
        Ok(())
    }

    /// Apply the next feed frame to the cache
    ///
    /// Lag refetches the range, then surfaces the lag error so callers know
    /// events were dropped; the stream itself stays usable. A closed or
    /// never-connected feed yields [`ClientError::FeedClosed`].
    pub async fn apply_next(&mut self) -> ClientResult<PlanEvent> {
        let Some(stream) = self.feed.as_mut() else {
            return Err(ClientError::FeedClosed);
        };
        match stream.next().await {
            Some(Ok(event)) => {
                let outcome = self.cache.lock().unwrap().apply_event(&event);
                if outcome == Reconciliation::RefetchRequired {
                    self.refetch().await?;
                }
                Ok(event)
            }
            Some(Err(e)) if e.is_lag() => {
                self.refetch().await?;
                Err(e)
            }
            Some(Err(e)) => Err(e),
            None => {
                self.feed = None;
                Err(ClientError::FeedClosed)
            }
        }
    }

    /// Spawn the background feed pump
    ///
    /// Subscribes first if [`PlanSession::connect_feed`] was never called.
    /// The pump applies events until the feed closes or the session shuts
    /// down; refetch failures are logged, not fatal.
    pub async fn spawn_feed_pump(&mut self) -> ClientResult<()> {
        let mut stream = match self.feed.take() {
            Some(stream) => stream,
            None => self.transport.subscribe().await?,
        };

        let transport = self.transport.clone();
        let cache = self.cache.clone();
        let shutdown = self.shutdown.clone();
        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    frame = stream.next() => match frame {
                        Some(Ok(event)) => {
                            let outcome = cache.lock().unwrap().apply_event(&event);
                            if outcome == Reconciliation::RefetchRequired
                                && let Err(e) = refetch_into(&transport, &cache).await
                            {
                                tracing::error!("Range refetch failed: {}", e);
                            }
                        }
                        Some(Err(e)) if e.is_lag() => {
                            // 事件被挤掉了, 重新拉取整个窗口
                            tracing::warn!("Plan feed lagged: {}", e);
                            if let Err(e) = refetch_into(&transport, &cache).await {
                                tracing::error!("Range refetch failed: {}", e);
                            }
                        }
                        Some(Err(e)) => {
                            tracing::error!("Plan feed error: {}", e);
                            break;
                        }
                        None => {
                            tracing::info!("Plan feed closed");
                            break;
                        }
                    },
                }
            }
        });
        self.pump = Some(handle);
        Ok(())
    }

    /// Re-fetch the whole cached range from the engine
    pub async fn refetch(&self) -> ClientResult<()> {
        refetch_into(&self.transport, &self.cache).await
    }

    // ========== Mutations / 变更操作 ==========

    /// Create an entry
    ///
    /// Not speculated: the id is server-assigned, so the entry reaches the
    /// cache through the feed or the next refetch.
    pub async fn create(&self, request: &CreateEntryRequest) -> ClientResult<CreatedReceipt> {
        self.transport.create(request).await
    }

    /// Delete an entry, mirroring the removal locally before the call
    pub async fn delete(&self, entry_id: &str) -> ClientResult<DeleteReceipt> {
        let snapshot = {
            let mut cache = self.cache.lock().unwrap();
            let snapshot = cache.snapshot();
            cache.apply_delete(entry_id);
            snapshot
        };
        match self.transport.delete(entry_id).await {
            Ok(receipt) => Ok(receipt),
            Err(e) => {
                self.cache.lock().unwrap().restore(snapshot);
                Err(e)
            }
        }
    }

    /// Move an entry, mirroring the shift locally before the call
    pub async fn move_entry(
        &self,
        entry_id: &str,
        target_date: NaiveDate,
        target_slot: MealSlot,
        target_index: u32,
    ) -> ClientResult<MoveReceipt> {
        let snapshot = {
            let mut cache = self.cache.lock().unwrap();
            let snapshot = cache.snapshot();
            cache.apply_move(entry_id, target_date, target_slot, target_index);
            snapshot
        };
        let request = MoveEntryRequest {
            target_date,
            target_slot,
            target_index,
        };
        match self.transport.move_entry(entry_id, &request).await {
            Ok(receipt) => Ok(receipt),
            Err(e) => {
                self.cache.lock().unwrap().restore(snapshot);
                Err(e)
            }
        }
    }

    /// Retitle an entry
    ///
    /// The receipt only acknowledges the request; completion (or an update
    /// failure) arrives later over the feed.
    pub async fn update_title(&self, entry_id: &str, title: &str) -> ClientResult<UpdateReceipt> {
        let snapshot = {
            let mut cache = self.cache.lock().unwrap();
            let snapshot = cache.snapshot();
            cache.apply_update_title(entry_id, title);
            snapshot
        };
        let request = UpdateEntryRequest {
            title: title.to_string(),
        };
        match self.transport.update(entry_id, &request).await {
            Ok(receipt) => Ok(receipt),
            Err(e) => {
                self.cache.lock().unwrap().restore(snapshot);
                Err(e)
            }
        }
    }

    // ========== Drag integration / 拖拽 ==========

    /// Start a drag gesture against the current cache layout
    pub fn begin_drag(&self, drag: &mut DragSession, entry_id: &str) -> bool {
        let cache = self.cache.lock().unwrap();
        drag.drag_start(&cache, entry_id)
    }

    /// Finish a drag gesture
    ///
    /// `Ok(None)` means the entry was released where it started and no
    /// request was sent.
    pub async fn complete_drag(&self, drag: &mut DragSession) -> ClientResult<Option<MoveReceipt>> {
        let Some(target) = drag.drag_end() else {
            return Ok(None);
        };
        let receipt = self
            .move_entry(
                &target.entry_id,
                target.target_date,
                target.target_slot,
                target.target_index,
            )
            .await?;
        Ok(Some(receipt))
    }

    // ========== Reads / 读取 ==========

    pub fn range(&self) -> PlanRange {
        self.cache.lock().unwrap().range()
    }

    /// All cached entries, ordered by (date, slot, sort order)
    pub fn entries(&self) -> Vec<EntryView> {
        self.cache.lock().unwrap().entries().to_vec()
    }

    /// Ids in one bucket, in display order
    pub fn bucket_ids(&self, date: NaiveDate, slot: MealSlot) -> Vec<String> {
        self.cache.lock().unwrap().bucket_ids(date, slot)
    }

    /// Stop the feed pump and wait for it to exit
    pub async fn close(&mut self) {
        self.shutdown.cancel();
        if let Some(pump) = self.pump.take() {
            let _ = pump.await;
        }
    }
}

impl Drop for PlanSession {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn refetch_into(
    transport: &Arc<dyn PlanTransport>,
    cache: &Arc<Mutex<RangeCache>>,
) -> ClientResult<()> {
    let range = cache.lock().unwrap().range();
    let entries = transport.list(range).await?;
    cache.lock().unwrap().fill(entries);
    Ok(())
}
