//! Change detection: which timeline items are new since the last poll.
//!
//! Each target has its own [`TargetState`] holding the identities seen in
//! recent polls and the item that was pinned at the last poll. Pins are
//! tracked apart from the novelty check because a pin can be placed on an old
//! post; the only thing ever emitted for a pin change is a synthetic
//! [`DetectedItem::Unpinned`] when the previous pin goes away.
//!
//! Batches for one target are serialized by a per-target async mutex held
//! across the fetch and the state update. Different targets never contend.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use postwatch_core::{AppConfig, Target};
use tokio::sync::Mutex as AsyncMutex;

use crate::error::WeiboError;
use crate::fetch::Fetcher;
use crate::platform::{DetectedItem, ItemId, Platform, RawItem};

/// Pin comparison spans one cycle, so identities must survive at least two.
const MIN_RETAIN_CYCLES: u64 = 2;

#[derive(Debug, Clone)]
pub struct DetectorSettings {
    /// Poll cycles an identity is kept after it was last observed.
    pub retain_cycles: u64,
    /// New items published longer ago than this are not emitted.
    pub max_post_age: Option<Duration>,
}

impl Default for DetectorSettings {
    fn default() -> Self {
        Self {
            retain_cycles: 16,
            max_post_age: None,
        }
    }
}

impl DetectorSettings {
    #[must_use]
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            retain_cycles: config.seen_retain_cycles,
            max_post_age: config.max_post_age_secs.map(Duration::from_secs),
        }
    }
}

/// Seen-memory and pin baseline for one target.
#[derive(Debug, Default)]
struct TargetState {
    initialized: bool,
    /// Number of successful batches applied so far.
    cycle: u64,
    /// Identity → cycle in which it was last observed.
    seen: HashMap<ItemId, u64>,
    pinned: Option<RawItem>,
}

impl TargetState {
    fn remember(&mut self, ids: impl IntoIterator<Item = ItemId>, retain_cycles: u64) {
        self.cycle += 1;
        let cycle = self.cycle;
        for id in ids {
            self.seen.insert(id, cycle);
        }
        self.seen.retain(|_, last| cycle - *last < retain_cycles);
    }
}

type Slot = Arc<AsyncMutex<TargetState>>;

/// Per-target change detector, generic over the platform's capability set.
pub struct ChangeDetector<P> {
    platform: P,
    settings: DetectorSettings,
    targets: Mutex<HashMap<Target, Slot>>,
}

impl<P: Platform> ChangeDetector<P> {
    #[must_use]
    pub fn new(platform: P, mut settings: DetectorSettings) -> Self {
        if settings.retain_cycles < MIN_RETAIN_CYCLES {
            tracing::warn!(
                requested = settings.retain_cycles,
                using = MIN_RETAIN_CYCLES,
                "retain_cycles too small for pin tracking, raising"
            );
            settings.retain_cycles = MIN_RETAIN_CYCLES;
        }
        Self {
            platform,
            settings,
            targets: Mutex::new(HashMap::new()),
        }
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    /// Fetches the target's timeline and runs it through [`Self::process_batch`].
    ///
    /// The target's exclusive section is held across the fetch, so a slow
    /// poll delays the next one for the same target instead of interleaving
    /// with it.
    ///
    /// # Errors
    ///
    /// Returns the fetcher's error unchanged. State is not touched in that
    /// case, so the next successful poll compares against the last good one.
    pub async fn poll<F>(&self, fetcher: &F, target: &Target) -> Result<Vec<DetectedItem>, WeiboError>
    where
        F: Fetcher + ?Sized,
    {
        let slot = self.slot(target);
        let mut state = slot.lock().await;

        let result = match fetcher.fetch_list(target).await {
            Ok(raw_items) => Ok(self.apply(&mut state, target, &raw_items, unix_now())),
            Err(e) => {
                tracing::warn!(
                    uid = %target,
                    error = %e,
                    "timeline fetch failed, keeping previous state"
                );
                Err(e)
            }
        };

        if !state.initialized {
            self.release_untracked(target, &slot);
        }
        result
    }

    /// Returns the items in `raw_items` that are new for `target`, followed
    /// by a synthetic unpin event when the previous pin went away.
    ///
    /// The first non-empty batch for a target only records a baseline and
    /// returns nothing. An empty batch returns nothing and records nothing.
    pub async fn process_batch(&self, target: &Target, raw_items: &[RawItem]) -> Vec<DetectedItem> {
        if raw_items.is_empty() {
            tracing::warn!(uid = %target, "empty timeline batch, keeping previous state");
            return Vec::new();
        }
        let slot = self.slot(target);
        let mut state = slot.lock().await;
        self.apply(&mut state, target, raw_items, unix_now())
    }

    /// Drops everything remembered about `target`. Returns `false` if the
    /// target was not being tracked.
    pub fn forget(&self, target: &Target) -> bool {
        self.targets
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(target)
            .is_some()
    }

    /// Whether a baseline has been established for `target`.
    pub async fn is_tracking(&self, target: &Target) -> bool {
        match self.existing_slot(target) {
            Some(slot) => slot.lock().await.initialized,
            None => false,
        }
    }

    /// Identity of the item pinned at the last successful poll.
    pub async fn pinned_id(&self, target: &Target) -> Option<ItemId> {
        let slot = self.existing_slot(target)?;
        let state = slot.lock().await;
        state
            .pinned
            .as_ref()
            .and_then(|p| self.platform.identity(p))
    }

    fn slot(&self, target: &Target) -> Slot {
        let mut targets = self.targets.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(targets.entry(target.clone()).or_default())
    }

    /// Removes the slot of a target that has no baseline yet, unless another
    /// poll for it is already waiting on the same slot.
    fn release_untracked(&self, target: &Target, slot: &Slot) {
        let mut targets = self.targets.lock().unwrap_or_else(PoisonError::into_inner);
        let only_holder = targets
            .get(target)
            .is_some_and(|current| Arc::ptr_eq(current, slot) && Arc::strong_count(slot) == 2);
        if only_holder {
            targets.remove(target);
        }
    }

    fn existing_slot(&self, target: &Target) -> Option<Slot> {
        self.targets
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(target)
            .map(Arc::clone)
    }

    fn apply(
        &self,
        state: &mut TargetState,
        target: &Target,
        raw_items: &[RawItem],
        now: f64,
    ) -> Vec<DetectedItem> {
        if raw_items.is_empty() {
            tracing::warn!(uid = %target, "empty timeline batch, keeping previous state");
            return Vec::new();
        }

        let relevant: Vec<&RawItem> = raw_items
            .iter()
            .filter(|item| self.platform.is_relevant(item))
            .collect();
        if relevant.len() < raw_items.len() {
            tracing::debug!(
                uid = %target,
                skipped = raw_items.len() - relevant.len(),
                "ignoring non-content cards"
            );
        }

        let current_pin = relevant
            .iter()
            .copied()
            .find(|item| self.platform.is_pinned(item));

        if !state.initialized {
            state.initialized = true;
            state.pinned = current_pin.cloned();
            state.remember(self.identities(&relevant), self.settings.retain_cycles);
            tracing::info!(
                uid = %target,
                seen = state.seen.len(),
                pinned = ?current_pin.and_then(|p| self.platform.identity(p)),
                "baseline established"
            );
            return Vec::new();
        }

        let mut detected = Vec::new();
        for item in &relevant {
            let Some(id) = self.platform.identity(item) else {
                let err = WeiboError::IdentityMissing {
                    platform: self.platform.name(),
                };
                tracing::warn!(uid = %target, error = %err, "excluding item from novelty check");
                continue;
            };
            if state.seen.contains_key(&id) {
                continue;
            }
            if !self.is_fresh(target, &id, item, now) {
                continue;
            }
            tracing::debug!(
                uid = %target,
                item_id = %id,
                category = %self.platform.category(item),
                "new item"
            );
            detected.push(DetectedItem::Ordinary((*item).clone()));
        }

        if let Some(previous) = &state.pinned {
            let previous_id = self.platform.identity(previous);
            let unpinned = match current_pin {
                None => true,
                Some(current) => self.platform.identity(current) != previous_id,
            };
            if unpinned {
                let account_name = self
                    .platform
                    .account_name(previous)
                    .unwrap_or_else(|| target.to_string());
                tracing::info!(
                    uid = %target,
                    previous = ?previous_id,
                    current = ?current_pin.and_then(|p| self.platform.identity(p)),
                    "pinned item removed"
                );
                detected.push(DetectedItem::Unpinned { account_name });
            }
        }

        state.pinned = current_pin.cloned();
        state.remember(self.identities(&relevant), self.settings.retain_cycles);

        detected
    }

    fn identities(&self, items: &[&RawItem]) -> Vec<ItemId> {
        items
            .iter()
            .filter_map(|item| self.platform.identity(item))
            .collect()
    }

    /// A new item must carry a readable date, and be recent enough when an
    /// age limit is configured.
    fn is_fresh(&self, target: &Target, id: &ItemId, item: &RawItem, now: f64) -> bool {
        let published = match self.platform.timestamp(item) {
            Ok(ts) => ts,
            Err(e) => {
                tracing::warn!(
                    uid = %target,
                    item_id = %id,
                    error = %e,
                    "excluding new item with unreadable date"
                );
                return false;
            }
        };

        match self.settings.max_post_age {
            Some(max_age) if now - published > max_age.as_secs_f64() => {
                tracing::debug!(
                    uid = %target,
                    item_id = %id,
                    age_secs = now - published,
                    "skipping stale item"
                );
                false
            }
            _ => true,
        }
    }
}

fn unix_now() -> f64 {
    #[allow(clippy::cast_precision_loss)]
    let millis = chrono::Utc::now().timestamp_millis() as f64;
    millis / 1000.0
}

#[cfg(test)]
#[path = "detect_test.rs"]
mod tests;
