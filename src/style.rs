//! Color and lock overrides, held independently of the engine's style store.
//!
//! A UI-requested color or lock must survive engine re-renders and backend
//! round-trips, so it is recorded here first (optimistic) and then pushed
//! into the engine. The push is retried within bounds: the engine may
//! register an annotation asynchronously after the command was issued.

use std::collections::HashMap;

use web_time::{Duration, Instant};

use crate::engine::RenderingEngine;
use crate::model::{Annotation, AnnotationUid};

/// UI-requested style state for one annotation, independent of the engine.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StyleOverride {
    /// Requested display color.
    pub color: Option<String>,
    /// Requested lock flag.
    pub locked: Option<bool>,
}

/// One style field change to synchronize into the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
enum StyleChange {
    Color(String),
    Locked(bool),
}

#[derive(Debug)]
struct PendingPush {
    uid: AnnotationUid,
    change: StyleChange,
    attempts_left: u32,
    due: Instant,
}

/// Override store plus the bounded-retry queue pushing overrides into the
/// engine.
#[derive(Debug)]
pub struct StyleStore {
    overrides: HashMap<AnnotationUid, StyleOverride>,
    pending: Vec<PendingPush>,
    retry_attempts: u32,
    retry_delay: Duration,
}

impl StyleStore {
    pub fn new(retry_attempts: u32, retry_delay_ms: u64) -> Self {
        Self {
            overrides: HashMap::new(),
            pending: Vec::new(),
            retry_attempts,
            retry_delay: Duration::from_millis(retry_delay_ms),
        }
    }

    /// The override recorded for an annotation, if any.
    pub fn get(&self, uid: &AnnotationUid) -> Option<&StyleOverride> {
        self.overrides.get(uid)
    }

    /// Copy of the override state, for rollback on persistence failure.
    pub fn snapshot(&self, uid: &AnnotationUid) -> Option<StyleOverride> {
        self.overrides.get(uid).cloned()
    }

    /// Restore a previously snapshotted override state, re-synchronizing the
    /// engine with the restored color/lock where one exists.
    pub fn restore(
        &mut self,
        uid: &AnnotationUid,
        state: Option<StyleOverride>,
        engine: &mut dyn RenderingEngine,
        now: Instant,
    ) {
        self.pending.retain(|p| &p.uid != uid);
        match state {
            Some(state) => {
                if let Some(color) = state.color.clone() {
                    self.push(uid.clone(), StyleChange::Color(color), engine, now);
                }
                if let Some(locked) = state.locked {
                    self.push(uid.clone(), StyleChange::Locked(locked), engine, now);
                }
                self.overrides.insert(uid.clone(), state);
            }
            None => {
                self.overrides.remove(uid);
            }
        }
    }

    /// Record a color override and push it toward the engine.
    pub fn set_color(
        &mut self,
        uid: &AnnotationUid,
        color: impl Into<String>,
        engine: &mut dyn RenderingEngine,
        now: Instant,
    ) {
        let color = color.into();
        self.overrides.entry(uid.clone()).or_default().color = Some(color.clone());
        self.push(uid.clone(), StyleChange::Color(color), engine, now);
    }

    /// Record a lock override and push it toward the engine.
    pub fn set_locked(
        &mut self,
        uid: &AnnotationUid,
        locked: bool,
        engine: &mut dyn RenderingEngine,
        now: Instant,
    ) {
        self.overrides.entry(uid.clone()).or_default().locked = Some(locked);
        self.push(uid.clone(), StyleChange::Locked(locked), engine, now);
    }

    /// Forget all state for an annotation (deleted).
    pub fn remove(&mut self, uid: &AnnotationUid) {
        self.overrides.remove(uid);
        self.pending.retain(|p| &p.uid != uid);
    }

    /// Fold the recorded override into a merged-list annotation.
    pub fn apply(&self, annotation: &mut Annotation) {
        if let Some(state) = self.overrides.get(&annotation.uid) {
            if state.color.is_some() {
                annotation.color_override = state.color.clone();
            }
            if let Some(locked) = state.locked {
                annotation.locked = locked;
            }
        }
    }

    /// Re-synchronize an annotation the engine has (re)registered.
    ///
    /// Preferred over retrying when the engine acknowledges registration;
    /// the timed queue remains the fallback.
    pub fn sync_annotation(&mut self, uid: &AnnotationUid, engine: &mut dyn RenderingEngine) {
        if let Some(state) = self.overrides.get(uid).cloned() {
            if let Some(color) = &state.color {
                engine.set_color(uid, color);
            }
            if let Some(locked) = state.locked {
                engine.set_locked(uid, locked);
            }
            self.pending.retain(|p| &p.uid != uid);
        }
    }

    /// Attempt one push; queue a retry when the engine does not know the
    /// annotation yet.
    fn push(
        &mut self,
        uid: AnnotationUid,
        change: StyleChange,
        engine: &mut dyn RenderingEngine,
        now: Instant,
    ) {
        if Self::try_apply(&uid, &change, engine) {
            return;
        }
        if self.retry_attempts == 0 {
            log::warn!("Style push for '{uid}' failed and retries are disabled");
            return;
        }
        log::debug!("Annotation '{uid}' not in engine yet; queuing style retry");
        // A newer change to the same field supersedes the queued one.
        self.pending.retain(|p| {
            !(p.uid == uid && std::mem::discriminant(&p.change) == std::mem::discriminant(&change))
        });
        self.pending.push(PendingPush {
            uid,
            change,
            attempts_left: self.retry_attempts,
            due: now + self.retry_delay,
        });
    }

    fn try_apply(uid: &AnnotationUid, change: &StyleChange, engine: &mut dyn RenderingEngine) -> bool {
        match change {
            StyleChange::Color(color) => engine.set_color(uid, color),
            StyleChange::Locked(locked) => engine.set_locked(uid, *locked),
        }
    }

    /// Whether any pushes are still waiting on the engine.
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Retry due pushes. Returns the ids whose retries are now exhausted so
    /// the caller can surface a warning.
    pub fn tick(&mut self, engine: &mut dyn RenderingEngine, now: Instant) -> Vec<AnnotationUid> {
        let mut exhausted = Vec::new();
        let mut still_pending = Vec::new();

        for mut push in self.pending.drain(..) {
            if push.due > now {
                still_pending.push(push);
                continue;
            }
            if Self::try_apply(&push.uid, &push.change, engine) {
                continue;
            }
            push.attempts_left -= 1;
            if push.attempts_left == 0 {
                log::warn!(
                    "Giving up style push for '{}': never registered in engine",
                    push.uid
                );
                exhausted.push(push.uid);
            } else {
                push.due = now + self.retry_delay;
                still_pending.push(push);
            }
        }

        self.pending = still_pending;
        exhausted
    }
}
