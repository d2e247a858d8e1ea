use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use time::OffsetDateTime;
use tracing::{debug, error, info, warn};

use crate::clock;
use crate::models::{CheckSnapshot, CoreResult, UpdateRecord};
use crate::policy::{FilterPolicy, apply_policy};
use crate::settings::SettingsStore;
use crate::winget::{UpdateJsonVariant, WingetSource, json, pins, text};

/// Owns the canonical update state and orchestrates check cycles.
///
/// One check mutates state at a time; readers always get a complete snapshot
/// from before or after a cycle, never a partial one. All CLI and parse
/// failures are absorbed here: public operations return counts and booleans,
/// so neither the scheduler nor an IPC handler ever sees an error cross this
/// boundary.
pub struct UpdateEngine {
    source: Box<dyn WingetSource>,
    settings: Arc<dyn SettingsStore>,
    state: Mutex<EngineState>,
    is_checking: AtomicBool,
}

#[derive(Default)]
struct EngineState {
    updates: Vec<UpdateRecord>,
    last_check: Option<OffsetDateTime>,
}

/// Clears the in-progress flag on every exit path, including panics inside
/// a check.
struct CheckGuard<'a>(&'a AtomicBool);

impl Drop for CheckGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl UpdateEngine {
    pub fn new(source: impl WingetSource + 'static, settings: Arc<dyn SettingsStore>) -> Self {
        Self {
            source: Box::new(source),
            settings,
            state: Mutex::new(EngineState::default()),
            is_checking: AtomicBool::new(false),
        }
    }

    /// Runs one check cycle and returns the number of available updates.
    ///
    /// If a check is already in flight and `force` is false, the previous
    /// count is returned without spawning anything. Filter flags fall back
    /// to the settings store, then to built-in defaults. On failure the
    /// return value is 0 and the previous result set stays visible to
    /// readers; the return value is the authoritative outcome of this call.
    pub fn check_updates(
        &self,
        force: bool,
        include_pinned: Option<bool>,
        include_unknown: Option<bool>,
    ) -> usize {
        if self
            .is_checking
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
            && !force
        {
            info!("update check already in progress, skipping");
            return self.snapshot().count;
        }
        let _guard = CheckGuard(&self.is_checking);

        let policy = self.resolve_policy(include_pinned, include_unknown);
        debug!(
            include_pinned = policy.include_pinned,
            include_unknown = policy.include_unknown,
            "starting update check"
        );

        match self.run_check(policy) {
            Ok(count) => count,
            Err(check_error) => {
                error!(%check_error, "update check failed");
                0
            }
        }
    }

    /// Returns the cached update list, forcing one check first if the cache
    /// is empty. The cache reflects the filters used at check time; callers
    /// that need different filters must force a fresh check themselves.
    pub fn get_updates_list(
        &self,
        include_pinned: Option<bool>,
        include_unknown: Option<bool>,
    ) -> Vec<UpdateRecord> {
        if self.snapshot().updates.is_empty() {
            self.check_updates(true, include_pinned, include_unknown);
        }
        self.snapshot().updates
    }

    pub fn get_update_count(
        &self,
        include_pinned: Option<bool>,
        include_unknown: Option<bool>,
    ) -> usize {
        if self.snapshot().count == 0 {
            self.check_updates(true, include_pinned, include_unknown);
        }
        self.snapshot().count
    }

    pub fn last_check_time(&self) -> Option<OffsetDateTime> {
        self.snapshot().last_check
    }

    pub fn snapshot(&self) -> CheckSnapshot {
        let state = match self.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };
        CheckSnapshot {
            updates: state.updates.clone(),
            count: state.updates.len(),
            last_check: state.last_check,
            is_checking: self.is_checking.load(Ordering::SeqCst),
        }
    }

    /// Installs every available update, then verifies by re-checking.
    ///
    /// Pinned and unknown-version packages are included in both the
    /// pre-install and verification checks: a user asking to install
    /// everything should not have items silently skipped by display filters.
    /// Returns true only when the upgrade invocation exits zero and none of
    /// the pre-install ids remain afterwards.
    pub fn install_all_updates(&self) -> bool {
        info!("starting installation of all available updates");

        self.check_updates(true, Some(true), Some(true));
        let pending = self.snapshot().updates;
        if pending.is_empty() {
            info!("no updates to install");
            return true;
        }

        info!(count = pending.len(), "installing updates");
        let output = match self.source.upgrade_all() {
            Ok(output) => output,
            Err(upgrade_error) => {
                error!(%upgrade_error, "installation failed");
                return false;
            }
        };
        debug!(
            preview = %output.chars().take(500).collect::<String>(),
            "installation output"
        );

        info!("verifying updates were installed");
        self.check_updates(true, Some(true), Some(true));
        let remaining: HashSet<String> = self
            .snapshot()
            .updates
            .into_iter()
            .map(|update| update.id)
            .collect();

        let still_pending: Vec<&str> = pending
            .iter()
            .filter(|update| remaining.contains(&update.id))
            .map(|update| update.id.as_str())
            .collect();

        if still_pending.is_empty() {
            info!("all updates installed and verified");
            true
        } else {
            warn!(ids = %still_pending.join(", "), "some updates failed to install");
            false
        }
    }

    fn resolve_policy(
        &self,
        include_pinned: Option<bool>,
        include_unknown: Option<bool>,
    ) -> FilterPolicy {
        let from_settings = |value: CoreResult<bool>, key: &str| match value {
            Ok(value) => value,
            Err(settings_error) => {
                warn!(key, %settings_error, "settings unavailable, using default");
                false
            }
        };

        FilterPolicy {
            include_pinned: include_pinned
                .unwrap_or_else(|| from_settings(self.settings.include_pinned(), "include_pinned")),
            include_unknown: include_unknown.unwrap_or_else(|| {
                from_settings(self.settings.include_unknown(), "include_unknown")
            }),
        }
    }

    fn run_check(&self, policy: FilterPolicy) -> CoreResult<usize> {
        let pin_set = self.refresh_pins();

        // The structured paths fail soft into the text path; only a failure
        // of the canonical text invocation fails the whole cycle.
        let raw = match self.try_structured_formats() {
            Some(raw) => raw,
            None => {
                info!("structured output unavailable, falling back to text format");
                let output = self.source.update_text()?;
                text::parse_update_text(&output)
            }
        };

        let updates = apply_policy(raw, &pin_set, policy);
        let count = updates.len();
        let now = OffsetDateTime::now_utc();

        // Single linearization point: readers see the previous complete
        // result until this swap, the new one after it.
        {
            let mut state = match self.state.lock() {
                Ok(state) => state,
                Err(poisoned) => poisoned.into_inner(),
            };
            state.updates = updates;
            state.last_check = Some(now);
        }

        if let Err(settings_error) = self.settings.set_last_check(&clock::format_rfc3339(now)) {
            warn!(%settings_error, "failed to persist last check time");
        }

        info!(count, "update check completed");
        Ok(count)
    }

    fn try_structured_formats(&self) -> Option<Vec<crate::models::RawUpdate>> {
        for variant in UpdateJsonVariant::ALL {
            match self.source.update_json(variant) {
                Ok(output) => match json::parse_update_json(&output) {
                    Ok(raw) => {
                        debug!(?variant, "structured update output accepted");
                        return Some(raw);
                    }
                    Err(parse_error) => {
                        debug!(?variant, %parse_error, "structured output did not parse");
                    }
                },
                Err(command_error) => {
                    debug!(?variant, %command_error, "structured update command failed");
                }
            }
        }
        warn!("all structured update attempts failed");
        None
    }

    fn refresh_pins(&self) -> HashSet<String> {
        match self.source.pin_list() {
            Ok(output) => {
                let pin_set = pins::parse_pin_list(&output);
                debug!(count = pin_set.len(), "refreshed pinned packages");
                pin_set
            }
            Err(pin_error) => {
                warn!(%pin_error, "failed to list pinned packages");
                HashSet::new()
            }
        }
    }
}
