use std::collections::HashSet;

use tracing::debug;

use crate::models::{RawUpdate, UpdateRecord};
use crate::version::comparable_versions;

/// Which candidate records survive filtering into the result set.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct FilterPolicy {
    pub include_pinned: bool,
    pub include_unknown: bool,
}

fn is_unknown_version(version: &str) -> bool {
    version.is_empty() || version.eq_ignore_ascii_case("unknown")
}

/// Applies the post-extraction policy to parser output, in order: unknown
/// filter, comparability gate, pin filter, equal-versions drop. Survivors
/// keep their encounter order.
///
/// Note the comparability gate rejects unknown current versions even when
/// `include_unknown` is set; the flag only bypasses the first step. An
/// unknown-version record therefore never reaches the result set.
pub fn apply_policy(
    raw: Vec<RawUpdate>,
    pins: &HashSet<String>,
    policy: FilterPolicy,
) -> Vec<UpdateRecord> {
    let mut updates = Vec::new();

    for record in raw {
        if is_unknown_version(&record.current_version) && !policy.include_unknown {
            debug!(id = %record.id, "skipping package with unknown current version");
            continue;
        }

        if !comparable_versions(&record.current_version, &record.available_version) {
            debug!(
                id = %record.id,
                current = %record.current_version,
                available = %record.available_version,
                "skipping package with unreliable version comparison"
            );
            continue;
        }

        if pins.contains(&record.id) && !policy.include_pinned {
            debug!(id = %record.id, "skipping pinned package");
            continue;
        }

        if record.current_version == record.available_version {
            debug!(id = %record.id, "skipping package already at available version");
            continue;
        }

        updates.push(record.into_record());
    }

    updates
}
