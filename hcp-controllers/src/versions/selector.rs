//! The upgrade decision procedure.
//!
//! Given the customer's desired minor, the channel group, and the versions a
//! cluster has recently run, pick the next full version to move to, or
//! nothing. The selection prefers *gateway* versions: versions with at least
//! one update edge into the next minor channel, so a z-stream hop today
//! never blocks the y-stream upgrade tomorrow.

use hashbrown::{HashMap, HashSet};
use hcp_clients::graph::{GraphError, UpdateGraphClient};
use hcp_core::MinorVersion;
use semver::Version;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum SelectError {
    #[error("downgrade from {active} to {desired} is not supported")]
    Downgrade {
        active: MinorVersion,
        desired: MinorVersion,
    },
    #[error("changing major version from {active} to {desired} is not supported")]
    MajorChange {
        active: MinorVersion,
        desired: MinorVersion,
    },
    #[error("{desired} is more than one minor ahead of {active}")]
    SkippedMinor {
        active: MinorVersion,
        desired: MinorVersion,
    },
    #[error(transparent)]
    Graph(#[from] GraphError),
}

/// Picks the next version for a cluster, or `None` when it is already as
/// far along as the graph allows.
///
/// `active` is newest-first. Three shapes:
///
/// - no active versions: a fresh install into the desired minor, falling
///   back to its `X.Y.0` baseline when the graph offers nothing better;
/// - desired minor == running minor: the latest z-stream, gateway-preferred;
/// - desired minor == running minor + 1: the latest patch of the next minor
///   reachable from *every* active version, falling back to a z-stream hop
///   in the current minor to reach a gateway.
pub async fn select_next_version(
    client: &dyn UpdateGraphClient,
    channel_group: &str,
    desired: MinorVersion,
    active: &[Version],
) -> Result<Option<Version>, SelectError> {
    let Some(latest_active) = active.first() else {
        let baseline = desired.baseline();
        let found =
            find_latest_in_minor(client, channel_group, desired, std::slice::from_ref(&baseline))
                .await?;
        // The baseline itself was queryable, so it is safe to install.
        return Ok(found.or(Some(baseline)));
    };

    let running = MinorVersion::of(latest_active);
    validate(desired, running)?;

    if desired == running {
        return find_latest_in_minor(client, channel_group, desired, active).await;
    }

    match find_latest_in_minor(client, channel_group, desired, active).await? {
        Some(version) => Ok(Some(version)),
        // No shared path into the next minor yet; hop within the current
        // minor to reach a gateway version first.
        None => find_latest_in_minor(client, channel_group, running, active).await,
    }
}

fn validate(desired: MinorVersion, running: MinorVersion) -> Result<(), SelectError> {
    if desired.major != running.major {
        return Err(SelectError::MajorChange {
            active: running,
            desired,
        });
    }
    if desired.minor < running.minor {
        return Err(SelectError::Downgrade {
            active: running,
            desired,
        });
    }
    if desired.minor > running.minor + 1 {
        return Err(SelectError::SkippedMinor {
            active: running,
            desired,
        });
    }
    Ok(())
}

/// The latest version of `target` reachable from every version in `active`,
/// preferring gateways into the next minor.
async fn find_latest_in_minor(
    client: &dyn UpdateGraphClient,
    channel_group: &str,
    target: MinorVersion,
    active: &[Version],
) -> Result<Option<Version>, SelectError> {
    let channel = target.channel(channel_group);

    // Count, per candidate, how many active versions can reach it. An
    // active version the graph does not know contributes nothing.
    let mut reachable_from: HashMap<Version, usize> = HashMap::new();
    for from in active {
        let candidates = match client.get_updates(&channel, from).await {
            Ok(graph) => graph.candidates,
            Err(err) if err.is_version_not_found() => Vec::new(),
            Err(err) => return Err(err.into()),
        };
        let mut seen = HashSet::new();
        for release in candidates {
            if target.contains(&release.version) && seen.insert(release.version.clone()) {
                *reachable_from.entry(release.version).or_insert(0) += 1;
            }
        }
    }

    // Keep only candidates every active version can reach.
    let mut shared: Vec<Version> = reachable_from
        .into_iter()
        .filter(|(_, count)| *count == active.len())
        .map(|(version, _)| version)
        .collect();
    shared.sort_unstable_by(|a, b| b.cmp(a));

    let Some(latest) = shared.first() else {
        debug!(%target, "no candidate reachable from all active versions");
        return Ok(None);
    };

    // Probe whether the next minor channel exists at all.
    let next_channel = target.successor().channel(channel_group);
    match client.get_updates(&next_channel, latest).await {
        Err(err) if err.is_version_not_found() => {
            debug!(channel = %next_channel, "next minor absent, taking latest candidate");
            return Ok(Some(latest.clone()));
        }
        Err(err) => return Err(err.into()),
        Ok(graph) if !graph.candidates.is_empty() => return Ok(Some(latest.clone())),
        Ok(_) => {}
    }

    // The next minor exists but the latest candidate cannot enter it; walk
    // down to the newest gateway.
    for candidate in shared.iter().skip(1) {
        match client.get_updates(&next_channel, candidate).await {
            Ok(graph) if !graph.candidates.is_empty() => return Ok(Some(candidate.clone())),
            Ok(_) => {}
            Err(err) if err.is_version_not_found() => {}
            Err(err) => return Err(err.into()),
        }
    }
    debug!(%target, "no gateway candidate into the next minor");
    Ok(None)
}
