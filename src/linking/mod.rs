//! Account linking and linked-ban propagation.
//!
//! Logins from a new IP schedule a linking job; the job scans for other players sharing any of
//! the player's addresses, records symmetric links and propagates alt-blocking bans onto the
//! newly linked accounts. All of it runs on a background worker so the login response never
//! waits, and failures never surface to the triggering request.
//!
//! Jobs are submitted to a queue with bounded retries; a job that keeps failing is dropped
//! with a dead-letter entry in the tenant's log collection.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::audit::{self, LogLevel};
use crate::database::Datastore;
use crate::players::IpEntry;
use crate::settings::RegistryCache;
use crate::tenants::Tenants;
use crate::Result;

mod propagate;

/// How often a failed job is retried before it is dead-lettered.
const MAX_ATTEMPTS: u32 = 3;

/// The longest a pair of most-recent logins on a proxied IP may be apart for a link.
const PROXY_LINK_WINDOW_MS: i64 = 6 * 60 * 60 * 1_000;

/// A scheduled linking job.
#[derive(Debug)]
struct Job {
	/// The tenant whose datastore the job runs against.
	server_name: String,

	/// The player whose login triggered the job.
	player_uuid: Uuid,
}

/// A handle for scheduling linking jobs.
#[derive(Debug, Clone)]
pub struct LinkerHandle {
	/// The job queue.
	jobs: mpsc::UnboundedSender<Job>,
}

impl LinkerHandle {
	/// Spawns the linking worker and returns a handle to its queue.
	pub fn spawn(tenants: Arc<Tenants>, registries: Arc<RegistryCache>) -> Self {
		let (jobs, queue) = mpsc::unbounded_channel();

		tokio::spawn(worker(queue, tenants, registries));

		Self { jobs }
	}

	/// Schedules account linking for a player.
	///
	/// Never blocks and never fails; if the worker is gone the job is dropped with a log
	/// line.
	pub fn schedule(&self, server_name: &str, player_uuid: Uuid) {
		let job = Job {
			server_name: server_name.to_owned(),
			player_uuid,
		};

		if self.jobs.send(job).is_err() {
			tracing::error!(%server_name, %player_uuid, "linking worker is gone, dropping job");
		}
	}
}

/// The linking worker loop.
async fn worker(
	mut queue: mpsc::UnboundedReceiver<Job>,
	tenants: Arc<Tenants>,
	registries: Arc<RegistryCache>,
) {
	while let Some(job) = queue.recv().await {
		let mut last_error = None;

		for attempt in 1..=MAX_ATTEMPTS {
			match run_job(&job, &tenants, &registries).await {
				Ok(()) => {
					last_error = None;
					break;
				}
				Err(error) => {
					tracing::warn! {
						server_name = %job.server_name,
						player = %job.player_uuid,
						attempt,
						%error,
						"linking job failed",
					};

					last_error = Some(error);
					tokio::time::sleep(std::time::Duration::from_millis(
						250 * u64::from(attempt),
					))
					.await;
				}
			}
		}

		// Dead-letter: record the give-up in the tenant's own log collection, best effort.
		if let Some(error) = last_error {
			if let Ok(db) = tenants.datastore(&job.server_name).await {
				audit::record(
					&db,
					LogLevel::Error,
					"system",
					format!(
						"account linking for {player} failed after {MAX_ATTEMPTS} attempts: {error}",
						player = job.player_uuid,
					),
					None,
					Utc::now(),
				)
				.await;
			}
		}
	}
}

/// Runs one linking job to completion.
async fn run_job(
	job: &Job,
	tenants: &Tenants,
	registries: &RegistryCache,
) -> Result<()> {
	let db = tenants.datastore(&job.server_name).await?;
	let registry = registries.get(&job.server_name, &db).await;

	link_player(&db, &registry, job.player_uuid).await
}

/// Scans for players sharing any of `player_uuid`'s addresses, records links and propagates
/// alt-blocking bans.
pub(crate) async fn link_player(
	db: &crate::database::Datastore,
	registry: &crate::settings::TypeRegistry,
	player_uuid: Uuid,
) -> Result<()> {
	let Some(player) = db.get_player(player_uuid).await? else {
		return Ok(());
	};

	let ips = player
		.ip_addresses
		.iter()
		.map(|entry| entry.ip_address.clone())
		.collect::<Vec<_>>();

	if ips.is_empty() {
		return Ok(());
	}

	let candidates = db.find_players_by_ips(&ips, player_uuid).await?;
	let now = Utc::now();

	for candidate in candidates {
		let linkable = player.ip_addresses.iter().any(|entry| {
			candidate
				.ip_entry(&entry.ip_address)
				.is_some_and(|other| should_link(entry, other))
		});

		if !linkable {
			continue;
		}

		let already_linked = player
			.data
			.linked_accounts
			.contains(&candidate.minecraft_uuid);

		if already_linked {
			continue;
		}

		record_link(db, player_uuid, candidate.minecraft_uuid).await?;

		// A fresh link immediately mirrors alt-blocking bans, in both directions.
		propagate::propagate_linked_bans(
			db,
			registry,
			player_uuid,
			candidate.minecraft_uuid,
			now,
		)
		.await?;
		propagate::propagate_linked_bans(
			db,
			registry,
			candidate.minecraft_uuid,
			player_uuid,
			now,
		)
		.await?;
	}

	Ok(())
}

/// Whether two players' histories on the same IP justify a link.
///
/// Clean residential addresses always link. As soon as either side flags the address as a
/// proxy (or hosting range), the two most recent logins must be within six hours of each
/// other; shared VPN exits otherwise connect complete strangers.
fn should_link(ours: &IpEntry, theirs: &IpEntry) -> bool {
	let flagged = ours.proxy || ours.hosting || theirs.proxy || theirs.hosting;

	if !flagged {
		return true;
	}

	let gap = (ours.last_login() - theirs.last_login())
		.num_milliseconds()
		.abs();

	gap <= PROXY_LINK_WINDOW_MS
}

/// Records a symmetric link between two players and writes the system log entry.
async fn record_link(db: &Datastore, left: Uuid, right: Uuid) -> Result<()> {
	let now = Utc::now();

	db.update_player(left, |player| {
		if player.data.linked_accounts.insert(right) {
			player.data.last_linked_account_update = Some(now);
		}

		Ok(())
	})
	.await?;

	db.update_player(right, |player| {
		if player.data.linked_accounts.insert(left) {
			player.data.last_linked_account_update = Some(now);
		}

		Ok(())
	})
	.await?;

	audit::record(
		db,
		LogLevel::Info,
		"system",
		format!("linked accounts {left} and {right} (shared IP evidence)"),
		Some(serde_json::json!({ "accounts": [left, right] })),
		now,
	)
	.await;

	tracing::info!(%left, %right, "linked accounts");

	Ok(())
}

#[cfg(test)]
mod tests {
	use chrono::{DateTime, Duration, TimeZone, Utc};

	use super::should_link;
	use crate::players::{IpEntry, IpInfo};

	fn entry(proxy: bool, last_login: DateTime<Utc>) -> IpEntry {
		let info = IpInfo {
			proxy,
			..Default::default()
		};

		let mut entry = IpEntry::new("203.0.113.7".to_owned(), info, last_login);
		entry.logins = vec![last_login];

		entry
	}

	#[test]
	fn clean_addresses_always_link() {
		let now = Utc.timestamp_millis_opt(1_700_000_000_000).unwrap();

		let ours = entry(false, now);
		let theirs = entry(false, now - Duration::days(300));

		assert!(should_link(&ours, &theirs));
	}

	#[test]
	fn proxied_addresses_link_within_six_hours() {
		let now = Utc.timestamp_millis_opt(1_700_000_000_000).unwrap();

		let ours = entry(true, now);

		// 5h59m apart: link.
		assert!(should_link(&ours, &entry(false, now - Duration::minutes(359))));

		// Exactly six hours apart: still a link.
		assert!(should_link(&ours, &entry(false, now - Duration::hours(6))));

		// 6h01m apart: no link.
		assert!(!should_link(&ours, &entry(false, now - Duration::minutes(361))));
	}

	#[test]
	fn hosting_ranges_are_gated_like_proxies() {
		let now = Utc.timestamp_millis_opt(1_700_000_000_000).unwrap();

		let mut ours = entry(false, now);
		ours.hosting = true;

		assert!(!should_link(&ours, &entry(false, now - Duration::hours(7))));
	}
}
