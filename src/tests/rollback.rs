//! Scenarios around the rollback engine.

use chrono::Duration;
use uuid::Uuid;

use super::{at, seed_player, store, T0};
use crate::audit::rollback;
use crate::punishments::engine::{self, CreateManual};
use crate::settings::TypeRegistry;
use crate::time::Millis;
use crate::Result;

fn ban(issuer: &str, reason: &str) -> CreateManual {
	CreateManual {
		issuer_name: issuer.to_owned(),
		type_ordinal: 2,
		reason: reason.to_owned(),
		duration: Some(Millis::PERMANENT),
		evidence: None,
		alt_blocking: false,
		wipe_after_expiry: false,
		attached_ticket_ids: Vec::new(),
	}
}

#[tokio::test]
async fn staff_window_rollback_hits_exactly_the_window() -> Result<()> {
	let db = store().await;
	let registry = TypeRegistry::defaults();
	let target = Uuid::new_v4();
	let day = Duration::days(1);

	seed_player(&db, target, "victim", "203.0.113.7").await;

	// Monday: three punishments, Tuesday: two, Wednesday: one. All by the same staff
	// member, with one Tuesday entry from someone else mixed in.
	let monday = at(T0);
	let tuesday = monday + day;
	let wednesday = tuesday + day;

	for (issued, count) in [(monday, 3), (tuesday, 2), (wednesday, 1)] {
		for offset in 0..count {
			engine::create_manual(
				&db,
				&registry,
				target,
				ban("rogue_mod", "overreach"),
				issued + Duration::minutes(offset),
			)
			.await?;
		}
	}

	engine::create_manual(&db, &registry, target, ban("steve", "legit"), tuesday).await?;

	let summary = rollback::rollback_window(
		&db,
		tuesday,
		tuesday + day - Duration::seconds(1),
		Some("rogue_mod"),
		"admin",
		wednesday + day,
	)
	.await?;

	assert_eq!(summary.punishment_ids.len(), 2);
	assert_eq!(summary.failed_players, 0);

	let player = db.require_player(target).await?;

	let rolled_back = player
		.punishments
		.iter()
		.filter(|punishment| punishment.data.rolled_back == Some(true))
		.count();

	assert_eq!(rolled_back, 2);

	// Monday, Wednesday and the other staff member's punishment are untouched.
	assert_eq!(player.punishments.len(), 7);

	// Re-running the identical window mutates nothing.
	let again = rollback::rollback_window(
		&db,
		tuesday,
		tuesday + day - Duration::seconds(1),
		Some("rogue_mod"),
		"admin",
		wednesday + day,
	)
	.await?;

	assert!(again.punishment_ids.is_empty());

	Ok(())
}

#[tokio::test]
async fn single_rollback_is_idempotent_and_pardoning() -> Result<()> {
	let db = store().await;
	let registry = TypeRegistry::defaults();
	let target = Uuid::new_v4();

	seed_player(&db, target, "victim", "203.0.113.7").await;

	let punishment =
		engine::create_manual(&db, &registry, target, ban("rogue_mod", "overreach"), at(T0))
			.await?;

	let now = at(T0) + Duration::hours(1);
	let (_, rolled_back) = rollback::rollback_single(
		&db,
		&punishment.id,
		"admin",
		Some("mass unban".to_owned()),
		now,
	)
	.await?;

	assert_eq!(rolled_back.data.rolled_back, Some(true));
	assert_eq!(rolled_back.data.rollback_by.as_deref(), Some("admin"));
	assert!(!rolled_back.effective_state(now).active);
	assert!(!rolled_back.is_valid_for_execution(now));

	// The reversal is a pardon modification with a zero effective duration.
	let modification = rolled_back
		.modifications
		.first()
		.expect("one modification");

	assert_eq!(modification.effective_duration, Some(Millis(0)));

	let second = rollback::rollback_single(&db, &punishment.id, "admin", None, now).await;

	assert!(second.is_err_and(|error| error.is_conflict()));

	Ok(())
}
