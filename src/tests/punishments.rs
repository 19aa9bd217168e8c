//! Scenarios around punishment creation, acknowledgement and pardons.

use chrono::Duration;
use serde_json::json;
use uuid::Uuid;

use super::{at, seed_player, store, T0};
use crate::punishments::engine::{self, Acknowledgement, CreateDynamic, CreateManual};
use crate::settings::{OffenseLevel, Severity, TypeRegistry};
use crate::sync::selection;
use crate::time::Millis;
use crate::Result;

fn manual_ban(reason: &str) -> CreateManual {
	CreateManual {
		issuer_name: "steve".to_owned(),
		type_ordinal: 2,
		reason: reason.to_owned(),
		duration: Some(Millis(3_600_000)),
		evidence: None,
		alt_blocking: false,
		wipe_after_expiry: false,
		attached_ticket_ids: Vec::new(),
	}
}

#[tokio::test]
async fn ban_then_pardon_goes_inactive_immediately() -> Result<()> {
	let db = store().await;
	let registry = TypeRegistry::defaults();
	let target = Uuid::new_v4();

	seed_player(&db, target, "griefer", "203.0.113.7").await;

	let ban = engine::create_manual(&db, &registry, target, manual_ban("grief"), at(T0)).await?;

	assert_eq!(ban.reason(), Some("grief"));
	assert_eq!(ban.started, None);
	assert_eq!(ban.data.expires, None);

	// Acknowledgement starts the punishment and derives the expiry.
	let started = engine::acknowledge(
		&db,
		&registry,
		Acknowledgement {
			punishment_id: ban.id.clone(),
			player_uuid: target,
			executed_at: Some(at(T0)),
			success: true,
			error_message: None,
		},
		at(T0),
	)
	.await?;

	assert_eq!(started.started, Some(at(T0)));
	assert_eq!(started.data.expires, Some(at(T0) + Duration::hours(1)));

	// Ten seconds later the ban is pardoned.
	let pardon_time = at(T0) + Duration::seconds(10);
	let (_, pardoned) = engine::pardon_by_id(
		&db,
		&registry,
		&ban.id,
		None,
		"alex",
		Some("appealed in person".to_owned()),
		pardon_time,
	)
	.await?;

	assert!(!pardoned.effective_state(pardon_time).active);
	assert!(!pardoned.is_active(pardon_time + Duration::seconds(1)));

	// The login selection no longer carries the ban.
	let player = db.require_player(target).await?;
	let selected = selection::select_punishments(
		&player,
		&registry,
		pardon_time - Duration::minutes(5),
		pardon_time + Duration::seconds(1),
	);

	assert!(selected.is_empty());

	// A second pardon attempt conflicts.
	let second = engine::pardon_by_id(
		&db,
		&registry,
		&ban.id,
		None,
		"alex",
		None,
		pardon_time + Duration::seconds(2),
	)
	.await;

	assert!(second.is_err_and(|error| error.is_conflict()));

	Ok(())
}

#[tokio::test]
async fn mute_stacking_is_rejected() -> Result<()> {
	let db = store().await;
	let registry = TypeRegistry::defaults();
	let target = Uuid::new_v4();

	seed_player(&db, target, "spammer", "203.0.113.7").await;

	let mute = CreateManual {
		type_ordinal: 1,
		duration: Some(Millis::PERMANENT),
		..manual_ban("spam")
	};

	engine::create_manual(&db, &registry, target, mute.clone(), at(T0)).await?;

	// Even unstarted, the pending mute blocks a second one.
	let second = engine::create_manual(&db, &registry, target, mute, at(T0) + Duration::seconds(1))
		.await;

	assert!(second.is_err_and(|error| error.is_conflict()));

	Ok(())
}

#[tokio::test]
async fn dynamic_punishments_derive_duration_from_points() -> Result<()> {
	let db = store().await;
	let target = Uuid::new_v4();

	seed_player(&db, target, "toxic", "203.0.113.7").await;

	// Ordinal 10: Social, 2 points per regular offence, 2h at the medium tier.
	let chat_abuse = serde_json::from_value(json!({
		"ordinal": 10,
		"name": "Chat Abuse",
		"category": "Social",
		"points": { "low": 2, "regular": 4, "severe": 6 },
		"durations": {
			"low": {
				"first": { "value": 30, "unit": "minutes" },
				"medium": { "value": 1, "unit": "hours" },
				"habitual": { "value": 2, "unit": "hours" },
			},
			"regular": {
				"first": { "value": 1, "unit": "hours" },
				"medium": { "value": 2, "unit": "hours" },
				"habitual": { "value": 1, "unit": "days" },
			},
			"severe": {
				"first": { "value": 1, "unit": "days" },
				"medium": { "value": 3, "unit": "days" },
				"habitual": { "value": 1, "unit": "weeks" },
			},
		},
	}))
	.expect("valid type config");

	let registry = TypeRegistry::from_types([chat_abuse]);

	let request = CreateDynamic {
		issuer_name: "steve".to_owned(),
		type_ordinal: 10,
		reason: "slurs".to_owned(),
		severity: None,
		status: None,
		evidence: None,
		alt_blocking: false,
		wipe_after_expiry: false,
		attached_ticket_ids: Vec::new(),
	};

	// First offence: low tier, regular severity, one hour.
	let first = engine::create_dynamic(&db, &registry, target, request.clone(), at(T0)).await?;

	assert_eq!(first.data.severity, Some(Severity::Regular));
	assert_eq!(first.data.status, Some(OffenseLevel::Low));
	assert_eq!(first.data.duration, Some(Millis(3_600_000)));

	// Start it so it contributes its 4 points; the default social medium threshold is 4.
	engine::acknowledge(
		&db,
		&registry,
		Acknowledgement {
			punishment_id: first.id.clone(),
			player_uuid: target,
			executed_at: Some(at(T0)),
			success: true,
			error_message: None,
		},
		at(T0),
	)
	.await?;

	// Second offence: the player is now a medium-tier offender, so two hours.
	let second = engine::create_dynamic(
		&db,
		&registry,
		target,
		request,
		at(T0) + Duration::minutes(10),
	)
	.await?;

	assert_eq!(second.data.severity, Some(Severity::Regular));
	assert_eq!(second.data.status, Some(OffenseLevel::Medium));
	assert_eq!(second.data.duration, Some(Millis(7_200_000)));

	Ok(())
}

#[tokio::test]
async fn acknowledgements_are_idempotent() -> Result<()> {
	let db = store().await;
	let registry = TypeRegistry::defaults();
	let target = Uuid::new_v4();

	seed_player(&db, target, "griefer", "203.0.113.7").await;

	let ban = engine::create_manual(&db, &registry, target, manual_ban("grief"), at(T0)).await?;

	let ack = |executed_at, now| {
		engine::acknowledge(
			&db,
			&registry,
			Acknowledgement {
				punishment_id: ban.id.clone(),
				player_uuid: target,
				executed_at: Some(executed_at),
				success: true,
				error_message: None,
			},
			now,
		)
	};

	let first = ack(at(T0), at(T0)).await?;

	// A later repeat must not move `started` or the expiry.
	let second = ack(at(T0) + Duration::minutes(30), at(T0) + Duration::minutes(30)).await?;

	assert_eq!(second.started, first.started);
	assert_eq!(second.data.expires, first.data.expires);

	Ok(())
}

#[tokio::test]
async fn failed_executions_are_recorded_without_starting() -> Result<()> {
	let db = store().await;
	let registry = TypeRegistry::defaults();
	let target = Uuid::new_v4();

	seed_player(&db, target, "griefer", "203.0.113.7").await;

	let ban = engine::create_manual(&db, &registry, target, manual_ban("grief"), at(T0)).await?;

	let failed = engine::acknowledge(
		&db,
		&registry,
		Acknowledgement {
			punishment_id: ban.id.clone(),
			player_uuid: target,
			executed_at: None,
			success: false,
			error_message: Some("player not found".to_owned()),
		},
		at(T0),
	)
	.await?;

	assert_eq!(failed.started, None);
	assert_eq!(failed.data.execution_failed, Some(true));
	assert_eq!(failed.data.execution_error.as_deref(), Some("player not found"));

	Ok(())
}

#[tokio::test]
async fn username_change_voids_flagged_punishments() -> Result<()> {
	let db = store().await;
	let target = Uuid::new_v4();

	seed_player(&db, target, "badword123", "203.0.113.7").await;

	let name_ban = serde_json::from_value(json!({
		"ordinal": 20,
		"name": "Inappropriate Name",
		"category": "Administrative",
		"permanentUntilUsernameChange": true,
		"singleSeverityDurations": {
			"first": { "value": 1, "unit": "days", "type": "ban" },
			"medium": { "value": 1, "unit": "days", "type": "ban" },
			"habitual": { "value": 1, "unit": "days", "type": "ban" },
		},
	}))
	.expect("valid type config");

	let registry = TypeRegistry::from_types([name_ban]);

	let request = CreateDynamic {
		issuer_name: "steve".to_owned(),
		type_ordinal: 20,
		reason: "change your name".to_owned(),
		severity: None,
		status: None,
		evidence: None,
		alt_blocking: false,
		wipe_after_expiry: false,
		attached_ticket_ids: Vec::new(),
	};

	let punishment = engine::create_dynamic(&db, &registry, target, request, at(T0)).await?;

	engine::acknowledge(
		&db,
		&registry,
		Acknowledgement {
			punishment_id: punishment.id.clone(),
			player_uuid: target,
			executed_at: Some(at(T0)),
			success: true,
			error_message: None,
		},
		at(T0),
	)
	.await?;

	// Same name again: nothing happens.
	let untouched = engine::auto_unban_on_login(&db, &registry, target, false, false, at(T0))
		.await?;

	assert!(untouched.is_empty());

	// The rename voids the punishment.
	let voided = engine::auto_unban_on_login(
		&db,
		&registry,
		target,
		true,
		false,
		at(T0) + Duration::hours(1),
	)
	.await?;

	assert_eq!(voided, vec![punishment.id.clone()]);

	let player = db.require_player(target).await?;
	let stored = player.punishment(&punishment.id).expect("punishment exists");

	assert_eq!(stored.data.active, Some(false));
	assert!(stored.data.unbanned.is_some());
	assert!(!stored.is_active(at(T0) + Duration::hours(2)));

	Ok(())
}
