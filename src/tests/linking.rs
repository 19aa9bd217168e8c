//! Scenarios around account linking and linked-ban propagation.

use chrono::Duration;
use uuid::Uuid;

use super::{at, store, T0};
use crate::database::Datastore;
use crate::linking;
use crate::players::store::LoginRecord;
use crate::players::IpInfo;
use crate::punishments::engine::{self, Acknowledgement, CreateManual};
use crate::settings::{TypeRegistry, ORDINAL_LINKED_BAN};
use crate::time::Millis;
use crate::Result;

async fn login_at(
	db: &Datastore,
	uuid: Uuid,
	username: &str,
	ip: &str,
	proxy: bool,
	millis: i64,
) {
	let record = LoginRecord {
		minecraft_uuid: uuid,
		username: username.to_owned(),
		ip_address: ip.to_owned(),
		ip_info: IpInfo {
			proxy,
			..Default::default()
		},
		skin_hash: None,
		server_name: "lobby".to_owned(),
	};

	db.upsert_on_login(&record, at(millis)).await.expect("login succeeds");
}

#[tokio::test]
async fn proxy_logins_link_only_within_the_window() -> Result<()> {
	let hour = 3_600_000_i64;

	// Player A at 10:00, player B at 15:59 from the same proxy: linked.
	{
		let db = store().await;
		let registry = TypeRegistry::defaults();
		let player_a = Uuid::new_v4();
		let player_b = Uuid::new_v4();

		login_at(&db, player_a, "main", "198.51.100.50", true, T0).await;
		login_at(&db, player_b, "alt", "198.51.100.50", true, T0 + 6 * hour - 60_000).await;

		linking::link_player(&db, &registry, player_b).await?;

		let stored_a = db.require_player(player_a).await?;
		let stored_b = db.require_player(player_b).await?;

		assert!(stored_a.data.linked_accounts.contains(&player_b));
		assert!(stored_b.data.linked_accounts.contains(&player_a));
		assert!(stored_b.data.last_linked_account_update.is_some());
	}

	// Same setup, but B arrives at 16:01: no link.
	{
		let db = store().await;
		let registry = TypeRegistry::defaults();
		let player_a = Uuid::new_v4();
		let player_b = Uuid::new_v4();

		login_at(&db, player_a, "main", "198.51.100.50", true, T0).await;
		login_at(&db, player_b, "alt", "198.51.100.50", true, T0 + 6 * hour + 60_000).await;

		linking::link_player(&db, &registry, player_b).await?;

		let stored_a = db.require_player(player_a).await?;

		assert!(stored_a.data.linked_accounts.is_empty());
	}

	Ok(())
}

#[tokio::test]
async fn alt_blocking_bans_propagate_to_new_links() -> Result<()> {
	let db = store().await;
	let registry = TypeRegistry::defaults();
	let player_a = Uuid::new_v4();
	let player_b = Uuid::new_v4();
	let day = 86_400_000_i64;

	login_at(&db, player_a, "main", "203.0.113.7", false, T0).await;

	// A carries a started, alt-blocking 24h ban.
	let ban = engine::create_manual(
		&db,
		&registry,
		player_a,
		CreateManual {
			issuer_name: "steve".to_owned(),
			type_ordinal: 2,
			reason: "ban evasion hub".to_owned(),
			duration: Some(Millis(day)),
			evidence: None,
			alt_blocking: true,
			wipe_after_expiry: false,
			attached_ticket_ids: Vec::new(),
		},
		at(T0),
	)
	.await?;

	engine::acknowledge(
		&db,
		&registry,
		Acknowledgement {
			punishment_id: ban.id.clone(),
			player_uuid: player_a,
			executed_at: Some(at(T0)),
			success: true,
			error_message: None,
		},
		at(T0),
	)
	.await?;

	// B appears on the same residential IP shortly after.
	login_at(&db, player_b, "alt", "203.0.113.7", false, T0 + 3_600_000).await;
	linking::link_player(&db, &registry, player_b).await?;

	let stored_b = db.require_player(player_b).await?;

	let linked_bans = stored_b
		.punishments
		.iter()
		.filter(|punishment| punishment.type_ordinal == ORDINAL_LINKED_BAN)
		.collect::<Vec<_>>();

	assert_eq!(linked_bans.len(), 1);

	let linked_ban = linked_bans.first().expect("one linked ban");

	assert_eq!(linked_ban.data.linked_ban_id, Some(ban.id.clone()));
	assert_eq!(linked_ban.issuer_name, "System (Linked Ban)");
	assert_eq!(linked_ban.started, None);
	assert_eq!(linked_ban.data.severity, None);
	assert_eq!(linked_ban.data.status, None);

	// Remaining duration mirrors the source (one hour has already elapsed).
	let duration = linked_ban.data.duration.expect("duration set");

	assert!((duration.0 - (day - 3_600_000)).abs() < 1_000);

	// Re-linking does not create a second linked ban.
	linking::link_player(&db, &registry, player_b).await?;
	linking::link_player(&db, &registry, player_a).await?;

	let stored_b = db.require_player(player_b).await?;

	assert_eq!(
		stored_b
			.punishments
			.iter()
			.filter(|punishment| punishment.data.linked_ban_id == Some(ban.id.clone()))
			.count(),
		1
	);

	Ok(())
}

#[tokio::test]
async fn strangers_on_different_ips_stay_unlinked() -> Result<()> {
	let db = store().await;
	let registry = TypeRegistry::defaults();
	let player_a = Uuid::new_v4();
	let player_b = Uuid::new_v4();

	login_at(&db, player_a, "main", "203.0.113.7", false, T0).await;
	login_at(&db, player_b, "other", "198.51.100.1", false, T0).await;

	linking::link_player(&db, &registry, player_a).await?;

	let stored_a = db.require_player(player_a).await?;

	assert!(stored_a.data.linked_accounts.is_empty());

	Ok(())
}
