//! End-to-end scenario tests.
//!
//! Most of these drive the engine directly against in-memory datastores; `http` drives the
//! full router the way a game server and the panel would.

use chrono::{DateTime, TimeZone, Utc};
use uuid::Uuid;

use crate::database::Datastore;
use crate::players::store::LoginRecord;
use crate::players::IpInfo;

mod punishments;
mod linking;
mod rollback;
mod http;

/// A fresh in-memory datastore.
async fn store() -> Datastore {
	Datastore::in_memory().await.expect("in-memory datastore")
}

/// A fixed, readable point in time.
fn at(millis: i64) -> DateTime<Utc> {
	Utc.timestamp_millis_opt(millis).unwrap()
}

/// The epoch the scenarios play out around.
const T0: i64 = 1_700_000_000_000;

/// Seeds a player through the regular login path.
async fn seed_player(db: &Datastore, uuid: Uuid, username: &str, ip: &str) {
	let record = LoginRecord {
		minecraft_uuid: uuid,
		username: username.to_owned(),
		ip_address: ip.to_owned(),
		ip_info: IpInfo::default(),
		skin_hash: None,
		server_name: "lobby".to_owned(),
	};

	db.upsert_on_login(&record, at(T0)).await.expect("login succeeds");
}
