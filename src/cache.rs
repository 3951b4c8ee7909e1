//! Shared position cache spoken over the Upstash Redis REST protocol.
//!
//! Every call is a `POST <url>/pipeline` with a JSON array of commands and a
//! bearer token; the reply is an array of `{"result": ...}` or `{"error": ...}`.
//! Each vehicle lives in the hash `pos:<id>`, expiring after ten minutes, and
//! its ID is added to the `jeeps` set.

use std::collections::HashMap;
use std::time::Duration as StdDuration;

use anyhow::{anyhow, bail, Context};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::geo::UNKNOWN_STOP;
use crate::models::Fix;

pub const POSITION_TTL_SECS: u64 = 600;
pub const KNOWN_IDS_KEY: &str = "jeeps";
pub const UPDATES_CHANNEL: &str = "locationUpdate";

pub fn position_key(jeep_id: &str) -> String {
    format!("pos:{jeep_id}")
}

#[derive(Clone)]
pub struct RedisRestCache {
    client: reqwest::Client,
    pipeline_url: String,
    token: String,
}

#[derive(Debug, Deserialize)]
struct CommandReply {
    #[serde(default)]
    result: Value,

    #[serde(default)]
    error: Option<String>,
}

impl CommandReply {
    fn into_result(self) -> crate::Result<Value> {
        match self.error {
            Some(error) => Err(anyhow!(error)),
            None => Ok(self.result),
        }
    }
}

type Command = Vec<String>;

fn command<const N: usize>(parts: [&str; N]) -> Command {
    parts.iter().map(|part| part.to_string()).collect()
}

impl RedisRestCache {
    pub fn new(url: &str, token: &str) -> crate::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(StdDuration::from_secs(5))
            .build()
            .context("failed to build the cache HTTP client")?;
        Ok(Self {
            client,
            pipeline_url: format!("{}/pipeline", url.trim_end_matches('/')),
            token: token.to_string(),
        })
    }

    async fn pipeline(&self, commands: &[Command]) -> crate::Result<Vec<CommandReply>> {
        let replies: Vec<CommandReply> = self
            .client
            .post(&self.pipeline_url)
            .bearer_auth(&self.token)
            .json(commands)
            .send()
            .await
            .context("failed to reach the cache")?
            .error_for_status()
            .context("the cache rejected the pipeline")?
            .json()
            .await
            .context("failed to parse the cache reply")?;
        if replies.len() != commands.len() {
            bail!("expected {} replies, got {}", commands.len(), replies.len());
        }
        Ok(replies)
    }

    /// Writes the fix hash, refreshes its expiry, registers the ID and
    /// announces the fix on the updates channel. A failed announcement is ignored.
    #[instrument(skip_all, fields(jeep_id = %fix.jeep_id))]
    pub async fn store_position(&self, fix: &Fix) -> crate::Result {
        let key = position_key(&fix.jeep_id);
        let latitude = fix.latitude.to_string();
        let longitude = fix.longitude.to_string();
        let timestamp = fix.timestamp.to_string();
        let ttl = POSITION_TTL_SECS.to_string();
        let announcement = serde_json::to_string(fix)?;
        let commands = [
            command([
                "HSET",
                &key,
                "jeepId",
                &fix.jeep_id,
                "latitude",
                &latitude,
                "longitude",
                &longitude,
                "nearestStop",
                &fix.nearest_stop,
                "timestamp",
                &timestamp,
            ]),
            command(["EXPIRE", &key, &ttl]),
            command(["SADD", KNOWN_IDS_KEY, &fix.jeep_id]),
            command(["PUBLISH", UPDATES_CHANNEL, &announcement]),
        ];
        let mut replies = self.pipeline(&commands).await?.into_iter();
        for sent in &commands[..3] {
            if let Some(reply) = replies.next() {
                reply.into_result().with_context(|| format!("`{}` failed", sent[0]))?;
            }
        }
        if let Some(Err(error)) = replies.next().map(CommandReply::into_result) {
            debug!("failed to announce the update: {:#}", error);
        }
        Ok(())
    }

    /// Reads every registered vehicle hash. IDs whose hash has expired are
    /// skipped and pruned from the ID set.
    #[instrument(skip_all)]
    pub async fn load_positions(&self) -> crate::Result<Vec<Fix>> {
        let jeep_ids: Vec<String> = match self.pipeline(&[command(["SMEMBERS", KNOWN_IDS_KEY])]).await?.pop() {
            Some(reply) => serde_json::from_value(reply.into_result()?).context("malformed `SMEMBERS` reply")?,
            None => Vec::new(),
        };
        if jeep_ids.is_empty() {
            return Ok(Vec::new());
        }

        let commands: Vec<Command> = jeep_ids
            .iter()
            .map(|jeep_id| command(["HGETALL", &position_key(jeep_id)]))
            .collect();
        let replies = self.pipeline(&commands).await?;

        let mut fixes = Vec::with_capacity(jeep_ids.len());
        let mut expired = Vec::new();
        for (jeep_id, reply) in jeep_ids.into_iter().zip(replies) {
            let fields: Vec<String> = serde_json::from_value(reply.into_result()?)
                .with_context(|| format!("malformed `HGETALL` reply for `{jeep_id}`"))?;
            if fields.is_empty() {
                expired.push(jeep_id);
                continue;
            }
            match parse_position(&jeep_id, &fields) {
                Some(fix) => fixes.push(fix),
                None => warn!(%jeep_id, "skipping a malformed cached position"),
            }
        }
        if !expired.is_empty() {
            self.prune(&expired).await;
        }

        fixes.sort_unstable_by(|left, right| left.jeep_id.cmp(&right.jeep_id));
        Ok(fixes)
    }

    async fn prune(&self, jeep_ids: &[String]) {
        let mut srem = command(["SREM", KNOWN_IDS_KEY]);
        srem.extend(jeep_ids.iter().cloned());
        let result = self.pipeline(&[srem]).await.and_then(|mut replies| match replies.pop() {
            Some(reply) => reply.into_result().map(drop),
            None => Ok(()),
        });
        match result {
            Ok(()) => debug!(n_pruned = jeep_ids.len(), "pruned expired IDs"),
            Err(error) => warn!("failed to prune expired IDs: {:#}", error),
        }
    }

    /// Deletes the vehicle hash and unregisters its ID.
    #[instrument(skip(self))]
    pub async fn forget(&self, jeep_id: &str) -> crate::Result {
        let commands = [
            command(["DEL", &position_key(jeep_id)]),
            command(["SREM", KNOWN_IDS_KEY, jeep_id]),
        ];
        for (sent, reply) in commands.iter().zip(self.pipeline(&commands).await?) {
            reply.into_result().with_context(|| format!("`{}` failed", sent[0]))?;
        }
        Ok(())
    }
}

/// Builds a fix from a flat `HGETALL` field/value list.
fn parse_position(jeep_id: &str, fields: &[String]) -> Option<Fix> {
    let hash: HashMap<&str, &str> = fields
        .chunks_exact(2)
        .map(|pair| (pair[0].as_str(), pair[1].as_str()))
        .collect();
    let nearest_stop = match hash.get("nearestStop") {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => UNKNOWN_STOP.to_string(),
    };
    Some(Fix {
        jeep_id: hash.get("jeepId").map_or(jeep_id, |id| *id).to_string(),
        latitude: hash.get("latitude")?.parse().ok()?,
        longitude: hash.get("longitude")?.parse().ok()?,
        timestamp: hash.get("timestamp")?.parse::<f64>().ok()? as i64,
        nearest_stop,
    })
}
