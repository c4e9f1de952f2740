use rmp_serde::{decode, encode};
use thiserror::Error;

use crate::{Command, GameEvent, ReplayFile, StateDigest};

#[derive(Debug, Error)]
pub enum WireError {
    #[error("encode error: {0}")]
    Encode(#[from] encode::Error),
    #[error("decode error: {0}")]
    Decode(#[from] decode::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub fn serialize_command(cmd: &Command) -> Result<Vec<u8>, WireError> {
    Ok(encode::to_vec(cmd)?)
}

pub fn deserialize_command(bytes: &[u8]) -> Result<Command, WireError> {
    Ok(decode::from_slice(bytes)?)
}

pub fn serialize_events(events: &[GameEvent]) -> Result<Vec<u8>, WireError> {
    Ok(encode::to_vec(events)?)
}

pub fn deserialize_events(bytes: &[u8]) -> Result<Vec<GameEvent>, WireError> {
    Ok(decode::from_slice(bytes)?)
}

pub fn serialize_replay(replay: &ReplayFile) -> Result<Vec<u8>, WireError> {
    Ok(encode::to_vec(replay)?)
}

pub fn deserialize_replay(bytes: &[u8]) -> Result<ReplayFile, WireError> {
    Ok(decode::from_slice(bytes)?)
}

pub fn serialize_digest(digest: &StateDigest) -> Result<Vec<u8>, WireError> {
    Ok(encode::to_vec(digest)?)
}

pub fn deserialize_digest(bytes: &[u8]) -> Result<StateDigest, WireError> {
    Ok(decode::from_slice(bytes)?)
}

/// Deterministic digest hash for desync detection and replay verification.
///
/// Hashes the MessagePack-serialized digest using FNV-1a 64-bit.
pub fn digest_hash(digest: &StateDigest) -> Result<u64, WireError> {
    let bytes = serialize_digest(digest)?;
    Ok(hash_bytes_fnv1a64(&bytes))
}

/// Deterministic, stable 64-bit hash for raw bytes (FNV-1a).
pub fn hash_bytes_fnv1a64(bytes: &[u8]) -> u64 {
    const OFFSET_BASIS: u64 = 0xcbf29ce484222325;
    const PRIME: u64 = 0x100000001b3;

    let mut hash = OFFSET_BASIS;
    for &byte in bytes {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(PRIME);
    }
    hash
}

pub fn serialize_command_json(cmd: &Command) -> Result<String, WireError> {
    Ok(serde_json::to_string(cmd)?)
}

pub fn deserialize_command_json(json: &str) -> Result<Command, WireError> {
    Ok(serde_json::from_str(json)?)
}

pub fn serialize_events_json(events: &[GameEvent]) -> Result<String, WireError> {
    Ok(serde_json::to_string(events)?)
}

pub fn deserialize_events_json(json: &str) -> Result<Vec<GameEvent>, WireError> {
    Ok(serde_json::from_str(json)?)
}

pub fn serialize_replay_json(replay: &ReplayFile) -> Result<String, WireError> {
    Ok(serde_json::to_string(replay)?)
}

pub fn deserialize_replay_json(json: &str) -> Result<ReplayFile, WireError> {
    Ok(serde_json::from_str(json)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AssetId, CapabilityKind, CommandTarget, PlayerColor, TilePos};

    #[test]
    fn command_round_trips_through_messagepack() {
        let cmd = Command::ApplyCapability {
            player: PlayerColor(1),
            actor: AssetId::new(3, 0),
            capability: CapabilityKind::BuildFarm,
            target: CommandTarget::Tile {
                tile: TilePos::new(8, 9),
            },
        };
        let bytes = serialize_command(&cmd).unwrap();
        let back = deserialize_command(&bytes).unwrap();
        match back {
            Command::ApplyCapability {
                actor, capability, ..
            } => {
                assert_eq!(actor, AssetId::new(3, 0));
                assert_eq!(capability, CapabilityKind::BuildFarm);
            }
        }
    }

    #[test]
    fn fnv_hash_is_stable() {
        assert_eq!(hash_bytes_fnv1a64(b""), 0xcbf29ce484222325);
        assert_eq!(hash_bytes_fnv1a64(b"a"), 0xaf63dc4c8601ec8c);
    }
}
