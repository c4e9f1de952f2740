use std::collections::BTreeMap;

use serde::Deserialize;
use stonereach_protocol::{wire::hash_bytes_fnv1a64, AssetTypeId, CapabilityKind, UpgradeId};
use thiserror::Error;

use super::{AssetCatalog, AssetTypeInfo, UpgradeInfo};

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("yaml parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("missing referenced id: {0}")]
    MissingId(String),
    #[error("missing required `none` marker type")]
    MissingMarkerType,
    #[error("utf-8 error: {0}")]
    Utf8(#[from] std::str::Utf8Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub enum CatalogSource<'a> {
    Embedded,
    Path(String),
    Bytes {
        assets: &'a [u8],
        upgrades: &'a [u8],
    },
}

#[derive(Debug, Deserialize)]
struct RawAssetType {
    name: String,
    hit_points: i32,
    #[serde(default)]
    armor: i32,
    #[serde(default)]
    sight: i32,
    #[serde(default)]
    construction_sight: i32,
    #[serde(default = "default_size")]
    size: i32,
    #[serde(default)]
    speed: i32,
    #[serde(default)]
    gold_cost: i32,
    #[serde(default)]
    lumber_cost: i32,
    #[serde(default)]
    stone_cost: i32,
    #[serde(default)]
    food_consumption: i32,
    #[serde(default)]
    food_production: i32,
    #[serde(default)]
    build_time: i32,
    #[serde(default)]
    attack_steps: i32,
    #[serde(default)]
    reload_steps: i32,
    #[serde(default)]
    basic_damage: i32,
    #[serde(default)]
    piercing_damage: i32,
    #[serde(default)]
    range: i32,
    #[serde(default)]
    capabilities: Vec<CapabilityKind>,
    #[serde(default)]
    asset_requirements: Vec<String>,
}

fn default_size() -> i32 {
    1
}

#[derive(Debug, Deserialize)]
struct RawUpgrade {
    name: String,
    #[serde(default)]
    armor: i32,
    #[serde(default)]
    sight: i32,
    #[serde(default)]
    speed: i32,
    #[serde(default)]
    basic_damage: i32,
    #[serde(default)]
    piercing_damage: i32,
    #[serde(default)]
    range: i32,
    #[serde(default)]
    gold_cost: i32,
    #[serde(default)]
    lumber_cost: i32,
    #[serde(default)]
    stone_cost: i32,
    #[serde(default)]
    research_time: i32,
    #[serde(default)]
    affected_assets: Vec<String>,
}

pub fn load_catalog(source: CatalogSource<'_>) -> Result<AssetCatalog, CatalogError> {
    let (assets_yaml, upgrades_yaml) = match source {
        CatalogSource::Embedded => (
            include_str!("../../data/base/assets.yaml").to_owned(),
            include_str!("../../data/base/upgrades.yaml").to_owned(),
        ),
        CatalogSource::Path(path) => (
            std::fs::read_to_string(format!("{path}/assets.yaml"))?,
            std::fs::read_to_string(format!("{path}/upgrades.yaml"))?,
        ),
        CatalogSource::Bytes { assets, upgrades } => (
            std::str::from_utf8(assets)?.to_owned(),
            std::str::from_utf8(upgrades)?.to_owned(),
        ),
    };

    let raw_assets: BTreeMap<String, RawAssetType> = serde_yaml::from_str(&assets_yaml)?;
    let raw_upgrades: BTreeMap<String, RawUpgrade> = serde_yaml::from_str(&upgrades_yaml)?;

    // BTreeMap keys give a stable alphabetical id assignment.
    let asset_type_ids = raw_assets
        .keys()
        .enumerate()
        .map(|(i, k)| (k.clone(), AssetTypeId::new(i as u16)))
        .collect::<std::collections::HashMap<_, _>>();
    let upgrade_ids = raw_upgrades
        .keys()
        .enumerate()
        .map(|(i, k)| (k.clone(), UpgradeId::new(i as u16)))
        .collect::<std::collections::HashMap<_, _>>();

    let resolve = |names: &[String]| -> Result<Vec<AssetTypeId>, CatalogError> {
        names
            .iter()
            .map(|n| {
                asset_type_ids
                    .get(n)
                    .copied()
                    .ok_or_else(|| CatalogError::MissingId(n.clone()))
            })
            .collect()
    };

    let asset_types = raw_assets
        .values()
        .map(|raw| {
            Ok(AssetTypeInfo {
                name: raw.name.clone(),
                hit_points: raw.hit_points,
                armor: raw.armor,
                sight: raw.sight,
                construction_sight: if raw.construction_sight > 0 {
                    raw.construction_sight
                } else {
                    raw.sight
                },
                size: raw.size.max(1),
                speed: raw.speed,
                gold_cost: raw.gold_cost,
                lumber_cost: raw.lumber_cost,
                stone_cost: raw.stone_cost,
                food_consumption: raw.food_consumption,
                food_production: raw.food_production,
                build_time: raw.build_time,
                attack_steps: raw.attack_steps,
                reload_steps: raw.reload_steps,
                basic_damage: raw.basic_damage,
                piercing_damage: raw.piercing_damage,
                range: raw.range,
                capabilities: raw.capabilities.clone(),
                asset_requirements: resolve(&raw.asset_requirements)?,
            })
        })
        .collect::<Result<Vec<_>, CatalogError>>()?;

    let upgrades = raw_upgrades
        .values()
        .map(|raw| {
            Ok(UpgradeInfo {
                name: raw.name.clone(),
                armor: raw.armor,
                sight: raw.sight,
                speed: raw.speed,
                basic_damage: raw.basic_damage,
                piercing_damage: raw.piercing_damage,
                range: raw.range,
                gold_cost: raw.gold_cost,
                lumber_cost: raw.lumber_cost,
                stone_cost: raw.stone_cost,
                research_time: raw.research_time,
                affected_assets: resolve(&raw.affected_assets)?,
            })
        })
        .collect::<Result<Vec<_>, CatalogError>>()?;

    let marker_type = asset_type_ids
        .get("none")
        .copied()
        .ok_or(CatalogError::MissingMarkerType)?;

    let mut hash = hash_bytes_fnv1a64(assets_yaml.as_bytes());
    hash ^= hash_bytes_fnv1a64(upgrades_yaml.as_bytes()).rotate_left(1);

    tracing::debug!(
        asset_types = asset_types.len(),
        upgrades = upgrades.len(),
        hash,
        "catalog loaded"
    );

    Ok(AssetCatalog {
        asset_types,
        upgrades,
        asset_type_ids,
        upgrade_ids,
        marker_type,
        hash,
    })
}
