mod loader;

use std::collections::HashMap;

use stonereach_protocol::{AssetTypeId, CapabilityKind, DataId, UpgradeId};

pub use loader::{load_catalog, CatalogError, CatalogSource};

/// One row of the per-type stat table. Read-only after catalog load; the
/// simulation never mutates type stats, only per-player upgrade bits.
#[derive(Clone, Debug)]
pub struct AssetTypeInfo {
    pub name: String,
    pub hit_points: i32,
    pub armor: i32,
    pub sight: i32,
    /// Sight radius while still under construction.
    pub construction_sight: i32,
    /// Footprint is size x size tiles.
    pub size: i32,
    /// Zero for buildings; mobile assets have positive speed in pixels per
    /// cycle.
    pub speed: i32,
    pub gold_cost: i32,
    pub lumber_cost: i32,
    pub stone_cost: i32,
    pub food_consumption: i32,
    pub food_production: i32,
    /// Build/train time in seconds of game time.
    pub build_time: i32,
    pub attack_steps: i32,
    pub reload_steps: i32,
    pub basic_damage: i32,
    pub piercing_damage: i32,
    pub range: i32,
    pub capabilities: Vec<CapabilityKind>,
    /// Building prerequisites for training/constructing this type.
    pub asset_requirements: Vec<AssetTypeId>,
}

impl AssetTypeInfo {
    #[inline]
    pub fn is_building(&self) -> bool {
        self.speed == 0
    }

    pub fn has_capability(&self, kind: CapabilityKind) -> bool {
        self.capabilities.contains(&kind)
    }
}

/// A researched upgrade's stat deltas and the asset types it applies to.
#[derive(Clone, Debug)]
pub struct UpgradeInfo {
    pub name: String,
    pub armor: i32,
    pub sight: i32,
    pub speed: i32,
    pub basic_damage: i32,
    pub piercing_damage: i32,
    pub range: i32,
    pub gold_cost: i32,
    pub lumber_cost: i32,
    pub stone_cost: i32,
    /// Research time in seconds of game time.
    pub research_time: i32,
    pub affected_assets: Vec<AssetTypeId>,
}

/// Compiled stat tables: dense vectors indexed by runtime id, with
/// name→id maps for the few places that start from a data id.
#[derive(Clone, Debug)]
pub struct AssetCatalog {
    pub asset_types: Vec<AssetTypeInfo>,
    pub upgrades: Vec<UpgradeInfo>,
    pub asset_type_ids: HashMap<DataId, AssetTypeId>,
    pub upgrade_ids: HashMap<DataId, UpgradeId>,
    /// The `none` pseudo-type used for markers, projectiles, and corpses.
    pub marker_type: AssetTypeId,
    /// FNV-1a hash of the catalog source text; replays embed this.
    pub hash: u64,
}

impl AssetCatalog {
    pub fn asset_type(&self, id: AssetTypeId) -> &AssetTypeInfo {
        &self.asset_types[id.raw as usize]
    }

    pub fn upgrade(&self, id: UpgradeId) -> &UpgradeInfo {
        &self.upgrades[id.raw as usize]
    }

    pub fn asset_type_id(&self, data_id: &str) -> Option<AssetTypeId> {
        self.asset_type_ids.get(data_id).copied()
    }

    pub fn upgrade_id(&self, data_id: &str) -> Option<UpgradeId> {
        self.upgrade_ids.get(data_id).copied()
    }

    /// Largest sight radius in the table; sizes the visibility map's
    /// padding border.
    pub fn max_sight(&self) -> i32 {
        self.asset_types
            .iter()
            .map(|t| t.sight.max(t.construction_sight))
            .max()
            .unwrap_or(0)
    }

    fn upgrade_sum(
        &self,
        type_id: AssetTypeId,
        owned: &[bool],
        stat: impl Fn(&UpgradeInfo) -> i32,
    ) -> i32 {
        self.upgrades
            .iter()
            .enumerate()
            .filter(|(index, info)| {
                owned.get(*index).copied().unwrap_or(false)
                    && info.affected_assets.contains(&type_id)
            })
            .map(|(_, info)| stat(info))
            .sum()
    }

    pub fn effective_armor(&self, type_id: AssetTypeId, owned: &[bool]) -> i32 {
        self.asset_type(type_id).armor + self.upgrade_sum(type_id, owned, |u| u.armor)
    }

    pub fn effective_sight(&self, type_id: AssetTypeId, owned: &[bool]) -> i32 {
        self.asset_type(type_id).sight + self.upgrade_sum(type_id, owned, |u| u.sight)
    }

    pub fn effective_speed(&self, type_id: AssetTypeId, owned: &[bool]) -> i32 {
        self.asset_type(type_id).speed + self.upgrade_sum(type_id, owned, |u| u.speed)
    }

    pub fn effective_basic_damage(&self, type_id: AssetTypeId, owned: &[bool]) -> i32 {
        self.asset_type(type_id).basic_damage + self.upgrade_sum(type_id, owned, |u| u.basic_damage)
    }

    pub fn effective_piercing_damage(&self, type_id: AssetTypeId, owned: &[bool]) -> i32 {
        self.asset_type(type_id).piercing_damage
            + self.upgrade_sum(type_id, owned, |u| u.piercing_damage)
    }

    pub fn effective_range(&self, type_id: AssetTypeId, owned: &[bool]) -> i32 {
        self.asset_type(type_id).range + self.upgrade_sum(type_id, owned, |u| u.range)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedded_catalog_has_expected_types() {
        let catalog = load_catalog(CatalogSource::Embedded).expect("catalog load");
        for name in [
            "none",
            "peasant",
            "footman",
            "archer",
            "ranger",
            "gold_mine",
            "town_hall",
            "keep",
            "castle",
            "farm",
            "barracks",
            "lumber_mill",
            "blacksmith",
            "scout_tower",
        ] {
            assert!(catalog.asset_type_id(name).is_some(), "missing {name}");
        }
        assert_eq!(catalog.marker_type, catalog.asset_type_id("none").unwrap());
    }

    #[test]
    fn upgrades_modify_only_affected_types() {
        let catalog = load_catalog(CatalogSource::Embedded).expect("catalog load");
        let footman = catalog.asset_type_id("footman").unwrap();
        let peasant = catalog.asset_type_id("peasant").unwrap();
        let weapon = catalog.upgrade_id("weapon_upgrade2").unwrap();

        let mut owned = vec![false; catalog.upgrades.len()];
        owned[weapon.raw as usize] = true;

        let base = catalog.asset_type(footman).basic_damage;
        assert!(catalog.effective_basic_damage(footman, &owned) > base);
        assert_eq!(
            catalog.effective_basic_damage(peasant, &owned),
            catalog.asset_type(peasant).basic_damage
        );
    }

    #[test]
    fn catalog_hash_is_stable_across_loads() {
        let a = load_catalog(CatalogSource::Embedded).expect("catalog load");
        let b = load_catalog(CatalogSource::Embedded).expect("catalog load");
        assert_eq!(a.hash, b.hash);
    }
}
