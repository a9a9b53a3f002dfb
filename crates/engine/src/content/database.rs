use std::collections::HashMap;

use super::types::{ItemDef, StageDef};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ItemDefId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StageDefId(pub u32);

#[derive(Debug, Default, Clone)]
pub struct DefDatabase {
    item_defs: Vec<ItemDef>,
    item_ids_by_name: HashMap<String, ItemDefId>,
    stage_defs: Vec<StageDef>,
    stage_ids_by_name: HashMap<String, StageDefId>,
    campaign: Vec<StageDefId>,
}

impl DefDatabase {
    pub(crate) fn from_defs(
        item_defs: Vec<ItemDef>,
        stage_defs: Vec<StageDef>,
        campaign: Vec<StageDefId>,
    ) -> Self {
        let item_ids_by_name = item_defs
            .iter()
            .enumerate()
            .map(|(idx, def)| (def.def_name.clone(), ItemDefId(idx as u32)))
            .collect();
        let stage_ids_by_name = stage_defs
            .iter()
            .enumerate()
            .map(|(idx, def)| (def.def_name.clone(), StageDefId(idx as u32)))
            .collect();
        Self {
            item_defs,
            item_ids_by_name,
            stage_defs,
            stage_ids_by_name,
            campaign,
        }
    }

    pub fn item_def_id_by_name(&self, name: &str) -> Option<ItemDefId> {
        self.item_ids_by_name.get(name).copied()
    }

    pub fn item_def(&self, id: ItemDefId) -> Option<&ItemDef> {
        self.item_defs.get(id.0 as usize)
    }

    pub fn item_def_by_name(&self, name: &str) -> Option<&ItemDef> {
        self.item_def_id_by_name(name)
            .and_then(|id| self.item_def(id))
    }

    pub fn item_defs(&self) -> &[ItemDef] {
        &self.item_defs
    }

    pub fn stage_def_id_by_name(&self, name: &str) -> Option<StageDefId> {
        self.stage_ids_by_name.get(name).copied()
    }

    pub fn stage_def(&self, id: StageDefId) -> Option<&StageDef> {
        self.stage_defs.get(id.0 as usize)
    }

    pub fn stage_defs(&self) -> &[StageDef] {
        &self.stage_defs
    }

    /// Stages in play order.
    pub fn campaign(&self) -> impl Iterator<Item = &StageDef> + '_ {
        self.campaign.iter().filter_map(|id| self.stage_def(*id))
    }

    pub fn campaign_len(&self) -> usize {
        self.campaign.len()
    }
}
