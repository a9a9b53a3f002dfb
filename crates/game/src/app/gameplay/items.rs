use std::collections::HashMap;
use std::fmt;
use std::ops::Deref;
use std::rc::Rc;

use engine::content::{EffectKind, EffectSpec, ItemType};
use engine::DefDatabase;
use thiserror::Error;

use super::effects::ItemEffect;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CatalogError {
    #[error("unknown item '{0}'")]
    UnknownItem(String),
    #[error("item '{0}' places an echo doll but names no activator item")]
    MissingActivator(String),
    #[error("item '{item}' names unknown activator item '{activator}'")]
    UnknownActivator { item: String, activator: String },
}

/// Immutable item definition shared by inventory slots, pickups and snapshots.
#[derive(Debug)]
pub struct ItemData {
    pub def_name: String,
    pub label: String,
    pub description: String,
    pub icon: Option<String>,
    pub item_type: ItemType,
    pub effect: Option<ItemEffect>,
}

impl ItemData {
    pub fn is_active(&self) -> bool {
        self.item_type == ItemType::Active
    }
}

/// Shared handle to an [`ItemData`]. Equality is identity, not value.
#[derive(Clone)]
pub struct ItemRef(Rc<ItemData>);

impl ItemRef {
    pub fn new(data: ItemData) -> Self {
        Self(Rc::new(data))
    }
}

impl Deref for ItemRef {
    type Target = ItemData;

    fn deref(&self) -> &ItemData {
        &self.0
    }
}

impl PartialEq for ItemRef {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for ItemRef {}

impl fmt::Debug for ItemRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ItemRef({})", self.0.def_name)
    }
}

/// Every item the content defines, resolved once at startup.
#[derive(Debug, Default)]
pub struct ItemCatalog {
    items: Vec<ItemRef>,
    by_name: HashMap<String, usize>,
}

impl ItemCatalog {
    pub fn from_defs(defs: &DefDatabase) -> Result<Self, CatalogError> {
        let mut catalog = Self::default();
        for def in defs.item_defs() {
            let effect = match &def.effect {
                Some(spec) => Some(effect_from_spec(&def.def_name, spec, defs)?),
                None => None,
            };
            let item = ItemRef::new(ItemData {
                def_name: def.def_name.clone(),
                label: def.label.clone(),
                description: def.description.clone(),
                icon: def.icon.clone(),
                item_type: def.item_type,
                effect,
            });
            catalog
                .by_name
                .insert(def.def_name.clone(), catalog.items.len());
            catalog.items.push(item);
        }
        Ok(catalog)
    }

    pub fn get(&self, def_name: &str) -> Option<ItemRef> {
        self.by_name
            .get(def_name)
            .and_then(|index| self.items.get(*index))
            .cloned()
    }

    pub fn require(&self, def_name: &str) -> Result<ItemRef, CatalogError> {
        self.get(def_name)
            .ok_or_else(|| CatalogError::UnknownItem(def_name.to_string()))
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

fn effect_from_spec(
    item: &str,
    spec: &EffectSpec,
    defs: &DefDatabase,
) -> Result<ItemEffect, CatalogError> {
    Ok(match spec.kind {
        EffectKind::WalkOnLava => ItemEffect::WalkOnLava,
        EffectKind::WalkOnPinkLava => ItemEffect::WalkOnPinkLava,
        EffectKind::Strength => ItemEffect::Strength,
        EffectKind::EnableFollowEnemies => ItemEffect::EnableFollowEnemies,
        EffectKind::PlaceTrap => ItemEffect::PlaceTrap,
        EffectKind::ActivateEchoDoll => ItemEffect::ActivateEchoDoll,
        EffectKind::PlaceEchoDoll => {
            let activator = spec
                .activator
                .clone()
                .ok_or_else(|| CatalogError::MissingActivator(item.to_string()))?;
            if defs.item_def_by_name(&activator).is_none() {
                return Err(CatalogError::UnknownActivator {
                    item: item.to_string(),
                    activator,
                });
            }
            ItemEffect::PlaceEchoDoll { activator }
        }
    })
}

#[cfg(test)]
mod tests {
    use engine::compile_defs_from_str;

    use super::*;

    const DEFS: &str = r#"<Defs>
        <ItemDef>
            <defName>boots</defName>
            <label>Lava Boots</label>
            <effect kind="WalkOnLava"/>
        </ItemDef>
        <ItemDef>
            <defName>bell</defName>
            <label>Doll Bell</label>
            <itemType>Active</itemType>
            <effect kind="ActivateEchoDoll"/>
        </ItemDef>
        <ItemDef>
            <defName>doll</defName>
            <label>Echo Doll</label>
            <itemType>Active</itemType>
            <effect kind="PlaceEchoDoll" activator="bell"/>
        </ItemDef>
        <ItemDef>
            <defName>pebble</defName>
            <label>Pebble</label>
        </ItemDef>
    </Defs>"#;

    fn catalog() -> ItemCatalog {
        let defs = compile_defs_from_str("items.xml", DEFS).expect("defs");
        ItemCatalog::from_defs(&defs).expect("catalog")
    }

    #[test]
    fn catalog_resolves_effects_from_defs() {
        let catalog = catalog();
        assert_eq!(catalog.len(), 4);
        assert_eq!(
            catalog.require("boots").expect("boots").effect,
            Some(ItemEffect::WalkOnLava)
        );
        assert_eq!(
            catalog.require("doll").expect("doll").effect,
            Some(ItemEffect::PlaceEchoDoll {
                activator: "bell".to_string()
            })
        );
        assert!(catalog.require("pebble").expect("pebble").effect.is_none());
        assert_eq!(
            catalog.require("ghost"),
            Err(CatalogError::UnknownItem("ghost".to_string()))
        );
    }

    #[test]
    fn item_refs_compare_by_identity() {
        let catalog = catalog();
        let first = catalog.require("boots").expect("boots");
        let again = catalog.require("boots").expect("boots");
        assert_eq!(first, again);

        let lookalike = ItemRef::new(ItemData {
            def_name: "boots".to_string(),
            label: "Lava Boots".to_string(),
            description: String::new(),
            icon: None,
            item_type: ItemType::Passive,
            effect: Some(ItemEffect::WalkOnLava),
        });
        assert_ne!(first, lookalike);
    }

    #[test]
    fn active_flag_follows_item_type() {
        let catalog = catalog();
        assert!(catalog.require("bell").expect("bell").is_active());
        assert!(!catalog.require("boots").expect("boots").is_active());
    }
}
