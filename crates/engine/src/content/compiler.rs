use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use roxmltree::{Document, Node};
use tracing::info;

use crate::grid::Cell;
use crate::world::{ActorKind, FollowAxis};

use super::database::{DefDatabase, StageDefId};
use super::types::{
    EffectKind, EffectSpec, FollowerSpawn, ItemDef, ItemType, LayoutPlacement, LayoutTile,
    PatrolRoute, PickupSpawn, StageDef, StageLayout,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceLocation {
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentErrorCode {
    ReadFile,
    XmlMalformed,
    InvalidRoot,
    UnknownDefType,
    UnknownField,
    DuplicateField,
    MissingField,
    InvalidValue,
    DuplicateDef,
    UnknownReference,
}

#[derive(Debug, Clone)]
pub struct ContentCompileError {
    pub code: ContentErrorCode,
    pub message: String,
    pub file_path: PathBuf,
    pub location: Option<SourceLocation>,
}

impl fmt::Display for ContentCompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.location {
            Some(loc) => write!(
                f,
                "{:?}: {} (file={}, line={}, column={})",
                self.code,
                self.message,
                self.file_path.display(),
                loc.line,
                loc.column
            ),
            None => write!(
                f,
                "{:?}: {} (file={})",
                self.code,
                self.message,
                self.file_path.display()
            ),
        }
    }
}

impl std::error::Error for ContentCompileError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReferenceKind {
    Item,
    Stage,
}

#[derive(Debug, Clone)]
struct PendingReference {
    kind: ReferenceKind,
    name: String,
    file_path: PathBuf,
    location: Option<SourceLocation>,
}

#[derive(Debug, Default)]
struct PendingDefs {
    items: Vec<ItemDef>,
    stages: Vec<StageDef>,
    item_names: HashSet<String>,
    stage_names: HashSet<String>,
    references: Vec<PendingReference>,
    campaign: Option<Vec<PendingReference>>,
}

/// Compiles every `*.xml` under `content_dir`, in sorted relative-path order.
pub fn compile_def_database(content_dir: &Path) -> Result<DefDatabase, ContentCompileError> {
    let xml_files = collect_xml_files_sorted(content_dir)
        .map_err(|error| read_error(error.path, error.source))?;

    let mut pending = PendingDefs::default();
    for xml_file in &xml_files {
        let raw = fs::read_to_string(xml_file)
            .map_err(|source| read_error(xml_file.clone(), source))?;
        parse_defs_document(xml_file, &raw, &mut pending)?;
    }

    let database = finish(pending)?;
    info!(
        files = xml_files.len(),
        items = database.item_defs().len(),
        stages = database.stage_defs().len(),
        campaign_len = database.campaign_len(),
        "content_compiled"
    );
    Ok(database)
}

/// Compiles a single in-memory document. `file_label` only feeds error reports.
pub fn compile_defs_from_str(
    file_label: &str,
    raw: &str,
) -> Result<DefDatabase, ContentCompileError> {
    let mut pending = PendingDefs::default();
    parse_defs_document(Path::new(file_label), raw, &mut pending)?;
    finish(pending)
}

fn finish(pending: PendingDefs) -> Result<DefDatabase, ContentCompileError> {
    for reference in &pending.references {
        let known = match reference.kind {
            ReferenceKind::Item => pending.item_names.contains(&reference.name),
            ReferenceKind::Stage => pending.stage_names.contains(&reference.name),
        };
        if !known {
            return Err(unknown_reference(reference));
        }
    }

    let campaign = match &pending.campaign {
        Some(entries) => {
            let mut ids = Vec::with_capacity(entries.len());
            for entry in entries {
                let index = pending
                    .stages
                    .iter()
                    .position(|stage| stage.def_name == entry.name)
                    .ok_or_else(|| unknown_reference(entry))?;
                ids.push(StageDefId(index as u32));
            }
            ids
        }
        None => (0..pending.stages.len())
            .map(|index| StageDefId(index as u32))
            .collect(),
    };

    Ok(DefDatabase::from_defs(
        pending.items,
        pending.stages,
        campaign,
    ))
}

fn unknown_reference(reference: &PendingReference) -> ContentCompileError {
    let kind = match reference.kind {
        ReferenceKind::Item => "ItemDef",
        ReferenceKind::Stage => "StageDef",
    };
    ContentCompileError {
        code: ContentErrorCode::UnknownReference,
        message: format!("reference to unknown {kind} '{}'", reference.name),
        file_path: reference.file_path.clone(),
        location: reference.location,
    }
}

struct DocContext<'a, 'input> {
    file_path: &'a Path,
    doc: &'a Document<'input>,
}

impl DocContext<'_, '_> {
    fn location_of(&self, node: Node<'_, '_>) -> Option<SourceLocation> {
        let pos = self.doc.text_pos_at(node.range().start);
        Some(SourceLocation {
            line: pos.row as usize,
            column: pos.col as usize,
        })
    }

    fn error_at(
        &self,
        code: ContentErrorCode,
        message: String,
        node: Node<'_, '_>,
    ) -> ContentCompileError {
        ContentCompileError {
            code,
            message,
            file_path: self.file_path.to_path_buf(),
            location: self.location_of(node),
        }
    }

    fn reference(&self, kind: ReferenceKind, name: &str, node: Node<'_, '_>) -> PendingReference {
        PendingReference {
            kind,
            name: name.to_string(),
            file_path: self.file_path.to_path_buf(),
            location: self.location_of(node),
        }
    }

    fn ensure_unique_field(
        &self,
        seen: &mut HashSet<String>,
        field: Node<'_, '_>,
        def_type: &str,
    ) -> Result<(), ContentCompileError> {
        let field_name = field.tag_name().name();
        if !seen.insert(field_name.to_string()) {
            return Err(self.error_at(
                ContentErrorCode::DuplicateField,
                format!("duplicate field <{field_name}> in <{def_type}>"),
                field,
            ));
        }
        Ok(())
    }

    fn unknown_field(&self, field: Node<'_, '_>, parent: &str) -> ContentCompileError {
        self.error_at(
            ContentErrorCode::UnknownField,
            format!("unknown field <{}> in <{parent}>", field.tag_name().name()),
            field,
        )
    }

    fn require<T>(
        &self,
        value: Option<T>,
        field_name: &str,
        def_type: &str,
        node: Node<'_, '_>,
    ) -> Result<T, ContentCompileError> {
        value.ok_or_else(|| {
            self.error_at(
                ContentErrorCode::MissingField,
                format!("missing required field <{field_name}> in <{def_type}>"),
                node,
            )
        })
    }

    fn required_text(
        &self,
        node: Node<'_, '_>,
        field_name: &str,
    ) -> Result<String, ContentCompileError> {
        let value = node.text().map(str::trim).unwrap_or_default().to_string();
        if value.is_empty() {
            return Err(self.error_at(
                ContentErrorCode::MissingField,
                format!("field <{field_name}> must not be empty"),
                node,
            ));
        }
        Ok(value)
    }

    fn required_attr(
        &self,
        node: Node<'_, '_>,
        attr: &str,
    ) -> Result<String, ContentCompileError> {
        match node.attribute(attr).map(str::trim) {
            Some(value) if !value.is_empty() => Ok(value.to_string()),
            _ => Err(self.error_at(
                ContentErrorCode::MissingField,
                format!(
                    "missing required attribute '{attr}' on <{}>",
                    node.tag_name().name()
                ),
                node,
            )),
        }
    }

    fn parsed_attr<T: FromStr>(
        &self,
        node: Node<'_, '_>,
        attr: &str,
    ) -> Result<T, ContentCompileError> {
        let raw = self.required_attr(node, attr)?;
        raw.parse::<T>().map_err(|_| {
            self.error_at(
                ContentErrorCode::InvalidValue,
                format!("attribute '{attr}' has invalid value '{raw}'"),
                node,
            )
        })
    }

    fn parse_bool(&self, node: Node<'_, '_>, raw: &str) -> Result<bool, ContentCompileError> {
        match raw {
            "true" => Ok(true),
            "false" => Ok(false),
            _ => Err(self.error_at(
                ContentErrorCode::InvalidValue,
                format!("'{raw}' is not a boolean; allowed values: true, false"),
                node,
            )),
        }
    }

    fn cell_attrs(&self, node: Node<'_, '_>) -> Result<Cell, ContentCompileError> {
        Ok(Cell::new(
            self.parsed_attr::<i32>(node, "x")?,
            self.parsed_attr::<i32>(node, "y")?,
        ))
    }
}

fn parse_defs_document(
    file_path: &Path,
    raw: &str,
    pending: &mut PendingDefs,
) -> Result<(), ContentCompileError> {
    let doc = Document::parse(raw).map_err(|error| ContentCompileError {
        code: ContentErrorCode::XmlMalformed,
        message: format!("malformed XML: {error}"),
        file_path: file_path.to_path_buf(),
        location: Some(SourceLocation {
            line: error.pos().row as usize,
            column: error.pos().col as usize,
        }),
    })?;
    let cx = DocContext {
        file_path,
        doc: &doc,
    };

    let root = doc.root_element();
    if root.tag_name().name() != "Defs" {
        return Err(cx.error_at(
            ContentErrorCode::InvalidRoot,
            "root element must be <Defs>".to_string(),
            root,
        ));
    }

    for child in root.children().filter(|node| node.is_element()) {
        match child.tag_name().name() {
            "ItemDef" => {
                let def = parse_item_def(&cx, child, &mut pending.references)?;
                if !pending.item_names.insert(def.def_name.clone()) {
                    return Err(duplicate_def(&cx, child, "ItemDef", &def.def_name));
                }
                pending.items.push(def);
            }
            "StageDef" => {
                let def = parse_stage_def(&cx, child, &mut pending.references)?;
                if !pending.stage_names.insert(def.def_name.clone()) {
                    return Err(duplicate_def(&cx, child, "StageDef", &def.def_name));
                }
                pending.stages.push(def);
            }
            // Later campaign definitions replace earlier ones.
            "CampaignDef" => {
                pending.campaign = Some(parse_campaign_def(&cx, child)?);
            }
            other => {
                return Err(cx.error_at(
                    ContentErrorCode::UnknownDefType,
                    format!(
                        "unsupported def type <{other}>; expected <ItemDef>, <StageDef> or <CampaignDef>"
                    ),
                    child,
                ))
            }
        }
    }

    Ok(())
}

fn duplicate_def(
    cx: &DocContext<'_, '_>,
    node: Node<'_, '_>,
    def_type: &str,
    def_name: &str,
) -> ContentCompileError {
    cx.error_at(
        ContentErrorCode::DuplicateDef,
        format!("duplicate {def_type} '{def_name}'; each defName may be defined only once"),
        node,
    )
}

fn parse_item_def(
    cx: &DocContext<'_, '_>,
    node: Node<'_, '_>,
    references: &mut Vec<PendingReference>,
) -> Result<ItemDef, ContentCompileError> {
    let mut seen_fields = HashSet::<String>::new();
    let mut def_name: Option<String> = None;
    let mut label: Option<String> = None;
    let mut description: Option<String> = None;
    let mut icon: Option<String> = None;
    let mut item_type: Option<ItemType> = None;
    let mut effect: Option<EffectSpec> = None;

    for field in node.children().filter(|child| child.is_element()) {
        cx.ensure_unique_field(&mut seen_fields, field, "ItemDef")?;
        match field.tag_name().name() {
            "defName" => def_name = Some(cx.required_text(field, "defName")?),
            "label" => label = Some(cx.required_text(field, "label")?),
            "description" => {
                description = Some(field.text().map(str::trim).unwrap_or_default().to_string());
            }
            "icon" => icon = Some(cx.required_text(field, "icon")?),
            "itemType" => {
                let value = cx.required_text(field, "itemType")?;
                item_type = Some(match value.as_str() {
                    "Active" => ItemType::Active,
                    "Passive" => ItemType::Passive,
                    _ => {
                        return Err(cx.error_at(
                            ContentErrorCode::InvalidValue,
                            format!("invalid itemType '{value}'; allowed values: Active, Passive"),
                            field,
                        ))
                    }
                });
            }
            "effect" => effect = Some(parse_effect(cx, field, references)?),
            _ => return Err(cx.unknown_field(field, "ItemDef")),
        }
    }

    Ok(ItemDef {
        def_name: cx.require(def_name, "defName", "ItemDef", node)?,
        label: cx.require(label, "label", "ItemDef", node)?,
        description: description.unwrap_or_default(),
        icon,
        item_type: item_type.unwrap_or_default(),
        effect,
    })
}

fn parse_effect(
    cx: &DocContext<'_, '_>,
    node: Node<'_, '_>,
    references: &mut Vec<PendingReference>,
) -> Result<EffectSpec, ContentCompileError> {
    let raw_kind = cx.required_attr(node, "kind")?;
    let kind = EffectKind::parse(&raw_kind).ok_or_else(|| {
        cx.error_at(
            ContentErrorCode::InvalidValue,
            format!("unknown effect kind '{raw_kind}'"),
            node,
        )
    })?;
    let activator = match node.attribute("activator").map(str::trim) {
        Some(name) if !name.is_empty() => {
            references.push(cx.reference(ReferenceKind::Item, name, node));
            Some(name.to_string())
        }
        _ => None,
    };
    if kind == EffectKind::PlaceEchoDoll && activator.is_none() {
        return Err(cx.error_at(
            ContentErrorCode::MissingField,
            "effect PlaceEchoDoll requires an 'activator' item".to_string(),
            node,
        ));
    }
    Ok(EffectSpec { kind, activator })
}

fn parse_stage_def(
    cx: &DocContext<'_, '_>,
    node: Node<'_, '_>,
    references: &mut Vec<PendingReference>,
) -> Result<StageDef, ContentCompileError> {
    let mut seen_fields = HashSet::<String>::new();
    let mut def_name: Option<String> = None;
    let mut label: Option<String> = None;
    let mut story: Option<bool> = None;
    let mut layout: Option<StageLayout> = None;
    let mut pickups_node: Option<Node<'_, '_>> = None;
    let mut followers_node: Option<Node<'_, '_>> = None;
    let mut patrols_node: Option<Node<'_, '_>> = None;

    for field in node.children().filter(|child| child.is_element()) {
        cx.ensure_unique_field(&mut seen_fields, field, "StageDef")?;
        match field.tag_name().name() {
            "defName" => def_name = Some(cx.required_text(field, "defName")?),
            "label" => label = Some(cx.required_text(field, "label")?),
            "story" => {
                let value = cx.required_text(field, "story")?;
                story = Some(cx.parse_bool(field, &value)?);
            }
            "layout" => layout = Some(parse_layout(cx, field)?),
            "pickups" => pickups_node = Some(field),
            "followers" => followers_node = Some(field),
            "patrols" => patrols_node = Some(field),
            _ => return Err(cx.unknown_field(field, "StageDef")),
        }
    }

    let def_name = cx.require(def_name, "defName", "StageDef", node)?;
    let label = cx.require(label, "label", "StageDef", node)?;
    let layout = cx.require(layout, "layout", "StageDef", node)?;

    let mut pickups = Vec::new();
    for entry in list_entries(cx, pickups_node, "pickup")? {
        let cell = walkable_cell(cx, &layout, entry)?;
        let item = cx.required_attr(entry, "item")?;
        references.push(cx.reference(ReferenceKind::Item, &item, entry));
        pickups.push(PickupSpawn { cell, item });
    }

    let mut followers = Vec::new();
    for entry in list_entries(cx, followers_node, "follower")? {
        let cell = walkable_cell(cx, &layout, entry)?;
        let axis = match entry.attribute("axis").map(str::trim) {
            None | Some("Both") => FollowAxis::Both,
            Some("X") => FollowAxis::X,
            Some("Y") => FollowAxis::Y,
            Some(other) => {
                return Err(cx.error_at(
                    ContentErrorCode::InvalidValue,
                    format!("invalid axis '{other}'; allowed values: X, Y, Both"),
                    entry,
                ))
            }
        };
        let ignore_ability = match entry.attribute("ignoreAbility") {
            Some(raw) => cx.parse_bool(entry, raw.trim())?,
            None => false,
        };
        followers.push(FollowerSpawn {
            cell,
            axis,
            ignore_ability,
        });
    }

    let mut patrols = Vec::new();
    for entry in list_entries(cx, patrols_node, "patrol")? {
        let speed = cx.parsed_attr::<f32>(entry, "speed")?;
        if !speed.is_finite() || speed <= 0.0 {
            return Err(cx.error_at(
                ContentErrorCode::InvalidValue,
                "patrol speed must be finite and > 0".to_string(),
                entry,
            ));
        }
        let mut points = Vec::new();
        for point in entry.children().filter(|child| child.is_element()) {
            if point.tag_name().name() != "point" {
                return Err(cx.unknown_field(point, "patrol"));
            }
            points.push(walkable_cell(cx, &layout, point)?);
        }
        if points.is_empty() {
            return Err(cx.error_at(
                ContentErrorCode::MissingField,
                "patrol must contain at least one <point>".to_string(),
                entry,
            ));
        }
        patrols.push(PatrolRoute { speed, points });
    }

    Ok(StageDef {
        def_name,
        label,
        story: story.unwrap_or(false),
        layout,
        pickups,
        followers,
        patrols,
    })
}

fn list_entries<'a, 'input>(
    cx: &DocContext<'_, '_>,
    list: Option<Node<'a, 'input>>,
    entry_name: &str,
) -> Result<Vec<Node<'a, 'input>>, ContentCompileError> {
    let Some(list) = list else {
        return Ok(Vec::new());
    };
    let mut entries = Vec::new();
    for entry in list.children().filter(|child| child.is_element()) {
        if entry.tag_name().name() != entry_name {
            return Err(cx.unknown_field(entry, list.tag_name().name()));
        }
        entries.push(entry);
    }
    Ok(entries)
}

fn walkable_cell(
    cx: &DocContext<'_, '_>,
    layout: &StageLayout,
    node: Node<'_, '_>,
) -> Result<Cell, ContentCompileError> {
    let cell = cx.cell_attrs(node)?;
    if !layout.is_walkable(cell) {
        return Err(cx.error_at(
            ContentErrorCode::InvalidValue,
            format!("cell ({}, {}) is not a floor tile", cell.x, cell.y),
            node,
        ));
    }
    Ok(cell)
}

fn glyph_tile(glyph: char) -> Option<(LayoutTile, Option<ActorKind>)> {
    let placed = |kind| Some((LayoutTile::Floor, Some(kind)));
    match glyph {
        ' ' => Some((LayoutTile::Void, None)),
        '.' | 'P' => Some((LayoutTile::Floor, None)),
        '#' => Some((LayoutTile::Wall, None)),
        'B' => placed(ActorKind::Boulder),
        'K' => placed(ActorKind::Key),
        'G' => placed(ActorKind::Gateway),
        'L' => placed(ActorKind::Lava),
        'M' => placed(ActorKind::PinkLava),
        'C' => placed(ActorKind::InventoryClear),
        'D' => placed(ActorKind::Door),
        '_' => placed(ActorKind::PressurePlate),
        _ => None,
    }
}

fn parse_layout(
    cx: &DocContext<'_, '_>,
    node: Node<'_, '_>,
) -> Result<StageLayout, ContentCompileError> {
    let mut rows = Vec::new();
    for row in node.children().filter(|child| child.is_element()) {
        if row.tag_name().name() != "row" {
            return Err(cx.unknown_field(row, "layout"));
        }
        rows.push((row, row.text().unwrap_or_default().chars().collect::<Vec<_>>()));
    }
    if rows.is_empty() {
        return Err(cx.error_at(
            ContentErrorCode::MissingField,
            "layout must contain at least one <row>".to_string(),
            node,
        ));
    }

    let height = rows.len();
    let width = rows.iter().map(|(_, glyphs)| glyphs.len()).max().unwrap_or(0);
    if width == 0 {
        return Err(cx.error_at(
            ContentErrorCode::InvalidValue,
            "layout rows must not all be empty".to_string(),
            node,
        ));
    }

    let mut tiles = vec![LayoutTile::Void; width * height];
    let mut placements = Vec::new();
    let mut player_spawn: Option<Cell> = None;
    for (row_index, (row, glyphs)) in rows.iter().enumerate() {
        let y = height - 1 - row_index;
        for (x, glyph) in glyphs.iter().enumerate() {
            let (tile, kind) = glyph_tile(*glyph).ok_or_else(|| {
                cx.error_at(
                    ContentErrorCode::InvalidValue,
                    format!("unknown layout glyph '{glyph}'"),
                    *row,
                )
            })?;
            let cell = Cell::new(x as i32, y as i32);
            tiles[y * width + x] = tile;
            if *glyph == 'P' {
                if player_spawn.is_some() {
                    return Err(cx.error_at(
                        ContentErrorCode::InvalidValue,
                        "layout must contain exactly one 'P'".to_string(),
                        *row,
                    ));
                }
                player_spawn = Some(cell);
            }
            if let Some(kind) = kind {
                placements.push(LayoutPlacement { kind, cell });
            }
        }
    }

    let player_spawn = player_spawn.ok_or_else(|| {
        cx.error_at(
            ContentErrorCode::MissingField,
            "layout must contain exactly one 'P'".to_string(),
            node,
        )
    })?;

    Ok(StageLayout {
        width: width as u32,
        height: height as u32,
        tiles,
        player_spawn,
        placements,
    })
}

fn parse_campaign_def(
    cx: &DocContext<'_, '_>,
    node: Node<'_, '_>,
) -> Result<Vec<PendingReference>, ContentCompileError> {
    let mut stages = Vec::new();
    for entry in node.children().filter(|child| child.is_element()) {
        if entry.tag_name().name() != "stage" {
            return Err(cx.unknown_field(entry, "CampaignDef"));
        }
        let name = cx.required_text(entry, "stage")?;
        stages.push(cx.reference(ReferenceKind::Stage, &name, entry));
    }
    Ok(stages)
}

struct ReadError {
    path: PathBuf,
    source: std::io::Error,
}

fn collect_xml_files_sorted(root: &Path) -> Result<Vec<PathBuf>, ReadError> {
    let mut files = Vec::<PathBuf>::new();
    collect_recursive(root, &mut files)?;
    files.sort_by_cached_key(|path| normalize_rel_path(path.strip_prefix(root).unwrap_or(path)));
    Ok(files)
}

fn collect_recursive(current: &Path, files: &mut Vec<PathBuf>) -> Result<(), ReadError> {
    let entries = fs::read_dir(current).map_err(|source| ReadError {
        path: current.to_path_buf(),
        source,
    })?;
    for entry in entries {
        let entry = entry.map_err(|source| ReadError {
            path: current.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if path.is_dir() {
            collect_recursive(&path, files)?;
        } else if path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("xml"))
        {
            files.push(path);
        }
    }
    Ok(())
}

fn normalize_rel_path(path: &Path) -> String {
    path.components()
        .map(|component| component.as_os_str().to_string_lossy().to_string())
        .collect::<Vec<_>>()
        .join("/")
}

fn read_error(path: PathBuf, source: std::io::Error) -> ContentCompileError {
    ContentCompileError {
        code: ContentErrorCode::ReadFile,
        message: format!("failed to read content: {source}"),
        file_path: path,
        location: None,
    }
}
