//! Typed record model and the repository seam to the flat-table world.
//!
//! The harness record store itself lives in the excluded table layer;
//! the geometry core only sees this module: strongly-typed records per
//! entity kind behind a small [`RecordStore`] interface, plus a flat
//! field-map conversion for collaborators that still speak delimited
//! text columns.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::geometry::config::SolverConfig;
use crate::geometry::types::Point;

/// Root marker: the fixed global frame (0, 0, 0°). Used both as a
/// parent instance reference and as an output-csys name meaning "the
/// parent's own frame, no extra offset".
pub const ORIGIN: &str = "origin";

/// Errors raised while converting flat field maps into typed records
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record '{name}' is missing required field '{field}'")]
    MissingField { name: String, field: String },

    #[error("record '{name}' field '{field}' has an invalid value: '{value}'")]
    InvalidField {
        name: String,
        field: String,
        value: String,
    },
}

/// Offset of an output csys from its owning instance's own frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CsysOffset {
    /// Explicit (x, y) pair
    Cartesian { x: f64, y: f64 },
    /// Polar (distance, angle-in-degrees) pair
    Polar { distance: f64, angle: f64 },
}

/// A named anchor frame that an instance exposes for children to
/// attach to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputCsys {
    #[serde(flatten)]
    pub offset: CsysOffset,
    /// Additional rotation in degrees applied to whatever attaches here
    #[serde(default)]
    pub rotation: f64,
}

impl OutputCsys {
    pub fn cartesian(x: f64, y: f64, rotation: f64) -> Self {
        Self {
            offset: CsysOffset::Cartesian { x, y },
            rotation,
        }
    }

    pub fn polar(distance: f64, angle: f64, rotation: f64) -> Self {
        Self {
            offset: CsysOffset::Polar { distance, angle },
            rotation,
        }
    }

    /// The offset as a point in the owning instance's own frame
    pub fn offset_point(&self) -> Point {
        match self.offset {
            CsysOffset::Cartesian { x, y } => Point::new(x, y),
            CsysOffset::Polar { distance, angle } => {
                let radians = angle.to_radians();
                Point::new(distance * radians.cos(), distance * radians.sin())
            }
        }
    }
}

/// Named output-csys anchors exposed by an instance
pub type CsysChildren = IndexMap<String, OutputCsys>;

/// Parent-relative placement fields shared by every record kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    /// Name of the instance this one is placed relative to, or
    /// [`ORIGIN`] for the global root
    pub parent_csys_instance: String,
    /// Output csys on the parent to attach at, or [`ORIGIN`] for the
    /// parent's own frame
    pub parent_csys_outputcsys: String,
    /// Offset in the attached frame, applied unrotated
    pub translate_x: f64,
    pub translate_y: f64,
    /// Incremental rotation in degrees added at this link
    pub rotate_csys: f64,
    /// When present, replaces the accumulated rotation at this link
    /// instead of adding to it. Segments and nodes use this: their
    /// orientation is authoritative, not inherited.
    pub absolute_rotation: Option<f64>,
}

impl Placement {
    /// Placement directly in the global root frame
    pub fn at_root() -> Self {
        Self::under(ORIGIN)
    }

    /// Placement at the named parent's own frame, with no local offset
    pub fn under(parent: impl Into<String>) -> Self {
        Self {
            parent_csys_instance: parent.into(),
            parent_csys_outputcsys: ORIGIN.to_string(),
            translate_x: 0.0,
            translate_y: 0.0,
            rotate_csys: 0.0,
            absolute_rotation: None,
        }
    }
}

/// A named point anchor in the harness layout graph.
///
/// The coordinate propagator writes solved coordinates into the
/// placement's translate fields and the averaged incident angle into
/// `absolute_rotation`; a node's parent is always the global root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub name: String,
    pub placement: Placement,
    #[serde(default)]
    pub csys_children: CsysChildren,
}

impl NodeRecord {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            placement: Placement::at_root(),
            csys_children: CsysChildren::new(),
        }
    }

    /// Solved absolute position, if the propagator has run
    pub fn position(&self) -> Point {
        Point::new(self.placement.translate_x, self.placement.translate_y)
    }

    /// Solved orientation in degrees (average incident segment angle)
    pub fn orientation(&self) -> Option<f64> {
        self.placement.absolute_rotation
    }
}

/// A routing edge between exactly two nodes.
///
/// Undirected for connectivity, but the angle is directional (the
/// direction from end A to end B) and is stored as the placement's
/// `absolute_rotation`. The parent frame is the end-A node at the
/// shared [`ORIGIN`] anchor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentRecord {
    pub name: String,
    pub node_at_end_a: String,
    pub node_at_end_b: String,
    /// Physical length, inches by convention
    pub length: f64,
    /// Nominal bundle diameter; rendering-only, ignored by the solver
    pub diameter: f64,
    pub placement: Placement,
    #[serde(default)]
    pub csys_children: CsysChildren,
}

impl SegmentRecord {
    pub fn new(
        name: impl Into<String>,
        end_a: impl Into<String>,
        end_b: impl Into<String>,
        length: f64,
        angle: f64,
    ) -> Self {
        let end_a = end_a.into();
        let mut placement = Placement::under(end_a.clone());
        placement.absolute_rotation = Some(angle);
        Self {
            name: name.into(),
            node_at_end_a: end_a,
            node_at_end_b: end_b.into(),
            length,
            diameter: 0.0,
            placement,
            csys_children: CsysChildren::new(),
        }
    }

    pub fn with_diameter(mut self, diameter: f64) -> Self {
        self.diameter = diameter;
        self
    }

    /// Orientation in degrees, direction end A to end B
    pub fn angle(&self) -> f64 {
        self.placement.absolute_rotation.unwrap_or(0.0)
    }
}

/// Any other drawable entity (connector, flagnote, backshell, ...)
/// that participates in the csys hierarchy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceRecord {
    pub name: String,
    pub item_type: String,
    pub placement: Placement,
    #[serde(default)]
    pub csys_children: CsysChildren,
}

impl InstanceRecord {
    pub fn new(name: impl Into<String>, item_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            item_type: item_type.into(),
            placement: Placement::at_root(),
            csys_children: CsysChildren::new(),
        }
    }
}

/// A record in the harness store, one per named instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Record {
    Node(NodeRecord),
    Segment(SegmentRecord),
    Instance(InstanceRecord),
}

impl Record {
    pub fn name(&self) -> &str {
        match self {
            Record::Node(n) => &n.name,
            Record::Segment(s) => &s.name,
            Record::Instance(i) => &i.name,
        }
    }

    /// The `item_type` value this record carries at the flat boundary
    pub fn item_type(&self) -> &str {
        match self {
            Record::Node(_) => "node",
            Record::Segment(_) => "segment",
            Record::Instance(i) => &i.item_type,
        }
    }

    pub fn placement(&self) -> &Placement {
        match self {
            Record::Node(n) => &n.placement,
            Record::Segment(s) => &s.placement,
            Record::Instance(i) => &i.placement,
        }
    }

    pub fn placement_mut(&mut self) -> &mut Placement {
        match self {
            Record::Node(n) => &mut n.placement,
            Record::Segment(s) => &mut s.placement,
            Record::Instance(i) => &mut i.placement,
        }
    }

    pub fn csys_children(&self) -> &CsysChildren {
        match self {
            Record::Node(n) => &n.csys_children,
            Record::Segment(s) => &s.csys_children,
            Record::Instance(i) => &i.csys_children,
        }
    }

    pub fn as_node(&self) -> Option<&NodeRecord> {
        match self {
            Record::Node(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_segment(&self) -> Option<&SegmentRecord> {
        match self {
            Record::Segment(s) => Some(s),
            _ => None,
        }
    }
}

// ============================================================================
// Flat field-map boundary
// ============================================================================

/// A single field value in the flat record representation
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Number(f64),
    Empty,
}

impl FieldValue {
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }
}

/// A flat record: ordered mapping from field name to value
pub type Fields = IndexMap<String, FieldValue>;

fn text_field<'a>(fields: &'a Fields, key: &str) -> Option<&'a str> {
    match fields.get(key) {
        Some(FieldValue::Text(s)) if !s.is_empty() => Some(s),
        _ => None,
    }
}

fn number_field(name: &str, fields: &Fields, key: &str) -> Result<Option<f64>, StoreError> {
    match fields.get(key) {
        Some(FieldValue::Number(n)) => Ok(Some(*n)),
        Some(FieldValue::Text(s)) if !s.is_empty() => {
            s.parse::<f64>()
                .map(Some)
                .map_err(|_| StoreError::InvalidField {
                    name: name.to_string(),
                    field: key.to_string(),
                    value: s.clone(),
                })
        }
        _ => Ok(None),
    }
}

fn item_type_is(value: &str, expected: &str, config: &SolverConfig) -> bool {
    if config.case_sensitive_item_types {
        value == expected
    } else {
        value.eq_ignore_ascii_case(expected)
    }
}

fn placement_from_fields(name: &str, fields: &Fields) -> Result<Placement, StoreError> {
    Ok(Placement {
        parent_csys_instance: text_field(fields, "parent_csys_instance_name")
            .unwrap_or(ORIGIN)
            .to_string(),
        parent_csys_outputcsys: text_field(fields, "parent_csys_outputcsys_name")
            .unwrap_or(ORIGIN)
            .to_string(),
        translate_x: number_field(name, fields, "translate_x")?.unwrap_or(0.0),
        translate_y: number_field(name, fields, "translate_y")?.unwrap_or(0.0),
        rotate_csys: number_field(name, fields, "rotate_csys")?.unwrap_or(0.0),
        absolute_rotation: number_field(name, fields, "absolute_rotation")?,
    })
}

fn placement_to_fields(placement: &Placement, fields: &mut Fields) {
    fields.insert(
        "parent_csys_instance_name".to_string(),
        FieldValue::text(&placement.parent_csys_instance),
    );
    fields.insert(
        "parent_csys_outputcsys_name".to_string(),
        FieldValue::text(&placement.parent_csys_outputcsys),
    );
    fields.insert(
        "translate_x".to_string(),
        FieldValue::Number(placement.translate_x),
    );
    fields.insert(
        "translate_y".to_string(),
        FieldValue::Number(placement.translate_y),
    );
    fields.insert(
        "rotate_csys".to_string(),
        FieldValue::Number(placement.rotate_csys),
    );
    fields.insert(
        "absolute_rotation".to_string(),
        match placement.absolute_rotation {
            Some(angle) => FieldValue::Number(angle),
            None => FieldValue::Empty,
        },
    );
}

fn csys_children_from_fields(name: &str, fields: &Fields) -> Result<CsysChildren, StoreError> {
    match text_field(fields, "csys_children") {
        Some(encoded) => {
            toml::from_str(encoded).map_err(|_| StoreError::InvalidField {
                name: name.to_string(),
                field: "csys_children".to_string(),
                value: encoded.to_string(),
            })
        }
        None => Ok(CsysChildren::new()),
    }
}

fn csys_children_to_fields(children: &CsysChildren, fields: &mut Fields) {
    let value = if children.is_empty() {
        FieldValue::Empty
    } else {
        // Nested anchors travel as an inline TOML table in the flat form
        match toml::to_string(children) {
            Ok(encoded) => FieldValue::Text(encoded),
            Err(_) => FieldValue::Empty,
        }
    };
    fields.insert("csys_children".to_string(), value);
}

impl Record {
    /// Build a typed record from its flat field representation.
    ///
    /// `item_type` values of "node" and "segment" (case per
    /// [`SolverConfig::case_sensitive_item_types`]) map to the
    /// dedicated kinds; anything else becomes a generic instance.
    pub fn from_fields(fields: &Fields, config: &SolverConfig) -> Result<Record, StoreError> {
        let name = text_field(fields, "instance_name")
            .ok_or_else(|| StoreError::MissingField {
                name: "<unnamed>".to_string(),
                field: "instance_name".to_string(),
            })?
            .to_string();
        let item_type = text_field(fields, "item_type").unwrap_or("");
        let placement = placement_from_fields(&name, fields)?;
        let csys_children = csys_children_from_fields(&name, fields)?;

        if item_type_is(item_type, "node", config) {
            Ok(Record::Node(NodeRecord {
                name,
                placement,
                csys_children,
            }))
        } else if item_type_is(item_type, "segment", config) {
            let end_a = text_field(fields, "node_at_end_a")
                .ok_or_else(|| StoreError::MissingField {
                    name: name.clone(),
                    field: "node_at_end_a".to_string(),
                })?
                .to_string();
            let end_b = text_field(fields, "node_at_end_b")
                .ok_or_else(|| StoreError::MissingField {
                    name: name.clone(),
                    field: "node_at_end_b".to_string(),
                })?
                .to_string();
            let length =
                number_field(&name, fields, "length")?.ok_or_else(|| StoreError::MissingField {
                    name: name.clone(),
                    field: "length".to_string(),
                })?;
            let diameter = number_field(&name, fields, "diameter")?.unwrap_or(0.0);
            Ok(Record::Segment(SegmentRecord {
                name,
                node_at_end_a: end_a,
                node_at_end_b: end_b,
                length,
                diameter,
                placement,
                csys_children,
            }))
        } else {
            Ok(Record::Instance(InstanceRecord {
                name,
                item_type: item_type.to_string(),
                placement,
                csys_children,
            }))
        }
    }

    /// Flatten this record back into its field-map representation
    pub fn to_fields(&self) -> Fields {
        let mut fields = Fields::new();
        fields.insert(
            "instance_name".to_string(),
            FieldValue::text(self.name()),
        );
        fields.insert(
            "item_type".to_string(),
            FieldValue::text(self.item_type()),
        );
        if let Record::Segment(seg) = self {
            fields.insert(
                "node_at_end_a".to_string(),
                FieldValue::text(&seg.node_at_end_a),
            );
            fields.insert(
                "node_at_end_b".to_string(),
                FieldValue::text(&seg.node_at_end_b),
            );
            fields.insert("length".to_string(), FieldValue::Number(seg.length));
            fields.insert("diameter".to_string(), FieldValue::Number(seg.diameter));
        }
        placement_to_fields(self.placement(), &mut fields);
        csys_children_to_fields(self.csys_children(), &mut fields);
        fields
    }
}

// ============================================================================
// Repository interface
// ============================================================================

/// The record store operations the geometry core needs.
///
/// Implemented elsewhere as flat delimited-text tables; [`MemoryStore`]
/// is the in-memory reference implementation used by the solve pass and
/// by tests.
pub trait RecordStore {
    /// All records, in declaration order
    fn read_all(&self) -> Vec<&Record>;

    /// Look up a record by instance name
    fn get(&self, name: &str) -> Option<&Record>;

    /// Create or replace a record keyed by its instance name
    fn upsert(&mut self, record: Record);

    /// Remove a record; returns whether it existed
    fn delete(&mut self, name: &str) -> bool;
}

/// In-memory, insertion-ordered record store
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    records: IndexMap<String, Record>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: impl IntoIterator<Item = Record>) -> Self {
        let mut store = Self::new();
        for record in records {
            store.upsert(record);
        }
        store
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Create-or-merge from a flat field map: fields present in the map
    /// overwrite the stored record's fields, everything else is kept.
    pub fn merge_fields(
        &mut self,
        fields: &Fields,
        config: &SolverConfig,
    ) -> Result<(), StoreError> {
        let name = text_field(fields, "instance_name").ok_or_else(|| StoreError::MissingField {
            name: "<unnamed>".to_string(),
            field: "instance_name".to_string(),
        })?;
        let merged = match self.records.get(name) {
            Some(existing) => {
                let mut base = existing.to_fields();
                for (key, value) in fields {
                    base.insert(key.clone(), value.clone());
                }
                Record::from_fields(&base, config)?
            }
            None => Record::from_fields(fields, config)?,
        };
        self.upsert(merged);
        Ok(())
    }
}

impl RecordStore for MemoryStore {
    fn read_all(&self) -> Vec<&Record> {
        self.records.values().collect()
    }

    fn get(&self, name: &str) -> Option<&Record> {
        self.records.get(name)
    }

    fn upsert(&mut self, record: Record) {
        self.records.insert(record.name().to_string(), record);
    }

    fn delete(&mut self, name: &str) -> bool {
        self.records.shift_remove(name).is_some()
    }
}
