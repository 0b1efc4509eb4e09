use std::fmt;
use std::str::FromStr;

use thiserror::Error;

pub const FIELD_COUNT: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Field {
    CreatedDt,
    DataSourceModifiedDt,
    EntityType,
    OperatingStatus,
    LegalName,
    DbaName,
    PhysicalAddress,
    Phone,
    UsdotNumber,
    McMxFfNumber,
    PowerUnits,
    OutOfServiceDate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    Text,
    Date,
    Identifier,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDefinition {
    pub field: Field,
    pub identifier: &'static str,
    pub label: &'static str,
    pub kind: FieldKind,
    pub source_column: &'static str,
}

// Order here is the display order and the column order of the remote SELECT.
pub const FIELDS: [FieldDefinition; FIELD_COUNT] = [
    FieldDefinition {
        field: Field::CreatedDt,
        identifier: "created_dt",
        label: "Created Date",
        kind: FieldKind::Date,
        source_column: "A",
    },
    FieldDefinition {
        field: Field::DataSourceModifiedDt,
        identifier: "data_source_modified_dt",
        label: "Modified Date",
        kind: FieldKind::Date,
        source_column: "B",
    },
    FieldDefinition {
        field: Field::EntityType,
        identifier: "entity_type",
        label: "Entity Type",
        kind: FieldKind::Text,
        source_column: "C",
    },
    FieldDefinition {
        field: Field::OperatingStatus,
        identifier: "operating_status",
        label: "Operating Status",
        kind: FieldKind::Text,
        source_column: "D",
    },
    FieldDefinition {
        field: Field::LegalName,
        identifier: "legal_name",
        label: "Legal Name",
        kind: FieldKind::Text,
        source_column: "E",
    },
    FieldDefinition {
        field: Field::DbaName,
        identifier: "dba_name",
        label: "DBA Name",
        kind: FieldKind::Text,
        source_column: "F",
    },
    FieldDefinition {
        field: Field::PhysicalAddress,
        identifier: "physical_address",
        label: "Physical Address",
        kind: FieldKind::Text,
        source_column: "G",
    },
    FieldDefinition {
        field: Field::Phone,
        identifier: "phone",
        label: "Phone",
        kind: FieldKind::Text,
        source_column: "L",
    },
    FieldDefinition {
        field: Field::UsdotNumber,
        identifier: "usdot_number",
        label: "DOT Number",
        kind: FieldKind::Identifier,
        source_column: "R",
    },
    FieldDefinition {
        field: Field::McMxFfNumber,
        identifier: "mc_mx_ff_number",
        label: "MC/MX/FF Number",
        kind: FieldKind::Identifier,
        source_column: "S",
    },
    FieldDefinition {
        field: Field::PowerUnits,
        identifier: "power_units",
        label: "Power Units",
        kind: FieldKind::Text,
        source_column: "T",
    },
    FieldDefinition {
        field: Field::OutOfServiceDate,
        identifier: "out_of_service_date",
        label: "Out of Service Date",
        kind: FieldKind::Date,
        source_column: "V",
    },
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown field `{0}`")]
pub struct UnknownFieldError(String);

impl Field {
    pub const ALL: [Field; FIELD_COUNT] = [
        Field::CreatedDt,
        Field::DataSourceModifiedDt,
        Field::EntityType,
        Field::OperatingStatus,
        Field::LegalName,
        Field::DbaName,
        Field::PhysicalAddress,
        Field::Phone,
        Field::UsdotNumber,
        Field::McMxFfNumber,
        Field::PowerUnits,
        Field::OutOfServiceDate,
    ];

    #[must_use]
    pub fn index(self) -> usize {
        self as usize
    }

    #[must_use]
    pub fn definition(self) -> &'static FieldDefinition {
        &FIELDS[self.index()]
    }

    #[must_use]
    pub fn identifier(self) -> &'static str {
        self.definition().identifier
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        self.definition().label
    }

    #[must_use]
    pub fn kind(self) -> FieldKind {
        self.definition().kind
    }

    #[must_use]
    pub fn source_column(self) -> &'static str {
        self.definition().source_column
    }

    #[must_use]
    pub fn from_identifier(identifier: &str) -> Option<Self> {
        FIELDS
            .iter()
            .find(|definition| definition.identifier == identifier)
            .map(|definition| definition.field)
    }

    /// Resolves a column label declared by the remote sheet. The sheet's
    /// header row carries identifiers, but display labels are accepted too so
    /// a sheet with human headers still lines up.
    #[must_use]
    pub fn from_source_label(label: &str) -> Option<Self> {
        let label = label.trim();
        if label.is_empty() {
            return None;
        }
        FIELDS
            .iter()
            .find(|definition| definition.identifier == label || definition.label == label)
            .map(|definition| definition.field)
    }

    #[must_use]
    pub fn next(self) -> Self {
        Self::ALL[(self.index() + 1) % FIELD_COUNT]
    }

    #[must_use]
    pub fn previous(self) -> Self {
        Self::ALL[(self.index() + FIELD_COUNT - 1) % FIELD_COUNT]
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.identifier())
    }
}

impl FromStr for Field {
    type Err = UnknownFieldError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Self::from_identifier(raw.trim()).ok_or_else(|| UnknownFieldError(raw.to_string()))
    }
}

#[must_use]
pub fn source_columns() -> Vec<&'static str> {
    FIELDS
        .iter()
        .map(|definition| definition.source_column)
        .collect()
}
