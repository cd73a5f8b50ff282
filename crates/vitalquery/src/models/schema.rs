use serde::Serialize;

pub const USERS_TABLE: &str = "users";
pub const EVENT_TABLE: &str = "event";
pub const JOIN_RULE: &str = "event.protectee_id = users.id";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableDescriptor {
    pub name: &'static str,
    pub alias: &'static str,
    pub columns: &'static [&'static str],
    pub primary_key: &'static [&'static str],
}

impl TableDescriptor {
    #[must_use]
    pub fn has_column(&self, column: &str) -> bool {
        self.columns
            .iter()
            .any(|candidate| candidate.eq_ignore_ascii_case(column))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchemaDescriptor {
    tables: &'static [TableDescriptor],
}

static PROTECTEE_TABLES: &[TableDescriptor] = &[
    TableDescriptor {
        name: USERS_TABLE,
        alias: "u",
        columns: &["id", "name"],
        primary_key: &["id"],
    },
    TableDescriptor {
        name: EVENT_TABLE,
        alias: "e",
        columns: &[
            "id",
            "protectee_id",
            "timestamp",
            "ppg_json",
            "ppg_threat_detected",
            "hrv",
            "stress",
            "imu_danger_level",
            "latitude",
            "longitude",
            "zone_type",
            "is_watch_connected",
        ],
        primary_key: &["id"],
    },
];

static PROTECTEE_SCHEMA: SchemaDescriptor = SchemaDescriptor {
    tables: PROTECTEE_TABLES,
};

impl SchemaDescriptor {
    #[must_use]
    pub fn protectee() -> &'static SchemaDescriptor {
        &PROTECTEE_SCHEMA
    }

    #[must_use]
    pub fn tables(&self) -> &[TableDescriptor] {
        self.tables
    }

    #[must_use]
    pub fn table(&self, name: &str) -> Option<&TableDescriptor> {
        self.tables
            .iter()
            .find(|table| table.name.eq_ignore_ascii_case(name))
    }

    /// Resolves a `qualifier.column` qualifier against table names and the
    /// canonical query aliases (`e`, `u`).
    #[must_use]
    pub fn resolve_qualifier(&self, qualifier: &str) -> Option<&TableDescriptor> {
        self.table(qualifier).or_else(|| {
            self.tables
                .iter()
                .find(|table| table.alias.eq_ignore_ascii_case(qualifier))
        })
    }

    #[must_use]
    pub fn any_table_has_column(&self, column: &str) -> bool {
        self.tables.iter().any(|table| table.has_column(column))
    }

    #[must_use]
    pub fn column_summary(&self) -> String {
        self.tables
            .iter()
            .map(|table| format!("{}({})", table.name, table.columns.join(", ")))
            .collect::<Vec<_>>()
            .join("; ")
    }
}
