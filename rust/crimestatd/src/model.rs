use serde::{Deserialize, Serialize};

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct State {
    pub id: i64,
    pub abbreviated_name: String,
    pub name: String,
    pub is_deleted: bool,
    pub is_visible: bool,
    pub date_created_utc: String,
    pub date_updated_utc: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalGovernmentArea {
    pub id: i64,
    pub name: String,
    pub state_id: i64,
    pub is_deleted: bool,
    pub is_visible: bool,
    pub date_created_utc: String,
    pub date_updated_utc: Option<String>,
}

/// An area joined with the name of the state it belongs to, as shown in admin lists.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalGovernmentAreaState {
    #[serde(flatten)]
    pub area: LocalGovernmentArea,
    pub state_name: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OffenceCategory {
    pub id: i64,
    pub name: String,
    pub is_deleted: bool,
    pub is_visible: bool,
    pub date_created_utc: String,
    pub date_updated_utc: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Offence {
    pub id: i64,
    pub name: String,
    pub offence_category_id: Option<i64>,
    pub is_deleted: bool,
    pub is_visible: bool,
    pub date_created_utc: String,
    pub date_updated_utc: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Crime {
    pub id: i64,
    pub local_government_area_id: i64,
    pub offence_id: i64,
    pub month: u32,
    pub year: i32,
    pub count: i64,
    pub is_deleted: bool,
    pub is_visible: bool,
    pub date_created_utc: String,
    pub date_updated_utc: Option<String>,
}

/// One fact row produced by an importer: the count of an offence in an area for a month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CrimeRecord {
    pub local_government_area_id: i64,
    pub offence_id: i64,
    pub month: u32,
    pub year: i32,
    pub count: i64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateInput {
    pub abbreviated_name: String,
    pub name: String,
    #[serde(default)]
    pub is_deleted: bool,
    #[serde(default = "default_true")]
    pub is_visible: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalGovernmentAreaInput {
    pub name: String,
    pub state_id: i64,
    #[serde(default)]
    pub is_deleted: bool,
    #[serde(default = "default_true")]
    pub is_visible: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OffenceCategoryInput {
    pub name: String,
    #[serde(default)]
    pub is_deleted: bool,
    #[serde(default = "default_true")]
    pub is_visible: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OffenceInput {
    pub name: String,
    #[serde(default)]
    pub offence_category_id: Option<i64>,
    #[serde(default)]
    pub is_deleted: bool,
    #[serde(default = "default_true")]
    pub is_visible: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrimeInput {
    pub local_government_area_id: i64,
    pub offence_id: i64,
    pub month: u32,
    pub year: i32,
    pub count: i64,
    #[serde(default)]
    pub is_deleted: bool,
    #[serde(default = "default_true")]
    pub is_visible: bool,
}

impl CrimeInput {
    pub fn record(&self) -> CrimeRecord {
        CrimeRecord {
            local_government_area_id: self.local_government_area_id,
            offence_id: self.offence_id,
            month: self.month,
            year: self.year,
            count: self.count,
        }
    }
}
