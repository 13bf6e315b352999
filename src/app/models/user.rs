use serde::{Deserialize, Serialize};
use diesel::prelude::*;
use chrono::{DateTime, NaiveDate, Utc};
use super::DieselUlid;

/// A greeting recipient. Rows are written by the external user CRUD
/// collaborator; this service only reads them.
#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Identifiable)]
#[diesel(table_name = crate::schema::users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct User {
    pub id: DieselUlid,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    /// Canonical IANA zone name (e.g. `America/New_York`), never an offset.
    pub timezone: String,
    pub birthday_date: Option<NaiveDate>,
    pub anniversary_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Soft-delete marker; deleted users are invisible to the pipeline.
    pub deleted_at: Option<DateTime<Utc>>,
}

/// User columns a recurrence can anchor on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TriggerField {
    BirthdayDate,
    AnniversaryDate,
}

impl User {
    pub fn new(first_name: String, last_name: String, email: String, timezone: String) -> Self {
        let now = Utc::now();
        User {
            id: DieselUlid::new(),
            first_name,
            last_name,
            email,
            timezone,
            birthday_date: None,
            anniversary_date: None,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// The anchor date behind the given trigger field, if the user has one.
    pub fn trigger_date(&self, field: TriggerField) -> Option<NaiveDate> {
        match field {
            TriggerField::BirthdayDate => self.birthday_date,
            TriggerField::AnniversaryDate => self.anniversary_date,
        }
    }
}

impl TriggerField {
    pub fn column_name(&self) -> &'static str {
        match self {
            TriggerField::BirthdayDate => "birthday_date",
            TriggerField::AnniversaryDate => "anniversary_date",
        }
    }
}
