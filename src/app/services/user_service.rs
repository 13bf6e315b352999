use anyhow::Result;
use diesel::prelude::*;
use crate::app::models::DieselUlid;
use crate::app::models::user::{TriggerField, User};
use crate::database::DbPool;
use crate::schema::users;

/// Read-only surface over the externally-owned user store. Candidate
/// enumeration stops at "live user with the trigger field set"; whether a
/// candidate fires today is the strategy's call, so the firing rule lives
/// in exactly one place.
pub struct UserService;

impl UserService {
    pub fn find_by_id(pool: &DbPool, id: &DieselUlid) -> Result<Option<User>> {
        let mut conn = pool.get()?;

        let result = users::table
            .filter(users::id.eq(id.to_string()))
            .filter(users::deleted_at.is_null())
            .select(User::as_select())
            .first::<User>(&mut conn)
            .optional()?;

        Ok(result)
    }

    pub fn find_all(pool: &DbPool) -> Result<Vec<User>> {
        let mut conn = pool.get()?;

        let result = users::table
            .filter(users::deleted_at.is_null())
            .select(User::as_select())
            .load::<User>(&mut conn)?;

        Ok(result)
    }

    /// Candidates for a strategy: live users with the trigger field set.
    pub fn find_with_trigger(pool: &DbPool, field: TriggerField) -> Result<Vec<User>> {
        let mut conn = pool.get()?;

        let query = users::table
            .filter(users::deleted_at.is_null())
            .select(User::as_select());

        let result = match field {
            TriggerField::BirthdayDate => query
                .filter(users::birthday_date.is_not_null())
                .load::<User>(&mut conn)?,
            TriggerField::AnniversaryDate => query
                .filter(users::anniversary_date.is_not_null())
                .load::<User>(&mut conn)?,
        };

        Ok(result)
    }
}
