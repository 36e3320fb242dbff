//! Pickup [`Slot`]-related [`Database`] implementations.

use common::operations::{By, Select};
use tracerr::Traced;

use crate::{
    domain::schedule::{self, Slot},
    infra::{
        database::{self, postgres::Connection, Postgres},
        Database,
    },
};

impl<C> Database<Select<By<Option<Slot>, schedule::Id>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = Option<Slot>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Slot>, schedule::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        // Avoid subtle change for SQL.
        let id: schedule::Id = by.into_inner();

        const SQL: &str = "\
            SELECT id, lender_id, day_of_week, starts_at, ends_at, is_active \
            FROM pickup_slots \
            WHERE id = $1::UUID";
        self.query_opt(SQL, &[&id])
            .await
            .map_err(tracerr::wrap!())
            .map(|row| {
                row.map(|row| Slot {
                    id: row.get("id"),
                    lender_id: row.get("lender_id"),
                    day_of_week: row.get("day_of_week"),
                    starts_at: row.get("starts_at"),
                    ends_at: row.get("ends_at"),
                    is_active: row.get("is_active"),
                })
            })
    }
}
