//! [`Listing`]-related [`Database`] implementations.

use common::operations::{By, Lock, Select, Update};
use tracerr::Traced;

use crate::{
    domain::{listing, Listing},
    infra::{
        database::{self, postgres::Connection, Postgres},
        Database,
    },
};

impl<C> Database<Select<By<Option<Listing>, listing::Id>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = Option<Listing>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Listing>, listing::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        // Avoid subtle change for SQL.
        let id: listing::Id = by.into_inner();

        const SQL: &str = "\
            SELECT id, owner_id, title, daily_price, \
                   is_available, is_rented, created_at \
            FROM listings \
            WHERE id = $1::UUID";
        self.query_opt(SQL, &[&id])
            .await
            .map_err(tracerr::wrap!())
            .map(|row| {
                row.map(|row| Listing {
                    id: row.get("id"),
                    owner_id: row.get("owner_id"),
                    title: row.get("title"),
                    daily_price: row.get("daily_price"),
                    is_available: row.get("is_available"),
                    is_rented: row.get("is_rented"),
                    created_at: row.get("created_at"),
                })
            })
    }
}

impl<C> Database<Update<Listing>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(listing): Update<Listing>,
    ) -> Result<Self::Ok, Self::Err> {
        const SQL: &str = "\
            UPDATE listings \
            SET owner_id = $2::UUID, \
                title = $3::VARCHAR, \
                daily_price = $4::INT8, \
                is_available = $5::BOOLEAN, \
                is_rented = $6::BOOLEAN \
            WHERE id = $1::UUID";
        self.exec(
            SQL,
            &[
                &listing.id,
                &listing.owner_id,
                &listing.title,
                &listing.daily_price,
                &listing.is_available,
                &listing.is_rented,
            ],
        )
        .await
        .map_err(tracerr::wrap!())
        .map(drop)
    }
}

impl<C> Database<Lock<By<Listing, listing::Id>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Lock(by): Lock<By<Listing, listing::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        // Avoid subtle change for SQL.
        let id: listing::Id = by.into_inner();

        // Row lock held until the surrounding transaction ends, serializing
        // concurrent transitions over the same listing.
        const SQL: &str = "\
            SELECT id \
            FROM listings \
            WHERE id = $1::UUID \
            FOR UPDATE";
        self.query(SQL, &[&id])
            .await
            .map_err(tracerr::wrap!())
            .map(drop)
    }
}
