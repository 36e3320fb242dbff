//! Timeline [`Event`]-related [`Database`] implementations.

use common::operations::{By, Insert, Select};
use tracerr::Traced;

use crate::{
    domain::{rental, timeline::Event},
    infra::{
        database::{self, postgres::Connection, Postgres},
        Database,
    },
    read,
};

impl<C> Database<Insert<Event>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(event): Insert<Event>,
    ) -> Result<Self::Ok, Self::Err> {
        const SQL: &str = "\
            INSERT INTO timeline_events (\
                id, rental_id, actor_id, kind, status, metadata, created_at\
            ) VALUES (\
                $1::UUID, $2::UUID, $3::UUID, $4::INT2, $5::INT2, \
                $6::JSONB, $7::TIMESTAMPTZ\
            )";
        self.exec(
            SQL,
            &[
                &event.id,
                &event.rental_id,
                &event.actor_id,
                &event.kind,
                &event.status,
                &event.metadata,
                &event.created_at,
            ],
        )
        .await
        .map_err(tracerr::wrap!())
        .map(drop)
    }
}

impl<C> Database<Select<By<Vec<read::timeline::Entry>, rental::Id>>>
    for Postgres<C>
where
    C: Connection,
{
    type Ok = Vec<read::timeline::Entry>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Vec<read::timeline::Entry>, rental::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        // Avoid subtle change for SQL.
        let rental_id: rental::Id = by.into_inner();

        const SQL: &str = "\
            SELECT e.id, e.rental_id, e.actor_id, e.kind, e.status, \
                   e.metadata, e.created_at, \
                   u.name AS actor_name \
            FROM timeline_events AS e \
            JOIN users AS u ON u.id = e.actor_id \
            WHERE e.rental_id = $1::UUID \
            ORDER BY e.created_at DESC";
        self.query(SQL, &[&rental_id])
            .await
            .map_err(tracerr::wrap!())
            .map(|rows| {
                rows.into_iter()
                    .map(|row| read::timeline::Entry {
                        event: Event {
                            id: row.get("id"),
                            rental_id: row.get("rental_id"),
                            actor_id: row.get("actor_id"),
                            kind: row.get("kind"),
                            status: row.get("status"),
                            metadata: row.get("metadata"),
                            created_at: row.get("created_at"),
                        },
                        actor: row.get("actor_name"),
                    })
                    .collect()
            })
    }
}
