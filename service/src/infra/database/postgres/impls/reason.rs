//! Reason-related [`Database`] implementations.

use common::operations::{By, Insert, Select};
use tracerr::Traced;

use crate::{
    domain::reason::{cancellation, rejection},
    infra::{
        database::{self, postgres::Connection, Postgres},
        Database,
    },
};

impl<C> Database<Select<By<Option<rejection::Reason>, rejection::Id>>>
    for Postgres<C>
where
    C: Connection,
{
    type Ok = Option<rejection::Reason>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<rejection::Reason>, rejection::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        // Avoid subtle change for SQL.
        let id: rejection::Id = by.into_inner();

        const SQL: &str = "\
            SELECT id, code, label \
            FROM rejection_reasons \
            WHERE id = $1::UUID";
        self.query_opt(SQL, &[&id])
            .await
            .map_err(tracerr::wrap!())
            .map(|row| {
                row.map(|row| rejection::Reason {
                    id: row.get("id"),
                    code: row.get("code"),
                    label: row.get("label"),
                })
            })
    }
}

impl<C> Database<Select<By<Option<rejection::Reason>, rejection::Code>>>
    for Postgres<C>
where
    C: Connection,
{
    type Ok = Option<rejection::Reason>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<rejection::Reason>, rejection::Code>>,
    ) -> Result<Self::Ok, Self::Err> {
        // Avoid subtle change for SQL.
        let code: rejection::Code = by.into_inner();

        const SQL: &str = "\
            SELECT id, code, label \
            FROM rejection_reasons \
            WHERE code = $1::INT2 \
            LIMIT 1";
        self.query_opt(SQL, &[&code])
            .await
            .map_err(tracerr::wrap!())
            .map(|row| {
                row.map(|row| rejection::Reason {
                    id: row.get("id"),
                    code: row.get("code"),
                    label: row.get("label"),
                })
            })
    }
}

impl<C> Database<Insert<rejection::Record>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(record): Insert<rejection::Record>,
    ) -> Result<Self::Ok, Self::Err> {
        const SQL: &str = "\
            INSERT INTO rejection_records (\
                rental_id, reason_id, feedback, attributed_by, created_at\
            ) VALUES (\
                $1::UUID, $2::UUID, $3::VARCHAR, $4::UUID, $5::TIMESTAMPTZ\
            )";
        self.exec(
            SQL,
            &[
                &record.rental_id,
                &record.reason_id,
                &record.feedback,
                &record.attributed_by,
                &record.created_at,
            ],
        )
        .await
        .map_err(tracerr::wrap!())
        .map(drop)
    }
}

impl<C> Database<Select<By<Option<cancellation::Reason>, cancellation::Id>>>
    for Postgres<C>
where
    C: Connection,
{
    type Ok = Option<cancellation::Reason>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<cancellation::Reason>, cancellation::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        // Avoid subtle change for SQL.
        let id: cancellation::Id = by.into_inner();

        const SQL: &str = "\
            SELECT id, code, label, role \
            FROM cancellation_reasons \
            WHERE id = $1::UUID";
        self.query_opt(SQL, &[&id])
            .await
            .map_err(tracerr::wrap!())
            .map(|row| {
                row.map(|row| cancellation::Reason {
                    id: row.get("id"),
                    code: row.get("code"),
                    label: row.get("label"),
                    role: row.get("role"),
                })
            })
    }
}

impl<C> Database<Insert<cancellation::Record>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(record): Insert<cancellation::Record>,
    ) -> Result<Self::Ok, Self::Err> {
        const SQL: &str = "\
            INSERT INTO cancellation_records (\
                rental_id, reason_id, feedback, attributed_by, created_at\
            ) VALUES (\
                $1::UUID, $2::UUID, $3::VARCHAR, $4::UUID, $5::TIMESTAMPTZ\
            )";
        self.exec(
            SQL,
            &[
                &record.rental_id,
                &record.reason_id,
                &record.feedback,
                &record.attributed_by,
                &record.created_at,
            ],
        )
        .await
        .map_err(tracerr::wrap!())
        .map(drop)
    }
}
