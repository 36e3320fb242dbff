//! Payment-related [`Database`] implementations.

use common::operations::{By, Select};
use tokio_postgres::Row;
use tracerr::Traced;

use crate::{
    domain::{
        payment::{self, Request},
        rental,
    },
    infra::{
        database::{self, postgres::Connection, Postgres},
        Database,
    },
    read::payment::{Latest, VerifiedOverdue},
};

/// Columns selected by every payment [`Request`] query.
const COLUMNS: &str = "\
    id, rental_id, kind, amount, reference_number, \
    status, verified_at, created_at";

/// Restores a payment [`Request`] from the provided [`Row`] of [`COLUMNS`].
fn from_row(row: &Row) -> Request {
    Request {
        id: row.get("id"),
        rental_id: row.get("rental_id"),
        kind: row.get("kind"),
        amount: row.get("amount"),
        reference_number: row.get("reference_number"),
        status: row.get("status"),
        verified_at: row.get("verified_at"),
        created_at: row.get("created_at"),
    }
}

impl<C> Database<Select<By<Option<Latest<Request>>, rental::Id>>>
    for Postgres<C>
where
    C: Connection,
{
    type Ok = Option<Latest<Request>>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Latest<Request>>, rental::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        // Avoid subtle change for SQL.
        let rental_id: rental::Id = by.into_inner();

        let sql = format!(
            "SELECT {COLUMNS} \
             FROM payment_requests \
             WHERE rental_id = $1::UUID \
             ORDER BY created_at DESC \
             LIMIT 1",
        );
        self.query_opt(&sql, &[&rental_id])
            .await
            .map_err(tracerr::wrap!())
            .map(|row| row.map(|row| Latest(from_row(&row))))
    }
}

impl<C> Database<Select<By<Option<VerifiedOverdue<Request>>, rental::Id>>>
    for Postgres<C>
where
    C: Connection,
{
    type Ok = Option<VerifiedOverdue<Request>>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<VerifiedOverdue<Request>>, rental::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        // Avoid subtle change for SQL.
        let rental_id: rental::Id = by.into_inner();

        let sql = format!(
            "SELECT {COLUMNS} \
             FROM payment_requests \
             WHERE rental_id = $1::UUID \
               AND kind = $2::INT2 \
               AND status = $3::INT2 \
             ORDER BY created_at DESC \
             LIMIT 1",
        );
        self.query_opt(
            &sql,
            &[&rental_id, &payment::Kind::Overdue, &payment::Status::Verified],
        )
        .await
        .map_err(tracerr::wrap!())
        .map(|row| row.map(|row| VerifiedOverdue(from_row(&row))))
    }
}
