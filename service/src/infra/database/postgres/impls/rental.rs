//! [`Rental`]-related [`Database`] implementations.

use common::{
    operations::{By, Insert, Lock, Select, Update},
    Day, Period,
};
use tokio_postgres::Row;
use tracerr::Traced;

use crate::{
    domain::rental::{self, Rental, ReturnAppointment, Status, Terms},
    infra::{
        database::{self, postgres::Connection, Postgres},
        Database,
    },
    read::rental::{NonTerminalFor, OverlappingWith, Pending},
};

/// Columns selected by every [`Rental`] query.
const COLUMNS: &str = "\
    id, listing_id, renter_id, \
    starts_on, ends_on, \
    base_price, discount, service_fee, deposit_fee, total_price, \
    status, \
    return_slot_id, return_on, \
    handover_at, return_at, created_at";

/// Restores a [`Rental`] from the provided [`Row`] of [`COLUMNS`].
fn from_row(row: &Row) -> Rental {
    let starts_on: Day = row.get("starts_on");
    let ends_on: Day = row.get("ends_on");

    let return_appointment = match (
        row.get::<_, Option<_>>("return_slot_id"),
        row.get::<_, Option<_>>("return_on"),
    ) {
        (Some(slot_id), Some(date)) => {
            Some(ReturnAppointment { slot_id, date })
        }
        (None, _) | (_, None) => None,
    };

    Rental {
        id: row.get("id"),
        listing_id: row.get("listing_id"),
        renter_id: row.get("renter_id"),
        period: Period::new(starts_on, ends_on)
            .expect("`starts_on <= ends_on` is enforced by a CHECK"),
        terms: Terms {
            base_price: row.get("base_price"),
            discount: row.get("discount"),
            service_fee: row.get("service_fee"),
            deposit_fee: row.get("deposit_fee"),
            total_price: row.get("total_price"),
        },
        status: row.get("status"),
        return_appointment,
        handover_at: row.get("handover_at"),
        return_at: row.get("return_at"),
        created_at: row.get("created_at"),
    }
}

impl<C> Database<Select<By<Option<Rental>, rental::Id>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = Option<Rental>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Rental>, rental::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        // Avoid subtle change for SQL.
        let id: rental::Id = by.into_inner();

        let sql = format!(
            "SELECT {COLUMNS} \
             FROM rentals \
             WHERE id = $1::UUID",
        );
        self.query_opt(&sql, &[&id])
            .await
            .map_err(tracerr::wrap!())
            .map(|row| row.map(|row| from_row(&row)))
    }
}

impl<C> Database<Select<By<Option<Rental>, NonTerminalFor>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = Option<Rental>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Rental>, NonTerminalFor>>,
    ) -> Result<Self::Ok, Self::Err> {
        let NonTerminalFor {
            listing_id,
            renter_id,
        } = by.into_inner();

        let sql = format!(
            "SELECT {COLUMNS} \
             FROM rentals \
             WHERE listing_id = $1::UUID \
               AND renter_id = $2::UUID \
               AND status NOT IN ($3::INT2, $4::INT2, $5::INT2) \
             LIMIT 1",
        );
        self.query_opt(
            &sql,
            &[
                &listing_id,
                &renter_id,
                &Status::Completed,
                &Status::Rejected,
                &Status::Cancelled,
            ],
        )
        .await
        .map_err(tracerr::wrap!())
        .map(|row| row.map(|row| from_row(&row)))
    }
}

impl<C> Database<Select<By<Vec<Pending<Rental>>, OverlappingWith>>>
    for Postgres<C>
where
    C: Connection,
{
    type Ok = Vec<Pending<Rental>>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Vec<Pending<Rental>>, OverlappingWith>>,
    ) -> Result<Self::Ok, Self::Err> {
        let OverlappingWith {
            listing_id,
            period,
            exclude,
        } = by.into_inner();

        // Inclusive day-range overlap: `s1 <= e2 AND e1 >= s2`.
        let sql = format!(
            "SELECT {COLUMNS} \
             FROM rentals \
             WHERE listing_id = $1::UUID \
               AND id != $2::UUID \
               AND status = $3::INT2 \
               AND starts_on <= $5::DATE \
               AND ends_on >= $4::DATE",
        );
        self.query(
            &sql,
            &[
                &listing_id,
                &exclude,
                &Status::Pending,
                &period.start(),
                &period.end(),
            ],
        )
        .await
        .map_err(tracerr::wrap!())
        .map(|rows| {
            rows.into_iter().map(|row| Pending(from_row(&row))).collect()
        })
    }
}

impl<C> Database<Insert<Rental>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(rental): Insert<Rental>,
    ) -> Result<Self::Ok, Self::Err> {
        const SQL: &str = "\
            INSERT INTO rentals (\
                id, listing_id, renter_id, \
                starts_on, ends_on, \
                base_price, discount, service_fee, deposit_fee, total_price, \
                status, \
                return_slot_id, return_on, \
                handover_at, return_at, created_at\
            ) VALUES (\
                $1::UUID, $2::UUID, $3::UUID, \
                $4::DATE, $5::DATE, \
                $6::INT8, $7::INT8, $8::INT8, $9::INT8, $10::INT8, \
                $11::INT2, \
                $12::UUID, $13::DATE, \
                $14::TIMESTAMPTZ, $15::TIMESTAMPTZ, $16::TIMESTAMPTZ\
            )";
        self.exec(
            SQL,
            &[
                &rental.id,
                &rental.listing_id,
                &rental.renter_id,
                &rental.period.start(),
                &rental.period.end(),
                &rental.terms.base_price,
                &rental.terms.discount,
                &rental.terms.service_fee,
                &rental.terms.deposit_fee,
                &rental.terms.total_price,
                &rental.status,
                &rental.return_appointment.map(|a| a.slot_id),
                &rental.return_appointment.map(|a| a.date),
                &rental.handover_at,
                &rental.return_at,
                &rental.created_at,
            ],
        )
        .await
        .map_err(tracerr::wrap!())
        .map(drop)
    }
}

impl<C> Database<Update<Rental>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(rental): Update<Rental>,
    ) -> Result<Self::Ok, Self::Err> {
        const SQL: &str = "\
            UPDATE rentals \
            SET status = $2::INT2, \
                return_slot_id = $3::UUID, \
                return_on = $4::DATE, \
                handover_at = $5::TIMESTAMPTZ, \
                return_at = $6::TIMESTAMPTZ \
            WHERE id = $1::UUID";
        self.exec(
            SQL,
            &[
                &rental.id,
                &rental.status,
                &rental.return_appointment.map(|a| a.slot_id),
                &rental.return_appointment.map(|a| a.date),
                &rental.handover_at,
                &rental.return_at,
            ],
        )
        .await
        .map_err(tracerr::wrap!())
        .map(drop)
    }
}

impl<C> Database<Lock<By<Rental, rental::Id>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Lock(by): Lock<By<Rental, rental::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        // Avoid subtle change for SQL.
        let id: rental::Id = by.into_inner();

        // Row lock held until the surrounding transaction ends, serializing
        // concurrent transitions over the same rental.
        const SQL: &str = "\
            SELECT id \
            FROM rentals \
            WHERE id = $1::UUID \
            FOR UPDATE";
        self.query(SQL, &[&id])
            .await
            .map_err(tracerr::wrap!())
            .map(drop)
    }
}
