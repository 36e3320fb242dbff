//! [`Proof`]-related [`Database`] implementations.

use common::operations::{By, Insert, Select};
use tracerr::Traced;

use crate::{
    domain::{
        proof::{self, Proof},
        rental,
    },
    infra::{
        database::{self, postgres::Connection, Postgres},
        Database,
    },
    read,
};

impl<C> Database<Insert<Proof>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(proof): Insert<Proof>,
    ) -> Result<Self::Ok, Self::Err> {
        const SQL: &str = "\
            INSERT INTO proofs (\
                id, rental_id, kind, blob, submitted_by, notes, created_at\
            ) VALUES (\
                $1::UUID, $2::UUID, $3::INT2, $4::VARCHAR, $5::UUID, \
                $6::VARCHAR, $7::TIMESTAMPTZ\
            )";
        self.exec(
            SQL,
            &[
                &proof.id,
                &proof.rental_id,
                &proof.kind,
                &proof.blob,
                &proof.submitted_by,
                &proof.notes,
                &proof.created_at,
            ],
        )
        .await
        .map_err(tracerr::wrap!())
        .map(drop)
    }
}

impl<C>
    Database<Select<By<read::proof::Exists, (rental::Id, proof::Kind)>>>
    for Postgres<C>
where
    C: Connection,
{
    type Ok = read::proof::Exists;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<read::proof::Exists, (rental::Id, proof::Kind)>>,
    ) -> Result<Self::Ok, Self::Err> {
        let (rental_id, kind) = by.into_inner();

        const SQL: &str = "\
            SELECT EXISTS(\
                SELECT 1 \
                FROM proofs \
                WHERE rental_id = $1::UUID \
                  AND kind = $2::INT2\
            ) AS found";
        self.query_opt(SQL, &[&rental_id, &kind])
            .await
            .map_err(tracerr::wrap!())
            .map(|row| {
                read::proof::Exists(
                    row.is_some_and(|row| row.get::<_, bool>("found")),
                )
            })
    }
}
