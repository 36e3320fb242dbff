//! [`Query`] deriving the financial snapshot of a [`Rental`].

use common::operations::{By, Select};
use derive_more::{Display, Error, From};
use tracerr::Traced;

use crate::{
    domain::{
        listing, payment,
        rental::{self, finance},
        Listing, Rental,
    },
    infra::{database, Database},
    read,
    Query, Service,
};

/// [`Query`] deriving the [`finance::Financials`] of a [`Rental`].
///
/// Nothing is read back from storage besides the inputs: the snapshot is a
/// pure function of the rental, the listing's daily price, the latest
/// verified overdue payment and the current business-timezone day.
#[derive(Clone, Copy, Debug)]
pub struct Financials {
    /// ID of the [`Rental`] to derive the snapshot of.
    pub rental_id: rental::Id,
}

impl<Db, Bs, Nt> Query<Financials> for Service<Db, Bs, Nt>
where
    Db: Database<
            Select<By<Option<Rental>, rental::Id>>,
            Ok = Option<Rental>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<Listing>, listing::Id>>,
            Ok = Option<Listing>,
            Err = Traced<database::Error>,
        > + Database<
            Select<
                By<
                    Option<read::payment::VerifiedOverdue<payment::Request>>,
                    rental::Id,
                >,
            >,
            Ok = Option<read::payment::VerifiedOverdue<payment::Request>>,
            Err = Traced<database::Error>,
        >,
{
    type Ok = finance::Financials;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        Financials { rental_id }: Financials,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let rental = self
            .database()
            .execute(Select(By::<Option<Rental>, _>::new(rental_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::RentalNotExists(rental_id))
            .map_err(tracerr::wrap!())?;

        let listing = self
            .database()
            .execute(Select(By::<Option<Listing>, _>::new(rental.listing_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::ListingNotExists(rental.listing_id))
            .map_err(tracerr::wrap!())?;

        let verified_overdue = self
            .database()
            .execute(Select(By::<
                Option<read::payment::VerifiedOverdue<payment::Request>>,
                _,
            >::new(rental_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        Ok(finance::Financials::derive(
            &rental,
            listing.daily_price,
            verified_overdue.map(|p| p.0.amount),
            self.today(),
        ))
    }
}

/// Error of [`Financials`] [`Query`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// [`Listing`] of the [`Rental`] does not exist.
    #[display("`Listing(id: {_0})` does not exist")]
    ListingNotExists(#[error(not(source))] listing::Id),

    /// [`Rental`] with the provided ID does not exist.
    #[display("`Rental(id: {_0})` does not exist")]
    RentalNotExists(#[error(not(source))] rental::Id),
}
