//! [`Command`] for moving a paid rental into handover.

use common::operations::{
    By, Commit, Insert, Lock, Select, Transact, Transacted, Update,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;

use crate::{
    domain::{listing, payment, rental, timeline, user, Listing, Rental, User},
    infra::{database, Database},
    read,
    Service,
};

use super::Command;

/// [`Command`] for moving an approved and paid [`Rental`] into the handover
/// phase.
///
/// Executed by the renter once the latest payment on the [`Rental`] has been
/// verified by the external payment subsystem.
#[derive(Clone, Copy, Debug)]
pub struct StartHandover {
    /// ID of the [`Rental`] to move into handover.
    pub rental_id: rental::Id,

    /// ID of the [`User`] confirming the payment.
    ///
    /// Must be the renter of the [`Rental`].
    pub renter_id: user::Id,
}

impl<Db, Bs, Nt> Command<StartHandover> for Service<Db, Bs, Nt>
where
    Db: Database<Transact, Err = Traced<database::Error>>
        + Database<
            Select<By<Option<User>, user::Id>>,
            Ok = Option<User>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<Rental>, rental::Id>>,
            Ok = Option<Rental>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<Listing>, listing::Id>>,
            Ok = Option<Listing>,
            Err = Traced<database::Error>,
        >,
    Transacted<Db>: Database<
            Lock<By<Rental, rental::Id>>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<Rental>, rental::Id>>,
            Ok = Option<Rental>,
            Err = Traced<database::Error>,
        > + Database<
            Select<
                By<
                    Option<read::payment::Latest<payment::Request>>,
                    rental::Id,
                >,
            >,
            Ok = Option<read::payment::Latest<payment::Request>>,
            Err = Traced<database::Error>,
        > + Database<Update<Rental>, Err = Traced<database::Error>>
        + Database<Insert<timeline::Event>, Err = Traced<database::Error>>
        + Database<Commit, Err = Traced<database::Error>>,
{
    type Ok = Rental;
    type Err = Traced<ExecutionError>;

    async fn execute(&self, cmd: StartHandover) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let StartHandover {
            rental_id,
            renter_id,
        } = cmd;

        let renter = self
            .database()
            .execute(Select(By::<Option<User>, _>::new(renter_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::UserNotExists(renter_id))
            .map_err(tracerr::wrap!())?;

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

        if rental.role_of(renter.id, &listing) != rental::Role::Renter {
            return Err(tracerr::new!(E::NotRenter(renter.id)));
        }

        let tx = self
            .database()
            .execute(Transact)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        tx.execute(Lock(By::new(rental_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        let mut rental = tx
            .execute(Select(By::<Option<Rental>, _>::new(rental_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::RentalNotExists(rental_id))
            .map_err(tracerr::wrap!())?;

        if !rental.is_status(rental::Status::Approved) {
            return Err(tracerr::new!(E::NotApproved(rental.status)));
        }

        let latest = tx
            .execute(Select(By::<
                Option<read::payment::Latest<payment::Request>>,
                _,
            >::new(rental_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        if !latest.as_ref().is_some_and(|l| l.0.is_verified()) {
            return Err(tracerr::new!(E::PaymentNotVerified));
        }

        rental.status = rental::Status::ToHandover;
        tx.execute(Update(rental.clone()))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        tx.execute(Insert(timeline::Event::record(
            &rental,
            timeline::Kind::PaymentConfirmed,
            renter.id,
            None,
        )))
        .await
        .map_err(tracerr::map_from_and_wrap!(=> E))
        .map(drop)?;

        tx.execute(Commit)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        Ok(rental)
    }
}

/// Error of [`StartHandover`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// [`Listing`] of the [`Rental`] does not exist.
    #[display("`Listing(id: {_0})` does not exist")]
    ListingNotExists(#[error(not(source))] listing::Id),

    /// [`Rental`] is not in the approved status.
    #[display("`Rental` cannot enter handover in the `{_0}` status")]
    NotApproved(#[error(not(source))] rental::Status),

    /// Actor is not the renter of the [`Rental`].
    #[display("`User(id: {_0})` is not the renter of this rental")]
    NotRenter(#[error(not(source))] user::Id),

    /// Latest payment of the [`Rental`] is missing or not verified yet.
    #[display("latest payment of the rental is not verified")]
    PaymentNotVerified,

    /// [`Rental`] with the provided ID does not exist.
    #[display("`Rental(id: {_0})` does not exist")]
    RentalNotExists(#[error(not(source))] rental::Id),

    /// [`User`] with the provided ID does not exist.
    #[display("`User(id: {_0})` does not exist")]
    UserNotExists(#[error(not(source))] user::Id),
}
