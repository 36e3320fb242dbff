//! [`Command`] for initiating the return of a rented item.

use common::operations::{
    By, Commit, Insert, Lock, Select, Transact, Transacted, Update,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;

use crate::{
    domain::{
        listing, payment,
        rental::{self, finance},
        timeline, user, Listing, Rental, User,
    },
    infra::{database, Database},
    read,
    Service,
};

use super::Command;

/// [`Command`] for the renter to initiate returning the item.
///
/// An overdue [`Rental`] cannot enter the return flow until the overdue fee
/// has been paid and verified: the gate is the existence of a verified
/// overdue [`payment::Request`], not the fee computation itself.
#[derive(Clone, Copy, Debug)]
pub struct InitiateReturn {
    /// ID of the [`Rental`] to return.
    pub rental_id: rental::Id,

    /// ID of the [`User`] initiating the return.
    ///
    /// Must be the renter of the [`Rental`].
    pub renter_id: user::Id,
}

impl<Db, Bs, Nt> Command<InitiateReturn> for Service<Db, Bs, Nt>
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
                    Option<read::payment::VerifiedOverdue<payment::Request>>,
                    rental::Id,
                >,
            >,
            Ok = Option<read::payment::VerifiedOverdue<payment::Request>>,
            Err = Traced<database::Error>,
        > + Database<Update<Rental>, Err = Traced<database::Error>>
        + Database<Insert<timeline::Event>, Err = Traced<database::Error>>
        + Database<Commit, Err = Traced<database::Error>>,
{
    type Ok = Rental;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        cmd: InitiateReturn,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let InitiateReturn {
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

        if !rental.is_status(rental::Status::Active) {
            return Err(tracerr::new!(E::NotActive(rental.status)));
        }

        if finance::is_overdue(&rental, self.today()) {
            let paid = tx
                .execute(Select(By::<
                    Option<read::payment::VerifiedOverdue<payment::Request>>,
                    _,
                >::new(rental_id)))
                .await
                .map_err(tracerr::map_from_and_wrap!(=> E))?;
            if paid.is_none() {
                return Err(tracerr::new!(E::OverduePaymentRequired));
            }
        }

        rental.status = rental::Status::PendingReturn;
        tx.execute(Update(rental.clone()))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        tx.execute(Insert(timeline::Event::record(
            &rental,
            timeline::Kind::ReturnInitiated,
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

/// Error of [`InitiateReturn`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// [`Listing`] of the [`Rental`] does not exist.
    #[display("`Listing(id: {_0})` does not exist")]
    ListingNotExists(#[error(not(source))] listing::Id),

    /// [`Rental`] is not active.
    #[display("return cannot be initiated in the `{_0}` status")]
    NotActive(#[error(not(source))] rental::Status),

    /// Actor is not the renter of the [`Rental`].
    #[display("`User(id: {_0})` is not the renter of this rental")]
    NotRenter(#[error(not(source))] user::Id),

    /// [`Rental`] is overdue and no verified overdue payment exists.
    #[display("overdue fee must be paid and verified before the return")]
    OverduePaymentRequired,

    /// [`Rental`] with the provided ID does not exist.
    #[display("`Rental(id: {_0})` does not exist")]
    RentalNotExists(#[error(not(source))] rental::Id),

    /// [`User`] with the provided ID does not exist.
    #[display("`User(id: {_0})` does not exist")]
    UserNotExists(#[error(not(source))] user::Id),
}

#[cfg(test)]
mod spec {
    use crate::{
        command::fixtures::{
            listing, money, payment, period_days, rental, service, user,
        },
        domain::{
            payment::{Kind, Status as PaymentStatus},
            rental::Status,
            timeline,
        },
        Command as _,
    };

    use super::{InitiateReturn, ExecutionError as E};

    #[tokio::test]
    async fn moves_active_rental_to_pending_return() {
        let svc = service();
        let lender = user(&svc, "Lender");
        let renter = user(&svc, "Renter");
        let listing = listing(&svc, &lender);
        let rental = rental(
            &svc,
            &listing,
            &renter,
            period_days(-2, 5),
            Status::Active,
        );

        let updated = svc
            .execute(InitiateReturn {
                rental_id: rental.id,
                renter_id: renter.id,
            })
            .await
            .unwrap();

        assert_eq!(updated.status, Status::PendingReturn);

        let events = svc.database().events_of(rental.id);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, timeline::Kind::ReturnInitiated);
    }

    #[tokio::test]
    async fn overdue_rental_requires_a_verified_overdue_payment() {
        let svc = service();
        let lender = user(&svc, "Lender");
        let renter = user(&svc, "Renter");
        let listing = listing(&svc, &lender);
        let rental = rental(
            &svc,
            &listing,
            &renter,
            period_days(-10, 3),
            Status::Active,
        );

        let err = svc
            .execute(InitiateReturn {
                rental_id: rental.id,
                renter_id: renter.id,
            })
            .await
            .unwrap_err();
        assert!(matches!(err.as_ref(), E::OverduePaymentRequired));

        // A pending overdue payment isn't enough.
        payment(
            &svc,
            rental.id,
            Kind::Overdue,
            PaymentStatus::Pending,
            money(3000),
        );
        let err = svc
            .execute(InitiateReturn {
                rental_id: rental.id,
                renter_id: renter.id,
            })
            .await
            .unwrap_err();
        assert!(matches!(err.as_ref(), E::OverduePaymentRequired));

        // Once verified, the return may proceed.
        payment(
            &svc,
            rental.id,
            Kind::Overdue,
            PaymentStatus::Verified,
            money(3000),
        );
        let updated = svc
            .execute(InitiateReturn {
                rental_id: rental.id,
                renter_id: renter.id,
            })
            .await
            .unwrap();
        assert_eq!(updated.status, Status::PendingReturn);
    }

    #[tokio::test]
    async fn only_the_renter_may_initiate() {
        let svc = service();
        let lender = user(&svc, "Lender");
        let renter = user(&svc, "Renter");
        let listing = listing(&svc, &lender);
        let rental = rental(
            &svc,
            &listing,
            &renter,
            period_days(-2, 5),
            Status::Active,
        );

        let err = svc
            .execute(InitiateReturn {
                rental_id: rental.id,
                renter_id: lender.id,
            })
            .await
            .unwrap_err();

        assert!(matches!(err.as_ref(), E::NotRenter(id) if *id == lender.id));
    }

    #[tokio::test]
    async fn requires_the_active_status() {
        let svc = service();
        let lender = user(&svc, "Lender");
        let renter = user(&svc, "Renter");
        let listing = listing(&svc, &lender);
        let rental = rental(
            &svc,
            &listing,
            &renter,
            period_days(2, 5),
            Status::Approved,
        );

        let err = svc
            .execute(InitiateReturn {
                rental_id: rental.id,
                renter_id: renter.id,
            })
            .await
            .unwrap_err();

        assert!(matches!(err.as_ref(), E::NotActive(Status::Approved)));
    }
}
