//! [`Command`] for confirming the return of a rented item.

use common::operations::{
    By, Commit, Insert, Lock, Notify, Select, Transact, Transacted, Update,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;

use crate::{
    domain::{listing, proof, rental, timeline, user, Listing, Rental, User},
    infra::{database, notify, Database, Notifier},
    read,
    Service,
};

use super::Command;

/// [`Command`] for the lender to confirm the item is back.
///
/// Completes the lifecycle: the [`Rental`] becomes terminal, its return
/// moment is stamped and the [`Listing`] is released for new requests.
/// Requires a return [`Proof`] to exist.
///
/// [`Proof`]: proof::Proof
#[derive(Clone, Copy, Debug)]
pub struct ConfirmReturn {
    /// ID of the [`Rental`] to complete.
    pub rental_id: rental::Id,

    /// ID of the [`User`] confirming the return.
    ///
    /// Must be the owner of the rented [`Listing`].
    pub lender_id: user::Id,
}

impl<Db, Bs, Nt> Command<ConfirmReturn> for Service<Db, Bs, Nt>
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
            Lock<By<Listing, listing::Id>>,
            Err = Traced<database::Error>,
        > + Database<Lock<By<Rental, rental::Id>>, Err = Traced<database::Error>>
        + Database<
            Select<By<Option<Rental>, rental::Id>>,
            Ok = Option<Rental>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<Listing>, listing::Id>>,
            Ok = Option<Listing>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<read::proof::Exists, (rental::Id, proof::Kind)>>,
            Ok = read::proof::Exists,
            Err = Traced<database::Error>,
        > + Database<Update<Rental>, Err = Traced<database::Error>>
        + Database<Update<Listing>, Err = Traced<database::Error>>
        + Database<Insert<timeline::Event>, Err = Traced<database::Error>>
        + Database<Commit, Err = Traced<database::Error>>,
    Nt: Notifier<
        Notify<notify::Notification>,
        Ok = (),
        Err = Traced<notify::Error>,
    >,
{
    type Ok = Rental;
    type Err = Traced<ExecutionError>;

    async fn execute(&self, cmd: ConfirmReturn) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let ConfirmReturn {
            rental_id,
            lender_id,
        } = cmd;

        let lender = self
            .database()
            .execute(Select(By::<Option<User>, _>::new(lender_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::UserNotExists(lender_id))
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

        if rental.role_of(lender.id, &listing) != rental::Role::Lender {
            return Err(tracerr::new!(E::NotLender(lender.id)));
        }

        let tx = self
            .database()
            .execute(Transact)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        tx.execute(Lock(By::new(listing.id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;
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
        let mut listing = tx
            .execute(Select(By::<Option<Listing>, _>::new(rental.listing_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::ListingNotExists(rental.listing_id))
            .map_err(tracerr::wrap!())?;

        if !rental.is_status(rental::Status::ReturnProofPending) {
            return Err(tracerr::new!(E::NoProofPending(rental.status)));
        }

        let exists = tx
            .execute(Select(By::<read::proof::Exists, _>::new((
                rental_id,
                proof::Kind::Return,
            ))))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        if !*exists {
            return Err(tracerr::new!(E::ProofMissing));
        }

        rental.status = rental::Status::Completed;
        rental.return_at = Some(common::DateTime::now().coerce());
        tx.execute(Update(rental.clone()))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        listing.is_rented = false;
        tx.execute(Update(listing))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        tx.execute(Insert(timeline::Event::record(
            &rental,
            timeline::Kind::ReturnCompleted,
            lender.id,
            None,
        )))
        .await
        .map_err(tracerr::map_from_and_wrap!(=> E))
        .map(drop)?;

        tx.execute(Commit)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        if let Err(e) = self
            .notifier()
            .execute(Notify(notify::Notification {
                recipient: rental.renter_id,
                event: notify::Event::ReturnCompleted(rental.id),
            }))
            .await
        {
            tracing::warn!("failed to deliver notification: {e}");
        }

        Ok(rental)
    }
}

/// Error of [`ConfirmReturn`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// [`Listing`] of the [`Rental`] does not exist.
    #[display("`Listing(id: {_0})` does not exist")]
    ListingNotExists(#[error(not(source))] listing::Id),

    /// [`Rental`] has no return proof awaiting confirmation.
    #[display("return cannot be confirmed in the `{_0}` status")]
    NoProofPending(#[error(not(source))] rental::Status),

    /// Actor is not the lender of the [`Rental`].
    #[display("`User(id: {_0})` is not the lender of this rental")]
    NotLender(#[error(not(source))] user::Id),

    /// No return proof is stored for the [`Rental`].
    #[display("no return proof is stored for the rental")]
    ProofMissing,

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
            image, listing, period_days, rental, service, user,
        },
        domain::{rental::Status, timeline, Listing},
        infra::notify,
        Command as _,
    };

    use super::{ConfirmReturn, ExecutionError as E};

    #[tokio::test]
    async fn completes_the_rental_and_releases_the_listing() {
        let svc = service();
        let lender = user(&svc, "Lender");
        let renter = user(&svc, "Renter");
        let listing = listing(&svc, &lender);
        svc.database().seed_listing(Listing {
            is_rented: true,
            ..listing.clone()
        });
        let rental = rental(
            &svc,
            &listing,
            &renter,
            period_days(-4, 5),
            Status::ReturnScheduled,
        );

        // Submit the return proof first, then confirm.
        svc.execute(crate::command::SubmitReturnProof {
            rental_id: rental.id,
            renter_id: renter.id,
            image: image(),
            notes: None,
        })
        .await
        .unwrap();

        let completed = svc
            .execute(ConfirmReturn {
                rental_id: rental.id,
                lender_id: lender.id,
            })
            .await
            .unwrap();

        assert_eq!(completed.status, Status::Completed);
        assert!(completed.return_at.is_some());
        assert!(!svc.database().listing(listing.id).unwrap().is_rented);

        let events = svc.database().events_of(rental.id);
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].kind, timeline::Kind::ReturnCompleted);

        let sent = svc.notifier().sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].recipient, renter.id);
        assert_eq!(sent[0].event, notify::Event::ReturnCompleted(rental.id));
    }

    #[tokio::test]
    async fn requires_a_stored_return_proof() {
        let svc = service();
        let lender = user(&svc, "Lender");
        let renter = user(&svc, "Renter");
        let listing = listing(&svc, &lender);
        let rental = rental(
            &svc,
            &listing,
            &renter,
            period_days(-4, 5),
            Status::ReturnProofPending,
        );

        let err = svc
            .execute(ConfirmReturn {
                rental_id: rental.id,
                lender_id: lender.id,
            })
            .await
            .unwrap_err();

        assert!(matches!(err.as_ref(), E::ProofMissing));
    }

    #[tokio::test]
    async fn only_the_lender_may_confirm() {
        let svc = service();
        let lender = user(&svc, "Lender");
        let renter = user(&svc, "Renter");
        let listing = listing(&svc, &lender);
        let rental = rental(
            &svc,
            &listing,
            &renter,
            period_days(-4, 5),
            Status::ReturnProofPending,
        );

        let err = svc
            .execute(ConfirmReturn {
                rental_id: rental.id,
                lender_id: renter.id,
            })
            .await
            .unwrap_err();

        assert!(matches!(err.as_ref(), E::NotLender(id) if *id == renter.id));
    }

    #[tokio::test]
    async fn requires_the_return_proof_pending_status() {
        let svc = service();
        let lender = user(&svc, "Lender");
        let renter = user(&svc, "Renter");
        let listing = listing(&svc, &lender);
        let rental = rental(
            &svc,
            &listing,
            &renter,
            period_days(-4, 5),
            Status::Active,
        );

        let err = svc
            .execute(ConfirmReturn {
                rental_id: rental.id,
                lender_id: lender.id,
            })
            .await
            .unwrap_err();

        assert!(matches!(err.as_ref(), E::NoProofPending(Status::Active)));
    }
}
