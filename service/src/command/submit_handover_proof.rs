//! [`Command`] for submitting a handover proof.

use common::operations::{
    By, Commit, Insert, Lock, Select, Store, Transact, Transacted, Update,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;

use crate::{
    domain::{listing, proof, rental, timeline, user, Listing, Rental, User},
    infra::{blob, database, BlobStore, Database},
    Service,
};

use super::Command;

/// [`Command`] for the lender to evidence handing the item over.
///
/// The image is uploaded to the blob storage before the transaction opens,
/// so a failed upload leaves the [`Rental`] untouched. The lender may
/// resubmit while the renter hasn't confirmed receipt yet; each submission
/// appends a new [`Proof`].
#[derive(Clone, Debug)]
pub struct SubmitHandoverProof {
    /// ID of the [`Rental`] being handed over.
    pub rental_id: rental::Id,

    /// ID of the [`User`] submitting the proof.
    ///
    /// Must be the owner of the rented [`Listing`].
    pub lender_id: user::Id,

    /// Validated proof [`proof::Image`].
    pub image: proof::Image,

    /// Optional free-form [`proof::Notes`].
    pub notes: Option<proof::Notes>,
}

impl<Db, Bs, Nt> Command<SubmitHandoverProof> for Service<Db, Bs, Nt>
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
        > + Database<Insert<proof::Proof>, Err = Traced<database::Error>>
        + Database<Update<Rental>, Err = Traced<database::Error>>
        + Database<Insert<timeline::Event>, Err = Traced<database::Error>>
        + Database<Commit, Err = Traced<database::Error>>,
    Bs: BlobStore<
        Store<blob::Upload>,
        Ok = proof::BlobPath,
        Err = Traced<blob::Error>,
    >,
{
    type Ok = Rental;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        cmd: SubmitHandoverProof,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let SubmitHandoverProof {
            rental_id,
            lender_id,
            image,
            notes,
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
        if !matches!(
            rental.status,
            rental::Status::ToHandover | rental::Status::PendingProof,
        ) {
            return Err(tracerr::new!(E::NotInHandover(rental.status)));
        }

        let blob = self
            .blobs()
            .execute(Store(blob::Upload {
                bucket: blob::Bucket::HandoverProofs,
                rental_id,
                image,
            }))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

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

        if !matches!(
            rental.status,
            rental::Status::ToHandover | rental::Status::PendingProof,
        ) {
            return Err(tracerr::new!(E::NotInHandover(rental.status)));
        }

        tx.execute(Insert(proof::Proof {
            id: proof::Id::new(),
            rental_id: rental.id,
            kind: proof::Kind::Handover,
            blob,
            submitted_by: lender.id,
            notes,
            created_at: common::DateTime::now().coerce(),
        }))
        .await
        .map_err(tracerr::map_from_and_wrap!(=> E))
        .map(drop)?;

        if rental.is_status(rental::Status::ToHandover) {
            rental.status = rental::Status::PendingProof;
            tx.execute(Update(rental.clone()))
                .await
                .map_err(tracerr::map_from_and_wrap!(=> E))
                .map(drop)?;
        }

        tx.execute(Insert(timeline::Event::record(
            &rental,
            timeline::Kind::Handover,
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

        Ok(rental)
    }
}

/// Error of [`SubmitHandoverProof`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`BlobStore`] error.
    #[display("`BlobStore` operation failed: {_0}")]
    #[from]
    Blob(blob::Error),

    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// [`Listing`] of the [`Rental`] does not exist.
    #[display("`Listing(id: {_0})` does not exist")]
    ListingNotExists(#[error(not(source))] listing::Id),

    /// [`Rental`] is not in a handover phase.
    #[display("handover proof cannot be submitted in the `{_0}` status")]
    NotInHandover(#[error(not(source))] rental::Status),

    /// Actor is not the lender of the [`Rental`].
    #[display("`User(id: {_0})` is not the lender of this rental")]
    NotLender(#[error(not(source))] user::Id),

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
        domain::{proof, rental::Status, timeline},
        Command as _,
    };

    use super::{SubmitHandoverProof, ExecutionError as E};

    #[tokio::test]
    async fn first_proof_moves_rental_to_pending_proof() {
        let svc = service();
        let lender = user(&svc, "Lender");
        let renter = user(&svc, "Renter");
        let listing = listing(&svc, &lender);
        let rental = rental(
            &svc,
            &listing,
            &renter,
            period_days(2, 5),
            Status::ToHandover,
        );

        let updated = svc
            .execute(SubmitHandoverProof {
                rental_id: rental.id,
                lender_id: lender.id,
                image: image(),
                notes: proof::Notes::new("Dropped off at the lobby"),
            })
            .await
            .unwrap();

        assert_eq!(updated.status, Status::PendingProof);
        assert_eq!(svc.blobs().uploads(), 1);

        let proofs = svc.database().proofs_of(rental.id);
        assert_eq!(proofs.len(), 1);
        assert_eq!(proofs[0].kind, proof::Kind::Handover);
        assert_eq!(proofs[0].submitted_by, lender.id);
        assert!(proofs[0].notes.is_some());

        let events = svc.database().events_of(rental.id);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, timeline::Kind::Handover);
    }

    #[tokio::test]
    async fn resubmission_appends_without_changing_status() {
        let svc = service();
        let lender = user(&svc, "Lender");
        let renter = user(&svc, "Renter");
        let listing = listing(&svc, &lender);
        let rental = rental(
            &svc,
            &listing,
            &renter,
            period_days(2, 5),
            Status::ToHandover,
        );

        for _ in 0..2 {
            svc.execute(SubmitHandoverProof {
                rental_id: rental.id,
                lender_id: lender.id,
                image: image(),
                notes: None,
            })
            .await
            .unwrap();
        }

        assert_eq!(
            svc.database().rental(rental.id).unwrap().status,
            Status::PendingProof,
        );
        assert_eq!(svc.database().proofs_of(rental.id).len(), 2);
        assert_eq!(svc.blobs().uploads(), 2);
    }

    #[tokio::test]
    async fn only_the_lender_may_submit() {
        let svc = service();
        let lender = user(&svc, "Lender");
        let renter = user(&svc, "Renter");
        let listing = listing(&svc, &lender);
        let rental = rental(
            &svc,
            &listing,
            &renter,
            period_days(2, 5),
            Status::ToHandover,
        );

        let err = svc
            .execute(SubmitHandoverProof {
                rental_id: rental.id,
                lender_id: renter.id,
                image: image(),
                notes: None,
            })
            .await
            .unwrap_err();

        assert!(matches!(err.as_ref(), E::NotLender(id) if *id == renter.id));
        assert_eq!(svc.blobs().uploads(), 0);
    }

    #[tokio::test]
    async fn rejects_outside_the_handover_phase() {
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
            .execute(SubmitHandoverProof {
                rental_id: rental.id,
                lender_id: lender.id,
                image: image(),
                notes: None,
            })
            .await
            .unwrap_err();

        assert!(matches!(
            err.as_ref(),
            E::NotInHandover(Status::Approved),
        ));
        assert_eq!(svc.blobs().uploads(), 0);
    }
}
