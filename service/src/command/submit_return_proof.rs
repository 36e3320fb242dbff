//! [`Command`] for submitting a return proof.

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

/// [`Command`] for the renter to evidence returning the item.
///
/// Requires an agreed return appointment first: the proof documents the item
/// changing hands at that appointment, and its existence is what the
/// lender's confirmation is gated on.
#[derive(Clone, Debug)]
pub struct SubmitReturnProof {
    /// ID of the [`Rental`] being returned.
    pub rental_id: rental::Id,

    /// ID of the [`User`] submitting the proof.
    ///
    /// Must be the renter of the [`Rental`].
    pub renter_id: user::Id,

    /// Validated proof [`proof::Image`].
    pub image: proof::Image,

    /// Optional free-form [`proof::Notes`].
    pub notes: Option<proof::Notes>,
}

impl<Db, Bs, Nt> Command<SubmitReturnProof> for Service<Db, Bs, Nt>
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
        cmd: SubmitReturnProof,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let SubmitReturnProof {
            rental_id,
            renter_id,
            image,
            notes,
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
        if !rental.is_status(rental::Status::ReturnScheduled) {
            return Err(tracerr::new!(E::NotScheduled(rental.status)));
        }

        let blob = self
            .blobs()
            .execute(Store(blob::Upload {
                bucket: blob::Bucket::ReturnProofs,
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

        if !rental.is_status(rental::Status::ReturnScheduled) {
            return Err(tracerr::new!(E::NotScheduled(rental.status)));
        }

        tx.execute(Insert(proof::Proof {
            id: proof::Id::new(),
            rental_id: rental.id,
            kind: proof::Kind::Return,
            blob,
            submitted_by: renter.id,
            notes,
            created_at: common::DateTime::now().coerce(),
        }))
        .await
        .map_err(tracerr::map_from_and_wrap!(=> E))
        .map(drop)?;

        rental.status = rental::Status::ReturnProofPending;
        tx.execute(Update(rental.clone()))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        tx.execute(Insert(timeline::Event::record(
            &rental,
            timeline::Kind::ReturnProofSubmitted,
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

/// Error of [`SubmitReturnProof`] [`Command`] execution.
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

    /// Actor is not the renter of the [`Rental`].
    #[display("`User(id: {_0})` is not the renter of this rental")]
    NotRenter(#[error(not(source))] user::Id),

    /// [`Rental`] has no return appointment scheduled yet.
    #[display("return proof cannot be submitted in the `{_0}` status")]
    NotScheduled(#[error(not(source))] rental::Status),

    /// [`Rental`] with the provided ID does not exist.
    #[display("`Rental(id: {_0})` does not exist")]
    RentalNotExists(#[error(not(source))] rental::Id),

    /// [`User`] with the provided ID does not exist.
    #[display("`User(id: {_0})` does not exist")]
    UserNotExists(#[error(not(source))] user::Id),
}
