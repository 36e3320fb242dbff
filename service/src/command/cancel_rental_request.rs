//! [`Command`] for cancelling a rental.

use common::operations::{
    By, Commit, Insert, Lock, Notify, Select, Transact, Transacted, Update,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;

use crate::{
    domain::{
        listing, payment,
        reason::{self, cancellation},
        rental, timeline, user, Listing, Rental, User,
    },
    infra::{database, notify, Database, Notifier},
    read,
    Service,
};

use super::Command;

/// [`Command`] for cancelling a [`Rental`] before it becomes active.
///
/// Either side may cancel, within the window its [`rental::Role`] allows:
/// the renter while the rental is pending or approved-but-unpaid, the lender
/// while it's approved-but-unpaid only. A verified or still-pending payment
/// closes the window for both.
#[derive(Clone, Debug)]
pub struct CancelRentalRequest {
    /// ID of the [`Rental`] to cancel.
    pub rental_id: rental::Id,

    /// ID of the [`User`] cancelling the rental.
    ///
    /// Must be the renter or the lender of the [`Rental`].
    pub actor_id: user::Id,

    /// ID of the [`cancellation::Reason`] to attribute.
    pub reason_id: cancellation::Id,

    /// Optional free-form note of the actor.
    pub feedback: Option<reason::Feedback>,
}

impl<Db, Bs, Nt> Command<CancelRentalRequest> for Service<Db, Bs, Nt>
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
        > + Database<
            Select<By<Option<cancellation::Reason>, cancellation::Id>>,
            Ok = Option<cancellation::Reason>,
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
            Select<
                By<
                    Option<read::payment::Latest<payment::Request>>,
                    rental::Id,
                >,
            >,
            Ok = Option<read::payment::Latest<payment::Request>>,
            Err = Traced<database::Error>,
        > + Database<Update<Rental>, Err = Traced<database::Error>>
        + Database<Update<Listing>, Err = Traced<database::Error>>
        + Database<Insert<cancellation::Record>, Err = Traced<database::Error>>
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

    async fn execute(
        &self,
        cmd: CancelRentalRequest,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let CancelRentalRequest {
            rental_id,
            actor_id,
            reason_id,
            feedback,
        } = cmd;

        let actor = self
            .database()
            .execute(Select(By::<Option<User>, _>::new(actor_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::UserNotExists(actor_id))
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

        let role = rental.role_of(actor.id, &listing);
        if role == rental::Role::Neither {
            return Err(tracerr::new!(E::NotParticipant(actor.id)));
        }

        let reason = self
            .database()
            .execute(Select(By::<Option<cancellation::Reason>, _>::new(
                reason_id,
            )))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::ReasonNotExists(reason_id))
            .map_err(tracerr::wrap!())?;
        if !reason.applies_to(role) {
            return Err(tracerr::new!(E::ReasonNotAllowed(reason_id)));
        }
        if reason.code == cancellation::Code::Other && feedback.is_none() {
            return Err(tracerr::new!(E::FeedbackRequired));
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

        // The latest payment is re-read under the lock: a payment submitted
        // after the pre-checks must still close the cancellation window.
        let latest = tx
            .execute(Select(By::<
                Option<read::payment::Latest<payment::Request>>,
                _,
            >::new(rental_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        if !rental
            .can_cancel(role, latest.as_ref().map(|l| &l.0))
        {
            return Err(tracerr::new!(E::CannotCancel(rental.status)));
        }

        let was_approved = rental.is_status(rental::Status::Approved);
        rental.status = rental::Status::Cancelled;
        tx.execute(Update(rental.clone()))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        if was_approved {
            // An approved rental holds the listing; cancelling releases it.
            let mut listing = listing.clone();
            listing.is_rented = false;
            tx.execute(Update(listing))
                .await
                .map_err(tracerr::map_from_and_wrap!(=> E))
                .map(drop)?;
        }

        tx.execute(Insert(cancellation::Record {
            rental_id: rental.id,
            reason_id: reason.id,
            feedback,
            attributed_by: actor.id,
            created_at: common::DateTime::now().coerce(),
        }))
        .await
        .map_err(tracerr::map_from_and_wrap!(=> E))
        .map(drop)?;

        tx.execute(Insert(timeline::Event::record(
            &rental,
            timeline::Kind::Cancelled,
            actor.id,
            Some(
                serde_json::json!({"reason": reason.label.to_string()}).into(),
            ),
        )))
        .await
        .map_err(tracerr::map_from_and_wrap!(=> E))
        .map(drop)?;

        tx.execute(Commit)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        let counterparty = if role == rental::Role::Renter {
            listing.owner_id
        } else {
            rental.renter_id
        };
        if let Err(e) = self
            .notifier()
            .execute(Notify(notify::Notification {
                recipient: counterparty,
                event: notify::Event::RequestCancelled(rental.id),
            }))
            .await
        {
            tracing::warn!("failed to deliver notification: {e}");
        }

        Ok(rental)
    }
}

/// Error of [`CancelRentalRequest`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Rental`] cannot be cancelled by this actor anymore.
    #[display("`Rental` cannot be cancelled in the `{_0}` status")]
    CannotCancel(#[error(not(source))] rental::Status),

    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// Free-form reason was chosen without a feedback note.
    #[display("`Other` cancellation reason requires a feedback note")]
    FeedbackRequired,

    /// [`Listing`] of the [`Rental`] does not exist.
    #[display("`Listing(id: {_0})` does not exist")]
    ListingNotExists(#[error(not(source))] listing::Id),

    /// Actor is neither the renter nor the lender of the [`Rental`].
    #[display("`User(id: {_0})` is not a party of this rental")]
    NotParticipant(#[error(not(source))] user::Id),

    /// [`cancellation::Reason`] is not offered to the actor's role.
    #[display("`cancellation::Reason(id: {_0})` is not offered to this role")]
    ReasonNotAllowed(#[error(not(source))] cancellation::Id),

    /// [`cancellation::Reason`] with the provided ID does not exist.
    #[display("`cancellation::Reason(id: {_0})` does not exist")]
    ReasonNotExists(#[error(not(source))] cancellation::Id),

    /// [`Rental`] with the provided ID does not exist.
    #[display("`Rental(id: {_0})` does not exist")]
    RentalNotExists(#[error(not(source))] rental::Id),

    /// [`User`] with the provided ID does not exist.
    #[display("`User(id: {_0})` does not exist")]
    UserNotExists(#[error(not(source))] user::Id),
}
