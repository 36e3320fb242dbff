//! [`Command`] for approving a rental request.

use common::operations::{
    By, Commit, Insert, Lock, Notify, Select, Transact, Transacted, Update,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;

use crate::{
    domain::{
        listing,
        reason::{self, rejection},
        rental, timeline, user, Listing, Rental, User,
    },
    infra::{database, notify, Database, Notifier},
    read,
    Service,
};

use super::Command;

/// [`Command`] for approving a pending [`Rental`] request.
///
/// Approval grants the requested [`Period`] to exactly one renter: within
/// the same transaction, every other pending request of the [`Listing`]
/// whose [`Period`] overlaps the granted one is auto-rejected with an
/// "unavailable" reason naming the winning [`Period`].
///
/// [`Period`]: common::Period
#[derive(Clone, Copy, Debug)]
pub struct ApproveRentalRequest {
    /// ID of the [`Rental`] to approve.
    pub rental_id: rental::Id,

    /// ID of the [`User`] approving the request.
    ///
    /// Must be the owner of the rented [`Listing`].
    pub lender_id: user::Id,
}

impl<Db, Bs, Nt> Command<ApproveRentalRequest> for Service<Db, Bs, Nt>
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
            Select<
                By<
                    Vec<read::rental::Pending<Rental>>,
                    read::rental::OverlappingWith,
                >,
            >,
            Ok = Vec<read::rental::Pending<Rental>>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<rejection::Reason>, rejection::Code>>,
            Ok = Option<rejection::Reason>,
            Err = Traced<database::Error>,
        > + Database<Update<Rental>, Err = Traced<database::Error>>
        + Database<Update<Listing>, Err = Traced<database::Error>>
        + Database<Insert<rejection::Record>, Err = Traced<database::Error>>
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
        cmd: ApproveRentalRequest,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let ApproveRentalRequest {
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

        // Serializes concurrent approvals over the same `Listing`: the loser
        // of the race re-reads the flags below and fails.
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

        if !rental.is_status(rental::Status::Pending) {
            return Err(tracerr::new!(E::NotPending(rental.status)));
        }
        if listing.is_rented {
            return Err(tracerr::new!(E::ListingAlreadyRented(listing.id)));
        }

        rental.status = rental::Status::Approved;
        tx.execute(Update(rental.clone()))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        listing.is_rented = true;
        tx.execute(Update(listing.clone()))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        tx.execute(Insert(timeline::Event::record(
            &rental,
            timeline::Kind::Approved,
            lender.id,
            None,
        )))
        .await
        .map_err(tracerr::map_from_and_wrap!(=> E))
        .map(drop)?;

        let losers = tx
            .execute(Select(By::<Vec<read::rental::Pending<Rental>>, _>::new(
                read::rental::OverlappingWith {
                    listing_id: listing.id,
                    period: rental.period,
                    exclude: rental.id,
                },
            )))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        let mut rejected = Vec::with_capacity(losers.len());
        if !losers.is_empty() {
            let unavailable = tx
                .execute(Select(By::<Option<rejection::Reason>, _>::new(
                    rejection::Code::Unavailable,
                )))
                .await
                .map_err(tracerr::map_from_and_wrap!(=> E))?
                .ok_or(E::NoUnavailableReason)
                .map_err(tracerr::wrap!())?;

            for read::rental::Pending(mut loser) in losers {
                loser.status = rental::Status::Rejected;
                tx.execute(Update(loser.clone()))
                    .await
                    .map_err(tracerr::map_from_and_wrap!(=> E))
                    .map(drop)?;

                tx.execute(Insert(rejection::Record {
                    rental_id: loser.id,
                    reason_id: unavailable.id,
                    feedback: reason::Feedback::new(format!(
                        "Listing is already booked for {}",
                        rental.period,
                    )),
                    attributed_by: lender.id,
                    created_at: common::DateTime::now().coerce(),
                }))
                .await
                .map_err(tracerr::map_from_and_wrap!(=> E))
                .map(drop)?;

                tx.execute(Insert(timeline::Event::record(
                    &loser,
                    timeline::Kind::Rejected,
                    lender.id,
                    Some(
                        serde_json::json!({
                            "auto": true,
                            "winning_period": rental.period.to_string(),
                        })
                        .into(),
                    ),
                )))
                .await
                .map_err(tracerr::map_from_and_wrap!(=> E))
                .map(drop)?;

                rejected.push(loser);
            }
        }

        tx.execute(Commit)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        let mut notifications = vec![notify::Notification {
            recipient: rental.renter_id,
            event: notify::Event::RequestApproved(rental.id),
        }];
        notifications.extend(rejected.iter().map(|loser| {
            notify::Notification {
                recipient: loser.renter_id,
                event: notify::Event::RequestRejected(loser.id),
            }
        }));
        for notification in notifications {
            if let Err(e) =
                self.notifier().execute(Notify(notification)).await
            {
                tracing::warn!("failed to deliver notification: {e}");
            }
        }

        Ok(rental)
    }
}

/// Error of [`ApproveRentalRequest`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// [`Listing`] is already handed over under another [`Rental`].
    #[display("`Listing(id: {_0})` is already rented out")]
    ListingAlreadyRented(#[error(not(source))] listing::Id),

    /// [`Listing`] of the [`Rental`] does not exist.
    #[display("`Listing(id: {_0})` does not exist")]
    ListingNotExists(#[error(not(source))] listing::Id),

    /// Rejection reason catalog has no "unavailable" entry to auto-reject
    /// conflicting requests with.
    #[display("no `Unavailable` rejection reason is configured")]
    NoUnavailableReason,

    /// Actor is not the lender of the [`Rental`].
    #[display("`User(id: {_0})` is not the lender of this rental")]
    NotLender(#[error(not(source))] user::Id),

    /// [`Rental`] is not pending anymore.
    #[display("`Rental` cannot be approved in the `{_0}` status")]
    NotPending(#[error(not(source))] rental::Status),

    /// [`Rental`] with the provided ID does not exist.
    #[display("`Rental(id: {_0})` does not exist")]
    RentalNotExists(#[error(not(source))] rental::Id),

    /// [`User`] with the provided ID does not exist.
    #[display("`User(id: {_0})` does not exist")]
    UserNotExists(#[error(not(source))] user::Id),
}
