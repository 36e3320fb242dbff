//! [`Command`] for creating a rental request.

use common::{
    operations::{By, Commit, Insert, Lock, Notify, Select, Transact, Transacted},
    DateTime, Day, Money, Period,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;

use crate::{
    domain::{
        listing, rental, timeline, user, Listing, Rental, User,
    },
    infra::{database, notify, Database, Notifier},
    read,
    Service,
};

use super::Command;

/// [`Command`] for creating a new [`Rental`] request of a [`Listing`].
///
/// The created [`Rental`] starts in [`rental::Status::Pending`], awaiting the
/// lender's decision. Requested [`Period`]s of different renters are allowed
/// to overlap at this point; conflicts are resolved at approval time.
#[derive(Clone, Copy, Debug)]
pub struct CreateRentalRequest {
    /// ID of the [`Listing`] to rent.
    pub listing_id: listing::Id,

    /// ID of the [`User`] requesting the rent.
    pub renter_id: user::Id,

    /// Calendar-day [`Period`] to rent for, inclusive on both ends.
    pub period: Period,

    /// Discount granted to the renter.
    pub discount: Money,

    /// Fee retained by the marketplace.
    pub service_fee: Money,

    /// Refundable deposit collected from the renter.
    pub deposit_fee: Money,
}

impl<Db, Bs, Nt> Command<CreateRentalRequest> for Service<Db, Bs, Nt>
where
    Db: Database<Transact, Err = Traced<database::Error>>
        + Database<
            Select<By<Option<User>, user::Id>>,
            Ok = Option<User>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<Listing>, listing::Id>>,
            Ok = Option<Listing>,
            Err = Traced<database::Error>,
        >,
    Transacted<Db>: Database<
            Lock<By<Listing, listing::Id>>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<Listing>, listing::Id>>,
            Ok = Option<Listing>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<Rental>, read::rental::NonTerminalFor>>,
            Ok = Option<Rental>,
            Err = Traced<database::Error>,
        > + Database<Insert<Rental>, Err = Traced<database::Error>>
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
        cmd: CreateRentalRequest,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let CreateRentalRequest {
            listing_id,
            renter_id,
            period,
            discount,
            service_fee,
            deposit_fee,
        } = cmd;

        if period.start() < self.today() {
            return Err(tracerr::new!(E::StartsInPast(period.start())));
        }

        let renter = self
            .database()
            .execute(Select(By::<Option<User>, _>::new(renter_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::UserNotExists(renter_id))
            .map_err(tracerr::wrap!())?;

        let listing = self
            .database()
            .execute(Select(By::<Option<Listing>, _>::new(listing_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::ListingNotExists(listing_id))
            .map_err(tracerr::wrap!())?;

        if listing.owner_id == renter.id {
            return Err(tracerr::new!(E::OwnListingForbidden(renter.id)));
        }

        let tx = self
            .database()
            .execute(Transact)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        // Serializes concurrent requests of the same `Listing`, so the
        // duplicate check below cannot race.
        tx.execute(Lock(By::new(listing_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        let listing = tx
            .execute(Select(By::<Option<Listing>, _>::new(listing_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::ListingNotExists(listing_id))
            .map_err(tracerr::wrap!())?;
        if !listing.is_rentable() {
            return Err(tracerr::new!(E::ListingNotRentable(listing_id)));
        }

        if let Some(existing) = tx
            .execute(Select(By::<Option<Rental>, _>::new(
                read::rental::NonTerminalFor {
                    listing_id,
                    renter_id,
                },
            )))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
        {
            return Err(tracerr::new!(match existing.status {
                rental::Status::Pending => {
                    E::PendingRequestExists(existing.id)
                }
                rental::Status::Approved => {
                    E::ApprovedRequestExists(existing.id)
                }
                rental::Status::ToHandover
                | rental::Status::PendingProof
                | rental::Status::Active
                | rental::Status::PendingReturn
                | rental::Status::ReturnScheduled
                | rental::Status::ReturnProofPending
                | rental::Status::Completed
                | rental::Status::Rejected
                | rental::Status::Cancelled => {
                    E::RentalInProgress(existing.id)
                }
            }));
        }

        let base_price =
            listing.daily_price.saturating_mul(period.duration_days());
        let rental = Rental {
            id: rental::Id::new(),
            listing_id,
            renter_id,
            period,
            terms: rental::Terms {
                base_price,
                discount,
                service_fee,
                deposit_fee,
                total_price: base_price
                    .saturating_sub(discount)
                    .saturating_add(service_fee)
                    .saturating_add(deposit_fee),
            },
            status: rental::Status::Pending,
            return_appointment: None,
            handover_at: None,
            return_at: None,
            created_at: DateTime::now().coerce(),
        };

        tx.execute(Insert(rental.clone()))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        tx.execute(Insert(timeline::Event::record(
            &rental,
            timeline::Kind::Requested,
            renter.id,
            Some(
                serde_json::json!({ "period": rental.period.to_string() })
                    .into(),
            ),
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
                recipient: listing.owner_id,
                event: notify::Event::RequestReceived(rental.id),
            }))
            .await
        {
            tracing::warn!("failed to deliver notification: {e}");
        }

        Ok(rental)
    }
}

/// Error of [`CreateRentalRequest`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// Renter already has an approved [`Rental`] of this [`Listing`]
    /// awaiting payment.
    #[display(
        "`Rental(id: {_0})` of this listing is already approved and awaits \
         payment"
    )]
    ApprovedRequestExists(#[error(not(source))] rental::Id),

    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// [`Listing`] with the provided ID does not exist.
    #[display("`Listing(id: {_0})` does not exist")]
    ListingNotExists(#[error(not(source))] listing::Id),

    /// [`Listing`] is unpublished or already handed over to a renter.
    #[display("`Listing(id: {_0})` cannot accept rental requests")]
    ListingNotRentable(#[error(not(source))] listing::Id),

    /// Renter is the owner of the [`Listing`].
    #[display("`User(id: {_0})` cannot rent their own listing")]
    OwnListingForbidden(#[error(not(source))] user::Id),

    /// Renter already has a pending [`Rental`] request of this [`Listing`].
    #[display("`Rental(id: {_0})` of this listing is already pending")]
    PendingRequestExists(#[error(not(source))] rental::Id),

    /// Renter already has an in-progress [`Rental`] of this [`Listing`].
    #[display("`Rental(id: {_0})` of this listing is still in progress")]
    RentalInProgress(#[error(not(source))] rental::Id),

    /// Requested [`Period`] starts before today.
    #[display("rental period cannot start in the past (on {_0})")]
    StartsInPast(#[error(not(source))] Day),

    /// [`User`] with the provided ID does not exist.
    #[display("`User(id: {_0})` does not exist")]
    UserNotExists(#[error(not(source))] user::Id),
}
