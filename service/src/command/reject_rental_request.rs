//! [`Command`] for rejecting a rental request.

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
    Service,
};

use super::Command;

/// [`Command`] for rejecting a pending [`Rental`] request.
///
/// The chosen [`rejection::Reason`] is attached as a [`rejection::Record`];
/// a free-form [`Feedback`] note is required when the reason is the
/// [`rejection::Code::Other`] one.
///
/// [`Feedback`]: reason::Feedback
#[derive(Clone, Debug)]
pub struct RejectRentalRequest {
    /// ID of the [`Rental`] to reject.
    pub rental_id: rental::Id,

    /// ID of the [`User`] rejecting the request.
    ///
    /// Must be the owner of the rented [`Listing`].
    pub lender_id: user::Id,

    /// ID of the [`rejection::Reason`] to attribute.
    pub reason_id: rejection::Id,

    /// Optional free-form note of the lender.
    pub feedback: Option<reason::Feedback>,
}

impl<Db, Bs, Nt> Command<RejectRentalRequest> for Service<Db, Bs, Nt>
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
            Select<By<Option<rejection::Reason>, rejection::Id>>,
            Ok = Option<rejection::Reason>,
            Err = Traced<database::Error>,
        >,
    Transacted<Db>: Database<
            Lock<By<Rental, rental::Id>>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<Rental>, rental::Id>>,
            Ok = Option<Rental>,
            Err = Traced<database::Error>,
        > + Database<Update<Rental>, Err = Traced<database::Error>>
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
        cmd: RejectRentalRequest,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let RejectRentalRequest {
            rental_id,
            lender_id,
            reason_id,
            feedback,
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

        let reason = self
            .database()
            .execute(Select(By::<Option<rejection::Reason>, _>::new(
                reason_id,
            )))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::ReasonNotExists(reason_id))
            .map_err(tracerr::wrap!())?;
        if reason.code == rejection::Code::Other && feedback.is_none() {
            return Err(tracerr::new!(E::FeedbackRequired));
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

        if !rental.can_reject() {
            return Err(tracerr::new!(E::NotPending(rental.status)));
        }

        rental.status = rental::Status::Rejected;
        tx.execute(Update(rental.clone()))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        tx.execute(Insert(rejection::Record {
            rental_id: rental.id,
            reason_id: reason.id,
            feedback,
            attributed_by: lender.id,
            created_at: common::DateTime::now().coerce(),
        }))
        .await
        .map_err(tracerr::map_from_and_wrap!(=> E))
        .map(drop)?;

        tx.execute(Insert(timeline::Event::record(
            &rental,
            timeline::Kind::Rejected,
            lender.id,
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

        if let Err(e) = self
            .notifier()
            .execute(Notify(notify::Notification {
                recipient: rental.renter_id,
                event: notify::Event::RequestRejected(rental.id),
            }))
            .await
        {
            tracing::warn!("failed to deliver notification: {e}");
        }

        Ok(rental)
    }
}

/// Error of [`RejectRentalRequest`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// Free-form reason was chosen without a feedback note.
    #[display("`Other` rejection reason requires a feedback note")]
    FeedbackRequired,

    /// [`Listing`] of the [`Rental`] does not exist.
    #[display("`Listing(id: {_0})` does not exist")]
    ListingNotExists(#[error(not(source))] listing::Id),

    /// Actor is not the lender of the [`Rental`].
    #[display("`User(id: {_0})` is not the lender of this rental")]
    NotLender(#[error(not(source))] user::Id),

    /// [`Rental`] is not pending anymore.
    #[display("`Rental` cannot be rejected in the `{_0}` status")]
    NotPending(#[error(not(source))] rental::Status),

    /// [`rejection::Reason`] with the provided ID does not exist.
    #[display("`rejection::Reason(id: {_0})` does not exist")]
    ReasonNotExists(#[error(not(source))] rejection::Id),

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
            listing, period_days, rejection_reasons, rental, service, user,
        },
        domain::{
            reason::{rejection, Feedback},
            rental::Status,
            timeline,
        },
        infra::notify,
        Command as _,
    };

    use super::{RejectRentalRequest, ExecutionError as E};

    #[tokio::test]
    async fn rejects_with_record_and_notification() {
        let svc = service();
        let lender = user(&svc, "Lender");
        let renter = user(&svc, "Renter");
        let listing = listing(&svc, &lender);
        let reasons = rejection_reasons(&svc);
        let rental = rental(
            &svc,
            &listing,
            &renter,
            period_days(2, 5),
            Status::Pending,
        );

        let rejected = svc
            .execute(RejectRentalRequest {
                rental_id: rental.id,
                lender_id: lender.id,
                reason_id: reasons[1].id,
                feedback: None,
            })
            .await
            .unwrap();

        assert_eq!(rejected.status, Status::Rejected);
        assert!(!svc.database().listing(listing.id).unwrap().is_rented);

        let records = svc.database().rejection_records_of(rental.id);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].reason_id, reasons[1].id);
        assert_eq!(records[0].attributed_by, lender.id);
        assert_eq!(records[0].feedback, None);

        let events = svc.database().events_of(rental.id);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, timeline::Kind::Rejected);

        let sent = svc.notifier().sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].recipient, renter.id);
        assert_eq!(sent[0].event, notify::Event::RequestRejected(rental.id));
    }

    #[tokio::test]
    async fn other_reason_requires_feedback() {
        let svc = service();
        let lender = user(&svc, "Lender");
        let renter = user(&svc, "Renter");
        let listing = listing(&svc, &lender);
        let reasons = rejection_reasons(&svc);
        let other = reasons
            .iter()
            .find(|r| r.code == rejection::Code::Other)
            .unwrap();
        let rental = rental(
            &svc,
            &listing,
            &renter,
            period_days(2, 5),
            Status::Pending,
        );

        let err = svc
            .execute(RejectRentalRequest {
                rental_id: rental.id,
                lender_id: lender.id,
                reason_id: other.id,
                feedback: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err.as_ref(), E::FeedbackRequired));

        // With a note attached the same reason goes through.
        svc.execute(RejectRentalRequest {
            rental_id: rental.id,
            lender_id: lender.id,
            reason_id: other.id,
            feedback: Feedback::new("Dates won't work for me"),
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn only_the_lender_may_reject() {
        let svc = service();
        let lender = user(&svc, "Lender");
        let renter = user(&svc, "Renter");
        let listing = listing(&svc, &lender);
        let reasons = rejection_reasons(&svc);
        let rental = rental(
            &svc,
            &listing,
            &renter,
            period_days(2, 5),
            Status::Pending,
        );

        let err = svc
            .execute(RejectRentalRequest {
                rental_id: rental.id,
                lender_id: renter.id,
                reason_id: reasons[0].id,
                feedback: None,
            })
            .await
            .unwrap_err();

        assert!(
            matches!(err.as_ref(), E::NotLender(id) if *id == renter.id),
        );
    }

    #[tokio::test]
    async fn rejects_pending_rentals_only() {
        let svc = service();
        let lender = user(&svc, "Lender");
        let renter = user(&svc, "Renter");
        let listing = listing(&svc, &lender);
        let reasons = rejection_reasons(&svc);
        let rental = rental(
            &svc,
            &listing,
            &renter,
            period_days(2, 5),
            Status::Active,
        );

        let err = svc
            .execute(RejectRentalRequest {
                rental_id: rental.id,
                lender_id: lender.id,
                reason_id: reasons[0].id,
                feedback: None,
            })
            .await
            .unwrap_err();

        assert!(matches!(err.as_ref(), E::NotPending(Status::Active)));
    }
}
