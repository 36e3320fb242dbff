//! [`Command`] for scheduling the return appointment.

use common::{
    operations::{By, Commit, Insert, Lock, Select, Transact, Transacted, Update},
    Day,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;

use crate::{
    domain::{
        listing, rental, schedule, timeline, user, Listing, Rental, User,
    },
    infra::{database, Database},
    Service,
};

use super::Command;

/// [`Command`] for the renter to book a return appointment.
///
/// The appointment must land on a future [`Day`] falling on the weekday of
/// an active pickup [`schedule::Slot`] owned by the lender.
#[derive(Clone, Copy, Debug)]
pub struct ScheduleReturn {
    /// ID of the [`Rental`] being returned.
    pub rental_id: rental::Id,

    /// ID of the [`User`] booking the appointment.
    ///
    /// Must be the renter of the [`Rental`].
    pub renter_id: user::Id,

    /// ID of the lender's [`schedule::Slot`] to return within.
    pub slot_id: schedule::Id,

    /// [`Day`] the return happens on.
    pub date: Day,
}

impl<Db, Bs, Nt> Command<ScheduleReturn> for Service<Db, Bs, Nt>
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
            Select<By<Option<schedule::Slot>, schedule::Id>>,
            Ok = Option<schedule::Slot>,
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
        + Database<Insert<timeline::Event>, Err = Traced<database::Error>>
        + Database<Commit, Err = Traced<database::Error>>,
{
    type Ok = Rental;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        cmd: ScheduleReturn,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let ScheduleReturn {
            rental_id,
            renter_id,
            slot_id,
            date,
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

        if date < self.today() {
            return Err(tracerr::new!(E::DateInPast(date)));
        }

        let slot = self
            .database()
            .execute(Select(By::<Option<schedule::Slot>, _>::new(slot_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::SlotNotExists(slot_id))
            .map_err(tracerr::wrap!())?;
        if slot.lender_id != listing.owner_id {
            return Err(tracerr::new!(E::SlotWrongLender(slot_id)));
        }
        if !slot.is_active {
            return Err(tracerr::new!(E::SlotInactive(slot_id)));
        }
        if !slot.covers(date) {
            return Err(tracerr::new!(E::SlotDayMismatch(date)));
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

        if !rental.is_status(rental::Status::PendingReturn) {
            return Err(tracerr::new!(E::NotPendingReturn(rental.status)));
        }

        rental.return_appointment =
            Some(rental::ReturnAppointment { slot_id, date });
        rental.status = rental::Status::ReturnScheduled;
        tx.execute(Update(rental.clone()))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        tx.execute(Insert(timeline::Event::record(
            &rental,
            timeline::Kind::ReturnScheduled,
            renter.id,
            Some(
                serde_json::json!({
                    "slot_id": slot_id.to_string(),
                    "date": date.to_string(),
                })
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

        Ok(rental)
    }
}

/// Error of [`ScheduleReturn`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// Requested return [`Day`] is already in the past.
    #[display("return cannot be scheduled on the past day {_0}")]
    DateInPast(#[error(not(source))] Day),

    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// [`Listing`] of the [`Rental`] does not exist.
    #[display("`Listing(id: {_0})` does not exist")]
    ListingNotExists(#[error(not(source))] listing::Id),

    /// [`Rental`] has no return pending.
    #[display("return cannot be scheduled in the `{_0}` status")]
    NotPendingReturn(#[error(not(source))] rental::Status),

    /// Actor is not the renter of the [`Rental`].
    #[display("`User(id: {_0})` is not the renter of this rental")]
    NotRenter(#[error(not(source))] user::Id),

    /// Requested [`Day`] doesn't fall on the slot's weekday.
    #[display("day {_0} doesn't fall on the slot's weekday")]
    SlotDayMismatch(#[error(not(source))] Day),

    /// Chosen [`schedule::Slot`] is deactivated.
    #[display("`Slot(id: {_0})` is not active")]
    SlotInactive(#[error(not(source))] schedule::Id),

    /// [`schedule::Slot`] with the provided ID does not exist.
    #[display("`Slot(id: {_0})` does not exist")]
    SlotNotExists(#[error(not(source))] schedule::Id),

    /// Chosen [`schedule::Slot`] belongs to another lender.
    #[display("`Slot(id: {_0})` doesn't belong to the rental's lender")]
    SlotWrongLender(#[error(not(source))] schedule::Id),

    /// [`Rental`] with the provided ID does not exist.
    #[display("`Rental(id: {_0})` does not exist")]
    RentalNotExists(#[error(not(source))] rental::Id),

    /// [`User`] with the provided ID does not exist.
    #[display("`User(id: {_0})` does not exist")]
    UserNotExists(#[error(not(source))] user::Id),
}

#[cfg(test)]
mod spec {
    use common::{date::BUSINESS_OFFSET, Day};

    use crate::{
        command::fixtures::{
            listing, period_days, rental, service, slot_covering, user,
        },
        domain::{rental::Status, schedule, timeline},
        Command as _,
    };

    use super::{ScheduleReturn, ExecutionError as E};

    /// Returns the [`Day`] `n` days from today.
    fn day(n: i64) -> Day {
        Day::today(BUSINESS_OFFSET).plus_days(n).unwrap()
    }

    #[tokio::test]
    async fn books_the_appointment() {
        let svc = service();
        let lender = user(&svc, "Lender");
        let renter = user(&svc, "Renter");
        let listing = listing(&svc, &lender);
        let rental = rental(
            &svc,
            &listing,
            &renter,
            period_days(-4, 5),
            Status::PendingReturn,
        );
        let date = day(3);
        let slot = slot_covering(&svc, &lender, date);

        let updated = svc
            .execute(ScheduleReturn {
                rental_id: rental.id,
                renter_id: renter.id,
                slot_id: slot.id,
                date,
            })
            .await
            .unwrap();

        assert_eq!(updated.status, Status::ReturnScheduled);
        let appointment = updated.return_appointment.unwrap();
        assert_eq!(appointment.slot_id, slot.id);
        assert_eq!(appointment.date, date);

        let events = svc.database().events_of(rental.id);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, timeline::Kind::ReturnScheduled);
        assert!(events[0].metadata.is_some());
    }

    #[tokio::test]
    async fn rejects_misconfigured_slots() {
        let svc = service();
        let lender = user(&svc, "Lender");
        let renter = user(&svc, "Renter");
        let other_lender = user(&svc, "Other");
        let listing = listing(&svc, &lender);
        let rental = rental(
            &svc,
            &listing,
            &renter,
            period_days(-4, 5),
            Status::PendingReturn,
        );
        let date = day(3);

        // Nonexistent slot.
        let missing = schedule::Id::new();
        let err = svc
            .execute(ScheduleReturn {
                rental_id: rental.id,
                renter_id: renter.id,
                slot_id: missing,
                date,
            })
            .await
            .unwrap_err();
        assert!(matches!(
            err.as_ref(),
            E::SlotNotExists(id) if *id == missing,
        ));

        // Slot of an unrelated lender.
        let foreign = slot_covering(&svc, &other_lender, date);
        let err = svc
            .execute(ScheduleReturn {
                rental_id: rental.id,
                renter_id: renter.id,
                slot_id: foreign.id,
                date,
            })
            .await
            .unwrap_err();
        assert!(matches!(
            err.as_ref(),
            E::SlotWrongLender(id) if *id == foreign.id,
        ));

        // Deactivated slot.
        let inactive = schedule::Slot {
            is_active: false,
            ..slot_covering(&svc, &lender, date)
        };
        svc.database().seed_slot(inactive);
        let err = svc
            .execute(ScheduleReturn {
                rental_id: rental.id,
                renter_id: renter.id,
                slot_id: inactive.id,
                date,
            })
            .await
            .unwrap_err();
        assert!(matches!(
            err.as_ref(),
            E::SlotInactive(id) if *id == inactive.id,
        ));

        // Day off the slot's weekday.
        let active = slot_covering(&svc, &lender, date);
        let off_day = day(4);
        let err = svc
            .execute(ScheduleReturn {
                rental_id: rental.id,
                renter_id: renter.id,
                slot_id: active.id,
                date: off_day,
            })
            .await
            .unwrap_err();
        assert!(matches!(
            err.as_ref(),
            E::SlotDayMismatch(d) if *d == off_day,
        ));
    }

    #[tokio::test]
    async fn rejects_past_dates() {
        let svc = service();
        let lender = user(&svc, "Lender");
        let renter = user(&svc, "Renter");
        let listing = listing(&svc, &lender);
        let rental = rental(
            &svc,
            &listing,
            &renter,
            period_days(-4, 5),
            Status::PendingReturn,
        );
        let past = day(-2);
        let slot = slot_covering(&svc, &lender, past);

        let err = svc
            .execute(ScheduleReturn {
                rental_id: rental.id,
                renter_id: renter.id,
                slot_id: slot.id,
                date: past,
            })
            .await
            .unwrap_err();

        assert!(matches!(err.as_ref(), E::DateInPast(d) if *d == past));
    }

    #[tokio::test]
    async fn requires_the_pending_return_status() {
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
        let date = day(3);
        let slot = slot_covering(&svc, &lender, date);

        let err = svc
            .execute(ScheduleReturn {
                rental_id: rental.id,
                renter_id: renter.id,
                slot_id: slot.id,
                date,
            })
            .await
            .unwrap_err();

        assert!(matches!(
            err.as_ref(),
            E::NotPendingReturn(Status::Active),
        ));
    }
}
