//! [`Query`] deriving per-viewer capabilities of a [`Rental`].

use common::operations::{By, Select};
use derive_more::{Display, Error, From};
use tracerr::Traced;

use crate::{
    domain::{listing, payment, proof, rental, user, Listing, Rental},
    infra::{database, Database},
    read,
    Query, Service,
};

/// [`Query`] deriving what the provided viewer may do with a [`Rental`]
/// right now.
///
/// Commands enforce the same predicates; this derivation exists so UIs can
/// render exactly the transitions that would succeed.
#[derive(Clone, Copy, Debug)]
pub struct Available {
    /// ID of the [`Rental`] to derive the capabilities for.
    pub rental_id: rental::Id,

    /// ID of the [`User`] viewing the [`Rental`].
    ///
    /// [`User`]: crate::domain::User
    pub viewer: user::Id,
}

/// Output of the [`Available`] [`Query`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Output {
    /// Lifecycle actions available to the viewer.
    pub actions: read::rental::Actions,

    /// [`rental::Status`] refined with the payment phase for display.
    pub status: read::rental::StatusForDisplay,
}

impl<Db, Bs, Nt> Query<Available> for Service<Db, Bs, Nt>
where
    Db: Database<
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
                    Option<read::payment::Latest<payment::Request>>,
                    rental::Id,
                >,
            >,
            Ok = Option<read::payment::Latest<payment::Request>>,
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
        > + Database<
            Select<By<read::proof::Exists, (rental::Id, proof::Kind)>>,
            Ok = read::proof::Exists,
            Err = Traced<database::Error>,
        >,
{
    type Ok = Output;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        Available { rental_id, viewer }: Available,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

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

        let latest = self
            .database()
            .execute(Select(By::<
                Option<read::payment::Latest<payment::Request>>,
                _,
            >::new(rental_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        let verified_overdue = self
            .database()
            .execute(Select(By::<
                Option<read::payment::VerifiedOverdue<payment::Request>>,
                _,
            >::new(rental_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        let return_proof = self
            .database()
            .execute(Select(By::<read::proof::Exists, _>::new((
                rental_id,
                proof::Kind::Return,
            ))))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        let latest = latest.as_ref().map(|l| &l.0);
        Ok(Output {
            actions: read::rental::Actions::available(
                &rental,
                &listing,
                viewer,
                latest,
                verified_overdue.is_some(),
                *return_proof,
                self.today(),
            ),
            status: read::rental::StatusForDisplay::derive(&rental, latest),
        })
    }
}

/// Error of [`Available`] [`Query`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// [`Listing`] of the [`Rental`] does not exist.
    #[display("`Listing(id: {_0})` does not exist")]
    ListingNotExists(#[error(not(source))] listing::Id),

    /// [`Rental`] with the provided ID does not exist.
    #[display("`Rental(id: {_0})` does not exist")]
    RentalNotExists(#[error(not(source))] rental::Id),
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
        },
        read::rental::StatusForDisplay,
        Query as _,
    };

    use super::Available;

    #[tokio::test]
    async fn lender_sees_approval_actions_on_pending_request() {
        let svc = service();
        let lender = user(&svc, "Lender");
        let renter = user(&svc, "Renter");
        let listing = listing(&svc, &lender);
        let rental = rental(
            &svc,
            &listing,
            &renter,
            period_days(2, 5),
            Status::Pending,
        );

        let out = svc
            .execute(Available {
                rental_id: rental.id,
                viewer: lender.id,
            })
            .await
            .unwrap();

        assert!(out.actions.can_approve);
        assert!(out.actions.can_reject);
        assert!(!out.actions.can_cancel);
        assert_eq!(out.status, StatusForDisplay::Lifecycle(Status::Pending));
    }

    #[tokio::test]
    async fn renter_sees_payment_phase_on_approved_request() {
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

        let unpaid = svc
            .execute(Available {
                rental_id: rental.id,
                viewer: renter.id,
            })
            .await
            .unwrap();
        assert!(unpaid.actions.can_pay_now);
        assert!(unpaid.actions.can_cancel);
        assert_eq!(
            unpaid.status,
            StatusForDisplay::Lifecycle(Status::Approved),
        );

        payment(
            &svc,
            rental.id,
            Kind::Rental,
            PaymentStatus::Pending,
            money(6750),
        );
        let paid = svc
            .execute(Available {
                rental_id: rental.id,
                viewer: renter.id,
            })
            .await
            .unwrap();
        assert!(!paid.actions.can_pay_now);
        assert!(!paid.actions.can_cancel);
        assert_eq!(paid.status, StatusForDisplay::PaymentPending);
    }

    #[tokio::test]
    async fn overdue_active_rental_gates_the_return() {
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

        let blocked = svc
            .execute(Available {
                rental_id: rental.id,
                viewer: renter.id,
            })
            .await
            .unwrap();
        assert!(!blocked.actions.can_initiate_return);

        payment(
            &svc,
            rental.id,
            Kind::Overdue,
            PaymentStatus::Verified,
            money(3000),
        );
        let allowed = svc
            .execute(Available {
                rental_id: rental.id,
                viewer: renter.id,
            })
            .await
            .unwrap();
        assert!(allowed.actions.can_initiate_return);
    }
}
