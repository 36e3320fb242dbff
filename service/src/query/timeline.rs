//! [`Query`] collection related to a [`Rental`]'s timeline.

use common::operations::By;

use crate::{domain::rental, read};
#[cfg(doc)]
use crate::{domain::Rental, Query};

use super::DatabaseQuery;

/// Queries the timeline of a [`Rental`] by its [`rental::Id`].
///
/// Entries come newest-first, each joined with the display name of the
/// [`User`] who performed the action.
///
/// [`User`]: crate::domain::User
pub type OfRental = DatabaseQuery<By<Vec<read::timeline::Entry>, rental::Id>>;

#[cfg(test)]
mod spec {
    use crate::{
        command::fixtures::{
            listing, period_days, rental, service, user,
        },
        domain::{rental::Status, timeline},
        Command as _, Query as _,
    };

    use super::OfRental;

    #[tokio::test]
    async fn returns_entries_newest_first_with_actor_names() {
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

        svc.execute(crate::command::SubmitHandoverProof {
            rental_id: rental.id,
            lender_id: lender.id,
            image: crate::command::fixtures::image(),
            notes: None,
        })
        .await
        .unwrap();
        svc.execute(crate::command::SubmitReceiveProof {
            rental_id: rental.id,
            renter_id: renter.id,
            image: crate::command::fixtures::image(),
            notes: None,
        })
        .await
        .unwrap();

        let entries = svc
            .execute(OfRental::by(rental.id))
            .await
            .unwrap();

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].event.kind, timeline::Kind::Receive);
        assert_eq!(entries[0].actor, renter.name);
        assert_eq!(entries[1].event.kind, timeline::Kind::Handover);
        assert_eq!(entries[1].actor, lender.name);
    }
}
