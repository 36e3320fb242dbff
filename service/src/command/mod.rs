//! [`Command`] definition.

pub mod approve_rental_request;
pub mod cancel_rental_request;
pub mod confirm_return;
pub mod create_rental_request;
pub mod initiate_return;
pub mod reject_rental_request;
pub mod schedule_return;
pub mod start_handover;
pub mod submit_handover_proof;
pub mod submit_receive_proof;
pub mod submit_return_proof;

/// [`Command`] of the [`Service`].
///
/// [`Service`]: crate::Service
pub use common::Handler as Command;

pub use self::{
    approve_rental_request::ApproveRentalRequest,
    cancel_rental_request::CancelRentalRequest, confirm_return::ConfirmReturn,
    create_rental_request::CreateRentalRequest,
    initiate_return::InitiateReturn,
    reject_rental_request::RejectRentalRequest,
    schedule_return::ScheduleReturn, start_handover::StartHandover,
    submit_handover_proof::SubmitHandoverProof,
    submit_receive_proof::SubmitReceiveProof,
    submit_return_proof::SubmitReturnProof,
};


#[cfg(test)]
mod spec {
    use common::Money;

    use crate::{
        domain::{
            payment::{Kind, Status as PaymentStatus},
            rental::Status,
            timeline,
        },
        Command as _,
    };

    use super::{
        fixtures::{
            image, listing, money, payment, period_days, service,
            slot_covering, user,
        },
        ApproveRentalRequest, ConfirmReturn, CreateRentalRequest,
        InitiateReturn, ScheduleReturn, StartHandover, SubmitHandoverProof,
        SubmitReceiveProof, SubmitReturnProof,
    };

    #[tokio::test]
    async fn full_lifecycle_runs_request_to_completion() {
        let svc = service();
        let lender = user(&svc, "Lender");
        let renter = user(&svc, "Renter");
        let listing = listing(&svc, &lender);

        let rental = svc
            .execute(CreateRentalRequest {
                listing_id: listing.id,
                renter_id: renter.id,
                period: period_days(0, 3),
                discount: Money::ZERO,
                service_fee: money(750),
                deposit_fee: money(1000),
            })
            .await
            .unwrap();

        svc.execute(ApproveRentalRequest {
            rental_id: rental.id,
            lender_id: lender.id,
        })
        .await
        .unwrap();
        assert!(svc.database().listing(listing.id).unwrap().is_rented);

        payment(
            &svc,
            rental.id,
            Kind::Rental,
            PaymentStatus::Verified,
            rental.terms.total_price,
        );
        svc.execute(StartHandover {
            rental_id: rental.id,
            renter_id: renter.id,
        })
        .await
        .unwrap();

        svc.execute(SubmitHandoverProof {
            rental_id: rental.id,
            lender_id: lender.id,
            image: image(),
            notes: None,
        })
        .await
        .unwrap();
        svc.execute(SubmitReceiveProof {
            rental_id: rental.id,
            renter_id: renter.id,
            image: image(),
            notes: None,
        })
        .await
        .unwrap();

        let active = svc.database().rental(rental.id).unwrap();
        assert_eq!(active.status, Status::Active);
        assert!(active.handover_at.is_some());

        // The renter keeps the item past the period end; the overdue fee is
        // settled out of band before the return may start.
        let mut overdue = active;
        overdue.period = period_days(-10, 3);
        svc.database().seed_rental(overdue);
        payment(
            &svc,
            rental.id,
            Kind::Overdue,
            PaymentStatus::Verified,
            money(3000),
        );

        svc.execute(InitiateReturn {
            rental_id: rental.id,
            renter_id: renter.id,
        })
        .await
        .unwrap();

        let date = svc.today();
        let slot = slot_covering(&svc, &lender, date);
        svc.execute(ScheduleReturn {
            rental_id: rental.id,
            renter_id: renter.id,
            slot_id: slot.id,
            date,
        })
        .await
        .unwrap();

        svc.execute(SubmitReturnProof {
            rental_id: rental.id,
            renter_id: renter.id,
            image: image(),
            notes: None,
        })
        .await
        .unwrap();
        svc.execute(ConfirmReturn {
            rental_id: rental.id,
            lender_id: lender.id,
        })
        .await
        .unwrap();

        let completed = svc.database().rental(rental.id).unwrap();
        assert_eq!(completed.status, Status::Completed);
        assert!(completed.return_at.is_some());
        assert!(!svc.database().listing(listing.id).unwrap().is_rented);

        let kinds = svc
            .database()
            .events_of(rental.id)
            .into_iter()
            .map(|e| e.kind)
            .collect::<Vec<_>>();
        assert_eq!(
            kinds,
            [
                timeline::Kind::Requested,
                timeline::Kind::Approved,
                timeline::Kind::PaymentConfirmed,
                timeline::Kind::Handover,
                timeline::Kind::Receive,
                timeline::Kind::ReturnInitiated,
                timeline::Kind::ReturnScheduled,
                timeline::Kind::ReturnProofSubmitted,
                timeline::Kind::ReturnCompleted,
            ],
        );
    }
}
