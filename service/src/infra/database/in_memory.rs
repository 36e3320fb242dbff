//! In-memory [`Database`] backing command tests.
//!
//! Writes apply immediately, while [`Lock`] operations take real per-entity
//! async mutexes held until [`Commit`] (or drop of the transactional client),
//! so concurrent commands contend the same way they do on row locks.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use common::operations::{
    By, Commit, Insert, Lock, Notify, Select, Store, Transact, Update,
};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracerr::Traced;

use crate::{
    domain::{
        listing, payment, proof,
        reason::{cancellation, rejection},
        rental, schedule, timeline, user, Listing, Proof, Rental, User,
    },
    infra::{blob, database, notify, Database},
    read,
};

/// Shared mutable state of an [`InMemory`] database.
#[derive(Debug, Default)]
struct State {
    users: HashMap<user::Id, User>,
    listings: HashMap<listing::Id, Listing>,
    rentals: HashMap<rental::Id, Rental>,
    events: Vec<timeline::Event>,
    proofs: Vec<Proof>,
    payments: Vec<payment::Request>,
    rejection_reasons: Vec<rejection::Reason>,
    cancellation_reasons: Vec<cancellation::Reason>,
    rejection_records: Vec<rejection::Record>,
    cancellation_records: Vec<cancellation::Record>,
    slots: HashMap<schedule::Id, schedule::Slot>,
    listing_locks: HashMap<listing::Id, Arc<AsyncMutex<()>>>,
    rental_locks: HashMap<rental::Id, Arc<AsyncMutex<()>>>,
}

/// Handle to the shared [`State`].
type Shared = Arc<Mutex<State>>;

/// In-memory [`Database`] client.
#[derive(Clone, Debug)]
pub(crate) struct InMemory<T = NonTx>(T);

/// Non-transactional in-memory client.
#[derive(Clone, Debug)]
pub(crate) struct NonTx {
    /// Shared [`State`].
    state: Shared,
}

/// Transactional in-memory client.
#[derive(Clone, Debug)]
pub(crate) struct Tx {
    /// Shared [`State`].
    state: Shared,

    /// Entity locks held by this transaction.
    guards: Arc<AsyncMutex<Vec<OwnedMutexGuard<()>>>>,
}

/// Access to the shared [`State`] of an [`InMemory`] client.
pub(crate) trait Access {
    /// Returns the shared [`State`].
    fn shared(&self) -> &Shared;

    /// Acquires the provided entity lock on behalf of this client.
    async fn hold(&self, lock: Arc<AsyncMutex<()>>);
}

impl Access for NonTx {
    fn shared(&self) -> &Shared {
        &self.state
    }

    async fn hold(&self, lock: Arc<AsyncMutex<()>>) {
        // Outside a transaction there is nothing to tie the lock to.
        drop(lock.lock_owned().await);
    }
}

impl Access for Tx {
    fn shared(&self) -> &Shared {
        &self.state
    }

    async fn hold(&self, lock: Arc<AsyncMutex<()>>) {
        let guard = lock.lock_owned().await;
        self.guards.lock().await.push(guard);
    }
}

impl InMemory {
    /// Creates a new empty [`InMemory`] database.
    pub(crate) fn new() -> Self {
        Self(NonTx {
            state: Arc::default(),
        })
    }

    /// Seeds the provided [`User`].
    pub(crate) fn seed_user(&self, user: User) {
        self.with(|s| drop(s.users.insert(user.id, user)));
    }

    /// Seeds the provided [`Listing`].
    pub(crate) fn seed_listing(&self, listing: Listing) {
        self.with(|s| drop(s.listings.insert(listing.id, listing)));
    }

    /// Seeds the provided [`Rental`] directly, bypassing any command.
    pub(crate) fn seed_rental(&self, rental: Rental) {
        self.with(|s| drop(s.rentals.insert(rental.id, rental)));
    }

    /// Seeds the provided payment [`payment::Request`].
    pub(crate) fn seed_payment(&self, payment: payment::Request) {
        self.with(|s| s.payments.push(payment));
    }

    /// Seeds the provided [`schedule::Slot`].
    pub(crate) fn seed_slot(&self, slot: schedule::Slot) {
        self.with(|s| drop(s.slots.insert(slot.id, slot)));
    }

    /// Seeds the provided rejection [`rejection::Reason`].
    pub(crate) fn seed_rejection_reason(&self, reason: rejection::Reason) {
        self.with(|s| s.rejection_reasons.push(reason));
    }

    /// Seeds the provided cancellation [`cancellation::Reason`].
    pub(crate) fn seed_cancellation_reason(
        &self,
        reason: cancellation::Reason,
    ) {
        self.with(|s| s.cancellation_reasons.push(reason));
    }

    /// Returns the current state of the [`Listing`] with the provided ID.
    pub(crate) fn listing(&self, id: listing::Id) -> Option<Listing> {
        self.with(|s| s.listings.get(&id).cloned())
    }

    /// Returns the current state of the [`Rental`] with the provided ID.
    pub(crate) fn rental(&self, id: rental::Id) -> Option<Rental> {
        self.with(|s| s.rentals.get(&id).cloned())
    }

    /// Returns all [`Rental`]s of the [`Listing`] with the provided ID.
    pub(crate) fn rentals_of(&self, listing_id: listing::Id) -> Vec<Rental> {
        self.with(|s| {
            s.rentals
                .values()
                .filter(|r| r.listing_id == listing_id)
                .cloned()
                .collect()
        })
    }

    /// Returns all recorded [`timeline::Event`]s of the [`Rental`] with the
    /// provided ID, oldest first.
    pub(crate) fn events_of(
        &self,
        rental_id: rental::Id,
    ) -> Vec<timeline::Event> {
        self.with(|s| {
            s.events
                .iter()
                .filter(|e| e.rental_id == rental_id)
                .cloned()
                .collect()
        })
    }

    /// Returns all submitted [`Proof`]s of the [`Rental`] with the provided
    /// ID.
    pub(crate) fn proofs_of(&self, rental_id: rental::Id) -> Vec<Proof> {
        self.with(|s| {
            s.proofs
                .iter()
                .filter(|p| p.rental_id == rental_id)
                .cloned()
                .collect()
        })
    }

    /// Returns all rejection [`rejection::Record`]s of the [`Rental`] with
    /// the provided ID.
    pub(crate) fn rejection_records_of(
        &self,
        rental_id: rental::Id,
    ) -> Vec<rejection::Record> {
        self.with(|s| {
            s.rejection_records
                .iter()
                .filter(|r| r.rental_id == rental_id)
                .cloned()
                .collect()
        })
    }

    /// Returns all cancellation [`cancellation::Record`]s of the [`Rental`]
    /// with the provided ID.
    pub(crate) fn cancellation_records_of(
        &self,
        rental_id: rental::Id,
    ) -> Vec<cancellation::Record> {
        self.with(|s| {
            s.cancellation_records
                .iter()
                .filter(|r| r.rental_id == rental_id)
                .cloned()
                .collect()
        })
    }
}

impl<C: Access> InMemory<C> {
    /// Runs the provided closure over the shared [`State`].
    fn with<R>(&self, f: impl FnOnce(&mut State) -> R) -> R {
        let mut state = self.0.shared().lock().unwrap();
        f(&mut state)
    }
}

impl Database<Transact> for InMemory<NonTx> {
    type Ok = InMemory<Tx>;
    type Err = Traced<database::Error>;

    async fn execute(&self, _: Transact) -> Result<Self::Ok, Self::Err> {
        Ok(InMemory(Tx {
            state: Arc::clone(&self.0.state),
            guards: Arc::default(),
        }))
    }
}

impl Database<Transact> for InMemory<Tx> {
    type Ok = Self;
    type Err = Traced<database::Error>;

    async fn execute(&self, _: Transact) -> Result<Self::Ok, Self::Err> {
        Ok(self.clone())
    }
}

impl Database<Commit> for InMemory<Tx> {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(&self, _: Commit) -> Result<Self::Ok, Self::Err> {
        self.0.guards.lock().await.clear();
        Ok(())
    }
}

impl<C: Access> Database<Lock<By<Listing, listing::Id>>> for InMemory<C> {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Lock(by): Lock<By<Listing, listing::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let id = by.into_inner();
        let lock = self.with(|s| {
            Arc::clone(s.listing_locks.entry(id).or_default())
        });
        self.0.hold(lock).await;
        Ok(())
    }
}

impl<C: Access> Database<Lock<By<Rental, rental::Id>>> for InMemory<C> {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Lock(by): Lock<By<Rental, rental::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let id = by.into_inner();
        let lock =
            self.with(|s| Arc::clone(s.rental_locks.entry(id).or_default()));
        self.0.hold(lock).await;
        Ok(())
    }
}

impl<C: Access> Database<Select<By<Option<Listing>, listing::Id>>>
    for InMemory<C>
{
    type Ok = Option<Listing>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Listing>, listing::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let id = by.into_inner();
        Ok(self.with(|s| s.listings.get(&id).cloned()))
    }
}

impl<C: Access> Database<Update<Listing>> for InMemory<C> {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(listing): Update<Listing>,
    ) -> Result<Self::Ok, Self::Err> {
        self.with(|s| drop(s.listings.insert(listing.id, listing)));
        Ok(())
    }
}

impl<C: Access> Database<Select<By<Option<Rental>, rental::Id>>>
    for InMemory<C>
{
    type Ok = Option<Rental>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Rental>, rental::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let id = by.into_inner();
        Ok(self.with(|s| s.rentals.get(&id).cloned()))
    }
}

impl<C: Access>
    Database<Select<By<Option<Rental>, read::rental::NonTerminalFor>>>
    for InMemory<C>
{
    type Ok = Option<Rental>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Rental>, read::rental::NonTerminalFor>>,
    ) -> Result<Self::Ok, Self::Err> {
        let read::rental::NonTerminalFor {
            listing_id,
            renter_id,
        } = by.into_inner();
        Ok(self.with(|s| {
            s.rentals
                .values()
                .find(|r| {
                    r.listing_id == listing_id
                        && r.renter_id == renter_id
                        && !r.status.is_terminal()
                })
                .cloned()
        }))
    }
}

impl<C: Access>
    Database<
        Select<
            By<
                Vec<read::rental::Pending<Rental>>,
                read::rental::OverlappingWith,
            >,
        >,
    > for InMemory<C>
{
    type Ok = Vec<read::rental::Pending<Rental>>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<
            By<
                Vec<read::rental::Pending<Rental>>,
                read::rental::OverlappingWith,
            >,
        >,
    ) -> Result<Self::Ok, Self::Err> {
        let read::rental::OverlappingWith {
            listing_id,
            period,
            exclude,
        } = by.into_inner();
        Ok(self.with(|s| {
            s.rentals
                .values()
                .filter(|r| {
                    r.listing_id == listing_id
                        && r.id != exclude
                        && r.is_status(rental::Status::Pending)
                        && r.period.overlaps(&period)
                })
                .cloned()
                .map(read::rental::Pending)
                .collect()
        }))
    }
}

impl<C: Access> Database<Insert<Rental>> for InMemory<C> {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(rental): Insert<Rental>,
    ) -> Result<Self::Ok, Self::Err> {
        self.with(|s| drop(s.rentals.insert(rental.id, rental)));
        Ok(())
    }
}

impl<C: Access> Database<Update<Rental>> for InMemory<C> {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(rental): Update<Rental>,
    ) -> Result<Self::Ok, Self::Err> {
        self.with(|s| drop(s.rentals.insert(rental.id, rental)));
        Ok(())
    }
}

impl<C: Access> Database<Insert<timeline::Event>> for InMemory<C> {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(event): Insert<timeline::Event>,
    ) -> Result<Self::Ok, Self::Err> {
        self.with(|s| s.events.push(event));
        Ok(())
    }
}

impl<C: Access>
    Database<Select<By<Vec<read::timeline::Entry>, rental::Id>>>
    for InMemory<C>
{
    type Ok = Vec<read::timeline::Entry>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Vec<read::timeline::Entry>, rental::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let rental_id = by.into_inner();
        Ok(self.with(|s| {
            let mut entries = s
                .events
                .iter()
                .filter(|e| e.rental_id == rental_id)
                .map(|e| read::timeline::Entry {
                    event: e.clone(),
                    actor: s
                        .users
                        .get(&e.actor_id)
                        .map_or_else(
                            || user::Name::new("unknown").unwrap(),
                            |u| u.name.clone(),
                        ),
                })
                .collect::<Vec<_>>();
            entries.reverse();
            entries
        }))
    }
}

impl<C: Access> Database<Insert<Proof>> for InMemory<C> {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(proof): Insert<Proof>,
    ) -> Result<Self::Ok, Self::Err> {
        self.with(|s| s.proofs.push(proof));
        Ok(())
    }
}

impl<C: Access>
    Database<Select<By<read::proof::Exists, (rental::Id, proof::Kind)>>>
    for InMemory<C>
{
    type Ok = read::proof::Exists;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<read::proof::Exists, (rental::Id, proof::Kind)>>,
    ) -> Result<Self::Ok, Self::Err> {
        let (rental_id, kind) = by.into_inner();
        Ok(read::proof::Exists(self.with(|s| {
            s.proofs
                .iter()
                .any(|p| p.rental_id == rental_id && p.kind == kind)
        })))
    }
}

impl<C: Access>
    Database<
        Select<By<Option<read::payment::Latest<payment::Request>>, rental::Id>>,
    > for InMemory<C>
{
    type Ok = Option<read::payment::Latest<payment::Request>>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<
            By<Option<read::payment::Latest<payment::Request>>, rental::Id>,
        >,
    ) -> Result<Self::Ok, Self::Err> {
        let rental_id = by.into_inner();
        Ok(self.with(|s| {
            s.payments
                .iter()
                .rev()
                .find(|p| p.rental_id == rental_id)
                .cloned()
                .map(read::payment::Latest)
        }))
    }
}

impl<C: Access>
    Database<
        Select<
            By<
                Option<read::payment::VerifiedOverdue<payment::Request>>,
                rental::Id,
            >,
        >,
    > for InMemory<C>
{
    type Ok = Option<read::payment::VerifiedOverdue<payment::Request>>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<
            By<
                Option<read::payment::VerifiedOverdue<payment::Request>>,
                rental::Id,
            >,
        >,
    ) -> Result<Self::Ok, Self::Err> {
        let rental_id = by.into_inner();
        Ok(self.with(|s| {
            s.payments
                .iter()
                .rev()
                .find(|p| {
                    p.rental_id == rental_id
                        && p.kind == payment::Kind::Overdue
                        && p.is_verified()
                })
                .cloned()
                .map(read::payment::VerifiedOverdue)
        }))
    }
}

impl<C: Access>
    Database<Select<By<Option<rejection::Reason>, rejection::Id>>>
    for InMemory<C>
{
    type Ok = Option<rejection::Reason>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<rejection::Reason>, rejection::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let id = by.into_inner();
        Ok(self.with(|s| {
            s.rejection_reasons.iter().find(|r| r.id == id).cloned()
        }))
    }
}

impl<C: Access>
    Database<Select<By<Option<rejection::Reason>, rejection::Code>>>
    for InMemory<C>
{
    type Ok = Option<rejection::Reason>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<rejection::Reason>, rejection::Code>>,
    ) -> Result<Self::Ok, Self::Err> {
        let code = by.into_inner();
        Ok(self.with(|s| {
            s.rejection_reasons.iter().find(|r| r.code == code).cloned()
        }))
    }
}

impl<C: Access> Database<Insert<rejection::Record>> for InMemory<C> {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(record): Insert<rejection::Record>,
    ) -> Result<Self::Ok, Self::Err> {
        self.with(|s| s.rejection_records.push(record));
        Ok(())
    }
}

impl<C: Access>
    Database<Select<By<Option<cancellation::Reason>, cancellation::Id>>>
    for InMemory<C>
{
    type Ok = Option<cancellation::Reason>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<cancellation::Reason>, cancellation::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let id = by.into_inner();
        Ok(self.with(|s| {
            s.cancellation_reasons.iter().find(|r| r.id == id).cloned()
        }))
    }
}

impl<C: Access> Database<Insert<cancellation::Record>> for InMemory<C> {
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(record): Insert<cancellation::Record>,
    ) -> Result<Self::Ok, Self::Err> {
        self.with(|s| s.cancellation_records.push(record));
        Ok(())
    }
}

impl<C: Access> Database<Select<By<Option<schedule::Slot>, schedule::Id>>>
    for InMemory<C>
{
    type Ok = Option<schedule::Slot>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<schedule::Slot>, schedule::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let id = by.into_inner();
        Ok(self.with(|s| s.slots.get(&id).copied()))
    }
}

impl<C: Access> Database<Select<By<Option<User>, user::Id>>> for InMemory<C> {
    type Ok = Option<User>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<User>, user::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        let id = by.into_inner();
        Ok(self.with(|s| s.users.get(&id).cloned()))
    }
}

/// Blob storage double recording uploads in memory.
#[derive(Clone, Debug, Default)]
pub(crate) struct Blobs {
    /// Number of uploads performed.
    uploads: Arc<Mutex<usize>>,
}

impl Blobs {
    /// Returns the number of uploads performed.
    pub(crate) fn uploads(&self) -> usize {
        *self.uploads.lock().unwrap()
    }
}

impl crate::infra::BlobStore<Store<blob::Upload>> for Blobs {
    type Ok = proof::BlobPath;
    type Err = Traced<blob::Error>;

    async fn execute(
        &self,
        Store(upload): Store<blob::Upload>,
    ) -> Result<Self::Ok, Self::Err> {
        let mut uploads = self.uploads.lock().unwrap();
        *uploads += 1;
        Ok(proof::BlobPath::from(format!(
            "{}/{}-{}",
            upload.bucket, upload.rental_id, *uploads,
        )))
    }
}

/// Notifier double recording delivered notifications.
#[derive(Clone, Debug, Default)]
pub(crate) struct Notifications {
    /// Delivered notifications, in order.
    sent: Arc<Mutex<Vec<notify::Notification>>>,
}

impl Notifications {
    /// Returns all delivered notifications, in order.
    pub(crate) fn sent(&self) -> Vec<notify::Notification> {
        self.sent.lock().unwrap().clone()
    }
}

impl crate::infra::Notifier<Notify<notify::Notification>> for Notifications {
    type Ok = ();
    type Err = Traced<notify::Error>;

    async fn execute(
        &self,
        Notify(notification): Notify<notify::Notification>,
    ) -> Result<Self::Ok, Self::Err> {
        self.sent.lock().unwrap().push(notification);
        Ok(())
    }
}
