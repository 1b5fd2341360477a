//! Document store
//!
//! Collections of serde documents kept in memory behind a reader/writer lock
//! and mirrored to one pretty-printed JSON file per collection, the same way
//! account data is kept under `database/`. Every document belongs to an
//! establishment; scoped reads never return another establishment's data.
//!
//! Writes go through [`Store::transaction`]: either every write made inside
//! the closure is kept, persisted and announced on the change feed, or none
//! of them is.

use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::collections::{BTreeMap, BTreeSet};
use std::fs::{self, create_dir_all};
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::broadcast;

use crate::error::{NackError, Result};
use crate::models::{
    Admin, Customer, Event, Order, Payment, Product, Profile, Table, TeamMember, Ticket,
};

/// Pending change notifications kept per listener before it starts lagging
const CHANGE_BUFFER: usize = 256;

/// Named document collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Collection {
    Profiles,
    Products,
    Tables,
    BarOrders,
    Events,
    Tickets,
    Customers,
    Team,
    Admins,
    Payments,
}

impl Collection {
    pub const ALL: [Collection; 10] = [
        Collection::Profiles,
        Collection::Products,
        Collection::Tables,
        Collection::BarOrders,
        Collection::Events,
        Collection::Tickets,
        Collection::Customers,
        Collection::Team,
        Collection::Admins,
        Collection::Payments,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Collection::Profiles => "profiles",
            Collection::Products => "products",
            Collection::Tables => "tables",
            Collection::BarOrders => "barOrders",
            Collection::Events => "events",
            Collection::Tickets => "tickets",
            Collection::Customers => "customers",
            Collection::Team => "team",
            Collection::Admins => "admins",
            Collection::Payments => "payments",
        }
    }
}

/// Every collection, keyed by document id
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Database {
    pub profiles: BTreeMap<String, Profile>,
    pub products: BTreeMap<String, Product>,
    pub tables: BTreeMap<String, Table>,
    pub bar_orders: BTreeMap<String, Order>,
    pub events: BTreeMap<String, Event>,
    pub tickets: BTreeMap<String, Ticket>,
    pub customers: BTreeMap<String, Customer>,
    pub team: BTreeMap<String, TeamMember>,
    pub admins: BTreeMap<String, Admin>,
    pub payments: BTreeMap<String, Payment>,
}

impl Database {
    fn load(dir: &Path) -> Result<Self> {
        Ok(Database {
            profiles: read_collection(dir, Collection::Profiles)?,
            products: read_collection(dir, Collection::Products)?,
            tables: read_collection(dir, Collection::Tables)?,
            bar_orders: read_collection(dir, Collection::BarOrders)?,
            events: read_collection(dir, Collection::Events)?,
            tickets: read_collection(dir, Collection::Tickets)?,
            customers: read_collection(dir, Collection::Customers)?,
            team: read_collection(dir, Collection::Team)?,
            admins: read_collection(dir, Collection::Admins)?,
            payments: read_collection(dir, Collection::Payments)?,
        })
    }

    /// Write a collection next to its file, ready to be swapped in
    fn stage_collection(&self, dir: &Path, collection: Collection) -> Result<()> {
        match collection {
            Collection::Profiles => stage_collection(dir, collection, &self.profiles),
            Collection::Products => stage_collection(dir, collection, &self.products),
            Collection::Tables => stage_collection(dir, collection, &self.tables),
            Collection::BarOrders => stage_collection(dir, collection, &self.bar_orders),
            Collection::Events => stage_collection(dir, collection, &self.events),
            Collection::Tickets => stage_collection(dir, collection, &self.tickets),
            Collection::Customers => stage_collection(dir, collection, &self.customers),
            Collection::Team => stage_collection(dir, collection, &self.team),
            Collection::Admins => stage_collection(dir, collection, &self.admins),
            Collection::Payments => stage_collection(dir, collection, &self.payments),
        }
    }

    /// Replace the files of `collections` with their current contents
    ///
    /// Every file is staged before any is swapped in, so a failed write
    /// leaves the directory untouched. Collections already swapped in when
    /// a rename fails are pushed to `swapped`.
    fn write_collections(
        &self,
        dir: &Path,
        collections: &[Collection],
        swapped: &mut Vec<Collection>,
    ) -> Result<()> {
        for (staged, &collection) in collections.iter().enumerate() {
            if let Err(e) = self.stage_collection(dir, collection) {
                discard_staged(dir, &collections[..=staged]);
                return Err(e);
            }
        }

        for (done, &collection) in collections.iter().enumerate() {
            let path = collection_path(dir, collection);
            if let Err(e) = fs::rename(staged_path(dir, collection), &path) {
                discard_staged(dir, &collections[done..]);
                return Err(e.into());
            }
            swapped.push(collection);
        }
        Ok(())
    }

    /// Number of documents in a collection
    pub fn count(&self, collection: Collection) -> usize {
        match collection {
            Collection::Profiles => self.profiles.len(),
            Collection::Products => self.products.len(),
            Collection::Tables => self.tables.len(),
            Collection::BarOrders => self.bar_orders.len(),
            Collection::Events => self.events.len(),
            Collection::Tickets => self.tickets.len(),
            Collection::Customers => self.customers.len(),
            Collection::Team => self.team.len(),
            Collection::Admins => self.admins.len(),
            Collection::Payments => self.payments.len(),
        }
    }
}

impl Database {
    /// Copy of the documents belonging to one establishment
    pub fn scoped(&self, establishment_id: &str) -> Database {
        fn keep<T: Document>(table: &BTreeMap<String, T>, establishment_id: &str) -> BTreeMap<String, T> {
            table
                .iter()
                .filter(|(_, doc)| doc.establishment_id() == establishment_id)
                .map(|(id, doc)| (id.clone(), doc.clone()))
                .collect()
        }

        Database {
            profiles: keep(&self.profiles, establishment_id),
            products: keep(&self.products, establishment_id),
            tables: keep(&self.tables, establishment_id),
            bar_orders: keep(&self.bar_orders, establishment_id),
            events: keep(&self.events, establishment_id),
            tickets: keep(&self.tickets, establishment_id),
            customers: keep(&self.customers, establishment_id),
            team: keep(&self.team, establishment_id),
            admins: BTreeMap::new(),
            payments: keep(&self.payments, establishment_id),
        }
    }
}

fn collection_path(dir: &Path, collection: Collection) -> PathBuf {
    dir.join(format!("{}.json", collection.name()))
}

fn read_collection<T: DeserializeOwned + Default>(dir: &Path, collection: Collection) -> Result<T> {
    let path = collection_path(dir, collection);
    if !path.exists() {
        return Ok(T::default());
    }
    let contents = fs::read_to_string(&path)?;
    Ok(serde_json::from_str(&contents)?)
}

fn staged_path(dir: &Path, collection: Collection) -> PathBuf {
    collection_path(dir, collection).with_extension("json.tmp")
}

fn stage_collection<T: Serialize>(dir: &Path, collection: Collection, value: &T) -> Result<()> {
    fs::write(staged_path(dir, collection), serde_json::to_string_pretty(value)?)?;
    Ok(())
}

fn discard_staged(dir: &Path, collections: &[Collection]) {
    for &collection in collections {
        let _ = fs::remove_file(staged_path(dir, collection));
    }
}

/// A record stored in one of the collections
pub trait Document: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    const COLLECTION: Collection;
    /// Human-readable name used in "not found" errors
    const NAME: &'static str;

    fn id(&self) -> &str;
    fn establishment_id(&self) -> &str;
    fn table(db: &Database) -> &BTreeMap<String, Self>;
    fn table_mut(db: &mut Database) -> &mut BTreeMap<String, Self>;
}

macro_rules! document {
    ($ty:ident, $collection:ident, $field:ident, $scope:ident) => {
        impl Document for $ty {
            const COLLECTION: Collection = Collection::$collection;
            const NAME: &'static str = stringify!($ty);

            fn id(&self) -> &str {
                &self.id
            }

            fn establishment_id(&self) -> &str {
                &self.$scope
            }

            fn table(db: &Database) -> &BTreeMap<String, Self> {
                &db.$field
            }

            fn table_mut(db: &mut Database) -> &mut BTreeMap<String, Self> {
                &mut db.$field
            }
        }
    };
}

document!(Profile, Profiles, profiles, id);
document!(Product, Products, products, establishment_id);
document!(Table, Tables, tables, establishment_id);
document!(Order, BarOrders, bar_orders, establishment_id);
document!(Event, Events, events, establishment_id);
document!(Ticket, Tickets, tickets, establishment_id);
document!(Customer, Customers, customers, establishment_id);
document!(TeamMember, Team, team, establishment_id);
document!(Admin, Admins, admins, id);
document!(Payment, Payments, payments, establishment_id);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Upserted,
    Deleted,
}

/// Notification sent to listeners after a committed write
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Change {
    pub collection: Collection,
    pub establishment_id: String,
    pub id: String,
    pub kind: ChangeKind,
}

type Undo = Box<dyn FnOnce(&mut Database) + Send>;

/// Writes staged by [`Store::transaction`]
pub struct Transaction<'a> {
    db: &'a mut Database,
    changes: Vec<Change>,
    undo: Vec<Undo>,
}

impl Transaction<'_> {
    pub fn get<T: Document>(&self, establishment_id: &str, id: &str) -> Option<&T> {
        T::table(self.db)
            .get(id)
            .filter(|doc| doc.establishment_id() == establishment_id)
    }

    pub fn require<T: Document>(&self, establishment_id: &str, id: &str) -> Result<&T> {
        self.get(establishment_id, id)
            .ok_or(NackError::NotFound(T::NAME))
    }

    /// Lookup by id alone, ignoring the establishment scope
    pub fn find<T: Document>(&self, id: &str) -> Option<&T> {
        T::table(self.db).get(id)
    }

    pub fn list<T: Document>(&self, establishment_id: &str) -> Vec<&T> {
        T::table(self.db)
            .values()
            .filter(|doc| doc.establishment_id() == establishment_id)
            .collect()
    }

    pub fn all<T: Document>(&self) -> Vec<&T> {
        T::table(self.db).values().collect()
    }

    /// Insert or replace a document
    pub fn put<T: Document>(&mut self, doc: T) {
        let id = doc.id().to_string();
        self.changes.push(Change {
            collection: T::COLLECTION,
            establishment_id: doc.establishment_id().to_string(),
            id: id.clone(),
            kind: ChangeKind::Upserted,
        });

        let previous = T::table_mut(self.db).insert(id.clone(), doc);
        self.undo.push(Box::new(move |db: &mut Database| {
            let table = T::table_mut(db);
            match previous {
                Some(previous) => {
                    table.insert(id, previous);
                }
                None => {
                    table.remove(&id);
                }
            }
        }));
    }

    pub fn delete<T: Document>(&mut self, establishment_id: &str, id: &str) -> Result<T> {
        self.require::<T>(establishment_id, id)?;
        let removed = T::table_mut(self.db)
            .remove(id)
            .ok_or(NackError::NotFound(T::NAME))?;

        self.changes.push(Change {
            collection: T::COLLECTION,
            establishment_id: establishment_id.to_string(),
            id: id.to_string(),
            kind: ChangeKind::Deleted,
        });

        let restored = removed.clone();
        self.undo.push(Box::new(move |db: &mut Database| {
            T::table_mut(db).insert(restored.id().to_string(), restored);
        }));

        Ok(removed)
    }
}

/// Shared handle on the establishment data
pub struct Store {
    dir: Option<PathBuf>,
    db: RwLock<Database>,
    changes: broadcast::Sender<Change>,
}

impl Store {
    /// Open (or create) a store persisted under `dir`
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        create_dir_all(dir)?;
        let db = Database::load(dir)?;
        info!(
            "Opened store at {} ({} establishments)",
            dir.display(),
            db.count(Collection::Profiles)
        );
        Ok(Self::with_database(Some(dir.to_path_buf()), db))
    }

    /// Store that is never written to disk
    pub fn in_memory() -> Self {
        Self::with_database(None, Database::default())
    }

    fn with_database(dir: Option<PathBuf>, db: Database) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_BUFFER);
        Self {
            dir,
            db: RwLock::new(db),
            changes,
        }
    }

    pub fn data_dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    fn read(&self) -> RwLockReadGuard<'_, Database> {
        self.db.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Database> {
        self.db.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get<T: Document>(&self, establishment_id: &str, id: &str) -> Option<T> {
        T::table(&self.read())
            .get(id)
            .filter(|doc| doc.establishment_id() == establishment_id)
            .cloned()
    }

    pub fn require<T: Document>(&self, establishment_id: &str, id: &str) -> Result<T> {
        self.get(establishment_id, id)
            .ok_or(NackError::NotFound(T::NAME))
    }

    /// Lookup by id alone, ignoring the establishment scope
    pub fn find<T: Document>(&self, id: &str) -> Option<T> {
        T::table(&self.read()).get(id).cloned()
    }

    pub fn list<T: Document>(&self, establishment_id: &str) -> Vec<T> {
        T::table(&self.read())
            .values()
            .filter(|doc| doc.establishment_id() == establishment_id)
            .cloned()
            .collect()
    }

    pub fn all<T: Document>(&self) -> Vec<T> {
        T::table(&self.read()).values().cloned().collect()
    }

    pub fn put<T: Document>(&self, doc: T) -> Result<T> {
        self.transaction(|tx| {
            tx.put(doc.clone());
            Ok(doc)
        })
    }

    /// Modify one document in place; an error from `f` leaves it untouched
    pub fn update<T, F>(&self, establishment_id: &str, id: &str, f: F) -> Result<T>
    where
        T: Document,
        F: FnOnce(&mut T) -> Result<()>,
    {
        self.transaction(|tx| {
            let mut doc = tx.require::<T>(establishment_id, id)?.clone();
            f(&mut doc)?;
            tx.put(doc.clone());
            Ok(doc)
        })
    }

    pub fn delete<T: Document>(&self, establishment_id: &str, id: &str) -> Result<T> {
        self.transaction(|tx| tx.delete::<T>(establishment_id, id))
    }

    /// Run several reads and writes as one unit
    ///
    /// Writes are serialized by the store lock. When `f` fails, or the
    /// touched collections cannot be written to disk, every write is undone
    /// and no change is announced.
    pub fn transaction<R, F>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&mut Transaction<'_>) -> Result<R>,
    {
        let mut db = self.write();
        let mut tx = Transaction {
            db: &mut *db,
            changes: Vec::new(),
            undo: Vec::new(),
        };

        let outcome = f(&mut tx);
        let Transaction { changes, undo, .. } = tx;

        let mut swapped = Vec::new();
        let outcome = outcome.and_then(|value| {
            self.persist(&*db, &changes, &mut swapped)?;
            Ok(value)
        });

        match outcome {
            Ok(value) => {
                drop(db);
                for change in changes {
                    debug!(
                        "{} {}/{} {:?}",
                        change.collection.name(),
                        change.establishment_id,
                        change.id,
                        change.kind
                    );
                    // Nobody listening is fine
                    let _ = self.changes.send(change);
                }
                Ok(value)
            }
            Err(e) => {
                for step in undo.into_iter().rev() {
                    step(&mut *db);
                }
                self.revert_files(&*db, &swapped);
                Err(e)
            }
        }
    }

    /// Run `f` like a transaction, then undo every write it made
    ///
    /// Nothing is persisted or announced; used for dry runs.
    pub fn preview<R, F>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&mut Transaction<'_>) -> Result<R>,
    {
        let mut db = self.write();
        let mut tx = Transaction {
            db: &mut *db,
            changes: Vec::new(),
            undo: Vec::new(),
        };

        let outcome = f(&mut tx);
        let Transaction { undo, .. } = tx;
        for step in undo.into_iter().rev() {
            step(&mut *db);
        }
        outcome
    }

    fn persist(&self, db: &Database, changes: &[Change], swapped: &mut Vec<Collection>) -> Result<()> {
        let Some(dir) = &self.dir else {
            return Ok(());
        };

        let touched: Vec<Collection> = changes
            .iter()
            .map(|c| c.collection)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        db.write_collections(dir, &touched, swapped).map_err(|e| {
            error!("Failed to write {:?}: {}", touched, e);
            e
        })
    }

    /// Put back the files of collections swapped in before a failed write
    fn revert_files(&self, db: &Database, swapped: &[Collection]) {
        let Some(dir) = &self.dir else {
            return;
        };
        if swapped.is_empty() {
            return;
        }

        warn!("Reverting {:?} after a failed write", swapped);
        if let Err(e) = db.write_collections(dir, swapped, &mut Vec::new()) {
            error!("Failed to revert {:?}: {}", swapped, e);
        }
    }

    /// Listen to committed writes
    pub fn subscribe(&self) -> broadcast::Receiver<Change> {
        self.changes.subscribe()
    }

    /// Copy of every collection
    pub fn snapshot(&self) -> Database {
        self.read().clone()
    }

    /// Replace every collection, e.g. from a backup
    ///
    /// No change notification is sent; listeners are expected to reload.
    pub fn restore(&self, db: Database) -> Result<()> {
        let mut guard = self.write();
        if let Some(dir) = &self.dir {
            let mut swapped = Vec::new();
            if let Err(e) = db.write_collections(dir, &Collection::ALL, &mut swapped) {
                self.revert_files(&guard, &swapped);
                return Err(e);
            }
        }
        *guard = db;
        info!("Store restored ({} establishments)", guard.count(Collection::Profiles));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Profile;
    use chrono::Utc;

    fn table(establishment_id: &str, name: &str) -> Table {
        Table {
            id: crate::models::new_id(),
            establishment_id: establishment_id.to_string(),
            name: name.to_string(),
            seats: 4,
            zone: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn reads_are_scoped_to_the_establishment() {
        let store = Store::in_memory();
        let t = store.put(table("bar-a", "T1")).unwrap();
        store.put(table("bar-b", "T1")).unwrap();

        assert!(store.get::<Table>("bar-a", &t.id).is_some());
        assert!(store.get::<Table>("bar-b", &t.id).is_none());
        assert!(store.find::<Table>(&t.id).is_some());
        assert_eq!(store.list::<Table>("bar-a").len(), 1);
        assert_eq!(store.all::<Table>().len(), 2);
        assert!(matches!(
            store.delete::<Table>("bar-b", &t.id),
            Err(NackError::NotFound("Table"))
        ));
    }

    #[test]
    fn failed_transaction_is_rolled_back_silently() {
        let store = Store::in_memory();
        let kept = store.put(table("bar", "T1")).unwrap();
        let mut changes = store.subscribe();

        let result: Result<()> = store.transaction(|tx| {
            tx.put(table("bar", "T2"));
            tx.delete::<Table>("bar", &kept.id)?;
            let mut renamed = table("bar", "T3");
            renamed.id = "fixed".to_string();
            tx.put(renamed);
            Err(NackError::invalid("abort"))
        });

        assert!(result.is_err());
        let tables = store.list::<Table>("bar");
        assert_eq!(tables.len(), 1);
        assert_eq!(tables[0].name, "T1");
        assert!(changes.try_recv().is_err());
    }

    #[test]
    fn update_emits_one_change() {
        let store = Store::in_memory();
        let t = store.put(table("bar", "T1")).unwrap();
        let mut changes = store.subscribe();

        let updated = store
            .update::<Table, _>("bar", &t.id, |t| {
                t.seats = 8;
                Ok(())
            })
            .unwrap();
        assert_eq!(updated.seats, 8);

        let change = changes.try_recv().unwrap();
        assert_eq!(change.collection, Collection::Tables);
        assert_eq!(change.id, t.id);
        assert_eq!(change.kind, ChangeKind::Upserted);
        assert!(changes.try_recv().is_err());
    }

    #[test]
    fn collections_survive_reopening() {
        let dir = tempfile::tempdir().unwrap();
        let now = Utc::now();
        let profile = Profile::new("Chez Max", "Max", "max@bar.ga", "+24106123456", "h", now);
        let id = profile.id.clone();

        {
            let store = Store::open(dir.path()).unwrap();
            store.put(profile).unwrap();
            store.put(table(&id, "Terrasse")).unwrap();
        }
        assert!(dir.path().join("profiles.json").exists());
        assert!(dir.path().join("tables.json").exists());
        assert!(!dir.path().join("barOrders.json").exists());

        let reopened = Store::open(dir.path()).unwrap();
        assert_eq!(reopened.require::<Profile>(&id, &id).unwrap().establishment_name, "Chez Max");
        assert_eq!(reopened.list::<Table>(&id)[0].name, "Terrasse");
    }

    #[test]
    fn failed_write_keeps_disk_and_memory_as_before() {
        let dir = tempfile::tempdir().unwrap();
        let now = Utc::now();
        let profile = Profile::new("Chez Max", "Max", "max@bar.ga", "+24106123456", "h", now);
        let id = profile.id.clone();

        {
            let store = Store::open(dir.path()).unwrap();
            store.put(profile).unwrap();
            let mut changes = store.subscribe();

            // tables.json cannot be replaced while a directory sits there
            fs::create_dir(dir.path().join("tables.json")).unwrap();
            let result = store.transaction(|tx| {
                let mut profile = tx.require::<Profile>(&id, &id)?.clone();
                profile.establishment_name = "Chez Maxime".to_string();
                tx.put(profile);
                tx.put(table(&id, "Terrasse"));
                Ok(())
            });

            assert!(matches!(result, Err(NackError::Io(_))));
            assert_eq!(store.require::<Profile>(&id, &id).unwrap().establishment_name, "Chez Max");
            assert!(store.list::<Table>(&id).is_empty());
            assert!(changes.try_recv().is_err());
            assert!(!dir.path().join("profiles.json.tmp").exists());
            assert!(!dir.path().join("tables.json.tmp").exists());
        }

        fs::remove_dir(dir.path().join("tables.json")).unwrap();
        let reopened = Store::open(dir.path()).unwrap();
        assert_eq!(reopened.require::<Profile>(&id, &id).unwrap().establishment_name, "Chez Max");
        assert!(reopened.list::<Table>(&id).is_empty());
    }

    #[test]
    fn preview_leaves_no_trace() {
        let store = Store::in_memory();
        let mut changes = store.subscribe();

        let staged = store
            .preview(|tx| {
                tx.put(table("bar", "T1"));
                Ok(tx.list::<Table>("bar").len())
            })
            .unwrap();

        assert_eq!(staged, 1);
        assert!(store.list::<Table>("bar").is_empty());
        assert!(changes.try_recv().is_err());
    }

    #[test]
    fn restore_replaces_everything() {
        let store = Store::in_memory();
        store.put(table("bar", "T1")).unwrap();
        let snapshot = store.snapshot();
        store.put(table("bar", "T2")).unwrap();
        assert_eq!(store.list::<Table>("bar").len(), 2);

        store.restore(snapshot).unwrap();
        assert_eq!(store.list::<Table>("bar").len(), 1);
    }

    #[test]
    fn scoped_copy_keeps_one_establishment() {
        let store = Store::in_memory();
        store.put(table("bar-a", "T1")).unwrap();
        store.put(table("bar-b", "T1")).unwrap();
        let profile = store
            .put(Profile::new("A", "Ama", "a@bar.ga", "+24106000000", "h", Utc::now()))
            .unwrap();

        let scoped = store.snapshot().scoped("bar-a");
        assert_eq!(scoped.count(Collection::Tables), 1);
        assert_eq!(scoped.count(Collection::Profiles), 0);
        assert_eq!(store.snapshot().scoped(&profile.id).count(Collection::Profiles), 1);
    }
}
