//! JSON-file store for houses and their rankings.
//!
//! The whole database is one JSON document, loaded on open and rewritten on
//! save (temp file + rename, so a crash never leaves a half-written file).
//!
//! Ranks live in separate entries keyed by (house, collection, ranking), so
//! one house can sit in several rankings of its collection. Each ranking
//! scope carries a version counter that every commit bumps. Insertion
//! commits name the version they were computed against and are refused if
//! the scope moved on in between; that is what keeps two sessions on the
//! same scope from writing overlapping ranks.
//!
//! Writers hold an exclusive advisory lock on `<store>.lock` from the moment
//! they load the file until they have saved it ([`Store::open_exclusive`]).
//! The version check therefore always runs against what is on disk, and no
//! save can overwrite a commit it never saw. [`Store::open`] gives a
//! read-only snapshot that refuses to save.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use fs2::FileExt;
use houserank_core::{rebalance, rebalance_after_removal, RankedItem};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

pub const DEFAULT_COLLECTION_NAME: &str = "Default Collection";
pub const DEFAULT_RANKING_NAME: &str = "Main Ranking";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse store file {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("house not found: {0}")]
    HouseNotFound(String),

    #[error("house id prefix \"{0}\" matches more than one house")]
    AmbiguousId(String),

    #[error("house {house_id} is already ranked in {scope}")]
    AlreadyRanked { house_id: String, scope: RankingScope },

    #[error("house {house_id} is not ranked in {scope}")]
    NotRanked { house_id: String, scope: RankingScope },

    #[error("house {house_id} belongs to collection \"{collection}\", not {scope}")]
    WrongCollection {
        house_id: String,
        collection: String,
        scope: RankingScope,
    },

    #[error("{scope} changed while ranking (expected version {expected}, found {found}); start the comparison again")]
    StaleRanking {
        scope: RankingScope,
        expected: u64,
        found: u64,
    },

    #[error("{path} was opened read-only; changes cannot be saved")]
    NotLocked { path: PathBuf },

    #[error("store file {path} is corrupt: {scope} {reason}")]
    Corrupt {
        path: PathBuf,
        scope: RankingScope,
        reason: String,
    },

    #[error("rank {rank} is out of range for {scope} with {len} ranked houses")]
    RankOutOfRange {
        rank: usize,
        len: usize,
        scope: RankingScope,
    },
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// A (collection, ranking name) pair. Ranks are unique and contiguous within one scope.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RankingScope {
    pub collection_name: String,
    pub ranking_name: String,
}

impl RankingScope {
    pub fn new(collection_name: impl Into<String>, ranking_name: impl Into<String>) -> Self {
        RankingScope {
            collection_name: collection_name.into(),
            ranking_name: ranking_name.into(),
        }
    }
}

impl Default for RankingScope {
    fn default() -> Self {
        RankingScope::new(DEFAULT_COLLECTION_NAME, DEFAULT_RANKING_NAME)
    }
}

impl std::fmt::Display for RankingScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "\"{}\" / \"{}\"", self.collection_name, self.ranking_name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct House {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub listing_url: Option<String>,
    pub collection_name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields supplied when adding a house.
#[derive(Debug, Clone, Default)]
pub struct NewHouse {
    pub title: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub listing_url: Option<String>,
    /// `None` = [`DEFAULT_COLLECTION_NAME`].
    pub collection_name: Option<String>,
}

/// Fields to change on an existing house. `None` leaves a field as it is;
/// an empty string clears an optional field.
#[derive(Debug, Clone, Default)]
pub struct HouseUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub listing_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RankingEntry {
    house_id: String,
    #[serde(flatten)]
    scope: RankingScope,
    rank: usize,
    updated_at: DateTime<Utc>,
}

/// Known ranking scopes and their commit counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ScopeVersion {
    #[serde(flatten)]
    scope: RankingScope,
    version: u64,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Database {
    #[serde(default)]
    houses: Vec<House>,
    #[serde(default)]
    rankings: Vec<RankingEntry>,
    #[serde(default)]
    scopes: Vec<ScopeVersion>,
}

/// `path` with `suffix` appended to its file name (`houses.json` → `houses.json.lock`).
fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(suffix);
    PathBuf::from(name)
}

/// Exclusive advisory lock on the file next to a store. Released on drop.
#[derive(Debug)]
pub struct StoreLock {
    file: fs::File,
}

impl StoreLock {
    fn open_lock_file(store_path: &Path) -> Result<(fs::File, PathBuf)> {
        let lock_path = sibling(store_path, ".lock");
        let io_err = |source| StoreError::Io {
            path: lock_path.clone(),
            source,
        };

        if let Some(parent) = lock_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }

        let file = fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)
            .map_err(io_err)?;
        Ok((file, lock_path))
    }

    /// Block until the lock for the store at `store_path` is ours.
    pub fn acquire(store_path: &Path) -> Result<Self> {
        let (file, lock_path) = Self::open_lock_file(store_path)?;
        file.lock_exclusive()
            .map_err(|source| StoreError::Io { path: lock_path.clone(), source })?;
        debug!(path = %lock_path.display(), "store lock acquired");
        Ok(StoreLock { file })
    }

    /// Take the lock only if nobody else holds it.
    pub fn try_acquire(store_path: &Path) -> Result<Option<Self>> {
        let (file, lock_path) = Self::open_lock_file(store_path)?;
        match file.try_lock_exclusive() {
            Ok(()) => Ok(Some(StoreLock { file })),
            Err(e) if e.raw_os_error() == fs2::lock_contended_error().raw_os_error() => Ok(None),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(source) => Err(StoreError::Io { path: lock_path, source }),
        }
    }
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

pub struct Store {
    path: PathBuf,
    db: Database,
    /// Present when opened for writing.
    lock: Option<StoreLock>,
}

impl Store {
    /// Load a read-only snapshot of the store at `path`. A missing file is an empty store.
    pub fn open(path: &Path) -> Result<Self> {
        Ok(Store {
            path: path.to_path_buf(),
            db: Self::load(path)?,
            lock: None,
        })
    }

    /// Lock the store at `path`, then load it. The lock is held until the store is dropped.
    pub fn open_exclusive(path: &Path) -> Result<Self> {
        let lock = StoreLock::acquire(path)?;
        Ok(Store {
            path: path.to_path_buf(),
            db: Self::load(path)?,
            lock: Some(lock),
        })
    }

    fn load(path: &Path) -> Result<Database> {
        let db = match fs::read_to_string(path) {
            Ok(content) => serde_json::from_str(&content).map_err(|source| StoreError::Json {
                path: path.to_path_buf(),
                source,
            })?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no store file yet, starting empty");
                Database::default()
            }
            Err(source) => {
                return Err(StoreError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        Ok(db)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the store back to disk atomically. Only stores opened with
    /// [`Store::open_exclusive`] can be saved.
    pub fn save(&self) -> Result<()> {
        if self.lock.is_none() {
            return Err(StoreError::NotLocked { path: self.path.clone() });
        }

        let io_err = |source| StoreError::Io {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }

        let json = serde_json::to_string_pretty(&self.db).map_err(|source| StoreError::Json {
            path: self.path.clone(),
            source,
        })?;

        let tmp = sibling(&self.path, ".tmp");
        fs::write(&tmp, json).map_err(io_err)?;
        fs::rename(&tmp, &self.path).map_err(io_err)?;

        debug!(path = %self.path.display(), houses = self.db.houses.len(), "store saved");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Houses
    // -----------------------------------------------------------------------

    pub fn add_house(&mut self, new: NewHouse) -> House {
        let now = Utc::now();
        let house = House {
            id: Uuid::new_v4().to_string(),
            title: new.title,
            description: new.description,
            image_url: new.image_url,
            listing_url: new.listing_url,
            collection_name: new
                .collection_name
                .unwrap_or_else(|| DEFAULT_COLLECTION_NAME.to_string()),
            created_at: now,
            updated_at: now,
        };
        self.db.houses.push(house.clone());
        house
    }

    /// Look a house up by full id or by a unique id prefix.
    pub fn house(&self, id_or_prefix: &str) -> Result<&House> {
        if let Some(house) = self.db.houses.iter().find(|h| h.id == id_or_prefix) {
            return Ok(house);
        }

        let mut matches = self
            .db
            .houses
            .iter()
            .filter(|h| !id_or_prefix.is_empty() && h.id.starts_with(id_or_prefix));
        match (matches.next(), matches.next()) {
            (Some(house), None) => Ok(house),
            (Some(_), Some(_)) => Err(StoreError::AmbiguousId(id_or_prefix.to_string())),
            (None, _) => Err(StoreError::HouseNotFound(id_or_prefix.to_string())),
        }
    }

    /// Houses in a collection, oldest first.
    pub fn houses(&self, collection_name: &str) -> Vec<&House> {
        let mut houses: Vec<&House> = self
            .db
            .houses
            .iter()
            .filter(|h| h.collection_name == collection_name)
            .collect();
        houses.sort_by_key(|h| h.created_at);
        houses
    }

    /// Change the descriptive fields of a house. Rankings are untouched.
    pub fn update_house(&mut self, house_id: &str, update: HouseUpdate) -> Result<House> {
        let house_id = self.house(house_id)?.id.clone();
        let house = self
            .db
            .houses
            .iter_mut()
            .find(|h| h.id == house_id)
            .ok_or_else(|| StoreError::HouseNotFound(house_id.clone()))?;

        if let Some(title) = update.title {
            house.title = title;
        }
        let clear_empty = |value: String| Some(value).filter(|v| !v.is_empty());
        if let Some(description) = update.description {
            house.description = clear_empty(description);
        }
        if let Some(image_url) = update.image_url {
            house.image_url = clear_empty(image_url);
        }
        if let Some(listing_url) = update.listing_url {
            house.listing_url = clear_empty(listing_url);
        }
        house.updated_at = Utc::now();

        debug!(%house_id, "house updated");
        Ok(house.clone())
    }

    /// Every collection that has houses or rankings, sorted by name.
    pub fn collections(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .db
            .houses
            .iter()
            .map(|h| h.collection_name.clone())
            .chain(self.db.scopes.iter().map(|s| s.scope.collection_name.clone()))
            .collect();
        names.sort();
        names.dedup();
        names
    }

    /// Delete a house, closing its gap in every ranking it was part of.
    pub fn delete_house(&mut self, house_id: &str) -> Result<House> {
        let house = self.house(house_id)?.clone();

        let mut scopes: Vec<RankingScope> = self
            .db
            .rankings
            .iter()
            .filter(|e| e.house_id == house.id)
            .map(|e| e.scope.clone())
            .collect();
        scopes.sort();
        scopes.dedup();

        for scope in &scopes {
            self.remove_from_ranking(scope, &house.id)?;
        }

        self.db.houses.retain(|h| h.id != house.id);
        debug!(house_id = %house.id, rankings = scopes.len(), "house deleted");
        Ok(house)
    }

    // -----------------------------------------------------------------------
    // Rankings
    // -----------------------------------------------------------------------

    /// Ranked houses of `scope` in ascending rank order (best first).
    ///
    /// Fails if the stored ranks are not exactly `0..N` or an entry names a
    /// house that no longer exists; the resolver relies on position == rank.
    pub fn ranked(&self, scope: &RankingScope) -> Result<Vec<RankedItem<House>>> {
        let mut entries: Vec<&RankingEntry> = self
            .db
            .rankings
            .iter()
            .filter(|e| &e.scope == scope)
            .collect();
        entries.sort_by_key(|e| e.rank);

        let corrupt = |reason: String| StoreError::Corrupt {
            path: self.path.clone(),
            scope: scope.clone(),
            reason,
        };

        entries
            .into_iter()
            .enumerate()
            .map(|(position, entry)| {
                if entry.rank != position {
                    return Err(corrupt(format!("has rank {} where {position} was expected", entry.rank)));
                }
                let house = self
                    .db
                    .houses
                    .iter()
                    .find(|h| h.id == entry.house_id)
                    .ok_or_else(|| corrupt(format!("ranks missing house {}", entry.house_id)))?;
                Ok(RankedItem::new(house.id.clone(), Some(entry.rank), house.clone()))
            })
            .collect()
    }

    /// Houses of the scope's collection that have no rank in this scope yet.
    pub fn unranked(&self, scope: &RankingScope) -> Vec<House> {
        self.houses(&scope.collection_name)
            .into_iter()
            .filter(|h| self.entry_index(scope, &h.id).is_none())
            .cloned()
            .collect()
    }

    /// Ranking names known for a collection, the default one always first.
    pub fn ranking_names(&self, collection_name: &str) -> Vec<String> {
        let mut names: Vec<String> = self
            .db
            .scopes
            .iter()
            .map(|s| &s.scope)
            .chain(self.db.rankings.iter().map(|e| &e.scope))
            .filter(|s| s.collection_name == collection_name && s.ranking_name != DEFAULT_RANKING_NAME)
            .map(|s| s.ranking_name.clone())
            .collect();
        names.sort();
        names.dedup();
        names.insert(0, DEFAULT_RANKING_NAME.to_string());
        names
    }

    /// Register a ranking scope. Returns false if it already existed.
    pub fn create_ranking(&mut self, scope: &RankingScope) -> bool {
        if self.db.scopes.iter().any(|s| &s.scope == scope) {
            return false;
        }
        self.db.scopes.push(ScopeVersion {
            scope: scope.clone(),
            version: 0,
        });
        true
    }

    /// Commit counter for `scope`; 0 for a scope never written to.
    pub fn version(&self, scope: &RankingScope) -> u64 {
        self.db
            .scopes
            .iter()
            .find(|s| &s.scope == scope)
            .map_or(0, |s| s.version)
    }

    /// Look up a house that could be inserted into `scope`: it must belong to
    /// the scope's collection and not be ranked there yet.
    pub fn rankable_house(&self, scope: &RankingScope, house_id: &str) -> Result<&House> {
        let house = self.house(house_id)?;
        if house.collection_name != scope.collection_name {
            return Err(StoreError::WrongCollection {
                house_id: house.id.clone(),
                collection: house.collection_name.clone(),
                scope: scope.clone(),
            });
        }
        if self.entry_index(scope, &house.id).is_some() {
            return Err(StoreError::AlreadyRanked {
                house_id: house.id.clone(),
                scope: scope.clone(),
            });
        }
        Ok(house)
    }

    /// Insert `house_id` at `final_rank`, shifting the rest of the scope to make room.
    ///
    /// `expected_version` must be the version the caller read together with
    /// the ranked list the rank was computed from. Nothing is changed unless
    /// every check passes.
    pub fn commit_insertion(
        &mut self,
        scope: &RankingScope,
        house_id: &str,
        expected_version: u64,
        final_rank: usize,
    ) -> Result<()> {
        let found = self.version(scope);
        if found != expected_version {
            return Err(StoreError::StaleRanking {
                scope: scope.clone(),
                expected: expected_version,
                found,
            });
        }

        let house_id = self.rankable_house(scope, house_id)?.id.clone();

        let ranked = self.ranked(scope)?;
        if final_rank > ranked.len() {
            return Err(StoreError::RankOutOfRange {
                rank: final_rank,
                len: ranked.len(),
                scope: scope.clone(),
            });
        }

        let plan = rebalance(&ranked, final_rank);
        self.apply_plan(scope, &plan);
        self.db.rankings.push(RankingEntry {
            house_id: house_id.clone(),
            scope: scope.clone(),
            rank: final_rank,
            updated_at: Utc::now(),
        });
        self.touch_house(&house_id);
        let version = self.bump_version(scope);

        debug!(%house_id, %scope, rank = final_rank, version, "insertion committed");
        Ok(())
    }

    /// Take a house out of a ranking and close the gap. Returns the rank it held.
    pub fn remove_from_ranking(&mut self, scope: &RankingScope, house_id: &str) -> Result<usize> {
        let house_id = self.house(house_id)?.id.clone();
        let removed_rank = match self.entry_index(scope, &house_id) {
            Some(idx) => self.db.rankings[idx].rank,
            None => {
                return Err(StoreError::NotRanked {
                    house_id,
                    scope: scope.clone(),
                })
            }
        };

        let plan = rebalance_after_removal(&self.ranked(scope)?, removed_rank);
        self.apply_plan(scope, &plan);
        self.touch_house(&house_id);
        let version = self.bump_version(scope);

        debug!(%house_id, %scope, rank = removed_rank, version, "removed from ranking");
        Ok(removed_rank)
    }

    fn entry_index(&self, scope: &RankingScope, house_id: &str) -> Option<usize> {
        self.db
            .rankings
            .iter()
            .position(|e| e.house_id == house_id && &e.scope == scope)
    }

    /// Write a renumbering plan back into the scope's entries.
    /// Items that came back unranked lose their entry.
    fn apply_plan(&mut self, scope: &RankingScope, plan: &[RankedItem<House>]) {
        let now = Utc::now();
        for item in plan {
            let Some(idx) = self.entry_index(scope, &item.id) else {
                continue;
            };
            match item.rank {
                Some(rank) if rank != self.db.rankings[idx].rank => {
                    let entry = &mut self.db.rankings[idx];
                    entry.rank = rank;
                    entry.updated_at = now;
                }
                Some(_) => {}
                None => {
                    self.db.rankings.remove(idx);
                }
            }
        }
    }

    fn bump_version(&mut self, scope: &RankingScope) -> u64 {
        match self.db.scopes.iter_mut().find(|s| &s.scope == scope) {
            Some(s) => {
                s.version += 1;
                s.version
            }
            None => {
                self.db.scopes.push(ScopeVersion {
                    scope: scope.clone(),
                    version: 1,
                });
                1
            }
        }
    }

    fn touch_house(&mut self, house_id: &str) {
        if let Some(house) = self.db.houses.iter_mut().find(|h| h.id == house_id) {
            house.updated_at = Utc::now();
        }
    }
}
