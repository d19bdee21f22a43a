//! Durable daily price points backed by a single JSON file.
//!
//! The whole history lives in one JSON array, newest date first, rewritten
//! in full on every merge. The file stays small (one point per trading day)
//! so the simplicity of atomic-ish rewrite beats an append format.

use crate::domain::{DateKey, Decimal, PricePoint, PricePointUpdate, Symbol};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("price file io: {0}")]
    Io(#[from] std::io::Error),
    #[error("price file is not valid JSON: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// On-disk store of one [`PricePoint`] per calendar day.
///
/// All access is serialized through an async mutex so concurrent merges
/// cannot interleave their read-modify-write cycles.
pub struct PricePointStore {
    path: PathBuf,
    inner: Mutex<Vec<PricePoint>>,
}

impl PricePointStore {
    /// Load the store from `path`. A missing file is an empty history, not
    /// an error, so first boot needs no seed file.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let points = match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let mut points: Vec<PricePoint> = serde_json::from_slice(&bytes)?;
                sort_points(&mut points);
                points
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "no existing price file; starting empty");
                Vec::new()
            }
            Err(err) => return Err(err.into()),
        };
        debug!(path = %path.display(), points = points.len(), "price store loaded");
        Ok(Self {
            path,
            inner: Mutex::new(points),
        })
    }

    /// Merge an update into the point for its date, creating the point if
    /// the date is new, then rewrite the file. Fields the update does not
    /// carry keep their stored values.
    pub async fn merge(
        &self,
        update: PricePointUpdate,
        default_shares: Decimal,
    ) -> Result<PricePoint, StoreError> {
        let mut points = self.inner.lock().await;

        let date = update.date.clone().unwrap_or_else(DateKey::today);
        let position = points.iter().position(|p| p.date == date);
        let merged = match position {
            Some(idx) => {
                points[idx].apply(update);
                points[idx].clone()
            }
            None => {
                let mut point = PricePoint::default_for_date(date, default_shares);
                point.apply(update);
                points.push(point.clone());
                sort_points(&mut points);
                point
            }
        };

        self.persist(&points).await?;
        Ok(merged)
    }

    /// Point for an exact date, if stored.
    pub async fn point_for(&self, date: &DateKey) -> Option<PricePoint> {
        let points = self.inner.lock().await;
        points.iter().find(|p| &p.date == date).cloned()
    }

    /// Full history, newest first.
    pub async fn history(&self) -> Vec<PricePoint> {
        self.inner.lock().await.clone()
    }

    /// Immutable snapshot for synchronous lookup.
    pub async fn snapshot(&self) -> PriceBook {
        PriceBook::new(self.inner.lock().await.clone())
    }

    async fn persist(&self, points: &[PricePoint]) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let bytes = serde_json::to_vec_pretty(points)?;
        tokio::fs::write(&self.path, bytes).await?;
        debug!(path = %self.path.display(), points = points.len(), "price file rewritten");
        Ok(())
    }
}

/// Newest date first. DateKey strings compare chronologically.
fn sort_points(points: &mut [PricePoint]) {
    points.sort_by(|a, b| b.date.cmp(&a.date));
}

/// Read-only snapshot of the stored history, indexed for date lookups.
///
/// Built once per reconstruction and handed into the synchronous pairing
/// code so it never has to await the store.
pub struct PriceBook {
    by_date: BTreeMap<DateKey, PricePoint>,
}

impl PriceBook {
    pub fn new(points: Vec<PricePoint>) -> Self {
        let by_date = points.into_iter().map(|p| (p.date.clone(), p)).collect();
        Self { by_date }
    }

    /// Price of `symbol` on `date`, falling back to the nearest earlier
    /// date that has one. Returns `None` when no date at or before `date`
    /// carries the symbol.
    pub fn price_on(&self, symbol: &Symbol, date: &DateKey) -> Option<Decimal> {
        self.by_date
            .range(..=date.clone())
            .rev()
            .find_map(|(_, point)| point.price(symbol))
    }

    pub fn is_empty(&self) -> bool {
        self.by_date.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use tempfile::TempDir;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn sym(s: &str) -> Symbol {
        Symbol::new(s.to_string())
    }

    fn day(s: &str) -> DateKey {
        DateKey::parse(s).unwrap()
    }

    #[tokio::test]
    async fn test_open_missing_file_starts_empty() {
        let dir = TempDir::new().unwrap();
        let store = PricePointStore::open(dir.path().join("prices.json"))
            .await
            .unwrap();
        assert!(store.history().await.is_empty());
    }

    #[tokio::test]
    async fn test_merge_creates_point_and_persists() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("prices.json");
        {
            let store = PricePointStore::open(&path).await.unwrap();
            store
                .merge(
                    PricePointUpdate::for_date(day("2024-03-01")).with_price(sym("SUI"), dec("1.5")),
                    dec("998942"),
                )
                .await
                .unwrap();
        }

        // Reopen from disk.
        let store = PricePointStore::open(&path).await.unwrap();
        let point = store.point_for(&day("2024-03-01")).await.unwrap();
        assert_eq!(point.price(&sym("SUI")), Some(dec("1.5")));
        // Creation defaults: USDC pegged, shares from config.
        assert_eq!(point.price(&sym("USDC")), Some(Decimal::one()));
        assert_eq!(point.shares_outstanding, dec("998942"));
    }

    #[tokio::test]
    async fn test_merge_preserves_unsupplied_fields() {
        let dir = TempDir::new().unwrap();
        let store = PricePointStore::open(dir.path().join("prices.json"))
            .await
            .unwrap();

        store
            .merge(
                PricePointUpdate::for_date(day("2024-03-01"))
                    .with_price(sym("SUI"), dec("1.5"))
                    .with_funds_usd(dec("50000")),
                dec("998942"),
            )
            .await
            .unwrap();
        let merged = store
            .merge(
                PricePointUpdate::for_date(day("2024-03-01")).with_price(sym("DEEP"), dec("0.2")),
                dec("998942"),
            )
            .await
            .unwrap();

        assert_eq!(merged.price(&sym("SUI")), Some(dec("1.5")));
        assert_eq!(merged.price(&sym("DEEP")), Some(dec("0.2")));
        assert_eq!(merged.funds_usd, dec("50000"));
    }

    #[tokio::test]
    async fn test_merge_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let store = PricePointStore::open(dir.path().join("prices.json"))
            .await
            .unwrap();

        let update = PricePointUpdate::for_date(day("2024-03-01"))
            .with_price(sym("SUI"), dec("1.5"))
            .with_funds_usd(dec("50000"));
        let first = store.merge(update.clone(), dec("998942")).await.unwrap();
        let second = store.merge(update, dec("998942")).await.unwrap();

        assert_eq!(first.prices, second.prices);
        assert_eq!(first.funds_usd, second.funds_usd);
        assert_eq!(first.shares_outstanding, second.shares_outstanding);
        assert_eq!(store.history().await.len(), 1);
    }

    #[tokio::test]
    async fn test_history_is_newest_first() {
        let dir = TempDir::new().unwrap();
        let store = PricePointStore::open(dir.path().join("prices.json"))
            .await
            .unwrap();

        for date in ["2024-03-02", "2024-03-01", "2024-03-03"] {
            store
                .merge(
                    PricePointUpdate::for_date(day(date)).with_price(sym("SUI"), dec("1")),
                    dec("1"),
                )
                .await
                .unwrap();
        }

        let history = store.history().await;
        let dates: Vec<&str> = history.iter().map(|p| p.date.as_str()).collect();
        assert_eq!(dates, vec!["2024-03-03", "2024-03-02", "2024-03-01"]);
    }

    #[test]
    fn test_book_exact_then_nearest_prior() {
        let mut a = PricePoint::default_for_date(day("2024-03-01"), Decimal::zero());
        a.apply(PricePointUpdate::for_date(day("2024-03-01")).with_price(sym("SUI"), dec("1.5")));
        let b = PricePoint::default_for_date(day("2024-03-05"), Decimal::zero());

        let book = PriceBook::new(vec![a, b]);

        // Exact hit.
        assert_eq!(book.price_on(&sym("SUI"), &day("2024-03-01")), Some(dec("1.5")));
        // 03-05 exists but has no SUI price; fall back past it.
        assert_eq!(book.price_on(&sym("SUI"), &day("2024-03-06")), Some(dec("1.5")));
        // Nothing at or before.
        assert_eq!(book.price_on(&sym("SUI"), &day("2024-02-28")), None);
        // Unknown symbol.
        assert_eq!(book.price_on(&sym("XYZ"), &day("2024-03-06")), None);
    }
}
