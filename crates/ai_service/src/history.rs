//! Historical (actual, predicted) pairs per valve and model kind
//!
//! The offline pipeline writes its back-test predictions to a table with one
//! row per valve, model and date:
//!
//! ```text
//! VALVULA;MODELO;FECHA;REAL;PREDICCION
//! VALVULA_1;lightgbm;2024-01-01;1520,5;1498,2
//! ```
//!
//! `FECHA` is optional. A series is ordered by it only when every one of its
//! rows is dated; otherwise file order is kept.

use crate::data::TableStore;
use crate::errors::TableError;
use chrono::NaiveDate;
use gasbal_ai_core::ModelKind;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::debug;

pub const COL_ENTITY: &str = "VALVULA";
pub const COL_MODEL: &str = "MODELO";
pub const COL_DATE: &str = "FECHA";
pub const COL_ACTUAL: &str = "REAL";
pub const COL_PREDICTED: &str = "PREDICCION";

/// One back-test observation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct HistoryPair {
    pub actual: f64,
    pub predicted: f64,
}

impl HistoryPair {
    pub fn new(actual: f64, predicted: f64) -> Self {
        Self { actual, predicted }
    }
}

/// Chronologically ordered pairs per kind
pub type EntityHistory = BTreeMap<ModelKind, Vec<HistoryPair>>;

/// Source of back-test history
pub trait HistoryProvider: Send + Sync {
    /// History for `entity`; empty when the entity has none
    fn history(&self, entity: &str) -> Result<EntityHistory, TableError>;

    /// Entities with any history, sorted
    fn entities(&self) -> Result<Vec<String>, TableError>;
}

/// History held in memory
#[derive(Debug, Default)]
pub struct InMemoryHistory {
    entries: RwLock<BTreeMap<String, EntityHistory>>,
}

impl InMemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, entity: &str, kind: ModelKind, pair: HistoryPair) {
        self.entries
            .write()
            .entry(entity.to_string())
            .or_default()
            .entry(kind)
            .or_default()
            .push(pair);
    }

    pub fn extend<I>(&self, entity: &str, kind: ModelKind, pairs: I)
    where
        I: IntoIterator<Item = (f64, f64)>,
    {
        let mut entries = self.entries.write();
        let series = entries
            .entry(entity.to_string())
            .or_default()
            .entry(kind)
            .or_default();
        series.extend(pairs.into_iter().map(|(a, p)| HistoryPair::new(a, p)));
    }
}

impl HistoryProvider for InMemoryHistory {
    fn history(&self, entity: &str) -> Result<EntityHistory, TableError> {
        Ok(self.entries.read().get(entity).cloned().unwrap_or_default())
    }

    fn entities(&self) -> Result<Vec<String>, TableError> {
        Ok(self.entries.read().keys().cloned().collect())
    }
}

/// History read from a table in the data store
pub struct TableHistory {
    store: Arc<TableStore>,
    table: String,
}

impl TableHistory {
    pub fn new(store: Arc<TableStore>, table: impl Into<String>) -> Self {
        Self {
            store,
            table: table.into(),
        }
    }
}

impl HistoryProvider for TableHistory {
    fn history(&self, entity: &str) -> Result<EntityHistory, TableError> {
        let table = self.store.load_table(&self.table)?;
        for column in [COL_ENTITY, COL_MODEL, COL_ACTUAL, COL_PREDICTED] {
            table.require_column(column)?;
        }

        let mut dated: BTreeMap<ModelKind, Vec<(Option<NaiveDate>, HistoryPair)>> =
            BTreeMap::new();
        for row in table.rows() {
            if row.text(COL_ENTITY) != Some(entity) {
                continue;
            }
            let Some(kind) = row.text(COL_MODEL).and_then(|m| m.parse::<ModelKind>().ok()) else {
                debug!(entity, row = row.index(), "skipping row with unknown model");
                continue;
            };
            // Rows without both values are gaps in the back-test, not errors.
            let (Some(actual), Some(predicted)) =
                (row.number(COL_ACTUAL), row.number(COL_PREDICTED))
            else {
                debug!(entity, row = row.index(), "skipping incomplete row");
                continue;
            };
            dated
                .entry(kind)
                .or_default()
                .push((row.date(COL_DATE), HistoryPair::new(actual, predicted)));
        }

        Ok(dated
            .into_iter()
            .map(|(kind, mut pairs)| {
                // A series with any undated row stays in file order.
                if pairs.iter().all(|(date, _)| date.is_some()) {
                    pairs.sort_by_key(|(date, _)| *date);
                } else {
                    debug!(entity, %kind, "undated rows, keeping file order");
                }
                (kind, pairs.into_iter().map(|(_, pair)| pair).collect())
            })
            .collect())
    }

    fn entities(&self) -> Result<Vec<String>, TableError> {
        let table = self.store.load_table(&self.table)?;
        table.require_column(COL_ENTITY)?;
        let entities: BTreeSet<String> = table
            .rows()
            .filter_map(|row| row.text(COL_ENTITY).map(str::to_string))
            .collect();
        Ok(entities.into_iter().collect())
    }
}
