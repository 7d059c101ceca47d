//! Flight projection: the read-side copy of the data contract's flight list.
//!
//! The table is only ever replaced whole. Writers build a new vector and swap
//! the shared pointer, so a reader holds either the old table or the new one.

use std::sync::{Arc, PoisonError, RwLock};

use futures_util::{stream, StreamExt, TryStreamExt};
use serde_json::json;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::ledger::{decode, methods, LedgerClient, LedgerError};
use crate::models::de::NumberOrString;
use crate::models::events::FlightRegistered;
use crate::models::{Contract, FlightAttributes, FlightRecord};

const MAX_CONCURRENT_READS: usize = 16;

#[derive(Debug, Error)]
enum ProjectionError {
    #[error("ledger read for ordinal {ordinal:?} failed: {source}")]
    Ledger {
        ordinal: Option<u64>,
        #[source]
        source: LedgerError,
    },
    #[error("flight at ordinal {ordinal} is undecodable: {source}")]
    Decode {
        ordinal: u64,
        #[source]
        source: serde_json::Error,
    },
}

impl ProjectionError {
    /// The first flight cannot be read. With a counter of 0 this is how the
    /// data contract reports that it holds no flights.
    fn is_missing_first_flight(&self) -> bool {
        matches!(
            self,
            ProjectionError::Ledger {
                ordinal: Some(0),
                source: LedgerError::NoData | LedgerError::Reverted(_),
            }
        )
    }
}

pub struct FlightProjection {
    ledger: Arc<dyn LedgerClient>,
    table: RwLock<Arc<Vec<FlightRecord>>>,
    /// Serializes writers so an older rebuild never lands after a newer one.
    writer: Mutex<()>,
}

impl FlightProjection {
    pub fn new(ledger: Arc<dyn LedgerClient>) -> Self {
        Self {
            ledger,
            table: RwLock::new(Arc::new(Vec::new())),
            writer: Mutex::new(()),
        }
    }

    /// Current table, ordered by ordinal.
    pub fn query(&self) -> Arc<Vec<FlightRecord>> {
        Arc::clone(&self.table.read().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn list_flights(&self) -> Vec<FlightRecord> {
        self.query().as_ref().clone()
    }

    /// Rebuild the whole table from the ledger. Returns the number of records now visible.
    ///
    /// An empty ledger empties the table. Any other read failure keeps the
    /// previous table.
    pub async fn resync(&self) -> usize {
        let _writer = self.writer.lock().await;
        self.resync_locked().await
    }

    async fn resync_locked(&self) -> usize {
        match self.rebuild().await {
            Ok(records) => {
                let count = records.len();
                self.swap(records);
                info!(flights = count, "Flight projection rebuilt");
                count
            }
            Err(err) => {
                let kept = self.query().len();
                warn!(error = %err, kept, "Flight projection rebuild failed; keeping previous table");
                kept
            }
        }
    }

    /// Place the newest flight after a `FlightRegistered` event.
    pub async fn apply_registration(&self, event: &FlightRegistered) {
        let _writer = self.writer.lock().await;

        let ordinal = match self.latest_ordinal().await {
            Ok(Some(ordinal)) => ordinal,
            Ok(None) => {
                warn!(flight = %event.flight, "Flight registered but ledger reports no flights");
                return;
            }
            Err(err) => {
                warn!(flight = %event.flight, error = %err, "Cannot read latest flight ordinal");
                return;
            }
        };

        let current = self.query();
        let len = current.len() as u64;
        if ordinal > len {
            debug!(ordinal, known = len, "Registration would leave a gap; rebuilding");
            self.resync_locked().await;
            return;
        }

        let record = match self.fetch_record(ordinal).await {
            Ok(record) => record,
            Err(err) => {
                warn!(flight = %event.flight, ordinal, error = %err, "Cannot read registered flight");
                return;
            }
        };

        if record.attributes.flight_no != event.flight {
            debug!(
                event_flight = %event.flight,
                ledger_flight = %record.attributes.flight_no,
                ordinal,
                "Latest flight differs from event; a later registration landed first"
            );
        }

        let mut records = current.as_ref().clone();
        if ordinal == len {
            records.push(record);
        } else {
            records[ordinal as usize] = record;
        }
        self.swap(records);

        info!(flight = %event.flight, to = %event.to, landing = event.landing, ordinal, "Flight added to projection");
    }

    async fn rebuild(&self) -> Result<Vec<FlightRecord>, ProjectionError> {
        let Some(latest) = self.latest_ordinal().await? else {
            return Ok(Vec::new());
        };
        if latest == 0 {
            return match self.fetch_record(0).await {
                Ok(record) => Ok(vec![record]),
                Err(err) if err.is_missing_first_flight() => {
                    debug!(error = %err, "zero flights");
                    Ok(Vec::new())
                }
                Err(err) => Err(err),
            };
        }

        stream::iter(0..=latest)
            .map(|ordinal| self.fetch_record(ordinal))
            .buffered(MAX_CONCURRENT_READS)
            .try_collect()
            .await
    }

    /// Highest ordinal the data contract has assigned, `None` for an empty ledger.
    async fn latest_ordinal(&self) -> Result<Option<u64>, ProjectionError> {
        let raw = match self
            .ledger
            .call(Contract::Data, methods::INDEX_FLIGHT_KEYS, vec![], None)
            .await
        {
            Ok(raw) => raw,
            Err(LedgerError::NoData) => return Ok(None),
            Err(source) => return Err(ProjectionError::Ledger { ordinal: None, source }),
        };

        let latest: NumberOrString = decode(methods::INDEX_FLIGHT_KEYS, raw)
            .map_err(|source| ProjectionError::Ledger { ordinal: None, source })?;
        latest
            .as_u64()
            .map(Some)
            .map_err(|reason| ProjectionError::Ledger {
                ordinal: None,
                source: LedgerError::Decode(reason),
            })
    }

    async fn fetch_record(&self, ordinal: u64) -> Result<FlightRecord, ProjectionError> {
        let ledger_err = |source| ProjectionError::Ledger {
            ordinal: Some(ordinal),
            source,
        };

        let raw_key = self
            .ledger
            .call(Contract::Data, methods::FLIGHT_KEYS, vec![json!(ordinal)], None)
            .await
            .map_err(ledger_err)?;
        let key: String = decode(methods::FLIGHT_KEYS, raw_key).map_err(ledger_err)?;

        let raw_flight = self
            .ledger
            .call(Contract::Data, methods::FLIGHTS, vec![json!(key)], None)
            .await
            .map_err(ledger_err)?;
        let attributes = FlightAttributes::from_ledger(raw_flight)
            .map_err(|source| ProjectionError::Decode { ordinal, source })?;

        Ok(FlightRecord {
            ordinal,
            key,
            attributes,
        })
    }

    fn swap(&self, records: Vec<FlightRecord>) {
        *self.table.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(records);
    }
}
