use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::table::tableerror::TableError;

/// {i32 m, i32 T1, i32 T2, f64 divide}，原生位元組序，無填充
pub const RECORD_LEN: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BayesKey {
    pub time_remaining: u32,
    pub pulls_arm1: u32,
    pub pulls_arm2: u32,
}

impl BayesKey {
    pub fn new(time_remaining: u32, pulls_arm1: u32, pulls_arm2: u32) -> BayesKey {
        BayesKey { time_remaining, pulls_arm1, pulls_arm2 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BayesRecord {
    pub key: BayesKey,
    pub divide: f64,
}

/// 雙臂 divide 表：保留建表順序的紀錄，另以 HashMap 供查詢
#[derive(Debug, Clone, Default)]
pub struct BayesTable {
    records: Vec<BayesRecord>,
    lookup: HashMap<BayesKey, f64>,
}

impl BayesTable {
    pub fn from_records(records: Vec<BayesRecord>) -> Result<BayesTable, TableError> {
        let mut lookup = HashMap::with_capacity(records.len());
        for record in &records {
            let BayesKey { time_remaining, pulls_arm1, pulls_arm2 } = record.key;
            if time_remaining.max(pulls_arm1).max(pulls_arm2) > i32::MAX as u32 {
                return Err(TableError::Malformed(format!(
                    "key (m = {time_remaining}, T1 = {pulls_arm1}, T2 = {pulls_arm2}) does not fit in i32"
                )));
            }
            if lookup.insert(record.key, record.divide).is_some() {
                return Err(TableError::Malformed(format!(
                    "duplicate record for (m = {}, T1 = {}, T2 = {})",
                    record.key.time_remaining, record.key.pulls_arm1, record.key.pulls_arm2
                )));
            }
        }
        Ok(BayesTable { records, lookup })
    }

    pub fn records(&self) -> &[BayesRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn lookup(&self, key: &BayesKey) -> Option<f64> {
        self.lookup.get(key).copied()
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.records.len() * RECORD_LEN);
        for record in &self.records {
            bytes.extend_from_slice(&(record.key.time_remaining as i32).to_ne_bytes());
            bytes.extend_from_slice(&(record.key.pulls_arm1 as i32).to_ne_bytes());
            bytes.extend_from_slice(&(record.key.pulls_arm2 as i32).to_ne_bytes());
            bytes.extend_from_slice(&record.divide.to_ne_bytes());
        }
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<BayesTable, TableError> {
        if bytes.len() % RECORD_LEN != 0 {
            return Err(TableError::Malformed(format!(
                "length {} is not a multiple of the {RECORD_LEN}-byte record",
                bytes.len()
            )));
        }

        let mut records = Vec::with_capacity(bytes.len() / RECORD_LEN);
        for (i, chunk) in bytes.chunks_exact(RECORD_LEN).enumerate() {
            let field = |at: usize| -> Result<u32, TableError> {
                let mut raw = [0u8; 4];
                raw.copy_from_slice(&chunk[at..at + 4]);
                let value = i32::from_ne_bytes(raw);
                u32::try_from(value).map_err(|_| {
                    TableError::Malformed(format!("record {i} has negative key component {value}"))
                })
            };
            let mut raw = [0u8; 8];
            raw.copy_from_slice(&chunk[12..20]);
            records.push(BayesRecord {
                key: BayesKey::new(field(0)?, field(4)?, field(8)?),
                divide: f64::from_ne_bytes(raw),
            });
        }
        BayesTable::from_records(records)
    }

    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<(), TableError> {
        let path = path.as_ref();
        fs::write(path, self.to_bytes()).map_err(|error| TableError::io(path, error))
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<BayesTable, TableError> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|error| TableError::io(path, error))?;
        Self::from_bytes(&bytes).map_err(|error| error.with_path(path))
    }
}
