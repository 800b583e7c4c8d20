use std::fs;
use std::path::Path;

use serde::{
    Deserialize,
    Serialize
};

use crate::table::tableerror::TableError;

/// 帶檔頭格式的 magic；以 little-endian double 讀取約為 5e-307，不會是任何 index 值
pub const HEADER_MAGIC: [u8; 8] = *b"GITTIDX\0";
pub const HEADER_VERSION: u32 = 1;
const HEADER_LEN: usize = 24;
const CELL_LEN: usize = std::mem::size_of::<f64>();

/// [`GittinsTable`] 的檔案格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TableFormat {
    /// `n(n+1)/2` 個原生位元組序的 double，無檔頭；horizon 由檔案長度反推
    #[default]
    Bare,
    /// `magic | version: u32 | reserved: u32 | horizon: u64 | doubles`，皆為 little-endian
    Headered,
}

pub fn triangular_number(n: usize) -> usize {
    n * (n + 1) / 2
}

/// 溢位時回傳 `None`
pub fn checked_triangular_number(n: usize) -> Option<usize> {
    let (even, odd) = if n % 2 == 0 { (n / 2, n.checked_add(1)?) } else { ((n + 1) / 2, n) };
    even.checked_mul(odd)
}

/// [`triangular_number`] 的反函數：`round((√(8·count + 1) − 1) / 2)`；
/// count 不是三角數時回傳 `None`
pub fn horizon_from_cell_count(count: usize) -> Option<usize> {
    let n = ((((8 * count + 1) as f64).sqrt() - 1.0) / 2.0).round() as usize;
    (n >= 1 && triangular_number(n) == count).then_some(n)
}

/// 以 (剩餘時間 `m`, 已拉次數 `T`) 為索引的 Gittins index 表，
/// 涵蓋所有 `m ≥ 1`、`T ≥ 1`、`m + T ≤ horizon + 1`。
///
/// 依 `m` 遞減逐列壓縮存放：第 `m` 列從 `(n−m)(n−m+1)/2` 開始，共 `n − m + 1` 格。
/// 表格自行持有資料，查詢回傳複本。
#[derive(Debug, Clone, PartialEq)]
pub struct GittinsTable {
    data: Vec<f64>,
    horizon: usize,
}

impl GittinsTable {
    pub fn new(horizon: usize) -> GittinsTable {
        assert!(horizon >= 1, "horizon must be at least 1");
        GittinsTable {
            data: vec![0.0; triangular_number(horizon)],
            horizon,
        }
    }

    pub fn horizon(&self) -> usize {
        self.horizon
    }

    pub fn cell_count(&self) -> usize {
        self.data.len()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    pub fn memory_bytes(&self) -> usize {
        self.data.len() * CELL_LEN
    }

    pub fn contains(&self, m: usize, t: usize) -> bool {
        m >= 1 && t >= 1 && m + t <= self.horizon + 1
    }

    #[inline]
    fn offset(&self, m: usize, t: usize) -> usize {
        let row = self.horizon - m;
        row * (row + 1) / 2 + t - 1
    }

    /// cell `(m, t)` 在一維陣列中的位置
    pub fn cell_index(&self, m: usize, t: usize) -> usize {
        self.assert_cell(m, t);
        self.offset(m, t)
    }

    fn assert_cell(&self, m: usize, t: usize) {
        assert!(m >= 1, "time remaining must be at least 1, got {m}");
        assert!(t >= 1, "pulls so far must be at least 1, got {t}");
        assert!(
            m + t <= self.horizon + 1,
            "cell (m = {m}, T = {t}) lies outside a table of horizon {}",
            self.horizon
        );
    }

    pub fn get_idx(&self, m: usize, t: usize) -> f64 {
        self.assert_cell(m, t);
        self.data[self.offset(m, t)]
    }

    pub fn try_get_idx(&self, m: usize, t: usize) -> Option<f64> {
        self.contains(m, t).then(|| self.data[self.offset(m, t)])
    }

    pub fn set_idx(&mut self, m: usize, t: usize, value: f64) {
        self.assert_cell(m, t);
        let i = self.offset(m, t);
        self.data[i] = value;
    }

    pub fn to_bytes(&self, format: TableFormat) -> Vec<u8> {
        match format {
            TableFormat::Bare => {
                let mut bytes = Vec::with_capacity(self.memory_bytes());
                for v in &self.data {
                    bytes.extend_from_slice(&v.to_ne_bytes());
                }
                bytes
            }
            TableFormat::Headered => {
                let mut bytes = Vec::with_capacity(HEADER_LEN + self.memory_bytes());
                bytes.extend_from_slice(&HEADER_MAGIC);
                bytes.extend_from_slice(&HEADER_VERSION.to_le_bytes());
                bytes.extend_from_slice(&0u32.to_le_bytes());
                bytes.extend_from_slice(&(self.horizon as u64).to_le_bytes());
                for v in &self.data {
                    bytes.extend_from_slice(&v.to_le_bytes());
                }
                bytes
            }
        }
    }

    /// 兩種格式皆可解碼；開頭為 [`HEADER_MAGIC`] 時視為帶檔頭格式
    pub fn from_bytes(bytes: &[u8]) -> Result<GittinsTable, TableError> {
        if bytes.len() >= HEADER_LEN && bytes[..8] == HEADER_MAGIC {
            Self::from_headered_bytes(bytes)
        } else {
            Self::from_bare_bytes(bytes)
        }
    }

    fn from_bare_bytes(bytes: &[u8]) -> Result<GittinsTable, TableError> {
        if bytes.is_empty() {
            return Err(TableError::Malformed("empty table".to_owned()));
        }
        if bytes.len() % CELL_LEN != 0 {
            return Err(TableError::Malformed(format!(
                "length {} is not a multiple of {CELL_LEN}",
                bytes.len()
            )));
        }
        let count = bytes.len() / CELL_LEN;
        let horizon = horizon_from_cell_count(count).ok_or_else(|| {
            TableError::Malformed(format!("{count} cells is not a triangular number"))
        })?;
        let data = decode_cells(bytes, f64::from_ne_bytes);
        Ok(GittinsTable { data, horizon })
    }

    fn from_headered_bytes(bytes: &[u8]) -> Result<GittinsTable, TableError> {
        let version = u32::from_le_bytes(fixed_bytes(&bytes[8..12]));
        if version != HEADER_VERSION {
            return Err(TableError::Malformed(format!(
                "unsupported table version {version}, expected {HEADER_VERSION}"
            )));
        }
        let declared = u64::from_le_bytes(fixed_bytes(&bytes[16..24]));
        if declared == 0 {
            return Err(TableError::Malformed("header declares horizon 0".to_owned()));
        }
        let expected = usize::try_from(declared)
            .ok()
            .and_then(checked_triangular_number)
            .and_then(|cells| cells.checked_mul(CELL_LEN))
            .and_then(|payload| payload.checked_add(HEADER_LEN))
            .ok_or_else(|| {
                TableError::Malformed(format!("header declares horizon {declared}, too large to address"))
            })?;
        let horizon = declared as usize;
        if bytes.len() != expected {
            return Err(TableError::Malformed(format!(
                "header declares horizon {horizon} ({expected} bytes) but payload has {} bytes",
                bytes.len()
            )));
        }
        let data = decode_cells(&bytes[HEADER_LEN..], f64::from_le_bytes);
        Ok(GittinsTable { data, horizon })
    }

    pub fn write<P: AsRef<Path>>(&self, path: P, format: TableFormat) -> Result<(), TableError> {
        let path = path.as_ref();
        fs::write(path, self.to_bytes(format)).map_err(|error| TableError::io(path, error))
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<GittinsTable, TableError> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|error| TableError::io(path, error))?;
        Self::from_bytes(&bytes).map_err(|error| error.with_path(path))
    }
}

fn fixed_bytes<const N: usize>(bytes: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(bytes);
    out
}

fn decode_cells(bytes: &[u8], decode: fn([u8; CELL_LEN]) -> f64) -> Vec<f64> {
    bytes
        .chunks_exact(CELL_LEN)
        .map(|chunk| decode(fixed_bytes(chunk)))
        .collect()
}
