/*
[INPUT]:  Fill applications, balance assignments, realized-basis records
[OUTPUT]: Crash-safe account/position/aux snapshots under the context dir
[POS]:    State layer - durable trading state
[UPDATE]: When adding tracked assets or changing snapshot layout
*/

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::warn;

const SPOT_ACCOUNT_FILE: &str = "spot_account.bin";
const FUTURES_ACCOUNT_FILE: &str = "futures_account.bin";
const POSITIONS_FILE: &str = "positions.bin";
const AUX_FILE: &str = "data.bin";

/// Positions at or below this magnitude are considered flat and removed.
pub fn position_epsilon() -> Decimal {
    Decimal::new(1, 8)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccountKind {
    Spot,
    Futures,
}

/// Balance sheet over the fixed set of tracked base assets.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub usdt: Decimal,
    pub bnb: Decimal,
    pub fdusd: Decimal,
    pub btc: Decimal,
    pub eth: Decimal,
    pub usdc: Decimal,
}

impl Account {
    pub const ASSETS: [&'static str; 6] = ["USDT", "BNB", "FDUSD", "BTC", "ETH", "USDC"];

    /// Assign a balance. Returns false for untracked assets.
    pub fn set(&mut self, asset: &str, value: Decimal) -> bool {
        match asset {
            "USDT" => self.usdt = value,
            "BNB" => self.bnb = value,
            "FDUSD" => self.fdusd = value,
            "BTC" => self.btc = value,
            "ETH" => self.eth = value,
            "USDC" => self.usdc = value,
            _ => return false,
        }
        true
    }

    pub fn get(&self, asset: &str) -> Option<Decimal> {
        match asset {
            "USDT" => Some(self.usdt),
            "BNB" => Some(self.bnb),
            "FDUSD" => Some(self.fdusd),
            "BTC" => Some(self.btc),
            "ETH" => Some(self.eth),
            "USDC" => Some(self.usdc),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub amount: Decimal,
    pub last_price: Decimal,
    pub avg_price: Decimal,
    pub total_cost: Decimal,
}

impl Position {
    /// Fold one signed fill into the position.
    pub fn apply(&mut self, amount: Decimal, price: Decimal) {
        self.total_cost += amount * price;
        self.amount += amount;
        self.avg_price = if self.amount.is_zero() {
            Decimal::ZERO
        } else {
            self.total_cost / self.amount
        };
        self.last_price = price;
    }

    pub fn is_flat(&self) -> bool {
        self.amount.abs() <= position_epsilon()
    }
}

/// Realized basis at last fill and divergence level, both per symbol.
/// Entries persist indefinitely once created.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuxData {
    pub openpx: HashMap<String, Decimal>,
    pub level_time: HashMap<String, u32>,
}

#[derive(Debug, Default)]
struct ContextState {
    spot_account: Account,
    futures_account: Account,
    positions: HashMap<String, Position>,
    aux: AuxData,
}

/// Durable trading state: two account sheets, the position map and the
/// aux store. Every mutation commits its owning snapshot to disk before
/// the call returns; a failed write is logged and retried implicitly on
/// the next mutation (in-memory state stays authoritative for the run).
#[derive(Debug)]
pub struct PersistentContext {
    dir: PathBuf,
    state: Mutex<ContextState>,
}

impl PersistentContext {
    /// Load the context from disk, creating the directory when absent.
    /// Missing or empty snapshot files load as zeroed state.
    pub async fn load(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("create context dir {}", dir.display()))?;

        let state = ContextState {
            spot_account: load_snapshot(&dir.join(SPOT_ACCOUNT_FILE)).await?,
            futures_account: load_snapshot(&dir.join(FUTURES_ACCOUNT_FILE)).await?,
            positions: load_snapshot(&dir.join(POSITIONS_FILE)).await?,
            aux: load_snapshot(&dir.join(AUX_FILE)).await?,
        };

        Ok(Self {
            dir,
            state: Mutex::new(state),
        })
    }

    /// Fold a signed fill into a symbol's position, removing flat
    /// positions, then persist the position map.
    pub async fn apply_fill(&self, symbol: &str, amount: Decimal, price: Decimal) {
        let mut state = self.state.lock().await;
        let position = state.positions.entry(symbol.to_string()).or_default();
        position.apply(amount, price);
        if position.is_flat() {
            state.positions.remove(symbol);
        }
        self.persist(POSITIONS_FILE, &state.positions).await;
    }

    pub async fn position(&self, symbol: &str) -> Option<Position> {
        self.state.lock().await.positions.get(symbol).cloned()
    }

    pub async fn has_position(&self, symbol: &str) -> bool {
        self.state.lock().await.positions.contains_key(symbol)
    }

    pub async fn set_balance(&self, kind: AccountKind, asset: &str, value: Decimal) {
        let mut state = self.state.lock().await;
        let (account, file) = match kind {
            AccountKind::Spot => (&mut state.spot_account, SPOT_ACCOUNT_FILE),
            AccountKind::Futures => (&mut state.futures_account, FUTURES_ACCOUNT_FILE),
        };
        if !account.set(asset, value) {
            return;
        }
        let snapshot = account.clone();
        self.persist(file, &snapshot).await;
    }

    pub async fn account(&self, kind: AccountKind) -> Account {
        let state = self.state.lock().await;
        match kind {
            AccountKind::Spot => state.spot_account.clone(),
            AccountKind::Futures => state.futures_account.clone(),
        }
    }

    pub async fn set_openpx(&self, symbol: &str, value: Decimal) {
        let mut state = self.state.lock().await;
        state.aux.openpx.insert(symbol.to_string(), value);
        self.persist(AUX_FILE, &state.aux).await;
    }

    pub async fn openpx(&self, symbol: &str) -> Option<Decimal> {
        self.state.lock().await.aux.openpx.get(symbol).copied()
    }

    pub async fn level_time(&self, symbol: &str) -> u32 {
        self.state
            .lock()
            .await
            .aux
            .level_time
            .get(symbol)
            .copied()
            .unwrap_or(0)
    }

    pub async fn bump_level_time(&self, symbol: &str) {
        let mut state = self.state.lock().await;
        *state.aux.level_time.entry(symbol.to_string()).or_insert(0) += 1;
        self.persist(AUX_FILE, &state.aux).await;
    }

    pub async fn reset_level_time(&self, symbol: &str) {
        let mut state = self.state.lock().await;
        state.aux.level_time.insert(symbol.to_string(), 0);
        self.persist(AUX_FILE, &state.aux).await;
    }

    async fn persist<T: Serialize>(&self, file: &str, value: &T) {
        if let Err(err) = write_snapshot(&self.dir.join(file), value).await {
            warn!(file, error = %err, "context snapshot write failed");
        }
    }
}

async fn load_snapshot<T: DeserializeOwned + Default>(path: &Path) -> Result<T> {
    match fs::read(path).await {
        Ok(bytes) if bytes.is_empty() => Ok(T::default()),
        Ok(bytes) => bincode::deserialize(&bytes)
            .with_context(|| format!("decode snapshot {}", path.display())),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(T::default()),
        Err(err) => Err(err).with_context(|| format!("read snapshot {}", path.display())),
    }
}

async fn write_snapshot<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let bytes = bincode::serialize(value).context("encode snapshot")?;
    // Atomic write: temp file then rename.
    let temp_path = path.with_extension("tmp");
    fs::write(&temp_path, bytes)
        .await
        .with_context(|| format!("write {}", temp_path.display()))?;
    fs::rename(&temp_path, path)
        .await
        .with_context(|| format!("rename into {}", path.display()))?;
    Ok(())
}
