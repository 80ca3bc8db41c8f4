use std::sync::{Arc, Barrier};
use std::thread;

use chrono::Utc;
use pasteguard::{EncryptedBlob, MemoryStore, Paste, PasteStore};
use tempfile::TempDir;

pub const THREADS: usize = 50;

/// Connections opened against the shared SQLite file.
#[cfg(feature = "sqlite")]
const SQLITE_HANDLES: usize = 8;

/// A set of store handles that all see the same data.
pub struct Backend {
    stores: Vec<Arc<dyn PasteStore>>,
    _dir: Option<TempDir>,
}

impl Backend {
    pub fn memory() -> Self {
        Self {
            stores: vec![Arc::new(MemoryStore::new())],
            _dir: None,
        }
    }

    #[cfg(feature = "sqlite")]
    pub fn sqlite() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("shared.db");
        let stores = (0..SQLITE_HANDLES)
            .map(|_| {
                Arc::new(pasteguard::SqliteStore::open(&path).expect("open sqlite"))
                    as Arc<dyn PasteStore>
            })
            .collect();
        Self {
            stores,
            _dir: Some(dir),
        }
    }

    pub fn handle(&self, i: usize) -> Arc<dyn PasteStore> {
        self.stores[i % self.stores.len()].clone()
    }

    pub fn handles(&self) -> usize {
        self.stores.len()
    }
}

/// Run `f(i)` on `n` threads released together, collecting results in
/// thread order.
pub fn race<T, F>(n: usize, f: F) -> Vec<T>
where
    T: Send + 'static,
    F: Fn(usize) -> T + Send + Sync + 'static,
{
    let barrier = Arc::new(Barrier::new(n));
    let f = Arc::new(f);
    let workers: Vec<_> = (0..n)
        .map(|i| {
            let barrier = barrier.clone();
            let f = f.clone();
            thread::spawn(move || {
                barrier.wait();
                f(i)
            })
        })
        .collect();
    workers
        .into_iter()
        .map(|w| w.join().expect("worker panicked"))
        .collect()
}

pub fn burn_paste(id: &str, views: u32) -> Paste {
    Paste {
        id: id.into(),
        encrypted_body: EncryptedBlob {
            ciphertext: vec![1, 2, 3],
            auth_tag: vec![0; 16],
            nonce: vec![0; 12],
        },
        language: "plaintext".into(),
        password_hash: None,
        created_at: Utc::now(),
        expires_at: None,
        remaining_views: Some(views),
    }
}
