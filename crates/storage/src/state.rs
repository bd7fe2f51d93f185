//! Journaled account/storage/code state over the authenticated trie.

use bytes::Bytes;

use tessera_codec::{WireDecode, WireEncode};
use tessera_common::{AccountState, Address, H256};
use tessera_crypto::hash::{hash_bytes, Hash256, ZERO_HASH};

use crate::error::StoreError;
use crate::keys::{code_key, storage_slot_key};
use crate::store::Store;
use crate::trie::{Trie, TrieProof};

/// Rollback token: trie root at capture time plus the journal watermark.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateSnapshot {
    pub root: Hash256,
    pub journal_len: usize,
}

/// One undo record. Entries are replayed in reverse on revert.
#[derive(Debug, Clone)]
enum JournalEntry {
    Account {
        address: Address,
        prev: Option<AccountState>,
    },
    StorageSlot {
        address: Address,
        slot: H256,
        prev: Option<H256>,
    },
}

/// Accounts live in the trie keyed by payment credential; contract storage
/// and code blobs live in raw side tables (`STOR`, `CODE`). Code blobs are
/// content-addressed, so identical bytecode is stored once.
pub struct StateManager {
    store: Store,
    trie: Trie,
    journal: Vec<JournalEntry>,
}

impl StateManager {
    pub fn new(store: Store) -> Result<Self, StoreError> {
        let trie = Trie::new(store.clone())?;
        Ok(Self {
            store,
            trie,
            journal: Vec::new(),
        })
    }

    pub fn get_account(&self, address: &Address) -> Result<AccountState, StoreError> {
        match self.trie.get(&address.credential)? {
            Some(raw) => Ok(AccountState::decode(&raw)?),
            None => Ok(AccountState::default()),
        }
    }

    fn load_account(&self, address: &Address) -> Result<Option<AccountState>, StoreError> {
        match self.trie.get(&address.credential)? {
            Some(raw) => Ok(Some(AccountState::decode(&raw)?)),
            None => Ok(None),
        }
    }

    pub fn set_account(
        &mut self,
        address: &Address,
        state: AccountState,
    ) -> Result<(), StoreError> {
        let prev = self.load_account(address)?;
        self.journal.push(JournalEntry::Account {
            address: *address,
            prev,
        });
        self.trie.put(&address.credential, state.encode_to_vec());
        Ok(())
    }

    pub fn get_balance(&self, address: &Address) -> Result<u64, StoreError> {
        Ok(self.get_account(address)?.balance)
    }

    pub fn add_balance(&mut self, address: &Address, amount: u64) -> Result<(), StoreError> {
        let mut account = self.get_account(address)?;
        account.balance = account
            .balance
            .checked_add(amount)
            .ok_or(StoreError::BalanceOverflow)?;
        self.set_account(address, account)
    }

    pub fn sub_balance(&mut self, address: &Address, amount: u64) -> Result<(), StoreError> {
        let mut account = self.get_account(address)?;
        account.balance = account
            .balance
            .checked_sub(amount)
            .ok_or(StoreError::InsufficientBalance)?;
        self.set_account(address, account)
    }

    pub fn get_nonce(&self, address: &Address) -> Result<u64, StoreError> {
        Ok(self.get_account(address)?.nonce)
    }

    pub fn increment_nonce(&mut self, address: &Address) -> Result<(), StoreError> {
        let mut account = self.get_account(address)?;
        account.nonce = account.nonce.saturating_add(1);
        self.set_account(address, account)
    }

    /// Contract storage slot; zero when unset.
    pub fn get_storage(&self, address: &Address, slot: &H256) -> Result<H256, StoreError> {
        match self.store.get(&storage_slot_key(address, slot))? {
            Some(raw) if raw.len() == 32 => Ok(H256::from_slice(&raw)),
            _ => Ok(H256::zero()),
        }
    }

    pub fn set_storage(
        &mut self,
        address: &Address,
        slot: &H256,
        value: H256,
    ) -> Result<(), StoreError> {
        let key = storage_slot_key(address, slot);
        let prev = self
            .store
            .get(&key)?
            .filter(|raw| raw.len() == 32)
            .map(|raw| H256::from_slice(&raw));
        self.journal.push(JournalEntry::StorageSlot {
            address: *address,
            slot: *slot,
            prev,
        });
        self.store.put(key, value.as_bytes().to_vec())
    }

    pub fn get_code(&self, address: &Address) -> Result<Bytes, StoreError> {
        let account = self.get_account(address)?;
        if !account.is_contract() {
            return Ok(Bytes::new());
        }
        self.get_code_by_hash(&account.code_hash)
    }

    pub fn get_code_by_hash(&self, code_hash: &Hash256) -> Result<Bytes, StoreError> {
        if *code_hash == ZERO_HASH {
            return Ok(Bytes::new());
        }
        Ok(self
            .store
            .get(&code_key(code_hash))?
            .map(Bytes::from)
            .unwrap_or_default())
    }

    /// Stores `code` by content hash and points the account at it.
    pub fn set_code(&mut self, address: &Address, code: &[u8]) -> Result<Hash256, StoreError> {
        let code_hash = if code.is_empty() {
            ZERO_HASH
        } else {
            let code_hash = hash_bytes(code);
            self.store.put(code_key(&code_hash), code.to_vec())?;
            code_hash
        };
        let mut account = self.get_account(address)?;
        account.code_hash = code_hash;
        self.set_account(address, account)?;
        Ok(code_hash)
    }

    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            root: self.trie.root(),
            journal_len: self.journal.len(),
        }
    }

    /// Pops journal entries, restoring each prior record, until the journal
    /// is back at the snapshot watermark.
    pub fn revert(&mut self, snapshot: &StateSnapshot) -> Result<(), StoreError> {
        while self.journal.len() > snapshot.journal_len {
            let Some(entry) = self.journal.pop() else {
                break;
            };
            match entry {
                JournalEntry::Account { address, prev } => match prev {
                    Some(state) => self.trie.put(&address.credential, state.encode_to_vec()),
                    None => self.trie.delete(&address.credential),
                },
                JournalEntry::StorageSlot {
                    address,
                    slot,
                    prev,
                } => {
                    let key = storage_slot_key(&address, &slot);
                    match prev {
                        Some(value) => self.store.put(key, value.as_bytes().to_vec())?,
                        None => self.store.delete(&key)?,
                    }
                }
            }
        }
        Ok(())
    }

    pub fn state_root(&self) -> Hash256 {
        self.trie.root()
    }

    /// Root the state would have after commit, without flushing.
    pub fn pending_root(&self) -> Result<Hash256, StoreError> {
        self.trie.pending_root()
    }

    /// Flushes buffered writes, discards the journal, and returns the root.
    pub fn commit(&mut self) -> Result<Hash256, StoreError> {
        let root = self.trie.commit()?;
        self.journal.clear();
        Ok(root)
    }

    pub fn get_account_proof(&self, address: &Address) -> Result<Option<TrieProof>, StoreError> {
        self.trie.get_proof(&address.credential)
    }
}

impl std::fmt::Debug for StateManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateManager")
            .field("root", &self.trie.root())
            .field("journal", &self.journal.len())
            .finish()
    }
}
