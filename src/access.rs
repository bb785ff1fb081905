//! Gallery Vault - Access Controller
//!
//! Owns the per-process session: whether the hidden zone is unlocked and
//! which locked items had their password verified since startup. Persistent
//! flags and password hashes are read from the catalog on every check.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::catalog::{Catalog, StoredItem};
use crate::crypto::{hash_password, verify_password};
use crate::error::{VaultError, VaultResult};

/// Settings key of the master password hash
pub const MASTER_HASH_KEY: &str = "master_hash";

/// Settings key of the hidden-zone password hash
pub const HIDDEN_HASH_KEY: &str = "hidden_hash";

#[derive(Debug, Default)]
struct Session {
    hidden_zone_active: bool,
    /// Lowercased item identifiers
    unlocked: HashSet<String>,
}

/// Access controller
pub struct AccessController {
    catalog: Arc<Catalog>,
    session: Mutex<Session>,
    deny_uncataloged: bool,
}

impl AccessController {
    /// Start with the hidden zone locked and no item unlocked
    pub fn new(catalog: Arc<Catalog>, deny_uncataloged: bool) -> Self {
        Self {
            catalog,
            session: Mutex::new(Session::default()),
            deny_uncataloged,
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // GLOBAL PASSWORDS
    // ═══════════════════════════════════════════════════════════════════════

    pub fn has_master_password(&self) -> VaultResult<bool> {
        self.has_setting(MASTER_HASH_KEY)
    }

    pub fn set_master_password(&self, password: &str) -> VaultResult<()> {
        let hash = hash_password(password)?;
        self.catalog.set_setting(MASTER_HASH_KEY, &hash)
    }

    /// Check the master password; false when none was ever set
    pub fn verify_master_password(&self, password: &str) -> VaultResult<bool> {
        Ok(self
            .catalog
            .get_setting(MASTER_HASH_KEY)?
            .map(|stored| verify_password(password, &stored))
            .unwrap_or(false))
    }

    pub fn has_hidden_zone_password(&self) -> VaultResult<bool> {
        self.has_setting(HIDDEN_HASH_KEY)
    }

    pub fn set_hidden_zone_password(&self, password: &str) -> VaultResult<()> {
        let hash = hash_password(password)?;
        self.catalog.set_setting(HIDDEN_HASH_KEY, &hash)
    }

    fn has_setting(&self, key: &str) -> VaultResult<bool> {
        Ok(self
            .catalog
            .get_setting(key)?
            .map(|v| !v.is_empty())
            .unwrap_or(false))
    }

    // ═══════════════════════════════════════════════════════════════════════
    // HIDDEN ZONE
    // ═══════════════════════════════════════════════════════════════════════

    /// Unlock the hidden zone.
    ///
    /// With no zone password stored yet, `password` becomes the zone password
    /// and the zone unlocks.
    pub fn unlock_hidden_zone(&self, password: &str) -> VaultResult<bool> {
        // Held across read and adopt so two first unlocks cannot both win
        let mut session = self.session.lock();

        let stored = self
            .catalog
            .get_setting(HIDDEN_HASH_KEY)?
            .filter(|v| !v.is_empty());

        let granted = match stored {
            None => {
                self.set_hidden_zone_password(password)?;
                log::info!("🔑 Hidden zone password initialised");
                true
            }
            Some(stored) => verify_password(password, &stored),
        };

        if granted {
            session.hidden_zone_active = true;
            log::info!("🔓 Hidden zone unlocked");
        } else {
            log::warn!("⛔ Hidden zone unlock rejected");
        }
        Ok(granted)
    }

    /// Lock the hidden zone; always succeeds
    pub fn lock_hidden_zone(&self) {
        self.session.lock().hidden_zone_active = false;
        log::info!("🔒 Hidden zone locked");
    }

    pub fn hidden_zone_active(&self) -> bool {
        self.session.lock().hidden_zone_active
    }

    // ═══════════════════════════════════════════════════════════════════════
    // PER-ITEM LOCKS
    // ═══════════════════════════════════════════════════════════════════════

    /// Lock an item with a new password and forget any session unlock
    pub fn lock_item(&self, item_id: &str, password: &str) -> VaultResult<()> {
        let item = self.require(item_id)?;
        let hash = hash_password(password)?;

        self.catalog.set_lock(item.id, Some(&hash))?;
        self.forget(&item.path);
        Ok(())
    }

    /// Remove the password from an item entirely
    pub fn remove_item_lock(&self, item_id: &str) -> VaultResult<()> {
        let item = self.require(item_id)?;
        self.catalog.set_lock(item.id, None)?;
        self.forget(&item.path);
        Ok(())
    }

    /// Verify an item password and unlock it for this session.
    ///
    /// An item marked locked without a stored hash predates per-item
    /// passwords and accepts any password.
    pub fn verify_item(&self, item_id: &str, password: &str) -> VaultResult<bool> {
        let item = match self.catalog.find_by_path(item_id)? {
            Some(item) => item,
            None => return Ok(false),
        };

        let granted = match item.password_hash.as_deref() {
            Some(stored) => verify_password(password, stored),
            None => true,
        };

        if granted {
            self.session.lock().unlocked.insert(session_key(&item.path));
        } else {
            log::warn!("⛔ Wrong password for {}", item.path);
        }
        Ok(granted)
    }

    /// Forget a session unlock; the stored password is unchanged
    pub fn relock_item(&self, item_id: &str) {
        self.forget(item_id);
    }

    fn forget(&self, item_id: &str) {
        self.session.lock().unlocked.remove(&session_key(item_id));
    }

    fn require(&self, item_id: &str) -> VaultResult<StoredItem> {
        self.catalog
            .find_by_path(item_id)?
            .ok_or_else(|| VaultError::ItemNotFound(item_id.to_string()))
    }

    // ═══════════════════════════════════════════════════════════════════════
    // DECISIONS
    // ═══════════════════════════════════════════════════════════════════════

    /// Whether a request for `item_id` may read bytes right now
    pub fn check_access(&self, item_id: &str) -> VaultResult<()> {
        match self.catalog.find_by_path(item_id)? {
            Some(item) if self.can_read(&item) => Ok(()),
            Some(_) => {
                log::warn!("⛔ Access denied: {}", item_id);
                Err(VaultError::AccessDenied(item_id.to_string()))
            }
            None if self.deny_uncataloged => {
                log::warn!("⛔ Access denied to uncataloged path: {}", item_id);
                Err(VaultError::AccessDenied(item_id.to_string()))
            }
            None => Ok(()),
        }
    }

    /// Visible and, if locked, unlocked this session
    pub fn can_read(&self, item: &StoredItem) -> bool {
        let session = self.session.lock();

        if item.hidden && !session.hidden_zone_active {
            return false;
        }
        if item.locked && !session.unlocked.contains(&session_key(&item.path)) {
            return false;
        }
        true
    }

    /// Hidden-zone rule only; locked items stay listed
    pub fn is_visible(&self, item: &StoredItem) -> bool {
        !item.hidden || self.hidden_zone_active()
    }
}

fn session_key(item_id: &str) -> String {
    item_id.to_lowercase()
}
