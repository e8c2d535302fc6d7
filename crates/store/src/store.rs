//! In-memory campaign store backed by DashMap.
//!
//! Stands in for the shared relational store. Status changes go through
//! [`CampaignStore::modify_campaign`], which holds the row lock for the whole
//! read-check-write so concurrent requests cannot both pass a guard.
//!
//! Lock order is campaign row, then recipient ledger. Nothing takes a
//! ledger lock and then a campaign lock.

use std::collections::{HashMap, HashSet};

use campaign_core::error::{CampaignError, CampaignResult};
use campaign_core::types::{Campaign, CampaignGroup, CampaignStatus, Contact, Workspace};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tracing::info;
use uuid::Uuid;

use crate::ledger::LedgerTable;

/// Thread-safe store for workspaces, contacts, campaigns, groups and the
/// recipient ledger.
pub struct CampaignStore {
    workspaces: DashMap<Uuid, Workspace>,
    /// user_id -> workspace ids
    memberships: DashMap<Uuid, HashSet<Uuid>>,
    /// workspace_id -> contact_id -> contact
    contacts: DashMap<Uuid, HashMap<Uuid, Contact>>,
    campaigns: DashMap<Uuid, Campaign>,
    groups: DashMap<Uuid, CampaignGroup>,
    /// campaign_id -> recipient rows
    ledgers: DashMap<Uuid, LedgerTable>,
}

impl CampaignStore {
    pub fn new() -> Self {
        info!("Campaign store initialized (in-memory)");
        Self {
            workspaces: DashMap::new(),
            memberships: DashMap::new(),
            contacts: DashMap::new(),
            campaigns: DashMap::new(),
            groups: DashMap::new(),
            ledgers: DashMap::new(),
        }
    }

    // ─── Workspaces & memberships ──────────────────────────────────────────

    pub fn upsert_workspace(&self, workspace: Workspace) {
        self.workspaces.insert(workspace.id, workspace);
    }

    pub fn get_workspace(&self, id: &Uuid) -> Option<Workspace> {
        self.workspaces.get(id).map(|w| w.value().clone())
    }

    pub fn add_membership(&self, user_id: Uuid, workspace_id: Uuid) {
        self.memberships
            .entry(user_id)
            .or_default()
            .insert(workspace_id);
    }

    pub fn memberships(&self, user_id: &Uuid) -> HashSet<Uuid> {
        self.memberships
            .get(user_id)
            .map(|m| m.value().clone())
            .unwrap_or_default()
    }

    // ─── Contacts ──────────────────────────────────────────────────────────

    pub fn upsert_contact(&self, contact: Contact) {
        self.contacts
            .entry(contact.workspace_id)
            .or_default()
            .insert(contact.id, contact);
    }

    pub fn get_contact(&self, workspace_id: &Uuid, contact_id: &Uuid) -> Option<Contact> {
        self.contacts
            .get(workspace_id)
            .and_then(|m| m.get(contact_id).cloned())
    }

    /// Visit every contact of a workspace without cloning the table.
    pub fn scan_contacts<F>(&self, workspace_id: &Uuid, mut visit: F)
    where
        F: FnMut(&Contact),
    {
        if let Some(table) = self.contacts.get(workspace_id) {
            table.values().for_each(|c| visit(c));
        }
    }

    /// Look up several contacts of one workspace at once.
    pub fn contacts_by_id(&self, workspace_id: &Uuid, ids: &[Uuid]) -> HashMap<Uuid, Contact> {
        let Some(table) = self.contacts.get(workspace_id) else {
            return HashMap::new();
        };
        ids.iter()
            .filter_map(|id| table.get(id).map(|c| (*id, c.clone())))
            .collect()
    }

    /// Move `last_contacted_at` forward; never backwards.
    pub fn touch_contact(&self, workspace_id: &Uuid, contact_id: &Uuid, at: DateTime<Utc>) {
        if let Some(mut table) = self.contacts.get_mut(workspace_id) {
            if let Some(contact) = table.get_mut(contact_id) {
                if contact.last_contacted_at.map_or(true, |prev| prev < at) {
                    contact.last_contacted_at = Some(at);
                }
            }
        }
    }

    // ─── Campaigns ─────────────────────────────────────────────────────────

    pub fn insert_campaign(&self, campaign: Campaign) {
        self.campaigns.insert(campaign.id, campaign);
    }

    pub fn get_campaign(&self, id: &Uuid) -> Option<Campaign> {
        self.campaigns.get(id).map(|c| c.value().clone())
    }

    pub fn require_campaign(&self, id: &Uuid) -> CampaignResult<Campaign> {
        self.get_campaign(id)
            .ok_or_else(|| CampaignError::not_found("Campaign"))
    }

    /// Campaigns of a workspace, newest first.
    pub fn campaigns_in_workspace(&self, workspace_id: &Uuid) -> Vec<Campaign> {
        let mut campaigns: Vec<Campaign> = self
            .campaigns
            .iter()
            .filter(|c| c.workspace_id == *workspace_id)
            .map(|c| c.value().clone())
            .collect();
        campaigns.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        campaigns
    }

    pub fn campaigns_in_group(&self, group_id: &Uuid) -> Vec<Campaign> {
        let mut campaigns: Vec<Campaign> = self
            .campaigns
            .iter()
            .filter(|c| c.group_id == Some(*group_id))
            .map(|c| c.value().clone())
            .collect();
        campaigns.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        campaigns
    }

    /// Scheduled campaigns whose schedule time is at or before `now`.
    pub fn due_scheduled(&self, now: DateTime<Utc>) -> Vec<Uuid> {
        self.campaigns
            .iter()
            .filter(|c| {
                c.status == CampaignStatus::Scheduled
                    && c.scheduled_at.is_some_and(|t| t <= now)
            })
            .map(|c| c.id)
            .collect()
    }

    /// Run `f` with exclusive access to a campaign row. The row lock is
    /// held for the whole closure, so a guard checked inside `f` cannot be
    /// invalidated by a concurrent request. `f` must check before it
    /// mutates: an `Err` leaves whatever `f` already changed in place.
    ///
    /// `f` may use the ledger accessors but must not touch other campaign
    /// rows.
    pub fn modify_campaign<T, F>(&self, id: &Uuid, f: F) -> CampaignResult<T>
    where
        F: FnOnce(&mut Campaign) -> CampaignResult<T>,
    {
        let mut entry = self
            .campaigns
            .get_mut(id)
            .ok_or_else(|| CampaignError::not_found("Campaign"))?;
        f(entry.value_mut())
    }

    /// Remove a campaign and its ledger if `guard` accepts it.
    pub fn remove_campaign_if<F>(&self, id: &Uuid, guard: F) -> CampaignResult<Campaign>
    where
        F: FnOnce(&Campaign) -> CampaignResult<()>,
    {
        let mut verdict: CampaignResult<()> = Ok(());
        let removed = self.campaigns.remove_if(id, |_, c| {
            verdict = guard(c);
            verdict.is_ok()
        });
        match removed {
            Some((_, campaign)) => {
                self.ledgers.remove(id);
                Ok(campaign)
            }
            None => {
                verdict?;
                Err(CampaignError::not_found("Campaign"))
            }
        }
    }

    // ─── Groups ────────────────────────────────────────────────────────────

    /// Insert a group and its member campaigns together.
    pub fn insert_group(&self, group: CampaignGroup, campaigns: Vec<Campaign>) {
        for campaign in campaigns {
            self.campaigns.insert(campaign.id, campaign);
        }
        self.groups.insert(group.id, group);
    }

    pub fn get_group(&self, id: &Uuid) -> Option<CampaignGroup> {
        self.groups.get(id).map(|g| g.value().clone())
    }

    pub fn list_groups(&self) -> Vec<CampaignGroup> {
        let mut groups: Vec<CampaignGroup> =
            self.groups.iter().map(|g| g.value().clone()).collect();
        groups.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        groups
    }

    pub fn remove_group(&self, id: &Uuid) -> Option<CampaignGroup> {
        self.groups.remove(id).map(|(_, g)| g)
    }

    // ─── Recipient ledger ──────────────────────────────────────────────────

    /// Mutate (creating if needed) the ledger of a campaign.
    pub fn with_ledger<T, F>(&self, campaign_id: &Uuid, f: F) -> T
    where
        F: FnOnce(&mut LedgerTable) -> T,
    {
        let mut entry = self.ledgers.entry(*campaign_id).or_default();
        f(entry.value_mut())
    }

    /// Read the ledger of a campaign; an absent ledger reads as empty.
    pub fn read_ledger<T, F>(&self, campaign_id: &Uuid, f: F) -> T
    where
        F: FnOnce(&LedgerTable) -> T,
    {
        match self.ledgers.get(campaign_id) {
            Some(entry) => f(entry.value()),
            None => f(&LedgerTable::default()),
        }
    }

    /// Contacts with a sent/delivered/replied row at or after `cutoff` in
    /// any campaign of the workspace.
    pub fn recently_messaged(&self, workspace_id: &Uuid, cutoff: DateTime<Utc>) -> HashSet<Uuid> {
        let campaign_ids: Vec<Uuid> = self
            .campaigns
            .iter()
            .filter(|c| c.workspace_id == *workspace_id)
            .map(|c| c.id)
            .collect();

        let mut contacts = HashSet::new();
        for id in campaign_ids {
            if let Some(ledger) = self.ledgers.get(&id) {
                contacts.extend(ledger.recently_messaged(cutoff));
            }
        }
        contacts
    }
}

impl Default for CampaignStore {
    fn default() -> Self {
        Self::new()
    }
}
