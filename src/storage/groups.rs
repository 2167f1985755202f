use chrono::{DateTime, Local, NaiveTime};
use std::collections::HashSet;

use super::ordering::{materialize, sort_groups};
use super::store::Store;
use super::types::{Group, Item, RecordKind, StorageError, TODAY_GROUP_TITLE};

impl Store {
    // ========================================================================
    // Group Operations
    // ========================================================================

    pub fn group(&self, title: &str) -> Option<&Group> {
        self.groups.iter().find(|g| g.title == title)
    }

    /// Add a new group, or fold the candidate's links into the group that
    /// already has its title.
    ///
    /// The today group is virtual: handing it in is a no-op. A brand new
    /// group without members is not created.
    pub fn add_or_update_group(&mut self, candidate: Group) -> Result<(), StorageError> {
        if candidate.is_today() {
            tracing::debug!("Ignoring write of the virtual today group");
            return Ok(());
        }

        match self.groups.iter().position(|g| g.title == candidate.title) {
            Some(idx) => {
                let added = self.groups[idx].merge_links(candidate.feed_links);
                self.write_record(&self.groups[idx])?;
                tracing::info!(group = %self.groups[idx].title, added = added, "Updated group");
            }
            None => {
                if candidate.feed_links.is_empty() {
                    tracing::debug!(group = %candidate.title, "Not creating a group without feeds");
                    return Ok(());
                }
                self.write_record(&candidate)?;
                tracing::info!(group = %candidate.title, feeds = candidate.feed_links.len(), "Created group");
                self.groups.push(candidate);
            }
        }

        sort_groups(&mut self.groups);
        Ok(())
    }

    /// Delete a group record and its in-memory entry. Member feeds stay.
    pub fn delete_group(&mut self, title: &str) -> Result<(), StorageError> {
        if title == TODAY_GROUP_TITLE {
            return Err(StorageError::ReservedGroup(title.to_owned()));
        }
        self.remove_record(RecordKind::Group, title)?;
        self.groups.retain(|g| g.title != title);
        tracing::info!(group = %title, "Deleted group");
        Ok(())
    }

    /// Items of every member feed in display order.
    ///
    /// The today title yields the virtual today view. An unknown title
    /// yields nothing.
    pub fn group_items(&self, title: &str) -> Vec<Item> {
        if title == TODAY_GROUP_TITLE {
            return self.todays_items(Local::now());
        }
        let Some(group) = self.group(title) else {
            return Vec::new();
        };
        let items = group
            .feed_links
            .iter()
            .filter_map(|link| self.feed(link))
            .flat_map(|f| f.items.iter().cloned())
            .collect();
        materialize(items)
    }

    /// Items from every feed published since local midnight of `now`.
    pub fn todays_items(&self, now: DateTime<Local>) -> Vec<Item> {
        let midnight = now
            .date_naive()
            .and_time(NaiveTime::MIN)
            .and_local_timezone(Local)
            .earliest()
            .unwrap_or(now);
        let items = self
            .feeds
            .iter()
            .flat_map(|f| f.items.iter())
            .filter(|i| i.published.is_some_and(|p| p >= midnight))
            .cloned()
            .collect();
        materialize(items)
    }

    /// Mark groups whose members have all arrived in the current cycle.
    ///
    /// `settled` carries the groups already reported this cycle; only the
    /// newly settled titles are returned. Sets `first_updated` in memory.
    pub(crate) fn settle_groups(
        &mut self,
        arrived: &HashSet<String>,
        settled: &mut HashSet<String>,
    ) -> Vec<String> {
        let mut newly = Vec::new();
        for group in &mut self.groups {
            if settled.contains(&group.title) {
                continue;
            }
            if group.feed_links.iter().all(|l| arrived.contains(l)) {
                group.first_updated = true;
                settled.insert(group.title.clone());
                newly.push(group.title.clone());
            }
        }
        newly
    }
}
