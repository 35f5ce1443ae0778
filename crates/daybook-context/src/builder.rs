//! Composes diary entries from user input and resolved context.

use chrono::{Local, NaiveDateTime, SubsecRound};
use daybook_core::{CategoryTable, DiaryEntry, EntryDraft, SourceError, UsageSource};
use thiserror::Error;

use crate::{ContextClient, ContextError};

/// Entry creation errors. Any of them means no entry was produced.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error(transparent)]
    Context(#[from] ContextError),
}

/// Builds entries from a usage source, a category table and the context services.
#[derive(Debug, Clone, Copy)]
pub struct EntryBuilder<'a> {
    client: &'a ContextClient,
    categories: &'a CategoryTable,
}

impl<'a> EntryBuilder<'a> {
    pub const fn new(client: &'a ContextClient, categories: &'a CategoryTable) -> Self {
        Self { client, categories }
    }

    /// Builds an entry stamped with the current local time.
    pub async fn build_entry<S>(&self, source: &S, draft: EntryDraft) -> Result<DiaryEntry, BuildError>
    where
        S: UsageSource + ?Sized,
    {
        self.build_entry_at(source, draft, Local::now().naive_local())
            .await
    }

    /// Builds an entry as if created at `now` (local time).
    ///
    /// Usage is read first, then location, then weather. The first failure
    /// is returned and everything gathered so far is dropped.
    pub async fn build_entry_at<S>(
        &self,
        source: &S,
        draft: EntryDraft,
        now: NaiveDateTime,
    ) -> Result<DiaryEntry, BuildError>
    where
        S: UsageSource + ?Sized,
    {
        let created_time = now.trunc_subsecs(6);

        let events = source.fetch_events()?;
        let totals = self.categories.categorize(&events, created_time.date());
        let location = self.client.resolve_location().await?;
        let weather = self.client.resolve_weather(location.coordinates).await?;

        tracing::info!(
            date = %created_time.date(),
            place = %location.name,
            screen_time = totals.screen_time_total,
            "built entry"
        );
        Ok(DiaryEntry::assemble(draft, location, weather, totals, created_time))
    }
}
