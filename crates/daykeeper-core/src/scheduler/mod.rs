//! Per-minute scheduling loop.
//!
//! Each tick enumerates all users and, for each one independently in
//! their own timezone, evaluates the fixed daily triggers, the meal
//! triggers, and the per-event triggers. Every fire is gated by the
//! ledger's atomic check-and-insert, so re-evaluating a minute never
//! duplicates a prompt. A failure scoped to one user is logged and the
//! tick moves on; only losing the store entirely stops the loop.

pub mod triggers;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use chrono_tz::Tz;

use crate::clock::{local_instant, resolve_tz, Clock, SystemClock};
use crate::error::CoreError;
use crate::format::{format_events, format_people, format_streak_line, format_tasks_numbered};
use crate::index::rebuild_index;
use crate::integrations::{CalendarSource, MessageTransport, TaskService};
use crate::ledger::{CheckinKind, DAILY_EVENTS_LIST, DAILY_MORNING, DAILY_RUN, DAILY_WINDDOWN};
use crate::status::{compute_day_status, format_status_line};
use crate::storage::{Config, Database, UserRecord};
use crate::streak::compute_streak;
use triggers::{fire_instant, fixed_triggers, is_due, TestTriggers};

pub struct Scheduler {
    db: Database,
    config: Config,
    transport: Box<dyn MessageTransport>,
    tasks: Box<dyn TaskService>,
    sources: Vec<Box<dyn CalendarSource>>,
    clock: Arc<dyn Clock>,
    call_timeout: StdDuration,
    /// Accelerated-verification state, keyed by user id. Instance-owned
    /// so parallel schedulers in tests never share timers.
    test_triggers: HashMap<i64, TestTriggers>,
}

impl Scheduler {
    pub fn new(
        db: Database,
        config: Config,
        transport: Box<dyn MessageTransport>,
        tasks: Box<dyn TaskService>,
        sources: Vec<Box<dyn CalendarSource>>,
    ) -> Self {
        Self::with_clock(db, config, transport, tasks, sources, Arc::new(SystemClock))
    }

    pub fn with_clock(
        db: Database,
        config: Config,
        transport: Box<dyn MessageTransport>,
        tasks: Box<dyn TaskService>,
        sources: Vec<Box<dyn CalendarSource>>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let call_timeout = StdDuration::from_secs(config.scheduler.call_timeout_secs);
        Self {
            db,
            config,
            transport,
            tasks,
            sources,
            clock,
            call_timeout,
            test_triggers: HashMap::new(),
        }
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    pub fn db_mut(&mut self) -> &mut Database {
        &mut self.db
    }

    /// Run the tick loop until the store becomes unusable.
    ///
    /// Per-user failures are logged inside [`Self::tick`]; an error
    /// returned from here means the user enumeration itself failed,
    /// which only happens when storage is gone.
    pub async fn run(&mut self) -> Result<(), CoreError> {
        let mut interval =
            tokio::time::interval(StdDuration::from_secs(self.config.scheduler.tick_secs));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        log::info!(
            "scheduler started (tick {}s, test_mode {})",
            self.config.scheduler.tick_secs,
            self.config.scheduler.test_mode
        );

        loop {
            interval.tick().await;
            if let Err(e) = self.tick().await {
                log::error!("storage unavailable, stopping scheduler: {e}");
                return Err(e);
            }
        }
    }

    /// One evaluation pass over all users.
    pub async fn tick(&mut self) -> Result<(), CoreError> {
        let users = self.db.list_users().map_err(CoreError::from)?;
        let now = self.clock.now_utc();

        for user in users {
            if let Err(e) = self.tick_user(&user, now).await {
                log::error!("tick failed for user '{}': {e}", user.chat_handle);
            }
        }
        Ok(())
    }

    async fn tick_user(&mut self, user: &UserRecord, now: DateTime<Utc>) -> Result<(), CoreError> {
        // A stored timezone that no longer parses must not silence the
        // user's prompts; fall back to the configured default.
        let tz = match resolve_tz(&user.timezone) {
            Ok(tz) => tz,
            Err(_) => {
                log::warn!(
                    "user '{}' has unknown timezone '{}', falling back to '{}'",
                    user.chat_handle,
                    user.timezone,
                    self.config.default_timezone
                );
                resolve_tz(&self.config.default_timezone)?
            }
        };
        let today = now.with_timezone(&tz).date_naive();

        if self.config.scheduler.test_mode {
            return self.tick_test_mode(user, now).await;
        }

        // A refresh request lands within one tick of being set.
        if user.needs_reindex {
            self.rebuild_for(user, tz, today, now).await?;
            self.db.set_needs_reindex(user.id, false)?;
        }

        self.fire_fixed(user, tz, today, now).await?;
        self.fire_meals(user, tz, today, now).await?;
        self.fire_events(user, tz, today, now).await?;
        Ok(())
    }

    async fn tick_test_mode(
        &mut self,
        user: &UserRecord,
        now: DateTime<Utc>,
    ) -> Result<(), CoreError> {
        let state = self
            .test_triggers
            .entry(user.id)
            .or_insert_with(|| TestTriggers::new(now));
        for label in state.take_due(now) {
            let text = format!("TEST {label} trigger");
            Self::deliver(
                self.transport.as_ref(),
                self.call_timeout,
                &user.chat_handle,
                &text,
            )
            .await;
        }
        Ok(())
    }

    async fn rebuild_for(
        &mut self,
        user: &UserRecord,
        tz: Tz,
        day: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<(), CoreError> {
        let outcome = rebuild_index(
            &mut self.db,
            &self.sources,
            user,
            tz,
            day,
            self.config.calendar.include_all_day,
            self.call_timeout,
            now,
        )
        .await?;
        for w in &outcome.warnings {
            log::warn!(
                "calendar source '{}' failed for user '{}': {}",
                w.source,
                user.chat_handle,
                w.message
            );
        }
        Ok(())
    }

    async fn fire_fixed(
        &mut self,
        user: &UserRecord,
        tz: Tz,
        today: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<(), CoreError> {
        for (label, at) in fixed_triggers() {
            if !is_due(now, fire_instant(tz, today, at)) {
                continue;
            }
            if !self.db.try_fire(user.id, today, CheckinKind::Daily, label, now)? {
                continue;
            }

            // The events list rebuilds before it reads, so the index
            // reflects the feeds as of this morning.
            if label == DAILY_EVENTS_LIST {
                self.rebuild_for(user, tz, today, now).await?;
            }

            let text = match label {
                DAILY_MORNING => self.morning_text(user, today, now).await?,
                DAILY_EVENTS_LIST => {
                    let events = self.db.events_for_day(user.id, today)?;
                    format!("Today's events:\n{}", format_events(&events, tz))
                }
                DAILY_RUN => "Running time! Shoes on. Reply when you're back.".to_string(),
                DAILY_WINDDOWN => {
                    let lines = self.status_lines(user, today)?;
                    format!("Wind-down: 2 min brain dump + pick tomorrow's TODOs.\n{lines}")
                }
                _ => unreachable!(),
            };
            Self::deliver(
                self.transport.as_ref(),
                self.call_timeout,
                &user.chat_handle,
                &text,
            )
            .await;
        }
        Ok(())
    }

    async fn morning_text(
        &self,
        user: &UserRecord,
        today: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<String, CoreError> {
        let tz = resolve_tz(&user.timezone)?;

        let todos = match tokio::time::timeout(self.call_timeout, self.tasks.list_active_tasks())
            .await
        {
            Ok(Ok(tasks)) => format_tasks_numbered(&tasks, tz, now),
            Ok(Err(e)) => {
                log::warn!("task service failed for user '{}': {e}", user.chat_handle);
                format!("(task service error: {e})")
            }
            Err(_) => {
                log::warn!("task service timed out for user '{}'", user.chat_handle);
                "(task service timed out)".to_string()
            }
        };

        let people = self.db.list_people(user.id)?;
        let people_msg = format_people(&people, today);
        let lines = self.status_lines(user, today)?;

        Ok(format!(
            "Morning! Please set up today's calendar.\n\nTodos:\n{todos}\n\nPeople:\n{people_msg}\n\n{lines}"
        ))
    }

    fn status_lines(&self, user: &UserRecord, today: NaiveDate) -> Result<String, CoreError> {
        let allowed = self.config.scheduler.allowed_misses_per_day;
        let status = compute_day_status(&self.db, user.id, today, allowed)?;
        let streak = compute_streak(&self.db, user.id, today, allowed)?;
        Ok(format!(
            "{}\n{}",
            format_status_line(&status),
            format_streak_line(&streak)
        ))
    }

    async fn fire_meals(
        &mut self,
        user: &UserRecord,
        tz: Tz,
        today: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<(), CoreError> {
        for (label, at) in self.config.meal_times() {
            if !is_due(now, local_instant(tz, today, at)) {
                continue;
            }
            if !self.db.try_fire(user.id, today, CheckinKind::Meal, &label, now)? {
                continue;
            }
            let text = format!(
                "{} check-in. What did you have? Send a pic if you want.",
                capitalize(&label)
            );
            Self::deliver(
                self.transport.as_ref(),
                self.call_timeout,
                &user.chat_handle,
                &text,
            )
            .await;
        }
        Ok(())
    }

    /// Per-event prompts at start + offset, in the event's own index-day
    /// bucket. Yesterday's partition is scanned too: an event starting
    /// 23:58 local fires at 00:03 the next local day and must still
    /// dedupe against its original day.
    async fn fire_events(
        &mut self,
        user: &UserRecord,
        _tz: Tz,
        today: NaiveDate,
        now: DateTime<Utc>,
    ) -> Result<(), CoreError> {
        let offset = Duration::minutes(self.config.scheduler.event_offset_min);
        let yesterday = today - Duration::days(1);

        for day in [yesterday, today] {
            for entry in self.db.events_for_day(user.id, day)? {
                let fire_at = entry.start_utc + offset;
                if !is_due(now, fire_at) {
                    continue;
                }
                if !self.db.try_fire(
                    user.id,
                    entry.day,
                    CheckinKind::Event,
                    &entry.occurrence_id,
                    now,
                )? {
                    continue;
                }
                let text = format!(
                    "Check-in: {}) {}\nHow's it going? Send a pic.",
                    entry.ordinal, entry.title
                );
                Self::deliver(
                    self.transport.as_ref(),
                    self.call_timeout,
                    &user.chat_handle,
                    &text,
                )
                .await;
            }
        }
        Ok(())
    }

    /// Bounded delivery. A failed or timed-out send is logged and the
    /// fired ledger record stands; prompts are never retried.
    async fn deliver(
        transport: &dyn MessageTransport,
        timeout: StdDuration,
        chat_handle: &str,
        text: &str,
    ) {
        match tokio::time::timeout(timeout, transport.send(chat_handle, text)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => log::warn!("delivery to '{chat_handle}' failed: {e}"),
            Err(_) => log::warn!("delivery to '{chat_handle}' timed out"),
        }
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}
