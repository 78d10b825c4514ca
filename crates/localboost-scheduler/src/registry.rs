//! Schedule registry — the single owner of all schedule templates.
//! CRUD goes through here so every mutation lands on disk and the job
//! scheduler hears about it in the same call.

use std::collections::HashMap;

use localboost_core::error::{LocalBoostError, Result};
use localboost_core::types::{ScheduleTemplate, ScheduleUpdate};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::engine::SchedulerHandle;
use crate::store::TemplateStore;

/// In-memory template map with file persistence and scheduler notification.
pub struct ScheduleRegistry {
    /// Template map. Every arm/cancel/fire message is sent while this lock
    /// is held, so the scheduler mailbox hears mutations in map order — a
    /// delete racing an update can never leave a ghost job armed.
    templates: Mutex<HashMap<Uuid, ScheduleTemplate>>,
    store: TemplateStore,
    scheduler: SchedulerHandle,
}

impl ScheduleRegistry {
    pub fn new(store: TemplateStore, scheduler: SchedulerHandle) -> Self {
        Self {
            templates: Mutex::new(HashMap::new()),
            store,
            scheduler,
        }
    }

    /// Load persisted templates and arm the active ones. Called once at
    /// startup; returns how many templates came back.
    pub async fn load(&self) -> usize {
        let loaded = self.store.load();
        let count = loaded.len();
        let mut map = self.templates.lock().await;
        for template in loaded {
            map.insert(template.id, template);
        }
        let active: Vec<ScheduleTemplate> = map.values().filter(|t| t.active).cloned().collect();
        tracing::info!("📅 Loaded {} schedules ({} active)", count, active.len());
        for template in active {
            self.notify_arm(template).await;
        }
        count
    }

    /// Validate and store a new template; an active one is armed before
    /// this returns.
    pub async fn create(&self, template: ScheduleTemplate) -> Result<ScheduleTemplate> {
        validate(&template)?;
        let mut map = self.templates.lock().await;
        map.insert(template.id, template.clone());
        self.persist(&map);
        if template.active {
            self.notify_arm(template.clone()).await;
        }
        drop(map);
        tracing::info!("📅 Schedule created: '{}' ({})", template.name, template.id);
        Ok(template)
    }

    pub async fn get(&self, id: Uuid) -> Option<ScheduleTemplate> {
        self.templates.lock().await.get(&id).cloned()
    }

    /// All templates, oldest first.
    pub async fn list(&self) -> Vec<ScheduleTemplate> {
        let map = self.templates.lock().await;
        let mut all: Vec<ScheduleTemplate> = map.values().cloned().collect();
        all.sort_by_key(|t| t.created_at);
        all
    }

    pub async fn count(&self) -> usize {
        self.templates.lock().await.len()
    }

    /// Apply a partial update. The patched result is validated before it
    /// replaces the stored template — a bad patch changes nothing.
    pub async fn update(&self, id: Uuid, patch: ScheduleUpdate) -> Result<ScheduleTemplate> {
        let mut map = self.templates.lock().await;
        let current = map
            .get(&id)
            .ok_or_else(|| LocalBoostError::NotFound(format!("schedule {id}")))?;
        let updated = patch.apply(current);
        validate(&updated)?;
        map.insert(id, updated.clone());
        self.persist(&map);
        if updated.active {
            // Re-arm so a changed frequency or time takes effect now.
            self.notify_arm(updated.clone()).await;
        }
        drop(map);
        tracing::info!("📅 Schedule updated: '{}' ({})", updated.name, id);
        Ok(updated)
    }

    /// Remove a template. Idempotent — deleting an unknown id is `false`,
    /// not an error. The scheduler hears the cancel before the map changes.
    pub async fn delete(&self, id: Uuid) -> Result<bool> {
        let mut map = self.templates.lock().await;
        if let Err(e) = self.scheduler.cancel(id).await {
            tracing::warn!("⚠️ Could not cancel schedule {id}: {e}");
        }
        let removed = map.remove(&id).is_some();
        if removed {
            self.persist(&map);
        }
        drop(map);
        if removed {
            tracing::info!("📅 Schedule deleted: {}", id);
        }
        Ok(removed)
    }

    /// Pause or resume a schedule. Setting the current value is a no-op;
    /// a real flip persists and arms/cancels accordingly.
    pub async fn set_active(&self, id: Uuid, active: bool) -> Result<ScheduleTemplate> {
        let mut map = self.templates.lock().await;
        let current = map
            .get_mut(&id)
            .ok_or_else(|| LocalBoostError::NotFound(format!("schedule {id}")))?;
        if current.active == active {
            return Ok(current.clone());
        }
        current.active = active;
        let template = current.clone();
        self.persist(&map);
        if active {
            tracing::info!("▶️ Schedule resumed: '{}'", template.name);
            self.notify_arm(template.clone()).await;
        } else {
            tracing::info!("⏸️ Schedule paused: '{}'", template.name);
            if let Err(e) = self.scheduler.cancel(id).await {
                tracing::warn!("⚠️ Could not cancel schedule {id}: {e}");
            }
        }
        Ok(template)
    }

    /// Run a schedule immediately, outside its cadence.
    pub async fn fire(&self, id: Uuid) -> Result<()> {
        let map = self.templates.lock().await;
        let template = map
            .get(&id)
            .cloned()
            .ok_or_else(|| LocalBoostError::NotFound(format!("schedule {id}")))?;
        self.scheduler.fire_now(template).await
    }

    async fn notify_arm(&self, template: ScheduleTemplate) {
        if let Err(e) = self.scheduler.arm(template).await {
            tracing::warn!("⚠️ Could not arm schedule: {e}");
        }
    }

    /// Write-through to disk. A failed write keeps the in-memory state
    /// authoritative and logs; the next mutation retries.
    fn persist(&self, map: &HashMap<Uuid, ScheduleTemplate>) {
        let mut all: Vec<ScheduleTemplate> = map.values().cloned().collect();
        all.sort_by_key(|t| t.created_at);
        if let Err(e) = self.store.save(&all) {
            tracing::warn!("⚠️ Failed to save schedules: {e}");
        }
    }
}

fn validate(template: &ScheduleTemplate) -> Result<()> {
    if template.name.trim().is_empty() {
        return Err(LocalBoostError::InvalidTemplate(
            "name must not be empty".into(),
        ));
    }
    if template.content_template.trim().is_empty() {
        return Err(LocalBoostError::InvalidTemplate(
            "content_template must not be empty".into(),
        ));
    }
    template.validate()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{JobState, spawn_job_scheduler};
    use localboost_core::types::{Frequency, Platform, PostCategory};

    fn registry() -> ScheduleRegistry {
        let dir = std::env::temp_dir().join(format!("lb-registry-{}", Uuid::new_v4()));
        let handle = spawn_job_scheduler("UTC".parse().unwrap(), |_tpl, _at| async {});
        ScheduleRegistry::new(TemplateStore::new(&dir), handle)
    }

    fn weekly_special() -> ScheduleTemplate {
        ScheduleTemplate::new(
            "weekly special",
            "friday discount on drain cleaning",
            Frequency::Weekly { day_of_week: 5 },
            "10:30",
            vec![Platform::Facebook, Platform::Instagram],
            PostCategory::Promotional,
        )
    }

    #[tokio::test]
    async fn create_arms_an_active_schedule() {
        let reg = registry();
        let created = reg.create(weekly_special()).await.unwrap();
        assert!(matches!(
            reg.scheduler.query(created.id).await.unwrap(),
            JobState::Armed { .. }
        ));
        assert_eq!(reg.count().await, 1);
    }

    #[tokio::test]
    async fn create_rejects_bad_templates() {
        let reg = registry();

        let mut no_platforms = weekly_special();
        no_platforms.platforms.clear();
        assert!(matches!(
            reg.create(no_platforms).await,
            Err(LocalBoostError::InvalidTemplate(_))
        ));

        let mut bad_time = weekly_special();
        bad_time.time_of_day = "25:00".into();
        assert!(matches!(
            reg.create(bad_time).await,
            Err(LocalBoostError::InvalidTemplate(_))
        ));

        let mut blank_name = weekly_special();
        blank_name.name = "   ".into();
        assert!(matches!(
            reg.create(blank_name).await,
            Err(LocalBoostError::InvalidTemplate(_))
        ));

        assert_eq!(reg.count().await, 0);
    }

    #[tokio::test]
    async fn update_unknown_id_is_not_found() {
        let reg = registry();
        let err = reg
            .update(Uuid::new_v4(), ScheduleUpdate::default())
            .await
            .unwrap_err();
        assert!(matches!(err, LocalBoostError::NotFound(_)));
    }

    #[tokio::test]
    async fn bad_patch_leaves_the_stored_template_untouched() {
        let reg = registry();
        let created = reg.create(weekly_special()).await.unwrap();

        let patch = ScheduleUpdate {
            time_of_day: Some("99:99".into()),
            ..Default::default()
        };
        assert!(matches!(
            reg.update(created.id, patch).await,
            Err(LocalBoostError::InvalidTemplate(_))
        ));

        let stored = reg.get(created.id).await.unwrap();
        assert_eq!(stored.time_of_day, "10:30");
    }

    #[tokio::test]
    async fn update_reschedules_the_job() {
        let reg = registry();
        let created = reg.create(weekly_special()).await.unwrap();

        let patch = ScheduleUpdate {
            frequency: Some(Frequency::Daily),
            time_of_day: Some("07:15".into()),
            ..Default::default()
        };
        let updated = reg.update(created.id, patch).await.unwrap();
        assert_eq!(updated.time_of_day, "07:15");
        assert!(matches!(
            reg.scheduler.query(created.id).await.unwrap(),
            JobState::Armed { .. }
        ));
    }

    #[tokio::test]
    async fn delete_is_idempotent_and_disarms() {
        let reg = registry();
        let created = reg.create(weekly_special()).await.unwrap();

        assert!(reg.delete(created.id).await.unwrap());
        assert_eq!(
            reg.scheduler.query(created.id).await.unwrap(),
            JobState::Idle
        );
        assert!(!reg.delete(created.id).await.unwrap());
        assert!(reg.get(created.id).await.is_none());
    }

    #[tokio::test]
    async fn pause_and_resume_toggle_the_job() {
        let reg = registry();
        let created = reg.create(weekly_special()).await.unwrap();

        let paused = reg.set_active(created.id, false).await.unwrap();
        assert!(!paused.active);
        assert_eq!(
            reg.scheduler.query(created.id).await.unwrap(),
            JobState::Idle
        );

        // Same value again: no-op, still fine.
        reg.set_active(created.id, false).await.unwrap();

        let resumed = reg.set_active(created.id, true).await.unwrap();
        assert!(resumed.active);
        assert!(matches!(
            reg.scheduler.query(created.id).await.unwrap(),
            JobState::Armed { .. }
        ));
    }

    #[tokio::test]
    async fn fire_unknown_id_is_not_found() {
        let reg = registry();
        assert!(matches!(
            reg.fire(Uuid::new_v4()).await,
            Err(LocalBoostError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn list_returns_templates_oldest_first() {
        let reg = registry();
        let first = reg.create(weekly_special()).await.unwrap();

        let mut second = weekly_special();
        second.name = "newer schedule".into();
        second.created_at = first.created_at + chrono::Duration::seconds(10);
        reg.create(second).await.unwrap();

        let listed = reg.list().await;
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].id, first.id);
        assert_eq!(listed[1].name, "newer schedule");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_update_and_delete_leave_no_ghost_job() {
        let reg = std::sync::Arc::new(registry());
        for _ in 0..200 {
            let id = reg.create(weekly_special()).await.unwrap().id;

            let updater = {
                let reg = reg.clone();
                tokio::spawn(async move {
                    let patch = ScheduleUpdate {
                        time_of_day: Some("06:45".into()),
                        ..Default::default()
                    };
                    // NotFound here just means the delete won the race.
                    let _ = reg.update(id, patch).await;
                })
            };
            let deleter = {
                let reg = reg.clone();
                tokio::spawn(async move {
                    reg.delete(id).await.unwrap();
                })
            };
            updater.await.unwrap();
            deleter.await.unwrap();

            // Whatever the interleaving, a deleted schedule must be gone
            // from the driver too — an armed leftover would keep firing.
            assert!(reg.get(id).await.is_none());
            assert_eq!(reg.scheduler.query(id).await.unwrap(), JobState::Idle);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_toggles_agree_with_the_driver() {
        let reg = std::sync::Arc::new(registry());
        for _ in 0..200 {
            let id = reg.create(weekly_special()).await.unwrap().id;

            let pause = {
                let reg = reg.clone();
                tokio::spawn(async move { reg.set_active(id, false).await.unwrap() })
            };
            let resume = {
                let reg = reg.clone();
                tokio::spawn(async move { reg.set_active(id, true).await.unwrap() })
            };
            pause.await.unwrap();
            resume.await.unwrap();

            let stored = reg.get(id).await.unwrap();
            let state = reg.scheduler.query(id).await.unwrap();
            if stored.active {
                assert!(matches!(state, JobState::Armed { .. }));
            } else {
                assert_eq!(state, JobState::Idle);
            }
            reg.delete(id).await.unwrap();
        }
    }

    #[tokio::test]
    async fn load_arms_only_active_templates() {
        let dir = std::env::temp_dir().join(format!("lb-registry-load-{}", Uuid::new_v4()));
        let store = TemplateStore::new(&dir);

        let active = weekly_special();
        let mut paused = weekly_special();
        paused.name = "paused one".into();
        paused.active = false;
        store.save(&[active.clone(), paused.clone()]).unwrap();

        let handle = spawn_job_scheduler("UTC".parse().unwrap(), |_tpl, _at| async {});
        let reg = ScheduleRegistry::new(TemplateStore::new(&dir), handle);
        assert_eq!(reg.load().await, 2);

        assert!(matches!(
            reg.scheduler.query(active.id).await.unwrap(),
            JobState::Armed { .. }
        ));
        assert_eq!(
            reg.scheduler.query(paused.id).await.unwrap(),
            JobState::Idle
        );
    }
}
