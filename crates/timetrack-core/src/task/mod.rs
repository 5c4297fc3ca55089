//! Tasks and progress accounting.
//!
//! A task carries a unit target and a done counter. Ids come from a
//! monotonically increasing counter that survives deletion and reload, so an
//! id is never handed out twice.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};

use crate::error::ValidationError;
use crate::events::Event;

fn default_true() -> bool {
    true
}

/// A tracked task.
///
/// Serialized field names match the on-disk state document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: u64,
    pub name: String,
    /// Target units.
    #[serde(rename = "units")]
    pub target_units: f64,
    /// Completed units, `0 ..= target_units`.
    #[serde(rename = "done")]
    pub done_units: f64,
    #[serde(rename = "created", default)]
    pub created_at: Option<NaiveDateTime>,
    #[serde(default)]
    pub archived: bool,
    #[serde(default = "default_true")]
    pub is_today: bool,
}

impl Task {
    pub fn is_complete(&self) -> bool {
        self.done_units >= self.target_units
    }

    /// 0.0 ..= 100.0
    pub fn completion_percentage(&self) -> f64 {
        if self.target_units <= 0.0 {
            return 0.0;
        }
        (self.done_units / self.target_units * 100.0).clamp(0.0, 100.0)
    }

    /// `done/units` as shown next to the task.
    pub fn progress_label(&self) -> String {
        format!("{:.0}/{:.0}", self.done_units, self.target_units)
    }

    fn clamp_progress(&mut self) {
        if !self.target_units.is_finite() || self.target_units < 0.0 {
            self.target_units = 0.0;
        }
        if !self.done_units.is_finite() {
            self.done_units = 0.0;
        }
        self.done_units = self.done_units.clamp(0.0, self.target_units);
    }
}

/// Id-indexed task collection. The only writer of [`Task`] records.
#[derive(Debug, Clone)]
pub struct TaskRegistry {
    tasks: BTreeMap<u64, Task>,
    next_id: u64,
}

impl Default for TaskRegistry {
    fn default() -> Self {
        Self {
            tasks: BTreeMap::new(),
            next_id: 1,
        }
    }
}

impl TaskRegistry {
    /// Rebuild from loaded records.
    ///
    /// The id counter is raised past every loaded id; duplicate ids keep the
    /// first record. Progress is clamped back into range.
    pub fn from_parts(tasks: Vec<Task>, next_id: u64) -> Self {
        let mut map = BTreeMap::new();
        for mut task in tasks {
            if map.contains_key(&task.id) {
                warn!(task_id = task.id, "dropping task with duplicate id");
                continue;
            }
            task.clamp_progress();
            map.insert(task.id, task);
        }
        let max_id = map.keys().next_back().copied().unwrap_or(0);
        Self {
            tasks: map,
            next_id: next_id.max(max_id + 1).max(1),
        }
    }

    pub fn next_id(&self) -> u64 {
        self.next_id
    }

    pub fn get(&self, id: u64) -> Option<&Task> {
        self.tasks.get(&id)
    }

    pub fn contains(&self, id: u64) -> bool {
        self.tasks.contains_key(&id)
    }

    /// Tasks in creation order.
    pub fn iter(&self) -> impl Iterator<Item = &Task> {
        self.tasks.values()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn to_vec(&self) -> Vec<Task> {
        self.tasks.values().cloned().collect()
    }

    /// Add a task. Non-positive or non-finite targets fall back to 1 unit.
    pub fn add(
        &mut self,
        name: &str,
        target_units: f64,
        now: NaiveDateTime,
    ) -> Result<u64, ValidationError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ValidationError::EmptyName { entity: "task" });
        }
        let target_units = if target_units.is_finite() && target_units > 0.0 {
            target_units
        } else {
            1.0
        };

        let id = self.next_id;
        self.next_id += 1;
        self.tasks.insert(
            id,
            Task {
                id,
                name: name.to_string(),
                target_units,
                done_units: 0.0,
                created_at: Some(now),
                archived: false,
                is_today: true,
            },
        );
        debug!(task_id = id, name, target_units, "task added");
        Ok(id)
    }

    /// Add one unit of progress, clamped to the target.
    ///
    /// Returns `TaskCompleted` only on the increment that reaches the target.
    pub fn increment(
        &mut self,
        id: u64,
        now: NaiveDateTime,
    ) -> Result<Option<Event>, ValidationError> {
        let task = self.get_mut(id)?;
        let was_complete = task.is_complete();
        task.done_units = (task.done_units + 1.0).min(task.target_units);

        if !was_complete && task.is_complete() {
            return Ok(Some(Event::TaskCompleted {
                task_id: id,
                name: task.name.clone(),
                at: now,
            }));
        }
        Ok(None)
    }

    /// Remove one unit of progress, clamped to zero.
    pub fn decrement(&mut self, id: u64) -> Result<(), ValidationError> {
        let task = self.get_mut(id)?;
        task.done_units = (task.done_units - 1.0).max(0.0);
        Ok(())
    }

    pub fn rename(&mut self, id: u64, name: &str) -> Result<(), ValidationError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ValidationError::EmptyName { entity: "task" });
        }
        self.get_mut(id)?.name = name.to_string();
        Ok(())
    }

    pub fn set_archived(&mut self, id: u64, archived: bool) -> Result<(), ValidationError> {
        self.get_mut(id)?.archived = archived;
        Ok(())
    }

    /// Remove a task. Time logs referencing it are left untouched.
    pub fn delete(&mut self, id: u64) -> Option<Task> {
        self.tasks.remove(&id)
    }

    fn get_mut(&mut self, id: u64) -> Result<&mut Task, ValidationError> {
        self.tasks
            .get_mut(&id)
            .ok_or(ValidationError::UnknownId { entity: "task", id })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use proptest::prelude::*;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    #[test]
    fn ids_are_never_reused_after_delete() {
        let mut reg = TaskRegistry::default();
        let a = reg.add("Read", 3.0, now()).unwrap();
        let b = reg.add("Write", 1.0, now()).unwrap();
        reg.delete(b);
        let c = reg.add("Review", 2.0, now()).unwrap();
        assert_eq!((a, b, c), (1, 2, 3));

        let mut reloaded = TaskRegistry::from_parts(reg.to_vec(), reg.next_id());
        assert_eq!(reloaded.add("Again", 1.0, now()).unwrap(), 4);
    }

    #[test]
    fn from_parts_raises_counter_past_loaded_ids() {
        let mut reg = TaskRegistry::default();
        reg.add("a", 1.0, now()).unwrap();
        let mut tasks = reg.to_vec();
        tasks[0].id = 41;
        let reg = TaskRegistry::from_parts(tasks, 1);
        assert_eq!(reg.next_id(), 42);
    }

    #[test]
    fn completion_fires_once_on_reaching_target() {
        let mut reg = TaskRegistry::default();
        let id = reg.add("Pushups", 2.0, now()).unwrap();

        assert_eq!(reg.increment(id, now()).unwrap(), None);
        let event = reg.increment(id, now()).unwrap();
        assert!(matches!(event, Some(Event::TaskCompleted { task_id, .. }) if task_id == id));

        // Already at target: clamped, no repeat event.
        assert_eq!(reg.increment(id, now()).unwrap(), None);
        assert_eq!(reg.get(id).unwrap().done_units, 2.0);
    }

    #[test]
    fn blank_name_and_unknown_id_are_rejected() {
        let mut reg = TaskRegistry::default();
        assert_eq!(
            reg.add("   ", 1.0, now()),
            Err(ValidationError::EmptyName { entity: "task" })
        );
        assert_eq!(
            reg.decrement(99),
            Err(ValidationError::UnknownId { entity: "task", id: 99 })
        );
    }

    #[test]
    fn invalid_target_falls_back_to_one_unit() {
        let mut reg = TaskRegistry::default();
        let id = reg.add("x", f64::NAN, now()).unwrap();
        assert_eq!(reg.get(id).unwrap().target_units, 1.0);
        let id = reg.add("y", -3.0, now()).unwrap();
        assert_eq!(reg.get(id).unwrap().target_units, 1.0);
    }

    #[test]
    fn loaded_progress_is_clamped() {
        let task = Task {
            id: 1,
            name: "over".into(),
            target_units: 2.0,
            done_units: 5.0,
            created_at: None,
            archived: false,
            is_today: true,
        };
        let reg = TaskRegistry::from_parts(vec![task], 1);
        assert_eq!(reg.get(1).unwrap().done_units, 2.0);
    }

    proptest! {
        #[test]
        fn progress_stays_within_bounds(target in 1u32..20, ops in proptest::collection::vec(any::<bool>(), 0..100)) {
            let mut reg = TaskRegistry::default();
            let id = reg.add("prop", target as f64, now()).unwrap();
            for inc in ops {
                if inc {
                    reg.increment(id, now()).unwrap();
                } else {
                    reg.decrement(id).unwrap();
                }
                let task = reg.get(id).unwrap();
                prop_assert!(task.done_units >= 0.0);
                prop_assert!(task.done_units <= task.target_units);
            }
        }
    }
}
