//! Hierarchical ranking: expanding ranked parents into family sessions.
//!
//! A [`Hierarchy`] tracks one hierarchical run. Once its root session
//! completes, every ranked card that heads a family becomes a level-1
//! [`FamilyTask`]. Tasks are worked one at a time: the engine starts a nested
//! session over the family's children, and when that session completes the
//! task records its ranking and enqueues the children that head families of
//! their own at the next level.
//!
//! Tasks live in an arena addressed by [`TaskId`]; per-level queues hold ids
//! only. Each level is shuffled once, when it becomes current, so families
//! are presented in random order.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

use chrono::{DateTime, Utc};
use rand::seq::SliceRandom as _;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

use crate::{Error, Result, draw::DrawSource, item::Item};

/// Index of a task inside its hierarchy's arena.
pub type TaskId = u32;

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TaskStatus {
  Pending,
  Active,
  Completed,
  /// The family had fewer than two active children.
  Skipped,
}

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum HierarchyStatus {
  /// The root session is still running.
  AwaitingRoot,
  Expanding,
  Completed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FamilyTask {
  pub task_id:          TaskId,
  pub parent_id:        Uuid,
  pub family_tag:       String,
  pub level:            u32,
  pub status:           TaskStatus,
  pub child_session_id: Option<Uuid>,
  /// The session whose completion opened this task's nested session.
  #[serde(default)]
  pub opened_by:        Option<Uuid>,
  /// The family's ranking, once its session completes.
  pub ranking:          Vec<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hierarchy {
  pub hierarchy_id:    Uuid,
  pub root_session_id: Uuid,
  pub status:          HierarchyStatus,
  pub current_level:   u32,
  pub root_ranking:    Vec<Uuid>,
  pub tasks:           Vec<FamilyTask>,
  pub queues:          BTreeMap<u32, VecDeque<TaskId>>,
  pub active_task:     Option<TaskId>,
  pub draw:            DrawSource,
  #[serde(skip)]
  pub version:         u64,
  pub created_at:      DateTime<Utc>,
  pub completed_at:    Option<DateTime<Utc>>,
}

impl Hierarchy {
  pub fn new(root_session_id: Uuid, seed: u64, now: DateTime<Utc>) -> Self {
    Self {
      hierarchy_id: Uuid::new_v4(),
      root_session_id,
      status: HierarchyStatus::AwaitingRoot,
      current_level: 1,
      root_ranking: Vec::new(),
      tasks: Vec::new(),
      queues: BTreeMap::new(),
      active_task: None,
      draw: DrawSource::new(seed),
      version: 0,
      created_at: now,
      completed_at: None,
    }
  }

  pub fn task(&self, task_id: TaskId) -> Result<&FamilyTask> {
    self
      .tasks
      .get(task_id as usize)
      .ok_or(Error::TaskNotFound(task_id))
  }

  fn task_mut(&mut self, task_id: TaskId) -> Result<&mut FamilyTask> {
    self
      .tasks
      .get_mut(task_id as usize)
      .ok_or(Error::TaskNotFound(task_id))
  }

  /// Record the completed root ranking and queue its families at level 1.
  ///
  /// `items` holds catalog metadata for (a superset of) the ranked cards;
  /// cards missing from it are treated as leaves.
  pub fn seed_root(&mut self, ranking: &[Uuid], items: &[Item]) -> Result<usize> {
    if self.status != HierarchyStatus::AwaitingRoot {
      return Err(Error::InvalidState(format!(
        "hierarchy {} is already {}",
        self.hierarchy_id, self.status
      )));
    }
    self.root_ranking = ranking.to_vec();
    self.status = HierarchyStatus::Expanding;
    self.current_level = 1;
    let queued = self.enqueue_families(ranking, items, 1);
    self.shuffle_level(1);
    Ok(queued)
  }

  /// Pop the next pending task, promoting (and shuffling) deeper levels as
  /// shallower ones run dry. Returns `None` when no work remains.
  pub fn next_pending(&mut self) -> Option<TaskId> {
    loop {
      let level = self.current_level;
      while let Some(task_id) = self.queues.get_mut(&level).and_then(VecDeque::pop_front) {
        let pending = self
          .tasks
          .get(task_id as usize)
          .is_some_and(|t| t.status == TaskStatus::Pending);
        if pending {
          return Some(task_id);
        }
      }
      self.queues.remove(&level);

      let next_level = self.queues.keys().copied().find(|l| *l > level)?;
      self.current_level = next_level;
      self.shuffle_level(next_level);
    }
  }

  /// Mark `task_id` active with its nested session, opened once
  /// `opened_by` completed.
  pub fn begin(&mut self, task_id: TaskId, session_id: Uuid, opened_by: Uuid) -> Result<()> {
    let task = self.task_mut(task_id)?;
    if task.status != TaskStatus::Pending {
      return Err(Error::InvalidState(format!(
        "family task {task_id} is {}, not pending",
        task.status
      )));
    }
    task.status = TaskStatus::Active;
    task.child_session_id = Some(session_id);
    task.opened_by = Some(opened_by);
    self.active_task = Some(task_id);
    Ok(())
  }

  /// Mark `task_id` skipped; it contributes nothing to the flattened order.
  pub fn skip(&mut self, task_id: TaskId) -> Result<()> {
    let task = self.task_mut(task_id)?;
    if task.status != TaskStatus::Pending {
      return Err(Error::InvalidState(format!(
        "family task {task_id} is {}, not pending",
        task.status
      )));
    }
    task.status = TaskStatus::Skipped;
    Ok(())
  }

  /// Capture a finished family ranking and queue grandchildren families one
  /// level deeper. Returns how many tasks were queued.
  pub fn complete_task(
    &mut self,
    task_id: TaskId,
    ranking: Vec<Uuid>,
    items: &[Item],
  ) -> Result<usize> {
    let task = self.task_mut(task_id)?;
    if task.status != TaskStatus::Active {
      return Err(Error::InvalidState(format!(
        "family task {task_id} is {}, not active",
        task.status
      )));
    }
    let level = task.level + 1;
    task.status = TaskStatus::Completed;
    task.ranking = ranking.clone();
    if self.active_task == Some(task_id) {
      self.active_task = None;
    }
    Ok(self.enqueue_families(&ranking, items, level))
  }

  pub fn finish(&mut self, now: DateTime<Utc>) {
    if self.status == HierarchyStatus::Completed {
      return;
    }
    self.status = HierarchyStatus::Completed;
    self.active_task = None;
    self.completed_at = Some(now);
  }

  pub fn is_completed(&self) -> bool { self.status == HierarchyStatus::Completed }

  /// Whether the completion of the session linked through `task_id` (the
  /// root when `None`) has already been folded in.
  pub fn has_recorded(&self, task_id: Option<TaskId>) -> bool {
    match task_id {
      None => self.status != HierarchyStatus::AwaitingRoot,
      Some(id) => self
        .tasks
        .get(id as usize)
        .is_some_and(|t| t.status == TaskStatus::Completed),
    }
  }

  /// The task whose nested session was opened when `session_id` completed.
  pub fn opened_after(&self, session_id: Uuid) -> Option<&FamilyTask> {
    self.tasks.iter().find(|t| t.opened_by == Some(session_id))
  }

  /// The session this hierarchy is waiting on, if any.
  pub fn current_session(&self) -> Option<Uuid> {
    match self.status {
      HierarchyStatus::AwaitingRoot => Some(self.root_session_id),
      HierarchyStatus::Expanding => self
        .active_task
        .and_then(|id| self.tasks.get(id as usize))
        .and_then(|t| t.child_session_id),
      HierarchyStatus::Completed => None,
    }
  }

  /// Linearise the hierarchy depth-first: every card is followed by its
  /// family's ranking (recursively) before its next sibling.
  ///
  /// Uses an explicit stack, so arbitrarily deep hierarchies are fine; a card
  /// reachable twice is emitted once.
  pub fn flatten(&self) -> Vec<Uuid> {
    let families: HashMap<Uuid, &[Uuid]> = self
      .tasks
      .iter()
      .filter(|t| t.status == TaskStatus::Completed)
      .map(|t| (t.parent_id, t.ranking.as_slice()))
      .collect();

    let mut out = Vec::new();
    let mut seen = HashSet::new();
    let mut stack = vec![self.root_ranking.iter()];

    while let Some(frame) = stack.last_mut() {
      let Some(&id) = frame.next() else {
        stack.pop();
        continue;
      };
      if !seen.insert(id) {
        continue;
      }
      out.push(id);
      if let Some(children) = families.get(&id) {
        stack.push(children.iter());
      }
    }
    out
  }

  pub fn progress(&self) -> HierarchyProgress {
    let count = |status| self.tasks.iter().filter(|t| t.status == status).count();
    HierarchyProgress {
      hierarchy_id:    self.hierarchy_id,
      root_session_id: self.root_session_id,
      status:          self.status,
      current_level:   self.current_level,
      deepest_level:   self.tasks.iter().map(|t| t.level).max().unwrap_or(0),
      pending:         count(TaskStatus::Pending),
      active:          count(TaskStatus::Active),
      completed:       count(TaskStatus::Completed),
      skipped:         count(TaskStatus::Skipped),
      active_session:  self
        .active_task
        .and_then(|id| self.tasks.get(id as usize))
        .and_then(|t| t.child_session_id),
    }
  }

  // ── Internals ─────────────────────────────────────────────────────────

  fn enqueue_families(&mut self, ranking: &[Uuid], items: &[Item], level: u32) -> usize {
    let by_id: HashMap<Uuid, &Item> = items.iter().map(|i| (i.item_id, i)).collect();
    let mut queued = 0;
    for id in ranking {
      let Some(family_tag) = by_id.get(id).and_then(|item| item.family()) else {
        continue;
      };
      if self.tasks.iter().any(|t| t.parent_id == *id) {
        continue;
      }
      let task_id = self.tasks.len() as TaskId;
      self.tasks.push(FamilyTask {
        task_id,
        parent_id: *id,
        family_tag: family_tag.to_owned(),
        level,
        status: TaskStatus::Pending,
        child_session_id: None,
        opened_by: None,
        ranking: Vec::new(),
      });
      self.queues.entry(level).or_default().push_back(task_id);
      queued += 1;
    }
    queued
  }

  fn shuffle_level(&mut self, level: u32) {
    let mut rng = self.draw.next_rng();
    if let Some(queue) = self.queues.get_mut(&level) {
      queue.make_contiguous().shuffle(&mut rng);
    }
  }
}

/// Counts and pointers describing a hierarchy's progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HierarchyProgress {
  pub hierarchy_id:    Uuid,
  pub root_session_id: Uuid,
  pub status:          HierarchyStatus,
  pub current_level:   u32,
  pub deepest_level:   u32,
  pub pending:         usize,
  pub active:          usize,
  pub completed:       usize,
  pub skipped:         usize,
  /// The nested session currently being ranked, if any.
  pub active_session:  Option<Uuid>,
}
