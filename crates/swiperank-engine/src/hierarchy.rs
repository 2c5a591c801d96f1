//! Driving a hierarchy forward as its sessions complete.

use chrono::{DateTime, Utc};
use serde::Serialize;
use swiperank_core::{
  Error, Result,
  family::{FamilyTask, Hierarchy, HierarchyProgress},
  item::Item,
  session::{HierarchyLink, Session},
  store::{ItemCatalog, SessionStore},
};
use tracing::{debug, info};
use uuid::Uuid;

use crate::engine::{ChildSessionStarted, Engine, Store};

/// A hierarchy's progress plus its rankings so far.
#[derive(Debug, Clone, Serialize)]
pub struct HierarchyReport {
  #[serde(flatten)]
  pub progress:     HierarchyProgress,
  pub root_ranking: Vec<Uuid>,
  /// The flattened order over every family ranked so far.
  pub ranking:      Vec<Uuid>,
  pub tasks:        Vec<FamilyTask>,
}

pub(crate) struct Advance {
  pub child:     Option<ChildSessionStarted>,
  pub completed: bool,
}

impl<S: Store> Engine<S> {
  /// A hierarchy's report. A hierarchy still waiting on a session that has
  /// already completed is caught up first.
  pub async fn hierarchy(&self, hierarchy_id: Uuid) -> Result<HierarchyReport> {
    let mut hierarchy = self.load_hierarchy(hierarchy_id).await?;
    if let Some(current) = hierarchy.current_session() {
      let session = self.load_session(current).await?;
      if self.resume_hierarchy(&session).await?.is_some() {
        hierarchy = self.load_hierarchy(hierarchy_id).await?;
      }
    }
    Ok(HierarchyReport {
      progress:     hierarchy.progress(),
      root_ranking: hierarchy.root_ranking.clone(),
      ranking:      hierarchy.flatten(),
      tasks:        hierarchy.tasks,
    })
  }

  /// Fold a completed, hierarchy-linked session into its hierarchy. Returns
  /// `None` for any other session.
  pub(crate) async fn resume_hierarchy(&self, session: &Session) -> Result<Option<Advance>> {
    match session.hierarchy {
      Some(link) if session.is_completed() => {
        Ok(Some(self.advance_hierarchy(link, session, Utc::now()).await?))
      }
      _ => Ok(None),
    }
  }

  /// Feed a completed session into its hierarchy and open the next family
  /// session, if any.
  ///
  /// Safe to repeat: once the hierarchy has recorded `session`, this only
  /// reports the outcome that recording produced. The nested session is
  /// inserted before the hierarchy is saved, so a recorded hierarchy never
  /// points at a missing session.
  pub(crate) async fn advance_hierarchy(
    &self,
    link: HierarchyLink,
    session: &Session,
    now: DateTime<Utc>,
  ) -> Result<Advance> {
    let mut hierarchy = self.load_hierarchy(link.hierarchy_id).await?;
    if hierarchy.has_recorded(link.task_id) {
      return self.recorded_advance(&hierarchy, session.session_id).await;
    }

    let items = self.ranked_items(&session.personal_ranking).await?;
    let queued = match link.task_id {
      None => hierarchy.seed_root(&session.personal_ranking, &items)?,
      Some(task_id) => {
        hierarchy.complete_task(task_id, session.personal_ranking.clone(), &items)?
      }
    };
    debug!(
      hierarchy_id = %hierarchy.hierarchy_id,
      level = hierarchy.current_level,
      queued,
      "families queued"
    );

    let next = self
      .prepare_next_family(&mut hierarchy, session, now)
      .await?;
    if let Some((child, _)) = &next {
      self.call(self.store.insert_session(child)).await?;
    } else {
      hierarchy.finish(now);
    }
    self.save_hierarchy(&mut hierarchy).await?;

    let child = match next {
      Some((child, task)) => {
        info!(
          hierarchy_id = %hierarchy.hierarchy_id,
          session_id = %child.session_id,
          family = %task.family_tag,
          level = task.level,
          "family session started"
        );
        Some(ChildSessionStarted {
          session_id:   child.session_id,
          hierarchy_id: hierarchy.hierarchy_id,
          parent_id:    task.parent_id,
          family_tag:   task.family_tag,
          prompt:       child.next(),
        })
      }
      None => {
        info!(hierarchy_id = %hierarchy.hierarchy_id, "hierarchy completed");
        None
      }
    };

    Ok(Advance { completed: child.is_none(), child })
  }

  /// The outcome recorded when `session_id` completed: the family session it
  /// opened, or hierarchy completion when it opened none.
  async fn recorded_advance(&self, hierarchy: &Hierarchy, session_id: Uuid) -> Result<Advance> {
    let Some(task) = hierarchy.opened_after(session_id) else {
      return Ok(Advance { child: None, completed: hierarchy.is_completed() });
    };
    let child_id = task
      .child_session_id
      .ok_or(Error::TaskNotFound(task.task_id))?;
    let child = self.load_session(child_id).await?;
    Ok(Advance {
      child:     Some(ChildSessionStarted {
        session_id:   child.session_id,
        hierarchy_id: hierarchy.hierarchy_id,
        parent_id:    task.parent_id,
        family_tag:   task.family_tag.clone(),
        prompt:       child.next(),
      }),
      completed: false,
    })
  }

  /// Catalog metadata for the ranked cards that are still active.
  async fn ranked_items(&self, ids: &[Uuid]) -> Result<Vec<Item>> {
    let mut items = Vec::with_capacity(ids.len());
    for id in ids {
      if let Some(item) = self.call(self.store.get_item(*id)).await? {
        items.push(item);
      }
    }
    Ok(items)
  }

  /// Pop tasks until one has a rankable family, skipping the rest. The
  /// returned session is built but not yet persisted.
  async fn prepare_next_family(
    &self,
    hierarchy: &mut Hierarchy,
    completed: &Session,
    now: DateTime<Utc>,
  ) -> Result<Option<(Session, FamilyTask)>> {
    while let Some(task_id) = hierarchy.next_pending() {
      let task = hierarchy.task(task_id)?.clone();
      let children = self.call(self.store.get_children(&task.family_tag)).await?;

      let started = Session::start(
        task.family_tag.clone(),
        completed.mode,
        children.iter().map(|c| c.item_id),
        self.next_seed(),
        now,
      );
      let session = match started {
        Ok(session) => session,
        Err(Error::InsufficientItems { found }) => {
          info!(
            hierarchy_id = %hierarchy.hierarchy_id,
            family = %task.family_tag,
            children = found,
            "family skipped"
          );
          hierarchy.skip(task_id)?;
          continue;
        }
        Err(e) => return Err(e),
      };

      let session = session.with_hierarchy(HierarchyLink {
        hierarchy_id: hierarchy.hierarchy_id,
        task_id:      Some(task_id),
      });
      hierarchy.begin(task_id, session.session_id, completed.session_id)?;
      return Ok(Some((session, task)));
    }
    Ok(None)
  }
}
