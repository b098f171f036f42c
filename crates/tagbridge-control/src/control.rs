//! `TagControl`: the selection reconciler state machine.
//!
//! ```text
//!  initialize()                on_change(desired)
//!       │                             │
//!       ▼                             ▼
//!  ┌─────────┐  metadata (x2)   ┌───────────┐  diff   ┌──────────────────┐
//!  │ Loading │─────────────────►│   Ready   │────────►│   Reconciling    │
//!  └─────────┘  junction rows   └───────────┘◄────────│ link ∥ unlink …  │
//!       │       related x N           ▲      settled  └──────────────────┘
//!       ▼                             │
//!   Disabled                      dispose() ──► Disposed
//! ```
//!
//! Reconciliations are serialized: a second `on_change` waits for the first
//! to settle and diffs against the selection it left behind.

use crate::config::ControlConfig;
use crate::error::ControlError;
use crate::events::{AssociationOp, ControlEvent, ControlEventHandler, ControlState};
use crate::metadata::MetadataResolver;
use crate::output;
use crate::selection::{SelectionDiff, SelectionState};
use crate::suggest::SuggestionResolver;
use futures::future::{join, join_all};
use parking_lot::RwLock;
use std::sync::Arc;
use tagbridge_model::{
    record_str, Association, EntityMetadata, EntityStore, FilterExpr, HostContext,
    MetadataProvider, RecordQuery, RecordRef, RelationshipDescriptor, Tag,
};
use tokio::sync::Mutex;

/// Outcome of one settled reconciliation.
#[derive(Debug, Clone)]
pub struct ReconcileReport {
    pub additions: Vec<Tag>,
    pub removals: Vec<Tag>,
    /// Link/unlink calls that failed; the selection was replaced regardless
    pub failures: Vec<ControlError>,
    /// Whether link/unlink calls were issued (false while the host is unsaved)
    pub remote: bool,
}

impl ReconcileReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Attribute names resolved during loading.
#[derive(Debug, Clone)]
struct Bindings {
    host: EntityMetadata,
    related: EntityMetadata,
}

pub struct TagControl {
    config: ControlConfig,
    descriptor: RelationshipDescriptor,
    host: RwLock<HostContext>,
    metadata: MetadataResolver,
    store: Arc<dyn EntityStore>,
    state: RwLock<ControlState>,
    bindings: RwLock<Option<Bindings>>,
    selection: RwLock<SelectionState>,
    reconcile_gate: Mutex<()>,
    output_changed: Box<dyn Fn() + Send + Sync>,
    event_handlers: Vec<ControlEventHandler>,
}

impl TagControl {
    pub fn new(
        config: ControlConfig,
        host: HostContext,
        provider: Arc<dyn MetadataProvider>,
        store: Arc<dyn EntityStore>,
    ) -> Self {
        let descriptor = config.descriptor();
        Self {
            config,
            descriptor,
            host: RwLock::new(host),
            metadata: MetadataResolver::new(provider),
            store,
            state: RwLock::new(ControlState::Uninitialized),
            bindings: RwLock::new(None),
            selection: RwLock::new(SelectionState::new()),
            reconcile_gate: Mutex::new(()),
            output_changed: Box::new(|| {}),
            event_handlers: Vec::new(),
        }
    }

    /// Called whenever the host must re-read `get_outputs()`.
    pub fn on_output_changed<F>(&mut self, notify: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.output_changed = Box::new(notify);
    }

    /// Add an event handler
    pub fn on_event(&mut self, handler: ControlEventHandler) {
        self.event_handlers.push(handler);
    }

    /// Emit an event to all handlers
    fn emit(&self, event: ControlEvent) {
        for handler in &self.event_handlers {
            handler(event.clone());
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn state(&self) -> ControlState {
        *self.state.read()
    }

    pub fn descriptor(&self) -> &RelationshipDescriptor {
        &self.descriptor
    }

    pub fn host(&self) -> HostContext {
        self.host.read().clone()
    }

    pub fn metadata(&self) -> &MetadataResolver {
        &self.metadata
    }

    pub fn selected_tags(&self) -> Vec<Tag> {
        self.selection.read().tags().to_vec()
    }

    /// Encoded selection, in the configured output format.
    pub fn get_outputs(&self) -> String {
        output::serialize(
            &self.descriptor,
            &self.selection.read(),
            self.config.output_format,
        )
        .unwrap_or_else(|err| {
            tracing::error!(error = %err, "failed to encode tag selection");
            String::new()
        })
    }

    // ========================================================================
    // State Transitions
    // ========================================================================

    fn transition(&self, to: ControlState) -> Result<(), ControlError> {
        self.transition_with(to, || {})
    }

    /// Move to `to`, running `apply` under the state lock so observers never
    /// see the new state without its data. Disposed is terminal.
    fn transition_with(
        &self,
        to: ControlState,
        apply: impl FnOnce(),
    ) -> Result<(), ControlError> {
        let from = {
            let mut state = self.state.write();
            if *state == ControlState::Disposed {
                return Err(ControlError::Disposed);
            }
            apply();
            std::mem::replace(&mut *state, to)
        };
        if from != to {
            tracing::debug!(%from, %to, "tag control state changed");
            self.emit(ControlEvent::StateChanged { from, to });
        }
        Ok(())
    }

    /// Move from `expected` to `to` in one step; any other current state is
    /// rejected.
    fn advance(&self, expected: ControlState, to: ControlState) -> Result<(), ControlError> {
        {
            let mut state = self.state.write();
            match *state {
                current if current == expected => *state = to,
                ControlState::Disposed => return Err(ControlError::Disposed),
                current => return Err(ControlError::NotReady { state: current }),
            }
        }
        tracing::debug!(from = %expected, %to, "tag control state changed");
        self.emit(ControlEvent::StateChanged { from: expected, to });
        Ok(())
    }

    // ========================================================================
    // Loading
    // ========================================================================

    /// Resolve metadata and load the associated tags. Returns the number of
    /// tags loaded.
    ///
    /// Any failure leaves the control `Disabled` with an empty selection.
    pub async fn initialize(&self) -> Result<usize, ControlError> {
        self.advance(ControlState::Uninitialized, ControlState::Loading)?;

        match self.load().await {
            Ok((bindings, selection)) => {
                let count = selection.len();
                self.transition_with(ControlState::Ready, || {
                    *self.bindings.write() = Some(bindings);
                    *self.selection.write() = selection;
                })?;
                tracing::info!(
                    relationship = %self.descriptor.relationship_name,
                    selected = count,
                    "tag control loaded"
                );
                self.emit(ControlEvent::Loaded { selected: count });
                Ok(count)
            }
            Err(err) => {
                self.transition_with(ControlState::Disabled, || {
                    *self.selection.write() = SelectionState::new();
                })?;
                tracing::warn!(error = %err, "tag control disabled");
                self.emit(ControlEvent::Disabled {
                    reason: err.to_string(),
                });
                Err(err)
            }
        }
    }

    async fn load(&self) -> Result<(Bindings, SelectionState), ControlError> {
        let host = self.host();
        let (host_meta, related_meta) = self
            .metadata
            .resolve_pair(&host.entity_type, &self.descriptor.related_entity_type)
            .await?;
        let bindings = Bindings {
            host: host_meta,
            related: related_meta,
        };

        let selection = match host.persisted_id() {
            Some(host_id) => self.fetch_linked(&bindings, host_id).await?,
            None => {
                tracing::debug!(entity_type = %host.entity_type, "host record not saved; starting empty");
                SelectionState::new()
            }
        };
        Ok((bindings, selection))
    }

    async fn fetch_linked(
        &self,
        bindings: &Bindings,
        host_id: &str,
    ) -> Result<SelectionState, ControlError> {
        let junction = &self.descriptor.junction_entity_type;
        let host_attr = &bindings.host.id_attribute;
        let related_attr = &bindings.related.id_attribute;

        let query = RecordQuery::new()
            .select([host_attr.clone(), related_attr.clone()])
            .filter(FilterExpr::eq(host_attr.clone(), host_id));
        let rows = self
            .store
            .fetch_many(junction, &query)
            .await
            .map_err(|source| ControlError::QueryFailure {
                entity: junction.clone(),
                source,
            })?;

        let related_ids: Vec<String> = rows
            .iter()
            .filter_map(|row| {
                let id = record_str(row, related_attr);
                if id.is_none() {
                    tracing::warn!(entity = %junction, attribute = %related_attr, "junction row without related id");
                }
                id
            })
            .collect();
        if related_ids.is_empty() {
            return Ok(SelectionState::new());
        }

        let related_entity = &self.descriptor.related_entity_type;
        let fields = bindings.related.tag_fields();
        let fetches = related_ids
            .iter()
            .map(|id| self.store.fetch_one(related_entity, id, &fields));

        let tags = join_all(fetches)
            .await
            .into_iter()
            .map(|result| {
                result
                    .and_then(|record| Tag::from_record(&record, &bindings.related))
                    .map_err(|source| ControlError::QueryFailure {
                        entity: related_entity.clone(),
                        source,
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(SelectionState::from_tags(tags))
    }

    // ========================================================================
    // Reconciliation
    // ========================================================================

    /// Apply the picker's new selection. `None` clears it.
    pub async fn on_change(
        &self,
        desired: Option<Vec<Tag>>,
    ) -> Result<ReconcileReport, ControlError> {
        let _gate = self.reconcile_gate.lock().await;
        self.advance(ControlState::Ready, ControlState::Reconciling)?;
        let Some(bindings) = self.bindings.read().clone() else {
            self.transition(ControlState::Ready)?;
            return Err(ControlError::NotReady {
                state: ControlState::Ready,
            });
        };

        let desired = SelectionState::from_tags(desired.unwrap_or_default());
        let diff = SelectionDiff::between(&self.selection.read(), &desired);
        let host = self.host();

        let (remote, failures) = match host.persisted_id() {
            Some(host_id) if !diff.is_empty() => (true, self.apply_remote(&bindings, host_id, &diff).await),
            Some(_) => (true, Vec::new()),
            None => (false, Vec::new()),
        };

        self.transition_with(ControlState::Ready, || {
            *self.selection.write() = desired;
        })?;

        tracing::info!(
            added = diff.additions.len(),
            removed = diff.removals.len(),
            failed = failures.len(),
            remote,
            "reconciled tag selection"
        );
        self.emit(ControlEvent::Reconciled {
            added: diff.additions.len(),
            removed: diff.removals.len(),
            failed: failures.len(),
            remote,
        });
        if !remote {
            (self.output_changed)();
            self.emit(ControlEvent::OutputChanged);
        }

        Ok(ReconcileReport {
            additions: diff.additions,
            removals: diff.removals,
            failures,
            remote,
        })
    }

    fn association(&self, bindings: &Bindings, host_id: &str, tag: &Tag) -> Association {
        Association {
            relationship_name: self.descriptor.relationship_name.clone(),
            host: RecordRef::new(&bindings.host.collection_name, host_id),
            related: RecordRef::new(&bindings.related.collection_name, &tag.key),
        }
    }

    /// Issue every link and unlink at once and wait for all of them.
    async fn apply_remote(
        &self,
        bindings: &Bindings,
        host_id: &str,
        diff: &SelectionDiff,
    ) -> Vec<ControlError> {
        let links = diff.additions.iter().map(|tag| {
            let association = self.association(bindings, host_id, tag);
            async move {
                self.store
                    .link(&association)
                    .await
                    .map_err(|source| ControlError::LinkFailure {
                        key: tag.key.clone(),
                        source,
                    })
            }
        });
        let unlinks = diff.removals.iter().map(|tag| {
            let association = self.association(bindings, host_id, tag);
            async move {
                self.store
                    .unlink(&association)
                    .await
                    .map_err(|source| ControlError::UnlinkFailure {
                        key: tag.key.clone(),
                        source,
                    })
            }
        });

        let (linked, unlinked) = join(join_all(links), join_all(unlinks)).await;

        let failures: Vec<ControlError> = linked
            .into_iter()
            .chain(unlinked)
            .filter_map(Result::err)
            .collect();
        for failure in &failures {
            let (operation, key) = match failure {
                ControlError::LinkFailure { key, .. } => (AssociationOp::Link, key),
                ControlError::UnlinkFailure { key, .. } => (AssociationOp::Unlink, key),
                _ => continue,
            };
            tracing::warn!(key = %key, error = %failure, "association call failed");
            self.emit(ControlEvent::AssociationFailed {
                operation,
                key: key.clone(),
                message: failure.to_string(),
            });
        }
        failures
    }

    // ========================================================================
    // Host Lifecycle
    // ========================================================================

    /// Tear down. A reconciliation still in flight settles, but its result
    /// is dropped.
    pub fn dispose(&self) {
        let from = std::mem::replace(&mut *self.state.write(), ControlState::Disposed);
        if from != ControlState::Disposed {
            tracing::debug!(%from, "tag control disposed");
            self.emit(ControlEvent::StateChanged {
                from,
                to: ControlState::Disposed,
            });
        }
    }

    /// The host pushed fresh record data. Returns the tags to render.
    ///
    /// An unsaved record that now has an id is adopted, so later changes go
    /// to the store. Any other identity change is ignored.
    pub fn notify_new_data(&self, update: HostContext) -> Vec<Tag> {
        {
            let mut host = self.host.write();
            match update.persisted_id() {
                Some(_) if update.entity_type != host.entity_type => {
                    tracing::warn!(
                        current = %host.entity_type,
                        pushed = %update.entity_type,
                        "ignoring host entity type change"
                    );
                }
                Some(new_id) if !host.exists() => {
                    tracing::info!(host_id = new_id, "host record saved; changes now reconcile remotely");
                    host.entity_id = Some(new_id.to_string());
                }
                Some(new_id) => {
                    let same = host
                        .persisted_id()
                        .map_or(false, |id| id.eq_ignore_ascii_case(new_id));
                    if !same {
                        tracing::warn!(pushed = new_id, "ignoring host record id change");
                    }
                }
                None => {}
            }
        }
        self.selected_tags()
    }

    // ========================================================================
    // Suggestions
    // ========================================================================

    /// Suggestions for a focused, empty input.
    pub async fn on_empty_input_focus(&self, selected: &[Tag]) -> Vec<Tag> {
        self.on_resolve_suggestions("", selected).await
    }

    /// Suggestions for `filter`. `selected` is what the picker currently
    /// shows; it is only consulted when `hideSelectedSuggestions` is set.
    pub async fn on_resolve_suggestions(&self, filter: &str, selected: &[Tag]) -> Vec<Tag> {
        if matches!(
            self.state(),
            ControlState::Disabled | ControlState::Disposed
        ) {
            return Vec::new();
        }
        let Some(bindings) = self.bindings.read().clone() else {
            return Vec::new();
        };

        let hide = self.config.hide_selected_suggestions && !selected.is_empty();
        let max = self.config.max_suggestions;
        let limit = if hide {
            max.map(|m| m.saturating_add(selected.len()))
        } else {
            max
        };

        let tags = SuggestionResolver::new(
            Arc::clone(&self.store),
            self.descriptor.related_entity_type.clone(),
            bindings.related,
        )
        .with_limit(limit)
        .suggest(Some(filter))
        .await;

        if !hide {
            return tags;
        }
        let mut visible: Vec<Tag> = tags.into_iter().filter(|t| !selected.contains(t)).collect();
        if let Some(max) = max {
            visible.truncate(max);
        }
        visible
    }
}
