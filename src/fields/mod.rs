//! Field Synchronizer
//!
//! Keeps every bound dashboard field showing the backend's value without ever
//! overwriting a value the operator is editing. A field is "focused" while the
//! user holds input focus or has an unacknowledged edit in flight; focused fields
//! are skipped by [`FieldSynchronizer::apply_snapshot`].
//!
//! Focus is not allowed to stick forever. Each binding carries an idle deadline
//! which [`FieldSynchronizer::expire_idle`] enforces: one scheduler pass over all
//! bindings instead of one timer per field. Because deadlines live inside the
//! bindings, unbinding a field or calling [`FieldSynchronizer::cancel_all`] leaves
//! nothing behind that could fire later.
//!
//! All time-dependent operations take `now` explicitly.

pub mod registry;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

use crate::error::{SyncError, SyncResult};
use crate::snapshot::{FieldValue, Snapshot, TreePath};

pub use registry::{default_bindings, FieldLocks};

/// Opaque identifier of a rendered field (the DOM id in a browser client).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldId(String);

impl FieldId {
    /// Wrap an identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FieldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FieldId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Association between a field and a tree path, plus its focus bookkeeping.
#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
    path: TreePath,
    focused: bool,
    deadline: Option<Instant>,
    value: Option<FieldValue>,
    /// Set on blur: the view may show uncommitted typing, so the next
    /// snapshot value is emitted even if it equals `value`.
    resync: bool,
}

impl Binding {
    fn new(path: TreePath) -> Self {
        Self {
            path,
            focused: false,
            deadline: None,
            value: None,
            resync: false,
        }
    }

    /// Tree path this field mirrors.
    pub fn path(&self) -> &TreePath {
        &self.path
    }

    /// Whether snapshots are currently held off this field.
    pub fn is_focused(&self) -> bool {
        self.focused
    }

    /// When the field will be force-blurred, if armed.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Value currently displayed.
    pub fn value(&self) -> Option<&FieldValue> {
        self.value.as_ref()
    }

    fn blur(&mut self) {
        self.focused = false;
        self.deadline = None;
        self.resync = true;
    }
}

/// A displayed value that changed during [`FieldSynchronizer::apply_snapshot`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldUpdate {
    /// Field that changed.
    pub field: FieldId,
    /// New displayed value.
    pub value: FieldValue,
}

/// Path-scoped partial update produced when a field edit is committed.
///
/// The transport sends `body()` as a PUT to `path`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WriteRequest {
    /// Parent node of the edited parameter.
    pub path: TreePath,
    /// Parameter name within `path`.
    pub key: String,
    /// New value.
    pub value: FieldValue,
}

impl WriteRequest {
    /// JSON body `{key: value}`.
    pub fn body(&self) -> serde_json::Value {
        let mut body = serde_json::Map::new();
        body.insert(self.key.clone(), self.value.to_json());
        serde_json::Value::Object(body)
    }
}

/// Focus-aware reconciliation of bound fields against polled snapshots.
#[derive(Debug, Clone)]
pub struct FieldSynchronizer {
    bindings: BTreeMap<FieldId, Binding>,
    idle_timeout: Duration,
}

impl FieldSynchronizer {
    /// Create an empty synchronizer with the given idle limit.
    pub fn new(idle_timeout: Duration) -> Self {
        Self {
            bindings: BTreeMap::new(),
            idle_timeout,
        }
    }

    /// Create a synchronizer pre-populated with bindings.
    pub fn with_bindings<I>(idle_timeout: Duration, bindings: I) -> Self
    where
        I: IntoIterator<Item = (FieldId, TreePath)>,
    {
        let mut sync = Self::new(idle_timeout);
        for (field, path) in bindings {
            sync.bind(field, path);
        }
        sync
    }

    /// Bind a field to a path. Rebinding an existing field starts it fresh.
    pub fn bind(&mut self, field: FieldId, path: TreePath) {
        self.bindings.insert(field, Binding::new(path));
    }

    /// Remove a binding along with any pending idle deadline.
    pub fn unbind(&mut self, field: &FieldId) -> bool {
        self.bindings.remove(field).is_some()
    }

    /// The user focused the field: hold snapshots off it and (re)arm the idle deadline.
    ///
    /// Focusing an already focused field only moves the deadline; there is never
    /// more than one deadline per field.
    pub fn on_focus(&mut self, field: &FieldId, now: Instant) -> SyncResult<()> {
        let deadline = now + self.idle_timeout;
        let binding = self.binding_mut(field)?;
        binding.focused = true;
        binding.deadline = Some(deadline);
        trace!(%field, "field focused");
        Ok(())
    }

    /// The user is interacting with the field: push the idle deadline out.
    ///
    /// Does not change the focus flag. An unfocused field has no deadline to extend.
    pub fn on_change(&mut self, field: &FieldId, now: Instant) -> SyncResult<()> {
        let deadline = now + self.idle_timeout;
        let binding = self.binding_mut(field)?;
        if binding.focused {
            binding.deadline = Some(deadline);
        }
        Ok(())
    }

    /// The field lost focus: resume syncing it and drop its deadline.
    pub fn on_blur(&mut self, field: &FieldId) -> SyncResult<()> {
        self.binding_mut(field)?.blur();
        trace!(%field, "field blurred");
        Ok(())
    }

    /// Record a user edit and produce the write for the backend.
    ///
    /// The field stays focused until blur (or the idle deadline) so the next
    /// snapshot, which may predate the write, does not revert the edit.
    pub fn commit(
        &mut self,
        field: &FieldId,
        value: FieldValue,
        now: Instant,
    ) -> SyncResult<WriteRequest> {
        let deadline = now + self.idle_timeout;
        let binding = self.binding_mut(field)?;
        let (path, key) = binding
            .path
            .split_last()
            .ok_or_else(|| SyncError::UnknownField(field.to_string()))?;
        let request = WriteRequest {
            path,
            key: key.to_string(),
            value: value.clone(),
        };
        binding.focused = true;
        binding.deadline = Some(deadline);
        binding.value = Some(value);
        debug!(%field, path = %request.path, key = %request.key, "field edit committed");
        Ok(request)
    }

    /// Copy snapshot values into every unfocused field.
    ///
    /// Focused fields are left untouched. A path missing from the snapshot (or
    /// holding a non-scalar) leaves the field at its last known value. Returns the
    /// fields whose displayed value changed, plus every field blurred since the
    /// previous snapshot, whose view may hold typing the synchronizer never saw.
    pub fn apply_snapshot(&mut self, snapshot: &Snapshot) -> Vec<FieldUpdate> {
        let mut updates = Vec::new();
        for (field, binding) in self.bindings.iter_mut() {
            if binding.focused {
                trace!(%field, "skipping focused field");
                continue;
            }
            let Some(value) = snapshot.field_value(&binding.path) else {
                trace!(%field, path = %binding.path, "path absent from snapshot");
                continue;
            };
            if binding.resync || binding.value.as_ref() != Some(&value) {
                binding.resync = false;
                binding.value = Some(value.clone());
                updates.push(FieldUpdate {
                    field: field.clone(),
                    value,
                });
            }
        }
        updates
    }

    /// Blur every focused field whose idle deadline has passed.
    pub fn expire_idle(&mut self, now: Instant) -> Vec<FieldId> {
        let mut expired = Vec::new();
        for (field, binding) in self.bindings.iter_mut() {
            if binding.deadline.is_some_and(|deadline| deadline <= now) {
                binding.blur();
                expired.push(field.clone());
            }
        }
        if !expired.is_empty() {
            debug!(count = expired.len(), "idle fields blurred");
        }
        expired
    }

    /// Earliest pending idle deadline, for the single scheduler timer.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.bindings.values().filter_map(|b| b.deadline).min()
    }

    /// Drop all focus flags and deadlines.
    pub fn cancel_all(&mut self) {
        for binding in self.bindings.values_mut() {
            binding.blur();
        }
    }

    /// Binding for a field.
    pub fn binding(&self, field: &FieldId) -> Option<&Binding> {
        self.bindings.get(field)
    }

    /// Value currently displayed by a field.
    pub fn display(&self, field: &FieldId) -> Option<&FieldValue> {
        self.bindings.get(field).and_then(Binding::value)
    }

    /// Whether the field is focused. Unknown fields are not.
    pub fn is_focused(&self, field: &FieldId) -> bool {
        self.bindings.get(field).is_some_and(Binding::is_focused)
    }

    /// Number of armed idle deadlines.
    pub fn pending_timers(&self) -> usize {
        self.bindings.values().filter(|b| b.deadline.is_some()).count()
    }

    /// Number of bound fields.
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Whether no fields are bound.
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Iterate over bindings in field order.
    pub fn iter(&self) -> impl Iterator<Item = (&FieldId, &Binding)> {
        self.bindings.iter()
    }

    fn binding_mut(&mut self, field: &FieldId) -> SyncResult<&mut Binding> {
        self.bindings
            .get_mut(field)
            .ok_or_else(|| SyncError::UnknownField(field.to_string()))
    }
}
