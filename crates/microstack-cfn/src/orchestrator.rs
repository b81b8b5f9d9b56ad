//! The stack orchestrator: create, update-with-rollback, tolerant delete,
//! and describes.
//!
//! Each stack is a single-writer entity: create/update/delete serialise on a
//! per-stack async mutex while the stack record itself sits behind a
//! `parking_lot::RwLock`, so describes read consistent snapshots and may
//! observe interim state between adapter calls.

use std::collections::HashMap;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::adapter::ResourceAdapters;
use crate::error::{StackError, StackResult};
use crate::graph::creation_order;
use crate::intrinsics::{ResolvedResource, resolve_properties};
use crate::stack::{ResourceStatus, Stack, StackEvent, StackResource, StackStatus};
use crate::template::{
    ResourceSpec, TYPE_BUCKET, TYPE_LAMBDA_FUNCTION, TYPE_LOG_GROUP, Template, parse_template,
};

/// Maximum stack name length.
const MAX_STACK_NAME_LEN: usize = 128;

/// Per-stack slot: async writer lock + the record.
#[derive(Debug)]
struct StackSlot {
    writer: Mutex<()>,
    state: RwLock<Stack>,
}

impl StackSlot {
    fn new(stack: Stack) -> Arc<Self> {
        Arc::new(Self {
            writer: Mutex::new(()),
            state: RwLock::new(stack),
        })
    }
}

/// Verb context for a provisioning walk.
#[derive(Debug, Clone, Copy)]
enum ProvisionVerb {
    Create,
    Update,
}

impl ProvisionVerb {
    fn in_progress(self) -> ResourceStatus {
        match self {
            Self::Create => ResourceStatus::CreateInProgress,
            Self::Update => ResourceStatus::UpdateInProgress,
        }
    }

    fn complete(self) -> ResourceStatus {
        match self {
            Self::Create => ResourceStatus::CreateComplete,
            Self::Update => ResourceStatus::UpdateComplete,
        }
    }

    fn failed(self) -> ResourceStatus {
        match self {
            Self::Create => ResourceStatus::CreateFailed,
            Self::Update => ResourceStatus::UpdateFailed,
        }
    }
}

/// The stack orchestrator.
#[derive(Debug)]
pub struct StackOrchestrator {
    stacks: DashMap<String, Arc<StackSlot>>,
    adapters: ResourceAdapters,
}

impl StackOrchestrator {
    /// Create an orchestrator over the given adapter set.
    #[must_use]
    pub fn new(adapters: ResourceAdapters) -> Self {
        Self {
            stacks: DashMap::new(),
            adapters,
        }
    }

    /// Create a stack from a template body.
    ///
    /// Returns the stack id. Resource-level failures leave the stack in
    /// `CREATE_FAILED` (no rollback on create) but still return the id;
    /// name/template validation failures reject the request outright.
    ///
    /// # Errors
    ///
    /// Returns a [`StackError`] for an invalid name, a duplicate stack, or
    /// an invalid template.
    pub async fn create_stack(&self, name: &str, template_body: &str) -> StackResult<String> {
        validate_stack_name(name)?;
        let template = parse_template(template_body)?;
        let order = creation_order(&template)?;

        let slot = self.register_stack(name, template_body)?;
        let _writer = slot.writer.lock().await;

        let stack_id = {
            let mut stack = slot.state.write();
            stack.set_status(StackStatus::CreateInProgress, None);
            stack.stack_id.clone()
        };

        info!(stack = %name, resources = order.len(), "creating stack");

        match self.provision(&slot, &template, &order, ProvisionVerb::Create) {
            Ok(()) => {
                slot.state.write().set_status(StackStatus::CreateComplete, None);
                info!(stack = %name, "stack created");
            }
            Err(reason) => {
                slot.state
                    .write()
                    .set_status(StackStatus::CreateFailed, Some(reason.clone()));
                warn!(stack = %name, reason = %reason, "stack creation failed");
            }
        }

        Ok(stack_id)
    }

    /// Update a stack with a new template.
    ///
    /// Every current resource is deleted (tolerating not-found) and the new
    /// template is created from scratch; physical ids may be recreated and
    /// timestamps refresh. On failure the previous template is re-created;
    /// the stack ends in `UPDATE_ROLLBACK_COMPLETE` or, if the rollback
    /// itself fails, `UPDATE_ROLLBACK_FAILED`.
    ///
    /// # Errors
    ///
    /// Returns a [`StackError`] when the stack is missing, not in an
    /// updatable state, or the new template is invalid.
    pub async fn update_stack(&self, name: &str, template_body: &str) -> StackResult<String> {
        let slot = self.slot(name)?;
        let _writer = slot.writer.lock().await;

        {
            let stack = slot.state.read();
            if !stack.status.allows_update() {
                return Err(StackError::validation(format!(
                    "Stack [{name}] is in {} state and can not be updated",
                    stack.status
                )));
            }
        }

        let new_template = parse_template(template_body)?;
        let new_order = creation_order(&new_template)?;

        let (stack_id, previous_body) = {
            let stack = slot.state.read();
            (stack.stack_id.clone(), stack.template_body.clone())
        };

        info!(stack = %name, "updating stack");
        {
            let mut stack = slot.state.write();
            stack.set_status(StackStatus::UpdateInProgress, None);
            stack.template_body = template_body.to_owned();
        }

        // Delete-then-recreate, even for resources unchanged between
        // templates.
        if let Err(reason) = self.delete_all_resources(&slot) {
            return Ok(self.roll_back(&slot, name, &previous_body, reason, stack_id));
        }
        match self.provision(&slot, &new_template, &new_order, ProvisionVerb::Update) {
            Ok(()) => {
                slot.state.write().set_status(StackStatus::UpdateComplete, None);
                info!(stack = %name, "stack updated");
                Ok(stack_id)
            }
            Err(reason) => Ok(self.roll_back(&slot, name, &previous_body, reason, stack_id)),
        }
    }

    /// Delete a stack, walking `creation_order` in reverse.
    ///
    /// Deletion is tolerant: a resource that is already gone counts as
    /// `DELETE_COMPLETE`. Any other adapter error stops the walk and leaves
    /// the stack in `DELETE_FAILED`.
    ///
    /// # Errors
    ///
    /// Returns [`StackError::StackNotFound`] when the stack is missing.
    pub async fn delete_stack(&self, name: &str) -> StackResult<()> {
        let slot = self.slot(name)?;
        let _writer = slot.writer.lock().await;

        slot.state.write().set_status(StackStatus::DeleteInProgress, None);
        info!(stack = %name, "deleting stack");

        let order: Vec<String> = {
            let stack = slot.state.read();
            stack.creation_order.iter().rev().cloned().collect()
        };

        for logical_id in order {
            let Some((resource_type, physical_id)) = lookup_resource(&slot, &logical_id) else {
                continue;
            };

            slot.state.write().set_resource_status(
                &logical_id,
                &resource_type,
                None,
                ResourceStatus::DeleteInProgress,
                None,
            );

            let Some(physical_id) = physical_id else {
                // Never provisioned; nothing to tear down.
                slot.state.write().set_resource_status(
                    &logical_id,
                    &resource_type,
                    None,
                    ResourceStatus::DeleteComplete,
                    None,
                );
                continue;
            };

            match self.delete_resource(&resource_type, &physical_id) {
                Ok(()) => {
                    slot.state.write().set_resource_status(
                        &logical_id,
                        &resource_type,
                        None,
                        ResourceStatus::DeleteComplete,
                        None,
                    );
                }
                Err(e) if e.is_not_found() => {
                    // Already gone counts as deleted.
                    slot.state.write().set_resource_status(
                        &logical_id,
                        &resource_type,
                        None,
                        ResourceStatus::DeleteComplete,
                        None,
                    );
                }
                Err(e) => {
                    let reason = e.to_string();
                    let mut stack = slot.state.write();
                    stack.set_resource_status(
                        &logical_id,
                        &resource_type,
                        None,
                        ResourceStatus::DeleteFailed,
                        Some(reason.clone()),
                    );
                    stack.set_status(StackStatus::DeleteFailed, Some(reason.clone()));
                    warn!(stack = %name, resource = %logical_id, reason = %reason, "stack deletion failed");
                    return Ok(());
                }
            }
        }

        {
            let mut stack = slot.state.write();
            // Resources that never reached creation_order (failed creations)
            // have nothing provisioned; close them out too.
            let pending: Vec<(String, String)> = stack
                .resources
                .iter()
                .filter(|r| r.status != ResourceStatus::DeleteComplete)
                .map(|r| (r.logical_id.clone(), r.resource_type.clone()))
                .collect();
            for (logical_id, resource_type) in pending {
                stack.set_resource_status(
                    &logical_id,
                    &resource_type,
                    None,
                    ResourceStatus::DeleteComplete,
                    None,
                );
            }
            stack.set_status(StackStatus::DeleteComplete, None);
        }

        info!(stack = %name, "stack deleted");
        Ok(())
    }

    /// Describe one stack, or all stacks when `name` is `None`.
    ///
    /// # Errors
    ///
    /// Returns [`StackError::StackNotFound`] when a named stack is missing.
    pub fn describe_stacks(&self, name: Option<&str>) -> StackResult<Vec<Stack>> {
        match name {
            Some(name) => Ok(vec![self.slot(name)?.state.read().clone()]),
            None => {
                let mut stacks: Vec<Stack> = self
                    .stacks
                    .iter()
                    .map(|slot| slot.state.read().clone())
                    .collect();
                stacks.sort_by(|a, b| a.stack_name.cmp(&b.stack_name));
                Ok(stacks)
            }
        }
    }

    /// Describe a stack's resources.
    ///
    /// # Errors
    ///
    /// Returns [`StackError::StackNotFound`] when the stack is missing.
    pub fn describe_stack_resources(&self, name: &str) -> StackResult<Vec<StackResource>> {
        Ok(self.slot(name)?.state.read().resources.clone())
    }

    /// Describe a stack's event journal, most recent first.
    ///
    /// # Errors
    ///
    /// Returns [`StackError::StackNotFound`] when the stack is missing.
    pub fn describe_stack_events(&self, name: &str) -> StackResult<Vec<StackEvent>> {
        Ok(self.slot(name)?.state.read().events.clone())
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn slot(&self, name: &str) -> StackResult<Arc<StackSlot>> {
        self.stacks
            .get(name)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| StackError::StackNotFound {
                name: name.to_owned(),
            })
    }

    /// Insert a fresh slot, replacing a fully deleted predecessor.
    fn register_stack(&self, name: &str, template_body: &str) -> StackResult<Arc<StackSlot>> {
        if let Some(existing) = self.stacks.get(name) {
            let deleted = existing.state.read().status == StackStatus::DeleteComplete;
            if !deleted {
                return Err(StackError::StackAlreadyExists {
                    name: name.to_owned(),
                });
            }
        }

        let slot = StackSlot::new(Stack::new(name, template_body));
        self.stacks.insert(name.to_owned(), Arc::clone(&slot));
        Ok(slot)
    }

    /// Create every resource of `template` in `order`; stops at the first
    /// failure and returns its reason.
    fn provision(
        &self,
        slot: &Arc<StackSlot>,
        template: &Template,
        order: &[String],
        verb: ProvisionVerb,
    ) -> Result<(), String> {
        let mut completed: HashMap<String, ResolvedResource> = HashMap::new();

        for logical_id in order {
            let spec = template
                .resource(logical_id)
                .expect("creation order only contains template resources");

            slot.state.write().set_resource_status(
                logical_id,
                &spec.resource_type,
                None,
                verb.in_progress(),
                None,
            );

            match self.create_resource(spec, &completed) {
                Ok(physical_id) => {
                    let mut stack = slot.state.write();
                    stack.set_resource_status(
                        logical_id,
                        &spec.resource_type,
                        Some(physical_id.clone()),
                        verb.complete(),
                        None,
                    );
                    stack.creation_order.push(logical_id.clone());
                    drop(stack);
                    completed.insert(
                        logical_id.clone(),
                        ResolvedResource {
                            physical_id,
                            resource_type: spec.resource_type.clone(),
                        },
                    );
                }
                Err(reason) => {
                    slot.state.write().set_resource_status(
                        logical_id,
                        &spec.resource_type,
                        None,
                        verb.failed(),
                        Some(reason.clone()),
                    );
                    return Err(reason);
                }
            }
        }

        Ok(())
    }

    /// Route one resource creation to its adapter.
    fn create_resource(
        &self,
        spec: &ResourceSpec,
        completed: &HashMap<String, ResolvedResource>,
    ) -> Result<String, String> {
        let properties =
            resolve_properties(&spec.properties, completed).map_err(|e| e.to_string())?;

        let result = match spec.resource_type.as_str() {
            TYPE_LAMBDA_FUNCTION => self.adapters.functions.create(&properties),
            TYPE_LOG_GROUP => self.adapters.log_groups.create(&properties),
            TYPE_BUCKET => self.adapters.buckets.create(&properties),
            other => return Err(format!("Unsupported resource type: {other}")),
        };

        result.map_err(|e| e.to_string())
    }

    /// Route one resource deletion to its adapter.
    fn delete_resource(
        &self,
        resource_type: &str,
        physical_id: &str,
    ) -> microstack_core::ServiceResult<()> {
        match resource_type {
            TYPE_LAMBDA_FUNCTION => self.adapters.functions.delete(physical_id),
            TYPE_LOG_GROUP => self.adapters.log_groups.delete(physical_id),
            TYPE_BUCKET => self.adapters.buckets.delete(physical_id),
            // Nothing was provisioned for unsupported types.
            _ => Ok(()),
        }
    }

    /// Delete every provisioned resource in reverse creation order,
    /// tolerating not-found, then clear the resource list. Used by update.
    fn delete_all_resources(&self, slot: &Arc<StackSlot>) -> Result<(), String> {
        let order: Vec<String> = {
            let stack = slot.state.read();
            stack.creation_order.iter().rev().cloned().collect()
        };

        for logical_id in &order {
            let Some((resource_type, Some(physical_id))) = lookup_resource(slot, logical_id) else {
                continue;
            };
            match self.delete_resource(&resource_type, &physical_id) {
                Ok(()) => {}
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(e.to_string()),
            }
        }

        let mut stack = slot.state.write();
        stack.resources.clear();
        stack.creation_order.clear();
        Ok(())
    }

    /// Run the rollback path after a failed update. Returns the stack id.
    fn roll_back(
        &self,
        slot: &Arc<StackSlot>,
        name: &str,
        previous_body: &str,
        reason: String,
        stack_id: String,
    ) -> String {
        warn!(stack = %name, reason = %reason, "stack update failed, rolling back");
        {
            let mut stack = slot.state.write();
            stack.set_status(StackStatus::UpdateFailed, Some(reason.clone()));
            stack.set_status(StackStatus::UpdateRollbackInProgress, None);
            stack.template_body = previous_body.to_owned();
        }

        // The previous template was accepted once; if it no longer parses
        // the rollback cannot proceed.
        let rollback = parse_template(previous_body)
            .and_then(|template| creation_order(&template).map(|order| (template, order)));
        let (template, order) = match rollback {
            Ok(parts) => parts,
            Err(e) => {
                slot.state
                    .write()
                    .set_status(StackStatus::UpdateRollbackFailed, Some(e.to_string()));
                return stack_id;
            }
        };

        if let Err(e) = self.delete_all_resources(slot) {
            slot.state
                .write()
                .set_status(StackStatus::UpdateRollbackFailed, Some(e));
            return stack_id;
        }

        match self.provision(slot, &template, &order, ProvisionVerb::Update) {
            Ok(()) => {
                slot.state
                    .write()
                    .set_status(StackStatus::UpdateRollbackComplete, None);
                info!(stack = %name, "stack rolled back");
            }
            Err(e) => {
                slot.state
                    .write()
                    .set_status(StackStatus::UpdateRollbackFailed, Some(e));
                warn!(stack = %name, "stack rollback failed");
            }
        }

        stack_id
    }
}

/// Fetch a resource's type and physical id without holding the lock.
fn lookup_resource(slot: &Arc<StackSlot>, logical_id: &str) -> Option<(String, Option<String>)> {
    let stack = slot.state.read();
    stack
        .resources
        .iter()
        .find(|r| r.logical_id == logical_id)
        .map(|r| (r.resource_type.clone(), r.physical_id.clone()))
}

/// Validate a stack name against `^[A-Za-z][A-Za-z0-9-]{0,127}$`.
fn validate_stack_name(name: &str) -> StackResult<()> {
    let bytes = name.as_bytes();
    let valid = !bytes.is_empty()
        && bytes.len() <= MAX_STACK_NAME_LEN
        && bytes[0].is_ascii_alphabetic()
        && bytes.iter().all(|b| b.is_ascii_alphanumeric() || *b == b'-');

    if valid {
        Ok(())
    } else {
        Err(StackError::validation(format!(
            "Stack name must match [A-Za-z][A-Za-z0-9-]* and be at most {MAX_STACK_NAME_LEN} characters: {name}"
        )))
    }
}
