//! Mapper pipeline.
//!
//! A mapper implements any subset of the capability traits below. At
//! registration time the pipeline asks the mapper for each capability and
//! keeps one list per hook, so dispatch never needs a runtime type check.
//! Registration order is invocation order for every hook.
//!
//! Per-object hooks stop at the first error of that object; the manager
//! aggregates the errors of independent objects. Listener hooks see the
//! whole state and push their errors into the operation report.

use std::collections::BTreeSet;
use std::sync::Arc;

use treesync_core::{Key, State};

use crate::error::MapperError;
use crate::mappers;
use crate::recipe::{
    Changes, LocalLoadRecipe, LocalSaveRecipe, OperationContext, PersistRecipe, RemoteLoadRecipe,
    RemoteSaveRecipe,
};
use crate::rename::RenameAction;

// ---------------------------------------------------------------------------
// 1. Capabilities
// ---------------------------------------------------------------------------

pub trait LocalLoader {
    fn after_local_load(&self, recipe: &mut LocalLoadRecipe<'_>) -> Result<(), MapperError>;
}

pub trait LocalSaver {
    fn before_local_save(&self, recipe: &mut LocalSaveRecipe<'_>) -> Result<(), MapperError>;
}

pub trait RemoteLoader {
    fn after_remote_load(&self, recipe: &mut RemoteLoadRecipe<'_>) -> Result<(), MapperError>;
}

pub trait RemoteSaver {
    fn before_remote_save(&self, recipe: &mut RemoteSaveRecipe<'_>) -> Result<(), MapperError>;
}

pub trait Persister {
    fn before_persist(&self, recipe: &mut PersistRecipe<'_>) -> Result<(), MapperError>;
}

pub trait Renamer {
    /// Called after objects moved; adds keys of objects that must be saved again.
    fn after_rename(
        &self,
        state: &State,
        renamed: &[RenameAction],
        resave: &mut BTreeSet<Key>,
    ) -> Result<(), MapperError>;
}

/// Reacts to objects loaded or changed on one side.
pub trait ChangeListener {
    fn on_local_change(
        &self,
        _ctx: &mut OperationContext<'_>,
        _changes: &Changes,
    ) -> Result<(), MapperError> {
        Ok(())
    }

    fn on_remote_change(
        &self,
        _ctx: &mut OperationContext<'_>,
        _changes: &Changes,
    ) -> Result<(), MapperError> {
        Ok(())
    }
}

/// Runs after every change listener of the operation.
pub trait OperationListener {
    fn after_local_operation(
        &self,
        _ctx: &mut OperationContext<'_>,
        _changes: &Changes,
    ) -> Result<(), MapperError> {
        Ok(())
    }

    fn after_remote_operation(
        &self,
        _ctx: &mut OperationContext<'_>,
        _changes: &Changes,
    ) -> Result<(), MapperError> {
        Ok(())
    }
}

/// A pipeline unit. Each capability accessor returns the mapper itself when
/// it implements that hook.
pub trait Mapper {
    fn name(&self) -> &'static str;

    fn local_loader(self: Arc<Self>) -> Option<Arc<dyn LocalLoader>> {
        None
    }

    fn local_saver(self: Arc<Self>) -> Option<Arc<dyn LocalSaver>> {
        None
    }

    fn remote_loader(self: Arc<Self>) -> Option<Arc<dyn RemoteLoader>> {
        None
    }

    fn remote_saver(self: Arc<Self>) -> Option<Arc<dyn RemoteSaver>> {
        None
    }

    fn persister(self: Arc<Self>) -> Option<Arc<dyn Persister>> {
        None
    }

    fn renamer(self: Arc<Self>) -> Option<Arc<dyn Renamer>> {
        None
    }

    fn change_listener(self: Arc<Self>) -> Option<Arc<dyn ChangeListener>> {
        None
    }

    fn operation_listener(self: Arc<Self>) -> Option<Arc<dyn OperationListener>> {
        None
    }
}

// ---------------------------------------------------------------------------
// 2. Pipeline
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct Pipeline {
    names: Vec<&'static str>,
    local_loaders: Vec<Arc<dyn LocalLoader>>,
    local_savers: Vec<Arc<dyn LocalSaver>>,
    remote_loaders: Vec<Arc<dyn RemoteLoader>>,
    remote_savers: Vec<Arc<dyn RemoteSaver>>,
    persisters: Vec<Arc<dyn Persister>>,
    renamers: Vec<Arc<dyn Renamer>>,
    change_listeners: Vec<Arc<dyn ChangeListener>>,
    operation_listeners: Vec<Arc<dyn OperationListener>>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every built-in mapper, in invocation order.
    pub fn standard() -> Self {
        let mut pipeline = Pipeline::new();
        pipeline.register(mappers::corefiles::CoreFilesMapper);
        pipeline.register(mappers::relations::RelationsMapper);
        pipeline.register(mappers::variables::VariablesMapper);
        pipeline.register(mappers::scheduler::SchedulerMapper);
        pipeline.register(mappers::sharedcode::SharedCodeMapper);
        pipeline.register(mappers::transformation::TransformationMapper);
        pipeline.register(mappers::orchestrator::OrchestratorMapper);
        pipeline
    }

    pub fn register<M: Mapper + 'static>(&mut self, mapper: M) {
        let mapper = Arc::new(mapper);
        self.names.push(mapper.name());
        if let Some(hook) = mapper.clone().local_loader() {
            self.local_loaders.push(hook);
        }
        if let Some(hook) = mapper.clone().local_saver() {
            self.local_savers.push(hook);
        }
        if let Some(hook) = mapper.clone().remote_loader() {
            self.remote_loaders.push(hook);
        }
        if let Some(hook) = mapper.clone().remote_saver() {
            self.remote_savers.push(hook);
        }
        if let Some(hook) = mapper.clone().persister() {
            self.persisters.push(hook);
        }
        if let Some(hook) = mapper.clone().renamer() {
            self.renamers.push(hook);
        }
        if let Some(hook) = mapper.clone().change_listener() {
            self.change_listeners.push(hook);
        }
        if let Some(hook) = mapper.operation_listener() {
            self.operation_listeners.push(hook);
        }
    }

    pub fn names(&self) -> &[&'static str] {
        &self.names
    }

    // -- per-object hooks ---------------------------------------------------

    pub fn after_local_load(&self, recipe: &mut LocalLoadRecipe<'_>) -> Result<(), MapperError> {
        tracing::debug!("local load: {}", recipe.record.key.desc());
        for hook in &self.local_loaders {
            hook.after_local_load(recipe)?;
        }
        Ok(())
    }

    pub fn before_local_save(&self, recipe: &mut LocalSaveRecipe<'_>) -> Result<(), MapperError> {
        tracing::debug!("local save: {}", recipe.record.key.desc());
        for hook in &self.local_savers {
            hook.before_local_save(recipe)?;
        }
        Ok(())
    }

    pub fn after_remote_load(&self, recipe: &mut RemoteLoadRecipe<'_>) -> Result<(), MapperError> {
        tracing::debug!("remote load: {}", recipe.object.key().desc());
        for hook in &self.remote_loaders {
            hook.after_remote_load(recipe)?;
        }
        Ok(())
    }

    pub fn before_remote_save(&self, recipe: &mut RemoteSaveRecipe<'_>) -> Result<(), MapperError> {
        tracing::debug!("remote save: {}", recipe.record.key.desc());
        for hook in &self.remote_savers {
            hook.before_remote_save(recipe)?;
        }
        Ok(())
    }

    pub fn before_persist(&self, recipe: &mut PersistRecipe<'_>) -> Result<(), MapperError> {
        tracing::debug!("persist: {}", recipe.record.key.desc());
        for hook in &self.persisters {
            hook.before_persist(recipe)?;
        }
        Ok(())
    }

    pub fn after_rename(
        &self,
        state: &State,
        renamed: &[RenameAction],
    ) -> Result<BTreeSet<Key>, MapperError> {
        let mut resave = BTreeSet::new();
        for hook in &self.renamers {
            hook.after_rename(state, renamed, &mut resave)?;
        }
        Ok(resave)
    }

    // -- listeners ----------------------------------------------------------

    /// Change listeners first, then operation listeners. Errors are collected.
    pub fn after_local_changes(&self, ctx: &mut OperationContext<'_>, changes: &Changes) {
        for hook in &self.change_listeners {
            if let Err(err) = hook.on_local_change(ctx, changes) {
                ctx.report.error(err);
            }
        }
        for hook in &self.operation_listeners {
            if let Err(err) = hook.after_local_operation(ctx, changes) {
                ctx.report.error(err);
            }
        }
    }

    pub fn on_remote_change(&self, ctx: &mut OperationContext<'_>, changes: &Changes) {
        for hook in &self.change_listeners {
            if let Err(err) = hook.on_remote_change(ctx, changes) {
                ctx.report.error(err);
            }
        }
    }

    pub fn after_remote_operation(&self, ctx: &mut OperationContext<'_>, changes: &Changes) {
        for hook in &self.operation_listeners {
            if let Err(err) = hook.after_remote_operation(ctx, changes) {
                ctx.report.error(err);
            }
        }
    }
}
