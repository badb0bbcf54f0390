//! Command dispatch and handlers.

pub mod create;
pub mod status;
pub mod sync;

use crate::cli::Command;
use crate::config::{self, Config};
use crate::context::ServiceContext;
use crate::error::SyncError;
use crate::mapper::FieldMapper;
use crate::sources::{GroupedSource, NumberedSource, Registry};
use crate::sync::{Creator, Mode, SyncEngine, SyncOptions, Target};

/// Program name that selects API-based issue creation instead of a command.
pub const API_CREATOR: &str = "api";

/// Dispatch a parsed command against the live environment.
///
/// # Errors
///
/// Returns an error string for setup failures or if the selected handler fails.
pub fn dispatch(command: &Command) -> Result<(), String> {
    config::load_dotenv();
    let config = Config::from_env().map_err(|e| SyncError::from(e).to_string())?;
    let ctx = ServiceContext::live(&config)?;
    dispatch_with_context(command, &config, &ctx)
}

/// Dispatch a command with the given configuration and service context.
///
/// # Errors
///
/// Returns an error string for setup failures or if the selected handler fails.
pub fn dispatch_with_context(
    command: &Command,
    config: &Config,
    ctx: &ServiceContext,
) -> Result<(), String> {
    let registry = build_registry(ctx, config).map_err(|e| e.to_string())?;
    let scope = command.scope();
    let mapper = FieldMapper::new(config.assignee_aliases.clone(), !scope.keep_title_prefixes);
    let engine = SyncEngine::new(ctx, &registry, &mapper, &config.state_file, creator(config));
    let options = options_for(command);

    if let Command::Status { .. } = command {
        return status::run(&engine, &options);
    }
    if !ctx.issues.verify_access() {
        return Err(SyncError::AccessDenied(config.repository.clone()).to_string());
    }
    match command {
        Command::Create { .. } => create::run(&engine, &options),
        _ => sync::run(&engine, &options),
    }
}

/// Registers every backend whose root directory exists.
///
/// # Errors
///
/// Returns [`SyncError::NoBackends`] if neither root exists.
pub fn build_registry<'a>(
    ctx: &'a ServiceContext,
    config: &Config,
) -> Result<Registry<'a>, SyncError> {
    let mut registry = Registry::new();
    if ctx.fs.is_dir(&config.tasks_dir) {
        registry.register(Box::new(NumberedSource::new(ctx, &config.tasks_dir)));
    }
    if ctx.fs.is_dir(&config.specs_dir) {
        registry.register(Box::new(GroupedSource::new(ctx, &config.specs_dir)));
    }
    if registry.is_empty() {
        return Err(SyncError::NoBackends);
    }
    Ok(registry)
}

fn creator(config: &Config) -> Creator {
    if config.create_command == API_CREATOR {
        Creator::Api
    } else {
        Creator::Command {
            program: config.create_command.clone(),
            repository: config.repository.clone(),
        }
    }
}

/// Translates CLI flags into engine options.
#[must_use]
pub fn options_for(command: &Command) -> SyncOptions {
    let scope = command.scope();
    let target = match (&scope.file, scope.number) {
        (Some(path), _) => Some(Target::File(path.clone())),
        (None, Some(number)) => Some(Target::Number(number)),
        (None, None) => None,
    };
    let mut options = SyncOptions { sources: scope.source_set(), target, ..SyncOptions::default() };
    match command {
        Command::Sync { create_new, clean_orphans, strip_orphans, .. } => {
            options.create_new = *create_new;
            options.clean_orphans = *clean_orphans;
            options.strip_orphans = *strip_orphans;
        }
        Command::Push { .. } => options.mode = Mode::Push,
        Command::Pull { .. } => options.mode = Mode::Pull,
        Command::Create { .. } => options.mode = Mode::Create,
        Command::Status { .. } => {}
    }
    options
}
