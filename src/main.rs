use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use repo_warden::agent::SubprocessDelegate;
use repo_warden::cleanup::{CleanupDaemon, ConflictResolver};
use repo_warden::cli::{Cli, Commands, Display, HooksAction, OutputFormat, WorkspaceAction};
use repo_warden::config::{WardenConfig, WardenPaths};
use repo_warden::error::{Result, WardenError};
use repo_warden::events::EventBus;
use repo_warden::exec::{CommandRunner, TokioCommandRunner};
use repo_warden::git::GitRunner;
use repo_warden::hooks::{HookContext, HookExecutor, HookRegistry};
use repo_warden::host::GhClient;
use repo_warden::notification::Notifier;
use repo_warden::routing::{ExecutorProfile, resolve_executor_for_task};
use repo_warden::task::{SizeLabel, Task};
use repo_warden::workspace::{Reaper, WorkspaceRegistry};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            Display::new().print_error(&e.to_string());
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("repo_warden=debug")
    } else {
        EnvFilter::new("repo_warden=info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).without_time())
        .with(filter)
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let display = Display::new();

    match cli.command {
        Commands::Init => cmd_init(&display).await,
        Commands::Run { once, dry_run } => cmd_run(once, dry_run).await,
        Commands::Sweep { dry_run } => cmd_sweep(&display, cli.output, dry_run).await,
        Commands::Classify {
            title,
            description,
            size,
            points,
            executor,
        } => cmd_classify(&display, cli.output, title, description, size, points, executor),
        Commands::Hooks { action } => cmd_hooks(&display, cli.output, action).await,
        Commands::Workspace { action } => cmd_workspace(&display, cli.output, action).await,
    }
}

fn find_project_root() -> Result<PathBuf> {
    let current = std::env::current_dir()?;

    let mut path = current.as_path();
    loop {
        if path.join(".git").exists() {
            return Ok(path.to_path_buf());
        }
        path = path.parent().ok_or(WardenError::NotInGitRepo)?;
    }
}

struct Project {
    config: WardenConfig,
    paths: WardenPaths,
}

async fn load_project() -> Result<Project> {
    let root = find_project_root()?;
    let config = WardenConfig::load(&root.join(".warden")).await?;
    let paths = WardenPaths::new(root, &config);
    if !paths.is_initialized() {
        return Err(WardenError::NotInitialized);
    }
    Ok(Project { config, paths })
}

async fn cmd_init(display: &Display) -> Result<()> {
    let root = find_project_root()?;
    let config = WardenConfig::default();
    let paths = WardenPaths::new(root, &config);
    paths.ensure_dirs().await?;
    config.save(&paths.warden_dir).await?;

    let registry = WorkspaceRegistry::new(
        paths.registry_path(&config),
        paths.audit_log_path(&config),
    );
    registry
        .init("default", config.workspace.default_lease_ttl_minutes)
        .await?;

    display.print_success(&format!(
        "Initialized repo-warden in {}",
        paths.warden_dir.display()
    ));
    Ok(())
}

async fn cmd_run(once: bool, dry_run: bool) -> Result<()> {
    let Project { mut config, paths } = load_project().await?;
    if dry_run {
        config.cleanup.dry_run = true;
    }

    let runner: Arc<dyn CommandRunner> = Arc::new(TokioCommandRunner);
    let git = GitRunner::new(runner.clone(), &paths.root);
    let host = Arc::new(GhClient::new(runner.clone(), &paths.root));
    let delegate = config.agent.program.as_ref().map(|program| {
        Arc::new(SubprocessDelegate::new(
            runner.clone(),
            program,
            &paths.root,
            Duration::from_secs(config.agent.timeout_secs),
        )) as Arc<dyn repo_warden::agent::AgentDelegate>
    });

    let mut git_config = config.git.clone();
    git_config.scratch_dir = paths.worktrees_dir.clone();

    let resolver = ConflictResolver::new(
        git.clone(),
        host.clone(),
        delegate,
        config.cleanup.clone(),
        git_config.clone(),
    );
    let notifier = Arc::new(Notifier::new(
        config.notification.clone(),
        Some(paths.logs_dir.clone()),
    ));
    let daemon = CleanupDaemon::new(
        host,
        resolver,
        git,
        git_config,
        config.cleanup.clone(),
        config.reaper.clone(),
        notifier,
        EventBus::new(),
    );

    if once {
        daemon.run_once().await;
        println!(
            "{}",
            serde_json::to_string_pretty(&daemon.stats().snapshot())?
        );
    } else {
        daemon.run().await;
    }
    Ok(())
}

async fn cmd_sweep(display: &Display, output: OutputFormat, dry_run: bool) -> Result<()> {
    let Project { mut config, paths } = load_project().await?;
    if dry_run {
        config.reaper.dry_run = true;
    }
    config.reaper.search_paths = config
        .reaper
        .search_paths
        .iter()
        .map(|p| paths.root.join(p))
        .collect();

    let registry = Arc::new(WorkspaceRegistry::new(
        paths.registry_path(&config),
        paths.audit_log_path(&config),
    ));
    let reaper = Reaper::new(registry, config.reaper.clone());
    let result = reaper.run_sweep(Utc::now()).await;

    match output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&result)?),
        OutputFormat::Text => display.print_sweep_result(&result, config.reaper.dry_run),
    }
    Ok(())
}

fn cmd_classify(
    display: &Display,
    output: OutputFormat,
    title: String,
    description: String,
    size: Option<String>,
    points: Option<u32>,
    executor: String,
) -> Result<()> {
    let mut task = Task::new("cli", title).with_description(description);
    if let Some(size) = size {
        let label = SizeLabel::parse(&size)
            .ok_or_else(|| WardenError::Config(format!("unknown size label: {size}")))?;
        task = task.with_size(label);
    }
    if let Some(points) = points {
        task = task.with_points(points);
    }

    let profile = ExecutorProfile::new("cli", executor);
    let route = resolve_executor_for_task(&task, &profile, &Default::default());

    match output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&route.complexity)?),
        OutputFormat::Text => display.print_route(&route),
    }
    Ok(())
}

async fn cmd_hooks(display: &Display, output: OutputFormat, action: HooksAction) -> Result<()> {
    let Project { config, paths } = load_project().await?;
    let registry = Arc::new(HookRegistry::new());
    registry.register_builtin_hooks(config.hooks.effective_builtin_mode());
    if let Some(file) = &config.hooks.hooks_file {
        registry.load_hooks(&paths.root.join(file));
    }

    match action {
        HooksAction::List => {
            let all = registry.all_hooks();
            if output == OutputFormat::Json {
                let map: std::collections::BTreeMap<_, _> = all
                    .iter()
                    .map(|(event, hooks)| (event.as_str(), hooks))
                    .collect();
                println!("{}", serde_json::to_string_pretty(&map)?);
                return Ok(());
            }
            display.print_header("Registered Hooks");
            for (_, hooks) in all {
                for hook in hooks {
                    display.print_hook(&hook);
                }
            }
        }
        HooksAction::Run {
            event,
            sdk,
            hooks_file,
        } => {
            if let Some(file) = hooks_file {
                registry.load_hooks(&file);
            }
            let mut context = HookContext::new();
            if let Some(sdk) = sdk {
                context = context.with_sdk(sdk);
            }
            let executor = HookExecutor::new(registry, Arc::new(TokioCommandRunner));
            let results = executor.execute_hooks(&event, &context).await;
            if output == OutputFormat::Json {
                println!("{}", serde_json::to_string_pretty(&results)?);
                return Ok(());
            }
            if results.is_empty() {
                display.print_info(&format!("No hooks registered for {event}"));
            }
            for result in &results {
                display.print_hook_result(result);
            }
            if results.iter().any(|r| !r.success) {
                return Err(WardenError::Hook(format!("one or more {event} hooks failed")));
            }
        }
    }
    Ok(())
}

async fn cmd_workspace(
    display: &Display,
    output: OutputFormat,
    action: WorkspaceAction,
) -> Result<()> {
    let Project { config, paths } = load_project().await?;
    let registry = WorkspaceRegistry::new(
        paths.registry_path(&config),
        paths.audit_log_path(&config),
    );

    match action {
        WorkspaceAction::List { audit } => {
            let workspaces = registry.list().await?;
            if output == OutputFormat::Json {
                println!("{}", serde_json::to_string_pretty(&workspaces)?);
                return Ok(());
            }
            display.print_header("Workspaces");
            if workspaces.is_empty() {
                display.print_info("No workspaces registered");
            }
            for workspace in &workspaces {
                display.print_workspace(workspace);
            }
            if audit {
                display.print_header("Audit Log");
                for record in registry.audit().read_tail(20).await? {
                    display.print_audit_record(&record);
                }
            }
        }
        WorkspaceAction::Claim {
            id,
            owner,
            ttl,
            note,
        } => {
            let record = registry.claim(&id, &owner, ttl, Utc::now(), note).await?;
            display.print_success(&format!("Claimed {id} for {owner}"));
            display.print_workspace(&record);
        }
        WorkspaceAction::Renew { id, owner, ttl } => {
            let record = registry
                .renew(&id, owner.as_deref(), ttl, Utc::now())
                .await?;
            display.print_success(&format!("Renewed lease on {id}"));
            display.print_workspace(&record);
        }
        WorkspaceAction::Release { id } => {
            if registry.release(&id, Utc::now()).await? {
                display.print_success(&format!("Released {id}"));
            } else {
                display.print_info(&format!("{id} had no active lease"));
            }
        }
    }
    Ok(())
}
