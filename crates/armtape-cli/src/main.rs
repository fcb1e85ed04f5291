//! armtape CLI: ARM commands and deployment scripts with recorded HTTP replay.
//!
//! Every command that talks to Azure Resource Manager goes through a
//! transport; `--replay FIXTURE` (or `ARMTAPE_REPLAY`) swaps the network for a
//! recorded scenario and fails the run on any deviation from it.

// CLI-specific lint allowances (CLI binary, not library)
#![allow(missing_docs)]
#![allow(clippy::print_stdout)] // CLI must print to stdout
#![allow(clippy::print_stderr)] // CLI must print to stderr
#![allow(clippy::exit)] // CLI uses exit codes

use armtape::arm::compute::{create_or_update_vmss, show_vm, VmDetails};
use armtape::arm::network::{delete_nsg, show_nsg, DeleteOutcome, NetworkSecurityGroup};
use armtape::arm::{ArmClient, ClientOptions};
use armtape::config::Settings;
use armtape::deployment::{self, ModeFlags, ScriptOptions, ScriptType};
use armtape::fixture::{load_fixture_file, summarize_fixture, write_fixture_file};
use armtape::import::{import_nock, scenario_name_from_file};
use armtape::model::CloudEnvironment;
use armtape::profile::load_profile_file;
use armtape::transport::{NetworkTransport, Transport};
use armtape::{HarnessError, HarnessResult};
use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{generate, Shell};
use miette::{IntoDiagnostic, Result};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;
use tracing_subscriber::EnvFilter;

mod progress;

use progress::ArmProgress;

/// Color output mode
#[derive(Copy, Clone, Debug, Default, ValueEnum)]
enum ColorMode {
    /// Auto-detect based on terminal and `NO_COLOR` env
    #[default]
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}

#[derive(Debug, Parser)]
#[command(
    name = "armtape",
    version,
    about = "ARM commands and deployment scripts with recorded HTTP replay"
)]
struct Cli {
    /// Control color output
    #[arg(long, value_enum, default_value = "auto", global = true)]
    color: ColorMode,

    /// Log debug output and request progress to stderr
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    /// Answer HTTP requests from this fixture instead of the network
    #[arg(long, global = true, value_name = "FIXTURE")]
    replay: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Web site commands
    Site {
        #[command(subcommand)]
        command: SiteCommands,
    },
    /// Network commands
    Network {
        #[command(subcommand)]
        command: NetworkCommands,
    },
    /// Compute commands
    Compute {
        #[command(subcommand)]
        command: ComputeCommands,
    },
    /// Inspect and convert replay fixtures
    Fixture {
        #[command(subcommand)]
        command: FixtureCommands,
    },
    /// Generate shell completions for bash, zsh, or fish
    Completions {
        #[arg(value_enum, help = "Shell to generate completions for")]
        shell: Shell,
    },
}

#[derive(Debug, Subcommand)]
enum SiteCommands {
    /// Generate a custom deployment script
    Deploymentscript(DeploymentScriptArgs),
}

#[derive(Debug, Args)]
struct DeploymentScriptArgs {
    /// Create a deployment script for a .NET web application
    #[arg(long = "aspWAP", value_name = "projectFile", num_args = 0..=1)]
    asp_wap: Option<Option<String>>,
    /// Create a deployment script for a .NET web site
    #[arg(long = "aspWebSite")]
    asp_web_site: bool,
    /// Create a deployment script for a node.js site
    #[arg(long)]
    node: bool,
    /// Create a deployment script for a php site
    #[arg(long)]
    php: bool,
    /// Create a deployment script for a python site
    #[arg(long)]
    python: bool,
    /// Create a deployment script for a basic web site
    #[arg(long)]
    basic: bool,
    /// The root path of the repository (default: current directory)
    #[arg(short = 'r', long = "repositoryRoot", value_name = "dir")]
    repository_root: Option<PathBuf>,
    /// The solution file path (sln)
    #[arg(short = 's', long = "solutionFile", value_name = "file")]
    solution_file: Option<String>,
    /// The script type to generate: batch or bash
    #[arg(short = 't', long = "scriptType", default_value = "batch")]
    script_type: String,
    /// Overwrite existing files without asking
    #[arg(short = 'y', long = "quiet")]
    quiet: bool,
}

#[derive(Debug, Subcommand)]
enum NetworkCommands {
    /// Network security group commands
    Nsg {
        #[command(subcommand)]
        command: NsgCommands,
    },
}

#[derive(Debug, Subcommand)]
enum NsgCommands {
    /// Show a network security group
    Show {
        #[arg(short = 'g', long = "resource-group")]
        resource_group: String,
        #[arg(short = 'n', long)]
        name: String,
        #[arg(long)]
        json: bool,
    },
    /// Delete a network security group
    Delete {
        #[arg(short = 'g', long = "resource-group")]
        resource_group: String,
        #[arg(short = 'n', long)]
        name: String,
        /// Do not ask for confirmation
        #[arg(short = 'q', long)]
        quiet: bool,
    },
}

#[derive(Debug, Subcommand)]
enum ComputeCommands {
    /// Virtual machine commands
    Vm {
        #[command(subcommand)]
        command: VmCommands,
    },
    /// Virtual machine scale set commands
    Vmss {
        #[command(subcommand)]
        command: VmssCommands,
    },
}

#[derive(Debug, Subcommand)]
enum VmCommands {
    /// Show a virtual machine with its network interfaces and availability set
    Show {
        #[arg(short = 'g', long = "resource-group")]
        resource_group: String,
        #[arg(short = 'n', long)]
        name: String,
        #[arg(long)]
        json: bool,
    },
}

#[derive(Debug, Subcommand)]
enum VmssCommands {
    /// Create or update a scale set from a JSON parameter file
    CreateOrUpdate {
        #[arg(short = 'g', long = "resource-group")]
        resource_group: String,
        #[arg(short = 'n', long)]
        name: String,
        #[arg(short = 'p', long = "parameter-file")]
        parameter_file: PathBuf,
        #[arg(long)]
        json: bool,
    },
}

#[derive(Debug, Subcommand)]
enum FixtureCommands {
    /// Load, validate and summarize a fixture
    Check {
        fixture: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Convert a recording into a fixture
    Import {
        /// Autogenerated nock recording (`*.nock.js`)
        #[arg(long)]
        nock: PathBuf,
        /// Write the fixture here (JSON or YAML by extension) instead of stdout
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
        /// Scenario name (default: derived from the recording file name)
        #[arg(long)]
        name: Option<String>,
    },
}

/// Configure color output based on CLI flag and environment
fn configure_colors(mode: ColorMode) -> bool {
    let use_color = match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => {
            // Respect NO_COLOR environment variable
            if std::env::var("NO_COLOR").is_ok() {
                false
            } else {
                // Check if stderr supports color (where we output diagnostics)
                supports_color::on(supports_color::Stream::Stderr).is_some()
            }
        }
    };

    miette::set_hook(Box::new(move |_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .color(use_color)
                .unicode(use_color)
                .build(),
        )
    }))
    .ok(); // Ignore error if hook already set
    use_color
}

/// Install the stderr log subscriber; `RUST_LOG` overrides `-v`.
fn init_tracing(verbose: bool, use_color: bool) {
    let default_filter = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_ansi(use_color)
        .with_target(false)
        .try_init()
        .ok();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let use_color = configure_colors(cli.color);
    init_tracing(cli.verbose, use_color);

    let settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(err) => return emit_error(false, &err),
    };
    let replay = cli.replay.or(settings.replay);
    let ctx = Context {
        replay,
        verbose: cli.verbose,
    };

    match cli.command {
        Commands::Site {
            command: SiteCommands::Deploymentscript(args),
        } => cmd_deployment_script(args),
        Commands::Network {
            command: NetworkCommands::Nsg { command },
        } => match command {
            NsgCommands::Show {
                resource_group,
                name,
                json,
            } => cmd_nsg_show(&ctx, &resource_group, &name, json),
            NsgCommands::Delete {
                resource_group,
                name,
                quiet,
            } => cmd_nsg_delete(&ctx, &resource_group, &name, quiet),
        },
        Commands::Compute { command } => dispatch_compute(&ctx, command),
        Commands::Fixture { command } => match command {
            FixtureCommands::Check { fixture, json } => cmd_fixture_check(&fixture, json),
            FixtureCommands::Import { nock, output, name } => {
                cmd_fixture_import(&nock, output.as_deref(), name)
            }
        },
        Commands::Completions { shell } => cmd_completions(shell),
    }
}

fn dispatch_compute(ctx: &Context, command: ComputeCommands) -> Result<()> {
    match command {
        ComputeCommands::Vm {
            command:
                VmCommands::Show {
                    resource_group,
                    name,
                    json,
                },
        } => cmd_vm_show(ctx, &resource_group, &name, json),
        ComputeCommands::Vmss {
            command:
                VmssCommands::CreateOrUpdate {
                    resource_group,
                    name,
                    parameter_file,
                    json,
                },
        } => cmd_vmss_create_or_update(ctx, &resource_group, &name, &parameter_file, json),
    }
}

/// Global options shared by the ARM commands.
struct Context {
    replay: Option<PathBuf>,
    verbose: bool,
}

// =============================================================================
// Command Handlers
// =============================================================================

/// Handle `site deploymentscript`.
fn cmd_deployment_script(args: DeploymentScriptArgs) -> Result<()> {
    let result = deployment_script(args).map(|generated| {
        println!(
            "Generated deployment script ({})",
            generated.describe_files()
        );
    });
    finish(false, result)
}

fn deployment_script(args: DeploymentScriptArgs) -> HarnessResult<deployment::GeneratedScript> {
    let flags = ModeFlags {
        asp_wap: args.asp_wap,
        asp_web_site: args.asp_web_site,
        node: args.node,
        php: args.php,
        python: args.python,
        basic: args.basic,
    };
    let selected = flags.resolve()?;
    let script_type = ScriptType::parse(&args.script_type)?;
    let repository_root = match args.repository_root {
        Some(root) => root,
        None => std::env::current_dir()
            .map_err(|err| HarnessError::io("failed to resolve current directory", err))?,
    };
    let project = selected
        .unwrap_or_else(|| deployment::detect_project_kind(&repository_root));
    println!("Generating deployment script for {}", project.site_label());
    deployment::generate(&ScriptOptions {
        repository_root,
        project: Some(project),
        solution_file: args.solution_file,
        script_type,
        overwrite: args.quiet,
    })
}

/// Handle `network nsg show`.
fn cmd_nsg_show(ctx: &Context, resource_group: &str, name: &str, json: bool) -> Result<()> {
    let progress = ArmProgress::new(ctx.verbose);
    let result = with_client(ctx, &progress, |client| show_nsg(client, resource_group, name));
    progress.finish();
    let result = result.and_then(|nsg| match nsg {
        Some(nsg) => print_nsg(&nsg, json),
        None => {
            eprintln!(
                "warning: A network security group with name \"{name}\" not found in the resource group \"{resource_group}\""
            );
            Ok(())
        }
    });
    finish(json, result)
}

fn print_nsg(nsg: &NetworkSecurityGroup, json: bool) -> HarnessResult<()> {
    if json {
        let payload = serde_json::to_string_pretty(nsg)
            .map_err(|err| HarnessError::protocol("failed to serialize result", err))?;
        println!("{payload}");
        return Ok(());
    }
    println!("Id:                  {}", nsg.id);
    println!("Name:                {}", nsg.name);
    println!("Location:            {}", nsg.location);
    println!(
        "Provisioning state:  {}",
        nsg.properties
            .provisioning_state
            .as_deref()
            .unwrap_or_default()
    );
    if !nsg.tags.is_empty() {
        let tags: Vec<String> = nsg
            .tags
            .iter()
            .map(|(key, value)| format!("{key}={value}"))
            .collect();
        println!("Tags:                {}", tags.join(";"));
    }
    println!("Security rules:");
    for rule in nsg
        .properties
        .security_rules
        .iter()
        .chain(&nsg.properties.default_security_rules)
    {
        println!("  {}", rule.name);
    }
    Ok(())
}

/// Handle `network nsg delete`.
fn cmd_nsg_delete(ctx: &Context, resource_group: &str, name: &str, quiet: bool) -> Result<()> {
    let progress = ArmProgress::new(ctx.verbose);
    let result = with_client(ctx, &progress, |client| {
        let mut confirm = |prompt: &str| {
            if quiet {
                return Ok(true);
            }
            progress.finish();
            confirm_prompt(prompt)
        };
        delete_nsg(client, resource_group, name, &mut confirm)
    });
    progress.finish();
    if let Ok(DeleteOutcome::Declined) = result {
        eprintln!("delete cancelled");
    }
    finish(false, result.map(|_| ()))
}

/// Handle `compute vm show`.
fn cmd_vm_show(ctx: &Context, resource_group: &str, name: &str, json: bool) -> Result<()> {
    let progress = ArmProgress::new(ctx.verbose);
    let result = with_client(ctx, &progress, |client| show_vm(client, resource_group, name));
    progress.finish();
    let result = result.and_then(|details| match details {
        Some(details) => print_vm(&details, json),
        None => {
            eprintln!(
                "warning: A virtual machine with name \"{name}\" not found in the resource group \"{resource_group}\""
            );
            Ok(())
        }
    });
    finish(json, result)
}

fn print_vm(details: &VmDetails, json: bool) -> HarnessResult<()> {
    if json {
        let payload = serde_json::to_string_pretty(details)
            .map_err(|err| HarnessError::protocol("failed to serialize result", err))?;
        println!("{payload}");
        return Ok(());
    }
    let vm = &details.virtual_machine;
    println!("Id:                  {}", vm.id);
    println!("Name:                {}", vm.name);
    println!("Location:            {}", vm.location);
    println!(
        "Provisioning state:  {}",
        vm.properties.provisioning_state.as_deref().unwrap_or_default()
    );
    if let Some(hardware) = &vm.properties.hardware_profile {
        println!("Size:                {}", hardware.vm_size);
    }
    for nic in &details.network_interfaces {
        println!("Network interface:   {}", nic.name);
        for config in &nic.properties.ip_configurations {
            if let Some(private) = &config.properties.private_ip_address {
                println!("  Private IP:        {private}");
            }
        }
    }
    for ip in &details.public_ip_addresses {
        println!(
            "Public IP:           {} ({})",
            ip.properties.ip_address.as_deref().unwrap_or("unassigned"),
            ip.name
        );
        if let Some(fqdn) = ip
            .properties
            .dns_settings
            .as_ref()
            .and_then(|dns| dns.fqdn.as_deref())
        {
            println!("  FQDN:              {fqdn}");
        }
    }
    if let Some(set) = &details.availability_set {
        println!("Availability set:    {}", set.name);
    }
    Ok(())
}

/// Handle `compute vmss create-or-update`.
fn cmd_vmss_create_or_update(
    ctx: &Context,
    resource_group: &str,
    name: &str,
    parameter_file: &Path,
    json: bool,
) -> Result<()> {
    let result = std::fs::read_to_string(parameter_file)
        .map_err(|err| {
            HarnessError::io(
                format!("failed to read parameter file {}", parameter_file.display()),
                err,
            )
        })
        .and_then(|parameters| {
            let progress = ArmProgress::new(ctx.verbose);
            let result = with_client(ctx, &progress, |client| {
                create_or_update_vmss(client, resource_group, name, &parameters)
            });
            progress.finish();
            result
        })
        .and_then(|scale_set| {
            if json {
                let payload = serde_json::to_string_pretty(&scale_set)
                    .map_err(|err| HarnessError::protocol("failed to serialize result", err))?;
                println!("{payload}");
            } else {
                println!("Name:                {}", scale_set.name);
                println!("Location:            {}", scale_set.location);
                println!(
                    "Provisioning state:  {}",
                    scale_set.provisioning_state().unwrap_or_default()
                );
                if let Some(sku) = &scale_set.sku {
                    println!(
                        "Sku:                 {} (capacity {})",
                        sku.name,
                        sku.capacity.unwrap_or_default()
                    );
                }
            }
            Ok(())
        });
    finish(json, result)
}

/// Handle `fixture check`.
fn cmd_fixture_check(path: &Path, json: bool) -> Result<()> {
    let fixture = match load_fixture_file(path) {
        Ok(fixture) => fixture,
        Err(err) => return emit_error(json, &err),
    };
    let summary = summarize_fixture(&fixture);
    if json {
        let payload = serde_json::to_string(&summary).into_diagnostic()?;
        println!("{payload}");
        return Ok(());
    }
    println!(
        "fixture {}: {} group(s), {} interaction(s)",
        summary.name,
        summary.groups.len(),
        fixture.interaction_count()
    );
    if !summary.environment.is_empty() {
        println!("environment: {}", summary.environment.join(", "));
    }
    for (index, group) in summary.groups.iter().enumerate() {
        println!(
            "[{index}] {}",
            group.label.as_deref().unwrap_or("(unlabelled)")
        );
        for interaction in &group.interactions {
            println!("    {interaction}");
        }
    }
    Ok(())
}

/// Handle `fixture import --nock`.
fn cmd_fixture_import(nock: &Path, output: Option<&Path>, name: Option<String>) -> Result<()> {
    let result = std::fs::read_to_string(nock)
        .map_err(|err| HarnessError::io(format!("failed to read {}", nock.display()), err))
        .and_then(|source| {
            let name = name.unwrap_or_else(|| {
                scenario_name_from_file(
                    &nock
                        .file_name()
                        .map(|file| file.to_string_lossy().into_owned())
                        .unwrap_or_default(),
                )
            });
            import_nock(&source, &name)
        })
        .and_then(|fixture| {
            match output {
                Some(path) => {
                    write_fixture_file(path, &fixture)?;
                    eprintln!(
                        "imported {} interaction(s) in {} group(s) to {}",
                        fixture.interaction_count(),
                        fixture.groups.len(),
                        path.display()
                    );
                }
                None => {
                    let payload = serde_json::to_string_pretty(&fixture)
                        .map_err(|err| HarnessError::protocol("failed to serialize fixture", err))?;
                    println!("{payload}");
                }
            }
            Ok(())
        });
    finish(false, result)
}

/// Handle the completions command.
#[allow(clippy::unnecessary_wraps)] // Consistent with other command handlers
fn cmd_completions(shell: Shell) -> Result<()> {
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();
    generate(shell, &mut cmd, name, &mut io::stdout());
    Ok(())
}

// =============================================================================
// ARM plumbing
// =============================================================================

/// Run `body` with an ARM client over the network or the replay fixture.
///
/// The profile is read inside the replay scope so a fixture's mocked
/// profile is the one that addresses ARM.
fn with_client<T>(
    ctx: &Context,
    progress: &ArmProgress,
    body: impl FnOnce(&ArmClient<'_>) -> HarnessResult<T>,
) -> HarnessResult<T> {
    match ctx.replay.as_deref() {
        Some(path) => {
            let fixture = load_fixture_file(path)?;
            debug!(fixture = %path.display(), name = %fixture.name, "replaying fixture");
            armtape::with_replay(fixture, |transport| {
                let client = build_client(transport, true)?.with_progress(progress);
                body(&client)
            })
        }
        None => {
            let transport = NetworkTransport::default();
            let client = build_client(&transport, false)?.with_progress(progress);
            body(&client)
        }
    }
}

fn build_client(transport: &dyn Transport, replaying: bool) -> HarnessResult<ArmClient<'_>> {
    let settings = Settings::from_env()?;
    let profile_path = settings.profile_path.ok_or_else(|| {
        HarnessError::cli_invalid_arg("no profile found, set ARMTAPE_PROFILE to a profile file")
    })?;
    let profile = load_profile_file(&profile_path)?;
    let subscription = profile.default_subscription().ok_or_else(|| {
        HarnessError::cli_invalid_arg(format!(
            "profile {} has no subscriptions",
            profile_path.display()
        ))
    })?;
    let endpoint = match settings.arm_endpoint {
        Some(endpoint) => endpoint,
        None => CloudEnvironment::from_name(&subscription.environment)
            .map(|env| env.resource_manager_endpoint().to_string())
            .ok_or_else(|| {
                HarnessError::cli_invalid_arg(format!(
                    "unknown cloud environment '{}'",
                    subscription.environment
                ))
            })?,
    };
    let poll_interval = settings
        .poll_interval
        .or_else(|| replaying.then_some(Duration::ZERO));
    ArmClient::new(
        transport,
        &endpoint,
        subscription.id.clone(),
        ClientOptions {
            poll_interval,
            ..ClientOptions::default()
        },
    )
}

fn confirm_prompt(prompt: &str) -> HarnessResult<bool> {
    let mut stderr = io::stderr();
    write!(stderr, "{prompt}")
        .and_then(|()| stderr.flush())
        .map_err(|err| HarnessError::io("failed to write prompt", err))?;
    let mut answer = String::new();
    io::stdin()
        .lock()
        .read_line(&mut answer)
        .map_err(|err| HarnessError::io("failed to read confirmation", err))?;
    Ok(matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}

// =============================================================================
// Output
// =============================================================================

fn finish(json: bool, result: HarnessResult<()>) -> Result<()> {
    match result {
        Ok(()) => Ok(()),
        Err(err) => emit_error(json, &err),
    }
}

fn emit_error(json: bool, err: &HarnessError) -> Result<()> {
    if json {
        let payload = serde_json::to_string(&err.to_error_info()).into_diagnostic()?;
        println!("{payload}");
    } else {
        eprintln!("error: {}", err.message);
    }
    std::process::exit(exit_code_for_error(err));
}

fn exit_code_for_error(err: &HarnessError) -> i32 {
    err.exit_code()
}
