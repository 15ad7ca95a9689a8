/*!
 * zkctl CLI - Command Line Interface
 *
 * Thin commands over a ZooKeeper ensemble: each invocation opens a session,
 * runs one command and closes the session.
 */

use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use std::io::{IsTerminal, Read};
use std::path::PathBuf;
use tracing::debug;
use zkctl::{
    acl,
    config::{split_servers, ClientConfig, LogLevel, OutputFormat},
    error::{Result, ZkError, EXIT_SUCCESS},
    logging,
    output::OutputWriter,
    Acl, Commander, Connector, CreateMode,
};

#[derive(Parser)]
#[command(name = "zkctl")]
#[command(version, about = "Simple command line access to ZooKeeper", long_about = None)]
struct Cli {
    /// Comma separated servers, each host or host:port
    #[arg(long, value_name = "HOSTS", global = true)]
    servers: Option<String>,

    /// Configuration file (TOML)
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(long, value_enum, global = true)]
    format: Option<FormatArg>,

    /// Omit trailing newline in text output
    #[arg(long, global = true)]
    omit_newline: bool,

    /// Create missing parents (create, setacl)
    #[arg(long, global = true)]
    force: bool,

    /// Digest auth user
    #[arg(long, value_name = "USER", global = true, requires = "auth_pwd")]
    auth_user: Option<String>,

    /// Digest auth password
    #[arg(long, value_name = "PASSWORD", global = true, requires = "auth_user")]
    auth_pwd: Option<String>,

    /// ACL for created nodes: a spec (world:anyone:cdrwa,...) or, with
    /// --auth-user, numeric digest permissions (31 or 1,31)
    #[arg(long, value_name = "ACLS", global = true)]
    acls: Option<String>,

    /// Log level
    #[arg(long, value_enum, global = true)]
    log_level: Option<LogLevelArg>,

    /// Log file (JSON lines)
    #[arg(long, value_name = "FILE", global = true)]
    log: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print whether a path exists
    Exists { path: String },

    /// Print the value of a path
    Get { path: String },

    /// List the children of a path
    Ls { path: String },

    /// List all descendants of a path, relative to it
    Lsr { path: String },

    /// Create a path (value from the argument or stdin)
    Create {
        path: String,
        data: Option<String>,
        /// Append a monotonically increasing counter to the name
        #[arg(long)]
        sequential: bool,
    },

    /// Create a path, creating missing parents
    Creater {
        path: String,
        data: Option<String>,
        /// Append a monotonically increasing counter to the name
        #[arg(long)]
        sequential: bool,
    },

    /// Set the value of a path (value from the argument or stdin)
    Set { path: String, data: Option<String> },

    /// Delete a path that has no children
    #[command(alias = "rm")]
    Delete { path: String },

    /// Delete a path and everything below it
    Rmr { path: String },

    /// Print the ACL of a path
    Getacl { path: String },

    /// Set the ACL of a path (scheme:id:perms[,...])
    Setacl { path: String, acl: String },

    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum FormatArg {
    Txt,
    Json,
}

impl From<FormatArg> for OutputFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Txt => OutputFormat::Txt,
            FormatArg::Json => OutputFormat::Json,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevelArg {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevelArg> for LogLevel {
    fn from(arg: LogLevelArg) -> Self {
        match arg {
            LogLevelArg::Error => LogLevel::Error,
            LogLevelArg::Warn => LogLevel::Warn,
            LogLevelArg::Info => LogLevel::Info,
            LogLevelArg::Debug => LogLevel::Debug,
            LogLevelArg::Trace => LogLevel::Trace,
        }
    }
}

fn main() {
    let code = match run() {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            e.exit_code()
        }
    };
    std::process::exit(code);
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    if let Commands::Completions { shell } = cli.command {
        clap_complete::generate(shell, &mut Cli::command(), "zkctl", &mut std::io::stdout());
        return Ok(());
    }

    let config = build_config(&cli)?;

    if let Err(e) = logging::init_logging(&config) {
        eprintln!("Warning: Failed to initialize logging: {}", e);
    }

    let out = OutputWriter::new(config.format, config.omit_newline);
    let commander = Commander::new(connector(&config)?).with_default_acl(config.default_acl()?);

    let runtime = tokio::runtime::Runtime::new()
        .map_err(|e| ZkError::Other(format!("Failed to start async runtime: {}", e)))?;

    runtime.block_on(dispatch(&commander, &cli, &out))
}

/// Config file, then environment, then flags.
fn build_config(cli: &Cli) -> Result<ClientConfig> {
    let mut config = ClientConfig::load(cli.config.as_deref())?;

    if let Some(ref servers) = cli.servers {
        config.servers = split_servers(servers);
    }
    if let Some(format) = cli.format {
        config.format = format.into();
    }
    if cli.omit_newline {
        config.omit_newline = true;
    }
    if let (Some(user), Some(pwd)) = (&cli.auth_user, &cli.auth_pwd) {
        config.auth_scheme = Some("digest".to_string());
        config.auth_credential = Some(format!("{}:{}", user, pwd));
    }
    if let Some(level) = cli.log_level {
        config.log_level = level.into();
    }
    if cli.log.is_some() {
        config.log_file = cli.log.clone();
    }
    config.verbose |= cli.verbose;

    Ok(config)
}

#[cfg(feature = "zookeeper-native")]
fn connector(config: &ClientConfig) -> Result<zkctl::ZkConnector> {
    zkctl::ZkConnector::from_config(config)
}

#[cfg(not(feature = "zookeeper-native"))]
fn connector(_config: &ClientConfig) -> Result<zkctl::store::MemoryConnector> {
    Err(ZkError::Config(
        "zkctl was built without the zookeeper-native feature".to_string(),
    ))
}

/// ACL for create: digest entries when credentials and numeric permissions
/// are given, a parsed spec otherwise, `None` for the configured default.
fn create_acl(cli: &Cli) -> Result<Option<Vec<Acl>>> {
    match (&cli.auth_user, &cli.auth_pwd, cli.acls.as_deref()) {
        (Some(user), Some(pwd), acls) if !acls.unwrap_or("").contains(':') => {
            let perms = acls.filter(|a| !a.is_empty()).unwrap_or("31");
            Ok(Some(acl::build_digest_acl(user, pwd, perms)?))
        }
        (_, _, Some(spec)) if !spec.is_empty() => Ok(Some(acl::parse_acl_spec(spec)?)),
        _ => Ok(None),
    }
}

/// Value from the argument, else from piped stdin, else empty.
fn read_value(data: &Option<String>) -> Result<Vec<u8>> {
    if let Some(data) = data {
        return Ok(data.clone().into_bytes());
    }
    let stdin = std::io::stdin();
    if stdin.is_terminal() {
        return Ok(Vec::new());
    }
    let mut buffer = Vec::new();
    stdin.lock().read_to_end(&mut buffer)?;
    Ok(buffer)
}

async fn dispatch<C: Connector>(
    commander: &Commander<C>,
    cli: &Cli,
    out: &OutputWriter,
) -> Result<()> {
    match &cli.command {
        Commands::Exists { path } => {
            let exists = commander.exists(path).await?;
            out.emit(&out.render_bool(exists))
        }
        Commands::Get { path } => {
            let data = commander.get(path).await?;
            out.emit(&out.render_data(&data)?)
        }
        Commands::Ls { path } => {
            let children = commander.children(path).await?;
            out.emit(&out.render_list(&children)?)
        }
        Commands::Lsr { path } => {
            let children = commander.children_recursive(path).await?;
            out.emit(&out.render_list(&children)?)
        }
        Commands::Create {
            path,
            data,
            sequential,
        } => create(commander, cli, out, path, data, *sequential, cli.force).await,
        Commands::Creater {
            path,
            data,
            sequential,
        } => create(commander, cli, out, path, data, *sequential, true).await,
        Commands::Set { path, data } => {
            let value = read_value(data)?;
            let stat = commander.set(path, &value).await?;
            debug!(path = %path, version = stat.version, "Set");
            Ok(())
        }
        Commands::Delete { path } => commander.delete(path).await,
        Commands::Rmr { path } => commander.delete_recursive(path).await,
        Commands::Getacl { path } => {
            let acls = commander.get_acl(path).await?;
            out.emit(&out.render_list(&acls)?)
        }
        Commands::Setacl { path, acl } => {
            let result = commander.set_acl(path, acl, cli.force).await?;
            debug!(path = %result, "ACL set");
            Ok(())
        }
        Commands::Completions { .. } => Ok(()),
    }
}

async fn create<C: Connector>(
    commander: &Commander<C>,
    cli: &Cli,
    out: &OutputWriter,
    path: &str,
    data: &Option<String>,
    sequential: bool,
    force: bool,
) -> Result<()> {
    let value = read_value(data)?;
    let mode = if sequential {
        CreateMode::PersistentSequential
    } else {
        CreateMode::Persistent
    };

    let created = match create_acl(cli)? {
        Some(acl) => commander.create_with_acl(path, &value, force, &acl, mode).await?,
        None => commander.create(path, &value, "", force, mode).await?,
    };
    out.emit(&out.render_path(&created)?)
}
