//! jiralink - diagnostic command line for the JIRA Server / Data Center client.

use std::io::{self, Read};
use std::process::ExitCode;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};

use jiralink::api::capabilities::MarkupDialect;
use jiralink::api::{create_client, SearchFilter, SearchQuery, TicketClient};
use jiralink::config::{ClientConfig, Config};
use jiralink::convert;
use jiralink::error::AppError;
use jiralink::logging;
use jiralink::secrets::{KeyringStore, SecretStore};

/// Adaptive JIRA Server / Data Center client
#[derive(Parser)]
#[command(name = "jiralink")]
#[command(version)]
struct Cli {
    /// Profile to use (defaults to the configured default profile)
    #[arg(short, long, global = true)]
    profile: Option<String>,

    /// Log at debug level unless RUST_LOG is set
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show server version, capabilities and the negotiated auth method
    Info,
    /// Search issues with JQL or a structured filter
    Search(SearchArgs),
    /// Show a single issue
    Show {
        /// Issue key, e.g. PROJ-123
        key: String,
    },
    /// Convert inline markup on stdin to JIRA wiki markup
    ToWiki,
    /// Convert JIRA wiki markup on stdin to inline markup
    FromWiki,
    /// Store the password or personal access token (read from stdin)
    SetToken,
    /// Remove the stored password or personal access token
    ForgetToken,
}

#[derive(Args)]
struct SearchArgs {
    /// Raw JQL; filter flags are ignored when given
    jql: Option<String>,

    #[arg(long = "project")]
    projects: Vec<String>,

    #[arg(long = "status")]
    statuses: Vec<String>,

    /// Login name, `currentUser()` or `unassigned`
    #[arg(long = "assignee")]
    assignees: Vec<String>,

    #[arg(long = "label")]
    labels: Vec<String>,

    #[arg(long = "type")]
    issue_types: Vec<String>,

    #[arg(long, default_value_t = 0)]
    start_at: u32,

    #[arg(long, default_value_t = 50)]
    max_results: u32,
}

impl SearchArgs {
    fn query(self) -> SearchQuery {
        match self.jql {
            Some(jql) => SearchQuery::Jql(jql),
            None => SearchQuery::Filter(SearchFilter {
                project_keys: self.projects,
                issue_types: self.issue_types,
                statuses: self.statuses,
                assignees: self.assignees,
                labels: self.labels,
            }),
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = logging::init(cli.verbose) {
        eprintln!("Warning: logging disabled: {}", e);
    }

    let result = run(cli).await;
    logging::shutdown();

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            match e.downcast_ref::<AppError>() {
                Some(app) => {
                    eprintln!("Error: {}", app.user_message());
                    if let Some(action) = app.suggested_action() {
                        eprintln!("{}", action);
                    }
                }
                None => eprintln!("Error: {:#}", e),
            }
            tracing::error!("Command failed: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::ToWiki => {
            let input = read_stdin()?;
            print!("{}", convert::try_markup_to_wiki(&input).map_err(AppError::from)?);
            Ok(())
        }
        Command::FromWiki => {
            let input = read_stdin()?;
            print!("{}", convert::try_wiki_to_markup(&input).map_err(AppError::from)?);
            Ok(())
        }
        Command::SetToken => {
            let config = load_client_config(cli.profile.as_deref())?;
            let secret = read_stdin()?;
            let secret = secret.trim();
            if secret.is_empty() {
                anyhow::bail!("no secret given on stdin");
            }
            KeyringStore::default()
                .store(&config.name, secret)
                .map_err(AppError::from)?;
            println!("Stored credentials for profile '{}'", config.name);
            Ok(())
        }
        Command::ForgetToken => {
            let config = load_client_config(cli.profile.as_deref())?;
            KeyringStore::default()
                .delete(&config.name)
                .map_err(AppError::from)?;
            println!("Removed credentials for profile '{}'", config.name);
            Ok(())
        }
        Command::Info => {
            let client = connect(cli.profile.as_deref())?;
            client.initialize().await.map_err(AppError::from)?;
            print_info(client.as_ref());
            Ok(())
        }
        Command::Search(args) => {
            let client = connect(cli.profile.as_deref())?;
            let (start_at, max_results) = (args.start_at, args.max_results);
            let results = client.search(&args.query(), start_at, max_results).await;
            for issue in &results.issues {
                println!("{}", issue);
            }
            println!(
                "-- {} of {} (from {})",
                results.issues.len(),
                results.total,
                results.start_at
            );
            Ok(())
        }
        Command::Show { key } => {
            let client = connect(cli.profile.as_deref())?;
            let issue = client
                .get_issue(&key)
                .await
                .with_context(|| format!("issue {} not found or not readable", key))?;
            println!("{}", issue);
            println!("Type: {}  Status: {}", issue.issue_type, issue.status.name);
            println!("Assignee: {}", issue.assignee_name());
            if let Some(points) = issue.story_points {
                println!("Story points: {}", points);
            }
            if let Some(sprint) = &issue.sprint {
                println!("Sprint: {}", sprint);
            }
            for link in &issue.links {
                println!("{} {}", link.relationship(), link.other_key);
            }
            println!("{}", issue.url);
            if let Some(description) = &issue.description {
                println!("\n{}", description);
            }
            Ok(())
        }
    }
}

fn load_client_config(profile: Option<&str>) -> anyhow::Result<ClientConfig> {
    let config = Config::load().map_err(AppError::from)?;
    let selected = config.profile(profile).map_err(AppError::from)?;
    let client_config =
        ClientConfig::from_provider(selected, config.settings.clone()).map_err(AppError::from)?;
    Ok(client_config)
}

fn connect(profile: Option<&str>) -> anyhow::Result<Box<dyn TicketClient>> {
    let config = load_client_config(profile)?;
    Ok(create_client(config, &KeyringStore::default())?)
}

fn read_stdin() -> anyhow::Result<String> {
    let mut input = String::new();
    io::stdin()
        .read_to_string(&mut input)
        .context("failed to read stdin")?;
    Ok(input)
}

fn print_info(client: &dyn TicketClient) {
    if let Some(info) = client.server_info() {
        println!("Server:      {} ({})", info.version, info.deployment_type);
        println!("Build:       {}", info.build_number);
        println!("Base URL:    {}", info.base_url);
    }
    if let Some(warning) = client.detection_warning() {
        println!("Warning:     {}", warning);
    }
    println!("Auth method: {}", client.auth_method());
    if let Some(caps) = client.capabilities() {
        let markup = match caps.markup {
            MarkupDialect::Wiki => "wiki",
            MarkupDialect::RichTextTree => "rich text",
        };
        println!("Markup:      {}", markup);
        println!("REST API:    {}", caps.api_version.path_prefix());
        for (name, enabled) in [
            ("personal access tokens", caps.personal_access_tokens),
            ("rich text", caps.rich_text),
            ("bulk operations", caps.bulk_operations),
            ("agile API", caps.agile_api),
            ("sprints", caps.sprints),
            ("custom field schema", caps.custom_field_schema),
            ("workflow properties", caps.workflow_properties),
        ] {
            println!("  {:<24} {}", name, if enabled { "yes" } else { "no" });
        }
    }
}
