#[cfg(test)]
#[path = "cli_test.rs"]
mod tests;

use std::io;
use std::path;

use anyhow::bail;
use anyhow::Result;
use chrono::TimeZone;
use chrono::Utc;
use clap::builder::PossibleValuesParser;
use clap::value_parser;
use clap::Arg;
use clap::ArgAction;
use clap::ArgMatches;
use clap::Command;
use clap_complete::generate;
use clap_complete::Generator;
use clap_complete::Shell;
use strum::VariantNames;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use yansi::Paint;

use crate::configuration::Config;
use crate::configuration::ConfigKey;
use crate::domain::models::help_text;
use crate::domain::models::ContentCategory;
use crate::domain::models::Session;
use crate::domain::models::SessionModel;
use crate::domain::models::StoreName;
use crate::domain::services::db::Db;
use crate::domain::services::session_context::list_sessions;
use crate::domain::services::summary;
use crate::infrastructure::stores::StoreManager;

fn print_completions<G: Generator>(gen: G, cmd: &mut Command) {
    generate(gen, cmd, cmd.get_name().to_string(), &mut io::stdout());
    std::process::exit(0);
}

fn format_session(session: &Session) -> String {
    let created = Utc
        .timestamp_millis_opt(session.nonce)
        .single()
        .map(|e| return e.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_default();

    let mut res = format!(
        "- (ID: {}) {created}, Category: {}, {}",
        session.id, session.category, session.title
    );

    if session.completed {
        res = format!("{res} [completed]");
    }

    if let Some(item) = session.chats.first() {
        let mut line = item.content.split('\n').next().unwrap_or_default().to_string();
        if line.chars().count() >= 70 {
            line = format!("{}...", line.chars().take(67).collect::<String>());
        }
        res = format!("{res}, {line}");
    }

    return res;
}

fn format_audiocast(model: &SessionModel, origin: &str) -> String {
    let title = model.title().unwrap_or("Untitled");
    let mut lines = vec![
        format!("{title} ({})", model.category),
        format!("Completed: {}", model.is_completed()),
        format!("Messages: {}", model.chats.len()),
    ];

    if let Some(created_at) = &model.created_at {
        lines.push(format!("Created: {created_at}"));
    }

    if let Some(info) = model.metadata.as_ref().and_then(|e| return e.info.as_ref()) {
        lines.push(format!("Info: {info}"));
    }

    lines.push(format!(
        "{}{}",
        summary::share_title(title),
        summary::shareable_link(origin, &model.id)
    ));

    return lines.join("\n");
}

fn store_name() -> Result<StoreName> {
    let name = Config::get(ConfigKey::Store);
    match StoreName::parse(name.to_string()) {
        Some(store) => return Ok(store),
        None => bail!(format!("Store {name} is not supported")),
    }
}

fn print_sessions_list() -> Result<()> {
    let storage = StoreManager::key_value(store_name()?)?;
    let sessions = list_sessions(&storage)?
        .iter()
        .map(|session| {
            return format_session(session);
        })
        .collect::<Vec<String>>();

    if sessions.is_empty() {
        println!("There are no sessions available. You should start your first one!");
    } else {
        println!("{}", sessions.join("\n"));
    }

    return Ok(());
}

async fn print_audiocast(session_id: &str) -> Result<()> {
    let store = StoreManager::get(store_name()?)?;
    let db = Db::new(store);

    match db.session(session_id).first().await {
        Some(Some(Some(model))) => {
            println!("{}", format_audiocast(&model, &Config::get(ConfigKey::ApiURL)));
            return Ok(());
        }
        _ => bail!("Session not found"),
    }
}

async fn create_config_file() -> Result<()> {
    let config_file_path_str = Config::default(ConfigKey::ConfigFile);
    let config_file_path = path::PathBuf::from(&config_file_path_str);
    if config_file_path.exists() {
        bail!(format!(
            "Config file already exists at {config_file_path_str}"
        ));
    }

    if let Some(parent) = config_file_path.parent() {
        if !parent.exists() {
            fs::create_dir_all(parent).await?;
        }
    }

    let mut file = fs::File::create(&config_file_path).await?;
    file.write_all(Config::serialize_default(build()).as_bytes())
        .await?;

    println!("Created default config file at {config_file_path_str}");
    return Ok(());
}

fn subcommand_completions() -> Command {
    return Command::new("completions")
        .about("Generates shell completions.")
        .arg(
            clap::Arg::new("shell")
                .short('s')
                .long("shell")
                .help("Which shell to generate completions for.")
                .action(ArgAction::Set)
                .value_parser(value_parser!(Shell))
                .required(true),
        );
}

fn subcommand_config() -> Command {
    return Command::new("config")
        .about("Configuration file options.")
        .subcommand(
            Command::new("create").about("Saves the default config file to the configuration file path. This command will fail if the file exists already.")
        )
        .subcommand(
            Command::new("default").about("Outputs the default configuration file to stdout.")
        )
        .subcommand(
            Command::new("path").about("Returns the default path for the configuration file.")
        );
}

fn subcommand_audiocast() -> Command {
    return Command::new("audiocast")
        .about("Show the server's copy of a session and its share link.")
        .arg(
            Arg::new("id")
                .help("Session ID")
                .required(true),
        );
}

fn arg_category() -> Arg {
    return Arg::new(ConfigKey::Category.to_string())
        .long(ConfigKey::Category.to_string())
        .env("AUDIORA_CATEGORY")
        .num_args(1)
        .help("The kind of audio to create when starting a new session. Prompts for one if not set.")
        .value_parser(PossibleValuesParser::new(ContentCategory::VARIANTS));
}

fn arg_session_id() -> Arg {
    return Arg::new(ConfigKey::SessionID.to_string())
        .short('i')
        .long(ConfigKey::SessionID.to_string())
        .env("AUDIORA_SESSION_ID")
        .num_args(1)
        .help("Resume a previous session by ID. A new session is started if not set.");
}

fn subcommand_chat() -> Command {
    return Command::new("chat")
        .about("Start or resume a chat session.")
        .arg(arg_category())
        .arg(arg_session_id());
}

pub fn build() -> Command {
    let commands_text = help_text()
        .split('\n')
        .map(|line| {
            if line.starts_with('-') {
                return format!("  {line}");
            }
            if line.starts_with("COMMANDS:") {
                return Paint::new(format!("CHAT {line}"))
                    .underline()
                    .bold()
                    .to_string();
            }
            return line.to_string();
        })
        .collect::<Vec<String>>()
        .join("\n");

    let about = format!(
        "{}\n\nVersion: {}",
        env!("CARGO_PKG_DESCRIPTION"),
        env!("CARGO_PKG_VERSION"),
    );

    return Command::new("audiora")
        .about(about)
        .author(env!("CARGO_PKG_AUTHORS"))
        .version(env!("CARGO_PKG_VERSION"))
        .after_help(commands_text)
        .arg_required_else_help(false)
        .subcommand(subcommand_audiocast())
        .subcommand(subcommand_chat())
        .subcommand(subcommand_completions())
        .subcommand(subcommand_config())
        .subcommand(Command::new("sessions").about("List all previous sessions, newest first."))
        .arg(arg_category())
        .arg(arg_session_id())
        .arg(
            Arg::new(ConfigKey::ConfigFile.to_string())
                .short('c')
                .long(ConfigKey::ConfigFile.to_string())
                .env("AUDIORA_CONFIG_FILE")
                .num_args(1)
                .help(format!("Path to configuration file [default: {}]", Config::default(ConfigKey::ConfigFile)))
                .global(true)
        )
        .arg(
            Arg::new(ConfigKey::ApiURL.to_string())
                .long(ConfigKey::ApiURL.to_string())
                .env("AUDIORA_API_URL")
                .num_args(1)
                .help(format!("Audiora API URL. [default: {}]", Config::default(ConfigKey::ApiURL)))
                .global(true),
        )
        .arg(
            Arg::new(ConfigKey::Store.to_string())
                .long(ConfigKey::Store.to_string())
                .env("AUDIORA_STORE")
                .num_args(1)
                .help(format!("Where sessions and sources are synchronized from. [default: {}]", Config::default(ConfigKey::Store)))
                .value_parser(PossibleValuesParser::new(StoreName::VARIANTS))
                .global(true),
        )
        .arg(
            Arg::new(ConfigKey::StorageDir.to_string())
                .long(ConfigKey::StorageDir.to_string())
                .env("AUDIORA_STORAGE_DIR")
                .num_args(1)
                .help(format!("Directory local sessions are persisted to. [default: {}]", Config::default(ConfigKey::StorageDir)))
                .global(true),
        )
        .arg(
            Arg::new(ConfigKey::PollInterval.to_string())
                .long(ConfigKey::PollInterval.to_string())
                .env("AUDIORA_POLL_INTERVAL")
                .num_args(1)
                .help(format!("Time in milliseconds between refreshes of remote sessions and sources. [default: {}]", Config::default(ConfigKey::PollInterval)))
                .global(true),
        );
}

async fn load_config(matches: &ArgMatches, subcmd_matches: Option<&ArgMatches>) -> Result<()> {
    let mut all_matches = vec![matches];
    if let Some(subcmd_matches) = subcmd_matches {
        all_matches.push(subcmd_matches);
    }

    return Config::load(build(), all_matches).await;
}

/// Handles one-shot subcommands. Returns true when the chat should start.
pub async fn parse() -> Result<bool> {
    let matches = build().get_matches();

    match matches.subcommand() {
        Some(("audiocast", subcmd_matches)) => {
            load_config(&matches, Some(subcmd_matches)).await?;
            let Some(session_id) = subcmd_matches.get_one::<String>("id") else {
                bail!("Session not found");
            };
            print_audiocast(session_id).await?;
            return Ok(false);
        }
        Some(("chat", subcmd_matches)) => {
            load_config(&matches, Some(subcmd_matches)).await?;
        }
        Some(("completions", subcmd_matches)) => {
            if let Some(completions) = subcmd_matches.get_one::<Shell>("shell").copied() {
                let mut app = build();
                print_completions(completions, &mut app);
            }
            return Ok(false);
        }
        Some(("config", subcmd_matches)) => match subcmd_matches.subcommand() {
            Some(("create", _)) => {
                create_config_file().await?;
                return Ok(false);
            }
            Some(("default", _)) => {
                println!("{}", Config::serialize_default(build()));
                return Ok(false);
            }
            Some(("path", _)) => {
                println!("{}", Config::default(ConfigKey::ConfigFile));
                return Ok(false);
            }
            _ => {
                subcommand_config().print_long_help()?;
                return Ok(false);
            }
        },
        Some(("sessions", subcmd_matches)) => {
            load_config(&matches, Some(subcmd_matches)).await?;
            print_sessions_list()?;
            return Ok(false);
        }
        _ => {
            load_config(&matches, None).await?;
        }
    }

    return Ok(true);
}
