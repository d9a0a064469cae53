use std::io::IsTerminal;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::anyhow;
use anyhow::bail;
use anyhow::Result;
use dialoguer::theme::ColorfulTheme;
use dialoguer::Select;
use strum::IntoEnumIterator;
use tokio::io::AsyncBufReadExt;
use tokio::io::BufReader;
use tokio::sync::mpsc;
use yansi::Paint;

use crate::configuration::Config;
use crate::configuration::ConfigKey;
use crate::domain::models::help_text;
use crate::domain::models::is_malformed_command;
use crate::domain::models::upload_item_id;
use crate::domain::models::ChatItem;
use crate::domain::models::ChatRole;
use crate::domain::models::ContentCategory;
use crate::domain::models::ContentType;
use crate::domain::models::CustomSource;
use crate::domain::models::RemoteStoreBox;
use crate::domain::models::Session;
use crate::domain::models::SlashCommand;
use crate::domain::models::SourceContent;
use crate::domain::models::SourceKind;
use crate::domain::models::StoreName;
use crate::domain::models::UploadItem;
use crate::domain::models::UploadItemUpdate;
use crate::domain::services::attachments::AttachmentsContext;
use crate::domain::services::custom_sources::CustomSourcesContext;
use crate::domain::services::db::custom_sources_path;
use crate::domain::services::db::Db;
use crate::domain::services::ids;
use crate::domain::services::session_context::SessionContext;
use crate::domain::services::summary;
use crate::infrastructure::api::audiora::AudioraApi;
use crate::infrastructure::stores::StoreManager;

fn flush() {
    let _ = std::io::stdout().flush();
}

fn now() -> String {
    return chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true);
}

/// Picks the category for a new session. Only an interactive terminal is
/// prompted.
fn resolve_category() -> Result<ContentCategory> {
    let configured = Config::get(ConfigKey::Category);
    if !configured.is_empty() {
        return ContentCategory::parse(&configured)
            .ok_or_else(|| return anyhow!("Audio category was not found"));
    }

    if !std::io::stdin().is_terminal() {
        bail!("Audio category was not found");
    }

    let categories = ContentCategory::iter().collect::<Vec<ContentCategory>>();
    let options = categories
        .iter()
        .map(|e| return format!("{e} - {}", e.example_prompt()))
        .collect::<Vec<String>>();

    let idx = Select::with_theme(&ColorfulTheme::default())
        .with_prompt("What would you like to create?")
        .default(0)
        .items(&options)
        .interact_opt()?;

    match idx {
        Some(idx) => return Ok(categories[idx]),
        None => bail!("Audio category was not found"),
    }
}

async fn consume<F>(rx: &mut mpsc::UnboundedReceiver<String>, mut f: F) -> Result<()>
where
    F: FnMut(&str) -> Result<()>,
{
    while let Some(chunk) = rx.recv().await {
        f(&chunk)?;
    }

    return Ok(());
}

fn link_source(session_id: &str, url: &str, content: SourceContent) -> CustomSource {
    let content_type = serde_json::from_value::<ContentType>(serde_json::Value::String(
        content.content_type.to_string(),
    ))
    .unwrap_or(ContentType::TextHtml);

    return CustomSource {
        id: content.id,
        kind: SourceKind::Link {
            url: url.to_string(),
        },
        content_type,
        content: content.content,
        title: content.title,
        created_at: Some(now()),
        session_id: Some(session_id.to_string()),
    };
}

pub struct ChatApp {
    api: Arc<AudioraApi>,
    store: RemoteStoreBox,
    context: SessionContext,
    sources: CustomSourcesContext,
    attachments: AttachmentsContext,
    _db: Db,
}

impl ChatApp {
    pub fn new(
        api: AudioraApi,
        store: RemoteStoreBox,
        context: SessionContext,
        sources: CustomSourcesContext,
        attachments: AttachmentsContext,
        db: Db,
    ) -> ChatApp {
        return ChatApp {
            api: Arc::new(api),
            store,
            context,
            sources,
            attachments,
            _db: db,
        };
    }

    fn session(&self) -> Result<Session> {
        return self
            .context
            .session()
            .ok_or_else(|| return anyhow!("No session has been started"));
    }

    fn print_transcript(&self, session: &Session) {
        println!(
            "{}",
            Paint::new(format!("{} ({})", session.title, session.category)).bold()
        );
        for item in &session.chats {
            match item.role {
                ChatRole::User => println!("{} {}", Paint::cyan("you>"), item.content),
                ChatRole::Assistant => println!("{} {}", Paint::magenta("audiora>"), item.content),
            }
        }
    }

    async fn send_message(&self, text: &str) -> Result<()> {
        let session = self.session()?;
        let user = self
            .context
            .add_chat_item(ChatItem::new(&ids::uuid(), ChatRole::User, text))?;
        let reply = self.context.add_chat_item(ChatItem::pending(&ids::uuid()))?;

        let (tx, mut rx) = mpsc::unbounded_channel::<String>();
        let api = self.api.clone();
        let session_id = session.id.to_string();
        let request = async move {
            return api.chat(&session_id, session.category, &user, &tx).await;
        };

        print!("{} ", Paint::magenta("audiora>"));
        flush();
        let streamed = consume(&mut rx, |chunk| {
            print!("{chunk}");
            flush();
            return self.context.update_chat_content(&reply.id, chunk);
        });

        let (res, streamed) = tokio::join!(request, streamed);
        println!();
        if let Err(err) = res {
            self.context.remove_chat_item(&reply.id)?;
            return Err(err);
        }
        streamed?;

        let session = self.session()?;
        let Some(reply) = session.chat(&reply.id) else {
            return Ok(());
        };

        if summary::is_final_response(reply) {
            let summary = summary::get_summary(&reply.content);
            self.context.set_summary(&summary)?;
            self.context.set_completed(true)?;
            self.stream_title(&session, &summary).await?;
            println!(
                "{}",
                Paint::green("Your audiocast is ready to generate. Run /generate to start.")
            );
        }

        return Ok(());
    }

    async fn stream_title(&self, session: &Session, summary: &str) -> Result<()> {
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();
        let api = self.api.clone();
        let session_id = session.id.to_string();
        let category = session.category;
        let summary = summary.to_string();
        let request = async move {
            return api.session_title(&session_id, category, &summary, &tx).await;
        };

        let streamed = consume(&mut rx, |chunk| {
            return self.context.update_session_title(chunk);
        });

        let (res, streamed) = tokio::join!(request, streamed);
        res?;
        streamed?;

        if let Some(session) = self.context.session() {
            println!("{} {}", Paint::new("Title:").bold(), session.title);
        }

        return Ok(());
    }

    async fn paste(&self, text: &str) -> Result<()> {
        let session_id = self.context.session_id().to_string();
        let mut source = CustomSource::copy_paste(&ids::uuid(), text);
        source.session_id = Some(session_id.to_string());
        source.created_at = Some(now());

        self.sources.add_source(source.clone());
        self.store
            .add_document(&custom_sources_path(&session_id), serde_json::to_value(&source)?)
            .await?;

        println!("{}", Paint::green("Source attached."));
        return Ok(());
    }

    async fn link(&self, url: &str) -> Result<()> {
        let session_id = self.context.session_id().to_string();
        self.context.fetching_source().set(true);
        let res = self.api.generate_url_source(&session_id, url).await;
        self.context.fetching_source().set(false);

        let source = link_source(&session_id, url, res?);
        let title = source.title.clone().unwrap_or_else(|| return url.to_string());
        self.sources.add_source(source);

        println!("{} {title}", Paint::green("Source attached:"));
        return Ok(());
    }

    async fn upload(&self, path: &str) -> Result<()> {
        let path = PathBuf::from(path);
        if !path.is_file() {
            bail!("{} is not a file", path.display());
        }

        let session_id = self.context.session_id().to_string();
        let item = UploadItem::new(&upload_item_id(&session_id, &ids::uuid()), &path);
        self.attachments.add_upload_item(item.clone());
        println!("Uploading {}...", item.file_name());

        let res = self.upload_file(&session_id, &item).await;
        let update = match &res {
            Ok(url) => UploadItemUpdate::default().loading(false).url(url),
            Err(_) => UploadItemUpdate::default().loading(false).errored(true),
        };
        self.attachments.update_upload_item(&item.id, &update);

        let url = res?;
        println!("{} {} ({url})", Paint::green("Source uploaded:"), item.file_name());
        return Ok(());
    }

    async fn upload_file(&self, session_id: &str, item: &UploadItem) -> Result<String> {
        let filename = format!("{}_{}", item.id, item.file_name());
        let url = self
            .api
            .store_file_upload(&item.path, &filename, true)
            .await?;
        self.api
            .save_uploaded_sources(session_id, &[item.path.as_path()])
            .await?;

        return Ok(url);
    }

    fn print_sources(&self) {
        match self.sources.sources() {
            None => println!("Sources are still loading."),
            Some(sources) if sources.is_empty() => {
                println!("No sources attached yet. Use /paste, /link or /upload to add one.");
            }
            Some(sources) => {
                for source in sources {
                    let label = source
                        .title
                        .clone()
                        .or_else(|| return source.url().map(|e| return e.to_string()))
                        .unwrap_or_else(|| {
                            return source.content.chars().take(60).collect::<String>();
                        });
                    println!("- ({}) {label}", source.id);
                }
            }
        }

        for item in self.attachments.session_items().get() {
            let status = match (item.loading, item.errored) {
                (true, _) => Paint::yellow("uploading"),
                (false, true) => Paint::red("failed"),
                (false, false) => Paint::green("uploaded"),
            };
            println!("- {} [{status}]", item.file_name());
        }
    }

    async fn generate(&self) -> Result<()> {
        let session = self.session()?;
        let summary = match (&session.summary, self.context.session_completed().get()) {
            (Some(summary), true) => summary.to_string(),
            _ => {
                println!("Keep chatting until the assistant has summarized your audiocast.");
                return Ok(());
            }
        };

        println!("Generating your audiocast, this can take a few minutes...");
        let audio_source = self
            .api
            .generate_audiocast(&session.id, session.category, &summary)
            .await?;
        self.context.audio_source().set(audio_source)?;

        println!(
            "{}{}",
            summary::share_title(&session.title),
            summary::shareable_link(self.api.url(), &session.id)
        );
        return Ok(());
    }

    pub async fn start(&self) -> Result<()> {
        let session = match self.context.session() {
            Some(session) => session,
            None => {
                let category = resolve_category()?;
                let session = self.context.start_session(category)?;
                println!("{}", Paint::new(format!("Starting a new {category}.")).bold());
                println!("For example: {}", category.example_prompt());
                session
            }
        };

        self.print_transcript(&session);
        println!("Session ID: {}. Type /help for commands.", session.id);

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            print!("{} ", Paint::cyan("you>"));
            flush();

            let Some(line) = lines.next_line().await? else {
                break;
            };
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let res = match SlashCommand::parse(line) {
                Some(cmd) if cmd.is_quit() => break,
                Some(cmd) if cmd.is_help() => {
                    println!("{}", help_text());
                    Ok(())
                }
                Some(cmd) if cmd.is_paste() => self.paste(&cmd.text).await,
                Some(cmd) if cmd.is_link() => self.link(&cmd.text).await,
                Some(cmd) if cmd.is_upload() => self.upload(&cmd.text).await,
                Some(cmd) if cmd.is_sources() => {
                    self.print_sources();
                    Ok(())
                }
                Some(cmd) if cmd.is_generate() => self.generate().await,
                Some(_) => Ok(()),
                None if is_malformed_command(line) => {
                    println!("{}", Paint::yellow(format!("Unknown command: {line}")));
                    println!("{}", help_text());
                    Ok(())
                }
                None => self.send_message(line).await,
            };

            if let Err(err) = res {
                tracing::error!(err = ?err, "Chat action failed");
                eprintln!("{}", Paint::red(format!("Error: {err}")));
            }
        }

        return Ok(());
    }
}

/// Wires up stores, contexts and the API client from config, then runs the
/// chat loop until the user quits.
pub async fn start() -> Result<()> {
    let store_name = StoreName::parse(Config::get(ConfigKey::Store))
        .ok_or_else(|| return anyhow!("Store {} is not supported", Config::get(ConfigKey::Store)))?;
    let store = StoreManager::get(store_name.clone())?;
    let storage = StoreManager::key_value(store_name)?;

    let api = AudioraApi::default();
    api.health_check().await?;

    let mut session_id = Config::get(ConfigKey::SessionID);
    if session_id.is_empty() {
        session_id = ids::uuid();
    }

    let db = Db::new(store.clone());
    let context = SessionContext::new(&session_id, storage, &db);
    let sources = CustomSourcesContext::new(&session_id, &db);
    let attachments = AttachmentsContext::new(&session_id);

    let app = ChatApp::new(api, store, context, sources, attachments, db);
    return app.start().await;
}
