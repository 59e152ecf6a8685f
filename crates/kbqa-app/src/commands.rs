//! Subcommand handlers.

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

use kbqa_client::documents::{self, DocumentWatch};
use kbqa_client::{
    ChatWorkspace, ClientError, HttpConfig, HttpKbClient, KbApi, ReconcileEvent, SessionOutcome,
};
use kbqa_common::{Document, Event, KbqaError, Message, Notification, Role, Source};
use kbqa_config::KbqaConfig;

use crate::cli::Command;

pub async fn run(command: Command, config: &KbqaConfig) -> kbqa_common::Result<()> {
    if command == Command::Config {
        println!("{}", kbqa_config::config_to_json(config));
        return Ok(());
    }

    let api = build_client(config)?;
    let workspace = ChatWorkspace::new(Arc::clone(&api), config.notifications.capacity as usize);

    let result = match command {
        Command::Kbs => list_knowledge_bases(api.as_ref()).await,
        Command::Docs { kb } => list_documents(api.as_ref(), &kb).await,
        Command::AddDocs { kb, urls, watch } => {
            add_documents(api.as_ref(), &kb, &urls.join("\n")).await?;
            if watch {
                watch_documents(api, config, &kb).await
            } else {
                Ok(())
            }
        }
        Command::Watch { kb } => watch_documents(api, config, &kb).await,
        Command::Conversations { kb } => list_conversations(&workspace, &kb).await,
        Command::History { conversation } => print_history(&workspace, &conversation).await,
        Command::DeleteConversation { kb, id, yes } => {
            delete_conversation(&workspace, &kb, &id, yes).await
        }
        Command::Ask {
            kb,
            conversation,
            question,
        } => ask(&workspace, &kb, conversation.as_deref(), &question.join(" ")).await,
        Command::Config => Ok(()),
    };

    report_notifications(workspace.take_notifications().await);
    result
}

fn build_client(config: &KbqaConfig) -> Result<Arc<dyn KbApi>, ClientError> {
    let http = HttpConfig::new(config.server.api_root())
        .with_connect_timeout(Duration::from_secs(config.server.connect_timeout_secs.into()))
        .with_request_timeout(Duration::from_secs(config.server.request_timeout_secs.into()));
    debug!(api_root = %http.api_root, "building HTTP client");
    Ok(Arc::new(HttpKbClient::new(http)?))
}

// -- Knowledge bases and documents ------------------------------------------

async fn list_knowledge_bases(api: &dyn KbApi) -> kbqa_common::Result<()> {
    let kbs = api.list_knowledge_bases().await?;
    if kbs.is_empty() {
        println!("No knowledge bases.");
    }
    for kb in kbs {
        println!("{}\t{}\t{} documents", kb.id, kb.name, kb.document_count);
    }
    Ok(())
}

async fn list_documents(api: &dyn KbApi, kb: &str) -> kbqa_common::Result<()> {
    let docs = api.list_documents(kb).await?;
    if docs.is_empty() {
        println!("No documents.");
    }
    for doc in &docs {
        println!("{}", format_document(doc));
    }
    Ok(())
}

async fn add_documents(api: &dyn KbApi, kb: &str, input: &str) -> kbqa_common::Result<()> {
    let added = documents::add_documents(api, kb, input).await?;
    println!("Added {} document(s).", added.len());
    for doc in &added {
        println!("{}", format_document(doc));
    }
    Ok(())
}

async fn watch_documents(
    api: Arc<dyn KbApi>,
    config: &KbqaConfig,
    kb: &str,
) -> kbqa_common::Result<()> {
    let mut watch = DocumentWatch::new(api, config.polling.interval());
    let Some(mut rx) = watch.watch(Some(kb)) else {
        return Ok(());
    };

    loop {
        let event = tokio::select! {
            event = rx.recv() => event,
            _ = tokio::signal::ctrl_c() => {
                watch.teardown();
                println!("Stopped.");
                return Ok(());
            }
        };

        match event {
            Some(ReconcileEvent::Updated(docs)) => {
                let pending = docs.iter().filter(|d| d.status.is_in_progress()).count();
                println!("{pending} of {} document(s) still ingesting...", docs.len());
            }
            Some(ReconcileEvent::FetchFailed(e)) => {
                warn!(kb = %kb, error = %e, "document poll failed, retrying");
            }
            Some(ReconcileEvent::Settled(docs)) => {
                for doc in &docs {
                    println!("{}", format_document(doc));
                }
                println!("All documents settled.");
                return Ok(());
            }
            None => return Ok(()),
        }
    }
}

fn format_document(doc: &Document) -> String {
    let name = doc.display_title();
    let status = format!("{:?}", doc.status).to_lowercase();
    match doc.failure() {
        Some(reason) => format!("{}\t{status}\t{name}\t({reason})", doc.id),
        None => format!("{}\t{status}\t{} chunks\t{name}", doc.id, doc.chunk_count),
    }
}

// -- Conversations ------------------------------------------------------------

async fn list_conversations(workspace: &ChatWorkspace, kb: &str) -> kbqa_common::Result<()> {
    workspace.select_knowledge_base(Some(kb)).await?;
    let conversations = workspace.conversations().await;
    if conversations.is_empty() {
        println!("No conversations.");
    }
    for c in conversations {
        println!("{}\t{}\t{}", c.id, c.updated_at, c.title);
    }
    Ok(())
}

async fn print_history(workspace: &ChatWorkspace, conversation: &str) -> kbqa_common::Result<()> {
    workspace.select_conversation(conversation).await?;
    for message in workspace.snapshot().await {
        println!("{}", format_message(&message));
    }
    Ok(())
}

fn format_message(message: &Message) -> String {
    let speaker = match message.role {
        Role::User => "you",
        Role::Assistant => "assistant",
    };
    let mut out = format!("{speaker}: {}", message.content);
    if !message.sources.is_empty() {
        out.push('\n');
        out.push_str(&format_sources(&message.sources));
    }
    out
}

fn format_sources(sources: &[Source]) -> String {
    sources
        .iter()
        .enumerate()
        .map(|(i, s)| format!("  [{}] {} ({})", i + 1, s.display_title(), s.url))
        .collect::<Vec<_>>()
        .join("\n")
}

async fn delete_conversation(
    workspace: &ChatWorkspace,
    kb: &str,
    id: &str,
    yes: bool,
) -> kbqa_common::Result<()> {
    workspace.select_knowledge_base(Some(kb)).await?;
    let pending = workspace.request_delete(id).await;

    if !yes {
        let label = pending.title().unwrap_or(pending.conversation_id()).to_string();
        if !confirm(format!("Delete conversation \"{label}\"? [y/N] ")).await? {
            println!("Cancelled.");
            return Ok(());
        }
    }

    workspace.confirm_delete(pending).await?;
    println!("Deleted {id}.");
    Ok(())
}

async fn confirm(prompt: String) -> kbqa_common::Result<bool> {
    let answer = tokio::task::spawn_blocking(move || -> std::io::Result<String> {
        print!("{prompt}");
        std::io::stdout().flush()?;
        let mut line = String::new();
        std::io::stdin().read_line(&mut line)?;
        Ok(line)
    })
    .await
    .map_err(|e| KbqaError::Other(format!("prompt task failed: {e}")))??;

    Ok(is_yes(&answer))
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

// -- Asking -------------------------------------------------------------------

async fn ask(
    workspace: &ChatWorkspace,
    kb: &str,
    conversation: Option<&str>,
    question: &str,
) -> kbqa_common::Result<()> {
    workspace.select_knowledge_base(Some(kb)).await?;
    if let Some(conversation) = conversation {
        workspace.select_conversation(conversation).await?;
    }

    let mut events = workspace.subscribe();
    let Some(mut session) = workspace.submit(question).await else {
        return Err(KbqaError::Other("question is empty".into()));
    };

    let printer = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(Event::AnswerDelta { delta }) => {
                    print!("{delta}");
                    let _ = std::io::stdout().flush();
                }
                Ok(Event::Shutdown) | Err(RecvError::Closed) => break,
                Ok(_) => {}
                Err(RecvError::Lagged(n)) => warn!(skipped = n, "answer output lagged"),
            }
        }
    });

    let outcome = session.run().await;
    workspace.event_bus().publish(Event::Shutdown);
    if let Err(e) = printer.await {
        warn!(error = %e, "answer printer task failed");
    }
    println!();

    match outcome {
        SessionOutcome::Completed {
            conversation_id,
            sources,
            ..
        } => {
            if !sources.is_empty() {
                println!("Sources:\n{}", format_sources(&sources));
            }
            if let Some(id) = conversation_id {
                eprintln!("conversation: {id}");
            }
            Ok(())
        }
        SessionOutcome::Failed(e) => Err(e.into()),
        SessionOutcome::Abandoned => Err(KbqaError::Other("answer was abandoned".into())),
    }
}

fn report_notifications(notifications: Vec<Notification>) {
    for n in notifications {
        debug!(level = ?n.level, "notification");
        if n.body.is_empty() {
            eprintln!("{}", n.title);
        } else {
            eprintln!("{}: {}", n.title, n.body);
        }
    }
}
