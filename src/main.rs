use clap::Parser;
use color_eyre::{eyre::eyre, Result};
use hnfeed::app::Session;
use hnfeed::commands::{self, Action, COMMANDS};
use hnfeed::comments::{Children, CommentNode};
use hnfeed::config::Config;
use hnfeed::event::{self, Event, EventHandler};
use hnfeed::hn::{FeedType, HttpTransport, Item};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "hnfeed")]
#[command(about = "Browse Hacker News feeds and comment threads from the terminal")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/hnfeed/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Feed to open (top, new, best, ask, show, job)
  #[arg(short, long)]
  feed: Option<FeedType>,

  /// Load this many pages, print them and exit
  #[arg(short, long)]
  pages: Option<usize>,

  /// Start with live updates off
  #[arg(long)]
  no_live: bool,

  /// Write logs to this file instead of stderr
  #[arg(long)]
  log_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();
  let _log_guard = init_logging(args.log_file.as_deref())?;

  let mut config = Config::load(args.config.as_deref())?;
  if let Some(feed) = args.feed {
    config.feed.default = feed;
  }
  if args.no_live || args.pages.is_some() {
    config.live.enabled = false;
  }

  let transport = HttpTransport::new(&config.api.user_agent, config.request_timeout())?;
  let (sink, events) = event::channel();
  let session = Session::new(config, Arc::new(transport), sink)?;

  match args.pages {
    Some(pages) => print_pages(&session, pages).await,
    None => run_interactive(session, events).await,
  }
}

fn init_logging(log_file: Option<&Path>) -> Result<Option<WorkerGuard>> {
  let filter = EnvFilter::try_from_env("HNFEED_LOG").unwrap_or_else(|_| EnvFilter::new("info"));

  match log_file {
    Some(path) => {
      let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
      let name = path
        .file_name()
        .ok_or_else(|| eyre!("Invalid log file path: {}", path.display()))?;
      let appender = tracing_appender::rolling::never(dir, name);
      let (writer, guard) = tracing_appender::non_blocking(appender);
      tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_writer(writer)
        .init();
      Ok(Some(guard))
    }
    None => {
      tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
      Ok(None)
    }
  }
}

async fn print_pages(session: &Session, pages: usize) -> Result<()> {
  let mut items = session.start().await;
  for _ in 1..pages {
    if !session.has_more() {
      break;
    }
    items.extend(session.load_more().await);
  }

  for item in &items {
    println!("{}", format_item(item));
  }
  session.shutdown().await;
  Ok(())
}

async fn run_interactive(session: Session, events: EventHandler) -> Result<()> {
  let printer = tokio::spawn(print_events(events));

  let feed = session.config().feed.default;
  println!("{} (type `help` for commands)", feed.label());
  session.start().await;

  let mut lines = BufReader::new(tokio::io::stdin()).lines();
  loop {
    let line = tokio::select! {
      line = lines.next_line() => line?,
      _ = tokio::signal::ctrl_c() => None,
    };
    let Some(line) = line else {
      break;
    };

    match commands::parse(&line) {
      Ok(Some(Action::Quit)) => break,
      Ok(Some(action)) => run_action(&session, action).await,
      Ok(None) => {}
      Err(message) => eprintln!("{}", message),
    }
  }

  session.shutdown().await;
  drop(session);
  let _ = printer.await;
  Ok(())
}

async fn run_action(session: &Session, action: Action) {
  match action {
    Action::Feed(feed) => {
      println!("== {} ==", feed.label());
      session.select_feed(feed).await;
    }
    Action::More => {
      if session.has_more() {
        session.load_more().await;
      } else {
        println!("No more items");
      }
    }
    Action::Item(id) => {
      session.open_item(id).await;
    }
    Action::Expand(id) => {
      let outcome = session.expand(id).await;
      tracing::debug!(id, ?outcome, "expand");
    }
    Action::Refresh => {
      session.refresh().await;
    }
    Action::Live(enabled) => session.set_live_enabled(enabled),
    Action::Check => {
      if session.check_now().await.is_none() {
        println!("Check skipped");
      }
    }
    Action::Help => {
      for cmd in COMMANDS {
        println!("  {:<34} {}", cmd.usage, cmd.description);
      }
    }
    Action::Quit => {}
  }
}

async fn print_events(mut events: EventHandler) {
  while let Some(event) = events.next().await {
    match event {
      Event::BatchLoaded { items, .. } => {
        for item in &items {
          println!("{}", format_item(item));
        }
      }
      Event::FeedExhausted { feed } => println!("-- end of {} --", feed.label()),
      Event::ItemDetails {
        item,
        poll_options,
        parent,
      } => {
        println!("{}", format_item(&item));
        println!("   {}", item.link());
        if let Some(text) = &item.text {
          println!("   {}", excerpt(text, 200));
        }
        for option in &poll_options {
          println!(
            "   * {} ({} points)",
            option.text.as_deref().unwrap_or_default(),
            option.score
          );
        }
        if let Some(parent) = parent {
          println!("   in reply to [{}] {}", parent.id, parent.title.as_deref().unwrap_or(""));
        }
      }
      Event::ItemUnavailable { id } => println!("Item {} is unavailable", id),
      Event::CommentsReady { parent_id, tree } => {
        println!("-- comments on {} --", parent_id);
        for node in &tree {
          print_comment(node);
        }
      }
      Event::LiveStatus(status) => println!("[live] {}", status.detail()),
    }
  }
}

fn print_comment(node: &CommentNode) {
  let indent = "  ".repeat(node.depth + 1);
  let by = node.item.by.as_deref().unwrap_or("[unknown]");
  let text = node.item.text.as_deref().map(|t| excerpt(t, 100)).unwrap_or_default();
  println!("{}[{}] {}: {}", indent, node.id(), by, text);

  match &node.children {
    Children::Resolved(replies) => replies.iter().for_each(print_comment),
    Children::Lazy => println!(
      "{}  ({} replies, `expand {}`)",
      indent,
      node.reply_count(),
      node.id()
    ),
    Children::Truncated => println!("{}  (thread continues on the site)", indent),
    Children::None => {}
  }
}

fn format_item(item: &Item) -> String {
  let title = item.title.as_deref().unwrap_or("[untitled]");
  let domain = item.domain().map(|d| format!(" ({})", d)).unwrap_or_default();
  let by = item.by.as_deref().unwrap_or("[unknown]");
  let posted = item
    .posted_at()
    .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
    .unwrap_or_default();
  format!(
    "[{}] {}: {}{}\n   {} points by {} {} | {} comments",
    item.id,
    item.kind.label(),
    title,
    domain,
    item.score,
    by,
    posted,
    item.comment_count()
  )
}

fn excerpt(text: &str, max: usize) -> String {
  let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
  match flat.char_indices().nth(max) {
    Some((end, _)) => format!("{}...", &flat[..end]),
    None => flat,
  }
}
