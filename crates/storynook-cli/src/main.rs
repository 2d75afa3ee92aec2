//! storynook - a developer harness for the storynook data layer.
//!
//! This binary drives the same `Services` composition root the mobile
//! shells use: sessions, repositories, screening and the coin ledger, all
//! from the command line. It exists for backend debugging and manual QA,
//! not for end users.

use std::io::{self, Write};
use std::path::Path;

use anyhow::{bail, Result};
use chrono::Local;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use storynook_core::cache::{Delta, Keyed, Repository};
use storynook_core::config::Config;
use storynook_core::models::{Character, FavoriteStory, Story};
use storynook_core::safety::Screening;
use storynook_core::utils::{age_display, coin_delta, truncate};
use storynook_core::Services;

/// Initialize the tracing subscriber for logging.
///
/// Diagnostics go to stderr (filtered by RUST_LOG, default warn) and to a
/// daily-rolled file under the data directory, so a session can be
/// reconstructed after the fact.
fn init_tracing(log_dir: &Path) -> WorkerGuard {
    let file_appender = tracing_appender::rolling::daily(log_dir, "storynook.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(fmt::layer().with_writer(file_writer).with_ansi(false))
        .with(filter)
        .init();
    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let mut config = Config::load()?;
    let log_dir = config.data_dir()?.join("logs");
    std::fs::create_dir_all(&log_dir)?;
    let _log_guard = init_tracing(&log_dir);
    info!("storynook CLI starting");

    let args: Vec<String> = std::env::args().collect();
    let command = args.get(1).map(String::as_str).unwrap_or("status");

    let services = Services::new(config.clone())?;
    services.restore_session()?;

    match command {
        "status" => cmd_status(&services),
        "guest" => cmd_guest(&services).await,
        "login" => cmd_login(&services, &mut config, args.get(2)).await,
        "upgrade" => cmd_upgrade(&services, args.get(2)).await,
        "signout" => cmd_signout(&services),
        "sync" => cmd_sync(&services).await,
        "stories" => cmd_stories(&services).await,
        "characters" => cmd_characters(&services).await,
        "templates" => cmd_templates(&services).await,
        "favorites" => cmd_favorites(&services).await,
        "coins" => cmd_coins(&services).await,
        "screen" => cmd_screen(&services, &args[2..]).await,
        "new-story" => cmd_new_story(&services, &args[2..]).await,
        "new-character" => cmd_new_character(&services, &args[2..]).await,
        "favorite" => cmd_favorite(&services, args.get(2)).await,
        "unfavorite" => cmd_unfavorite(&services, args.get(2)).await,
        "delete-account" => cmd_delete_account(&services).await,
        "help" | "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {}\n", other);
            print_usage();
            std::process::exit(2);
        }
    }
}

fn print_usage() {
    println!("storynook - developer harness for the storynook data layer");
    println!();
    println!("Usage: storynook <command> [args]");
    println!();
    println!("Session:");
    println!("  status                     Show session and cache state (default)");
    println!("  guest                      Start an anonymous guest session");
    println!("  login <email>              Sign in with email");
    println!("  upgrade <email>            Upgrade the guest session to an account");
    println!("  signout                    Sign out and clear cached collections");
    println!("  delete-account             Permanently delete the account");
    println!();
    println!("Collections:");
    println!("  sync                       Refresh every collection");
    println!("  stories | characters | templates | favorites | coins");
    println!();
    println!("Writing:");
    println!("  screen <text...>           Screen a story idea");
    println!("  new-story <title> <idea..> Screen an idea and save a story");
    println!("  new-character <name> [traits...]");
    println!("  favorite <story-id>        Mark a story as favorite");
    println!("  unfavorite <story-id>      Remove a favorite");
}

fn cmd_status(services: &Services) -> Result<()> {
    match services.auth.identity() {
        Some(identity) => {
            println!("Signed in: {} ({})", identity.user_id, identity.provider);
            if let Some(minutes) = services.auth.session_minutes_left() {
                println!("Session:   expires in {}m", minutes);
            }
        }
        None => println!("Signed out"),
    }
    println!();
    println!("Collections:");
    print_repo_line(&services.stories);
    print_repo_line(&services.characters);
    print_repo_line(&services.templates);
    print_repo_line(&services.favorites);
    print_repo_line(&services.coin_activity);
    Ok(())
}

fn print_repo_line<T: Keyed + Clone + Send + Sync + 'static>(repo: &Repository<T>) {
    println!(
        "  {:<14} {:>4} items   fetched {}",
        repo.name(),
        repo.peek().len(),
        age_display(repo.age())
    );
}

async fn cmd_guest(services: &Services) -> Result<()> {
    let identity = services.sign_in_guest().await?;
    println!("Guest session started: {}", identity.user_id);
    Ok(())
}

async fn cmd_login(
    services: &Services,
    config: &mut Config,
    email: Option<&String>,
) -> Result<()> {
    let email = match email.cloned().or_else(|| config.last_email.clone()) {
        Some(email) => email,
        None => bail!("Usage: storynook login <email>"),
    };
    let password = rpassword::prompt_password(format!("Password for {}: ", email))?;
    let identity = services.sign_in_email(&email, &password).await?;
    config.last_email = Some(email);
    config.save()?;
    println!("Signed in: {} ({})", identity.user_id, identity.provider);
    Ok(())
}

async fn cmd_upgrade(services: &Services, email: Option<&String>) -> Result<()> {
    let Some(email) = email else {
        bail!("Usage: storynook upgrade <email>");
    };
    let password = rpassword::prompt_password("Choose a password: ")?;
    let outcome = services.upgrade_to_account(email, &password).await?;
    if outcome.merged {
        println!(
            "Account created: {}. Guest stories were moved into it.",
            outcome.identity.user_id
        );
    } else {
        println!(
            "Signed into existing account: {}. Guest content was left behind.",
            outcome.identity.user_id
        );
    }
    Ok(())
}

fn cmd_signout(services: &Services) -> Result<()> {
    services.sign_out()?;
    println!("Signed out.");
    Ok(())
}

async fn cmd_sync(services: &Services) -> Result<()> {
    for (name, outcome) in services.refresh_all().await {
        match outcome {
            Ok(count) => println!("  {:<14} {} items", name, count),
            Err(err) => println!("  {:<14} failed: {}", name, err),
        }
    }
    Ok(())
}

async fn cmd_stories(services: &Services) -> Result<()> {
    let stories = services.stories.get().await?;
    if stories.is_empty() {
        println!("No stories yet.");
        return Ok(());
    }
    for story in stories {
        println!(
            "{}  {:<40} {:<10} {}",
            story.id,
            truncate(&story.title, 40),
            story.status,
            story.created_at.with_timezone(&Local).format("%Y-%m-%d")
        );
    }
    Ok(())
}

async fn cmd_characters(services: &Services) -> Result<()> {
    let characters = services.characters.get().await?;
    if characters.is_empty() {
        println!("No characters yet.");
        return Ok(());
    }
    for character in characters {
        println!(
            "{}  {:<20} {}",
            character.id,
            truncate(&character.name, 20),
            character.traits.join(", ")
        );
    }
    Ok(())
}

async fn cmd_templates(services: &Services) -> Result<()> {
    let templates = services.templates.get().await?;
    for template in templates {
        let cost = if template.is_free() {
            "free".to_string()
        } else {
            format!("{} coins", template.coin_cost)
        };
        println!(
            "{}  {:<36} {:<12} {}",
            template.id,
            truncate(&template.title, 36),
            template.theme.as_deref().unwrap_or("-"),
            cost
        );
    }
    Ok(())
}

async fn cmd_favorites(services: &Services) -> Result<()> {
    let favorites = services.favorites.get().await?;
    if favorites.is_empty() {
        println!("No favorites yet.");
        return Ok(());
    }
    for favorite in favorites {
        println!(
            "{}  {:<40} {}",
            favorite.story_id,
            truncate(&favorite.title, 40),
            favorite.favorited_at.with_timezone(&Local).format("%Y-%m-%d")
        );
    }
    Ok(())
}

async fn cmd_coins(services: &Services) -> Result<()> {
    let balance = services.coin_balance().await?;
    println!("Balance: {} coins", balance.available);
    println!();
    for tx in services.coin_activity.get().await? {
        println!(
            "  {:>6}  {:<20} {}  {}",
            coin_delta(tx.amount),
            tx.kind.label(),
            tx.created_at.with_timezone(&Local).format("%Y-%m-%d"),
            tx.note.as_deref().unwrap_or("")
        );
    }
    Ok(())
}

async fn cmd_screen(services: &Services, words: &[String]) -> Result<()> {
    if words.is_empty() {
        bail!("Usage: storynook screen <text...>");
    }
    let text = words.join(" ");
    print_screening(services.screener.screen(&text).await?);
    Ok(())
}

async fn cmd_new_story(services: &Services, args: &[String]) -> Result<()> {
    if args.len() < 2 {
        bail!("Usage: storynook new-story <title> <idea...>");
    }
    let title = &args[0];
    let idea = args[1..].join(" ");

    match services.screener.screen(&idea).await? {
        Screening::Accepted => {}
        rejected => {
            print_screening(rejected);
            return Ok(());
        }
    }

    let story = services
        .stories
        .mutate(Delta::Insert(Story::draft(title, idea, Vec::new())))
        .await?;
    println!("Saved story {} ({})", story.id, story.title);
    Ok(())
}

async fn cmd_new_character(services: &Services, args: &[String]) -> Result<()> {
    let Some(name) = args.first() else {
        bail!("Usage: storynook new-character <name> [traits...]");
    };
    let traits = args[1..].to_vec();
    let character = services
        .characters
        .mutate(Delta::Insert(Character::new(name, traits)))
        .await?;
    println!("Saved character {} ({})", character.id, character.name);
    Ok(())
}

async fn cmd_favorite(services: &Services, story_id: Option<&String>) -> Result<()> {
    let Some(story_id) = story_id else {
        bail!("Usage: storynook favorite <story-id>");
    };
    let stories = services.stories.get().await?;
    let favorite = match stories.iter().find(|story| &story.id == story_id) {
        Some(story) => FavoriteStory::new(story),
        None => FavoriteStory::by_id(story_id.clone()),
    };
    services.favorites.mutate(Delta::Insert(favorite)).await?;
    println!("Favorited {}", story_id);
    Ok(())
}

async fn cmd_unfavorite(services: &Services, story_id: Option<&String>) -> Result<()> {
    let Some(story_id) = story_id else {
        bail!("Usage: storynook unfavorite <story-id>");
    };
    let favorites = services.favorites.get().await?;
    let Some(favorite) = favorites.into_iter().find(|f| &f.story_id == story_id) else {
        println!("{} is not a favorite.", story_id);
        return Ok(());
    };
    services.favorites.mutate(Delta::Remove(favorite)).await?;
    println!("Removed favorite {}", story_id);
    Ok(())
}

async fn cmd_delete_account(services: &Services) -> Result<()> {
    if services.auth.identity().is_none() {
        bail!("Not signed in");
    }
    if !confirm("Really delete this account and all its stories?")? {
        println!("Cancelled.");
        return Ok(());
    }
    services.delete_account().await?;
    println!("Account deleted.");
    Ok(())
}

fn print_screening(screening: Screening) {
    match screening {
        Screening::Accepted => println!("Accepted."),
        Screening::Rejected(rejection) => {
            println!("Rejected: {}", rejection.reason);
            if let Some(suggestion) = rejection.suggestion {
                println!("Try instead: {}", suggestion);
            }
            for example in rejection.examples {
                println!("  e.g. {}", example);
            }
        }
    }
}

fn confirm(prompt: &str) -> Result<bool> {
    print!("{} [y/N] ", prompt);
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().read_line(&mut answer)?;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes"))
}
