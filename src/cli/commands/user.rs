//! User account command handlers

use std::io::{self, IsTerminal, Write};

use anyhow::Context;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal;

use crate::config::Config;
use crate::db::Store;
use crate::services::{
    AccountAdministrator, AccountError, SaltedHasher, SeaOrmAccountAdministrator,
};

async fn accounts(config: &Config) -> anyhow::Result<SeaOrmAccountAdministrator> {
    let store = Store::new(&config.general.database_path).await?;
    let hasher = SaltedHasher::new(&config.security)?;
    Ok(SeaOrmAccountAdministrator::new(store, hasher))
}

/// Reads one line from stdin without its line terminator.
fn prompt(label: &str) -> anyhow::Result<String> {
    print!("{label}: ");
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin()
        .read_line(&mut input)
        .context("Failed to read from stdin")?;

    Ok(input.trim_end_matches(['\r', '\n']).to_string())
}

enum KeyOutcome {
    Continue,
    Done,
    Interrupted,
}

fn apply_key(input: &mut String, key: KeyEvent) -> KeyOutcome {
    match key.code {
        KeyCode::Enter => KeyOutcome::Done,
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            KeyOutcome::Interrupted
        }
        KeyCode::Char(c) => {
            input.push(c);
            KeyOutcome::Continue
        }
        KeyCode::Backspace => {
            input.pop();
            KeyOutcome::Continue
        }
        _ => KeyOutcome::Continue,
    }
}

fn read_hidden_line() -> anyhow::Result<String> {
    let mut input = String::new();
    loop {
        if let Event::Key(key) = event::read().context("Failed to read key")?
            && key.kind != KeyEventKind::Release
        {
            match apply_key(&mut input, key) {
                KeyOutcome::Continue => {}
                KeyOutcome::Done => return Ok(input),
                KeyOutcome::Interrupted => anyhow::bail!("Interrupted"),
            }
        }
    }
}

/// Reads a password without echo. Piped input falls back to a plain line read.
fn prompt_secret(label: &str) -> anyhow::Result<String> {
    if !io::stdin().is_terminal() {
        return prompt(label);
    }

    print!("{label}: ");
    io::stdout().flush()?;

    terminal::enable_raw_mode().context("Failed to enter raw terminal mode")?;
    let input = read_hidden_line();
    terminal::disable_raw_mode().context("Failed to leave raw terminal mode")?;
    println!();

    input
}

fn value_or_prompt(value: Option<String>, label: &str) -> anyhow::Result<String> {
    value.map_or_else(|| prompt_secret(label), Ok)
}

/// Prints domain failures for the operator instead of bubbling them up.
fn report(result: Result<(), AccountError>) -> anyhow::Result<()> {
    match result {
        Ok(()) => Ok(()),
        Err(AccountError::Database(msg) | AccountError::Internal(msg)) => {
            Err(anyhow::anyhow!(msg))
        }
        Err(e) => {
            println!("✗ {e}");
            Ok(())
        }
    }
}

pub async fn cmd_user_create(
    config: &Config,
    username: &str,
    password: Option<String>,
    disabled: bool,
) -> anyhow::Result<()> {
    let accounts = accounts(config).await?;

    let password = value_or_prompt(password, "Password")?;

    report(
        accounts
            .create(username, &password, !disabled)
            .await
            .map(|user| {
                let state = if user.enabled { "enabled" } else { "disabled" };
                println!("✓ Created user '{}' (ID: {}, {state})", user.username, user.id);
            }),
    )
}

pub async fn cmd_user_delete(config: &Config, username: &str) -> anyhow::Result<()> {
    let accounts = accounts(config).await?;

    println!("Delete user '{username}'?");
    println!("Enter 'y' to confirm, anything else to cancel:");
    if !prompt(">")?.trim().eq_ignore_ascii_case("y") {
        println!("Cancelled.");
        return Ok(());
    }

    report(
        accounts
            .delete(username)
            .await
            .map(|()| println!("✓ Deleted user '{username}'")),
    )
}

pub async fn cmd_user_enable(config: &Config, username: &str) -> anyhow::Result<()> {
    let accounts = accounts(config).await?;
    report(
        accounts
            .enable(username)
            .await
            .map(|_| println!("✓ Enabled user '{username}'")),
    )
}

pub async fn cmd_user_disable(config: &Config, username: &str) -> anyhow::Result<()> {
    let accounts = accounts(config).await?;
    report(
        accounts
            .disable(username)
            .await
            .map(|_| println!("✓ Disabled user '{username}'")),
    )
}

pub async fn cmd_user_password(
    config: &Config,
    username: &str,
    current: Option<String>,
    new_password: Option<String>,
) -> anyhow::Result<()> {
    let accounts = accounts(config).await?;

    let current = value_or_prompt(current, "Current password")?;
    let new_password = value_or_prompt(new_password, "New password")?;

    report(
        accounts
            .update_password(username, &current, &new_password)
            .await
            .map(|()| println!("✓ Password updated for '{username}'")),
    )
}

pub async fn cmd_user_list(config: &Config) -> anyhow::Result<()> {
    let accounts = accounts(config).await?;
    let users = accounts.list().await?;

    if users.is_empty() {
        println!("No users.");
        println!();
        println!("Create one with: geodata user create <username>");
        return Ok(());
    }

    println!("Users ({} total)", users.len());
    println!("{:-<70}", "");

    for user in users {
        println!(
            "{:>4}  {:<24} {:<9} last login: {}",
            user.id,
            user.username,
            if user.enabled { "enabled" } else { "disabled" },
            user.last_login_date.as_deref().unwrap_or("never"),
        );
    }

    Ok(())
}
