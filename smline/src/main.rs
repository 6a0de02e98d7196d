#![allow(clippy::multiple_crate_versions)]

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use colored::{Color, Colorize};
use serde::Serialize;
use smconfig::{PersistentCredentialStore, SmConfig};
use smctf::types::{CtfState, LoginRequest, RegisterRequest};
use smctf::{CredentialStore, Error as SmctfError, ErrorKind, SmctfClient};
use std::fmt::Write as _;
use std::io::{self, IsTerminal, Write as _};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use time::{OffsetDateTime, UtcOffset};

mod scoreboard;
mod telemetry;

#[derive(Parser)]
#[command(name = "smline", about = "A CLI for smctf competitions")]
struct Cli {
    /// Print raw JSON instead of formatted output
    #[arg(long, global = true)]
    json: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Log in; the password is read from stdin
    Login {
        /// Account email
        email: String,
    },
    /// Create an account; the password is read from stdin
    Register {
        /// Account email
        email: String,
        /// Public username
        username: String,
        /// Registration key handed out by an organiser
        #[arg(long)]
        key: String,
    },
    /// Revoke the session and forget stored tokens
    Logout,
    /// Show the logged-in user
    Whoami,
    /// List challenges
    Challenges,
    /// Submit a flag
    Submit {
        /// Challenge ID (see `smline challenges`)
        challenge_id: i64,
        /// The flag
        flag: String,
    },
    /// Show the scoreboard
    Leaderboard {
        /// Rank teams instead of users
        #[arg(long)]
        teams: bool,
    },
    /// Summarise recent scoring, or render it as an SVG chart
    Timeline {
        /// Rank teams instead of users
        #[arg(long)]
        teams: bool,
        /// Window length in minutes (defaults to the configured value)
        #[arg(long)]
        window: Option<u32>,
        /// Chart width in pixels; narrower values are widened to the minimum
        #[arg(long)]
        width: Option<u32>,
        /// Write the chart to this SVG file
        #[arg(long, value_name = "FILE")]
        svg: Option<PathBuf>,
    },
    /// List users
    Users,
    /// List teams
    Teams,
    /// Generate shell completions
    #[command(hide = true)]
    Completions {
        /// The shell to generate completions for
        shell: Shell,
    },
}

fn get_client(config: &SmConfig) -> Result<SmctfClient> {
    let store = PersistentCredentialStore::open().with_context(|| "Failed to open session store")?;
    let store: Arc<dyn CredentialStore> = Arc::new(store);
    Ok(SmctfClient::new(store).with_base_url(&config.api_base_url))
}

fn read_secret(label: &str) -> Result<String> {
    if io::stdin().is_terminal() {
        eprint!("{label}: ");
        io::stderr().flush()?;
    }
    let mut input = String::new();
    io::stdin()
        .read_line(&mut input)
        .with_context(|| format!("Failed to read {label} from stdin"))?;
    let value = input.trim_end_matches(['\r', '\n']);
    if value.is_empty() {
        anyhow::bail!("{label} must not be empty");
    }
    Ok(value.to_string())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn rank_color(rank: usize) -> Color {
    match rank {
        1 => Color::Yellow,
        2 => Color::White,
        3 => Color::Red,
        _ => Color::BrightBlack,
    }
}

fn format_api_error(err: &SmctfError) -> String {
    match err.kind() {
        ErrorKind::AuthenticationRequired => {
            return "Not logged in. Run `smline login <email>` first.".to_string();
        }
        ErrorKind::AuthenticationExpired => {
            return "Session expired. Run `smline login <email>` again.".to_string();
        }
        _ => {}
    }

    let Some(api) = err.api_error() else {
        return format!("smctf error: {err}");
    };
    let mut output = format!("smctf API error ({}): {}", api.status, api.user_message());
    for (field, reason) in api.field_errors() {
        let _ = write!(output, "\n  - {field}: {reason}");
    }
    output
}

fn handle_error(err: &anyhow::Error) -> ! {
    if let Some(api_err) = err.downcast_ref::<SmctfError>() {
        eprintln!("{}", format_api_error(api_err).red());
        process::exit(1);
    }

    eprintln!("{err:#}");
    process::exit(1);
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Command::Completions { shell } = cli.command {
        let mut cmd = Cli::command();
        generate(shell, &mut cmd, "smline", &mut io::stdout());
        return Ok(());
    }

    let config = SmConfig::load().with_context(|| "Failed to load smctf config")?;
    // The local offset can only be read while the process is single-threaded.
    let local_offset = UtcOffset::current_local_offset().ok();
    telemetry::init(&config.log_filter);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .with_context(|| "Failed to start the async runtime")?;
    if let Err(err) = runtime.block_on(run(cli, config, local_offset)) {
        handle_error(&err);
    }

    Ok(())
}

#[allow(clippy::too_many_lines)]
async fn run(cli: Cli, config: SmConfig, local_offset: Option<UtcOffset>) -> Result<()> {
    let client = get_client(&config)?;
    let json = cli.json;

    match cli.command {
        Command::Completions { .. } => {}
        Command::Login { email } => {
            let password = read_secret("Password")?;
            let auth = client.login(&LoginRequest { email, password }).await?;
            println!("Logged in as {}.", auth.user.username.bold());
        }
        Command::Register {
            email,
            username,
            key,
        } => {
            let password = read_secret("Password")?;
            let created = client
                .register(&RegisterRequest {
                    email,
                    username,
                    password,
                    registration_key: key,
                })
                .await?;
            println!(
                "Registered {} (id {}). Run `smline login {}` to start.",
                created.username.bold(),
                created.id,
                created.email
            );
        }
        Command::Logout => {
            client.logout().await?;
            println!("Logged out.");
        }
        Command::Whoami => {
            let user = client.me().await?;
            if json {
                return print_json(&user);
            }
            let team = user.team_name.as_deref().unwrap_or("no team");
            println!(
                "{} <{}> [{}] {}",
                user.username.bold(),
                user.email,
                user.role,
                team.dimmed()
            );
        }
        Command::Challenges => {
            let list = client.challenges().await?;
            if json {
                return print_json(&list);
            }
            if list.ctf_state != CtfState::Active {
                println!("CTF is {}.", list.ctf_state.to_string().yellow());
            }
            for challenge in &list.challenges {
                println!(
                    "{:>4}  {:<12} {:<32} {:>5} pts  {} solves",
                    challenge.id,
                    challenge.category,
                    challenge.title.bold(),
                    challenge.points.to_string().green(),
                    challenge.solve_count
                );
            }
        }
        Command::Submit { challenge_id, flag } => {
            let result = client.submit_flag(challenge_id, &flag).await?;
            if json {
                return print_json(&result);
            }
            if result.correct {
                println!("{}", "Correct!".green().bold());
            } else {
                println!("{}", "Wrong flag.".red());
            }
            if result.ctf_state != CtfState::Active {
                println!("CTF is {}.", result.ctf_state);
            }
        }
        Command::Leaderboard { teams: false } => {
            let leaderboard = client.leaderboard().await?;
            if json {
                return print_json(&leaderboard);
            }
            for (idx, entry) in leaderboard.entries.iter().enumerate() {
                let line = format!("{:>3}. {:<24} {:>6}", idx + 1, entry.username, entry.score);
                println!("{}", line.color(rank_color(idx + 1)));
            }
        }
        Command::Leaderboard { teams: true } => {
            let leaderboard = client.team_leaderboard().await?;
            if json {
                return print_json(&leaderboard);
            }
            for (idx, entry) in leaderboard.entries.iter().enumerate() {
                let line = format!("{:>3}. {:<24} {:>6}", idx + 1, entry.team_name, entry.score);
                println!("{}", line.color(rank_color(idx + 1)));
            }
        }
        Command::Timeline {
            teams,
            window,
            width,
            svg,
        } => {
            let window = window.unwrap_or(config.timeline.window_minutes);
            let width = width.unwrap_or(config.timeline.width);
            let input = scoreboard::fetch_input(&client, teams, window).await?;
            let chart = scoreboard::layout(&config.timeline, local_offset).project(
                &input,
                f64::from(window),
                f64::from(width),
                OffsetDateTime::now_utc(),
            );
            let Some(chart) = chart else {
                println!("No scores yet.");
                return Ok(());
            };

            if let Some(path) = svg {
                scoreboard::write_svg(&path, &chart.to_svg())?;
                println!("Wrote {}.", path.display());
            } else if json {
                print_json(&chart)?;
            } else {
                print!("{}", scoreboard::summary(&chart, window));
            }
        }
        Command::Users => {
            let users = client.users().await?;
            if json {
                return print_json(&users);
            }
            for user in users {
                let team = user.team_name.unwrap_or_default();
                println!("{:>5}  {:<24} {}", user.id, user.username, team.dimmed());
            }
        }
        Command::Teams => {
            let teams = client.teams().await?;
            if json {
                return print_json(&teams);
            }
            for team in teams {
                println!(
                    "{:>5}  {:<24} {:>3} members  {:>6} pts",
                    team.id, team.name, team.member_count, team.total_score
                );
            }
        }
    }

    Ok(())
}
