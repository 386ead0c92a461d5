mod session;

use anyhow::{Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use cloudmusic_api::{
    ClientSettings, CloudMusicApi, Cookie, Query, SessionProbe, catalog, provider,
};
use serde_json::Value;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "cloudmusic",
    version,
    about = "Netease Cloud Music API from the command line"
)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,
    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct GlobalArgs {
    /// Send `X-Real-IP` / `X-Forwarded-For` with API calls
    #[arg(long, global = true, value_name = "IP")]
    real_ip: Option<String>,
    /// Proxy URL for API calls
    #[arg(long, global = true, value_name = "URL", conflicts_with = "no_proxy")]
    proxy: Option<String>,
    /// Bypass every proxy, including environment proxies
    #[arg(long, global = true)]
    no_proxy: bool,
    /// Extra session cookie, overrides the cookie file (repeatable)
    #[arg(
        short,
        long = "cookie",
        global = true,
        value_name = "NAME=VALUE",
        value_parser = parse_cookie
    )]
    cookies: Vec<Cookie>,
    /// More logging (-v debug, -vv trace); `RUST_LOG` takes precedence
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Command {
    /// List every known route
    Routes,
    /// Call a route and print the response tree
    Call {
        /// Route, e.g. `/song/detail`
        route: String,
        /// Query parameter (repeatable)
        #[arg(short, long = "query", value_name = "KEY=VALUE", value_parser = parse_pair)]
        query: Vec<(String, String)>,
        /// Print failed responses instead of exiting with an error
        #[arg(long)]
        lenient: bool,
    },
    /// Show whether the saved session is logged in
    Status,
    /// Check whether a track is playable
    Check {
        /// Track ID
        track_id: u64,
    },
    /// List playlists related to a playlist
    Related {
        /// Playlist ID
        playlist_id: u64,
    },
    /// Log in with e-mail and password, saving the session cookies
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// Manage the saved cookie file
    Cookie {
        #[command(subcommand)]
        action: CookieAction,
    },
}

#[derive(Subcommand)]
enum CookieAction {
    /// Add or replace a cookie, e.g. `MUSIC_U=00AABB...`
    Set {
        #[arg(value_parser = parse_cookie)]
        cookie: Cookie,
    },
    /// Print saved cookies
    Show,
    /// Delete the cookie file
    Clear,
}

fn parse_cookie(s: &str) -> std::result::Result<Cookie, String> {
    Cookie::parse_pair(s).ok_or_else(|| format!("expected NAME=VALUE, got '{s}'"))
}

fn parse_pair(s: &str) -> std::result::Result<(String, String), String> {
    s.split_once('=')
        .map(|(k, v)| (k.trim().to_owned(), v.to_owned()))
        .ok_or_else(|| format!("expected KEY=VALUE, got '{s}'"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.global.verbose);

    match cli.command {
        Command::Routes => {
            cmd_routes();
            Ok(())
        }
        Command::Cookie { action } => cmd_cookie(action),
        Command::Call {
            route,
            query,
            lenient,
        } => cmd_call(&client(&cli.global)?, &route, query, lenient).await,
        Command::Status => cmd_status(&client(&cli.global)?).await,
        Command::Check { track_id } => cmd_check(&client(&cli.global)?, track_id).await,
        Command::Related { playlist_id } => {
            cmd_related(&client(&cli.global)?, playlist_id).await
        }
        Command::Login { email, password } => {
            cmd_login(&client(&cli.global)?, &email, &password).await
        }
    }
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn client(args: &GlobalArgs) -> Result<CloudMusicApi> {
    let mut cookies = session::load()?;
    for cookie in &args.cookies {
        cookies.upsert(cookie.clone());
    }

    let mut settings = ClientSettings::default().with_use_proxy(!args.no_proxy);
    if let Some(ip) = &args.real_ip {
        settings = settings.with_real_ip(ip);
    }
    if let Some(proxy) = &args.proxy {
        settings = settings.with_proxy(proxy);
    }

    let api = CloudMusicApi::with_cookies(cookies).context("failed to build HTTP client")?;
    Ok(api.with_settings(settings))
}

fn print_json(tree: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(tree)?);
    Ok(())
}

// ── routes / call ──

fn cmd_routes() {
    for p in catalog::ALL {
        println!("  {:<20} {:?}", p.route, p.options.crypto);
    }
}

async fn cmd_call(
    api: &CloudMusicApi,
    route: &str,
    pairs: Vec<(String, String)>,
    lenient: bool,
) -> Result<()> {
    let provider = catalog::find(route)
        .with_context(|| format!("unknown route '{route}', see `cloudmusic routes`"))?;
    let query: Query = provider::query(pairs);
    let tree = api.request(provider, &query, !lenient).await?;
    print_json(&tree)
}

// ── status / login ──

async fn cmd_status(api: &CloudMusicApi) -> Result<()> {
    match api.probe_session().await {
        SessionProbe::Active(status) => println!(
            "Logged in as: {} (id={})",
            status.profile["nickname"].as_str().unwrap_or("?"),
            status.profile["userId"],
        ),
        SessionProbe::Anonymous => println!("Not logged in."),
        SessionProbe::Failed(e) => println!("Could not determine session: {e}"),
    }
    Ok(())
}

async fn cmd_login(api: &CloudMusicApi, email: &str, password: &str) -> Result<()> {
    let query = provider::query([("email", email), ("password", password)]);
    let tree = api
        .request(&catalog::LOGIN, &query, true)
        .await
        .context("login failed")?;
    let path = session::save(&api.cookies())?;
    println!(
        "Logged in as: {} (session saved to {})",
        tree["profile"]["nickname"].as_str().unwrap_or("?"),
        path.display()
    );
    Ok(())
}

// ── check / related ──

async fn cmd_check(api: &CloudMusicApi, track_id: u64) -> Result<()> {
    let query = provider::query([("id", track_id)]);
    let tree = api.request(&catalog::CHECK_MUSIC, &query, false).await?;
    let playable = tree["success"].as_bool().unwrap_or(false);
    println!(
        "[{track_id}] {}: {}",
        if playable { "playable" } else { "unavailable" },
        tree["message"].as_str().unwrap_or_default()
    );
    Ok(())
}

async fn cmd_related(api: &CloudMusicApi, playlist_id: u64) -> Result<()> {
    let query = provider::query([("id", playlist_id)]);
    let tree = api.request(&catalog::RELATED_PLAYLIST, &query, true).await?;
    let playlists = tree["playlists"].as_array().map(Vec::as_slice).unwrap_or_default();
    if playlists.is_empty() {
        println!("No related playlists.");
    }
    for p in playlists {
        println!(
            "  [{}] {} (by {})",
            p["id"].as_str().unwrap_or_default(),
            p["name"].as_str().unwrap_or_default(),
            p["creator"]["nickname"].as_str().unwrap_or_default(),
        );
    }
    Ok(())
}

// ── cookie ──

fn cmd_cookie(action: CookieAction) -> Result<()> {
    match action {
        CookieAction::Set { cookie } => {
            let mut cookies = session::load()?;
            cookies.upsert(cookie);
            let path = session::save(&cookies)?;
            println!("Cookie saved to {}.", path.display());
        }
        CookieAction::Show => {
            let cookies = session::load()?;
            if cookies.is_empty() {
                println!("No saved cookies.");
            }
            for c in &cookies {
                match &c.domain {
                    Some(domain) => println!("  {}={} ({domain})", c.name, c.value),
                    None => println!("  {}={}", c.name, c.value),
                }
            }
        }
        CookieAction::Clear => {
            session::clear()?;
            println!("Cookies cleared.");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn call_collects_query_pairs() {
        let cli = Cli::parse_from([
            "cloudmusic",
            "call",
            "/search",
            "-q",
            "keywords=海阔天空",
            "-q",
            "limit=5",
            "--cookie",
            "MUSIC_U=abc",
        ]);
        assert_eq!(cli.global.cookies, [Cookie::new("MUSIC_U", "abc")]);
        let Command::Call { route, query, lenient } = cli.command else {
            panic!("expected call");
        };
        assert_eq!(route, "/search");
        assert!(!lenient);
        assert_eq!(
            query,
            [
                ("keywords".to_owned(), "海阔天空".to_owned()),
                ("limit".to_owned(), "5".to_owned()),
            ]
        );
    }

    #[test]
    fn malformed_pairs_are_rejected() {
        assert!(parse_pair("novalue").is_err());
        assert!(parse_cookie("=x").is_err());
    }
}
