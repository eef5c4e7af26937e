use amplitune::app::{App, SessionOptions};
use amplitune::config;
use amplitune::sources::settings::{ServerConnection, TidalSession};
use amplitune::sources::{Lyrics, SearchResults, SourceId, Track};
use anyhow::Context;
use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "amplitune", version, about = "Multi-source music player")]
struct Cli {
    /// Override config file path.
    #[arg(long)]
    config: Option<std::path::PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Search every configured source and print merged results.
    Search {
        query: String,
        /// Print the merged results as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Look up lyrics on LRCLIB by track metadata.
    Lyrics {
        title: String,
        artist: String,
        #[arg(long, default_value = "")]
        album: String,
    },
    /// Show an album and its tracks from one source.
    Album {
        source: String,
        id: String,
        #[arg(long)]
        json: bool,
    },
    /// Show an artist's albums and top songs from one source.
    Artist {
        source: String,
        id: String,
        #[arg(long)]
        json: bool,
    },
    /// List library playlists from every source, or one playlist's tracks.
    Playlists {
        /// Source and playlist id, e.g. `playlists navidrome 800000003`.
        #[arg(num_args = 0..=2)]
        target: Vec<String>,
        #[arg(long)]
        json: bool,
    },
    /// Search and play the matching songs, reading commands from stdin.
    Play {
        query: String,
        #[arg(long)]
        shuffle: bool,
        #[arg(long)]
        repeat: bool,
    },
    /// Navidrome / Subsonic server connection.
    Server {
        #[command(subcommand)]
        cmd: ServerCommand,
    },
    /// Order in which sources are tried for playback.
    Priority {
        #[command(subcommand)]
        cmd: PriorityCommand,
    },
    /// TIDAL account session.
    Tidal {
        #[command(subcommand)]
        cmd: TidalCommand,
    },
    /// Audio output device management (mpv).
    Audio {
        #[command(subcommand)]
        cmd: AudioCommand,
    },
}

#[derive(Debug, Subcommand)]
enum ServerCommand {
    /// Store the active server. The token is md5(password + salt).
    Set {
        url: String,
        username: String,
        #[arg(long)]
        token: String,
        #[arg(long)]
        salt: String,
    },
    /// Forget the active server.
    Clear,
    /// Print the active server.
    Show,
}

#[derive(Debug, Subcommand)]
enum PriorityCommand {
    Show,
    /// Replace the priority list, e.g. `priority set tidal navidrome`.
    Set {
        #[arg(required = true)]
        sources: Vec<String>,
    },
}

#[derive(Debug, Subcommand)]
enum TidalCommand {
    /// Store an access token for the TIDAL API.
    Link {
        #[arg(long)]
        token: String,
        #[arg(long, default_value = "US")]
        country: String,
    },
    Unlink,
}

#[derive(Debug, Subcommand)]
enum AudioCommand {
    /// List mpv audio devices.
    List,
    /// Set mpv audio device (name as shown in list).
    Set { device: String },
    /// Clear mpv audio device override.
    Clear,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load(cli.config.as_deref()).context("load config")?;

    match cli.command {
        Command::Search { query, json } => {
            let app = App::new(cfg)?;
            app.start().await?;
            let results = app.search(&query).await;
            if json {
                println!("{}", serde_json::to_string_pretty(&results)?);
            } else {
                print_results(&results);
            }
        }
        Command::Album { source, id, json } => {
            let app = App::new(cfg)?;
            app.start().await?;
            let album = app
                .manager()
                .get_album(&SourceId::new(source), &id)
                .await
                .context("get album")?;
            if json {
                println!("{}", serde_json::to_string_pretty(&album)?);
            } else {
                println!("{} - {}  [{}]", album.album.title, album.album.artist, album.album.source);
                if !album.genres.is_empty() {
                    println!("{}", album.genres.join(", "));
                }
                print_tracks(&album.tracks);
            }
        }
        Command::Artist { source, id, json } => {
            let app = App::new(cfg)?;
            app.start().await?;
            let artist = app
                .manager()
                .get_artist(&SourceId::new(source), &id)
                .await
                .context("get artist")?;
            if json {
                println!("{}", serde_json::to_string_pretty(&artist)?);
            } else {
                println!("{}  [{}]", artist.artist.name, artist.artist.source);
                for a in &artist.albums {
                    println!("  {} ({})", a.title, a.release_date);
                }
                if !artist.top_songs.is_empty() {
                    println!("Top songs:");
                    print_tracks(&artist.top_songs);
                }
            }
        }
        Command::Playlists { target, json } => {
            let app = App::new(cfg)?;
            app.start().await?;
            match target.as_slice() {
                [source, id] => {
                    let playlist = app
                        .manager()
                        .get_playlist(&SourceId::new(source.as_str()), id)
                        .await
                        .context("get playlist")?;
                    if json {
                        println!("{}", serde_json::to_string_pretty(&playlist)?);
                    } else {
                        println!("{}  [{}]", playlist.playlist.name, playlist.playlist.source);
                        print_tracks(&playlist.tracks);
                    }
                }
                [] => {
                    let playlists = app.manager().get_playlists().await;
                    if json {
                        println!("{}", serde_json::to_string_pretty(&playlists)?);
                    } else if playlists.is_empty() {
                        println!("No playlists.");
                    } else {
                        for p in &playlists {
                            println!("{}  {} ({} tracks)  [{}]", p.id, p.name, p.track_count, p.source);
                        }
                    }
                }
                _ => anyhow::bail!("expected a source and a playlist id"),
            }
        }
        Command::Lyrics {
            title,
            artist,
            album,
        } => {
            let app = App::new(cfg)?;
            print_lyrics(&app.lookup_lyrics(&title, &artist, &album).await);
        }
        Command::Play {
            query,
            shuffle,
            repeat,
        } => {
            let app = App::new(cfg)?;
            app.start().await?;
            let results = app.search(&query).await;
            if results.songs.is_empty() {
                println!("No songs found for {query:?}.");
                return Ok(());
            }
            app.run_session(results.songs, SessionOptions { shuffle, repeat })
                .await?;
        }
        Command::Server { cmd } => {
            let app = App::new(cfg)?;
            match cmd {
                ServerCommand::Set {
                    url,
                    username,
                    token,
                    salt,
                } => {
                    let id = url.trim_end_matches('/').to_string();
                    app.set_server(&ServerConnection {
                        url: id.clone(),
                        username,
                        hash: token,
                        salt,
                        id,
                    })?;
                    println!("Saved active server.");
                }
                ServerCommand::Clear => {
                    if app.clear_server()? {
                        println!("Cleared active server.");
                    } else {
                        println!("No active server.");
                    }
                }
                ServerCommand::Show => match app.server()? {
                    Some(s) => println!("{} as {}", s.url, s.username),
                    None => println!("No active server."),
                },
            }
        }
        Command::Priority { cmd } => {
            let app = App::new(cfg)?;
            let priority = match cmd {
                PriorityCommand::Show => app.priority(),
                PriorityCommand::Set { sources } => app.set_priority(&sources)?,
            };
            let names: Vec<&str> = priority.iter().map(|id| id.as_str()).collect();
            println!("{}", names.join(" > "));
        }
        Command::Tidal { cmd } => {
            let app = App::new(cfg)?;
            match cmd {
                TidalCommand::Link { token, country } => {
                    app.link_tidal(&TidalSession {
                        access_token: token,
                        country_code: country.to_uppercase(),
                    })?;
                    println!("Linked TIDAL session.");
                }
                TidalCommand::Unlink => {
                    if app.unlink_tidal()? {
                        println!("Unlinked TIDAL session.");
                    } else {
                        println!("TIDAL was not linked.");
                    }
                }
            }
        }
        Command::Audio { cmd } => match cmd {
            AudioCommand::List => {
                let out = tokio::process::Command::new("mpv")
                    .args(["--audio-device=help", "--no-video", "--idle=no"])
                    .output()
                    .await
                    .context("run mpv --audio-device=help")?;
                // mpv prints help to stdout.
                print!("{}", String::from_utf8_lossy(&out.stdout));
                eprint!("{}", String::from_utf8_lossy(&out.stderr));
            }
            AudioCommand::Set { device } => {
                let mut cfg = cfg;
                cfg.player.audio_device = Some(device);
                config::save(&cfg, cli.config.as_deref()).context("save config")?;
                println!("Updated audio device in config.");
            }
            AudioCommand::Clear => {
                let mut cfg = cfg;
                cfg.player.audio_device = None;
                config::save(&cfg, cli.config.as_deref()).context("save config")?;
                println!("Cleared audio device override.");
            }
        },
    }

    Ok(())
}

fn print_results(results: &SearchResults) {
    if results.is_empty() {
        println!("No results.");
        return;
    }
    if !results.songs.is_empty() {
        println!("Songs:");
        print_tracks(&results.songs);
    }
    if !results.albums.is_empty() {
        println!("Albums:");
        for a in &results.albums {
            println!("  {} - {}  [{}]", a.title, a.artist, a.source);
        }
    }
    if !results.artists.is_empty() {
        println!("Artists:");
        for a in &results.artists {
            println!("  {}  [{}]", a.name, a.source);
        }
    }
}

fn print_tracks(tracks: &[Track]) {
    for (i, t) in tracks.iter().enumerate() {
        let sources: Vec<&str> = t.available_sources.iter().map(|s| s.as_str()).collect();
        println!(
            "{:02}. {} - {}  {}  [{}]",
            i + 1,
            t.title,
            t.artist,
            amplitune::sources::format_time(t.duration_ms as f64 / 1000.0),
            sources.join(", ")
        );
    }
}

fn print_lyrics(lyrics: &Lyrics) {
    match lyrics {
        Lyrics::Text(text) => {
            println!("[{}]", text.source);
            for line in text.display_lines() {
                println!("{line}");
            }
        }
        Lyrics::Error { message, source } => println!("{message} ({source})"),
    }
}
