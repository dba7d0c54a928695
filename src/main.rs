mod cli;

use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};
use postboard::board::{Board, ListingView};
use postboard::config::{self, Config};
use postboard::detail::{DetailEvent, ImageOutcome, ImageStrategy, ViewMode};
use postboard::error::BoardError;
use postboard::fetch::guess_content_type;
use postboard::types::{Post, PostDraft, PostId, Upload};

const DEFAULT_LOG_FILTER: &str = "postboard=info";

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let mut cfg = match config::load(cli.config.as_deref()) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("error: {e:#}");
            return ExitCode::FAILURE;
        }
    };
    if let Some(url) = cli.database_url {
        cfg.database_url = Some(url);
    }
    init_tracing(&cfg);

    match run(cli.command, &cfg).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            match e.downcast_ref::<BoardError>() {
                Some(board_err) => eprintln!("{}", board_err.notice()),
                None => eprintln!("error: {e:#}"),
            }
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(cfg: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(cfg.log_filter.as_deref().unwrap_or(DEFAULT_LOG_FILTER)))
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

async fn run(command: Commands, cfg: &Config) -> Result<()> {
    let mut board = postboard::open_board(cfg).await?;
    match command {
        Commands::List { search, page } => {
            board.load_listing(search.as_deref()).await?;
            let view = board.go_to_page(page);
            if view.window.current != page && view.total_posts > 0 {
                eprintln!("page {page} does not exist, showing page {}", view.window.current);
            }
            print_listing(&view);
        }
        Commands::Show { id, admin, progressive, preload } => {
            if progressive {
                board.set_image_strategy(ImageStrategy::Progressive);
            } else if preload {
                board.set_image_strategy(ImageStrategy::Preload);
            }
            let mode = if admin { ViewMode::Admin } else { ViewMode::Board };
            show(&mut board, PostId::new(id), mode).await?;
        }
        Commands::Create { title, content, thumbnail, images } => {
            let draft = PostDraft {
                title,
                content,
                thumbnail: read_optional(thumbnail.as_deref()).await?,
                images: read_all(&images).await?,
            };
            let id = board.create_post(draft).await?;
            println!("created {id}");
        }
        Commands::Edit { id, title, content, thumbnail, images } => {
            let id = PostId::new(id);
            let current = board.edit_form(&id).await?;
            let draft = PostDraft {
                title: title.unwrap_or(current.title),
                content: content.unwrap_or(current.content),
                thumbnail: read_optional(thumbnail.as_deref()).await?,
                images: read_all(&images).await?,
            };
            let post = board.update_post(&id, draft).await?;
            println!("updated {}", post.id);
            print_images(&post);
        }
        Commands::Delete { id } => {
            let id = PostId::new(id);
            board.delete_post(&id).await?;
            println!("deleted {id}");
        }
        Commands::RemoveImage { id, n } => {
            let index = n.checked_sub(1).ok_or_else(|| BoardError::invalid("Invalid image index."))?;
            let post = board.remove_image(&PostId::new(id), index).await?;
            println!("image {n} removed");
            print_images(&post);
        }
        Commands::RemoveThumbnail { id } => {
            board.remove_thumbnail(&PostId::new(id)).await?;
            println!("thumbnail removed");
        }
    }
    Ok(())
}

async fn show(board: &mut Board, id: PostId, mode: ViewMode) -> Result<()> {
    let strategy = board.image_strategy();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let load = async move {
        let result = board.open_detail(&id, mode, &tx).await;
        drop(tx);
        result
    };
    let print = async {
        while let Some(event) = rx.recv().await {
            print_event(&event, strategy);
        }
    };
    let (result, ()) = tokio::join!(load, print);
    result?;
    Ok(())
}

fn print_event(event: &DetailEvent, strategy: ImageStrategy) {
    match event {
        DetailEvent::Loading { id } => eprintln!("loading {id}..."),
        DetailEvent::Resolved(post) => {
            println!("{}", post.title);
            println!("{}", post.created_at.format("%Y-%m-%d"));
            println!();
            println!("{}", post.content);
            println!();
        }
        DetailEvent::ImagePending { index, url } => println!("[{}] {url} (loading)", index + 1),
        DetailEvent::ImageSettled(slot) => match &slot.outcome {
            ImageOutcome::Loaded(img) => println!("[{}] loaded, {} bytes", slot.index + 1, img.bytes.len()),
            ImageOutcome::Failed(reason) => println!("[{}] failed: {reason}", slot.index + 1),
        },
        DetailEvent::Ready(view) => {
            if strategy == ImageStrategy::Preload {
                for slot in &view.images {
                    match &slot.outcome {
                        ImageOutcome::Loaded(img) => println!("[{}] {} ({} bytes)", slot.index + 1, slot.url, img.bytes.len()),
                        ImageOutcome::Failed(reason) => println!("[{}] {} (failed: {reason})", slot.index + 1, slot.url),
                    }
                }
            }
            if view.show_views {
                println!("views: {}", view.post.views.unwrap_or(0));
            }
        }
        DetailEvent::Failed { notice, .. } => eprintln!("{notice}"),
    }
}

fn print_listing(view: &ListingView) {
    if view.total_posts == 0 {
        println!("No posts.");
        return;
    }
    for post in &view.posts {
        println!("{}  {}  {}", post.id, post.created_at.format("%Y-%m-%d"), post.title);
        if let Some(thumb) = post.card_thumbnail() {
            println!("    {thumb}");
        }
    }
    if view.window.should_display() {
        let pages: Vec<String> = view
            .window
            .pages
            .iter()
            .map(|&p| if p == view.window.current { format!("[{p}]") } else { p.to_string() })
            .collect();
        let prev = if view.window.has_prev { "<" } else { " " };
        let next = if view.window.has_next { ">" } else { " " };
        println!();
        println!("{prev} {} {next}  ({} posts, {} pages)", pages.join(" "), view.total_posts, view.window.total_pages);
    }
}

fn print_images(post: &Post) {
    for (i, url) in post.images.iter().enumerate() {
        println!("[{}] {url}", i + 1);
    }
}

async fn read_upload(path: &Path) -> Result<Upload> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let content_type = guess_content_type(&file_name).unwrap_or_else(|| "application/octet-stream".to_string());
    Ok(Upload { file_name, bytes, content_type })
}

async fn read_optional(path: Option<&Path>) -> Result<Option<Upload>> {
    match path {
        Some(p) => Ok(Some(read_upload(p).await?)),
        None => Ok(None),
    }
}

async fn read_all(paths: &[std::path::PathBuf]) -> Result<Vec<Upload>> {
    let mut out = Vec::with_capacity(paths.len());
    for p in paths {
        out.push(read_upload(p).await?);
    }
    Ok(out)
}
