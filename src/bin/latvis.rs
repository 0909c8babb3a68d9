use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use log::info;
use tracing_subscriber::EnvFilter;

use latvis::{
    BoundingBox, Coordinate, Dispatcher, Error, Handle, HistorySource, InMemoryTaskQueue, KmlHistorySource,
    LocalFsBlobStore, RecordHistorySource, RenderConfig, RenderEngine, RenderRequest, Style,
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Render location history density maps")]
struct Cli {
    /// JSON render configuration; defaults apply to missing fields
    #[arg(long, env = "LATVIS_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render synchronously and write the image to a file
    Render {
        #[command(flatten)]
        request: RequestArgs,

        /// Output file
        #[arg(long)]
        out: PathBuf,
    },

    /// Enqueue a render, run the worker in-process and print the display path
    Submit {
        #[command(flatten)]
        request: RequestArgs,
    },

    /// Copy a stored image to a file
    Fetch {
        /// Handle path, e.g. /display/1300000000-1-2-3.png
        #[arg(long)]
        handle: String,

        /// Output file
        #[arg(long)]
        out: PathBuf,
    },
}

#[derive(Args, Debug)]
struct RequestArgs {
    /// History file: JSON in the {"data": {"items": [...]}} shape, or KML
    /// when the extension is .kml
    #[arg(long)]
    history: Option<PathBuf>,

    /// Remote location feed, used when no history file is given
    #[cfg(feature = "http")]
    #[arg(long, env = "LATVIS_FEED_URL")]
    feed_url: Option<String>,

    /// Bearer token for the remote feed
    #[cfg(feature = "http")]
    #[arg(long, env = "LATVIS_ACCESS_TOKEN", default_value = "")]
    access_token: String,

    /// Bounding box: lllat,lllng,urlat,urlng (default: enclose the history)
    #[arg(long)]
    bounds: Option<String>,

    /// Window start, Unix seconds
    #[arg(long, default_value_t = 0)]
    start: i64,

    /// Window end, Unix seconds (default: now)
    #[arg(long)]
    end: Option<i64>,

    /// Output style: bw or svg
    #[arg(long)]
    style: Option<Style>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => RenderConfig::from_json_file(path)?,
        None => RenderConfig::default(),
    };

    let store = Arc::new(LocalFsBlobStore::new(&config.blob_dir)?);
    let engine = Arc::new(RenderEngine::new(config, store));

    match cli.command {
        Command::Render { request, out } => {
            let source = open_source(&request)?;
            let render_request = build_request(&request, source.as_ref())?;
            let history = source.fetch_range(render_request.start, render_request.end)?;
            let blob = engine.render(&history, &render_request)?;
            std::fs::write(&out, &blob.data)?;
            info!("[latvis] wrote {} ({})", out.display(), blob.content_type());
        }
        Command::Submit { request } => {
            let source = open_source(&request)?;
            let render_request = build_request(&request, source.as_ref())?;

            let queue = Arc::new(InMemoryTaskQueue::new());
            let dispatcher = Dispatcher::new(Arc::clone(&engine), queue.clone());
            let job = dispatcher.submit(render_request)?;
            println!("{}", dispatcher.display_path(&job));

            while let Some(task) = queue.pop() {
                engine.run_task(&task, source.as_ref())?;
            }
        }
        Command::Fetch { handle, out } => {
            let handle = Handle::parse_path(&handle)?;
            let blob = engine
                .fetch(&handle)?
                .ok_or_else(|| format!("no image stored under {} yet", handle))?;
            std::fs::write(&out, &blob.data)?;
            info!("[latvis] wrote {} ({})", out.display(), blob.content_type());
        }
    }

    Ok(())
}

fn open_source(args: &RequestArgs) -> Result<Box<dyn HistorySource>, Box<dyn std::error::Error>> {
    if let Some(path) = &args.history {
        return Ok(load_history_file(path)?);
    }

    match open_feed(args)? {
        Some(feed) => Ok(feed),
        None => Err("no history source: pass --history".into()),
    }
}

#[cfg(feature = "http")]
fn open_feed(args: &RequestArgs) -> latvis::Result<Option<Box<dyn HistorySource>>> {
    let Some(url) = &args.feed_url else {
        return Ok(None);
    };
    let config = latvis::HttpSourceConfig {
        base_url: url.clone(),
        access_token: args.access_token.clone(),
        ..Default::default()
    };
    let source: Box<dyn HistorySource> = Box::new(latvis::HttpHistorySource::new(config)?);
    Ok(Some(source))
}

#[cfg(not(feature = "http"))]
fn open_feed(_args: &RequestArgs) -> latvis::Result<Option<Box<dyn HistorySource>>> {
    Ok(None)
}

fn load_history_file(path: &Path) -> latvis::Result<Box<dyn HistorySource>> {
    let is_kml = path
        .extension()
        .map_or(false, |ext| ext.eq_ignore_ascii_case("kml"));

    if is_kml {
        let source = KmlHistorySource::from_kml_file(path)?;
        info!("[latvis] loaded {} KML points from {}", source.history().len(), path.display());
        let source: Box<dyn HistorySource> = Box::new(source);
        return Ok(source);
    }

    let source = RecordHistorySource::from_json_file(path)?;
    info!("[latvis] loaded {} records from {}", source.records().len(), path.display());
    let source: Box<dyn HistorySource> = Box::new(source);
    Ok(source)
}

fn build_request(args: &RequestArgs, source: &dyn HistorySource) -> latvis::Result<RenderRequest> {
    let start = to_time("start", args.start)?;
    let end = match args.end {
        Some(secs) => to_time("end", secs)?,
        None => Utc::now(),
    };

    let bounds = match &args.bounds {
        Some(text) => parse_bounds(text)?,
        None => BoundingBox::enclosing(&source.fetch_range(start, end)?)
            .ok_or_else(|| Error::MissingParameter("bounds".to_string()))?,
    };

    let mut request = RenderRequest::new(bounds, start, end);
    request.style = args.style;
    Ok(request)
}

fn to_time(key: &str, secs: i64) -> latvis::Result<DateTime<Utc>> {
    DateTime::from_timestamp(secs, 0).ok_or_else(|| Error::InvalidParameter {
        key: key.to_string(),
        value: secs.to_string(),
    })
}

fn parse_bounds(text: &str) -> latvis::Result<BoundingBox> {
    let invalid = || Error::InvalidParameter {
        key: "bounds".to_string(),
        value: text.to_string(),
    };

    let values = text
        .split(',')
        .map(|v| v.trim().parse::<f64>().map_err(|_| invalid()))
        .collect::<latvis::Result<Vec<f64>>>()?;

    match values.as_slice() {
        [lllat, lllng, urlat, urlng] => {
            BoundingBox::new(Coordinate::new(*lllat, *lllng), Coordinate::new(*urlat, *urlng))
        }
        _ => Err(invalid()),
    }
}
