//! Inspector for YXV relightable models.
//!
//! Streams a model file through the parser in slices, decodes basis images on
//! worker threads, packs atlases one step at a time and prints a JSON summary
//! of every object.

mod args;
mod observer;
mod summary;

use std::path::Path;
use std::process::ExitCode;

use clap::Parser;
use yxv::{ImageDecoder, JpegImageDecoder, LoadObserver, LoadSession};

use crate::args::CliArgs;
use crate::observer::LogObserver;

type BoxError = Box<dyn std::error::Error>;

/// Decode the session's new basis images on up to `workers` threads.
fn decode_pending<O: LoadObserver>(session: &mut LoadSession<O>, workers: usize) {
    let jobs: Vec<_> = session
        .decode_requests()
        .into_iter()
        .filter_map(|request| Some((session.completion_sender(request.id)?, request)))
        .collect();
    if jobs.is_empty() {
        return;
    }
    let decoder = JpegImageDecoder;
    let per_worker = jobs.len().div_ceil(workers.max(1));
    std::thread::scope(|scope| {
        for batch in jobs.chunks(per_worker) {
            let decoder: &dyn ImageDecoder = &decoder;
            scope.spawn(move || {
                for (sender, request) in batch {
                    // The session owns the receiver for as long as it exists.
                    let _ = sender.send_blocking(request.decode(decoder));
                }
            });
        }
    });
}

fn dump_atlases<O: LoadObserver>(session: &LoadSession<O>, dir: &Path) -> Result<usize, BoxError> {
    std::fs::create_dir_all(dir)?;
    let mut written = 0;
    for &id in session.parser().objects().keys() {
        let Some(channels) = session.packed(id) else {
            continue;
        };
        for (channel, packed) in channels.iter().enumerate() {
            for (index, atlas) in packed.atlases.iter().enumerate() {
                let Some(image) =
                    image::RgbaImage::from_raw(atlas.width, atlas.height, atlas.data.clone())
                else {
                    continue;
                };
                let path = dir.join(format!("object{id}_channel{channel}_{index}.png"));
                image.save(&path)?;
                tracing::debug!(path = %path.display(), "wrote atlas");
                written += 1;
            }
        }
    }
    Ok(written)
}

fn run(args: &CliArgs) -> Result<(), BoxError> {
    let data = std::fs::read(&args.path)?;
    tracing::info!(path = %args.path.display(), bytes = data.len(), "loaded file");

    let mut session = LoadSession::new(args.config(), LogObserver::default());
    let slice = args.slice_size.max(1);
    let mut end = 0;
    while end < data.len() {
        end = (end + slice).min(data.len());
        session.on_bytes(&data[..end])?;
        decode_pending(&mut session, args.workers);
        // One pack step per delivery, like a render frame.
        session.pump();
    }
    session.on_download_complete(&data)?;
    decode_pending(&mut session, args.workers);
    session.run_until_idle();

    if let Some(dir) = &args.dump_atlases {
        let written = dump_atlases(&session, dir)?;
        tracing::info!(written, dir = %dir.display(), "wrote atlases");
    }

    let summary = summary::summarize(&mut session, data.len(), &args.angles);
    println!("{}", serde_json::to_string_pretty(&summary)?);

    let errors = &session.observer().load_errors;
    if !errors.is_empty() {
        tracing::warn!(count = errors.len(), "some basis images failed to decode");
    }
    Ok(())
}

fn main() -> ExitCode {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = CliArgs::parse();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e}");
            ExitCode::FAILURE
        }
    }
}
