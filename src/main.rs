//! Opticraft - a visual editor for optical system descriptions
//!
//! Usage: `opticraft [document.json] [--config config.json]`
//!
//! Without a document the current system is fetched from the server.

use eframe::egui;
use log::{error, info};
use opticraft::backend::http::HttpTransport;
use opticraft::constants;
use opticraft::editor::{Command, EditorApp, EditorSession, FileManager};
use opticraft::viewport::{EvictionPolicy, MeshCache};
use opticraft::EditorConfig;
use serde_json::Value;
use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;
use std::time::Instant;

#[derive(Debug, Default)]
struct Arguments {
    document: Option<PathBuf>,
    config: Option<PathBuf>,
}

fn parse_arguments(args: impl IntoIterator<Item = String>) -> Arguments {
    let mut arguments = Arguments::default();
    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        if arg == "--config" {
            arguments.config = args.next().map(PathBuf::from);
        } else {
            arguments.document = Some(PathBuf::from(arg));
        }
    }
    arguments
}

fn main() -> Result<(), eframe::Error> {
    // RUST_LOG overrides the level
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let arguments = parse_arguments(std::env::args().skip(1));
    let config = EditorConfig::load(arguments.config.as_deref()).unwrap_or_else(|e| {
        error!("{}; using default config", e);
        EditorConfig::default()
    });
    info!("Using server {}", config.server_url);

    let transport = Rc::new(HttpTransport::new(&config.server_url, config.request_timeout()));
    let cache = Rc::new(RefCell::new(MeshCache::new(EvictionPolicy::from_capacity(
        config.mesh_cache_capacity,
    ))));

    let mut file_manager = FileManager::new();
    let document = match &arguments.document {
        Some(path) => match file_manager.load_from_file(path) {
            Ok(document) => Some(document),
            Err(e) => {
                error!("{}", e);
                None
            }
        },
        None => None,
    };

    let now = Instant::now();
    let fetch = document.is_none();
    let mut session = EditorSession::new(config, document.unwrap_or(Value::Null), transport, cache);
    if fetch {
        session.dispatch(Command::FetchDocument, now);
    } else {
        session.dispatch(Command::Send, now);
    }
    session.dispatch(Command::Trace, now);

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title(constants::window::TITLE)
            .with_inner_size(constants::window::INITIAL_SIZE),
        ..Default::default()
    };

    eframe::run_native(
        constants::window::TITLE,
        options,
        Box::new(|_cc| Ok(Box::new(EditorApp::new(session, file_manager)))),
    )
}
