mod capabilities;
mod capture;
mod color;
mod config;
mod cube;
mod detect;
mod sensing;
mod store;
mod utils;

use anyhow::{Context, Result};
use serde::Serialize;
use std::{path::Path, sync::Arc};
use tokio::io::{AsyncBufReadExt, BufReader};

use capabilities::Capabilities;
use capture::{
    commands::{
        camera_status, cancel_capture, color_mappings, detect_colors, detect_colors_from_file,
        get_result, get_status, start_capture, supported_colors, trigger_capture,
        validate_cube, wait_for_capture,
    },
    CaptureController,
};
use config::AppConfig;
use sensing::{Camera, DirectoryCamera};
use store::ResultStore;

pub(crate) type CameraFactory = Arc<dyn Fn() -> Box<dyn Camera> + Send + Sync>;

pub(crate) struct AppState {
    pub(crate) config: AppConfig,
    pub(crate) store: Arc<ResultStore>,
    pub(crate) capture: tokio::sync::Mutex<CaptureController>,
    pub(crate) capabilities: Capabilities,
    pub(crate) camera_factory: CameraFactory,
}

impl AppState {
    pub(crate) fn new(
        config: AppConfig,
        capabilities: Capabilities,
        camera_factory: CameraFactory,
    ) -> Self {
        let store = Arc::new(ResultStore::new(config.store.clone()));
        Self {
            capture: tokio::sync::Mutex::new(CaptureController::new(store.clone())),
            store,
            config,
            capabilities,
            camera_factory,
        }
    }
}

const HELP: &str = "\
<enter>              capture the face the session is waiting on
start                start a new capture session
q                    cancel the running session
status | result      print the status or result file
detect <path> [face] detect sticker colors in a still image
detect-b64 <data> [face]
                     same, for a base64 image or data URL
validate <cube>      validate a 54-letter cube string
camera               check whether the camera can be opened
colors               list supported colors and their notation
mappings             print the color/notation maps both ways
exit                 leave (cancels a running session)";

pub fn run() -> Result<()> {
    utils::init_logging(config::debug_mode());
    log::info!("cubescan starting up...");

    let config = AppConfig::from_env();
    let camera_config = config.camera.clone();
    let state = AppState::new(
        config,
        Capabilities::none(),
        Arc::new(move || -> Box<dyn Camera> { Box::new(DirectoryCamera::new(&camera_config)) }),
    );

    let runtime = tokio::runtime::Runtime::new().context("Failed to start tokio runtime")?;
    runtime.block_on(drive(state))
}

async fn drive(state: AppState) -> Result<()> {
    println!("{HELP}");
    start_and_watch(&state).await;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
        let mut words = line.split_whitespace();
        match words.next() {
            None => report(trigger_capture(&state).await),
            Some("start") => start_and_watch(&state).await,
            Some("q") => report(cancel_capture(&state).await),
            Some("status") => print_json(get_status(&state).await),
            Some("result") => print_json(get_result(&state).await),
            Some("detect") => match words.next() {
                Some(path) => {
                    let face = words.next().map(str::to_string);
                    print_json(detect_colors_from_file(&state, Path::new(path), face).await);
                }
                None => println!("usage: detect <path> [face]"),
            },
            Some("detect-b64") => match words.next() {
                Some(payload) => {
                    let face = words.next().map(str::to_string);
                    print_json(detect_colors(&state, payload.to_string(), face).await);
                }
                None => println!("usage: detect-b64 <data> [face]"),
            },
            Some("validate") => match words.next() {
                Some(cube_string) => print_json(validate_string(&state, cube_string).await),
                None => println!("usage: validate <cube>"),
            },
            Some("camera") => print_json(camera_status(&state).await),
            Some("colors") => print_json(Ok::<_, String>(supported_colors(&state))),
            Some("mappings") => print_json(Ok::<_, String>(color_mappings(&state))),
            Some("exit") => break,
            Some(other) => println!("unknown command: {other}\n{HELP}"),
        }
    }

    if state.capture.lock().await.is_active() {
        let _ = cancel_capture(&state).await;
        print_json(wait_for_capture(&state).await);
    }
    Ok(())
}

/// Starts a session and prints its final status once it ends.
async fn start_and_watch(state: &AppState) {
    match start_capture(state).await {
        Ok(session_id) => log::info!("Capture session {session_id} started"),
        Err(err) => {
            println!("error: {err}");
            return;
        }
    }

    let Some(mut phase_rx) = state.capture.lock().await.subscribe() else {
        return;
    };
    let store = state.store.clone();
    tokio::spawn(async move {
        if phase_rx.wait_for(|phase| phase.is_terminal()).await.is_ok() {
            if let Some(status) = store.current_status() {
                println!("[{}] {}", status.status.as_str(), status.message);
            }
        }
    });
}

/// Decodes a cube string with the configured notation and validates it.
async fn validate_string(
    state: &AppState,
    cube_string: &str,
) -> Result<capture::commands::CubeValidation, String> {
    let colors = state
        .config
        .notation
        .decode(cube_string)
        .ok_or_else(|| format!("unknown notation letter in {cube_string}"))?;
    let names = colors.iter().map(|color| color.as_str().to_string()).collect();
    validate_cube(state, names, Some(cube_string.to_string())).await
}

fn report(result: Result<(), String>) {
    if let Err(err) = result {
        println!("error: {err}");
    }
}

fn print_json<T: Serialize>(result: Result<T, String>) {
    match result.and_then(|value| serde_json::to_string_pretty(&value).map_err(|e| e.to_string())) {
        Ok(json) => println!("{json}"),
        Err(err) => println!("error: {err}"),
    }
}
