//! Shopfront desktop shell.
//!
//! Opens one fixed-size window on the configured site address. The page is
//! loaded as an external URL and no capability lists a remote origin, so it
//! runs isolated from the host and cannot reach the IPC bridge.

use std::error::Error;

use shopfront_core::{ClosePolicy, Isolation, ShellConfig, WindowSpec};
use tauri::{AppHandle, Manager, RunEvent, Runtime, WebviewUrl, WebviewWindowBuilder};

const MAIN_WINDOW_LABEL: &str = "main";

fn load_window_spec() -> anyhow::Result<WindowSpec> {
    let config = ShellConfig::load()?;
    WindowSpec::from_config(&config)
}

fn open_main_window<R: Runtime, M: Manager<R>>(
    manager: &M,
    spec: &WindowSpec,
) -> Result<(), Box<dyn Error>> {
    let url: tauri::Url = spec.url().as_str().parse()?;

    // Nothing grants the remote origin any permission; that is the isolation.
    match spec.isolation() {
        Isolation::Enabled => log::debug!("Page context isolated from host"),
    }

    log::info!("Opening {} ({}x{})", url, spec.width, spec.height);
    WebviewWindowBuilder::new(manager, MAIN_WINDOW_LABEL, WebviewUrl::External(url))
        .title(spec.title.as_str())
        .inner_size(f64::from(spec.width), f64::from(spec.height))
        .build()?;
    Ok(())
}

#[cfg_attr(not(target_os = "macos"), allow(unused_variables))]
fn on_run_event<R: Runtime>(app: &AppHandle<R>, event: RunEvent, policy: ClosePolicy) {
    match event {
        // `code` is None when the last window closed, Some on explicit exit
        RunEvent::ExitRequested { code: None, api, .. } if !policy.quits_when_all_closed() => {
            api.prevent_exit();
        }
        #[cfg(target_os = "macos")]
        RunEvent::Reopen {
            has_visible_windows: false,
            ..
        } => {
            if app.get_webview_window(MAIN_WINDOW_LABEL).is_none() {
                let spec = app.state::<WindowSpec>();
                if let Err(e) = open_main_window(app, spec.inner()) {
                    log::error!("Failed to reopen window: {}", e);
                }
            }
        }
        _ => {}
    }
}

pub fn run() {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let policy = ClosePolicy::current();

    tauri::Builder::default()
        .plugin(
            tauri_plugin_log::Builder::new()
                .level(log::LevelFilter::Info)
                .build(),
        )
        .setup(|app| {
            let spec = load_window_spec()?;
            open_main_window(app.handle(), &spec)?;
            app.manage(spec);
            Ok(())
        })
        .build(tauri::generate_context!())
        .expect("error while building shopfront shell")
        .run(move |app, event| on_run_event(app, event, policy));
}
