use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use forge_app::{
    crash, logging, App, AppConfig, ApplicationEventType, Capabilities, HeadlessPlatform, Options,
    Platform, TrayConfig, TrayOptions, WindowOptions,
};

mod assets;
mod dialog;
mod menu;
mod platform;

use assets::DirAssetServer;
use platform::TaoPlatform;

struct Args {
    app_dir: PathBuf,
    headless: bool,
}

fn parse_args() -> Result<Args> {
    // Parse args: --app-dir <dir> --headless
    let mut args = env::args().skip(1);
    let mut parsed = Args {
        app_dir: PathBuf::from("."),
        headless: false,
    };
    while let Some(a) = args.next() {
        match a.as_str() {
            "--app-dir" => {
                parsed.app_dir = PathBuf::from(args.next().context("--app-dir requires a path")?);
            }
            "--headless" => {
                parsed.headless = true;
            }
            _ => {}
        }
    }
    Ok(parsed)
}

/// Read an icon file relative to the app directory. A missing icon is not fatal.
fn read_icon(app_dir: &Path, icon: Option<&Path>) -> Vec<u8> {
    let Some(icon) = icon else {
        return Vec::new();
    };
    let path = app_dir.join(icon);
    match std::fs::read(&path) {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!("Failed to read icon {}: {}", path.display(), e);
            Vec::new()
        }
    }
}

fn build_tray(app: &Arc<App>, app_dir: &Path, config: &TrayConfig) {
    let menu = app.new_menu();
    menu.add("Show").on_click(|_| {
        if let Some(app) = forge_app::global() {
            app.show();
        }
    });
    menu.add("Hide").on_click(|_| {
        if let Some(app) = forge_app::global() {
            app.hide();
        }
    });
    menu.add_separator();
    menu.add("Quit").on_click(|_| {
        if let Some(app) = forge_app::global() {
            app.quit();
        }
    });

    app.new_system_tray_with_options(TrayOptions {
        tooltip: config.tooltip.clone().or_else(|| Some(app.name().to_string())),
        icon: read_icon(app_dir, config.icon.as_deref()),
        menu: Some(menu),
    });
}

fn build_app_menu(app: &Arc<App>) {
    let menu = app.new_menu();
    let app_menu = menu.add_submenu(app.name());
    app_menu.add(&format!("About {}", app.name())).on_click(|_| {
        if let Some(app) = forge_app::global() {
            app.show_about_dialog();
        }
    });
    app_menu.add_separator();
    let quit = app_menu.add("Quit");
    quit.set_accelerator(Some("CmdOrCtrl+Q"));
    quit.on_click(|_| {
        if let Some(app) = forge_app::global() {
            app.quit();
        }
    });
    app.set_menu(Some(menu));
}

fn main() -> Result<()> {
    let args = parse_args()?;

    let manifest_path = args.app_dir.join("forge.toml");
    let config = AppConfig::load(&manifest_path)
        .with_context(|| format!("reading manifest at {}", manifest_path.display()))?;

    logging::init(&config.log);
    tracing::info!("Starting app: {}", config.name());

    // Initialize crash reporting
    let crash_report_dir = config
        .app
        .crash_report_dir
        .as_ref()
        .map(|dir| args.app_dir.join(dir))
        .unwrap_or_else(|| args.app_dir.join("crashes"));
    crash::init_crash_reporting(config.app.crash_reporting, &crash_report_dir, config.name());
    if crash::is_enabled() {
        if let Some(dir) = crash::report_dir() {
            tracing::info!(
                "Crash reporting enabled, reports will be saved to: {}",
                dir.display()
            );
        }
    }

    let mut options = Options::from_config(config.clone());
    options.icon = read_icon(&args.app_dir, config.app.icon.as_deref());
    options.asset_server = Some(Arc::new(DirAssetServer::new(args.app_dir.join("web"))));
    // wry reports file drops for every window
    options.capabilities = Capabilities {
        has_native_drag: !args.headless,
    };
    let app = App::new(options).context("initializing application")?;
    forge_app::set_global(app.clone());

    if config.windows.is_empty() {
        app.new_webview_window_with_options(WindowOptions {
            name: Some("main".into()),
            title: Some(app.name().to_string()),
            ..Default::default()
        });
    }
    for window in &config.windows {
        app.new_webview_window_with_options(window.clone());
    }
    if let Some(tray) = &config.tray {
        build_tray(&app, &args.app_dir, tray);
    }
    build_app_menu(&app);

    app.on(ApplicationEventType::Started, |_| {
        tracing::info!("Application started");
    });

    let platform: Arc<dyn Platform> = if args.headless {
        // Smoke run: launch everything, then leave
        app.run_on_main(|| {
            if let Some(app) = forge_app::global() {
                app.quit();
            }
        });
        Arc::new(HeadlessPlatform::new())
    } else {
        Arc::new(TaoPlatform::new())
    };

    app.run(platform).context("running application")?;
    tracing::info!("Application exited");
    Ok(())
}
