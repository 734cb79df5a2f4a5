use anyhow::{Context, Result};
use clap::Parser;
use mailframe::bridge::{loopback, ChannelTransport};
use mailframe::{
    ContentBridge, ContentEvent, ContentPipeline, EstimatedLayout, EventSink, HostBridge, HostProps, Platform,
    RenderConfig, ScriptCall, Viewport,
};
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{info, warn, Level};

/// Render an HTML email body the way the content surface would
#[derive(Parser, Debug)]
#[command(name = "mailframe-preview")]
#[command(about = "Normalize an HTML email body and print the rendered page and bridge events")]
#[command(version)]
struct Args {
    /// HTML file holding the message body
    #[arg(short, long)]
    input: PathBuf,

    /// Viewport width in CSS px
    #[arg(long)]
    width: Option<f32>,

    /// Viewport height in CSS px
    #[arg(long)]
    height: Option<f32>,

    /// Render in dark mode
    #[arg(long)]
    dark: bool,

    /// Render in preview mode
    #[arg(long)]
    preview: bool,

    /// Never collapse quoted text
    #[arg(long)]
    show_quoted: bool,

    /// Image proxy URL template containing {url} or {raw_url}
    #[arg(long)]
    proxy_template: Option<String>,

    /// Renderer configuration file (TOML)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

/// Shuttle calls and messages between the two sides until nothing happens
/// for `idle`
async fn run_until_idle(
    content: &mut ContentBridge,
    host: &HostBridge<ChannelTransport>,
    calls: &mut UnboundedReceiver<ScriptCall>,
    messages: &mut UnboundedReceiver<String>,
    idle: Duration,
) {
    loop {
        tokio::select! {
            Some(call) = calls.recv() => {
                if let Err(e) = content.invoke(&call) {
                    warn!("{} failed: {}", call.function, e);
                }
            }
            Some(raw) = messages.recv() => host.on_message(&raw).await,
            _ = tokio::time::sleep(idle) => break,
        }
    }
}

fn print_events(events: &mut UnboundedReceiver<ContentEvent>) -> Result<()> {
    while let Ok(event) = events.try_recv() {
        eprintln!("event: {}", event.to_json()?);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let level = if args.verbose { Level::DEBUG } else { Level::WARN };
    tracing_subscriber::fmt().with_max_level(level).with_writer(std::io::stderr).init();

    let mut config = match &args.config {
        Some(path) => RenderConfig::load(path).with_context(|| format!("loading {}", path.display()))?,
        None => RenderConfig::default(),
    };
    if let Some(width) = args.width {
        config.layout.viewport_width = width;
    }
    if let Some(height) = args.height {
        config.layout.viewport_height = height;
    }
    config.validate()?;

    let html = std::fs::read_to_string(&args.input).with_context(|| format!("reading {}", args.input.display()))?;

    let (sink, mut messages) = EventSink::channel();
    let layout = EstimatedLayout::new(
        Viewport::new(config.layout.viewport_width, config.layout.viewport_height),
        config.layout.default_font_size,
    );
    let pipeline = ContentPipeline::new(&config, Box::new(layout), sink.clone());
    let mut content = ContentBridge::new(pipeline, sink);

    let props = HostProps {
        html,
        is_dark_mode: args.dark,
        is_preview_mode: args.preview,
        image_proxy_template: args.proxy_template.clone(),
        disable_hide_quoted_text: args.show_quoted,
        platform: Platform::default(),
    };
    let (transport, mut calls) = loopback();
    let (host, mut events) = HostBridge::new(transport, props, &config.bridge);

    let idle = config.bridge.load_debounce() + config.bridge.mount_retry_interval() + Duration::from_millis(50);
    content.mount();
    run_until_idle(&mut content, &host, &mut calls, &mut messages, idle).await;

    // No network here: report every image as loaded
    let images = content.pipeline().listeners().images().len();
    if images > 0 {
        info!("Simulating load of {} image(s)", images);
        for index in 0..images {
            content.pipeline_mut().on_image_load(index);
        }
        run_until_idle(&mut content, &host, &mut calls, &mut messages, idle).await;
    }

    print_events(&mut events)?;
    match content.pipeline().rendered_html() {
        Some(rendered) => println!("{}", rendered),
        None => warn!("Nothing was rendered"),
    }

    host.teardown().await;
    content.teardown();
    Ok(())
}
